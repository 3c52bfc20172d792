//! Audio sample layout conversion

use byteorder::{ByteOrder, NativeEndian};

/// Appends the samples of per-channel `planes` to `out`, interleaved.
///
/// Every plane must hold at least `samples * sample_bytes` bytes.
pub fn interleave(planes: &[&[u8]], samples: usize, sample_bytes: usize, out: &mut Vec<u8>) {
    out.reserve(planes.len() * samples * sample_bytes);
    for i in 0..samples {
        let range = i * sample_bytes..(i + 1) * sample_bytes;
        for plane in planes {
            out.extend_from_slice(&plane[range.clone()]);
        }
    }
}

/// Appends native-endian signed 32-bit samples to `out` as 32-bit floats in [-1, 1)
pub fn s32_to_f32(input: &[u8], out: &mut Vec<u8>) {
    out.reserve(input.len());
    let mut converted = [0u8; 4];
    for chunk in input.chunks_exact(4) {
        let value = NativeEndian::read_i32(chunk) as f32 / 2_147_483_648.0;
        NativeEndian::write_f32(&mut converted, value);
        out.extend_from_slice(&converted);
    }
}
