//! Global stream numbering across several media objects

/// Maps a global stream number onto the media object that owns it.
///
/// Streams are numbered by concatenating the stream lists of all media
/// objects in object order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamIndexMap {
    names: Vec<String>,
    /// End of each object's range of global stream numbers (exclusive)
    bounds: Vec<usize>,
}

impl StreamIndexMap {
    /// Creates an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the streams of the next media object
    pub fn push_object<I>(&mut self, names: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.names.extend(names);
        self.bounds.push(self.names.len());
    }

    /// Total number of streams
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Display name of a global stream
    pub fn name(&self, stream: usize) -> &str {
        &self.names[stream]
    }

    /// Resolves a global stream number into `(media object, local stream)`.
    ///
    /// # Panics
    ///
    /// Panics if `stream` is out of range.
    pub fn resolve(&self, stream: usize) -> (usize, usize) {
        assert!(
            stream < self.names.len(),
            "stream {stream} out of range ({} streams)",
            self.names.len()
        );
        let mut start = 0;
        for (object, &end) in self.bounds.iter().enumerate() {
            if stream < end {
                return (object, stream - start);
            }
            start = end;
        }
        unreachable!("stream bounds cover every stream")
    }

    /// Global stream numbers owned by the given media object
    pub fn streams_of(&self, object: usize) -> std::ops::Range<usize> {
        let start = if object == 0 { 0 } else { self.bounds[object - 1] };
        start..self.bounds[object]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(prefix: &str, count: usize) -> Vec<String> {
        (0..count).map(|i| format!("{prefix}{i}")).collect()
    }

    #[test]
    fn test_resolve_across_objects() {
        let mut map = StreamIndexMap::new();
        map.push_object(names("a", 2));
        map.push_object(Vec::new());
        map.push_object(names("c", 3));

        assert_eq!(map.len(), 5);
        assert_eq!(map.resolve(0), (0, 0));
        assert_eq!(map.resolve(1), (0, 1));
        assert_eq!(map.resolve(2), (2, 0));
        assert_eq!(map.resolve(4), (2, 2));
        assert_eq!(map.name(3), "c1");
        assert_eq!(map.streams_of(1), 2..2);
        assert_eq!(map.streams_of(2), 2..5);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_resolve_out_of_range_panics() {
        let mut map = StreamIndexMap::new();
        map.push_object(names("a", 1));
        map.resolve(1);
    }
}
