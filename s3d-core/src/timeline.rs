//! Reconciliation of the timelines of several media objects

/// Timing information reported by a single media object, in microseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ObjectTimeline {
    /// Presentation time of the first data
    pub initial_skip: i64,
    pub duration: i64,
}

impl ObjectTimeline {
    pub fn new(initial_skip: i64, duration: i64) -> Self {
        Self {
            initial_skip,
            duration,
        }
    }

    /// Duration that remains after skipping to `initial_skip`, never negative
    pub fn effective_duration(&self, initial_skip: i64) -> i64 {
        let skew = initial_skip.saturating_sub(self.initial_skip);
        self.duration.saturating_sub(skew).max(0)
    }
}

/// Combines the timelines of all media objects that contribute an active stream.
///
/// The combined input starts once every contributor can produce data (the
/// latest initial skip) and ends with the shortest contributor once that skew
/// is removed. No contributors yield an empty timeline.
pub fn reconcile(contributors: &[ObjectTimeline]) -> ObjectTimeline {
    let Some(initial_skip) = contributors.iter().map(|t| t.initial_skip).max() else {
        return ObjectTimeline::default();
    };
    let duration = contributors
        .iter()
        .map(|t| t.effective_duration(initial_skip))
        .min()
        .unwrap_or(0);

    ObjectTimeline {
        initial_skip,
        duration,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_object_passes_through() {
        let t = ObjectTimeline::new(40_000, 90_000_000);
        assert_eq!(reconcile(&[t]), t);
    }

    #[test]
    fn test_latest_start_and_shortest_end() {
        let left = ObjectTimeline::new(0, 10_000_000);
        let right = ObjectTimeline::new(500_000, 12_000_000);
        let combined = reconcile(&[left, right]);

        assert_eq!(combined.initial_skip, 500_000);
        // left loses the 0.5 s skew, right keeps everything
        assert_eq!(combined.duration, 9_500_000);
        assert!(combined.duration <= left.effective_duration(combined.initial_skip));
        assert!(combined.duration <= right.effective_duration(combined.initial_skip));
    }

    #[test]
    fn test_effective_duration_is_floored() {
        let short = ObjectTimeline::new(0, 100);
        let late = ObjectTimeline::new(1_000, 5_000);
        assert_eq!(reconcile(&[short, late]).duration, 0);
    }

    #[test]
    fn test_no_contributors() {
        assert_eq!(reconcile(&[]), ObjectTimeline::default());
    }
}
