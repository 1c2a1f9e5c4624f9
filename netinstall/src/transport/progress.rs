//! Progress normalization for a single download.
//!
//! Raw byte counts are turned into [`ProgressEvent`]s that a front-end can
//! render directly: either "busy, size unknown" or a fraction in `[0, 1]`.

/// Progress of the current download.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressEvent {
    /// Work is ongoing but the total size is unknown.
    Indeterminate,
    /// Fraction complete, always within `[0, 1]`.
    Determinate(f64),
}

impl ProgressEvent {
    /// The fraction of a determinate event.
    pub fn fraction(&self) -> Option<f64> {
        match self {
            Self::Indeterminate => None,
            Self::Determinate(f) => Some(*f),
        }
    }
}

/// Converts bytes written into progress events for one request.
///
/// Fractions never decrease: a late or repeated report with a smaller byte
/// count yields the previous fraction again.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total: Option<u64>,
    written: u64,
    last_fraction: f64,
}

impl ProgressTracker {
    /// Create a tracker. `total` is the declared content length, if any.
    ///
    /// A declared length of zero is treated as unknown.
    pub fn new(total: Option<u64>) -> Self {
        Self {
            total: total.filter(|t| *t > 0),
            written: 0,
            last_fraction: 0.0,
        }
    }

    /// Declared total size.
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// Bytes recorded so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Whether the total size is known.
    pub fn is_determinate(&self) -> bool {
        self.total.is_some()
    }

    /// Record `bytes` more written and return the resulting event.
    pub fn advance(&mut self, bytes: u64) -> ProgressEvent {
        self.written = self.written.saturating_add(bytes);
        self.current()
    }

    /// The event describing the current state.
    pub fn current(&mut self) -> ProgressEvent {
        match self.total {
            None => ProgressEvent::Indeterminate,
            Some(total) => {
                let fraction = (self.written as f64 / total as f64).clamp(0.0, 1.0);
                self.last_fraction = self.last_fraction.max(fraction);
                ProgressEvent::Determinate(self.last_fraction)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_unknown_total_is_indeterminate() {
        let mut tracker = ProgressTracker::new(None);
        assert!(!tracker.is_determinate());
        assert_eq!(tracker.advance(100), ProgressEvent::Indeterminate);
        assert_eq!(tracker.written(), 100);
    }

    #[test]
    fn test_zero_total_is_indeterminate() {
        let tracker = ProgressTracker::new(Some(0));
        assert_eq!(tracker.total(), None);
    }

    #[test]
    fn test_linear_fraction() {
        let mut tracker = ProgressTracker::new(Some(1000));
        assert_eq!(tracker.advance(250), ProgressEvent::Determinate(0.25));
        assert_eq!(tracker.advance(250), ProgressEvent::Determinate(0.5));
        assert_eq!(tracker.advance(500), ProgressEvent::Determinate(1.0));
    }

    #[test]
    fn test_fraction_is_clamped() {
        let mut tracker = ProgressTracker::new(Some(10));
        assert_eq!(tracker.advance(50), ProgressEvent::Determinate(1.0));
    }

    #[test]
    fn test_fraction_accessor() {
        assert_eq!(ProgressEvent::Indeterminate.fraction(), None);
        assert_eq!(ProgressEvent::Determinate(0.3).fraction(), Some(0.3));
    }

    proptest! {
        #[test]
        fn prop_fractions_non_decreasing_and_end_at_one(
            chunks in prop::collection::vec(1u64..=4096, 1..64)
        ) {
            let total: u64 = chunks.iter().sum();
            let mut tracker = ProgressTracker::new(Some(total));
            let mut previous = 0.0;
            let mut last = 0.0;
            for chunk in &chunks {
                let fraction = tracker.advance(*chunk).fraction().unwrap();
                prop_assert!((0.0..=1.0).contains(&fraction));
                prop_assert!(fraction >= previous);
                previous = fraction;
                last = fraction;
            }
            prop_assert_eq!(last, 1.0);
        }
    }
}
