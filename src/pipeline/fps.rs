// SPDX-License-Identifier: GPL-3.0-only

//! Instantaneous frame rate from consecutive capture timestamps

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// Frame rate derived from the gap between this frame and the previous one.
///
/// The first frame reports 0.0. Identical or backwards timestamps report 0.0
/// rather than infinity or a negative rate.
#[derive(Debug, Clone, Copy, Default)]
pub struct FpsCounter {
    last_timestamp_ns: Option<i64>,
}

impl FpsCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a frame and return the rate it implies
    pub fn update(&mut self, timestamp_ns: i64) -> f32 {
        let fps = match self.last_timestamp_ns {
            None => 0.0,
            Some(last) => {
                let delta = timestamp_ns.saturating_sub(last);
                if delta == 0 {
                    0.0
                } else {
                    (NANOS_PER_SECOND / delta as f64).max(0.0)
                }
            }
        };
        self.last_timestamp_ns = Some(timestamp_ns);
        fps as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_frame_is_zero() {
        let mut counter = FpsCounter::new();
        assert_eq!(counter.update(123_456_789), 0.0);
    }

    #[test]
    fn test_one_second_apart_is_one_fps() {
        let mut counter = FpsCounter::new();
        counter.update(5_000);
        let fps = counter.update(5_000 + 1_000_000_000);
        assert!((fps - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_identical_timestamps_are_zero() {
        let mut counter = FpsCounter::new();
        counter.update(7);
        let fps = counter.update(7);
        assert_eq!(fps, 0.0);
        assert!(fps.is_finite());
    }

    #[test]
    fn test_backwards_timestamp_clamps_to_zero() {
        let mut counter = FpsCounter::new();
        counter.update(2_000_000_000);
        assert_eq!(counter.update(1_000_000_000), 0.0);
    }

    #[test]
    fn test_thirty_fps() {
        let mut counter = FpsCounter::new();
        counter.update(0);
        let fps = counter.update(33_333_333);
        assert!((fps - 30.0).abs() < 0.01);
    }
}
