//! Sample and time range utilities.
//!
//! The graph processes in terms of absolute sample positions on the
//! reference timeline. Seconds are converted at the edges.

/// A half-open range of samples `[start, end)` on the reference timeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SampleRange {
    /// First sample in the range.
    pub start: i64,
    /// One past the last sample in the range.
    pub end: i64,
}

impl SampleRange {
    /// Create a range covering `[start, end)`.
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// A range that starts at `start` and never ends. Used when syncing
    /// a playhead to free-running playback.
    pub fn until_stopped(start: i64) -> Self {
        Self {
            start,
            end: i64::MAX,
        }
    }

    /// Number of samples in the range, zero if the range is inverted.
    pub fn len(&self) -> usize {
        (self.end - self.start).max(0) as usize
    }

    /// True when the range covers no samples.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// True when `sample` lies inside the range.
    pub fn contains(&self, sample: i64) -> bool {
        sample >= self.start && sample < self.end
    }
}

/// Convert a time in seconds to the nearest sample position.
pub fn time_to_sample(seconds: f64, sample_rate: f64) -> i64 {
    (seconds * sample_rate).round() as i64
}

/// Convert a sample position to seconds.
pub fn sample_to_time(sample: i64, sample_rate: f64) -> f64 {
    sample as f64 / sample_rate
}

/// Convert a time range in seconds to the equivalent sample range.
pub fn time_range_to_samples(start: f64, end: f64, sample_rate: f64) -> SampleRange {
    SampleRange::new(
        time_to_sample(start, sample_rate),
        time_to_sample(end, sample_rate),
    )
}
