//! Tempo maps and second-to-beat conversion.
//!
//! MIDI renders are written out in quarter notes, so the engine needs a
//! way to map absolute seconds onto the beat timeline of a tempo map.

/// A tempo change taking effect at an absolute time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TempoChange {
    /// Time in seconds at which the new tempo applies.
    pub time: f64,
    /// Tempo in beats per minute from this point on.
    pub bpm: f64,
}

/// A piecewise-constant tempo map over the timeline.
///
/// The first change always sits at time zero; times before it extrapolate
/// backwards at the initial tempo.
#[derive(Clone, Debug)]
pub struct TempoSequence {
    changes: Vec<TempoChange>,
    // Cumulative quarter notes at each change point.
    beats_at: Vec<f64>,
}

impl TempoSequence {
    /// A map with a single constant tempo.
    pub fn constant(bpm: f64) -> Self {
        let mut seq = Self {
            changes: vec![TempoChange { time: 0.0, bpm }],
            beats_at: Vec::new(),
        };
        seq.recompute();
        seq
    }

    /// Insert a tempo change at `time` seconds.
    ///
    /// A change at the same time as an existing one replaces it.
    pub fn add_change(&mut self, time: f64, bpm: f64) {
        let time = time.max(0.0);
        match self
            .changes
            .binary_search_by(|c| c.time.total_cmp(&time))
        {
            Ok(index) => self.changes[index].bpm = bpm,
            Err(index) => self.changes.insert(index, TempoChange { time, bpm }),
        }
        self.recompute();
    }

    /// The tempo changes in time order.
    pub fn changes(&self) -> &[TempoChange] {
        &self.changes
    }

    /// Cumulative quarter-note position of the change at `index`.
    pub fn beats_at_change(&self, index: usize) -> f64 {
        self.beats_at[index]
    }

    /// Tempo in effect at `time` seconds.
    pub fn bpm_at_time(&self, time: f64) -> f64 {
        self.changes[self.segment_index(time)].bpm
    }

    /// Quarter-note position of `time` seconds.
    pub fn beats_at_time(&self, time: f64) -> f64 {
        let index = self.segment_index(time);
        let change = self.changes[index];
        self.beats_at[index] + (time - change.time) * change.bpm / 60.0
    }

    /// A cursor for converting monotonically drifting times cheaply.
    pub fn cursor(&self) -> TempoCursor<'_> {
        TempoCursor {
            sequence: self,
            index: 0,
            time: 0.0,
        }
    }

    fn segment_index(&self, time: f64) -> usize {
        // partition_point gives the first change strictly after `time`.
        self.changes
            .partition_point(|c| c.time <= time)
            .saturating_sub(1)
    }

    fn recompute(&mut self) {
        self.beats_at.clear();
        self.beats_at.reserve(self.changes.len());
        let mut beats = 0.0;
        for i in 0..self.changes.len() {
            if i > 0 {
                let prev = self.changes[i - 1];
                beats += (self.changes[i].time - prev.time) * prev.bpm / 60.0;
            }
            self.beats_at.push(beats);
        }
    }
}

impl Default for TempoSequence {
    fn default() -> Self {
        Self::constant(120.0)
    }
}

/// A position cursor over a [`TempoSequence`].
///
/// Tracks the current segment so repeated nearby lookups avoid the
/// binary search.
#[derive(Clone, Debug)]
pub struct TempoCursor<'a> {
    sequence: &'a TempoSequence,
    index: usize,
    time: f64,
}

impl TempoCursor<'_> {
    /// Move the cursor to an absolute time in seconds.
    pub fn set_time(&mut self, time: f64) {
        let changes = self.sequence.changes();
        while self.index + 1 < changes.len() && changes[self.index + 1].time <= time {
            self.index += 1;
        }
        while self.index > 0 && changes[self.index].time > time {
            self.index -= 1;
        }
        self.time = time;
    }

    /// Quarter-note position of the cursor's current time.
    pub fn beats(&self) -> f64 {
        let change = self.sequence.changes()[self.index];
        self.sequence.beats_at_change(self.index) + (self.time - change.time) * change.bpm / 60.0
    }

    /// Tempo in effect at the cursor's current time.
    pub fn bpm(&self) -> f64 {
        self.sequence.changes()[self.index].bpm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_tempo_beats() {
        let seq = TempoSequence::constant(120.0);
        assert!((seq.beats_at_time(0.0)).abs() < 1e-12);
        assert!((seq.beats_at_time(1.0) - 2.0).abs() < 1e-12);
        assert!((seq.beats_at_time(2.5) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_tempo_change_accumulates_beats() {
        let mut seq = TempoSequence::constant(120.0);
        seq.add_change(2.0, 60.0);
        // 2 s at 120 bpm = 4 beats, then 1 beat per second.
        assert!((seq.beats_at_time(2.0) - 4.0).abs() < 1e-12);
        assert!((seq.beats_at_time(5.0) - 7.0).abs() < 1e-12);
        assert!((seq.bpm_at_time(1.9) - 120.0).abs() < 1e-12);
        assert!((seq.bpm_at_time(2.0) - 60.0).abs() < 1e-12);
    }

    #[test]
    fn test_cursor_matches_direct_lookup() {
        let mut seq = TempoSequence::constant(90.0);
        seq.add_change(1.0, 180.0);
        seq.add_change(3.0, 120.0);
        let mut cursor = seq.cursor();
        for step in 0..50 {
            let t = step as f64 * 0.1;
            cursor.set_time(t);
            assert!((cursor.beats() - seq.beats_at_time(t)).abs() < 1e-9, "t={t}");
        }
        // Cursor also moves backwards.
        cursor.set_time(0.5);
        assert!((cursor.beats() - seq.beats_at_time(0.5)).abs() < 1e-9);
    }

    #[test]
    fn test_change_at_same_time_replaces() {
        let mut seq = TempoSequence::constant(120.0);
        seq.add_change(0.0, 100.0);
        assert_eq!(seq.changes().len(), 1);
        assert!((seq.bpm_at_time(0.0) - 100.0).abs() < 1e-12);
    }
}
