//! Playhead transport state shared by every node in a tree.

use crate::time::SampleRange;

/// The transport position driving a node tree.
///
/// The render driver owns the playhead; nodes only ever see the derived
/// per-block [`PlayHeadState`].
#[derive(Clone, Debug, Default)]
pub struct PlayHead {
    position: i64,
    play_range: Option<SampleRange>,
}

impl PlayHead {
    /// A stopped playhead at sample zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// True while playback is running.
    pub fn is_playing(&self) -> bool {
        self.play_range.is_some()
    }

    /// Current sample position on the reference timeline.
    pub fn position(&self) -> i64 {
        self.position
    }

    /// The range playback was synced to, if playing.
    pub fn play_range(&self) -> Option<SampleRange> {
        self.play_range
    }

    /// Stop playback, keeping the current position.
    pub fn stop(&mut self) {
        self.play_range = None;
    }

    /// Move the playhead while stopped.
    ///
    /// Repositioning during playback is ignored; stop first, then seek.
    pub fn set_position(&mut self, sample: i64) {
        if self.is_playing() {
            tracing::warn!(sample, "ignoring set_position while playing");
            return;
        }
        self.position = sample;
    }

    /// Start playback locked to `range`, jumping to its start.
    pub fn play_synced_to_range(&mut self, range: SampleRange) {
        self.position = range.start;
        self.play_range = Some(range);
    }
}

/// Per-block snapshot of the playhead, recomputed once per block and
/// passed by value to every node.
///
/// The contiguity flag tells time-dependent nodes whether the current
/// block continues straight on from the previous one; when it does not
/// (a seek, a stop/start, or the first block) they must resynchronize
/// their internal position from the block's sample range.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlayHeadState {
    range: SampleRange,
    contiguous: bool,
    previous_end: Option<i64>,
    was_playing: bool,
}

impl PlayHeadState {
    /// State for a transport that has not produced a block yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute the snapshot for the block covering `block`.
    pub fn update(&mut self, play_head: &PlayHead, block: SampleRange) {
        let playing = play_head.is_playing();
        self.contiguous = playing && self.was_playing && self.previous_end == Some(block.start);
        self.range = block;
        self.previous_end = Some(block.end);
        self.was_playing = playing;
    }

    /// The sample range of the current block.
    pub fn range(&self) -> SampleRange {
        self.range
    }

    /// True when the current block follows on directly from the previous
    /// block with playback running throughout.
    pub fn is_contiguous_with_previous_block(&self) -> bool {
        self.contiguous
    }

    /// True when playback was running for the current block.
    pub fn is_playing(&self) -> bool {
        self.was_playing
    }
}
