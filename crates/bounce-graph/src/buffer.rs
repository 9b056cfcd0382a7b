//! Multi-channel audio block buffers.
//!
//! Each node owns one output buffer sized for the largest block at prepare
//! time. `begin_block` reuses that storage every block, so the steady-state
//! processing path never allocates.

/// A non-interleaved multi-channel buffer of `f32` samples.
///
/// Storage is allocated once for a maximum block size; the active frame
/// count varies per block via [`AudioBuffer::begin_block`].
#[derive(Debug, Default, Clone)]
pub struct AudioBuffer {
    data: Vec<f32>,
    channels: usize,
    capacity_frames: usize,
    frames: usize,
}

impl AudioBuffer {
    /// Create a buffer with storage for `channels` x `max_frames` samples.
    pub fn with_capacity(channels: usize, max_frames: usize) -> Self {
        let mut buffer = Self::default();
        buffer.allocate(channels, max_frames);
        buffer
    }

    /// Resize the backing storage. Clears all samples.
    pub fn allocate(&mut self, channels: usize, max_frames: usize) {
        self.channels = channels;
        self.capacity_frames = max_frames;
        self.frames = 0;
        self.data.clear();
        self.data.resize(channels * max_frames, 0.0);
    }

    /// Start a new block of `frames` samples, zeroing the active region.
    ///
    /// Frames beyond the allocated capacity are dropped.
    pub fn begin_block(&mut self, frames: usize) {
        self.frames = frames.min(self.capacity_frames);
        for channel in 0..self.channels {
            let base = channel * self.capacity_frames;
            self.data[base..base + self.frames].fill(0.0);
        }
    }

    /// Number of channels in the buffer.
    pub fn num_channels(&self) -> usize {
        self.channels
    }

    /// Number of frames in the current block.
    pub fn num_frames(&self) -> usize {
        self.frames
    }

    /// Read access to one channel of the current block.
    pub fn channel(&self, channel: usize) -> &[f32] {
        let base = channel * self.capacity_frames;
        &self.data[base..base + self.frames]
    }

    /// Write access to one channel of the current block.
    pub fn channel_mut(&mut self, channel: usize) -> &mut [f32] {
        let base = channel * self.capacity_frames;
        &mut self.data[base..base + self.frames]
    }

    /// Copy samples from `other`, capped to the common channel and frame
    /// counts. Channels this buffer has but `other` lacks keep their
    /// current contents.
    pub fn copy_from(&mut self, other: &AudioBuffer) {
        let channels = self.channels.min(other.channels);
        let frames = self.frames.min(other.frames);
        for c in 0..channels {
            self.channel_mut(c)[..frames].copy_from_slice(&other.channel(c)[..frames]);
        }
    }

    /// Add samples from `other` into this buffer, capped to the common
    /// channel and frame counts. Missing channels contribute silence.
    pub fn accumulate_from(&mut self, other: &AudioBuffer) {
        let channels = self.channels.min(other.channels);
        let frames = self.frames.min(other.frames);
        for c in 0..channels {
            let src = other.channel(c);
            let dest = self.channel_mut(c);
            for i in 0..frames {
                dest[i] += src[i];
            }
        }
    }

    /// Peak absolute sample value across all channels of the current block.
    pub fn peak(&self) -> f32 {
        self.peak_region(0, self.frames)
    }

    /// Peak absolute sample value over `frames` samples starting at `offset`.
    pub fn peak_region(&self, offset: usize, frames: usize) -> f32 {
        let mut peak = 0.0f32;
        for c in 0..self.channels {
            for &s in &self.channel(c)[offset..offset + frames] {
                peak = peak.max(s.abs());
            }
        }
        peak
    }

    /// RMS level of one channel over `frames` samples starting at `offset`.
    pub fn rms_region(&self, channel: usize, offset: usize, frames: usize) -> f32 {
        if frames == 0 {
            return 0.0;
        }
        let mut sum = 0.0f64;
        for &s in &self.channel(channel)[offset..offset + frames] {
            sum += f64::from(s) * f64::from(s);
        }
        (sum / frames as f64).sqrt() as f32
    }

    /// Largest absolute sample value across channels at frame `index`.
    pub fn frame_magnitude(&self, index: usize) -> f32 {
        let mut mag = 0.0f32;
        for c in 0..self.channels {
            mag = mag.max(self.channel(c)[index].abs());
        }
        mag
    }
}
