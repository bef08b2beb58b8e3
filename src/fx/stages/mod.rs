use anyhow::{Result, bail};

pub mod common;
pub mod compressor;
pub mod filter;
pub mod gain;

/// Stages keep fixed per-channel state, so only mono and stereo are supported.
pub const MAX_CHANNELS: usize = 2;

/// Sample rate, maximum block size and channel count for a prepared session.
///
/// Stages derive every time-constant coefficient from this, so it has to be
/// re-supplied whenever the host changes any of these values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessSpec {
    pub sample_rate: f32,
    pub max_block_size: usize,
    pub num_channels: usize,
}

impl ProcessSpec {
    pub fn new(sample_rate: f32, max_block_size: usize, num_channels: usize) -> Result<Self> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            bail!("sample rate must be positive, got {sample_rate}");
        }
        if max_block_size == 0 {
            bail!("maximum block size must be at least one sample");
        }
        if num_channels > MAX_CHANNELS {
            bail!("{num_channels} channels requested, at most {MAX_CHANNELS} are supported");
        }

        Ok(Self {
            sample_rate,
            max_block_size,
            num_channels,
        })
    }
}

// The core trait that all processing stages must implement
pub trait Stage: Send + 'static {
    // Size internal state for the given session; coefficients are recomputed
    fn prepare(&mut self, spec: &ProcessSpec);

    // Process a single sample of the given channel
    fn process_sample(&mut self, channel: usize, input: f32) -> f32;

    // Process a planar block in place, one slice per channel
    fn process_block(&mut self, block: &mut [&mut [f32]]) {
        for (channel, samples) in block.iter_mut().take(MAX_CHANNELS).enumerate() {
            for sample in samples.iter_mut() {
                *sample = self.process_sample(channel, *sample);
            }
        }
    }

    // Clear all internal state, leaving the settings untouched
    fn reset(&mut self);
}
