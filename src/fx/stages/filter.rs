use crate::fx::stages::common::flush_denormal;
use crate::fx::stages::{MAX_CHANNELS, ProcessSpec, Stage};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

#[derive(ValueEnum, Copy, Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FilterTopology {
    #[default]
    #[value(alias = "lp")]
    Lowpass,
    #[value(alias = "bp")]
    Bandpass,
    #[value(alias = "hp")]
    Highpass,
}

impl FilterTopology {
    /// Selector id as written by control surfaces.
    pub const fn id(self) -> i32 {
        match self {
            Self::Lowpass => 1,
            Self::Bandpass => 2,
            Self::Highpass => 3,
        }
    }

    /// Unknown ids fall back to lowpass so the filter path keeps producing audio.
    pub const fn from_id(id: i32) -> Self {
        match id {
            2 => Self::Bandpass,
            3 => Self::Highpass,
            _ => Self::Lowpass,
        }
    }
}

impl std::fmt::Display for FilterTopology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lowpass => write!(f, "Low Pass"),
            Self::Bandpass => write!(f, "Band Pass"),
            Self::Highpass => write!(f, "High Pass"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct SvfState {
    s1: f32,
    s2: f32,
}

/// Two-pole state variable filter using the topology-preserving transform.
///
/// Reference: <https://cytomic.com/files/dsp/SvfLinearTrapOptimised2.pdf>
pub struct FilterStage {
    topology: FilterTopology,
    cutoff: f32,
    resonance: f32,
    sample_rate: f32,
    // Per-sample coefficients
    g: f32,
    r2: f32,
    h: f32,
    state: [SvfState; MAX_CHANNELS],
}

impl FilterStage {
    /// Lowest cutoff accepted, matching the bottom of the control range.
    const MIN_CUTOFF_HZ: f32 = 20.0;
    /// Cutoff is kept below Nyquist so `tan` stays finite.
    const MAX_CUTOFF_RATIO: f32 = 0.49;
    /// Resonance floor that keeps the damping term finite.
    const MIN_RESONANCE: f32 = 0.1;

    pub fn new(topology: FilterTopology, cutoff: f32, resonance: f32, sample_rate: f32) -> Self {
        let mut stage = Self {
            topology,
            cutoff,
            resonance,
            sample_rate,
            g: 0.0,
            r2: 0.0,
            h: 0.0,
            state: [SvfState::default(); MAX_CHANNELS],
        };
        stage.update_coefficients();
        stage
    }

    pub const fn set_topology(&mut self, topology: FilterTopology) {
        self.topology = topology;
    }

    pub fn set_cutoff(&mut self, cutoff: f32) {
        if cutoff != self.cutoff {
            self.cutoff = cutoff;
            self.update_coefficients();
        }
    }

    pub fn set_resonance(&mut self, resonance: f32) {
        if resonance != self.resonance {
            self.resonance = resonance;
            self.update_coefficients();
        }
    }

    pub const fn topology(&self) -> FilterTopology {
        self.topology
    }

    pub const fn cutoff(&self) -> f32 {
        self.cutoff
    }

    pub const fn resonance(&self) -> f32 {
        self.resonance
    }

    fn update_coefficients(&mut self) {
        let max_cutoff = self.sample_rate * Self::MAX_CUTOFF_RATIO;
        let cutoff = if self.cutoff.is_nan() {
            Self::MIN_CUTOFF_HZ
        } else {
            self.cutoff
        };
        let cutoff = cutoff.clamp(Self::MIN_CUTOFF_HZ.min(max_cutoff), max_cutoff);
        let resonance = self.resonance.max(Self::MIN_RESONANCE);

        self.g = (PI * cutoff / self.sample_rate).tan();
        self.r2 = 1.0 / resonance;
        self.h = 1.0 / self.g.mul_add(self.g, self.r2.mul_add(self.g, 1.0));
    }

    fn flush_denormals(&mut self) {
        for state in &mut self.state {
            state.s1 = flush_denormal(state.s1);
            state.s2 = flush_denormal(state.s2);
        }
    }
}

impl Stage for FilterStage {
    fn prepare(&mut self, spec: &ProcessSpec) {
        self.sample_rate = spec.sample_rate;
        self.update_coefficients();
        self.reset();
    }

    #[inline]
    fn process_sample(&mut self, channel: usize, input: f32) -> f32 {
        let state = &mut self.state[channel];

        let hp = self.h * (input - (self.r2 + self.g) * state.s1 - state.s2);
        let bp = self.g.mul_add(hp, state.s1);
        state.s1 = self.g.mul_add(hp, bp);
        let lp = self.g.mul_add(bp, state.s2);
        state.s2 = self.g.mul_add(bp, lp);

        match self.topology {
            FilterTopology::Lowpass => lp,
            FilterTopology::Bandpass => bp,
            FilterTopology::Highpass => hp,
        }
    }

    fn process_block(&mut self, block: &mut [&mut [f32]]) {
        for (channel, samples) in block.iter_mut().take(MAX_CHANNELS).enumerate() {
            for sample in samples.iter_mut() {
                *sample = self.process_sample(channel, *sample);
            }
        }
        self.flush_denormals();
    }

    fn reset(&mut self) {
        self.state = [SvfState::default(); MAX_CHANNELS];
    }
}
