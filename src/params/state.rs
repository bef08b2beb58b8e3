use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use super::{ParamId, ProcessingMode};
use crate::fx::stages::filter::FilterTopology;

/// Layout version written by this build.
pub const STATE_VERSION: u32 = 1;

/// Serializable snapshot of every parameter and selector.
///
/// Fields missing from older documents fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterState {
    pub version: u32,
    pub mode: ProcessingMode,
    pub topology: FilterTopology,
    pub filter_frequency: f32,
    pub filter_resonance: f32,
    pub compressor_attack: f32,
    pub compressor_ratio: f32,
    pub compressor_release: f32,
    pub compressor_threshold: f32,
    pub gain_gain: f32,
}

impl Default for ParameterState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            mode: ProcessingMode::default(),
            topology: FilterTopology::default(),
            filter_frequency: ParamId::FilterFrequency.default_value(),
            filter_resonance: ParamId::FilterResonance.default_value(),
            compressor_attack: ParamId::CompressorAttack.default_value(),
            compressor_ratio: ParamId::CompressorRatio.default_value(),
            compressor_release: ParamId::CompressorRelease.default_value(),
            compressor_threshold: ParamId::CompressorThreshold.default_value(),
            gain_gain: ParamId::GainGain.default_value(),
        }
    }
}

impl std::fmt::Display for ParameterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Mode: {}", self.mode)?;
        writeln!(f, "Filter Type: {}", self.topology)?;
        for id in ParamId::ALL {
            writeln!(f, "{}: {} {}", id.name(), self.get(id), id.unit())?;
        }
        Ok(())
    }
}

impl ParameterState {
    pub const fn get(&self, id: ParamId) -> f32 {
        match id {
            ParamId::FilterFrequency => self.filter_frequency,
            ParamId::FilterResonance => self.filter_resonance,
            ParamId::CompressorAttack => self.compressor_attack,
            ParamId::CompressorRatio => self.compressor_ratio,
            ParamId::CompressorRelease => self.compressor_release,
            ParamId::CompressorThreshold => self.compressor_threshold,
            ParamId::GainGain => self.gain_gain,
        }
    }

    pub const fn set(&mut self, id: ParamId, value: f32) {
        match id {
            ParamId::FilterFrequency => self.filter_frequency = value,
            ParamId::FilterResonance => self.filter_resonance = value,
            ParamId::CompressorAttack => self.compressor_attack = value,
            ParamId::CompressorRatio => self.compressor_ratio = value,
            ParamId::CompressorRelease => self.compressor_release = value,
            ParamId::CompressorThreshold => self.compressor_threshold = value,
            ParamId::GainGain => self.gain_gain = value,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize parameter state")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let state: Self = serde_json::from_str(json).context("Failed to parse parameter state")?;
        state.check_version()?;
        Ok(state)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).context("Failed to serialize parameter state")
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let state: Self =
            serde_json::from_slice(bytes).context("Failed to parse parameter state")?;
        state.check_version()?;
        Ok(state)
    }

    pub fn check_version(&self) -> Result<()> {
        if self.version == 0 || self.version > STATE_VERSION {
            bail!(
                "unsupported parameter state version {} (expected 1..={STATE_VERSION})",
                self.version
            );
        }
        Ok(())
    }
}
