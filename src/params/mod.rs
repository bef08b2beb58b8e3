//! Parameter store shared between control surfaces and the audio thread.
//!
//! Every control is a single lock-free cell with "last write wins" semantics.
//! The audio thread reads each cell once per block, so a write shows up at the
//! first block boundary after it lands and never blocks either side.

use anyhow::{Result, anyhow};
use clap::ValueEnum;
use crossbeam::atomic::AtomicCell;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::fx::stages::filter::FilterTopology;

pub mod state;

pub use state::ParameterState;

/// Top-level selector choosing which stage sequence runs.
#[derive(ValueEnum, Copy, Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    #[default]
    Filter,
    Compressor,
}

impl ProcessingMode {
    pub const fn id(self) -> i32 {
        match self {
            Self::Filter => 1,
            Self::Compressor => 2,
        }
    }

    /// Unknown ids fall back to the filter path so audio is never dropped.
    pub const fn from_id(id: i32) -> Self {
        match id {
            2 => Self::Compressor,
            _ => Self::Filter,
        }
    }
}

impl std::fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Filter => write!(f, "Filter"),
            Self::Compressor => write!(f, "Compressor"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ParamId {
    FilterFrequency,
    FilterResonance,
    CompressorAttack,
    CompressorRatio,
    CompressorRelease,
    CompressorThreshold,
    GainGain,
}

impl ParamId {
    pub const COUNT: usize = 7;

    pub const ALL: [Self; Self::COUNT] = [
        Self::FilterFrequency,
        Self::FilterResonance,
        Self::CompressorAttack,
        Self::CompressorRatio,
        Self::CompressorRelease,
        Self::CompressorThreshold,
        Self::GainGain,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::FilterFrequency => "filter_frequency",
            Self::FilterResonance => "filter_resonance",
            Self::CompressorAttack => "compressor_attack",
            Self::CompressorRatio => "compressor_ratio",
            Self::CompressorRelease => "compressor_release",
            Self::CompressorThreshold => "compressor_threshold",
            Self::GainGain => "gain_gain",
        }
    }

    pub const fn unit(self) -> &'static str {
        match self {
            Self::FilterFrequency => "Hz",
            Self::CompressorAttack | Self::CompressorRelease => "ms",
            Self::CompressorThreshold | Self::GainGain => "dB",
            Self::FilterResonance | Self::CompressorRatio => "",
        }
    }

    pub const fn range(self) -> RangeInclusive<f32> {
        match self {
            Self::FilterFrequency => 20.0..=20_000.0,
            Self::FilterResonance => 1.0..=10.0,
            Self::CompressorAttack => 0.01..=300.0,
            Self::CompressorRatio => 1.0..=10.0,
            Self::CompressorRelease => 5.0..=4_000.0,
            Self::CompressorThreshold => -30.0..=0.0,
            Self::GainGain => 0.0..=20.0,
        }
    }

    // Attack and release start at 0 ms, outside their control range; the
    // compressor treats that as instantaneous.
    pub const fn default_value(self) -> f32 {
        match self {
            Self::FilterFrequency => 400.0,
            Self::FilterResonance => 1.0,
            Self::CompressorAttack => 0.0,
            Self::CompressorRatio => 1.0,
            Self::CompressorRelease => 0.0,
            Self::CompressorThreshold => 0.0,
            Self::GainGain => 0.0,
        }
    }

    /// Clamp into the control range; NaN becomes the default.
    pub fn clamp(self, value: f32) -> f32 {
        if value.is_nan() {
            return self.default_value();
        }
        let range = self.range();
        value.clamp(*range.start(), *range.end())
    }
}

impl std::fmt::Display for ParamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ParamId {
    type Err = anyhow::Error;

    // Accepts snake_case, kebab-case and camelCase spellings.
    fn from_str(s: &str) -> Result<Self> {
        let key: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();

        Self::ALL
            .into_iter()
            .find(|id| id.name().replace('_', "") == key)
            .ok_or_else(|| anyhow!("unknown parameter '{s}'"))
    }
}

/// Current user-set values for every control and selector.
pub struct ParameterStore {
    values: [AtomicCell<f32>; ParamId::COUNT],
    mode: AtomicCell<i32>,
    topology: AtomicCell<i32>,
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterStore {
    pub fn new() -> Self {
        Self {
            values: std::array::from_fn(|i| AtomicCell::new(ParamId::ALL[i].default_value())),
            mode: AtomicCell::new(ProcessingMode::default().id()),
            topology: AtomicCell::new(FilterTopology::default().id()),
        }
    }

    #[inline]
    pub fn get(&self, id: ParamId) -> f32 {
        self.values[id.index()].load()
    }

    /// Stores the value as given; range checking is the caller's job.
    #[inline]
    pub fn set(&self, id: ParamId, value: f32) {
        self.values[id.index()].store(value);
    }

    pub fn set_clamped(&self, id: ParamId, value: f32) -> f32 {
        let value = id.clamp(value);
        self.set(id, value);
        value
    }

    pub fn set_by_name(&self, name: &str, value: f32) -> Result<ParamId> {
        let id = name.parse::<ParamId>()?;
        self.set(id, value);
        Ok(id)
    }

    #[inline]
    pub fn mode(&self) -> ProcessingMode {
        ProcessingMode::from_id(self.mode.load())
    }

    pub fn mode_id(&self) -> i32 {
        self.mode.load()
    }

    pub fn set_mode(&self, mode: ProcessingMode) {
        self.mode.store(mode.id());
    }

    /// Raw selector write, as done by id-based control surfaces.
    pub fn set_mode_id(&self, id: i32) {
        self.mode.store(id);
    }

    #[inline]
    pub fn topology(&self) -> FilterTopology {
        FilterTopology::from_id(self.topology.load())
    }

    pub fn topology_id(&self) -> i32 {
        self.topology.load()
    }

    pub fn set_topology(&self, topology: FilterTopology) {
        self.topology.store(topology.id());
    }

    pub fn set_topology_id(&self, id: i32) {
        self.topology.store(id);
    }

    pub fn snapshot(&self) -> ParameterState {
        let mut state = ParameterState {
            mode: self.mode(),
            topology: self.topology(),
            ..ParameterState::default()
        };
        for id in ParamId::ALL {
            state.set(id, self.get(id));
        }
        state
    }

    pub fn restore(&self, state: &ParameterState) {
        for id in ParamId::ALL {
            self.set(id, state.get(id));
        }
        self.set_mode(state.mode);
        self.set_topology(state.topology);
    }

    pub fn reset_to_defaults(&self) {
        self.restore(&ParameterState::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn defaults_match_the_parameter_table() {
        let store = ParameterStore::new();
        assert_eq!(store.get(ParamId::FilterFrequency), 400.0);
        assert_eq!(store.get(ParamId::FilterResonance), 1.0);
        assert_eq!(store.get(ParamId::CompressorRatio), 1.0);
        assert_eq!(store.get(ParamId::GainGain), 0.0);
        assert_eq!(store.mode(), ProcessingMode::Filter);
        assert_eq!(store.topology(), FilterTopology::Lowpass);
    }

    #[test]
    fn store_does_not_validate() {
        let store = ParameterStore::new();
        store.set(ParamId::FilterFrequency, 50_000.0);
        assert_eq!(store.get(ParamId::FilterFrequency), 50_000.0);

        assert_eq!(store.set_clamped(ParamId::FilterFrequency, 50_000.0), 20_000.0);
        assert_eq!(store.set_clamped(ParamId::CompressorThreshold, f32::NAN), 0.0);
    }

    #[test]
    fn unrecognized_selector_ids_fall_back_to_first_variant() {
        let store = ParameterStore::new();
        store.set_mode_id(2);
        assert_eq!(store.mode(), ProcessingMode::Compressor);
        store.set_mode_id(7);
        assert_eq!(store.mode(), ProcessingMode::Filter);
        assert_eq!(store.mode_id(), 7);

        store.set_topology_id(3);
        assert_eq!(store.topology(), FilterTopology::Highpass);
        store.set_topology_id(-1);
        assert_eq!(store.topology(), FilterTopology::Lowpass);
    }

    #[test]
    fn names_parse_in_any_spelling() {
        assert_eq!("filter_frequency".parse::<ParamId>().unwrap(), ParamId::FilterFrequency);
        assert_eq!("filterFrequency".parse::<ParamId>().unwrap(), ParamId::FilterFrequency);
        assert_eq!("gain-gain".parse::<ParamId>().unwrap(), ParamId::GainGain);
        assert!("cutoff".parse::<ParamId>().is_err());
        for id in ParamId::ALL {
            assert_eq!(id.name().parse::<ParamId>().unwrap(), id);
        }
    }

    #[test]
    fn snapshot_restore_round_trips_every_field() {
        let store = ParameterStore::new();
        store.set_mode(ProcessingMode::Compressor);
        store.set_topology(FilterTopology::Bandpass);
        store.set(ParamId::CompressorThreshold, -12.0);
        store.set(ParamId::CompressorAttack, 3.5);

        let other = ParameterStore::new();
        other.restore(&store.snapshot());
        assert_eq!(other.snapshot(), store.snapshot());

        other.reset_to_defaults();
        assert_eq!(other.snapshot(), ParameterState::default());
    }

    #[test]
    fn writes_from_another_thread_are_observed() {
        let store = Arc::new(ParameterStore::new());
        let writer = Arc::clone(&store);

        thread::spawn(move || {
            for i in 0..1_000 {
                writer.set(ParamId::FilterFrequency, 20.0 + i as f32);
            }
            writer.set_mode(ProcessingMode::Compressor);
        })
        .join()
        .unwrap();

        assert_eq!(store.get(ParamId::FilterFrequency), 1_019.0);
        assert_eq!(store.mode(), ProcessingMode::Compressor);
    }
}
