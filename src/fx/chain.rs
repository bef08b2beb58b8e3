use crate::fx::stages::compressor::CompressorStage;
use crate::fx::stages::filter::FilterStage;
use crate::fx::stages::gain::GainStage;
use crate::fx::stages::{ProcessSpec, Stage};
use crate::params::{ParamId, ParameterStore, ProcessingMode};

/// Default rate used until the chain is prepared.
const DEFAULT_SAMPLE_RATE: f32 = 48_000.0;

// SignalChain owns one instance of every stage and picks the path per block.
pub struct SignalChain {
    filter: FilterStage,
    compressor: CompressorStage,
    gain: GainStage,
    active_mode: ProcessingMode,
}

impl Default for SignalChain {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE)
    }
}

impl SignalChain {
    pub fn new(sample_rate: f32) -> Self {
        let defaults = ParameterStore::new();
        Self {
            filter: FilterStage::new(
                defaults.topology(),
                defaults.get(ParamId::FilterFrequency),
                defaults.get(ParamId::FilterResonance),
                sample_rate,
            ),
            compressor: CompressorStage::new(
                defaults.get(ParamId::CompressorAttack),
                defaults.get(ParamId::CompressorRelease),
                defaults.get(ParamId::CompressorThreshold),
                defaults.get(ParamId::CompressorRatio),
                sample_rate,
            ),
            gain: GainStage::new(defaults.get(ParamId::GainGain), sample_rate),
            active_mode: defaults.mode(),
        }
    }

    pub fn prepare(&mut self, spec: &ProcessSpec) {
        self.filter.prepare(spec);
        self.compressor.prepare(spec);
        self.gain.prepare(spec);
    }

    /// Clears every stage regardless of which path is active.
    ///
    /// The gain lands on the stored value instead of ramping from whatever it
    /// last saw, so runs after a reset start from identical state.
    pub fn reset(&mut self, params: &ParameterStore) {
        self.gain.set_gain_decibels(params.get(ParamId::GainGain));
        self.filter.reset();
        self.compressor.reset();
        self.gain.reset();
    }

    /// Mode used by the most recent block.
    pub const fn active_mode(&self) -> ProcessingMode {
        self.active_mode
    }

    pub const fn filter(&self) -> &FilterStage {
        &self.filter
    }

    pub const fn compressor(&self) -> &CompressorStage {
        &self.compressor
    }

    pub const fn gain(&self) -> &GainStage {
        &self.gain
    }

    /// Runs one block through the path selected in `params`.
    ///
    /// The mode is read once, so a write landing mid-block only affects the
    /// next call. Parameters are re-applied every block; stages of the idle path
    /// keep their state untouched.
    pub fn process_block(&mut self, params: &ParameterStore, block: &mut [&mut [f32]]) {
        self.active_mode = params.mode();

        match self.active_mode {
            ProcessingMode::Filter => {
                self.filter.set_topology(params.topology());
                self.filter.set_cutoff(params.get(ParamId::FilterFrequency));
                self.filter.set_resonance(params.get(ParamId::FilterResonance));

                self.filter.process_block(block);
            }
            ProcessingMode::Compressor => {
                self.compressor.set_attack(params.get(ParamId::CompressorAttack));
                self.compressor.set_ratio(params.get(ParamId::CompressorRatio));
                self.compressor.set_release(params.get(ParamId::CompressorRelease));
                self.compressor.set_threshold(params.get(ParamId::CompressorThreshold));
                self.gain.set_gain_decibels(params.get(ParamId::GainGain));

                self.compressor.process_block(block);
                self.gain.process_block(block);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fx::stages::filter::FilterTopology;

    fn prepared_chain() -> SignalChain {
        let mut chain = SignalChain::default();
        chain.prepare(&ProcessSpec::new(48_000.0, 64, 1).unwrap());
        chain.reset(&ParameterStore::new());
        chain
    }

    #[test]
    fn parameters_are_applied_before_processing() {
        let params = ParameterStore::new();
        params.set_topology(FilterTopology::Highpass);
        params.set(ParamId::FilterFrequency, 2_500.0);
        params.set(ParamId::FilterResonance, 3.0);

        let mut chain = prepared_chain();
        let mut samples = vec![0.0f32; 64];
        chain.process_block(&params, &mut [&mut samples[..]]);

        assert_eq!(chain.filter().topology(), FilterTopology::Highpass);
        assert_eq!(chain.filter().cutoff(), 2_500.0);
        assert_eq!(chain.filter().resonance(), 3.0);
        assert_eq!(chain.active_mode(), ProcessingMode::Filter);
    }

    #[test]
    fn compressor_path_applies_gain_settings() {
        let params = ParameterStore::new();
        params.set_mode(ProcessingMode::Compressor);
        params.set(ParamId::CompressorThreshold, -20.0);
        params.set(ParamId::CompressorRatio, 4.0);
        params.set(ParamId::GainGain, 6.0);

        let mut chain = prepared_chain();
        let mut samples = vec![0.0f32; 64];
        chain.process_block(&params, &mut [&mut samples[..]]);

        assert_eq!(chain.compressor().threshold(), -20.0);
        assert_eq!(chain.compressor().ratio(), 4.0);
        assert_eq!(chain.gain().gain_decibels(), 6.0);
        // The filter keeps its construction settings while idle.
        assert_eq!(chain.filter().cutoff(), 400.0);
    }

    #[test]
    fn idle_path_keeps_its_state() {
        let params = ParameterStore::new();
        params.set(ParamId::FilterFrequency, 100.0);
        let mut chain = prepared_chain();

        let mut samples = vec![1.0f32; 64];
        chain.process_block(&params, &mut [&mut samples[..]]);

        params.set_mode(ProcessingMode::Compressor);
        let mut samples = vec![0.5f32; 64];
        chain.process_block(&params, &mut [&mut samples[..]]);

        // Back on the filter path, silence still rings from the earlier DC step.
        params.set_mode(ProcessingMode::Filter);
        let mut samples = vec![0.0f32; 64];
        chain.process_block(&params, &mut [&mut samples[..]]);
        assert!(samples.iter().any(|&x| x != 0.0));

        chain.reset(&params);
        let mut samples = vec![0.0f32; 64];
        chain.process_block(&params, &mut [&mut samples[..]]);
        assert!(samples.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn reset_snaps_gain_to_stored_value() {
        let params = ParameterStore::new();
        params.set_mode(ProcessingMode::Compressor);
        let mut chain = prepared_chain();

        params.set(ParamId::GainGain, 12.0);
        chain.reset(&params);
        assert_eq!(chain.gain().gain_decibels(), 12.0);
        assert!(!chain.gain().is_smoothing());

        let mut samples = vec![0.1f32; 64];
        chain.process_block(&params, &mut [&mut samples[..]]);
        assert!(samples.iter().all(|&x| x == samples[0]));
    }
}
