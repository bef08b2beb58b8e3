use anyhow::{Context, Result, bail};
use crossbeam::atomic::AtomicCell;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::fx::chain::SignalChain;
use crate::fx::stages::filter::FilterTopology;
use crate::fx::stages::{MAX_CHANNELS, ProcessSpec};
use crate::params::{ParamId, ParameterState, ParameterStore, ProcessingMode};

/// What any host shim (JACK client, offline renderer, plugin wrapper) needs
/// to drive the engine. Nothing in here depends on a host API.
pub trait AudioProcessor {
    /// Must be called before the first `process` and again whenever the
    /// sample rate or maximum block size changes. Clears all stage state.
    fn prepare(
        &mut self,
        sample_rate: f32,
        max_block_size: usize,
        output_channels: usize,
    ) -> Result<()>;

    fn reset(&mut self);

    /// Processes a planar block in place, one slice per output channel.
    fn process(&mut self, buffer: &mut [&mut [f32]]) -> Result<()>;

    fn get_parameter(&self, id: ParamId) -> f32;

    fn set_parameter(&self, id: ParamId, value: f32);

    fn get_state(&self) -> Result<Vec<u8>>;

    fn set_state(&self, data: &[u8]) -> Result<()>;
}

/// Channel counts negotiated with the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusLayout {
    pub input_channels: usize,
    pub output_channels: usize,
}

impl Default for BusLayout {
    fn default() -> Self {
        Self::STEREO
    }
}

impl BusLayout {
    pub const MONO: Self = Self::new(1, 1);
    pub const STEREO: Self = Self::new(2, 2);

    pub const fn new(input_channels: usize, output_channels: usize) -> Self {
        Self {
            input_channels,
            output_channels,
        }
    }

    /// Mono or stereo output, fed by at least one and at most as many inputs.
    pub const fn is_supported(&self) -> bool {
        self.output_channels >= 1
            && self.output_channels <= MAX_CHANNELS
            && self.input_channels >= 1
            && self.input_channels <= self.output_channels
    }
}

impl std::fmt::Display for BusLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} in / {} out", self.input_channels, self.output_channels)
    }
}

/// Lifecycle controller around the signal chain.
pub struct Engine {
    params: Arc<ParameterStore>,
    chain: SignalChain,
    layout: BusLayout,
    spec: Option<ProcessSpec>,
    /// De-interleaving buffers, sized in `prepare`.
    scratch: [Vec<f32>; MAX_CHANNELS],
    reset_requested: Arc<AtomicCell<bool>>,
}

/// Control-side access to the engine's parameters. Cheap to clone and safe to
/// use from any thread while the engine runs.
#[derive(Clone)]
pub struct EngineHandle {
    params: Arc<ParameterStore>,
    reset_requested: Arc<AtomicCell<bool>>,
}

impl Engine {
    pub fn new() -> (Self, EngineHandle) {
        Self::with_parameters(Arc::new(ParameterStore::new()))
    }

    pub fn with_parameters(params: Arc<ParameterStore>) -> (Self, EngineHandle) {
        let engine = Self {
            params,
            chain: SignalChain::default(),
            layout: BusLayout::default(),
            spec: None,
            scratch: std::array::from_fn(|_| Vec::new()),
            reset_requested: Arc::new(AtomicCell::new(false)),
        };
        let handle = engine.handle();
        (engine, handle)
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            params: Arc::clone(&self.params),
            reset_requested: Arc::clone(&self.reset_requested),
        }
    }

    /// Honors a reset requested from the control side, at a block boundary.
    fn apply_pending_reset(&mut self) {
        if self.reset_requested.swap(false) {
            self.chain.reset(&self.params);
        }
    }

    /// Host layout negotiation. Unsupported layouts are rejected and the
    /// previous layout stays in place.
    pub fn set_bus_layout(&mut self, layout: BusLayout) -> bool {
        if !layout.is_supported() {
            warn!("Rejecting unsupported bus layout: {layout}");
            return false;
        }

        debug!("Bus layout set to {layout}");
        self.layout = layout;
        true
    }

    pub const fn bus_layout(&self) -> BusLayout {
        self.layout
    }

    pub const fn spec(&self) -> Option<ProcessSpec> {
        self.spec
    }

    pub const fn is_prepared(&self) -> bool {
        self.spec.is_some()
    }

    /// Mode used by the most recently processed block.
    pub const fn active_mode(&self) -> ProcessingMode {
        self.chain.active_mode()
    }

    pub const fn chain(&self) -> &SignalChain {
        &self.chain
    }

    /// Processes interleaved audio in place, in chunks of at most the
    /// prepared block size.
    pub fn process_interleaved(&mut self, samples: &mut [f32], channels: usize) -> Result<()> {
        let Some(spec) = self.spec else {
            bail!("engine must be prepared before processing");
        };
        if channels == 0 || channels > spec.num_channels {
            bail!(
                "cannot process {channels} interleaved channels, prepared for {}",
                spec.num_channels
            );
        }
        if samples.len() % channels != 0 {
            bail!(
                "interleaved buffer of {} samples is not a multiple of {channels} channels",
                samples.len()
            );
        }

        self.apply_pending_reset();

        for chunk in samples.chunks_mut(spec.max_block_size * channels) {
            let frames = chunk.len() / channels;

            for (i, frame) in chunk.chunks_exact(channels).enumerate() {
                for (channel, &sample) in frame.iter().enumerate() {
                    self.scratch[channel][i] = sample;
                }
            }

            let mut block = self.scratch.each_mut().map(|ch| &mut ch[..frames]);
            Self::run_block(
                &mut self.chain,
                &self.params,
                self.layout.input_channels,
                &mut block[..channels],
            );

            for (i, frame) in chunk.chunks_exact_mut(channels).enumerate() {
                for (channel, sample) in frame.iter_mut().enumerate() {
                    *sample = self.scratch[channel][i];
                }
            }
        }

        Ok(())
    }

    fn run_block(
        chain: &mut SignalChain,
        params: &ParameterStore,
        input_channels: usize,
        block: &mut [&mut [f32]],
    ) {
        // Outputs without a matching input would otherwise carry stale data
        for channel in block.iter_mut().skip(input_channels) {
            channel.fill(0.0);
        }

        chain.process_block(params, block);
    }
}

impl AudioProcessor for Engine {
    fn prepare(
        &mut self,
        sample_rate: f32,
        max_block_size: usize,
        output_channels: usize,
    ) -> Result<()> {
        let spec = ProcessSpec::new(sample_rate, max_block_size, output_channels)
            .context("host supplied an invalid processing spec")?;

        for buffer in &mut self.scratch {
            buffer.resize(max_block_size, 0.0);
        }

        // The negotiated layout is left alone; a narrower prepare only limits
        // how many of its channels a block carries.
        self.chain.prepare(&spec);
        self.spec = Some(spec);
        self.reset();

        debug!(
            "Prepared engine: sample rate {sample_rate}, max block {max_block_size}, {output_channels} channels, layout {}",
            self.layout
        );

        Ok(())
    }

    fn reset(&mut self) {
        self.chain.reset(&self.params);
    }

    fn process(&mut self, buffer: &mut [&mut [f32]]) -> Result<()> {
        let Some(spec) = self.spec else {
            bail!("engine must be prepared before processing");
        };
        if buffer.len() > spec.num_channels {
            bail!(
                "buffer has {} channels, engine was prepared for {}",
                buffer.len(),
                spec.num_channels
            );
        }
        if let Some(frames) = buffer.iter().map(|ch| ch.len()).max()
            && frames > spec.max_block_size
        {
            bail!(
                "block of {frames} frames exceeds prepared maximum of {}",
                spec.max_block_size
            );
        }

        self.apply_pending_reset();

        Self::run_block(
            &mut self.chain,
            &self.params,
            self.layout.input_channels,
            buffer,
        );

        Ok(())
    }

    fn get_parameter(&self, id: ParamId) -> f32 {
        self.params.get(id)
    }

    fn set_parameter(&self, id: ParamId, value: f32) {
        self.params.set(id, value);
    }

    fn get_state(&self) -> Result<Vec<u8>> {
        self.params.snapshot().to_bytes()
    }

    fn set_state(&self, data: &[u8]) -> Result<()> {
        let state = ParameterState::from_bytes(data)?;
        self.params.restore(&state);
        Ok(())
    }
}

impl EngineHandle {
    pub fn parameters(&self) -> &ParameterStore {
        &self.params
    }

    pub fn get_parameter(&self, id: ParamId) -> f32 {
        self.params.get(id)
    }

    pub fn set_parameter(&self, id: ParamId, value: f32) {
        self.params.set(id, value);
    }

    pub fn mode(&self) -> ProcessingMode {
        self.params.mode()
    }

    pub fn set_mode(&self, mode: ProcessingMode) {
        debug!("Processing mode set to {mode}");
        self.params.set_mode(mode);
    }

    pub fn topology(&self) -> FilterTopology {
        self.params.topology()
    }

    pub fn set_topology(&self, topology: FilterTopology) {
        debug!("Filter topology set to {topology}");
        self.params.set_topology(topology);
    }

    pub fn snapshot(&self) -> ParameterState {
        self.params.snapshot()
    }

    pub fn restore(&self, state: &ParameterState) {
        self.params.restore(state);
    }

    /// Asks the audio thread to clear all stage state before its next block.
    pub fn request_reset(&self) {
        self.reset_requested.store(true);
    }
}
