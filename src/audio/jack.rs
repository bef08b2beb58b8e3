use anyhow::{Context, Result};
use assert_no_alloc::assert_no_alloc;
use jack::Client;
use log::{debug, error, warn};

use crate::audio::engine::{AudioProcessor, BusLayout, Engine};
use crate::audio::ports::Ports;

pub struct NotificationHandler;

pub struct ProcessHandler {
    ports: Ports,
    audio_engine: Engine,
    sample_rate: usize,
}

impl jack::NotificationHandler for NotificationHandler {
    fn sample_rate(&mut self, _: &Client, sample_rate: jack::Frames) -> jack::Control {
        debug!(">> JACK sample_rate changed to {sample_rate}");

        jack::Control::Continue
    }
}

impl ProcessHandler {
    pub fn new(client: &Client, mut audio_engine: Engine) -> Result<Self> {
        let ports = Ports::new(client).context("failed to create audio ports")?;
        let sample_rate = client.sample_rate() as usize;

        audio_engine.set_bus_layout(BusLayout::STEREO);
        audio_engine
            .prepare(sample_rate as f32, client.buffer_size() as usize, 2)
            .context("failed to prepare engine")?;

        Ok(Self {
            ports,
            audio_engine,
            sample_rate,
        })
    }

    fn reprepare(&mut self, sample_rate: usize, buffer_size: usize) {
        self.sample_rate = sample_rate;
        if let Err(e) = self
            .audio_engine
            .prepare(sample_rate as f32, buffer_size, 2)
        {
            error!("Failed to prepare engine: {e}");
        }
    }
}

impl jack::ProcessHandler for ProcessHandler {
    fn process(&mut self, client: &jack::Client, ps: &jack::ProcessScope) -> jack::Control {
        let sample_rate = client.sample_rate() as usize;
        if sample_rate != self.sample_rate {
            warn!("sample rate changed to {sample_rate}, preparing engine again");
            self.reprepare(sample_rate, ps.n_frames() as usize);
        }

        let mut block = self.ports.pass_through(ps);
        let engine = &mut self.audio_engine;
        let result = assert_no_alloc(|| engine.process(&mut block));

        if let Err(e) = result {
            error!("Audio processing error: {e}");
            self.ports.silence_output(ps);
        }

        jack::Control::Continue
    }

    fn buffer_size(&mut self, client: &jack::Client, frames: jack::Frames) -> jack::Control {
        debug!(">> JACK buffer_size changed to {frames} frames");

        self.reprepare(client.sample_rate() as usize, frames as usize);

        jack::Control::Continue
    }
}
