//! Offline measurement helpers used by the CLI and the tests.

use anyhow::{Result, bail};
use realfft::RealFftPlanner;
use std::f32::consts::PI;

use crate::fx::stages::common::lin_to_db;
use crate::fx::stages::filter::{FilterStage, FilterTopology};
use crate::fx::stages::{ProcessSpec, Stage};

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|x| x * x).sum::<f32>() / samples.len() as f32).sqrt()
}

pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
}

pub fn rms_db(samples: &[f32]) -> f32 {
    lin_to_db(rms(samples))
}

pub fn peak_db(samples: &[f32]) -> f32 {
    lin_to_db(peak(samples))
}

pub fn sine(frequency: f32, amplitude: f32, sample_rate: f32, len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| amplitude * (2.0 * PI * frequency * i as f32 / sample_rate).sin())
        .collect()
}

/// Magnitude response computed from the FFT of an impulse response.
pub struct FrequencyResponse {
    sample_rate: f32,
    fft_size: usize,
    magnitudes: Vec<f32>,
}

impl FrequencyResponse {
    pub fn from_impulse_response(impulse_response: &[f32], sample_rate: f32) -> Result<Self> {
        let fft_size = impulse_response.len();
        if fft_size < 2 || !fft_size.is_power_of_two() {
            bail!("FFT size must be a power of two of at least 2, got {fft_size}");
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let r2c = planner.plan_fft_forward(fft_size);
        let mut input = impulse_response.to_vec();
        let mut spectrum = r2c.make_output_vec();

        r2c.process(&mut input, &mut spectrum)
            .map_err(|e| anyhow::anyhow!("FFT failed while measuring response: {e}"))?;

        Ok(Self {
            sample_rate,
            fft_size,
            magnitudes: spectrum.iter().map(|c| c.norm()).collect(),
        })
    }

    /// Measures a freshly prepared filter with the given settings.
    pub fn of_filter(
        topology: FilterTopology,
        cutoff: f32,
        resonance: f32,
        sample_rate: f32,
        fft_size: usize,
    ) -> Result<Self> {
        let spec = ProcessSpec::new(sample_rate, fft_size, 1)?;
        let mut filter = FilterStage::new(topology, cutoff, resonance, sample_rate);
        filter.prepare(&spec);

        let mut impulse = vec![0.0f32; fft_size];
        if let Some(first) = impulse.first_mut() {
            *first = 1.0;
        }
        filter.process_block(&mut [&mut impulse[..]]);

        Self::from_impulse_response(&impulse, sample_rate)
    }

    pub const fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn bin_frequency(&self, bin: usize) -> f32 {
        bin as f32 * self.sample_rate / self.fft_size as f32
    }

    /// Linear magnitude at the bin nearest to `frequency`.
    pub fn magnitude_at(&self, frequency: f32) -> f32 {
        let bin = (frequency * self.fft_size as f32 / self.sample_rate).round() as usize;
        self.magnitudes[bin.min(self.magnitudes.len() - 1)]
    }

    pub fn magnitude_db_at(&self, frequency: f32) -> f32 {
        lin_to_db(self.magnitude_at(frequency))
    }

    /// Octave-spaced points from 31.25 Hz up to Nyquist.
    pub fn octave_points(&self) -> Vec<(f32, f32)> {
        let nyquist = self.sample_rate / 2.0;
        std::iter::successors(Some(31.25f32), |f| Some(f * 2.0))
            .take_while(|&f| f < nyquist)
            .map(|f| (f, self.magnitude_db_at(f)))
            .collect()
    }
}
