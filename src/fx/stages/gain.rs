use crate::fx::stages::common::{LinearSmoother, db_to_lin};
use crate::fx::stages::{ProcessSpec, Stage};

/// Ramp time for gain changes, long enough to avoid zipper noise.
const RAMP_SECONDS: f32 = 0.05;

pub struct GainStage {
    gain_db: f32,
    gain: LinearSmoother,
}

impl GainStage {
    pub fn new(gain_db: f32, sample_rate: f32) -> Self {
        let mut gain = LinearSmoother::new(db_to_lin(gain_db));
        gain.set_ramp(RAMP_SECONDS, sample_rate);
        Self { gain_db, gain }
    }

    pub fn set_gain_decibels(&mut self, gain_db: f32) {
        let gain_db = if gain_db.is_finite() { gain_db } else { 0.0 };
        if gain_db != self.gain_db {
            self.gain_db = gain_db;
            self.gain.set_target(db_to_lin(gain_db));
        }
    }

    pub const fn gain_decibels(&self) -> f32 {
        self.gain_db
    }

    /// Linear factor currently applied, which lags the target while ramping.
    pub const fn current_gain(&self) -> f32 {
        self.gain.current()
    }

    pub const fn is_smoothing(&self) -> bool {
        self.gain.is_smoothing()
    }
}

impl Stage for GainStage {
    fn prepare(&mut self, spec: &ProcessSpec) {
        self.gain.set_ramp(RAMP_SECONDS, spec.sample_rate);
    }

    // Every call counts as one frame, so this is only meant for mono use
    #[inline]
    fn process_sample(&mut self, _channel: usize, input: f32) -> f32 {
        input * self.gain.next_value()
    }

    fn process_block(&mut self, block: &mut [&mut [f32]]) {
        let frames = block.iter().map(|ch| ch.len()).max().unwrap_or(0);

        if !self.gain.is_smoothing() {
            let gain = self.gain.target();
            for channel in block.iter_mut() {
                for sample in channel.iter_mut() {
                    *sample *= gain;
                }
            }
            return;
        }

        for i in 0..frames {
            let gain = self.gain.next_value();
            for channel in block.iter_mut() {
                if let Some(sample) = channel.get_mut(i) {
                    *sample *= gain;
                }
            }
        }
    }

    fn reset(&mut self) {
        self.gain.snap_to_target();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48_000.0;

    #[test]
    fn test_gain_stage() {
        let mut stage = GainStage::new(0.0, SR);
        assert_eq!(stage.process_sample(0, 1.0), 1.0);

        stage.set_gain_decibels(20.0);
        stage.reset();
        assert!((stage.process_sample(0, 1.0) - 10.0).abs() < 1e-4);

        stage.set_gain_decibels(-6.0);
        stage.reset();
        assert!((stage.process_sample(0, 1.0) - 0.501).abs() < 1e-3);
    }

    #[test]
    fn gain_changes_are_ramped_across_blocks() {
        let mut stage = GainStage::new(0.0, SR);
        stage.set_gain_decibels(20.0);

        let mut left = vec![1.0f32; 256];
        let mut right = vec![1.0f32; 256];
        stage.process_block(&mut [&mut left[..], &mut right[..]]);

        assert!(left[0] > 1.0 && left[0] < 1.1, "no ramp: {}", left[0]);
        assert!(left.windows(2).all(|w| w[1] > w[0]));
        assert_eq!(left, right);

        // 50 ms at 48 kHz is 2400 samples.
        for _ in 0..10 {
            left.fill(1.0);
            right.fill(1.0);
            stage.process_block(&mut [&mut left[..], &mut right[..]]);
        }
        assert!((left[255] - 10.0).abs() < 1e-3);
        assert!((stage.current_gain() - 10.0).abs() < 1e-3);
    }

    #[test]
    fn prepare_does_not_drop_pending_target() {
        let mut stage = GainStage::new(0.0, SR);
        stage.set_gain_decibels(6.0);
        stage.prepare(&ProcessSpec::new(44_100.0, 64, 1).unwrap());
        assert!((stage.current_gain() - db_to_lin(6.0)).abs() < 1e-6);
        assert_eq!(stage.gain_decibels(), 6.0);
    }
}
