use crate::fx::stages::common::{EnvelopeFollower, calculate_coefficient, db_to_lin};
use crate::fx::stages::{MAX_CHANNELS, ProcessSpec, Stage};

/// Feed-forward peak compressor with one envelope follower per channel.
pub struct CompressorStage {
    attack_ms: f32,   // Attack time in milliseconds
    release_ms: f32,  // Release time in milliseconds
    threshold_db: f32,
    threshold: f32,   // Threshold in linear scale
    ratio: f32,       // Compression ratio (e.g., 4.0 for 4:1)
    ratio_exponent: f32,
    envelopes: [EnvelopeFollower; MAX_CHANNELS],
    sample_rate: f32,
}

impl CompressorStage {
    pub fn new(
        attack_ms: f32,
        release_ms: f32,
        threshold_db: f32,
        ratio: f32,
        sample_rate: f32,
    ) -> Self {
        let mut stage = Self {
            attack_ms,
            release_ms,
            threshold_db,
            threshold: db_to_lin(threshold_db),
            ratio: 1.0,
            ratio_exponent: 0.0,
            envelopes: [EnvelopeFollower::from_ms(attack_ms, release_ms, sample_rate);
                MAX_CHANNELS],
            sample_rate,
        };
        stage.set_ratio(ratio);
        stage
    }

    pub fn set_attack(&mut self, attack_ms: f32) {
        if attack_ms == self.attack_ms {
            return;
        }
        self.attack_ms = attack_ms;
        let coeff = calculate_coefficient(attack_ms, self.sample_rate);
        for env in &mut self.envelopes {
            env.set_attack_coeff(coeff);
        }
    }

    pub fn set_release(&mut self, release_ms: f32) {
        if release_ms == self.release_ms {
            return;
        }
        self.release_ms = release_ms;
        let coeff = calculate_coefficient(release_ms, self.sample_rate);
        for env in &mut self.envelopes {
            env.set_release_coeff(coeff);
        }
    }

    pub fn set_threshold(&mut self, threshold_db: f32) {
        if threshold_db != self.threshold_db {
            self.threshold_db = threshold_db;
            self.threshold = db_to_lin(threshold_db);
        }
    }

    /// Ratios below 1:1 would expand, so they are treated as 1:1.
    pub fn set_ratio(&mut self, ratio: f32) {
        self.ratio = ratio.max(1.0);
        self.ratio_exponent = self.ratio.recip() - 1.0;
    }

    pub const fn attack(&self) -> f32 {
        self.attack_ms
    }

    pub const fn release(&self) -> f32 {
        self.release_ms
    }

    pub const fn threshold(&self) -> f32 {
        self.threshold_db
    }

    pub const fn ratio(&self) -> f32 {
        self.ratio
    }

    fn update_coefficients(&mut self) {
        let attack = calculate_coefficient(self.attack_ms, self.sample_rate);
        let release = calculate_coefficient(self.release_ms, self.sample_rate);
        for env in &mut self.envelopes {
            env.set_attack_coeff(attack);
            env.set_release_coeff(release);
        }
    }
}

impl Stage for CompressorStage {
    fn prepare(&mut self, spec: &ProcessSpec) {
        self.sample_rate = spec.sample_rate;
        self.update_coefficients();
        self.reset();
    }

    #[inline]
    fn process_sample(&mut self, channel: usize, input: f32) -> f32 {
        let env = self.envelopes[channel].process(input);

        // Static curve: above threshold the level grows at 1/ratio
        let gain_reduction = if env > self.threshold {
            (env / self.threshold).powf(self.ratio_exponent)
        } else {
            1.0
        };

        input * gain_reduction
    }

    fn process_block(&mut self, block: &mut [&mut [f32]]) {
        for (channel, samples) in block.iter_mut().take(MAX_CHANNELS).enumerate() {
            for sample in samples.iter_mut() {
                *sample = self.process_sample(channel, *sample);
            }
        }
        for env in &mut self.envelopes {
            env.flush_denormals();
        }
    }

    fn reset(&mut self) {
        for env in &mut self.envelopes {
            env.reset();
        }
    }
}
