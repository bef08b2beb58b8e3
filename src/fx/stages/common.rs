/// Anything quieter than this is treated as silence by the level conversions.
const MIN_LEVEL: f32 = 1e-10;

/// State values below this magnitude are flushed to zero between blocks.
const DENORMAL_THRESHOLD: f32 = 1e-20;

/// Convert decibels to linear amplitude.
#[inline]
pub fn db_to_lin(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels, floored at -200 dB.
#[inline]
pub fn lin_to_db(lin: f32) -> f32 {
    20.0 * lin.abs().max(MIN_LEVEL).log10()
}

/// Calculate a one-pole smoothing coefficient from a time constant in milliseconds.
///
/// Returns `exp(-1 / (sample_rate * time_ms * 0.001))`. A time of zero (or less)
/// yields `0.0`, which makes the follower track its input instantly.
#[inline]
pub fn calculate_coefficient(time_ms: f32, sample_rate: f32) -> f32 {
    if time_ms <= 0.0 {
        return 0.0;
    }
    (-1.0 / (sample_rate * 0.001 * time_ms)).exp()
}

#[inline]
pub fn flush_denormal(value: f32) -> f32 {
    if value.abs() < DENORMAL_THRESHOLD {
        0.0
    } else {
        value
    }
}

/// One-pole envelope follower with configurable attack and release coefficients.
#[derive(Clone, Copy, Debug)]
pub struct EnvelopeFollower {
    envelope: f32,
    attack_coeff: f32,
    release_coeff: f32,
}

impl Default for EnvelopeFollower {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl EnvelopeFollower {
    /// Create from pre-computed coefficients.
    pub const fn new(attack_coeff: f32, release_coeff: f32) -> Self {
        Self {
            envelope: 0.0,
            attack_coeff,
            release_coeff,
        }
    }

    /// Create from attack/release times in milliseconds.
    pub fn from_ms(attack_ms: f32, release_ms: f32, sample_rate: f32) -> Self {
        Self::new(
            calculate_coefficient(attack_ms, sample_rate),
            calculate_coefficient(release_ms, sample_rate),
        )
    }

    pub const fn set_attack_coeff(&mut self, coeff: f32) {
        self.attack_coeff = coeff;
    }

    pub const fn set_release_coeff(&mut self, coeff: f32) {
        self.release_coeff = coeff;
    }

    pub const fn value(&self) -> f32 {
        self.envelope
    }

    pub const fn reset(&mut self) {
        self.envelope = 0.0;
    }

    pub fn flush_denormals(&mut self) {
        self.envelope = flush_denormal(self.envelope);
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let abs_input = input.abs();
        if abs_input > self.envelope {
            self.envelope = self
                .attack_coeff
                .mul_add(self.envelope, (1.0 - self.attack_coeff) * abs_input);
        } else {
            self.envelope = self
                .release_coeff
                .mul_add(self.envelope, (1.0 - self.release_coeff) * abs_input);
        }
        self.envelope
    }
}

/// Linear ramp toward a target value over a fixed number of samples.
#[derive(Clone, Copy, Debug)]
pub struct LinearSmoother {
    current: f32,
    target: f32,
    step: f32,
    ramp_samples: usize,
    steps_remaining: usize,
}

impl LinearSmoother {
    pub const fn new(initial: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            step: 0.0,
            ramp_samples: 0,
            steps_remaining: 0,
        }
    }

    /// Set the ramp length and jump straight to the current target.
    pub fn set_ramp(&mut self, ramp_seconds: f32, sample_rate: f32) {
        self.ramp_samples = (ramp_seconds * sample_rate).floor().max(0.0) as usize;
        self.snap_to_target();
    }

    pub fn set_target(&mut self, target: f32) {
        if target == self.target {
            return;
        }

        self.target = target;

        if self.ramp_samples == 0 {
            self.snap_to_target();
        } else {
            self.steps_remaining = self.ramp_samples;
            self.step = (self.target - self.current) / self.ramp_samples as f32;
        }
    }

    pub const fn snap_to_target(&mut self) {
        self.current = self.target;
        self.steps_remaining = 0;
    }

    pub const fn target(&self) -> f32 {
        self.target
    }

    pub const fn current(&self) -> f32 {
        self.current
    }

    pub const fn is_smoothing(&self) -> bool {
        self.steps_remaining > 0
    }

    #[inline]
    pub fn next_value(&mut self) -> f32 {
        if self.steps_remaining == 0 {
            return self.target;
        }

        self.steps_remaining -= 1;
        if self.steps_remaining == 0 {
            self.current = self.target;
        } else {
            self.current += self.step;
        }
        self.current
    }
}
