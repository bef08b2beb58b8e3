use anyhow::{Context, Result};
use jack::{AudioIn, AudioOut, Client, Port, ProcessScope};

pub const IN_LEFT: &str = "in_left";
pub const IN_RIGHT: &str = "in_right";
pub const OUT_LEFT: &str = "out_left";
pub const OUT_RIGHT: &str = "out_right";

/// Stereo in, stereo out.
pub struct Ports {
    input_left: Port<AudioIn>,
    input_right: Port<AudioIn>,
    output_left: Port<AudioOut>,
    output_right: Port<AudioOut>,
}

impl Ports {
    pub fn new(client: &Client) -> Result<Self> {
        Ok(Self {
            input_left: client
                .register_port(IN_LEFT, AudioIn::default())
                .context("failed to register in port left")?,
            input_right: client
                .register_port(IN_RIGHT, AudioIn::default())
                .context("failed to register in port right")?,
            output_left: client
                .register_port(OUT_LEFT, AudioOut::default())
                .context("failed to register out port left")?,
            output_right: client
                .register_port(OUT_RIGHT, AudioOut::default())
                .context("failed to register out port right")?,
        })
    }

    /// Copies the inputs to the outputs and returns the outputs for
    /// in-place processing.
    pub fn pass_through<'a>(&'a mut self, ps: &'a ProcessScope) -> [&'a mut [f32]; 2] {
        let out_left = self.output_left.as_mut_slice(ps);
        let out_right = self.output_right.as_mut_slice(ps);

        out_left.copy_from_slice(self.input_left.as_slice(ps));
        out_right.copy_from_slice(self.input_right.as_slice(ps));

        [out_left, out_right]
    }

    pub fn silence_output(&mut self, ps: &ProcessScope) {
        self.output_left.as_mut_slice(ps).fill(0.0);
        self.output_right.as_mut_slice(ps).fill(0.0);
    }
}
