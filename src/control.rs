//! Line-based control surface for the live host.
//!
//! Commands write straight into the parameter store and never wait on the
//! audio thread.

use anyhow::{Context, Result, anyhow, bail};
use clap::ValueEnum;
use log::info;
use std::str::FromStr;

use crate::audio::engine::EngineHandle;
use crate::fx::stages::filter::FilterTopology;
use crate::params::{ParamId, ProcessingMode};
use crate::preset::{Manager, Preset};

pub const HELP: &str = "\
commands:
  set <parameter> <value>     e.g. set filter_frequency 1200
  mode <filter|compressor>
  topology <lowpass|bandpass|highpass>
  reset                       clear filter/compressor/gain state
  show                        print current parameters
  presets                     list presets
  save <name>                 store current parameters as a preset
  load <name>                 apply a preset
  help
  quit";

#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    Set(ParamId, f32),
    Mode(ProcessingMode),
    Topology(FilterTopology),
    Reset,
    Show,
    Presets,
    Save(String),
    Load(String),
    Help,
    Quit,
}

/// Accepts a variant name or the numeric selector id. Unknown ids resolve
/// to the first variant, the same way the audio thread reads them.
fn parse_selector<T: ValueEnum>(value: &str, from_id: fn(i32) -> T) -> Result<T> {
    if let Ok(id) = value.parse::<i32>() {
        return Ok(from_id(id));
    }
    T::from_str(value, true).map_err(|e| anyhow!(e))
}

impl FromStr for ControlCommand {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            bail!("empty command");
        };
        let rest: Vec<&str> = words.collect();

        let single_arg = |what: &str| -> Result<&str> {
            match rest.as_slice() {
                [arg] => Ok(*arg),
                _ => Err(anyhow!("'{command}' expects exactly one {what}")),
            }
        };

        Ok(match command.to_ascii_lowercase().as_str() {
            "set" => {
                let [name, value] = rest.as_slice() else {
                    bail!("usage: set <parameter> <value>");
                };
                let id = name.parse::<ParamId>()?;
                let value = value
                    .parse::<f32>()
                    .with_context(|| format!("invalid value '{value}'"))?;
                Self::Set(id, value)
            }
            "mode" => Self::Mode(parse_selector(single_arg("mode")?, ProcessingMode::from_id)?),
            "topology" | "type" => Self::Topology(parse_selector(
                single_arg("topology")?,
                FilterTopology::from_id,
            )?),
            "reset" => Self::Reset,
            "show" => Self::Show,
            "presets" => Self::Presets,
            "save" => Self::Save(rest.join(" ")),
            "load" => Self::Load(rest.join(" ")),
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => bail!("unknown command '{other}'"),
        })
    }
}

pub struct ControlSurface {
    engine: EngineHandle,
    presets: Manager,
}

impl ControlSurface {
    pub const fn new(engine: EngineHandle, presets: Manager) -> Self {
        Self { engine, presets }
    }

    /// Applies a command and returns the text to show the user.
    pub fn execute(&mut self, command: &ControlCommand) -> Result<String> {
        match command {
            ControlCommand::Set(id, value) => {
                // Values are clamped here; the store itself takes them as given
                let applied = self.engine.parameters().set_clamped(*id, *value);
                Ok(format!("{id} = {applied} {}", id.unit()))
            }
            ControlCommand::Mode(mode) => {
                self.engine.set_mode(*mode);
                Ok(format!("mode = {mode}"))
            }
            ControlCommand::Topology(topology) => {
                self.engine.set_topology(*topology);
                Ok(format!("topology = {topology}"))
            }
            ControlCommand::Reset => {
                self.engine.request_reset();
                Ok("reset requested".to_string())
            }
            ControlCommand::Show => Ok(self.engine.snapshot().to_string()),
            ControlCommand::Presets => Ok(self
                .presets
                .get_presets()
                .iter()
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>()
                .join("\n")),
            ControlCommand::Save(name) => {
                if name.is_empty() {
                    bail!("usage: save <name>");
                }
                let preset = Preset::new(name.clone(), self.engine.snapshot());
                self.presets.save_preset(&preset)?;
                info!("Saved preset '{name}'");
                Ok(format!("saved '{name}'"))
            }
            ControlCommand::Load(name) => {
                let preset = self
                    .presets
                    .get_preset_by_name(name)
                    .ok_or_else(|| anyhow!("no preset named '{name}'"))?;
                self.engine.restore(&preset.state);
                info!("Loaded preset '{name}'");
                Ok(format!("loaded '{name}'"))
            }
            ControlCommand::Help => Ok(HELP.to_string()),
            ControlCommand::Quit => Ok("bye".to_string()),
        }
    }
}
