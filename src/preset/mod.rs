//! Named parameter snapshots stored as one JSON file each.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::params::{ParameterState, ProcessingMode};

pub mod manager;

pub use manager::Manager;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub state: ParameterState,
}

impl Preset {
    pub const fn new(name: String, state: ParameterState) -> Self {
        Self {
            name,
            description: None,
            author: None,
            state,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_author(mut self, author: &str) -> Self {
        self.author = Some(author.to_string());
        self
    }

    /// Parses a preset document, refusing states written by a newer layout.
    pub fn from_json(json: &str) -> Result<Self> {
        let preset: Self = serde_json::from_str(json).context("Failed to parse preset JSON")?;
        preset
            .state
            .check_version()
            .with_context(|| format!("preset '{}' has an unusable state", preset.name))?;
        Ok(preset)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize preset")
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}", self.name, self.state.mode)?;
        if self.state.mode == ProcessingMode::Filter {
            write!(f, ", {}", self.state.topology)?;
        }
        write!(f, ")")?;
        if let Some(author) = &self.author {
            write!(f, " by {author}")?;
        }
        Ok(())
    }
}
