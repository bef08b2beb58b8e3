use super::Preset;
use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

pub struct Manager {
    presets_dir: PathBuf,
    presets: Vec<Preset>,
}

impl Manager {
    pub fn new(preset_dir: &str) -> Result<Self> {
        let presets_dir = Path::new(preset_dir).to_path_buf();
        fs::create_dir_all(&presets_dir).context("Failed to create presets directory")?;

        let mut manager = Self {
            presets_dir,
            presets: Vec::new(),
        };

        manager.load_presets()?;

        Ok(manager)
    }

    pub fn load_presets(&mut self) -> Result<()> {
        self.presets.clear();

        if !self.presets_dir.exists() {
            return Ok(());
        }

        for entry in fs::read_dir(&self.presets_dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                match load_preset_file(&path) {
                    Ok(preset) => self.presets.push(preset),
                    Err(e) => {
                        warn!("Failed to load preset {}: {e:#}", path.display());
                    }
                }
            }
        }

        // Sort presets by name
        self.presets.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(
            "Loaded {} presets from {}",
            self.presets.len(),
            self.presets_dir.display()
        );

        Ok(())
    }

    pub fn save_preset(&mut self, preset: &Preset) -> Result<()> {
        let path = self.preset_path(&preset.name);

        let json = preset.to_json()?;

        fs::write(&path, json).context("Failed to write preset file")?;

        // Reload presets to include the new/updated one
        self.load_presets()?;

        Ok(())
    }

    pub fn delete_preset(&mut self, preset_name: &str) -> Result<()> {
        let path = self.preset_path(preset_name);

        if path.exists() {
            fs::remove_file(&path).context("Failed to delete preset file")?;

            // Reload presets to reflect the deletion
            self.load_presets()?;

            Ok(())
        } else {
            Err(anyhow::anyhow!("Preset file not found: {preset_name}"))
        }
    }

    pub fn preset_exists(&self, name: &str) -> bool {
        self.presets.iter().any(|p| p.name == name)
    }

    pub fn get_presets(&self) -> &[Preset] {
        &self.presets
    }

    pub fn get_preset_by_name(&self, name: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.name == name)
    }

    fn preset_path(&self, name: &str) -> PathBuf {
        self.presets_dir
            .join(format!("{}.json", sanitize_filename(name)))
    }
}

fn load_preset_file(path: &Path) -> Result<Preset> {
    let content = fs::read_to_string(path).context("Failed to read preset file")?;
    Preset::from_json(&content)
}

fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParameterState, ProcessingMode};
    use tempfile::tempdir;

    fn manager_in(dir: &Path) -> Manager {
        Manager::new(dir.to_str().unwrap()).unwrap()
    }

    #[test]
    fn saves_loads_and_deletes_presets() {
        let dir = tempdir().unwrap();
        let mut manager = manager_in(dir.path());
        assert!(manager.get_presets().is_empty());

        let state = ParameterState {
            mode: ProcessingMode::Compressor,
            compressor_ratio: 4.0,
            ..ParameterState::default()
        };
        let preset = Preset::new("Vocal Squash".to_string(), state).with_author("me");
        manager.save_preset(&preset).unwrap();
        manager
            .save_preset(&Preset::new("Air".to_string(), ParameterState::default()))
            .unwrap();

        assert!(dir.path().join("Vocal_Squash.json").exists());
        let names: Vec<&str> = manager.get_presets().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Air", "Vocal Squash"]);

        let reloaded = manager_in(dir.path());
        assert_eq!(reloaded.get_preset_by_name("Vocal Squash"), Some(&preset));

        manager.delete_preset("Vocal Squash").unwrap();
        assert!(!manager.preset_exists("Vocal Squash"));
        assert!(manager.delete_preset("Vocal Squash").is_err());
    }

    #[test]
    fn broken_files_are_skipped() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("broken.json"), "{ nope").unwrap();
        fs::write(
            dir.path().join("future.json"),
            r#"{ "name": "Future", "state": { "version": 9 } }"#,
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let manager = manager_in(dir.path());
        assert!(manager.get_presets().is_empty());
    }

    #[test]
    fn sanitizes_names() {
        assert_eq!(sanitize_filename("a b/c..d"), "a_b_c__d");
    }
}
