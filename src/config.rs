// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
//! Session configuration, loaded from YAML.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, File};
use serde::Deserialize;

use crate::catalog::SampleDescriptor;
use crate::transport::Quantization;

pub mod error;
pub mod kit;

pub use error::ConfigError;
pub use kit::KitSample;

/// The configuration for a sampler session.
#[derive(Deserialize, Clone, Debug)]
pub struct SessionConfig {
    /// The output device name. The host default is used when absent.
    device: Option<String>,

    /// The sample rate used when running without an audio device.
    #[serde(default = "default_sample_rate")]
    sample_rate: u32,

    /// The transport tempo.
    #[serde(default = "default_bpm")]
    bpm: f64,

    /// Whether playback starts quantized.
    #[serde(default)]
    quantize: bool,

    /// The quantize grid, as a note subdivision (4 is a quarter note).
    #[serde(default = "default_subdivision")]
    subdivision: u32,

    /// The directory sample URLs are resolved against.
    #[serde(default = "default_samples_root")]
    samples_root: PathBuf,

    /// The JSON file list describing the archival collections.
    #[serde(default = "default_catalog")]
    catalog: PathBuf,

    /// How many excerpts are taken from a collection.
    #[serde(default = "default_archival_limit")]
    archival_limit: usize,

    /// The collection loaded at startup.
    #[serde(default = "default_collection")]
    default_collection: String,

    /// The longest the scheduler sleeps between clock checks.
    #[serde(default = "default_scheduler_tick_ms")]
    scheduler_tick_ms: u64,

    /// The master output gain.
    #[serde(default = "default_master_gain")]
    master_gain: f32,

    /// The drum kit samples.
    #[serde(default = "kit::default_kit")]
    kit: Vec<KitSample>,
}

fn default_sample_rate() -> u32 {
    44100
}

fn default_bpm() -> f64 {
    120.0
}

fn default_subdivision() -> u32 {
    4
}

fn default_samples_root() -> PathBuf {
    PathBuf::from("samples")
}

fn default_catalog() -> PathBuf {
    PathBuf::from("fileList.json")
}

fn default_archival_limit() -> usize {
    crate::catalog::filelist::DEFAULT_LIMIT
}

fn default_collection() -> String {
    "jazz".to_string()
}

fn default_scheduler_tick_ms() -> u64 {
    2
}

fn default_master_gain() -> f32 {
    1.0
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            device: None,
            sample_rate: default_sample_rate(),
            bpm: default_bpm(),
            quantize: false,
            subdivision: default_subdivision(),
            samples_root: default_samples_root(),
            catalog: default_catalog(),
            archival_limit: default_archival_limit(),
            default_collection: default_collection(),
            scheduler_tick_ms: default_scheduler_tick_ms(),
            master_gain: default_master_gain(),
            kit: kit::default_kit(),
        }
    }
}

impl SessionConfig {
    /// Parse a session config from a YAML file. Relative paths are resolved
    /// against the directory containing the file.
    pub fn deserialize(path: &Path) -> Result<SessionConfig, ConfigError> {
        let mut config = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<SessionConfig>()?;

        if let Some(base) = path.parent() {
            config.samples_root = base.join(&config.samples_root);
            config.catalog = base.join(&config.catalog);
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.bpm.is_finite() && self.bpm > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "bpm must be positive, got {}",
                self.bpm
            )));
        }
        if self.subdivision == 0 {
            return Err(ConfigError::Invalid(
                "subdivision must be positive".to_string(),
            ));
        }
        if self.scheduler_tick_ms == 0 {
            return Err(ConfigError::Invalid(
                "scheduler_tick_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// The quantization playback starts with.
    pub fn quantization(&self) -> Quantization {
        if self.quantize {
            Quantization::Grid {
                subdivision: self.subdivision,
            }
        } else {
            Quantization::Off
        }
    }

    pub fn subdivision(&self) -> u32 {
        self.subdivision
    }

    pub fn samples_root(&self) -> &Path {
        &self.samples_root
    }

    pub fn catalog(&self) -> &Path {
        &self.catalog
    }

    pub fn archival_limit(&self) -> usize {
        self.archival_limit
    }

    pub fn default_collection(&self) -> &str {
        &self.default_collection
    }

    pub fn scheduler_tick(&self) -> Duration {
        Duration::from_millis(self.scheduler_tick_ms)
    }

    pub fn master_gain(&self) -> f32 {
        self.master_gain
    }

    /// Descriptors for the configured kit.
    pub fn kit(&self) -> Vec<SampleDescriptor> {
        kit::descriptors(&self.kit)
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;
    use std::fs;

    use crate::transport::Quantization;

    use super::{ConfigError, SessionConfig};

    #[test]
    fn test_defaults() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("session.yaml");
        fs::write(&path, "device: Built-in Output\n")?;

        let config = SessionConfig::deserialize(&path)?;
        assert_eq!(Some("Built-in Output"), config.device());
        assert_eq!(120.0, config.bpm());
        assert_eq!(Quantization::Off, config.quantization());
        assert_eq!(4, config.subdivision());
        assert_eq!(12, config.archival_limit());
        assert_eq!("jazz", config.default_collection());
        assert_eq!(1.0, config.master_gain());
        assert_eq!(dir.path().join("samples"), config.samples_root());
        assert_eq!(dir.path().join("fileList.json"), config.catalog());
        assert_eq!(4, config.kit().len());
        Ok(())
    }

    #[test]
    fn test_overrides() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("session.yaml");
        fs::write(
            &path,
            r#"
bpm: 90
quantize: true
subdivision: 8
default_collection: folk-songs
kit:
  - title: Rim_1
    label: Rim
    url: kits/rims/Rim_1.wav
"#,
        )?;

        let config = SessionConfig::deserialize(&path)?;
        assert_eq!(90.0, config.bpm());
        assert_eq!(Quantization::Grid { subdivision: 8 }, config.quantization());
        assert_eq!("folk-songs", config.default_collection());
        let kit = config.kit();
        assert_eq!(1, kit.len());
        assert_eq!("kit/1-Rim", kit[0].id);
        Ok(())
    }

    #[test]
    fn test_invalid_values() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("session.yaml");
        fs::write(&path, "bpm: 0\n")?;
        assert!(matches!(
            SessionConfig::deserialize(&path),
            Err(ConfigError::Invalid(_))
        ));

        assert!(matches!(
            SessionConfig::deserialize(&dir.path().join("missing.yaml")),
            Err(ConfigError::Load(_))
        ));
        Ok(())
    }
}
