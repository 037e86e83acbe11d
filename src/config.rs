//! Engine configuration, read from a JSON file. Every field has a default,
//! so `{}` is a valid config.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::preset::Preset;
use crate::simulator::{PerturbationBounds, BROADCAST_STEP, HISTORY_LEN, SPATIAL_NOMINAL, SPATIAL_RATIO};

pub const CONFIG_FILE: &str = "pulse-fm-chain.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fixed RNG seed; entropy when absent.
    pub seed: Option<u64>,
    pub history_len: usize,
    pub broadcast_step: f32,
    pub spatial_ratio: f32,
    pub spatial_nominal: f32,
    pub skip_unchanged_frames: bool,
    pub frame_interval_ms: u64,
    /// Pixel density for canvas backing stores; also the GUI scale factor.
    pub display_scale: f32,
    pub log_level: Option<String>,
    /// Extra presets merged over the built-in library.
    pub presets: Vec<Preset>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            seed: None,
            history_len: HISTORY_LEN,
            broadcast_step: BROADCAST_STEP,
            spatial_ratio: SPATIAL_RATIO,
            spatial_nominal: SPATIAL_NOMINAL,
            skip_unchanged_frames: false,
            frame_interval_ms: 16,
            display_scale: 1.0,
            log_level: None,
            presets: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&data).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// `pulse-fm-chain.json` in the working directory, or defaults when
    /// there is no such file.
    pub fn load_default() -> Result<Self> {
        let path = default_path();
        if !path.exists() {
            return Ok(EngineConfig::default());
        }
        Self::load(&path)
    }

    /// `display_scale` when usable, else 1.
    pub fn surface_scale(&self) -> f32 {
        if self.display_scale.is_finite() && self.display_scale > 0.0 {
            self.display_scale
        } else {
            1.0
        }
    }

    pub fn bounds(&self) -> PerturbationBounds {
        PerturbationBounds {
            broadcast_step: self.broadcast_step,
            spatial_ratio: self.spatial_ratio,
            spatial_nominal: self.spatial_nominal,
        }
    }
}

pub fn default_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(EngineConfig::from_json("{}").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_partial_config() {
        let cfg = EngineConfig::from_json(r#"{"seed": 42, "history_len": 32, "log_level": "debug"}"#).unwrap();
        assert_eq!(cfg.seed, Some(42));
        assert_eq!(cfg.history_len, 32);
        assert_eq!(cfg.frame_interval_ms, 16);
        assert_eq!(cfg.bounds(), PerturbationBounds::default());
    }

    #[test]
    fn test_display_scale() {
        let cfg = EngineConfig::from_json(r#"{"display_scale": 2.0}"#).unwrap();
        assert_eq!(cfg.surface_scale(), 2.0);
        let cfg = EngineConfig::from_json(r#"{"display_scale": 0}"#).unwrap();
        assert_eq!(cfg.surface_scale(), 1.0);
        assert_eq!(EngineConfig::default().surface_scale(), 1.0);
    }

    #[test]
    fn test_bad_json_is_error() {
        assert!(EngineConfig::from_json("{\"seed\": \"x\"}").is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(EngineConfig::load(Path::new("/definitely/not/here.json")).is_err());
    }
}
