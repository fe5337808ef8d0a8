//! Viewer settings: data locations and the initial analysis parameters.
//!
//! Read from the JSON file named by `EXES_VIEWER_CONFIG`, or from
//! `exes_viewer.json` in the working directory. Missing keys take their
//! defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::analysis::peaks::PeakParams;

pub const CONFIG_ENV: &str = "EXES_VIEWER_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "exes_viewer.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory scanned for EXES `*.fits` files.
    pub exes_dir: PathBuf,
    /// Directory of per-molecule HITRAN line tables.
    pub hitran_dir: PathBuf,
    /// Directory of `q<id>.txt` partition-sum tables; rigid-rotor estimates
    /// are used without it.
    pub partition_dir: Option<PathBuf>,
    pub atmosphere_file: PathBuf,
    pub smooth_width: usize,
    pub cutoff: f64,
    pub baseline: f64,
    pub height: f64,
    pub prominence: Option<f64>,
    pub distance: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            exes_dir: PathBuf::from("EXES_Files"),
            hitran_dir: PathBuf::from("HITRAN_Data"),
            partition_dir: None,
            atmosphere_file: PathBuf::from("model_atmosphere.csv"),
            smooth_width: 9,
            cutoff: 1e-4,
            baseline: 1.0,
            height: 0.9,
            prominence: None,
            distance: None,
        }
    }
}

impl Settings {
    /// Load from `$EXES_VIEWER_CONFIG` or `./exes_viewer.json`.
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load_from(&path)
    }

    /// Defaults when `path` does not exist; a malformed file is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&text)
            .with_context(|| format!("parsing settings {}", path.display()))?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn peak_params(&self) -> PeakParams {
        PeakParams {
            height: Some(self.height),
            prominence: self.prominence,
            distance: self.distance,
        }
    }
}
