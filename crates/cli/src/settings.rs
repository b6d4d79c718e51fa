use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use fixcam_core::shared::resolution::Resolution;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionPreset {
    Hd,
    Sd,
    Custom { width: u32, height: u32 },
}

impl ResolutionPreset {
    pub fn resolution(&self) -> Resolution {
        match self {
            ResolutionPreset::Hd => Resolution::new(1280, 720),
            ResolutionPreset::Sd => Resolution::new(640, 480),
            ResolutionPreset::Custom { width, height } => Resolution::new(*width, *height),
        }
    }
}

impl std::fmt::Display for ResolutionPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionPreset::Hd => write!(f, "HD (1280x720)"),
            ResolutionPreset::Sd => write!(f, "SD (640x480)"),
            ResolutionPreset::Custom { width, height } => write!(f, "{width}x{height}"),
        }
    }
}

impl FromStr for ResolutionPreset {
    type Err = String;

    /// `hd`, `sd` or `WIDTHxHEIGHT`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hd" => Ok(ResolutionPreset::Hd),
            "sd" => Ok(ResolutionPreset::Sd),
            other => {
                let res = other.parse::<Resolution>()?;
                if !res.is_valid() {
                    return Err(format!("resolution must be positive, got '{s}'"));
                }
                Ok(ResolutionPreset::Custom {
                    width: res.width,
                    height: res.height,
                })
            }
        }
    }
}

/// Choices remembered between runs of `fixcam record`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub device: u32,
    pub output_dir: Option<PathBuf>,
    pub fps: u32,
    pub segment_minutes: u32,
    pub resolution: ResolutionPreset,
    pub font: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device: 0,
            output_dir: None,
            fps: 10,
            segment_minutes: 60,
            resolution: ResolutionPreset::Hd,
            font: None,
        }
    }
}

impl Settings {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("FixCam").join("settings.json"))
    }

    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Missing or unreadable files yield defaults.
    pub fn load_from(path: &Path) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default()
    }

    pub fn save(&self) {
        if let Some(path) = Self::config_path() {
            self.save_to(&path);
        }
    }

    pub fn save_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    log::warn!("Could not save settings to {}: {e}", path.display());
                }
            }
            Err(e) => log::warn!("Could not serialize settings: {e}"),
        }
    }
}
