use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Result, WallgridError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMode {
    #[default]
    Crop,
    Fit,
    Stretch,
}

impl ResizeMode {
    pub const ALL: [ResizeMode; 3] = [ResizeMode::Crop, ResizeMode::Fit, ResizeMode::Stretch];

    // swww takes these verbatim as its --resize argument
    pub fn as_str(&self) -> &'static str {
        match self {
            ResizeMode::Crop => "crop",
            ResizeMode::Fit => "fit",
            ResizeMode::Stretch => "stretch",
        }
    }
}

impl fmt::Display for ResizeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub default_resize: ResizeMode,
    pub theme: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_resize: ResizeMode::Crop,
            theme: "dark".to_owned(),
        }
    }
}

impl Config {
    /// Reads the config file, falling back to defaults when it is missing or
    /// malformed.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!("Ignoring malformed config {:?}: {}", path, e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| WallgridError::SaveConfig(e.to_string()))?;
        }
        let json =
            serde_json::to_string_pretty(self).map_err(|e| WallgridError::SaveConfig(e.to_string()))?;
        fs::write(path, json).map_err(|e| WallgridError::SaveConfig(e.to_string()))?;
        Ok(())
    }
}
