// src/config.rs

//! Settings file holding the native and game resolutions.
//!
//! The file is JSON and lives in the platform config directory
//! (`%APPDATA%\nv_res_tool\settings.json` on Windows) unless a path is given
//! on the command line. It is read fresh on every invocation.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::{
    constants::{
        DEFAULT_DISPLAY_TOOL, DISPLAY_CLASS_PATH, MAX_BIT_DEPTH, MAX_DIMENSION, MIN_BIT_DEPTH,
        MIN_HEIGHT, MIN_WIDTH, SETTINGS_DIR_NAME, SETTINGS_FILE_NAME,
    },
    errors::SwitchError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum ProfileName {
    Native,
    Game,
}

/// A named display mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionProfile {
    pub name: ProfileName,
    pub width: u32,
    pub height: u32,
    pub bit_depth: u32,
}

impl ResolutionProfile {
    /// Checks the mode against the ranges the display tool accepts.
    pub fn validate(&self) -> Result<(), SwitchError> {
        let reason = if !(MIN_WIDTH..=MAX_DIMENSION).contains(&self.width) {
            format!("width must be between {} and {}", MIN_WIDTH, MAX_DIMENSION)
        } else if !(MIN_HEIGHT..=MAX_DIMENSION).contains(&self.height) {
            format!("height must be between {} and {}", MIN_HEIGHT, MAX_DIMENSION)
        } else if !(MIN_BIT_DEPTH..=MAX_BIT_DEPTH).contains(&self.bit_depth) {
            format!(
                "bit depth must be between {} and {}",
                MIN_BIT_DEPTH, MAX_BIT_DEPTH
            )
        } else {
            return Ok(());
        };

        Err(SwitchError::InvalidMode {
            width: self.width,
            height: self.height,
            bit_depth: self.bit_depth,
            reason,
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Contents of `settings.json`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub native: Resolution,
    pub game: Resolution,
    pub bit_depth: u32,
    /// Monitors toggled before every profile switch, in order.
    #[serde(default)]
    pub secondary_displays: Vec<String>,
    /// Path of the display tool; defaults to `nircmd.exe` next to this executable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_tool: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            native: Resolution {
                width: 1920,
                height: 1080,
            },
            game: Resolution {
                width: 1440,
                height: 1080,
            },
            bit_depth: 32,
            secondary_displays: Vec::new(),
            display_tool: None,
        }
    }
}

impl Settings {
    pub fn profile(&self, name: ProfileName) -> ResolutionProfile {
        let resolution = match name {
            ProfileName::Native => self.native,
            ProfileName::Game => self.game,
        };
        ResolutionProfile {
            name,
            width: resolution.width,
            height: resolution.height,
            bit_depth: self.bit_depth,
        }
    }

    /// Replaces the game resolution after validating it with the shared bit depth.
    pub fn set_game(&mut self, width: u32, height: u32) -> Result<(), SwitchError> {
        let candidate = ResolutionProfile {
            name: ProfileName::Game,
            width,
            height,
            bit_depth: self.bit_depth,
        };
        candidate.validate()?;
        self.game = Resolution { width, height };
        Ok(())
    }

    /// Validates both profiles.
    pub fn validate(&self) -> Result<(), SwitchError> {
        self.profile(ProfileName::Native).validate()?;
        self.profile(ProfileName::Game).validate()?;
        if self.secondary_displays.iter().any(|id| id.trim().is_empty()) {
            return Err(SwitchError::Config(
                "secondary_displays contains an empty identifier".to_string(),
            ));
        }
        Ok(())
    }

    pub fn display_tool_path(&self) -> PathBuf {
        self.display_tool.clone().unwrap_or_else(default_display_tool)
    }
}

/// `nircmd.exe` in the directory of the running executable, or bare on PATH
/// if that directory cannot be determined.
pub fn default_display_tool() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_DISPLAY_TOOL)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DISPLAY_TOOL))
}

/// Default location of `settings.json`.
pub fn default_settings_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", SETTINGS_DIR_NAME)
        .ok_or_else(|| anyhow::anyhow!("Failed to determine the user config directory"))?;
    Ok(dirs.config_dir().join(SETTINGS_FILE_NAME))
}

/// Loads and validates settings. A missing or malformed file is a
/// configuration error.
pub fn load_settings(path: &Path) -> Result<Settings> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SwitchError::Config(format!(
                "settings file '{}' does not exist; run `init` first",
                path.display()
            ))
            .into())
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read '{}'", path.display()))
        }
    };

    let settings: Settings = serde_json::from_str(&content).map_err(|e| {
        SwitchError::Config(format!("'{}' is not valid: {}", path.display(), e))
    })?;
    settings.validate()?;
    tracing::debug!("Loaded settings from '{}': {:?}", path.display(), settings);
    Ok(settings)
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create '{}'", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(settings).context("Failed to serialize settings")?;
    fs::write(path, json).with_context(|| format!("Failed to write '{}'", path.display()))?;
    tracing::debug!("Saved settings to '{}'.", path.display());
    Ok(())
}

/// Paths the orchestrator works with, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitcherConfig {
    pub display_tool: PathBuf,
    pub adapter_class_path: String,
    /// Passed to the elevated re-launch so it reads the same settings.
    pub settings_path: PathBuf,
}

impl SwitcherConfig {
    pub fn new(settings: &Settings, settings_path: &Path) -> Self {
        Self {
            display_tool: settings.display_tool_path(),
            adapter_class_path: DISPLAY_CLASS_PATH.to_string(),
            settings_path: settings_path.to_path_buf(),
        }
    }
}
