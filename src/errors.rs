// src/errors.rs

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Invalid registry path: {0}")]
    InvalidPath(String),

    #[error("Unsupported registry hive: {0}")]
    UnsupportedHive(String),

    #[error("Failed to open registry key: {0}")]
    KeyOpenError(String),

    #[error("Failed to read registry value: {0}")]
    ReadValueError(String),

    #[error("Unsupported registry value type for '{name}': {vtype}")]
    UnsupportedType { name: String, vtype: String },

    #[error("Failed to set registry value: {0}")]
    SetValueError(String),
}

/// Failures surfaced by a resolution switch or an `NV_Modes` fix.
#[derive(Error, Debug)]
pub enum SwitchError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid display mode {width}x{height}@{bit_depth}bpp: {reason}")]
    InvalidMode {
        width: u32,
        height: u32,
        bit_depth: u32,
        reason: String,
    },

    #[error("Required executable not found: {}", .0.display())]
    MissingExecutable(PathBuf),

    #[error("Elevation was declined or is unavailable: {0}")]
    ElevationDenied(String),

    #[error("No display adapter exposes an NV_Modes value; is an NVIDIA driver installed?")]
    NoDriverState,

    #[error("'{program}' exited with code {code}")]
    ProcessFailed { program: String, code: i32 },

    #[error("Failed to toggle secondary display(s): {}", .failed.join(", "))]
    DisplayToggleFailed { failed: Vec<String> },
}
