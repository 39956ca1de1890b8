// src/constants.rs

/// Display adapter device class. Each adapter lives in a `0000`, `0001`, ... subkey.
pub const DISPLAY_CLASS_PATH: &str = "HKEY_LOCAL_MACHINE\\SYSTEM\\CurrentControlSet\\Control\\Class\\{4d36e968-e325-11ce-bfc1-08002be10318}";

/// Registry value the NVIDIA driver reads its custom mode list from.
pub const NV_MODES_VALUE: &str = "NV_Modes";

pub const MODE_COLOR_DEPTHS: [u32; 4] = [8, 16, 32, 64];
pub const MODE_FLAG: &str = "1F";

// Accepted ranges for a display mode change.
pub const MIN_WIDTH: u32 = 640;
pub const MIN_HEIGHT: u32 = 480;
pub const MAX_DIMENSION: u32 = 16384;
pub const MIN_BIT_DEPTH: u32 = 16;
pub const MAX_BIT_DEPTH: u32 = 64;

pub const DEFAULT_DISPLAY_TOOL: &str = "nircmd.exe";
pub const DISPLAY_TOOL_VERB: &str = "setdisplay";

pub const SETTINGS_DIR_NAME: &str = "nv_res_tool";
pub const SETTINGS_FILE_NAME: &str = "settings.json";

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
