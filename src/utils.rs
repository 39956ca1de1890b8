// src/utils.rs

pub mod process;
#[cfg(windows)]
pub mod registry;
#[cfg(windows)]
pub mod windows;
