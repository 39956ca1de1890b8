// src/lib.rs

pub mod config;
pub mod constants;
pub mod errors;
pub mod nv_modes;
pub mod orchestrator;
pub mod utils;
