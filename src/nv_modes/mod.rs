// src/nv_modes/mod.rs

pub mod codec;

use anyhow::{Context, Result};
use tracing::{debug, info, trace};

use self::codec::{merge_entry, tokenize, ModeListValue, ModeToken};
use crate::errors::SwitchError;

/// Access to the per-adapter keys below the display class path.
///
/// Implemented over the Windows registry in `utils::registry`; tests use an
/// in-memory store.
pub trait AdapterStore {
    /// Names of the candidate adapter keys (four-digit subkeys), in store order.
    fn adapter_keys(&self) -> Result<Vec<String>>;

    /// Reads the `NV_Modes` value of `key`, `Ok(None)` if the key has none.
    fn read_modes(&self, key: &str) -> Result<Option<ModeListValue>>;

    fn write_modes(&self, key: &str, value: &ModeListValue) -> Result<()>;
}

/// Returns true for the `0000`..`9999` subkeys that hold adapter settings.
pub fn is_adapter_key_name(name: &str) -> bool {
    name.len() == 4 && name.bytes().all(|b| b.is_ascii_digit())
}

/// Outcome of a successful `apply_resolution` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplySummary {
    /// Adapter keys that carry an `NV_Modes` value.
    pub examined: usize,
    pub updated: usize,
    /// Keys that already listed the resolution.
    pub unchanged: usize,
}

/// Makes sure every adapter key that has an `NV_Modes` value lists
/// `width`x`height`.
///
/// Keys without the value are skipped. If no key has it at all the driver
/// state is considered missing and `SwitchError::NoDriverState` is returned.
pub fn apply_resolution(store: &dyn AdapterStore, width: u32, height: u32) -> Result<ApplySummary> {
    info!("Adding {}x{} to NV_Modes.", width, height);
    let mut summary = ApplySummary::default();

    for key in store.adapter_keys()? {
        let Some(current) = store
            .read_modes(&key)
            .with_context(|| format!("Failed to read NV_Modes of adapter key '{}'", key))?
        else {
            trace!("{} -> No NV_Modes value, not applicable.", key);
            continue;
        };
        summary.examined += 1;

        let decoded = current.decode();
        match merge_entry(&decoded, width, height) {
            None => {
                debug!("{} -> {}x{} already present.", key, width, height);
                summary.unchanged += 1;
            }
            Some(merged) => {
                let updated = current.encode_like(merged);
                store.write_modes(&key, &updated).with_context(|| {
                    format!("Failed to write NV_Modes of adapter key '{}'", key)
                })?;
                debug!("{} -> Updated NV_Modes to {:?}.", key, updated);
                summary.updated += 1;
            }
        }
    }

    if summary.examined == 0 {
        return Err(SwitchError::NoDriverState.into());
    }

    info!(
        "NV_Modes: {} adapter key(s) examined, {} updated, {} already present.",
        summary.examined, summary.updated, summary.unchanged
    );
    Ok(summary)
}

/// Custom modes exposed by one adapter key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterModes {
    pub key: String,
    pub multi_string: bool,
    pub tokens: Vec<ModeToken>,
}

/// Reads and tokenizes the `NV_Modes` value of every adapter key that has one.
pub fn list_modes(store: &dyn AdapterStore) -> Result<Vec<AdapterModes>> {
    let mut adapters = Vec::new();
    for key in store.adapter_keys()? {
        if let Some(value) = store.read_modes(&key)? {
            adapters.push(AdapterModes {
                multi_string: matches!(value, ModeListValue::Multi(_)),
                tokens: tokenize(&value.decode()),
                key,
            });
        }
    }

    if adapters.is_empty() {
        return Err(SwitchError::NoDriverState.into());
    }
    Ok(adapters)
}
