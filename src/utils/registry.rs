// src/utils/registry.rs

use anyhow::{Context, Result};
use winreg::{
    enums::{
        RegType::{REG_MULTI_SZ, REG_SZ},
        HKEY_CLASSES_ROOT, HKEY_CURRENT_CONFIG, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, HKEY_USERS,
        KEY_READ, KEY_SET_VALUE,
    },
    RegKey, RegValue,
};

use crate::{
    constants::NV_MODES_VALUE,
    errors::RegistryError,
    nv_modes::{codec::ModeListValue, is_adapter_key_name, AdapterStore},
};

/// Parses the full registry path into hive and subkey path.
///
/// # Parameters
///
/// - `path`: The full registry path (e.g., "HKEY_LOCAL_MACHINE\\SYSTEM\\...").
///
/// # Returns
///
/// - `Ok((RegKey, String))` with the parsed hive and subkey path.
/// - `Err(anyhow::Error)` if parsing fails.
pub fn parse_registry_path(path: &str) -> Result<(RegKey, String)> {
    let Some((hive_name, subkey)) = path.split_once('\\') else {
        return Err(RegistryError::InvalidPath(format!(
            "'{}'. Expected format 'HKEY_*\\Subkey\\...'",
            path
        ))
        .into());
    };
    if subkey.is_empty() {
        return Err(RegistryError::InvalidPath(format!("'{}' has no subkey", path)).into());
    }

    let hive = match hive_name.to_uppercase().as_str() {
        "HKEY_LOCAL_MACHINE" | "HKLM" => HKEY_LOCAL_MACHINE,
        "HKEY_CURRENT_USER" | "HKCU" => HKEY_CURRENT_USER,
        "HKEY_CLASSES_ROOT" => HKEY_CLASSES_ROOT,
        "HKEY_USERS" => HKEY_USERS,
        "HKEY_CURRENT_CONFIG" => HKEY_CURRENT_CONFIG,
        other => return Err(RegistryError::UnsupportedHive(other.to_string()).into()),
    };
    Ok((RegKey::predef(hive), subkey.to_string()))
}

/// Reads a string-typed registry value as a `ModeListValue`.
///
/// # Returns
///
/// - `Ok(Some(ModeListValue))` if the value exists and is `REG_SZ` or `REG_MULTI_SZ`.
/// - `Ok(None)` if the value doesn't exist.
/// - `Err(anyhow::Error)` for any other value type or read failure.
pub fn read_string_value(key: &RegKey, value_name: &str) -> Result<Option<ModeListValue>> {
    let value = match key.get_raw_value(value_name) {
        Ok(value) => value,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(RegistryError::ReadValueError(format!("'{}': {}", value_name, e)).into())
        }
    };

    let text = decode_utf16(&value.bytes);
    match value.vtype {
        REG_SZ => Ok(Some(ModeListValue::Single(
            text.trim_end_matches('\0').to_string(),
        ))),
        REG_MULTI_SZ => Ok(Some(ModeListValue::Multi(
            text.split('\0')
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect(),
        ))),
        other => Err(RegistryError::UnsupportedType {
            name: value_name.to_string(),
            vtype: format!("{:?}", other),
        }
        .into()),
    }
}

/// Writes a `ModeListValue`, keeping `REG_SZ` or `REG_MULTI_SZ` as given.
pub fn write_string_value(key: &RegKey, value_name: &str, value: &ModeListValue) -> Result<()> {
    let raw = match value {
        ModeListValue::Single(s) => RegValue {
            bytes: encode_utf16(&[s.as_str()], false),
            vtype: REG_SZ,
        },
        ModeListValue::Multi(parts) => {
            let parts: Vec<&str> = parts.iter().map(String::as_str).collect();
            RegValue {
                bytes: encode_utf16(&parts, true),
                vtype: REG_MULTI_SZ,
            }
        }
    };

    key.set_raw_value(value_name, &raw)
        .map_err(|e| RegistryError::SetValueError(format!("'{}': {}", value_name, e)).into())
}

fn decode_utf16(bytes: &[u8]) -> String {
    String::from_utf16_lossy(
        &bytes
            .chunks_exact(2)
            .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
            .collect::<Vec<u16>>(),
    )
}

/// Every string is NUL terminated; a multi-string gets one extra NUL at the end.
fn encode_utf16(parts: &[&str], multi: bool) -> Vec<u8> {
    let mut units: Vec<u16> = Vec::new();
    for part in parts {
        units.extend(part.encode_utf16());
        units.push(0);
    }
    if multi {
        units.push(0);
    }
    units.iter().flat_map(|u| u.to_le_bytes()).collect()
}

/// `AdapterStore` over the real registry, rooted at a device class path.
pub struct RegistryAdapterStore {
    class_path: String,
}

impl RegistryAdapterStore {
    pub fn new(class_path: impl Into<String>) -> Self {
        Self {
            class_path: class_path.into(),
        }
    }

    fn open(&self, subkey: Option<&str>, flags: u32) -> Result<RegKey> {
        let (hive, class_subkey) = parse_registry_path(&self.class_path)?;
        let path = match subkey {
            Some(name) => format!("{}\\{}", class_subkey, name),
            None => class_subkey,
        };
        hive.open_subkey_with_flags(&path, flags)
            .map_err(|e| RegistryError::KeyOpenError(format!("'{}': {}", path, e)).into())
    }
}

impl AdapterStore for RegistryAdapterStore {
    fn adapter_keys(&self) -> Result<Vec<String>> {
        let class = self
            .open(None, KEY_READ)
            .with_context(|| format!("Failed to open display class '{}'", self.class_path))?;

        let mut keys = Vec::new();
        for name in class.enum_keys() {
            let name = name.context("Failed to enumerate display adapter keys")?;
            if is_adapter_key_name(&name) {
                keys.push(name);
            }
        }
        tracing::debug!("Found {} adapter key(s) under '{}'.", keys.len(), self.class_path);
        Ok(keys)
    }

    fn read_modes(&self, key: &str) -> Result<Option<ModeListValue>> {
        let adapter = match self.open(Some(key), KEY_READ) {
            Ok(adapter) => adapter,
            // Some adapter keys are ACL-protected; treat them like keys without the value.
            Err(e) => {
                tracing::debug!("{} -> Skipping unreadable key: {}", key, e);
                return Ok(None);
            }
        };
        read_string_value(&adapter, NV_MODES_VALUE)
    }

    fn write_modes(&self, key: &str, value: &ModeListValue) -> Result<()> {
        let adapter = self.open(Some(key), KEY_READ | KEY_SET_VALUE)?;
        write_string_value(&adapter, NV_MODES_VALUE, value)
    }
}
