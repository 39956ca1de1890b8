// src/nv_modes/codec.rs

use std::fmt;

use crate::constants::{MODE_COLOR_DEPTHS, MODE_FLAG};

/// A single `{width}x{height}x{depths}={flag};` entry of an `NV_Modes` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeEntry {
    pub width: u32,
    pub height: u32,
    pub depths: Vec<u32>,
    pub flag: String,
}

impl ModeEntry {
    /// Builds the entry this tool writes: every color depth and the standard flag.
    pub fn custom(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depths: MODE_COLOR_DEPTHS.to_vec(),
            flag: MODE_FLAG.to_string(),
        }
    }

    /// Parses a token of the form `<digits>x<digits>x<digits,...>=<hex>;`.
    ///
    /// Returns `None` for anything else, including vendor tokens such as
    /// `{*}S` or `SHV`, which the caller keeps verbatim.
    pub fn parse(token: &str) -> Option<Self> {
        let body = token.strip_suffix(';')?;
        let (mode, flag) = body.split_once('=')?;
        if flag.is_empty() || !flag.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }

        let mut parts = mode.splitn(3, 'x');
        let width = parse_digits(parts.next()?)?;
        let height = parse_digits(parts.next()?)?;
        let depths = parts
            .next()?
            .split(',')
            .map(parse_digits)
            .collect::<Option<Vec<_>>>()?;

        Some(Self {
            width,
            height,
            depths,
            flag: flag.to_string(),
        })
    }

    /// The substring that identifies this resolution inside a mode list,
    /// regardless of its depth set and flag.
    pub fn resolution_marker(width: u32, height: u32) -> String {
        format!("{}x{}x", width, height)
    }
}

impl fmt::Display for ModeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let depths = self
            .depths
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "{}x{}x{}={};", self.width, self.height, depths, self.flag)
    }
}

fn parse_digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// One whitespace-separated token of a decoded mode list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeToken {
    Entry(ModeEntry),
    Reserved(String),
}

/// Splits a decoded mode list into entries and opaque vendor tokens.
pub fn tokenize(decoded: &str) -> Vec<ModeToken> {
    decoded
        .split_whitespace()
        .map(|token| match ModeEntry::parse(token) {
            Some(entry) => ModeToken::Entry(entry),
            None => ModeToken::Reserved(token.to_string()),
        })
        .collect()
}

/// Raw `NV_Modes` content as stored in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeListValue {
    /// `REG_SZ`
    Single(String),
    /// `REG_MULTI_SZ`
    Multi(Vec<String>),
}

impl ModeListValue {
    /// Logical mode list. Array parts are joined without a separator, the
    /// same way the driver reads them.
    pub fn decode(&self) -> String {
        match self {
            ModeListValue::Single(s) => s.clone(),
            ModeListValue::Multi(parts) => parts.concat(),
        }
    }

    /// Wraps `content` in the same representation as `self`.
    pub fn encode_like(&self, content: String) -> ModeListValue {
        match self {
            ModeListValue::Single(_) => ModeListValue::Single(content),
            ModeListValue::Multi(_) => ModeListValue::Multi(vec![content]),
        }
    }
}

/// Appends a custom entry for `width`x`height` to a decoded list.
///
/// Returns `None` when the resolution is already listed under any depth set.
pub fn merge_entry(decoded: &str, width: u32, height: u32) -> Option<String> {
    let entry = ModeEntry::custom(width, height).to_string();

    if decoded.trim().is_empty() {
        return Some(entry);
    }

    // Unanchored match: a longer number ending in the same digits also counts.
    if decoded.contains(&ModeEntry::resolution_marker(width, height)) {
        return None;
    }

    let merged = format!("{} {}", decoded.trim_end(), entry);
    Some(merged.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_entry_text() {
        assert_eq!(
            ModeEntry::custom(1566, 1080).to_string(),
            "1566x1080x8,16,32,64=1F;"
        );
    }

    #[test]
    fn test_parse_entry() {
        let entry = ModeEntry::parse("1920x1080x8,16,32=1F;").unwrap();
        assert_eq!(entry.width, 1920);
        assert_eq!(entry.height, 1080);
        assert_eq!(entry.depths, vec![8, 16, 32]);
        assert_eq!(entry.flag, "1F");
        assert_eq!(entry.to_string(), "1920x1080x8,16,32=1F;");
    }

    #[test]
    fn test_parse_rejects_vendor_tokens() {
        let tokens = ["{*}S", "SHV", "1920x1080=1F;", "1920x1080x8,16=1F", "axbx8=1F;", "1x2x8=ZZ;"];
        for token in tokens {
            assert!(ModeEntry::parse(token).is_none(), "'{}' should not parse", token);
        }
    }

    #[test]
    fn test_tokenize_keeps_reserved_tokens() {
        let tokens = tokenize("{*}S 800x600x8,16,32,64=1F; SHV");
        assert_eq!(
            tokens,
            vec![
                ModeToken::Reserved("{*}S".to_string()),
                ModeToken::Entry(ModeEntry::custom(800, 600)),
                ModeToken::Reserved("SHV".to_string()),
            ]
        );
    }

    #[test]
    fn test_merge_appends_with_single_space() {
        let merged = merge_entry("1920x1080x8,16,32=1F;", 2100, 1440);
        assert_eq!(
            merged.as_deref(),
            Some("1920x1080x8,16,32=1F; 2100x1440x8,16,32,64=1F;")
        );
    }

    #[test]
    fn test_merge_trims_trailing_whitespace() {
        let merged = merge_entry("SHV 1920x1080x8,16,32=1F;  \t", 2100, 1440);
        assert_eq!(
            merged.as_deref(),
            Some("SHV 1920x1080x8,16,32=1F; 2100x1440x8,16,32,64=1F;")
        );
    }

    #[test]
    fn test_merge_into_empty_list() {
        assert_eq!(
            merge_entry("", 1566, 1080).as_deref(),
            Some("1566x1080x8,16,32,64=1F;")
        );
        assert_eq!(
            merge_entry("   ", 1566, 1080).as_deref(),
            Some("1566x1080x8,16,32,64=1F;")
        );
    }

    #[test]
    fn test_merge_detects_existing_resolution_with_other_depths() {
        assert_eq!(merge_entry("{*}S 2100x1440x8,16=1F;", 2100, 1440), None);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let once = merge_entry("1920x1080x8,16,32=1F;", 2100, 1440).unwrap();
        assert_eq!(merge_entry(&once, 2100, 1440), None);
    }

    #[test]
    fn test_decode_multi_concatenates_without_separator() {
        let value = ModeListValue::Multi(vec![
            "1920x1080x8,16,32=1F; ".to_string(),
            "1280x720x8,16,32=1F;".to_string(),
        ]);
        assert_eq!(value.decode(), "1920x1080x8,16,32=1F; 1280x720x8,16,32=1F;");
    }

    #[test]
    fn test_encode_like_preserves_representation() {
        let multi = ModeListValue::Multi(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(
            multi.encode_like("ab c".to_string()),
            ModeListValue::Multi(vec!["ab c".to_string()])
        );

        let single = ModeListValue::Single("a".to_string());
        assert_eq!(
            single.encode_like("a b".to_string()),
            ModeListValue::Single("a b".to_string())
        );
    }
}
