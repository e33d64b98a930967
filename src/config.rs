use std::path::PathBuf;

use crate::locale::Lang;

/// Process settings, read from `HOMEDAY_*` environment variables.
/// Values that do not parse fall back to their defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub user: String,
    pub legacy_file: Option<PathBuf>,
    pub lang: Lang,
    pub history: bool,
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            user: "local".into(),
            legacy_file: None,
            lang: Lang::En,
            history: false,
            compact_threshold: 1000,
            metrics_port: None,
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            data_dir: get("HOMEDAY_DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            user: get("HOMEDAY_USER")
                .filter(|u| !u.trim().is_empty())
                .unwrap_or(defaults.user),
            legacy_file: get("HOMEDAY_LEGACY_FILE")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            lang: get("HOMEDAY_LANG")
                .map(|code| Lang::from_code(&code))
                .unwrap_or(defaults.lang),
            history: get("HOMEDAY_HISTORY")
                .and_then(|s| parse_bool(&s))
                .unwrap_or(defaults.history),
            compact_threshold: get("HOMEDAY_COMPACT_THRESHOLD")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.compact_threshold),
            metrics_port: get("HOMEDAY_METRICS_PORT").and_then(|s| s.parse().ok()),
        }
    }
}
