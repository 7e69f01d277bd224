//! Runtime configuration.
//!
//! Read from the environment once per process:
//! - `PORTSL_TRANSCODER`: `auto` (default), `wide`, `codeset` or `raw`.
//!   Selects how OS error text is converted to UTF-8.
//! - `PORTSL_SELF_DIR_FALLBACK`: `1`/`true`/`on` (default) or
//!   `0`/`false`/`off`. Controls the retry next to the library's own
//!   location after a failed load.

use std::sync::OnceLock;

/// Environment variable naming the error-text strategy.
pub const TRANSCODER_ENV: &str = "PORTSL_TRANSCODER";
/// Environment variable toggling the self-directory retry.
pub const SELF_DIR_FALLBACK_ENV: &str = "PORTSL_SELF_DIR_FALLBACK";

/// Error-text conversion strategy.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TranscoderChoice {
    /// Platform default.
    #[default]
    Auto,
    /// Locale multibyte decode, one character at a time.
    WideChar,
    /// Whole-codeset conversion to UTF-8.
    Codeset,
    /// Byte copy, no conversion.
    Raw,
}

impl TranscoderChoice {
    /// Parse from string (case-insensitive). Unknown values are `Auto`.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "wide" | "widechar" | "mbtowc" => Self::WideChar,
            "codeset" | "iconv" => Self::Codeset,
            "raw" | "none" | "off" => Self::Raw,
            _ => Self::Auto,
        }
    }
}

fn parse_switch(raw: &str, default: bool) -> bool {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => true,
        "0" | "false" | "off" | "no" => false,
        _ => default,
    }
}

/// Shared-library layer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlConfig {
    pub transcoder: TranscoderChoice,
    pub self_dir_fallback: bool,
}

impl Default for SlConfig {
    fn default() -> Self {
        Self {
            transcoder: TranscoderChoice::Auto,
            self_dir_fallback: true,
        }
    }
}

impl SlConfig {
    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            transcoder: lookup(TRANSCODER_ENV)
                .map(|v| TranscoderChoice::from_str_loose(&v))
                .unwrap_or(defaults.transcoder),
            self_dir_fallback: lookup(SELF_DIR_FALLBACK_ENV)
                .map(|v| parse_switch(&v, defaults.self_dir_fallback))
                .unwrap_or(defaults.self_dir_fallback),
        }
    }

    /// Read the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

static CACHED: OnceLock<SlConfig> = OnceLock::new();

/// Process-wide configuration, resolved on first call.
#[must_use]
pub fn sl_config() -> SlConfig {
    *CACHED.get_or_init(SlConfig::from_env)
}
