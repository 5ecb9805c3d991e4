//! Run configuration.
//!
//! Every field has a default, so a config can come from `RunConfig::default()`, from the
//! environment, or from a partial JSON document.

use serde::Deserialize;
use termcolor::ColorChoice;

use crate::diagnostics::ArborError;
use crate::err_msg;

pub const ENV_COLOR: &str = "ARBOR_COLOR";
pub const ENV_QUIET_PANICS: &str = "ARBOR_QUIET_PANICS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(ColorMode::Auto),
            "always" => Some(ColorMode::Always),
            "never" => Some(ColorMode::Never),
            _ => None,
        }
    }

    /// Resolves `Auto` against whether stdout is a terminal.
    pub fn resolve(self) -> ColorChoice {
        match self {
            ColorMode::Always => ColorChoice::Always,
            ColorMode::Never => ColorChoice::Never,
            ColorMode::Auto if atty::is(atty::Stream::Stdout) => ColorChoice::Auto,
            ColorMode::Auto => ColorChoice::Never,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub color: ColorMode,
    /// Silence the process panic hook while examples run; failures are still recorded.
    pub quiet_panics: bool,
}

impl RunConfig {
    /// Reads `ARBOR_COLOR` (`auto|always|never`) and `ARBOR_QUIET_PANICS` (`1|true|yes`).
    ///
    /// # Errors
    /// An `Internal` error naming the variable when a value cannot be parsed.
    pub fn from_env() -> Result<Self, ArborError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_json(json: &str) -> Result<Self, ArborError> {
        serde_json::from_str(json).map_err(|e| err_msg!(Internal, "invalid run config: {}", e))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ArborError> {
        let mut config = RunConfig::default();
        if let Some(raw) = lookup(ENV_COLOR) {
            config.color = ColorMode::parse(&raw).ok_or_else(|| {
                err_msg!(Internal, "{} must be auto, always or never, got {:?}", ENV_COLOR, raw)
            })?;
        }
        if let Some(raw) = lookup(ENV_QUIET_PANICS) {
            config.quiet_panics = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" | "" => false,
                _ => {
                    return Err(err_msg!(
                        Internal,
                        "{} must be a boolean, got {:?}",
                        ENV_QUIET_PANICS,
                        raw
                    ))
                }
            };
        }
        Ok(config)
    }
}
