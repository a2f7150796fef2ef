//! # Output Configuration
//!
//! Controls how the CLI decorates its output. Colors and emoji markers are
//! used together; when either is unwanted, plain bracketed markers are
//! printed instead.
//!
//! The following are respected, in this order:
//! - `--color=never|always|auto`
//! - `NO_COLOR` disables colors when set (https://no-color.org/)
//! - `CLICOLOR=0` disables colors
//! - `CLICOLOR_FORCE=1` forces colors even without a TTY
//! - `TERM=dumb` disables colors
//!
//! ```rust
//! use configspec::output::{OutputConfig, Status};
//!
//! let out = OutputConfig::from_env_and_flag("never");
//! assert_eq!(Status::Ok.marker(&out), "[OK]");
//! ```

use std::env;

use console::{style, StyledObject};

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub use_color: bool,
}

impl OutputConfig {
    /// Build from the environment and the value of `--color`
    /// (`always`, `never` or `auto`).
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    fn detect_color_support() -> bool {
        // Presence alone disables colors, even when empty.
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }

        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }

        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }

        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        console::Term::stdout().features().colors_supported()
    }

    /// Make `console` styling follow this configuration on both streams.
    pub fn install(&self) {
        console::set_colors_enabled(self.use_color);
        console::set_colors_enabled_stderr(self.use_color);
    }

    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// `emoji_str` when colors are enabled, `plain` otherwise.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

/// Line markers used by the commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
    Warning,
    Scan,
    Fetch,
    Remove,
    Exclude,
}

impl Status {
    pub fn marker(self, config: &OutputConfig) -> &'static str {
        match self {
            Status::Ok => emoji(config, "✅", "[OK]"),
            Status::Error => emoji(config, "❌", "[ERR]"),
            Status::Warning => emoji(config, "⚠️ ", "[WARN]"),
            Status::Scan => emoji(config, "🔍", "[SCAN]"),
            Status::Fetch => emoji(config, "📥", "[FETCH]"),
            Status::Remove => emoji(config, "🗑️ ", "[REMOVE]"),
            Status::Exclude => emoji(config, "🚫", "[EXCL]"),
        }
    }
}

/// Dim text for secondary details such as rule line numbers.
pub fn dim<D>(text: D) -> StyledObject<D> {
    style(text).dim()
}
