//! Logging setup shared by the Crosspost binaries
//!
//! Everything goes to stderr so stdout stays reserved for post ids and
//! authorization URLs. `CROSSPOST_LOG_FORMAT` and `CROSSPOST_LOG_LEVEL`
//! pick the defaults; `RUST_LOG` replaces the whole filter when set.
//!
//! ```no_run
//! use libcrosspost::logging::{LogFormat, LoggingConfig};
//!
//! LoggingConfig::from_env(false).with_format(LogFormat::Json).init();
//! ```

use std::str::FromStr;

use tracing_subscriber::EnvFilter;

/// HTTP and SQL internals log request bodies at debug level. Those can carry
/// tokens, so they stay at `warn` unless `RUST_LOG` asks otherwise.
const QUIET_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls", "sqlx"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Plain lines without target, for terminals and pipes
    #[default]
    Text,
    /// One JSON object per line
    Json,
    /// Multi-line with file and line numbers
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(format!(
                "Invalid log format: '{}'. Valid options: text, json, pretty",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
    pub verbose: bool,
}

impl LoggingConfig {
    pub fn new(format: LogFormat, level: impl Into<String>, verbose: bool) -> Self {
        Self {
            format,
            level: level.into(),
            verbose,
        }
    }

    /// Defaults to text output at `warn`. An unparseable
    /// `CROSSPOST_LOG_FORMAT` falls back to text.
    pub fn from_env(verbose: bool) -> Self {
        let format = std::env::var("CROSSPOST_LOG_FORMAT")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or_default();
        let level = std::env::var("CROSSPOST_LOG_LEVEL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| "warn".to_string());

        Self::new(format, level, verbose)
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Filter directive used when `RUST_LOG` is unset
    fn directives(&self) -> String {
        let base = if self.verbose { "debug" } else { self.level.as_str() };

        std::iter::once(base.to_string())
            .chain(QUIET_TARGETS.iter().map(|target| format!("{}=warn", target)))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Install the global subscriber. Later calls are no-ops.
    pub fn init(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.directives()));
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr);

        let installed = match self.format {
            LogFormat::Text => builder.with_target(false).try_init(),
            LogFormat::Json => builder
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .try_init(),
            LogFormat::Pretty => builder
                .pretty()
                .with_file(true)
                .with_line_number(true)
                .try_init(),
        };

        if installed.is_err() {
            tracing::trace!("subscriber already installed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!(" JSON ".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("Pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);

        let err = "xml".parse::<LogFormat>().unwrap_err();
        assert!(err.contains("Invalid log format: 'xml'"));
    }

    #[test]
    fn test_verbose_forces_debug() {
        let config = LoggingConfig::new(LogFormat::Text, "error", true);
        assert!(config.directives().starts_with("debug,"));

        let config = LoggingConfig::new(LogFormat::Text, "error", false);
        assert!(config.directives().starts_with("error,"));
    }

    #[test]
    fn test_transport_crates_stay_quiet() {
        let directives = LoggingConfig::new(LogFormat::Json, "trace", false).directives();
        assert!(directives.contains("reqwest=warn"));
        assert!(directives.contains("sqlx=warn"));
    }

    #[test]
    fn test_with_format_overrides() {
        let config =
            LoggingConfig::new(LogFormat::Text, "info", false).with_format(LogFormat::Pretty);
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.level, "info");
    }
}
