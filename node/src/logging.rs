//! # Structured Logging
//!
//! Tracing setup for the node binary, driven by a [`LogConfig`] resolved
//! from the CLI flags. The configured level is scoped to this binary's
//! own crates; `RUST_LOG`, when set, replaces the whole directive set.
//!
//! Output goes to stderr so stdout stays clean for CLI results.

use tracing_subscriber::EnvFilter;

/// Logging configuration for the node.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Level applied to `moltbook_node` and `moltbook_protocol`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl LogConfig {
    /// Resolve a config from the `--log-level` and `--log-format` flags.
    /// Any format string other than `json` (case-insensitive) means
    /// human-readable output.
    pub fn new(level: &str, format: &str) -> Self {
        Self {
            level: level.to_string(),
            json: format.eq_ignore_ascii_case("json"),
        }
    }

    /// The directive set: the configured level on our own crates, HTTP
    /// tracing capped at info. `RUST_LOG` overrides all of it, e.g.
    /// `RUST_LOG=moltbook_node=debug,moltbook_protocol=trace`.
    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "moltbook_node={level},moltbook_protocol={level},tower_http=info",
                level = self.level
            ))
        })
    }

    /// Install the global subscriber. Call once, before any spans open;
    /// a second call panics.
    pub fn install(self) {
        let builder = tracing_subscriber::fmt()
            .with_env_filter(self.filter())
            .with_writer(std::io::stderr)
            .with_target(true);
        if self.json {
            builder.json().init();
        } else {
            builder.with_file(true).with_line_number(true).init();
        }
        tracing::info!(json = self.json, "logging initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_flag_parsing() {
        assert!(LogConfig::new("info", "json").json);
        assert!(LogConfig::new("info", "JSON").json);
        assert!(!LogConfig::new("info", "pretty").json);
        assert!(!LogConfig::new("debug", "anything-else").json);
    }

    #[test]
    fn level_is_carried_verbatim() {
        assert_eq!(LogConfig::new("trace", "pretty").level, "trace");
    }
}
