//! # CLI Interface
//!
//! Command-line argument structure for `moltbook-node` using `clap`
//! derive. Four subcommands: `run`, `keygen`, `status`, and `version`.
//! Every configurable value has an environment-variable fallback for
//! container deployment.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Moltbook Agent Privacy Layer node.
///
/// Stores agent records, channel metadata, wrapped channel keys, and
/// end-to-end encrypted message envelopes. Never holds a private key and
/// never sees plaintext.
#[derive(Parser, Debug)]
#[command(
    name = "moltbook-node",
    about = "Moltbook Agent Privacy Layer node",
    version,
    propagate_version = true
)]
pub struct NodeCli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the privacy node.
    Run(RunArgs),
    /// Generate a client-side agent identity (keypairs + DID) and write
    /// it to a credentials file. Runs entirely offline.
    Keygen(KeygenArgs),
    /// Query the health endpoint of a running node.
    Status(StatusArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to the node data directory holding the blob store.
    ///
    /// Created on first run if it does not exist.
    #[arg(long, short = 'd', env = "MOLTBOOK_DATA_DIR", default_value = "~/.moltbook")]
    pub data_dir: PathBuf,

    /// Port for the HTTP API.
    #[arg(long, env = "MOLTBOOK_API_PORT", default_value_t = moltbook_protocol::config::DEFAULT_API_PORT)]
    pub api_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "MOLTBOOK_METRICS_PORT", default_value_t = moltbook_protocol::config::DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Keep everything in memory: no blob survives a restart. For local
    /// hacking and integration tests only.
    #[arg(long)]
    pub ephemeral: bool,

    /// Seconds between TTL sweeper passes. 0 disables the sweeper.
    #[arg(long, env = "MOLTBOOK_SWEEP_INTERVAL", default_value_t = 300)]
    pub sweep_interval_secs: u64,

    /// Log verbosity level: trace, debug, info, warn, error.
    #[arg(long, env = "MOLTBOOK_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format: pretty or json.
    #[arg(long, env = "MOLTBOOK_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

/// Arguments for the `keygen` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct KeygenArgs {
    /// Where to write the credentials file.
    #[arg(long, short = 'o', default_value = "agent-credentials.json")]
    pub out: PathBuf,

    /// Display name to embed in the generated registration profile.
    #[arg(long)]
    pub display_name: Option<String>,

    /// Overwrite an existing credentials file. This destroys the old
    /// identity; messages wrapped for it become unreadable.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `status` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct StatusArgs {
    /// Base URL of the running node.
    #[arg(long, default_value = "http://127.0.0.1:8730")]
    pub api_url: String,
}

/// Expand a leading `~` to the user's home directory. Paths without the
/// prefix pass through unchanged.
pub fn resolve_data_dir(path: &std::path::Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    if path_str.starts_with("~/") || path_str == "~" {
        if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
            return home.join(path_str.strip_prefix("~/").unwrap_or(""));
        }
    }
    path.to_path_buf()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        NodeCli::command().debug_assert();
    }

    #[test]
    fn run_subcommand_defaults() {
        let args = NodeCli::parse_from(["moltbook-node", "run"]);
        match args.command {
            Commands::Run(run) => {
                assert_eq!(run.api_port, 8730);
                assert_eq!(run.metrics_port, 8731);
                assert!(!run.ephemeral);
                assert_eq!(run.sweep_interval_secs, 300);
                assert_eq!(run.log_level, "info");
                assert_eq!(run.log_format, "pretty");
            }
            _ => panic!("expected Run subcommand"),
        }
    }

    #[test]
    fn run_subcommand_custom_values() {
        let args = NodeCli::parse_from([
            "moltbook-node",
            "run",
            "--api-port",
            "9000",
            "--metrics-port",
            "9001",
            "--ephemeral",
            "--sweep-interval-secs",
            "30",
            "--data-dir",
            "/tmp/moltbook-test",
        ]);
        match args.command {
            Commands::Run(run) => {
                assert_eq!(run.api_port, 9000);
                assert_eq!(run.metrics_port, 9001);
                assert!(run.ephemeral);
                assert_eq!(run.sweep_interval_secs, 30);
                assert_eq!(run.data_dir, PathBuf::from("/tmp/moltbook-test"));
            }
            _ => panic!("expected Run subcommand"),
        }
    }

    #[test]
    fn keygen_subcommand_defaults() {
        let args = NodeCli::parse_from(["moltbook-node", "keygen"]);
        match args.command {
            Commands::Keygen(keygen) => {
                assert_eq!(keygen.out, PathBuf::from("agent-credentials.json"));
                assert!(keygen.display_name.is_none());
                assert!(!keygen.force);
            }
            _ => panic!("expected Keygen subcommand"),
        }
    }

    #[test]
    fn keygen_with_name_and_force() {
        let args = NodeCli::parse_from([
            "moltbook-node",
            "keygen",
            "--display-name",
            "scout",
            "--force",
            "-o",
            "/tmp/id.json",
        ]);
        match args.command {
            Commands::Keygen(keygen) => {
                assert_eq!(keygen.display_name.as_deref(), Some("scout"));
                assert!(keygen.force);
                assert_eq!(keygen.out, PathBuf::from("/tmp/id.json"));
            }
            _ => panic!("expected Keygen subcommand"),
        }
    }

    #[test]
    fn status_subcommand_defaults() {
        let args = NodeCli::parse_from(["moltbook-node", "status"]);
        match args.command {
            Commands::Status(status) => {
                assert_eq!(status.api_url, "http://127.0.0.1:8730");
            }
            _ => panic!("expected Status subcommand"),
        }
    }

    #[test]
    fn version_subcommand_parses() {
        let args = NodeCli::parse_from(["moltbook-node", "version"]);
        assert!(matches!(args.command, Commands::Version));
    }

    #[test]
    fn resolve_data_dir_expands_tilde() {
        let resolved = resolve_data_dir(&PathBuf::from("~/.moltbook"));
        assert!(
            !resolved.to_string_lossy().starts_with('~'),
            "tilde should have been expanded: {:?}",
            resolved
        );
    }

    #[test]
    fn resolve_data_dir_absolute_unchanged() {
        let path = PathBuf::from("/var/lib/moltbook");
        assert_eq!(resolve_data_dir(&path), path);
    }
}
