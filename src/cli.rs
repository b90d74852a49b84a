//! Command line interface for the `intellichem2mqtt` binary.
//!
//! Kept free of crate imports so the build script can include it to render
//! the man page.

use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;

/// Command line arguments for the `intellichem2mqtt` binary.
#[derive(Debug, Parser)]
#[command(
    name = "intellichem2mqtt",
    version,
    disable_version_flag = true,
    about = "Bridge a Pentair IntelliChem controller on RS-485 to MQTT"
)]
pub struct Cli {
    /// Path to the YAML configuration file. A missing file falls back to
    /// environment variables and defaults.
    #[arg(short, long, default_value = "/etc/intellichem2mqtt/config.yaml")]
    pub config: PathBuf,

    /// Print a configuration file with every default and exit.
    #[arg(long)]
    pub generate_config: bool,

    /// Serve Prometheus metrics on this address.
    #[arg(long, value_name = "ADDR")]
    pub metrics_listen: Option<SocketAddr>,

    /// Print version.
    #[arg(short = 'v', long, action = clap::ArgAction::Version)]
    pub version: Option<bool>,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::Cli;

    #[test]
    fn config_path_defaults() {
        let cli = Cli::parse_from(["intellichem2mqtt"]);
        assert_eq!(cli.config.to_str(), Some("/etc/intellichem2mqtt/config.yaml"));
        assert!(!cli.generate_config);
        assert!(cli.metrics_listen.is_none());
    }

    #[test]
    fn parses_short_config_and_metrics_address() {
        let cli = Cli::parse_from([
            "intellichem2mqtt",
            "-c",
            "pool.yaml",
            "--metrics-listen",
            "127.0.0.1:9100",
        ]);
        assert_eq!(cli.config.to_str(), Some("pool.yaml"));
        assert_eq!(cli.metrics_listen.map(|a| a.port()), Some(9100));
    }

    #[test]
    fn short_v_prints_version() {
        let err = Cli::try_parse_from(["intellichem2mqtt", "-v"]).expect_err("version exits");
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }
}
