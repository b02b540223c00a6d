//! CLI module for the Cloud Billing Exporter
//!
//! - `serve`: test the configured sources and expose their costs (default)
//! - `check`: test the configured sources once and report which work

pub mod check;
pub mod serve;

use std::net::SocketAddr;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;

/// Cloud Billing Exporter - AWS and GCP billing data as Prometheus cost counters
#[derive(Parser, Debug)]
#[command(name = "cloud-billing-exporter")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file, replaces config/local
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Address to listen on, e.g. 0.0.0.0:9660
    #[arg(long, global = true)]
    pub listen_address: Option<SocketAddr>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Serve the cost metrics over HTTP (default)
    Serve,

    /// Test every configured billing source once
    Check,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Serve)
    }

    /// Load the layered configuration and apply the command-line overrides
    pub fn load_config(&self) -> anyhow::Result<AppConfig> {
        let mut config = AppConfig::load_from(self.config.as_deref())?;

        if let Some(addr) = self.listen_address {
            config.server.host = addr.ip().to_string();
            config.server.port = addr.port();
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_is_default() {
        let cli = Cli::parse_from(["cloud-billing-exporter"]);
        assert_eq!(cli.command(), Command::Serve);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "cloud-billing-exporter",
            "check",
            "--listen-address",
            "127.0.0.1:9900",
        ]);

        assert_eq!(cli.command(), Command::Check);
        assert_eq!(cli.listen_address, Some("127.0.0.1:9900".parse().unwrap()));
    }

    #[test]
    fn test_listen_address_overrides_server() {
        let cli = Cli::parse_from([
            "cloud-billing-exporter",
            "--listen-address",
            "127.0.0.1:9900",
        ]);

        let config = cli.load_config().unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9900);
    }
}
