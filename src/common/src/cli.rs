use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Common CLI arguments for the registrar binary
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    #[arg(long, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, help = "Enable quiet mode (minimal output)")]
    pub quiet: bool,
}

/// Common subcommands
#[derive(Subcommand, Debug, Clone, Default, PartialEq, Eq)]
pub enum CommonCommands {
    /// Start the service (default behavior)
    #[default]
    Start,
    /// Show current configuration and exit
    Config {
        #[arg(long, help = "Show configuration in JSON format")]
        json: bool,
    },
    /// Validate configuration and exit
    Validate,
    /// Show version information and exit
    Version,
}

/// Utility functions for CLI operations
pub mod utils {
    use super::*;
    use crate::config::Configuration;
    use anyhow::{Context, Result};
    use std::net::ToSocketAddrs;
    use tracing_subscriber::EnvFilter;

    /// Default log level for the given arguments; `RUST_LOG` takes precedence
    pub fn log_level(args: &CommonArgs) -> &'static str {
        if args.quiet {
            "warn"
        } else if args.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// Initialize logging based on CLI arguments
    pub fn init_logging(args: &CommonArgs) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(log_level(args)));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    /// Load configuration with optional override from CLI
    pub fn load_config(config_path: Option<&PathBuf>) -> Result<Configuration> {
        match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Configuration::load_from_path(path).context("Failed to load configuration")
            }
            None => Configuration::load().context("Failed to load configuration"),
        }
    }

    /// Copy of the configuration that is safe to print
    pub fn redacted(config: &Configuration) -> Configuration {
        let mut config = config.clone();
        if config.consul.token.is_some() {
            config.consul.token = Some(String::from("<redacted>"));
        }
        if config.consul.auth.is_some() {
            config.consul.auth = Some(String::from("<redacted>"));
        }
        config
    }

    /// Display configuration in human-readable or JSON format
    pub fn display_config(config: &Configuration, json: bool) -> Result<()> {
        let config = redacted(config);
        if json {
            let json = serde_json::to_string_pretty(&config)
                .context("Failed to serialize configuration to JSON")?;
            println!("{json}");
        } else {
            println!("Registrar Configuration:");
            println!("========================");
            println!("Listen address: {}", config.address);
            println!("Consul address: {}", config.consul.addr);
            println!("Consul SSL: {}", config.consul.ssl);
            println!("Consul SSL verify: {}", config.consul.ssl_verify);
            println!(
                "Consul token: {}",
                config.consul.token.as_deref().unwrap_or("<none>")
            );
            println!(
                "Consul datacenter: {}",
                config.consul.datacenter.as_deref().unwrap_or("<agent default>")
            );
        }
        Ok(())
    }

    /// Validate configuration and report any issues
    pub fn validate_config(config: &Configuration) -> Result<()> {
        log::info!("Validating configuration...");

        if config.address.is_empty() {
            anyhow::bail!("Listen address cannot be empty");
        }

        config
            .bind_address()
            .to_socket_addrs()
            .with_context(|| format!("Invalid listen address: {}", config.address))?;

        if config.consul.addr.trim().is_empty() {
            anyhow::bail!("Consul address cannot be empty");
        }

        log::info!("Configuration validation passed");
        Ok(())
    }

    /// Handle common CLI commands that don't require starting the server
    pub fn handle_common_command(command: &CommonCommands, config: &Configuration) -> Result<bool> {
        match command {
            CommonCommands::Config { json } => {
                display_config(config, *json)?;
                Ok(true)
            }
            CommonCommands::Validate => {
                validate_config(config)?;
                Ok(true)
            }
            CommonCommands::Version => {
                println!("{}", version_info());
                Ok(true)
            }
            CommonCommands::Start => Ok(false),
        }
    }

    /// Standard version information
    pub fn version_info() -> String {
        format!(
            "{} {} ({})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            env!("CARGO_PKG_RUST_VERSION")
        )
    }
}
