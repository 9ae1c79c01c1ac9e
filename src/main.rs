use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::catalog::ConsulCatalog;
use common::cli::{CommonArgs, CommonCommands, utils};
use registration::{CatalogState, REGISTRATION_PREFIX, create_router};

#[derive(Parser)]
#[command(name = "registrar")]
#[command(about = "Serves Consul catalog instances as registration documents")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Option<RegistrarCommands>,
}

#[derive(Subcommand)]
enum RegistrarCommands {
    #[command(flatten)]
    Common(CommonCommands),
}

impl Default for RegistrarCommands {
    fn default() -> Self {
        Self::Common(CommonCommands::Start)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    utils::init_logging(&cli.common);

    let config = utils::load_config(cli.common.config.as_ref())?;

    let command = cli.command.unwrap_or_default();
    let RegistrarCommands::Common(ref common_cmd) = command;
    if utils::handle_common_command(common_cmd, &config)? {
        return Ok(());
    }

    let catalog = ConsulCatalog::new(config.consul.clone());
    log::info!("Using Consul catalog at {}", catalog.config().addr);

    let app = create_router(CatalogState::new(catalog));

    let bind_address = config.bind_address();
    log::info!("Starting server on {bind_address}");
    let listener = match tokio::net::TcpListener::bind(bind_address.as_str()).await {
        Ok(listener) => listener,
        Err(e) => {
            log::error!("Failed to start listener on {bind_address}: {e}");
            return Err(e).context("Failed to start listener");
        }
    };

    log::info!("Serving registrations under {REGISTRATION_PREFIX}");
    axum::serve(listener, app.into_make_service())
        .await
        .context("HTTP server error")?;

    Ok(())
}
