use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use assetvault::config::Config;
use assetvault::server::{AppState, create_router};
use assetvault::services::Services;

#[derive(Parser)]
#[command(name = "assetvault")]
#[command(about = "Sharded per-user asset storage server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Serve {
        /// Path to a TOML config file (defaults to $ASSETVAULT_CONFIG)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Host to bind to, overriding the config file
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to, overriding the config file
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Create the data directory and every store's schema, then exit
    Init {
        /// Path to a TOML config file (defaults to $ASSETVAULT_CONFIG)
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
}

fn run_init(config: &Config) -> anyhow::Result<()> {
    Services::open(config)?.health_check()?;

    println!();
    println!("Initialized {} shard store(s):", config.database.shards_count);
    for i in 0..config.database.shards_count {
        println!("  {}", config.database.shard_path(i).display());
    }
    println!("Users and tokens: {}", config.database.unsharded_path().display());
    println!();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("assetvault=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { config } => {
            let config = Config::load(config.as_deref())?;
            run_init(&config)?;
        }
        Commands::Serve { config, host, port } => {
            let mut config = Config::load(config.as_deref())?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            let services = tokio::task::spawn_blocking({
                let config = config.clone();
                move || Services::open(&config)
            })
            .await??;

            let state = Arc::new(AppState::new(
                Arc::new(services),
                config.server.body_limit(),
            ));

            let app = create_router(state);
            let addr = config.server.socket_addr()?;

            info!("Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        }
    }

    Ok(())
}
