//! Account vending service.
//!
//! `serve` runs the request API. The remaining subcommands each run one
//! workflow stage on a JSON event and print the result, so the workflow
//! engine (or an operator) can drive them one at a time.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

mod commands;
mod config;
mod error;
mod logging;
mod routes;

use commands::Services;
use config::Config;
use error::CommandResult;

/// Account vending: request API and workflow stages
#[derive(Parser)]
#[command(name = "vending")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Event input shared by the stage commands.
#[derive(clap::Args)]
struct EventArgs {
    /// JSON event file; stdin when omitted
    #[arg(long)]
    event: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the request API
    Serve,

    /// Validate and normalize a request
    Validate(EventArgs),

    /// Start provisioning through the service catalog
    Provision(EventArgs),

    /// Report provisioning progress
    CheckStatus(EventArgs),

    /// Record the new account id after provisioning succeeds
    Finalize(EventArgs),

    /// Remove the request record after a failure
    Compensate(EventArgs),

    /// Start workflow executions for a batch of store changes
    Dispatch(EventArgs),

    /// Import accounts already present in the organization
    Bootstrap,

    /// Run every stage in-process for one request
    Workflow(EventArgs),
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("FATAL: Configuration error: {e}");
            std::process::exit(1);
        }
    };
    logging::init_logging(&config.rust_log);

    let services = Services::load(config).await;

    if let Err(e) = run(cli, &services).await {
        e.print();
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli, services: &Services) -> CommandResult<()> {
    match cli.command {
        Commands::Serve => serve(services).await,
        Commands::Validate(args) => {
            commands::validate(services, commands::read_event(args.event.as_ref()).await?).await
        }
        Commands::Provision(args) => {
            commands::provision(services, commands::read_event(args.event.as_ref()).await?).await
        }
        Commands::CheckStatus(args) => {
            commands::check_status(services, commands::read_event(args.event.as_ref()).await?)
                .await
        }
        Commands::Finalize(args) => {
            commands::finalize(services, commands::read_event(args.event.as_ref()).await?).await
        }
        Commands::Compensate(args) => {
            commands::compensate(services, commands::read_event(args.event.as_ref()).await?).await
        }
        Commands::Dispatch(args) => {
            commands::dispatch(services, commands::read_event(args.event.as_ref()).await?).await
        }
        Commands::Bootstrap => commands::bootstrap(services).await,
        Commands::Workflow(args) => {
            commands::run_workflow(services, commands::read_event(args.event.as_ref()).await?)
                .await
        }
    }
}

async fn serve(services: &Services) -> CommandResult<()> {
    let state = routes::AppState {
        intake: Arc::new(services.intake()),
    };
    let app = routes::router(state);

    let addr = services.config().bind_addr;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "Request API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Ctrl+C handler unavailable");
            }
        }
        () = terminate => {}
    }
    info!("Draining request API");
}
