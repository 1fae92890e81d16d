//! Binary entry point for the per-tenant VIM task engine; see [`vim_worker`] for the library.

use clap::Parser;
use diesel_migrations::MigrationHarness;
use tokio::fs;
use tokio::sync::mpsc;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use vim_worker::config::Config;
use vim_worker::worker::{Control, Worker};
use vim_worker::{config, db};

#[derive(Debug, Parser)]
#[command(about = "Per-VIM task engine", version)]
struct Opts {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "vim-worker.toml")]
    pub config: String,
}

async fn run() -> Result<(), anyhow::Error> {
    let opts = Opts::parse();

    tracing::info!("starting vim-worker (version: {})", env!("CARGO_PKG_VERSION"));

    let contents = fs::read_to_string(&opts.config).await?;
    let config: Config = toml::from_str(contents.as_str())?;
    let worker_name = config.general.name.clone();

    let state = config::State::from_config(config)?;

    tracing::info!(worker = %worker_name, "running database migrations");
    state
        .db
        .run(|conn| conn.run_pending_migrations(db::MIGRATIONS).map(|_| ()))
        .await
        .expect("migration execution error");

    let (control_tx, control_rx) = mpsc::channel(16);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = control_tx.send(Control::Exit).await;
        }
    });

    let worker = Worker::new(state);
    worker.run(control_rx).await?;

    tracing::info!(worker = %worker_name, "stopped");
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .compact()
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
