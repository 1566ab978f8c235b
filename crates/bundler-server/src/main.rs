use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bundler_core::{BundlerConfig, JobDispatcher, JobStore, SqliteStore};
use bundler_fs::{FileSystems, ObjectStoreProvider};

use bundler_server::routes::{router, AppState};

#[derive(Debug, Parser)]
#[command(name = "bundler-server", about = "Bounded-size file bundling service")]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => BundlerConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => BundlerConfig::default(),
    };

    let handle = tokio::runtime::Handle::current();
    let fs = Arc::new(FileSystems::with_local());
    let s3 = config.s3_config();
    if s3.has_credentials() {
        fs.register("s3", Arc::new(ObjectStoreProvider::s3(s3, handle.clone())));
    } else {
        info!("no S3 credentials configured, s3:// sources disabled");
    }

    let store: Arc<dyn JobStore> = Arc::new(
        SqliteStore::open(std::path::Path::new(&config.database_file))
            .context("opening job database")?,
    );
    let dispatcher = Arc::new(JobDispatcher::new(
        store.clone(),
        fs.clone(),
        &config,
        handle,
    ));

    let state = AppState {
        dispatcher,
        store,
        request_directory: config.bundle_request_directory.clone(),
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("binding {}", config.bind_address))?;
    info!(
        address = %config.bind_address,
        staging = %config.staging_directory,
        "bundler server listening"
    );
    axum::serve(listener, router(state))
        .await
        .context("serving")?;
    Ok(())
}
