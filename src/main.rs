use anyhow::Context;
use clap::Parser;
use history_store::{FileLog, IdentityStore};
use monitor_service::{
    Deduplicator, DiagnosticsWriter, MonitorOptions, MonitorService, ServerChanSink,
};
use nga_client::NgaClient;
use ngawatch_core::{AppConfig, CoreError, ErrorReporter};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str =
    "ngawatch=info,monitor_service=info,nga_client=info,history_store=info";

/// Watches NGA users and pushes their new threads and replies to WeChat.
#[derive(Debug, Parser)]
#[command(name = "ngawatch", version)]
struct Args {
    /// Configuration file (.json or .toml)
    #[arg(short, long, env = "NGAWATCH_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// Run a single round and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let args = Args::parse();
    tracing::info!("Starting ngawatch - NGA user monitor");

    let config = match AppConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            let error = CoreError::from(e);
            ErrorReporter::default().report_error(&error);
            return Err(error).with_context(|| format!("loading {}", args.config.display()));
        }
    };

    let history_file = &config.monitor_settings.history_file;
    let store = IdentityStore::load(FileLog::new(history_file))
        .with_context(|| format!("loading history from {}", history_file.display()))?;

    let client = NgaClient::new(&config.nga_settings).context("building NGA client")?;
    let sink = ServerChanSink::new(&config.push_service).context("building push client")?;
    let dedup = Deduplicator::new(
        &config.nga_settings.base_url,
        config.monitor_settings.history_write_failure,
    );
    let diagnostics = DiagnosticsWriter::new(config.monitor_settings.diagnostics_dir.clone());

    let mut service = MonitorService::new(
        config.target_users.clone(),
        client,
        sink,
        store,
        dedup,
        diagnostics,
        MonitorOptions::from_config(&config),
    );

    if args.once {
        let summary = service.run_round().await;
        tracing::info!("Single round finished: {:?}", summary);
        return Ok(());
    }

    tokio::select! {
        _ = service.run() => {}
        result = tokio::signal::ctrl_c() => {
            result.context("listening for shutdown signal")?;
            tracing::info!("Shutdown requested, exiting");
        }
    }

    Ok(())
}
