//! Mailroom settings tool
//!
//! Loads a defaults file and (optionally) the current settings, applies a
//! list of changes in one transaction and pushes the resulting batches to
//! the settings endpoint.
//!
//! Usage:
//!   mailroom-settingsctl --defaults defaults.json set:mail/theme=\"dark\" reset:calendar
//!
//! With `--dry-run` nothing leaves the machine; the batches are printed.

use anyhow::{bail, Context, Result};
use clap::Parser;
use mailroom_settings::{
    HttpBackendConfig, HttpSettingsBackend, SettingsBackend, SettingsConfig, SettingsModel,
};
use mailroom_settingsctl::{load_json, run, DryRunBackend, Operation};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "mailroom-settingsctl")]
#[command(about = "Apply settings changes and push them to a Mailroom server")]
struct Args {
    /// JSON file with the default settings tree
    #[arg(short, long)]
    defaults: PathBuf,

    /// JSON file with the current settings, merged over the defaults
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// JSON file with the HTTP backend configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server base URL (overrides the config file)
    #[arg(long)]
    base_url: Option<String>,

    /// Endpoint below the base URL (overrides the config file)
    #[arg(long)]
    endpoint: Option<String>,

    /// Ask the server to make clients reload after applying
    #[arg(long)]
    reload: bool,

    /// Print the batches instead of sending them
    #[arg(long)]
    dry_run: bool,

    /// Print the resulting settings tree
    #[arg(long)]
    print: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Changes to apply: set:PATH=VALUE, remove:PATH, restore:PATH, reset:PATH
    operations: Vec<Operation>,
}

fn backend_config(args: &Args) -> Result<HttpBackendConfig> {
    let mut config = match &args.config {
        Some(path) => HttpBackendConfig::load(path).context("failed to load backend config")?,
        None => HttpBackendConfig::default(),
    };
    if let Some(base_url) = &args.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(endpoint) = &args.endpoint {
        config.endpoint = endpoint.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let defaults = load_json(&args.defaults)?;
    let current = args.settings.as_deref().map(load_json).transpose()?;

    let recorder = DryRunBackend::new();
    let backend: Arc<dyn SettingsBackend> = if args.dry_run {
        Arc::new(recorder.clone())
    } else {
        let config = backend_config(&args)?;
        info!("Pushing settings to {}", config.url());
        Arc::new(HttpSettingsBackend::new(config)?)
    };

    let mut model = SettingsModel::new(SettingsConfig::default(), defaults, backend);
    if let Some(current) = &current {
        model.initialize(current);
    }
    model.set_requires_reload(args.reload);

    let report = run(&mut model, &args.operations).await;

    if args.dry_run {
        for request in recorder.requests() {
            println!("{}", serde_json::to_string_pretty(&request)?);
        }
    }
    if args.print {
        println!("{}", serde_json::to_string_pretty(model.settings())?);
    }

    for (action, count) in &report.saved {
        info!("{} batch saved ({} entries)", action, count);
    }
    if !report.is_success() {
        for (action, message) in &report.failed {
            warn!("{} batch failed: {}", action, message);
        }
        bail!(
            "{} batch(es) failed, {} change(s) not saved",
            report.failed.len(),
            report.pending.modified.len() + report.pending.deleted.len() + report.pending.reset.len()
        );
    }
    Ok(())
}
