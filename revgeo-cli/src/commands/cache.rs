//! Cache management CLI commands.

use std::path::Path;

use clap::Subcommand;
use revgeo::app::{build_backend, AppConfig, BackendConfig};
use revgeo::cache::{CacheStore, FlushOutcome};

use super::common::{load_config, runtime};
use crate::error::CliError;

/// Cache action subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Rewrite the durable store, dropping records with malformed keys
    Flush,
    /// Show durable store statistics
    Stats,
}

/// Run a cache subcommand.
pub fn run(action: CacheAction, config_path: Option<&Path>) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let app_config = AppConfig::from_config_file(&config)?;
    let backend = build_backend(&app_config)?;
    let store = CacheStore::new(app_config.cache.clone(), backend);

    println!("Cache backend: {}", describe_backend(&app_config.backend));

    let rt = runtime()?;
    match action {
        CacheAction::Flush => {
            let outcome = rt.block_on(async {
                store.load().await?;
                store.rewrite().await
            })?;
            match outcome {
                FlushOutcome::Written { records } => println!("Wrote {} records", records),
                FlushOutcome::Clean => println!("Nothing to write"),
            }
            Ok(())
        }
        CacheAction::Stats => {
            let stored = rt.block_on(store.load())?;
            let snapshot = store.snapshot();
            let partial = snapshot
                .values()
                .filter(|record| record.display_name.is_none())
                .count();
            let oldest = snapshot.values().map(|record| record.stored_at).min();
            let newest = snapshot.values().map(|record| record.stored_at).max();

            println!("  Records:         {}", stored);
            println!("  Without address: {}", partial);
            if let (Some(oldest), Some(newest)) = (oldest, newest) {
                println!("  Oldest:          {}", oldest.to_rfc3339());
                println!("  Newest:          {}", newest.to_rfc3339());
            }
            Ok(())
        }
    }
}

fn describe_backend(backend: &BackendConfig) -> String {
    match backend {
        BackendConfig::Memory => "memory (nothing persisted)".to_string(),
        BackendConfig::File(path) => format!("file {}", path.display()),
        BackendConfig::Github(github) => format!(
            "github {}/{}:{} ({})",
            github.owner, github.repo, github.path, github.branch
        ),
    }
}
