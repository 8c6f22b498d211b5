//! Lookup command - resolve one coordinate and print the result as JSON.

use std::path::Path;

use clap::Args;
use revgeo::app::{AppConfig, GeocodeApp};
use revgeo::lookup::LookupOutcome;
use serde_json::{json, Value};

use super::common::{apply_provider_args, load_config, runtime, ProviderType};
use crate::error::CliError;

/// Arguments for `revgeo lookup`.
#[derive(Debug, Args)]
pub struct LookupArgs {
    /// Latitude in decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Longitude in decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lng: f64,

    /// Provider override
    #[arg(long, value_enum)]
    pub provider: Option<ProviderType>,

    /// API key override (google provider)
    #[arg(long)]
    pub api_key: Option<String>,
}

/// Run the lookup command.
///
/// The result is persisted through the configured backend before exiting.
pub fn run(args: LookupArgs, config_path: Option<&Path>) -> Result<(), CliError> {
    let mut config = load_config(config_path)?;
    apply_provider_args(&mut config, args.provider, args.api_key);
    let app_config = AppConfig::from_config_file(&config)?;

    let rt = runtime()?;
    let (outcome, flushed) = rt.block_on(async {
        let app = GeocodeApp::start(app_config).await?;
        let outcome = app.coordinator().resolve_coords(args.lat, args.lng).await;
        Ok::<_, CliError>((outcome, app.shutdown().await))
    })?;

    println!("{:#}", render(&outcome?));
    flushed?;
    Ok(())
}

fn render(outcome: &LookupOutcome) -> Value {
    json!({
        "source": outcome.source.as_str(),
        "result": outcome.result.as_ref(),
    })
}
