//! revgeo CLI - reverse geocoding proxy with a persistent address cache.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::cache::CacheAction;
use commands::lookup::LookupArgs;
use commands::serve::ServeArgs;

#[derive(Parser)]
#[command(name = "revgeo")]
#[command(version = revgeo::VERSION)]
#[command(about = "Rate-limited reverse geocoding with a persistent address cache", long_about = None)]
struct Cli {
    /// Config file (default: ~/.revgeo/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log directory (default: ~/.revgeo/logs)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve(ServeArgs),
    /// Resolve one coordinate and print the result
    Lookup(LookupArgs),
    /// Inspect or rewrite the durable cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Write the configuration file
    Init,
}

fn main() {
    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Serve(args) => commands::serve::run(args, config, cli.log_dir),
        Commands::Lookup(args) => commands::lookup::run(args, config),
        Commands::Cache { action } => commands::cache::run(action, config),
        Commands::Init => commands::init::run(config),
    };

    if let Err(e) = result {
        e.exit();
    }
}
