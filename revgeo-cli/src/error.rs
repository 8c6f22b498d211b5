//! CLI error handling with user-friendly messages.

use std::fmt;
use std::io;
use std::process;

use revgeo::app::AppError;
use revgeo::cache::CacheError;
use revgeo::config::ConfigFileError;
use revgeo::lookup::LookupError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(io::Error),
    /// Invalid or unreadable configuration
    Config(String),
    /// Config file could not be read or written
    ConfigFile(ConfigFileError),
    /// Application failed to start
    Startup(AppError),
    /// Failed to create the Tokio runtime
    Runtime(io::Error),
    /// Lookup failed
    Lookup(LookupError),
    /// Cache backend operation failed
    Cache(CacheError),
    /// HTTP server error
    Serve(io::Error),
}

impl CliError {
    /// Prints the error (with hints where useful) and exits with code 1.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Startup(AppError::Backend(_)) | CliError::Cache(_) => {
                eprintln!();
                eprintln!("Check the [cache] section of your config file:");
                eprintln!("  file backend:   `path` must be writable");
                eprintln!("  github backend: set GITHUB_TOKEN with contents write access");
            }
            CliError::Lookup(LookupError::ProviderUnavailable(_)) => {
                eprintln!();
                eprintln!("The provider could not be reached or refused the request.");
                eprintln!("Public Nominatim requires an identifying user_agent in [provider].");
            }
            CliError::Serve(_) => {
                eprintln!();
                eprintln!("Is another process already listening on that address?");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::Startup(e) => write!(f, "{}", e),
            CliError::Runtime(e) => write!(f, "Failed to create Tokio runtime: {}", e),
            CliError::Lookup(e) => write!(f, "{}", e),
            CliError::Cache(e) => write!(f, "Cache error: {}", e),
            CliError::Serve(e) => write!(f, "HTTP server error: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::LoggingInit(e) => Some(e),
            CliError::ConfigFile(e) => Some(e),
            CliError::Startup(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::Lookup(e) => Some(e),
            CliError::Cache(e) => Some(e),
            CliError::Serve(e) => Some(e),
            CliError::Config(_) => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<AppError> for CliError {
    fn from(e: AppError) -> Self {
        CliError::Startup(e)
    }
}

impl From<LookupError> for CliError {
    fn from(e: LookupError) -> Self {
        CliError::Lookup(e)
    }
}

impl From<CacheError> for CliError {
    fn from(e: CacheError) -> Self {
        CliError::Cache(e)
    }
}
