//! User configuration stored in `~/.revgeo/config.ini`.
//!
//! # Example
//!
//! ```
//! use revgeo::config::ConfigFile;
//!
//! let config = ConfigFile::from_ini_str("[provider]\ntype = google\napi_key = k\n").unwrap();
//! assert_eq!(config.provider.provider_type, "google");
//! assert_eq!(config.lookup.timeout, 20);
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::{
    DEFAULT_BIND, DEFAULT_CACHE_BACKEND, DEFAULT_GITHUB_BRANCH, DEFAULT_GITHUB_PATH,
    DEFAULT_PROVIDER_TYPE, DEFAULT_USER_AGENT, VALID_BACKENDS, VALID_PROVIDERS,
};
pub use file::{
    config_directory, config_file_path, default_cache_path, ConfigFileError, GITHUB_TOKEN_ENV,
    PORT_ENV,
};
pub use settings::{
    CacheSettings, ConfigFile, LimiterSettings, LookupSettings, ProviderSettings, ServerSettings,
};
