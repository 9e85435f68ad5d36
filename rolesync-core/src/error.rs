//! Error types for rolesync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from loading or saving the service configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load — includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None` — cannot locate `~/.rolesync/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The config file did not exist at the expected path.
    #[error("config not found at {path}; run `rolesync init` first")]
    NotFound { path: PathBuf },

    /// The file parsed but a field is out of range or empty.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors raised while reading the desired-state file.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot read desired-state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `origin` is the file path, or a label such as `<memory>` for in-process readers.
    #[error("malformed desired-state CSV at {origin}: {source}")]
    Csv {
        origin: String,
        #[source]
        source: csv::Error,
    },
}
