//! Error types for the tunnel.

use thiserror::Error;

/// Result type alias for tunnel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Startup-fatal errors: a bad catalogue, a bad configuration or a
/// failed bind.
///
/// Connection-scoped failures (dial, read, write) stay inside their
/// connection's tasks and are logged, never surfaced here. Catalogue
/// interpretation problems (out-of-range fields, unknown algorithms,
/// bad IP strings, ...) are not errors at all: the fabrication engine
/// degrades them to zeroed fields so a bad catalogue entry can never
/// take a connection down.
#[derive(Error, Debug)]
pub enum Error {
    /// Catalogue file could not be parsed as JSON
    #[error("catalogue parse error: {0}")]
    CatalogueParse(#[from] serde_json::Error),

    /// Catalogue is structurally invalid
    #[error("invalid catalogue: {0}")]
    CatalogueInvalid(String),

    /// Catalogue contains no protocol entries
    #[error("catalogue contains no protocols")]
    CatalogueEmpty,

    /// Required configuration is missing or malformed
    #[error("configuration error: {0}")]
    Config(String),

    /// Network I/O error (bind failure at startup)
    #[error("network error: {0}")]
    Network(#[from] std::io::Error),
}

impl Error {
    /// Create a new configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }
}
