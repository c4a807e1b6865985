//! Error types for the graph layer and the import pipelines.

use std::path::PathBuf;
use thiserror::Error;

/// Failures raised while talking to the graph store.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Opening or authenticating the session failed. Fatal for the run.
    #[error("failed to connect to graph store at {url}: {reason}")]
    Connectivity { url: String, reason: String },

    /// A write was expected to yield an element but the store returned none.
    #[error("expected a result from `{query}` but the store returned none (bindings: {bindings})")]
    Consistency { query: String, bindings: String },

    /// The entity carries no value for the field it is keyed on.
    #[error("{label} has no value for key field `{field}`")]
    MissingKey { label: &'static str, field: String },

    /// The store answered with a non-success status.
    #[error("graph store rejected request ({code}): {message}")]
    Server { code: u16, message: String },

    #[error("malformed response from graph store: {0}")]
    Protocol(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("graph connection is not open")]
    NotConnected,
}

impl GraphError {
    pub fn connectivity(url: &str, reason: impl ToString) -> Self {
        GraphError::Connectivity {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Failures raised while importing a single photo.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The input is not something we import. Skipped with a warning.
    #[error("unsupported content type `{0}`")]
    UnsupportedContentType(String),

    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl ImportError {
    /// Input errors only affect the photo at hand; graph errors end the run.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ImportError::UnsupportedContentType(_) | ImportError::Io { .. }
        )
    }
}
