//! The seam between [`GraphDb`](super::GraphDb) and a concrete store.

use async_trait::async_trait;
use serde_json::Value as Json;

use super::traversal::Query;
use crate::error::GraphError;

/// A session with a graph store that executes one traversal per request.
///
/// Implementations must execute each submitted traversal as a single
/// atomic unit; the conditional create paths rely on it.
#[async_trait]
pub trait GraphTransport: Send {
    /// Open and authenticate the session.
    async fn open(&mut self) -> Result<(), GraphError>;

    /// Submit one traversal and return its result rows, untyped.
    async fn submit(&mut self, query: &Query) -> Result<Vec<Json>, GraphError>;

    async fn close(&mut self) -> Result<(), GraphError>;

    /// Short name for log lines.
    fn describe(&self) -> String;
}
