//! Property graph access: entity model, query building and the
//! idempotent write primitives every pipeline goes through.

pub mod element;
pub mod gremlin;
pub mod graphson;
pub mod memory;
pub mod query;
pub mod transport;
pub mod traversal;
pub mod value;

use chrono::Utc;
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::time::Instant;

pub use element::{
    AlbumVertex, CityVertex, CountryVertex, DeviceVertex, EdgeKind, Element, GraphElement,
    PartitionKey, PhotoVertex, Vertex,
};
pub use gremlin::{Credentials, GremlinClient};
pub use memory::MemoryGraph;
pub use transport::GraphTransport;
pub use traversal::Query;
pub use value::{ElementId, Scalar};

use crate::config::{GraphBackend, GraphConfig};
use crate::error::GraphError;

/// A session with the graph store.
///
/// Every operation takes `&mut self`, so a session has at most one request
/// in flight. Create with [`GraphDb::connect`] or [`GraphDb::new`], then
/// call [`ready`](GraphDb::ready) before use and [`close`](GraphDb::close)
/// when done.
pub struct GraphDb {
    transport: Box<dyn GraphTransport>,
}

impl GraphDb {
    pub fn new(transport: Box<dyn GraphTransport>) -> Self {
        Self { transport }
    }

    /// Build a session for the configured backend. Does not connect.
    pub fn connect(config: &GraphConfig) -> Self {
        let transport: Box<dyn GraphTransport> = match config.backend {
            GraphBackend::Gremlin => Box::new(GremlinClient::new(
                &config.url,
                &config.traversal_source,
                config.credentials(),
            )),
            GraphBackend::Memory => Box::new(MemoryGraph::new()),
        };
        Self::new(transport)
    }

    /// Open and authenticate the session.
    pub async fn ready(&mut self) -> Result<(), GraphError> {
        let started = Instant::now();
        self.transport.open().await?;
        tracing::info!(
            store = %self.transport.describe(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Graph connection ready"
        );
        Ok(())
    }

    pub async fn close(&mut self) -> Result<(), GraphError> {
        self.transport.close().await?;
        tracing::info!(store = %self.transport.describe(), "Graph connection closed");
        Ok(())
    }

    async fn submit(&mut self, query: &Query) -> Result<Vec<Json>, GraphError> {
        tracing::debug!(
            query = %query.text(),
            bindings = %query.bindings_text(),
            "Submitting traversal"
        );
        self.transport.submit(query).await
    }

    /// Id of the first row, or a consistency error if the store returned none.
    fn first_id(query: &Query, rows: &[Json]) -> Result<ElementId, GraphError> {
        match rows.first() {
            Some(row) => Ok(graphson::decode_element(row)?.id),
            None => {
                tracing::error!(
                    query = %query.text(),
                    bindings = %query.bindings_text(),
                    "Expected one element, store returned none"
                );
                Err(GraphError::Consistency {
                    query: query.text(),
                    bindings: query.bindings_text(),
                })
            }
        }
    }

    fn key_value<V: Vertex>(vertex: &V, key: &str) -> Result<Scalar, GraphError> {
        vertex.property(key).ok_or_else(|| GraphError::MissingKey {
            label: vertex.label(),
            field: key.to_string(),
        })
    }

    /// Ids of every `label` vertex whose `key` equals `value`.
    pub async fn ids_by_value(
        &mut self,
        label: &str,
        key: &str,
        value: &Scalar,
    ) -> Result<Vec<ElementId>, GraphError> {
        let query = query::lookup_query(label, key, value);
        let rows = self.submit(&query).await?;
        Ok(graphson::decode_elements(&rows)?
            .into_iter()
            .map(|e| e.id)
            .collect())
    }

    /// Update the vertex matching `key`, or create it.
    ///
    /// Two round trips and not atomic: two sessions racing on the same key
    /// can both miss the lookup and both create. Use only where one caller
    /// owns the key for the duration of a run; shared reference vertices
    /// go through [`ensure_vertex`](GraphDb::ensure_vertex).
    pub async fn upsert_vertex<V: Vertex>(
        &mut self,
        vertex: &V,
        key: &str,
    ) -> Result<ElementId, GraphError> {
        let value = Self::key_value(vertex, key)?;
        let existing = self.ids_by_value(vertex.label(), key, &value).await?;
        let now = Utc::now();

        let query = match existing.first() {
            Some(id) => {
                tracing::debug!(label = vertex.label(), %id, "Updating existing vertex");
                query::update_query(id, vertex, &now)
            }
            None => query::create_query(vertex, &now),
        };
        let rows = self.submit(&query).await?;
        Self::first_id(&query, &rows)
    }

    /// Return the id of the vertex matching `key`, creating it first if
    /// absent, in a single conditional request.
    pub async fn ensure_vertex<V: Vertex>(
        &mut self,
        vertex: &V,
        key: &str,
    ) -> Result<ElementId, GraphError> {
        let value = Self::key_value(vertex, key)?;
        let query = query::ensure_query(vertex, key, &value, &Utc::now());
        let rows = self.submit(&query).await?;
        Self::first_id(&query, &rows)
    }

    /// Make sure exactly one `kind` edge leads from `from` to `to`.
    pub async fn ensure_edge(
        &mut self,
        from: &ElementId,
        to: &ElementId,
        kind: EdgeKind,
    ) -> Result<(), GraphError> {
        let query = query::ensure_edge_query(from, to, kind, &Utc::now());
        let rows = self.submit(&query).await?;
        Self::first_id(&query, &rows).map(|_| ())
    }

    pub async fn vertices_by_label(&mut self, label: &str) -> Result<Vec<Element>, GraphError> {
        let rows = self.submit(&query::label_query(label)).await?;
        graphson::decode_elements(&rows)
    }

    /// Vertices one `kind` edge away from `id`.
    pub async fn related_out(
        &mut self,
        id: &ElementId,
        kind: EdgeKind,
    ) -> Result<Vec<Element>, GraphError> {
        let rows = self.submit(&query::related_out_query(id, kind.as_str())).await?;
        graphson::decode_elements(&rows)
    }

    /// Vertex count per label.
    pub async fn summary(&mut self) -> Result<BTreeMap<String, i64>, GraphError> {
        let rows = self.submit(&query::summary_query()).await?;
        let mut counts = BTreeMap::new();
        if let Some(Json::Object(map)) = rows.into_iter().next() {
            for (label, count) in map {
                counts.insert(label, count.as_i64().unwrap_or_default());
            }
        }
        Ok(counts)
    }
}
