//! In-process graph store.
//!
//! Evaluates the same traversals [`GremlinClient`](super::GremlinClient)
//! sends over the wire, against an in-memory property graph. Each submitted
//! traversal runs against a scratch copy of the graph that replaces the
//! shared state only when the whole traversal succeeds, so a request is
//! applied atomically even when several sessions share one graph.

use async_trait::async_trait;
use serde_json::{json, Map, Value as Json};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use super::element::Element;
use super::traversal::{Arg, Bindings, Query, Step, Traversal};
use super::transport::GraphTransport;
use super::value::ElementId;
use crate::error::GraphError;

/// Status Gremlin Server uses for script evaluation failures.
const SCRIPT_EVALUATION_ERROR: u16 = 597;

#[derive(Debug, Clone)]
struct StoredVertex {
    label: String,
    properties: BTreeMap<String, Json>,
}

#[derive(Debug, Clone)]
struct StoredEdge {
    label: String,
    out_v: i64,
    in_v: i64,
    properties: BTreeMap<String, Json>,
}

#[derive(Debug, Clone, Default)]
struct GraphState {
    next_id: i64,
    vertices: BTreeMap<i64, StoredVertex>,
    edges: BTreeMap<i64, StoredEdge>,
}

impl GraphState {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug, Clone)]
enum Traverser {
    Root,
    Vertex(i64),
    Edge(i64),
    List(Vec<Traverser>),
    Value(Json),
}

/// A shared in-memory graph. Clones are separate sessions on the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryGraph {
    state: Arc<Mutex<GraphState>>,
    open: bool,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&GraphState) -> T) -> T {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&state)
    }

    /// Vertices with `label`, in creation order.
    pub fn vertices(&self, label: &str) -> Vec<Element> {
        self.with_state(|state| {
            state
                .vertices
                .iter()
                .filter(|(_, v)| v.label == label)
                .map(|(id, v)| Element {
                    id: ElementId::Int(*id),
                    label: v.label.clone(),
                    properties: v.properties.clone(),
                })
                .collect()
        })
    }

    /// `(from, to)` pairs of every edge with `label`, in creation order.
    pub fn edges(&self, label: &str) -> Vec<(ElementId, ElementId)> {
        self.with_state(|state| {
            state
                .edges
                .values()
                .filter(|e| e.label == label)
                .map(|e| (ElementId::Int(e.out_v), ElementId::Int(e.in_v)))
                .collect()
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.with_state(|state| state.vertices.len())
    }

    pub fn edge_count(&self) -> usize {
        self.with_state(|state| state.edges.len())
    }

    fn execute(&self, query: &Query) -> Result<Vec<Json>, GraphError> {
        let mut shared = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let mut scratch = shared.clone();
        let results = {
            let mut eval = Evaluator {
                state: &mut scratch,
                bindings: &query.bindings,
            };
            let traversers = eval.run(&query.traversal, Vec::new())?;
            traversers
                .iter()
                .filter_map(|t| eval.to_json(t))
                .collect::<Vec<_>>()
        };
        *shared = scratch;
        Ok(results)
    }
}

#[async_trait]
impl GraphTransport for MemoryGraph {
    async fn open(&mut self) -> Result<(), GraphError> {
        self.open = true;
        Ok(())
    }

    async fn submit(&mut self, query: &Query) -> Result<Vec<Json>, GraphError> {
        if !self.open {
            return Err(GraphError::NotConnected);
        }
        self.execute(query)
    }

    async fn close(&mut self) -> Result<(), GraphError> {
        self.open = false;
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

fn script_error(message: impl Into<String>) -> GraphError {
    GraphError::Server {
        code: SCRIPT_EVALUATION_ERROR,
        message: message.into(),
    }
}

struct Evaluator<'a> {
    state: &'a mut GraphState,
    bindings: &'a Bindings,
}

impl Evaluator<'_> {
    fn resolve(&self, arg: &Arg) -> Result<Json, GraphError> {
        match arg {
            Arg::Bind(name) => self
                .bindings
                .get(name)
                .cloned()
                .ok_or_else(|| script_error(format!("No such property: {}", name))),
            Arg::Literal(text) => Ok(Json::from(*text)),
        }
    }

    fn resolve_str(&self, arg: &Arg) -> Result<String, GraphError> {
        match self.resolve(arg)? {
            Json::String(s) => Ok(s),
            other => Err(script_error(format!("expected a string for {}, got {}", arg, other))),
        }
    }

    fn properties(&self, t: &Traverser) -> Option<&BTreeMap<String, Json>> {
        match t {
            Traverser::Vertex(id) => self.state.vertices.get(id).map(|v| &v.properties),
            Traverser::Edge(id) => self.state.edges.get(id).map(|e| &e.properties),
            _ => None,
        }
    }

    fn label(&self, t: &Traverser) -> Option<&str> {
        match t {
            Traverser::Vertex(id) => self.state.vertices.get(id).map(|v| v.label.as_str()),
            Traverser::Edge(id) => self.state.edges.get(id).map(|e| e.label.as_str()),
            _ => None,
        }
    }

    fn run(
        &mut self,
        traversal: &Traversal,
        input: Vec<Traverser>,
    ) -> Result<Vec<Traverser>, GraphError> {
        let mut current = if traversal.is_spawned() {
            vec![Traverser::Root]
        } else {
            input
        };

        let steps = traversal.steps();
        let mut i = 0;
        while i < steps.len() {
            current = match &steps[i] {
                Step::V(None) => {
                    let ids: Vec<i64> = self.state.vertices.keys().copied().collect();
                    current
                        .iter()
                        .flat_map(|_| ids.iter().map(|id| Traverser::Vertex(*id)))
                        .collect()
                }
                Step::V(Some(arg)) => {
                    let wanted = self.resolve(arg)?;
                    let found = wanted
                        .as_i64()
                        .filter(|id| self.state.vertices.contains_key(id));
                    current
                        .iter()
                        .filter_map(|_| found.map(Traverser::Vertex))
                        .collect()
                }
                Step::AddV(label) => {
                    let label = self.resolve_str(label)?;
                    let mut out = Vec::with_capacity(current.len());
                    for _ in &current {
                        let id = self.state.allocate_id();
                        self.state.vertices.insert(
                            id,
                            StoredVertex {
                                label: label.clone(),
                                properties: BTreeMap::new(),
                            },
                        );
                        out.push(Traverser::Vertex(id));
                    }
                    out
                }
                Step::AddE(label) => {
                    let label = self.resolve_str(label)?;
                    let target = match steps.get(i + 1) {
                        Some(Step::To(target)) => target,
                        _ => return Err(script_error("addE() must be followed by to()")),
                    };
                    i += 1;
                    let target = self.run(target, Vec::new())?.into_iter().find_map(|t| match t {
                        Traverser::Vertex(id) => Some(id),
                        _ => None,
                    });
                    let mut out = Vec::new();
                    for t in &current {
                        let from = match t {
                            Traverser::Vertex(id) => *id,
                            _ => return Err(script_error("addE() needs a vertex")),
                        };
                        if let Some(to) = target {
                            let id = self.state.allocate_id();
                            self.state.edges.insert(
                                id,
                                StoredEdge {
                                    label: label.clone(),
                                    out_v: from,
                                    in_v: to,
                                    properties: BTreeMap::new(),
                                },
                            );
                            out.push(Traverser::Edge(id));
                        }
                    }
                    out
                }
                Step::To(_) => return Err(script_error("to() without addE()")),
                Step::HasLabel(label) => {
                    let label = self.resolve_str(label)?;
                    current
                        .into_iter()
                        .filter(|t| self.label(t) == Some(label.as_str()))
                        .collect()
                }
                Step::Has(key, value) => {
                    let key = self.resolve_str(key)?;
                    let value = self.resolve(value)?;
                    current
                        .into_iter()
                        .filter(|t| {
                            self.properties(t)
                                .and_then(|p| p.get(&key))
                                .is_some_and(|v| *v == value)
                        })
                        .collect()
                }
                Step::Limit(n) => {
                    current.truncate(*n as usize);
                    current
                }
                Step::Fold => vec![Traverser::List(current)],
                Step::Unfold => current
                    .into_iter()
                    .flat_map(|t| match t {
                        Traverser::List(items) => items,
                        other => vec![other],
                    })
                    .collect(),
                Step::Coalesce(branches) => {
                    let mut out = Vec::new();
                    for t in current {
                        for branch in branches {
                            let result = self.run(branch, vec![t.clone()])?;
                            if !result.is_empty() {
                                out.extend(result);
                                break;
                            }
                        }
                    }
                    out
                }
                Step::Property(key, value) => {
                    let key = self.resolve_str(key)?;
                    let value = self.resolve(value)?;
                    for t in &current {
                        let props = match t {
                            Traverser::Vertex(id) => {
                                self.state.vertices.get_mut(id).map(|v| &mut v.properties)
                            }
                            Traverser::Edge(id) => {
                                self.state.edges.get_mut(id).map(|e| &mut e.properties)
                            }
                            _ => None,
                        };
                        match props {
                            Some(props) => {
                                props.insert(key.clone(), value.clone());
                            }
                            None => return Err(script_error("property() needs an element")),
                        }
                    }
                    current
                }
                Step::ValueMap => current
                    .iter()
                    .map(|t| Traverser::Value(self.value_map(t)))
                    .collect(),
                Step::OutE(label) => {
                    let label = self.resolve_str(label)?;
                    current
                        .iter()
                        .flat_map(|t| self.out_edges(t, &label))
                        .map(Traverser::Edge)
                        .collect()
                }
                Step::Out(label) => {
                    let label = self.resolve_str(label)?;
                    current
                        .iter()
                        .flat_map(|t| self.out_edges(t, &label))
                        .filter_map(|id| {
                            self.state.edges.get(&id).map(|e| Traverser::Vertex(e.in_v))
                        })
                        .collect()
                }
                Step::GroupCountByLabel => {
                    let mut counts: BTreeMap<String, i64> = BTreeMap::new();
                    for t in &current {
                        if let Some(label) = self.label(t) {
                            *counts.entry(label.to_string()).or_default() += 1;
                        }
                    }
                    vec![Traverser::Value(json!(counts))]
                }
                Step::Inject(n) => current
                    .into_iter()
                    .filter(|t| !matches!(t, Traverser::Root))
                    .chain(std::iter::once(Traverser::Value(Json::from(*n))))
                    .collect(),
            };
            i += 1;
        }

        Ok(current)
    }

    fn out_edges(&self, t: &Traverser, label: &str) -> Vec<i64> {
        match t {
            Traverser::Vertex(from) => self
                .state
                .edges
                .iter()
                .filter(|(_, e)| e.out_v == *from && e.label == label)
                .map(|(id, _)| *id)
                .collect(),
            _ => Vec::new(),
        }
    }

    fn value_map(&self, t: &Traverser) -> Json {
        let mut map = Map::new();
        match t {
            Traverser::Vertex(id) => {
                if let Some(v) = self.state.vertices.get(id) {
                    map.insert("id".to_string(), Json::from(*id));
                    map.insert("label".to_string(), Json::from(v.label.clone()));
                    for (k, value) in &v.properties {
                        map.insert(k.clone(), Json::Array(vec![value.clone()]));
                    }
                }
            }
            Traverser::Edge(id) => {
                if let Some(e) = self.state.edges.get(id) {
                    map.insert("id".to_string(), Json::from(*id));
                    map.insert("label".to_string(), Json::from(e.label.clone()));
                    for (k, value) in &e.properties {
                        map.insert(k.clone(), value.clone());
                    }
                }
            }
            _ => {}
        }
        Json::Object(map)
    }

    fn to_json(&self, t: &Traverser) -> Option<Json> {
        match t {
            Traverser::Root => None,
            Traverser::Vertex(id) => self.state.vertices.get(id).map(|v| {
                let properties: Map<String, Json> = v
                    .properties
                    .iter()
                    .map(|(k, value)| {
                        (
                            k.clone(),
                            json!([{ "id": format!("{}|{}", id, k), "value": value }]),
                        )
                    })
                    .collect();
                json!({ "id": id, "label": v.label, "type": "vertex", "properties": properties })
            }),
            Traverser::Edge(id) => self.state.edges.get(id).map(|e| {
                json!({
                    "id": id,
                    "label": e.label,
                    "type": "edge",
                    "inV": e.in_v,
                    "outV": e.out_v,
                    "properties": e.properties,
                })
            }),
            Traverser::List(items) => Some(Json::Array(
                items.iter().filter_map(|t| self.to_json(t)).collect(),
            )),
            Traverser::Value(v) => Some(v.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::graphson::decode_elements;

    async fn open_graph() -> MemoryGraph {
        let mut graph = MemoryGraph::new();
        graph.open().await.unwrap();
        graph
    }

    fn add_device(name: &str) -> Query {
        Query::new(
            Traversal::g()
                .add_v(Arg::bind("vLabel"))
                .property(Arg::literal("name"), Arg::bind("vName")),
        )
        .bind("vLabel", "device")
        .bind("vName", name)
    }

    #[tokio::test]
    async fn test_submit_requires_open() {
        let mut graph = MemoryGraph::new();
        let result = graph.submit(&add_device("a")).await;
        assert!(matches!(result, Err(GraphError::NotConnected)));
    }

    #[tokio::test]
    async fn test_add_and_find() {
        let mut graph = open_graph().await;
        graph.submit(&add_device("Nokia N8-00")).await.unwrap();
        graph.submit(&add_device("Apple iPhone 11")).await.unwrap();

        let find = Query::new(
            Traversal::g()
                .v()
                .has_label(Arg::bind("vLabel"))
                .has(Arg::literal("name"), Arg::bind("vName")),
        )
        .bind("vLabel", "device")
        .bind("vName", "Apple iPhone 11");
        let rows = graph.submit(&find).await.unwrap();
        let elements = decode_elements(&rows).unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].get_str("name"), Some("Apple iPhone 11"));
    }

    #[tokio::test]
    async fn test_unbound_variable_leaves_graph_untouched() {
        let mut graph = open_graph().await;
        let query = Query::new(
            Traversal::g()
                .add_v(Arg::bind("vLabel"))
                .property(Arg::literal("name"), Arg::bind("missing")),
        )
        .bind("vLabel", "device");
        let result = graph.submit(&query).await;
        assert!(matches!(result, Err(GraphError::Server { code: 597, .. })));
        assert_eq!(graph.vertex_count(), 0);
    }

    #[tokio::test]
    async fn test_group_count() {
        let mut graph = open_graph().await;
        graph.submit(&add_device("a")).await.unwrap();
        graph.submit(&add_device("b")).await.unwrap();
        let rows = graph
            .submit(&Query::new(Traversal::g().v().group_count_by_label()))
            .await
            .unwrap();
        assert_eq!(rows, vec![json!({"device": 2})]);
    }

    #[tokio::test]
    async fn test_inject() {
        let mut graph = open_graph().await;
        let rows = graph.submit(&Query::new(Traversal::g().inject(0))).await.unwrap();
        assert_eq!(rows, vec![json!(0)]);
    }
}
