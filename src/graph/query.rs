//! Builds the traversals submitted by [`GraphDb`](super::GraphDb).
//!
//! Property values are always bound: each field contributes
//! `.property(v_<field>, vv_<field>)` with the field name and its value in
//! the bindings. Query text therefore depends only on which fields are set.

use chrono::{DateTime, Utc};
use serde_json::Value as Json;

use super::element::{iso_timestamp, EdgeKind, EdgeRecord, GraphElement, PartitionKey, Vertex};
use super::traversal::{Arg, Bindings, Query, Step, Traversal};
use super::value::{ElementId, Scalar};

const NOW: &str = "vv_now";

/// A run of steps plus the bindings they reference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub steps: Vec<Step>,
    pub bindings: Bindings,
}

impl Fragment {
    /// Rendered steps, as they appear inside a full query.
    pub fn text(&self) -> String {
        self.steps.iter().map(|s| format!(".{}", s)).collect()
    }
}

/// One property step per set field of `element`.
pub fn properties_fragment(element: &impl GraphElement) -> Fragment {
    let mut fragment = Fragment::default();
    for (field, value) in element.properties() {
        debug_assert!(field != "now", "`now` is reserved for timestamps");
        let name = format!("v_{}", field);
        let value_name = format!("vv_{}", field);
        fragment
            .steps
            .push(Step::Property(Arg::bind(&name), Arg::bind(&value_name)));
        fragment.bindings.insert(name, Json::from(field));
        fragment.bindings.insert(value_name, value.to_json());
    }
    fragment
}

/// Stamps `createdAt` and `updatedAt` with the same instant.
pub fn created_fragment(now: &DateTime<Utc>) -> Fragment {
    let mut bindings = Bindings::new();
    bindings.insert(NOW.to_string(), Json::from(iso_timestamp(now)));
    Fragment {
        steps: vec![
            Step::Property(Arg::literal("createdAt"), Arg::bind(NOW)),
            Step::Property(Arg::literal("updatedAt"), Arg::bind(NOW)),
        ],
        bindings,
    }
}

/// Refreshes `updatedAt` only.
pub fn updated_fragment(now: &DateTime<Utc>) -> Fragment {
    let mut bindings = Bindings::new();
    bindings.insert(NOW.to_string(), Json::from(iso_timestamp(now)));
    Fragment {
        steps: vec![Step::Property(Arg::literal("updatedAt"), Arg::bind(NOW))],
        bindings,
    }
}

fn apply(traversal: Traversal, fragment: Fragment, bindings: &mut Bindings) -> Traversal {
    bindings.extend(fragment.bindings);
    traversal.extend(fragment.steps)
}

/// `g.V().hasLabel(vLabel).has(vKey, vValue)`
pub fn lookup_query(label: &str, key: &str, value: &Scalar) -> Query {
    let traversal = Traversal::g()
        .v()
        .has_label(Arg::bind("vLabel"))
        .has(Arg::bind("vKey"), Arg::bind("vValue"));
    Query::new(traversal)
        .bind("vLabel", label)
        .bind("vKey", key)
        .bind("vValue", value.to_json())
}

/// Writes every set field plus `updatedAt` onto an existing vertex.
pub fn update_query(id: &ElementId, element: &impl GraphElement, now: &DateTime<Utc>) -> Query {
    let mut bindings = Bindings::new();
    bindings.insert("vId".to_string(), id.to_json());
    let traversal = Traversal::g().v_id(Arg::bind("vId"));
    let traversal = apply(traversal, properties_fragment(element), &mut bindings);
    let traversal = apply(traversal, updated_fragment(now), &mut bindings);
    Query::new(traversal.value_map()).bind_all(bindings)
}

fn add_vertex<V: Vertex>(
    traversal: Traversal,
    vertex: &V,
    now: &DateTime<Utc>,
    bindings: &mut Bindings,
) -> Traversal {
    bindings.insert("vLabel".to_string(), Json::from(vertex.label()));
    bindings.insert("vPk".to_string(), Json::from(V::PARTITION.as_str()));
    let traversal = traversal
        .add_v(Arg::bind("vLabel"))
        .property(Arg::literal(PartitionKey::PROPERTY), Arg::bind("vPk"));
    let traversal = apply(traversal, properties_fragment(vertex), bindings);
    apply(traversal, created_fragment(now), bindings)
}

/// Creates a new vertex unconditionally.
pub fn create_query<V: Vertex>(vertex: &V, now: &DateTime<Utc>) -> Query {
    let mut bindings = Bindings::new();
    let traversal = add_vertex(Traversal::g(), vertex, now, &mut bindings);
    Query::new(traversal.value_map()).bind_all(bindings)
}

/// Returns the vertex matching `key`, or creates it, in one request.
///
/// ```text
/// g.V().hasLabel(vLabel).has(vKey, vValue).limit(1).fold()
///  .coalesce(unfold(), addV(vLabel).property('pk', vPk)...)
/// ```
pub fn ensure_query<V: Vertex>(
    vertex: &V,
    key: &str,
    value: &Scalar,
    now: &DateTime<Utc>,
) -> Query {
    let mut bindings = Bindings::new();
    bindings.insert("vKey".to_string(), Json::from(key));
    bindings.insert("vValue".to_string(), value.to_json());
    let create = add_vertex(Traversal::anonymous(), vertex, now, &mut bindings);
    let traversal = Traversal::g()
        .v()
        .has_label(Arg::bind("vLabel"))
        .has(Arg::bind("vKey"), Arg::bind("vValue"))
        .limit(1)
        .fold()
        .coalesce(vec![Traversal::anonymous().unfold(), create]);
    Query::new(traversal).bind_all(bindings)
}

/// Returns the `kind` edge from `from` to `to`, or creates it, in one
/// request. The match is on the edge's own `targetId`.
pub fn ensure_edge_query(
    from: &ElementId,
    to: &ElementId,
    kind: EdgeKind,
    now: &DateTime<Utc>,
) -> Query {
    let record = EdgeRecord { kind, target: to };
    let mut bindings = Bindings::new();
    bindings.insert("fromId".to_string(), from.to_json());
    bindings.insert("toId".to_string(), to.to_json());
    bindings.insert("edgeLabel".to_string(), Json::from(kind.as_str()));

    let existing = Traversal::anonymous()
        .out_e(Arg::bind("edgeLabel"))
        .has(Arg::literal(EdgeRecord::TARGET_PROPERTY), Arg::bind("toId"));
    let create = Traversal::anonymous()
        .add_e(Arg::bind("edgeLabel"))
        .to(Traversal::g().v_id(Arg::bind("toId")));
    let create = apply(create, properties_fragment(&record), &mut bindings);
    let create = apply(create, created_fragment(now), &mut bindings);

    let traversal = Traversal::g()
        .v_id(Arg::bind("fromId"))
        .coalesce(vec![existing, create]);
    Query::new(traversal).bind_all(bindings)
}

/// Every vertex with `label`, as value maps.
pub fn label_query(label: &str) -> Query {
    let traversal = Traversal::g().v().has_label(Arg::bind("vLabel")).value_map();
    Query::new(traversal).bind("vLabel", label)
}

/// Vertices reachable from `id` over one `edge_label` edge, as value maps.
pub fn related_out_query(id: &ElementId, edge_label: &str) -> Query {
    let traversal = Traversal::g()
        .v_id(Arg::bind("vId"))
        .out(Arg::bind("edgeLabel"))
        .value_map();
    Query::new(traversal)
        .bind("vId", id.to_json())
        .bind("edgeLabel", edge_label)
}

/// Vertex counts per label.
pub fn summary_query() -> Query {
    Query::new(Traversal::g().v().group_count_by_label())
}

/// Cheapest possible round trip; used to force the auth handshake.
pub fn probe_query() -> Query {
    Query::new(Traversal::g().inject(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::element::{CityVertex, DeviceVertex, PhotoVertex};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 4, 11, 4, 18, 14).unwrap()
    }

    #[test]
    fn test_properties_fragment_binds_names_and_values() {
        let city = CityVertex::new("france", "paris");
        let fragment = properties_fragment(&city);
        assert_eq!(
            fragment.text(),
            ".property(v_name, vv_name).property(v_uniqueName, vv_uniqueName)"
        );
        assert_eq!(fragment.bindings["v_name"], Json::from("name"));
        assert_eq!(fragment.bindings["vv_name"], Json::from("paris"));
        assert_eq!(fragment.bindings["v_uniqueName"], Json::from("uniqueName"));
        assert_eq!(fragment.bindings["vv_uniqueName"], Json::from("france > paris"));
    }

    #[test]
    fn test_values_never_reach_query_text() {
        let hostile = DeviceVertex {
            name: "x').drop();g.V().drop('".to_string(),
        };
        let benign = DeviceVertex {
            name: "Nokia N8-00".to_string(),
        };
        let a = ensure_query(&hostile, "name", &Scalar::from(&hostile.name), &now());
        let b = ensure_query(&benign, "name", &Scalar::from(&benign.name), &now());
        assert_eq!(a.text(), b.text());
        assert!(!a.text().contains("drop"));
        assert_eq!(a.bindings["vv_name"], Json::from("x').drop();g.V().drop('"));
    }

    #[test]
    fn test_timestamp_fragments() {
        let created = created_fragment(&now());
        assert_eq!(
            created.text(),
            ".property('createdAt', vv_now).property('updatedAt', vv_now)"
        );
        assert_eq!(created.bindings["vv_now"], Json::from("2020-04-11T04:18:14.000Z"));

        let updated = updated_fragment(&now());
        assert_eq!(updated.text(), ".property('updatedAt', vv_now)");
        assert_eq!(updated.bindings.len(), 1);
    }

    #[test]
    fn test_ensure_query_shape() {
        let device = DeviceVertex {
            name: "Apple iPhone 11".to_string(),
        };
        let q = ensure_query(&device, "name", &Scalar::from(&device.name), &now());
        assert_eq!(
            q.text(),
            "g.V().hasLabel(vLabel).has(vKey, vValue).limit(1).fold().coalesce(unfold(), \
             addV(vLabel).property('pk', vPk).property(v_name, vv_name)\
             .property('createdAt', vv_now).property('updatedAt', vv_now))"
        );
        assert_eq!(q.bindings["vLabel"], Json::from("device"));
        assert_eq!(q.bindings["vPk"], Json::from("category"));
        assert_eq!(q.bindings["vKey"], Json::from("name"));
        assert_eq!(q.bindings["vValue"], Json::from("Apple iPhone 11"));
    }

    #[test]
    fn test_update_query_shape() {
        let photo = PhotoVertex {
            name: "a.jpg".to_string(),
            path: "/photo/a.jpg".to_string(),
            captured_at: None,
            hash: "sha256+ab".to_string(),
        };
        let q = update_query(&ElementId::Str("abc".to_string()), &photo, &now());
        assert_eq!(
            q.text(),
            "g.V(vId).property(v_name, vv_name).property(v_path, vv_path)\
             .property(v_hash, vv_hash).property('updatedAt', vv_now).valueMap(true)"
        );
        assert_eq!(q.bindings["vId"], Json::from("abc"));
        assert!(!q.bindings.contains_key("vv_capturedAt"));
    }

    #[test]
    fn test_ensure_edge_query_shape() {
        let q = ensure_edge_query(
            &ElementId::Int(1),
            &ElementId::Int(2),
            EdgeKind::DeviceTookPhoto,
            &now(),
        );
        assert_eq!(
            q.text(),
            "g.V(fromId).coalesce(outE(edgeLabel).has('targetId', toId), \
             addE(edgeLabel).to(g.V(toId)).property(v_name, vv_name)\
             .property(v_targetId, vv_targetId)\
             .property('createdAt', vv_now).property('updatedAt', vv_now))"
        );
        assert_eq!(q.bindings["edgeLabel"], Json::from("device_took_photo"));
        assert_eq!(q.bindings["vv_targetId"], Json::from(2));
    }
}
