//! Decoding of GraphSON result payloads into [`Element`]s.

use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;

use super::element::Element;
use super::value::ElementId;
use crate::error::GraphError;

/// Strip GraphSON type wrappers (`{"@type": .., "@value": ..}`) so typed
/// (v2/v3) and untyped payloads decode the same way.
pub fn untype(value: Json) -> Json {
    match value {
        Json::Object(mut obj) if obj.contains_key("@type") && obj.contains_key("@value") => {
            let kind = obj.get("@type").and_then(Json::as_str).unwrap_or_default().to_string();
            let inner = obj.remove("@value").unwrap_or(Json::Null);
            match (kind.as_str(), inner) {
                // v3 maps are flattened key/value lists
                ("g:Map", Json::Array(items)) => {
                    let mut map = Map::new();
                    let mut iter = items.into_iter().map(untype);
                    while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
                        let key = match k {
                            Json::String(s) => s,
                            other => other.to_string(),
                        };
                        map.insert(key, v);
                    }
                    Json::Object(map)
                }
                (_, inner) => untype(inner),
            }
        }
        Json::Object(obj) => Json::Object(obj.into_iter().map(|(k, v)| (k, untype(v))).collect()),
        Json::Array(items) => Json::Array(items.into_iter().map(untype).collect()),
        other => other,
    }
}

/// Decode a vertex, an edge, or a `valueMap(true)` row.
pub fn decode_element(value: &Json) -> Result<Element, GraphError> {
    let obj = value
        .as_object()
        .ok_or_else(|| GraphError::Protocol(format!("expected an element, got {}", value)))?;

    let id = obj
        .get("id")
        .and_then(|id| ElementId::from_json(&first(id)))
        .ok_or_else(|| GraphError::Protocol(format!("element without id: {}", value)))?;
    let label = obj
        .get("label")
        .map(first)
        .and_then(|l| l.as_str().map(str::to_string))
        .unwrap_or_default();

    let mut properties = BTreeMap::new();
    match obj.get("properties") {
        Some(Json::Object(props)) => {
            for (key, prop) in props {
                if let Some(v) = property_value(prop) {
                    properties.insert(key.clone(), v);
                }
            }
        }
        _ => {
            for (key, prop) in obj {
                if key == "id" || key == "label" {
                    continue;
                }
                if let Some(v) = property_value(prop) {
                    properties.insert(key.clone(), v);
                }
            }
        }
    }

    Ok(Element {
        id,
        label,
        properties,
    })
}

pub fn decode_elements(rows: &[Json]) -> Result<Vec<Element>, GraphError> {
    rows.iter().map(decode_element).collect()
}

fn first(value: &Json) -> Json {
    match value {
        Json::Array(items) => items.first().cloned().unwrap_or(Json::Null),
        other => other.clone(),
    }
}

/// Vertex properties arrive as lists of `{id, value}`, edge properties as
/// `{key, value}` or a bare value, `valueMap` entries as lists of values.
fn property_value(prop: &Json) -> Option<Json> {
    let value = match first(prop) {
        Json::Object(mut obj) if obj.contains_key("value") => obj.remove("value")?,
        other => other,
    };
    if value.is_null() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_cosmos_vertex() {
        let row = json!({
            "id": "6e4f",
            "label": "device",
            "type": "vertex",
            "properties": {
                "pk": [{"id": "a", "value": "category"}],
                "name": [{"id": "b", "value": "Nokia N8-00"}]
            }
        });
        let element = decode_element(&row).unwrap();
        assert_eq!(element.id, ElementId::Str("6e4f".to_string()));
        assert_eq!(element.label, "device");
        assert_eq!(element.get_str("name"), Some("Nokia N8-00"));
        assert_eq!(element.get_str("pk"), Some("category"));
    }

    #[test]
    fn test_decode_typed_value_map() {
        let row = untype(json!({
            "@type": "g:Map",
            "@value": [
                "id", {"@type": "g:Int64", "@value": 12},
                "label", "photo",
                "path", {"@type": "g:List", "@value": ["/photo/a.jpg"]}
            ]
        }));
        let element = decode_element(&row).unwrap();
        assert_eq!(element.id, ElementId::Int(12));
        assert_eq!(element.label, "photo");
        assert_eq!(element.get_str("path"), Some("/photo/a.jpg"));
    }

    #[test]
    fn test_decode_edge() {
        let row = json!({
            "id": 30,
            "label": "device_took_photo",
            "type": "edge",
            "inV": 2,
            "outV": 1,
            "properties": {"targetId": 2, "name": {"key": "name", "value": "device_took_photo"}}
        });
        let element = decode_element(&row).unwrap();
        assert_eq!(element.get_i64("targetId"), Some(2));
        assert_eq!(element.get_str("name"), Some("device_took_photo"));
    }

    #[test]
    fn test_element_without_id_is_protocol_error() {
        assert!(matches!(
            decode_element(&json!({"label": "x"})),
            Err(GraphError::Protocol(_))
        ));
    }
}
