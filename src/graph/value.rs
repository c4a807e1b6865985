//! Scalar property values and element ids.

use serde_json::Value as Json;
use std::fmt;

/// A property value that can be bound into a traversal.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Scalar {
    pub fn to_json(&self) -> Json {
        match self {
            Scalar::Bool(b) => Json::Bool(*b),
            Scalar::Int(i) => Json::from(*i),
            Scalar::Float(f) => Json::from(*f),
            Scalar::String(s) => Json::String(s.clone()),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::String(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::String(value)
    }
}

impl From<&String> for Scalar {
    fn from(value: &String) -> Self {
        Scalar::String(value.clone())
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::String(s) => f.write_str(s),
        }
    }
}

/// Store-assigned element id.
///
/// TinkerPop servers hand out numeric ids, Cosmos-style servers hand out
/// strings. The id is bound back into later traversals exactly as it was
/// received so the store can match it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementId {
    Int(i64),
    Str(String),
}

impl ElementId {
    pub fn from_json(value: &Json) -> Option<Self> {
        match value {
            Json::Number(n) => n.as_i64().map(ElementId::Int),
            Json::String(s) => Some(ElementId::Str(s.clone())),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Json {
        match self {
            ElementId::Int(i) => Json::from(*i),
            ElementId::Str(s) => Json::String(s.clone()),
        }
    }
}

impl From<&ElementId> for Scalar {
    fn from(id: &ElementId) -> Self {
        match id {
            ElementId::Int(i) => Scalar::Int(*i),
            ElementId::Str(s) => Scalar::String(s.clone()),
        }
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementId::Int(i) => write!(f, "{}", i),
            ElementId::Str(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_id_from_json() {
        assert_eq!(ElementId::from_json(&Json::from(7)), Some(ElementId::Int(7)));
        assert_eq!(
            ElementId::from_json(&Json::from("a1b2")),
            Some(ElementId::Str("a1b2".to_string()))
        );
        assert_eq!(ElementId::from_json(&Json::Null), None);
    }

    #[test]
    fn test_scalar_json() {
        assert_eq!(Scalar::from("paris").to_json(), Json::from("paris"));
        assert_eq!(Scalar::from(3i64).to_json(), Json::from(3));
        assert_eq!(Scalar::from(true).to_json(), Json::Bool(true));
    }
}
