//! value representation
//!
//! A configuration document is a tree of the following data types
//! - null
//! - boolean (true/false)
//! - integer (signed, i64)
//! - decimal (f64)
//! - string (utf-8, the only place reference expressions can live)
//! - array ("list" of values)
//! - object (order-preserving "map"/"dictionary", where the key is of type string)
//!
//! Integers that do not fit into an i64 are read as decimals.
use crate::path::{PathSegment, TreePath};
use serde::{
    ser::{SerializeMap, SerializeSeq},
    Serializer,
};

/// All possible value types
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
    Array(Vec<Value>),
    Object(indexmap::IndexMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&indexmap::IndexMap<String, Value>> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Presence lookup: `Some` for every existing node, including falsy ones.
    pub fn get_path(&self, path: &TreePath) -> Option<&Value> {
        let mut current = self;
        for segment in path.segments() {
            current = current.get_segment(segment)?;
        }
        Some(current)
    }

    pub fn get_path_mut(&mut self, path: &TreePath) -> Option<&mut Value> {
        let mut current = self;
        for segment in path.segments() {
            current = match (current, segment) {
                (Value::Object(object), PathSegment::Key(key)) => object.get_mut(key)?,
                (Value::Object(object), PathSegment::Index(index)) => {
                    object.get_mut(&index.to_string())?
                }
                (Value::Array(array), PathSegment::Index(index)) => array.get_mut(*index)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn get_segment(&self, segment: &PathSegment) -> Option<&Value> {
        match (self, segment) {
            (Value::Object(object), PathSegment::Key(key)) => object.get(key),
            // `a.0` addresses a key named "0" when the parent is an object
            (Value::Object(object), PathSegment::Index(index)) => object.get(&index.to_string()),
            (Value::Array(array), PathSegment::Index(index)) => array.get(*index),
            (Value::Array(array), PathSegment::Key(key)) => {
                key.parse::<usize>().ok().and_then(|index| array.get(index))
            }
            _ => None,
        }
    }

    /// Text used when a value is embedded into a larger string
    pub fn to_interpolated(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Boolean(value) => value.to_string(),
            Value::Integer(value) => value.to_string(),
            Value::Decimal(value) => value.to_string(),
            Value::String(value) => value.clone(),
            Value::Array(_) | Value::Object(_) => {
                serde_json::to_string(self).unwrap_or_else(|_| String::from("null"))
            }
        }
    }

    /// Number of nodes in the tree (every value counts as one)
    pub fn node_count(&self) -> usize {
        match self {
            Value::Array(array) => 1 + array.iter().map(Value::node_count).sum::<usize>(),
            Value::Object(object) => 1 + object.values().map(Value::node_count).sum::<usize>(),
            _ => 1,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Object(Default::default())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Decimal(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Array(value.into_iter().map(Into::into).collect())
    }
}

impl<K: ToString, V: Into<Value>> From<indexmap::IndexMap<K, V>> for Value {
    fn from(value: indexmap::IndexMap<K, V>) -> Self {
        Value::Object(
            value
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.into()))
                .collect(),
        )
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => b.into(),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(int) => Value::Integer(int),
                None => Value::Decimal(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => s.into(),
            serde_json::Value::Array(a) => a.into(),
            serde_json::Value::Object(o) => {
                Value::Object(o.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<hcl::Number> for Value {
    fn from(value: hcl::Number) -> Self {
        if let Some(int) = value.as_i64() {
            return Value::Integer(int);
        }

        Value::Decimal(value.as_f64().unwrap_or(f64::NAN))
    }
}

impl From<hcl::Value> for Value {
    fn from(value: hcl::Value) -> Value {
        match value {
            hcl::Value::Null => Value::Null,
            hcl::Value::Bool(b) => b.into(),
            hcl::Value::Number(n) => n.into(),
            hcl::Value::String(s) => s.into(),
            hcl::Value::Array(a) => a.into(),
            hcl::Value::Object(o) => {
                Value::Object(o.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_interpolated())
    }
}

impl serde::ser::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Boolean(value) => serializer.serialize_bool(*value),
            Value::Integer(value) => serializer.serialize_i64(*value),
            Value::Decimal(value) => serializer.serialize_f64(*value),
            Value::String(value) => serializer.serialize_str(value),
            Value::Array(value) => {
                let mut ser = serializer.serialize_seq(Some(value.len()))?;
                for element in value {
                    ser.serialize_element(element)?;
                }
                ser.end()
            }
            Value::Object(value) => {
                let mut ser = serializer.serialize_map(Some(value.len()))?;
                for (element_key, element_value) in value {
                    ser.serialize_entry(element_key, element_value)?;
                }
                ser.end()
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn falsy_values_are_present() {
        let value: Value = serde_json::json!({ "zero": 0, "no": false, "empty": "", "nothing": null }).into();

        for key in ["zero", "no", "empty", "nothing"] {
            let path = TreePath::parse_dotted(key).unwrap();
            assert!(value.get_path(&path).is_some(), "{key} must be present");
        }
        assert!(value
            .get_path(&TreePath::parse_dotted("missing").unwrap())
            .is_none());
    }

    #[test]
    fn index_into_arrays() {
        let value: Value = serde_json::json!({ "list": [{ "name": "first" }, { "name": "second" }] }).into();

        let by_bracket = TreePath::parse_dotted("list[1].name").unwrap();
        let by_dot = TreePath::parse_dotted("list.1.name").unwrap();

        assert_eq!(value.get_path(&by_bracket), Some(&Value::from("second")));
        assert_eq!(value.get_path(&by_dot), Some(&Value::from("second")));
    }

    #[test]
    fn interpolation_text() {
        assert_eq!(Value::Integer(8080).to_interpolated(), "8080");
        assert_eq!(Value::Boolean(false).to_interpolated(), "false");
        assert_eq!(Value::Null.to_interpolated(), "null");
        let list: Value = vec!["a", "b"].into();
        assert_eq!(list.to_interpolated(), r#"["a","b"]"#);
    }

    #[test]
    fn deserialize_preserves_order_and_types() {
        let value: Value = serde_yaml::from_str("b: 1\na: 1.5\nc: [true, ~]\n").unwrap();
        let Value::Object(object) = value else {
            panic!("expected object");
        };

        assert_eq!(object.keys().collect::<Vec<_>>(), vec!["b", "a", "c"]);
        assert_eq!(object["b"], Value::Integer(1));
        assert_eq!(object["a"], Value::Decimal(1.5));
        assert_eq!(object["c"], Value::Array(vec![Value::Boolean(true), Value::Null]));
    }
}
