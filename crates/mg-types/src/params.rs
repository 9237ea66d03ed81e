//! Parameter values and ordered parameter assignments.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::errors::{MgError, MgResult};

/// A primitive (or opaque) model parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<ParamValue>),
    Json(serde_json::Value),
}

impl ParamValue {
    /// Short name of the variant, used in type-mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::List(_) => "list",
            Self::Json(_) => "json",
        }
    }

    /// Numeric view; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ParamValue]> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v:?}"),
            Self::List(values) => {
                write!(f, "[")?;
                for (idx, value) in values.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            }
            Self::Json(v) => write!(f, "{v}"),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Value> for ParamValue {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

/// Ordered `name -> value` assignment.
///
/// Used for grid points, reparam updates and calibrator proposals. Keys keep
/// their first insertion position; re-inserting a key overwrites its value in
/// place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: Vec<(String, ParamValue)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Option<ParamValue> {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    /// Builder form of [`Params::insert`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Merge `other` into `self`; colliding keys take `other`'s value.
    pub fn merge(&mut self, other: Params) {
        for (name, value) in other.entries {
            self.insert(name, value);
        }
    }

    /// Look up a parameter a model cannot be built without.
    pub fn require(&self, model: &str, name: &str) -> MgResult<&ParamValue> {
        self.get(name)
            .ok_or_else(|| MgError::missing_parameter(model, name))
    }

    pub fn require_f64(&self, model: &str, name: &str) -> MgResult<f64> {
        let value = self.require(model, name)?;
        value
            .as_f64()
            .ok_or_else(|| MgError::type_mismatch(format!("float for `{name}`"), value.kind()))
    }

    pub fn require_i64(&self, model: &str, name: &str) -> MgResult<i64> {
        let value = self.require(model, name)?;
        value
            .as_i64()
            .ok_or_else(|| MgError::type_mismatch(format!("int for `{name}`"), value.kind()))
    }

    pub fn require_bool(&self, model: &str, name: &str) -> MgResult<bool> {
        let value = self.require(model, name)?;
        value
            .as_bool()
            .ok_or_else(|| MgError::type_mismatch(format!("bool for `{name}`"), value.kind()))
    }

    pub fn require_str(&self, model: &str, name: &str) -> MgResult<&str> {
        let value = self.require(model, name)?;
        value
            .as_str()
            .ok_or_else(|| MgError::type_mismatch(format!("text for `{name}`"), value.kind()))
    }

    pub fn require_list(&self, model: &str, name: &str) -> MgResult<&[ParamValue]> {
        let value = self.require(model, name)?;
        value
            .as_list()
            .ok_or_else(|| MgError::type_mismatch(format!("list for `{name}`"), value.kind()))
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (idx, (name, value)) in self.entries.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        write!(f, "}}")
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}

impl IntoIterator for Params {
    type Item = (String, ParamValue);
    type IntoIter = std::vec::IntoIter<(String, ParamValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for Params {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Params {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ParamsVisitor;

        impl<'de> Visitor<'de> for ParamsVisitor {
            type Value = Params;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of parameter names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Params, A::Error> {
                let mut params = Params::new();
                while let Some((name, value)) = access.next_entry::<String, ParamValue>()? {
                    params.insert(name, value);
                }
                Ok(params)
            }
        }

        deserializer.deserialize_map(ParamsVisitor)
    }
}

/// Build a [`Params`] from `name => value` pairs.
#[macro_export]
macro_rules! params {
    () => {
        $crate::Params::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {
        $crate::Params::new()$(.with($name, $value))+
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_keeps_first_position() {
        let mut params = params! { "a" => 1, "b" => 2.5 };
        let previous = params.insert("a", 10);

        assert_eq!(previous, Some(ParamValue::Int(1)));
        assert_eq!(params.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(params.get("a"), Some(&ParamValue::Int(10)));
    }

    #[test]
    fn merge_is_last_writer_wins() {
        let mut merged = params! { "alpha" => 1, "beta" => 2 };
        merged.merge(params! { "beta" => 20, "gamma" => 30 });

        assert_eq!(merged.len(), 3);
        assert_eq!(merged.get("beta"), Some(&ParamValue::Int(20)));
        assert_eq!(merged.keys().collect::<Vec<_>>(), vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn require_reports_missing_and_mismatched() {
        let params = params! { "number" => 1, "arr" => vec![1, 2, 3] };

        assert_eq!(params.require_f64("Bar", "number").unwrap(), 1.0);
        assert_eq!(params.require_list("Bar", "arr").unwrap().len(), 3);
        assert!(matches!(
            params.require_f64("Bar", "missing"),
            Err(MgError::MissingParameter { .. })
        ));
        assert!(matches!(
            params.require_f64("Bar", "arr"),
            Err(MgError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn display_lists_entries_in_order() {
        let params = params! { "number" => -1, "arr" => vec![1, 2, 3] };
        assert_eq!(params.to_string(), "{number: -1, arr: [1, 2, 3]}");
    }

    #[test]
    fn serde_preserves_order() {
        let params = params! { "z" => 1, "a" => "text", "m" => true };
        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(json, r#"{"z":1,"a":"text","m":true}"#);

        let back: Params = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }
}
