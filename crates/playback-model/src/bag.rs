use std::borrow::Cow;

use serde_json::{Map, Value};
use tracing::trace;

use crate::error::FormatError;
use crate::schema::{EntityKind, StructuredKind, structured_kind};

/// Ordered key/value store backing every playback entity.
///
/// Scalar keys hold strings, integers, floats or booleans. The few keys the
/// schema declares as structured hold objects or arrays. Insertion order is
/// preserved so serialized payloads are stable.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeBag {
    kind: EntityKind,
    values: Map<String, Value>,
}

impl AttributeBag {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            values: Map::new(),
        }
    }

    /// Builds a bag from existing pairs, validating each one through [`put`](Self::put).
    pub fn from_pairs<I, K>(kind: EntityKind, pairs: I) -> Result<Self, FormatError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut bag = Self::new(kind);
        for (key, value) in pairs {
            bag.put(key, value)?;
        }
        Ok(bag)
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Returns the stored value. Empty strings read as absent.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self.values.get(key) {
            Some(Value::String(s)) if s.is_empty() => None,
            other => other,
        }
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| scalar_text(v).into_owned())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s
                .parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64)),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
            Value::Number(n) => n.as_i64().map(|v| v != 0),
            _ => None,
        }
    }

    /// Stores `value` under `key`. `Value::Null` removes the key.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<(), FormatError> {
        let key = key.into();
        if key.is_empty() {
            return Err(FormatError::EmptyKey);
        }
        let value = value.into();
        if value.is_null() {
            self.values.shift_remove(&key);
            return Ok(());
        }

        match (structured_kind(&key), &value) {
            (Some(StructuredKind::Object), Value::Object(_))
            | (Some(StructuredKind::Array), Value::Array(_)) => {}
            (Some(expected), other) => {
                return Err(FormatError::Shape {
                    key,
                    expected: expected.describe(),
                    found: describe(other),
                });
            }
            (None, Value::Object(_) | Value::Array(_)) => {
                return Err(FormatError::StructuredUnderScalar { key });
            }
            (None, _) => {}
        }

        if !self.kind.declares(&key) {
            trace!(entity = %self.kind, key = %key, "undeclared attribute key");
        }
        self.values.insert(key, value);
        Ok(())
    }

    /// Stores a scalar under a scalar key without going through validation
    /// errors. Returns `false` and leaves the bag untouched when the pair
    /// would not pass [`put`](Self::put).
    pub fn insert_scalar(&mut self, key: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        let storable = !key.is_empty()
            && structured_kind(key).is_none()
            && !matches!(value, Value::Null | Value::Object(_) | Value::Array(_));
        if storable {
            self.values.insert(key.to_owned(), value);
        }
        storable
    }

    /// Stores a float, rejecting NaN and infinities.
    pub fn put_f64(&mut self, key: impl Into<String>, value: f64) -> Result<(), FormatError> {
        let key = key.into();
        if !value.is_finite() {
            return Err(FormatError::NonFinite { key, value });
        }
        self.put(key, value)
    }

    /// Copies every key of `other` into this bag. Structured keys keep their
    /// structure; a structured value under a scalar key is stringified.
    pub fn update(&mut self, other: &AttributeBag) {
        for (key, value) in &other.values {
            let value = match value {
                Value::Object(_) | Value::Array(_) if structured_kind(key).is_none() => {
                    Value::String(value.to_string())
                }
                _ => value.clone(),
            };
            self.values.insert(key.clone(), value);
        }
    }

    /// Swaps the full contents for those of `other`, keeping this bag's kind.
    pub fn replace(&mut self, other: AttributeBag) {
        self.values = other.values;
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.shift_remove(key)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Keeps only the pairs for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &Value) -> bool) {
        self.values.retain(|key, value| keep(key, value));
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Same key set and same values, both compared case-insensitively.
    pub fn is_equal_to(&self, other: &AttributeBag) -> bool {
        if self.values.len() != other.values.len() {
            return false;
        }
        self.values.iter().all(|(key, value)| {
            other
                .values
                .iter()
                .find(|(other_key, _)| other_key.eq_ignore_ascii_case(key))
                .is_some_and(|(_, other_value)| {
                    scalar_text(value).eq_ignore_ascii_case(&scalar_text(other_value))
                })
        })
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.values.clone())
    }
}

/// Owner of a bag that caches fields derived from it.
///
/// `replace_bag` swaps the bag wholesale and then lets the owner refresh its
/// cached view of the contents.
pub trait Synced {
    fn bag_mut(&mut self) -> &mut AttributeBag;

    fn sync(&mut self);

    fn replace_bag(&mut self, bag: AttributeBag) {
        self.bag_mut().replace(bag);
        self.sync();
    }
}

/// Text form of a stored value as it would appear on the wire.
pub fn scalar_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        other => Cow::Owned(other.to_string()),
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
