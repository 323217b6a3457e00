//! Dynamic values flowing through configs, op inputs and artifacts.
//!
//! Shaped like JSON, plus typed numeric buffers so per-tile fields don't
//! have to be boxed element by element.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered object map
pub type Map = IndexMap<String, Value>;

/// A dynamic value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Absent / null
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Number (all numbers are f64)
    Number(f64),
    /// String
    String(String),
    /// Heterogeneous list
    Array(Vec<Value>),
    /// Object with insertion-ordered keys
    Object(Map),
    /// Typed numeric buffer
    Buffer(Buffer),
}

impl Value {
    /// Empty object
    #[must_use]
    pub fn object() -> Self {
        Self::Object(Map::new())
    }

    /// Name of the value kind, for error messages
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Buffer(_) => "buffer",
        }
    }

    /// Check for null
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrow as object
    #[must_use]
    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Mutably borrow as object
    pub fn as_object_mut(&mut self) -> Option<&mut Map> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Borrow as array
    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow as string
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Read as number
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Read as boolean
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrow as buffer
    #[must_use]
    pub fn as_buffer(&self) -> Option<&Buffer> {
        match self {
            Self::Buffer(buf) => Some(buf),
            _ => None,
        }
    }

    /// Look up a key on an object value
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Look up a nested key path, e.g. `["crust", "config", "ratio"]`
    #[must_use]
    pub fn get_path(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter().try_fold(self, |value, key| value.get(key))
    }

    /// Insert a key on an object value, turning null into an empty object
    ///
    /// Returns false if the value is neither an object nor null.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> bool {
        if self.is_null() {
            *self = Self::object();
        }
        match self {
            Self::Object(map) => {
                map.insert(key.into(), value.into());
                true
            }
            _ => false,
        }
    }

    /// Builder form of [`Value::insert`]
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Deep-merge `overlay` on top of `self`
    ///
    /// Objects merge key by key; any other overlay value replaces the base.
    #[must_use]
    pub fn merged(&self, overlay: &Value) -> Value {
        match (self, overlay) {
            (Self::Object(base), Self::Object(top)) => {
                let mut out = base.clone();
                for (key, value) in top {
                    let merged = match out.get(key) {
                        Some(existing) => existing.merged(value),
                        None => value.clone(),
                    };
                    out.insert(key.clone(), merged);
                }
                Self::Object(out)
            }
            (_, top) => top.clone(),
        }
    }

    /// Convert to a `serde_json::Value`, expanding buffers into arrays
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Array(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Self::Buffer(buf) => serde_json::Value::Array(
                (0..buf.len())
                    .map(|i| {
                        serde_json::Number::from_f64(buf.get_f64(i).unwrap_or(0.0))
                            .map(serde_json::Value::Number)
                            .unwrap_or(serde_json::Value::Null)
                    })
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            serde_json::Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Self::Object(map)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}

impl From<Buffer> for Value {
    fn from(buf: Buffer) -> Self {
        Self::Buffer(buf)
    }
}

/// Element type of a typed buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferKind {
    /// `u8`
    U8,
    /// `i8`
    I8,
    /// `u16`
    U16,
    /// `i16`
    I16,
    /// `u32`
    U32,
    /// `i32`
    I32,
    /// `f32`
    F32,
    /// `f64`
    F64,
}

impl BufferKind {
    /// Check that a number is representable in this element type
    #[must_use]
    pub fn accepts(self, n: f64) -> bool {
        if !n.is_finite() {
            return false;
        }
        let integral = n.fract() == 0.0;
        match self {
            Self::U8 => integral && (0.0..=f64::from(u8::MAX)).contains(&n),
            Self::I8 => integral && (f64::from(i8::MIN)..=f64::from(i8::MAX)).contains(&n),
            Self::U16 => integral && (0.0..=f64::from(u16::MAX)).contains(&n),
            Self::I16 => integral && (f64::from(i16::MIN)..=f64::from(i16::MAX)).contains(&n),
            Self::U32 => integral && (0.0..=f64::from(u32::MAX)).contains(&n),
            Self::I32 => integral && (f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&n),
            Self::F32 => n.abs() <= f64::from(f32::MAX),
            Self::F64 => true,
        }
    }
}

impl std::fmt::Display for BufferKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::U8 => "u8",
            Self::I8 => "i8",
            Self::U16 => "u16",
            Self::I16 => "i16",
            Self::U32 => "u32",
            Self::I32 => "i32",
            Self::F32 => "f32",
            Self::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// Typed numeric buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Buffer {
    /// `u8` elements
    U8(Vec<u8>),
    /// `i8` elements
    I8(Vec<i8>),
    /// `u16` elements
    U16(Vec<u16>),
    /// `i16` elements
    I16(Vec<i16>),
    /// `u32` elements
    U32(Vec<u32>),
    /// `i32` elements
    I32(Vec<i32>),
    /// `f32` elements
    F32(Vec<f32>),
    /// `f64` elements
    F64(Vec<f64>),
}

impl Buffer {
    /// Zero-filled buffer of the given kind and length
    #[must_use]
    pub fn zeroed(kind: BufferKind, len: usize) -> Self {
        match kind {
            BufferKind::U8 => Self::U8(vec![0; len]),
            BufferKind::I8 => Self::I8(vec![0; len]),
            BufferKind::U16 => Self::U16(vec![0; len]),
            BufferKind::I16 => Self::I16(vec![0; len]),
            BufferKind::U32 => Self::U32(vec![0; len]),
            BufferKind::I32 => Self::I32(vec![0; len]),
            BufferKind::F32 => Self::F32(vec![0.0; len]),
            BufferKind::F64 => Self::F64(vec![0.0; len]),
        }
    }

    /// Build a buffer from numbers, if every element fits `kind`
    #[must_use]
    pub fn from_numbers(kind: BufferKind, numbers: &[f64]) -> Option<Self> {
        if !numbers.iter().all(|n| kind.accepts(*n)) {
            return None;
        }
        // Elements are range-checked above, so the casts are lossless.
        let buf = match kind {
            BufferKind::U8 => Self::U8(numbers.iter().map(|n| *n as u8).collect()),
            BufferKind::I8 => Self::I8(numbers.iter().map(|n| *n as i8).collect()),
            BufferKind::U16 => Self::U16(numbers.iter().map(|n| *n as u16).collect()),
            BufferKind::I16 => Self::I16(numbers.iter().map(|n| *n as i16).collect()),
            BufferKind::U32 => Self::U32(numbers.iter().map(|n| *n as u32).collect()),
            BufferKind::I32 => Self::I32(numbers.iter().map(|n| *n as i32).collect()),
            BufferKind::F32 => Self::F32(numbers.iter().map(|n| *n as f32).collect()),
            BufferKind::F64 => Self::F64(numbers.to_vec()),
        };
        Some(buf)
    }

    /// Element type
    #[must_use]
    pub fn kind(&self) -> BufferKind {
        match self {
            Self::U8(_) => BufferKind::U8,
            Self::I8(_) => BufferKind::I8,
            Self::U16(_) => BufferKind::U16,
            Self::I16(_) => BufferKind::I16,
            Self::U32(_) => BufferKind::U32,
            Self::I32(_) => BufferKind::I32,
            Self::F32(_) => BufferKind::F32,
            Self::F64(_) => BufferKind::F64,
        }
    }

    /// Element count
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::U8(v) => v.len(),
            Self::I8(v) => v.len(),
            Self::U16(v) => v.len(),
            Self::I16(v) => v.len(),
            Self::U32(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
        }
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read one element widened to f64
    #[must_use]
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        match self {
            Self::U8(v) => v.get(index).map(|x| f64::from(*x)),
            Self::I8(v) => v.get(index).map(|x| f64::from(*x)),
            Self::U16(v) => v.get(index).map(|x| f64::from(*x)),
            Self::I16(v) => v.get(index).map(|x| f64::from(*x)),
            Self::U32(v) => v.get(index).map(|x| f64::from(*x)),
            Self::I32(v) => v.get(index).map(|x| f64::from(*x)),
            Self::F32(v) => v.get(index).map(|x| f64::from(*x)),
            Self::F64(v) => v.get(index).copied(),
        }
    }

    /// Borrow `u8` elements
    #[must_use]
    pub fn as_u8(&self) -> Option<&[u8]> {
        match self {
            Self::U8(v) => Some(v),
            _ => None,
        }
    }

    /// Mutably borrow `u8` elements
    pub fn as_u8_mut(&mut self) -> Option<&mut Vec<u8>> {
        match self {
            Self::U8(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow `i16` elements
    #[must_use]
    pub fn as_i16(&self) -> Option<&[i16]> {
        match self {
            Self::I16(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow `f32` elements
    #[must_use]
    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            Self::F32(v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json() {
        let value = Value::from(json!({"b": 2, "a": [true, null, "x"]}));
        assert_eq!(value.get("b"), Some(&Value::Number(2.0)));
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(value.get("a").unwrap().as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_get_path() {
        let value = Value::from(json!({"crust": {"config": {"ratio": 0.3}}}));
        assert_eq!(
            value.get_path(&["crust", "config", "ratio"]).and_then(Value::as_f64),
            Some(0.3)
        );
        assert!(value.get_path(&["crust", "missing"]).is_none());
    }

    #[test]
    fn test_insert_on_null_creates_object() {
        let mut value = Value::Null;
        assert!(value.insert("a", 1.0));
        assert_eq!(value.get("a"), Some(&Value::Number(1.0)));

        let mut scalar = Value::from(3.0);
        assert!(!scalar.insert("a", 1.0));
    }

    #[test]
    fn test_merged_is_deep() {
        let base = Value::from(json!({"knobs": {"a": 1, "b": 2}, "x": "keep"}));
        let top = Value::from(json!({"knobs": {"b": 3}, "y": true}));
        let merged = base.merged(&top);
        assert_eq!(merged, Value::from(json!({"knobs": {"a": 1, "b": 3}, "x": "keep", "y": true})));
    }

    #[test]
    fn test_buffer_to_json() {
        let value = Value::Buffer(Buffer::U8(vec![1, 2, 3]));
        assert_eq!(value.to_json(), json!([1.0, 2.0, 3.0]));
    }

    #[test]
    fn test_buffer_from_numbers_checks_range() {
        assert_eq!(
            Buffer::from_numbers(BufferKind::U8, &[0.0, 255.0]),
            Some(Buffer::U8(vec![0, 255]))
        );
        assert!(Buffer::from_numbers(BufferKind::U8, &[256.0]).is_none());
        assert!(Buffer::from_numbers(BufferKind::I16, &[1.5]).is_none());
        assert!(Buffer::from_numbers(BufferKind::F32, &[1.5]).is_some());
    }

    #[test]
    fn test_buffer_zeroed() {
        let buf = Buffer::zeroed(BufferKind::F32, 6);
        assert_eq!(buf.kind(), BufferKind::F32);
        assert_eq!(buf.len(), 6);
        assert_eq!(buf.get_f64(5), Some(0.0));
        assert_eq!(buf.get_f64(6), None);
    }

    #[test]
    fn test_value_deserializes_untagged() {
        let value: Value = serde_json::from_str(r#"{"n": 4, "list": [1, 2]}"#).unwrap();
        assert_eq!(value.get("n"), Some(&Value::Number(4.0)));
        assert!(matches!(value.get("list"), Some(Value::Array(_))));
    }
}
