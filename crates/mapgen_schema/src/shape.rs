//! Structural shapes for configs and artifact payloads.
//!
//! A small closed set of kinds. Every kind may carry a default, and
//! [`Shape::default_value`] assembles the default of a whole tree.

use crate::value::{BufferKind, Map, Value};
use indexmap::IndexMap;
use serde::Serialize;

/// A structural type descriptor
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "spec", rename_all = "lowercase")]
pub enum Shape {
    /// Object with named fields
    Object(ObjectShape),
    /// Homogeneous list
    Array(ArrayShape),
    /// Tagged union of object variants
    Union(UnionShape),
    /// Exactly one value
    Literal(Value),
    /// Number, optionally integral and bounded
    Number(NumberShape),
    /// String, optionally from an allowed set
    String(StringShape),
    /// Boolean
    Boolean(BooleanShape),
    /// Fixed-length typed numeric buffer
    Buffer(BufferShape),
}

impl Shape {
    /// Literal shape
    #[must_use]
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// Name of the shape kind
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Object(_) => "object",
            Self::Array(_) => "array",
            Self::Union(_) => "union",
            Self::Literal(_) => "literal",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Boolean(_) => "boolean",
            Self::Buffer(_) => "buffer",
        }
    }

    /// Borrow as object shape
    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectShape> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Default value of this shape, if it has one
    ///
    /// Objects always have a default: the object of their fields' defaults
    /// (fields without one are left out). Literals default to themselves.
    #[must_use]
    pub fn default_value(&self) -> Option<Value> {
        match self {
            Self::Object(obj) => Some(obj.default_value()),
            Self::Array(arr) => arr.default.clone().map(Value::Array),
            Self::Union(union) => union.default.clone(),
            Self::Literal(value) => Some(value.clone()),
            Self::Number(num) => num.default.map(Value::Number),
            Self::String(s) => s.default.clone().map(Value::String),
            Self::Boolean(b) => b.default.map(Value::Bool),
            Self::Buffer(_) => None,
        }
    }
}

/// Default value of a shape, or null when it has none
#[must_use]
pub fn defaults_of(shape: &Shape) -> Value {
    shape.default_value().unwrap_or_default()
}

/// What to do with keys the object shape doesn't declare
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownKeys {
    /// Report them as `schema.unknown-key`
    #[default]
    Reject,
    /// Keep them untouched
    Passthrough,
}

/// A declared object field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    /// Field shape
    pub shape: Shape,
    /// May be absent
    pub optional: bool,
}

/// Object shape
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObjectShape {
    /// Declared fields, in declaration order
    pub fields: IndexMap<String, Field>,
    /// Unknown key policy
    pub unknown_keys: UnknownKeys,
    /// Optional description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ObjectShape {
    /// Create an empty object shape that rejects unknown keys
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a required field
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, shape: impl Into<Shape>) -> Self {
        self.fields.insert(
            name.into(),
            Field {
                shape: shape.into(),
                optional: false,
            },
        );
        self
    }

    /// Add an optional field
    #[must_use]
    pub fn optional(mut self, name: impl Into<String>, shape: impl Into<Shape>) -> Self {
        self.fields.insert(
            name.into(),
            Field {
                shape: shape.into(),
                optional: true,
            },
        );
        self
    }

    /// Keep undeclared keys instead of rejecting them
    #[must_use]
    pub fn passthrough(mut self) -> Self {
        self.unknown_keys = UnknownKeys::Passthrough;
        self
    }

    /// Set description
    #[must_use]
    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Look up a field
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Check if a field is declared
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Object of the fields' defaults
    #[must_use]
    pub fn default_value(&self) -> Value {
        let mut map = Map::new();
        for (name, field) in &self.fields {
            if let Some(value) = field.shape.default_value() {
                map.insert(name.clone(), value);
            }
        }
        Value::Object(map)
    }
}

impl From<ObjectShape> for Shape {
    fn from(obj: ObjectShape) -> Self {
        Self::Object(obj)
    }
}

/// Array shape
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrayShape {
    /// Item shape
    pub items: Box<Shape>,
    /// Minimum item count
    pub min_items: Option<usize>,
    /// Maximum item count
    pub max_items: Option<usize>,
    /// Default items
    pub default: Option<Vec<Value>>,
}

impl ArrayShape {
    /// Create an array of `items`
    #[must_use]
    pub fn new(items: impl Into<Shape>) -> Self {
        Self {
            items: Box::new(items.into()),
            min_items: None,
            max_items: None,
            default: None,
        }
    }

    /// Set minimum item count
    #[must_use]
    pub fn with_min_items(mut self, min: usize) -> Self {
        self.min_items = Some(min);
        self
    }

    /// Set maximum item count
    #[must_use]
    pub fn with_max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    /// Set default items
    #[must_use]
    pub fn with_default(mut self, items: Vec<Value>) -> Self {
        self.default = Some(items);
        self
    }
}

impl From<ArrayShape> for Shape {
    fn from(arr: ArrayShape) -> Self {
        Self::Array(arr)
    }
}

/// Tagged union of object variants
///
/// Each variant object carries a literal field named `tag` whose value is
/// the variant name; [`UnionShape::variant`] inserts it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnionShape {
    /// Discriminator key
    pub tag: String,
    /// Variants by tag value
    pub variants: IndexMap<String, ObjectShape>,
    /// Default value
    pub default: Option<Value>,
}

impl UnionShape {
    /// Create an empty union discriminated by `tag`
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            variants: IndexMap::new(),
            default: None,
        }
    }

    /// Add a variant; the tag literal becomes its first field
    #[must_use]
    pub fn variant(mut self, name: impl Into<String>, body: ObjectShape) -> Self {
        let name = name.into();
        let mut fields = IndexMap::new();
        fields.insert(
            self.tag.clone(),
            Field {
                shape: Shape::literal(name.as_str()),
                optional: false,
            },
        );
        for (key, field) in body.fields {
            if key != self.tag {
                fields.insert(key, field);
            }
        }
        let variant = ObjectShape {
            fields,
            unknown_keys: body.unknown_keys,
            description: body.description,
        };
        self.variants.insert(name, variant);
        self
    }

    /// Set default value
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Look up a variant
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ObjectShape> {
        self.variants.get(name)
    }
}

impl From<UnionShape> for Shape {
    fn from(union: UnionShape) -> Self {
        Self::Union(union)
    }
}

/// Number shape
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct NumberShape {
    /// Inclusive lower bound
    pub minimum: Option<f64>,
    /// Inclusive upper bound
    pub maximum: Option<f64>,
    /// Must be integral
    pub integer: bool,
    /// Default value
    pub default: Option<f64>,
}

impl NumberShape {
    /// Any number
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Any integer
    #[must_use]
    pub fn integer() -> Self {
        Self {
            integer: true,
            ..Self::default()
        }
    }

    /// Set inclusive lower bound
    #[must_use]
    pub fn with_min(mut self, min: f64) -> Self {
        self.minimum = Some(min);
        self
    }

    /// Set inclusive upper bound
    #[must_use]
    pub fn with_max(mut self, max: f64) -> Self {
        self.maximum = Some(max);
        self
    }

    /// Set both bounds
    #[must_use]
    pub fn with_range(self, min: f64, max: f64) -> Self {
        self.with_min(min).with_max(max)
    }

    /// Set default value
    #[must_use]
    pub fn with_default(mut self, value: f64) -> Self {
        self.default = Some(value);
        self
    }
}

impl From<NumberShape> for Shape {
    fn from(num: NumberShape) -> Self {
        Self::Number(num)
    }
}

/// String shape
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StringShape {
    /// Allowed values
    pub allowed: Option<Vec<String>>,
    /// Default value
    pub default: Option<String>,
}

impl StringShape {
    /// Any string
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to a fixed set
    #[must_use]
    pub fn with_allowed<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Set default value
    #[must_use]
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }
}

impl From<StringShape> for Shape {
    fn from(s: StringShape) -> Self {
        Self::String(s)
    }
}

/// Boolean shape
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BooleanShape {
    /// Default value
    pub default: Option<bool>,
}

impl BooleanShape {
    /// Any boolean
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set default value
    #[must_use]
    pub fn with_default(mut self, value: bool) -> Self {
        self.default = Some(value);
        self
    }
}

impl From<BooleanShape> for Shape {
    fn from(b: BooleanShape) -> Self {
        Self::Boolean(b)
    }
}

/// Required length of a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BufferLength {
    /// Exactly this many elements
    Exact(usize),
    /// One element per map tile; checked when dimensions are known
    MapArea,
    /// Any length
    Any,
}

/// Typed buffer shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BufferShape {
    /// Element type
    pub kind: BufferKind,
    /// Length requirement
    pub length: BufferLength,
}

impl BufferShape {
    /// Create a buffer shape
    #[must_use]
    pub const fn new(kind: BufferKind, length: BufferLength) -> Self {
        Self { kind, length }
    }

    /// One element per tile
    #[must_use]
    pub const fn per_tile(kind: BufferKind) -> Self {
        Self::new(kind, BufferLength::MapArea)
    }
}

impl From<BufferShape> for Shape {
    fn from(buf: BufferShape) -> Self {
        Self::Buffer(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_defaults() {
        let shape: Shape = ObjectShape::new()
            .field("value", StringShape::new().with_default("base"))
            .optional("note", StringShape::new())
            .field("nested", ObjectShape::new().field("n", NumberShape::new().with_default(2.0)))
            .into();
        assert_eq!(
            defaults_of(&shape),
            Value::from(json!({"value": "base", "nested": {"n": 2.0}}))
        );
    }

    #[test]
    fn test_union_variant_gets_tag_literal() {
        let union = UnionShape::new("strategy")
            .variant("default", ObjectShape::new().field("config", ObjectShape::new()));
        let variant = union.get("default").unwrap();
        let first = variant.fields.keys().next().unwrap();
        assert_eq!(first, "strategy");
        assert_eq!(variant.get("strategy").unwrap().shape, Shape::literal("default"));
    }

    #[test]
    fn test_scalar_defaults() {
        assert_eq!(Shape::from(NumberShape::integer().with_default(3.0)).default_value(), Some(Value::Number(3.0)));
        assert_eq!(Shape::from(BooleanShape::new()).default_value(), None);
        assert_eq!(Shape::literal("x").default_value(), Some(Value::from("x")));
        assert_eq!(Shape::from(BufferShape::per_tile(BufferKind::U8)).default_value(), None);
    }

    #[test]
    fn test_shape_serializes_with_kind() {
        let shape: Shape = NumberShape::new().with_range(0.0, 1.0).into();
        let json = serde_json::to_value(&shape).unwrap();
        assert_eq!(json["type"], "number");
        assert_eq!(json["spec"]["maximum"], 1.0);
    }
}
