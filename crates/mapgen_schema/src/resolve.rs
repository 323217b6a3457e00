//! The validate-and-apply-defaults routine.
//!
//! One walk over a [`Shape`] tree serves stage surfaces, step configs,
//! op selections and artifact payloads. Issues are collected rather than
//! returned at the first failure so callers can report all of them.

use crate::issue::{IssueCode, SchemaIssue};
use crate::path::Path;
use crate::shape::{
    ArrayShape, BufferLength, BufferShape, NumberShape, ObjectShape, Shape, StringShape,
    UnionShape, UnknownKeys,
};
use crate::value::{Buffer, Map, Value};
use mapgen_core::Dimensions;

/// How missing values are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Fill missing values from shape defaults
    ApplyDefaults,
    /// Take the value as-is; missing required values are errors
    Strict,
}

/// Facts the resolver needs from outside the value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationContext {
    /// Map size, for [`BufferLength::MapArea`] checks
    pub dimensions: Option<Dimensions>,
}

impl ValidationContext {
    /// Context that knows the map size
    #[must_use]
    pub const fn with_dimensions(dimensions: Dimensions) -> Self {
        Self {
            dimensions: Some(dimensions),
        }
    }
}

/// Validate `value` against `shape`
///
/// `None` means the value is absent, which under [`Mode::ApplyDefaults`]
/// yields the shape's default.
///
/// # Errors
///
/// Returns every issue found, each located by its JSON pointer
pub fn resolve(
    shape: &Shape,
    value: Option<&Value>,
    path: &Path,
    ctx: &ValidationContext,
    mode: Mode,
) -> Result<Value, Vec<SchemaIssue>> {
    let mut resolver = Resolver {
        ctx,
        mode,
        issues: Vec::new(),
    };
    let out = resolver.slot(shape, value, false, path);
    if resolver.issues.is_empty() {
        Ok(out.unwrap_or_default())
    } else {
        Err(resolver.issues)
    }
}

/// Strictly check `value` against `shape`
///
/// # Errors
///
/// Returns every issue found
pub fn validate(
    shape: &Shape,
    value: &Value,
    ctx: &ValidationContext,
) -> Result<(), Vec<SchemaIssue>> {
    resolve(shape, Some(value), &Path::root(), ctx, Mode::Strict).map(|_| ())
}

struct Resolver<'a> {
    ctx: &'a ValidationContext,
    mode: Mode,
    issues: Vec<SchemaIssue>,
}

impl Resolver<'_> {
    fn issue(&mut self, code: IssueCode, path: &Path, message: impl Into<String>) {
        self.issues.push(SchemaIssue::new(code, path.clone(), message));
    }

    /// A possibly-absent value. Returns `None` when it should be omitted.
    fn slot(&mut self, shape: &Shape, value: Option<&Value>, optional: bool, path: &Path) -> Option<Value> {
        if let Some(value) = value {
            return Some(self.walk(shape, value, path));
        }
        if self.mode == Mode::ApplyDefaults {
            if let Some(default) = shape.default_value() {
                return Some(self.walk(shape, &default, path));
            }
        }
        if !optional {
            self.issue(
                IssueCode::MissingField,
                path,
                format!("required {} is missing", shape.kind_name()),
            );
        }
        None
    }

    fn walk(&mut self, shape: &Shape, value: &Value, path: &Path) -> Value {
        match shape {
            Shape::Object(obj) => self.object(obj, value, path),
            Shape::Array(arr) => self.array(arr, value, path),
            Shape::Union(union) => self.union(union, value, path),
            Shape::Literal(expected) => {
                if value != expected {
                    self.issue(
                        IssueCode::LiteralMismatch,
                        path,
                        format!("expected {}, got {}", expected.to_json(), value.to_json()),
                    );
                }
                value.clone()
            }
            Shape::Number(num) => self.number(num, value, path),
            Shape::String(s) => self.string(s, value, path),
            Shape::Boolean(_) => {
                if value.as_bool().is_none() {
                    self.mismatch("boolean", value, path);
                }
                value.clone()
            }
            Shape::Buffer(buf) => self.buffer(buf, value, path),
        }
    }

    fn mismatch(&mut self, expected: &str, value: &Value, path: &Path) {
        self.issue(
            IssueCode::TypeMismatch,
            path,
            format!("expected {}, got {}", expected, value.kind_name()),
        );
    }

    fn object(&mut self, obj: &ObjectShape, value: &Value, path: &Path) -> Value {
        let Some(map) = value.as_object() else {
            self.mismatch("object", value, path);
            return value.clone();
        };
        let mut out = Map::new();
        for (name, field) in &obj.fields {
            let child = path.child(name);
            if let Some(resolved) = self.slot(&field.shape, map.get(name), field.optional, &child) {
                out.insert(name.clone(), resolved);
            }
        }
        for (key, extra) in map {
            if obj.has_field(key) {
                continue;
            }
            match obj.unknown_keys {
                UnknownKeys::Reject => {
                    self.issue(
                        IssueCode::UnknownKey,
                        &path.child(key),
                        format!("key '{}' is not allowed", key),
                    );
                }
                UnknownKeys::Passthrough => {
                    out.insert(key.clone(), extra.clone());
                }
            }
        }
        Value::Object(out)
    }

    fn array(&mut self, arr: &ArrayShape, value: &Value, path: &Path) -> Value {
        let Some(items) = value.as_array() else {
            self.mismatch("array", value, path);
            return value.clone();
        };
        if let Some(min) = arr.min_items {
            if items.len() < min {
                self.issue(
                    IssueCode::ArrayLength,
                    path,
                    format!("{} items, need at least {}", items.len(), min),
                );
            }
        }
        if let Some(max) = arr.max_items {
            if items.len() > max {
                self.issue(
                    IssueCode::ArrayLength,
                    path,
                    format!("{} items, allowed at most {}", items.len(), max),
                );
            }
        }
        let out = items
            .iter()
            .enumerate()
            .map(|(i, item)| self.walk(&arr.items, item, &path.index(i)))
            .collect();
        Value::Array(out)
    }

    fn union(&mut self, union: &UnionShape, value: &Value, path: &Path) -> Value {
        let Some(map) = value.as_object() else {
            self.mismatch("object", value, path);
            return value.clone();
        };
        let tag_path = path.child(&union.tag);
        let tag = match map.get(&union.tag) {
            Some(Value::String(tag)) => tag.clone(),
            Some(other) => {
                self.mismatch("string", other, &tag_path);
                return value.clone();
            }
            None => {
                let fallback = match self.mode {
                    Mode::ApplyDefaults => union
                        .default
                        .as_ref()
                        .and_then(|d| d.get(&union.tag))
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    Mode::Strict => None,
                };
                match fallback {
                    Some(tag) => tag,
                    None => {
                        self.issue(
                            IssueCode::MissingField,
                            &tag_path,
                            format!("union tag '{}' is missing", union.tag),
                        );
                        return value.clone();
                    }
                }
            }
        };
        let Some(variant) = union.get(&tag) else {
            let known: Vec<&str> = union.variants.keys().map(String::as_str).collect();
            self.issue(
                IssueCode::UnknownVariant,
                &tag_path,
                format!("'{}' is not one of [{}]", tag, known.join(", ")),
            );
            return value.clone();
        };
        self.object(variant, value, path)
    }

    fn number(&mut self, num: &NumberShape, value: &Value, path: &Path) -> Value {
        let Some(n) = value.as_f64() else {
            self.mismatch("number", value, path);
            return value.clone();
        };
        if !n.is_finite() {
            self.issue(IssueCode::OutOfRange, path, format!("{} is not finite", n));
        } else if num.integer && n.fract() != 0.0 {
            self.issue(IssueCode::NotInteger, path, format!("{} is not an integer", n));
        }
        if let Some(min) = num.minimum {
            if n < min {
                self.issue(IssueCode::OutOfRange, path, format!("{} is below minimum {}", n, min));
            }
        }
        if let Some(max) = num.maximum {
            if n > max {
                self.issue(IssueCode::OutOfRange, path, format!("{} is above maximum {}", n, max));
            }
        }
        value.clone()
    }

    fn string(&mut self, s: &StringShape, value: &Value, path: &Path) -> Value {
        let Some(text) = value.as_str() else {
            self.mismatch("string", value, path);
            return value.clone();
        };
        if let Some(allowed) = &s.allowed {
            if !allowed.iter().any(|a| a == text) {
                self.issue(
                    IssueCode::NotAllowed,
                    path,
                    format!("'{}' is not one of [{}]", text, allowed.join(", ")),
                );
            }
        }
        value.clone()
    }

    fn buffer(&mut self, shape: &BufferShape, value: &Value, path: &Path) -> Value {
        let buf = match value {
            Value::Buffer(buf) => {
                if buf.kind() != shape.kind {
                    self.issue(
                        IssueCode::BufferKind,
                        path,
                        format!("expected {} buffer, got {}", shape.kind, buf.kind()),
                    );
                    return value.clone();
                }
                buf.clone()
            }
            Value::Array(items) => {
                let numbers: Option<Vec<f64>> = items.iter().map(Value::as_f64).collect();
                let Some(numbers) = numbers else {
                    self.mismatch("numeric array", value, path);
                    return value.clone();
                };
                match Buffer::from_numbers(shape.kind, &numbers) {
                    Some(buf) => buf,
                    None => {
                        self.issue(
                            IssueCode::BufferKind,
                            path,
                            format!("elements do not fit {}", shape.kind),
                        );
                        return value.clone();
                    }
                }
            }
            other => {
                self.mismatch("buffer", other, path);
                return value.clone();
            }
        };
        let expected = match shape.length {
            BufferLength::Exact(n) => Some(n),
            BufferLength::MapArea => self.ctx.dimensions.map(|d| d.area()),
            BufferLength::Any => None,
        };
        if let Some(expected) = expected {
            if buf.len() != expected {
                self.issue(
                    IssueCode::BufferLength,
                    path,
                    format!("length {}, expected {}", buf.len(), expected),
                );
            }
        }
        Value::Buffer(buf)
    }
}

impl Shape {
    /// Check that the shape itself is well formed
    ///
    /// Defaults must satisfy their own shape, numeric ranges must be
    /// ordered, and union variants must carry their tag literal.
    ///
    /// # Errors
    ///
    /// Returns every problem found, located by the path inside the shape
    pub fn verify(&self) -> Result<(), Vec<SchemaIssue>> {
        let mut issues = Vec::new();
        verify_at(self, &Path::root(), &mut issues);
        if issues.is_empty() { Ok(()) } else { Err(issues) }
    }
}

fn verify_at(shape: &Shape, path: &Path, issues: &mut Vec<SchemaIssue>) {
    let invalid = |issues: &mut Vec<SchemaIssue>, message: String| {
        issues.push(SchemaIssue::new(IssueCode::InvalidShape, path.clone(), message));
    };
    match shape {
        Shape::Object(obj) => {
            for (name, field) in &obj.fields {
                verify_at(&field.shape, &path.child(name), issues);
            }
        }
        Shape::Array(arr) => {
            verify_at(&arr.items, &path.index(0), issues);
            if let (Some(min), Some(max)) = (arr.min_items, arr.max_items) {
                if min > max {
                    invalid(issues, format!("min items {} exceeds max items {}", min, max));
                }
            }
        }
        Shape::Union(union) => {
            if union.variants.is_empty() {
                invalid(issues, "union has no variants".to_string());
            }
            for (name, variant) in &union.variants {
                let variant_path = path.child(name);
                let tagged = variant
                    .get(&union.tag)
                    .is_some_and(|f| f.shape == Shape::literal(name.as_str()));
                if !tagged {
                    issues.push(SchemaIssue::new(
                        IssueCode::InvalidShape,
                        variant_path.clone(),
                        format!("variant does not carry literal tag '{}'", union.tag),
                    ));
                }
                for (field_name, field) in &variant.fields {
                    verify_at(&field.shape, &variant_path.child(field_name), issues);
                }
            }
        }
        Shape::Number(num) => {
            if let (Some(min), Some(max)) = (num.minimum, num.maximum) {
                if min > max {
                    invalid(issues, format!("minimum {} exceeds maximum {}", min, max));
                }
            }
        }
        Shape::String(s) => {
            if s.allowed.as_ref().is_some_and(Vec::is_empty) {
                invalid(issues, "allowed set is empty".to_string());
            }
        }
        Shape::Literal(_) | Shape::Boolean(_) | Shape::Buffer(_) => {}
    }

    let explicit_default = match shape {
        Shape::Object(_) | Shape::Literal(_) => None,
        other => other.default_value(),
    };
    if let Some(default) = explicit_default {
        let ctx = ValidationContext::default();
        if let Err(found) = resolve(shape, Some(&default), path, &ctx, Mode::Strict) {
            for issue in found {
                invalid(issues, format!("default is invalid: {}", issue));
            }
        }
    }
}
