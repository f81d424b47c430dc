//! Validators compiled from an operation and their execution against untrusted values.
//!
//! A [`Validator`] is built once per operation and never mutated afterwards. Applying it is a pure
//! structural walk: every failing leaf contributes an [`Issue`], and successful leaves contribute
//! their coerced value to the output.

mod coercion;

use std::fmt;

use indexmap::IndexMap;
use indexmap::IndexSet;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

pub use self::coercion::ScalarCoercion;
pub use self::coercion::StringFormat;
use crate::error::ValidationFailure;

/// The discriminator of polymorphic values.
pub const TYPENAME: &str = "__typename";

/// A compiled validator node.
#[derive(Debug, Clone, PartialEq)]
pub enum Validator {
    /// Leaf converted with a coercion rule.
    Scalar(ScalarCoercion),
    /// Leaf that must equal one of the member names.
    EnumMember(IndexSet<String>),
    Object(ObjectShape),
    Discriminated(DiscriminatedShape),
    List(Box<Validator>),
    /// Accepts `null` or an absent value without looking at the inner validator.
    Nullable(Box<Validator>),
}

/// An object whose listed fields must all validate. Unlisted fields are dropped from the output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectShape {
    fields: IndexMap<String, Validator>,
}

/// Object shapes selected by the value of their `__typename` field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscriminatedShape {
    variants: IndexMap<String, ObjectShape>,
}

/// A step in the path to an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PathElement {
    Key(String),
    Index(usize),
}

/// A single validation diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub path: Vec<PathElement>,
    pub message: String,
}

impl Validator {
    pub fn scalar(rule: ScalarCoercion) -> Self {
        Validator::Scalar(rule)
    }

    pub fn enum_member<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Validator::EnumMember(members.into_iter().map(Into::into).collect())
    }

    pub fn list(element: Validator) -> Self {
        Validator::List(Box::new(element))
    }

    pub fn nullable(self) -> Self {
        Validator::Nullable(Box::new(self))
    }

    /// Apply the validator to a value.
    ///
    /// On success the returned value is the coerced one, which may differ from the input.
    pub fn validate(&self, value: &Value) -> Result<Value, ValidationFailure> {
        let mut path = Vec::new();
        let mut issues = Vec::new();
        let data = self.apply(Some(value), &mut path, &mut issues);
        if issues.is_empty() {
            Ok(data.unwrap_or(Value::Null))
        } else {
            Err(ValidationFailure { issues })
        }
    }

    fn apply(
        &self,
        value: Option<&Value>,
        path: &mut Vec<PathElement>,
        issues: &mut Vec<Issue>,
    ) -> Option<Value> {
        match self {
            Validator::Nullable(inner) => match value {
                None => None,
                Some(Value::Null) => Some(Value::Null),
                Some(value) => inner.apply(Some(value), path, issues),
            },
            Validator::Scalar(rule) => match rule.coerce(value) {
                Ok(coerced) => Some(coerced),
                Err(message) => {
                    report(path, issues, message);
                    None
                }
            },
            Validator::EnumMember(members) => match value {
                Some(Value::String(name)) if members.contains(name) => Some(Value::String(name.clone())),
                Some(Value::String(name)) => {
                    report(
                        path,
                        issues,
                        format!(
                            "Invalid enum value. Expected {}, received '{name}'",
                            expected(members.iter())
                        ),
                    );
                    None
                }
                Some(other) => {
                    report(
                        path,
                        issues,
                        format!("Expected {}, received {}", expected(members.iter()), received(other)),
                    );
                    None
                }
                None => {
                    report(path, issues, "Required".to_string());
                    None
                }
            },
            Validator::List(element) => match value {
                Some(Value::Array(items)) => {
                    let mut output = Vec::with_capacity(items.len());
                    for (index, item) in items.iter().enumerate() {
                        path.push(PathElement::Index(index));
                        output.push(element.apply(Some(item), path, issues).unwrap_or(Value::Null));
                        path.pop();
                    }
                    Some(Value::Array(output))
                }
                other => {
                    report_type_mismatch(path, issues, "array", other);
                    None
                }
            },
            Validator::Object(shape) => match value {
                Some(Value::Object(object)) => Some(Value::Object(shape.apply(object, path, issues))),
                other => {
                    report_type_mismatch(path, issues, "object", other);
                    None
                }
            },
            Validator::Discriminated(shape) => match value {
                Some(Value::Object(object)) => shape
                    .apply(object, path, issues)
                    .map(Value::Object),
                other => {
                    report_type_mismatch(path, issues, "object", other);
                    None
                }
            },
        }
    }
}

impl ObjectShape {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field. A field already present under the same key is replaced in place.
    pub fn insert(&mut self, key: impl Into<String>, validator: Validator) {
        self.fields.insert(key.into(), validator);
    }

    /// Merge another shape into this one, fields of `other` winning on key collisions.
    pub fn merge(&mut self, other: ObjectShape) {
        self.fields.extend(other.fields);
    }

    pub fn get(&self, key: &str) -> Option<&Validator> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Validator)> {
        self.fields.iter().map(|(key, validator)| (key.as_str(), validator))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether the discriminator of this shape is forced rather than checked.
    fn coerces_typename(&self) -> bool {
        matches!(
            self.fields.get(TYPENAME),
            Some(Validator::Scalar(ScalarCoercion::Typename(_)))
        )
    }

    fn apply(
        &self,
        object: &Map<String, Value>,
        path: &mut Vec<PathElement>,
        issues: &mut Vec<Issue>,
    ) -> Map<String, Value> {
        let mut output = Map::with_capacity(self.fields.len());
        for (key, validator) in &self.fields {
            path.push(PathElement::Key(key.clone()));
            if let Some(value) = validator.apply(object.get(key), path, issues) {
                output.insert(key.clone(), value);
            }
            path.pop();
        }
        output
    }
}

impl From<ObjectShape> for Validator {
    fn from(shape: ObjectShape) -> Self {
        Validator::Object(shape)
    }
}

impl DiscriminatedShape {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variant. Shapes registered twice for the same type name are merged.
    pub fn insert(&mut self, typename: impl Into<String>, shape: ObjectShape) {
        match self.variants.entry(typename.into()) {
            indexmap::map::Entry::Occupied(mut existing) => existing.get_mut().merge(shape),
            indexmap::map::Entry::Vacant(vacant) => {
                vacant.insert(shape);
            }
        }
    }

    pub fn get(&self, typename: &str) -> Option<&ObjectShape> {
        self.variants.get(typename)
    }

    pub fn variants(&self) -> impl Iterator<Item = (&str, &ObjectShape)> {
        self.variants.iter().map(|(name, shape)| (name.as_str(), shape))
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    fn apply(
        &self,
        object: &Map<String, Value>,
        path: &mut Vec<PathElement>,
        issues: &mut Vec<Issue>,
    ) -> Option<Map<String, Value>> {
        let variant = match object.get(TYPENAME) {
            Some(Value::String(typename)) => self.variants.get(typename),
            // Without a supplied discriminator, a variant whose typename is statically known stands in.
            None => self.variants.values().find(|shape| shape.coerces_typename()),
            Some(_) => None,
        };
        match variant {
            Some(shape) => Some(shape.apply(object, path, issues)),
            None => {
                path.push(PathElement::Key(TYPENAME.to_string()));
                report(
                    path,
                    issues,
                    format!(
                        "Invalid discriminator value. Expected {}",
                        expected(self.variants.keys())
                    ),
                );
                path.pop();
                None
            }
        }
    }
}

impl From<DiscriminatedShape> for Validator {
    fn from(shape: DiscriminatedShape) -> Self {
        Validator::Discriminated(shape)
    }
}

impl Issue {
    /// The path joined with dots, list indexes included.
    pub fn dotted_path(&self) -> String {
        self.path
            .iter()
            .map(|element| element.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathElement::Key(key) => f.write_str(key),
            PathElement::Index(index) => write!(f, "{index}"),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.dotted_path(), self.message)
    }
}

fn report(path: &[PathElement], issues: &mut Vec<Issue>, message: String) {
    issues.push(Issue {
        path: path.to_vec(),
        message,
    });
}

fn report_type_mismatch(
    path: &[PathElement],
    issues: &mut Vec<Issue>,
    expected: &str,
    value: Option<&Value>,
) {
    let message = match value {
        Some(value) => format!("Expected {expected}, received {}", received(value)),
        None => "Required".to_string(),
    };
    report(path, issues, message);
}

fn expected<'a>(names: impl Iterator<Item = &'a String>) -> String {
    names
        .map(|name| format!("'{name}'"))
        .collect::<Vec<_>>()
        .join(" | ")
}

/// The JSON type name of a value, as used in issue messages.
pub(crate) fn received(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
