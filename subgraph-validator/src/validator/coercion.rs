//! Scalar coercion rules.
//!
//! Coercions accept any scalar-compatible JSON value and convert it to the representation of the
//! declared scalar, which means the validated payload may differ from the generated one.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Number;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::received;

#[allow(clippy::expect_used)]
static LOCAL_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([01]\d|2[0-3]):[0-5]\d:[0-5]\d(\.\d+)?$").expect("valid regex")
});

/// Syntax checked on top of the string coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringFormat {
    Any,
    DateTime,
    LocalTime,
    Url,
}

/// A named conversion applied to scalar leaves.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScalarCoercion {
    String(StringFormat),
    Number,
    Boolean,
    /// Forces the value to a statically known `__typename`, whatever was supplied.
    Typename(String),
}

impl ScalarCoercion {
    /// Resolve a scalar type name to its coercion rule.
    ///
    /// Unknown custom scalars validate as permissive strings.
    pub(crate) fn for_scalar(name: &str) -> Self {
        match name {
            "String" | "ID" => ScalarCoercion::String(StringFormat::Any),
            "Int" | "Float" => ScalarCoercion::Number,
            "Boolean" => ScalarCoercion::Boolean,
            "DateTime" => ScalarCoercion::String(StringFormat::DateTime),
            "LocalTime" => ScalarCoercion::String(StringFormat::LocalTime),
            "Url" => ScalarCoercion::String(StringFormat::Url),
            _ => ScalarCoercion::String(StringFormat::Any),
        }
    }

    /// Coerce a possibly absent value, returning the converted value or an issue message.
    pub(crate) fn coerce(&self, value: Option<&Value>) -> Result<Value, String> {
        let required = || "Required".to_string();
        match self {
            ScalarCoercion::Typename(name) => Ok(Value::String(name.clone())),
            ScalarCoercion::String(format) => {
                let coerced = coerce_string(value.ok_or_else(required)?)?;
                format.check(&coerced)?;
                Ok(Value::String(coerced))
            }
            ScalarCoercion::Number => coerce_number(value.ok_or_else(required)?).map(Value::Number),
            ScalarCoercion::Boolean => coerce_boolean(value.ok_or_else(required)?).map(Value::Bool),
        }
    }
}

impl StringFormat {
    fn check(&self, value: &str) -> Result<(), String> {
        let valid = match self {
            StringFormat::Any => true,
            // UTC only: offsets such as `+02:00` are rejected.
            StringFormat::DateTime => {
                value.ends_with('Z') && OffsetDateTime::parse(value, &Rfc3339).is_ok()
            }
            StringFormat::LocalTime => LOCAL_TIME.is_match(value),
            StringFormat::Url => url::Url::parse(value).is_ok(),
        };
        if valid {
            Ok(())
        } else {
            Err(match self {
                StringFormat::Any => "Invalid string",
                StringFormat::DateTime => "Invalid datetime",
                StringFormat::LocalTime => "Invalid time",
                StringFormat::Url => "Invalid url",
            }
            .to_string())
        }
    }
}

// `null` stringifies to "null": generators frequently emit null for required strings and the
// mock still needs a value there.
fn coerce_string(value: &Value) -> Result<String, String> {
    match value {
        Value::Null => Ok("null".to_string()),
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Array(_) | Value::Object(_) => {
            Err(format!("Expected string, received {}", received(value)))
        }
    }
}

fn coerce_number(value: &Value) -> Result<Number, String> {
    match value {
        Value::Null => Ok(Number::from(0)),
        Value::Number(n) => Ok(n.clone()),
        Value::Bool(b) => Ok(Number::from(u8::from(*b))),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(Number::from(0));
            }
            if let Ok(int) = s.parse::<i64>() {
                return Ok(Number::from(int));
            }
            s.parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .ok_or_else(|| "Expected number, received nan".to_string())
        }
        Value::Array(_) | Value::Object(_) => {
            Err(format!("Expected number, received {}", received(value)))
        }
    }
}

fn coerce_boolean(value: &Value) -> Result<bool, String> {
    match value {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|n| n != 0.0)),
        Value::String(s) => Ok(!is_falsy_spelling(s.trim())),
        Value::Array(_) | Value::Object(_) => {
            Err(format!("Expected boolean, received {}", received(value)))
        }
    }
}

fn is_falsy_spelling(s: &str) -> bool {
    s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false")
}
