//! Runtime scalar payloads and stack values.

use serde::Serialize;
use serde_json::Value as JsonValue;

/// Scalar payload carried by expression values and registry entries.
///
/// Booleans are represented as `Number(0.0)` / `Number(1.0)`; there is no
/// distinct boolean variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Numeric payload.
    Number(f64),
    /// Text payload.
    Text(String),
}

/// Category tag assigned to a stack value, orthogonal to its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Produced by number literals, operators, and function calls.
    Number,
    /// Produced by string literals.
    String,
}

/// A value on the evaluation stack: payload plus source provenance.
#[derive(Debug, Clone)]
pub struct Value {
    /// Scalar payload.
    pub payload: Scalar,
    /// Byte offset of the producing token in the source expression.
    pub offset: usize,
    /// Category tag.
    pub kind: ValueKind,
}

impl Value {
    /// Builds a `Number`-categorized value.
    pub fn number(n: f64, offset: usize) -> Self {
        Self {
            payload: Scalar::Number(n),
            offset,
            kind: ValueKind::Number,
        }
    }

    /// Builds a `String`-categorized value.
    pub fn text(s: impl Into<String>, offset: usize) -> Self {
        Self {
            payload: Scalar::Text(s.into()),
            offset,
            kind: ValueKind::String,
        }
    }

    /// Builds a 0/1 number from a boolean result.
    pub fn boolean(b: bool, offset: usize) -> Self {
        Self::number(if b { 1.0 } else { 0.0 }, offset)
    }
}

impl Scalar {
    /// Numeric view of the payload when one exists.
    ///
    /// `Text` parses as a whole trimmed string; partial numeric prefixes do
    /// not count.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            Scalar::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Numeric coercion: non-numeric text coerces to `0.0`.
    pub fn coerce_number(&self) -> f64 {
        self.as_number().unwrap_or(0.0)
    }

    /// True when the payload is a number or fully-numeric text.
    pub fn is_numeric(&self) -> bool {
        self.as_number().is_some()
    }

    /// A value is truthy iff its payload is non-empty and non-zero.
    ///
    /// Numeric text representing zero (`"0"`, `"0.0"`) is falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Scalar::Number(n) => *n != 0.0,
            Scalar::Text(s) => {
                if s.is_empty() {
                    return false;
                }
                match s.trim().parse::<f64>() {
                    Ok(n) => n != 0.0,
                    Err(_) => true,
                }
            }
        }
    }

    /// Display form used for substitution, concatenation, and comparison.
    ///
    /// Integral numbers in `i64` range render without a fractional part.
    pub fn display(&self) -> String {
        match self {
            Scalar::Number(n) => format_number(*n),
            Scalar::Text(s) => s.clone(),
        }
    }

    /// Loose equality: numeric when both sides are numeric, otherwise a
    /// comparison of display forms.
    pub fn loose_eq(&self, other: &Scalar) -> bool {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a == b,
            _ => self.display() == other.display(),
        }
    }

    /// Loose ordering with the same numeric-first rule as [`loose_eq`].
    ///
    /// [`loose_eq`]: Scalar::loose_eq
    pub fn loose_cmp(&self, other: &Scalar) -> std::cmp::Ordering {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal),
            _ => self.display().cmp(&other.display()),
        }
    }
}

/// Formats a number the way it is substituted into templates.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Converts a JSON scalar into a [`Scalar`].
///
/// Objects and arrays are rejected; the registries hold scalars only.
pub fn scalar_from_json(value: &JsonValue) -> Option<Scalar> {
    match value {
        JsonValue::Number(n) => n.as_f64().map(Scalar::Number),
        JsonValue::String(s) => Some(Scalar::Text(s.clone())),
        JsonValue::Bool(b) => Some(Scalar::Number(if *b { 1.0 } else { 0.0 })),
        JsonValue::Null => Some(Scalar::Text(String::new())),
        JsonValue::Array(_) | JsonValue::Object(_) => None,
    }
}

impl From<&Scalar> for JsonValue {
    fn from(scalar: &Scalar) -> Self {
        match scalar {
            Scalar::Number(n) => {
                if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    JsonValue::from(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n)
                        .map(JsonValue::Number)
                        .unwrap_or(JsonValue::Null)
                }
            }
            Scalar::Text(s) => JsonValue::String(s.clone()),
        }
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Scalar::Number(n)
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Scalar::Number(n as f64)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}
