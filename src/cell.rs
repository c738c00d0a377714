use serde::{Serialize, Serializer};
use std::fmt;

/// Largest integer magnitude an `f64` holds without rounding (2^53)
const MAX_EXACT_INTEGER: u64 = 1 << 53;

/// Significant digits shown by a general-format spreadsheet cell
const DISPLAY_DIGITS: usize = 15;

/// A single cell of an ingested row
///
/// Uploaded files carry no schema, so a cell is either empty, a piece of
/// text, a number or a boolean. Everything is forwarded to the spreadsheet
/// as a JSON scalar, with `Empty` written as the empty string.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }

    /// A cell is blank when it holds nothing or only whitespace
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(_) | CellValue::Bool(_) => false,
        }
    }

    /// Converts a JSON scalar into a cell. Nested arrays and objects are kept
    /// as their compact JSON text, and so are integers too large to hold
    /// exactly in an `f64`.
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => CellValue::Empty,
            Value::Bool(b) => CellValue::Bool(*b),
            Value::Number(n) => {
                let magnitude = n.as_i64().map(i64::unsigned_abs).or_else(|| n.as_u64());
                match (magnitude, n.as_f64()) {
                    (Some(m), _) if m > MAX_EXACT_INTEGER => CellValue::Text(n.to_string()),
                    (_, Some(f)) => CellValue::Number(f),
                    (_, None) => CellValue::Text(n.to_string()),
                }
            }
            Value::String(s) => CellValue::Text(s.clone()),
            other => CellValue::Text(other.to_string()),
        }
    }

    /// The cell as a JSON scalar; `Empty` and non-finite numbers become `null`
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            CellValue::Empty => Value::Null,
            CellValue::Text(s) => Value::String(s.clone()),
            CellValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            CellValue::Bool(b) => Value::Bool(*b),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Number(n) => f.write_str(&format_number(*n)),
            CellValue::Bool(true) => f.write_str("TRUE"),
            CellValue::Bool(false) => f.write_str("FALSE"),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Empty => serializer.serialize_str(""),
            CellValue::Text(s) => serializer.serialize_str(s),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => {
                serializer.serialize_i64(*n as i64)
            }
            CellValue::Number(n) => serializer.serialize_f64(*n),
            CellValue::Bool(b) => serializer.serialize_bool(*b),
        }
    }
}

/// Formats a number the way a spreadsheet displays it in a general cell:
/// rounded to 15 significant digits, and integral values lose the
/// trailing `.0`.
pub fn format_number(n: f64) -> String {
    if !n.is_finite() {
        return format!("{}", n);
    }
    let n = format!("{:.*e}", DISPLAY_DIGITS - 1, n)
        .parse::<f64>()
        .unwrap_or(n);
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
