use serde_json::{Map, Value};

/// A row read back from the spreadsheet: column name to cell value, in
/// column order
pub type SourceRow = Map<String, Value>;

/// Folds a column name for comparison: lowercase, with `_`, `-` and
/// whitespace treated as the same (absent) separator
pub fn fold_key(key: &str) -> String {
    key.chars()
        .filter(|c| !(*c == '_' || *c == '-' || c.is_whitespace()))
        .flat_map(char::to_lowercase)
        .collect()
}

/// True for values that count as missing: null or an empty string
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Resolve a canonical field from a row using an ordered alias list
///
/// Aliases are tried in order; for each alias every column of the row whose
/// folded name matches is checked in column order. The first present,
/// non-empty value wins and later aliases are never consulted. When nothing
/// matches the result is an empty string.
///
/// # Arguments
/// * `row` - The row to look in
/// * `aliases` - Acceptable spellings of the field, highest priority first
///
/// # Returns
/// * `Value` - The matched value, or `""`
///
/// # Examples
/// ```
/// use faultsheet::fields::{SourceRow, resolve_field};
/// use serde_json::json;
///
/// let mut row = SourceRow::new();
/// row.insert("Temp_C".to_string(), json!("5"));
/// assert_eq!(resolve_field(&row, &["temperature", "temp_c"]), json!("5"));
/// ```
pub fn resolve_field(row: &SourceRow, aliases: &[&str]) -> Value {
    for alias in aliases {
        let wanted = fold_key(alias);
        let hit = row
            .iter()
            .filter(|(key, _)| fold_key(key) == wanted)
            .map(|(_, value)| value)
            .find(|value| !is_empty_value(value));
        if let Some(value) = hit {
            return value.clone();
        }
    }
    Value::String(String::new())
}

/// [`resolve_field`] rendered as text: strings as-is, numbers and booleans
/// in their JSON spelling
pub fn resolve_text(row: &SourceRow, aliases: &[&str]) -> String {
    value_text(&resolve_field(row, aliases))
}

pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
