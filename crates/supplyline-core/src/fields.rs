//! Typed extraction of payload fields with length and range checks.
//!
//! Optional fields degrade to `None` (with a warning) when they cannot be converted or fall
//! outside their bounds. Mandatory fields return [`MalformedRow`] instead, which drops the row.

use serde_json::Value;
use tracing::warn;

use crate::error::MalformedRow;

/// Look up `name` in a JSON object, treating `null` as absent.
pub(crate) fn get<'a>(row: &'a Value, name: &str) -> Option<&'a Value> {
    row.get(name).filter(|value| !value.is_null())
}

/// Scalar rendered as text; `Err` for arrays and objects.
fn scalar_text(value: &Value) -> Result<String, &'static str> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        Value::Null => Ok(String::new()),
        Value::Array(_) | Value::Object(_) => Err("is not a scalar"),
    }
}

pub(crate) fn text(value: Option<&Value>, field: &'static str, max_len: usize) -> Option<String> {
    let value = value?;
    let text = match scalar_text(value) {
        Ok(text) => text,
        Err(reason) => {
            warn!(field, reason, "dropping field value");
            return None;
        }
    };
    if text.is_empty() {
        return None;
    }
    let len = text.chars().count();
    if len > max_len {
        warn!(field, len, max_len, "dropping field value longer than allowed");
        return None;
    }
    Some(text)
}

pub(crate) fn required_text(
    value: Option<&Value>,
    field: &'static str,
    max_len: usize,
) -> Result<String, MalformedRow> {
    let value = value.ok_or_else(|| MalformedRow::missing(field))?;
    let text = scalar_text(value).map_err(|reason| MalformedRow::new(field, reason))?;
    if text.is_empty() {
        return Err(MalformedRow::new(field, "is empty"));
    }
    let len = text.chars().count();
    if len > max_len {
        return Err(MalformedRow::new(
            field,
            format!("has {len} characters, more than the allowed {max_len}"),
        ));
    }
    Ok(text)
}

pub(crate) fn number(value: Option<&Value>, field: &'static str, min: f64, max: f64) -> Option<f64> {
    let parsed = match value? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) if text.trim().is_empty() => return None,
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    let Some(number) = parsed.filter(|number| number.is_finite()) else {
        warn!(field, value = ?value, "dropping non-numeric field value");
        return None;
    };
    if number < min || number > max {
        warn!(field, number, min, max, "dropping out-of-range field value");
        return None;
    }
    Some(number)
}

pub(crate) fn integer(value: Option<&Value>, field: &'static str, min: i64, max: i64) -> Option<i64> {
    let parsed = match value? {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|float| float.fract() == 0.0 && float.abs() < 9.0e15)
                .map(|float| float as i64)
        }),
        Value::String(text) if text.trim().is_empty() => return None,
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    };
    let Some(number) = parsed else {
        warn!(field, value = ?value, "dropping non-integer field value");
        return None;
    };
    if number < min || number > max {
        warn!(field, number, min, max, "dropping out-of-range field value");
        return None;
    }
    Some(number)
}

/// `"Yes"` / `"No"` flags; anything else is unknown.
pub(crate) fn yes_no(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::String(flag) if flag == "Yes" => Some(true),
        Value::String(flag) if flag == "No" => Some(false),
        Value::Bool(flag) => Some(*flag),
        _ => None,
    }
}

/// Keep printable ASCII and ASCII whitespace only.
pub(crate) fn strip_unprintable(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_graphic() || c.is_ascii_whitespace() || *c == '\x0b')
        .collect()
}

/// Text for composite values such as `box: l x w x h - weight`; absent renders as empty.
pub(crate) fn display(value: Option<&Value>) -> String {
    value
        .and_then(|value| scalar_text(value).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn optional_text_drops_empty_and_oversized_values() {
        let row = json!({ "upc": "", "name": "abcdef", "id": 10030 });

        assert_eq!(text(get(&row, "upc"), "upc", 10), None);
        assert_eq!(text(get(&row, "name"), "name", 5), None);
        assert_eq!(text(get(&row, "name"), "name", 6).as_deref(), Some("abcdef"));
        assert_eq!(text(get(&row, "id"), "id", 20).as_deref(), Some("10030"));
        assert_eq!(text(get(&row, "missing"), "missing", 20), None);
    }

    #[test]
    fn required_text_reports_the_failing_field() {
        let row = json!({ "ItemNumber": null, "Long": "x".repeat(300) });

        assert_eq!(
            required_text(get(&row, "ItemNumber"), "ItemNumber", 266),
            Err(MalformedRow::missing("ItemNumber"))
        );
        let error = required_text(get(&row, "Long"), "Long", 266).expect_err("too long");
        assert_eq!(error.field, "Long");
    }

    #[test]
    fn numbers_accept_numeric_strings_and_enforce_ranges() {
        let row = json!({ "price": "12.50", "negative": -1, "huge": 1e12, "word": "n/a" });

        assert_eq!(number(get(&row, "price"), "price", 0.0, 999_999.99), Some(12.5));
        assert_eq!(number(get(&row, "negative"), "negative", 0.0, 10.0), None);
        assert_eq!(number(get(&row, "huge"), "huge", 0.0, 999_999.99), None);
        assert_eq!(number(get(&row, "word"), "word", 0.0, 10.0), None);
    }

    #[test]
    fn integers_accept_whole_floats_only() {
        let row = json!({ "qty": 7.0, "fraction": 7.5, "text": "42", "over": 16_777_216 });

        assert_eq!(integer(get(&row, "qty"), "qty", 0, 16_777_215), Some(7));
        assert_eq!(integer(get(&row, "fraction"), "fraction", 0, 100), None);
        assert_eq!(integer(get(&row, "text"), "text", 0, 100), Some(42));
        assert_eq!(integer(get(&row, "over"), "over", 0, 16_777_215), None);
    }

    #[test]
    fn yes_no_flags() {
        let row = json!({ "Kit": "Yes", "Oversize": "No", "Other": "Maybe" });

        assert_eq!(yes_no(get(&row, "Kit")), Some(true));
        assert_eq!(yes_no(get(&row, "Oversize")), Some(false));
        assert_eq!(yes_no(get(&row, "Other")), None);
    }

    #[test]
    fn unprintable_characters_are_removed() {
        assert_eq!(strip_unprintable("DBA\u{0}4583\u{200b}XS"), "DBA4583XS");
        assert_eq!(strip_unprintable("AB 12"), "AB 12");
    }
}
