//! Unmarshalling of typed attribute wrappers found in change-stream records.
//!
//! Change-stream images encode every value as a single-key object naming its type,
//! e.g. `{"S": "abc"}` or `{"N": "5"}`. This module turns those into plain JSON.

use serde_json::{Map, Number, Value};

use crate::errors::NormalizeError;

/// Unmarshal a full image (a map of attribute name to typed wrapper).
///
/// # Example
///
/// ```
/// use change_sync::normalizer::unmarshal_image;
/// use serde_json::json;
///
/// let image = json!({"id": {"S": "1"}, "count": {"N": "5"}});
/// assert_eq!(unmarshal_image(&image).unwrap(), json!({"id": "1", "count": 5}));
/// ```
pub fn unmarshal_image(image: &Value) -> Result<Value, NormalizeError> {
    let attributes = image
        .as_object()
        .ok_or_else(|| NormalizeError::invalid("Change-stream image is not a map"))?;
    unmarshal_map(attributes).map(Value::Object)
}

/// Unmarshal one typed wrapper into a plain value.
pub fn unmarshal_value(wrapper: &Value) -> Result<Value, NormalizeError> {
    let tagged = wrapper
        .as_object()
        .filter(|m| m.len() == 1)
        .ok_or_else(|| {
            NormalizeError::invalid(format!("Attribute is not a typed wrapper: {}", wrapper))
        })?;

    let Some((tag, inner)) = tagged.iter().next() else {
        return Err(NormalizeError::invalid("Empty typed wrapper"));
    };

    match tag.as_str() {
        "S" | "B" => expect_str(tag, inner).map(|s| Value::String(s.to_string())),
        "N" => expect_str(tag, inner).and_then(parse_number),
        "BOOL" => inner
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| NormalizeError::invalid("BOOL wrapper does not hold a boolean")),
        "NULL" => Ok(Value::Null),
        "M" => inner
            .as_object()
            .ok_or_else(|| NormalizeError::invalid("M wrapper does not hold a map"))
            .and_then(unmarshal_map)
            .map(Value::Object),
        "L" => expect_array(tag, inner)?
            .iter()
            .map(unmarshal_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        "SS" | "BS" => expect_array(tag, inner)?
            .iter()
            .map(|item| expect_str(tag, item).map(|s| Value::String(s.to_string())))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        "NS" => expect_array(tag, inner)?
            .iter()
            .map(|item| expect_str(tag, item).and_then(parse_number))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Err(NormalizeError::invalid(format!(
            "Unknown attribute type tag: {}",
            other
        ))),
    }
}

fn unmarshal_map(attributes: &Map<String, Value>) -> Result<Map<String, Value>, NormalizeError> {
    attributes
        .iter()
        .map(|(name, wrapper)| unmarshal_value(wrapper).map(|v| (name.clone(), v)))
        .collect()
}

fn expect_str<'a>(tag: &str, value: &'a Value) -> Result<&'a str, NormalizeError> {
    value
        .as_str()
        .ok_or_else(|| NormalizeError::invalid(format!("{} wrapper does not hold a string", tag)))
}

fn expect_array<'a>(tag: &str, value: &'a Value) -> Result<&'a Vec<Value>, NormalizeError> {
    value
        .as_array()
        .ok_or_else(|| NormalizeError::invalid(format!("{} wrapper does not hold a list", tag)))
}

/// Numeric strings become integers when they fit, floats otherwise.
fn parse_number(raw: &str) -> Result<Value, NormalizeError> {
    let trimmed = raw.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Ok(Value::Number(i.into()));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| NormalizeError::invalid(format!("Invalid numeric string: {}", raw)))
}
