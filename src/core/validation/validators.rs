//! Reusable field rules
//!
//! Rules are attached to attributes with [`crate::core::model::Field::rule`]
//! and run during structural validation. Values of an unexpected JSON type
//! pass, so rules compose with the field's own deserialization checks.

use regex::Regex;
use serde_json::Value;

/// Rule: number must be positive
pub fn positive() -> impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + Clone {
    |field: &str, value: &Value| match value.as_f64() {
        Some(num) if num <= 0.0 => Err(format!(
            "'{}' must be positive (value: {})",
            field, num
        )),
        _ => Ok(()),
    }
}

/// Rule: string length (in characters) must be within range
pub fn string_length(
    min: usize,
    max: usize,
) -> impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + Clone {
    move |field: &str, value: &Value| {
        let Some(s) = value.as_str() else {
            return Ok(());
        };
        let len = s.chars().count();
        if len < min {
            Err(format!(
                "'{}' must have at least {} characters (currently: {})",
                field, min, len
            ))
        } else if len > max {
            Err(format!(
                "'{}' must not exceed {} characters (currently: {})",
                field, max, len
            ))
        } else {
            Ok(())
        }
    }
}

/// Rule: number must not exceed maximum
pub fn max_value(max: f64) -> impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + Clone {
    move |field: &str, value: &Value| match value.as_f64() {
        Some(num) if num > max => Err(format!(
            "'{}' must not exceed {} (value: {})",
            field, max, num
        )),
        _ => Ok(()),
    }
}

/// Rule: value must be in allowed list
pub fn in_list(
    allowed: Vec<String>,
) -> impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + Clone {
    move |field: &str, value: &Value| match value.as_str() {
        Some(s) if !allowed.iter().any(|a| a == s) => Err(format!(
            "'{}' must be one of {:?} (value: {})",
            field, allowed, s
        )),
        _ => Ok(()),
    }
}

/// Rule: string must match a regular expression
pub fn pattern(
    expr: &str,
) -> Result<impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + Clone, regex::Error> {
    let regex = Regex::new(expr)?;
    Ok(move |field: &str, value: &Value| match value.as_str() {
        Some(s) if !regex.is_match(s) => Err(format!(
            "'{}' does not match the pattern {} (value: {})",
            field,
            regex.as_str(),
            s
        )),
        _ => Ok(()),
    })
}
