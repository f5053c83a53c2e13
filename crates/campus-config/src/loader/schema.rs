//! Schema validation for campus JSON5 configuration layers.

use crate::ConfigError;
use campus_protocol::SliceName;
use serde_json::{Map, Value};

/// Validate a single config layer (or the merged document) against the schema.
pub(super) fn validate_layer_schema(value: &Value, layer: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, "")?;
    ensure_allowed_keys(
        map,
        &["$schema", "engine", "cascades", "persistence"],
        layer,
        "",
    )?;

    if let Some(value) = map.get("$schema") {
        expect_string(value, layer, "$schema")?;
    }
    if let Some(value) = map.get("engine") {
        validate_engine(value, layer, "engine")?;
    }
    if let Some(value) = map.get("cascades") {
        validate_cascades(value, layer, "cascades")?;
    }
    if let Some(value) = map.get("persistence") {
        validate_persistence(value, layer, "persistence")?;
    }
    Ok(())
}

/// Validate the "engine" block.
fn validate_engine(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &["activity_log_capacity", "handler_failures"],
        layer,
        path,
    )?;

    if let Some(value) = map.get("activity_log_capacity") {
        expect_u64(value, layer, &join_path(path, "activity_log_capacity"))?;
    }
    if let Some(value) = map.get("handler_failures") {
        let field = join_path(path, "handler_failures");
        let Some(policy) = value.as_str() else {
            return Err(invalid_field(layer, &field, "expected string"));
        };
        if !matches!(policy, "isolate" | "halt") {
            return Err(invalid_field(layer, &field, "invalid failure policy"));
        }
    }
    Ok(())
}

/// Validate the "cascades" block.
fn validate_cascades(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["placeholder", "attendance"], layer, path)?;

    if let Some(value) = map.get("placeholder") {
        let path = join_path(path, "placeholder");
        let placeholder = expect_object(value, layer, &path)?;
        ensure_allowed_keys(
            placeholder,
            &["start_offset_hours", "duration_hours"],
            layer,
            &path,
        )?;
        for key in ["start_offset_hours", "duration_hours"] {
            if let Some(value) = placeholder.get(key) {
                expect_i64(value, layer, &join_path(&path, key))?;
            }
        }
    }
    if let Some(value) = map.get("attendance") {
        let path = join_path(path, "attendance");
        let attendance = expect_object(value, layer, &path)?;
        ensure_allowed_keys(attendance, &["present", "late", "absent"], layer, &path)?;
        for key in ["present", "late", "absent"] {
            if let Some(value) = attendance.get(key) {
                expect_f64(value, layer, &join_path(&path, key))?;
            }
        }
    }
    Ok(())
}

/// Validate the "persistence" block.
fn validate_persistence(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["enabled", "path", "slices"], layer, path)?;

    if let Some(value) = map.get("enabled") {
        expect_bool(value, layer, &join_path(path, "enabled"))?;
    }
    if let Some(value) = map.get("path") {
        expect_string(value, layer, &join_path(path, "path"))?;
    }
    if let Some(value) = map.get("slices") {
        let slices_path = join_path(path, "slices");
        let arr = expect_array(value, layer, &slices_path)?;
        for (idx, entry) in arr.iter().enumerate() {
            let entry_path = format!("{slices_path}[{idx}]");
            let Some(name) = entry.as_str() else {
                return Err(invalid_field(layer, &entry_path, "expected string"));
            };
            if SliceName::parse(name).is_none() {
                return Err(invalid_field(layer, &entry_path, "unknown state slice"));
            }
        }
    }
    Ok(())
}

/// Expect a JSON object or return a typed error.
fn expect_object<'a>(
    value: &'a Value,
    layer: &str,
    path: &str,
) -> Result<&'a Map<String, Value>, ConfigError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(invalid_field(layer, path, "expected object")),
    }
}

/// Expect a JSON array or return a typed error.
fn expect_array<'a>(
    value: &'a Value,
    layer: &str,
    path: &str,
) -> Result<&'a Vec<Value>, ConfigError> {
    match value {
        Value::Array(arr) => Ok(arr),
        _ => Err(invalid_field(layer, path, "expected array")),
    }
}

fn expect_string(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_string() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected string"))
    }
}

fn expect_bool(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_boolean() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected bool"))
    }
}

fn expect_u64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_u64() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected non-negative integer"))
    }
}

fn expect_i64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_i64() || value.is_u64() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected integer"))
    }
}

fn expect_f64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_number() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected number"))
    }
}

/// Ensure an object contains only allowed keys.
fn ensure_allowed_keys(
    map: &Map<String, Value>,
    allowed: &[&str],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    match map.keys().find(|key| !allowed.contains(&key.as_str())) {
        Some(key) => Err(invalid_field(layer, &join_path(path, key), "unknown key")),
        None => Ok(()),
    }
}

/// Join nested paths for error messages.
fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Build a structured invalid-field error.
fn invalid_field(layer: &str, path: &str, message: &str) -> ConfigError {
    let path = if path.is_empty() { "root" } else { path };
    ConfigError::InvalidField {
        path: format!("{layer}:{path}"),
        message: message.to_string(),
    }
}
