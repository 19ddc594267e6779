use crate::{value::iso_timestamp, Map, SyslaneError, Value};
use chrono::Utc;
use std::fmt::Write;

/// Handler for `%pri%`: `facility * 8 + level.code`.
///
/// `facility` defaults to 1 (user-level messages), a missing level code to 1.
///
/// # Errors
///
/// None; the signature is the one of a [`Handler`](super::Handler).
#[allow(clippy::unnecessary_wraps)]
pub fn pri(fields: &Map) -> Result<Option<Value>, SyslaneError> {
    let facility = fields
        .get("facility")
        .and_then(Value::as_i64)
        .unwrap_or(1);
    let code = match fields.get("level") {
        Some(Value::Level(level)) => i64::from(level.code()),
        Some(other) => other.as_i64().unwrap_or(1),
        None => 1,
    };
    Ok(Some(Value::Int(facility * 8 + code)))
}

/// Handler for `%timestamp%`: the message's timestamp in ISO-8601 format, or now.
///
/// Strings are passed through unchanged.
///
/// # Errors
///
/// None; the signature is the one of a [`Handler`](super::Handler).
#[allow(clippy::unnecessary_wraps)]
pub fn timestamp(fields: &Map) -> Result<Option<Value>, SyslaneError> {
    Ok(Some(match fields.get("timestamp") {
        Some(Value::Time(ts)) => Value::Str(iso_timestamp(ts)),
        Some(Value::Null) | None => Value::Str(iso_timestamp(&Utc::now())),
        Some(other) => other.clone(),
    }))
}

/// Handler for `%sd%`: serializes the message's structured data.
///
/// A single entry is a map with a mandatory `id`, its other non-null fields become
/// `key="value"` pairs: `{id: "meta", a: "x", b: null}` gives `[meta a="x"]`.
/// A list of entries yields their concatenation, without separator.
/// The characters `"`, `[` and `]` are escaped with a backslash in values.
///
/// # Errors
///
/// [`SyslaneError::StructuredDataType`] if an entry is not a map,
/// [`SyslaneError::StructuredDataId`] if an entry has no `id`.
pub fn sd(fields: &Map) -> Result<Option<Value>, SyslaneError> {
    match fields.get("sd") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::List(entries)) => {
            let mut out = String::new();
            for entry in entries {
                serialize_entry(entry, &mut out)?;
            }
            Ok(Some(Value::Str(out)))
        }
        Some(entry) => {
            let mut out = String::new();
            serialize_entry(entry, &mut out)?;
            Ok(Some(Value::Str(out)))
        }
    }
}

fn serialize_entry(entry: &Value, out: &mut String) -> Result<(), SyslaneError> {
    let map = entry.as_map().ok_or(SyslaneError::StructuredDataType)?;
    let id = map
        .get("id")
        .filter(|id| !id.is_null())
        .ok_or(SyslaneError::StructuredDataId)?;

    out.push('[');
    write!(out, "{id}").ok();
    for (key, value) in map.iter().filter(|(k, v)| *k != "id" && !v.is_null()) {
        write!(out, " {key}=\"").ok();
        escape_into(&value.to_string(), out);
        out.push('"');
    }
    out.push(']');
    Ok(())
}

fn escape_into(s: &str, out: &mut String) {
    for c in s.chars() {
        if matches!(c, '"' | '[' | ']') {
            out.push('\\');
        }
        out.push(c);
    }
}
