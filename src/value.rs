use crate::Level;
use chrono::{DateTime, Local, SecondsFormat, Utc};
use std::fmt::{self, Write};

/// Insertion-ordered map of message fields.
///
/// Re-assigning an existing key keeps its original position.
pub type Map = indexmap::IndexMap<String, Value>;

/// A dynamically typed field value of a log message.
///
/// The `Display` implementation produces the textual representation that is used when a
/// value is substituted into a template: strings are written as they are, timestamps in
/// ISO-8601 format, levels by their name, and nested lists and maps in an inspect-like
/// notation such as `{ user: 'bob', ids: [ 1, 2 ] }`.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Absence of a value.
    Null,
    /// A boolean.
    Bool(bool),
    /// An integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A string.
    Str(String),
    /// A point in time.
    Time(DateTime<Utc>),
    /// A log level.
    Level(Level),
    /// A list of values.
    List(Vec<Value>),
    /// A map of values.
    Map(Map),
}

impl Value {
    /// True for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the string, if this is a [`Value::Str`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer, if this is a [`Value::Int`] or an integral [`Value::Float`].
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            #[allow(clippy::cast_possible_truncation)]
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            _ => None,
        }
    }

    /// Returns the map, if this is a [`Value::Map`].
    #[must_use]
    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the level, if this is a [`Value::Level`].
    #[must_use]
    pub fn as_level(&self) -> Option<Level> {
        match self {
            Value::Level(l) => Some(*l),
            _ => None,
        }
    }

    // nested values are rendered like the top level, except that strings get quoted
    fn inspect(&self, w: &mut dyn Write, nested: bool) -> fmt::Result {
        match self {
            Value::Null => w.write_str("null"),
            Value::Bool(b) => write!(w, "{b}"),
            Value::Int(i) => write!(w, "{i}"),
            Value::Float(f) => write_float(w, *f),
            Value::Str(s) if nested => write_quoted(w, s),
            Value::Str(s) => w.write_str(s),
            Value::Time(ts) => w.write_str(&iso_timestamp(ts)),
            Value::Level(level) => w.write_str(level.name()),
            Value::List(list) => {
                if list.is_empty() {
                    return w.write_str("[]");
                }
                w.write_str("[ ")?;
                for (i, item) in list.iter().enumerate() {
                    if i > 0 {
                        w.write_str(", ")?;
                    }
                    item.inspect(w, true)?;
                }
                w.write_str(" ]")
            }
            Value::Map(map) => {
                if map.is_empty() {
                    return w.write_str("{}");
                }
                w.write_str("{ ")?;
                for (i, (key, item)) in map.iter().enumerate() {
                    if i > 0 {
                        w.write_str(", ")?;
                    }
                    if is_identifier(key) {
                        w.write_str(key)?;
                    } else {
                        write_quoted(w, key)?;
                    }
                    w.write_str(": ")?;
                    item.inspect(w, true)?;
                }
                w.write_str(" }")
            }
        }
    }
}

/// Formats a timestamp as ISO-8601 in UTC with millisecond precision,
/// e.g. `2024-01-01T09:30:00.000Z`.
#[must_use]
pub fn iso_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn write_float(w: &mut dyn Write, f: f64) -> fmt::Result {
    if f.is_nan() {
        w.write_str("NaN")
    } else if f.is_infinite() {
        w.write_str(if f > 0.0 { "Infinity" } else { "-Infinity" })
    } else {
        write!(w, "{f}")
    }
}

fn write_quoted(w: &mut dyn Write, s: &str) -> fmt::Result {
    w.write_char('\'')?;
    for c in s.chars() {
        match c {
            '\'' => w.write_str("\\'")?,
            '\\' => w.write_str("\\\\")?,
            '\n' => w.write_str("\\n")?,
            c => w.write_char(c)?,
        }
    }
    w.write_char('\'')
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.inspect(f, false)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}
impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}
impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}
impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}
impl From<u64> for Value {
    #[allow(clippy::cast_precision_loss)]
    fn from(i: u64) -> Self {
        i64::try_from(i).map_or(Value::Float(i as f64), Value::Int)
    }
}
impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}
impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Value::Time(ts)
    }
}
impl From<DateTime<Local>> for Value {
    fn from(ts: DateTime<Local>) -> Self {
        Value::Time(ts.with_timezone(&Utc))
    }
}
impl From<Level> for Value {
    fn from(level: Level) -> Self {
        Value::Level(level)
    }
}
impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Map(map)
    }
}
impl<V: Into<Value>> From<Vec<V>> for Value {
    fn from(list: Vec<V>) -> Self {
        Value::List(list.into_iter().map(Into::into).collect())
    }
}
impl<V: Into<Value>> From<Option<V>> for Value {
    fn from(o: Option<V>) -> Self {
        o.map_or(Value::Null, Into::into)
    }
}
impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Map(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Value::Int)
                .or_else(|| n.as_f64().map(Value::Float))
                .unwrap_or(Value::Null),
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(list) => {
                Value::List(list.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Map, Value};
    use crate::Level;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn top_level_strings_are_not_quoted() {
        assert_eq!(Value::from("plain text").to_string(), "plain text");
    }

    #[test]
    fn nested_values_use_inspect_notation() {
        let value = Value::from(json!({
            "user": "bob",
            "ids": [1, 2.5],
            "on": true,
            "none": null,
            "odd-key": "it's",
            "empty": {}
        }));
        assert_eq!(
            value.to_string(),
            "{ user: 'bob', ids: [ 1, 2.5 ], on: true, none: null, 'odd-key': 'it\\'s', empty: {} }"
        );
    }

    #[test]
    fn special_values() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 9, 30, 0).unwrap();
        assert_eq!(Value::from(ts).to_string(), "2024-01-01T09:30:00.000Z");
        assert_eq!(Value::from(Level::CRIT).to_string(), "crit");
        assert_eq!(Value::Float(f64::INFINITY).to_string(), "Infinity");
        assert_eq!(Value::from(Vec::<i32>::new()).to_string(), "[]");
    }

    #[test]
    fn map_keeps_insertion_order() {
        let mut map = Map::new();
        map.insert("b".into(), 1.into());
        map.insert("a".into(), 2.into());
        map.insert("b".into(), 3.into());
        let keys: Vec<&String> = map.keys().collect();
        assert_eq!(keys, ["b", "a"]);
        assert_eq!(map["b"], Value::Int(3));
    }
}
