use crate::{Formatter, Level, Map, SyslaneError, Value};
use std::sync::Arc;

/// A single log event.
///
/// A message is created by [`Logger::log`](crate::Logger::log) for every call, by merging
/// the logger's context, a default `timestamp`, the caller's payload, and finally the
/// `level`; later sources win on key collision, but the `level` is always the one the
/// message was created with.
///
/// The message keeps a reference to the formatter that is used to serialize it.
#[derive(Clone)]
pub struct Message {
    fields: Map,
    level: Level,
    formatter: Arc<Formatter>,
}

impl Message {
    /// Merges the given chunks, in order, and sets the `level` field.
    pub fn new<'a, I>(formatter: Arc<Formatter>, chunks: I, level: Level) -> Self
    where
        I: IntoIterator<Item = &'a Map>,
    {
        let mut fields = Map::new();
        for chunk in chunks {
            for (key, value) in chunk {
                fields.insert(key.clone(), value.clone());
            }
        }
        fields.insert("level".to_string(), Value::Level(level));
        Self {
            fields,
            level,
            formatter,
        }
    }

    /// The level of the message.
    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    /// Returns the value of a field, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// All fields, in merge order.
    #[must_use]
    pub fn fields(&self) -> &Map {
        &self.fields
    }

    /// The formatter this message is serialized with.
    #[must_use]
    pub fn formatter(&self) -> &Arc<Formatter> {
        &self.formatter
    }

    /// Serializes the message with its formatter.
    ///
    /// # Errors
    ///
    /// Errors of the formatter's handlers, e.g. [`SyslaneError::StructuredDataId`].
    pub fn format(&self) -> Result<String, SyslaneError> {
        self.formatter.format(&self.fields)
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("fields", &self.fields)
            .field("formatter", &"<..>")
            .finish()
    }
}
