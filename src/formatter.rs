//! Template based serialization of messages.
//!
//! A template is plain text with `%identifier%` placeholders, e.g.
//!
//! ```text
//! <%pri%> %version% %timestamp% %hostname% %app_name% %procid% %msgid% %sd% %msg%
//! ```
//!
//! Each placeholder is resolved, in template order, by
//!
//! * the handler registered for the identifier, if it returns a non-null value,
//! * otherwise the message field with exactly the identifier's name, if it is non-null,
//! * otherwise the literal `-`.
//!
//! Handlers are matched case-insensitively; an exact match takes precedence.
//! The handlers `pri`, `timestamp` and `sd` are registered by default and can be replaced
//! or deleted.
mod handlers;

pub use handlers::{pri, sd, timestamp};

use crate::{Map, SyslaneError, Value};
use regex::Regex;
use std::{
    collections::HashMap,
    sync::{Arc, OnceLock, PoisonError, RwLock},
};

/// The syslog-like default template.
pub const DEFAULT_TEMPLATE: &str =
    "<%pri%> %version% %timestamp% %hostname% %app_name% %procid% %msgid% %sd% %msg%\n";

/// Substitution for placeholders that resolve to nothing.
const NIL: &str = "-";

/// A placeholder handler.
///
/// It is called with the fields of the message; a return value of `None` or
/// [`Value::Null`] lets the formatter fall back to the message field.
pub type Handler = Arc<dyn Fn(&Map) -> Result<Option<Value>, SyslaneError> + Send + Sync>;

#[derive(Clone, Debug, PartialEq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

struct Inner {
    template: String,
    segments: Arc<Vec<Segment>>,
    handlers: HashMap<String, Handler>,
}

/// Serializes messages according to a template.
///
/// The formatter is shared between a logger and its messages; template and handlers can be
/// changed at any time, also while other threads are formatting.
pub struct Formatter {
    inner: RwLock<Inner>,
}

impl Formatter {
    /// Formatter with the [`DEFAULT_TEMPLATE`] and the built-in handlers.
    #[must_use]
    pub fn new() -> Self {
        Self::with_template(DEFAULT_TEMPLATE)
    }

    /// Formatter with the given template and the built-in handlers.
    #[must_use]
    pub fn with_template<S: Into<String>>(template: S) -> Self {
        let template = template.into();
        let mut handlers: HashMap<String, Handler> = HashMap::new();
        handlers.insert("pri".to_string(), Arc::new(pri));
        handlers.insert("timestamp".to_string(), Arc::new(timestamp));
        handlers.insert("sd".to_string(), Arc::new(sd));
        Self {
            inner: RwLock::new(Inner {
                segments: Arc::new(compile(&template)),
                template,
                handlers,
            }),
        }
    }

    /// The current template.
    #[must_use]
    pub fn template(&self) -> String {
        self.read().template.clone()
    }

    /// Replaces the template and recompiles the placeholder list.
    pub fn set_template<S: Into<String>>(&self, template: S) {
        let template = template.into();
        let segments = Arc::new(compile(&template));
        let mut inner = self.write();
        inner.template = template;
        inner.segments = segments;
    }

    /// Registers a handler for placeholder `key`, replacing an existing one.
    pub fn set_handler<F>(&self, key: &str, handler: F) -> &Self
    where
        F: Fn(&Map) -> Result<Option<Value>, SyslaneError> + Send + Sync + 'static,
    {
        self.write()
            .handlers
            .insert(key.to_string(), Arc::new(handler));
        self
    }

    /// True if a handler would be used for placeholder `key`.
    #[must_use]
    pub fn has_handler(&self, key: &str) -> bool {
        self.get_handler(key).is_some()
    }

    /// Returns the handler that is used for placeholder `key`.
    #[must_use]
    pub fn get_handler(&self, key: &str) -> Option<Handler> {
        lookup(&self.read().handlers, key).cloned()
    }

    /// Removes the handler that is used for placeholder `key`.
    pub fn delete_handler(&self, key: &str) -> Option<Handler> {
        let mut inner = self.write();
        let registered = resolve(&inner.handlers, key)?.to_string();
        inner.handlers.remove(&registered)
    }

    /// Produces the textual form of a message.
    ///
    /// # Errors
    ///
    /// The first error returned by a handler.
    pub fn format(&self, fields: &Map) -> Result<String, SyslaneError> {
        // handlers run without holding the lock, so they may use the formatter themselves
        let plan: Vec<(Segment, Option<Handler>)> = {
            let inner = self.read();
            inner
                .segments
                .iter()
                .map(|segment| {
                    let handler = match segment {
                        Segment::Placeholder(key) => lookup(&inner.handlers, key).cloned(),
                        Segment::Literal(_) => None,
                    };
                    (segment.clone(), handler)
                })
                .collect()
        };

        let mut out = String::with_capacity(128);
        for (segment, handler) in plan {
            match segment {
                Segment::Literal(text) => out.push_str(&text),
                Segment::Placeholder(key) => {
                    let from_handler = match handler {
                        Some(handler) => handler(fields)?.filter(|v| !v.is_null()),
                        None => None,
                    };
                    match from_handler
                        .as_ref()
                        .or_else(|| fields.get(&key).filter(|v| !v.is_null()))
                    {
                        Some(value) => out.push_str(&value.to_string()),
                        None => out.push_str(NIL),
                    }
                }
            }
        }
        Ok(out)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Formatter {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let inner = self.read();
        let mut keys: Vec<&String> = inner.handlers.keys().collect();
        keys.sort();
        f.debug_struct("Formatter")
            .field("template", &inner.template)
            .field("handlers", &keys)
            .finish()
    }
}

// The registered key for a placeholder: an exact match first, then ignoring case.
fn resolve<'a>(handlers: &'a HashMap<String, Handler>, key: &str) -> Option<&'a str> {
    if let Some((k, _)) = handlers.get_key_value(key) {
        return Some(k);
    }
    handlers
        .keys()
        .find(|k| k.eq_ignore_ascii_case(key))
        .map(String::as_str)
}

fn lookup<'a>(handlers: &'a HashMap<String, Handler>, key: &str) -> Option<&'a Handler> {
    resolve(handlers, key).and_then(|k| handlers.get(k))
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("%(.*?)%").unwrap(/* ok */))
}

fn compile(template: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last = 0;
    for captures in placeholder_regex().captures_iter(template) {
        let (Some(whole), Some(key)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        if whole.start() > last {
            segments.push(Segment::Literal(template[last..whole.start()].to_string()));
        }
        segments.push(Segment::Placeholder(key.as_str().to_string()));
        last = whole.end();
    }
    if last < template.len() {
        segments.push(Segment::Literal(template[last..].to_string()));
    }
    segments
}
