// only enables the `doc_cfg` feature when the `docsrs` configuration attribute is defined
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! A structured logging pipeline.
//!
//! A [`Logger`] turns leveled log calls into [`Message`]s, which are maps of fields,
//! and fans them out to any number of [`Transport`]s. Every transport serializes the
//! messages with a [`Formatter`], whose default template produces
//! [RFC 5424](https://datatracker.ietf.org/doc/rfc5424)-like syslog lines:
//!
//! ```text
//! <%pri%> %version% %timestamp% %hostname% %app_name% %procid% %msgid% %sd% %msg%
//! ```
//!
//! Transports write on their own worker threads; a log call never waits for the output,
//! and a failing transport does not affect the others.
//!
//! The crate provides
//!
//! * a [`FileTransport`](transports::FileTransport) that rotates its files by size
//!   or by calendar boundaries, and optionally compresses its output with gzip,
//! * a [`ConsoleTransport`](transports::ConsoleTransport) that writes colored lines to stdout,
//! * the trait [`Sink`] for implementing other outputs,
//! * a [`LogBridge`] that routes the calls of the [`log`] facade into a `Logger`.
//!
//! ```rust,ignore
//! use serde_json::json;
//! use syslane::{transports::FileTransport, Level, Logger, TimeLimit};
//!
//! let file = FileTransport::builder("log_files", "app")
//!     .file_time_limit(TimeLimit::Day)
//!     .levels([Level::ERROR, Level::WARN])
//!     .try_build()?;
//! let logger = Logger::builder()
//!     .context(json!({"app_name": "demo"}))
//!     .transport(file.transport())
//!     .try_build()?;
//!
//! logger.warn(json!({"msg": "disk almost full", "sd": {"id": "disk", "free": "2%"}}))?;
//! logger.end_with(|| println!("done"));
//! ```

mod bridge;
mod error;
pub mod formatter;
mod level;
mod listeners;
mod logger;
mod message;
mod parameters;
mod timer;
pub mod transport;
pub mod transports;
mod util;
mod value;

pub use crate::bridge::LogBridge;
pub use crate::error::SyslaneError;
pub use crate::formatter::Formatter;
pub use crate::level::Level;
pub use crate::listeners::ListenerId;
pub use crate::logger::{Logger, LoggerBuilder};
pub use crate::message::Message;
pub use crate::parameters::{SizeLimit, TimeLimit};
pub use crate::timer::Timer;
pub use crate::transport::{
    EventKind, Listener, SerializeFunction, Sink, SinkContext, Transport, TransportBuilder,
    TransportEvent, Waker,
};
pub use crate::value::{iso_timestamp, Map, Value};
