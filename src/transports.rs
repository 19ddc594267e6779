//! Concrete transports: a rotating file transport and a console transport.
//!
//! Both are constructed with builders and hand out an `Arc<`[`Transport`](crate::Transport)`>`
//! that can be piped into a [`Logger`](crate::Logger). Other outputs can be added by
//! implementing [`Sink`](crate::Sink).
mod console;
mod file;

pub use self::console::{ConsoleSink, ConsoleTransport, ConsoleTransportBuilder};
pub use self::file::{FileTransport, FileTransportBuilder, FileTransportOptions};
