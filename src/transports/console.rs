use crate::{
    transport::{painted, plain},
    EventKind, Level, Listener, Sink, SinkContext, SyslaneError, Transport, TransportEvent,
};
use std::{io::Write, sync::Arc};

/// A transport that writes to stdout, by default in the colors of the message levels.
#[derive(Debug)]
pub struct ConsoleTransport {
    transport: Arc<Transport>,
    paint: bool,
}

impl ConsoleTransport {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> ConsoleTransportBuilder {
        ConsoleTransportBuilder {
            levels: Vec::new(),
            paint: true,
            out: None,
            listeners: Vec::new(),
        }
    }

    /// The transport to pipe into a logger.
    #[must_use]
    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// True if the output is colored.
    #[must_use]
    pub fn paint(&self) -> bool {
        self.paint
    }
}

/// Builder for [`ConsoleTransport`].
#[allow(clippy::module_name_repetitions)]
#[must_use]
pub struct ConsoleTransportBuilder {
    levels: Vec<Level>,
    paint: bool,
    out: Option<Box<dyn Write + Send>>,
    listeners: Vec<(EventKind, Listener)>,
}

impl ConsoleTransportBuilder {
    /// Restricts the transport to the given levels.
    pub fn levels<I: IntoIterator<Item = Level>>(mut self, levels: I) -> Self {
        self.levels = levels.into_iter().collect();
        self
    }

    /// Switches the coloring on or off; default is on.
    pub fn paint(mut self, paint: bool) -> Self {
        self.paint = paint;
        self
    }

    /// Writes to the given writer instead of stdout.
    pub fn writer<W: Write + Send + 'static>(mut self, w: W) -> Self {
        self.out = Some(Box::new(w));
        self
    }

    /// Registers a listener before the transport starts.
    pub fn on<F>(mut self, kind: EventKind, listener: F) -> Self
    where
        F: Fn(&TransportEvent) + Send + Sync + 'static,
    {
        self.listeners.push((kind, Arc::new(listener)));
        self
    }

    /// Starts the transport.
    ///
    /// # Errors
    ///
    /// `SyslaneError::Io` if the worker thread cannot be spawned.
    pub fn try_build(self) -> Result<ConsoleTransport, SyslaneError> {
        let mut builder = Transport::builder()
            .levels(self.levels)
            .serialize(if self.paint { painted } else { plain });
        for (kind, listener) in self.listeners {
            builder = builder.on(kind, move |event| listener(event));
        }
        let sink = self
            .out
            .map_or_else(ConsoleSink::stdout, |out| ConsoleSink { out });
        Ok(ConsoleTransport {
            transport: builder.spawn(sink)?,
            paint: self.paint,
        })
    }
}

/// Passes units through to a terminal stream.
pub struct ConsoleSink {
    out: Box<dyn Write + Send>,
}

impl ConsoleSink {
    /// A sink that writes to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self {
            out: Box::new(std::io::stdout()),
        }
    }
}

impl Sink for ConsoleSink {
    fn write(&mut self, unit: &[u8], _ctx: &SinkContext) -> Result<(), SyslaneError> {
        self.out.write_all(unit)?;
        Ok(self.out.flush()?)
    }

    fn finish(&mut self, _ctx: &SinkContext) -> Result<(), SyslaneError> {
        Ok(self.out.flush()?)
    }
}

#[cfg(test)]
mod test {
    use super::ConsoleTransport;
    use crate::{Formatter, Level, Map, Message};
    use std::{
        io::Write,
        sync::{Arc, Mutex},
    };

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);
    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn message(level: Level) -> Message {
        let mut payload = Map::new();
        payload.insert("msg".into(), "hi".into());
        Message::new(
            Arc::new(Formatter::with_template("%msg%")),
            [&payload],
            level,
        )
    }

    fn output(paint: bool, level: Level) -> String {
        let out = Shared::default();
        let console = ConsoleTransport::builder()
            .paint(paint)
            .writer(out.clone())
            .try_build()
            .unwrap();
        assert_eq!(console.paint(), paint);
        assert!(console.transport().write(&message(level)));
        console.transport().end();
        console.transport().join();
        let bytes = out.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn paints_with_the_level_color() {
        assert_eq!(output(true, Level::ERROR), "\u{1b}[31mhi\u{1b}[0m");
        assert_eq!(output(true, Level::INFO), "\u{1b}[0mhi\u{1b}[0m");
    }

    #[test]
    fn plain_output_without_paint() {
        assert_eq!(output(false, Level::ERROR), "hi");
    }
}
