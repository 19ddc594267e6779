use crate::{Level, Logger, Map, SyslaneError, Value};

/// Routes the log calls of the [`log`] facade into a [`Logger`].
///
/// Each record becomes a message with the fields `msg`, `target` and `module_path`;
/// `Trace` records are logged as `debug`.
///
/// ```rust,ignore
/// LogBridge::install(logger.clone(), log::LevelFilter::Info)?;
/// log::warn!("disk almost full");
/// ```
#[derive(Debug)]
pub struct LogBridge {
    logger: Logger,
}

impl LogBridge {
    /// Creates a bridge; see [`LogBridge::install`] for registering it.
    #[must_use]
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }

    /// Registers a bridge to `logger` as the global logger of the `log` facade.
    ///
    /// # Errors
    ///
    /// `SyslaneError::Log` if a global logger is already registered.
    pub fn install(logger: Logger, max_level: log::LevelFilter) -> Result<(), SyslaneError> {
        log::set_boxed_logger(Box::new(Self::new(logger)))?;
        log::set_max_level(max_level);
        Ok(())
    }

    /// The level a record of the `log` facade is logged with.
    #[must_use]
    pub fn level_of(level: log::Level) -> Level {
        match level {
            log::Level::Error => Level::ERROR,
            log::Level::Warn => Level::WARN,
            log::Level::Info => Level::INFO,
            log::Level::Debug | log::Level::Trace => Level::DEBUG,
        }
    }
}

impl log::Log for LogBridge {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let mut payload = Map::new();
        payload.insert("msg".to_string(), Value::Str(record.args().to_string()));
        payload.insert("target".to_string(), Value::from(record.target()));
        payload.insert("module_path".to_string(), Value::from(record.module_path()));
        // a map payload cannot be rejected
        self.logger
            .log(Self::level_of(record.level()), payload)
            .ok();
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod test {
    use super::LogBridge;
    use crate::{Formatter, Level, Logger, Sink, SinkContext, SyslaneError, Transport};
    use log::Log;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Collect(Arc<Mutex<Vec<String>>>);
    impl Sink for Collect {
        fn write(&mut self, unit: &[u8], _ctx: &SinkContext) -> Result<(), SyslaneError> {
            self.0
                .lock()
                .unwrap()
                .push(String::from_utf8_lossy(unit).into_owned());
            Ok(())
        }
    }

    #[test]
    fn level_mapping() {
        assert_eq!(LogBridge::level_of(log::Level::Error), Level::ERROR);
        assert_eq!(LogBridge::level_of(log::Level::Warn), Level::WARN);
        assert_eq!(LogBridge::level_of(log::Level::Info), Level::INFO);
        assert_eq!(LogBridge::level_of(log::Level::Debug), Level::DEBUG);
        assert_eq!(LogBridge::level_of(log::Level::Trace), Level::DEBUG);
    }

    #[test]
    fn records_become_messages() {
        let sink = Collect::default();
        let transport = Transport::builder().spawn(sink.clone()).unwrap();
        let logger = Logger::builder()
            .formatter(Arc::new(Formatter::with_template(
                "%level%|%target%|%module_path%|%msg%",
            )))
            .transport(&transport)
            .try_build()
            .unwrap();
        let bridge = LogBridge::new(logger);

        bridge.log(
            &log::Record::builder()
                .args(format_args!("{} apples", 3))
                .level(log::Level::Warn)
                .target("fruit")
                .module_path(None)
                .build(),
        );
        transport.end();
        transport.join();

        assert_eq!(
            sink.0.lock().unwrap().clone(),
            vec!["warn|fruit|-|3 apples".to_string()]
        );
    }
}
