use crate::{
    listeners::{ListenerId, Registry},
    util::{eprint_err, ErrorCode},
    EventKind, Formatter, Level, Map, Message, SyslaneError, Transport, TransportEvent, Value,
};
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type Drained = Box<dyn FnOnce() + Send>;

/// The dispatcher: turns log calls into [`Message`]s and fans them out to the piped
/// transports.
///
/// A message is built from the logger's context, the current time as `timestamp`,
/// the payload, and the level. It is written to every piped transport that is neither
/// ended nor destroyed and whose level allow-list accepts the level. Writing never
/// blocks on the output; failures of a transport are reported through
/// [`Logger::on_error`] and do not affect the other transports.
///
/// `Logger` is a cheap handle; clones share the same state.
///
/// ```rust,ignore
/// let file = FileTransport::builder("logs", "app").file_size_limit(10 * 1024).try_build()?;
/// let logger = Logger::builder()
///     .context(json!({"app_name": "demo"}))
///     .transport(file.transport())
///     .try_build()?;
/// logger.info(json!({"msg": "started"}))?;
/// logger.end_with(|| println!("all written"));
/// ```
#[derive(Clone)]
pub struct Logger {
    shared: Arc<Shared>,
}

struct Shared {
    name: String,
    context: Map,
    formatter: Arc<Formatter>,
    pipes: Mutex<Vec<Pipe>>,
    drained: Mutex<Vec<Drained>>,
    error_listeners: Registry<(), SyslaneError>,
}

// An attached transport and the listeners the logger registered on it.
struct Pipe {
    transport: Arc<Transport>,
    subscriptions: Vec<ListenerId>,
}

/// Builder for [`Logger`].
#[must_use]
#[derive(Default)]
pub struct LoggerBuilder {
    name: Option<String>,
    context: Option<Value>,
    formatter: Option<Arc<Formatter>>,
    transports: Vec<Arc<Transport>>,
}

impl LoggerBuilder {
    /// Sets the name, which is also the default of the context field `pub`;
    /// by default, a random UUID is used.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets fields that are added to every message; must be a map.
    ///
    /// They override the defaults `pub`, `procid`, `version` and `hostname`.
    pub fn context<V: Into<Value>>(mut self, context: V) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Sets the formatter; by default, a formatter with the default template is used.
    pub fn formatter(mut self, formatter: Arc<Formatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Adds a transport that is piped when the logger is built.
    pub fn transport(mut self, transport: &Arc<Transport>) -> Self {
        self.transports.push(Arc::clone(transport));
        self
    }

    /// Creates the logger.
    ///
    /// # Errors
    ///
    /// `SyslaneError::InvalidContext` if the context is not a map.
    pub fn try_build(mut self) -> Result<Logger, SyslaneError> {
        let overrides = match self.context.take() {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Map(overrides)) => overrides,
            Some(_) => return Err(SyslaneError::InvalidContext),
        };
        Ok(self.build(overrides))
    }

    fn build(self, overrides: Map) -> Logger {
        let name = self
            .name
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut context = Map::new();
        context.insert("pub".to_string(), Value::from(name.as_str()));
        context.insert("procid".to_string(), Value::from(std::process::id()));
        context.insert("version".to_string(), Value::Int(1));
        context.insert(
            "hostname".to_string(),
            hostname::get()
                .map(|h| Value::from(h.to_string_lossy().into_owned()))
                .unwrap_or(Value::Null),
        );
        context.extend(overrides);

        let logger = Logger {
            shared: Arc::new(Shared {
                name,
                context,
                formatter: self.formatter.unwrap_or_default(),
                pipes: Mutex::new(Vec::new()),
                drained: Mutex::new(Vec::new()),
                error_listeners: Registry::new(),
            }),
        };
        for transport in &self.transports {
            logger.pipe(transport);
        }
        logger
    }
}

impl Logger {
    /// Creates a builder.
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::default()
    }

    /// A logger with default name, context and formatter, and without transports.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build(Map::new())
    }

    /// The name of the logger.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// The fields that are added to every message.
    #[must_use]
    pub fn context(&self) -> &Map {
        &self.shared.context
    }

    /// The formatter that is attached to every message.
    #[must_use]
    pub fn formatter(&self) -> &Arc<Formatter> {
        &self.shared.formatter
    }

    /// The attached transports, in attachment order.
    #[must_use]
    pub fn transports(&self) -> Vec<Arc<Transport>> {
        self.shared
            .pipes()
            .iter()
            .map(|pipe| Arc::clone(&pipe.transport))
            .collect()
    }

    /// Logs `payload`, which must be a map, with level [`Level::EMERG`].
    ///
    /// # Errors
    ///
    /// See [`Logger::log`].
    pub fn emerg<V: Into<Value>>(&self, payload: V) -> Result<(), SyslaneError> {
        self.log(Level::EMERG, payload)
    }

    /// Logs `payload`, which must be a map, with level [`Level::ALERT`].
    ///
    /// # Errors
    ///
    /// See [`Logger::log`].
    pub fn alert<V: Into<Value>>(&self, payload: V) -> Result<(), SyslaneError> {
        self.log(Level::ALERT, payload)
    }

    /// Logs `payload`, which must be a map, with level [`Level::CRIT`].
    ///
    /// # Errors
    ///
    /// See [`Logger::log`].
    pub fn crit<V: Into<Value>>(&self, payload: V) -> Result<(), SyslaneError> {
        self.log(Level::CRIT, payload)
    }

    /// Logs `payload`, which must be a map, with level [`Level::ERROR`].
    ///
    /// # Errors
    ///
    /// See [`Logger::log`].
    pub fn error<V: Into<Value>>(&self, payload: V) -> Result<(), SyslaneError> {
        self.log(Level::ERROR, payload)
    }

    /// Logs `payload`, which must be a map, with level [`Level::WARN`].
    ///
    /// # Errors
    ///
    /// See [`Logger::log`].
    pub fn warn<V: Into<Value>>(&self, payload: V) -> Result<(), SyslaneError> {
        self.log(Level::WARN, payload)
    }

    /// Logs `payload`, which must be a map, with level [`Level::NOTE`].
    ///
    /// # Errors
    ///
    /// See [`Logger::log`].
    pub fn note<V: Into<Value>>(&self, payload: V) -> Result<(), SyslaneError> {
        self.log(Level::NOTE, payload)
    }

    /// Logs `payload`, which must be a map, with level [`Level::INFO`].
    ///
    /// # Errors
    ///
    /// See [`Logger::log`].
    pub fn info<V: Into<Value>>(&self, payload: V) -> Result<(), SyslaneError> {
        self.log(Level::INFO, payload)
    }

    /// Logs `payload`, which must be a map, with level [`Level::DEBUG`].
    ///
    /// # Errors
    ///
    /// See [`Logger::log`].
    pub fn debug<V: Into<Value>>(&self, payload: V) -> Result<(), SyslaneError> {
        self.log(Level::DEBUG, payload)
    }

    /// Builds a message and writes it to every eligible transport, without waiting for
    /// the output.
    ///
    /// # Errors
    ///
    /// `SyslaneError::InvalidPayload` if the payload is not a map,
    /// the formatter's error (e.g. `SyslaneError::StructuredDataId`) if the message cannot
    /// be formatted; nothing is written then.
    /// Failures of transports are never returned here.
    pub fn log<V: Into<Value>>(&self, level: Level, payload: V) -> Result<(), SyslaneError> {
        let Value::Map(payload) = payload.into() else {
            return Err(SyslaneError::InvalidPayload);
        };
        let mut defaults = Map::new();
        defaults.insert("timestamp".to_string(), Value::Time(Utc::now()));

        let message = Message::new(
            Arc::clone(&self.shared.formatter),
            [&self.shared.context, &defaults, &payload],
            level,
        );
        message.format()?;
        for transport in self.transports() {
            if transport.is_destroyed() || transport.is_writable_ended() {
                continue;
            }
            if !transport.accepts(level) {
                continue;
            }
            transport.write(&message);
        }
        Ok(())
    }

    /// Attaches a transport; attaching it again has no effect.
    ///
    /// The logger re-emits the transport's errors, and detaches the transport when it
    /// finishes or closes.
    pub fn pipe(&self, transport: &Arc<Transport>) -> Arc<Transport> {
        {
            let mut pipes = self.shared.pipes();
            if let Some(pipe) = pipes.iter().find(|p| p.transport.id() == transport.id()) {
                return Arc::clone(&pipe.transport);
            }

            let id = transport.id();
            let w_error = Arc::downgrade(&self.shared);
            let w_close = Weak::clone(&w_error);
            let w_finish = Weak::clone(&w_error);
            let subscriptions = vec![
                transport.on(EventKind::Error, move |event| {
                    if let (Some(shared), TransportEvent::Error(e)) = (w_error.upgrade(), event) {
                        shared.relay_error(e);
                    }
                }),
                transport.on(EventKind::Close, move |_| {
                    if let Some(shared) = w_close.upgrade() {
                        Shared::unpipe(&shared, id);
                    }
                }),
                transport.on(EventKind::Finish, move |_| {
                    if let Some(shared) = w_finish.upgrade() {
                        Shared::unpipe(&shared, id);
                    }
                }),
            ];
            pipes.push(Pipe {
                transport: Arc::clone(transport),
                subscriptions,
            });
        }

        // it may have closed before the listeners were registered
        if transport.is_closed() {
            Shared::unpipe(&self.shared, transport.id());
        }
        Arc::clone(transport)
    }

    /// Detaches a transport and removes the logger's listeners from it;
    /// returns false if it was not attached.
    pub fn unpipe(&self, transport: &Transport) -> bool {
        Shared::unpipe(&self.shared, transport.id())
    }

    /// Ends all attached transports gracefully.
    pub fn end(&self) {
        for transport in self.transports() {
            transport.end();
        }
    }

    /// Ends all attached transports gracefully, and calls `callback` once all of them
    /// have detached. Without attached transports, `callback` is called immediately.
    pub fn end_with<F: FnOnce() + Send + 'static>(&self, callback: F) {
        {
            let pipes = self.shared.pipes();
            if !pipes.is_empty() {
                self.shared.drained().push(Box::new(callback));
                drop(pipes);
                self.end();
                return;
            }
        }
        callback();
    }

    /// Destroys all attached transports; queued units are dropped.
    pub fn destroy(&self) {
        for transport in self.transports() {
            transport.destroy(None);
        }
    }

    /// Registers a listener for the errors of all attached transports.
    pub fn on_error<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&SyslaneError) + Send + Sync + 'static,
    {
        self.shared.error_listeners.add((), Arc::new(listener))
    }

    /// Removes an error listener; returns false if it was not registered.
    pub fn off(&self, id: ListenerId) -> bool {
        self.shared.error_listeners.remove(id)
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.shared.name)
            .field("context", &self.shared.context)
            .field("transports", &self.transports())
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn pipes(&self) -> MutexGuard<'_, Vec<Pipe>> {
        self.pipes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn drained(&self) -> MutexGuard<'_, Vec<Drained>> {
        self.drained.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn relay_error(&self, e: &SyslaneError) {
        if self.error_listeners.emit((), e) == 0 {
            eprint_err(
                ErrorCode::Write,
                &format!("transport of logger {} failed", self.name),
                e,
            );
        }
    }

    fn unpipe(shared: &Arc<Shared>, id: u64) -> bool {
        let (pipe, callbacks) = {
            let mut pipes = shared.pipes();
            let Some(index) = pipes.iter().position(|p| p.transport.id() == id) else {
                return false;
            };
            let pipe = pipes.remove(index);
            let callbacks = if pipes.is_empty() {
                std::mem::take(&mut *shared.drained())
            } else {
                Vec::new()
            };
            (pipe, callbacks)
        };
        for subscription in pipe.subscriptions {
            pipe.transport.off(subscription);
        }
        for callback in callbacks {
            callback();
        }
        true
    }
}

#[cfg(test)]
mod test {
    use super::Logger;
    use crate::{
        EventKind, Formatter, Level, Message, Sink, SinkContext, SyslaneError, Transport,
        TransportEvent, Value,
    };
    use serde_json::json;
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

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
    impl Collect {
        fn lines(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    struct Failing;
    impl Sink for Failing {
        fn write(&mut self, _unit: &[u8], _ctx: &SinkContext) -> Result<(), SyslaneError> {
            Err(SyslaneError::WriteFailed)
        }
    }

    fn msg_formatter() -> Arc<Formatter> {
        Arc::new(Formatter::with_template("%level% %msg%"))
    }

    #[test]
    fn default_context() {
        let logger = Logger::new();
        let context = logger.context();
        assert_eq!(context["pub"], Value::from(logger.name()));
        assert_eq!(context["procid"], Value::from(std::process::id()));
        assert_eq!(context["version"], Value::Int(1));
        assert!(context.contains_key("hostname"));
        assert_eq!(logger.name().len(), 36);
        assert!(logger.transports().is_empty());
    }

    #[test]
    fn context_overrides_defaults() {
        let logger = Logger::builder()
            .name("svc")
            .context(json!({"version": 2, "app_name": "demo"}))
            .try_build()
            .unwrap();
        assert_eq!(logger.name(), "svc");
        assert_eq!(logger.context()["pub"], Value::from("svc"));
        assert_eq!(logger.context()["version"], Value::Int(2));
        assert_eq!(logger.context()["app_name"], Value::from("demo"));
    }

    #[test]
    fn invalid_context_and_payload() {
        assert!(matches!(
            Logger::builder().context("text").try_build(),
            Err(SyslaneError::InvalidContext)
        ));
        let logger = Logger::new();
        assert!(matches!(logger.info(42), Err(SyslaneError::InvalidPayload)));
        assert!(matches!(logger.info(Value::Null), Err(SyslaneError::InvalidPayload)));
        assert!(logger.info(json!({})).is_ok());
    }

    #[test]
    fn pipe_is_idempotent() {
        let logger = Logger::new();
        let transport = Transport::builder().spawn(Collect::default()).unwrap();
        let first = logger.pipe(&transport);
        let second = logger.pipe(&transport);
        assert_eq!(first.id(), second.id());
        assert_eq!(logger.transports().len(), 1);
        assert_eq!(transport.listener_count(EventKind::Error), 1);
        assert_eq!(transport.listener_count(EventKind::Close), 1);
        assert_eq!(transport.listener_count(EventKind::Finish), 1);

        assert!(logger.unpipe(&transport));
        assert!(!logger.unpipe(&transport));
        assert_eq!(transport.listener_count(EventKind::Error), 0);
        assert_eq!(transport.listener_count(EventKind::Close), 0);
        assert_eq!(transport.listener_count(EventKind::Finish), 0);
    }

    #[test]
    fn level_filter_and_forced_level() {
        let errors = Collect::default();
        let all = Collect::default();
        let t_errors = Transport::builder()
            .levels([Level::ERROR])
            .spawn(errors.clone())
            .unwrap();
        let t_all = Transport::builder().spawn(all.clone()).unwrap();
        let logger = Logger::builder()
            .formatter(msg_formatter())
            .transport(&t_errors)
            .transport(&t_all)
            .try_build()
            .unwrap();

        logger.info(json!({"msg": "one", "level": "crit"})).unwrap();
        logger.error(json!({"msg": "two"})).unwrap();

        let (tx, rx) = crossbeam_channel::bounded(1);
        logger.end_with(move || tx.send(()).unwrap());
        rx.recv_timeout(Duration::from_secs(5)).unwrap();

        assert_eq!(errors.lines(), vec!["error two"]);
        assert_eq!(all.lines(), vec!["info one", "error two"]);
        assert!(logger.transports().is_empty());
        assert!(t_all.is_writable_ended());
        assert!(!t_all.is_destroyed());
    }

    #[test]
    fn end_without_transports_calls_back_at_once() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        Logger::new().end_with(move || tx.send(()).unwrap());
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn transport_errors_are_relayed_and_isolated() {
        let good = Collect::default();
        let t_good = Transport::builder().spawn(good.clone()).unwrap();
        let t_bad = Transport::builder().spawn(Failing).unwrap();
        let logger = Logger::builder()
            .formatter(msg_formatter())
            .transport(&t_bad)
            .transport(&t_good)
            .try_build()
            .unwrap();

        let (tx, rx) = crossbeam_channel::unbounded();
        logger.on_error(move |e| tx.send(e.to_string()).unwrap());

        logger.warn(json!({"msg": "a"})).unwrap();
        let relayed = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(relayed, SyslaneError::WriteFailed.to_string());

        t_bad.join();
        assert!(t_bad.is_destroyed());
        assert_eq!(logger.transports().len(), 1);

        logger.warn(json!({"msg": "b"})).unwrap();
        logger.end();
        t_good.join();
        assert_eq!(good.lines(), vec!["warn a", "warn b"]);
    }

    #[test]
    fn format_errors_fail_the_call_only() {
        let first = Collect::default();
        let second = Collect::default();
        let t_first = Transport::builder().spawn(first.clone()).unwrap();
        let t_second = Transport::builder().spawn(second.clone()).unwrap();
        let logger = Logger::builder()
            .formatter(Arc::new(Formatter::with_template("%sd%%msg%")))
            .transport(&t_first)
            .transport(&t_second)
            .try_build()
            .unwrap();

        assert!(matches!(
            logger.info(json!({"msg": "bad", "sd": {"no_id": 1}})),
            Err(SyslaneError::StructuredDataId)
        ));
        assert!(matches!(
            logger.info(json!({"msg": "bad", "sd": 3})),
            Err(SyslaneError::StructuredDataType)
        ));
        logger.info(json!({"msg": "good"})).unwrap();
        assert_eq!(logger.transports().len(), 2);
        logger.end();
        t_first.join();
        t_second.join();

        for (transport, sink) in [(&t_first, &first), (&t_second, &second)] {
            assert!(!transport.is_destroyed());
            assert_eq!(sink.lines(), vec!["good".to_string()]);
        }
    }

    #[test]
    fn unserializable_message_is_dropped_by_the_transport() {
        let sink = Collect::default();
        let transport = Transport::builder().spawn(sink.clone()).unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        transport.on(EventKind::Error, move |e| {
            if let TransportEvent::Error(err) = e {
                tx.send(matches!(**err, SyslaneError::StructuredDataId)).unwrap();
            }
        });
        let formatter = Arc::new(Formatter::with_template("%sd%%msg%"));
        let message = |payload: serde_json::Value| {
            let Value::Map(fields) = Value::from(payload) else {
                unreachable!()
            };
            Message::new(Arc::clone(&formatter), [&fields], Level::INFO)
        };

        assert!(!transport.write(&message(json!({"msg": "bad", "sd": {"no_id": 1}}))));
        assert!(rx.try_recv().unwrap());
        assert!(transport.write(&message(json!({"msg": "good"}))));
        transport.end();
        transport.join();
        assert!(!transport.is_destroyed());
        assert_eq!(sink.lines(), vec!["good".to_string()]);
    }

    #[test]
    fn destroy_detaches_all() {
        let transport = Transport::builder().spawn(Collect::default()).unwrap();
        let logger = Logger::builder().transport(&transport).try_build().unwrap();
        logger.destroy();
        transport.join();
        assert!(transport.is_destroyed());
        assert!(logger.transports().is_empty());
    }
}
