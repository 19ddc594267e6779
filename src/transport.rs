//! The contract between the [`Logger`](crate::Logger) and its outputs.
//!
//! A [`Transport`] is a sequential writer with a level allow-list, lifecycle flags, and
//! events. It owns a worker thread that processes the queued units one at a time, strictly
//! in the order in which they were written; the actual output is done by a [`Sink`].
//!
//! Implementing a new output thus means implementing [`Sink`]:
//!
//! ```rust,ignore
//! struct Collect(Vec<String>);
//! impl Sink for Collect {
//!     fn write(&mut self, unit: &[u8], _ctx: &SinkContext) -> Result<(), SyslaneError> {
//!         self.0.push(String::from_utf8_lossy(unit).into_owned());
//!         Ok(())
//!     }
//! }
//! let transport = Transport::builder().levels([Level::ERROR]).spawn(Collect(Vec::new()))?;
//! ```
use crate::{
    listeners::{ListenerId, Registry},
    util::{eprint_err, eprint_msg, ErrorCode},
    Level, Message, SyslaneError,
};
use crossbeam_channel::{Receiver, Sender};
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, PoisonError, RwLock,
    },
    thread::{Builder as ThreadBuilder, JoinHandle},
};

static NEXT_TRANSPORT_ID: AtomicU64 = AtomicU64::new(1);

/// Function that converts a message into the text that a transport writes.
pub type SerializeFunction = fn(&Message) -> Result<String, SyslaneError>;

/// Serializes a message with its formatter.
///
/// # Errors
///
/// Errors of the formatter.
pub fn plain(message: &Message) -> Result<String, SyslaneError> {
    message.format()
}

/// Serializes a message with its formatter, and wraps the result into the terminal style
/// of the message's level.
///
/// # Errors
///
/// Errors of the formatter.
pub fn painted(message: &Message) -> Result<String, SyslaneError> {
    let text = message.format()?;
    Ok(match message.level().style() {
        Some(style) => style.paint(text).to_string(),
        None => format!("\u{1b}[0m{text}\u{1b}[0m"),
    })
}

/// Kinds of [`TransportEvent`]s, used to register listeners.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// See [`TransportEvent::Open`].
    Open,
    /// See [`TransportEvent::Ready`].
    Ready,
    /// See [`TransportEvent::Error`].
    Error,
    /// See [`TransportEvent::Finish`].
    Finish,
    /// See [`TransportEvent::Close`].
    Close,
    /// See [`TransportEvent::Rotate`].
    Rotate,
}

/// Lifecycle notifications of a transport.
#[derive(Clone, Debug)]
pub enum TransportEvent {
    /// The output resource was acquired; carries the file path, if there is one.
    Open(Option<PathBuf>),
    /// The transport accepts units.
    Ready,
    /// Opening, writing or releasing failed, which destroys the transport,
    /// or a message could not be serialized and was dropped.
    Error(Arc<SyslaneError>),
    /// All units were written after [`Transport::end`].
    Finish,
    /// The output resource was released; no more events follow.
    Close,
    /// The output file was rotated.
    Rotate {
        /// The previous file.
        from: Option<PathBuf>,
        /// The new file.
        to: PathBuf,
    },
}

impl TransportEvent {
    /// The kind of the event.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            TransportEvent::Open(_) => EventKind::Open,
            TransportEvent::Ready => EventKind::Ready,
            TransportEvent::Error(_) => EventKind::Error,
            TransportEvent::Finish => EventKind::Finish,
            TransportEvent::Close => EventKind::Close,
            TransportEvent::Rotate { .. } => EventKind::Rotate,
        }
    }
}

/// An event listener.
pub type Listener = Arc<dyn Fn(&TransportEvent) + Send + Sync>;

/// The output behind a [`Transport`].
///
/// All methods are called on the transport's worker thread, one at a time.
/// An error returned from any of them is emitted as [`TransportEvent::Error`]
/// and destroys the transport.
pub trait Sink: Send {
    /// Acquires the output resource; called once, before the first unit is written.
    ///
    /// The default implementation just emits [`TransportEvent::Open`].
    ///
    /// # Errors
    ///
    /// If the resource cannot be acquired.
    fn open(&mut self, ctx: &SinkContext) -> Result<(), SyslaneError> {
        ctx.emit(&TransportEvent::Open(None));
        Ok(())
    }

    /// Writes one complete unit.
    ///
    /// # Errors
    ///
    /// If the unit cannot be written.
    fn write(&mut self, unit: &[u8], ctx: &SinkContext) -> Result<(), SyslaneError>;

    /// Called when the sink was woken up through a [`Waker`].
    ///
    /// # Errors
    ///
    /// If the deferred work fails.
    fn wake(&mut self, _ctx: &SinkContext) -> Result<(), SyslaneError> {
        Ok(())
    }

    /// Releases the resource after all units were written.
    ///
    /// # Errors
    ///
    /// If releasing fails.
    fn finish(&mut self, _ctx: &SinkContext) -> Result<(), SyslaneError> {
        Ok(())
    }

    /// Releases the resource on abrupt termination; `err` is the cause, if any.
    ///
    /// Is also called if [`Sink::open`] failed.
    ///
    /// # Errors
    ///
    /// If releasing fails.
    fn destroy(
        &mut self,
        _err: Option<&SyslaneError>,
        _ctx: &SinkContext,
    ) -> Result<(), SyslaneError> {
        Ok(())
    }
}

pub(crate) enum Command {
    Write(Vec<u8>),
    Wake,
    End,
    Destroy(Option<Arc<SyslaneError>>),
}

struct Shared {
    id: u64,
    destroyed: AtomicBool,
    writable_ended: AtomicBool,
    closed: AtomicBool,
    listeners: Registry<EventKind, TransportEvent>,
}

impl Shared {
    fn emit(&self, event: &TransportEvent) {
        let called = self.listeners.emit(event.kind(), event);
        if called == 0 {
            if let TransportEvent::Error(e) = event {
                eprint_err(
                    ErrorCode::Write,
                    &format!("transport {} failed", self.id),
                    e.as_ref(),
                );
            }
        }
    }
}

/// Handle given to a [`Sink`] to emit events and to schedule work on the worker thread.
pub struct SinkContext {
    shared: Arc<Shared>,
    sender: Sender<Command>,
}

impl SinkContext {
    /// Emits an event to the transport's listeners.
    pub fn emit(&self, event: &TransportEvent) {
        self.shared.emit(event);
    }

    /// Returns a handle that can wake the sink from other threads.
    #[must_use]
    pub fn waker(&self) -> Waker {
        Waker {
            sender: self.sender.clone(),
        }
    }

    /// True if the transport is being destroyed.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.shared.destroyed.load(Ordering::SeqCst)
    }
}

/// Lets other threads trigger [`Sink::wake`].
///
/// The wake-up is queued behind the units that were written before.
#[derive(Clone)]
pub struct Waker {
    sender: Sender<Command>,
}

impl Waker {
    /// Schedules a call of [`Sink::wake`]; returns false if the transport is gone.
    pub fn wake(&self) -> bool {
        self.sender.send(Command::Wake).is_ok()
    }
}

/// Builder for a [`Transport`].
#[must_use]
pub struct TransportBuilder {
    levels: Vec<Level>,
    serialize: SerializeFunction,
    listeners: Vec<(EventKind, Listener)>,
}

impl TransportBuilder {
    /// Restricts the transport to the given levels; by default it accepts all levels.
    pub fn levels<I: IntoIterator<Item = Level>>(mut self, levels: I) -> Self {
        self.levels = levels.into_iter().collect();
        self
    }

    /// Sets the function that converts messages to text; default is [`plain`].
    pub fn serialize(mut self, serialize: SerializeFunction) -> Self {
        self.serialize = serialize;
        self
    }

    /// Registers a listener before the worker starts, so that it also sees
    /// [`TransportEvent::Open`] and [`TransportEvent::Ready`].
    pub fn on<F>(mut self, kind: EventKind, listener: F) -> Self
    where
        F: Fn(&TransportEvent) + Send + Sync + 'static,
    {
        self.listeners.push((kind, Arc::new(listener)));
        self
    }

    /// Starts the worker thread, which opens the sink.
    ///
    /// # Errors
    ///
    /// `SyslaneError::Io` if the worker thread cannot be spawned.
    pub fn spawn<S: Sink + 'static>(self, sink: S) -> Result<Arc<Transport>, SyslaneError> {
        self.spawn_boxed(Box::new(sink))
    }

    /// Like [`TransportBuilder::spawn`], for a boxed sink.
    ///
    /// # Errors
    ///
    /// `SyslaneError::Io` if the worker thread cannot be spawned.
    pub fn spawn_boxed(self, sink: Box<dyn Sink>) -> Result<Arc<Transport>, SyslaneError> {
        let id = NEXT_TRANSPORT_ID.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::new(Shared {
            id,
            destroyed: AtomicBool::new(false),
            writable_ended: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            listeners: Registry::new(),
        });
        for (kind, listener) in self.listeners {
            shared.listeners.add(kind, listener);
        }

        let (sender, receiver) = crossbeam_channel::unbounded::<Command>();
        let ctx = SinkContext {
            shared: Arc::clone(&shared),
            sender: sender.clone(),
        };
        let join_handle = ThreadBuilder::new()
            .name(format!("syslane-transport-{id}"))
            .spawn(move || run(sink, &receiver, &ctx))?;

        Ok(Arc::new(Transport {
            levels: RwLock::new(self.levels),
            serialize: self.serialize,
            shared,
            sender,
            join_handle: Mutex::new(Some(join_handle)),
        }))
    }
}

/// A sequential writer that accepts messages, filters them by level,
/// and hands them to its [`Sink`] on a worker thread.
///
/// Serialization happens on the calling thread; a message that cannot be serialized is
/// dropped and reported as [`TransportEvent::Error`], the transport stays usable.
/// Write errors are never returned, they are emitted as [`TransportEvent::Error`]
/// and destroy the transport.
pub struct Transport {
    levels: RwLock<Vec<Level>>,
    serialize: SerializeFunction,
    shared: Arc<Shared>,
    sender: Sender<Command>,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Transport {
    /// Creates a builder.
    pub fn builder() -> TransportBuilder {
        TransportBuilder {
            levels: Vec::new(),
            serialize: plain,
            listeners: Vec::new(),
        }
    }

    /// Unique id of the transport within the process.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    /// The level allow-list; empty means that all levels are accepted.
    #[must_use]
    pub fn levels(&self) -> Vec<Level> {
        self.levels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the level allow-list.
    pub fn set_levels<I: IntoIterator<Item = Level>>(&self, levels: I) {
        *self.levels.write().unwrap_or_else(PoisonError::into_inner) =
            levels.into_iter().collect();
    }

    /// Restricts the transport to a single level.
    pub fn set_level(&self, level: Level) {
        self.set_levels([level]);
    }

    /// Replaces the level allow-list with levels given by name.
    ///
    /// # Errors
    ///
    /// `SyslaneError::InvalidLevel` if a name is unknown; the allow-list is then unchanged.
    pub fn set_level_names<S: AsRef<str>>(&self, names: &[S]) -> Result<(), SyslaneError> {
        let levels = names
            .iter()
            .map(|name| name.as_ref().parse())
            .collect::<Result<Vec<Level>, _>>()?;
        self.set_levels(levels);
        Ok(())
    }

    /// True if messages of the given level pass the allow-list.
    #[must_use]
    pub fn accepts(&self, level: Level) -> bool {
        let levels = self.levels.read().unwrap_or_else(PoisonError::into_inner);
        levels.is_empty() || levels.iter().any(|l| l.name() == level.name())
    }

    /// True once the transport was destroyed, explicitly or by a failure.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.shared.destroyed.load(Ordering::SeqCst)
    }

    /// True once [`Transport::end`] was called.
    #[must_use]
    pub fn is_writable_ended(&self) -> bool {
        self.shared.writable_ended.load(Ordering::SeqCst)
    }

    /// True once the worker released the resource and emitted [`TransportEvent::Close`].
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Serializes the message and queues it for writing.
    ///
    /// Returns false if the message was not queued, because the transport is ended or
    /// destroyed, or because serialization failed.
    pub fn write(&self, message: &Message) -> bool {
        if !self.check_writable() {
            return false;
        }
        match (self.serialize)(message) {
            Ok(text) => self.enqueue(text.into_bytes()),
            Err(e) => {
                self.shared.emit(&TransportEvent::Error(Arc::new(e)));
                false
            }
        }
    }

    /// Queues already serialized text for writing.
    pub fn write_str(&self, text: &str) -> bool {
        self.check_writable() && self.enqueue(text.as_bytes().to_vec())
    }

    /// Requests a graceful end: units queued so far are still written,
    /// then [`TransportEvent::Finish`] and [`TransportEvent::Close`] are emitted.
    pub fn end(&self) {
        if self.shared.destroyed.load(Ordering::SeqCst)
            || self.shared.writable_ended.swap(true, Ordering::SeqCst)
        {
            return;
        }
        self.sender.send(Command::End).ok();
    }

    /// Requests abrupt termination: a unit in flight is completed, queued units are
    /// dropped, then the resource is released and [`TransportEvent::Close`] is emitted.
    ///
    /// The error, if given, is emitted as [`TransportEvent::Error`] before the
    /// [`TransportEvent::Close`].
    pub fn destroy(&self, err: Option<SyslaneError>) {
        if self.shared.closed.load(Ordering::SeqCst)
            || self.shared.destroyed.swap(true, Ordering::SeqCst)
        {
            return;
        }
        self.sender.send(Command::Destroy(err.map(Arc::new))).ok();
    }

    /// Registers a listener for events of the given kind.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&TransportEvent) + Send + Sync + 'static,
    {
        self.shared.listeners.add(kind, Arc::new(listener))
    }

    /// Removes a listener; returns false if it was not registered.
    pub fn off(&self, id: ListenerId) -> bool {
        self.shared.listeners.remove(id)
    }

    /// Number of listeners for events of the given kind.
    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.shared.listeners.count(kind)
    }

    /// Waits until the worker thread has terminated, i.e. after
    /// [`TransportEvent::Close`] was emitted.
    ///
    /// Does not return before [`Transport::end`] or [`Transport::destroy`] was called.
    /// Has no effect when called from one of the transport's own listeners.
    pub fn join(&self) {
        let mut guard = self
            .join_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if guard
            .as_ref()
            .is_some_and(|handle| handle.thread().id() == std::thread::current().id())
        {
            return;
        }
        if let Some(handle) = guard.take() {
            if handle.join().is_err() {
                eprint_msg(ErrorCode::Thread, "transport worker panicked");
            }
        }
    }

    fn check_writable(&self) -> bool {
        if self.is_destroyed() {
            return false;
        }
        if self.is_writable_ended() {
            self.shared
                .emit(&TransportEvent::Error(Arc::new(SyslaneError::Closed)));
            return false;
        }
        true
    }

    fn enqueue(&self, unit: Vec<u8>) -> bool {
        self.sender.send(Command::Write(unit)).is_ok()
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        // a dropped transport still writes what it has accepted
        self.end();
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("id", &self.id())
            .field("levels", &self.levels())
            .field("destroyed", &self.is_destroyed())
            .field("writable_ended", &self.is_writable_ended())
            .finish_non_exhaustive()
    }
}

fn run(mut sink: Box<dyn Sink>, receiver: &Receiver<Command>, ctx: &SinkContext) {
    if let Err(e) = sink.open(ctx) {
        shut_down(sink.as_mut(), ctx, Some(Arc::new(e)));
        return;
    }
    ctx.emit(&TransportEvent::Ready);

    while let Ok(command) = receiver.recv() {
        match command {
            Command::Write(unit) => {
                if ctx.is_destroyed() {
                    continue;
                }
                if let Err(e) = sink.write(&unit, ctx) {
                    return shut_down(sink.as_mut(), ctx, Some(Arc::new(e)));
                }
            }
            Command::Wake => {
                if ctx.is_destroyed() {
                    continue;
                }
                if let Err(e) = sink.wake(ctx) {
                    return shut_down(sink.as_mut(), ctx, Some(Arc::new(e)));
                }
            }
            Command::End => {
                // a pending destroy takes precedence
                if ctx.is_destroyed() {
                    continue;
                }
                return match sink.finish(ctx) {
                    Ok(()) => {
                        ctx.emit(&TransportEvent::Finish);
                        close(ctx);
                    }
                    Err(e) => shut_down(sink.as_mut(), ctx, Some(Arc::new(e))),
                };
            }
            Command::Destroy(err) => {
                return shut_down(sink.as_mut(), ctx, err);
            }
        }
    }
}

// Abrupt termination: the first error wins and is reported, then the resource is released.
fn shut_down(sink: &mut dyn Sink, ctx: &SinkContext, err: Option<Arc<SyslaneError>>) {
    ctx.shared.destroyed.store(true, Ordering::SeqCst);
    let released = sink.destroy(err.as_deref(), ctx);
    if let Some(e) = err.or_else(|| released.err().map(Arc::new)) {
        ctx.emit(&TransportEvent::Error(e));
    }
    close(ctx);
}

fn close(ctx: &SinkContext) {
    ctx.shared.closed.store(true, Ordering::SeqCst);
    ctx.emit(&TransportEvent::Close);
}
