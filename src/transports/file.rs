mod builder;
mod options;
mod state;

pub use self::builder::FileTransportBuilder;
pub use self::options::FileTransportOptions;

use self::state::{State, Status};
use crate::{Sink, SinkContext, SyslaneError, TimeLimit, Timer, Transport, TransportEvent};
use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

/// A transport that writes to files in a directory, with optional compression and rotation.
///
/// Files are named `{namespace}_{date}.log`, or `.gz` with compression, where the date is
/// formatted with the configured date template (default `%Y-%m-%d-%H`). Each unit is
/// written completely into one file:
///
/// * with a size limit, the file is rotated before a unit that would exceed the limit;
///   a unit that alone exceeds the limit fails with
///   [`SyslaneError::MessageSizeExceeded`] and destroys the transport,
/// * with a time limit, the file is rotated whenever the clock passes the boundary.
///
/// Rotation deletes the previous file, unless rotation files are to be saved; files
/// created for the same date are then distinguished by a counter, as in
/// `app_2024-01-01-09(1).log`.
///
/// Use [`FileTransport::builder`] to create one, and [`FileTransport::transport`] to pipe it
/// into a [`Logger`](crate::Logger).
#[derive(Debug)]
pub struct FileTransport {
    transport: Arc<Transport>,
    status: Arc<Status>,
    directory: PathBuf,
    compress: bool,
}

impl FileTransport {
    /// Creates a builder for a file transport that writes into `directory`,
    /// with file names starting with `namespace`.
    #[must_use]
    pub fn builder<P: Into<PathBuf>, S: Into<String>>(
        directory: P,
        namespace: S,
    ) -> FileTransportBuilder {
        FileTransportBuilder::new(directory.into(), namespace.into())
    }

    /// The transport to pipe into a logger.
    #[must_use]
    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// The current file, once it was opened.
    #[must_use]
    pub fn path(&self) -> Option<PathBuf> {
        self.status.path()
    }

    /// The directory of the files (canonicalized).
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Bytes written to the current file, after compression.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.status.bytes_written()
    }

    /// True if the units are compressed.
    #[must_use]
    pub fn compress(&self) -> bool {
        self.compress
    }
}

// The sink of a file transport; owns the file and the rotation timer.
struct FileSink {
    state: State,
    time_limit: Option<TimeLimit>,
    use_utc: bool,
    timer: Option<Timer>,
    rotation_pending: Arc<AtomicBool>,
}

impl FileSink {
    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop();
        }
    }
}

impl Sink for FileSink {
    fn open(&mut self, ctx: &SinkContext) -> Result<(), SyslaneError> {
        let path = self.state.open_file()?;
        ctx.emit(&TransportEvent::Open(Some(path)));

        if let Some(limit) = self.time_limit {
            let waker = ctx.waker();
            let pending = Arc::clone(&self.rotation_pending);
            // a trigger that finds a rotation pending is dropped
            let timer = Timer::new(limit, move || {
                if !pending.swap(true, Ordering::SeqCst) {
                    waker.wake();
                }
            })
            .use_utc(self.use_utc);
            timer.start()?;
            self.timer = Some(timer);
        }
        Ok(())
    }

    fn write(&mut self, unit: &[u8], ctx: &SinkContext) -> Result<(), SyslaneError> {
        self.state.write_unit(unit, &|event| ctx.emit(event))
    }

    fn wake(&mut self, ctx: &SinkContext) -> Result<(), SyslaneError> {
        if self.rotation_pending.load(Ordering::SeqCst) {
            let result = self.state.rotate(&|event| ctx.emit(event));
            self.rotation_pending.store(false, Ordering::SeqCst);
            result?;
        }
        Ok(())
    }

    fn finish(&mut self, _ctx: &SinkContext) -> Result<(), SyslaneError> {
        self.stop_timer();
        self.state.close()
    }

    fn destroy(
        &mut self,
        _err: Option<&SyslaneError>,
        _ctx: &SinkContext,
    ) -> Result<(), SyslaneError> {
        self.stop_timer();
        self.state.close()
    }
}
