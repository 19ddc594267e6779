use crate::{SyslaneError, TransportEvent};
use chrono::{Local, Utc};
use std::{
    borrow::Cow,
    fs::{File, OpenOptions},
    io::{ErrorKind, Write},
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
};

// Consecutive attempts without progress that are tolerated for a single unit.
const MAX_RETRIES: usize = 5;

#[derive(Clone, Debug)]
pub(super) struct Config {
    pub(super) directory: PathBuf,
    pub(super) namespace: String,
    pub(super) compress: bool,
    pub(super) size_limit: Option<u64>,
    pub(super) date_template: String,
    pub(super) save_rotation_file: bool,
    pub(super) use_utc: bool,
}

// What the worker thread publishes to the `FileTransport` handle.
#[derive(Debug, Default)]
pub(super) struct Status {
    path: Mutex<Option<PathBuf>>,
    bytes_written: AtomicU64,
}
impl Status {
    pub(super) fn path(&self) -> Option<PathBuf> {
        self.path
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
    pub(super) fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::SeqCst)
    }
}

// The mutable state of a file transport; lives on the worker thread.
pub(super) struct State {
    config: Config,
    file: Option<File>,
    path: Option<PathBuf>,
    bytes_written: u64,
    created_at: Option<String>,
    counter: u32,
    status: Arc<Status>,
}

impl State {
    pub(super) fn new(config: Config, status: Arc<Status>) -> Self {
        Self {
            config,
            file: None,
            path: None,
            bytes_written: 0,
            created_at: None,
            counter: 0,
            status,
        }
    }

    // Creates the next file and makes it the current one.
    pub(super) fn open_file(&mut self) -> Result<PathBuf, SyslaneError> {
        let date = if self.config.use_utc {
            Utc::now().format(&self.config.date_template).to_string()
        } else {
            Local::now().format(&self.config.date_template).to_string()
        };

        let mut filename = format!("{}_{date}", self.config.namespace);
        if self.config.save_rotation_file && self.created_at.as_deref() == Some(date.as_str()) {
            self.counter += 1;
            filename.push_str(&format!("({})", self.counter));
        } else {
            self.counter = 0;
        }
        filename.push_str(if self.config.compress { ".gz" } else { ".log" });
        self.created_at = Some(date);

        let path = self.config.directory.join(filename);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        self.file = Some(file);
        self.path = Some(path.clone());
        *self
            .status
            .path
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(path.clone());
        Ok(path)
    }

    // Writes a complete unit, rotating first if the unit would not fit into the current file.
    pub(super) fn write_unit(
        &mut self,
        unit: &[u8],
        emit: &dyn Fn(&TransportEvent),
    ) -> Result<(), SyslaneError> {
        let unit = if self.config.compress {
            Cow::Owned(gzip(unit)?)
        } else {
            Cow::Borrowed(unit)
        };

        let size = unit.len() as u64;
        if let Some(limit) = self.config.size_limit {
            if size > limit {
                return Err(SyslaneError::MessageSizeExceeded { size, limit });
            }
            if self.bytes_written + size > limit {
                self.rotate(emit)?;
            }
        }

        let file = self.file.as_mut().ok_or(SyslaneError::Closed)?;
        let result = write_with_retry(file, &unit, &mut self.bytes_written);
        self.status
            .bytes_written
            .store(self.bytes_written, Ordering::SeqCst);
        result
    }

    // Replaces the current file with a new one; the old file is deleted
    // unless rotation files are to be kept.
    pub(super) fn rotate(&mut self, emit: &dyn Fn(&TransportEvent)) -> Result<(), SyslaneError> {
        self.bytes_written = 0;
        self.status.bytes_written.store(0, Ordering::SeqCst);
        self.close()?;
        let from = self.path.take();
        if !self.config.save_rotation_file {
            if let Some(ref old) = from {
                std::fs::remove_file(old)?;
            }
        }
        let to = self.open_file()?;
        emit(&TransportEvent::Rotate { from, to });
        Ok(())
    }

    pub(super) fn close(&mut self) -> Result<(), SyslaneError> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        Ok(())
    }
}

#[cfg(feature = "compress")]
fn gzip(unit: &[u8]) -> Result<Vec<u8>, SyslaneError> {
    use flate2::{write::GzEncoder, Compression};
    let mut encoder = GzEncoder::new(Vec::with_capacity(unit.len() / 2 + 32), Compression::fast());
    encoder.write_all(unit)?;
    Ok(encoder.finish()?)
}

#[cfg(not(feature = "compress"))]
fn gzip(_unit: &[u8]) -> Result<Vec<u8>, SyslaneError> {
    Err(SyslaneError::CompressionUnavailable)
}

// Writes the complete unit; `WouldBlock` and zero-length writes count as attempts without
// progress, more than `MAX_RETRIES` of them in a row fail the unit.
pub(super) fn write_with_retry<W: Write>(
    w: &mut W,
    unit: &[u8],
    bytes_written: &mut u64,
) -> Result<(), SyslaneError> {
    let mut offset = 0;
    let mut retries = 0;
    while offset < unit.len() {
        match w.write(&unit[offset..]) {
            Ok(0) => retries += 1,
            Ok(n) => {
                offset += n;
                *bytes_written += n as u64;
                retries = 0;
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => retries += 1,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
        if retries > MAX_RETRIES {
            return Err(SyslaneError::WriteFailed);
        }
    }
    Ok(())
}
