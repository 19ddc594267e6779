use super::{
    options::DEFAULT_DATE_TEMPLATE,
    state::{Config, State, Status},
    FileSink, FileTransport, FileTransportOptions,
};
use crate::{
    EventKind, Level, Listener, SizeLimit, SyslaneError, TimeLimit, Transport, TransportEvent,
};
use chrono::format::{Item, StrftimeItems};
use std::{
    path::PathBuf,
    sync::{atomic::AtomicBool, Arc},
};

/// Builder for [`FileTransport`].
#[allow(clippy::module_name_repetitions)]
#[must_use]
pub struct FileTransportBuilder {
    directory: PathBuf,
    namespace: String,
    options: FileTransportOptions,
    listeners: Vec<(EventKind, Listener)>,
}

impl FileTransportBuilder {
    pub(super) fn new(directory: PathBuf, namespace: String) -> Self {
        Self {
            directory,
            namespace,
            options: FileTransportOptions::default(),
            listeners: Vec::new(),
        }
    }

    /// Replaces all options, e.g. with options read from a configuration file.
    pub fn options(mut self, options: FileTransportOptions) -> Self {
        self.options = options;
        self
    }

    /// Restricts the transport to the given levels.
    pub fn levels<I: IntoIterator<Item = Level>>(mut self, levels: I) -> Self {
        self.options.levels = levels.into_iter().collect();
        self
    }

    /// Compresses each unit with gzip before it is written; the files get the
    /// extension `.gz`.
    pub fn compress(mut self, compress: bool) -> Self {
        self.options.compress = compress;
        self
    }

    /// Rotates the file before it would exceed the given size.
    pub fn file_size_limit<L: Into<SizeLimit>>(mut self, limit: L) -> Self {
        self.options.file_size_limit = Some(limit.into());
        self
    }

    /// Rotates the file whenever the clock passes the given boundary.
    pub fn file_time_limit(mut self, limit: TimeLimit) -> Self {
        self.options.file_time_limit = Some(limit);
        self
    }

    /// Sets the `chrono` format string for the date part of the file names.
    pub fn file_date_template<S: Into<String>>(mut self, template: S) -> Self {
        self.options.file_date_template = Some(template.into());
        self
    }

    /// Keeps the previous file when rotating.
    pub fn save_rotation_file(mut self, save: bool) -> Self {
        self.options.save_rotation_file = save;
        self
    }

    /// Uses UTC rather than local time for file names and time limits.
    pub fn use_utc(mut self, use_utc: bool) -> Self {
        self.options.use_utc = use_utc;
        self
    }

    /// Registers a listener that also sees the events emitted while the file is opened.
    pub fn on<F>(mut self, kind: EventKind, listener: F) -> Self
    where
        F: Fn(&TransportEvent) + Send + Sync + 'static,
    {
        self.listeners.push((kind, Arc::new(listener)));
        self
    }

    /// Creates the directory, if necessary, and starts the transport.
    ///
    /// The file itself is opened asynchronously; listen to [`EventKind::Open`] or
    /// [`EventKind::Error`] to learn about the outcome.
    ///
    /// # Errors
    ///
    /// `SyslaneError::OutputBadDirectory` if the path exists but is not a directory,
    /// `SyslaneError::InvalidDateTemplate` if the date template is invalid,
    /// `SyslaneError::CompressionUnavailable` if compression is requested without
    /// feature `compress`,
    /// `SyslaneError::Io` if the directory cannot be created or the worker cannot be started.
    pub fn try_build(self) -> Result<FileTransport, SyslaneError> {
        if self.directory.exists() && !self.directory.is_dir() {
            return Err(SyslaneError::OutputBadDirectory);
        }
        std::fs::create_dir_all(&self.directory)?;
        let directory = std::fs::canonicalize(&self.directory)?;

        let date_template = self
            .options
            .file_date_template
            .clone()
            .unwrap_or_else(|| DEFAULT_DATE_TEMPLATE.to_string());
        if StrftimeItems::new(&date_template).any(|item| matches!(item, Item::Error)) {
            return Err(SyslaneError::InvalidDateTemplate(date_template));
        }

        if self.options.compress && cfg!(not(feature = "compress")) {
            return Err(SyslaneError::CompressionUnavailable);
        }

        let status = Arc::new(Status::default());
        let sink = FileSink {
            state: State::new(
                Config {
                    directory: directory.clone(),
                    namespace: self.namespace,
                    compress: self.options.compress,
                    size_limit: self.options.file_size_limit.map(SizeLimit::bytes),
                    date_template,
                    save_rotation_file: self.options.save_rotation_file,
                    use_utc: self.options.use_utc,
                },
                Arc::clone(&status),
            ),
            time_limit: self.options.file_time_limit,
            use_utc: self.options.use_utc,
            timer: None,
            rotation_pending: Arc::new(AtomicBool::new(false)),
        };

        let mut builder = Transport::builder().levels(self.options.levels);
        for (kind, listener) in self.listeners {
            builder = builder.on(kind, move |event| listener(event));
        }

        Ok(FileTransport {
            transport: builder.spawn(sink)?,
            status,
            directory,
            compress: self.options.compress,
        })
    }
}
