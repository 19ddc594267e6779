use thiserror::Error;

/// Describes the errors of `syslane`.
///
/// Validation errors are returned synchronously from the call that caused them.
/// I/O errors of a transport are never returned to the caller of
/// [`Logger::log`](crate::Logger::log); they are delivered through the transport's
/// [`TransportEvent::Error`](crate::TransportEvent::Error) and re-emitted by the logger.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SyslaneError {
    /// A structured-data entry is not a map.
    #[error("Message structured data should be a map")]
    StructuredDataType,

    /// A structured-data entry has no `id`, or its `id` is null.
    #[error("Message structured data \"id\" is not defined")]
    StructuredDataId,

    /// The context given to the logger is not a map.
    #[error("Logger context should be a map")]
    InvalidContext,

    /// The payload given to [`Logger::log`](crate::Logger::log) is not a map.
    #[error("Logger payload should be a map")]
    InvalidPayload,

    /// A level name does not match any of the registered levels.
    #[error("Unknown level name: {0:?}")]
    InvalidLevel(String),

    /// A rotation time limit is not one of `MM`, `dd`, `HH`, `mm`, `ss`.
    #[error("Invalid file time limit {0:?}, expected one of MM, dd, HH, mm, ss")]
    InvalidTimeLimit(String),

    /// A file size limit could not be parsed.
    #[error("Invalid file size limit {0:?}")]
    InvalidSize(String),

    /// The date template for file names contains an invalid specifier.
    #[error("Invalid file date template {0:?}")]
    InvalidDateTemplate(String),

    /// A single unit of output is larger than the configured file size limit.
    #[error("Message size {size} exceeds the file size limit {limit}")]
    MessageSizeExceeded {
        /// Size of the unit, in bytes.
        size: u64,
        /// Configured limit, in bytes.
        limit: u64,
    },

    /// Writing a unit made no progress too often.
    #[error("File write failed, no progress after repeated attempts")]
    WriteFailed,

    /// The output resource is not open (anymore).
    #[error("Output is closed")]
    Closed,

    /// Compression was requested, but the crate was built without feature `compress`.
    #[error("Compression requires the crate feature \"compress\"")]
    CompressionUnavailable,

    /// The configured output path exists but is not a directory.
    #[error("Log file cannot be written because the specified path is not a directory")]
    OutputBadDirectory,

    /// An I/O operation on the output failed.
    #[error("Output I/O failed")]
    Io(#[from] std::io::Error),

    /// An options file cannot be parsed.
    #[error("Options are not valid TOML")]
    Toml(#[from] toml::de::Error),

    /// The `log` facade already has a global logger.
    #[error("Global logger is already set")]
    Log(#[from] log::SetLoggerError),

    /// Some synchronization object is poisoned.
    #[error("Some synchronization object is poisoned")]
    Poison,
}
