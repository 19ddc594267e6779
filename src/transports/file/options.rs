use crate::{Level, SizeLimit, SyslaneError, TimeLimit};
use serde::Deserializer;
use serde_derive::Deserialize;

/// The default date template of file names: year, month, day and hour.
pub const DEFAULT_DATE_TEMPLATE: &str = "%Y-%m-%d-%H";

/// Options of a [`FileTransport`](crate::transports::FileTransport), in a form that can be
/// read from configuration files.
///
/// Keys are camel-cased, as in
///
/// ```toml
/// levels = ["error", "crit"]
/// compress = true
/// fileSizeLimit = "10kb"
/// fileTimeLimit = "HH"
/// fileDateTemplate = "%Y-%m-%d"
/// saveRotationFile = true
/// ```
///
/// `levels` also accepts a single level name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct FileTransportOptions {
    /// Level allow-list; empty accepts all levels.
    #[serde(deserialize_with = "one_or_many")]
    pub levels: Vec<Level>,
    /// Compress each unit with gzip.
    pub compress: bool,
    /// Rotate before the file would exceed this size.
    pub file_size_limit: Option<SizeLimit>,
    /// Rotate when the clock passes this boundary.
    pub file_time_limit: Option<TimeLimit>,
    /// `chrono` format string for the date part of file names;
    /// default is [`DEFAULT_DATE_TEMPLATE`].
    pub file_date_template: Option<String>,
    /// Keep the previous file when rotating.
    pub save_rotation_file: bool,
    /// Use UTC rather than local time for file names and time limits.
    pub use_utc: bool,
}

impl FileTransportOptions {
    /// Parses options from a TOML document.
    ///
    /// # Errors
    ///
    /// `SyslaneError::Toml` if the document is not valid or contains invalid values.
    pub fn from_toml(s: &str) -> Result<Self, SyslaneError> {
        Ok(toml::from_str(s)?)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(Level),
    Many(Vec<Level>),
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Level>, D::Error> {
    Ok(
        match <OneOrMany as serde::Deserialize>::deserialize(deserializer)? {
            OneOrMany::One(level) => vec![level],
            OneOrMany::Many(levels) => levels,
        },
    )
}
