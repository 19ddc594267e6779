use crate::SyslaneError;
use nu_ansi_term::{Color, Style};
use serde::{Deserialize, Deserializer};
use std::{fmt, str::FromStr};

/// Severity of a log message.
///
/// The eight instances follow the syslog severities of
/// [RFC 5424](https://datatracker.ietf.org/doc/rfc5424); a lower code is more severe.
/// Levels are plain constants, they are never created at runtime.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Level {
    name: &'static str,
    code: u8,
    color: Option<Color>,
    bold: bool,
}

impl Level {
    /// System is unusable.
    pub const EMERG: Level = Level::new("emerg", 0, Some(Color::Yellow), true);
    /// Action must be taken immediately.
    pub const ALERT: Level = Level::new("alert", 1, Some(Color::Yellow), false);
    /// Critical conditions.
    pub const CRIT: Level = Level::new("crit", 2, Some(Color::Red), true);
    /// Error conditions.
    pub const ERROR: Level = Level::new("error", 3, Some(Color::Red), false);
    /// Warning conditions.
    pub const WARN: Level = Level::new("warn", 4, Some(Color::Red), false);
    /// Normal but significant condition.
    pub const NOTE: Level = Level::new("note", 5, Some(Color::Magenta), false);
    /// Informational messages.
    pub const INFO: Level = Level::new("info", 6, None, false);
    /// Debug-level messages.
    pub const DEBUG: Level = Level::new("debug", 7, Some(Color::Blue), false);

    /// All levels, from most to least severe.
    pub const ALL: [Level; 8] = [
        Level::EMERG,
        Level::ALERT,
        Level::CRIT,
        Level::ERROR,
        Level::WARN,
        Level::NOTE,
        Level::INFO,
        Level::DEBUG,
    ];

    const fn new(name: &'static str, code: u8, color: Option<Color>, bold: bool) -> Self {
        Self {
            name,
            code,
            color,
            bold,
        }
    }

    /// The name, e.g. `"warn"`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The numeric severity.
    #[must_use]
    pub fn code(&self) -> u8 {
        self.code
    }

    /// The terminal style used by the console transport, if any.
    #[must_use]
    pub fn style(&self) -> Option<Style> {
        self.color.map(|color| {
            if self.bold {
                color.bold()
            } else {
                color.normal()
            }
        })
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl FromStr for Level {
    type Err = SyslaneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Level::ALL
            .iter()
            .find(|level| level.name.eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| SyslaneError::InvalidLevel(s.to_string()))
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::Level;

    #[test]
    fn codes_are_ordered_by_severity() {
        let codes: Vec<u8> = Level::ALL.iter().map(Level::code).collect();
        assert_eq!(codes, vec![0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn parse_level_names() {
        assert_eq!("note".parse::<Level>().unwrap(), Level::NOTE);
        assert_eq!(" DEBUG ".parse::<Level>().unwrap(), Level::DEBUG);
        assert!("trace".parse::<Level>().is_err());
    }

    #[test]
    fn deserialize_from_names() {
        let levels: Vec<Level> = serde_json::from_str(r#"["crit", "Info"]"#).unwrap();
        assert_eq!(levels, vec![Level::CRIT, Level::INFO]);
        assert!(serde_json::from_str::<Level>(r#""trace""#).is_err());
        assert!(serde_json::from_str::<Level>("3").is_err());
    }

    #[test]
    fn severe_levels_are_bold() {
        let paint = |level: Level| level.style().unwrap().paint("x").to_string();
        assert_eq!(paint(Level::EMERG), "\u{1b}[1;33mx\u{1b}[0m");
        assert_eq!(paint(Level::CRIT), "\u{1b}[1;31mx\u{1b}[0m");
        assert_eq!(paint(Level::ERROR), "\u{1b}[31mx\u{1b}[0m");
        assert!(Level::INFO.style().is_none());
    }
}
