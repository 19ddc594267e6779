use crate::SyslaneError;
use serde_derive::Deserialize;
use std::str::FromStr;

const UNITS: [(&str, u64); 6] = [
    ("pb", 1 << 50),
    ("tb", 1 << 40),
    ("gb", 1 << 30),
    ("mb", 1 << 20),
    ("kb", 1 << 10),
    ("b", 1),
];

/// The file size in bytes above which the file transport rotates.
///
/// Can be given as a plain number of bytes, or parsed from a human-readable string
/// like `"512"`, `"10kb"` or `"1.5 MB"`; units are 1024-based and case-insensitive.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawSize")]
pub struct SizeLimit(u64);

impl SizeLimit {
    /// The limit in bytes.
    #[must_use]
    pub fn bytes(self) -> u64 {
        self.0
    }
}

impl From<u64> for SizeLimit {
    fn from(bytes: u64) -> Self {
        Self(bytes)
    }
}

impl FromStr for SizeLimit {
    type Err = SyslaneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SyslaneError::InvalidSize(s.to_string());
        let lower = s.trim().to_ascii_lowercase();
        let (number, factor) = UNITS
            .iter()
            .find_map(|(unit, factor)| {
                lower
                    .strip_suffix(unit)
                    .map(|number| (number.trim_end(), *factor))
            })
            .unwrap_or((lower.as_str(), 1));

        let number = number.strip_prefix('+').unwrap_or(number);
        if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit() || c == '.') {
            return Err(invalid());
        }
        let value: f64 = number.parse().map_err(|_| invalid())?;
        #[allow(clippy::cast_precision_loss)]
        let (bytes, max) = ((value * factor as f64).floor(), u64::MAX as f64);
        if !bytes.is_finite() || bytes >= max {
            return Err(invalid());
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let bytes = bytes as u64;
        Ok(Self(bytes))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSize {
    Bytes(u64),
    Text(String),
}

impl TryFrom<RawSize> for SizeLimit {
    type Error = SyslaneError;

    fn try_from(raw: RawSize) -> Result<Self, Self::Error> {
        match raw {
            RawSize::Bytes(bytes) => Ok(Self(bytes)),
            RawSize::Text(text) => text.parse(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::SizeLimit;

    #[test]
    fn parse_sizes() {
        let parse = |s: &str| s.parse::<SizeLimit>().map(SizeLimit::bytes).ok();
        assert_eq!(parse("512"), Some(512));
        assert_eq!(parse("512b"), Some(512));
        assert_eq!(parse("10kb"), Some(10 * 1024));
        assert_eq!(parse("10KB"), Some(10 * 1024));
        assert_eq!(parse("1.5 MB"), Some(1024 * 1024 + 512 * 1024));
        assert_eq!(parse("2gb"), Some(2 << 30));
        assert_eq!(parse("1tb"), Some(1 << 40));
        assert_eq!(parse("1pb"), Some(1 << 50));
    }

    #[test]
    fn reject_garbage() {
        for s in ["", "kb", "-1kb", "ten", "1.2.3mb", "5 xb"] {
            assert!(s.parse::<SizeLimit>().is_err(), "{s:?} should be rejected");
        }
    }
}
