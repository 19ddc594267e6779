use crate::SyslaneError;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Timelike};
use serde_derive::Deserialize;
use std::str::FromStr;

/// The calendar boundary at which the file transport rotates.
///
/// Parsed from the tokens `MM` (month), `dd` (day), `HH` (hour), `mm` (minute)
/// and `ss` (second); the tokens are case-sensitive.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum TimeLimit {
    /// Rotate when the clock has started a new month.
    Month,
    /// Rotate when the clock has started a new day.
    Day,
    /// Rotate when the clock has started a new hour.
    Hour,
    /// Rotate when the clock has started a new minute.
    Minute,
    /// Rotate when the clock has started a new second.
    Second,
}

impl TimeLimit {
    /// The first boundary strictly after `now`, in the time zone of `now`.
    #[must_use]
    pub fn next_boundary<Tz: TimeZone>(self, now: &DateTime<Tz>) -> DateTime<Tz> {
        let fallback = now.clone() + Duration::seconds(1);
        let Some(next) = self.next_naive(&now.naive_local()) else {
            return fallback;
        };
        let tz = now.timezone();
        // a boundary that falls into a DST gap is taken an hour later
        tz.from_local_datetime(&next)
            .earliest()
            .or_else(|| tz.from_local_datetime(&(next + Duration::hours(1))).earliest())
            .filter(|boundary| boundary > now)
            .unwrap_or(fallback)
    }

    fn next_naive(self, now: &NaiveDateTime) -> Option<NaiveDateTime> {
        let date = now.date();
        match self {
            TimeLimit::Month => {
                let (year, month) = if date.month() == 12 {
                    (date.year() + 1, 1)
                } else {
                    (date.year(), date.month() + 1)
                };
                NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)
            }
            TimeLimit::Day => date.succ_opt()?.and_hms_opt(0, 0, 0),
            TimeLimit::Hour => {
                Some(date.and_hms_opt(now.hour(), 0, 0)? + Duration::hours(1))
            }
            TimeLimit::Minute => {
                Some(date.and_hms_opt(now.hour(), now.minute(), 0)? + Duration::minutes(1))
            }
            TimeLimit::Second => Some(
                date.and_hms_opt(now.hour(), now.minute(), now.second())? + Duration::seconds(1),
            ),
        }
    }
}

impl FromStr for TimeLimit {
    type Err = SyslaneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MM" => Ok(TimeLimit::Month),
            "dd" => Ok(TimeLimit::Day),
            "HH" => Ok(TimeLimit::Hour),
            "mm" => Ok(TimeLimit::Minute),
            "ss" => Ok(TimeLimit::Second),
            _ => Err(SyslaneError::InvalidTimeLimit(s.to_string())),
        }
    }
}

impl TryFrom<String> for TimeLimit {
    type Error = SyslaneError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
