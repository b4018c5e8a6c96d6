use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StampError {
    #[error("invalid timestamp {value:?}, expected YYYY-MM-DD HH:MM:SS")]
    Invalid { value: String },
}

/// A UTC instant rendered as `YYYY-MM-DD HH:MM:SS`.
///
/// The rendering is fixed width, so the derived string ordering is the
/// chronological ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Stamp(String);

const EARLIEST: &str = "0000-01-01 00:00:00";
const LATEST: &str = "9999-12-31 23:59:59";

impl Stamp {
    pub fn now() -> Self {
        Self::from_datetime(OffsetDateTime::now_utc())
    }

    /// Times outside the four-digit year range clamp to its bounds.
    pub fn from_system_time(at: SystemTime) -> Self {
        let shifted = match at.duration_since(UNIX_EPOCH) {
            Ok(after) => time::Duration::try_from(after)
                .ok()
                .and_then(|offset| OffsetDateTime::UNIX_EPOCH.checked_add(offset))
                .ok_or(LATEST),
            Err(before) => time::Duration::try_from(before.duration())
                .ok()
                .and_then(|offset| OffsetDateTime::UNIX_EPOCH.checked_sub(offset))
                .ok_or(EARLIEST),
        };
        match shifted {
            Ok(at) => Self::from_datetime(at),
            Err(bound) => Self(bound.to_string()),
        }
    }

    /// Years before 0 or after 9999 clamp to the representable bounds.
    pub fn from_datetime(at: OffsetDateTime) -> Self {
        let utc = at.to_offset(time::UtcOffset::UTC);
        let rendered = match utc.year() {
            year if year < 0 => EARLIEST.to_string(),
            year if year > 9999 => LATEST.to_string(),
            year => format!(
                "{year:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                u8::from(utc.month()),
                utc.day(),
                utc.hour(),
                utc.minute(),
                utc.second()
            ),
        };
        Self(rendered)
    }

    pub fn parse(value: &str) -> Result<Self, StampError> {
        let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
        let parsed =
            PrimitiveDateTime::parse(value.trim(), format).map_err(|_| StampError::Invalid {
                value: value.to_string(),
            })?;
        Ok(Self::from_datetime(parsed.assume_utc()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Stamp {
    type Error = StampError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Stamp> for String {
    fn from(stamp: Stamp) -> Self {
        stamp.0
    }
}
