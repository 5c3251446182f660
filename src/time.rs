//! Time units, relative times and query time ranges.

use std::str::FromStr;

use chrono::{DateTime, Months, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};
use crate::json::JsonObject;

/// Units used by relative times, sampling sizes and execution intervals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    /// Milliseconds.
    Milliseconds,
    /// Seconds.
    Seconds,
    /// Minutes.
    Minutes,
    /// Hours.
    Hours,
    /// Days.
    Days,
    /// Weeks.
    Weeks,
    /// Calendar months.
    Months,
    /// Calendar years.
    Years,
}

impl TimeUnit {
    /// Wire name of the unit.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Milliseconds => "MILLISECONDS",
            TimeUnit::Seconds => "SECONDS",
            TimeUnit::Minutes => "MINUTES",
            TimeUnit::Hours => "HOURS",
            TimeUnit::Days => "DAYS",
            TimeUnit::Weeks => "WEEKS",
            TimeUnit::Months => "MONTHS",
            TimeUnit::Years => "YEARS",
        }
    }
}

impl FromStr for TimeUnit {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self> {
        match input.to_ascii_uppercase().as_str() {
            "MILLISECONDS" => Ok(Self::Milliseconds),
            "SECONDS" => Ok(Self::Seconds),
            "MINUTES" => Ok(Self::Minutes),
            "HOURS" => Ok(Self::Hours),
            "DAYS" => Ok(Self::Days),
            "WEEKS" => Ok(Self::Weeks),
            "MONTHS" => Ok(Self::Months),
            "YEARS" => Ok(Self::Years),
            _ => Err(Error::parse(format!("unknown time unit '{}'", input))),
        }
    }
}

impl std::fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TimeUnit {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// The server echoes units back in lower case.
impl<'de> Deserialize<'de> for TimeUnit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A positive amount of a [`TimeUnit`], e.g. "3 weeks".
///
/// Used as "N units before now" for query ranges, and as a plain duration for
/// sampling sizes and rollup execution intervals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RelativeTimeFields")]
pub struct RelativeTime {
    value: i64,
    unit: TimeUnit,
}

/// Unchecked wire form of [`RelativeTime`].
#[derive(Deserialize)]
struct RelativeTimeFields {
    value: i64,
    unit: TimeUnit,
}

impl TryFrom<RelativeTimeFields> for RelativeTime {
    type Error = Error;

    fn try_from(fields: RelativeTimeFields) -> Result<Self> {
        RelativeTime::new(fields.value, fields.unit)
    }
}

impl RelativeTime {
    /// Create a relative time. The magnitude must be greater than zero.
    pub fn new(value: i64, unit: TimeUnit) -> Result<Self> {
        if value <= 0 {
            return Err(Error::validation(format!(
                "relative time value must be greater than 0, got {}",
                value
            )));
        }
        Ok(Self { value, unit })
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// Resolve to the epoch-millisecond instant `value` units before `now_millis`.
    ///
    /// Months and years follow the UTC calendar, so one month before March 31st
    /// is the last day of February.
    pub fn time_before(&self, now_millis: i64) -> Result<i64> {
        let now = DateTime::<Utc>::from_timestamp_millis(now_millis)
            .ok_or_else(|| Error::InvalidRange(format!("instant {} is out of range", now_millis)))?;

        let before = |delta: Option<TimeDelta>| delta.and_then(|d| now.checked_sub_signed(d));
        let resolved = match self.unit {
            TimeUnit::Milliseconds => before(TimeDelta::try_milliseconds(self.value)),
            TimeUnit::Seconds => before(TimeDelta::try_seconds(self.value)),
            TimeUnit::Minutes => before(TimeDelta::try_minutes(self.value)),
            TimeUnit::Hours => before(TimeDelta::try_hours(self.value)),
            TimeUnit::Days => before(TimeDelta::try_days(self.value)),
            TimeUnit::Weeks => before(TimeDelta::try_weeks(self.value)),
            TimeUnit::Months => u32::try_from(self.value)
                .ok()
                .and_then(|m| now.checked_sub_months(Months::new(m))),
            TimeUnit::Years => u32::try_from(self.value)
                .ok()
                .and_then(|y| y.checked_mul(12))
                .and_then(|m| now.checked_sub_months(Months::new(m))),
        };

        resolved.map(|t| t.timestamp_millis()).ok_or_else(|| {
            Error::InvalidRange(format!(
                "{} {} before {} is out of range",
                self.value, self.unit, now_millis
            ))
        })
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Start and end of a query, each either absolute (epoch ms) or relative.
///
/// Relative endpoints are evaluated lazily against a reference "now" when the
/// range is validated or resolved, not when they are set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TimeRange {
    start_absolute: Option<i64>,
    start_relative: Option<RelativeTime>,
    end_absolute: Option<i64>,
    end_relative: Option<RelativeTime>,
}

impl TimeRange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_start_absolute(&mut self, millis: i64) {
        self.start_absolute = Some(millis);
    }

    pub fn set_start_relative(&mut self, time: RelativeTime) {
        self.start_relative = Some(time);
    }

    pub fn set_end_absolute(&mut self, millis: i64) {
        self.end_absolute = Some(millis);
    }

    pub fn set_end_relative(&mut self, time: RelativeTime) {
        self.end_relative = Some(time);
    }

    pub fn start_absolute(&self) -> Option<i64> {
        self.start_absolute
    }

    pub fn start_relative(&self) -> Option<RelativeTime> {
        self.start_relative
    }

    pub fn end_absolute(&self) -> Option<i64> {
        self.end_absolute
    }

    pub fn end_relative(&self) -> Option<RelativeTime> {
        self.end_relative
    }

    /// Check the range against `now_millis` and return the resolved
    /// `(start, end)` instants. A missing end resolves to `now_millis`.
    ///
    /// Equal start and end is a valid range; an end strictly before the start
    /// is not.
    pub fn resolve(&self, now_millis: i64) -> Result<(i64, i64)> {
        let start = match (self.start_absolute, self.start_relative) {
            (Some(_), Some(_)) => {
                return Err(Error::InvalidRange(
                    "both absolute and relative start times cannot be set".to_string(),
                ));
            }
            (Some(abs), None) => abs,
            (None, Some(rel)) => rel.time_before(now_millis)?,
            (None, None) => {
                return Err(Error::InvalidRange("start time must be specified".to_string()));
            }
        };

        let end = match (self.end_absolute, self.end_relative) {
            (Some(_), Some(_)) => {
                return Err(Error::InvalidRange(
                    "both absolute and relative end times cannot be set".to_string(),
                ));
            }
            (Some(abs), None) => Some(abs),
            (None, Some(rel)) => Some(rel.time_before(now_millis)?),
            (None, None) => None,
        };

        if let Some(end) = end {
            if end < start {
                return Err(Error::InvalidRange(format!(
                    "start time cannot be later than end time ({} > {})",
                    start, end
                )));
            }
        }

        Ok((start, end.unwrap_or(now_millis)))
    }

    /// Validate against the current wall-clock time.
    pub fn validate(&self) -> Result<()> {
        self.resolve(now_millis()).map(|_| ())
    }

    pub(crate) fn write_fields(&self, obj: &mut JsonObject) -> Result<()> {
        if let Some(abs) = self.start_absolute {
            obj.field("start_absolute", &abs)?;
        }
        if let Some(rel) = &self.start_relative {
            obj.field("start_relative", rel)?;
        }
        if let Some(abs) = self.end_absolute {
            obj.field("end_absolute", &abs)?;
        }
        if let Some(rel) = &self.end_relative {
            obj.field("end_relative", rel)?;
        }
        Ok(())
    }
}
