//! Domain types shared by the fetcher, aggregator, scheduler and checkpoint store.

use anyhow::Result;
use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;

/// A duration in hours, held as integer hundredths so totals add up exactly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hours(u64);

impl Hours {
    pub const ZERO: Hours = Hours(0);

    pub fn from_hundredths(h: u64) -> Self {
        Hours(h)
    }

    /// Minutes converted to hours and rounded to the nearest hundredth.
    /// `None` when the conversion would overflow.
    pub fn from_minutes(minutes: u64) -> Option<Self> {
        let scaled = minutes.checked_mul(100)?.checked_add(30)?;
        Some(Hours(scaled / 60))
    }
}

impl fmt::Display for Hours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Add for Hours {
    type Output = Hours;

    fn add(self, rhs: Hours) -> Hours {
        Hours(self.0 + rhs.0)
    }
}

impl Sum for Hours {
    fn sum<I: Iterator<Item = Hours>>(iter: I) -> Hours {
        iter.fold(Hours::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Hours> for Hours {
    fn sum<I: Iterator<Item = &'a Hours>>(iter: I) -> Hours {
        iter.copied().sum()
    }
}

/// Month and year whose sessions are harvested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetPeriod {
    pub year: i32,
    pub month: u32,
}

impl TargetPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            anyhow::bail!("month must be between 1 and 12, got {}", month);
        }
        Ok(Self { year, month })
    }

    pub fn contains(&self, at: &NaiveDateTime) -> bool {
        at.year() == self.year && at.month() == self.month
    }
}

/// One unit of work: a student whose hours are harvested across every course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    /// Business key used for checkpointing (PALS id).
    #[serde(rename = "PALS_ID", deserialize_with = "string_or_number")]
    pub key: String,
    /// Portal user id used in register URLs.
    #[serde(rename = "USER_ID", deserialize_with = "string_or_number")]
    pub portal_id: String,
    #[serde(rename = "FULLNAME", default)]
    pub name: String,
    #[serde(rename = "CHECKED", default, deserialize_with = "lenient_bool")]
    pub done: bool,
}

/// One category: an attendance register (course) fetched for every student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    #[serde(rename = "course_id", deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(rename = "course_name")]
    pub name: String,
    /// Whether the register has already been recalculated (see `refresh`).
    #[serde(default, deserialize_with = "lenient_bool")]
    pub refresh: bool,
}

/// One reported activity interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
    pub duration: Hours,
}

/// Total of in-scope session hours for one course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTotal {
    pub course_id: String,
    pub course_name: String,
    pub hours: Hours,
}

/// One ledger row per student. `total` always equals the sum of `categories`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRecord {
    pub key: String,
    pub portal_id: String,
    pub name: String,
    pub total: Hours,
    /// One entry per course, in course-list order.
    pub categories: Vec<CategoryTotal>,
    /// Courses whose contribution is zero because every fetch attempt failed.
    pub degraded: Vec<String>,
}

/// Outcome counters for one run. Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTally {
    pub succeeded: usize,
    pub failed: usize,
    /// Course fetches that fell back to a zero contribution.
    pub degraded: usize,
}

impl RunTally {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    S(String),
    I(i64),
    U(u64),
}

fn string_or_number<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match StringOrNumber::deserialize(d)? {
        StringOrNumber::S(s) => s.trim().to_string(),
        StringOrNumber::I(n) => n.to_string(),
        StringOrNumber::U(n) => n.to_string(),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoolOrString {
    B(bool),
    S(String),
}

/// Accepts `true`/`false` and the strings `"true"`/`"false"` (older rosters store the flag as text).
fn lenient_bool<'de, D>(d: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<BoolOrString>::deserialize(d)? {
        None => Ok(false),
        Some(BoolOrString::B(b)) => Ok(b),
        Some(BoolOrString::S(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected a boolean flag, got {:?}",
                other
            ))),
        },
    }
}
