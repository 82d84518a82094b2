use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// A calendar month, always normalized to the first day. Stored in the
/// database as `YYYY-MM-01` text and used as the coarse-grained idempotency
/// key for payment transactions.
///
/// Rules never read the wall clock; callers derive the month explicitly so
/// tests can pin arbitrary months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Self {
        debug_assert!((1..=12).contains(&month));
        Self { year, month }
    }

    /// The month containing the given date.
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The month containing the given Unix timestamp (UTC).
    pub fn of_timestamp(ts: i64) -> Self {
        let date = chrono::DateTime::from_timestamp(ts, 0)
            .unwrap_or_default()
            .date_naive();
        Self::of(date)
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self::new(self.year + 1, 1)
        } else {
            Self::new(self.year, self.month + 1)
        }
    }

    /// Ordinal month count since `start`, counting `start` itself as
    /// month 1. Negative when `self` precedes `start`.
    pub fn months_since(&self, start: Month) -> i64 {
        let diff = (self.year as i64 - start.year as i64) * 12
            + (self.month as i64 - start.month as i64);
        diff + 1
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).expect("valid first of month")
    }

    /// "YYYY-MM" form, used in poll and cron event ids.
    pub fn short(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-01", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = String;

    /// Accepts `YYYY-MM-01`, `YYYY-MM-DD` (day ignored), or `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '-');
        let year: i32 = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| format!("invalid month: {}", s))?;
        let month: u32 = parts
            .next()
            .and_then(|p| p.parse().ok())
            .filter(|m| (1..=12).contains(m))
            .ok_or_else(|| format!("invalid month: {}", s))?;
        Ok(Self { year, month })
    }
}

impl Serialize for Month {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Month {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

impl ToSql for Month {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for Month {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|_| FromSqlError::InvalidType)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn months_since_counts_start_as_one() {
        let jan = Month::new(2025, 1);
        assert_eq!(jan.months_since(jan), 1);
        assert_eq!(Month::new(2025, 2).months_since(jan), 2);
        assert_eq!(Month::new(2026, 1).months_since(jan), 13);
        assert_eq!(Month::new(2024, 12).months_since(jan), 0);
    }

    #[test]
    fn parses_db_and_short_forms() {
        assert_eq!("2025-02-01".parse::<Month>().unwrap(), Month::new(2025, 2));
        assert_eq!("2025-02-17".parse::<Month>().unwrap(), Month::new(2025, 2));
        assert_eq!("2025-02".parse::<Month>().unwrap(), Month::new(2025, 2));
        assert!("2025-13".parse::<Month>().is_err());
        assert!("garbage".parse::<Month>().is_err());
    }

    #[test]
    fn formats_as_first_of_month() {
        assert_eq!(Month::new(2025, 2).to_string(), "2025-02-01");
        assert_eq!(Month::new(2025, 12).next().to_string(), "2026-01-01");
    }
}
