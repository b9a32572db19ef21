use chrono::{Datelike, Local, NaiveDate};
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

/// Julian day number of 0001-01-01 minus one, so that
/// `num_days_from_ce() + JDN_OFFSET` gives the Julian day number of a date.
const JDN_OFFSET: i64 = 1_721_425;

/// A calendar position counted in days.
///
/// The integer part is the Julian day number. Due dates may carry a
/// fractional part (an "hour" within the day), which is preserved by
/// postponing but ignored by every day-level comparison.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JulianDate(f64);

impl JulianDate {
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    pub fn from_day(day: i64) -> Self {
        Self(day as f64)
    }

    pub fn from_naive(date: NaiveDate) -> Self {
        Self::from_day(date.num_days_from_ce() as i64 + JDN_OFFSET)
    }

    /// Today's date in the local calendar, with no fractional part
    pub fn today() -> Self {
        Self::from_naive(Local::now().date_naive())
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Whole day number (floor)
    pub fn day(self) -> i64 {
        self.0.floor() as i64
    }

    pub fn hour_fraction(self) -> f64 {
        self.0 - self.0.floor()
    }

    /// Whole days from `earlier` to `self`
    pub fn days_since(self, earlier: JulianDate) -> i64 {
        self.day() - earlier.day()
    }

    pub fn to_naive(self) -> Option<NaiveDate> {
        i32::try_from(self.day() - JDN_OFFSET)
            .ok()
            .and_then(NaiveDate::from_num_days_from_ce_opt)
    }
}

impl Add<i64> for JulianDate {
    type Output = JulianDate;

    fn add(self, days: i64) -> JulianDate {
        JulianDate(self.0 + days as f64)
    }
}

impl fmt::Display for JulianDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_naive() {
            Some(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            None => write!(f, "{}", self.0),
        }
    }
}

impl ToSql for JulianDate {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for JulianDate {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        f64::column_result(value).map(JulianDate)
    }
}
