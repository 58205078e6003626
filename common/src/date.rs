//! Calendar [`Date`] utilities.

#[cfg(feature = "postgres")]
use std::error::Error as StdError;
use std::{fmt, iter, str::FromStr};

use derive_more::{Display, Error};
#[cfg(feature = "postgres")]
use postgres_types::{
    accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql, Type,
};

/// Calendar date (without any time or time zone).
///
/// Nights of a stay are identified by the [`Date`] they begin on.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Date(time::Date);

impl Date {
    /// Creates a new [`Date`] from the provided calendar components.
    ///
    /// [`None`] is returned if the components don't form a valid date.
    #[must_use]
    pub fn from_ymd(year: i32, month: u8, day: u8) -> Option<Self> {
        let month = time::Month::try_from(month).ok()?;
        time::Date::from_calendar_date(year, month, day)
            .ok()
            .map(Self)
    }

    /// Returns the current [`Date`] in UTC.
    #[must_use]
    pub fn today() -> Self {
        Self(time::OffsetDateTime::now_utc().date())
    }

    /// Returns the [`Date`] following this one.
    ///
    /// [`None`] is returned on the calendar overflow.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        self.0.next_day().map(Self)
    }

    /// Returns the number of days from this [`Date`] until the `other` one.
    ///
    /// Negative if the `other` [`Date`] is before this one.
    #[must_use]
    pub fn days_until(self, other: Self) -> i64 {
        (other.0 - self.0).whole_days()
    }

    /// Iterates over all the [`Date`]s from this one (inclusive) until the
    /// `end` one (exclusive).
    pub fn until(self, end: Self) -> impl Iterator<Item = Self> {
        iter::successors(Some(self), |d| d.next()).take_while(move |d| *d < end)
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.0.year(),
            u8::from(self.0.month()),
            self.0.day(),
        )
    }
}

impl FromStr for Date {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '-');
        let (Some(year), Some(month), Some(day)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(ParseError);
        };
        if month.len() != 2 || day.len() != 2 {
            return Err(ParseError);
        }

        Self::from_ymd(
            year.parse().map_err(|_| ParseError)?,
            month.parse().map_err(|_| ParseError)?,
            day.parse().map_err(|_| ParseError)?,
        )
        .ok_or(ParseError)
    }
}

/// Error of parsing a [`Date`] from a `YYYY-MM-DD` string.
#[derive(Clone, Copy, Debug, Display, Eq, Error, PartialEq)]
#[display("invalid `Date`, expected `YYYY-MM-DD` format")]
pub struct ParseError;

impl From<time::Date> for Date {
    fn from(date: time::Date) -> Self {
        Self(date)
    }
}

impl From<Date> for time::Date {
    fn from(date: Date) -> Self {
        date.0
    }
}

#[cfg(feature = "postgres")]
impl FromSql<'_> for Date {
    accepts!(DATE);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        time::Date::from_sql(ty, raw).map(Self)
    }
}

#[cfg(feature = "postgres")]
impl ToSql for Date {
    accepts!(DATE);
    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        w: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.0.to_sql(ty, w)
    }
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use super::Date;

    fn date(s: &str) -> Date {
        Date::from_str(s).unwrap()
    }

    #[test]
    fn parses_and_formats() {
        assert_eq!(date("2024-06-01"), Date::from_ymd(2024, 6, 1).unwrap());
        assert_eq!(date("2024-06-01").to_string(), "2024-06-01");
        assert_eq!(date("0999-01-09").to_string(), "0999-01-09");

        assert!(Date::from_str("2024-6-01").is_err());
        assert!(Date::from_str("2024-02-30").is_err());
        assert!(Date::from_str("2024/06/01").is_err());
        assert!(Date::from_str("").is_err());
    }

    #[test]
    fn iterates_nights() {
        let nights = date("2024-06-30")
            .until(date("2024-07-02"))
            .map(|d| d.to_string())
            .collect::<Vec<_>>();
        assert_eq!(nights, ["2024-06-30", "2024-07-01"]);

        assert_eq!(date("2024-06-01").until(date("2024-06-01")).count(), 0);
        assert_eq!(date("2024-06-02").until(date("2024-06-01")).count(), 0);
    }

    #[test]
    fn counts_days() {
        assert_eq!(date("2024-02-28").days_until(date("2024-03-01")), 2);
        assert_eq!(date("2024-03-01").days_until(date("2024-02-28")), -2);
    }
}
