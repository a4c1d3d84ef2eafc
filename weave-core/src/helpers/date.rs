//! Date arithmetic.
//!
//! Shifting a date normalizes overflow the way a calendar constructor does:
//! a month shift keeps the day of month and rolls any excess into the next
//! month, so January 31 plus one month is March 3 in a non-leap year.

use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta};

use super::expect_kind;
use crate::error::{Error, Result};
use crate::reactive::State;
use crate::value::{Value, ValueKind};

/// Unit of a date shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateUnit {
    Year,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
    Milli,
}

impl FromStr for DateUnit {
    type Err = Error;

    /// Accepts the long names and the short forms `Y M W D h m s ms`.
    fn from_str(s: &str) -> Result<Self> {
        let unit = match s {
            "Y" | "year" => DateUnit::Year,
            "M" | "month" => DateUnit::Month,
            "W" | "week" => DateUnit::Week,
            "D" | "day" => DateUnit::Day,
            "h" | "hour" => DateUnit::Hour,
            "m" | "minute" => DateUnit::Minute,
            "s" | "second" => DateUnit::Second,
            "ms" | "milli" => DateUnit::Milli,
            other => {
                return Err(Error::InvalidDateModifier {
                    modifier: other.to_string(),
                })
            }
        };
        Ok(unit)
    }
}

/// Shift `date` by `amount` units.
pub fn shift_date(date: NaiveDateTime, amount: i64, unit: DateUnit) -> Result<NaiveDateTime> {
    let delta = match unit {
        DateUnit::Year => {
            let months = amount.checked_mul(12).ok_or(Error::DateOutOfRange)?;
            return add_months(date, months);
        }
        DateUnit::Month => return add_months(date, amount),
        DateUnit::Week => TimeDelta::try_weeks(amount),
        DateUnit::Day => TimeDelta::try_days(amount),
        DateUnit::Hour => TimeDelta::try_hours(amount),
        DateUnit::Minute => TimeDelta::try_minutes(amount),
        DateUnit::Second => TimeDelta::try_seconds(amount),
        DateUnit::Milli => TimeDelta::try_milliseconds(amount),
    };
    delta
        .and_then(|delta| date.checked_add_signed(delta))
        .ok_or(Error::DateOutOfRange)
}

fn add_months(date: NaiveDateTime, months: i64) -> Result<NaiveDateTime> {
    let total = (i64::from(date.year()) * 12 + i64::from(date.month0()))
        .checked_add(months)
        .ok_or(Error::DateOutOfRange)?;
    let year = i32::try_from(total.div_euclid(12)).map_err(|_| Error::DateOutOfRange)?;
    let month = total.rem_euclid(12) as u32 + 1;

    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or(Error::DateOutOfRange)?;
    TimeDelta::try_days(i64::from(date.day0()))
        .and_then(|days| first.and_time(date.time()).checked_add_signed(days))
        .ok_or(Error::DateOutOfRange)
}

pub trait DateOps {
    /// Shift the date by `amount` of `unit` (for example `"D"` or `"month"`).
    fn add_duration(&self, amount: i64, unit: &str) -> Result<&Self>;

    /// Apply several shifts in order as one write.
    fn add_durations(&self, steps: &[(i64, &str)]) -> Result<&Self>;
}

impl DateOps for State {
    fn add_duration(&self, amount: i64, unit: &str) -> Result<&Self> {
        self.add_durations(&[(amount, unit)])
    }

    fn add_durations(&self, steps: &[(i64, &str)]) -> Result<&Self> {
        let steps = steps
            .iter()
            .map(|&(amount, unit)| Ok((amount, unit.parse::<DateUnit>()?)))
            .collect::<Result<Vec<_>>>()?;

        self.try_mutate(|value| {
            expect_kind(&value, ValueKind::Date)?;
            let start = value.as_date().ok_or(Error::DateOutOfRange)?;
            let shifted = steps
                .iter()
                .try_fold(start, |date, &(amount, unit)| shift_date(date, amount, unit))?;
            Ok(Value::from(shifted))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Store;

    fn at(year: i32, month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(10, 30, 0))
            .unwrap()
    }

    #[test]
    fn units_parse_from_short_and_long_names() {
        assert_eq!("D".parse::<DateUnit>(), Ok(DateUnit::Day));
        assert_eq!("minute".parse::<DateUnit>(), Ok(DateUnit::Minute));
        assert_eq!("ms".parse::<DateUnit>(), Ok(DateUnit::Milli));
        assert_eq!(
            "fortnight".parse::<DateUnit>(),
            Err(Error::InvalidDateModifier {
                modifier: "fortnight".to_string()
            })
        );
    }

    #[test]
    fn month_overflow_rolls_forward() {
        assert_eq!(shift_date(at(2019, 1, 31), 1, DateUnit::Month), Ok(at(2019, 3, 3)));
        assert_eq!(shift_date(at(2020, 1, 31), 1, DateUnit::Month), Ok(at(2020, 3, 2)));
        assert_eq!(shift_date(at(2019, 3, 15), -3, DateUnit::Month), Ok(at(2018, 12, 15)));
        assert_eq!(shift_date(at(2020, 2, 29), 1, DateUnit::Year), Ok(at(2021, 3, 1)));
    }

    #[test]
    fn fixed_units_add_exact_durations() {
        assert_eq!(shift_date(at(2019, 12, 30), 1, DateUnit::Week), Ok(at(2020, 1, 6)));
        assert_eq!(
            shift_date(at(2019, 1, 1), 14, DateUnit::Hour),
            Ok(at(2019, 1, 2) - TimeDelta::hours(10))
        );
    }

    #[test]
    fn cell_shifts_in_one_write() {
        let store = Store::new();
        let date = store.state(at(2019, 1, 1));

        date.add_durations(&[(1, "Y"), (2, "M"), (3, "D")]).unwrap();
        assert_eq!(date.get().as_date(), Some(at(2020, 3, 4)));
    }

    #[test]
    fn invalid_unit_leaves_the_cell_alone() {
        let store = Store::new();
        let date = store.state(at(2019, 1, 1));

        let result = date.add_durations(&[(1, "D"), (1, "decade")]);
        assert_eq!(
            result.err(),
            Some(Error::InvalidDateModifier {
                modifier: "decade".to_string()
            })
        );
        assert_eq!(date.get().as_date(), Some(at(2019, 1, 1)));
    }

    #[test]
    fn non_date_is_a_kind_mismatch() {
        let store = Store::new();
        let number = store.state(1);

        assert_eq!(
            number.add_duration(1, "D").err(),
            Some(Error::kind_mismatch(ValueKind::Date, ValueKind::Number))
        );
    }
}
