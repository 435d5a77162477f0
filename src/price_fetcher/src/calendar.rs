//! Trading-day filter: `closed(date) = weekend(date) || holiday(date)`.
//!
//! Holidays come either from the NYSE rules computed per year (with the
//! exchange's weekend-observance conventions and the known unscheduled
//! closures) or from an explicit list read once at startup.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Days, NaiveDate, Weekday};
use thiserror::Error;

/// Full-day closures outside the regular holiday rules.
const SPECIAL_CLOSURES: [(i32, u32, u32); 10] = [
    (2001, 9, 11),
    (2001, 9, 12),
    (2001, 9, 13),
    (2001, 9, 14),
    (2004, 6, 11),
    (2007, 1, 2),
    (2012, 10, 29),
    (2012, 10, 30),
    (2018, 12, 5),
    (2025, 1, 9),
];

/// Failures loading an explicit holiday list. Fatal at startup.
#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("cannot read holiday file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("holiday file line {line}: `{value}` is not a YYYY-MM-DD date")]
    Parse { line: usize, value: String },
}

#[derive(Debug, Clone)]
enum HolidaySource {
    Nyse,
    Listed(BTreeSet<NaiveDate>),
}

/// Answers "is the market closed on this date". Pure; never fails per call.
#[derive(Debug, Clone)]
pub struct TradingCalendar {
    holidays: HolidaySource,
}

impl Default for TradingCalendar {
    fn default() -> Self {
        Self::nyse()
    }
}

impl TradingCalendar {
    /// Holidays computed from NYSE rules.
    pub fn nyse() -> Self {
        Self {
            holidays: HolidaySource::Nyse,
        }
    }

    /// Exactly these holidays (weekends are always closed).
    pub fn from_dates(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            holidays: HolidaySource::Listed(dates.into_iter().collect()),
        }
    }

    /// Read a holiday list: one `YYYY-MM-DD` per line, blank lines and `#`
    /// comments ignored.
    pub fn from_file(path: &Path) -> Result<Self, CalendarError> {
        let text = std::fs::read_to_string(path).map_err(|source| CalendarError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_dates(parse_holiday_list(&text)?))
    }

    /// The NYSE calendar, or the list at `path` when one is configured.
    pub fn from_optional_file(path: Option<&Path>) -> Result<Self, CalendarError> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::nyse()),
        }
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        match &self.holidays {
            HolidaySource::Nyse => nyse_holidays(date.year()).contains(&date),
            HolidaySource::Listed(set) => set.contains(&date),
        }
    }

    pub fn is_market_closed(&self, date: NaiveDate) -> bool {
        is_weekend(date) || self.is_holiday(date)
    }
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn parse_holiday_list(text: &str) -> Result<Vec<NaiveDate>, CalendarError> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.split('#').next().unwrap_or("").trim()))
        .filter(|(_, line)| !line.is_empty())
        .map(|(line, value)| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| CalendarError::Parse {
                line,
                value: value.to_string(),
            })
        })
        .collect()
}

fn ymd(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Saturday holidays move to Friday, Sunday holidays to Monday.
fn observed(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Days::new(1),
        Weekday::Sun => date + Days::new(1),
        _ => date,
    }
}

fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
}

fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    nth_weekday(year, month, weekday, 5).or_else(|| nth_weekday(year, month, weekday, 4))
}

/// Western Easter Sunday (anonymous Gregorian algorithm).
fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    ymd(year, month as u32, day as u32)
}

/// NYSE full-day closures in `year`, as observed.
pub fn nyse_holidays(year: i32) -> BTreeSet<NaiveDate> {
    let mut days = BTreeSet::new();

    // New Year's Day: a Saturday holiday is not moved back into December.
    if let Some(d) = ymd(year, 1, 1) {
        if d.weekday() != Weekday::Sat {
            days.insert(observed(d));
        }
    }

    days.extend(nth_weekday(year, 1, Weekday::Mon, 3)); // Martin Luther King Jr. Day
    days.extend(nth_weekday(year, 2, Weekday::Mon, 3)); // Washington's Birthday
    days.extend(easter_sunday(year).map(|e| e - Days::new(2))); // Good Friday
    days.extend(last_weekday(year, 5, Weekday::Mon)); // Memorial Day
    if year >= 2022 {
        days.extend(ymd(year, 6, 19).map(observed)); // Juneteenth
    }
    days.extend(ymd(year, 7, 4).map(observed));
    days.extend(nth_weekday(year, 9, Weekday::Mon, 1)); // Labor Day
    days.extend(nth_weekday(year, 11, Weekday::Thu, 4)); // Thanksgiving
    days.extend(ymd(year, 12, 25).map(observed));

    days.extend(
        SPECIAL_CLOSURES
            .iter()
            .filter(|(y, _, _)| *y == year)
            .filter_map(|&(y, m, d)| ymd(y, m, d)),
    );
    days
}
