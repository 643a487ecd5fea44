//! Working-day calendar: weekends plus a holiday set.
//!
//! All searches are bounded. A calendar where no working day can be found
//! within `max_search_days` consecutive days is degenerate and reported as
//! [`CalendarError::RangeExceeded`] instead of looping or clamping.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use rustc_hash::FxHashSet;
use thiserror::Error;

/// Default cap on consecutive non-working days crossed by a single search.
pub const DEFAULT_SEARCH_LIMIT_DAYS: u32 = 1000;

/// Errors from calendar arithmetic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("No working day found within {limit} days of {from}")]
    RangeExceeded { from: NaiveDate, limit: u32 },
    #[error("Date arithmetic left the supported range at {from}")]
    OutOfRange { from: NaiveDate },
}

/// Immutable working-day calendar (Saturday/Sunday weekend + holidays).
#[derive(Clone, Debug)]
pub struct WorkingDayCalendar {
    holidays: FxHashSet<NaiveDate>,
    max_search_days: u32,
}

impl Default for WorkingDayCalendar {
    fn default() -> Self {
        Self::new(std::iter::empty())
    }
}

impl WorkingDayCalendar {
    /// Create a calendar with the default search limit.
    pub fn new(holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self::with_search_limit(holidays, DEFAULT_SEARCH_LIMIT_DAYS)
    }

    /// Create a calendar with an explicit search limit (at least 1 day).
    pub fn with_search_limit(holidays: impl IntoIterator<Item = NaiveDate>, limit: u32) -> Self {
        Self {
            holidays: holidays.into_iter().collect(),
            max_search_days: limit.max(1),
        }
    }

    /// Parse ISO `YYYY-MM-DD` holiday strings.
    ///
    /// Entries that do not parse are left out and returned alongside the
    /// calendar so the caller can report them.
    pub fn from_iso_strings(holidays: &[String], limit: u32) -> (Self, Vec<String>) {
        let mut parsed = Vec::with_capacity(holidays.len());
        let mut rejected = Vec::new();
        for raw in holidays {
            match parse_iso_date(raw) {
                Some(date) => parsed.push(date),
                None => rejected.push(raw.clone()),
            }
        }
        (Self::with_search_limit(parsed, limit), rejected)
    }

    pub fn holiday_count(&self) -> usize {
        self.holidays.len()
    }

    pub fn max_search_days(&self) -> u32 {
        self.max_search_days
    }

    /// A working day is neither Saturday, Sunday nor a holiday.
    #[inline]
    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.holidays.contains(&date)
    }

    /// String form of [`is_working_day`](Self::is_working_day); anything that
    /// is not a valid ISO date counts as a non-working day.
    pub fn is_working_day_str(&self, date: &str) -> bool {
        parse_iso_date(date).is_some_and(|d| self.is_working_day(d))
    }

    /// First working day strictly after `date`.
    pub fn next_working_day(&self, date: NaiveDate) -> Result<NaiveDate, CalendarError> {
        self.search(date, Direction::Forward)
    }

    /// First working day strictly before `date`.
    pub fn previous_working_day(&self, date: NaiveDate) -> Result<NaiveDate, CalendarError> {
        self.search(date, Direction::Backward)
    }

    /// `date` itself if it is a working day, otherwise the next one.
    pub fn snap_forward(&self, date: NaiveDate) -> Result<NaiveDate, CalendarError> {
        if self.is_working_day(date) {
            Ok(date)
        } else {
            self.next_working_day(date)
        }
    }

    /// `date` itself if it is a working day, otherwise the previous one.
    pub fn snap_backward(&self, date: NaiveDate) -> Result<NaiveDate, CalendarError> {
        if self.is_working_day(date) {
            Ok(date)
        } else {
            self.previous_working_day(date)
        }
    }

    /// End date of a span of `n` working days beginning at `start`.
    ///
    /// `start` counts as day 1 when it is a working day, so `n = 1` on a
    /// working day returns `start`. `n = 0` returns `start` unchanged.
    pub fn add_working_days(&self, start: NaiveDate, n: u32) -> Result<NaiveDate, CalendarError> {
        if n == 0 {
            return Ok(start);
        }
        let mut current = self.snap_forward(start)?;
        for _ in 1..n {
            current = self.next_working_day(current)?;
        }
        Ok(current)
    }

    /// Start date of a span of `n` working days ending at `end`.
    ///
    /// Mirror image of [`add_working_days`](Self::add_working_days).
    pub fn subtract_working_days(
        &self,
        end: NaiveDate,
        n: u32,
    ) -> Result<NaiveDate, CalendarError> {
        if n == 0 {
            return Ok(end);
        }
        let mut current = self.snap_backward(end)?;
        for _ in 1..n {
            current = self.previous_working_day(current)?;
        }
        Ok(current)
    }

    /// The working day `k` positions after `base`, where `base` (snapped
    /// forward) is position 0.
    pub fn working_day_index(&self, base: NaiveDate, k: u32) -> Result<NaiveDate, CalendarError> {
        self.add_working_days(base, k + 1)
    }

    /// Working days in `(a, b]`; negated count of `(b, a]` when `b < a`.
    pub fn count_working_days(&self, a: NaiveDate, b: NaiveDate) -> i64 {
        if b < a {
            return -self.count_working_days(b, a);
        }
        a.iter_days()
            .skip(1)
            .take_while(|d| *d <= b)
            .filter(|d| self.is_working_day(*d))
            .count() as i64
    }

    fn search(&self, from: NaiveDate, direction: Direction) -> Result<NaiveDate, CalendarError> {
        let mut candidate = from;
        for _ in 0..self.max_search_days {
            candidate = match direction {
                Direction::Forward => candidate.checked_add_days(Days::new(1)),
                Direction::Backward => candidate.checked_sub_days(Days::new(1)),
            }
            .ok_or(CalendarError::OutOfRange { from })?;
            if self.is_working_day(candidate) {
                return Ok(candidate);
            }
        }
        Err(CalendarError::RangeExceeded {
            from,
            limit: self.max_search_days,
        })
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

/// Parse a strict ISO `YYYY-MM-DD` date.
pub fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}
