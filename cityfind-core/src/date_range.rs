//! The (start, end) pair driving weather fetches and chart filtering.

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Start date {start} is after end date {end}")]
pub struct RangeError {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Inclusive calendar-date range. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub const DEFAULT_SPAN_DAYS: u64 = 7;

    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, RangeError> {
        if start > end {
            return Err(RangeError { start, end });
        }
        Ok(Self { start, end })
    }

    /// `[today, today + 7 days]`.
    pub fn week_from(today: NaiveDate) -> Self {
        let end = today.checked_add_days(Days::new(Self::DEFAULT_SPAN_DAYS)).unwrap_or(NaiveDate::MAX);
        Self { start: today, end }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Timestamp bounds covering every instant of both end days.
    pub fn window(&self) -> (NaiveDateTime, NaiveDateTime) {
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        (self.start.and_time(NaiveTime::MIN), self.end.and_time(end_of_day))
    }

    /// Bounds the two pickers must respect.
    pub fn bounds(&self) -> PickerBounds {
        PickerBounds { start_max: self.end, end_min: self.start }
    }

    /// Apply a selector event and report whether the range moved.
    pub fn apply(self, event: RangeEvent) -> Transition {
        let next = match event {
            RangeEvent::SetStart(date) => Self { start: date.min(self.end), end: self.end },
            RangeEvent::SetEnd(date) => Self { start: self.start, end: date.max(self.start) },
            RangeEvent::Reset { today } => Self::week_from(today),
        };

        Transition { range: next, changed: next != self }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeEvent {
    SetStart(NaiveDate),
    SetEnd(NaiveDate),
    Reset { today: NaiveDate },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickerBounds {
    pub start_max: NaiveDate,
    pub end_min: NaiveDate,
}

/// Result of a selector event. A changed range means the forecast must be
/// fetched again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub range: DateRange,
    pub changed: bool,
}
