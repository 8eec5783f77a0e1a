use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::error::ConfigError;
use crate::models::Milestone;

/// School-year calendar. Weekends are the only non-school days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchoolCalendar {
    start: NaiveDate,
    end: NaiveDate,
}

fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Weekdays in `[from, to]`, zero when the range is empty.
fn weekdays_inclusive(from: NaiveDate, to: NaiveDate) -> u32 {
    if to < from {
        return 0;
    }
    let span = (to - from).num_days() + 1;
    let full_weeks = span / 7;
    let mut count = full_weeks * 5;
    for offset in full_weeks * 7..span {
        if is_weekday(from + Duration::days(offset)) {
            count += 1;
        }
    }
    count as u32
}

impl SchoolCalendar {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ConfigError> {
        if end < start {
            return Err(ConfigError::Invalid(format!(
                "school year ends ({end}) before it starts ({start})"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn is_school_day(&self, date: NaiveDate) -> bool {
        self.contains(date) && is_weekday(date)
    }

    pub fn school_days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start
            .iter_days()
            .take_while(move |d| *d <= self.end)
            .filter(|d| is_weekday(*d))
    }

    /// Weekdays from the first day of school through `as_of`, clamped to the
    /// school year.
    pub fn school_days_elapsed(&self, as_of: NaiveDate) -> u32 {
        if as_of < self.start {
            return 0;
        }
        weekdays_inclusive(self.start, as_of.min(self.end))
    }

    pub fn total_school_days(&self) -> u32 {
        weekdays_inclusive(self.start, self.end)
    }

    pub fn is_at_milestone(&self, as_of: NaiveDate, milestone: Milestone) -> bool {
        self.school_days_elapsed(as_of) >= milestone.days()
    }

    /// The school day on which `milestone` is reached, if the year is long enough.
    pub fn milestone_date(&self, milestone: Milestone) -> Option<NaiveDate> {
        self.school_days().nth(milestone.days() as usize - 1)
    }

    /// Largest milestone reached by `as_of` that still needs an assessment.
    /// Nothing is due once that milestone, or a later one, is in `certified`.
    pub fn due_milestone(&self, as_of: NaiveDate, certified: &[Milestone]) -> Option<Milestone> {
        let reached = Milestone::ALL
            .into_iter()
            .filter(|m| self.is_at_milestone(as_of, *m))
            .max()?;
        if certified.iter().any(|c| *c >= reached) {
            return None;
        }
        Some(reached)
    }
}
