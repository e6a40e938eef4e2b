//! Daily totals derived from the log.
//!
//! An entry belongs to the calendar day in the leading `YYYY-MM-DD` of its own
//! timestamp. Nothing here mutates the log.

use chrono::{Days, NaiveDate};

use crate::models::{DailyLogEntry, DailyTotals, DayTotals, GoalProgress, Goals, MacroProgress};

#[must_use]
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Entries recorded on `date`, in log order.
pub fn entries_for_date(log: &[DailyLogEntry], date: NaiveDate) -> Vec<&DailyLogEntry> {
    let prefix = date_key(date);
    log.iter()
        .filter(|entry| entry.timestamp.starts_with(&prefix))
        .collect()
}

#[must_use]
pub fn daily_totals(log: &[DailyLogEntry], date: NaiveDate) -> DailyTotals {
    entries_for_date(log, date)
        .into_iter()
        .fold(DailyTotals::default(), |mut totals, entry| {
            totals.add_entry(entry);
            totals
        })
}

#[must_use]
pub fn progress(totals: &DailyTotals, goals: &Goals) -> GoalProgress {
    GoalProgress {
        calories: MacroProgress::new(totals.calories, goals.calories),
        protein: MacroProgress::new(totals.protein, goals.protein),
        carbs: MacroProgress::new(totals.carbs, goals.carbs),
        fat: MacroProgress::new(totals.fat, goals.fat),
    }
}

/// Totals for `today` and the `days - 1` dates before it, newest first.
#[must_use]
pub fn history(log: &[DailyLogEntry], today: NaiveDate, days: u32) -> Vec<DayTotals> {
    (0..u64::from(days))
        .map_while(|offset| today.checked_sub_days(Days::new(offset)))
        .map(|date| DayTotals {
            date: date_key(date),
            totals: daily_totals(log, date),
        })
        .collect()
}
