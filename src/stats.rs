use crate::models::DailyStat;
use chrono::{Datelike, Days, Months, NaiveDate};
use std::{collections::BTreeMap, str::FromStr};

/// How sparse counts are keyed when joined onto the dense date list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DayBucketing {
    /// Each count belongs to exactly one calendar date.
    #[default]
    CalendarDate,
    /// Counts are keyed by day-of-month only, so e.g. Feb 10 and Mar 10 share
    /// one bucket and both dates report the combined amount. Kept for
    /// compatibility with charts produced by the older stats endpoints.
    DayOfMonth,
}

impl FromStr for DayBucketing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "date" => Ok(DayBucketing::CalendarDate),
            "day_of_month" => Ok(DayBucketing::DayOfMonth),
            other => Err(format!(
                "unknown day bucketing {other:?}, expected 'date' or 'day_of_month'"
            )),
        }
    }
}

/// First date of the trailing window ending on `as_of`: the same day number one
/// month earlier. Day numbers past the end of that month roll forward, so
/// 2024-03-31 starts on 2024-03-02.
pub fn window_start(as_of: NaiveDate) -> Option<NaiveDate> {
    let first_of_previous = as_of.with_day(1)?.checked_sub_months(Months::new(1))?;
    first_of_previous.checked_add_days(Days::new(u64::from(as_of.day0())))
}

pub fn days_in_window(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |date| *date <= end)
}

/// Left-joins `sparse` onto every date in `[start, end]`, defaulting to zero.
pub fn merge_daily(
    start: NaiveDate,
    end: NaiveDate,
    sparse: &BTreeMap<NaiveDate, u64>,
    bucketing: DayBucketing,
) -> Vec<DailyStat> {
    let by_day_of_month = match bucketing {
        DayBucketing::CalendarDate => BTreeMap::new(),
        DayBucketing::DayOfMonth => {
            let mut buckets = BTreeMap::new();
            for (date, count) in sparse {
                let entry = buckets.entry(date.day()).or_insert(0u64);
                *entry = entry.saturating_add(*count);
            }
            buckets
        }
    };

    days_in_window(start, end)
        .map(|date| {
            let amount = match bucketing {
                DayBucketing::CalendarDate => sparse.get(&date),
                DayBucketing::DayOfMonth => by_day_of_month.get(&date.day()),
            };
            DailyStat {
                month: date.month(),
                day: date.day(),
                amount: amount.copied().unwrap_or_default(),
            }
        })
        .collect()
}
