use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// The UTC interval covered by one report date.
///
/// `start` is inclusive, `end` exclusive. Both are midnight in the offset
/// the window was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportWindow {
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportWindow {
    #[must_use]
    pub fn for_date(date: NaiveDate, offset: FixedOffset) -> Self {
        let local_midnight = date.and_time(NaiveTime::MIN);
        let start = (local_midnight - TimeDelta::seconds(i64::from(offset.local_minus_utc())))
            .and_utc();
        let end = start + TimeDelta::days(1);
        Self { date, start, end }
    }

    #[must_use]
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

/// The calendar date before `now`, as seen in `offset`.
#[must_use]
pub fn previous_day(now: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    let today = now.with_timezone(&offset).date_naive();
    today.checked_sub_days(Days::new(1)).unwrap_or(today)
}
