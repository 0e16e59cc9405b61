//! Time-window filtering of the records list.

use crate::types::{Record, Timestamp};
use chrono::{DateTime, Days, Months, Utc};

/// Window of recent records to show.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RecordFilter {
    #[default]
    All,
    Day,
    Week,
    Month,
    Year,
}

impl RecordFilter {
    pub const ALL: [RecordFilter; 5] = [
        RecordFilter::All,
        RecordFilter::Day,
        RecordFilter::Week,
        RecordFilter::Month,
        RecordFilter::Year,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RecordFilter::All => "All",
            RecordFilter::Day => "Day",
            RecordFilter::Week => "Week",
            RecordFilter::Month => "Month",
            RecordFilter::Year => "Year",
        }
    }

    /// Oldest instant excluded by this filter, one calendar unit before
    /// `now`. `None` for [`RecordFilter::All`].
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            RecordFilter::All => None,
            RecordFilter::Day => now.checked_sub_days(Days::new(1)),
            RecordFilter::Week => now.checked_sub_days(Days::new(7)),
            RecordFilter::Month => now.checked_sub_months(Months::new(1)),
            RecordFilter::Year => now.checked_sub_months(Months::new(12)),
        }
    }

    /// Whether `record` falls strictly after the cutoff. Records still
    /// waiting for a server timestamp are treated as current.
    pub fn matches(&self, record: &Record, now: DateTime<Utc>) -> bool {
        let Some(cutoff) = self.cutoff(now) else {
            return true;
        };
        let at = record.timestamp.and_then(Timestamp::to_datetime).unwrap_or(now);
        at > cutoff
    }

    /// Filter `records`, preserving order.
    pub fn apply<'a>(&self, records: &'a [Record], now: DateTime<Utc>) -> Vec<&'a Record> {
        records.iter().filter(|r| self.matches(r, now)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(dt: DateTime<Utc>) -> Record {
        Record {
            timestamp: Some(Timestamp::from_datetime(dt)),
            ..Default::default()
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_day_boundary_is_exclusive() {
        let now = now();
        let exactly = at(now - Duration::days(1));
        let inside = at(now - Duration::days(1) + Duration::seconds(1));

        assert!(!RecordFilter::Day.matches(&exactly, now));
        assert!(RecordFilter::Day.matches(&inside, now));
    }

    #[test]
    fn test_month_uses_calendar_months() {
        // March 31 minus one month clamps to February 29 in a leap year
        let cutoff = RecordFilter::Month.cutoff(now()).unwrap();
        assert_eq!(cutoff, Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap());

        let cutoff = RecordFilter::Year.cutoff(now()).unwrap();
        assert_eq!(cutoff, Utc.with_ymd_and_hms(2023, 3, 31, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_apply_keeps_order_and_pending() {
        let now = now();
        let records = vec![
            Record::default(),
            at(now - Duration::hours(2)),
            at(now - Duration::days(3)),
            at(now - Duration::days(40)),
        ];

        assert_eq!(RecordFilter::All.apply(&records, now).len(), 4);
        assert_eq!(RecordFilter::Day.apply(&records, now).len(), 2);
        assert_eq!(RecordFilter::Week.apply(&records, now).len(), 3);
        assert_eq!(RecordFilter::Month.apply(&records, now).len(), 3);
        assert_eq!(RecordFilter::Year.apply(&records, now).len(), 4);

        let week = RecordFilter::Week.apply(&records, now);
        assert!(week[0].timestamp.is_none());
    }
}
