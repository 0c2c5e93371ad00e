//! Service calendar for determining when trips run.
//!
//! Implements GTFS calendar.txt and calendar_dates.txt logic, and the enumerated
//! form ([`CalendarServiceData`]) the index is built from.

use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use crate::identifiers::ServiceId;

/// Determines which days a transit service operates
#[derive(Clone, Debug)]
pub struct ServiceCalendar {
    pub service_id: ServiceId,

    // Regular schedule
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub weekdays: WeekdayFlags,

    // Exception dates
    pub added_dates: Arc<HashSet<NaiveDate>>,   // Service runs on these dates
    pub removed_dates: Arc<HashSet<NaiveDate>>, // Service does not run on these dates
}

/// Compact representation of which weekdays a service runs
#[derive(Clone, Copy, Debug, Default)]
pub struct WeekdayFlags {
    pub(crate) flags: u8,
}

impl WeekdayFlags {
    pub fn new() -> Self {
        Self { flags: 0 }
    }

    pub fn all() -> Self {
        Self::from_bools(true, true, true, true, true, true, true)
    }

    pub fn set(&mut self, weekday: Weekday) {
        self.flags |= 1 << weekday.number_from_monday();
    }

    pub fn unset(&mut self, weekday: Weekday) {
        self.flags &= !(1 << weekday.number_from_monday());
    }

    pub fn contains(&self, weekday: Weekday) -> bool {
        (self.flags & (1 << weekday.number_from_monday())) != 0
    }

    pub fn from_bools(mon: bool, tue: bool, wed: bool, thu: bool, fri: bool, sat: bool, sun: bool) -> Self {
        let mut flags = Self::new();
        if mon { flags.set(Weekday::Mon); }
        if tue { flags.set(Weekday::Tue); }
        if wed { flags.set(Weekday::Wed); }
        if thu { flags.set(Weekday::Thu); }
        if fri { flags.set(Weekday::Fri); }
        if sat { flags.set(Weekday::Sat); }
        if sun { flags.set(Weekday::Sun); }
        flags
    }
}

impl ServiceCalendar {
    /// Check if the service runs on a given date
    pub fn runs_on(&self, date: NaiveDate) -> bool {
        // Check explicit additions first
        if self.added_dates.contains(&date) {
            return true;
        }

        // Check explicit removals
        if self.removed_dates.contains(&date) {
            return false;
        }

        // Check regular schedule
        if date < self.start_date || date > self.end_date {
            return false;
        }

        self.weekdays.contains(date.weekday())
    }

    /// Every date the service runs on, ascending.
    pub fn service_dates(&self) -> Vec<NaiveDate> {
        let mut dates: BTreeSet<NaiveDate> = self
            .start_date
            .iter_days()
            .take_while(|d| *d <= self.end_date)
            .filter(|d| self.runs_on(*d))
            .collect();
        dates.extend(self.added_dates.iter().copied());
        dates.into_iter().collect()
    }
}

// ============================================================================
// Enumerated calendar data
// ============================================================================

/// Active dates per service-id, as handed over by the calendar service.
///
/// Dates are kept sorted and deduplicated per service.
#[derive(Clone, Debug, Default)]
pub struct CalendarServiceData {
    dates_by_service: HashMap<ServiceId, Vec<NaiveDate>>,
}

impl CalendarServiceData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enumerate a calendar and record its dates.
    pub fn add_calendar(&mut self, calendar: &ServiceCalendar) {
        self.add_service_dates(calendar.service_id.clone(), calendar.service_dates());
    }

    pub fn add_service_dates(&mut self, service_id: ServiceId, dates: impl IntoIterator<Item = NaiveDate>) {
        let entry = self.dates_by_service.entry(service_id).or_default();
        entry.extend(dates);
        entry.sort_unstable();
        entry.dedup();
    }

    pub fn merge(&mut self, other: CalendarServiceData) {
        for (service_id, dates) in other.dates_by_service {
            self.add_service_dates(service_id, dates);
        }
    }

    pub fn service_ids(&self) -> impl Iterator<Item = &ServiceId> {
        self.dates_by_service.keys()
    }

    pub fn service_dates_for(&self, service_id: &ServiceId) -> &[NaiveDate] {
        self.dates_by_service
            .get(service_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Last date the service runs on, if any.
    pub fn last_service_date(&self, service_id: &ServiceId) -> Option<NaiveDate> {
        self.service_dates_for(service_id).last().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.dates_by_service.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn weekday_calendar() -> ServiceCalendar {
        ServiceCalendar {
            service_id: ServiceId::new("weekday"),
            start_date: date(2024, 1, 1),
            end_date: date(2024, 12, 31),
            weekdays: WeekdayFlags::from_bools(true, true, true, true, true, false, false),
            added_dates: Arc::new(HashSet::from([
                date(2024, 7, 4), // Add July 4th (Thursday)
            ])),
            removed_dates: Arc::new(HashSet::from([
                date(2024, 1, 1), // Remove New Year's Day (Monday)
            ])),
        }
    }

    #[test]
    fn test_weekday_flags() {
        let mut flags = WeekdayFlags::new();
        flags.set(Weekday::Mon);
        flags.set(Weekday::Wed);
        flags.set(Weekday::Fri);

        assert!(flags.contains(Weekday::Mon));
        assert!(!flags.contains(Weekday::Tue));
        assert!(flags.contains(Weekday::Wed));

        flags.unset(Weekday::Wed);
        assert!(!flags.contains(Weekday::Wed));
    }

    #[test]
    fn test_service_calendar() {
        let calendar = weekday_calendar();

        // Regular weekday
        assert!(calendar.runs_on(date(2024, 1, 2))); // Tuesday

        // Weekend
        assert!(!calendar.runs_on(date(2024, 1, 6))); // Saturday

        // Removed date
        assert!(!calendar.runs_on(date(2024, 1, 1))); // Monday but removed

        // Added date
        assert!(calendar.runs_on(date(2024, 7, 4))); // Thursday and added

        // Out of range
        assert!(!calendar.runs_on(date(2025, 1, 1)));
    }

    #[test]
    fn test_service_dates_enumeration() {
        let calendar = ServiceCalendar {
            service_id: ServiceId::new("short"),
            start_date: date(2024, 1, 1),
            end_date: date(2024, 1, 7),
            weekdays: WeekdayFlags::from_bools(true, false, true, false, false, false, false),
            added_dates: Arc::new(HashSet::from([date(2024, 2, 1)])),
            removed_dates: Arc::new(HashSet::new()),
        };

        assert_eq!(
            calendar.service_dates(),
            vec![date(2024, 1, 1), date(2024, 1, 3), date(2024, 2, 1)]
        );
    }

    #[test]
    fn test_calendar_service_data() {
        let mut data = CalendarServiceData::new();
        data.add_calendar(&weekday_calendar());
        data.add_service_dates(ServiceId::new("weekday"), [date(2024, 1, 2)]);

        let dates = data.service_dates_for(&ServiceId::new("weekday"));
        assert_eq!(dates.first(), Some(&date(2024, 1, 2)));
        assert_eq!(dates.iter().filter(|d| **d == date(2024, 1, 2)).count(), 1);
        assert_eq!(data.last_service_date(&ServiceId::new("weekday")), Some(date(2024, 12, 31)));
        assert!(data.service_dates_for(&ServiceId::new("unknown")).is_empty());
    }
}
