//! Service-day time arithmetic.
//!
//! Trip times are stored as seconds since the start of their service day. The start
//! of service is local noon minus twelve hours, which equals local midnight except on
//! days with a DST transition, where it keeps offsets consistent with published
//! timetables (e.g. 25:30:00 = 91800 seconds for 1:30am the next day).

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Instant a service day's offsets are measured from.
pub fn start_of_service(service_date: NaiveDate, zone: Tz) -> DateTime<Utc> {
    let noon = service_date.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN));
    let local_noon = match zone.from_local_datetime(&noon).earliest() {
        Some(t) => t.with_timezone(&Utc),
        None => Utc.from_utc_datetime(&noon),
    };
    local_noon - Duration::hours(12)
}

/// Local calendar date an instant falls on.
pub fn service_date_of(instant: DateTime<Utc>, zone: Tz) -> NaiveDate {
    instant.with_timezone(&zone).date_naive()
}

/// Absolute instant of an offset on a given service day.
pub fn instant_of(service_day_start: DateTime<Utc>, seconds_since_start: i32) -> DateTime<Utc> {
    service_day_start + Duration::seconds(i64::from(seconds_since_start))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn start_of_service_is_local_midnight_on_regular_days() {
        let start = start_of_service(date(2024, 3, 15), chrono_tz::Europe::Oslo);
        // Oslo is UTC+1 in March before DST
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 14, 23, 0, 0).unwrap());
    }

    #[test]
    fn start_of_service_on_dst_day() {
        // Clocks go forward at 02:00 on 2024-03-31 in Oslo; noon is UTC+2
        let start = start_of_service(date(2024, 3, 31), chrono_tz::Europe::Oslo);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 30, 22, 0, 0).unwrap());
    }

    #[test]
    fn service_date_of_uses_local_date() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 14, 23, 30, 0).unwrap();
        assert_eq!(service_date_of(instant, chrono_tz::Europe::Oslo), date(2024, 3, 15));
        assert_eq!(service_date_of(instant, chrono_tz::UTC), date(2024, 3, 14));
    }

    #[test]
    fn offsets_past_midnight() {
        let start = start_of_service(date(2024, 3, 15), chrono_tz::UTC);
        assert_eq!(instant_of(start, 91_800), Utc.with_ymd_and_hms(2024, 3, 16, 1, 30, 0).unwrap());
    }
}
