//! "Next departures" queries for a stop, spanning service-day boundaries.
//!
//! Trip offsets are relative to the start of their service day and can exceed 24
//! hours, so a trip of yesterday's service day may still call at a stop today. The
//! scan therefore starts one service day before the requested start. Candidates of
//! all scanned days share one bounded queue, because a previous-day trip can
//! legitimately rank before a current-day one.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::identifiers::{PatternId, StopId, TripId};
use crate::models::network::Trip;
use crate::models::pattern::TripPattern;
use crate::models::time::{instant_of, service_date_of, start_of_service};
use crate::models::timetable::TripTimes;
use crate::models::traits::TransitProvider;
use crate::models::types::{ArrivalDeparture, PickDrop, Result};
use crate::service::bounded_queue::BoundedQueue;

// ============================================================================
// Request and results
// ============================================================================

#[derive(Clone, Debug)]
pub struct DepartureBoardRequest {
    pub start: DateTime<Utc>,
    /// Window length after `start`. A zero range matches times equal to `start` only.
    pub time_range: Duration,
    /// Maximum results; zero or less returns nothing.
    pub number_of_departures: i32,
    pub arrival_departure: ArrivalDeparture,
    pub include_cancelled_trips: bool,
    /// Keep trips that realtime data moved to another pattern on that date.
    pub include_replaced_trips: bool,
}

impl DepartureBoardRequest {
    pub const DEFAULT_NUMBER_OF_DEPARTURES: i32 = 10;

    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            start,
            time_range: Duration::hours(24),
            number_of_departures: Self::DEFAULT_NUMBER_OF_DEPARTURES,
            arrival_departure: ArrivalDeparture::Departures,
            include_cancelled_trips: false,
            include_replaced_trips: false,
        }
    }

    pub fn time_range(mut self, range: Duration) -> Self {
        self.time_range = range;
        self
    }

    pub fn number_of_departures(mut self, n: i32) -> Self {
        self.number_of_departures = n;
        self
    }

    pub fn arrival_departure(mut self, side: ArrivalDeparture) -> Self {
        self.arrival_departure = side;
        self
    }

    pub fn include_cancelled_trips(mut self, include: bool) -> Self {
        self.include_cancelled_trips = include;
        self
    }

    pub fn include_replaced_trips(mut self, include: bool) -> Self {
        self.include_replaced_trips = include;
        self
    }

    fn end(&self) -> DateTime<Utc> {
        self.start + self.time_range
    }

    fn in_window(&self, instant: DateTime<Utc>) -> bool {
        if self.time_range.is_zero() {
            instant == self.start
        } else {
            instant >= self.start && instant < self.end()
        }
    }
}

/// Listing of one whole service day. Unlike [`DepartureBoardRequest`] there is no
/// window or result limit.
#[derive(Clone, Copy, Debug)]
pub struct StopTimesOnDateRequest {
    pub service_date: NaiveDate,
    pub arrival_departure: ArrivalDeparture,
    pub include_cancelled_trips: bool,
}

impl StopTimesOnDateRequest {
    pub fn new(service_date: NaiveDate) -> Self {
        Self {
            service_date,
            arrival_departure: ArrivalDeparture::Departures,
            include_cancelled_trips: false,
        }
    }

    pub fn arrival_departure(mut self, side: ArrivalDeparture) -> Self {
        self.arrival_departure = side;
        self
    }

    pub fn include_cancelled_trips(mut self, include: bool) -> Self {
        self.include_cancelled_trips = include;
        self
    }
}

/// One trip calling at one stop occurrence on one service date.
#[derive(Clone, Debug)]
pub struct TripTimeOnDate {
    trip_times: Arc<TripTimes>,
    pattern: Arc<TripPattern>,
    stop_position: usize,
    service_date: NaiveDate,
    service_day_start: DateTime<Utc>,
}

impl TripTimeOnDate {
    pub(crate) fn new(
        trip_times: Arc<TripTimes>,
        pattern: Arc<TripPattern>,
        stop_position: usize,
        service_date: NaiveDate,
        service_day_start: DateTime<Utc>,
    ) -> Self {
        Self {
            trip_times,
            pattern,
            stop_position,
            service_date,
            service_day_start,
        }
    }

    pub fn trip(&self) -> &Arc<Trip> {
        self.trip_times.trip()
    }

    pub fn trip_times(&self) -> &Arc<TripTimes> {
        &self.trip_times
    }

    pub fn pattern(&self) -> &Arc<TripPattern> {
        &self.pattern
    }

    pub fn stop_position(&self) -> usize {
        self.stop_position
    }

    pub fn stop_id(&self) -> &StopId {
        &self.pattern.stops()[self.stop_position]
    }

    pub fn service_date(&self) -> NaiveDate {
        self.service_date
    }

    pub fn headsign(&self) -> &str {
        &self.trip().headsign
    }

    pub fn scheduled_arrival(&self) -> i32 {
        self.trip_times.scheduled_arrival(self.stop_position)
    }

    pub fn scheduled_departure(&self) -> i32 {
        self.trip_times.scheduled_departure(self.stop_position)
    }

    pub fn realtime_arrival(&self) -> i32 {
        self.trip_times.arrival(self.stop_position)
    }

    pub fn realtime_departure(&self) -> i32 {
        self.trip_times.departure(self.stop_position)
    }

    pub fn departure_delay(&self) -> i32 {
        self.trip_times.departure_delay(self.stop_position)
    }

    pub fn arrival_instant(&self) -> DateTime<Utc> {
        instant_of(self.service_day_start, self.realtime_arrival())
    }

    pub fn departure_instant(&self) -> DateTime<Utc> {
        instant_of(self.service_day_start, self.realtime_departure())
    }

    pub fn is_realtime(&self) -> bool {
        self.trip_times.is_realtime_updated()
    }

    pub fn is_cancelled(&self) -> bool {
        self.trip_times.is_canceled()
            || self.trip_times.is_cancelled_stop(self.stop_position)
            || self.pattern.is_cancelled_stop(self.stop_position)
    }
}

/// Results of one pattern, in ascending time order.
#[derive(Clone, Debug)]
pub struct StopTimesInPattern {
    pub pattern: Arc<TripPattern>,
    pub times: Vec<TripTimeOnDate>,
}

type CandidateKey = (DateTime<Utc>, TripId, PatternId, usize);

// ============================================================================
// Queries
// ============================================================================

/// Upcoming stop times at the stop, grouped per pattern, at most N per pattern.
/// Patterns without results are left out.
pub fn stop_times_for_stop<P: TransitProvider + ?Sized>(
    provider: &P,
    stop: &StopId,
    request: &DepartureBoardRequest,
) -> Result<Vec<StopTimesInPattern>> {
    let Some(capacity) = capacity_of(request) else {
        return Ok(Vec::new());
    };

    let mut result = Vec::new();
    for pattern in provider.patterns_for_stop(stop, true) {
        let mut queue = BoundedQueue::new(capacity);
        scan_pattern(provider, stop, &pattern, request, &mut queue)?;
        if !queue.is_empty() {
            result.push(StopTimesInPattern {
                pattern,
                times: queue.into_sorted_vec(),
            });
        }
    }
    Ok(result)
}

/// Upcoming stop times of one pattern at the stop.
pub fn stop_times_for_pattern_at_stop<P: TransitProvider + ?Sized>(
    provider: &P,
    stop: &StopId,
    pattern: &Arc<TripPattern>,
    request: &DepartureBoardRequest,
) -> Result<Vec<TripTimeOnDate>> {
    let Some(capacity) = capacity_of(request) else {
        return Ok(Vec::new());
    };
    let mut queue = BoundedQueue::new(capacity);
    scan_pattern(provider, stop, pattern, request, &mut queue)?;
    Ok(queue.into_sorted_vec())
}

/// The next N stop times at the stop across all patterns.
pub fn departure_board<P: TransitProvider + ?Sized>(
    provider: &P,
    stop: &StopId,
    request: &DepartureBoardRequest,
) -> Result<Vec<TripTimeOnDate>> {
    let Some(capacity) = capacity_of(request) else {
        return Ok(Vec::new());
    };
    let mut queue = BoundedQueue::new(capacity);
    for pattern in provider.patterns_for_stop(stop, true) {
        scan_pattern(provider, stop, &pattern, request, &mut queue)?;
    }
    Ok(queue.into_sorted_vec())
}

/// Every stop time at the stop on one service day, per pattern, sorted by
/// departure.
pub fn stop_times_for_stop_on_date<P: TransitProvider + ?Sized>(
    provider: &P,
    stop: &StopId,
    request: &StopTimesOnDateRequest,
) -> Result<Vec<StopTimesInPattern>> {
    let StopTimesOnDateRequest {
        service_date,
        arrival_departure,
        include_cancelled_trips,
    } = *request;
    let zone = provider.time_zone();
    let running = provider.service_codes_running_on(service_date);
    let day_start = start_of_service(service_date, zone);

    let mut result = Vec::new();
    for pattern in provider.patterns_for_stop(stop, true) {
        provider.check_deadline()?;
        let positions = matching_positions(&pattern, stop, arrival_departure, include_cancelled_trips);
        if positions.is_empty() {
            continue;
        }

        let timetable = provider.timetable(&pattern, service_date);
        let mut times: Vec<TripTimeOnDate> = Vec::new();
        for trip_times in timetable.trip_times() {
            if !running.contains(trip_times.service_code()) || trip_times.is_deleted() {
                continue;
            }
            if trip_times.is_canceled() && !include_cancelled_trips {
                continue;
            }
            for &pos in &positions {
                if trip_times.is_cancelled_stop(pos) && !include_cancelled_trips {
                    continue;
                }
                times.push(TripTimeOnDate {
                    trip_times: trip_times.clone(),
                    pattern: pattern.clone(),
                    stop_position: pos,
                    service_date,
                    service_day_start: day_start,
                });
            }
        }

        if !times.is_empty() {
            times.sort_by(|a, b| {
                a.realtime_departure()
                    .cmp(&b.realtime_departure())
                    .then_with(|| a.trip().id.cmp(&b.trip().id))
            });
            result.push(StopTimesInPattern { pattern, times });
        }
    }
    Ok(result)
}

// ============================================================================
// Scan
// ============================================================================

fn capacity_of(request: &DepartureBoardRequest) -> Option<usize> {
    usize::try_from(request.number_of_departures).ok().filter(|n| *n > 0)
}

/// Occurrences of the stop in the pattern that can serve the requested side.
fn matching_positions(
    pattern: &TripPattern,
    stop: &StopId,
    arrival_departure: ArrivalDeparture,
    include_cancelled: bool,
) -> Vec<usize> {
    pattern
        .positions_of(stop)
        .filter(|pos| !skip_by_pickup_dropoff(pattern, *pos, arrival_departure))
        .filter(|pos| include_cancelled || !pattern.is_cancelled_stop(*pos))
        .collect()
}

fn skip_by_pickup_dropoff(pattern: &TripPattern, pos: usize, arrival_departure: ArrivalDeparture) -> bool {
    let no_pickup = pattern.stop_pattern.pickup(pos) == PickDrop::None;
    let no_dropoff = pattern.stop_pattern.dropoff(pos) == PickDrop::None;

    (no_pickup && no_dropoff)
        || (no_pickup && arrival_departure == ArrivalDeparture::Departures)
        || (no_dropoff && arrival_departure == ArrivalDeparture::Arrivals)
}

fn scan_pattern<P: TransitProvider + ?Sized>(
    provider: &P,
    stop: &StopId,
    pattern: &Arc<TripPattern>,
    request: &DepartureBoardRequest,
    queue: &mut BoundedQueue<CandidateKey, TripTimeOnDate>,
) -> Result<()> {
    let positions = matching_positions(
        pattern,
        stop,
        request.arrival_departure,
        request.include_cancelled_trips,
    );
    if positions.is_empty() {
        return Ok(());
    }

    let zone = provider.time_zone();
    let end = request.end();
    let first_date = service_date_of(request.start - Duration::days(1), zone);
    // A service day can start before local midnight of its date (spring-forward)
    let last_date = service_date_of(end, zone) + Duration::days(1);

    for service_date in first_date.iter_days().take_while(|d| *d <= last_date) {
        if start_of_service(service_date, zone) > end {
            break;
        }
        provider.check_deadline()?;
        let running = provider.service_codes_running_on(service_date);
        let timetable = provider.timetable(pattern, service_date);
        let day_start = start_of_service(service_date, zone);

        for trip_times in timetable.trip_times() {
            if !running.contains(trip_times.service_code()) || trip_times.is_deleted() {
                continue;
            }
            if trip_times.is_canceled() && !request.include_cancelled_trips {
                continue;
            }
            if !request.include_replaced_trips {
                let replaced = provider
                    .new_pattern_for_modified_trip(trip_times.trip_id(), service_date)
                    .is_some_and(|p| p.id != pattern.id);
                if replaced {
                    continue;
                }
            }

            for &pos in &positions {
                if trip_times.is_cancelled_stop(pos) && !request.include_cancelled_trips {
                    continue;
                }
                let arrival = instant_of(day_start, trip_times.arrival(pos));
                let departure = instant_of(day_start, trip_times.departure(pos));

                let relevant = match request.arrival_departure {
                    ArrivalDeparture::Departures => request.in_window(departure).then_some(departure),
                    ArrivalDeparture::Arrivals => request.in_window(arrival).then_some(arrival),
                    ArrivalDeparture::Both => {
                        if request.in_window(departure) {
                            Some(departure)
                        } else {
                            request.in_window(arrival).then_some(arrival)
                        }
                    }
                };

                if let Some(instant) = relevant {
                    let key = (instant, trip_times.trip_id().clone(), pattern.id.clone(), pos);
                    queue.push(
                        key,
                        TripTimeOnDate {
                            trip_times: trip_times.clone(),
                            pattern: pattern.clone(),
                            stop_position: pos,
                            service_date,
                            service_day_start: day_start,
                        },
                    );
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use crate::identifiers::ServiceId;
    use crate::models::calendar::CalendarServiceData;
    use crate::models::pattern::TripPattern;
    use crate::models::types::RealTimeState;
    use crate::realtime::{OverlayBuffer, OverlayPublisher, RealTimeTripUpdate, RealtimeOverlay};
    use crate::repository::TimetableRepository;
    use crate::service::transit_service::{Deadline, TransitService};
    use crate::test_support::{date, hm, Fixture};
    use chrono::TimeZone;
    use chrono_tz::Europe::Oslo;
    use std::time::Instant;

    fn local(d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Oslo.with_ymd_and_hms(2024, 3, d, h, min, 0).unwrap().with_timezone(&Utc)
    }

    fn stop(id: &str) -> StopId {
        StopId::new(id)
    }

    /// Weekday service runs Monday 4 to Wednesday 6 March 2024.
    fn repository(fixture: &Fixture, build: impl FnOnce(&TimetableRepository) -> Vec<TripPattern>) -> Arc<TimetableRepository> {
        let mut repo = fixture.repository();
        let mut calendar = CalendarServiceData::new();
        calendar.add_service_dates(
            ServiceId::new("metro:weekday"),
            [date(2024, 3, 4), date(2024, 3, 5), date(2024, 3, 6)],
        );
        repo.update_calendar_service_data(calendar, local(1, 0, 0));
        for pattern in build(&repo) {
            repo.add_trip_pattern(pattern);
        }
        Arc::new(repo)
    }

    fn line(fixture: &Fixture) -> Arc<TimetableRepository> {
        let route = fixture.route("metro:r1");
        repository(fixture, |repo| {
            vec![fixture
                .pattern("metro:p1", &route, &["metro:A", "metro:B", "metro:C"])
                .trip("metro:t1", "metro:weekday", &[(hm(8, 0), hm(8, 0)), (hm(8, 10), hm(8, 10)), (hm(8, 20), hm(8, 20))])
                .trip("metro:t2", "metro:weekday", &[(hm(8, 10), hm(8, 10)), (hm(8, 20), hm(8, 20)), (hm(8, 30), hm(8, 30))])
                .build(repo)]
        })
    }

    fn trip_ids(times: &[TripTimeOnDate]) -> Vec<String> {
        times.iter().map(|t| t.trip().id.to_string()).collect()
    }

    fn publish_update(
        repo: &TimetableRepository,
        publisher: &OverlayPublisher,
        buffer: &mut OverlayBuffer,
        build: impl FnOnce(&Arc<TripPattern>) -> RealTimeTripUpdate,
    ) -> Arc<RealtimeOverlay> {
        let index = repo.schedule_index().unwrap();
        let pattern = index.pattern(&crate::identifiers::PatternId::new("metro:p1")).unwrap();
        buffer.update(build(pattern)).unwrap();
        let overlay = buffer.commit(false).unwrap();
        publisher.publish(overlay.clone());
        overlay
    }

    fn delayed_t1(pattern: &Arc<TripPattern>, date: NaiveDate, seconds: i32) -> RealTimeTripUpdate {
        let times = pattern
            .scheduled_timetable()
            .trip_times_for(&TripId::new("metro:t1"))
            .unwrap()
            .with_delay(seconds)
            .unwrap();
        RealTimeTripUpdate::new(pattern.clone(), date, times)
    }

    #[test]
    fn test_cross_midnight_arrival() {
        let fixture = Fixture::new();
        let route = fixture.route("metro:r1");
        let repo = repository(&fixture, |repo| {
            vec![fixture
                .pattern("metro:p1", &route, &["metro:A", "metro:B"])
                .trip("metro:night", "metro:weekday", &[(hm(23, 50), hm(23, 50)), (hm(24, 10), hm(24, 10))])
                .build(repo)]
        });
        let service = TransitService::new(repo).unwrap();

        let request = DepartureBoardRequest::new(local(5, 0, 0))
            .time_range(Duration::minutes(30))
            .arrival_departure(ArrivalDeparture::Arrivals);
        let board = departure_board(&service, &stop("metro:B"), &request).unwrap();

        assert_eq!(trip_ids(&board), vec!["metro:night"]);
        assert_eq!(board[0].service_date(), date(2024, 3, 4));
        assert_eq!(board[0].arrival_instant(), local(5, 0, 10));
    }

    #[test]
    fn test_service_day_starting_before_local_midnight() {
        // Clocks spring forward on 31 March, so that service day starts at 23:00 on the 30th
        let fixture = Fixture::new();
        let route = fixture.route("metro:r1");
        let mut repo = fixture.repository();
        let mut calendar = CalendarServiceData::new();
        calendar.add_service_dates(ServiceId::new("metro:sunday"), [date(2024, 3, 31)]);
        repo.update_calendar_service_data(calendar, local(1, 0, 0));
        let pattern = fixture
            .pattern("metro:p1", &route, &["metro:A", "metro:B"])
            .trip("metro:t1", "metro:sunday", &[(hm(0, 30), hm(0, 30)), (hm(0, 40), hm(0, 40))])
            .build(&repo);
        repo.add_trip_pattern(pattern);
        let service = TransitService::new(Arc::new(repo)).unwrap();

        let start = Utc.with_ymd_and_hms(2024, 3, 30, 22, 20, 0).unwrap();
        let request = DepartureBoardRequest::new(start).time_range(Duration::minutes(20));
        let board = departure_board(&service, &stop("metro:A"), &request).unwrap();

        assert_eq!(trip_ids(&board), vec!["metro:t1"]);
        assert_eq!(board[0].service_date(), date(2024, 3, 31));
        assert_eq!(board[0].departure_instant(), Utc.with_ymd_and_hms(2024, 3, 30, 22, 30, 0).unwrap());
    }

    #[test]
    fn test_previous_day_trip_outranks_current_day() {
        let fixture = Fixture::new();
        let route = fixture.route("metro:r1");
        let repo = repository(&fixture, |repo| {
            vec![fixture
                .pattern("metro:p1", &route, &["metro:A", "metro:B"])
                .trip("metro:late", "metro:weekday", &[(hm(24, 30), hm(24, 30)), (hm(24, 40), hm(24, 40))])
                .trip("metro:early", "metro:weekday", &[(hm(0, 40), hm(0, 40)), (hm(0, 50), hm(0, 50))])
                .build(repo)]
        });
        let service = TransitService::new(repo).unwrap();

        let one = DepartureBoardRequest::new(local(5, 0, 0)).number_of_departures(1);
        let board = departure_board(&service, &stop("metro:A"), &one).unwrap();
        assert_eq!(trip_ids(&board), vec!["metro:late"]);
        assert_eq!(board[0].service_date(), date(2024, 3, 4));

        let two = one.number_of_departures(2);
        let board = departure_board(&service, &stop("metro:A"), &two).unwrap();
        assert_eq!(trip_ids(&board), vec!["metro:late", "metro:early"]);
        assert_eq!(board[1].service_date(), date(2024, 3, 5));
    }

    #[test]
    fn test_non_positive_count_returns_empty_without_scanning() {
        let fixture = Fixture::new();
        // An expired deadline would fail any scan
        let service = TransitService::new(line(&fixture))
            .unwrap()
            .with_deadline(Arc::new(Deadline::at(Instant::now())));

        for n in [0, -3] {
            let request = DepartureBoardRequest::new(local(4, 7, 0)).number_of_departures(n);
            assert!(departure_board(&service, &stop("metro:A"), &request).unwrap().is_empty());
            assert!(stop_times_for_stop(&service, &stop("metro:A"), &request).unwrap().is_empty());
        }

        let request = DepartureBoardRequest::new(local(4, 7, 0));
        assert!(matches!(
            departure_board(&service, &stop("metro:A"), &request),
            Err(crate::models::types::TransitError::Timeout)
        ));
    }

    #[test]
    fn test_zero_range_matches_start_exactly() {
        let fixture = Fixture::new();
        let service = TransitService::new(line(&fixture)).unwrap();

        let exact = DepartureBoardRequest::new(local(4, 8, 10)).time_range(Duration::zero());
        assert_eq!(trip_ids(&departure_board(&service, &stop("metro:A"), &exact).unwrap()), vec!["metro:t2"]);

        let before = DepartureBoardRequest::new(local(4, 8, 9)).time_range(Duration::zero());
        assert!(departure_board(&service, &stop("metro:A"), &before).unwrap().is_empty());
    }

    #[test]
    fn test_window_is_half_open() {
        let fixture = Fixture::new();
        let service = TransitService::new(line(&fixture)).unwrap();

        let request = DepartureBoardRequest::new(local(4, 8, 0)).time_range(Duration::minutes(10));
        assert_eq!(trip_ids(&departure_board(&service, &stop("metro:A"), &request).unwrap()), vec!["metro:t1"]);
    }

    #[test]
    fn test_dropoff_disabled_hidden_from_arrivals_only() {
        let fixture = Fixture::new();
        let route = fixture.route("metro:r1");
        let repo = repository(&fixture, |repo| {
            vec![fixture
                .pattern("metro:p1", &route, &["metro:A", "metro:B", "metro:C"])
                .trip("metro:t1", "metro:weekday", &[(hm(8, 0), hm(8, 0)), (hm(8, 10), hm(8, 11)), (hm(8, 20), hm(8, 20))])
                .policies(1, PickDrop::Scheduled, PickDrop::None)
                .build(repo)]
        });
        let service = TransitService::new(repo).unwrap();

        let arrivals = DepartureBoardRequest::new(local(4, 7, 0)).arrival_departure(ArrivalDeparture::Arrivals);
        assert!(departure_board(&service, &stop("metro:B"), &arrivals).unwrap().is_empty());

        let departures = DepartureBoardRequest::new(local(4, 7, 0));
        let board = departure_board(&service, &stop("metro:B"), &departures).unwrap();
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].departure_instant(), local(4, 8, 11));
    }

    #[test]
    fn test_no_service_on_non_running_dates() {
        let fixture = Fixture::new();
        let service = TransitService::new(line(&fixture)).unwrap();

        // Saturday 9 March is outside the weekday calendar
        let request = DepartureBoardRequest::new(local(9, 0, 0));
        assert!(departure_board(&service, &stop("metro:A"), &request).unwrap().is_empty());

        // Three running days within a 72h window, two trips each
        let request = DepartureBoardRequest::new(local(4, 0, 0)).time_range(Duration::hours(72));
        assert_eq!(departure_board(&service, &stop("metro:A"), &request).unwrap().len(), 6);
    }

    #[test]
    fn test_realtime_delay_reorders_results() {
        let fixture = Fixture::new();
        let repo = line(&fixture);
        let publisher = Arc::new(OverlayPublisher::new());
        let mut buffer = OverlayBuffer::new(&IndexConfig::default());
        publish_update(&repo, &publisher, &mut buffer, |p| delayed_t1(p, date(2024, 3, 4), 20 * 60));

        let service = TransitService::new(repo).unwrap().with_publisher(publisher);
        let request = DepartureBoardRequest::new(local(4, 7, 0));
        let board = departure_board(&service, &stop("metro:A"), &request).unwrap();

        assert_eq!(trip_ids(&board[..2]), vec!["metro:t2", "metro:t1"]);
        assert!(board[1].is_realtime());
        assert_eq!(board[1].departure_delay(), 20 * 60);
        assert_eq!(board[1].scheduled_departure(), hm(8, 0));
    }

    #[test]
    fn test_cancelled_trips_filtered_by_flag() {
        let fixture = Fixture::new();
        let repo = line(&fixture);
        let publisher = Arc::new(OverlayPublisher::new());
        let mut buffer = OverlayBuffer::new(&IndexConfig::default());
        publish_update(&repo, &publisher, &mut buffer, |p| {
            let times = p
                .scheduled_timetable()
                .trip_times_for(&TripId::new("metro:t1"))
                .unwrap()
                .canceled();
            RealTimeTripUpdate::new(p.clone(), date(2024, 3, 4), times)
        });

        let service = TransitService::new(repo).unwrap().with_publisher(publisher);
        let request = DepartureBoardRequest::new(local(4, 7, 0)).time_range(Duration::hours(3));
        assert_eq!(trip_ids(&departure_board(&service, &stop("metro:A"), &request).unwrap()), vec!["metro:t2"]);

        let with_cancelled = request.include_cancelled_trips(true);
        let board = departure_board(&service, &stop("metro:A"), &with_cancelled).unwrap();
        assert_eq!(trip_ids(&board), vec!["metro:t1", "metro:t2"]);
        assert!(board[0].is_cancelled());
        assert!(!board[1].is_cancelled());
    }

    #[test]
    fn test_replaced_trip_shown_on_new_pattern_only() {
        let fixture = Fixture::new();
        let repo = line(&fixture);
        let route = fixture.route("metro:r1");
        let detour = Arc::new(
            fixture
                .pattern("metro:p1-rt", &route, &["metro:A", "metro:C"])
                .build_realtime(Some("metro:p1")),
        );
        let t1 = fixture.trip("metro:t1", "metro:weekday");
        let code = repo.service_code_for(&t1.service_id);
        let times = TripTimes::scheduled(t1, code, &[(hm(8, 0), hm(8, 0)), (hm(8, 15), hm(8, 15))])
            .unwrap()
            .with_state(RealTimeState::Modified);

        let publisher = Arc::new(OverlayPublisher::new());
        let mut buffer = OverlayBuffer::new(&IndexConfig::default());
        buffer
            .update(RealTimeTripUpdate::new(detour.clone(), date(2024, 3, 4), times))
            .unwrap();
        publisher.publish(buffer.commit(false).unwrap());

        let service = TransitService::new(repo).unwrap().with_publisher(publisher);
        let request = DepartureBoardRequest::new(local(4, 7, 0)).time_range(Duration::hours(2));

        let per_pattern = stop_times_for_stop(&service, &stop("metro:A"), &request).unwrap();
        let summary: Vec<(String, Vec<String>)> = per_pattern
            .iter()
            .map(|p| (p.pattern.id.to_string(), trip_ids(&p.times)))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("metro:p1".to_string(), vec!["metro:t2".to_string()]),
                ("metro:p1-rt".to_string(), vec!["metro:t1".to_string()]),
            ]
        );

        let with_replaced = request.include_replaced_trips(true);
        let scheduled = stop_times_for_pattern_at_stop(&service, &stop("metro:A"), &per_pattern[0].pattern, &with_replaced).unwrap();
        assert_eq!(trip_ids(&scheduled), vec!["metro:t1", "metro:t2"]);

        let t1 = TripId::new("metro:t1");
        assert_eq!(
            service.pattern_for_trip_on_date(&t1, date(2024, 3, 4)).map(|p| p.id.clone()),
            Some(detour.id.clone())
        );
        assert_eq!(
            service.pattern_for_trip_on_date(&t1, date(2024, 3, 5)).map(|p| p.id.to_string()),
            Some("metro:p1".to_string())
        );
    }

    #[test]
    fn test_request_keeps_first_overlay() {
        let fixture = Fixture::new();
        let repo = line(&fixture);
        let publisher = Arc::new(OverlayPublisher::new());
        let mut buffer = OverlayBuffer::new(&IndexConfig::default());
        publish_update(&repo, &publisher, &mut buffer, |p| delayed_t1(p, date(2024, 3, 4), 5 * 60));

        let service = TransitService::new(repo.clone()).unwrap().with_publisher(publisher.clone());
        let request = DepartureBoardRequest::new(local(4, 7, 0)).number_of_departures(1);
        let first = departure_board(&service, &stop("metro:A"), &request).unwrap();
        assert_eq!(first[0].departure_instant(), local(4, 8, 5));

        publish_update(&repo, &publisher, &mut buffer, |p| delayed_t1(p, date(2024, 3, 4), 8 * 60));

        let again = departure_board(&service, &stop("metro:A"), &request).unwrap();
        assert_eq!(again[0].departure_instant(), local(4, 8, 5));

        let fresh = TransitService::new(repo).unwrap().with_publisher(publisher);
        let latest = departure_board(&fresh, &stop("metro:A"), &request).unwrap();
        assert_eq!(latest[0].departure_instant(), local(4, 8, 8));
    }

    #[test]
    fn test_loop_occurrences_are_independent() {
        let fixture = Fixture::new();
        let route = fixture.route("metro:r1");
        let repo = repository(&fixture, |repo| {
            vec![fixture
                .pattern("metro:loop", &route, &["metro:A", "metro:B", "metro:A"])
                .trip("metro:t1", "metro:weekday", &[(hm(8, 0), hm(8, 0)), (hm(8, 10), hm(8, 10)), (hm(8, 20), hm(8, 20))])
                .build(repo)]
        });
        let service = TransitService::new(repo).unwrap();

        let request = DepartureBoardRequest::new(local(4, 7, 0)).arrival_departure(ArrivalDeparture::Both);
        let board = departure_board(&service, &stop("metro:A"), &request).unwrap();
        let positions: Vec<usize> = board.iter().map(|t| t.stop_position()).collect();
        assert_eq!(positions, vec![0, 2]);
    }

    #[test]
    fn test_whole_service_day_listing() {
        let fixture = Fixture::new();
        let service = TransitService::new(line(&fixture)).unwrap();

        let day = stop_times_for_stop_on_date(&service, &stop("metro:B"), &StopTimesOnDateRequest::new(date(2024, 3, 5))).unwrap();
        assert_eq!(day.len(), 1);
        assert_eq!(trip_ids(&day[0].times), vec!["metro:t1", "metro:t2"]);
        assert_eq!(day[0].times[0].stop_id(), &stop("metro:B"));

        let arrivals = StopTimesOnDateRequest::new(date(2024, 3, 5)).arrival_departure(ArrivalDeparture::Arrivals);
        let at_terminus = stop_times_for_stop_on_date(&service, &stop("metro:C"), &arrivals).unwrap();
        assert_eq!(trip_ids(&at_terminus[0].times), vec!["metro:t1", "metro:t2"]);

        let saturday = stop_times_for_stop_on_date(&service, &stop("metro:B"), &StopTimesOnDateRequest::new(date(2024, 3, 9))).unwrap();
        assert!(saturday.is_empty());
    }
}
