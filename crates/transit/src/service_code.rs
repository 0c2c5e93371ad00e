//! Dense integer codes for calendar service-ids.
//!
//! Codes let "is this service running on date D" be a bitset membership test. Codes
//! are append-only: once a service-id has a code it keeps it for the lifetime of the
//! registry, across index rebuilds.
//!
//! Registration is serialized behind a write lock, so the realtime updater may
//! create service-ids for new dates while requests read running sets.

use std::collections::HashMap;

use chrono::NaiveDate;
use fixedbitset::FixedBitSet;
use parking_lot::RwLock;
use tracing::debug;

use crate::identifiers::ServiceId;
use crate::models::calendar::CalendarServiceData;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceCode(pub u32);

impl ServiceCode {
    pub fn as_index(self) -> usize {
        self.0 as usize
    }
}

/// Set of service codes running on one date.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunningServices(FixedBitSet);

impl RunningServices {
    pub fn contains(&self, code: ServiceCode) -> bool {
        self.0.contains(code.as_index())
    }

    pub fn len(&self) -> usize {
        self.0.count_ones(..)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = ServiceCode> + '_ {
        self.0.ones().map(|i| ServiceCode(i as u32))
    }
}

#[derive(Debug, Default)]
struct Registry {
    codes: HashMap<ServiceId, ServiceCode>,
    running: HashMap<NaiveDate, FixedBitSet>,
}

impl Registry {
    fn code_for(&mut self, service_id: &ServiceId) -> ServiceCode {
        if let Some(code) = self.codes.get(service_id) {
            return *code;
        }
        let code = ServiceCode(self.codes.len() as u32);
        self.codes.insert(service_id.clone(), code);
        code
    }

    fn mark_running(&mut self, date: NaiveDate, code: ServiceCode) {
        let bits = self.running.entry(date).or_default();
        bits.grow(code.as_index() + 1);
        bits.insert(code.as_index());
    }
}

#[derive(Debug, Default)]
pub struct ServiceCodeRegistry {
    inner: RwLock<Registry>,
}

impl ServiceCodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing code for the service-id, or the next unused one.
    pub fn code_for(&self, service_id: &ServiceId) -> ServiceCode {
        if let Some(code) = self.get(service_id) {
            return code;
        }
        self.inner.write().code_for(service_id)
    }

    /// Code for the service-id without registering it.
    pub fn get(&self, service_id: &ServiceId) -> Option<ServiceCode> {
        self.inner.read().codes.get(service_id).copied()
    }

    pub fn len(&self) -> usize {
        self.inner.read().codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Codes running on the date. The result is a copy; later registrations are
    /// visible to later calls.
    pub fn codes_running_on(&self, date: NaiveDate) -> RunningServices {
        self.inner
            .read()
            .running
            .get(&date)
            .cloned()
            .map(RunningServices)
            .unwrap_or_default()
    }

    /// Mark a code as running on a date, e.g. for a service-id created by realtime data.
    pub fn register_running(&self, date: NaiveDate, code: ServiceCode) {
        self.inner.write().mark_running(date, code);
    }

    /// Recompute the running sets from enumerated calendar data, assigning codes to
    /// service-ids seen for the first time. Dates registered incrementally for
    /// service-ids outside the calendar are kept.
    pub fn index_calendar(&self, calendar: &CalendarServiceData) {
        let mut inner = self.inner.write();
        let mut service_ids: Vec<&ServiceId> = calendar.service_ids().collect();
        // Deterministic code assignment for the same calendar
        service_ids.sort();

        for service_id in service_ids {
            let code = inner.code_for(service_id);
            for date in calendar.service_dates_for(service_id) {
                inner.mark_running(*date, code);
            }
        }
        debug!(
            service_ids = inner.codes.len(),
            dates = inner.running.len(),
            "Indexed service calendar"
        );
    }
}
