//! Test fixtures for park-planner.
//!
//! Provides:
//! - A small sample park (`park`) with attraction coordinates
//! - Builders for dates, times, hourly stats and crowd signals
//! - Store and provider doubles for failure and live-status scenarios

#![allow(dead_code)]

pub mod park;

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use park_planner::crowd::CrowdEstimate;
use park_planner::error::StorageError;
use park_planner::evaluate::{DaySignals, ScoreWeights, VenueDaySignals};
use park_planner::memory::InMemoryStore;
use park_planner::model::{
    AttractionId, HourlyStat, HourlyStatKey, LiveStatus, OperatingHours, VenueId, WaitObservation,
};
use park_planner::traits::{HourlyStatStore, LiveStatusProvider, ObservationStore};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

pub fn at(raw: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M").unwrap()
}

pub fn hours(open: u32, close: u32) -> OperatingHours {
    OperatingHours::new(time(open, 0), time(close, 0))
}

pub fn venue(id: &str) -> VenueId {
    VenueId::new(id)
}

pub fn attraction(id: &str) -> AttractionId {
    AttractionId::new(id)
}

pub fn observation(id: &str, raw: &str, open: bool, wait: u32) -> WaitObservation {
    WaitObservation::new(attraction(id), at(raw), open, wait)
}

/// Fully open bucket with the given p50/p80.
pub fn stat(id: &str, on: NaiveDate, hour: u8, p50: u32, p80: u32) -> HourlyStat {
    HourlyStat {
        key: HourlyStatKey::for_date(attraction(id), on, hour),
        p50: Some(p50),
        p80: Some(p80),
        p95: Some(p80),
        open_rate: Some(1.0),
        sample_count: 20,
    }
}

/// Weights that only look at the crowd component.
pub fn crowd_only() -> ScoreWeights {
    ScoreWeights {
        crowd: 1.0,
        hours: 0.0,
        weekend: 0.0,
        travel: 0.0,
        streak: 0.0,
        consecutive: 0.0,
    }
}

/// Builder for day signals keyed by (venue, date).
#[derive(Default)]
pub struct SignalsBuilder {
    signals: DaySignals,
}

impl SignalsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn crowd(mut self, venue_id: &str, on: NaiveDate, hybrid: f64) -> Self {
        self.signals.insert(
            venue(venue_id),
            on,
            VenueDaySignals {
                crowd: CrowdEstimate {
                    hybrid: Some(hybrid),
                    ..CrowdEstimate::default()
                },
                hours: None,
            },
        );
        self
    }

    pub fn build(self) -> DaySignals {
        self.signals
    }
}

/// Wraps the in-memory store and fails observation loads for chosen attractions.
pub struct FlakyStore {
    pub inner: InMemoryStore,
    failing: HashSet<AttractionId>,
}

impl FlakyStore {
    pub fn new(inner: InMemoryStore, failing: &[&str]) -> Self {
        Self {
            inner,
            failing: failing.iter().map(|id| attraction(id)).collect(),
        }
    }
}

impl ObservationStore for FlakyStore {
    fn load_observations(
        &self,
        attraction_id: &AttractionId,
        since: NaiveDateTime,
    ) -> Result<Vec<WaitObservation>, StorageError> {
        if self.failing.contains(attraction_id) {
            return Err(StorageError::Backend(format!("timeout loading {attraction_id}")));
        }
        self.inner.load_observations(attraction_id, since)
    }
}

impl HourlyStatStore for FlakyStore {
    fn read_hourly_stat(&self, key: &HourlyStatKey) -> Result<Option<HourlyStat>, StorageError> {
        self.inner.read_hourly_stat(key)
    }

    fn write_hourly_stat(&self, stat: &HourlyStat) -> Result<(), StorageError> {
        self.inner.write_hourly_stat(stat)
    }
}

/// Live provider returning a fixed map and counting calls.
#[derive(Default)]
pub struct StaticLive {
    statuses: HashMap<AttractionId, LiveStatus>,
    pub calls: Mutex<usize>,
}

impl StaticLive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(mut self, id: &str, wait: u32) -> Self {
        self.statuses.insert(attraction(id), LiveStatus::new(true, wait));
        self
    }

    pub fn closed(mut self, id: &str) -> Self {
        self.statuses.insert(attraction(id), LiveStatus::new(false, 0));
        self
    }

    pub fn statuses(&self) -> HashMap<AttractionId, LiveStatus> {
        self.statuses.clone()
    }
}

impl LiveStatusProvider for StaticLive {
    fn live_status(&self, _venue_id: &VenueId) -> HashMap<AttractionId, LiveStatus> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls += 1;
        }
        self.statuses.clone()
    }
}
