//! Plain data records shared by every planning component.
//!
//! Clock times are venue-local and travel as `"HH:mm"` strings; dates are
//! calendar dates without a zone. Durations and waits are whole minutes.

use std::fmt;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::evaluate::ScoreBreakdown;
use crate::replan::DivergenceKind;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifies a single ride, show or other attraction.
    AttractionId
);
string_id!(
    /// Identifies a park or other attraction-bearing site.
    VenueId
);
string_id!(TripId);

/// One telemetry poll for one attraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitObservation {
    pub attraction_id: AttractionId,
    /// Venue-local timestamp.
    pub timestamp: NaiveDateTime,
    pub is_open: bool,
    pub wait_minutes: u32,
}

impl WaitObservation {
    /// Closed attractions always report a zero wait.
    pub fn new(attraction_id: AttractionId, timestamp: NaiveDateTime, is_open: bool, wait_minutes: u32) -> Self {
        Self {
            attraction_id,
            timestamp,
            is_open,
            wait_minutes: if is_open { wait_minutes } else { 0 },
        }
    }
}

/// Converts a UTC instant into the venue-local timestamp the aggregator buckets on.
pub fn to_venue_local(instant: DateTime<Utc>, offset: FixedOffset) -> NaiveDateTime {
    instant.with_timezone(&offset).naive_local()
}

/// Weekday number with 0 = Sunday through 6 = Saturday.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// Bucket key for hourly statistics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HourlyStatKey {
    pub attraction_id: AttractionId,
    /// 1-12
    pub month: u8,
    /// 0 = Sunday
    pub weekday: u8,
    /// 0-23
    pub hour: u8,
}

impl HourlyStatKey {
    pub fn new(attraction_id: AttractionId, month: u8, weekday: u8, hour: u8) -> Self {
        Self {
            attraction_id,
            month,
            weekday,
            hour,
        }
    }

    /// The bucket a venue-local timestamp falls into.
    pub fn for_timestamp(attraction_id: AttractionId, timestamp: NaiveDateTime) -> Self {
        Self {
            attraction_id,
            month: timestamp.month() as u8,
            weekday: weekday_index(timestamp.date()),
            hour: timestamp.hour() as u8,
        }
    }

    /// The bucket for a calendar date at a given hour.
    pub fn for_date(attraction_id: AttractionId, date: NaiveDate, hour: u8) -> Self {
        Self {
            attraction_id,
            month: date.month() as u8,
            weekday: weekday_index(date),
            hour,
        }
    }

    pub fn matches(&self, timestamp: NaiveDateTime) -> bool {
        self.month as u32 == timestamp.month()
            && self.weekday == weekday_index(timestamp.date())
            && self.hour as u32 == timestamp.hour()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyStat {
    pub key: HourlyStatKey,
    /// Percentiles are `None` when the bucket has no open samples.
    pub p50: Option<u32>,
    pub p80: Option<u32>,
    pub p95: Option<u32>,
    /// Share of samples that were open; `None` only when there are no samples.
    pub open_rate: Option<f64>,
    pub sample_count: u32,
}

impl HourlyStat {
    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingHours {
    #[serde(with = "hhmm")]
    pub open: NaiveTime,
    #[serde(with = "hhmm")]
    pub close: NaiveTime,
}

impl OperatingHours {
    pub fn new(open: NaiveTime, close: NaiveTime) -> Self {
        Self { open, close }
    }

    /// Length of the operating day in minutes (0 if close is not after open).
    pub fn minutes(&self) -> i32 {
        (minute_of_day(self.close) - minute_of_day(self.open)).max(0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarFlags {
    pub public_holiday: bool,
    pub rainy_day: bool,
    pub ticketed_event: bool,
    pub extended_evening: bool,
}

/// Externally supplied calendar facts for one venue on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarDay {
    pub venue_id: VenueId,
    pub date: NaiveDate,
    /// 0-100
    pub crowd_percent: Option<u8>,
    pub hours: Option<OperatingHours>,
    pub early_entry: Option<OperatingHours>,
    #[serde(default)]
    pub flags: CalendarFlags,
}

impl CalendarDay {
    pub fn new(venue_id: VenueId, date: NaiveDate) -> Self {
        Self {
            venue_id,
            date,
            crowd_percent: None,
            hours: None,
            early_entry: None,
            flags: CalendarFlags::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreMethod {
    Calendar,
    Computed,
    Hybrid,
}

impl ScoreMethod {
    /// Consumer preference, best first.
    pub const PREFERENCE: [ScoreMethod; 3] = [ScoreMethod::Hybrid, ScoreMethod::Calendar, ScoreMethod::Computed];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayScore {
    pub venue_id: VenueId,
    pub date: NaiveDate,
    pub method: ScoreMethod,
    /// 0.0 (empty) to 1.0 (packed)
    pub crowd_score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TripDayId {
    pub trip_id: TripId,
    pub date: NaiveDate,
}

impl TripDayId {
    pub fn new(trip_id: TripId, date: NaiveDate) -> Self {
        Self { trip_id, date }
    }
}

/// A trip day's venue (or free day).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub trip_day: TripDayId,
    pub venue_id: Option<VenueId>,
    /// Locked assignments are never touched by the optimizer.
    pub locked: bool,
    pub score: Option<f64>,
    pub breakdown: Option<ScoreBreakdown>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attraction {
    pub id: AttractionId,
    pub title: String,
    /// (lat, lng)
    pub location: Option<(f64, f64)>,
}

impl Attraction {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: AttractionId::new(id),
            title: title.into(),
            location: None,
        }
    }

    pub fn at(mut self, lat: f64, lng: f64) -> Self {
        self.location = Some((lat, lng));
        self
    }
}

/// Live state of an attraction as reported right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveStatus {
    pub is_open: bool,
    pub wait_minutes: u32,
}

impl LiveStatus {
    pub fn new(is_open: bool, wait_minutes: u32) -> Self {
        Self {
            is_open,
            wait_minutes: if is_open { wait_minutes } else { 0 },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Ride,
    Show,
    Meal,
    Buffer,
    Travel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItineraryItem {
    pub index: usize,
    pub item_type: ItemType,
    pub title: String,
    pub attraction_id: Option<AttractionId>,
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
    pub expected_wait: u32,
    pub expected_walk: u32,
    /// 0.0 to 1.0 chance of the attraction being down.
    pub risk_score: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ItineraryMetrics {
    pub total_rides: u32,
    pub total_wait: u32,
    pub total_walk: u32,
    /// Open-hours minutes left over after waiting and walking; negative when overbooked.
    pub slack: i32,
}

/// Why one item was swapped out during a repair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairNote {
    pub removed: AttractionId,
    pub replacement: Option<AttractionId>,
    pub kind: DivergenceKind,
    pub reason: String,
}

/// One immutable published version of a day's plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Itinerary {
    pub trip_day: TripDayId,
    pub venue_id: VenueId,
    pub version: u32,
    pub hours: OperatingHours,
    pub items: Vec<ItineraryItem>,
    pub metrics: ItineraryMetrics,
    #[serde(default)]
    pub repairs: Vec<RepairNote>,
}

impl Itinerary {
    /// Recomputes ride totals and slack from the current items.
    pub fn recompute_metrics(&mut self) {
        self.metrics = metrics_for(&self.items, self.hours);
    }
}

pub(crate) fn metrics_for(items: &[ItineraryItem], hours: OperatingHours) -> ItineraryMetrics {
    let mut metrics = ItineraryMetrics::default();
    for item in items.iter().filter(|item| item.item_type == ItemType::Ride) {
        metrics.total_rides += 1;
        metrics.total_wait += item.expected_wait;
        metrics.total_walk += item.expected_walk;
    }
    metrics.slack = hours.minutes() - (metrics.total_wait + metrics.total_walk) as i32;
    metrics
}

/// Minutes since local midnight.
pub fn minute_of_day(time: NaiveTime) -> i32 {
    (time.num_seconds_from_midnight() / 60) as i32
}

/// Clock time for a minute offset, clamped to the same day.
pub fn time_at_minute(minute: i32) -> NaiveTime {
    let clamped = minute.clamp(0, 24 * 60 - 1) as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(clamped * 60, 0).unwrap_or(NaiveTime::MIN)
}

/// Serde adapter for `"HH:mm"` local clock times.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}
