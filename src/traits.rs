//! Storage and provider seams for the planning core.
//!
//! These are intentionally minimal and backend-agnostic. Every component takes
//! the trait it needs as an explicit parameter; none holds a client of its own.
//! Implementations must be `Sync` to be shared with the batch worker pool.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::StorageError;
use crate::model::{
    Assignment, AttractionId, CalendarDay, DayScore, HourlyStat, HourlyStatKey, Itinerary, LiveStatus,
    ScoreMethod, TripDayId, VenueId, WaitObservation,
};

/// Append-only source of raw telemetry.
pub trait ObservationStore {
    /// All observations for an attraction at or after `since` (venue-local).
    fn load_observations(
        &self,
        attraction_id: &AttractionId,
        since: NaiveDateTime,
    ) -> Result<Vec<WaitObservation>, StorageError>;
}

/// Derived hourly statistics keyed by bucket.
pub trait HourlyStatStore {
    fn read_hourly_stat(&self, key: &HourlyStatKey) -> Result<Option<HourlyStat>, StorageError>;

    /// Insert or replace the record for `stat.key`.
    fn write_hourly_stat(&self, stat: &HourlyStat) -> Result<(), StorageError>;
}

pub trait DayScoreStore {
    fn read_day_score(
        &self,
        venue_id: &VenueId,
        date: NaiveDate,
        method: ScoreMethod,
    ) -> Result<Option<DayScore>, StorageError>;

    fn write_day_score(&self, score: &DayScore) -> Result<(), StorageError>;
}

/// Externally supplied calendar facts.
pub trait CalendarSource {
    fn read_calendar_day(&self, venue_id: &VenueId, date: NaiveDate) -> Result<Option<CalendarDay>, StorageError>;
}

pub trait AssignmentStore {
    fn read_assignment(&self, trip_day: &TripDayId) -> Result<Option<Assignment>, StorageError>;
    fn write_assignment(&self, assignment: &Assignment) -> Result<(), StorageError>;
}

/// Versioned, append-only itinerary storage.
pub trait ItineraryStore {
    /// The highest published version for the day, if any.
    fn read_itinerary_version(&self, trip_day: &TripDayId) -> Result<Option<Itinerary>, StorageError>;

    /// Publishes `itinerary.version`, which must be exactly one past the latest.
    fn write_itinerary_version(&self, itinerary: &Itinerary) -> Result<(), StorageError>;
}

/// Current open/wait state for a venue's attractions.
pub trait LiveStatusProvider {
    /// Attractions missing from the map have no live data.
    fn live_status(&self, venue_id: &VenueId) -> HashMap<AttractionId, LiveStatus>;
}

/// Walking time between attractions inside a venue.
pub trait WalkTimeProvider {
    /// Minutes to walk to `to`, from `from` or from the entrance when `None`.
    fn walk_minutes(&self, from: Option<&AttractionId>, to: &AttractionId) -> u32;
}
