//! In-memory implementation of every storage trait.
//!
//! Thread-safe so it can back the parallel batch runners; useful for tests and
//! for callers that load their data up front.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::StorageError;
use crate::model::{
    Assignment, AttractionId, CalendarDay, DayScore, HourlyStat, HourlyStatKey, Itinerary, ScoreMethod,
    TripDayId, VenueId, WaitObservation,
};
use crate::traits::{
    AssignmentStore, CalendarSource, DayScoreStore, HourlyStatStore, ItineraryStore, ObservationStore,
};

#[derive(Debug, Default)]
pub struct InMemoryStore {
    observations: RwLock<HashMap<AttractionId, Vec<WaitObservation>>>,
    hourly_stats: RwLock<HashMap<HourlyStatKey, HourlyStat>>,
    day_scores: RwLock<HashMap<(VenueId, NaiveDate, ScoreMethod), DayScore>>,
    calendar: RwLock<HashMap<(VenueId, NaiveDate), CalendarDay>>,
    assignments: RwLock<BTreeMap<TripDayId, Assignment>>,
    itineraries: RwLock<BTreeMap<TripDayId, Vec<Itinerary>>>,
}

fn poisoned<T>(_: PoisonError<T>) -> StorageError {
    StorageError::Backend("in-memory store lock poisoned".to_string())
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_observations(
        &self,
        observations: impl IntoIterator<Item = WaitObservation>,
    ) -> Result<(), StorageError> {
        let mut map = self.observations.write().map_err(poisoned)?;
        for observation in observations {
            map.entry(observation.attraction_id.clone()).or_default().push(observation);
        }
        Ok(())
    }

    pub fn insert_calendar_day(&self, day: CalendarDay) -> Result<(), StorageError> {
        let mut map = self.calendar.write().map_err(poisoned)?;
        map.insert((day.venue_id.clone(), day.date), day);
        Ok(())
    }

    /// Every published version for a day, oldest first.
    pub fn itinerary_history(&self, trip_day: &TripDayId) -> Result<Vec<Itinerary>, StorageError> {
        let map = self.itineraries.read().map_err(poisoned)?;
        Ok(map.get(trip_day).cloned().unwrap_or_default())
    }

    pub fn hourly_stat_count(&self) -> Result<usize, StorageError> {
        Ok(self.hourly_stats.read().map_err(poisoned)?.len())
    }
}

impl ObservationStore for InMemoryStore {
    fn load_observations(
        &self,
        attraction_id: &AttractionId,
        since: NaiveDateTime,
    ) -> Result<Vec<WaitObservation>, StorageError> {
        let map = self.observations.read().map_err(poisoned)?;
        Ok(map
            .get(attraction_id)
            .map(|all| all.iter().filter(|obs| obs.timestamp >= since).cloned().collect())
            .unwrap_or_default())
    }
}

impl HourlyStatStore for InMemoryStore {
    fn read_hourly_stat(&self, key: &HourlyStatKey) -> Result<Option<HourlyStat>, StorageError> {
        Ok(self.hourly_stats.read().map_err(poisoned)?.get(key).cloned())
    }

    fn write_hourly_stat(&self, stat: &HourlyStat) -> Result<(), StorageError> {
        let mut map = self.hourly_stats.write().map_err(poisoned)?;
        map.insert(stat.key.clone(), stat.clone());
        Ok(())
    }
}

impl DayScoreStore for InMemoryStore {
    fn read_day_score(
        &self,
        venue_id: &VenueId,
        date: NaiveDate,
        method: ScoreMethod,
    ) -> Result<Option<DayScore>, StorageError> {
        let map = self.day_scores.read().map_err(poisoned)?;
        Ok(map.get(&(venue_id.clone(), date, method)).cloned())
    }

    fn write_day_score(&self, score: &DayScore) -> Result<(), StorageError> {
        let mut map = self.day_scores.write().map_err(poisoned)?;
        map.insert((score.venue_id.clone(), score.date, score.method), score.clone());
        Ok(())
    }
}

impl CalendarSource for InMemoryStore {
    fn read_calendar_day(&self, venue_id: &VenueId, date: NaiveDate) -> Result<Option<CalendarDay>, StorageError> {
        let map = self.calendar.read().map_err(poisoned)?;
        Ok(map.get(&(venue_id.clone(), date)).cloned())
    }
}

impl AssignmentStore for InMemoryStore {
    fn read_assignment(&self, trip_day: &TripDayId) -> Result<Option<Assignment>, StorageError> {
        Ok(self.assignments.read().map_err(poisoned)?.get(trip_day).cloned())
    }

    fn write_assignment(&self, assignment: &Assignment) -> Result<(), StorageError> {
        let mut map = self.assignments.write().map_err(poisoned)?;
        map.insert(assignment.trip_day.clone(), assignment.clone());
        Ok(())
    }
}

impl ItineraryStore for InMemoryStore {
    fn read_itinerary_version(&self, trip_day: &TripDayId) -> Result<Option<Itinerary>, StorageError> {
        let map = self.itineraries.read().map_err(poisoned)?;
        Ok(map.get(trip_day).and_then(|versions| versions.last().cloned()))
    }

    fn write_itinerary_version(&self, itinerary: &Itinerary) -> Result<(), StorageError> {
        let mut map = self.itineraries.write().map_err(poisoned)?;
        let versions = map.entry(itinerary.trip_day.clone()).or_default();
        let expected = versions.last().map_or(1, |latest| latest.version + 1);
        if itinerary.version != expected {
            return Err(StorageError::VersionConflict {
                expected,
                found: itinerary.version,
            });
        }
        versions.push(itinerary.clone());
        Ok(())
    }
}
