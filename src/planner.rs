//! Orchestration entry points.
//!
//! Each call loads everything its algorithm needs up front, runs the pure
//! component over the in-memory data and writes the results back. Callers
//! own locking: at most one run per venue or trip key at a time.

use std::collections::{BTreeMap, HashSet};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::aggregate::{BatchReport, aggregate_batch};
use crate::assign::{AssignmentPlan, AssignmentRequest, solve, trip_dates};
use crate::config::PlannerConfig;
use crate::crowd;
use crate::error::PlannerError;
use crate::evaluate::DaySignals;
use crate::itinerary::{DayPlanRequest, schedule_day};
use crate::model::{Assignment, Attraction, AttractionId, Itinerary, TripDayId, TripId, VenueId};
use crate::replan::{ReplanOutcome, repair};
use crate::stats::HourlyStatIndex;
use crate::traits::{
    AssignmentStore, CalendarSource, DayScoreStore, HourlyStatStore, ItineraryStore, LiveStatusProvider,
    ObservationStore, WalkTimeProvider,
};

/// Recomputes hourly stats for the given attractions.
pub fn aggregate_attractions<S>(
    store: &S,
    attractions: &[AttractionId],
    now: NaiveDateTime,
    config: &PlannerConfig,
) -> BatchReport
where
    S: ObservationStore + HourlyStatStore + Sync + ?Sized,
{
    aggregate_batch(store, attractions, now, &config.aggregate)
}

/// Writes calendar, computed and hybrid crowd scores for a venue over a date range.
pub fn score_venue_days<S>(
    store: &S,
    venue_id: &VenueId,
    attractions: &[AttractionId],
    start: NaiveDate,
    end: NaiveDate,
    config: &PlannerConfig,
) -> Result<BatchReport, PlannerError>
where
    S: CalendarSource + DayScoreStore + HourlyStatStore + Sync + ?Sized,
{
    let dates = trip_dates(start, end)?;
    Ok(crowd::score_venue_days(
        store,
        venue_id,
        attractions,
        &dates,
        &config.crowd,
        config.aggregate.max_workers,
    )?)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripRequest {
    pub trip_id: TripId,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub venues: Vec<VenueId>,
    /// New pins; `None` locks a rest day.
    #[serde(default)]
    pub locked: BTreeMap<NaiveDate, Option<VenueId>>,
    #[serde(default)]
    pub heavy_venues: HashSet<VenueId>,
}

/// Assigns venues to trip days and persists the plan.
///
/// Locked assignments already in the store are never rewritten. Pins from the
/// request override them and are persisted as locked assignments.
pub fn plan_trip<S>(store: &S, request: &TripRequest, config: &PlannerConfig) -> Result<AssignmentPlan, PlannerError>
where
    S: DayScoreStore + CalendarSource + AssignmentStore + ?Sized,
{
    let dates = trip_dates(request.start, request.end)?;

    let mut stored_locks: BTreeMap<NaiveDate, Option<VenueId>> = BTreeMap::new();
    for &date in &dates {
        let trip_day = TripDayId::new(request.trip_id.clone(), date);
        if let Some(assignment) = store.read_assignment(&trip_day)?.filter(|a| a.locked) {
            stored_locks.insert(date, assignment.venue_id);
        }
    }
    let mut locked = stored_locks.clone();
    locked.extend(request.locked.clone());

    let mut venues: Vec<VenueId> = request.venues.clone();
    venues.extend(locked.values().flatten().cloned());
    venues.sort();
    venues.dedup();
    let signals = DaySignals::load(store, &venues, &dates)?;

    let assignment_request = AssignmentRequest {
        dates,
        venues: request.venues.clone(),
        locked,
        heavy_venues: request.heavy_venues.clone(),
        weights: config.weights,
    };
    let plan = solve(&assignment_request, &signals, &config.assign)?;

    for day in &plan.days {
        if day.locked && stored_locks.get(&day.date) == Some(&day.venue_id) {
            continue;
        }
        store.write_assignment(&Assignment {
            trip_day: TripDayId::new(request.trip_id.clone(), day.date),
            venue_id: day.venue_id.clone(),
            locked: day.locked,
            score: day.evaluation.map(|eval| eval.score),
            breakdown: day.evaluation.map(|eval| eval.breakdown),
        })?;
    }

    Ok(plan)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedDay {
    pub itinerary: Itinerary,
    pub unscheduled: Vec<AttractionId>,
}

/// Schedules one day and publishes it as the next itinerary version.
pub fn plan_day<S, W>(
    store: &S,
    trip_id: &TripId,
    request: &DayPlanRequest,
    walk: &W,
    config: &PlannerConfig,
) -> Result<PublishedDay, PlannerError>
where
    S: HourlyStatStore + ItineraryStore + ?Sized,
    W: WalkTimeProvider + ?Sized,
{
    let attractions: Vec<AttractionId> = request
        .wishes
        .iter()
        .map(|wish| wish.attraction.id.clone())
        .collect();
    let stats = HourlyStatIndex::load(store, &attractions, &[request.date])?;
    let schedule = schedule_day(request, &stats, walk, &config.schedule)?;

    let trip_day = TripDayId::new(trip_id.clone(), request.date);
    let version = store
        .read_itinerary_version(&trip_day)?
        .map_or(1, |latest| latest.version + 1);

    let itinerary = Itinerary {
        trip_day,
        venue_id: request.venue_id.clone(),
        version,
        hours: request.hours,
        items: schedule.items,
        metrics: schedule.metrics,
        repairs: Vec::new(),
    };
    store.write_itinerary_version(&itinerary)?;

    Ok(PublishedDay {
        itinerary,
        unscheduled: schedule.unscheduled,
    })
}

/// Repairs the latest published version against live status and publishes the result.
///
/// Returns `None` when nothing has been published for the day yet.
pub fn replan_day<S, L>(
    store: &S,
    trip_day: &TripDayId,
    live: &L,
    candidates: &[Attraction],
    config: &PlannerConfig,
) -> Result<Option<ReplanOutcome>, PlannerError>
where
    S: ItineraryStore + ?Sized,
    L: LiveStatusProvider + ?Sized,
{
    let Some(latest) = store.read_itinerary_version(trip_day)? else {
        tracing::debug!(trip_id = %trip_day.trip_id, date = %trip_day.date, "No itinerary to replan");
        return Ok(None);
    };

    let statuses = live.live_status(&latest.venue_id);
    let outcome = repair(&latest, &statuses, candidates, &config.replan);
    store.write_itinerary_version(&outcome.itinerary)?;
    Ok(Some(outcome))
}
