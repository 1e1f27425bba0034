//! Day-score evaluation: one scalar cost for visiting a venue on a date.
//!
//! Lower is better. The evaluator is pure; both optimizers call it many times
//! per run with different previous-day contexts.

use std::collections::{HashMap, HashSet};

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::crowd::CrowdEstimate;
use crate::error::StorageError;
use crate::model::{OperatingHours, ScoreMethod, VenueId};
use crate::traits::{CalendarSource, DayScoreStore};

/// Crowd component used when no estimate exists at all.
pub const NEUTRAL_CROWD: f64 = 0.5;
/// Hours component used when operating hours are unknown.
pub const UNKNOWN_HOURS_PENALTY: f64 = 0.5;
/// Operating hours at or above this are not penalized.
const FULL_DAY_HOURS: f64 = 10.0;

/// Per-component weights. All must be non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub crowd: f64,
    pub hours: f64,
    pub weekend: f64,
    pub travel: f64,
    pub streak: f64,
    pub consecutive: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            crowd: 1.0,
            hours: 0.3,
            weekend: 0.2,
            travel: 0.3,
            streak: 0.5,
            consecutive: 0.1,
        }
    }
}

impl ScoreWeights {
    pub fn is_valid(&self) -> bool {
        [self.crowd, self.hours, self.weekend, self.travel, self.streak, self.consecutive]
            .iter()
            .all(|w| w.is_finite() && *w >= 0.0)
    }

    /// Multiplies every weight component-wise.
    pub fn scaled(&self, factors: &ScoreWeights) -> ScoreWeights {
        ScoreWeights {
            crowd: self.crowd * factors.crowd,
            hours: self.hours * factors.hours,
            weekend: self.weekend * factors.weekend,
            travel: self.travel * factors.travel,
            streak: self.streak * factors.streak,
            consecutive: self.consecutive * factors.consecutive,
        }
    }
}

/// Unweighted components, each in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub crowd: f64,
    pub hours: f64,
    pub weekend: f64,
    pub travel: f64,
    pub streak: f64,
    pub consecutive: f64,
}

impl ScoreBreakdown {
    pub fn weighted_total(&self, weights: &ScoreWeights) -> f64 {
        weights.crowd * self.crowd
            + weights.hours * self.hours
            + weights.weekend * self.weekend
            + weights.travel * self.travel
            + weights.streak * self.streak
            + weights.consecutive * self.consecutive
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DayEvaluation {
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// What is known about one venue on one date.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VenueDaySignals {
    pub crowd: CrowdEstimate,
    pub hours: Option<OperatingHours>,
}

/// Signals for every (venue, date) a run may evaluate, loaded up front.
#[derive(Debug, Clone, Default)]
pub struct DaySignals {
    days: HashMap<(VenueId, NaiveDate), VenueDaySignals>,
}

impl DaySignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, venue_id: VenueId, date: NaiveDate, signals: VenueDaySignals) {
        self.days.insert((venue_id, date), signals);
    }

    pub fn get(&self, venue_id: &VenueId, date: NaiveDate) -> Option<&VenueDaySignals> {
        self.days.get(&(venue_id.clone(), date))
    }

    /// Reads every persisted day score and calendar day for the cross product.
    pub fn load<S>(store: &S, venues: &[VenueId], dates: &[NaiveDate]) -> Result<Self, StorageError>
    where
        S: DayScoreStore + CalendarSource + ?Sized,
    {
        let mut signals = DaySignals::new();
        for venue_id in venues {
            for &date in dates {
                let read = |method| -> Result<Option<f64>, StorageError> {
                    Ok(store
                        .read_day_score(venue_id, date, method)?
                        .map(|score| score.crowd_score))
                };
                let crowd = CrowdEstimate {
                    calendar: read(ScoreMethod::Calendar)?,
                    computed: read(ScoreMethod::Computed)?,
                    hybrid: read(ScoreMethod::Hybrid)?,
                };
                let hours = store
                    .read_calendar_day(venue_id, date)?
                    .and_then(|day| day.hours);
                signals.insert(venue_id.clone(), date, VenueDaySignals { crowd, hours });
            }
        }
        Ok(signals)
    }
}

/// Trip-level context for one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct DayContext<'a> {
    pub trip_start: NaiveDate,
    pub trip_end: NaiveDate,
    /// Venue assigned on the immediately preceding date, if any.
    pub previous_venue: Option<&'a VenueId>,
    pub heavy_venues: &'a HashSet<VenueId>,
}

impl<'a> DayContext<'a> {
    pub fn with_previous(self, previous_venue: Option<&'a VenueId>) -> Self {
        Self { previous_venue, ..self }
    }
}

pub fn evaluate(
    venue_id: &VenueId,
    date: NaiveDate,
    weights: &ScoreWeights,
    context: &DayContext<'_>,
    signals: &DaySignals,
) -> DayEvaluation {
    let day = signals.get(venue_id, date);
    let breakdown = ScoreBreakdown {
        crowd: crowd_component(day.map(|d| &d.crowd)),
        hours: hours_component(day.and_then(|d| d.hours)),
        weekend: flag(matches!(date.weekday(), Weekday::Sat | Weekday::Sun)),
        travel: flag(date == context.trip_start || date == context.trip_end),
        streak: flag(
            context.heavy_venues.contains(venue_id)
                && context
                    .previous_venue
                    .is_some_and(|previous| context.heavy_venues.contains(previous)),
        ),
        consecutive: flag(context.previous_venue.is_some()),
    };

    DayEvaluation {
        score: breakdown.weighted_total(weights),
        breakdown,
    }
}

fn flag(condition: bool) -> f64 {
    if condition { 1.0 } else { 0.0 }
}

fn crowd_component(crowd: Option<&CrowdEstimate>) -> f64 {
    crowd
        .and_then(CrowdEstimate::preferred)
        .unwrap_or(NEUTRAL_CROWD)
}

fn hours_component(hours: Option<OperatingHours>) -> f64 {
    match hours {
        Some(hours) => {
            let open_hours = hours.minutes() as f64 / 60.0;
            if open_hours >= FULL_DAY_HOURS {
                0.0
            } else {
                ((FULL_DAY_HOURS - open_hours) / FULL_DAY_HOURS).clamp(0.0, 1.0)
            }
        }
        None => UNKNOWN_HOURS_PENALTY,
    }
}
