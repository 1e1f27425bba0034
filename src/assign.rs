//! Venue-to-day assignment optimizer (baseline implementation).
//!
//! Greedy construction in date order, then adjacent-pair swap refinement.
//! This is a bounded local search, not an exact optimizer: it returns the
//! best plan it finds within the pass cap.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::PlannerError;
use crate::evaluate::{DayContext, DayEvaluation, DaySignals, ScoreWeights, evaluate};
use crate::model::VenueId;

/// Swaps must beat the current cost by more than this.
const IMPROVEMENT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignOptions {
    /// Maximum local-search passes.
    pub local_search_iterations: usize,
    pub alternatives: AlternativeStrategy,
}

impl Default for AssignOptions {
    fn default() -> Self {
        Self {
            local_search_iterations: 10,
            alternatives: AlternativeStrategy::default(),
        }
    }
}

/// How "Plan B", "Plan C", ... are produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum AlternativeStrategy {
    None,
    /// Same mapping as the primary plan, with the total offset for display.
    ScoreOffset { offsets: Vec<f64> },
    /// Re-runs construction and refinement with each weight vector multiplied
    /// by the given factors; totals are reported under the primary weights.
    Reweighted { factors: Vec<ScoreWeights> },
}

impl Default for AlternativeStrategy {
    fn default() -> Self {
        AlternativeStrategy::ScoreOffset {
            offsets: vec![0.1, 0.2],
        }
    }
}

impl AlternativeStrategy {
    /// Plan B ignores half the crowd signal; Plan C leans on calendar shape.
    pub fn reweighted() -> Self {
        AlternativeStrategy::Reweighted {
            factors: vec![
                ScoreWeights {
                    crowd: 0.5,
                    hours: 1.0,
                    weekend: 1.0,
                    travel: 1.0,
                    streak: 1.0,
                    consecutive: 1.0,
                },
                ScoreWeights {
                    crowd: 1.0,
                    hours: 2.0,
                    weekend: 2.0,
                    travel: 2.0,
                    streak: 1.0,
                    consecutive: 1.0,
                },
            ],
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssignmentRequest {
    /// Trip dates, strictly increasing.
    pub dates: Vec<NaiveDate>,
    pub venues: Vec<VenueId>,
    /// Pinned days; a `None` pin is a locked rest day.
    pub locked: BTreeMap<NaiveDate, Option<VenueId>>,
    pub heavy_venues: HashSet<VenueId>,
    pub weights: ScoreWeights,
}

impl AssignmentRequest {
    pub fn new(dates: Vec<NaiveDate>, venues: Vec<VenueId>) -> Self {
        Self {
            dates,
            venues,
            locked: BTreeMap::new(),
            heavy_venues: HashSet::new(),
            weights: ScoreWeights::default(),
        }
    }

    pub fn validate(&self) -> Result<(), PlannerError> {
        if self.dates.is_empty() {
            return Err(PlannerError::invalid("trip has no dates"));
        }
        if self.dates.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(PlannerError::invalid("trip dates must be strictly increasing"));
        }
        if let Some(date) = self.locked.keys().find(|date| self.dates.binary_search(*date).is_err()) {
            return Err(PlannerError::invalid(format!("locked date {date} is outside the trip")));
        }
        if !self.weights.is_valid() {
            return Err(PlannerError::invalid("score weights must be finite and non-negative"));
        }
        Ok(())
    }
}

/// Every date from `start` through `end` inclusive.
pub fn trip_dates(start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>, PlannerError> {
    if end < start {
        return Err(PlannerError::invalid(format!("trip ends ({end}) before it starts ({start})")));
    }
    Ok(start.iter_days().take_while(|date| *date <= end).collect())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedDay {
    pub date: NaiveDate,
    /// `None` is a free day.
    pub venue_id: Option<VenueId>,
    pub locked: bool,
    pub evaluation: Option<DayEvaluation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativePlan {
    pub label: String,
    pub days: Vec<PlannedDay>,
    pub total_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentPlan {
    pub days: Vec<PlannedDay>,
    pub total_score: f64,
    /// Local-search passes run.
    pub passes: usize,
    pub swaps: usize,
    /// The pass cap was reached while swaps were still being found.
    pub hit_iteration_cap: bool,
    /// Venues left over once every free date was filled.
    pub unplaced: Vec<VenueId>,
    pub alternatives: Vec<AlternativePlan>,
}

/// Working state for one optimization run.
struct TripState<'a> {
    dates: &'a [NaiveDate],
    locked: Vec<bool>,
    slots: Vec<Option<VenueId>>,
    heavy_venues: &'a HashSet<VenueId>,
    signals: &'a DaySignals,
}

impl<'a> TripState<'a> {
    fn new(request: &'a AssignmentRequest, signals: &'a DaySignals) -> Self {
        let slots: Vec<Option<VenueId>> = request
            .dates
            .iter()
            .map(|date| request.locked.get(date).cloned().flatten())
            .collect();
        Self {
            dates: &request.dates,
            locked: request
                .dates
                .iter()
                .map(|date| request.locked.contains_key(date))
                .collect(),
            slots,
            heavy_venues: &request.heavy_venues,
            signals,
        }
    }

    /// The venue on the calendar day before `dates[i]`, if that day is in the trip.
    fn previous_venue(&self, i: usize) -> Option<&VenueId> {
        if i == 0 || self.dates[i - 1].succ_opt() != Some(self.dates[i]) {
            return None;
        }
        self.slots[i - 1].as_ref()
    }

    fn context(&self, i: usize) -> DayContext<'_> {
        DayContext {
            trip_start: self.dates[0],
            trip_end: self.dates[self.dates.len() - 1],
            previous_venue: self.previous_venue(i),
            heavy_venues: self.heavy_venues,
        }
    }

    fn evaluate_venue(&self, i: usize, venue_id: &VenueId, weights: &ScoreWeights) -> DayEvaluation {
        evaluate(venue_id, self.dates[i], weights, &self.context(i), self.signals)
    }

    fn day_score(&self, i: usize, weights: &ScoreWeights) -> f64 {
        self.slots[i]
            .as_ref()
            .map_or(0.0, |venue_id| self.evaluate_venue(i, venue_id, weights).score)
    }

    /// Cost of days `i..=i+2`: a swap at (i, i+1) also changes day i+2's previous venue.
    fn window_cost(&self, i: usize, weights: &ScoreWeights) -> f64 {
        let end = (i + 2).min(self.slots.len() - 1);
        (i..=end).map(|j| self.day_score(j, weights)).sum()
    }

    fn total_score(&self, weights: &ScoreWeights) -> f64 {
        (0..self.slots.len()).map(|i| self.day_score(i, weights)).sum()
    }

    fn planned_days(&self, weights: &ScoreWeights) -> Vec<PlannedDay> {
        (0..self.slots.len())
            .map(|i| PlannedDay {
                date: self.dates[i],
                venue_id: self.slots[i].clone(),
                locked: self.locked[i],
                evaluation: self.slots[i]
                    .as_ref()
                    .map(|venue_id| self.evaluate_venue(i, venue_id, weights)),
            })
            .collect()
    }
}

pub fn solve(
    request: &AssignmentRequest,
    signals: &DaySignals,
    options: &AssignOptions,
) -> Result<AssignmentPlan, PlannerError> {
    request.validate()?;

    let mut state = TripState::new(request, signals);
    let unplaced = construct(&mut state, &request.venues, &request.locked, &request.weights);
    let (passes, swaps, hit_iteration_cap) =
        local_search(&mut state, &request.weights, options.local_search_iterations);

    let days = state.planned_days(&request.weights);
    let total_score = state.total_score(&request.weights);
    let alternatives = alternatives(request, signals, options, &days, total_score);

    tracing::info!(
        dates = request.dates.len(),
        venues = request.venues.len(),
        total_score,
        passes,
        swaps,
        "Assignment optimized"
    );

    Ok(AssignmentPlan {
        days,
        total_score,
        passes,
        swaps,
        hit_iteration_cap,
        unplaced,
        alternatives,
    })
}

/// Greedy construction. Returns venues that did not get a day.
fn construct(
    state: &mut TripState<'_>,
    venues: &[VenueId],
    locked: &BTreeMap<NaiveDate, Option<VenueId>>,
    weights: &ScoreWeights,
) -> Vec<VenueId> {
    let pinned: HashSet<&VenueId> = locked.values().flatten().collect();
    let mut pool: Vec<VenueId> = venues
        .iter()
        .filter(|venue_id| !pinned.contains(venue_id))
        .cloned()
        .collect();
    // Sorted pool + strict comparison breaks ties by venue id.
    pool.sort();
    pool.dedup();

    for i in 0..state.slots.len() {
        if state.locked[i] || pool.is_empty() {
            continue;
        }

        let mut best: Option<(usize, f64)> = None;
        for (pool_index, venue_id) in pool.iter().enumerate() {
            let score = state.evaluate_venue(i, venue_id, weights).score;
            if best.is_none_or(|(_, best_score)| score < best_score) {
                best = Some((pool_index, score));
            }
        }

        if let Some((pool_index, _)) = best {
            state.slots[i] = Some(pool.remove(pool_index));
        }
    }

    pool
}

/// Adjacent-swap refinement. Returns (passes, swaps, hit_cap).
fn local_search(state: &mut TripState<'_>, weights: &ScoreWeights, max_passes: usize) -> (usize, usize, bool) {
    let mut passes = 0;
    let mut swaps = 0;
    let mut swapped = false;

    for _ in 0..max_passes {
        passes += 1;
        swapped = false;

        for i in 0..state.slots.len().saturating_sub(1) {
            if state.locked[i] || state.locked[i + 1] {
                continue;
            }
            match (&state.slots[i], &state.slots[i + 1]) {
                (Some(a), Some(b)) if a != b => {}
                _ => continue,
            }

            let before = state.window_cost(i, weights);
            state.slots.swap(i, i + 1);
            let after = state.window_cost(i, weights);

            if after + IMPROVEMENT_EPSILON < before {
                swaps += 1;
                swapped = true;
                tracing::debug!(
                    first = %state.dates[i],
                    second = %state.dates[i + 1],
                    before,
                    after,
                    "Committed adjacent swap"
                );
            } else {
                state.slots.swap(i, i + 1);
            }
        }

        if !swapped {
            break;
        }
    }

    (passes, swaps, swapped && passes == max_passes)
}

fn plan_label(index: usize) -> String {
    match u8::try_from(index).ok().and_then(|i| b'B'.checked_add(i)) {
        Some(letter) if letter <= b'Z' => format!("Plan {}", letter as char),
        _ => format!("Plan {}", index + 2),
    }
}

fn alternatives(
    request: &AssignmentRequest,
    signals: &DaySignals,
    options: &AssignOptions,
    primary_days: &[PlannedDay],
    primary_total: f64,
) -> Vec<AlternativePlan> {
    match &options.alternatives {
        AlternativeStrategy::None => Vec::new(),
        AlternativeStrategy::ScoreOffset { offsets } => offsets
            .iter()
            .enumerate()
            .map(|(k, offset)| AlternativePlan {
                label: plan_label(k),
                days: primary_days.to_vec(),
                total_score: primary_total + offset,
            })
            .collect(),
        AlternativeStrategy::Reweighted { factors } => factors
            .iter()
            .enumerate()
            .map(|(k, factor)| {
                let weights = request.weights.scaled(factor);
                let mut state = TripState::new(request, signals);
                construct(&mut state, &request.venues, &request.locked, &weights);
                local_search(&mut state, &weights, options.local_search_iterations);
                AlternativePlan {
                    label: plan_label(k),
                    days: state.planned_days(&request.weights),
                    total_score: state.total_score(&request.weights),
                }
            })
            .collect(),
    }
}
