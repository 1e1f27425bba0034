//! Crowd score estimation for a venue on a date.
//!
//! Three estimators are computed and persisted side by side so a decision can
//! always be traced back to the method that backed it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::aggregate::{BatchReport, run_units};
use crate::error::StorageError;
use crate::model::{AttractionId, CalendarDay, DayScore, ScoreMethod, VenueId};
use crate::stats::HourlyStatIndex;
use crate::traits::{CalendarSource, DayScoreStore, HourlyStatStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrowdOptions {
    /// First hour (inclusive) of the window the computed method looks at.
    pub useful_start_hour: u8,
    /// Last hour (exclusive).
    pub useful_end_hour: u8,
    /// Number of highest p80 values averaged.
    pub top_n: usize,
    /// Average p80 (minutes) treated as a fully packed day.
    pub ceiling_minutes: f64,
    /// Share of the calendar estimate in the hybrid blend.
    pub calendar_weight: f64,
}

impl Default for CrowdOptions {
    fn default() -> Self {
        Self {
            useful_start_hour: 10,
            useful_end_hour: 18,
            top_n: 10,
            ceiling_minutes: 180.0,
            calendar_weight: 0.7,
        }
    }
}

/// All three estimates for one (venue, date).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CrowdEstimate {
    pub calendar: Option<f64>,
    pub computed: Option<f64>,
    pub hybrid: Option<f64>,
}

impl CrowdEstimate {
    pub fn get(&self, method: ScoreMethod) -> Option<f64> {
        match method {
            ScoreMethod::Calendar => self.calendar,
            ScoreMethod::Computed => self.computed,
            ScoreMethod::Hybrid => self.hybrid,
        }
    }

    /// Hybrid, then calendar, then computed.
    pub fn preferred(&self) -> Option<f64> {
        ScoreMethod::PREFERENCE.iter().find_map(|method| self.get(*method))
    }

    pub fn day_scores(&self, venue_id: &VenueId, date: NaiveDate) -> Vec<DayScore> {
        [ScoreMethod::Calendar, ScoreMethod::Computed, ScoreMethod::Hybrid]
            .into_iter()
            .filter_map(|method| {
                self.get(method).map(|crowd_score| DayScore {
                    venue_id: venue_id.clone(),
                    date,
                    method,
                    crowd_score,
                })
            })
            .collect()
    }
}

pub fn calendar_score(day: Option<&CalendarDay>) -> Option<f64> {
    day.and_then(|day| day.crowd_percent)
        .map(|percent| (percent as f64 / 100.0).clamp(0.0, 1.0))
}

/// Mean of the top-N p80 waits inside the useful hours, scaled by the ceiling.
pub fn computed_score(
    stats: &HourlyStatIndex,
    attractions: &[AttractionId],
    date: NaiveDate,
    options: &CrowdOptions,
) -> Option<f64> {
    let mut p80s: Vec<u32> = attractions
        .iter()
        .flat_map(|attraction_id| {
            (options.useful_start_hour..options.useful_end_hour)
                .filter_map(move |hour| stats.get(attraction_id, date, hour).and_then(|stat| stat.p80))
        })
        .collect();
    if p80s.is_empty() || options.top_n == 0 {
        return None;
    }

    p80s.sort_unstable_by(|a, b| b.cmp(a));
    let top = &p80s[..options.top_n.min(p80s.len())];
    let mean = top.iter().map(|&v| v as f64).sum::<f64>() / top.len() as f64;
    Some((mean / options.ceiling_minutes).clamp(0.0, 1.0))
}

pub fn hybrid_score(calendar: Option<f64>, computed: Option<f64>, options: &CrowdOptions) -> Option<f64> {
    match (calendar, computed) {
        (Some(calendar), Some(computed)) => {
            Some(options.calendar_weight * calendar + (1.0 - options.calendar_weight) * computed)
        }
        (Some(calendar), None) => Some(calendar),
        (None, Some(computed)) => Some(computed),
        (None, None) => None,
    }
}

pub fn estimate_crowd(
    calendar_day: Option<&CalendarDay>,
    stats: &HourlyStatIndex,
    attractions: &[AttractionId],
    date: NaiveDate,
    options: &CrowdOptions,
) -> CrowdEstimate {
    let calendar = calendar_score(calendar_day);
    let computed = computed_score(stats, attractions, date, options);
    CrowdEstimate {
        calendar,
        computed,
        hybrid: hybrid_score(calendar, computed, options),
    }
}

/// Estimates and writes every available method for one day. Returns records written.
pub fn score_venue_day<S>(
    store: &S,
    venue_id: &VenueId,
    attractions: &[AttractionId],
    date: NaiveDate,
    stats: &HourlyStatIndex,
    options: &CrowdOptions,
) -> Result<usize, StorageError>
where
    S: CalendarSource + DayScoreStore + ?Sized,
{
    let calendar_day = store.read_calendar_day(venue_id, date)?;
    let estimate = estimate_crowd(calendar_day.as_ref(), stats, attractions, date, options);
    let scores = estimate.day_scores(venue_id, date);
    for score in &scores {
        store.write_day_score(score)?;
    }
    tracing::debug!(
        venue_id = %venue_id,
        %date,
        calendar = ?estimate.calendar,
        computed = ?estimate.computed,
        hybrid = ?estimate.hybrid,
        "Scored venue day"
    );
    Ok(scores.len())
}

/// Scores a venue across many dates, loading the needed stats once up front.
pub fn score_venue_days<S>(
    store: &S,
    venue_id: &VenueId,
    attractions: &[AttractionId],
    dates: &[NaiveDate],
    options: &CrowdOptions,
    max_workers: usize,
) -> Result<BatchReport, StorageError>
where
    S: CalendarSource + DayScoreStore + HourlyStatStore + Sync + ?Sized,
{
    let stats = HourlyStatIndex::load(store, attractions, dates)?;
    Ok(run_units("crowd scoring", max_workers, dates, |date| {
        score_venue_day(store, venue_id, attractions, *date, &stats, options)
    }))
}
