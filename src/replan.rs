//! Live repair of a published itinerary.
//!
//! Rides whose attraction is closed or over the acceptable wait are swapped
//! in place for the best open candidate; nothing else moves. Fixed items
//! such as shows are reported but never rewritten, and a replacement keeps
//! the slot's risk score. Every pass yields a new version and leaves the
//! input untouched.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::model::{
    Attraction, AttractionId, ItemType, Itinerary, ItineraryItem, LiveStatus, RepairNote, minute_of_day,
    time_at_minute,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplanOptions {
    /// Live waits above this are treated as a divergence.
    pub acceptable_wait_minutes: u32,
    /// Live wait below this share of the planned wait is reported as low.
    pub low_wait_ratio: f64,
}

impl Default for ReplanOptions {
    fn default() -> Self {
        Self {
            acceptable_wait_minutes: 60,
            low_wait_ratio: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DivergenceKind {
    Closed,
    HighWait { live_wait: u32, threshold: u32 },
    /// Reported only; signals room for more.
    LowWait { live_wait: u32, expected_wait: u32 },
}

impl DivergenceKind {
    pub fn needs_repair(&self) -> bool {
        matches!(self, DivergenceKind::Closed | DivergenceKind::HighWait { .. })
    }

    fn reason(&self) -> String {
        match self {
            DivergenceKind::Closed => "attraction closed".to_string(),
            DivergenceKind::HighWait { live_wait, threshold } => {
                format!("live wait {live_wait} min exceeds {threshold} min threshold")
            }
            DivergenceKind::LowWait {
                live_wait,
                expected_wait,
            } => format!("live wait {live_wait} min well under planned {expected_wait} min"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Divergence {
    /// Item index in the version that was checked.
    pub index: usize,
    pub attraction_id: AttractionId,
    pub kind: DivergenceKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplanOutcome {
    /// The new version (`previous + 1`).
    pub itinerary: Itinerary,
    pub divergences: Vec<Divergence>,
}

impl ReplanOutcome {
    pub fn low_wait_signals(&self) -> impl Iterator<Item = &Divergence> {
        self.divergences.iter().filter(|d| !d.kind.needs_repair())
    }
}

/// Divergences in ascending item order.
pub fn detect_divergences(
    itinerary: &Itinerary,
    live: &HashMap<AttractionId, LiveStatus>,
    options: &ReplanOptions,
) -> Vec<Divergence> {
    itinerary
        .items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let attraction_id = item.attraction_id.as_ref()?;
            let status = live.get(attraction_id)?;
            let kind = if !status.is_open {
                DivergenceKind::Closed
            } else if status.wait_minutes > options.acceptable_wait_minutes {
                DivergenceKind::HighWait {
                    live_wait: status.wait_minutes,
                    threshold: options.acceptable_wait_minutes,
                }
            } else if (status.wait_minutes as f64) < item.expected_wait as f64 * options.low_wait_ratio {
                DivergenceKind::LowWait {
                    live_wait: status.wait_minutes,
                    expected_wait: item.expected_wait,
                }
            } else {
                return None;
            };
            Some(Divergence {
                index,
                attraction_id: attraction_id.clone(),
                kind,
            })
        })
        .collect()
}

/// Best open, unscheduled candidate that fits before `end_limit` (minutes).
fn pick_replacement<'a>(
    candidates: &'a [Attraction],
    scheduled: &HashSet<AttractionId>,
    live: &HashMap<AttractionId, LiveStatus>,
    start: i32,
    walk: u32,
    end_limit: i32,
    options: &ReplanOptions,
) -> Option<(&'a Attraction, u32)> {
    candidates
        .iter()
        .filter(|candidate| !scheduled.contains(&candidate.id))
        .filter_map(|candidate| {
            let status = live.get(&candidate.id)?;
            let fits = start + (status.wait_minutes + walk) as i32 <= end_limit;
            (status.is_open && status.wait_minutes <= options.acceptable_wait_minutes && fits)
                .then_some((candidate, status.wait_minutes))
        })
        .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.id.cmp(&b.0.id)))
}

pub fn repair(
    itinerary: &Itinerary,
    live: &HashMap<AttractionId, LiveStatus>,
    candidates: &[Attraction],
    options: &ReplanOptions,
) -> ReplanOutcome {
    let divergences = detect_divergences(itinerary, live, options);

    let mut items: Vec<ItineraryItem> = itinerary.items.clone();
    for item in items.iter_mut().filter(|item| item.item_type == ItemType::Ride) {
        if let Some(status) = item.attraction_id.as_ref().and_then(|id| live.get(id)) {
            item.expected_wait = status.wait_minutes;
        }
    }

    let mut scheduled: HashSet<AttractionId> = items.iter().filter_map(|item| item.attraction_id.clone()).collect();
    let mut repairs = Vec::new();
    let close = minute_of_day(itinerary.hours.close);

    // Descending so splicing never shifts an index still to be processed.
    for divergence in divergences.iter().rev().filter(|d| d.kind.needs_repair()) {
        let index = divergence.index;
        if items[index].item_type != ItemType::Ride {
            tracing::debug!(
                attraction_id = %divergence.attraction_id,
                "Left fixed item in place"
            );
            continue;
        }
        let start_time = items[index].start;
        let start = minute_of_day(start_time);
        let walk = items[index].expected_walk;
        let risk_score = items[index].risk_score;
        let end_limit = items
            .get(index + 1)
            .map_or(close, |next| minute_of_day(next.start));

        let replacement = pick_replacement(candidates, &scheduled, live, start, walk, end_limit, options);
        let reason = divergence.kind.reason();
        match replacement {
            Some((attraction, wait)) => {
                tracing::debug!(
                    removed = %divergence.attraction_id,
                    replacement = %attraction.id,
                    %reason,
                    "Swapped itinerary item"
                );
                scheduled.insert(attraction.id.clone());
                items[index] = ItineraryItem {
                    index,
                    item_type: ItemType::Ride,
                    title: attraction.title.clone(),
                    attraction_id: Some(attraction.id.clone()),
                    start: start_time,
                    end: time_at_minute(start + (wait + walk) as i32),
                    expected_wait: wait,
                    expected_walk: walk,
                    risk_score,
                };
                repairs.push(RepairNote {
                    removed: divergence.attraction_id.clone(),
                    replacement: Some(attraction.id.clone()),
                    kind: divergence.kind,
                    reason: format!("{reason}; replaced with {} ({wait} min live wait)", attraction.title),
                });
            }
            None => {
                tracing::debug!(removed = %divergence.attraction_id, %reason, "Dropped itinerary item");
                items.remove(index);
                repairs.push(RepairNote {
                    removed: divergence.attraction_id.clone(),
                    replacement: None,
                    kind: divergence.kind,
                    reason: format!("{reason}; no open candidate fits the slot"),
                });
            }
        }
    }
    repairs.reverse();

    for (index, item) in items.iter_mut().enumerate() {
        item.index = index;
    }

    let mut next = Itinerary {
        trip_day: itinerary.trip_day.clone(),
        venue_id: itinerary.venue_id.clone(),
        version: itinerary.version + 1,
        hours: itinerary.hours,
        items,
        metrics: itinerary.metrics,
        repairs,
    };
    next.recompute_metrics();

    tracing::info!(
        venue_id = %next.venue_id,
        version = next.version,
        divergences = divergences.len(),
        repairs = next.repairs.len(),
        "Itinerary repaired"
    );

    ReplanOutcome {
        itinerary: next,
        divergences,
    }
}
