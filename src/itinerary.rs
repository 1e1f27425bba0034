//! Single-day itinerary scheduler.
//!
//! The day is a timeline of fixed-width slots from open to close. Fixed items
//! (shows, meals) reserve their slots first. Must-do attractions are then
//! placed longest-wait-first inside the rope-drop window, and the rest of the
//! day is filled greedily, re-scoring every remaining candidate at each
//! insertion point because expected waits change hour by hour.

use std::cmp::Ordering;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::PlannerError;
use crate::model::{
    Attraction, AttractionId, ItemType, ItineraryItem, ItineraryMetrics, OperatingHours, VenueId, metrics_for,
    minute_of_day, time_at_minute,
};
use crate::stats::HourlyStatIndex;
use crate::traits::WalkTimeProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Optional,
    Want,
    Must,
}

impl Priority {
    pub fn weight(self) -> f64 {
        match self {
            Priority::Must => 3.0,
            Priority::Want => 2.0,
            Priority::Optional => 1.0,
        }
    }
}

/// Which percentile stands in for the expected wait.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitMode {
    /// p50
    Optimistic,
    /// p80
    #[default]
    Conservative,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wish {
    pub attraction: Attraction,
    pub priority: Priority,
}

impl Wish {
    pub fn new(attraction: Attraction, priority: Priority) -> Self {
        Self { attraction, priority }
    }
}

/// A commitment with a reserved time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedItem {
    pub item_type: ItemType,
    pub title: String,
    pub attraction_id: Option<AttractionId>,
    #[serde(with = "crate::model::hhmm")]
    pub start: NaiveTime,
    #[serde(with = "crate::model::hhmm")]
    pub end: NaiveTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayPlanRequest {
    pub venue_id: VenueId,
    pub date: NaiveDate,
    pub hours: OperatingHours,
    /// Defaults to opening time.
    pub arrival: Option<NaiveTime>,
    pub wishes: Vec<Wish>,
    #[serde(default)]
    pub fixed: Vec<FixedItem>,
    #[serde(default)]
    pub wait_mode: WaitMode,
}

impl DayPlanRequest {
    pub fn validate(&self) -> Result<(), PlannerError> {
        let open = minute_of_day(self.hours.open);
        let close = minute_of_day(self.hours.close);
        if open >= close {
            return Err(PlannerError::invalid("opening time must be before closing time"));
        }
        if let Some(arrival) = self.arrival {
            if minute_of_day(arrival) >= close {
                return Err(PlannerError::invalid("arrival is at or after closing time"));
            }
        }
        if self.wishes.is_empty() && self.fixed.is_empty() {
            return Err(PlannerError::invalid("day plan needs attractions or fixed items"));
        }

        let mut windows: Vec<(i32, i32, &str)> = Vec::with_capacity(self.fixed.len());
        for item in &self.fixed {
            let (start, end) = (minute_of_day(item.start), minute_of_day(item.end));
            if end <= start {
                return Err(PlannerError::invalid(format!("fixed item '{}' ends before it starts", item.title)));
            }
            if start < open || end > close {
                return Err(PlannerError::invalid(format!(
                    "fixed item '{}' falls outside operating hours",
                    item.title
                )));
            }
            windows.push((start, end, &item.title));
        }
        windows.sort_unstable();
        if let Some(pair) = windows.windows(2).find(|pair| pair[1].0 < pair[0].1) {
            return Err(PlannerError::invalid(format!(
                "fixed items '{}' and '{}' overlap",
                pair[0].2, pair[1].2
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleOptions {
    pub slot_minutes: u32,
    /// Length of the rope-drop window after arrival.
    pub rope_drop_minutes: u32,
    /// Wait assumed when no percentile is known.
    pub default_wait_minutes: u32,
    /// Downtime risk assumed when no open rate is known.
    pub default_risk: f64,
    /// Minutes of penalty per unit of downtime risk.
    pub risk_penalty_minutes: f64,
}

impl Default for ScheduleOptions {
    fn default() -> Self {
        Self {
            slot_minutes: 5,
            rope_drop_minutes: 120,
            default_wait_minutes: 30,
            default_risk: 0.1,
            risk_penalty_minutes: 30.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySchedule {
    pub items: Vec<ItineraryItem>,
    pub metrics: ItineraryMetrics,
    /// Wishes that did not fit.
    pub unscheduled: Vec<AttractionId>,
}

pub fn expected_wait(
    stats: &HourlyStatIndex,
    attraction_id: &AttractionId,
    date: NaiveDate,
    hour: u8,
    mode: WaitMode,
    options: &ScheduleOptions,
) -> u32 {
    stats
        .get(attraction_id, date, hour)
        .and_then(|stat| match mode {
            WaitMode::Optimistic => stat.p50,
            WaitMode::Conservative => stat.p80,
        })
        .unwrap_or(options.default_wait_minutes)
}

/// 1 - open rate: the chance the attraction is down.
pub fn risk_score(
    stats: &HourlyStatIndex,
    attraction_id: &AttractionId,
    date: NaiveDate,
    hour: u8,
    options: &ScheduleOptions,
) -> f64 {
    stats
        .get(attraction_id, date, hour)
        .and_then(|stat| stat.open_rate)
        .map_or(options.default_risk, |rate| (1.0 - rate).clamp(0.0, 1.0))
}

/// Value per minute of cost; `+ 1` keeps the denominator positive.
pub fn candidate_score(priority: Priority, wait: u32, walk: u32, risk: f64, options: &ScheduleOptions) -> f64 {
    priority.weight() / (wait as f64 + walk as f64 + risk * options.risk_penalty_minutes + 1.0)
}

/// Slot occupancy for one operating day.
struct Timeline {
    open_minute: i32,
    slot_minutes: i32,
    occupied: Vec<bool>,
}

impl Timeline {
    fn new(hours: OperatingHours, slot_minutes: u32) -> Self {
        let slot_minutes = slot_minutes.max(1) as i32;
        Self {
            open_minute: minute_of_day(hours.open),
            slot_minutes,
            occupied: vec![false; (hours.minutes() / slot_minutes) as usize],
        }
    }

    fn slot_start(&self, slot: usize) -> i32 {
        self.open_minute + slot as i32 * self.slot_minutes
    }

    /// First slot starting at or after `minute`.
    fn slot_at_or_after(&self, minute: i32) -> usize {
        let offset = (minute - self.open_minute).max(0);
        ((offset + self.slot_minutes - 1) / self.slot_minutes) as usize
    }

    fn slots_for(&self, minutes: u32) -> usize {
        minutes.div_ceil(self.slot_minutes as u32).max(1) as usize
    }

    /// Marks every slot touched by `[start, end)`.
    fn reserve(&mut self, start: i32, end: i32) {
        let first = ((start - self.open_minute).max(0) / self.slot_minutes) as usize;
        let last = self.slot_at_or_after(end).min(self.occupied.len());
        for slot in first..last {
            self.occupied[slot] = true;
        }
    }

    fn first_free(&self, from: usize) -> Option<usize> {
        (from..self.occupied.len()).find(|&slot| !self.occupied[slot])
    }

    /// Whether `len` free slots start exactly at `start`.
    fn fits(&self, start: usize, len: usize) -> bool {
        start + len <= self.occupied.len() && self.occupied[start..start + len].iter().all(|taken| !taken)
    }

    /// First occupied slot at or after `from`, or the end of the day.
    fn gap_end(&self, from: usize) -> usize {
        (from..self.occupied.len())
            .find(|&slot| self.occupied[slot])
            .unwrap_or(self.occupied.len())
    }

    fn occupy(&mut self, start: usize, len: usize) {
        for slot in start..start + len {
            self.occupied[slot] = true;
        }
    }
}

struct Scheduler<'a, W: WalkTimeProvider + ?Sized> {
    request: &'a DayPlanRequest,
    stats: &'a HourlyStatIndex,
    walk: &'a W,
    options: &'a ScheduleOptions,
    timeline: Timeline,
    previous: Option<AttractionId>,
    rides: Vec<ItineraryItem>,
}

/// Cost figures for placing one attraction at one hour.
struct Estimate {
    wait: u32,
    walk: u32,
    risk: f64,
}

impl<W: WalkTimeProvider + ?Sized> Scheduler<'_, W> {
    fn estimate(&self, attraction_id: &AttractionId, hour: u8) -> Estimate {
        let date = self.request.date;
        Estimate {
            wait: expected_wait(self.stats, attraction_id, date, hour, self.request.wait_mode, self.options),
            walk: self.walk.walk_minutes(self.previous.as_ref(), attraction_id),
            risk: risk_score(self.stats, attraction_id, date, hour, self.options),
        }
    }

    fn hour_of_slot(&self, slot: usize) -> u8 {
        (self.timeline.slot_start(slot) / 60).clamp(0, 23) as u8
    }

    fn fits(&self, slot: usize, estimate: &Estimate) -> bool {
        self.timeline
            .fits(slot, self.timeline.slots_for(estimate.wait + estimate.walk))
    }

    /// Places the wish starting at `start`, priced by `estimate`. Returns the slot after it.
    fn place(&mut self, wish: &Wish, estimate: &Estimate, start: usize, latest_start: Option<i32>) -> Option<usize> {
        let len = self.timeline.slots_for(estimate.wait + estimate.walk);
        if !self.timeline.fits(start, len) {
            return None;
        }
        let start_minute = self.timeline.slot_start(start);
        if latest_start.is_some_and(|latest| start_minute >= latest) {
            return None;
        }

        self.timeline.occupy(start, len);
        let end_minute = start_minute + (estimate.wait + estimate.walk) as i32;
        tracing::debug!(
            attraction_id = %wish.attraction.id,
            start = %time_at_minute(start_minute),
            wait = estimate.wait,
            walk = estimate.walk,
            "Placed attraction"
        );
        self.rides.push(ItineraryItem {
            index: 0,
            item_type: ItemType::Ride,
            title: wish.attraction.title.clone(),
            attraction_id: Some(wish.attraction.id.clone()),
            start: time_at_minute(start_minute),
            end: time_at_minute(end_minute),
            expected_wait: estimate.wait,
            expected_walk: estimate.walk,
            risk_score: estimate.risk,
        });
        self.previous = Some(wish.attraction.id.clone());
        Some(start + len)
    }
}

/// Keeps the first highest-priority wish per attraction.
fn dedupe_wishes(wishes: &[Wish]) -> Vec<&Wish> {
    let mut kept: Vec<&Wish> = Vec::with_capacity(wishes.len());
    for wish in wishes {
        match kept.iter_mut().find(|k| k.attraction.id == wish.attraction.id) {
            Some(existing) if wish.priority > existing.priority => *existing = wish,
            Some(_) => {}
            None => kept.push(wish),
        }
    }
    kept
}

pub fn schedule_day<W>(
    request: &DayPlanRequest,
    stats: &HourlyStatIndex,
    walk: &W,
    options: &ScheduleOptions,
) -> Result<DaySchedule, PlannerError>
where
    W: WalkTimeProvider + ?Sized,
{
    request.validate()?;

    let mut timeline = Timeline::new(request.hours, options.slot_minutes);
    for item in &request.fixed {
        timeline.reserve(minute_of_day(item.start), minute_of_day(item.end));
    }

    let arrival_minute = request
        .arrival
        .map_or(minute_of_day(request.hours.open), minute_of_day)
        .max(minute_of_day(request.hours.open));
    let rope_drop_end = arrival_minute + options.rope_drop_minutes as i32;
    let mut cursor = timeline.slot_at_or_after(arrival_minute);

    let mut scheduler = Scheduler {
        request,
        stats,
        walk,
        options,
        timeline,
        previous: None,
        rides: Vec::new(),
    };
    let mut pending = dedupe_wishes(&request.wishes);
    let mut unscheduled = Vec::new();

    // Rope drop: must-dos, longest expected wait first.
    if let Some(first) = scheduler.timeline.first_free(cursor) {
        let hour = scheduler.hour_of_slot(first);
        let mut musts: Vec<(&Wish, u32)> = pending
            .iter()
            .filter(|wish| wish.priority == Priority::Must)
            .map(|wish| {
                let wait = expected_wait(stats, &wish.attraction.id, request.date, hour, request.wait_mode, options);
                (*wish, wait)
            })
            .collect();
        musts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.attraction.id.cmp(&b.0.attraction.id)));

        for (wish, _) in musts {
            let Some(slot) = scheduler.timeline.first_free(cursor) else {
                break;
            };
            if scheduler.timeline.slot_start(slot) >= rope_drop_end {
                break;
            }
            let estimate = scheduler.estimate(&wish.attraction.id, scheduler.hour_of_slot(slot));
            if let Some(next) = scheduler.place(wish, &estimate, slot, Some(rope_drop_end)) {
                cursor = next;
                pending.retain(|p| p.attraction.id != wish.attraction.id);
            }
        }
    }

    // Greedy fill, re-scored at every insertion point. Only candidates that
    // fit the current gap compete; an unusable gap is skipped.
    while !pending.is_empty() {
        let Some(slot) = scheduler.timeline.first_free(cursor) else {
            break;
        };
        let hour = scheduler.hour_of_slot(slot);

        let mut best: Option<(usize, f64, Estimate)> = None;
        for (i, wish) in pending.iter().enumerate() {
            let estimate = scheduler.estimate(&wish.attraction.id, hour);
            if !scheduler.fits(slot, &estimate) {
                continue;
            }
            let score = candidate_score(wish.priority, estimate.wait, estimate.walk, estimate.risk, options);
            let better = match &best {
                None => true,
                Some((best_i, best_score, _)) => match score.partial_cmp(best_score) {
                    Some(Ordering::Greater) => true,
                    Some(Ordering::Equal) => wish.attraction.id < pending[*best_i].attraction.id,
                    _ => false,
                },
            };
            if better {
                best = Some((i, score, estimate));
            }
        }

        let Some((i, _, estimate)) = best else {
            cursor = scheduler.timeline.gap_end(slot);
            continue;
        };
        let wish = pending.remove(i);
        match scheduler.place(wish, &estimate, slot, None) {
            Some(next) => cursor = next,
            None => unscheduled.push(wish.attraction.id.clone()),
        }
    }
    unscheduled.extend(pending.iter().map(|wish| wish.attraction.id.clone()));

    let mut items = scheduler.rides;
    items.extend(request.fixed.iter().map(|fixed| ItineraryItem {
        index: 0,
        item_type: fixed.item_type,
        title: fixed.title.clone(),
        attraction_id: fixed.attraction_id.clone(),
        start: fixed.start,
        end: fixed.end,
        expected_wait: 0,
        expected_walk: 0,
        risk_score: 0.0,
    }));
    items.sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));
    for (index, item) in items.iter_mut().enumerate() {
        item.index = index;
    }

    let metrics = metrics_for(&items, request.hours);
    tracing::info!(
        venue_id = %request.venue_id,
        date = %request.date,
        rides = metrics.total_rides,
        unscheduled = unscheduled.len(),
        "Day scheduled"
    );

    Ok(DaySchedule {
        items,
        metrics,
        unscheduled,
    })
}
