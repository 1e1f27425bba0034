//! Live repair tests
//!
//! A published morning plan meets a live feed with closures and long lines.

mod fixtures;

use park_planner::config::PlannerConfig;
use park_planner::memory::InMemoryStore;
use park_planner::model::{
    AttractionId, ItemType, Itinerary, ItineraryItem, ItineraryMetrics, TripDayId, TripId,
};
use park_planner::planner::replan_day;
use park_planner::replan::{DivergenceKind, ReplanOptions, detect_divergences, repair};
use park_planner::traits::ItineraryStore;

use fixtures::park::{self, CAROUSEL, COASTER, DARK_RIDE, FLUME, SPINNER};
use fixtures::{StaticLive, attraction, date, hours, time, venue};

fn ride(index: usize, id: &str, start: (u32, u32), end: (u32, u32), wait: u32) -> ItineraryItem {
    ItineraryItem {
        index,
        item_type: ItemType::Ride,
        title: id.to_string(),
        attraction_id: Some(attraction(id)),
        start: time(start.0, start.1),
        end: time(end.0, end.1),
        expected_wait: wait,
        expected_walk: 10,
        risk_score: 0.1,
    }
}

fn trip_day() -> TripDayId {
    TripDayId::new(TripId::new("family-2024"), date(2024, 6, 4))
}

/// Version 1 of the day: two morning rides, lunch, one afternoon ride.
fn published() -> Itinerary {
    let mut itinerary = Itinerary {
        trip_day: trip_day(),
        venue_id: venue("park"),
        version: 1,
        hours: hours(9, 18),
        items: vec![
            ride(0, COASTER.id, (9, 0), (9, 50), 40),
            ride(1, FLUME.id, (10, 0), (10, 40), 30),
            ItineraryItem {
                index: 2,
                item_type: ItemType::Meal,
                title: "Lunch".to_string(),
                attraction_id: None,
                start: time(12, 0),
                end: time(13, 0),
                expected_wait: 0,
                expected_walk: 0,
                risk_score: 0.0,
            },
            ride(3, CAROUSEL.id, (13, 0), (13, 30), 20),
        ],
        metrics: ItineraryMetrics::default(),
        repairs: Vec::new(),
    };
    itinerary.recompute_metrics();
    itinerary
}

fn busy_morning() -> StaticLive {
    StaticLive::new()
        .closed(COASTER.id)
        .open(FLUME.id, 90)
        .open(CAROUSEL.id, 5)
        .open(DARK_RIDE.id, 15)
        .open(SPINNER.id, 5)
        .open("drop-tower", 70)
        .closed("teacups")
}

fn ids(itinerary: &Itinerary) -> Vec<Option<&str>> {
    itinerary
        .items
        .iter()
        .map(|item| item.attraction_id.as_ref().map(AttractionId::as_str))
        .collect()
}

// ============================================================================
// Detection
// ============================================================================

#[test]
fn divergences_classified_in_item_order() {
    let divergences = detect_divergences(&published(), &busy_morning().statuses(), &ReplanOptions::default());

    assert_eq!(divergences.len(), 3);
    assert_eq!(divergences[0].kind, DivergenceKind::Closed);
    assert_eq!(
        divergences[1].kind,
        DivergenceKind::HighWait {
            live_wait: 90,
            threshold: 60
        }
    );
    assert_eq!(
        divergences[2].kind,
        DivergenceKind::LowWait {
            live_wait: 5,
            expected_wait: 20
        }
    );
    assert_eq!(divergences[2].index, 3);
}

#[test]
fn missing_live_data_is_not_a_divergence() {
    let divergences = detect_divergences(&published(), &StaticLive::new().statuses(), &ReplanOptions::default());
    assert!(divergences.is_empty());
}

// ============================================================================
// Repair
// ============================================================================

#[test]
fn closed_and_long_lines_replaced_in_place() {
    let v1 = published();
    let outcome = repair(&v1, &busy_morning().statuses(), &park::all(), &ReplanOptions::default());
    let v2 = &outcome.itinerary;

    assert_eq!(v2.version, 2);
    assert_eq!(ids(v2), vec![Some("dark-ride"), Some("spinner"), None, Some("carousel")]);
    assert_eq!(v2.items[0].start, time(9, 0));
    assert_eq!(v2.items[0].end, time(9, 25));
    assert_eq!(v2.items[1].start, time(10, 0));
    assert_eq!(v2.items[1].end, time(10, 15));
    assert_eq!(v2.items[0].title, "Haunted Manor");
    assert_eq!(v2.items[0].risk_score, 0.1);

    assert_eq!(outcome.divergences.len(), 3);
    assert_eq!(outcome.low_wait_signals().count(), 1);
    assert_eq!(v2.repairs.len(), 2);
    assert_eq!(v2.repairs[0].removed, attraction("coaster"));
    assert_eq!(v2.repairs[0].replacement, Some(attraction("dark-ride")));
    assert_eq!(v2.repairs[1].removed, attraction("flume"));
    assert_eq!(
        v2.repairs[1].kind,
        DivergenceKind::HighWait {
            live_wait: 90,
            threshold: 60
        }
    );
    assert!(v2.repairs[1].reason.contains("90"));

    // carousel keeps its slot but takes the live wait
    assert_eq!(v2.items[3].expected_wait, 5);
    assert_eq!(v2.metrics.total_rides, 3);
    assert_eq!(v2.metrics.total_wait, 15 + 5 + 5);
    assert_eq!(v2.metrics.total_walk, 30);
}

#[test]
fn repair_leaves_input_untouched() {
    let v1 = published();
    let snapshot = v1.clone();

    repair(&v1, &busy_morning().statuses(), &park::all(), &ReplanOptions::default());

    assert_eq!(v1, snapshot);
}

#[test]
fn item_dropped_when_nothing_fits() {
    let live = StaticLive::new().closed(COASTER.id).open(FLUME.id, 30);
    let candidates = vec![COASTER.attraction(), FLUME.attraction()];

    let outcome = repair(&published(), &live.statuses(), &candidates, &ReplanOptions::default());
    let v2 = &outcome.itinerary;

    assert_eq!(ids(v2), vec![Some("flume"), None, Some("carousel")]);
    assert!(v2.items.iter().enumerate().all(|(i, item)| item.index == i));
    assert_eq!(v2.repairs.len(), 1);
    assert_eq!(v2.repairs[0].replacement, None);
}

#[test]
fn candidate_too_long_for_slot_skipped() {
    // 55 min wait + 10 min walk overruns the 10:00 flume start
    let live = StaticLive::new().closed(COASTER.id).open(DARK_RIDE.id, 55);
    let candidates = vec![DARK_RIDE.attraction()];

    let outcome = repair(&published(), &live.statuses(), &candidates, &ReplanOptions::default());

    assert_eq!(ids(&outcome.itinerary)[0], Some("flume"));
    assert_eq!(outcome.itinerary.repairs[0].replacement, None);
}

#[test]
fn fixed_show_reported_but_not_rewritten() {
    let mut v1 = published();
    v1.items[2] = ItineraryItem {
        index: 2,
        item_type: ItemType::Show,
        title: "Midday Parade".to_string(),
        attraction_id: Some(attraction("parade")),
        start: time(12, 0),
        end: time(12, 45),
        expected_wait: 0,
        expected_walk: 0,
        risk_score: 0.2,
    };
    let live = StaticLive::new().closed("parade").open(DARK_RIDE.id, 5);

    let outcome = repair(&v1, &live.statuses(), &park::all(), &ReplanOptions::default());

    assert_eq!(outcome.divergences.len(), 1);
    assert_eq!(outcome.divergences[0].kind, DivergenceKind::Closed);
    assert_eq!(outcome.itinerary.items[2], v1.items[2]);
    assert!(outcome.itinerary.repairs.is_empty());
}

// ============================================================================
// Orchestration
// ============================================================================

#[test]
fn replan_day_publishes_next_version() {
    let store = InMemoryStore::new();
    store.write_itinerary_version(&published()).unwrap();
    let live = busy_morning();

    let outcome = replan_day(&store, &trip_day(), &live, &park::all(), &PlannerConfig::default())
        .unwrap()
        .unwrap();

    assert_eq!(outcome.itinerary.version, 2);
    assert_eq!(*live.calls.lock().unwrap(), 1);

    let history = store.itinerary_history(&trip_day()).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0], published());
    assert_eq!(store.read_itinerary_version(&trip_day()).unwrap().unwrap().version, 2);
}

#[test]
fn replan_without_published_plan_is_noop() {
    let store = InMemoryStore::new();
    let live = busy_morning();

    let outcome = replan_day(&store, &trip_day(), &live, &park::all(), &PlannerConfig::default()).unwrap();

    assert!(outcome.is_none());
    assert_eq!(*live.calls.lock().unwrap(), 0);
}
