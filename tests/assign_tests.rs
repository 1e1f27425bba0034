//! Assignment optimizer tests
//!
//! Tests for locking, determinism, local-search improvement and alternatives.

mod fixtures;

use std::collections::HashSet;

use park_planner::assign::{AlternativeStrategy, AssignOptions, AssignmentPlan, AssignmentRequest, solve};
use park_planner::error::PlannerError;
use park_planner::evaluate::{DaySignals, ScoreWeights};
use park_planner::model::VenueId;

use fixtures::{SignalsBuilder, crowd_only, date, venue};

fn venues_of(plan: &AssignmentPlan) -> Vec<Option<&str>> {
    plan.days
        .iter()
        .map(|day| day.venue_id.as_ref().map(VenueId::as_str))
        .collect()
}

fn no_alternatives() -> AssignOptions {
    AssignOptions {
        alternatives: AlternativeStrategy::None,
        ..AssignOptions::default()
    }
}

/// Greedy puts B on day one; swapping with A is strictly cheaper overall.
fn myopic_signals() -> DaySignals {
    SignalsBuilder::new()
        .crowd("a", date(2024, 6, 4), 0.3)
        .crowd("a", date(2024, 6, 5), 0.9)
        .crowd("b", date(2024, 6, 4), 0.2)
        .crowd("b", date(2024, 6, 5), 0.3)
        .build()
}

fn two_day_request() -> AssignmentRequest {
    let mut request = AssignmentRequest::new(
        vec![date(2024, 6, 4), date(2024, 6, 5)],
        vec![venue("a"), venue("b")],
    );
    request.weights = crowd_only();
    request
}

// ============================================================================
// Locks and Determinism
// ============================================================================

#[test]
fn locked_day_preserved_and_free_days_filled_deterministically() {
    let mut request = AssignmentRequest::new(
        vec![date(2024, 6, 4), date(2024, 6, 5), date(2024, 6, 6)],
        vec![venue("beta"), venue("alpha")],
    );
    request.locked.insert(date(2024, 6, 5), Some(venue("hub")));
    let signals = DaySignals::new();

    let first = solve(&request, &signals, &AssignOptions::default()).unwrap();
    let second = solve(&request, &signals, &AssignOptions::default()).unwrap();

    assert_eq!(venues_of(&first), vec![Some("alpha"), Some("hub"), Some("beta")]);
    assert_eq!(first, second, "identical input must give identical output");
    assert!(first.days[1].locked);
    assert!(!first.days[0].locked && !first.days[2].locked);
}

#[test]
fn locked_day_survives_an_improving_swap() {
    let mut request = two_day_request();
    request.locked.insert(date(2024, 6, 4), Some(venue("b")));

    let plan = solve(&request, &myopic_signals(), &no_alternatives()).unwrap();

    assert_eq!(venues_of(&plan), vec![Some("b"), Some("a")]);
    assert_eq!(plan.swaps, 0);
}

#[test]
fn locked_venue_not_placed_twice() {
    let mut request = AssignmentRequest::new(
        vec![date(2024, 6, 4), date(2024, 6, 5), date(2024, 6, 6)],
        vec![venue("a"), venue("b")],
    );
    request.locked.insert(date(2024, 6, 6), Some(venue("a")));

    let plan = solve(&request, &DaySignals::new(), &no_alternatives()).unwrap();

    assert_eq!(venues_of(&plan), vec![Some("b"), None, Some("a")]);
}

#[test]
fn locked_rest_day_stays_free() {
    let mut request = AssignmentRequest::new(
        vec![date(2024, 6, 4), date(2024, 6, 5), date(2024, 6, 6)],
        vec![venue("a"), venue("b"), venue("c")],
    );
    request.locked.insert(date(2024, 6, 5), None);

    let plan = solve(&request, &DaySignals::new(), &no_alternatives()).unwrap();

    assert_eq!(venues_of(&plan), vec![Some("a"), None, Some("b")]);
    assert!(plan.days[1].locked);
    assert!(plan.days[1].evaluation.is_none());
    assert_eq!(plan.unplaced, vec![venue("c")]);
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn empty_pool_leaves_free_days() {
    let request = AssignmentRequest::new(
        vec![date(2024, 6, 4), date(2024, 6, 5), date(2024, 6, 6)],
        vec![venue("only")],
    );

    let plan = solve(&request, &DaySignals::new(), &no_alternatives()).unwrap();

    let assigned = plan.days.iter().filter(|day| day.venue_id.is_some()).count();
    assert_eq!(assigned, 1);
    assert!(plan.unplaced.is_empty());
    assert!(plan.days.iter().filter(|day| day.venue_id.is_none()).all(|day| day.evaluation.is_none()));
}

#[test]
fn extra_venues_reported_unplaced() {
    let request = AssignmentRequest::new(
        vec![date(2024, 6, 4)],
        vec![venue("c"), venue("a"), venue("b")],
    );

    let plan = solve(&request, &DaySignals::new(), &no_alternatives()).unwrap();

    assert_eq!(venues_of(&plan), vec![Some("a")]);
    assert_eq!(plan.unplaced, vec![venue("b"), venue("c")]);
}

#[test]
fn heavy_venues_are_not_stacked() {
    let mut request = AssignmentRequest::new(
        vec![date(2024, 6, 4), date(2024, 6, 5), date(2024, 6, 6)],
        vec![venue("h1"), venue("h2"), venue("l")],
    );
    request.heavy_venues = ["h1", "h2"].into_iter().map(venue).collect::<HashSet<_>>();
    request.weights = ScoreWeights {
        crowd: 0.0,
        hours: 0.0,
        weekend: 0.0,
        travel: 0.0,
        streak: 1.0,
        consecutive: 0.0,
    };

    let plan = solve(&request, &DaySignals::new(), &no_alternatives()).unwrap();

    assert_eq!(venues_of(&plan), vec![Some("h1"), Some("l"), Some("h2")]);
    assert_eq!(plan.total_score, 0.0);
}

// ============================================================================
// Local Search
// ============================================================================

#[test]
fn local_search_fixes_greedy_myopia() {
    let plan = solve(&two_day_request(), &myopic_signals(), &no_alternatives()).unwrap();

    assert_eq!(venues_of(&plan), vec![Some("a"), Some("b")]);
    assert_eq!(plan.swaps, 1);
    assert!((plan.total_score - 0.6).abs() < 1e-9);
    assert!(!plan.hit_iteration_cap);
}

#[test]
fn refinement_never_increases_total() {
    let request = two_day_request();
    let greedy_only = AssignOptions {
        local_search_iterations: 0,
        alternatives: AlternativeStrategy::None,
    };

    let before = solve(&request, &myopic_signals(), &greedy_only).unwrap();
    let after = solve(&request, &myopic_signals(), &no_alternatives()).unwrap();

    assert!((before.total_score - 1.1).abs() < 1e-9);
    assert!(after.total_score <= before.total_score);
    assert!(after.passes <= 10);
}

#[test]
fn swap_accounts_for_following_day_context() {
    // Swapping days 1 and 2 raises their own crowd cost but breaks a heavy
    // streak into the locked day 3, so the swap must still be taken.
    let mut request = AssignmentRequest::new(
        vec![date(2024, 6, 4), date(2024, 6, 5), date(2024, 6, 6)],
        vec![venue("h1"), venue("l"), venue("h2")],
    );
    request.locked.insert(date(2024, 6, 6), Some(venue("h2")));
    request.heavy_venues = ["h1", "h2"].into_iter().map(venue).collect();
    request.weights = ScoreWeights {
        crowd: 1.0,
        hours: 0.0,
        weekend: 0.0,
        travel: 0.0,
        streak: 5.0,
        consecutive: 0.0,
    };
    let signals = SignalsBuilder::new()
        .crowd("h1", date(2024, 6, 4), 0.2)
        .crowd("h1", date(2024, 6, 5), 0.1)
        .crowd("l", date(2024, 6, 4), 0.1)
        .crowd("l", date(2024, 6, 5), 0.3)
        .build();

    let greedy_only = AssignOptions {
        local_search_iterations: 0,
        alternatives: AlternativeStrategy::None,
    };
    let before = solve(&request, &signals, &greedy_only).unwrap();
    let after = solve(&request, &signals, &no_alternatives()).unwrap();

    assert_eq!(venues_of(&before), vec![Some("l"), Some("h1"), Some("h2")]);
    assert!((before.total_score - 5.7).abs() < 1e-9);
    assert_eq!(venues_of(&after), vec![Some("h1"), Some("l"), Some("h2")]);
    assert!((after.total_score - 1.0).abs() < 1e-9);
}

// ============================================================================
// Alternatives
// ============================================================================

#[test]
fn score_offset_alternatives_mirror_primary() {
    let options = AssignOptions {
        alternatives: AlternativeStrategy::ScoreOffset {
            offsets: vec![0.1, 0.2],
        },
        ..AssignOptions::default()
    };

    let plan = solve(&two_day_request(), &myopic_signals(), &options).unwrap();

    assert_eq!(plan.alternatives.len(), 2);
    assert_eq!(plan.alternatives[0].label, "Plan B");
    assert_eq!(plan.alternatives[1].label, "Plan C");
    assert_eq!(plan.alternatives[0].days, plan.days);
    assert!((plan.alternatives[1].total_score - (plan.total_score + 0.2)).abs() < 1e-9);
}

#[test]
fn reweighted_alternatives_keep_locks() {
    let mut request = AssignmentRequest::new(
        vec![date(2024, 6, 4), date(2024, 6, 5), date(2024, 6, 6)],
        vec![venue("a"), venue("b")],
    );
    request.locked.insert(date(2024, 6, 4), Some(venue("hub")));
    let options = AssignOptions {
        alternatives: AlternativeStrategy::reweighted(),
        ..AssignOptions::default()
    };

    let plan = solve(&request, &myopic_signals(), &options).unwrap();

    assert_eq!(plan.alternatives.len(), 2);
    for alternative in &plan.alternatives {
        assert_eq!(alternative.days[0].venue_id, Some(venue("hub")));
        assert_eq!(alternative.days.len(), 3);
    }
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn lock_outside_trip_rejected() {
    let mut request = two_day_request();
    request.locked.insert(date(2024, 7, 1), Some(venue("a")));

    let result = solve(&request, &DaySignals::new(), &AssignOptions::default());

    assert!(matches!(result, Err(PlannerError::InvalidInput(_))));
}

#[test]
fn empty_trip_rejected() {
    let request = AssignmentRequest::new(Vec::new(), vec![venue("a")]);
    assert!(matches!(
        solve(&request, &DaySignals::new(), &AssignOptions::default()),
        Err(PlannerError::InvalidInput(_))
    ));
}
