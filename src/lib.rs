//! park-planner core
//!
//! Plans multi-day theme park trips from historical wait telemetry:
//! hourly percentile aggregation, crowd scoring, venue-to-day assignment,
//! single-day itinerary scheduling and live repair. Storage is injected
//! through the traits in [`traits`].

pub mod model;
pub mod error;
pub mod traits;
pub mod memory;
pub mod stats;
pub mod aggregate;
pub mod crowd;
pub mod evaluate;
pub mod assign;
pub mod itinerary;
pub mod replan;
pub mod walk;
pub mod live;
pub mod config;
pub mod planner;
