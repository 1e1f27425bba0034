//! Walk-time providers for in-park movement.
//!
//! `HaversineWalkTime` uses great-circle distance between attraction
//! coordinates and an assumed walking speed. It ignores paths, so it is a
//! lower bound; attractions without coordinates get the flat default.

use std::collections::HashMap;

use crate::model::{Attraction, AttractionId};
use crate::traits::WalkTimeProvider;

/// Flat walk estimate when nothing better is known.
pub const DEFAULT_WALK_MINUTES: u32 = 10;

/// Average walking speed assumption.
const DEFAULT_SPEED_KMH: f64 = 4.5;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Same walk time between any two points.
#[derive(Debug, Clone, Copy)]
pub struct FixedWalkTime(pub u32);

impl Default for FixedWalkTime {
    fn default() -> Self {
        Self(DEFAULT_WALK_MINUTES)
    }
}

impl WalkTimeProvider for FixedWalkTime {
    fn walk_minutes(&self, _from: Option<&AttractionId>, _to: &AttractionId) -> u32 {
        self.0
    }
}

/// Haversine-based walk times between known attraction locations.
#[derive(Debug, Clone)]
pub struct HaversineWalkTime {
    /// Assumed walking speed in km/h.
    pub speed_kmh: f64,
    /// Used for the entrance leg and for attractions without a location.
    pub default_minutes: u32,
    locations: HashMap<AttractionId, (f64, f64)>,
}

impl HaversineWalkTime {
    pub fn new(attractions: &[Attraction]) -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
            default_minutes: DEFAULT_WALK_MINUTES,
            locations: attractions
                .iter()
                .filter_map(|attraction| attraction.location.map(|loc| (attraction.id.clone(), loc)))
                .collect(),
        }
    }

    pub fn with_speed(mut self, speed_kmh: f64) -> Self {
        self.speed_kmh = speed_kmh;
        self
    }

    /// Ground distance in km between two attraction coordinates, ignoring paths.
    fn great_circle_km((lat_a, lng_a): (f64, f64), (lat_b, lng_b): (f64, f64)) -> f64 {
        let (phi_a, phi_b) = (lat_a.to_radians(), lat_b.to_radians());
        let half_dphi = (phi_b - phi_a) / 2.0;
        let half_dlambda = (lng_b - lng_a).to_radians() / 2.0;
        let h = half_dphi.sin().powi(2) + phi_a.cos() * phi_b.cos() * half_dlambda.sin().powi(2);
        2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
    }

    /// Whole walking minutes for a distance, rounded up.
    fn km_to_minutes(&self, km: f64) -> u32 {
        if self.speed_kmh <= 0.0 {
            return self.default_minutes;
        }
        (km / self.speed_kmh * 60.0).ceil() as u32
    }
}

impl WalkTimeProvider for HaversineWalkTime {
    fn walk_minutes(&self, from: Option<&AttractionId>, to: &AttractionId) -> u32 {
        let from = from.and_then(|id| self.locations.get(id));
        match (from, self.locations.get(to)) {
            (Some(from), Some(to)) => self.km_to_minutes(Self::great_circle_km(*from, *to)),
            _ => self.default_minutes,
        }
    }
}
