//! A compact sample park with real-looking coordinates.

use park_planner::model::Attraction;

pub struct Ride {
    pub id: &'static str,
    pub title: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Ride {
    pub fn attraction(&self) -> Attraction {
        Attraction::new(self.id, self.title).at(self.lat, self.lng)
    }
}

pub const COASTER: Ride = Ride {
    id: "coaster",
    title: "Thunder Coaster",
    lat: 28.4195,
    lng: -81.5850,
};

pub const FLUME: Ride = Ride {
    id: "flume",
    title: "Log Flume",
    lat: 28.4187,
    lng: -81.5843,
};

pub const CAROUSEL: Ride = Ride {
    id: "carousel",
    title: "Grand Carousel",
    lat: 28.4200,
    lng: -81.5812,
};

pub const DARK_RIDE: Ride = Ride {
    id: "dark-ride",
    title: "Haunted Manor",
    lat: 28.4203,
    lng: -81.5830,
};

pub const SPINNER: Ride = Ride {
    id: "spinner",
    title: "Star Spinner",
    lat: 28.4176,
    lng: -81.5808,
};

pub const DROP_TOWER: Ride = Ride {
    id: "drop-tower",
    title: "Sky Drop",
    lat: 28.4170,
    lng: -81.5822,
};

pub const TEACUPS: Ride = Ride {
    id: "teacups",
    title: "Spinning Teacups",
    lat: 28.4209,
    lng: -81.5819,
};

pub fn all() -> Vec<Attraction> {
    [COASTER, FLUME, CAROUSEL, DARK_RIDE, SPINNER, DROP_TOWER, TEACUPS]
        .iter()
        .map(Ride::attraction)
        .collect()
}
