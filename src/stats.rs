//! In-memory index of hourly statistics, loaded once per batch.

use std::collections::{BTreeSet, HashMap};

use chrono::{Datelike, NaiveDate};

use crate::error::StorageError;
use crate::model::{AttractionId, HourlyStat, HourlyStatKey, weekday_index};
use crate::traits::HourlyStatStore;

#[derive(Debug, Clone, Default)]
pub struct HourlyStatIndex {
    stats: HashMap<HourlyStatKey, HourlyStat>,
}

impl HourlyStatIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_stats(stats: impl IntoIterator<Item = HourlyStat>) -> Self {
        Self {
            stats: stats.into_iter().map(|stat| (stat.key.clone(), stat)).collect(),
        }
    }

    /// Reads every bucket the given attractions could need on the given dates.
    ///
    /// Dates sharing a (month, weekday) pair share buckets, so each key is read once.
    pub fn load<S>(store: &S, attractions: &[AttractionId], dates: &[NaiveDate]) -> Result<Self, StorageError>
    where
        S: HourlyStatStore + ?Sized,
    {
        let calendar_keys: BTreeSet<(u8, u8)> = dates
            .iter()
            .map(|date| (date.month() as u8, weekday_index(*date)))
            .collect();

        let mut stats = HashMap::new();
        for attraction_id in attractions {
            for &(month, weekday) in &calendar_keys {
                for hour in 0..24u8 {
                    let key = HourlyStatKey::new(attraction_id.clone(), month, weekday, hour);
                    if let Some(stat) = store.read_hourly_stat(&key)? {
                        stats.insert(key, stat);
                    }
                }
            }
        }

        tracing::debug!(
            attractions = attractions.len(),
            dates = dates.len(),
            loaded = stats.len(),
            "Loaded hourly stat index"
        );
        Ok(Self { stats })
    }

    pub fn insert(&mut self, stat: HourlyStat) {
        self.stats.insert(stat.key.clone(), stat);
    }

    pub fn get(&self, attraction_id: &AttractionId, date: NaiveDate, hour: u8) -> Option<&HourlyStat> {
        self.stats
            .get(&HourlyStatKey::for_date(attraction_id.clone(), date, hour))
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}
