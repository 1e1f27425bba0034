//! Planner-wide configuration.
//!
//! Every section falls back to its defaults, so a JSON document only needs
//! to name what it overrides.

use serde::{Deserialize, Serialize};

use crate::aggregate::AggregateOptions;
use crate::assign::AssignOptions;
use crate::crowd::CrowdOptions;
use crate::error::PlannerError;
use crate::evaluate::ScoreWeights;
use crate::itinerary::ScheduleOptions;
use crate::live::LiveFeedConfig;
use crate::replan::ReplanOptions;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub aggregate: AggregateOptions,
    pub crowd: CrowdOptions,
    pub weights: ScoreWeights,
    pub assign: AssignOptions,
    pub schedule: ScheduleOptions,
    pub replan: ReplanOptions,
    pub live_feed: LiveFeedConfig,
}

impl PlannerConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, PlannerError> {
        let config: PlannerConfig =
            serde_json::from_str(raw).map_err(|err| PlannerError::invalid(format!("config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PlannerError> {
        if !self.weights.is_valid() {
            return Err(PlannerError::invalid("score weights must be finite and non-negative"));
        }
        if self.schedule.slot_minutes == 0 {
            return Err(PlannerError::invalid("slot_minutes must be positive"));
        }
        if self.crowd.useful_start_hour >= self.crowd.useful_end_hour || self.crowd.useful_end_hour > 24 {
            return Err(PlannerError::invalid("useful hours must form a window within the day"));
        }
        if self.crowd.ceiling_minutes <= 0.0 {
            return Err(PlannerError::invalid("crowd ceiling must be positive"));
        }
        if !(0.0..=1.0).contains(&self.crowd.calendar_weight) {
            return Err(PlannerError::invalid("calendar_weight must be within [0, 1]"));
        }
        Ok(())
    }
}
