//! Configuration options for the cooperative work scheduler

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing of the cooperative checkpoints
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Sleep taken at a checkpoint to let other threads run. Default: 10 ms
    pub yield_time: Duration,

    /// Computation time between two yields. Default: 10 ms
    pub work_time: Duration,

    /// Delay re-armed after every progress update. Default: None
    ///
    /// With `None` a progress callback fires once per call to `ready`, so the
    /// host paces updates by calling `ready` when it has consumed the last one.
    pub update_delay: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            yield_time: Duration::from_millis(10),
            work_time: Duration::from_millis(10),
            update_delay: None,
        }
    }
}

impl SchedulerConfig {
    pub fn with_yield_time(mut self, yield_time: Duration) -> Self {
        self.yield_time = yield_time;
        self
    }

    pub fn with_work_time(mut self, work_time: Duration) -> Self {
        self.work_time = work_time;
        self
    }

    pub fn with_update_delay(mut self, delay: Duration) -> Self {
        self.update_delay = Some(delay);
        self
    }

    /// Load a configuration from JSON, missing fields take their defaults
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
