//! Motion event source.
//!
//! Edge-triggers on a binary presence signal, times each active interval,
//! and hands the completed event to the durable queue. Writes to storage
//! happen only when an interval completes.

use crate::error::NodeResult;
use crate::status::{MotionState, MotionStatus};
use crate::storage::{Event, EventQueue, NvStore};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Where the binary motion level comes from.
pub trait LevelSource {
    /// Sample the current level. High means motion present.
    fn sample(&mut self) -> NodeResult<bool>;
}

/// Level source backed by a sysfs GPIO value file.
pub struct SysfsLevel {
    path: PathBuf,
}

impl SysfsLevel {
    /// Read the level from `path` (a `/sys/class/gpio/gpioN/value` file).
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl LevelSource for SysfsLevel {
    fn sample(&mut self) -> NodeResult<bool> {
        let raw = std::fs::read_to_string(&self.path)?;
        Ok(raw.trim() == "1")
    }
}

/// Edge detector over the sampled level.
pub struct MotionDetector {
    last_level: bool,
    active_since: Option<u32>,
}

impl MotionDetector {
    /// Create a detector; `initial_level` is the level at startup so a
    /// high boot level does not read as a rising edge.
    pub fn new(initial_level: bool) -> Self {
        Self {
            last_level: initial_level,
            active_since: None,
        }
    }

    /// Process one sample.
    ///
    /// A rising edge starts timing; a falling edge completes the interval
    /// and enqueues it. A full queue drops the event and counts the drop.
    pub fn tick<S: NvStore>(
        &mut self,
        level: bool,
        now_ms: u32,
        queue: &mut EventQueue<S>,
        status: &mut MotionStatus,
    ) {
        if level && !self.last_level {
            self.active_since = Some(now_ms);
            status.state = MotionState::Active;
            debug!("motion started");
        } else if !level && self.last_level {
            if let Some(start) = self.active_since.take() {
                let duration_ms = now_ms.wrapping_sub(start);
                status.last_duration_ms = Some(duration_ms);
                let event = Event {
                    duration_ms,
                    timestamp: now_ms,
                };
                if queue.enqueue(event) {
                    status.events_recorded += 1;
                    info!(duration_ms, "motion event recorded");
                } else {
                    status.events_dropped += 1;
                    warn!(duration_ms, "event queue full, reading dropped");
                }
            }
            status.state = MotionState::Idle;
        }
        self.last_level = level;
    }
}
