//! Node supervisor.
//!
//! Owns the queue, the modem link, and the motion detector, and runs the
//! cooperative tick that keeps them moving. The supervisor is also the only
//! writer of the aggregate queue-depth status field, and it applies the
//! upload policy: uploads happen only after an external
//! [`Node::request_upload`] trigger, drain the queue while deliveries
//! succeed, and stop on the first failed attempt until triggered again.

use crate::error::NodeResult;
use crate::link::modem::ModemLink;
use crate::link::transport::Transport;
use crate::motion::{LevelSource, MotionDetector};
use crate::status::NodeStatus;
use crate::storage::{Event, EventQueue, NvStore};
use tracing::{debug, warn};

/// The assembled sensor node.
pub struct Node<S: NvStore, T: Transport, L: LevelSource> {
    queue: EventQueue<S>,
    link: ModemLink<T>,
    detector: MotionDetector,
    level: L,
    last_level: bool,
    status: NodeStatus,
    upload_armed: bool,
    len_at_attempt: Option<u8>,
}

impl<S: NvStore, T: Transport, L: LevelSource> Node<S, T, L> {
    /// Assemble the node. The level source is sampled once so a high level
    /// at startup does not register as motion.
    pub fn new(queue: EventQueue<S>, link: ModemLink<T>, mut level: L) -> Self {
        let initial = match level.sample() {
            Ok(l) => l,
            Err(e) => {
                warn!("initial level sample failed, assuming idle: {e}");
                false
            }
        };
        let status = NodeStatus {
            queued_events: queue.len(),
            ..NodeStatus::default()
        };
        Self {
            queue,
            link,
            detector: MotionDetector::new(initial),
            level,
            last_level: initial,
            status,
            upload_armed: false,
            len_at_attempt: None,
        }
    }

    /// Power the modem and start the boot sequence.
    pub fn power_on(&mut self, now_ms: u32) -> NodeResult<()> {
        self.link.power_on(now_ms, &mut self.status.link)
    }

    /// Power the modem down.
    pub fn power_off(&mut self) {
        self.link.power_off(&mut self.status.link);
    }

    /// Arm the upload policy. A no-op when nothing is queued.
    pub fn request_upload(&mut self) {
        if !self.queue.is_empty() {
            self.upload_armed = true;
        }
    }

    /// Current status snapshot.
    pub fn status(&self) -> &NodeStatus {
        &self.status
    }

    /// Copy of the queued events, oldest first.
    pub fn queued(&self) -> Vec<Event> {
        self.queue.snapshot()
    }

    /// One cooperative scheduling round. Never blocks.
    pub fn tick(&mut self, now_ms: u32) {
        let level = match self.level.sample() {
            Ok(l) => {
                self.last_level = l;
                l
            }
            Err(e) => {
                warn!("level source read failed, keeping previous level: {e}");
                self.last_level
            }
        };

        self.detector
            .tick(level, now_ms, &mut self.queue, &mut self.status.motion);
        self.link
            .tick(now_ms, &mut self.queue, &mut self.status.link);
        self.run_upload_policy(now_ms);

        self.status.queued_events = self.queue.len();
    }

    fn run_upload_policy(&mut self, now_ms: u32) {
        if !self.upload_armed {
            return;
        }

        // An attempt just finished: only a delivery (visible as the queue
        // shrinking) keeps the drain going; any other outcome waits for the
        // next external trigger.
        if let Some(before) = self.len_at_attempt {
            if !self.link.send_pending() {
                self.len_at_attempt = None;
                if self.queue.len() >= before {
                    self.upload_armed = false;
                    debug!("upload attempt did not deliver, disarming");
                    return;
                }
            }
        }

        match self.queue.peek_oldest() {
            None => {
                self.upload_armed = false;
                debug!("queue drained, disarming upload");
            }
            Some(event) => {
                if self.link.is_ready() {
                    let before = self.queue.len();
                    match self.link.request_send(&event, now_ms, &mut self.status.link) {
                        Ok(true) => self.len_at_attempt = Some(before),
                        Ok(false) => {}
                        Err(e) => warn!("send request failed: {e}"),
                    }
                }
            }
        }
    }
}
