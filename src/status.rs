//! Shared status record.
//!
//! A plain read-mostly snapshot of the node's externally observable state.
//! Ownership is split per component: the modem link mutates [`LinkStatus`],
//! the motion detector mutates [`MotionStatus`], and the node supervisor,
//! the sole holder of the queue, refreshes the queue depth. Each tick
//! receives a `&mut` borrow of its own sub-record only, so single-writer-
//! per-field holds at compile time rather than by convention.

use std::fmt;

/// Modem link lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    /// Modem unpowered
    #[default]
    Off,
    /// Boot sequence issued, waiting for the network address confirmation
    Booting,
    /// Joined with an address, no transfer pending
    Ready,
    /// One transmission in flight
    Sending,
    /// Protocol failure; waits for an explicit power-on to recover
    Error,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LinkState::Off => "OFF",
            LinkState::Booting => "BOOTING",
            LinkState::Ready => "READY",
            LinkState::Sending => "SENDING",
            LinkState::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// How the most recent transmission attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Modem confirmed the transmit; the entry was dequeued
    Delivered,
    /// Modem reported a transmit failure; the entry stays queued
    Rejected,
    /// No transmit result arrived before the deadline
    TimedOut,
    /// The modem aborted the session with an error line
    Aborted,
}

/// Status fields owned by the modem link.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkStatus {
    /// Current link state
    pub state: LinkState,
    /// Monotonic ms of the last send attempt
    pub last_attempt_ms: Option<u32>,
    /// Monotonic ms of the last confirmed delivery
    pub last_success_ms: Option<u32>,
    /// Outcome of the most recent completed attempt
    pub last_outcome: Option<SendOutcome>,
}

/// Motion input state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionState {
    /// Level low, no interval in progress
    #[default]
    Idle,
    /// Level high, interval being timed
    Active,
}

/// Status fields owned by the motion detector.
#[derive(Debug, Clone, Copy, Default)]
pub struct MotionStatus {
    /// Current input state
    pub state: MotionState,
    /// Duration of the most recently completed interval
    pub last_duration_ms: Option<u32>,
    /// Completed intervals recorded since startup
    pub events_recorded: u32,
    /// Completed intervals dropped because the queue was full
    pub events_dropped: u32,
}

/// Aggregate status record handed to each component's tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeStatus {
    /// Modem link fields (written by the link only)
    pub link: LinkStatus,
    /// Motion fields (written by the detector only)
    pub motion: MotionStatus,
    /// Entries currently queued (written by the supervisor only)
    pub queued_events: u8,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "link={} | motion={} | queued={} | last_send={}",
            self.link.state,
            match self.motion.state {
                MotionState::Idle => "IDLE",
                MotionState::Active => "ACTIVE",
            },
            self.queued_events,
            match self.link.last_outcome {
                Some(SendOutcome::Delivered) => "ok",
                Some(SendOutcome::Rejected) => "fail",
                Some(SendOutcome::TimedOut) => "timeout",
                Some(SendOutcome::Aborted) => "aborted",
                None => "none",
            },
        )
    }
}
