//! # Motion Node Core Library
//!
//! Core library for the `motion-node` application: a small sensor node that
//! detects motion events, queues their durations in non-volatile storage so
//! they survive power loss, and opportunistically uploads them to a cloud
//! endpoint through a serial radio modem speaking an AT-command protocol.
//!
//! ## Crate Structure
//!
//! - **`config`**: Strongly-typed configuration loaded from TOML and
//!   environment variables. See [`config::NodeConfig`].
//! - **`error`**: The crate-wide [`error::NodeError`] enum and result alias.
//! - **`link`**: The modem uplink: serial transport abstraction, reply
//!   tokenizer, and the AT-command state machine
//!   ([`link::modem::ModemLink`]).
//! - **`motion`**: The motion event source: level sampling and edge
//!   detection.
//! - **`node`**: The supervisor that assembles the components and runs the
//!   cooperative tick loop.
//! - **`status`**: The shared status record with per-component ownership.
//! - **`storage`**: The byte-addressed non-volatile store and the
//!   wear-conscious circular event queue on top of it.
//! - **`telemetry`**: Tracing subscriber setup.
//!
//! The whole node is single-threaded and poll-driven: each component
//! exposes a `tick` entry point and never blocks on I/O, so one plain loop
//! schedules everything.

pub mod config;
pub mod error;
pub mod link;
pub mod motion;
pub mod node;
pub mod status;
pub mod storage;
pub mod telemetry;
