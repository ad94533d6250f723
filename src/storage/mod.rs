//! Durable event storage: a byte-addressed non-volatile store and the
//! wear-conscious ring queue layered on top of it.

pub mod nv;
pub mod queue;

pub use nv::{FileNv, MemNv, NvStore};
pub use queue::{Event, EventQueue};
