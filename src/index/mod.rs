//! Index subsystem
//!
//! One index owns: the registration table (records plus their attribute
//! snapshots), a pair of posting structures per attribute (hash equality +
//! ordered numeric range), and the reference edge table path queries
//! invert. All of it sits behind a single reader/writer lock: many readers,
//! one writer.

mod edges;
mod engine;
pub(crate) mod posting;
pub(crate) mod registry;

pub use engine::{Index, IndexStats};
pub(crate) use engine::IndexShared;
