//! Host scene-graph contract
//!
//! The rig core only talks to the host through [`SceneGraph`]. [`MemoryScene`]
//! is a self-contained host for tests and demos, and [`Journal`] wraps any host
//! to record created nodes for rollback.

mod graph;
mod journal;
mod memory;

pub use graph::{attr, AttrKind, AttrValue, NodeId, Plug, SceneGraph, UtilityKind};
pub use journal::{with_rollback, Journal, RollbackLog};
pub use memory::{ConstraintKind, ConstraintRecord, MemoryScene, NodeKind};
