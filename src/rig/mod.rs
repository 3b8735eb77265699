//! Rig components
//!
//! A [`Rig`] is an arena of component records. Each record owns its controls,
//! support nodes, groups and child components by id; the FK, IK and FK/IK blend
//! variants supply the snap/bind/unbind behavior.

mod blend;
mod component;
mod fk;
mod ik;
pub mod order;

pub use blend::{BlendSpec, FkIkBlendComponent};
pub use component::{ComponentId, ComponentKind, ComponentRecord, ComponentSpec, ComponentState, Rig};
pub use fk::{ChainLink, FkComponent, FkSpec};
pub use ik::{pole_position, IkComponent, IkSpec};
pub use order::{order_by_key, order_chain, ChainOrdering};
