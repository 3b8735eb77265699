//! # fkik-rig
//!
//! Control rigs over a skeletal hierarchy living in an external scene graph.
//!
//! ## Features
//! - FK chains: one control per segment, each following its predecessor
//! - Three-control IK rigs with derived pole-vector placement
//! - FK/IK blend rigs mixing duplicate chains with a continuous blend factor
//! - Nested components with shared grouping, snap, bind, unbind and bake
//! - Host-agnostic: everything goes through the [`SceneGraph`](scene::SceneGraph) trait
//!
//! ## Example
//! ```rust,ignore
//! use fkik_rig::rig::{BlendSpec, ComponentSpec, Rig};
//! use fkik_rig::scene::MemoryScene;
//!
//! let mut scene = MemoryScene::new();
//! let joints = vec![shoulder, elbow, wrist];
//!
//! let mut rig = Rig::new();
//! let arm = rig.build(&mut scene, ComponentSpec::Blend(BlendSpec::new(joints).with_name("arm")))?;
//! rig.add_groups(&mut scene, arm, None)?;
//! rig.snap(&mut scene, arm, 1.0)?;
//! rig.bind(&mut scene, arm)?;
//! ```

pub mod bake;
pub mod config;
pub mod error;
pub mod math;
pub mod rig;
pub mod scene;

pub use bake::{resolve_time, BakeRange};
pub use config::RigConfig;
pub use error::{ConfigError, RigError, SceneError};
pub use math::Transform;
pub use rig::{
    BlendSpec, ChainOrdering, ComponentId, ComponentSpec, ComponentState, FkSpec, IkSpec, Rig,
};
pub use scene::{with_rollback, MemoryScene, NodeId, SceneGraph};
