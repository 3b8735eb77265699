use glam::{Mat4, Vec3};
use slotmap::new_key_type;

use crate::error::SceneError;

new_key_type! {
    /// Handle to a node owned by the host scene graph.
    pub struct NodeId;
}

/// Standard attribute names understood by every host.
pub mod attr {
    pub const TRANSLATE: &str = "translate";
    pub const ROTATE: &str = "rotate";
    pub const SCALE: &str = "scale";
    pub const VISIBILITY: &str = "visibility";
    pub const MESSAGE: &str = "message";

    pub const INPUT: &str = "input";
    pub const OUTPUT: &str = "output";
    pub const INPUT_A: &str = "input_a";
    pub const INPUT_B: &str = "input_b";
    pub const WEIGHT: &str = "weight";
}

/// One attribute on one node, the endpoint of a data-flow connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Plug {
    pub node: NodeId,
    pub attribute: String,
}

impl Plug {
    pub fn new(node: NodeId, attribute: impl Into<String>) -> Self {
        Self {
            node,
            attribute: attribute.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttrKind {
    Float { min: f32, max: f32, keyable: bool },
    Message,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttrValue {
    Float(f32),
    Vec3(Vec3),
    Message,
}

impl AttrValue {
    pub fn as_float(self) -> Option<f32> {
        match self {
            AttrValue::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_vec3(self) -> Option<Vec3> {
        match self {
            AttrValue::Vec3(v) => Some(v),
            _ => None,
        }
    }
}

/// Host-side computation nodes used for data-flow wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtilityKind {
    /// `output = 1 - input`
    Reverse,
    /// `output = lerp(input_a, input_b, weight)` per channel
    Blend,
}

/// The narrow host contract the rig core is written against.
///
/// Hosts own every node; the core only holds [`NodeId`]s. Transform reads and
/// writes take an explicit time so no component depends on a global clock.
pub trait SceneGraph {
    // Node lifecycle
    fn create_transform(&mut self, name: &str) -> Result<NodeId, SceneError>;
    fn create_utility(&mut self, kind: UtilityKind, name: &str) -> Result<NodeId, SceneError>;
    /// Copies the node with its attributes and shapes, but not its other children.
    /// The copy shares the source node's parent.
    fn duplicate(&mut self, node: NodeId) -> Result<NodeId, SceneError>;
    /// Deletes the node and all of its descendants.
    fn delete(&mut self, node: NodeId) -> Result<(), SceneError>;
    fn rename(&mut self, node: NodeId, name: &str) -> Result<(), SceneError>;
    fn name(&self, node: NodeId) -> Result<String, SceneError>;
    fn exists(&self, node: NodeId) -> bool;

    // Hierarchy
    /// Reparents under `parent`, or under world for `None`, keeping the world transform.
    fn set_parent(&mut self, node: NodeId, parent: Option<NodeId>) -> Result<(), SceneError>;
    fn parent(&self, node: NodeId) -> Result<Option<NodeId>, SceneError>;
    fn children(&self, node: NodeId) -> Result<Vec<NodeId>, SceneError>;
    fn shapes(&self, node: NodeId) -> Result<Vec<NodeId>, SceneError>;

    fn descendant_count(&self, node: NodeId) -> Result<usize, SceneError> {
        let mut count = 0;
        let mut stack = self.children(node)?;
        while let Some(child) = stack.pop() {
            count += 1;
            stack.extend(self.children(child)?);
        }
        Ok(count)
    }

    // Transform I/O
    fn world_matrix(&self, node: NodeId, time: f32) -> Result<Mat4, SceneError>;
    fn local_matrix(&self, node: NodeId, time: f32) -> Result<Mat4, SceneError>;
    fn set_world_matrix(&mut self, node: NodeId, matrix: Mat4, time: f32)
        -> Result<(), SceneError>;
    fn set_world_translation(
        &mut self,
        node: NodeId,
        point: Vec3,
        time: f32,
    ) -> Result<(), SceneError>;

    // Constraints
    fn parent_constraint(
        &mut self,
        driver: NodeId,
        driven: NodeId,
        maintain_offset: bool,
    ) -> Result<NodeId, SceneError>;
    fn orient_constraint(
        &mut self,
        driver: NodeId,
        driven: NodeId,
        maintain_offset: bool,
    ) -> Result<NodeId, SceneError>;
    fn pole_vector_constraint(
        &mut self,
        driver: NodeId,
        ik_handle: NodeId,
    ) -> Result<NodeId, SceneError>;
    /// Creates a two-bone IK solve from `start` to `end` and returns its handle.
    fn ik_handle(&mut self, start: NodeId, end: NodeId) -> Result<NodeId, SceneError>;

    // Attributes
    fn add_attribute(&mut self, node: NodeId, name: &str, kind: AttrKind)
        -> Result<(), SceneError>;
    fn has_attribute(&self, node: NodeId, name: &str) -> bool;
    fn connect(&mut self, source: &Plug, destination: &Plug) -> Result<(), SceneError>;
    fn set_float(&mut self, node: NodeId, name: &str, value: f32) -> Result<(), SceneError>;
    fn float(&self, node: NodeId, name: &str, time: f32) -> Result<f32, SceneError>;

    // Animation
    /// Keys the named attributes, or every keyable unconnected attribute when empty.
    fn set_keyframe(
        &mut self,
        node: NodeId,
        attributes: &[&str],
        time: f32,
    ) -> Result<(), SceneError>;
    fn current_time(&self) -> f32;
    fn playback_range(&self) -> (f32, f32);

    // Visibility
    fn set_visible(&mut self, node: NodeId, visible: bool) -> Result<(), SceneError>;
}
