use std::collections::{BTreeMap, HashMap};

use glam::{Mat4, Vec3};
use slotmap::SlotMap;

use super::graph::{attr, AttrKind, AttrValue, NodeId, Plug, SceneGraph, UtilityKind};
use crate::error::SceneError;
use crate::math::Transform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Parent,
    Orient,
    PoleVector,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintRecord {
    pub kind: ConstraintKind,
    pub driver: NodeId,
    pub driven: NodeId,
    pub maintain_offset: bool,
    /// Driver-relative transform of the driven node captured at creation.
    pub offset: Mat4,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Transform,
    Joint,
    Shape,
    Utility(UtilityKind),
    Constraint(ConstraintRecord),
    IkHandle { start: NodeId, end: NodeId },
}

#[derive(Debug, Clone)]
struct Attribute {
    value: AttrValue,
    keyable: bool,
    range: Option<(f32, f32)>,
    keys: Vec<(f32, AttrValue)>,
    /// Time at which `value` was written over an animated channel.
    pending: Option<f32>,
}

impl Attribute {
    fn channel(value: AttrValue) -> Self {
        Self {
            value,
            keyable: true,
            range: None,
            keys: Vec::new(),
            pending: None,
        }
    }

    fn fixed(value: AttrValue) -> Self {
        Self {
            keyable: false,
            ..Self::channel(value)
        }
    }

    fn sample(&self, time: f32) -> AttrValue {
        if self.keys.is_empty() || self.pending == Some(time) {
            return self.value;
        }
        self.keys
            .iter()
            .rev()
            .find(|(t, _)| *t <= time)
            .or_else(|| self.keys.first())
            .map(|(_, v)| *v)
            .unwrap_or(self.value)
    }

    fn write(&mut self, value: AttrValue, time: f32) {
        self.value = value;
        if !self.keys.is_empty() {
            self.pending = Some(time);
        }
    }

    fn insert_key(&mut self, time: f32, value: AttrValue) {
        self.value = value;
        self.pending = None;
        match self.keys.iter().position(|(t, _)| *t >= time) {
            Some(i) if self.keys[i].0 == time => self.keys[i].1 = value,
            Some(i) => self.keys.insert(i, (time, value)),
            None => self.keys.push((time, value)),
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attributes: BTreeMap<String, Attribute>,
}

impl Node {
    fn new(name: &str, kind: NodeKind) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert(attr::MESSAGE.to_string(), Attribute::fixed(AttrValue::Message));

        match kind {
            NodeKind::Utility(UtilityKind::Reverse) => {
                attributes.insert(attr::INPUT.to_string(), Attribute::fixed(AttrValue::Float(0.0)));
                attributes.insert(attr::OUTPUT.to_string(), Attribute::fixed(AttrValue::Float(1.0)));
            }
            NodeKind::Utility(UtilityKind::Blend) => {
                for name in [attr::INPUT_A, attr::INPUT_B, attr::OUTPUT] {
                    attributes.insert(name.to_string(), Attribute::fixed(AttrValue::Vec3(Vec3::ZERO)));
                }
                attributes.insert(attr::WEIGHT.to_string(), Attribute::fixed(AttrValue::Float(0.0)));
            }
            NodeKind::Shape => {}
            _ => {
                attributes.insert(attr::TRANSLATE.to_string(), Attribute::channel(AttrValue::Vec3(Vec3::ZERO)));
                attributes.insert(attr::ROTATE.to_string(), Attribute::channel(AttrValue::Vec3(Vec3::ZERO)));
                attributes.insert(attr::SCALE.to_string(), Attribute::channel(AttrValue::Vec3(Vec3::ONE)));
                attributes.insert(attr::VISIBILITY.to_string(), Attribute::channel(AttrValue::Float(1.0)));
            }
        }

        Self {
            name: name.to_string(),
            kind,
            parent: None,
            children: Vec::new(),
            attributes,
        }
    }
}

/// An in-memory [`SceneGraph`] host.
///
/// Channels are step-sampled from their keys; a value written over an animated
/// channel wins only at the time it was written until the clock moves. Data-flow
/// connections are evaluated on read. Constraints and IK solves are recorded as
/// nodes but never solved.
#[derive(Debug, Clone)]
pub struct MemoryScene {
    nodes: SlotMap<NodeId, Node>,
    /// destination -> source
    connections: HashMap<Plug, Plug>,
    current_time: f32,
    playback: (f32, f32),
}

impl Default for MemoryScene {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryScene {
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            connections: HashMap::new(),
            current_time: 1.0,
            playback: (1.0, 24.0),
        }
    }

    pub fn with_playback_range(mut self, start: f32, end: f32) -> Self {
        self.playback = (start, end);
        self
    }

    /// Moves the clock, discarding unkeyed edits to animated channels.
    pub fn set_current_time(&mut self, time: f32) {
        self.current_time = time;
        for node in self.nodes.values_mut() {
            for attribute in node.attributes.values_mut() {
                attribute.pending = None;
            }
        }
    }

    pub fn create_joint(
        &mut self,
        name: &str,
        parent: Option<NodeId>,
        translate: Vec3,
    ) -> Result<NodeId, SceneError> {
        let id = self.insert(Node::new(name, NodeKind::Joint));
        if let Some(parent) = parent {
            self.attach(id, parent)?;
        }
        self.set_vec3(id, attr::TRANSLATE, translate)?;
        Ok(id)
    }

    pub fn add_shape(&mut self, node: NodeId, name: &str) -> Result<NodeId, SceneError> {
        self.node(node)?;
        let shape = self.insert(Node::new(name, NodeKind::Shape));
        self.attach(shape, node)?;
        Ok(shape)
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, node)| node.name == name)
            .map(|(id, _)| id)
    }

    pub fn kind(&self, node: NodeId) -> Option<&NodeKind> {
        self.nodes.get(node).map(|n| &n.kind)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn constraints(&self) -> Vec<(NodeId, &ConstraintRecord)> {
        self.nodes
            .iter()
            .filter_map(|(id, node)| match &node.kind {
                NodeKind::Constraint(record) => Some((id, record)),
                _ => None,
            })
            .collect()
    }

    pub fn constraints_on(&self, driven: NodeId) -> Vec<&ConstraintRecord> {
        self.constraints()
            .into_iter()
            .filter(|(_, record)| record.driven == driven)
            .map(|(_, record)| record)
            .collect()
    }

    pub fn ik_handles(&self) -> Vec<(NodeId, NodeId, NodeId)> {
        self.nodes
            .iter()
            .filter_map(|(id, node)| match node.kind {
                NodeKind::IkHandle { start, end } => Some((id, start, end)),
                _ => None,
            })
            .collect()
    }

    pub fn connection_source(&self, destination: &Plug) -> Option<&Plug> {
        self.connections.get(destination)
    }

    pub fn is_visible(&self, node: NodeId, time: f32) -> Result<bool, SceneError> {
        Ok(self.float(node, attr::VISIBILITY, time)? > 0.5)
    }

    pub fn keyframes(&self, node: NodeId, name: &str) -> Result<Vec<(f32, AttrValue)>, SceneError> {
        Ok(self.attribute(node, name)?.keys.clone())
    }

    pub fn vec3(&self, node: NodeId, name: &str, time: f32) -> Result<Vec3, SceneError> {
        self.evaluate(node, name, time)?
            .as_vec3()
            .ok_or_else(|| SceneError::TypeMismatch {
                attribute: name.to_string(),
                expected: "vec3",
            })
    }

    pub fn set_vec3(&mut self, node: NodeId, name: &str, value: Vec3) -> Result<(), SceneError> {
        let time = self.current_time;
        let attribute = self.attribute_mut(node, name)?;
        if attribute.value.as_vec3().is_none() {
            return Err(SceneError::TypeMismatch {
                attribute: name.to_string(),
                expected: "vec3",
            });
        }
        attribute.write(AttrValue::Vec3(value), time);
        Ok(())
    }

    pub fn world_translation(&self, node: NodeId, time: f32) -> Result<Vec3, SceneError> {
        Ok(self.world_matrix(node, time)?.w_axis.truncate())
    }

    fn insert(&mut self, node: Node) -> NodeId {
        let id = self.nodes.insert(node);
        log::debug!("created node {:?} `{}`", id, self.nodes[id].name);
        id
    }

    fn node(&self, id: NodeId) -> Result<&Node, SceneError> {
        self.nodes.get(id).ok_or(SceneError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, SceneError> {
        self.nodes.get_mut(id).ok_or(SceneError::NodeNotFound(id))
    }

    fn attribute(&self, node: NodeId, name: &str) -> Result<&Attribute, SceneError> {
        self.node(node)?
            .attributes
            .get(name)
            .ok_or_else(|| SceneError::AttributeNotFound {
                node,
                attribute: name.to_string(),
            })
    }

    fn attribute_mut(&mut self, node: NodeId, name: &str) -> Result<&mut Attribute, SceneError> {
        self.node_mut(node)?
            .attributes
            .get_mut(name)
            .ok_or_else(|| SceneError::AttributeNotFound {
                node,
                attribute: name.to_string(),
            })
    }

    fn attach(&mut self, node: NodeId, parent: NodeId) -> Result<(), SceneError> {
        self.node(parent)?;
        self.node_mut(node)?.parent = Some(parent);
        self.node_mut(parent)?.children.push(node);
        Ok(())
    }

    fn detach(&mut self, node: NodeId) -> Result<(), SceneError> {
        if let Some(parent) = self.node_mut(node)?.parent.take() {
            if let Some(parent) = self.nodes.get_mut(parent) {
                parent.children.retain(|c| *c != node);
            }
        }
        Ok(())
    }

    fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(id).and_then(|n| n.parent);
        }
        false
    }

    fn evaluate(&self, node: NodeId, name: &str, time: f32) -> Result<AttrValue, SceneError> {
        if let Some(source) = self.connections.get(&Plug::new(node, name)) {
            return self.evaluate(source.node, &source.attribute, time);
        }

        if name == attr::OUTPUT {
            if let NodeKind::Utility(kind) = self.node(node)?.kind {
                return self.evaluate_utility(node, kind, time);
            }
        }

        Ok(self.attribute(node, name)?.sample(time))
    }

    fn evaluate_utility(
        &self,
        node: NodeId,
        kind: UtilityKind,
        time: f32,
    ) -> Result<AttrValue, SceneError> {
        match kind {
            UtilityKind::Reverse => {
                let input = self.float(node, attr::INPUT, time)?;
                Ok(AttrValue::Float(1.0 - input))
            }
            UtilityKind::Blend => {
                let a = self.vec3(node, attr::INPUT_A, time)?;
                let b = self.vec3(node, attr::INPUT_B, time)?;
                let weight = self.float(node, attr::WEIGHT, time)?;
                Ok(AttrValue::Vec3(a.lerp(b, weight)))
            }
        }
    }

    fn write_local(&mut self, node: NodeId, local: Transform, time: f32) -> Result<(), SceneError> {
        let values = [
            (attr::TRANSLATE, local.position),
            (attr::ROTATE, local.euler()),
            (attr::SCALE, local.scale),
        ];
        for (name, value) in values {
            self.attribute_mut(node, name)?.write(AttrValue::Vec3(value), time);
        }
        Ok(())
    }

    fn parent_world(&self, node: NodeId, time: f32) -> Result<Mat4, SceneError> {
        match self.node(node)?.parent {
            Some(parent) => self.world_matrix(parent, time),
            None => Ok(Mat4::IDENTITY),
        }
    }

    fn add_constraint(
        &mut self,
        kind: ConstraintKind,
        driver: NodeId,
        driven: NodeId,
        maintain_offset: bool,
    ) -> Result<NodeId, SceneError> {
        let time = self.current_time;
        let offset = if maintain_offset {
            self.world_matrix(driver, time)?.inverse() * self.world_matrix(driven, time)?
        } else {
            Mat4::IDENTITY
        };
        let label = match kind {
            ConstraintKind::Parent => "parentConstraint",
            ConstraintKind::Orient => "orientConstraint",
            ConstraintKind::PoleVector => "poleVectorConstraint",
        };
        let name = format!("{}_{}", self.node(driven)?.name, label);
        let record = ConstraintRecord {
            kind,
            driver,
            driven,
            maintain_offset,
            offset,
        };
        Ok(self.insert(Node::new(&name, NodeKind::Constraint(record))))
    }
}

impl SceneGraph for MemoryScene {
    fn create_transform(&mut self, name: &str) -> Result<NodeId, SceneError> {
        Ok(self.insert(Node::new(name, NodeKind::Transform)))
    }

    fn create_utility(&mut self, kind: UtilityKind, name: &str) -> Result<NodeId, SceneError> {
        Ok(self.insert(Node::new(name, NodeKind::Utility(kind))))
    }

    fn duplicate(&mut self, node: NodeId) -> Result<NodeId, SceneError> {
        let time = self.current_time;
        let source = self.node(node)?.clone();

        let mut copy = Node::new(&source.name, source.kind.clone());
        for (name, attribute) in &source.attributes {
            let value = self.evaluate(node, name, time)?;
            copy.attributes.insert(
                name.clone(),
                Attribute {
                    value,
                    keys: Vec::new(),
                    pending: None,
                    ..attribute.clone()
                },
            );
        }
        let id = self.insert(copy);
        if let Some(parent) = source.parent {
            self.attach(id, parent)?;
        }

        for child in source.children {
            if self.node(child)?.kind == NodeKind::Shape {
                let shape = self.duplicate(child)?;
                self.detach(shape)?;
                self.attach(shape, id)?;
            }
        }
        Ok(id)
    }

    fn delete(&mut self, node: NodeId) -> Result<(), SceneError> {
        self.detach(node)?;

        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if let Some(removed) = self.nodes.remove(id) {
                stack.extend(removed.children);
            }
        }

        let orphaned: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, n)| match &n.kind {
                NodeKind::Constraint(record) => {
                    !self.nodes.contains_key(record.driver) || !self.nodes.contains_key(record.driven)
                }
                NodeKind::IkHandle { start, end } => {
                    !self.nodes.contains_key(*start) || !self.nodes.contains_key(*end)
                }
                _ => false,
            })
            .map(|(id, _)| id)
            .collect();
        for id in orphaned {
            if self.nodes.contains_key(id) {
                self.delete(id)?;
            }
        }

        let nodes = &self.nodes;
        self.connections
            .retain(|dst, src| nodes.contains_key(dst.node) && nodes.contains_key(src.node));
        Ok(())
    }

    fn rename(&mut self, node: NodeId, name: &str) -> Result<(), SceneError> {
        self.node_mut(node)?.name = name.to_string();
        Ok(())
    }

    fn name(&self, node: NodeId) -> Result<String, SceneError> {
        Ok(self.node(node)?.name.clone())
    }

    fn exists(&self, node: NodeId) -> bool {
        self.nodes.contains_key(node)
    }

    fn set_parent(&mut self, node: NodeId, parent: Option<NodeId>) -> Result<(), SceneError> {
        let time = self.current_time;
        let world = self.world_matrix(node, time)?;

        if let Some(parent) = parent {
            self.node(parent)?;
            if self.is_ancestor(node, parent) {
                return Err(SceneError::InvalidParent { node, parent });
            }
        }

        self.detach(node)?;
        if let Some(parent) = parent {
            self.attach(node, parent)?;
        }

        if self.node(node)?.attributes.contains_key(attr::TRANSLATE) {
            self.set_world_matrix(node, world, time)?;
        }
        Ok(())
    }

    fn parent(&self, node: NodeId) -> Result<Option<NodeId>, SceneError> {
        Ok(self.node(node)?.parent)
    }

    fn children(&self, node: NodeId) -> Result<Vec<NodeId>, SceneError> {
        Ok(self.node(node)?.children.clone())
    }

    fn shapes(&self, node: NodeId) -> Result<Vec<NodeId>, SceneError> {
        Ok(self
            .node(node)?
            .children
            .iter()
            .copied()
            .filter(|c| matches!(self.nodes.get(*c).map(|n| &n.kind), Some(NodeKind::Shape)))
            .collect())
    }

    fn world_matrix(&self, node: NodeId, time: f32) -> Result<Mat4, SceneError> {
        Ok(self.parent_world(node, time)? * self.local_matrix(node, time)?)
    }

    fn local_matrix(&self, node: NodeId, time: f32) -> Result<Mat4, SceneError> {
        if !self.node(node)?.attributes.contains_key(attr::TRANSLATE) {
            return Ok(Mat4::IDENTITY);
        }
        let local = Transform::from_channels(
            self.vec3(node, attr::TRANSLATE, time)?,
            self.vec3(node, attr::ROTATE, time)?,
            self.vec3(node, attr::SCALE, time)?,
        );
        Ok(local.to_matrix())
    }

    fn set_world_matrix(&mut self, node: NodeId, matrix: Mat4, time: f32) -> Result<(), SceneError> {
        let local = self.parent_world(node, time)?.inverse() * matrix;
        self.write_local(node, Transform::from_matrix(&local), time)
    }

    fn set_world_translation(&mut self, node: NodeId, point: Vec3, time: f32) -> Result<(), SceneError> {
        let local = self.parent_world(node, time)?.inverse().transform_point3(point);
        self.attribute_mut(node, attr::TRANSLATE)?
            .write(AttrValue::Vec3(local), time);
        Ok(())
    }

    fn parent_constraint(
        &mut self,
        driver: NodeId,
        driven: NodeId,
        maintain_offset: bool,
    ) -> Result<NodeId, SceneError> {
        self.add_constraint(ConstraintKind::Parent, driver, driven, maintain_offset)
    }

    fn orient_constraint(
        &mut self,
        driver: NodeId,
        driven: NodeId,
        maintain_offset: bool,
    ) -> Result<NodeId, SceneError> {
        self.add_constraint(ConstraintKind::Orient, driver, driven, maintain_offset)
    }

    fn pole_vector_constraint(&mut self, driver: NodeId, ik_handle: NodeId) -> Result<NodeId, SceneError> {
        if !matches!(self.node(ik_handle)?.kind, NodeKind::IkHandle { .. }) {
            return Err(SceneError::TypeMismatch {
                attribute: "poleVector".to_string(),
                expected: "ik handle",
            });
        }
        self.add_constraint(ConstraintKind::PoleVector, driver, ik_handle, false)
    }

    fn ik_handle(&mut self, start: NodeId, end: NodeId) -> Result<NodeId, SceneError> {
        let time = self.current_time;
        self.node(start)?;
        let end_world = self.world_matrix(end, time)?;
        let name = format!("{}_ikHandle", self.node(start)?.name);
        let handle = self.insert(Node::new(&name, NodeKind::IkHandle { start, end }));
        self.set_world_matrix(handle, end_world, time)?;
        Ok(handle)
    }

    fn add_attribute(&mut self, node: NodeId, name: &str, kind: AttrKind) -> Result<(), SceneError> {
        let target = self.node_mut(node)?;
        if target.attributes.contains_key(name) {
            return Err(SceneError::AttributeExists {
                node,
                attribute: name.to_string(),
            });
        }
        let attribute = match kind {
            AttrKind::Float { min, max, .. } if min.is_nan() || max.is_nan() || min > max => {
                return Err(SceneError::InvalidRange {
                    attribute: name.to_string(),
                    min,
                    max,
                });
            }
            AttrKind::Float { min, max, keyable } => Attribute {
                keyable,
                range: Some((min, max)),
                ..Attribute::channel(AttrValue::Float(0.0_f32.clamp(min, max)))
            },
            AttrKind::Message => Attribute::fixed(AttrValue::Message),
        };
        target.attributes.insert(name.to_string(), attribute);
        Ok(())
    }

    fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.nodes
            .get(node)
            .is_some_and(|n| n.attributes.contains_key(name))
    }

    fn connect(&mut self, source: &Plug, destination: &Plug) -> Result<(), SceneError> {
        let source_value = self.attribute(source.node, &source.attribute)?.value;
        let destination_value = self.attribute(destination.node, &destination.attribute)?.value;
        if std::mem::discriminant(&source_value) != std::mem::discriminant(&destination_value) {
            return Err(SceneError::TypeMismatch {
                attribute: destination.attribute.clone(),
                expected: match source_value {
                    AttrValue::Float(_) => "float",
                    AttrValue::Vec3(_) => "vec3",
                    AttrValue::Message => "message",
                },
            });
        }
        self.connections.insert(destination.clone(), source.clone());
        Ok(())
    }

    fn set_float(&mut self, node: NodeId, name: &str, value: f32) -> Result<(), SceneError> {
        let time = self.current_time;
        let attribute = self.attribute_mut(node, name)?;
        if attribute.value.as_float().is_none() {
            return Err(SceneError::TypeMismatch {
                attribute: name.to_string(),
                expected: "float",
            });
        }
        let value = match attribute.range {
            Some((min, max)) => value.clamp(min, max),
            None => value,
        };
        attribute.write(AttrValue::Float(value), time);
        Ok(())
    }

    fn float(&self, node: NodeId, name: &str, time: f32) -> Result<f32, SceneError> {
        self.evaluate(node, name, time)?
            .as_float()
            .ok_or_else(|| SceneError::TypeMismatch {
                attribute: name.to_string(),
                expected: "float",
            })
    }

    fn set_keyframe(&mut self, node: NodeId, attributes: &[&str], time: f32) -> Result<(), SceneError> {
        let names: Vec<String> = if attributes.is_empty() {
            self.node(node)?
                .attributes
                .iter()
                .filter(|(name, a)| a.keyable && !self.connections.contains_key(&Plug::new(node, name.as_str())))
                .map(|(name, _)| name.clone())
                .collect()
        } else {
            attributes.iter().map(|a| a.to_string()).collect()
        };

        for name in names {
            let value = self.evaluate(node, &name, time)?;
            self.attribute_mut(node, &name)?.insert_key(time, value);
        }
        Ok(())
    }

    fn current_time(&self) -> f32 {
        self.current_time
    }

    fn playback_range(&self) -> (f32, f32) {
        self.playback
    }

    fn set_visible(&mut self, node: NodeId, visible: bool) -> Result<(), SceneError> {
        let time = self.current_time;
        let value = if visible { 1.0 } else { 0.0 };
        self.attribute_mut(node, attr::VISIBILITY)?
            .write(AttrValue::Float(value), time);
        Ok(())
    }
}
