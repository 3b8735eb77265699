//! FK/IK blend: an FK and an IK component over parallel duplicate chains,
//! mixed per channel into a result chain that drives the real skeleton.

use super::component::{ComponentId, ComponentSpec, Rig};
use super::fk::FkSpec;
use super::ik::IkSpec;
use super::order::{order_chain, ChainOrdering};
use crate::error::{Result, RigError};
use crate::scene::{attr, AttrKind, NodeId, Plug, SceneGraph, UtilityKind};

#[derive(Debug, Clone, Default)]
pub struct BlendSpec {
    pub segments: Vec<NodeId>,
    pub fk_shape: Option<NodeId>,
    pub ik_shape: Option<NodeId>,
    pub pole_shape: Option<NodeId>,
    pub master_shape: Option<NodeId>,
    pub name: Option<String>,
    pub ordering: Option<ChainOrdering>,
}

impl BlendSpec {
    pub fn new(segments: Vec<NodeId>) -> Self {
        Self {
            segments,
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_master_shape(mut self, shape: NodeId) -> Self {
        self.master_shape = Some(shape);
        self
    }

    pub fn with_fk_shape(mut self, shape: NodeId) -> Self {
        self.fk_shape = Some(shape);
        self
    }

    pub fn with_ik_shapes(mut self, ik: Option<NodeId>, pole: Option<NodeId>) -> Self {
        self.ik_shape = ik;
        self.pole_shape = pole;
        self
    }

    pub fn with_ordering(mut self, ordering: ChainOrdering) -> Self {
        self.ordering = Some(ordering);
        self
    }
}

#[derive(Debug, Clone)]
pub struct FkIkBlendComponent {
    segments: Vec<NodeId>,
    master: NodeId,
    blend_attribute: String,
    fk_chain: Vec<NodeId>,
    ik_chain: Vec<NodeId>,
    result_chain: Vec<NodeId>,
    fk: ComponentId,
    ik: ComponentId,
    blend_nodes: Vec<NodeId>,
    result_constraints: Vec<NodeId>,
}

impl FkIkBlendComponent {
    pub fn segments(&self) -> &[NodeId] {
        &self.segments
    }

    pub fn master_control(&self) -> NodeId {
        self.master
    }

    /// The blend factor: 0 is pure FK, 1 is pure IK.
    pub fn blend_plug(&self) -> Plug {
        Plug::new(self.master, self.blend_attribute.as_str())
    }

    pub fn fk_chain(&self) -> &[NodeId] {
        &self.fk_chain
    }

    pub fn ik_chain(&self) -> &[NodeId] {
        &self.ik_chain
    }

    pub fn result_chain(&self) -> &[NodeId] {
        &self.result_chain
    }

    pub fn fk(&self) -> ComponentId {
        self.fk
    }

    pub fn ik(&self) -> ComponentId {
        self.ik
    }

    /// Rotate then translate blend node for each segment.
    pub fn blend_nodes(&self) -> &[NodeId] {
        &self.blend_nodes
    }

    pub fn result_constraints(&self) -> &[NodeId] {
        &self.result_constraints
    }

    /// Poses both driver chains on the skeleton at `time` and snaps the master.
    pub(crate) fn snap_chains<S: SceneGraph + ?Sized>(&self, scene: &mut S, time: f32) -> Result<()> {
        for (i, &segment) in self.segments.iter().enumerate() {
            let matrix = scene.world_matrix(segment, time)?;
            scene.set_world_matrix(self.fk_chain[i], matrix, time)?;
            scene.set_world_matrix(self.ik_chain[i], matrix, time)?;
            scene.set_keyframe(self.ik_chain[i], &[], time)?;
            scene.set_keyframe(self.fk_chain[i], &[], time)?;
        }

        let master_matrix = scene.world_matrix(self.segments[0], time)?;
        scene.set_world_matrix(self.master, master_matrix, time)?;
        Ok(())
    }

    pub(crate) fn bind_result<S: SceneGraph + ?Sized>(&mut self, scene: &mut S) -> Result<()> {
        for (&result, &segment) in self.result_chain.iter().zip(&self.segments) {
            let constraint = scene.parent_constraint(result, segment, true)?;
            self.result_constraints.push(constraint);
        }
        Ok(())
    }

    pub(crate) fn unbind_result<S: SceneGraph + ?Sized>(&mut self, scene: &mut S) -> Result<()> {
        for constraint in self.result_constraints.drain(..) {
            if scene.exists(constraint) {
                scene.delete(constraint)?;
            }
        }
        Ok(())
    }
}

/// Duplicates `segments` into a world-rooted chain renamed `<segment>_<suffix>`.
fn duplicate_chain<S: SceneGraph + ?Sized>(
    rig: &mut Rig,
    scene: &mut S,
    id: ComponentId,
    segments: &[NodeId],
    suffix: &str,
) -> Result<Vec<NodeId>> {
    let mut chain: Vec<NodeId> = Vec::with_capacity(segments.len());
    for &segment in segments {
        let copy = scene.duplicate(segment)?;
        scene.set_parent(copy, chain.last().copied())?;
        let name = format!("{}_{}", scene.name(segment)?, suffix);
        scene.rename(copy, &name)?;
        chain.push(copy);
    }
    rig.add_support(id, &chain[..1])?;
    Ok(chain)
}

pub(crate) fn build<S: SceneGraph + ?Sized>(
    rig: &mut Rig,
    scene: &mut S,
    id: ComponentId,
    spec: BlendSpec,
) -> Result<FkIkBlendComponent> {
    if spec.segments.len() < 3 {
        return Err(RigError::TooFewSegments {
            needed: 3,
            got: spec.segments.len(),
        });
    }
    let ordering = spec.ordering.unwrap_or(rig.config().ordering);
    let segments = order_chain(scene, &spec.segments, ordering)?;
    let shapes = [spec.fk_shape, spec.ik_shape, spec.pole_shape, spec.master_shape];
    for shape in shapes.into_iter().flatten() {
        scene.name(shape)?;
    }

    let name = rig.component(id)?.name().to_string();
    let config = rig.config().clone();

    let master = rig.add_control(scene, id, spec.master_shape, &name)?;
    scene.add_attribute(
        master,
        &config.blend_attribute,
        AttrKind::Float {
            min: 0.0,
            max: 1.0,
            keyable: true,
        },
    )?;
    let factor = Plug::new(master, config.blend_attribute.as_str());

    let fk_chain = duplicate_chain(rig, scene, id, &segments, &config.fk_suffix)?;
    let ik_chain = duplicate_chain(rig, scene, id, &segments, &config.ik_suffix)?;
    let result_chain = duplicate_chain(rig, scene, id, &segments, &config.result_suffix)?;

    let fk_spec = FkSpec {
        segments: fk_chain.clone(),
        shape: spec.fk_shape,
        name: Some(format!("{}_{}", name, config.fk_suffix)),
        ordering: Some(ChainOrdering::AsGiven),
    };
    let fk = rig.add_component(scene, Some(id), ComponentSpec::Fk(fk_spec))?;

    let ik_spec = IkSpec {
        segments: ik_chain.clone(),
        ik_shape: spec.ik_shape,
        pole_shape: spec.pole_shape,
        name: Some(format!("{}_{}", name, config.ik_suffix)),
        ordering: Some(ChainOrdering::AsGiven),
        ..Default::default()
    };
    let ik = rig.add_component(scene, Some(id), ComponentSpec::Ik(ik_spec))?;

    let fk_controls: Vec<NodeId> = rig.fk_component(fk)?.links().iter().map(|l| l.control).collect();
    let ik_component = rig.ik_component(ik)?;
    let (ik_control, pole_control, base_control) = (
        ik_component.ik_control(),
        ik_component.pole_control(),
        ik_component.base_control(),
    );

    scene.parent_constraint(master, fk_controls[0], true)?;
    scene.parent_constraint(master, base_control, true)?;

    let fk_visibility = scene.create_utility(UtilityKind::Reverse, &format!("{}_fk_visibility", name))?;
    scene.connect(&factor, &Plug::new(fk_visibility, attr::INPUT))?;
    for &control in &fk_controls[1..] {
        scene.connect(
            &Plug::new(fk_visibility, attr::OUTPUT),
            &Plug::new(control, attr::VISIBILITY),
        )?;
    }
    for control in [ik_control, pole_control] {
        scene.connect(&factor, &Plug::new(control, attr::VISIBILITY))?;
    }
    scene.set_visible(fk_controls[0], false)?;

    let mut blend_nodes = Vec::with_capacity(segments.len() * 2);
    for (i, &segment) in segments.iter().enumerate() {
        let segment_name = scene.name(segment)?;
        for channel in [attr::ROTATE, attr::TRANSLATE] {
            let blend = scene.create_utility(
                UtilityKind::Blend,
                &format!("{}_{}_blend", segment_name, channel),
            )?;
            scene.connect(&factor, &Plug::new(blend, attr::WEIGHT))?;
            scene.connect(&Plug::new(fk_chain[i], channel), &Plug::new(blend, attr::INPUT_A))?;
            scene.connect(&Plug::new(ik_chain[i], channel), &Plug::new(blend, attr::INPUT_B))?;
            scene.connect(&Plug::new(blend, attr::OUTPUT), &Plug::new(result_chain[i], channel))?;
            blend_nodes.push(blend);
        }
    }
    log::debug!("wired {} blend nodes for `{}`", blend_nodes.len(), name);

    Ok(FkIkBlendComponent {
        segments,
        master,
        blend_attribute: config.blend_attribute,
        fk_chain,
        ik_chain,
        result_chain,
        fk,
        ik,
        blend_nodes,
        result_constraints: Vec::new(),
    })
}
