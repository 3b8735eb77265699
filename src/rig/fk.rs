use super::component::{ComponentId, Rig};
use super::order::{order_chain, ChainOrdering};
use crate::error::Result;
use crate::scene::{NodeId, SceneGraph};

/// A skeletal segment paired with the control that drives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainLink {
    pub segment: NodeId,
    pub control: NodeId,
}

#[derive(Debug, Clone, Default)]
pub struct FkSpec {
    pub segments: Vec<NodeId>,
    /// Template duplicated for every control, then deleted.
    pub shape: Option<NodeId>,
    pub name: Option<String>,
    pub ordering: Option<ChainOrdering>,
}

impl FkSpec {
    pub fn new(segments: Vec<NodeId>) -> Self {
        Self {
            segments,
            ..Default::default()
        }
    }

    pub fn with_shape(mut self, shape: NodeId) -> Self {
        self.shape = Some(shape);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_ordering(mut self, ordering: ChainOrdering) -> Self {
        self.ordering = Some(ordering);
        self
    }
}

/// One control per segment, each control following its predecessor.
#[derive(Debug, Clone)]
pub struct FkComponent {
    links: Vec<ChainLink>,
    chain_constraints: Vec<NodeId>,
    bind_constraints: Vec<NodeId>,
}

impl FkComponent {
    pub fn links(&self) -> &[ChainLink] {
        &self.links
    }

    pub fn root_control(&self) -> NodeId {
        self.links[0].control
    }

    /// Control-to-control constraints created at construction.
    pub fn chain_constraints(&self) -> &[NodeId] {
        &self.chain_constraints
    }

    /// Control-to-segment constraints from every `bind` so far.
    pub fn bind_constraints(&self) -> &[NodeId] {
        &self.bind_constraints
    }

    pub(crate) fn snap<S: SceneGraph + ?Sized>(&self, scene: &mut S, time: f32) -> Result<()> {
        for link in &self.links {
            let matrix = scene.world_matrix(link.segment, time)?;
            scene.set_world_matrix(link.control, matrix, time)?;
        }
        Ok(())
    }

    pub(crate) fn bind<S: SceneGraph + ?Sized>(&mut self, scene: &mut S) -> Result<()> {
        for link in &self.links {
            let constraint = scene.parent_constraint(link.control, link.segment, true)?;
            self.bind_constraints.push(constraint);
        }
        Ok(())
    }

    pub(crate) fn unbind<S: SceneGraph + ?Sized>(&mut self, scene: &mut S) -> Result<()> {
        for constraint in self.bind_constraints.drain(..) {
            if scene.exists(constraint) {
                scene.delete(constraint)?;
            }
        }
        Ok(())
    }
}

pub(crate) fn build<S: SceneGraph + ?Sized>(
    rig: &mut Rig,
    scene: &mut S,
    id: ComponentId,
    spec: FkSpec,
) -> Result<FkComponent> {
    let ordering = spec.ordering.unwrap_or(rig.config().ordering);
    let segments = order_chain(scene, &spec.segments, ordering)?;
    if let Some(shape) = spec.shape {
        scene.name(shape)?;
    }

    let mut links = Vec::with_capacity(segments.len());
    for segment in segments {
        let name = scene.name(segment)?;
        let control = rig.add_control(scene, id, spec.shape, &name)?;
        links.push(ChainLink { segment, control });
    }
    if let Some(shape) = spec.shape {
        scene.delete(shape)?;
    }

    let mut chain_constraints = Vec::with_capacity(links.len().saturating_sub(1));
    for pair in links.windows(2) {
        chain_constraints.push(scene.parent_constraint(pair[0].control, pair[1].control, true)?);
    }
    log::debug!("built FK chain of {} controls", links.len());

    Ok(FkComponent {
        links,
        chain_constraints,
        bind_constraints: Vec::new(),
    })
}
