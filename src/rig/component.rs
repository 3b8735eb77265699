use slotmap::{new_key_type, SlotMap};

use super::blend::{self, BlendSpec, FkIkBlendComponent};
use super::fk::{self, FkComponent, FkSpec};
use super::ik::{self, IkComponent, IkSpec};
use crate::config::RigConfig;
use crate::error::{ConfigError, Result, RigError};
use crate::scene::{attr, with_rollback, AttrKind, Journal, NodeId, Plug, RollbackLog, SceneGraph};

new_key_type! {
    /// Stable handle to a component record inside a [`Rig`].
    pub struct ComponentId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentState {
    Constructed,
    Grouped,
    Bound,
}

/// The variant-specific half of a component.
#[derive(Debug, Clone)]
pub enum ComponentKind {
    /// Plain container: composition, grouping and bake only.
    Group,
    Fk(FkComponent),
    Ik(IkComponent),
    Blend(FkIkBlendComponent),
}

/// Construction arguments for each component variant.
#[derive(Debug, Clone)]
pub enum ComponentSpec {
    Group { name: Option<String> },
    Fk(FkSpec),
    Ik(IkSpec),
    Blend(BlendSpec),
}

impl ComponentSpec {
    fn name(&self) -> String {
        let (name, fallback) = match self {
            ComponentSpec::Group { name } => (name, "Component"),
            ComponentSpec::Fk(spec) => (&spec.name, "FK"),
            ComponentSpec::Ik(spec) => (&spec.name, "IK"),
            ComponentSpec::Blend(spec) => (&spec.name, "FKIKBlend"),
        };
        name.clone().unwrap_or_else(|| fallback.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct ComponentRecord {
    name: String,
    kind: ComponentKind,
    controls: Vec<NodeId>,
    support: Vec<NodeId>,
    groups: Vec<NodeId>,
    components: Vec<ComponentId>,
    master_group: Option<NodeId>,
    grouped: bool,
    bound: bool,
}

impl ComponentRecord {
    fn new(name: String) -> Self {
        Self {
            name,
            kind: ComponentKind::Group,
            controls: Vec::new(),
            support: Vec::new(),
            groups: Vec::new(),
            components: Vec::new(),
            master_group: None,
            grouped: false,
            bound: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ComponentKind {
        &self.kind
    }

    /// Controls owned directly by this component.
    pub fn controls(&self) -> &[NodeId] {
        &self.controls
    }

    pub fn support(&self) -> &[NodeId] {
        &self.support
    }

    pub fn groups(&self) -> &[NodeId] {
        &self.groups
    }

    pub fn components(&self) -> &[ComponentId] {
        &self.components
    }

    pub fn master_group(&self) -> Option<NodeId> {
        self.master_group
    }

    pub fn state(&self) -> ComponentState {
        if self.bound {
            ComponentState::Bound
        } else if self.grouped {
            ComponentState::Grouped
        } else {
            ComponentState::Constructed
        }
    }

    fn unsupported(&self, operation: &'static str) -> RigError {
        RigError::Unsupported {
            operation,
            component: self.name.clone(),
        }
    }
}

/// Arena of rig components and the operations shared by every variant.
#[derive(Debug, Clone, Default)]
pub struct Rig {
    config: RigConfig,
    components: SlotMap<ComponentId, ComponentRecord>,
    roots: Vec<ComponentId>,
}

impl Rig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RigConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    pub fn config(&self) -> &RigConfig {
        &self.config
    }

    pub fn roots(&self) -> &[ComponentId] {
        &self.roots
    }

    pub fn component(&self, id: ComponentId) -> Result<&ComponentRecord> {
        self.components.get(id).ok_or(RigError::UnknownComponent)
    }

    fn component_mut(&mut self, id: ComponentId) -> Result<&mut ComponentRecord> {
        self.components.get_mut(id).ok_or(RigError::UnknownComponent)
    }

    pub fn fk_component(&self, id: ComponentId) -> Result<&FkComponent> {
        match &self.component(id)?.kind {
            ComponentKind::Fk(fk) => Ok(fk),
            _ => Err(RigError::UnknownComponent),
        }
    }

    pub fn ik_component(&self, id: ComponentId) -> Result<&IkComponent> {
        match &self.component(id)?.kind {
            ComponentKind::Ik(ik) => Ok(ik),
            _ => Err(RigError::UnknownComponent),
        }
    }

    pub fn blend_component(&self, id: ComponentId) -> Result<&FkIkBlendComponent> {
        match &self.component(id)?.kind {
            ComponentKind::Blend(blend) => Ok(blend),
            _ => Err(RigError::UnknownComponent),
        }
    }

    /// Builds a top-level component.
    pub fn build<S: SceneGraph + ?Sized>(&mut self, scene: &mut S, spec: ComponentSpec) -> Result<ComponentId> {
        self.add_component(scene, None, spec)
    }

    /// Builds a component and nests it under `parent`, or registers it as a root.
    pub fn add_component<S: SceneGraph + ?Sized>(
        &mut self,
        scene: &mut S,
        parent: Option<ComponentId>,
        spec: ComponentSpec,
    ) -> Result<ComponentId> {
        if let Some(parent) = parent {
            self.component(parent)?;
        }

        let id = self.components.insert(ComponentRecord::new(spec.name()));
        let built = match spec {
            ComponentSpec::Group { .. } => Ok(ComponentKind::Group),
            ComponentSpec::Fk(spec) => fk::build(self, scene, id, spec).map(ComponentKind::Fk),
            ComponentSpec::Ik(spec) => ik::build(self, scene, id, spec).map(ComponentKind::Ik),
            ComponentSpec::Blend(spec) => blend::build(self, scene, id, spec).map(ComponentKind::Blend),
        };

        let kind = match built {
            Ok(kind) => kind,
            Err(err) => {
                self.remove_record(id);
                return Err(err);
            }
        };

        let record = self.component_mut(id)?;
        record.kind = kind;
        log::debug!("constructed component `{}`", record.name);

        match parent {
            Some(parent) => self.component_mut(parent)?.components.push(id),
            None => self.roots.push(id),
        }
        Ok(id)
    }

    /// Runs `build` under [`with_rollback`]; on failure the arena is restored too.
    pub fn transaction<S, T, F>(&mut self, scene: &mut S, build: F) -> Result<(T, RollbackLog)>
    where
        S: SceneGraph + ?Sized,
        F: FnOnce(&mut Rig, &mut Journal<'_, S>) -> Result<T>,
    {
        let snapshot = self.clone();
        let result = with_rollback(scene, |journal| build(self, journal));
        if result.is_err() {
            *self = snapshot;
            log::debug!("restored rig arena to {} component(s)", self.components.len());
        }
        result
    }

    fn blend_children(&self, id: ComponentId) -> Result<Option<(ComponentId, ComponentId)>> {
        Ok(match &self.component(id)?.kind {
            ComponentKind::Blend(blend) => Some((blend.fk(), blend.ik())),
            _ => None,
        })
    }

    fn remove_record(&mut self, id: ComponentId) {
        if let Some(record) = self.components.remove(id) {
            for child in record.components {
                self.remove_record(child);
            }
        }
    }

    /// Creates a control from `shape` (or an empty transform) named `<name>_<suffix>`.
    pub fn add_control<S: SceneGraph + ?Sized>(
        &mut self,
        scene: &mut S,
        id: ComponentId,
        shape: Option<NodeId>,
        name: &str,
    ) -> Result<NodeId> {
        self.component(id)?;
        let control_name = self.config.control_name(name);
        let control = match shape {
            Some(shape) => {
                let control = scene.duplicate(shape)?;
                scene.rename(control, &control_name)?;
                control
            }
            None => scene.create_transform(&control_name)?,
        };
        self.component_mut(id)?.controls.push(control);
        log::debug!("added control `{}`", control_name);
        Ok(control)
    }

    /// Creates an organizational group under `parent`, or under the master group.
    pub fn add_group<S: SceneGraph + ?Sized>(
        &mut self,
        scene: &mut S,
        id: ComponentId,
        name: &str,
        parent: Option<NodeId>,
    ) -> Result<NodeId> {
        let parent = parent.or(self.component(id)?.master_group);
        let group = scene.create_transform(name)?;
        if parent.is_some() {
            scene.set_parent(group, parent)?;
        }
        self.component_mut(id)?.groups.push(group);
        Ok(group)
    }

    /// Records auxiliary nodes; they are reparented by [`Rig::add_groups`].
    pub fn add_support(&mut self, id: ComponentId, nodes: &[NodeId]) -> Result<()> {
        self.component_mut(id)?.support.extend_from_slice(nodes);
        Ok(())
    }

    /// One-time grouping pass over the component and its children.
    pub fn add_groups<S: SceneGraph + ?Sized>(
        &mut self,
        scene: &mut S,
        id: ComponentId,
        parent: Option<NodeId>,
    ) -> Result<()> {
        let record = self.component(id)?;
        if record.grouped {
            return Err(RigError::AlreadyGrouped(record.name.clone()));
        }
        let name = record.name.clone();

        let master = scene.create_transform(&self.config.group_name(&name))?;
        if parent.is_some() {
            scene.set_parent(master, parent)?;
        }
        self.component_mut(id)?.master_group = Some(master);

        let control_group = self.add_group(scene, id, &format!("{}_controls", name), None)?;
        let support_group = self.add_group(scene, id, &format!("{}_support", name), None)?;
        let component_group = self.add_group(scene, id, &format!("{}_components", name), None)?;

        let record = self.component(id)?;
        let controls = record.controls.clone();
        let support = record.support.clone();
        let children = record.components.clone();

        for control in controls {
            scene.set_parent(control, Some(control_group))?;
        }
        for child in children {
            self.add_groups(scene, child, Some(component_group))?;
        }
        for node in support {
            scene.set_parent(node, Some(support_group))?;
        }

        scene.set_visible(support_group, false)?;

        for group in [component_group, support_group, control_group] {
            if scene.children(group)?.is_empty() {
                scene.delete(group)?;
                self.component_mut(id)?.groups.retain(|g| *g != group);
            }
        }

        self.component_mut(id)?.grouped = true;
        log::info!("grouped component `{}`", name);
        Ok(())
    }

    /// Own controls followed by every descendant's controls, depth first.
    pub fn get_controls(&self, id: ComponentId) -> Result<Vec<NodeId>> {
        let record = self.component(id)?;
        let mut controls = record.controls.clone();
        for &child in &record.components {
            controls.extend(self.get_controls(child)?);
        }
        Ok(controls)
    }

    /// Adds `_<name>_reference` to `source` and links it to `target`.
    pub fn store_reference<S: SceneGraph + ?Sized>(
        scene: &mut S,
        source: NodeId,
        target: NodeId,
        name: Option<&str>,
    ) -> Result<Plug> {
        let name = match name {
            Some(name) => name.to_string(),
            None => scene.name(target)?,
        };
        let plug = Plug::new(source, format!("_{}_reference", name));
        scene.add_attribute(source, &plug.attribute, AttrKind::Message)?;
        scene.connect(&plug, &Plug::new(target, attr::MESSAGE))?;
        Ok(plug)
    }

    /// Moves every control onto its segment's world transform at `time`.
    pub fn snap<S: SceneGraph + ?Sized>(&self, scene: &mut S, id: ComponentId, time: f32) -> Result<()> {
        let record = self.component(id)?;
        match &record.kind {
            ComponentKind::Group => return Err(record.unsupported("snap")),
            ComponentKind::Fk(fk) => fk.snap(scene, time)?,
            ComponentKind::Ik(ik) => ik.snap(scene, time)?,
            ComponentKind::Blend(blend) => {
                blend.snap_chains(scene, time)?;
                self.snap(scene, blend.fk(), time)?;
                self.snap(scene, blend.ik(), time)?;
            }
        }
        log::info!("snapped component `{}` at {}", record.name, time);
        Ok(())
    }

    /// Creates the constraint network that makes the skeleton follow the controls.
    pub fn bind<S: SceneGraph + ?Sized>(&mut self, scene: &mut S, id: ComponentId) -> Result<()> {
        let record = self.component(id)?;
        if let ComponentKind::Group = record.kind {
            return Err(record.unsupported("bind"));
        }
        if let Some((fk, ik)) = self.blend_children(id)? {
            self.bind(scene, fk)?;
            self.bind(scene, ik)?;
        }

        let record = self.component_mut(id)?;
        match &mut record.kind {
            ComponentKind::Group => {}
            ComponentKind::Fk(fk) => fk.bind(scene)?,
            ComponentKind::Ik(ik) => ik.bind(scene)?,
            ComponentKind::Blend(blend) => blend.bind_result(scene)?,
        }
        record.bound = true;
        log::info!("bound component `{}`", record.name);
        Ok(())
    }

    /// Removes everything `bind` created; controls are left untouched.
    pub fn unbind<S: SceneGraph + ?Sized>(&mut self, scene: &mut S, id: ComponentId) -> Result<()> {
        let record = self.component(id)?;
        if let ComponentKind::Group = record.kind {
            return Err(record.unsupported("unbind"));
        }
        if !record.bound {
            return Err(RigError::NotBound(record.name.clone()));
        }

        if let Some((fk, ik)) = self.blend_children(id)? {
            for child in [fk, ik] {
                if self.component(child)?.bound {
                    self.unbind(scene, child)?;
                }
            }
        }

        let record = self.component_mut(id)?;
        match &mut record.kind {
            ComponentKind::Group => {}
            ComponentKind::Fk(fk) => fk.unbind(scene)?,
            ComponentKind::Ik(ik) => ik.unbind(scene)?,
            ComponentKind::Blend(blend) => blend.unbind_result(scene)?,
        }
        record.bound = false;
        log::info!("unbound component `{}`", record.name);
        Ok(())
    }

    /// Keys the directly-owned controls at `time`; blends also bake their children first.
    pub fn bake<S: SceneGraph + ?Sized>(
        &self,
        scene: &mut S,
        id: ComponentId,
        time: f32,
        attributes: &[&str],
    ) -> Result<()> {
        let record = self.component(id)?;
        if let ComponentKind::Blend(blend) = &record.kind {
            self.bake(scene, blend.fk(), time, attributes)?;
            self.bake(scene, blend.ik(), time, attributes)?;
        }
        for &control in &record.controls {
            scene.set_keyframe(control, attributes, time)?;
        }
        Ok(())
    }
}
