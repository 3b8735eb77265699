use glam::Vec3;

use super::component::{ComponentId, Rig};
use super::order::{order_chain, ChainOrdering};
use crate::error::{ConfigError, Result, RigError};
use crate::scene::{NodeId, SceneGraph};

#[derive(Debug, Clone, Default)]
pub struct IkSpec {
    pub segments: Vec<NodeId>,
    pub ik_shape: Option<NodeId>,
    pub pole_shape: Option<NodeId>,
    pub base_shape: Option<NodeId>,
    pub name: Option<String>,
    pub ordering: Option<ChainOrdering>,
    /// Overrides [`RigConfig::pole_distance`](crate::config::RigConfig::pole_distance).
    pub pole_distance: Option<f32>,
}

impl IkSpec {
    pub fn new(segments: Vec<NodeId>) -> Self {
        Self {
            segments,
            ..Default::default()
        }
    }

    pub fn with_shapes(mut self, ik: Option<NodeId>, pole: Option<NodeId>, base: Option<NodeId>) -> Self {
        self.ik_shape = ik;
        self.pole_shape = pole;
        self.base_shape = base;
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

    pub fn with_pole_distance(mut self, distance: f32) -> Self {
        self.pole_distance = Some(distance);
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct IkBinding {
    handle: NodeId,
    pole_constraint: NodeId,
    base_constraint: NodeId,
    end_constraint: NodeId,
}

/// End effector, pole and base controls over a chain of three or more segments.
#[derive(Debug, Clone)]
pub struct IkComponent {
    start: NodeId,
    knee: NodeId,
    end: NodeId,
    ik_control: NodeId,
    pole_control: NodeId,
    base_control: NodeId,
    pole_distance: f32,
    bindings: Vec<IkBinding>,
}

/// Places the pole `distance` away from the start/end midpoint, towards the knee.
///
/// A knee lying on the start/end line has no direction; the pole then sits on
/// the midpoint.
pub fn pole_position(start: Vec3, knee: Vec3, end: Vec3, distance: f32) -> Vec3 {
    let ik_vector = end - start;
    let mid_point = start + ik_vector / 2.0;
    let direction = (knee - mid_point).normalize_or_zero();
    if direction == Vec3::ZERO {
        log::warn!("knee at {} is collinear with the IK chain; pole placed on the midpoint", knee);
    }
    mid_point + direction * distance
}

impl IkComponent {
    pub fn start(&self) -> NodeId {
        self.start
    }

    pub fn knee(&self) -> NodeId {
        self.knee
    }

    pub fn end(&self) -> NodeId {
        self.end
    }

    pub fn ik_control(&self) -> NodeId {
        self.ik_control
    }

    pub fn pole_control(&self) -> NodeId {
        self.pole_control
    }

    pub fn base_control(&self) -> NodeId {
        self.base_control
    }

    pub fn pole_distance(&self) -> f32 {
        self.pole_distance
    }

    /// IK handles from every `bind` so far.
    pub fn handles(&self) -> Vec<NodeId> {
        self.bindings.iter().map(|b| b.handle).collect()
    }

    pub(crate) fn snap<S: SceneGraph + ?Sized>(&self, scene: &mut S, time: f32) -> Result<()> {
        let start_matrix = scene.world_matrix(self.start, time)?;
        let end_matrix = scene.world_matrix(self.end, time)?;
        let knee_point = scene.world_matrix(self.knee, time)?.w_axis.truncate();

        scene.set_world_matrix(self.ik_control, end_matrix, time)?;
        scene.set_world_matrix(self.base_control, start_matrix, time)?;

        let pole_point = pole_position(
            start_matrix.w_axis.truncate(),
            knee_point,
            end_matrix.w_axis.truncate(),
            self.pole_distance,
        );
        scene.set_world_translation(self.pole_control, pole_point, time)?;
        Ok(())
    }

    pub(crate) fn bind<S: SceneGraph + ?Sized>(&mut self, scene: &mut S) -> Result<()> {
        let handle = scene.ik_handle(self.start, self.end)?;
        scene.set_visible(handle, false)?;
        scene.set_parent(handle, Some(self.ik_control))?;

        let pole_constraint = scene.pole_vector_constraint(self.pole_control, handle)?;
        let base_constraint = scene.parent_constraint(self.base_control, self.start, true)?;
        let end_constraint = scene.orient_constraint(self.ik_control, self.end, true)?;

        self.bindings.push(IkBinding {
            handle,
            pole_constraint,
            base_constraint,
            end_constraint,
        });
        Ok(())
    }

    pub(crate) fn unbind<S: SceneGraph + ?Sized>(&mut self, scene: &mut S) -> Result<()> {
        for binding in self.bindings.drain(..) {
            let nodes = [
                binding.pole_constraint,
                binding.base_constraint,
                binding.end_constraint,
                binding.handle,
            ];
            for node in nodes {
                if scene.exists(node) {
                    scene.delete(node)?;
                }
            }
        }
        Ok(())
    }
}

pub(crate) fn build<S: SceneGraph + ?Sized>(
    rig: &mut Rig,
    scene: &mut S,
    id: ComponentId,
    spec: IkSpec,
) -> Result<IkComponent> {
    if spec.segments.len() < 3 {
        return Err(RigError::TooFewSegments {
            needed: 3,
            got: spec.segments.len(),
        });
    }

    let pole_distance = spec.pole_distance.unwrap_or(rig.config().pole_distance);
    if !pole_distance.is_finite() || pole_distance <= 0.0 {
        return Err(ConfigError::InvalidValue {
            field: "pole_distance".to_string(),
            message: format!("{} (must be finite and > 0)", pole_distance),
        }
        .into());
    }

    let ordering = spec.ordering.unwrap_or(rig.config().ordering);
    let segments = order_chain(scene, &spec.segments, ordering)?;
    for shape in [spec.ik_shape, spec.pole_shape, spec.base_shape].into_iter().flatten() {
        scene.name(shape)?;
    }

    let name = rig.component(id)?.name().to_string();
    let ik_control = rig.add_control(scene, id, spec.ik_shape, &format!("{}_IK", name))?;
    let pole_control = rig.add_control(scene, id, spec.pole_shape, &format!("{}_POLE", name))?;
    let base_control = rig.add_control(scene, id, spec.base_shape, &format!("{}_BASE", name))?;
    log::debug!("built IK controls for `{}`", name);

    Ok(IkComponent {
        start: segments[0],
        knee: segments[1],
        end: segments[segments.len() - 1],
        ik_control,
        pole_control,
        base_control,
        pole_distance,
        bindings: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rig::ComponentSpec;
    use crate::scene::{ConstraintKind, MemoryScene, NodeKind};

    fn leg(scene: &mut MemoryScene) -> Vec<NodeId> {
        let hip = scene.create_joint("hip", None, Vec3::ZERO).unwrap();
        let knee = scene.create_joint("knee", Some(hip), Vec3::new(1.0, 1.0, 0.0)).unwrap();
        let ankle = scene.create_joint("ankle", Some(knee), Vec3::new(1.0, -1.0, 0.0)).unwrap();
        vec![hip, knee, ankle]
    }

    #[test]
    fn test_pole_position_worked_example() {
        let pole = pole_position(Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0), Vec3::new(2.0, 0.0, 0.0), 50.0);
        assert_eq!(pole, Vec3::new(1.0, 50.0, 0.0));
    }

    #[test]
    fn test_pole_position_collinear_knee() {
        let pole = pole_position(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0), 50.0);
        assert_eq!(pole, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_snap_places_controls() {
        let mut scene = MemoryScene::new();
        let joints = leg(&mut scene);
        let mut rig = Rig::new();
        let id = rig.build(&mut scene, ComponentSpec::Ik(IkSpec::new(joints.clone()))).unwrap();

        rig.snap(&mut scene, id, 1.0).unwrap();
        let ik = rig.ik_component(id).unwrap();

        let pole = scene.world_translation(ik.pole_control(), 1.0).unwrap();
        assert!((pole - Vec3::new(1.0, 50.0, 0.0)).length() < 1e-4);
        let end = scene.world_translation(ik.ik_control(), 1.0).unwrap();
        assert!((end - Vec3::new(2.0, 0.0, 0.0)).length() < 1e-4);
        let base = scene.world_translation(ik.base_control(), 1.0).unwrap();
        assert!(base.length() < 1e-4);
    }

    #[test]
    fn test_controls_and_names() {
        let mut scene = MemoryScene::new();
        let joints = leg(&mut scene);
        let mut rig = Rig::new();
        let spec = IkSpec::new(joints.clone()).with_name("leg").with_pole_distance(5.0);
        let id = rig.build(&mut scene, ComponentSpec::Ik(spec)).unwrap();
        let ik = rig.ik_component(id).unwrap();

        assert_eq!(
            rig.get_controls(id).unwrap(),
            vec![ik.ik_control(), ik.pole_control(), ik.base_control()]
        );
        assert_eq!(scene.name(ik.ik_control()).unwrap(), "leg_IK_CTRL");
        assert_eq!(scene.name(ik.pole_control()).unwrap(), "leg_POLE_CTRL");
        assert_eq!(scene.name(ik.base_control()).unwrap(), "leg_BASE_CTRL");
        assert_eq!(ik.pole_distance(), 5.0);
        assert_eq!((ik.start(), ik.knee()), (joints[0], joints[1]));
        assert_eq!(ik.end(), joints[2]);
    }

    #[test]
    fn test_shape_templates_are_kept() {
        let mut scene = MemoryScene::new();
        let joints = leg(&mut scene);
        let mut templates = Vec::new();
        for name in ["box", "diamond", "square"] {
            let template = scene.create_transform(name).unwrap();
            scene.add_shape(template, &format!("{}Shape", name)).unwrap();
            templates.push(template);
        }
        let mut rig = Rig::new();

        let spec = IkSpec::new(joints).with_shapes(Some(templates[0]), Some(templates[1]), Some(templates[2]));
        let id = rig.build(&mut scene, ComponentSpec::Ik(spec)).unwrap();
        let ik = rig.ik_component(id).unwrap();

        let controls = [ik.ik_control(), ik.pole_control(), ik.base_control()];
        for (control, name) in controls.into_iter().zip(["boxShape", "diamondShape", "squareShape"]) {
            let shapes = scene.shapes(control).unwrap();
            assert_eq!(shapes.len(), 1);
            assert_eq!(scene.name(shapes[0]).unwrap(), name);
        }
        assert!(templates.iter().all(|t| scene.exists(*t)));
    }

    #[test]
    fn test_bind_wires_solver_and_constraints() {
        let mut scene = MemoryScene::new();
        let joints = leg(&mut scene);
        let mut rig = Rig::new();
        let id = rig.build(&mut scene, ComponentSpec::Ik(IkSpec::new(joints.clone()))).unwrap();
        rig.bind(&mut scene, id).unwrap();
        let ik = rig.ik_component(id).unwrap();

        let handles = ik.handles();
        assert_eq!(handles.len(), 1);
        let handle = handles[0];
        assert_eq!(
            scene.kind(handle),
            Some(&NodeKind::IkHandle { start: joints[0], end: joints[2] })
        );
        assert_eq!(scene.parent(handle).unwrap(), Some(ik.ik_control()));
        assert!(!scene.is_visible(handle, 1.0).unwrap());

        let pole = scene.constraints_on(handle);
        assert_eq!(pole[0].kind, ConstraintKind::PoleVector);
        assert_eq!(pole[0].driver, ik.pole_control());

        let base = scene.constraints_on(joints[0]);
        assert_eq!((base[0].kind, base[0].driver), (ConstraintKind::Parent, ik.base_control()));
        let end = scene.constraints_on(joints[2]);
        assert_eq!((end[0].kind, end[0].driver), (ConstraintKind::Orient, ik.ik_control()));
        assert!(end[0].maintain_offset);

        rig.unbind(&mut scene, id).unwrap();
        assert!(scene.ik_handles().is_empty());
        assert!(scene.constraints().is_empty());
        assert!(scene.exists(rig.ik_component(id).unwrap().ik_control()));
    }

    #[test]
    fn test_rejects_short_chain_before_mutation() {
        let mut scene = MemoryScene::new();
        let joints = leg(&mut scene);
        let before = scene.node_count();
        let mut rig = Rig::new();

        let err = rig
            .build(&mut scene, ComponentSpec::Ik(IkSpec::new(joints[..2].to_vec())))
            .unwrap_err();
        assert!(matches!(err, RigError::TooFewSegments { needed: 3, got: 2 }));
        assert_eq!(scene.node_count(), before);
    }

    #[test]
    fn test_rejects_invalid_pole_distance() {
        let mut scene = MemoryScene::new();
        let joints = leg(&mut scene);
        let mut rig = Rig::new();

        let spec = IkSpec::new(joints).with_pole_distance(f32::NAN);
        assert!(matches!(
            rig.build(&mut scene, ComponentSpec::Ik(spec)),
            Err(RigError::Config(_))
        ));
    }
}
