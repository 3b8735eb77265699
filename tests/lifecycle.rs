use fkik_rig::bake::BakeRange;
use fkik_rig::rig::{BlendSpec, ChainOrdering, ComponentSpec, ComponentState, FkSpec, IkSpec, Rig};
use fkik_rig::scene::{attr, with_rollback, MemoryScene, NodeId, SceneGraph};
use fkik_rig::{RigConfig, RigError, SceneError};
use glam::Vec3;

fn leg(scene: &mut MemoryScene) -> Vec<NodeId> {
    let hip = scene.create_joint("hip", None, Vec3::new(0.0, 10.0, 0.0)).unwrap();
    let knee = scene.create_joint("knee", Some(hip), Vec3::new(0.0, -5.0, 1.0)).unwrap();
    let ankle = scene.create_joint("ankle", Some(knee), Vec3::new(0.0, -5.0, -1.0)).unwrap();
    vec![hip, knee, ankle]
}

#[test]
fn test_full_lifecycle_reaches_bound_state() {
    let mut scene = MemoryScene::new();
    let joints = leg(&mut scene);
    let mut rig = Rig::new();
    let id = rig
        .build(&mut scene, ComponentSpec::Blend(BlendSpec::new(joints).with_name("leg")))
        .unwrap();
    assert_eq!(rig.component(id).unwrap().state(), ComponentState::Constructed);

    rig.add_groups(&mut scene, id, None).unwrap();
    assert_eq!(rig.component(id).unwrap().state(), ComponentState::Grouped);

    rig.snap(&mut scene, id, 1.0).unwrap();
    rig.bind(&mut scene, id).unwrap();
    assert_eq!(rig.component(id).unwrap().state(), ComponentState::Bound);

    rig.unbind(&mut scene, id).unwrap();
    assert_ne!(rig.component(id).unwrap().state(), ComponentState::Bound);
    assert!(matches!(rig.unbind(&mut scene, id), Err(RigError::NotBound(_))));
}

#[test]
fn test_bind_twice_stacks_constraints() {
    let mut scene = MemoryScene::new();
    let joints = leg(&mut scene);
    let mut rig = Rig::new();
    let id = rig.build(&mut scene, ComponentSpec::Ik(IkSpec::new(joints.clone()))).unwrap();

    rig.bind(&mut scene, id).unwrap();
    rig.bind(&mut scene, id).unwrap();

    assert_eq!(rig.ik_component(id).unwrap().handles().len(), 2);
    assert_eq!(scene.ik_handles().len(), 2);
    assert_eq!(scene.constraints_on(joints[0]).len(), 2);

    rig.unbind(&mut scene, id).unwrap();
    assert!(scene.ik_handles().is_empty());
    assert!(scene.constraints_on(joints[0]).is_empty());
}

#[test]
fn test_failed_build_rolls_back_with_journal() {
    let mut scene = MemoryScene::new();
    let joints = leg(&mut scene);
    let before = scene.node_count();
    let config = RigConfig::default().with_blend_attribute(attr::VISIBILITY);
    let mut rig = Rig::with_config(config).unwrap();

    let result = with_rollback(&mut scene, |journal| {
        rig.build(journal, ComponentSpec::Blend(BlendSpec::new(joints.clone())))
    });

    assert!(matches!(
        result,
        Err(RigError::Scene(SceneError::AttributeExists { .. }))
    ));
    assert_eq!(scene.node_count(), before);
    assert!(rig.roots().is_empty());
}

#[test]
fn test_failed_build_without_journal_leaves_nodes() {
    let mut scene = MemoryScene::new();
    let joints = leg(&mut scene);
    let before = scene.node_count();
    let config = RigConfig::default().with_blend_attribute(attr::VISIBILITY);
    let mut rig = Rig::with_config(config).unwrap();

    assert!(rig.build(&mut scene, ComponentSpec::Blend(BlendSpec::new(joints))).is_err());
    assert!(scene.node_count() > before);
    assert!(rig.roots().is_empty());
}

#[test]
fn test_snap_and_bake_follows_animated_skeleton() {
    let mut scene = MemoryScene::new().with_playback_range(1.0, 4.0);
    let joints = leg(&mut scene);
    scene.set_keyframe(joints[0], &[attr::TRANSLATE], 1.0).unwrap();
    scene.set_current_time(3.0);
    scene.set_vec3(joints[0], attr::TRANSLATE, Vec3::new(0.0, 20.0, 0.0)).unwrap();
    scene.set_keyframe(joints[0], &[attr::TRANSLATE], 3.0).unwrap();

    let mut rig = Rig::new();
    let id = rig.build(&mut scene, ComponentSpec::Blend(BlendSpec::new(joints.clone()))).unwrap();
    let range = BakeRange::playback(&scene);
    rig.snap_and_bake(&mut scene, id, range, &[]).unwrap();

    let blend = rig.blend_component(id).unwrap();
    let keys = scene.keyframes(blend.master_control(), attr::TRANSLATE).unwrap();
    let times: Vec<f32> = keys.iter().map(|(t, _)| *t).collect();
    assert_eq!(times, vec![1.0, 2.0, 3.0]);
    let last = keys[2].1.as_vec3().unwrap();
    assert!(last.abs_diff_eq(Vec3::new(0.0, 20.0, 0.0), 1e-4));

    let ik = rig.ik_component(blend.ik()).unwrap();
    let ik_keys = scene.keyframes(ik.ik_control(), attr::TRANSLATE).unwrap();
    assert_eq!(ik_keys.len(), 3);
    let ankle_at_one = scene.world_translation(joints[2], 1.0).unwrap();
    assert!(ik_keys[0].1.as_vec3().unwrap().abs_diff_eq(ankle_at_one, 1e-4));
    assert!(scene.keyframes(ik.ik_control(), attr::VISIBILITY).unwrap().is_empty());
}

#[test]
fn test_hierarchy_ordering_from_config() {
    let mut scene = MemoryScene::new();
    let joints = leg(&mut scene);
    let config = RigConfig::default().with_ordering(ChainOrdering::Hierarchy);
    let mut rig = Rig::with_config(config).unwrap();

    let shuffled = vec![joints[1], joints[2], joints[0]];
    let id = rig.build(&mut scene, ComponentSpec::Fk(FkSpec::new(shuffled))).unwrap();
    let segments: Vec<NodeId> = rig.fk_component(id).unwrap().links().iter().map(|l| l.segment).collect();
    assert_eq!(segments, joints);

    let stray = scene.create_joint("stray", None, Vec3::ZERO).unwrap();
    let err = rig
        .build(&mut scene, ComponentSpec::Fk(FkSpec::new(vec![joints[0], stray])))
        .unwrap_err();
    assert!(matches!(err, RigError::NotAChain(_)));
}

#[test]
fn test_pole_distance_override_and_config_file() {
    let path = std::env::temp_dir().join(format!("fkik-rig-{}.toml", std::process::id()));
    std::fs::write(&path, "pole_distance = 8.0\nblend_attribute = \"ikFk\"\n").unwrap();
    let config = RigConfig::from_path(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(config.blend_attribute, "ikFk");

    let mut scene = MemoryScene::new();
    let joints = leg(&mut scene);
    let mut rig = Rig::with_config(config).unwrap();
    let from_config = rig.build(&mut scene, ComponentSpec::Ik(IkSpec::new(joints.clone()))).unwrap();
    let overridden = rig
        .build(&mut scene, ComponentSpec::Ik(IkSpec::new(joints).with_pole_distance(3.0)))
        .unwrap();

    assert_eq!(rig.ik_component(from_config).unwrap().pole_distance(), 8.0);
    assert_eq!(rig.ik_component(overridden).unwrap().pole_distance(), 3.0);
    assert_eq!(rig.roots().len(), 2);
}

#[test]
fn test_too_short_blend_chain_is_rejected() {
    let mut scene = MemoryScene::new();
    let joints = leg(&mut scene);
    let before = scene.node_count();
    let mut rig = Rig::new();

    let err = rig
        .build(&mut scene, ComponentSpec::Blend(BlendSpec::new(joints[..2].to_vec())))
        .unwrap_err();
    assert!(matches!(err, RigError::TooFewSegments { needed: 3, got: 2 }));
    assert_eq!(scene.node_count(), before);
}

#[test]
fn test_failed_transaction_restores_arena_and_scene() {
    let mut scene = MemoryScene::new();
    let joints = leg(&mut scene);
    let mut rig = Rig::new();
    let kept = rig.build(&mut scene, ComponentSpec::Fk(FkSpec::new(joints.clone()))).unwrap();
    let before = scene.node_count();

    let mut attempted = None;
    let result = rig.transaction(&mut scene, |rig, journal| {
        let id = rig.build(journal, ComponentSpec::Blend(BlendSpec::new(joints.clone())))?;
        attempted = Some(id);
        rig.add_groups(journal, id, None)?;
        rig.add_groups(journal, id, None)?;
        Ok(id)
    });

    assert!(matches!(result, Err(RigError::AlreadyGrouped(_))));
    assert_eq!(scene.node_count(), before);
    assert_eq!(rig.roots(), &[kept]);
    let attempted = attempted.unwrap();
    assert!(matches!(rig.component(attempted), Err(RigError::UnknownComponent)));
    assert!(rig.get_controls(kept).unwrap().iter().all(|c| scene.exists(*c)));
    rig.snap(&mut scene, kept, 1.0).unwrap();
}

#[test]
fn test_successful_transaction_keeps_components() {
    let mut scene = MemoryScene::new();
    let joints = leg(&mut scene);
    let mut rig = Rig::new();

    let (id, created) = rig
        .transaction(&mut scene, |rig, journal| {
            let id = rig.build(journal, ComponentSpec::Blend(BlendSpec::new(joints.clone())))?;
            rig.add_groups(journal, id, None)?;
            Ok(id)
        })
        .unwrap();

    assert_eq!(rig.roots(), &[id]);
    assert!(!created.is_empty());
    assert!(rig.get_controls(id).unwrap().iter().all(|c| created.created().contains(c)));
    rig.snap(&mut scene, id, 1.0).unwrap();
}
