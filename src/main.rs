use fkik_rig::bake::{resolve_time, BakeRange};
use fkik_rig::rig::{BlendSpec, ComponentId, ComponentSpec, Rig};
use fkik_rig::scene::{attr, MemoryScene, NodeId, SceneGraph};
use fkik_rig::{RigConfig, RigError};
use glam::Vec3;

struct Demo {
    scene: MemoryScene,
    rig: Rig,
    joints: Vec<NodeId>,
}

impl Demo {
    fn new(config: RigConfig) -> Result<Self, RigError> {
        let mut scene = MemoryScene::new().with_playback_range(1.0, 25.0);
        let shoulder = scene.create_joint("shoulder", None, Vec3::new(0.0, 15.0, 0.0))?;
        let elbow = scene.create_joint("elbow", Some(shoulder), Vec3::new(4.0, 0.0, -0.5))?;
        let wrist = scene.create_joint("wrist", Some(elbow), Vec3::new(4.0, 0.0, 0.5))?;

        // Swing the shoulder so the bake has something to follow.
        for (frame, angle) in [(1.0, 0.0_f32), (12.0, 0.6), (24.0, -0.3)] {
            scene.set_current_time(frame);
            scene.set_vec3(shoulder, attr::ROTATE, Vec3::new(0.0, 0.0, angle))?;
            scene.set_keyframe(shoulder, &[attr::ROTATE], frame)?;
        }
        scene.set_current_time(1.0);

        Ok(Self {
            scene,
            rig: Rig::with_config(config)?,
            joints: vec![shoulder, elbow, wrist],
        })
    }

    fn build(&mut self) -> Result<ComponentId, RigError> {
        let spec = BlendSpec::new(self.joints.clone()).with_name("arm");
        let (arm, created) = self.rig.transaction(&mut self.scene, |rig, journal| {
            let arm = rig.build(journal, ComponentSpec::Blend(spec))?;
            rig.add_groups(journal, arm, None)?;
            Ok(arm)
        })?;
        log::info!("arm rig created {} node(s)", created.created().len());
        Ok(arm)
    }

    fn run(&mut self) -> Result<(), RigError> {
        let arm = self.build()?;
        let time = resolve_time(&self.scene, None);
        self.rig.snap(&mut self.scene, arm, time)?;
        self.rig.bind(&mut self.scene, arm)?;

        let range = BakeRange::playback(&self.scene);
        self.rig.snap_and_bake(&mut self.scene, arm, range, &[])?;

        let controls = self.rig.get_controls(arm)?;
        for control in &controls {
            let position = self.scene.world_translation(*control, range.start)?;
            log::info!(
                "{:<24} {:>8.3} {:>8.3} {:>8.3}",
                self.scene.name(*control)?,
                position.x,
                position.y,
                position.z
            );
        }
        println!(
            "rigged {} joints with {} controls over frames {}..{}",
            self.joints.len(),
            controls.len(),
            range.start,
            range.end
        );
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => RigConfig::from_path(path)?,
        None => RigConfig::default(),
    };

    Demo::new(config)?.run()?;
    Ok(())
}
