use glam::{Mat4, Vec3};

use super::graph::{AttrKind, NodeId, Plug, SceneGraph, UtilityKind};
use crate::error::{RigError, SceneError};

/// Nodes created during one build, in creation order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RollbackLog {
    created: Vec<NodeId>,
}

impl RollbackLog {
    pub fn created(&self) -> &[NodeId] {
        &self.created
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
    }

    /// Deletes every recorded node that still exists, newest first.
    pub fn rollback<S: SceneGraph + ?Sized>(self, scene: &mut S) -> Result<usize, SceneError> {
        let mut removed = 0;
        for node in self.created.into_iter().rev() {
            if scene.exists(node) {
                scene.delete(node)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// A [`SceneGraph`] wrapper that records every node created through it.
pub struct Journal<'a, S: SceneGraph + ?Sized> {
    scene: &'a mut S,
    log: RollbackLog,
}

impl<'a, S: SceneGraph + ?Sized> Journal<'a, S> {
    pub fn new(scene: &'a mut S) -> Self {
        Self {
            scene,
            log: RollbackLog::default(),
        }
    }

    pub fn log(&self) -> &RollbackLog {
        &self.log
    }

    pub fn finish(self) -> RollbackLog {
        self.log
    }

    fn record(&mut self, node: NodeId) -> NodeId {
        self.log.created.push(node);
        node
    }
}

/// Runs `build` against a journal over `scene`.
///
/// On success the log is handed back so the caller may still discard the
/// result later. On failure every node the build created is deleted before the
/// error is returned.
pub fn with_rollback<S, T, F>(scene: &mut S, build: F) -> Result<(T, RollbackLog), RigError>
where
    S: SceneGraph + ?Sized,
    F: FnOnce(&mut Journal<'_, S>) -> Result<T, RigError>,
{
    let mut journal = Journal::new(scene);
    match build(&mut journal) {
        Ok(value) => Ok((value, journal.finish())),
        Err(err) => {
            let pending = std::mem::take(&mut journal.log);
            log::warn!("build failed, rolling back {} node(s): {}", pending.created.len(), err);
            pending.rollback(&mut *journal.scene)?;
            Err(err)
        }
    }
}

impl<S: SceneGraph + ?Sized> SceneGraph for Journal<'_, S> {
    fn create_transform(&mut self, name: &str) -> Result<NodeId, SceneError> {
        let node = self.scene.create_transform(name)?;
        Ok(self.record(node))
    }

    fn create_utility(&mut self, kind: UtilityKind, name: &str) -> Result<NodeId, SceneError> {
        let node = self.scene.create_utility(kind, name)?;
        Ok(self.record(node))
    }

    fn duplicate(&mut self, node: NodeId) -> Result<NodeId, SceneError> {
        let copy = self.scene.duplicate(node)?;
        Ok(self.record(copy))
    }

    fn delete(&mut self, node: NodeId) -> Result<(), SceneError> {
        self.scene.delete(node)
    }

    fn rename(&mut self, node: NodeId, name: &str) -> Result<(), SceneError> {
        self.scene.rename(node, name)
    }

    fn name(&self, node: NodeId) -> Result<String, SceneError> {
        self.scene.name(node)
    }

    fn exists(&self, node: NodeId) -> bool {
        self.scene.exists(node)
    }

    fn set_parent(&mut self, node: NodeId, parent: Option<NodeId>) -> Result<(), SceneError> {
        self.scene.set_parent(node, parent)
    }

    fn parent(&self, node: NodeId) -> Result<Option<NodeId>, SceneError> {
        self.scene.parent(node)
    }

    fn children(&self, node: NodeId) -> Result<Vec<NodeId>, SceneError> {
        self.scene.children(node)
    }

    fn shapes(&self, node: NodeId) -> Result<Vec<NodeId>, SceneError> {
        self.scene.shapes(node)
    }

    fn descendant_count(&self, node: NodeId) -> Result<usize, SceneError> {
        self.scene.descendant_count(node)
    }

    fn world_matrix(&self, node: NodeId, time: f32) -> Result<Mat4, SceneError> {
        self.scene.world_matrix(node, time)
    }

    fn local_matrix(&self, node: NodeId, time: f32) -> Result<Mat4, SceneError> {
        self.scene.local_matrix(node, time)
    }

    fn set_world_matrix(&mut self, node: NodeId, matrix: Mat4, time: f32) -> Result<(), SceneError> {
        self.scene.set_world_matrix(node, matrix, time)
    }

    fn set_world_translation(&mut self, node: NodeId, point: Vec3, time: f32) -> Result<(), SceneError> {
        self.scene.set_world_translation(node, point, time)
    }

    fn parent_constraint(
        &mut self,
        driver: NodeId,
        driven: NodeId,
        maintain_offset: bool,
    ) -> Result<NodeId, SceneError> {
        let node = self.scene.parent_constraint(driver, driven, maintain_offset)?;
        Ok(self.record(node))
    }

    fn orient_constraint(
        &mut self,
        driver: NodeId,
        driven: NodeId,
        maintain_offset: bool,
    ) -> Result<NodeId, SceneError> {
        let node = self.scene.orient_constraint(driver, driven, maintain_offset)?;
        Ok(self.record(node))
    }

    fn pole_vector_constraint(&mut self, driver: NodeId, ik_handle: NodeId) -> Result<NodeId, SceneError> {
        let node = self.scene.pole_vector_constraint(driver, ik_handle)?;
        Ok(self.record(node))
    }

    fn ik_handle(&mut self, start: NodeId, end: NodeId) -> Result<NodeId, SceneError> {
        let node = self.scene.ik_handle(start, end)?;
        Ok(self.record(node))
    }

    fn add_attribute(&mut self, node: NodeId, name: &str, kind: AttrKind) -> Result<(), SceneError> {
        self.scene.add_attribute(node, name, kind)
    }

    fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.scene.has_attribute(node, name)
    }

    fn connect(&mut self, source: &Plug, destination: &Plug) -> Result<(), SceneError> {
        self.scene.connect(source, destination)
    }

    fn set_float(&mut self, node: NodeId, name: &str, value: f32) -> Result<(), SceneError> {
        self.scene.set_float(node, name, value)
    }

    fn float(&self, node: NodeId, name: &str, time: f32) -> Result<f32, SceneError> {
        self.scene.float(node, name, time)
    }

    fn set_keyframe(&mut self, node: NodeId, attributes: &[&str], time: f32) -> Result<(), SceneError> {
        self.scene.set_keyframe(node, attributes, time)
    }

    fn current_time(&self) -> f32 {
        self.scene.current_time()
    }

    fn playback_range(&self) -> (f32, f32) {
        self.scene.playback_range()
    }

    fn set_visible(&mut self, node: NodeId, visible: bool) -> Result<(), SceneError> {
        self.scene.set_visible(node, visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::MemoryScene;

    #[test]
    fn test_failed_build_removes_created_nodes() {
        let mut scene = MemoryScene::new();
        let keep = scene.create_transform("keep").unwrap();

        let result: Result<((), RollbackLog), RigError> = with_rollback(&mut scene, |journal| {
            journal.create_transform("temp_a")?;
            journal.create_transform("temp_b")?;
            Err(RigError::EmptyChain)
        });

        assert!(matches!(result, Err(RigError::EmptyChain)));
        assert_eq!(scene.node_count(), 1);
        assert!(scene.exists(keep));
    }

    #[test]
    fn test_journal_records_only_created_nodes() {
        let mut scene = MemoryScene::new();
        let existing = scene.create_transform("existing").unwrap();
        let mut journal = Journal::new(&mut scene);
        assert!(journal.log().is_empty());

        journal.rename(existing, "renamed").unwrap();
        assert!(journal.log().is_empty());
        let copy = journal.duplicate(existing).unwrap();
        let group = journal.create_transform("group").unwrap();

        let log = journal.finish();
        assert!(!log.is_empty());
        assert_eq!(log.created(), &[copy, group]);
    }

    #[test]
    fn test_successful_build_returns_log() {
        let mut scene = MemoryScene::new();
        let (node, log) = with_rollback(&mut scene, |journal| Ok(journal.create_transform("a")?)).unwrap();

        assert_eq!(log.created(), &[node]);
        assert_eq!(log.rollback(&mut scene).unwrap(), 1);
        assert!(!scene.exists(node));
    }
}
