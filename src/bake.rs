//! Frame iteration for baking, and the outer default for "current time".

use crate::error::Result;
use crate::rig::{ComponentId, Rig};
use crate::scene::SceneGraph;

/// Picks `time`, or the host's current time when none is given.
pub fn resolve_time<S: SceneGraph + ?Sized>(scene: &S, time: Option<f32>) -> f32 {
    time.unwrap_or_else(|| scene.current_time())
}

/// Whole frames from `start` (inclusive) to `end` (exclusive).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BakeRange {
    pub start: f32,
    pub end: f32,
}

impl BakeRange {
    pub fn new(start: f32, end: f32) -> Self {
        Self { start, end }
    }

    pub fn playback<S: SceneGraph + ?Sized>(scene: &S) -> Self {
        let (start, end) = scene.playback_range();
        Self { start, end }
    }

    pub fn frames(&self) -> impl Iterator<Item = f32> {
        let start = self.start;
        let count = (self.end - self.start).max(0.0) as usize;
        (0..count).map(move |frame| start + frame as f32)
    }

    /// Calls `callback` for every frame, stopping at the first error.
    pub fn run<F>(&self, mut callback: F) -> Result<()>
    where
        F: FnMut(f32) -> Result<()>,
    {
        for frame in self.frames() {
            callback(frame)?;
        }
        Ok(())
    }
}

impl Rig {
    /// Snaps then bakes `id` on every frame of `range`.
    pub fn snap_and_bake<S: SceneGraph + ?Sized>(
        &self,
        scene: &mut S,
        id: ComponentId,
        range: BakeRange,
        attributes: &[&str],
    ) -> Result<()> {
        range.run(|frame| {
            self.snap(scene, id, frame)?;
            self.bake(scene, id, frame, attributes)
        })?;
        log::info!("baked frames {}..{}", range.start, range.end);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RigError;
    use crate::scene::MemoryScene;

    #[test]
    fn test_frames_exclude_end() {
        let frames: Vec<f32> = BakeRange::new(1.0, 5.0).frames().collect();
        assert_eq!(frames, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(BakeRange::new(5.0, 1.0).frames().count(), 0);
    }

    #[test]
    fn test_playback_range_and_time_default() {
        let mut scene = MemoryScene::new().with_playback_range(10.0, 20.0);
        scene.set_current_time(12.0);

        assert_eq!(BakeRange::playback(&scene), BakeRange::new(10.0, 20.0));
        assert_eq!(resolve_time(&scene, None), 12.0);
        assert_eq!(resolve_time(&scene, Some(3.0)), 3.0);
    }

    #[test]
    fn test_run_stops_at_first_error() {
        let mut seen = Vec::new();
        let result = BakeRange::new(0.0, 10.0).run(|frame| {
            seen.push(frame);
            if frame >= 2.0 {
                Err(RigError::EmptyChain)
            } else {
                Ok(())
            }
        });

        assert!(result.is_err());
        assert_eq!(seen, vec![0.0, 1.0, 2.0]);
    }
}
