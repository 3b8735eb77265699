//! Root-to-leaf ordering of skeletal segments.

use std::cmp::Reverse;
use std::collections::HashSet;

use serde::Deserialize;

use crate::error::{Result, RigError};
use crate::scene::{NodeId, SceneGraph};

/// How a component turns its input segments into a root-to-leaf chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainOrdering {
    /// Most descendants first. Only correct for unbranched chains, which is not checked.
    #[default]
    Descendants,
    /// Follows parent links and rejects anything that is not a single unbranched chain.
    Hierarchy,
    /// Uses the order supplied by the caller.
    AsGiven,
}

/// Stable sort by descending key: larger keys first, ties keep input order.
pub fn order_by_key<T, K, F>(mut items: Vec<T>, mut key: F) -> Vec<T>
where
    K: Ord,
    F: FnMut(&T) -> K,
{
    items.sort_by_key(|item| Reverse(key(item)));
    items
}

pub fn order_chain<S: SceneGraph + ?Sized>(
    scene: &S,
    segments: &[NodeId],
    ordering: ChainOrdering,
) -> Result<Vec<NodeId>> {
    if segments.is_empty() {
        return Err(RigError::EmptyChain);
    }

    let mut seen = HashSet::with_capacity(segments.len());
    for &segment in segments {
        if !seen.insert(segment) {
            return Err(RigError::DuplicateSegment(segment));
        }
    }

    match ordering {
        ChainOrdering::AsGiven => {
            for &segment in segments {
                scene.name(segment)?;
            }
            Ok(segments.to_vec())
        }
        ChainOrdering::Descendants => {
            let counted = segments
                .iter()
                .map(|&segment| Ok((segment, scene.descendant_count(segment)?)))
                .collect::<Result<Vec<_>>>()?;
            Ok(order_by_key(counted, |(_, count)| *count)
                .into_iter()
                .map(|(segment, _)| segment)
                .collect())
        }
        ChainOrdering::Hierarchy => walk_hierarchy(scene, segments, &seen),
    }
}

fn walk_hierarchy<S: SceneGraph + ?Sized>(
    scene: &S,
    segments: &[NodeId],
    members: &HashSet<NodeId>,
) -> Result<Vec<NodeId>> {
    let parents = segments
        .iter()
        .map(|&segment| Ok((segment, scene.parent(segment)?)))
        .collect::<Result<Vec<_>>>()?;

    let roots: Vec<NodeId> = parents
        .iter()
        .filter(|(_, parent)| !parent.is_some_and(|p| members.contains(&p)))
        .map(|(segment, _)| *segment)
        .collect();
    let [root] = roots[..] else {
        return Err(RigError::NotAChain(format!("expected one root, found {}", roots.len())));
    };

    let mut ordered = Vec::with_capacity(segments.len());
    let mut current = root;
    loop {
        ordered.push(current);
        let next: Vec<NodeId> = parents
            .iter()
            .filter(|(_, parent)| *parent == Some(current))
            .map(|(segment, _)| *segment)
            .collect();
        match next[..] {
            [] => break,
            [child] => current = child,
            _ => {
                return Err(RigError::NotAChain(format!(
                    "`{}` has {} child segments",
                    scene.name(current)?,
                    next.len()
                )))
            }
        }
    }

    if ordered.len() != segments.len() {
        return Err(RigError::NotAChain(format!(
            "only {} of {} segments are linked",
            ordered.len(),
            segments.len()
        )));
    }
    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::MemoryScene;
    use glam::Vec3;
    use proptest::prelude::*;

    fn arm(scene: &mut MemoryScene, length: usize) -> Vec<NodeId> {
        let mut joints = Vec::new();
        let mut parent = None;
        for i in 0..length {
            let joint = scene
                .create_joint(&format!("joint{}", i), parent, Vec3::new(1.0, 0.0, 0.0))
                .unwrap();
            joints.push(joint);
            parent = Some(joint);
        }
        joints
    }

    #[test]
    fn test_descendants_orders_root_to_leaf() {
        let mut scene = MemoryScene::new();
        let joints = arm(&mut scene, 3);
        let shuffled = vec![joints[2], joints[0], joints[1]];

        let ordered = order_chain(&scene, &shuffled, ChainOrdering::Descendants).unwrap();
        assert_eq!(ordered, joints);
    }

    #[test]
    fn test_hierarchy_rejects_branching() {
        let mut scene = MemoryScene::new();
        let root = scene.create_joint("root", None, Vec3::ZERO).unwrap();
        let left = scene.create_joint("left", Some(root), Vec3::X).unwrap();
        let right = scene.create_joint("right", Some(root), Vec3::NEG_X).unwrap();

        let err = order_chain(&scene, &[left, root, right], ChainOrdering::Hierarchy).unwrap_err();
        assert!(matches!(err, RigError::NotAChain(_)));
    }

    #[test]
    fn test_hierarchy_rejects_gaps() {
        let mut scene = MemoryScene::new();
        let joints = arm(&mut scene, 4);

        let err = order_chain(&scene, &[joints[0], joints[1], joints[3]], ChainOrdering::Hierarchy)
            .unwrap_err();
        assert!(matches!(err, RigError::NotAChain(_)));
    }

    #[test]
    fn test_hierarchy_orders_shuffled_chain() {
        let mut scene = MemoryScene::new();
        let joints = arm(&mut scene, 4);
        let shuffled = vec![joints[3], joints[1], joints[0], joints[2]];

        assert_eq!(order_chain(&scene, &shuffled, ChainOrdering::Hierarchy).unwrap(), joints);
    }

    #[test]
    fn test_rejects_empty_and_duplicate_input() {
        let mut scene = MemoryScene::new();
        let joints = arm(&mut scene, 2);

        assert!(matches!(
            order_chain(&scene, &[], ChainOrdering::Descendants),
            Err(RigError::EmptyChain)
        ));
        assert!(matches!(
            order_chain(&scene, &[joints[0], joints[0]], ChainOrdering::AsGiven),
            Err(RigError::DuplicateSegment(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_order_by_key_is_stable_and_non_increasing(keys in prop::collection::vec(0usize..6, 0..40)) {
            let items: Vec<(usize, usize)> = keys.iter().copied().enumerate().collect();
            let ordered = order_by_key(items, |(_, key)| *key);

            prop_assert_eq!(ordered.len(), keys.len());
            for pair in ordered.windows(2) {
                prop_assert!(pair[0].1 >= pair[1].1);
                if pair[0].1 == pair[1].1 {
                    prop_assert!(pair[0].0 < pair[1].0);
                }
            }
        }

        #[test]
        fn prop_descendants_recovers_any_permutation(
            order in (1usize..10).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle())
        ) {
            let mut scene = MemoryScene::new();
            let joints = arm(&mut scene, order.len());
            let shuffled: Vec<NodeId> = order.iter().map(|&i| joints[i]).collect();

            let ordered = order_chain(&scene, &shuffled, ChainOrdering::Descendants).unwrap();
            prop_assert_eq!(ordered, joints);
        }
    }
}
