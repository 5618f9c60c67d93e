use std::collections::BTreeMap;

use tracing::debug;

use crate::wall::{GlassWall, WallId};
use crate::SceneError;

/// The derived affine normalization `depth = k·level + b`.
///
/// Recomputed whenever the set of depth levels changes, it maps the current
/// minimum level to 0 and the maximum to 1. The degenerate case (all levels
/// equal, or an empty scene) maps everything to 0.5 with k = 0.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepthMapping {
    k: f32,
    b: f32,
}

impl DepthMapping {
    fn from_levels(min: i32, max: i32) -> Self {
        if min == max {
            return Self { k: 0.0, b: 0.5 };
        }
        let span = (max - min) as f32;
        Self {
            k: 1.0 / span,
            b: -(min as f32) / span,
        }
    }

    /// Normalized depth for a level; the renderer writes this as the
    /// clip-space z of every vertex of the wall.
    pub fn depth_for(&self, level: i32) -> f32 {
        self.k * level as f32 + self.b
    }
}

impl Default for DepthMapping {
    fn default() -> Self {
        Self { k: 0.0, b: 0.5 }
    }
}

/// Owns every wall in the scene, keyed by depth level.
///
/// The map key always equals the wall's current depth level: changing a
/// level goes through [`set_depth_level`](Self::set_depth_level), which
/// re-keys the entry and renormalizes. Far-to-near traversal is descending
/// level order, shared by every render pass.
#[derive(Debug, Default)]
pub struct WallRegistry {
    walls: BTreeMap<i32, GlassWall>,
    mapping: DepthMapping,
    next_id: u64,
}

impl WallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a wall at a depth level. Fails with
    /// [`SceneError::DuplicateDepthLevel`] if the level is occupied and
    /// [`SceneError::OpacityOutOfRange`] if opacity ∉ [0, 1]; in either case
    /// the registry is left unchanged.
    pub fn make_wall(
        &mut self,
        depth_level: i32,
        opacity: f32,
        transparent: bool,
        visible: bool,
    ) -> Result<&mut GlassWall, SceneError> {
        if self.walls.contains_key(&depth_level) {
            return Err(SceneError::DuplicateDepthLevel(depth_level));
        }
        let wall = GlassWall::new(
            WallId::new(self.next_id),
            depth_level,
            opacity,
            transparent,
            visible,
        )?;
        self.next_id += 1;
        self.walls.insert(depth_level, wall);
        self.renormalize();
        Ok(self
            .walls
            .get_mut(&depth_level)
            .expect("wall inserted just above"))
    }

    pub fn wall(&self, depth_level: i32) -> Result<&GlassWall, SceneError> {
        self.walls
            .get(&depth_level)
            .ok_or(SceneError::UnknownDepthLevel(depth_level))
    }

    pub fn wall_mut(&mut self, depth_level: i32) -> Result<&mut GlassWall, SceneError> {
        self.walls
            .get_mut(&depth_level)
            .ok_or(SceneError::UnknownDepthLevel(depth_level))
    }

    pub fn len(&self) -> usize {
        self.walls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.walls.is_empty()
    }

    /// Moves a wall to a new depth level, re-keying its registry entry and
    /// renormalizing. Fails without side effects if the source level is
    /// unknown or the destination is occupied.
    pub fn set_depth_level(&mut self, from: i32, to: i32) -> Result<(), SceneError> {
        if from == to {
            return self.walls.contains_key(&from).then_some(()).ok_or(
                SceneError::UnknownDepthLevel(from),
            );
        }
        if self.walls.contains_key(&to) {
            return Err(SceneError::DuplicateDepthLevel(to));
        }
        let mut wall = self
            .walls
            .remove(&from)
            .ok_or(SceneError::UnknownDepthLevel(from))?;
        wall.set_depth_level(to);
        self.walls.insert(to, wall);
        self.renormalize();
        Ok(())
    }

    pub fn depth_mapping(&self) -> DepthMapping {
        self.mapping
    }

    /// Normalized depth of a level under the current mapping.
    pub fn depth_of(&self, depth_level: i32) -> f32 {
        self.mapping.depth_for(depth_level)
    }

    /// Walls in far-to-near order (descending depth level). Every render
    /// pass traverses through this same iterator.
    pub fn iter_far_to_near(&self) -> impl Iterator<Item = &GlassWall> {
        self.walls.values().rev()
    }

    pub fn iter_far_to_near_mut(&mut self) -> impl Iterator<Item = &mut GlassWall> {
        self.walls.values_mut().rev()
    }

    fn renormalize(&mut self) {
        let (Some(min), Some(max)) = (
            self.walls.keys().next().copied(),
            self.walls.keys().next_back().copied(),
        ) else {
            self.mapping = DepthMapping::default();
            return;
        };
        self.mapping = DepthMapping::from_levels(min, max);
        debug!(min, max, "renormalized wall depth mapping");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_levels(levels: &[i32]) -> WallRegistry {
        let mut registry = WallRegistry::new();
        for &level in levels {
            registry.make_wall(level, 0.5, true, true).unwrap();
        }
        registry
    }

    #[test]
    fn normalization_maps_extremes_to_unit_range() {
        let registry = registry_with_levels(&[-3, 0, 7, 12]);
        assert_eq!(registry.depth_of(-3), 0.0);
        assert_eq!(registry.depth_of(12), 1.0);
    }

    #[test]
    fn normalization_is_monotonic_in_level() {
        let registry = registry_with_levels(&[-5, -1, 2, 9]);
        let depths: Vec<f32> = [-5, -1, 2, 9]
            .iter()
            .map(|&level| registry.depth_of(level))
            .collect();
        assert!(depths.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn equal_levels_collapse_to_half() {
        let registry = registry_with_levels(&[4]);
        assert_eq!(registry.depth_of(4), 0.5);
        // k = 0: every level reads 0.5 under the degenerate mapping.
        assert_eq!(registry.depth_of(100), 0.5);
    }

    #[test]
    fn duplicate_level_is_rejected_and_registry_unchanged() {
        let mut registry = registry_with_levels(&[1, 2]);
        let err = registry.make_wall(2, 0.9, false, true).unwrap_err();
        assert_eq!(err, SceneError::DuplicateDepthLevel(2));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.wall(2).unwrap().opacity(), 0.5);
    }

    #[test]
    fn invalid_opacity_does_not_insert() {
        let mut registry = WallRegistry::new();
        assert!(registry.make_wall(0, 1.1, true, true).is_err());
        assert!(registry.is_empty());
        assert_eq!(registry.depth_mapping(), DepthMapping::default());
    }

    #[test]
    fn lookup_of_absent_level_fails() {
        let registry = registry_with_levels(&[1]);
        assert_eq!(
            registry.wall(9).unwrap_err(),
            SceneError::UnknownDepthLevel(9)
        );
    }

    #[test]
    fn far_to_near_yields_descending_levels() {
        let registry = registry_with_levels(&[3, -2, 8, 0]);
        let order: Vec<i32> = registry
            .iter_far_to_near()
            .map(GlassWall::depth_level)
            .collect();
        assert_eq!(order, vec![8, 3, 0, -2]);
    }

    #[test]
    fn set_depth_level_rekeys_and_renormalizes() {
        let mut registry = registry_with_levels(&[0, 10]);
        registry.set_depth_level(10, 20).unwrap();

        assert!(registry.wall(10).is_err());
        let moved = registry.wall(20).unwrap();
        assert_eq!(moved.depth_level(), 20);
        assert_eq!(registry.depth_of(20), 1.0);
        assert_eq!(registry.depth_of(0), 0.0);
        assert!((registry.depth_of(10) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn set_depth_level_onto_occupied_level_fails_cleanly() {
        let mut registry = registry_with_levels(&[0, 1]);
        assert_eq!(
            registry.set_depth_level(0, 1).unwrap_err(),
            SceneError::DuplicateDepthLevel(1)
        );
        assert_eq!(registry.wall(0).unwrap().depth_level(), 0);
        assert_eq!(registry.wall(1).unwrap().depth_level(), 1);
    }

    #[test]
    fn wall_ids_stay_stable_across_rekeying() {
        let mut registry = registry_with_levels(&[5]);
        let id = registry.wall(5).unwrap().id();
        registry.set_depth_level(5, -5).unwrap();
        assert_eq!(registry.wall(-5).unwrap().id(), id);
    }
}
