use std::fmt;

use crate::color::Rgb8;
use crate::geometry::WallGeometry;
use crate::math::Mat3;
use crate::SceneError;

/// Stable identity of a wall, independent of its (mutable) depth level.
/// GPU resource maps key on this rather than on the level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WallId(u64);

impl WallId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for WallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wall#{}", self.0)
    }
}

/// One translucent/opaque planar surface in the scene.
///
/// Walls are created only through
/// [`WallRegistry::make_wall`](crate::WallRegistry::make_wall); the registry
/// owns them and hands out references. Property setters never trigger a
/// redraw; the host asks for frames. Changing the depth level goes through
/// [`WallRegistry::set_depth_level`](crate::WallRegistry::set_depth_level)
/// because it re-keys the wall and renormalizes the whole scene.
#[derive(Debug)]
pub struct GlassWall {
    id: WallId,
    depth_level: i32,
    opacity: f32,
    transparent: bool,
    visible: bool,
    transformation: Mat3,
    geometry: WallGeometry,
}

impl GlassWall {
    pub(crate) fn new(
        id: WallId,
        depth_level: i32,
        opacity: f32,
        transparent: bool,
        visible: bool,
    ) -> Result<Self, SceneError> {
        if !(0.0..=1.0).contains(&opacity) {
            return Err(SceneError::OpacityOutOfRange(opacity));
        }
        Ok(Self {
            id,
            depth_level,
            opacity,
            transparent,
            visible,
            transformation: Mat3::IDENTITY,
            geometry: WallGeometry::new(),
        })
    }

    pub fn id(&self) -> WallId {
        self.id
    }

    pub fn depth_level(&self) -> i32 {
        self.depth_level
    }

    pub(crate) fn set_depth_level(&mut self, level: i32) {
        self.depth_level = level;
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Sets the blend weight used by transparent passes. Validated like the
    /// constructor; 0 and 1 are both legal.
    pub fn set_opacity(&mut self, opacity: f32) -> Result<(), SceneError> {
        if !(0.0..=1.0).contains(&opacity) {
            return Err(SceneError::OpacityOutOfRange(opacity));
        }
        self.opacity = opacity;
        Ok(())
    }

    pub fn transparent(&self) -> bool {
        self.transparent
    }

    pub fn set_transparent(&mut self, transparent: bool) {
        self.transparent = transparent;
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn transformation(&self) -> Mat3 {
        self.transformation
    }

    pub fn set_transformation(&mut self, transformation: Mat3) {
        self.transformation = transformation;
    }

    /// Appends one triangle (vertex triple + edge/fill colors) and marks the
    /// wall's GPU buffers stale.
    pub fn add_triangle(
        &mut self,
        a: [f32; 2],
        b: [f32; 2],
        c: [f32; 2],
        edge_color: Rgb8,
        fill_color: Rgb8,
    ) {
        self.geometry.add_triangle(a, b, c, edge_color, fill_color);
    }

    pub fn geometry(&self) -> &WallGeometry {
        &self.geometry
    }

    pub fn geometry_mut(&mut self) -> &mut WallGeometry {
        &mut self.geometry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_opacities_are_legal() {
        assert!(GlassWall::new(WallId::new(0), 0, 0.0, true, true).is_ok());
        assert!(GlassWall::new(WallId::new(1), 1, 1.0, true, true).is_ok());
    }

    #[test]
    fn out_of_range_opacity_is_rejected() {
        assert_eq!(
            GlassWall::new(WallId::new(0), 0, -0.1, true, true).unwrap_err(),
            SceneError::OpacityOutOfRange(-0.1)
        );
        assert_eq!(
            GlassWall::new(WallId::new(0), 0, 1.1, true, true).unwrap_err(),
            SceneError::OpacityOutOfRange(1.1)
        );
    }

    #[test]
    fn opacity_setter_applies_the_same_contract() {
        let mut wall = GlassWall::new(WallId::new(0), 0, 0.5, true, true).unwrap();
        assert!(wall.set_opacity(2.0).is_err());
        assert_eq!(wall.opacity(), 0.5);
        wall.set_opacity(1.0).unwrap();
        assert_eq!(wall.opacity(), 1.0);
    }

    #[test]
    fn flags_and_transform_are_plain_properties() {
        let mut wall = GlassWall::new(WallId::new(7), 3, 0.25, true, false).unwrap();
        assert!(!wall.visible());
        wall.set_visible(true);
        wall.set_transparent(false);
        wall.set_transformation(Mat3::scale(2.0, 0.5));
        assert!(wall.visible() && !wall.transparent());
        assert_eq!(wall.transformation(), Mat3::scale(2.0, 0.5));
    }
}
