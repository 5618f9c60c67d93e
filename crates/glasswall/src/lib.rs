//! Scene model for the glass-walls transparency comparison engine.
//!
//! A scene is a flat set of "glass walls": planar triangle-soup surfaces,
//! each keyed by a unique integer depth level and carrying an opacity, a
//! transparent/visible pair of flags, and a 3×3 affine transform. The crate
//! is deliberately GPU-free; it owns everything the renderer needs to *read*
//! when it draws a frame:
//!
//! ```text
//!   host ──▶ WallRegistry::make_wall ──▶ GlassWall ──▶ WallGeometry
//!                  │                         │              │
//!                  │ depth normalization     │ properties   │ packed bytes +
//!                  ▼                         ▼              ▼ generation
//!             renderer pass order      wall uniforms   vertex buffers
//! ```
//!
//! The registry derives an affine depth normalization `depth = k·level + b`
//! that maps the current min/max depth level onto [0, 1]; every render pass
//! walks walls far-to-near through the same iterator so opaque and
//! transparent ordering can never diverge.

mod color;
mod geometry;
mod math;
mod registry;
mod wall;

pub use color::{LinearRgba16, Rgb8};
pub use geometry::{WallGeometry, COLOR_STRIDE, POSITION_STRIDE};
pub use math::Mat3;
pub use registry::{DepthMapping, WallRegistry};
pub use wall::{GlassWall, WallId};

/// Recoverable scene-mutation failures. Resource-level faults live in the
/// renderer crate; everything here is a typed, caller-visible error.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum SceneError {
    #[error("opacity {0} is outside [0, 1]")]
    OpacityOutOfRange(f32),
    #[error("a glass wall already occupies depth level {0}")]
    DuplicateDepthLevel(i32),
    #[error("no glass wall at depth level {0}")]
    UnknownDepthLevel(i32),
}
