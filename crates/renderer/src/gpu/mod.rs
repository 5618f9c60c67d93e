//! GPU orchestration for the glass-walls engine.
//!
//! - `context` owns rendering contexts (device, queue, negotiated MSAA,
//!   viewport projection, strategy) and the observer list fired on context
//!   creation/destruction.
//! - `resources` keeps per-(wall, context) draw slots in sync with both
//!   geometry generations and context lifecycle.
//! - `pipeline` declares the instanced wall vertex layout, the uniform
//!   block, and the per-strategy blend states.
//! - `targets` wraps the offscreen multisampled color/depth attachments.
//! - `strategy` runs the per-frame opaque → transparent → resolve
//!   choreography for the four compositing algorithms.
//! - `compositor` is the full-viewport per-sample resolve pass.

mod compositor;
mod context;
mod pipeline;
mod resources;
mod strategy;
mod targets;

pub use context::{
    request_device, ContextDescriptor, ContextEvent, ContextId, ContextObserver, ContextRegistry,
    RenderContext,
};
pub(crate) use resources::ResourceSet;
pub(crate) use strategy::prepare_walls;
