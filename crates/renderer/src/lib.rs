//! Renderer crate for the glass-walls transparency comparison engine.
//!
//! The engine draws a [`glasswall::WallRegistry`] scene with one of four
//! compositing strategies per view and resolves per multisample sample:
//!
//! ```text
//!   host paint callback
//!          │ render(context, &mut walls, &target_view)
//!          ▼
//!   GlassRenderer ──▶ RenderContext ──▶ RenderStrategy
//!          │                │                │ opaque pass (edges + faces)
//!          │                │                │ transparent pass (blend state)
//!          │                │                └ resolve pass (per sample)
//!          │                └ per-context wall slots (buffers, bind groups)
//!          └ ContextRegistry events keep the slots in sync
//! ```
//!
//! Hosts own windowing, the event loop, and the wgpu device; the engine
//! owns everything between "here is a scene" and "here is the composited
//! multisampled view". All GPU work is synchronous on the calling thread,
//! one context at a time.

use std::cell::RefCell;
use std::rc::Rc;

use glasswall::WallRegistry;

mod gpu;
mod types;

pub use gpu::{
    request_device, ContextDescriptor, ContextEvent, ContextId, ContextObserver, ContextRegistry,
    RenderContext,
};
pub use types::{Antialiasing, RenderSettings, StrategyKind};

use gpu::{prepare_walls, ResourceSet};

/// Frame-time failures a host can act on. Resource faults inside a frame
/// (missing slots, allocation failures) are precondition violations and
/// abort instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("rendering {0} is not registered (destroyed, or never created)")]
    UnknownContext(ContextId),
    #[error("rendering {0} has no strategy resources")]
    Unresourced(ContextId),
}

/// Composition root of the engine: the context registry plus the shared
/// per-wall resource set, wired together through the registry's observer
/// list so context lifecycle and wall slots can never drift apart.
pub struct GlassRenderer {
    contexts: ContextRegistry,
    resources: Rc<RefCell<ResourceSet>>,
}

impl GlassRenderer {
    pub fn new() -> Self {
        let mut contexts = ContextRegistry::new();
        let resources = Rc::new(RefCell::new(ResourceSet::new()));
        let observed = Rc::clone(&resources);
        contexts.on_context_event(Box::new(move |event, context| {
            observed.borrow_mut().handle_event(event, context);
        }));
        Self {
            contexts,
            resources,
        }
    }

    /// Stands up a rendering context for one view. See
    /// [`ContextRegistry::create_context`].
    pub fn create_context(
        &mut self,
        adapter: &wgpu::Adapter,
        device: wgpu::Device,
        queue: wgpu::Queue,
        descriptor: ContextDescriptor,
    ) -> anyhow::Result<ContextId> {
        self.contexts
            .create_context(adapter, device, queue, descriptor)
    }

    pub fn destroy_context(&mut self, id: ContextId) -> Result<(), RenderError> {
        self.contexts.destroy_context(id)
    }

    pub fn resize(&mut self, id: ContextId, width: u32, height: u32) -> Result<(), RenderError> {
        self.contexts.resize(id, width, height)
    }

    pub fn contexts(&self) -> &ContextRegistry {
        &self.contexts
    }

    /// Draws one frame of the scene into the host's multisampled view.
    ///
    /// The per-frame entry point a paint callback invokes: walks the
    /// registry far-to-near, refreshes stale wall resources, then runs the
    /// context's strategy passes and submits one command buffer.
    pub fn render(
        &self,
        id: ContextId,
        walls: &mut WallRegistry,
        target: &wgpu::TextureView,
    ) -> Result<(), RenderError> {
        let context = self
            .contexts
            .get(id)
            .ok_or(RenderError::UnknownContext(id))?;
        let strategy = context.strategy();
        let layout = strategy.wall_layout().ok_or(RenderError::Unresourced(id))?;

        let mut resources = self.resources.borrow_mut();
        let prepared = prepare_walls(context, &self.contexts, walls, &mut resources, layout);
        strategy.render(context, &prepared, &resources, target);
        Ok(())
    }
}

impl Default for GlassRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_fresh_renderer_has_no_contexts() {
        let renderer = GlassRenderer::new();
        assert!(renderer.contexts().is_empty());
        assert_eq!(renderer.contexts().len(), 0);
    }
}
