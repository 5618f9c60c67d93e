//! Rendering contexts and their registry.
//!
//! A context is one on-screen view: a device/queue pair, a negotiated MSAA
//! sample count, a viewport with its aspect-correcting projection, and the
//! compositing strategy that view runs. The registry owns every live
//! context and an explicit observer list fired synchronously when a context
//! comes to life or is about to die; per-wall resource holders key their
//! slots off these events.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Context as _, Result};
use glasswall::Mat3;

use crate::types::{Antialiasing, RenderSettings, StrategyKind};
use crate::RenderError;

use super::strategy::RenderStrategy;
use super::targets::{DEPTH_FORMAT, OPAQUE_FORMAT, REVEALAGE_FORMAT};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u32);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "context#{}", self.0)
    }
}

/// Synchronous context-lifecycle notification. `Destroyed` fires while the
/// context is still alive so observers can release resources against it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextEvent {
    Created,
    Destroyed,
}

pub type ContextObserver = Box<dyn FnMut(ContextEvent, &RenderContext)>;

/// Everything needed to stand up a context around a host-provided device.
#[derive(Debug, Clone)]
pub struct ContextDescriptor {
    /// Format of the target view the host passes to `render`.
    pub surface_format: wgpu::TextureFormat,
    /// Initial viewport size in physical pixels.
    pub size: (u32, u32),
    pub strategy: StrategyKind,
    pub settings: RenderSettings,
}

pub struct RenderContext {
    id: ContextId,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_format: wgpu::TextureFormat,
    sample_count: u32,
    size: (u32, u32),
    projection: Mat3,
    settings: RenderSettings,
    pub(crate) strategy: RenderStrategy,
}

impl RenderContext {
    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface_format
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Aspect-correcting projection folded into every wall transform.
    pub fn projection(&self) -> Mat3 {
        self.projection
    }

    pub fn strategy_kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// Dimensions of the strategy's offscreen storage; equals
    /// [`size`](Self::size) whenever resources are live.
    pub fn storage_size(&self) -> Option<(u32, u32)> {
        self.strategy.storage_size()
    }

    pub(crate) fn strategy(&self) -> &RenderStrategy {
        &self.strategy
    }

    pub(crate) fn clear_color(&self) -> wgpu::Color {
        let [r, g, b] = self.settings.clear_color;
        wgpu::Color {
            r: f64::from(r),
            g: f64::from(g),
            b: f64::from(b),
            a: 1.0,
        }
    }
}

/// Owns every live rendering context plus the observer list notified on
/// creation and destruction.
#[derive(Default)]
pub struct ContextRegistry {
    contexts: BTreeMap<ContextId, RenderContext>,
    observers: Vec<ContextObserver>,
    next_id: u32,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer invoked synchronously, in registration order,
    /// at the point of every context creation and destruction.
    pub fn on_context_event(&mut self, observer: ContextObserver) {
        self.observers.push(observer);
    }

    /// Stands up a context around a host-provided device, negotiates the
    /// MSAA sample count against every target format the strategies render
    /// to, builds the strategy's resources, and notifies observers.
    pub fn create_context(
        &mut self,
        adapter: &wgpu::Adapter,
        device: wgpu::Device,
        queue: wgpu::Queue,
        descriptor: ContextDescriptor,
    ) -> Result<ContextId> {
        anyhow::ensure!(
            device.features().contains(wgpu::Features::POLYGON_MODE_LINE),
            "device lacks POLYGON_MODE_LINE, which wall edges need for \
             wireframe; request it at device creation (see renderer::request_device)"
        );

        let sample_count =
            negotiate_sample_count(adapter, descriptor.surface_format, descriptor.settings.antialiasing)?;

        let mut strategy = RenderStrategy::new(descriptor.strategy);
        strategy.gen_resources(&device, descriptor.surface_format, sample_count);
        strategy.reallocate_storage(&device, descriptor.size.0, descriptor.size.1);

        let id = ContextId(self.next_id);
        self.next_id += 1;
        let context = RenderContext {
            id,
            device,
            queue,
            surface_format: descriptor.surface_format,
            sample_count,
            size: descriptor.size,
            projection: projection_for(descriptor.size.0, descriptor.size.1),
            settings: descriptor.settings,
            strategy,
        };
        tracing::info!(
            context = %id,
            strategy = ?context.strategy_kind(),
            sample_count,
            width = context.size.0,
            height = context.size.1,
            "created rendering context"
        );
        self.contexts.insert(id, context);

        let context = self.contexts.get(&id).expect("context inserted just above");
        for observer in self.observers.iter_mut() {
            observer(ContextEvent::Created, context);
        }
        Ok(id)
    }

    /// Notifies observers (while the context is still alive), releases the
    /// strategy's resources, and drops the context. Destroying an unknown
    /// context is a reported error, never a silent no-op.
    pub fn destroy_context(&mut self, id: ContextId) -> Result<(), RenderError> {
        {
            let context = self
                .contexts
                .get(&id)
                .ok_or(RenderError::UnknownContext(id))?;
            for observer in self.observers.iter_mut() {
                observer(ContextEvent::Destroyed, context);
            }
        }
        let mut context = self
            .contexts
            .remove(&id)
            .expect("context present during observer notification");
        context.strategy.delete_resources();
        tracing::info!(context = %id, "destroyed rendering context");
        Ok(())
    }

    /// Viewport change: updates the projection and reallocates the
    /// strategy's target storage. Prior target contents are gone afterwards.
    pub fn resize(&mut self, id: ContextId, width: u32, height: u32) -> Result<(), RenderError> {
        let context = self
            .contexts
            .get_mut(&id)
            .ok_or(RenderError::UnknownContext(id))?;
        if width == 0 || height == 0 {
            return Ok(());
        }
        context.size = (width, height);
        context.projection = projection_for(width, height);
        context
            .strategy
            .reallocate_storage(&context.device, width, height);
        debug_assert_eq!(context.strategy.storage_size(), Some((width, height)));
        tracing::debug!(context = %id, width, height, "reallocated strategy storage");
        Ok(())
    }

    pub fn get(&self, id: ContextId) -> Option<&RenderContext> {
        self.contexts.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RenderContext> {
        self.contexts.values()
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

/// Requests a device carrying the features the engine needs (wireframe
/// polygon mode). Hosts that build their own device must mirror this.
pub fn request_device(adapter: &wgpu::Adapter) -> Result<(wgpu::Device, wgpu::Queue)> {
    pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("glass walls device"),
        required_features: wgpu::Features::POLYGON_MODE_LINE,
        required_limits: adapter.limits(),
        memory_hints: wgpu::MemoryHints::Performance,
        trace: wgpu::Trace::default(),
    }))
    .context("failed to create GPU device")
}

/// Intersects the sample counts supported by every render-target format and
/// picks one per the antialiasing policy. Counts below 2 are excluded: the
/// resolve shaders read multisampled bindings.
fn negotiate_sample_count(
    adapter: &wgpu::Adapter,
    surface_format: wgpu::TextureFormat,
    antialiasing: Antialiasing,
) -> Result<u32> {
    let mut supported = adapter
        .get_texture_format_features(surface_format)
        .flags
        .supported_sample_counts();
    for format in [OPAQUE_FORMAT, REVEALAGE_FORMAT, DEPTH_FORMAT] {
        let counts = adapter
            .get_texture_format_features(format)
            .flags
            .supported_sample_counts();
        supported.retain(|count| counts.contains(count));
    }
    supported.retain(|&count| count > 1);
    supported.sort_unstable();
    supported.dedup();

    let Some(sample_count) = clamp_sample_count(&supported, antialiasing) else {
        anyhow::bail!(
            "no common multisample count >= 2 across render target formats \
             (surface format {surface_format:?})"
        );
    };
    if let Antialiasing::Samples(requested) = antialiasing {
        if requested != sample_count {
            tracing::warn!(
                requested,
                sample_count,
                ?supported,
                "requested MSAA sample count not supported; falling back"
            );
        }
    }
    Ok(sample_count)
}

/// Picks from a sorted, deduplicated list of supported counts: `Auto` takes
/// the highest; an explicit request clamps to the highest count not above
/// it, or the lowest supported when the request undershoots them all.
fn clamp_sample_count(supported: &[u32], antialiasing: Antialiasing) -> Option<u32> {
    match antialiasing {
        Antialiasing::Auto => supported.last().copied(),
        Antialiasing::Samples(requested) => {
            if supported.contains(&requested) {
                Some(requested)
            } else {
                supported
                    .iter()
                    .copied()
                    .filter(|&count| count <= requested)
                    .max()
                    .or_else(|| supported.first().copied())
            }
        }
    }
}

/// Aspect mapping: the short viewport axis spans [-1, 1], the long axis
/// widens proportionally.
fn projection_for(width: u32, height: u32) -> Mat3 {
    let aspect = width.max(1) as f32 / height.max(1) as f32;
    let mut half_width = 1.0f32;
    let mut half_height = 1.0f32;
    if width > height {
        half_width *= aspect;
    } else {
        half_height /= aspect;
    }
    Mat3::scale(1.0 / half_width, 1.0 / half_height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_takes_the_highest_supported_count() {
        assert_eq!(clamp_sample_count(&[2, 4, 8], Antialiasing::Auto), Some(8));
        assert_eq!(clamp_sample_count(&[], Antialiasing::Auto), None);
    }

    #[test]
    fn explicit_requests_clamp_downwards_first() {
        let supported = [2, 4, 8];
        assert_eq!(
            clamp_sample_count(&supported, Antialiasing::Samples(4)),
            Some(4)
        );
        assert_eq!(
            clamp_sample_count(&supported, Antialiasing::Samples(6)),
            Some(4)
        );
        assert_eq!(
            clamp_sample_count(&supported, Antialiasing::Samples(16)),
            Some(8)
        );
        // Undershooting every supported count falls up to the smallest.
        assert_eq!(
            clamp_sample_count(&[4, 8], Antialiasing::Samples(2)),
            Some(4)
        );
    }

    #[test]
    fn operations_on_unknown_contexts_are_reported() {
        let mut registry = ContextRegistry::new();
        let ghost = ContextId(7);
        assert_eq!(
            registry.destroy_context(ghost).unwrap_err(),
            RenderError::UnknownContext(ghost)
        );
        assert_eq!(
            registry.resize(ghost, 64, 64).unwrap_err(),
            RenderError::UnknownContext(ghost)
        );
        assert!(registry.get(ghost).is_none());
    }

    #[test]
    fn square_viewports_project_to_identity() {
        assert_eq!(projection_for(512, 512), Mat3::IDENTITY);
    }

    #[test]
    fn wide_viewports_compress_x() {
        let projection = projection_for(200, 100);
        let [x, y] = projection.transform_point([2.0, 1.0]);
        assert!((x - 1.0).abs() < 1e-6);
        assert!((y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn tall_viewports_compress_y() {
        let projection = projection_for(100, 200);
        let [x, y] = projection.transform_point([1.0, 2.0]);
        assert!((x - 1.0).abs() < 1e-6);
        assert!((y - 1.0).abs() < 1e-6);
    }
}
