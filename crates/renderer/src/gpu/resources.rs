//! Per-(wall, context) draw resources.
//!
//! Each wall owns one [`WallSlot`] per live rendering context: a uniform
//! buffer created eagerly when the slot appears, a bind group built lazily
//! on first use ("configured"), and a vertex buffer (re)allocated whenever
//! the wall's geometry generation moves. Slots come and go with context
//! lifecycle events; asking for a slot in a context that was never
//! registered is a programmer error and panics.

use std::collections::HashMap;

use glasswall::{WallGeometry, WallId};
use tracing::{debug, warn};

use super::context::{ContextEvent, ContextId, ContextRegistry, RenderContext};
use super::pipeline::WallUniforms;

pub(crate) struct WallSlot {
    uniform_buffer: wgpu::Buffer,
    bind_group: Option<wgpu::BindGroup>,
    vertex_buffer: Option<wgpu::Buffer>,
    vertex_capacity: u64,
    uploaded_generation: u64,
}

impl WallSlot {
    fn new(wall: WallId, context: &RenderContext) -> Self {
        let uniform_buffer = context.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{wall} uniforms ({})", context.id())),
            size: std::mem::size_of::<WallUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            uniform_buffer,
            bind_group: None,
            vertex_buffer: None,
            vertex_capacity: 0,
            uploaded_generation: 0,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.bind_group.is_some()
    }

    /// Installs the bind group; the slot counts as configured from here on
    /// and the layout setup is never reissued for this context.
    pub fn configure(&mut self, bind_group: wgpu::BindGroup) {
        self.bind_group = Some(bind_group);
    }

    pub fn uniform_buffer(&self) -> &wgpu::Buffer {
        &self.uniform_buffer
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        self.bind_group
            .as_ref()
            .expect("wall slot drawn before configuration")
    }

    pub fn vertex_buffer(&self) -> &wgpu::Buffer {
        self.vertex_buffer
            .as_ref()
            .expect("wall slot drawn before its vertex buffer was created")
    }

    /// Clears the needs-creation / needs-reallocation flags right before a
    /// draw: creates backing storage once, then reuploads the packed image
    /// whenever the geometry generation moved since the last upload.
    pub fn ensure_ready(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        geometry: &mut WallGeometry,
    ) {
        let needs_creation = self.vertex_buffer.is_none();
        let needs_reallocation = self.uploaded_generation != geometry.generation();
        if !needs_creation && !needs_reallocation {
            return;
        }

        let packed = geometry.packed();
        if needs_creation || packed.len() as u64 > self.vertex_capacity {
            self.vertex_buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("wall vertex buffer"),
                size: packed.len() as u64,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            self.vertex_capacity = packed.len() as u64;
        }
        let buffer = self
            .vertex_buffer
            .as_ref()
            .expect("vertex buffer allocated just above");
        queue.write_buffer(buffer, 0, packed);
        self.uploaded_generation = geometry.generation();
    }

    pub fn write_uniforms(&self, queue: &wgpu::Queue, uniforms: &WallUniforms) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }
}

/// One wall's context-keyed slot map. Constructing the holder provisions a
/// slot for every currently live context; context events keep it in sync.
pub(crate) struct WallResources {
    wall: WallId,
    slots: HashMap<ContextId, WallSlot>,
}

impl WallResources {
    fn new(wall: WallId, contexts: &ContextRegistry) -> Self {
        let slots = contexts
            .iter()
            .map(|context| (context.id(), WallSlot::new(wall, context)))
            .collect();
        Self { wall, slots }
    }

    fn register_context(&mut self, context: &RenderContext) {
        let stale = self.slots.insert(context.id(), WallSlot::new(self.wall, context));
        debug_assert!(
            stale.is_none(),
            "{} already had a slot for {}",
            self.wall,
            context.id()
        );
    }

    fn release_context(&mut self, id: ContextId) -> bool {
        self.slots.remove(&id).is_some()
    }

    /// The slot for a context, plus whether its layout is already
    /// configured. A context without a slot was never registered here;
    /// that is a bug in lifecycle wiring, not a runtime condition.
    pub fn acquire(&mut self, context: ContextId) -> (&mut WallSlot, bool) {
        let wall = self.wall;
        let slot = self.slots.get_mut(&context).unwrap_or_else(|| {
            panic!("no draw resources for {wall} in {context}; the context was never registered")
        });
        let configured = slot.is_configured();
        (slot, configured)
    }

    pub fn slot(&self, context: ContextId) -> &WallSlot {
        let wall = self.wall;
        self.slots.get(&context).unwrap_or_else(|| {
            panic!("no draw resources for {wall} in {context}; the context was never registered")
        })
    }
}

/// All walls' holders, kept in sync with context lifecycle events.
#[derive(Default)]
pub(crate) struct ResourceSet {
    walls: HashMap<WallId, WallResources>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_event(&mut self, event: ContextEvent, context: &RenderContext) {
        match event {
            ContextEvent::Created => {
                for holder in self.walls.values_mut() {
                    holder.register_context(context);
                }
                debug!(context = %context.id(), walls = self.walls.len(), "provisioned wall slots");
            }
            ContextEvent::Destroyed => {
                for (wall, holder) in self.walls.iter_mut() {
                    if holder.release_context(context.id()) {
                        debug!(wall = %wall, context = %context.id(), "released wall slot");
                    } else {
                        warn!(
                            wall = %wall,
                            context = %context.id(),
                            "no wall slot to release for dying context"
                        );
                    }
                }
            }
        }
    }

    /// The holder for a wall, constructing it (with a slot per live
    /// context) the first time the wall is rendered.
    pub fn track_wall(&mut self, wall: WallId, contexts: &ContextRegistry) -> &mut WallResources {
        self.walls
            .entry(wall)
            .or_insert_with(|| WallResources::new(wall, contexts))
    }

    pub fn wall(&self, wall: WallId) -> &WallResources {
        self.walls
            .get(&wall)
            .unwrap_or_else(|| panic!("{wall} was never tracked by the resource set"))
    }
}
