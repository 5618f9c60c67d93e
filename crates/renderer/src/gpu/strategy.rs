//! The compositing strategies and their frame choreography.
//!
//! Every strategy runs the same skeleton per frame, in one command encoder:
//! an opaque pass (clear, draw wall edges in wireframe plus faces of
//! non-transparent walls, far-to-near), a transparent pass (faces of
//! transparent walls with the strategy's blend state, depth tested against
//! the opaque pass but never written), and, for the offscreen strategies, a
//! resolve pass that composites per multisample sample into the host's
//! target. Render-pass boundaries are the memory barriers here: the
//! transparent pass sees a finished opaque pass, and the resolve pass sees
//! finished accumulation buffers.
//!
//! The strategy set is closed, so dispatch is an enum and a match.

use glasswall::{WallId, WallRegistry};

use crate::types::StrategyKind;

use super::compositor::Compositor;
use super::context::{ContextId, ContextRegistry, RenderContext};
use super::pipeline::{
    wall_bind_group, WallPassConfig, WallPipelines, WallUniforms, ADDITIVE_BLEND,
    BACK_TO_FRONT_BLEND, REVEALAGE_BLEND,
};
use super::resources::ResourceSet;
use super::targets::{ColorTarget, DepthTarget, ACCUMULATION_FORMAT, OPAQUE_FORMAT, REVEALAGE_FORMAT};

/// Snapshot of one wall taken while dirty flags were cleared and uniforms
/// written; the encode phase works from these, in far-to-near order.
pub(crate) struct PreparedWall {
    id: WallId,
    triangles: u32,
    fill_colors_offset: u64,
    edge_colors_offset: u64,
    transparent: bool,
}

/// Walks the registry far-to-near once per frame, skipping invisible and
/// empty walls, and brings every drawn wall's slot up to date: vertex
/// buffer created/reuploaded, bind group built on first use, uniforms
/// (projection·transform, normalized depth, opacity) written.
pub(crate) fn prepare_walls(
    context: &RenderContext,
    contexts: &ContextRegistry,
    walls: &mut WallRegistry,
    resources: &mut ResourceSet,
    layout: &wgpu::BindGroupLayout,
) -> Vec<PreparedWall> {
    let mapping = walls.depth_mapping();
    let projection = context.projection();
    let mut prepared = Vec::with_capacity(walls.len());
    for wall in walls.iter_far_to_near_mut() {
        if !wall.visible() || wall.geometry().is_empty() {
            continue;
        }
        let uniforms = WallUniforms::new(
            projection * wall.transformation(),
            mapping.depth_for(wall.depth_level()),
            wall.opacity(),
        );
        let holder = resources.track_wall(wall.id(), contexts);
        let (slot, configured) = holder.acquire(context.id());
        slot.ensure_ready(context.device(), context.queue(), wall.geometry_mut());
        if !configured {
            let bind_group = wall_bind_group(context.device(), layout, slot.uniform_buffer());
            slot.configure(bind_group);
        }
        slot.write_uniforms(context.queue(), &uniforms);
        prepared.push(PreparedWall {
            id: wall.id(),
            triangles: wall.geometry().triangle_count() as u32,
            fill_colors_offset: wall.geometry().fill_colors_offset(),
            edge_colors_offset: wall.geometry().edge_colors_offset(),
            transparent: wall.transparent(),
        });
    }
    prepared
}

pub(crate) enum RenderStrategy {
    WeightedBlended(WeightedBlended),
    BackToFront(BackToFront),
    Additive(Additive),
    AdditiveExposure(AdditiveExposure),
}

impl RenderStrategy {
    pub fn new(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::WeightedBlended => Self::WeightedBlended(WeightedBlended::default()),
            StrategyKind::BackToFront => Self::BackToFront(BackToFront::default()),
            StrategyKind::Additive => Self::Additive(Additive::default()),
            StrategyKind::AdditiveExposure => Self::AdditiveExposure(AdditiveExposure::default()),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::WeightedBlended(_) => StrategyKind::WeightedBlended,
            Self::BackToFront(_) => StrategyKind::BackToFront,
            Self::Additive(_) => StrategyKind::Additive,
            Self::AdditiveExposure(_) => StrategyKind::AdditiveExposure,
        }
    }

    /// Allocates offscreen targets (at 1×1 until the first resize) and
    /// builds the strategy's pipeline and resolve caches.
    pub fn gen_resources(
        &mut self,
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        sample_count: u32,
    ) {
        match self {
            Self::WeightedBlended(strategy) => {
                strategy.gen_resources(device, surface_format, sample_count)
            }
            Self::BackToFront(strategy) => {
                strategy.resources = Some(gen_direct(
                    device,
                    surface_format,
                    sample_count,
                    "fs_back_to_front",
                    BACK_TO_FRONT_BLEND,
                ));
            }
            Self::Additive(strategy) => {
                strategy.resources = Some(gen_direct(
                    device,
                    surface_format,
                    sample_count,
                    "fs_additive",
                    ADDITIVE_BLEND,
                ));
            }
            Self::AdditiveExposure(strategy) => {
                strategy.gen_resources(device, surface_format, sample_count)
            }
        }
    }

    /// Recreates target storage at the new dimensions. Contents are
    /// undefined afterwards; the next frame clears everything it reads.
    pub fn reallocate_storage(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        match self {
            Self::WeightedBlended(strategy) => strategy.reallocate_storage(device, width, height),
            Self::BackToFront(strategy) => realloc_direct(
                strategy
                    .resources
                    .as_mut()
                    .expect("storage reallocated before gen_resources"),
                device,
                width,
                height,
            ),
            Self::Additive(strategy) => realloc_direct(
                strategy
                    .resources
                    .as_mut()
                    .expect("storage reallocated before gen_resources"),
                device,
                width,
                height,
            ),
            Self::AdditiveExposure(strategy) => strategy.reallocate_storage(device, width, height),
        }
    }

    pub fn delete_resources(&mut self) {
        match self {
            Self::WeightedBlended(strategy) => strategy.resources = None,
            Self::BackToFront(strategy) => strategy.resources = None,
            Self::Additive(strategy) => strategy.resources = None,
            Self::AdditiveExposure(strategy) => strategy.resources = None,
        }
        tracing::debug!(strategy = ?self.kind(), "released strategy resources");
    }

    pub fn storage_size(&self) -> Option<(u32, u32)> {
        match self {
            Self::WeightedBlended(strategy) => strategy.resources.as_ref().map(|res| res.size),
            Self::BackToFront(strategy) => strategy.resources.as_ref().map(|res| res.size),
            Self::Additive(strategy) => strategy.resources.as_ref().map(|res| res.size),
            Self::AdditiveExposure(strategy) => strategy.resources.as_ref().map(|res| res.size),
        }
    }

    /// The wall uniform layout, present while resources are live.
    pub fn wall_layout(&self) -> Option<&wgpu::BindGroupLayout> {
        match self {
            Self::WeightedBlended(strategy) => {
                strategy.resources.as_ref().map(|res| &res.pipelines.layout)
            }
            Self::BackToFront(strategy) => {
                strategy.resources.as_ref().map(|res| &res.pipelines.layout)
            }
            Self::Additive(strategy) => {
                strategy.resources.as_ref().map(|res| &res.pipelines.layout)
            }
            Self::AdditiveExposure(strategy) => {
                strategy.resources.as_ref().map(|res| &res.pipelines.layout)
            }
        }
    }

    pub fn render(
        &self,
        context: &RenderContext,
        prepared: &[PreparedWall],
        resources: &ResourceSet,
        target: &wgpu::TextureView,
    ) {
        match self {
            Self::WeightedBlended(strategy) => strategy.render(context, prepared, resources, target),
            Self::BackToFront(strategy) => render_direct(
                "back-to-front frame",
                strategy
                    .resources
                    .as_ref()
                    .expect("back-to-front strategy rendered without resources"),
                context,
                prepared,
                resources,
                target,
            ),
            Self::Additive(strategy) => render_direct(
                "additive frame",
                strategy
                    .resources
                    .as_ref()
                    .expect("additive strategy rendered without resources"),
                context,
                prepared,
                resources,
                target,
            ),
            Self::AdditiveExposure(strategy) => strategy.render(context, prepared, resources, target),
        }
    }
}

/// Weighted-blended OIT: accumulates `w·color`/`w` and the revealage
/// product offscreen, then resolves against the opaque pass per sample.
#[derive(Default)]
pub(crate) struct WeightedBlended {
    resources: Option<WeightedBlendedResources>,
}

struct WeightedBlendedResources {
    size: (u32, u32),
    sample_count: u32,
    opaque: ColorTarget,
    accumulation: ColorTarget,
    revealage: ColorTarget,
    depth: DepthTarget,
    pipelines: WallPipelines,
    compositor: Compositor,
}

fn weighted_targets(
    device: &wgpu::Device,
    size: (u32, u32),
    sample_count: u32,
) -> (ColorTarget, ColorTarget, ColorTarget, DepthTarget) {
    (
        ColorTarget::new(device, "opaque color target", OPAQUE_FORMAT, size, sample_count),
        ColorTarget::new(
            device,
            "weighted accumulation target",
            ACCUMULATION_FORMAT,
            size,
            sample_count,
        ),
        ColorTarget::new(device, "revealage target", REVEALAGE_FORMAT, size, sample_count),
        DepthTarget::new(device, "wall depth target", size, sample_count),
    )
}

impl WeightedBlended {
    fn gen_resources(
        &mut self,
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        sample_count: u32,
    ) {
        let (opaque, accumulation, revealage, depth) = weighted_targets(device, (1, 1), sample_count);
        let pipelines = WallPipelines::new(
            device,
            &WallPassConfig {
                opaque_format: OPAQUE_FORMAT,
                transparent_entry: "fs_weighted",
                transparent_targets: vec![
                    Some(wgpu::ColorTargetState {
                        format: ACCUMULATION_FORMAT,
                        blend: Some(ADDITIVE_BLEND),
                        write_mask: wgpu::ColorWrites::ALL,
                    }),
                    Some(wgpu::ColorTargetState {
                        format: REVEALAGE_FORMAT,
                        blend: Some(REVEALAGE_BLEND),
                        write_mask: wgpu::ColorWrites::ALL,
                    }),
                ],
                sample_count,
            },
        );
        let compositor = Compositor::weighted(
            device,
            surface_format,
            sample_count,
            &opaque.view,
            &accumulation.view,
            &revealage.view,
        );
        self.resources = Some(WeightedBlendedResources {
            size: (1, 1),
            sample_count,
            opaque,
            accumulation,
            revealage,
            depth,
            pipelines,
            compositor,
        });
    }

    fn reallocate_storage(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        let res = self
            .resources
            .as_mut()
            .expect("storage reallocated before gen_resources");
        let (opaque, accumulation, revealage, depth) =
            weighted_targets(device, (width, height), res.sample_count);
        res.compositor
            .rebind(device, &[&opaque.view, &accumulation.view, &revealage.view]);
        res.opaque = opaque;
        res.accumulation = accumulation;
        res.revealage = revealage;
        res.depth = depth;
        res.size = (width, height);
    }

    fn render(
        &self,
        context: &RenderContext,
        prepared: &[PreparedWall],
        resources: &ResourceSet,
        target: &wgpu::TextureView,
    ) {
        let res = self
            .resources
            .as_ref()
            .expect("weighted-blended strategy rendered without resources");
        let mut encoder = context
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("weighted blended frame"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("opaque pass"),
                color_attachments: &[Some(color_attachment(
                    &res.opaque.view,
                    wgpu::LoadOp::Clear(context.clear_color()),
                ))],
                depth_stencil_attachment: Some(depth_attachment(
                    &res.depth.view,
                    wgpu::LoadOp::Clear(1.0),
                )),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            encode_opaque(&mut pass, context.id(), &res.pipelines, prepared, resources);
        }
        {
            // Accumulation clears to zero sums, revealage to a product of 1.
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("weighted accumulation pass"),
                color_attachments: &[
                    Some(color_attachment(
                        &res.accumulation.view,
                        wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    )),
                    Some(color_attachment(
                        &res.revealage.view,
                        wgpu::LoadOp::Clear(wgpu::Color::WHITE),
                    )),
                ],
                depth_stencil_attachment: Some(depth_attachment(
                    &res.depth.view,
                    wgpu::LoadOp::Load,
                )),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            encode_transparent(&mut pass, context.id(), &res.pipelines, prepared, resources);
        }
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("weighted resolve pass"),
                color_attachments: &[Some(color_attachment(target, wgpu::LoadOp::Load))],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            res.compositor.encode(&mut pass);
        }
        context.queue().submit(std::iter::once(encoder.finish()));
    }
}

/// Classic order-dependent blending straight onto the target.
#[derive(Default)]
pub(crate) struct BackToFront {
    resources: Option<DirectResources>,
}

/// Plain additive blending straight onto the target.
#[derive(Default)]
pub(crate) struct Additive {
    resources: Option<DirectResources>,
}

/// Shared shape of the two direct-to-target strategies: they draw into the
/// host's view and only own a depth buffer for it (the supplied view
/// carries no depth attachment).
struct DirectResources {
    size: (u32, u32),
    sample_count: u32,
    depth: DepthTarget,
    pipelines: WallPipelines,
}

fn gen_direct(
    device: &wgpu::Device,
    surface_format: wgpu::TextureFormat,
    sample_count: u32,
    transparent_entry: &'static str,
    blend: wgpu::BlendState,
) -> DirectResources {
    let depth = DepthTarget::new(device, "wall depth target", (1, 1), sample_count);
    let pipelines = WallPipelines::new(
        device,
        &WallPassConfig {
            opaque_format: surface_format,
            transparent_entry,
            transparent_targets: vec![Some(wgpu::ColorTargetState {
                format: surface_format,
                blend: Some(blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            sample_count,
        },
    );
    DirectResources {
        size: (1, 1),
        sample_count,
        depth,
        pipelines,
    }
}

fn realloc_direct(res: &mut DirectResources, device: &wgpu::Device, width: u32, height: u32) {
    res.depth = DepthTarget::new(device, "wall depth target", (width, height), res.sample_count);
    res.size = (width, height);
}

fn render_direct(
    label: &'static str,
    res: &DirectResources,
    context: &RenderContext,
    prepared: &[PreparedWall],
    resources: &ResourceSet,
    target: &wgpu::TextureView,
) {
    let mut encoder = context
        .device()
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("opaque pass"),
            color_attachments: &[Some(color_attachment(
                target,
                wgpu::LoadOp::Clear(context.clear_color()),
            ))],
            depth_stencil_attachment: Some(depth_attachment(
                &res.depth.view,
                wgpu::LoadOp::Clear(1.0),
            )),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        encode_opaque(&mut pass, context.id(), &res.pipelines, prepared, resources);
    }
    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("transparent pass"),
            color_attachments: &[Some(color_attachment(target, wgpu::LoadOp::Load))],
            depth_stencil_attachment: Some(depth_attachment(&res.depth.view, wgpu::LoadOp::Load)),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        encode_transparent(&mut pass, context.id(), &res.pipelines, prepared, resources);
    }
    context.queue().submit(std::iter::once(encoder.finish()));
}

/// Additive accumulation into an offscreen buffer, resolved with a fixed
/// exposure tone-map.
#[derive(Default)]
pub(crate) struct AdditiveExposure {
    resources: Option<ExposureResources>,
}

struct ExposureResources {
    size: (u32, u32),
    sample_count: u32,
    accumulation: ColorTarget,
    depth: DepthTarget,
    pipelines: WallPipelines,
    compositor: Compositor,
}

impl AdditiveExposure {
    fn gen_resources(
        &mut self,
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        sample_count: u32,
    ) {
        let accumulation = ColorTarget::new(
            device,
            "additive accumulation target",
            ACCUMULATION_FORMAT,
            (1, 1),
            sample_count,
        );
        let depth = DepthTarget::new(device, "wall depth target", (1, 1), sample_count);
        let pipelines = WallPipelines::new(
            device,
            &WallPassConfig {
                opaque_format: ACCUMULATION_FORMAT,
                transparent_entry: "fs_additive",
                transparent_targets: vec![Some(wgpu::ColorTargetState {
                    format: ACCUMULATION_FORMAT,
                    blend: Some(ADDITIVE_BLEND),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                sample_count,
            },
        );
        let compositor = Compositor::exposure(device, surface_format, sample_count, &accumulation.view);
        self.resources = Some(ExposureResources {
            size: (1, 1),
            sample_count,
            accumulation,
            depth,
            pipelines,
            compositor,
        });
    }

    fn reallocate_storage(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        let res = self
            .resources
            .as_mut()
            .expect("storage reallocated before gen_resources");
        let accumulation = ColorTarget::new(
            device,
            "additive accumulation target",
            ACCUMULATION_FORMAT,
            (width, height),
            res.sample_count,
        );
        res.compositor.rebind(device, &[&accumulation.view]);
        res.accumulation = accumulation;
        res.depth = DepthTarget::new(device, "wall depth target", (width, height), res.sample_count);
        res.size = (width, height);
    }

    fn render(
        &self,
        context: &RenderContext,
        prepared: &[PreparedWall],
        resources: &ResourceSet,
        target: &wgpu::TextureView,
    ) {
        let res = self
            .resources
            .as_ref()
            .expect("additive-exposure strategy rendered without resources");
        let mut encoder = context
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("additive exposure frame"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("opaque pass"),
                color_attachments: &[Some(color_attachment(
                    &res.accumulation.view,
                    wgpu::LoadOp::Clear(context.clear_color()),
                ))],
                depth_stencil_attachment: Some(depth_attachment(
                    &res.depth.view,
                    wgpu::LoadOp::Clear(1.0),
                )),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            encode_opaque(&mut pass, context.id(), &res.pipelines, prepared, resources);
        }
        {
            // Transparent walls add onto the opaque pass in the same buffer.
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("additive accumulation pass"),
                color_attachments: &[Some(color_attachment(
                    &res.accumulation.view,
                    wgpu::LoadOp::Load,
                ))],
                depth_stencil_attachment: Some(depth_attachment(
                    &res.depth.view,
                    wgpu::LoadOp::Load,
                )),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            encode_transparent(&mut pass, context.id(), &res.pipelines, prepared, resources);
        }
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("exposure resolve pass"),
                color_attachments: &[Some(color_attachment(target, wgpu::LoadOp::Load))],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            res.compositor.encode(&mut pass);
        }
        context.queue().submit(std::iter::once(encoder.finish()));
    }
}

fn color_attachment<'view>(
    view: &'view wgpu::TextureView,
    load: wgpu::LoadOp<wgpu::Color>,
) -> wgpu::RenderPassColorAttachment<'view> {
    wgpu::RenderPassColorAttachment {
        view,
        depth_slice: None,
        resolve_target: None,
        ops: wgpu::Operations {
            load,
            store: wgpu::StoreOp::Store,
        },
    }
}

fn depth_attachment<'view>(
    view: &'view wgpu::TextureView,
    load: wgpu::LoadOp<f32>,
) -> wgpu::RenderPassDepthStencilAttachment<'view> {
    wgpu::RenderPassDepthStencilAttachment {
        view,
        depth_ops: Some(wgpu::Operations {
            load,
            store: wgpu::StoreOp::Store,
        }),
        stencil_ops: None,
    }
}

/// Edges of every prepared wall in wireframe, then faces of the
/// non-transparent ones. Faces follow edges so coincident fragments at
/// equal depth resolve to the fill color.
fn encode_opaque(
    pass: &mut wgpu::RenderPass<'_>,
    context: ContextId,
    pipelines: &WallPipelines,
    prepared: &[PreparedWall],
    resources: &ResourceSet,
) {
    pass.set_pipeline(&pipelines.edges);
    for wall in prepared {
        draw_wall(pass, resources, context, wall, wall.edge_colors_offset);
    }
    pass.set_pipeline(&pipelines.faces);
    for wall in prepared.iter().filter(|wall| !wall.transparent) {
        draw_wall(pass, resources, context, wall, wall.fill_colors_offset);
    }
}

fn encode_transparent(
    pass: &mut wgpu::RenderPass<'_>,
    context: ContextId,
    pipelines: &WallPipelines,
    prepared: &[PreparedWall],
    resources: &ResourceSet,
) {
    pass.set_pipeline(&pipelines.transparent);
    for wall in prepared.iter().filter(|wall| wall.transparent) {
        draw_wall(pass, resources, context, wall, wall.fill_colors_offset);
    }
}

/// One instanced draw: slot 0 rides the position block, slot 1 the
/// requested color block of the same packed buffer.
fn draw_wall(
    pass: &mut wgpu::RenderPass<'_>,
    resources: &ResourceSet,
    context: ContextId,
    wall: &PreparedWall,
    color_offset: u64,
) {
    let slot = resources.wall(wall.id).slot(context);
    pass.set_bind_group(0, slot.bind_group(), &[]);
    let buffer = slot.vertex_buffer();
    pass.set_vertex_buffer(0, buffer.slice(..));
    pass.set_vertex_buffer(1, buffer.slice(color_offset..));
    pass.draw(0..3, 0..wall.triangles);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_strategies_report_no_storage() {
        for kind in [
            StrategyKind::WeightedBlended,
            StrategyKind::BackToFront,
            StrategyKind::Additive,
            StrategyKind::AdditiveExposure,
        ] {
            let strategy = RenderStrategy::new(kind);
            assert_eq!(strategy.kind(), kind);
            assert!(strategy.storage_size().is_none());
            assert!(strategy.wall_layout().is_none());
        }
    }

    /// CPU mirror of the weighted accumulation buffers and the resolve in
    /// `compose_weighted.wgsl`: attachment 0 sums with (ONE, ONE),
    /// attachment 1 multiplies with (DST, ZERO) from a clear value of 1.
    struct WeightedAccumulation {
        color: [f32; 3],
        weight: f32,
        revealage: f32,
    }

    impl WeightedAccumulation {
        fn cleared() -> Self {
            Self {
                color: [0.0; 3],
                weight: 0.0,
                revealage: 1.0,
            }
        }

        fn draw(&mut self, fill: [f32; 3], opacity: f32) {
            for (sum, channel) in self.color.iter_mut().zip(fill) {
                *sum += opacity * channel;
            }
            self.weight += opacity;
            self.revealage *= 1.0 - opacity;
        }

        fn resolve(&self, opaque: [f32; 3]) -> [f32; 3] {
            if self.weight == 0.0 {
                return opaque;
            }
            let alpha = 1.0 - self.revealage;
            let mut out = [0.0; 3];
            for ((channel, sum), opaque) in out.iter_mut().zip(self.color).zip(opaque) {
                *channel = sum / self.weight * alpha + opaque * (1.0 - alpha);
            }
            out
        }
    }

    /// CPU mirror of one straight-alpha blend step (SRC_ALPHA,
    /// ONE_MINUS_SRC_ALPHA) as the back-to-front strategy configures it.
    fn blend_over(destination: [f32; 3], source: [f32; 3], alpha: f32) -> [f32; 3] {
        let mut out = [0.0; 3];
        for ((channel, src), dst) in out.iter_mut().zip(source).zip(destination) {
            *channel = src * alpha + dst * (1.0 - alpha);
        }
        out
    }

    fn assert_close(a: [f32; 3], b: [f32; 3]) {
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-6, "{a:?} != {b:?}");
        }
    }

    #[test]
    fn zero_weight_resolves_to_the_opaque_color_exactly() {
        // Garbage in the color/revealage buffers must not leak through.
        let accumulation = WeightedAccumulation {
            color: [5.0, -3.0, 7.5],
            weight: 0.0,
            revealage: 0.125,
        };
        assert_eq!(accumulation.resolve([0.25, 0.5, 0.75]), [0.25, 0.5, 0.75]);
    }

    #[test]
    fn two_half_opacity_walls_over_black() {
        let a = [1.0, 0.0, 0.0];
        let b = [0.0, 0.0, 1.0];
        let mut accumulation = WeightedAccumulation::cleared();
        accumulation.draw(a, 0.5);
        accumulation.draw(b, 0.5);

        // weight sum 1, revealage 0.25 → alpha 0.75:
        // (A+B)/2 · 0.75 + opaque · 0.25
        assert!((accumulation.revealage - 0.25).abs() < 1e-6);
        assert_close(accumulation.resolve([0.0; 3]), [0.375, 0.0, 0.375]);

        let opaque = [0.2, 0.4, 0.8];
        assert_close(
            accumulation.resolve(opaque),
            [
                0.375 + 0.2 * 0.25,
                0.4 * 0.25,
                0.375 + 0.8 * 0.25,
            ],
        );
    }

    #[test]
    fn weighted_accumulation_is_order_independent() {
        let walls = [([0.9, 0.1, 0.3], 0.25), ([0.2, 0.8, 0.5], 0.6), ([0.0, 0.4, 1.0], 0.5)];
        let mut forward = WeightedAccumulation::cleared();
        for (fill, opacity) in walls {
            forward.draw(fill, opacity);
        }
        let mut backward = WeightedAccumulation::cleared();
        for (fill, opacity) in walls.into_iter().rev() {
            backward.draw(fill, opacity);
        }
        assert_close(
            forward.resolve([0.1, 0.1, 0.1]),
            backward.resolve([0.1, 0.1, 0.1]),
        );
    }

    #[test]
    fn back_to_front_blending_is_order_sensitive() {
        let a = [1.0, 0.0, 0.0];
        let b = [0.0, 0.0, 1.0];
        let black = [0.0; 3];

        let far_to_near = blend_over(blend_over(black, a, 0.5), b, 0.5);
        let near_to_far = blend_over(blend_over(black, b, 0.5), a, 0.5);
        assert_close(far_to_near, [0.25, 0.0, 0.5]);
        assert!(
            far_to_near
                .iter()
                .zip(near_to_far)
                .any(|(x, y)| (x - y).abs() > 1e-6),
            "overlapping translucent walls must depend on draw order"
        );
    }

    #[test]
    fn exposure_tonemap_stays_inside_unit_range() {
        // Mirror of compose_exposure.wgsl: 1 − exp(−0.8·c).
        let tonemap = |c: f32| 1.0 - (-0.8 * c).exp();
        assert_eq!(tonemap(0.0), 0.0);
        assert!(tonemap(100.0) < 1.0);
        let mut previous = -1.0;
        for step in 0..100 {
            let value = tonemap(step as f32 * 0.25);
            assert!(value > previous);
            previous = value;
        }
    }
}
