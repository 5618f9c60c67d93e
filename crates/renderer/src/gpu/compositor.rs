//! The resolve pass: a full-viewport 4-vertex strip that reads the
//! accumulation textures per multisample sample and writes one color per
//! sample into the host's target. The pipeline is built once per
//! `gen_resources`; only the bind group is rebuilt when target storage is
//! reallocated (the texture views change, the shader does not).

pub(crate) struct Compositor {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
}

impl Compositor {
    /// Weighted-blended resolve over [opaque, accumulation, revealage].
    pub fn weighted(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        sample_count: u32,
        opaque: &wgpu::TextureView,
        accumulation: &wgpu::TextureView,
        revealage: &wgpu::TextureView,
    ) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("weighted resolve shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/compose_weighted.wgsl").into()),
        });
        Self::new(
            device,
            module,
            "fs_weighted",
            surface_format,
            sample_count,
            &[opaque, accumulation, revealage],
        )
    }

    /// Exposure tone-map resolve over the additive accumulation buffer.
    pub fn exposure(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        sample_count: u32,
        accumulation: &wgpu::TextureView,
    ) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("exposure resolve shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/compose_exposure.wgsl").into()),
        });
        Self::new(
            device,
            module,
            "fs_exposure",
            surface_format,
            sample_count,
            &[accumulation],
        )
    }

    fn new(
        device: &wgpu::Device,
        module: wgpu::ShaderModule,
        fragment_entry: &str,
        surface_format: wgpu::TextureFormat,
        sample_count: u32,
        views: &[&wgpu::TextureView],
    ) -> Self {
        let layout = texture_layout(device, views.len() as u32);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("resolve pipeline layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("resolve pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs_fullscreen"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: sample_count,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some(fragment_entry),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });
        let bind_group = bind_textures(device, &layout, views);
        Self {
            pipeline,
            layout,
            bind_group,
        }
    }

    /// Points the resolve pass at freshly reallocated target storage. View
    /// order must match the constructor's.
    pub fn rebind(&mut self, device: &wgpu::Device, views: &[&wgpu::TextureView]) {
        self.bind_group = bind_textures(device, &self.layout, views);
    }

    pub fn encode(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw(0..4, 0..1);
    }
}

fn texture_layout(device: &wgpu::Device, count: u32) -> wgpu::BindGroupLayout {
    let entries: Vec<wgpu::BindGroupLayoutEntry> = (0..count)
        .map(|binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: true,
            },
            count: None,
        })
        .collect();
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("resolve texture layout"),
        entries: &entries,
    })
}

fn bind_textures(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    views: &[&wgpu::TextureView],
) -> wgpu::BindGroup {
    let entries: Vec<wgpu::BindGroupEntry> = views
        .iter()
        .enumerate()
        .map(|(binding, view)| wgpu::BindGroupEntry {
            binding: binding as u32,
            resource: wgpu::BindingResource::TextureView(view),
        })
        .collect();
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("resolve texture bind group"),
        layout,
        entries: &entries,
    })
}
