//! Offscreen multisampled render targets.
//!
//! Every strategy allocates its targets at 1×1 in `gen_resources` and
//! reallocates storage on viewport changes; contents after a reallocation
//! are undefined (fresh textures), never preserved.

/// Opaque-pass color target. wgpu has no three-channel float render
/// formats, so this widens to RGBA16F.
pub(crate) const OPAQUE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// Weighted color accumulation: RGB carries `Σ w·color`, alpha carries `Σ w`.
pub(crate) const ACCUMULATION_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// Revealage accumulation: the running product of `(1 − w)` terms.
pub(crate) const REVEALAGE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R16Float;
pub(crate) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

pub(crate) fn extent_for(size: (u32, u32)) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: size.0.max(1),
        height: size.1.max(1),
        depth_or_array_layers: 1,
    }
}

pub(crate) struct ColorTarget {
    pub view: wgpu::TextureView,
    _texture: wgpu::Texture,
}

impl ColorTarget {
    pub fn new(
        device: &wgpu::Device,
        label: &'static str,
        format: wgpu::TextureFormat,
        size: (u32, u32),
        sample_count: u32,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent_for(size),
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            view,
            _texture: texture,
        }
    }
}

pub(crate) struct DepthTarget {
    pub view: wgpu::TextureView,
    _texture: wgpu::Texture,
}

impl DepthTarget {
    pub fn new(device: &wgpu::Device, label: &'static str, size: (u32, u32), sample_count: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent_for(size),
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            view,
            _texture: texture,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extents_never_collapse_to_zero() {
        let extent = extent_for((0, 0));
        assert_eq!((extent.width, extent.height), (1, 1));
        let extent = extent_for((1920, 1080));
        assert_eq!((extent.width, extent.height), (1920, 1080));
    }
}
