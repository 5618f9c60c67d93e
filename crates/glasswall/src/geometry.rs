use crate::color::Rgb8;

/// Byte stride of one triangle's corner block: three packed `vec2<f32>`.
pub const POSITION_STRIDE: u64 = 24;
/// Byte stride of one packed triangle color
/// ([`LinearRgba16`](crate::LinearRgba16)).
pub const COLOR_STRIDE: u64 = 8;

/// Triangle list of one glass wall plus its packed vertex-buffer image.
///
/// Triangles are stored as vertex triples with one edge color and one fill
/// color each (colors are per-triangle, not per-vertex). The packed image is
/// laid out as three contiguous blocks (corner positions, fill colors, edge
/// colors) so the renderer can bind the same buffer at three offsets. The
/// `generation` counter bumps on every mutation; GPU-side buffers compare it
/// against what they last uploaded to decide whether they are stale.
#[derive(Debug, Default)]
pub struct WallGeometry {
    vertices: Vec<[f32; 2]>,
    edge_colors: Vec<Rgb8>,
    fill_colors: Vec<Rgb8>,
    packed: Vec<u8>,
    packed_stale: bool,
    generation: u64,
}

impl WallGeometry {
    pub fn new() -> Self {
        Self {
            generation: 1,
            ..Self::default()
        }
    }

    /// Appends one triangle and marks the packed image stale.
    pub fn add_triangle(
        &mut self,
        a: [f32; 2],
        b: [f32; 2],
        c: [f32; 2],
        edge_color: Rgb8,
        fill_color: Rgb8,
    ) {
        self.vertices.push(a);
        self.vertices.push(b);
        self.vertices.push(c);
        self.edge_colors.push(edge_color);
        self.fill_colors.push(fill_color);
        self.packed_stale = true;
        self.generation += 1;
    }

    pub fn triangle_count(&self) -> usize {
        self.fill_colors.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Monotonic content stamp; changes whenever the triangle list does.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Byte offset of the fill-color block inside the packed image.
    pub fn fill_colors_offset(&self) -> u64 {
        POSITION_STRIDE * self.triangle_count() as u64
    }

    /// Byte offset of the edge-color block inside the packed image.
    pub fn edge_colors_offset(&self) -> u64 {
        self.fill_colors_offset() + COLOR_STRIDE * self.triangle_count() as u64
    }

    pub fn packed_len(&self) -> u64 {
        self.edge_colors_offset() + COLOR_STRIDE * self.triangle_count() as u64
    }

    /// The packed byte image, repacking first if the triangle list changed.
    ///
    /// Colors are linearized at pack time so the buffer always holds
    /// blendable linear values regardless of when triangles were added.
    pub fn packed(&mut self) -> &[u8] {
        if self.packed_stale {
            self.repack();
        }
        &self.packed
    }

    fn repack(&mut self) {
        debug_assert_eq!(self.vertices.len(), self.edge_colors.len() * 3);
        debug_assert_eq!(self.fill_colors.len(), self.edge_colors.len());

        self.packed.clear();
        self.packed.reserve(self.packed_len() as usize);
        self.packed
            .extend_from_slice(bytemuck::cast_slice(&self.vertices));
        for block in [&self.fill_colors, &self.edge_colors] {
            for color in block.iter() {
                self.packed
                    .extend_from_slice(bytemuck::bytes_of(&color.to_linear()));
            }
        }
        self.packed_stale = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle(geometry: &mut WallGeometry, offset: f32) {
        geometry.add_triangle(
            [offset, 0.0],
            [offset + 1.0, 0.0],
            [offset, 1.0],
            Rgb8::new(255, 255, 255),
            Rgb8::new(255, 0, 0),
        );
    }

    #[test]
    fn counts_follow_the_triangle_invariant() {
        let mut geometry = WallGeometry::new();
        for n in 0..5 {
            assert_eq!(geometry.vertex_count(), 3 * n);
            assert_eq!(geometry.triangle_count(), n);
            triangle(&mut geometry, n as f32);
        }
        assert_eq!(geometry.vertex_count(), 15);
        assert_eq!(geometry.triangle_count(), 5);
    }

    #[test]
    fn packed_blocks_sit_at_the_documented_offsets() {
        let mut geometry = WallGeometry::new();
        triangle(&mut geometry, 0.0);
        triangle(&mut geometry, 2.0);

        assert_eq!(geometry.fill_colors_offset(), POSITION_STRIDE * 2);
        assert_eq!(
            geometry.edge_colors_offset(),
            POSITION_STRIDE * 2 + COLOR_STRIDE * 2
        );
        assert_eq!(geometry.packed_len(), (POSITION_STRIDE + 2 * COLOR_STRIDE) * 2);
        assert_eq!(geometry.packed().len() as u64, geometry.packed_len());
    }

    fn read_f32s(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes(chunk.try_into().unwrap()))
            .collect()
    }

    fn read_u16s(bytes: &[u8]) -> Vec<u16> {
        bytes
            .chunks_exact(2)
            .map(|chunk| u16::from_le_bytes(chunk.try_into().unwrap()))
            .collect()
    }

    #[test]
    fn packed_positions_round_trip() {
        let mut geometry = WallGeometry::new();
        triangle(&mut geometry, 4.0);
        let positions = read_f32s(&geometry.packed()[..24]);
        assert_eq!(positions, vec![4.0, 0.0, 5.0, 0.0, 4.0, 1.0]);
    }

    #[test]
    fn packed_colors_are_linearized() {
        let mut geometry = WallGeometry::new();
        geometry.add_triangle(
            [0.0, 0.0],
            [1.0, 0.0],
            [0.0, 1.0],
            Rgb8::new(0, 0, 0),
            Rgb8::new(255, 255, 255),
        );
        let fill_offset = geometry.fill_colors_offset() as usize;
        let edge_offset = geometry.edge_colors_offset() as usize;
        let packed = geometry.packed();
        let fill = read_u16s(&packed[fill_offset..fill_offset + 8]);
        let edge = read_u16s(&packed[edge_offset..edge_offset + 8]);
        assert_eq!(fill, vec![u16::MAX; 4]);
        assert_eq!(edge, vec![0, 0, 0, u16::MAX]);
    }

    #[test]
    fn generation_advances_with_every_mutation() {
        let mut geometry = WallGeometry::new();
        let initial = geometry.generation();
        triangle(&mut geometry, 0.0);
        assert!(geometry.generation() > initial);
        let _ = geometry.packed();
        assert_eq!(geometry.generation(), initial + 1, "packing must not dirty");
        triangle(&mut geometry, 1.0);
        assert_eq!(geometry.generation(), initial + 2);
    }
}
