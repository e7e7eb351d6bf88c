// vxl.rs — run-length-encoded destructible voxel world
//
// Two parallel structures describe the map: a geometry bitmap holding one
// bit per cell (truthy = solid), and a grid of 16x16 chunks each holding a
// sorted list of (packed position, colour) surface blocks. Interior solid
// blocks exist only in the bitmap; their colour is the default. The packed
// position is y:12 | x:12 | z:8 so natural integer order sorts by (y, x, z).

use crate::stream::PacketWriter;
use std::fmt;

const CHUNK_SIZE: usize = 16;

/// Sentinel colour for synthesised blocks (edge fills, uncovered faces).
pub const DEFAULT_COLOR: u32 = 0x674028;

/// Alpha/shadow byte OR'd onto every serialised colour for round-trip
/// parity with stock map files.
const WRITE_ALPHA: u32 = 0x7F00_0000;

#[derive(Debug)]
pub enum VxlError {
    /// The byte stream ended inside a span or column.
    UnexpectedEnd,
    /// A span header describes more bytes than the stream holds.
    SpanOverrun,
}

impl fmt::Display for VxlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VxlError::UnexpectedEnd => write!(f, "unexpected end of map data"),
            VxlError::SpanOverrun => write!(f, "span exceeds map data length"),
        }
    }
}

impl std::error::Error for VxlError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct PackedPos(u32);

impl PackedPos {
    fn new(x: u32, y: u32, z: u32) -> Self {
        Self((y << 20) | (x << 8) | z)
    }
}

#[derive(Debug, Clone, Copy)]
struct SpanHeader {
    length: u8,
    color_start: u8,
    color_end: u8,
    air_start: u8,
}

impl SpanHeader {
    /// Total bytes this span occupies in the stream, header included.
    fn data_length(&self) -> usize {
        if self.length > 0 {
            self.length as usize * 4
        } else {
            (self.color_end as usize + 2 - self.color_start as usize) * 4
        }
    }
}

/// One 16x16 XY tile: a sorted array of surface blocks.
#[derive(Default)]
struct Chunk {
    blocks: Vec<(PackedPos, u32)>,
}

impl Chunk {
    fn find(&self, pos: PackedPos) -> Result<usize, usize> {
        self.blocks.binary_search_by_key(&pos, |&(p, _)| p)
    }

    /// Append without order checking; only valid during sequential load.
    fn append(&mut self, pos: PackedPos, color: u32) {
        self.blocks.push((pos, color));
    }

    fn insert(&mut self, pos: PackedPos, color: u32) {
        match self.find(pos) {
            Ok(idx) => self.blocks[idx].1 = color,
            Err(idx) => self.blocks.insert(idx, (pos, color)),
        }
    }

    fn remove(&mut self, pos: PackedPos) -> bool {
        match self.find(pos) {
            Ok(idx) => {
                self.blocks.remove(idx);
                true
            }
            Err(_) => false,
        }
    }

    fn get(&self, pos: PackedPos) -> Option<u32> {
        self.find(pos).ok().map(|idx| self.blocks[idx].1)
    }
}

pub struct VxlMap {
    width: usize,
    height: usize,
    depth: usize,
    chunks_x: usize,
    chunks: Vec<Chunk>,
    geometry: Vec<u64>,
}

impl VxlMap {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    fn empty(width: usize, height: usize, depth: usize) -> Self {
        let chunks_x = width.div_ceil(CHUNK_SIZE);
        let chunks_y = height.div_ceil(CHUNK_SIZE);
        let mut chunks = Vec::with_capacity(chunks_x * chunks_y);
        chunks.resize_with(chunks_x * chunks_y, Chunk::default);
        let words = (width * height * depth).div_ceil(64);
        Self {
            width,
            height,
            depth,
            chunks_x,
            chunks,
            geometry: vec![0; words],
        }
    }

    /// Flat map with a single solid bedrock plane at the bottom.
    pub fn flat(width: usize, height: usize, depth: usize) -> Self {
        let mut map = Self::empty(width, height, depth);
        for y in 0..height {
            for x in 0..width {
                map.set(x as i32, y as i32, depth as i32 - 1, DEFAULT_COLOR);
            }
        }
        map
    }

    /// Load a map from its serialised RLE byte stream.
    pub fn from_bytes(
        width: usize,
        height: usize,
        depth: usize,
        data: &[u8],
    ) -> Result<Self, VxlError> {
        let mut map = Self::empty(width, height, depth);
        // Columns carve air out of a fully solid volume.
        for word in map.geometry.iter_mut() {
            *word = u64::MAX;
        }
        map.load_columns(data)?;
        map.add_edge_blocks();
        Ok(map)
    }

    /// Probe a serialised stream for its XY side length and depth without
    /// building the map. Depth is the smallest power of two covering the
    /// deepest colour run.
    pub fn probe_size(data: &[u8]) -> (usize, usize) {
        let mut offset = 0;
        let mut columns = 0usize;
        let mut max_depth = 0usize;

        while offset + 4 <= data.len() {
            let span = SpanHeader {
                length: data[offset],
                color_start: data[offset + 1],
                color_end: data[offset + 2],
                air_start: data[offset + 3],
            };
            max_depth = max_depth.max(span.color_end as usize + 1);
            if span.length == 0 {
                columns += 1;
            }
            offset += span.data_length();
        }

        let depth = max_depth.next_power_of_two();
        let size = (columns as f64).sqrt() as usize;
        (size, depth)
    }

    fn load_columns(&mut self, data: &[u8]) -> Result<(), VxlError> {
        let mut offset = 0usize;

        for y in 0..self.height {
            for x in 0..self.width {
                loop {
                    if offset + 4 > data.len() {
                        return Err(VxlError::UnexpectedEnd);
                    }
                    let span = SpanHeader {
                        length: data[offset],
                        color_start: data[offset + 1],
                        color_end: data[offset + 2],
                        air_start: data[offset + 3],
                    };
                    let length = span.data_length();
                    if offset + length > data.len() {
                        return Err(VxlError::SpanOverrun);
                    }
                    let colors = &data[offset + 4..offset + length];

                    for z in span.air_start..span.color_start {
                        self.set_geometry(x as i32, y as i32, z as i32, false);
                    }

                    let chunk_idx = self.chunk_index(x, y);
                    for z in span.color_start..=span.color_end {
                        let idx = (z - span.color_start) as usize * 4;
                        if idx + 4 > colors.len() {
                            return Err(VxlError::SpanOverrun);
                        }
                        let color = u32::from_le_bytes([
                            colors[idx],
                            colors[idx + 1],
                            colors[idx + 2],
                            colors[idx + 3],
                        ]);
                        self.chunks[chunk_idx]
                            .append(PackedPos::new(x as u32, y as u32, z as u32), color & 0xFF_FFFF);
                    }

                    offset += length;
                    if span.length == 0 {
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// Blocks on the map border can be solid yet fail the six-neighbour
    /// surface test because of XY wrapping; give them a chunk entry so
    /// they are visible from outside the map.
    fn add_edge_blocks(&mut self) {
        let (w, h) = (self.width as i32, self.height as i32);
        for z in 0..self.depth as i32 {
            for x in 0..w {
                for y in [0, h - 1] {
                    if self.has_geometry(x, y, z) && !self.on_surface(x, y, z) {
                        let idx = self.chunk_index(x as usize, y as usize);
                        self.chunks[idx]
                            .insert(PackedPos::new(x as u32, y as u32, z as u32), DEFAULT_COLOR);
                    }
                }
            }
            for y in 0..h {
                for x in [0, w - 1] {
                    if self.has_geometry(x, y, z) && !self.on_surface(x, y, z) {
                        let idx = self.chunk_index(x as usize, y as usize);
                        self.chunks[idx]
                            .insert(PackedPos::new(x as u32, y as u32, z as u32), DEFAULT_COLOR);
                    }
                }
            }
        }
    }

    fn chunk_index(&self, x: usize, y: usize) -> usize {
        x / CHUNK_SIZE + (y / CHUNK_SIZE) * self.chunks_x
    }

    fn geometry_offset(&self, x: i32, y: i32, z: i32) -> usize {
        z as usize + (x as usize + y as usize * self.width) * self.depth
    }

    fn has_geometry(&self, x: i32, y: i32, z: i32) -> bool {
        if x < 0
            || y < 0
            || z < 0
            || x >= self.width as i32
            || y >= self.height as i32
            || z >= self.depth as i32
        {
            return false;
        }
        let offset = self.geometry_offset(x, y, z);
        self.geometry[offset / 64] & (1 << (offset % 64)) != 0
    }

    fn set_geometry(&mut self, x: i32, y: i32, z: i32, solid: bool) {
        if x < 0
            || y < 0
            || z < 0
            || x >= self.width as i32
            || y >= self.height as i32
            || z >= self.depth as i32
        {
            return;
        }
        let offset = self.geometry_offset(x, y, z);
        if solid {
            self.geometry[offset / 64] |= 1 << (offset % 64);
        } else {
            self.geometry[offset / 64] &= !(1 << (offset % 64));
        }
    }

    pub fn is_inside(&self, x: i32, y: i32, z: i32) -> bool {
        x >= 0
            && y >= 0
            && z >= 0
            && x < self.width as i32
            && y < self.height as i32
            && z < self.depth as i32
    }

    /// Solidity with toroidal XY wrapping; above the sky is air, below
    /// the floor is solid.
    pub fn is_solid(&self, x: i32, y: i32, z: i32) -> bool {
        if z < 0 {
            return false;
        }
        if z >= self.depth as i32 {
            return true;
        }
        let w = self.width as i32;
        let h = self.height as i32;
        let x = ((x % w) + w) % w;
        let y = ((y % h) + h) % h;
        self.has_geometry(x, y, z)
    }

    /// At least one of the six neighbours is non-solid.
    pub fn on_surface(&self, x: i32, y: i32, z: i32) -> bool {
        !self.is_solid(x, y + 1, z)
            || !self.is_solid(x, y - 1, z)
            || !self.is_solid(x + 1, y, z)
            || !self.is_solid(x - 1, y, z)
            || !self.is_solid(x, y, z + 1)
            || !self.is_solid(x, y, z - 1)
    }

    /// At least one of the six neighbours is solid; placement anchor test.
    pub fn has_neighbors(&self, x: i32, y: i32, z: i32) -> bool {
        self.is_solid(x, y + 1, z)
            || self.is_solid(x, y - 1, z)
            || self.is_solid(x + 1, y, z)
            || self.is_solid(x - 1, y, z)
            || self.is_solid(x, y, z + 1)
            || self.is_solid(x, y, z - 1)
    }

    fn is_surface(&self, x: i32, y: i32, z: i32) -> bool {
        self.is_solid(x, y, z) && self.on_surface(x, y, z)
    }

    /// Colour of a solid block; interior blocks report the default colour,
    /// air reports 0.
    pub fn get(&self, x: i32, y: i32, z: i32) -> u32 {
        if !self.is_inside(x, y, z) || !self.has_geometry(x, y, z) {
            return 0;
        }
        let idx = self.chunk_index(x as usize, y as usize);
        self.chunks[idx]
            .get(PackedPos::new(x as u32, y as u32, z as u32))
            .unwrap_or(DEFAULT_COLOR)
    }

    /// Place a solid block, then drop neighbours whose last exposed face
    /// it covered from the surface lists (their geometry stays).
    pub fn set(&mut self, x: i32, y: i32, z: i32, color: u32) {
        if !self.is_inside(x, y, z) {
            return;
        }
        self.set_geometry(x, y, z, true);
        let idx = self.chunk_index(x as usize, y as usize);
        self.chunks[idx].insert(PackedPos::new(x as u32, y as u32, z as u32), color);
        self.update_neighbor_surfaces(x, y, z);
    }

    /// Place a solid block without surface maintenance; for bulk edits
    /// followed by a full rebuild or where neighbours are known exposed.
    pub fn set_no_optimize(&mut self, x: i32, y: i32, z: i32, color: u32) {
        if !self.is_inside(x, y, z) {
            return;
        }
        self.set_geometry(x, y, z, true);
        let idx = self.chunk_index(x as usize, y as usize);
        self.chunks[idx].insert(PackedPos::new(x as u32, y as u32, z as u32), color);
    }

    fn update_neighbor_surfaces(&mut self, x: i32, y: i32, z: i32) {
        let neighbors = [
            (x, y + 1, z),
            (x, y - 1, z),
            (x + 1, y, z),
            (x - 1, y, z),
            (x, y, z + 1),
            (x, y, z - 1),
        ];
        for (nx, ny, nz) in neighbors {
            if self.is_solid(nx, ny, nz) && !self.on_surface(nx, ny, nz) {
                self.bury_surface_entry(nx, ny, nz);
            }
        }
    }

    /// A block whose last exposed face was covered leaves the chunk list
    /// but stays solid in the geometry.
    fn bury_surface_entry(&mut self, x: i32, y: i32, z: i32) {
        if !self.is_inside(x, y, z) || z == self.depth as i32 - 1 {
            return;
        }
        if !self.has_geometry(x, y, z) {
            return;
        }
        let idx = self.chunk_index(x as usize, y as usize);
        self.chunks[idx].remove(PackedPos::new(x as u32, y as u32, z as u32));
    }

    /// Destruction removes both the chunk entry and the geometry bit.
    /// The bottom plane is never removed.
    fn remove_block(&mut self, x: i32, y: i32, z: i32) {
        if !self.is_inside(x, y, z) || z == self.depth as i32 - 1 {
            return;
        }
        if !self.has_geometry(x, y, z) {
            return;
        }
        let idx = self.chunk_index(x as usize, y as usize);
        if self.chunks[idx].remove(PackedPos::new(x as u32, y as u32, z as u32)) {
            self.set_geometry(x, y, z, false);
        }
    }

    /// Destroy a block. Neighbours that gained an exposed face get a
    /// default-coloured surface entry. The two bottom layers are
    /// indestructible.
    pub fn set_air(&mut self, x: i32, y: i32, z: i32) {
        if !self.is_inside(x, y, z) || z == self.depth as i32 - 2 {
            return;
        }

        let neighbors = [
            (x, y + 1, z),
            (x, y - 1, z),
            (x + 1, y, z),
            (x - 1, y, z),
            (x, y, z + 1),
            (x, y, z - 1),
        ];
        let was_surface: Vec<bool> = neighbors
            .iter()
            .map(|&(nx, ny, nz)| self.is_solid(nx, ny, nz) && self.on_surface(nx, ny, nz))
            .collect();

        self.remove_block(x, y, z);

        for (i, &(nx, ny, nz)) in neighbors.iter().enumerate() {
            if !was_surface[i]
                && self.is_inside(nx, ny, nz)
                && self.is_solid(nx, ny, nz)
                && self.on_surface(nx, ny, nz)
            {
                let idx = self.chunk_index(nx as usize, ny as usize);
                if self
                    .chunks[idx]
                    .get(PackedPos::new(nx as u32, ny as u32, nz as u32))
                    .is_none()
                {
                    self.chunks[idx]
                        .insert(PackedPos::new(nx as u32, ny as u32, nz as u32), DEFAULT_COLOR);
                }
            }
        }
    }

    /// First solid cell scanning down from the sky.
    pub fn find_top_block(&self, x: i32, y: i32) -> i32 {
        if !self.is_inside(x, y, 0) {
            return self.depth as i32 - 1;
        }
        for z in 0..self.depth as i32 {
            if self.has_geometry(x, y, z) {
                return z;
            }
        }
        self.depth as i32 - 1
    }

    /// First air cell with at least five consecutive solid cells below it;
    /// falls back to the first air-to-solid transition.
    pub fn find_ground_level(&self, x: i32, y: i32) -> i32 {
        if !self.is_inside(x, y, 0) {
            return self.depth as i32 - 1;
        }

        const MIN_TERRAIN_DEPTH: i32 = 5;
        let depth = self.depth as i32;

        for z in 0..depth - MIN_TERRAIN_DEPTH {
            if !self.has_geometry(x, y, z) && self.has_geometry(x, y, z + 1) {
                let mut solid_count = 0;
                for dz in 1..=MIN_TERRAIN_DEPTH {
                    if z + dz < depth && self.has_geometry(x, y, z + dz) {
                        solid_count += 1;
                    } else {
                        break;
                    }
                }
                if solid_count >= MIN_TERRAIN_DEPTH {
                    return z;
                }
            }
        }

        for z in 1..depth {
            if !self.has_geometry(x, y, z - 1) && self.has_geometry(x, y, z) {
                return z - 1;
            }
        }

        depth - 1
    }

    /// Serialise the whole map to the wire RLE format.
    pub fn write(&self) -> Vec<u8> {
        let mut out = PacketWriter::with_capacity(self.width * self.height * 8);
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                self.write_column(x, y, &mut out);
            }
        }
        out.into_bytes()
    }

    fn write_column(&self, x: i32, y: i32, out: &mut PacketWriter) {
        let depth = self.depth as i32;
        let mut k = 0i32;

        loop {
            let air_start = k as u8;
            while k < depth && !self.is_solid(x, y, k) {
                k += 1;
            }

            let top_start = k;
            while k < depth && self.is_surface(x, y, k) {
                k += 1;
            }
            let top_end = k;

            while k < depth && self.is_solid(x, y, k) && !self.on_surface(x, y, k) {
                k += 1;
            }

            // A bottom run that reaches the floor is left for the next
            // span, where it becomes the terminating top run.
            let bottom_start = k;
            let mut probe = k;
            while probe < depth && self.is_surface(x, y, probe) {
                probe += 1;
            }
            if probe != depth {
                while k < depth && self.is_surface(x, y, k) {
                    k += 1;
                }
            }
            let bottom_end = k;

            let top_length = top_end - top_start;
            let bottom_length = bottom_end - bottom_start;
            let colors_length = top_length + bottom_length;

            let length = if k == depth {
                0
            } else {
                (colors_length + 1) as u8
            };

            out.write_u8(length);
            out.write_u8(top_start as u8);
            out.write_u8((top_end - 1) as u8);
            out.write_u8(air_start);

            for z in top_start..top_end {
                out.write_u32(self.get(x, y, z) | WRITE_ALPHA);
            }
            for z in bottom_start..bottom_end {
                out.write_u32(self.get(x, y, z) | WRITE_ALPHA);
            }

            if k == depth {
                break;
            }
        }
    }

    /// Number of surface entries across all chunks; diagnostics and tests.
    pub fn surface_block_count(&self) -> usize {
        self.chunks.iter().map(|c| c.blocks.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Stream with every column `air 0..62, bedrock at 63`: span header
    /// [len=0, start=63, end=63, air=0] plus one colour entry.
    fn bedrock_stream(side: usize) -> Vec<u8> {
        let mut data = Vec::with_capacity(side * side * 8);
        for _ in 0..side * side {
            data.extend_from_slice(&[0, 63, 63, 0]);
            data.extend_from_slice(&(DEFAULT_COLOR | WRITE_ALPHA).to_le_bytes());
        }
        data
    }

    #[test]
    fn bedrock_map_round_trips_byte_exact() {
        let stream = bedrock_stream(512);
        let map = VxlMap::from_bytes(512, 512, 64, &stream).unwrap();

        // Exactly the bottom plane is solid.
        assert!(map.is_solid(0, 0, 63));
        assert!(map.is_solid(511, 511, 63));
        assert!(!map.is_solid(0, 0, 62));
        assert!(!map.is_solid(256, 256, 0));

        let written = map.write();
        assert_eq!(written, stream);

        let reloaded = VxlMap::from_bytes(512, 512, 64, &written).unwrap();
        for (a, b) in map.geometry.iter().zip(reloaded.geometry.iter()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn probe_size_reads_columns_and_depth() {
        let stream = bedrock_stream(512);
        let (size, depth) = VxlMap::probe_size(&stream);
        assert_eq!(size, 512);
        assert_eq!(depth, 64);
    }

    #[test]
    fn span_data_length_arithmetic() {
        let terminal = SpanHeader {
            length: 0,
            color_start: 63,
            color_end: 63,
            air_start: 0,
        };
        assert_eq!(terminal.data_length(), 8);

        let continuing = SpanHeader {
            length: 3,
            color_start: 10,
            color_end: 11,
            air_start: 0,
        };
        assert_eq!(continuing.data_length(), 12);
    }

    #[test]
    fn set_inserts_surface_and_covers_neighbors() {
        let mut map = VxlMap::flat(32, 32, 64);
        let base = map.surface_block_count();

        map.set(10, 10, 40, 0x112233);
        assert!(map.is_solid(10, 10, 40));
        assert_eq!(map.get(10, 10, 40), 0x112233);
        assert_eq!(map.surface_block_count(), base + 1);

        // Bury it on all six sides; the centre loses its chunk entry but
        // stays solid in the geometry.
        for (dx, dy, dz) in [(0, 1, 0), (0, -1, 0), (1, 0, 0), (-1, 0, 0), (0, 0, 1), (0, 0, -1)]
        {
            map.set(10 + dx, 10 + dy, 40 + dz, 0x445566);
        }
        assert!(map.is_solid(10, 10, 40));
        assert!(!map.on_surface(10, 10, 40));
        assert_eq!(map.get(10, 10, 40), DEFAULT_COLOR);
    }

    #[test]
    fn set_air_exposes_neighbors_with_default_color() {
        let mut map = VxlMap::flat(32, 32, 64);
        // Column of three blocks.
        map.set(5, 5, 40, 0xAA0000);
        map.set(5, 5, 41, 0x00BB00);
        map.set(5, 5, 42, 0x0000CC);

        map.set_air(5, 5, 41);
        assert!(!map.is_solid(5, 5, 41));
        assert!(map.is_solid(5, 5, 40));
        assert!(map.is_solid(5, 5, 42));
        assert_eq!(map.get(5, 5, 40), 0xAA0000);
    }

    #[test]
    fn bottom_layers_are_indestructible() {
        let mut map = VxlMap::flat(32, 32, 64);
        map.set_air(3, 3, 63);
        assert!(map.is_solid(3, 3, 63));
        map.set(3, 3, 62, 0x123456);
        map.set_air(3, 3, 62);
        assert!(map.is_solid(3, 3, 62));
    }

    #[test]
    fn xy_wrapping_and_z_clamping() {
        let map = VxlMap::flat(32, 32, 64);
        assert!(map.is_solid(-1, 0, 63)); // wraps to x = 31
        assert!(map.is_solid(32, 5, 63)); // wraps to x = 0
        assert!(!map.is_solid(0, 0, -1)); // sky is air
        assert!(map.is_solid(0, 0, 64)); // below the floor is solid
    }

    #[test]
    fn find_ground_level_requires_five_solid() {
        let mut map = VxlMap::flat(32, 32, 64);
        // Thin ledge at z = 20 must not count as ground.
        map.set(8, 8, 20, DEFAULT_COLOR);
        // Thick terrain from z = 40 down.
        for z in 40..46 {
            map.set(8, 8, z, DEFAULT_COLOR);
        }
        assert_eq!(map.find_ground_level(8, 8), 39);
    }

    #[test]
    fn find_ground_level_fallback_first_transition() {
        let mut map = VxlMap::flat(32, 32, 64);
        // Only a thin ledge anywhere above the bottom plane.
        map.set(9, 9, 30, DEFAULT_COLOR);
        assert_eq!(map.find_ground_level(9, 9), 29);
    }

    #[test]
    fn find_top_block_scans_down() {
        let mut map = VxlMap::flat(32, 32, 64);
        map.set(4, 4, 10, DEFAULT_COLOR);
        assert_eq!(map.find_top_block(4, 4), 10);
        assert_eq!(map.find_top_block(6, 6), 63);
    }

    #[test]
    fn overhang_round_trip_preserves_geometry() {
        let mut map = VxlMap::flat(16, 16, 64);
        // A 3-deep pillar with an interior cell.
        for z in 30..36 {
            map.set(7, 7, z, 0x405060);
        }
        let bytes = map.write();
        let reloaded = VxlMap::from_bytes(16, 16, 64, &bytes).unwrap();
        for z in 0..64 {
            assert_eq!(
                map.is_solid(7, 7, z),
                reloaded.is_solid(7, 7, z),
                "z = {}",
                z
            );
        }
        // Surface colours survive; interior reports default in both.
        assert_eq!(reloaded.get(7, 7, 30), 0x405060);
        assert_eq!(reloaded.get(7, 7, 35), 0x405060);
    }
}
