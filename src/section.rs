//! One 16x16x16 sub-volume of a chunk.

use crate::block_state::BlockState;
use crate::error::{ChunkGenError, Result};
use crate::packing::pack_indices;
use quartz_nbt::{NbtCompound, NbtList, NbtTag};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tracing::debug;

pub const SECTION_SIDE: u8 = 16;
pub const SECTION_CELLS: usize = 4096;
pub const SKY_LIGHT_BYTES: usize = 2048;

/// Block palettes can never usefully exceed one entry per cell.
pub const MAX_PALETTE_LEN: usize = SECTION_CELLS;

// ─── Cells & Placement ──────────────────────────────────────────────────────

/// Section-local cell coordinate, each axis in `0..16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellPos {
    pub x: u8,
    pub y: u8,
    pub z: u8,
}

impl CellPos {
    pub fn new(x: u8, y: u8, z: u8) -> Result<Self> {
        if x >= SECTION_SIDE || y >= SECTION_SIDE || z >= SECTION_SIDE {
            return Err(ChunkGenError::CellOutOfBounds { x, y, z });
        }
        Ok(CellPos { x, y, z })
    }

    /// Linear storage index, `y*256 + z*16 + x`.
    pub fn index(self) -> usize {
        (self.y as usize) * 256 + (self.z as usize) * 16 + self.x as usize
    }
}

/// Maps the n-th placed block of a section to a cell.
pub trait Placement {
    /// How many blocks fit one section.
    fn capacity(&self) -> usize;
    fn cell(&self, ordinal: usize) -> Result<CellPos>;
}

/// Places one block every `stride` cells along each axis, x fastest, then z,
/// then y. Stride 2 leaves an empty cell between neighbouring test blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SparseGrid {
    stride: u8,
}

impl SparseGrid {
    pub fn new(stride: u8) -> Result<Self> {
        if stride == 0 || SECTION_SIDE % stride != 0 {
            return Err(ChunkGenError::InvalidStride(stride));
        }
        Ok(SparseGrid { stride })
    }

    pub fn stride(&self) -> u8 {
        self.stride
    }

    fn per_axis(&self) -> usize {
        (SECTION_SIDE / self.stride) as usize
    }
}

impl Placement for SparseGrid {
    fn capacity(&self) -> usize {
        self.per_axis().pow(3)
    }

    fn cell(&self, ordinal: usize) -> Result<CellPos> {
        let capacity = self.capacity();
        if ordinal >= capacity {
            return Err(ChunkGenError::SectionCapacity {
                requested: ordinal + 1,
                capacity,
            });
        }
        let n = self.per_axis();
        let step = |v: usize| (v * self.stride as usize) as u8;
        CellPos::new(step(ordinal % n), step(ordinal / (n * n)), step((ordinal / n) % n))
    }
}

// ─── Palette Strategy ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaletteStrategy {
    /// Every placement takes a fresh palette slot, repeated descriptors
    /// included.
    #[default]
    Append,
    /// Structurally equal descriptors share one slot.
    Deduplicate,
}

// ─── Section ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Section {
    y: i8,
    biome: SmolStr,
    sky_lit: bool,
    strategy: PaletteStrategy,
    palette: Vec<BlockState>,
    lookup: FxHashMap<BlockState, u16>,
    /// 4096 entries, each an index into `palette`.
    cells: Vec<u16>,
    placed: usize,
}

impl Section {
    /// An all-air section.
    pub fn new(y: i8, biome: impl Into<SmolStr>, sky_lit: bool, strategy: PaletteStrategy) -> Self {
        let air = BlockState::air();
        let mut lookup = FxHashMap::default();
        lookup.insert(air.clone(), 0);
        Section {
            y,
            biome: biome.into(),
            sky_lit,
            strategy,
            palette: vec![air],
            lookup,
            cells: vec![0; SECTION_CELLS],
            placed: 0,
        }
    }

    pub fn y(&self) -> i8 {
        self.y
    }

    pub fn biome(&self) -> &str {
        &self.biome
    }

    pub fn is_sky_lit(&self) -> bool {
        self.sky_lit
    }

    pub fn palette(&self) -> &[BlockState] {
        &self.palette
    }

    pub fn cells(&self) -> &[u16] {
        &self.cells
    }

    /// Number of explicit placements so far.
    pub fn placed(&self) -> usize {
        self.placed
    }

    pub fn block_at(&self, pos: CellPos) -> &BlockState {
        &self.palette[self.cells[pos.index()] as usize]
    }

    /// Put `block` at `pos` and return the palette index it was stored under.
    pub fn place(&mut self, pos: CellPos, block: BlockState) -> Result<u16> {
        let index = match self.strategy {
            PaletteStrategy::Deduplicate => match self.lookup.get(&block) {
                Some(&index) => index,
                None => self.push_palette(block)?,
            },
            PaletteStrategy::Append => self.push_palette(block)?,
        };
        self.cells[pos.index()] = index;
        self.placed += 1;
        Ok(index)
    }

    fn push_palette(&mut self, block: BlockState) -> Result<u16> {
        if self.palette.len() >= MAX_PALETTE_LEN {
            return Err(ChunkGenError::PaletteOverflow {
                limit: MAX_PALETTE_LEN,
            });
        }
        let index = self.palette.len() as u16;
        self.lookup.entry(block.clone()).or_insert(index);
        self.palette.push(block);
        Ok(index)
    }

    /// Place `blocks` in order at the cells `placement` assigns them.
    ///
    /// Capacity is checked up front so a rejected fill leaves the section
    /// untouched.
    pub fn fill<P: Placement + ?Sized>(&mut self, blocks: &[BlockState], placement: &P) -> Result<()> {
        let capacity = placement.capacity();
        if blocks.len() > capacity {
            return Err(ChunkGenError::SectionCapacity {
                requested: blocks.len(),
                capacity,
            });
        }
        let cells = (0..blocks.len())
            .map(|ordinal| placement.cell(ordinal))
            .collect::<Result<Vec<_>>>()?;
        let extra_slots = match self.strategy {
            PaletteStrategy::Append => blocks.len(),
            PaletteStrategy::Deduplicate => blocks
                .iter()
                .filter(|block| !self.lookup.contains_key(*block))
                .collect::<FxHashSet<_>>()
                .len(),
        };
        if self.palette.len() + extra_slots > MAX_PALETTE_LEN {
            return Err(ChunkGenError::PaletteOverflow {
                limit: MAX_PALETTE_LEN,
            });
        }
        for (pos, block) in cells.into_iter().zip(blocks) {
            self.place(pos, block.clone())?;
        }
        debug!(
            y = self.y,
            placed = blocks.len(),
            palette = self.palette.len(),
            "filled section"
        );
        Ok(())
    }

    /// Packed `data` words, or `None` for an untouched single-entry section.
    pub fn packed_indices(&self) -> Result<Option<Vec<i64>>> {
        if self.palette.len() <= 1 && self.placed == 0 {
            return Ok(None);
        }
        pack_indices(&self.cells, self.palette.len()).map(Some)
    }

    pub fn to_nbt(&self) -> Result<NbtCompound> {
        let mut section_nbt = NbtCompound::new();
        section_nbt.insert("Y", NbtTag::Byte(self.y));

        let mut biomes = NbtCompound::new();
        biomes.insert(
            "palette",
            NbtTag::List(NbtList::from(vec![NbtTag::String(self.biome.to_string())])),
        );
        section_nbt.insert("biomes", NbtTag::Compound(biomes));

        let mut block_states = NbtCompound::new();
        let palette: Vec<NbtTag> = self.palette.iter().map(BlockState::to_nbt).collect();
        block_states.insert("palette", NbtTag::List(NbtList::from(palette)));
        if let Some(packed) = self.packed_indices()? {
            block_states.insert("data", NbtTag::LongArray(packed));
        }
        section_nbt.insert("block_states", NbtTag::Compound(block_states));

        if self.sky_lit {
            // 0xFF in every nibble: full sky light
            section_nbt.insert("SkyLight", NbtTag::ByteArray(vec![-1i8; SKY_LIGHT_BYTES]));
        }

        Ok(section_nbt)
    }
}

/// Build a section at `y` holding `blocks` at the cells `placement` assigns.
pub fn build_section<P: Placement + ?Sized>(
    y: i8,
    biome: &str,
    blocks: &[BlockState],
    placement: &P,
    sky_lit: bool,
) -> Result<Section> {
    let mut section = Section::new(y, biome, sky_lit, PaletteStrategy::Append);
    section.fill(blocks, placement)?;
    Ok(section)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packing::unpack_indices;

    fn stone() -> BlockState {
        BlockState::new("minecraft:stone")
    }

    #[test]
    fn test_cell_index_layout() {
        assert_eq!(CellPos::new(0, 0, 0).unwrap().index(), 0);
        assert_eq!(CellPos::new(1, 0, 0).unwrap().index(), 1);
        assert_eq!(CellPos::new(0, 0, 1).unwrap().index(), 16);
        assert_eq!(CellPos::new(0, 1, 0).unwrap().index(), 256);
        assert_eq!(CellPos::new(15, 15, 15).unwrap().index(), 4095);
    }

    #[test]
    fn test_cell_outside_cube_rejected() {
        assert!(matches!(
            CellPos::new(16, 0, 0),
            Err(ChunkGenError::CellOutOfBounds { x: 16, .. })
        ));
        assert!(CellPos::new(0, 0, 200).is_err());
    }

    #[test]
    fn test_sparse_grid_stride_two() {
        let grid = SparseGrid::new(2).unwrap();
        assert_eq!(grid.stride(), 2);
        assert_eq!(grid.capacity(), 512);
        assert_eq!(grid.cell(0).unwrap(), CellPos::new(0, 0, 0).unwrap());
        assert_eq!(grid.cell(1).unwrap(), CellPos::new(2, 0, 0).unwrap());
        assert_eq!(grid.cell(8).unwrap(), CellPos::new(0, 0, 2).unwrap());
        assert_eq!(grid.cell(64).unwrap(), CellPos::new(0, 2, 0).unwrap());
        assert_eq!(grid.cell(511).unwrap(), CellPos::new(14, 14, 14).unwrap());
        assert!(matches!(
            grid.cell(512),
            Err(ChunkGenError::SectionCapacity {
                requested: 513,
                capacity: 512
            })
        ));
    }

    #[test]
    fn test_sparse_grid_cells_ascend() {
        let grid = SparseGrid::new(4).unwrap();
        let indices: Vec<usize> = (0..grid.capacity())
            .map(|i| grid.cell(i).unwrap().index())
            .collect();
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_invalid_strides() {
        for stride in [0u8, 3, 5, 7, 17] {
            assert!(matches!(
                SparseGrid::new(stride),
                Err(ChunkGenError::InvalidStride(s)) if s == stride
            ));
        }
        assert_eq!(SparseGrid::new(1).unwrap().capacity(), 4096);
    }

    #[test]
    fn test_untouched_section_is_air_without_data() {
        let section = Section::new(3, "minecraft:the_void", true, PaletteStrategy::Append);
        assert_eq!(section.palette(), &[BlockState::air()]);
        assert!(section.packed_indices().unwrap().is_none());

        let nbt = section.to_nbt().unwrap();
        assert_eq!(nbt.get::<_, i8>("Y").unwrap(), 3);
        let states = nbt.get::<_, &NbtCompound>("block_states").unwrap();
        assert_eq!(states.get::<_, &NbtList>("palette").unwrap().len(), 1);
        assert!(states.get::<_, &[i64]>("data").is_err());
        let biomes = nbt.get::<_, &NbtCompound>("biomes").unwrap();
        assert!(biomes.get::<_, &[i64]>("data").is_err());
    }

    #[test]
    fn test_sky_light_array() {
        let lit = Section::new(0, "minecraft:plains", true, PaletteStrategy::Append);
        let light = lit.to_nbt().unwrap();
        let bytes = light.get::<_, &[i8]>("SkyLight").unwrap();
        assert_eq!(bytes.len(), SKY_LIGHT_BYTES);
        assert!(bytes.iter().all(|&b| b as u8 == 0xFF));

        let dark = Section::new(0, "minecraft:plains", false, PaletteStrategy::Append);
        assert!(dark.to_nbt().unwrap().get::<_, &[i8]>("SkyLight").is_err());
    }

    #[test]
    fn test_append_keeps_repeated_descriptors() {
        let mut section = Section::new(0, "minecraft:the_void", true, PaletteStrategy::Append);
        let a = section.place(CellPos::new(0, 0, 0).unwrap(), stone()).unwrap();
        let b = section.place(CellPos::new(1, 0, 0).unwrap(), stone()).unwrap();
        assert_eq!((a, b), (1, 2));
        assert_eq!(section.palette().len(), 3);
    }

    #[test]
    fn test_deduplicate_shares_slot() {
        let mut section = Section::new(0, "minecraft:the_void", true, PaletteStrategy::Deduplicate);
        let a = section.place(CellPos::new(0, 0, 0).unwrap(), stone()).unwrap();
        let b = section.place(CellPos::new(1, 0, 0).unwrap(), stone()).unwrap();
        let air = section.place(CellPos::new(2, 0, 0).unwrap(), BlockState::air()).unwrap();
        assert_eq!((a, b, air), (1, 1, 0));
        assert_eq!(section.palette().len(), 2);
        assert_eq!(section.placed(), 3);
    }

    #[test]
    fn test_build_section_packs_in_placement_order() {
        let grid = SparseGrid::new(2).unwrap();
        let blocks: Vec<BlockState> = (0..20)
            .map(|i| stone().with_property("n", i.to_string()))
            .collect();
        let section = build_section(1, "minecraft:the_void", &blocks, &grid, true).unwrap();
        assert_eq!(section.y(), 1);
        assert_eq!(section.biome(), "minecraft:the_void");
        assert_eq!(section.palette().len(), 21);

        let packed = section.packed_indices().unwrap().unwrap();
        let cells = unpack_indices(&packed, 21, SECTION_CELLS).unwrap();
        for (ordinal, block) in blocks.iter().enumerate() {
            let pos = grid.cell(ordinal).unwrap();
            assert_eq!(cells[pos.index()] as usize, ordinal + 1);
            assert_eq!(section.block_at(pos), block);
        }
        assert_eq!(cells.iter().filter(|&&c| c != 0).count(), 20);
    }

    #[test]
    fn test_single_air_placement_still_emits_data() {
        let mut section = Section::new(0, "minecraft:the_void", false, PaletteStrategy::Deduplicate);
        section.place(CellPos::new(0, 0, 0).unwrap(), BlockState::air()).unwrap();
        assert_eq!(section.palette().len(), 1);
        let packed = section.packed_indices().unwrap().unwrap();
        assert_eq!(packed.len(), 256);
        assert!(packed.iter().all(|&w| w == 0));
    }

    #[test]
    fn test_fill_over_capacity_leaves_section_untouched() {
        let grid = SparseGrid::new(8).unwrap();
        let blocks = vec![stone(); 9];
        let mut section = Section::new(0, "minecraft:the_void", true, PaletteStrategy::Append);
        assert!(matches!(
            section.fill(&blocks, &grid),
            Err(ChunkGenError::SectionCapacity {
                requested: 9,
                capacity: 8
            })
        ));
        assert_eq!(section.placed(), 0);
        assert_eq!(section.palette().len(), 1);
    }

    #[test]
    fn test_palette_overflow_rejected() {
        let grid = SparseGrid::new(1).unwrap();
        let blocks = vec![stone(); SECTION_CELLS];
        let mut section = Section::new(0, "minecraft:the_void", true, PaletteStrategy::Append);
        assert!(matches!(
            section.fill(&blocks, &grid),
            Err(ChunkGenError::PaletteOverflow { limit: 4096 })
        ));
        assert_eq!(section.placed(), 0);

        let mut dedup = Section::new(0, "minecraft:the_void", true, PaletteStrategy::Deduplicate);
        dedup.fill(&blocks, &grid).unwrap();
        assert_eq!(dedup.palette().len(), 2);
    }
}
