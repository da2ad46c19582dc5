//! Chunk root record: metadata plus 24 stacked sections.

use crate::error::{ChunkGenError, Result};
use crate::packing::BitLayout;
use crate::section::{PaletteStrategy, Section};
use quartz_nbt::{NbtCompound, NbtList, NbtTag};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const MIN_SECTION_Y: i8 = -4;
pub const MAX_SECTION_Y: i8 = 19;
pub const SECTION_COUNT: usize = 24;

/// Heightmap entries are 9 bits: heights 0..=384 above the world floor.
const HEIGHTMAP_BITS: u32 = 9;
const COLUMNS: usize = 256;

/// Fixed fields every generated chunk shares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkFormat {
    /// 3465 = 1.20.1
    #[serde(default = "default_data_version")]
    pub data_version: i32,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "default_biome")]
    pub biome: String,
    #[serde(default = "default_true")]
    pub sky_lit: bool,
    #[serde(default)]
    pub palette_strategy: PaletteStrategy,
}

fn default_data_version() -> i32 {
    3465
}
fn default_status() -> String {
    "minecraft:full".to_string()
}
fn default_biome() -> String {
    "minecraft:the_void".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for ChunkFormat {
    fn default() -> Self {
        ChunkFormat {
            data_version: default_data_version(),
            status: default_status(),
            biome: default_biome(),
            sky_lit: true,
            palette_strategy: PaletteStrategy::default(),
        }
    }
}

// ─── Chunk ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Chunk {
    x: i32,
    z: i32,
    data_version: i32,
    status: String,
    /// Always `SECTION_COUNT` long, Y ascending from `MIN_SECTION_Y`.
    sections: Vec<Section>,
}

impl Chunk {
    /// A chunk at chunk coordinates `(x, z)` with 24 empty-air sections.
    pub fn new(x: i32, z: i32, format: &ChunkFormat) -> Self {
        let sections = (MIN_SECTION_Y..=MAX_SECTION_Y)
            .map(|y| Section::new(y, format.biome.as_str(), format.sky_lit, format.palette_strategy))
            .collect();
        Chunk {
            x,
            z,
            data_version: format.data_version,
            status: format.status.clone(),
            sections,
        }
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn z(&self) -> i32 {
        self.z
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, y: i32) -> Result<&Section> {
        Ok(&self.sections[section_slot(y)?])
    }

    pub fn section_mut(&mut self, y: i32) -> Result<&mut Section> {
        let slot = section_slot(y)?;
        Ok(&mut self.sections[slot])
    }

    /// Root chunk tree. `yPos`, `isLightOn` and `Heightmaps` are not part of
    /// the fixture content but are required by the 1.18+ loader, which
    /// otherwise re-lights or regenerates the chunk.
    pub fn to_nbt(&self) -> Result<NbtCompound> {
        let mut root = NbtCompound::new();

        root.insert("DataVersion", NbtTag::Int(self.data_version));
        root.insert("xPos", NbtTag::Int(self.x));
        root.insert("yPos", NbtTag::Int(MIN_SECTION_Y as i32));
        root.insert("zPos", NbtTag::Int(self.z));
        root.insert("Status", NbtTag::String(self.status.clone()));
        root.insert("LastUpdate", NbtTag::Long(0));
        root.insert("InhabitedTime", NbtTag::Long(0));

        let lit = self.sections.iter().all(Section::is_sky_lit);
        root.insert("isLightOn", NbtTag::Byte(if lit { 1 } else { 0 }));

        let mut blending = NbtCompound::new();
        blending.insert("min_section", NbtTag::Int(MIN_SECTION_Y as i32));
        blending.insert("max_section", NbtTag::Int(MAX_SECTION_Y as i32 + 1));
        root.insert("blending_data", NbtTag::Compound(blending));

        let mut structures = NbtCompound::new();
        structures.insert("References", NbtTag::Compound(NbtCompound::new()));
        structures.insert("starts", NbtTag::Compound(NbtCompound::new()));
        root.insert("structures", NbtTag::Compound(structures));

        root.insert("block_entities", NbtTag::List(NbtList::new()));
        root.insert("block_ticks", NbtTag::List(NbtList::new()));
        root.insert("fluid_ticks", NbtTag::List(NbtList::new()));

        let post_processing: Vec<NbtTag> = (0..SECTION_COUNT)
            .map(|_| NbtTag::List(NbtList::new()))
            .collect();
        root.insert("PostProcessing", NbtTag::List(NbtList::from(post_processing)));

        root.insert("Heightmaps", NbtTag::Compound(self.heightmaps()?));

        let sections = self
            .sections
            .iter()
            .map(|section| section.to_nbt().map(NbtTag::Compound))
            .collect::<Result<Vec<_>>>()?;
        root.insert("sections", NbtTag::List(NbtList::from(sections)));

        debug!(x = self.x, z = self.z, "built chunk tree");
        Ok(root)
    }

    /// Height above the world floor of the topmost non-air cell per column.
    fn column_heights(&self) -> Vec<u16> {
        let mut heights = vec![0u16; COLUMNS];
        for (column, height) in heights.iter_mut().enumerate() {
            'sections: for (slot, section) in self.sections.iter().enumerate().rev() {
                if section.placed() == 0 {
                    continue;
                }
                for local_y in (0..16usize).rev() {
                    let index = local_y * COLUMNS + column;
                    if !section.palette()[section.cells()[index] as usize].is_air() {
                        *height = (slot * 16 + local_y + 1) as u16;
                        break 'sections;
                    }
                }
            }
        }
        heights
    }

    fn heightmaps(&self) -> Result<NbtCompound> {
        let layout = BitLayout::with_width(HEIGHTMAP_BITS)?;
        let packed = layout.pack(&self.column_heights());

        let mut heightmaps = NbtCompound::new();
        heightmaps.insert("MOTION_BLOCKING", NbtTag::LongArray(packed.clone()));
        heightmaps.insert("WORLD_SURFACE", NbtTag::LongArray(packed));
        Ok(heightmaps)
    }
}

fn section_slot(y: i32) -> Result<usize> {
    if y < MIN_SECTION_Y as i32 || y > MAX_SECTION_Y as i32 {
        return Err(ChunkGenError::SectionOutOfRange(y));
    }
    Ok((y - MIN_SECTION_Y as i32) as usize)
}
