use crate::block_state::BlockState;
use crate::chunk::{ChunkFormat, MAX_SECTION_Y, MIN_SECTION_Y};
use crate::error::{ChunkGenError, Result};
use crate::region::{chunk_coord, region_coords, region_file_name};
use crate::scenario::VANILLA_STAIRS;
use crate::section::SparseGrid;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Options for a generator run. Every field has a default, so an options
/// file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorOptions {
    #[serde(default)]
    pub format: ChunkFormat,
    /// World block coordinates (x, z) the scenario is built around.
    #[serde(default = "default_origin")]
    pub origin: (i32, i32),
    /// Cells between placed test blocks along each axis.
    #[serde(default = "default_stride")]
    pub stride: u8,
    /// First section receiving stair permutations; overflow continues upward.
    #[serde(default)]
    pub stair_section: i8,
    /// Stair block identifiers to enumerate.
    #[serde(default = "default_stair_blocks")]
    pub stair_blocks: Vec<String>,
    #[serde(default = "default_misc_block")]
    pub misc_block: BlockState,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_origin() -> (i32, i32) {
    (10_000_000, 20_000_000)
}
fn default_stride() -> u8 {
    2
}
fn default_stair_blocks() -> Vec<String> {
    VANILLA_STAIRS
        .iter()
        .map(|material| format!("minecraft:{}_stairs", material))
        .collect()
}
fn default_misc_block() -> BlockState {
    BlockState::new("minecraft:redstone_lamp").with_property("lit", "true")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("region")
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        GeneratorOptions {
            format: ChunkFormat::default(),
            origin: default_origin(),
            stride: default_stride(),
            stair_section: 0,
            stair_blocks: default_stair_blocks(),
            misc_block: default_misc_block(),
            output_dir: default_output_dir(),
        }
    }
}

impl GeneratorOptions {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: GeneratorOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<()> {
        SparseGrid::new(self.stride)?;
        if !(MIN_SECTION_Y..=MAX_SECTION_Y).contains(&self.stair_section) {
            return Err(ChunkGenError::SectionOutOfRange(self.stair_section as i32));
        }
        if self.misc_block.name.is_empty() {
            return Err(ChunkGenError::Options("misc_block needs a name".to_string()));
        }
        if let Some(empty) = self.stair_blocks.iter().position(|id| id.is_empty()) {
            return Err(ChunkGenError::Options(format!(
                "stair_blocks[{}] is empty",
                empty
            )));
        }
        Ok(())
    }

    /// Chunk coordinates of `origin`.
    pub fn origin_chunk(&self) -> (i32, i32) {
        (chunk_coord(self.origin.0), chunk_coord(self.origin.1))
    }

    /// Path of the region file the origin chunk lives in.
    pub fn region_path(&self) -> PathBuf {
        let (chunk_x, chunk_z) = self.origin_chunk();
        let (region_x, region_z) = region_coords(chunk_x, chunk_z);
        self.output_dir.join(region_file_name(region_x, region_z))
    }
}
