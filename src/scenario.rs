//! The fixture scenario: which chunks get built and what goes in them.
//!
//! Around the origin chunk the composer lays out
//!
//! - a ring of 14 empty boundary chunks, the perimeter of the 4x5 chunk
//!   rectangle `dx in -1..=2`, `dz in -2..=2`;
//! - the stair chunk at the origin, enumerating every facing, half, corner
//!   shape and waterlogged state of every configured stair block;
//! - the misc chunk at `dx = 1`, holding one configured block.
//!
//! Stair states fill the sparse grid of the first stair section and spill
//! into the sections above it, `capacity` states per section.

use crate::block_state::BlockState;
use crate::chunk::{Chunk, MAX_SECTION_Y};
use crate::error::{ChunkGenError, Result};
use crate::options::GeneratorOptions;
use crate::region::{container_coords, ContainerWriter};
use crate::section::{CellPos, Placement, SparseGrid};
use tracing::{debug, info};

/// Materials with a vanilla `<material>_stairs` block.
pub const VANILLA_STAIRS: &[&str] = &[
    "oak",
    "spruce",
    "birch",
    "jungle",
    "acacia",
    "cherry",
    "dark_oak",
    "mangrove",
    "bamboo",
    "bamboo_mosaic",
    "crimson",
    "warped",
    "stone",
    "cobblestone",
    "mossy_cobblestone",
    "stone_brick",
    "mossy_stone_brick",
    "granite",
    "polished_granite",
    "diorite",
    "polished_diorite",
    "andesite",
    "polished_andesite",
    "cobbled_deepslate",
    "polished_deepslate",
    "deepslate_brick",
    "deepslate_tile",
    "brick",
    "mud_brick",
    "sandstone",
    "smooth_sandstone",
    "red_sandstone",
    "smooth_red_sandstone",
    "nether_brick",
    "red_nether_brick",
    "quartz",
    "smooth_quartz",
    "purpur",
    "prismarine",
    "prismarine_brick",
    "dark_prismarine",
    "end_stone_brick",
    "blackstone",
    "polished_blackstone",
    "polished_blackstone_brick",
    "cut_copper",
    "exposed_cut_copper",
    "weathered_cut_copper",
    "oxidized_cut_copper",
    "waxed_cut_copper",
    "waxed_exposed_cut_copper",
    "waxed_weathered_cut_copper",
    "waxed_oxidized_cut_copper",
];

pub const FACINGS: [&str; 4] = ["north", "south", "west", "east"];
pub const HALVES: [&str; 2] = ["top", "bottom"];
pub const CORNER_SHAPES: [&str; 4] = ["inner_left", "inner_right", "outer_left", "outer_right"];
pub const WATERLOGGED: [&str; 2] = ["true", "false"];

pub const STATES_PER_STAIR: usize =
    FACINGS.len() * HALVES.len() * CORNER_SHAPES.len() * WATERLOGGED.len();

const RING_DX: (i32, i32) = (-1, 2);
const RING_DZ: (i32, i32) = (-2, 2);
const MISC_OFFSET: (i32, i32) = (1, 0);

/// Every stair state, identifier outermost and waterlogged innermost.
pub fn stair_permutations<S: AsRef<str>>(ids: &[S]) -> Vec<BlockState> {
    let mut states = Vec::with_capacity(ids.len() * STATES_PER_STAIR);
    for id in ids {
        for facing in FACINGS {
            for half in HALVES {
                for shape in CORNER_SHAPES {
                    for waterlogged in WATERLOGGED {
                        states.push(
                            BlockState::new(id.as_ref())
                                .with_property("facing", facing)
                                .with_property("half", half)
                                .with_property("shape", shape)
                                .with_property("waterlogged", waterlogged),
                        );
                    }
                }
            }
        }
    }
    states
}

/// `(dx, dz)` offsets of the boundary ring, row by row.
pub fn boundary_ring() -> Vec<(i32, i32)> {
    let mut ring = Vec::new();
    for dz in RING_DZ.0..=RING_DZ.1 {
        for dx in RING_DX.0..=RING_DX.1 {
            let edge = dx == RING_DX.0 || dx == RING_DX.1 || dz == RING_DZ.0 || dz == RING_DZ.1;
            if edge {
                ring.push((dx, dz));
            }
        }
    }
    ring
}

/// Sections needed to hold `count` blocks at `capacity` per section.
pub fn sections_needed(count: usize, capacity: usize) -> usize {
    count.div_ceil(capacity)
}

/// Spread `blocks` over consecutive sections from `base_y` upward: block `k`
/// goes to section `base_y + k / capacity` at placement ordinal
/// `k % capacity`.
///
/// The whole span is range-checked before any section is touched.
pub fn place_split<P: Placement + ?Sized>(
    chunk: &mut Chunk,
    base_y: i32,
    blocks: &[BlockState],
    placement: &P,
) -> Result<()> {
    let capacity = placement.capacity();
    let needed = sections_needed(blocks.len(), capacity);
    if needed > 0 {
        chunk.section(base_y)?;
        let top = base_y + needed as i32 - 1;
        if top > MAX_SECTION_Y as i32 {
            return Err(ChunkGenError::SectionOutOfRange(top));
        }
    }
    for (offset, group) in blocks.chunks(capacity).enumerate() {
        chunk
            .section_mut(base_y + offset as i32)?
            .fill(group, placement)?;
    }
    Ok(())
}

// ─── Composer ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkRole {
    Boundary,
    Stairs,
    Misc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkJob {
    pub role: ChunkRole,
    pub chunk_x: i32,
    pub chunk_z: i32,
}

/// What a run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub chunks_written: usize,
    pub stair_states: usize,
    /// `(section Y, placed blocks)` for each stair section.
    pub stair_sections: Vec<(i8, usize)>,
}

pub struct ScenarioComposer {
    options: GeneratorOptions,
    grid: SparseGrid,
    stairs: Vec<BlockState>,
}

impl ScenarioComposer {
    /// Validates options and sizes the stair universe against the sections
    /// above `stair_section`.
    pub fn new(options: GeneratorOptions) -> Result<Self> {
        options.validate()?;
        let grid = SparseGrid::new(options.stride)?;
        let stairs = stair_permutations(&options.stair_blocks);

        let needed = sections_needed(stairs.len(), grid.capacity());
        let top = options.stair_section as i32 + needed as i32 - 1;
        if needed > 0 && top > MAX_SECTION_Y as i32 {
            return Err(ChunkGenError::SectionOutOfRange(top));
        }

        Ok(ScenarioComposer {
            options,
            grid,
            stairs,
        })
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    pub fn stair_states(&self) -> &[BlockState] {
        &self.stairs
    }

    /// Chunks in build order: the ring, then the stair chunk, then the misc
    /// chunk.
    pub fn plan(&self) -> Vec<ChunkJob> {
        let (origin_x, origin_z) = self.options.origin_chunk();
        let job = |role, (dx, dz): (i32, i32)| ChunkJob {
            role,
            chunk_x: origin_x + dx,
            chunk_z: origin_z + dz,
        };

        let mut jobs: Vec<ChunkJob> = boundary_ring()
            .into_iter()
            .map(|offset| job(ChunkRole::Boundary, offset))
            .collect();
        jobs.push(job(ChunkRole::Stairs, (0, 0)));
        jobs.push(job(ChunkRole::Misc, MISC_OFFSET));
        jobs
    }

    pub fn build(&self, job: &ChunkJob) -> Result<Chunk> {
        let mut chunk = Chunk::new(job.chunk_x, job.chunk_z, &self.options.format);
        let base_y = self.options.stair_section as i32;
        match job.role {
            ChunkRole::Boundary => {}
            ChunkRole::Stairs => place_split(&mut chunk, base_y, &self.stairs, &self.grid)?,
            ChunkRole::Misc => {
                chunk
                    .section_mut(base_y)?
                    .place(CellPos::new(0, 0, 0)?, self.options.misc_block.clone())?;
            }
        }
        Ok(chunk)
    }

    /// Build every planned chunk and hand each finished tree to `writer`.
    ///
    /// A chunk that fails to build or serialize aborts the run before it
    /// reaches the writer.
    pub fn run<W: ContainerWriter + ?Sized>(&self, writer: &mut W) -> Result<RunSummary> {
        let mut summary = RunSummary {
            stair_states: self.stairs.len(),
            ..RunSummary::default()
        };

        for job in self.plan() {
            let chunk = self.build(&job)?;
            let tree = chunk.to_nbt()?;
            let (container_x, container_z) = container_coords(job.chunk_x, job.chunk_z);
            writer.write(container_x, container_z, &tree)?;

            if job.role == ChunkRole::Stairs {
                summary.stair_sections = chunk
                    .sections()
                    .iter()
                    .filter(|section| section.placed() > 0)
                    .map(|section| (section.y(), section.placed()))
                    .collect();
            }
            summary.chunks_written += 1;
            debug!(
                role = ?job.role,
                chunk_x = job.chunk_x,
                chunk_z = job.chunk_z,
                container_x,
                container_z,
                "wrote chunk"
            );
        }

        info!(
            chunks = summary.chunks_written,
            stair_states = summary.stair_states,
            stair_sections = summary.stair_sections.len(),
            "scenario complete"
        );
        Ok(summary)
    }
}
