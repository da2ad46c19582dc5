//! Deterministic generator of Anvil chunk fixtures.
//!
//! Chunks are assembled as typed [`Chunk`]/[`Section`] values, lowered to
//! NBT trees, and handed to a [`ContainerWriter`] keyed by the chunk's slot in
//! its 32x32 region grid.

pub mod block_state;
pub mod chunk;
pub mod error;
pub mod options;
pub mod packing;
pub mod region;
pub mod scenario;
pub mod section;

pub use block_state::BlockState;
pub use chunk::{Chunk, ChunkFormat};
pub use error::{ChunkGenError, Result};
pub use options::GeneratorOptions;
pub use packing::{bits_per_entry, pack_indices, unpack_indices, BitLayout};
pub use region::{container_coords, ContainerWriter, RegionBuffer};
pub use scenario::{RunSummary, ScenarioComposer};
pub use section::{build_section, CellPos, PaletteStrategy, Placement, Section, SparseGrid};
