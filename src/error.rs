/// Error type for chunk generation.
///
/// Every variant is fatal for the chunk being built: the tree is dropped and
/// never reaches the container writer.
#[derive(Debug, thiserror::Error)]
pub enum ChunkGenError {
    #[error("palette must hold at least one entry")]
    EmptyPalette,
    #[error("{width}-bit entries for a palette of {palette_size} do not fit a 64-bit word")]
    WidthOverflow { width: u32, palette_size: usize },
    #[error("index {index} at position {position} is outside a palette of {palette_size}")]
    IndexOutOfPalette {
        index: u16,
        position: usize,
        palette_size: usize,
    },
    #[error("packed array holds {found} words, {expected} needed")]
    TruncatedIndexArray { expected: usize, found: usize },
    #[error("palette would grow past {limit} entries")]
    PaletteOverflow { limit: usize },
    #[error("cell ({x}, {y}, {z}) lies outside the 16x16x16 section")]
    CellOutOfBounds { x: u8, y: u8, z: u8 },
    #[error("section {0} is outside the chunk range -4..=19")]
    SectionOutOfRange(i32),
    #[error("{requested} placements exceed the {capacity}-cell capacity of a section")]
    SectionCapacity { requested: usize, capacity: usize },
    #[error("placement stride {0} must be a non-zero divisor of 16")]
    InvalidStride(u8),
    #[error("chunk at container slot ({container_x}, {container_z}) needs {sectors} sectors, at most 255 fit")]
    ChunkTooLarge {
        container_x: u8,
        container_z: u8,
        sectors: usize,
    },
    #[error("region data reaches sector {sector}, past the 24-bit offset limit")]
    RegionTooLarge { sector: usize },
    #[error("invalid options: {0}")]
    Options(String),
    #[error("NBT error: {0}")]
    Nbt(#[from] quartz_nbt::io::NbtIoError),
    #[error("options file error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ChunkGenError>;
