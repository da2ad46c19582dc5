//! Region container: coordinate mapping and the sector writer.

use crate::error::{ChunkGenError, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use quartz_nbt::io::Flavor;
use quartz_nbt::NbtCompound;
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use tracing::{debug, warn};

pub const REGION_SPAN: i32 = 32;
pub const SECTOR_BYTES: usize = 4096;
const SLOTS: usize = 1024;
const HEADER_BYTES: usize = 2 * SECTOR_BYTES;
const COMPRESSION_ZLIB: u8 = 2;
const MAX_CHUNK_SECTORS: usize = 0xFF;
const MAX_SECTOR_OFFSET: usize = 0xFF_FFFF;

// ─── Coordinates ────────────────────────────────────────────────────────────

/// Floor division: rounds toward negative infinity.
pub fn floor_div(a: i32, b: i32) -> i32 {
    let d = a / b;
    let r = a % b;
    if (r != 0) && ((r ^ b) < 0) {
        d - 1
    } else {
        d
    }
}

/// Floor modulo: result has the sign of `b`.
pub fn floor_mod(a: i32, b: i32) -> i32 {
    ((a % b) + b) % b
}

/// World block coordinate to chunk coordinate.
pub fn chunk_coord(world: i32) -> i32 {
    floor_div(world, 16)
}

/// Chunk coordinates to the chunk's slot in its 32x32 container grid.
pub fn container_coords(chunk_x: i32, chunk_z: i32) -> (u8, u8) {
    (
        floor_mod(chunk_x, REGION_SPAN) as u8,
        floor_mod(chunk_z, REGION_SPAN) as u8,
    )
}

/// Chunk coordinates to the region file holding them.
pub fn region_coords(chunk_x: i32, chunk_z: i32) -> (i32, i32) {
    (floor_div(chunk_x, REGION_SPAN), floor_div(chunk_z, REGION_SPAN))
}

pub fn region_file_name(region_x: i32, region_z: i32) -> String {
    format!("r.{}.{}.mca", region_x, region_z)
}

fn slot_index(container_x: u8, container_z: u8) -> usize {
    (container_x as usize & 31) + (container_z as usize & 31) * 32
}

// ─── Writer ─────────────────────────────────────────────────────────────────

/// Destination for finished chunk trees.
///
/// Implementations own compression and on-disk layout. Callers only hand
/// over complete trees.
pub trait ContainerWriter {
    fn write(&mut self, container_x: u8, container_z: u8, chunk: &NbtCompound) -> Result<()>;
}

/// Keeps trees as-is, keyed by container slot.
impl ContainerWriter for BTreeMap<(u8, u8), NbtCompound> {
    fn write(&mut self, container_x: u8, container_z: u8, chunk: &NbtCompound) -> Result<()> {
        self.insert((container_x, container_z), chunk.clone());
        Ok(())
    }
}

/// A region file assembled in memory: zlib-compressed chunk payloads in 1024
/// slots, laid out into 4 KiB sectors by [`RegionBuffer::to_bytes`].
#[derive(Debug, Clone)]
pub struct RegionBuffer {
    slots: Vec<Option<Vec<u8>>>,
}

impl Default for RegionBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionBuffer {
    pub fn new() -> Self {
        RegionBuffer {
            slots: vec![None; SLOTS],
        }
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Location table, timestamp table, then each chunk as a 4-byte length,
    /// compression byte and payload, padded to whole sectors.
    ///
    /// Fails when a chunk needs more than 255 sectors or the file would grow
    /// past the 24-bit sector offset, since neither fits a location entry.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut location_table = vec![0u8; SECTOR_BYTES];
        let timestamp_table = vec![0u8; SECTOR_BYTES];
        let mut data_sectors = Vec::new();

        let mut current_sector: usize = 2;

        for (index, compressed) in self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|data| (index, data)))
        {
            let payload_len = compressed.len() + 1;
            let sector_count = (4 + payload_len).div_ceil(SECTOR_BYTES);
            if sector_count > MAX_CHUNK_SECTORS {
                return Err(ChunkGenError::ChunkTooLarge {
                    container_x: (index % 32) as u8,
                    container_z: (index / 32) as u8,
                    sectors: sector_count,
                });
            }
            if current_sector > MAX_SECTOR_OFFSET {
                return Err(ChunkGenError::RegionTooLarge {
                    sector: current_sector,
                });
            }

            let entry = ((current_sector as u32) << 8) | sector_count as u32;
            location_table[index * 4..index * 4 + 4].copy_from_slice(&entry.to_be_bytes());

            let start = data_sectors.len();
            data_sectors.extend_from_slice(&(payload_len as u32).to_be_bytes());
            data_sectors.push(COMPRESSION_ZLIB);
            data_sectors.extend_from_slice(compressed);
            data_sectors.resize(start + sector_count * SECTOR_BYTES, 0);

            current_sector += sector_count;
        }

        let mut result = Vec::with_capacity(HEADER_BYTES + data_sectors.len());
        result.extend_from_slice(&location_table);
        result.extend_from_slice(&timestamp_table);
        result.extend_from_slice(&data_sectors);
        Ok(result)
    }

    /// Write the assembled region file in one go. Nothing is written when
    /// the layout does not fit the format.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, bytes)?;
        debug!(path = %path.display(), chunks = self.len(), "saved region file");
        Ok(())
    }
}

impl ContainerWriter for RegionBuffer {
    fn write(&mut self, container_x: u8, container_z: u8, chunk: &NbtCompound) -> Result<()> {
        let mut nbt_bytes = Vec::new();
        quartz_nbt::io::write_nbt(&mut nbt_bytes, None, chunk, Flavor::Uncompressed)?;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&nbt_bytes)?;
        let compressed = encoder.finish()?;

        let slot = &mut self.slots[slot_index(container_x, container_z)];
        if slot.is_some() {
            warn!(container_x, container_z, "overwriting occupied container slot");
        }
        *slot = Some(compressed);
        Ok(())
    }
}

// ─── Reader ─────────────────────────────────────────────────────────────────

/// Decode the chunk stored at a container slot of a serialized region file.
///
/// Only zlib payloads are understood; that is all [`RegionBuffer`] writes.
pub fn read_chunk(data: &[u8], container_x: u8, container_z: u8) -> Result<Option<NbtCompound>> {
    if data.len() < HEADER_BYTES {
        return Err(malformed("region file shorter than its header"));
    }
    let offset = slot_index(container_x, container_z) * 4;
    let entry = u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ]);
    let sector = (entry >> 8) as usize;
    if sector < 2 || entry & 0xFF == 0 {
        return Ok(None);
    }

    let start = sector * SECTOR_BYTES;
    let header = data
        .get(start..start + 5)
        .ok_or_else(|| malformed("chunk header past end of file"))?;
    let payload_len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
    if header[4] != COMPRESSION_ZLIB {
        return Err(malformed("unsupported chunk compression"));
    }
    let compressed = payload_len
        .checked_sub(1)
        .and_then(|len| data.get(start + 5..start + 5 + len))
        .ok_or_else(|| malformed("chunk payload past end of file"))?;

    let mut decompressed = Vec::new();
    ZlibDecoder::new(compressed).read_to_end(&mut decompressed)?;
    let (nbt, _) = quartz_nbt::io::read_nbt(&mut Cursor::new(&decompressed), Flavor::Uncompressed)?;
    Ok(Some(nbt))
}

fn malformed(reason: &str) -> ChunkGenError {
    ChunkGenError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quartz_nbt::NbtTag;

    fn tagged(x: i32) -> NbtCompound {
        let mut nbt = NbtCompound::new();
        nbt.insert("xPos", NbtTag::Int(x));
        nbt
    }

    #[test]
    fn test_floor_div() {
        assert_eq!(floor_div(7, 32), 0);
        assert_eq!(floor_div(32, 32), 1);
        assert_eq!(floor_div(-1, 32), -1);
        assert_eq!(floor_div(-32, 32), -1);
        assert_eq!(floor_div(-33, 32), -2);
    }

    #[test]
    fn test_floor_mod() {
        assert_eq!(floor_mod(31, 32), 31);
        assert_eq!(floor_mod(32, 32), 0);
        assert_eq!(floor_mod(-1, 32), 31);
        assert_eq!(floor_mod(-32, 32), 0);
    }

    #[test]
    fn test_extreme_coordinate_mapping() {
        assert_eq!(chunk_coord(10_000_000), 625_000);
        assert_eq!(chunk_coord(20_000_000), 1_250_000);
        assert_eq!(container_coords(625_000, 1_250_000), (8, 16));
        assert_eq!(region_coords(625_000, 1_250_000), (19_531, 39_062));
        assert_eq!(chunk_coord(-1), -1);
        assert_eq!(container_coords(-1, -33), (31, 31));
    }

    #[test]
    fn test_region_file_name() {
        assert_eq!(region_file_name(-1, 3), "r.-1.3.mca");
    }

    #[test]
    fn test_empty_region_is_header_only() {
        let region = RegionBuffer::new();
        assert!(region.is_empty());
        let bytes = region.to_bytes().unwrap();
        assert_eq!(bytes.len(), HEADER_BYTES);
        assert!(bytes.iter().all(|&b| b == 0));
        assert!(read_chunk(&bytes, 0, 0).unwrap().is_none());
    }

    #[test]
    fn test_sector_layout() {
        let mut region = RegionBuffer::new();
        region.write(0, 0, &tagged(1)).unwrap();
        let bytes = region.to_bytes().unwrap();

        assert_eq!(bytes.len() % SECTOR_BYTES, 0);
        assert_eq!(&bytes[0..3], &[0u8, 0, 2]);
        assert!(bytes[3] >= 1);
        for slot in 1..SLOTS {
            assert_eq!(&bytes[slot * 4..slot * 4 + 4], &[0u8, 0, 0, 0], "slot {slot}");
        }
        assert_eq!(bytes[HEADER_BYTES + 4], COMPRESSION_ZLIB);
    }

    #[test]
    fn test_roundtrip_by_slot() {
        let mut region = RegionBuffer::new();
        region.write(8, 16, &tagged(625_000)).unwrap();
        region.write(31, 31, &tagged(-1)).unwrap();
        region.write(5, 3, &tagged(5)).unwrap();
        assert_eq!(region.len(), 3);

        let bytes = region.to_bytes().unwrap();
        let chunk = read_chunk(&bytes, 8, 16).unwrap().unwrap();
        assert_eq!(chunk.get::<_, i32>("xPos").unwrap(), 625_000);
        let last = read_chunk(&bytes, 31, 31).unwrap().unwrap();
        assert_eq!(last.get::<_, i32>("xPos").unwrap(), -1);
        assert!(read_chunk(&bytes, 0, 0).unwrap().is_none());
    }

    #[test]
    fn test_overwrite_keeps_latest() {
        let mut region = RegionBuffer::new();
        region.write(1, 1, &tagged(1)).unwrap();
        region.write(1, 1, &tagged(2)).unwrap();
        assert_eq!(region.len(), 1);
        let chunk = read_chunk(&region.to_bytes().unwrap(), 1, 1).unwrap().unwrap();
        assert_eq!(chunk.get::<_, i32>("xPos").unwrap(), 2);
    }

    #[test]
    fn test_truncated_file_rejected() {
        assert!(read_chunk(&[0u8; 100], 0, 0).is_err());

        let mut region = RegionBuffer::new();
        region.write(0, 0, &tagged(1)).unwrap();
        let bytes = region.to_bytes().unwrap();
        assert!(read_chunk(&bytes[..HEADER_BYTES + 3], 0, 0).is_err());
    }

    /// Deterministic bytes that zlib cannot shrink.
    fn noise(len: usize, seed: u64) -> Vec<i8> {
        let mut state = seed;
        (0..len)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                (state >> 56) as i8
            })
            .collect()
    }

    #[test]
    fn test_oversized_chunk_rejected() {
        let mut big = NbtCompound::new();
        big.insert("Data", NbtTag::ByteArray(noise(1_200_000, 7)));

        let mut region = RegionBuffer::new();
        region.write(0, 0, &tagged(1)).unwrap();
        region.write(1, 0, &big).unwrap();
        region.write(2, 0, &tagged(3)).unwrap();

        match region.to_bytes() {
            Err(ChunkGenError::ChunkTooLarge {
                container_x: 1,
                container_z: 0,
                sectors,
            }) => assert!(sectors > 255),
            other => panic!("expected ChunkTooLarge, got {:?}", other.map(|b| b.len())),
        }

        let dir = std::env::temp_dir().join("chunkforge_oversized_region");
        let path = dir.join("r.0.0.mca");
        let _ = std::fs::remove_file(&path);
        assert!(region.save(&path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_largest_chunk_that_fits() {
        let mut region = RegionBuffer::new();
        region.write(0, 0, &tagged(1)).unwrap();
        let mut big = NbtCompound::new();
        big.insert("Data", NbtTag::ByteArray(noise(900_000, 11)));
        region.write(1, 0, &big).unwrap();

        let bytes = region.to_bytes().unwrap();
        assert_eq!(&bytes[0..3], &[0u8, 0, 2]);
        let sectors = bytes[7] as usize;
        assert!(sectors > 200);
        assert_eq!(bytes.len(), HEADER_BYTES + (bytes[3] as usize + sectors) * SECTOR_BYTES);
        let read = read_chunk(&bytes, 1, 0).unwrap().unwrap();
        assert_eq!(read.get::<_, &[i8]>("Data").unwrap().len(), 900_000);
    }

    #[test]
    fn test_map_writer_keeps_trees() {
        let mut map: BTreeMap<(u8, u8), NbtCompound> = BTreeMap::new();
        map.write(8, 16, &tagged(7)).unwrap();
        assert_eq!(map[&(8, 16)].get::<_, i32>("xPos").unwrap(), 7);
    }
}
