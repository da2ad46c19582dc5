//! Palette index packing for section storage.
//!
//! Entries are fixed-width bit fields laid into 64-bit words, slot 0 in the
//! least significant bits. A field never spans two words: each word holds
//! `floor(64 / width)` entries and any leftover high bits stay zero.

use crate::error::{ChunkGenError, Result};

pub const WORD_BITS: u32 = 64;

/// Block-state storage never uses fewer than 4 bits per entry.
pub const MIN_BITS_PER_ENTRY: u32 = 4;

/// Bits per entry for a block-state palette of `palette_size` entries.
///
/// `max(4, ceil(log2(palette_size)))`.
pub fn bits_per_entry(palette_size: usize) -> Result<u32> {
    if palette_size == 0 {
        return Err(ChunkGenError::EmptyPalette);
    }
    let needed = usize::BITS - (palette_size - 1).leading_zeros();
    let width = needed.max(MIN_BITS_PER_ENTRY);
    if width > WORD_BITS {
        return Err(ChunkGenError::WidthOverflow {
            width,
            palette_size,
        });
    }
    Ok(width)
}

/// Geometry of a packed array: entry width and how many entries fit a word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitLayout {
    width: u32,
    slots_per_word: usize,
}

impl BitLayout {
    /// Layout for block-state indices into a palette of `palette_size`.
    pub fn for_palette(palette_size: usize) -> Result<Self> {
        let width = bits_per_entry(palette_size)?;
        Ok(Self::from_valid_width(width))
    }

    /// Layout with an explicit entry width (heightmaps use 9 bits).
    pub fn with_width(width: u32) -> Result<Self> {
        if width == 0 || width > WORD_BITS {
            return Err(ChunkGenError::WidthOverflow {
                width,
                palette_size: 0,
            });
        }
        Ok(Self::from_valid_width(width))
    }

    fn from_valid_width(width: u32) -> Self {
        BitLayout {
            width,
            slots_per_word: (WORD_BITS / width) as usize,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn slots_per_word(&self) -> usize {
        self.slots_per_word
    }

    pub fn mask(&self) -> u64 {
        if self.width == WORD_BITS {
            u64::MAX
        } else {
            (1u64 << self.width) - 1
        }
    }

    /// Number of words needed for `len` entries.
    pub fn word_count(&self, len: usize) -> usize {
        len.div_ceil(self.slots_per_word)
    }

    /// Word index and bit offset of the entry at `position`.
    pub fn locate(&self, position: usize) -> (usize, u32) {
        let word = position / self.slots_per_word;
        let slot = (position % self.slots_per_word) as u32;
        (word, slot * self.width)
    }

    /// Write `value` into the field at `position`, leaving every other field
    /// of the word untouched.
    pub fn store(&self, words: &mut [i64], position: usize, value: u64) {
        let (word, shift) = self.locate(position);
        let field = self.mask() << shift;
        let current = words[word] as u64;
        words[word] = ((current & !field) | ((value << shift) & field)) as i64;
    }

    pub fn load(&self, words: &[i64], position: usize) -> u64 {
        let (word, shift) = self.locate(position);
        ((words[word] as u64) >> shift) & self.mask()
    }

    /// Pack raw values, truncating each to the field width.
    pub fn pack(&self, values: &[u16]) -> Vec<i64> {
        let mut words = vec![0i64; self.word_count(values.len())];
        for (position, &value) in values.iter().enumerate() {
            self.store(&mut words, position, value as u64);
        }
        words
    }
}

/// Pack palette indices, one entry per cell, in cell order.
///
/// Stored values are the palette indices themselves. Palette slot 0 is the
/// all-zero field, so cells never written decode as slot 0.
pub fn pack_indices(indices: &[u16], palette_size: usize) -> Result<Vec<i64>> {
    let layout = BitLayout::for_palette(palette_size)?;
    if let Some((position, &index)) = indices
        .iter()
        .enumerate()
        .find(|(_, &index)| index as usize >= palette_size)
    {
        return Err(ChunkGenError::IndexOutOfPalette {
            index,
            position,
            palette_size,
        });
    }
    Ok(layout.pack(indices))
}

/// Inverse of [`pack_indices`]: read back `len` indices.
pub fn unpack_indices(words: &[i64], palette_size: usize, len: usize) -> Result<Vec<u16>> {
    let layout = BitLayout::for_palette(palette_size)?;
    let expected = layout.word_count(len);
    if words.len() < expected {
        return Err(ChunkGenError::TruncatedIndexArray {
            expected,
            found: words.len(),
        });
    }
    Ok((0..len)
        .map(|position| layout.load(words, position) as u16)
        .collect())
}
