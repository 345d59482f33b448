//! Sparse tile-indirection index.
//!
//! Maps a tile id to the base of that tile's vertex slot range and the
//! range's capacity. Records are 5 bytes at virtual offset `tile_id * 5`:
//!
//! ```text
//! +------------+--------------+
//! | base       | capacity_exp |
//! | 4 bytes LE | 1 byte       |
//! +------------+--------------+
//! ```
//!
//! Five 0xFF bytes mark an absent tile. Tile ids at common zoom levels run
//! into the hundreds of millions, so the backing store is a sparse page map:
//! 1024-byte pages allocated on first write, absent pages reading as 0xFF.
//! Records may straddle a page boundary.
//!
//! Capacity is `1 << capacity_exp` and only ever doubles; each doubling
//! relocates the tile's range to a fresh region at the slot high-water mark
//! and abandons the old one.

use std::collections::BTreeMap;
use std::convert::TryInto;

use tracing::{debug, trace};

use crate::error::{GraphError, Result};
use crate::types::{TileId, NO_EDGES};

/// Size of an encoded tile record in bytes.
pub const TILE_RECORD_LEN: usize = 5;

/// Size of a backing page in bytes.
pub const INDEX_PAGE_LEN: usize = 1024;

/// A tile's allocated vertex slot range.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TileSlot {
    /// First slot of the range in the global vertex address space.
    pub base: u32,
    /// Capacity exponent; the range holds `1 << capacity_exp` slots.
    pub capacity_exp: u8,
}

impl TileSlot {
    #[inline]
    pub const fn capacity(&self) -> u32 {
        1 << self.capacity_exp
    }
}

/// Sparse mapping from tile id to [`TileSlot`], plus the vertex slot
/// allocator's high-water mark.
#[derive(Debug)]
pub struct TileIndex {
    pages: BTreeMap<u64, Box<[u8; INDEX_PAGE_LEN]>>,
    slot_high: u32,
}

impl TileIndex {
    pub fn new() -> Self {
        Self {
            pages: BTreeMap::new(),
            slot_high: 0,
        }
    }

    pub(crate) fn from_parts(
        pages: BTreeMap<u64, Box<[u8; INDEX_PAGE_LEN]>>,
        slot_high: u32,
    ) -> Self {
        Self { pages, slot_high }
    }

    /// Looks up a tile's slot range; `None` when the tile was never added.
    pub fn find(&self, tile: TileId) -> Option<TileSlot> {
        let record = self.read_record(tile);
        if record.iter().all(|&b| b == 0xFF) {
            return None;
        }
        Some(decode_record(&record))
    }

    /// Allocates a single-slot range for a new tile.
    pub fn add(&mut self, tile: TileId) -> Result<TileSlot> {
        let base = self.slot_high;
        self.slot_high = checked_advance(base, 1)?;
        let slot = TileSlot {
            base,
            capacity_exp: 0,
        };
        self.write_record(tile, slot);
        trace!(tile = tile.0, base, "tile_index.add");
        Ok(slot)
    }

    /// Doubles a tile's capacity by relocating it to a fresh range.
    ///
    /// The old range is abandoned; the caller copies the slot contents over.
    pub fn grow(&mut self, tile: TileId, old: TileSlot) -> Result<TileSlot> {
        if old.capacity_exp >= 31 {
            return Err(GraphError::CapacityExceeded(
                "tile capacity exponent exceeds pointer width",
            ));
        }
        let new = TileSlot {
            base: self.slot_high,
            capacity_exp: old.capacity_exp + 1,
        };
        self.slot_high = checked_advance(self.slot_high, new.capacity())?;
        self.write_record(tile, new);
        debug!(
            tile = tile.0,
            old_base = old.base,
            new_base = new.base,
            capacity = new.capacity(),
            "tile_index.grow"
        );
        Ok(new)
    }

    /// High-water mark of allocated vertex slots; never decreases.
    #[inline]
    pub fn slot_high_water(&self) -> u32 {
        self.slot_high
    }

    /// Number of tiles present in the index.
    pub fn tile_count(&self) -> u64 {
        self.iter().count() as u64
    }

    /// All present tiles in tile-id order.
    ///
    /// Only scans record ranges whose starting byte falls in an allocated
    /// page; records in absent pages read as 0xFF and cannot be present.
    pub fn iter(&self) -> impl Iterator<Item = (TileId, TileSlot)> + '_ {
        self.pages
            .keys()
            .flat_map(|&page| {
                let start = (page * INDEX_PAGE_LEN as u64).div_ceil(TILE_RECORD_LEN as u64);
                let end = ((page + 1) * INDEX_PAGE_LEN as u64).div_ceil(TILE_RECORD_LEN as u64);
                start..end
            })
            .filter_map(move |id| {
                let tile = TileId(id as u32);
                self.find(tile).map(|slot| (tile, slot))
            })
    }

    pub(crate) fn pages(&self) -> impl Iterator<Item = (u64, &[u8; INDEX_PAGE_LEN])> {
        self.pages.iter().map(|(&index, page)| (index, &**page))
    }

    pub(crate) fn page_count(&self) -> u64 {
        self.pages.len() as u64
    }

    fn read_record(&self, tile: TileId) -> [u8; TILE_RECORD_LEN] {
        let offset = tile.0 as usize * TILE_RECORD_LEN;
        let mut record = [0xFF; TILE_RECORD_LEN];
        for (i, byte) in record.iter_mut().enumerate() {
            let at = offset + i;
            if let Some(page) = self.pages.get(&((at / INDEX_PAGE_LEN) as u64)) {
                *byte = page[at % INDEX_PAGE_LEN];
            }
        }
        record
    }

    fn write_record(&mut self, tile: TileId, slot: TileSlot) {
        let mut record = [0u8; TILE_RECORD_LEN];
        record[..4].copy_from_slice(&slot.base.to_le_bytes());
        record[4] = slot.capacity_exp;
        let offset = tile.0 as usize * TILE_RECORD_LEN;
        for (i, &byte) in record.iter().enumerate() {
            let at = offset + i;
            let page = self
                .pages
                .entry((at / INDEX_PAGE_LEN) as u64)
                .or_insert_with(|| Box::new([0xFF; INDEX_PAGE_LEN]));
            page[at % INDEX_PAGE_LEN] = byte;
        }
    }
}

impl Default for TileIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_record(record: &[u8; TILE_RECORD_LEN]) -> TileSlot {
    TileSlot {
        base: u32::from_le_bytes(record[..4].try_into().expect("slice is 4 bytes")),
        capacity_exp: record[4],
    }
}

fn checked_advance(high: u32, span: u32) -> Result<u32> {
    high.checked_add(span)
        .filter(|&next| next < NO_EDGES)
        .ok_or(GraphError::CapacityExceeded("vertex slot space exhausted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_tile_is_none() {
        let index = TileIndex::new();
        assert_eq!(index.find(TileId(0)), None);
        assert_eq!(index.find(TileId(123_456_789)), None);
    }

    #[test]
    fn add_then_find() {
        let mut index = TileIndex::new();
        let slot = index.add(TileId(42)).unwrap();
        assert_eq!(slot.base, 0);
        assert_eq!(slot.capacity(), 1);
        assert_eq!(index.find(TileId(42)), Some(slot));
        assert_eq!(index.find(TileId(41)), None);
        assert_eq!(index.slot_high_water(), 1);
    }

    #[test]
    fn adds_allocate_consecutive_bases() {
        let mut index = TileIndex::new();
        let a = index.add(TileId(1)).unwrap();
        let b = index.add(TileId(9)).unwrap();
        assert_eq!(a.base, 0);
        assert_eq!(b.base, 1);
        assert_eq!(index.slot_high_water(), 2);
    }

    #[test]
    fn grow_doubles_capacity_at_fresh_base() {
        let mut index = TileIndex::new();
        let slot = index.add(TileId(7)).unwrap();
        let grown = index.grow(TileId(7), slot).unwrap();
        assert_eq!(grown.capacity(), 2);
        assert_eq!(grown.base, 1);
        assert_eq!(index.slot_high_water(), 3);
        assert_eq!(index.find(TileId(7)), Some(grown));

        let again = index.grow(TileId(7), grown).unwrap();
        assert_eq!(again.capacity(), 4);
        assert_eq!(again.base, 3);
        assert_eq!(index.slot_high_water(), 7);
    }

    #[test]
    fn pages_allocate_on_demand() {
        let mut index = TileIndex::new();
        index.add(TileId(0)).unwrap();
        assert_eq!(index.page_count(), 1);
        // far-away tile ids only materialise their own page
        index.add(TileId(100_000_000)).unwrap();
        assert_eq!(index.page_count(), 2);
    }

    #[test]
    fn record_straddling_a_page_boundary() {
        let mut index = TileIndex::new();
        // record for tile 204 spans bytes 1020..1025, crossing page 0 into 1
        let slot = index.add(TileId(204)).unwrap();
        assert_eq!(index.page_count(), 2);
        assert_eq!(index.find(TileId(204)), Some(slot));
        assert_eq!(index.find(TileId(203)), None);
        assert_eq!(index.find(TileId(205)), None);
    }

    #[test]
    fn iter_yields_tiles_in_id_order() {
        let mut index = TileIndex::new();
        index.add(TileId(9)).unwrap();
        index.add(TileId(2)).unwrap();
        let tiles: Vec<u32> = index.iter().map(|(id, _)| id.0).collect();
        assert_eq!(tiles, vec![2, 9]);
        assert_eq!(index.tile_count(), 2);
    }

    #[test]
    fn grow_rejects_exponent_overflow() {
        let mut index = TileIndex::new();
        let slot = TileSlot {
            base: 0,
            capacity_exp: 31,
        };
        assert!(matches!(
            index.grow(TileId(0), slot),
            Err(GraphError::CapacityExceeded(_))
        ));
    }
}
