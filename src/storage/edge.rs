//! Append-only edge arena.
//!
//! Fixed-width records at byte offset `edge_id * record_len`:
//!
//! ```text
//! +---------+----------+---------+----------+-------+-------+---------+
//! | v1.tile | v1.local | v2.tile | v2.local | prev1 | prev2 | payload |
//! | 4       | 4        | 4       | 4        | 4     | 4     | n       |
//! +---------+----------+---------+----------+-------+-------+---------+
//! ```
//!
//! All integers little-endian. Each record is a member of two intrusive
//! linked lists, one per endpoint: `prev1` chains edges sharing `v1`,
//! `prev2` chains edges sharing `v2`. Prev fields store `edge_id + 1` so 0
//! is the universal end-of-chain sentinel even when edge 0 exists.

use std::convert::TryInto;

use tracing::trace;

use crate::error::{GraphError, Result};
use crate::types::{EdgeId, TileId, VertexId, NO_EDGES};

/// Fixed portion of an edge record, before the inline payload.
pub const EDGE_FIXED_LEN: usize = 24;

/// Growth increment for the arena, in records.
const ARENA_GROWTH_RECORDS: usize = 1024;

/// Decoded fixed portion of an edge record.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct EdgeRecord {
    pub v1: VertexId,
    pub v2: VertexId,
    prev1: u32,
    prev2: u32,
}

impl EdgeRecord {
    /// Previous edge on the `v1` chain, if any.
    #[inline]
    pub fn prev1(&self) -> Option<EdgeId> {
        decode_prev(self.prev1)
    }

    /// Previous edge on the `v2` chain, if any.
    #[inline]
    pub fn prev2(&self) -> Option<EdgeId> {
        decode_prev(self.prev2)
    }
}

#[inline]
fn decode_prev(raw: u32) -> Option<EdgeId> {
    (raw != 0).then(|| EdgeId(raw - 1))
}

#[derive(Debug)]
pub struct EdgeArena {
    data: Vec<u8>,
    edge_data_len: usize,
    next_edge: u32,
}

impl EdgeArena {
    pub fn new(edge_data_len: usize) -> Self {
        Self {
            data: Vec::new(),
            edge_data_len,
            next_edge: 0,
        }
    }

    pub(crate) fn from_parts(data: Vec<u8>, edge_data_len: usize, next_edge: u32) -> Self {
        Self {
            data,
            edge_data_len,
            next_edge,
        }
    }

    /// Total record width including the inline payload.
    #[inline]
    pub fn record_len(&self) -> usize {
        EDGE_FIXED_LEN + self.edge_data_len
    }

    #[inline]
    pub fn edge_data_len(&self) -> usize {
        self.edge_data_len
    }

    /// Number of appended edges; the next edge id.
    #[inline]
    pub fn edge_count(&self) -> u32 {
        self.next_edge
    }

    /// Appends a record and returns its id.
    ///
    /// `head1`/`head2` are the endpoints' current first-edge pointers, as
    /// read from the vertex store (`NO_EDGES` when the chain is empty).
    pub fn append(
        &mut self,
        v1: VertexId,
        v2: VertexId,
        head1: u32,
        head2: u32,
        payload: Option<&[u8]>,
    ) -> Result<EdgeId> {
        let id = self.next_edge;
        if id >= NO_EDGES {
            return Err(GraphError::CapacityExceeded("edge id space exhausted"));
        }
        if let Some(payload) = payload {
            if payload.len() > self.edge_data_len {
                return Err(GraphError::CapacityExceeded(
                    "payload exceeds the configured edge data size",
                ));
            }
        }

        let record_len = self.record_len();
        let offset = id as usize * record_len;
        self.ensure_len(offset + record_len);

        let record = &mut self.data[offset..offset + record_len];
        record[0..4].copy_from_slice(&v1.tile.0.to_le_bytes());
        record[4..8].copy_from_slice(&v1.local.to_le_bytes());
        record[8..12].copy_from_slice(&v2.tile.0.to_le_bytes());
        record[12..16].copy_from_slice(&v2.local.to_le_bytes());
        record[16..20].copy_from_slice(&encode_prev(head1).to_le_bytes());
        record[20..24].copy_from_slice(&encode_prev(head2).to_le_bytes());

        let data = &mut record[EDGE_FIXED_LEN..];
        data.fill(0xFF);
        if let Some(payload) = payload {
            data[..payload.len()].copy_from_slice(payload);
        }

        self.next_edge = id + 1;
        trace!(edge = id, "edge_arena.append");
        Ok(EdgeId(id))
    }

    /// Decodes the fixed portion of a record; `None` past the high-water mark.
    pub fn record(&self, edge: EdgeId) -> Option<EdgeRecord> {
        if edge.0 >= self.next_edge {
            return None;
        }
        let offset = edge.0 as usize * self.record_len();
        let record = &self.data[offset..offset + EDGE_FIXED_LEN];
        Some(EdgeRecord {
            v1: VertexId {
                tile: TileId(read_u32(record, 0)),
                local: read_u32(record, 4),
            },
            v2: VertexId {
                tile: TileId(read_u32(record, 8)),
                local: read_u32(record, 12),
            },
            prev1: read_u32(record, 16),
            prev2: read_u32(record, 20),
        })
    }

    /// The inline payload of a record; `None` past the high-water mark.
    pub fn payload(&self, edge: EdgeId) -> Option<&[u8]> {
        if edge.0 >= self.next_edge {
            return None;
        }
        let offset = edge.0 as usize * self.record_len() + EDGE_FIXED_LEN;
        Some(&self.data[offset..offset + self.edge_data_len])
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.data[..self.next_edge as usize * self.record_len()]
    }

    fn ensure_len(&mut self, len: usize) {
        if self.data.len() < len {
            let chunk = ARENA_GROWTH_RECORDS * self.record_len();
            let rounded = len.div_ceil(chunk) * chunk;
            self.data.resize(rounded, 0xFF);
        }
    }
}

#[inline]
fn encode_prev(head: u32) -> u32 {
    if head == NO_EDGES {
        0
    } else {
        head + 1
    }
}

#[inline]
fn read_u32(src: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(
        src[offset..offset + 4]
            .try_into()
            .expect("slice is 4 bytes"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(tile: u32, local: u32) -> VertexId {
        VertexId::new(TileId(tile), local)
    }

    #[test]
    fn append_assigns_dense_ids() {
        let mut arena = EdgeArena::new(0);
        let a = arena.append(vertex(1, 0), vertex(1, 1), NO_EDGES, NO_EDGES, None);
        let b = arena.append(vertex(1, 1), vertex(2, 0), NO_EDGES, NO_EDGES, None);
        assert_eq!(a.unwrap(), EdgeId(0));
        assert_eq!(b.unwrap(), EdgeId(1));
        assert_eq!(arena.edge_count(), 2);
    }

    #[test]
    fn record_round_trips_endpoints() {
        let mut arena = EdgeArena::new(0);
        let id = arena
            .append(vertex(7, 3), vertex(9, 1), NO_EDGES, NO_EDGES, None)
            .unwrap();
        let record = arena.record(id).unwrap();
        assert_eq!(record.v1, vertex(7, 3));
        assert_eq!(record.v2, vertex(9, 1));
        assert_eq!(record.prev1(), None);
        assert_eq!(record.prev2(), None);
    }

    #[test]
    fn prev_pointers_are_offset_by_one() {
        let mut arena = EdgeArena::new(0);
        let first = arena
            .append(vertex(1, 0), vertex(1, 1), NO_EDGES, NO_EDGES, None)
            .unwrap();
        let second = arena
            .append(vertex(1, 0), vertex(1, 2), first.0, NO_EDGES, None)
            .unwrap();
        let record = arena.record(second).unwrap();
        assert_eq!(record.prev1(), Some(first));
        assert_eq!(record.prev2(), None);
        // raw field stores id + 1 so edge 0 is distinguishable from "none"
        assert_eq!(arena.bytes()[arena.record_len() + 16], 1);
    }

    #[test]
    fn payload_is_padded_with_ff() {
        let mut arena = EdgeArena::new(4);
        let id = arena
            .append(
                vertex(1, 0),
                vertex(1, 1),
                NO_EDGES,
                NO_EDGES,
                Some(&[0xAB, 0xCD]),
            )
            .unwrap();
        assert_eq!(arena.payload(id).unwrap(), &[0xAB, 0xCD, 0xFF, 0xFF]);
    }

    #[test]
    fn absent_payload_is_all_ff() {
        let mut arena = EdgeArena::new(3);
        let id = arena
            .append(vertex(1, 0), vertex(1, 1), NO_EDGES, NO_EDGES, None)
            .unwrap();
        assert_eq!(arena.payload(id).unwrap(), &[0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let mut arena = EdgeArena::new(2);
        let result = arena.append(
            vertex(1, 0),
            vertex(1, 1),
            NO_EDGES,
            NO_EDGES,
            Some(&[1, 2, 3]),
        );
        assert!(matches!(result, Err(GraphError::CapacityExceeded(_))));
        assert_eq!(arena.edge_count(), 0);
    }

    #[test]
    fn record_past_high_water_is_none() {
        let arena = EdgeArena::new(0);
        assert_eq!(arena.record(EdgeId(0)), None);
        assert_eq!(arena.payload(EdgeId(0)), None);
    }
}
