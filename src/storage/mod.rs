//! Byte-arena storage primitives backing the graph.
//!
//! All cross-entity links are absolute offsets into these arenas: the tile
//! index points at vertex slot ranges, vertex slots point at edge chain
//! heads, and edge records point at the previous edge on each endpoint's
//! chain. Nothing outside the graph holds a raw offset across a mutation.

pub mod edge;
pub mod shape;
pub mod tile_index;
pub mod vertex;

pub use edge::{EdgeArena, EdgeRecord, EDGE_FIXED_LEN};
pub use shape::ShapeStore;
pub use tile_index::{TileIndex, TileSlot, TILE_RECORD_LEN};
pub use vertex::{VertexStore, COORD_RECORD_LEN};
