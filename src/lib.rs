#![forbid(unsafe_code)]
//! Tile-indexed routing-graph storage core.
//!
//! Stores georeferenced vertices in per-tile slot ranges with quantised
//! 3-byte coordinates, edges in a single append-only arena threaded by two
//! intrusive linked lists, and supports streaming traversal plus a compact
//! length-prefixed serialisation format.

pub mod error;
pub mod graph;
pub mod projection;
pub mod storage;
pub mod types;

pub use crate::error::{GraphError, Result};
pub use crate::graph::{EdgeEnumerator, Graph, GraphOptions, GraphStats, VertexIter};
pub use crate::projection::Tile;
pub use crate::types::{
    Coordinate, EdgeId, TileId, VertexId, COORDINATE_RESOLUTION, DEFAULT_ZOOM, MAX_ZOOM, NO_EDGES,
    NO_VERTEX,
};
