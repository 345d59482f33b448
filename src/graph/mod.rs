//! The tiled routing graph.
//!
//! Vertices are bucketed by web-mercator tile; each tile owns a contiguous,
//! power-of-two-sized range of slots in a global vertex address space. Edges
//! live in a single append-only arena and thread through two intrusive
//! linked lists, one per endpoint, walked by [`EdgeEnumerator`].
//!
//! The graph is a single-owner structure: mutation requires `&mut self`, and
//! enumerators borrow the graph immutably, so the borrow checker rules out
//! traversal interleaved with mutation.

use std::io::{Read, Write};

use crate::error::{GraphError, Result};
use crate::projection::Tile;
use crate::storage::{EdgeArena, ShapeStore, TileIndex, TileSlot, VertexStore};
use crate::types::{
    Coordinate, EdgeId, TileId, VertexId, COORDINATE_RESOLUTION, MAX_ZOOM, NO_EDGES, NO_VERTEX,
};

mod enumerator;
mod options;
mod ser;

pub use enumerator::EdgeEnumerator;
pub use options::GraphOptions;

/// A tile-indexed graph of georeferenced vertices and payload-carrying edges.
#[derive(Debug)]
pub struct Graph {
    zoom: u8,
    tiles: TileIndex,
    vertices: VertexStore,
    edges: EdgeArena,
    shapes: ShapeStore,
    vertex_count: u64,
}

impl Graph {
    /// An empty graph with the default zoom and no inline edge payload.
    pub fn new() -> Self {
        Self::with_options(GraphOptions::default()).expect("default options are valid")
    }

    /// Builds an empty graph from `options`.
    ///
    /// Fails with `CapacityExceeded` when the zoom level exceeds
    /// [`MAX_ZOOM`]: above it, `y * 2^zoom + x` no longer fits the 32-bit
    /// tile id space.
    pub fn with_options(options: GraphOptions) -> Result<Self> {
        if options.zoom > MAX_ZOOM {
            return Err(GraphError::CapacityExceeded(
                "zoom exceeds the 32-bit tile id space",
            ));
        }
        Ok(Self {
            zoom: options.zoom,
            tiles: TileIndex::new(),
            vertices: VertexStore::new(),
            edges: EdgeArena::new(usize::from(options.edge_data_size)),
            shapes: ShapeStore::new(),
            vertex_count: 0,
        })
    }

    /// The zoom level vertices are bucketed at.
    #[inline]
    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    /// Bytes of inline payload carried by every edge.
    #[inline]
    pub fn edge_data_size(&self) -> usize {
        self.edges.edge_data_len()
    }

    /// Adds a vertex at the given coordinate and returns its id.
    ///
    /// The id encodes the containing tile and the vertex's slot offset
    /// inside that tile's range; ids are stable for the lifetime of the
    /// graph and across serialisation.
    pub fn add_vertex(&mut self, longitude: f64, latitude: f64) -> Result<VertexId> {
        let tile = Tile::world_to_tile(longitude, latitude, self.zoom);
        let tile_id = TileId(tile.local_id());
        let slot = match self.tiles.find(tile_id) {
            Some(slot) => slot,
            None => self.tiles.add(tile_id)?,
        };
        self.vertices
            .ensure_slots(self.tiles.slot_high_water() as usize + slot.capacity() as usize);

        let base = slot.base as usize;
        let capacity = slot.capacity() as usize;

        // Take the lowest slot of the empty suffix; occupied slots never
        // reopen, so this is the append position within the tile.
        let mut next = base + capacity;
        while next > base && self.vertices.edge_pointer(next - 1) == NO_VERTEX {
            next -= 1;
        }

        let (index, base) = if next == base + capacity {
            // Range is full: double it and continue in the upper half.
            let grown = self.tiles.grow(tile_id, slot)?;
            self.vertices
                .ensure_slots(self.tiles.slot_high_water() as usize + grown.capacity() as usize);
            for offset in 0..capacity {
                self.vertices
                    .copy_slot(base + offset, grown.base as usize + offset);
            }
            (grown.base as usize + capacity, grown.base as usize)
        } else {
            (next, base)
        };

        let (ix, iy) = tile.to_local_coordinates(longitude, latitude, COORDINATE_RESOLUTION);
        self.vertices.set_coords(index, ix, iy);
        self.vertices.set_edge_pointer(index, NO_EDGES);
        self.vertex_count += 1;
        Ok(VertexId::new(tile_id, (index - base) as u32))
    }

    /// The coordinate stored for a vertex, or `None` if it does not exist.
    pub fn try_get_vertex(&self, vertex: VertexId) -> Option<Coordinate> {
        let slot = self.tiles.find(vertex.tile)?;
        if vertex.local >= slot.capacity() {
            return None;
        }
        let (ix, iy) = self
            .vertices
            .coords(slot.base as usize + vertex.local as usize)?;
        let tile = Tile::from_local_id(vertex.tile.0, self.zoom);
        Some(tile.from_local_coordinates(ix, iy, COORDINATE_RESOLUTION))
    }

    /// Strict variant of [`Graph::try_get_vertex`].
    pub fn vertex(&self, vertex: VertexId) -> Result<Coordinate> {
        self.try_get_vertex(vertex)
            .ok_or(GraphError::VertexNotFound(vertex))
    }

    /// Adds an edge between two existing vertices and returns its id.
    ///
    /// Edge ids are dense: the n-th successful call returns id `n - 1`. The
    /// new edge becomes the head of both endpoints' chains. A self-loop is
    /// valid and will be enumerated once per direction.
    pub fn add_edge(
        &mut self,
        v1: VertexId,
        v2: VertexId,
        payload: Option<&[u8]>,
        shape: Option<Vec<Coordinate>>,
    ) -> Result<EdgeId> {
        let slot1 = self
            .resolve_slot(v1)
            .ok_or(GraphError::VertexNotFound(v1))?;
        let slot2 = self
            .resolve_slot(v2)
            .ok_or(GraphError::VertexNotFound(v2))?;

        let head1 = self.vertices.edge_pointer(slot1);
        let head2 = self.vertices.edge_pointer(slot2);
        let edge = self.edges.append(v1, v2, head1, head2, payload)?;
        self.vertices.set_edge_pointer(slot1, edge.0);
        self.vertices.set_edge_pointer(slot2, edge.0);
        if let Some(shape) = shape {
            self.shapes.set(edge, shape);
        }
        Ok(edge)
    }

    /// A detached cursor; position it with [`EdgeEnumerator::move_to`] or
    /// [`EdgeEnumerator::move_to_edge`].
    pub fn edge_enumerator(&self) -> EdgeEnumerator<'_> {
        EdgeEnumerator::new(self)
    }

    /// The inline payload of an edge, or `None` for an unknown id.
    pub fn edge_payload(&self, edge: EdgeId) -> Option<&[u8]> {
        self.edges.payload(edge)
    }

    /// The polyline of an edge, in `v1 -> v2` direction, if one was stored.
    pub fn edge_shape(&self, edge: EdgeId) -> Option<&[Coordinate]> {
        self.shapes.get(edge)
    }

    /// Number of vertices in the graph.
    #[inline]
    pub fn vertex_count(&self) -> u64 {
        self.vertex_count
    }

    /// Number of edges in the graph.
    #[inline]
    pub fn edge_count(&self) -> u64 {
        u64::from(self.edges.edge_count())
    }

    /// Number of tiles with at least one vertex.
    pub fn tile_count(&self) -> u64 {
        self.tiles.tile_count()
    }

    /// All vertices, tile by tile in tile-id order.
    pub fn vertices(&self) -> VertexIter<'_> {
        VertexIter {
            graph: self,
            tiles: self.tiles.iter().collect::<Vec<_>>().into_iter(),
            current: None,
            local: 0,
        }
    }

    /// A point-in-time snapshot of storage counters.
    pub fn stats(&self) -> GraphStats {
        GraphStats {
            vertex_count: self.vertex_count,
            edge_count: self.edge_count(),
            tile_count: self.tiles.tile_count(),
            vertex_slots: u64::from(self.tiles.slot_high_water()),
            edge_bytes: self.edges.bytes().len() as u64,
            shape_count: self.shapes.shape_count(),
        }
    }

    /// Serialises the graph and returns the number of bytes written.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<u64> {
        ser::write_graph(self, writer)
    }

    /// Reads a graph serialised by [`Graph::write_to`].
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        ser::read_graph(reader)
    }

    /// Maps a vertex id to its absolute slot, `None` when unresolvable:
    /// absent tile, offset beyond the tile's capacity, or empty slot.
    fn resolve_slot(&self, vertex: VertexId) -> Option<usize> {
        let slot = self.tiles.find(vertex.tile)?;
        if vertex.local >= slot.capacity() {
            return None;
        }
        let index = slot.base as usize + vertex.local as usize;
        if self.vertices.edge_pointer(index) == NO_VERTEX {
            return None;
        }
        Some(index)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

/// Counter snapshot returned by [`Graph::stats`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct GraphStats {
    /// Vertices stored.
    pub vertex_count: u64,
    /// Edges stored.
    pub edge_count: u64,
    /// Tiles with at least one vertex.
    pub tile_count: u64,
    /// Allocated vertex slots, including ranges abandoned by tile growth.
    pub vertex_slots: u64,
    /// Bytes used by edge records.
    pub edge_bytes: u64,
    /// Edges with a stored polyline.
    pub shape_count: u64,
}

/// Iterator over all vertices; see [`Graph::vertices`].
pub struct VertexIter<'g> {
    graph: &'g Graph,
    tiles: std::vec::IntoIter<(TileId, TileSlot)>,
    current: Option<(TileId, TileSlot)>,
    local: u32,
}

impl Iterator for VertexIter<'_> {
    type Item = (VertexId, Coordinate);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (tile, slot) = match self.current {
                Some(pair) => pair,
                None => {
                    let pair = self.tiles.next()?;
                    self.current = Some(pair);
                    self.local = 0;
                    pair
                }
            };
            if self.local >= slot.capacity() {
                self.current = None;
                continue;
            }
            let vertex = VertexId::new(tile, self.local);
            self.local += 1;
            if let Some(coordinate) = self.graph.try_get_vertex(vertex) {
                return Some((vertex, coordinate));
            }
        }
    }
}
