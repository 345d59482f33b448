//! Length-prefixed stream format.
//!
//! All multibyte integers are little-endian and stored raw. Layout:
//!
//! ```text
//! [u32 len]["Graph"]
//! [u8 version][u8 zoom][u8 edge data size][u8 tile record len = 5]
//! [u32 index page len = 1024][i64 page count][pages: i64 index + 1024 bytes]
//! [u8 coordinate len = 3]
//! [i64 vertex slot high-water]
//! [i64 byte len][packed coordinates]
//! [i64 count][first-edge pointers as u32]
//! [i64 edge high-water]
//! [i64 byte len][edge records]
//! [i64 shape slots][per slot: i32 point count (-1 absent) + points as f64 pairs]
//! ```

use std::collections::BTreeMap;
use std::io::{Read, Write};

use tracing::debug;

use crate::error::{GraphError, Result};
use crate::storage::tile_index::INDEX_PAGE_LEN;
use crate::storage::{
    EdgeArena, ShapeStore, TileIndex, VertexStore, COORD_RECORD_LEN, EDGE_FIXED_LEN,
    TILE_RECORD_LEN,
};
use crate::types::{Coordinate, EdgeId, MAX_ZOOM, NO_EDGES, NO_VERTEX};

use super::Graph;

const HEADER: &str = "Graph";
const FORMAT_VERSION: u8 = 1;

pub(super) fn write_graph<W: Write>(graph: &Graph, writer: &mut W) -> Result<u64> {
    let mut out = CountingWriter {
        inner: writer,
        written: 0,
    };

    write_string(&mut out, HEADER)?;
    out.write_all(&[
        FORMAT_VERSION,
        graph.zoom,
        graph.edges.edge_data_len() as u8,
        TILE_RECORD_LEN as u8,
    ])?;

    out.write_all(&(INDEX_PAGE_LEN as u32).to_le_bytes())?;
    write_i64(&mut out, graph.tiles.page_count() as i64)?;
    for (index, page) in graph.tiles.pages() {
        write_i64(&mut out, index as i64)?;
        out.write_all(page)?;
    }

    out.write_all(&[COORD_RECORD_LEN as u8])?;
    let slots = graph.tiles.slot_high_water();
    write_i64(&mut out, i64::from(slots))?;
    let coords = graph.vertices.coord_bytes(slots as usize);
    write_i64(&mut out, coords.len() as i64)?;
    out.write_all(coords)?;
    write_i64(&mut out, i64::from(slots))?;
    for &pointer in graph.vertices.edge_pointers(slots as usize) {
        out.write_all(&pointer.to_le_bytes())?;
    }

    let edge_count = graph.edges.edge_count();
    write_i64(&mut out, i64::from(edge_count))?;
    let edges = graph.edges.bytes();
    write_i64(&mut out, edges.len() as i64)?;
    out.write_all(edges)?;

    write_i64(&mut out, i64::from(edge_count))?;
    for edge in 0..edge_count {
        match graph.shapes.get(EdgeId(edge)) {
            Some(shape) => {
                out.write_all(&(shape.len() as i32).to_le_bytes())?;
                for point in shape {
                    out.write_all(&point.longitude.to_le_bytes())?;
                    out.write_all(&point.latitude.to_le_bytes())?;
                }
            }
            None => out.write_all(&(-1i32).to_le_bytes())?,
        }
    }

    debug!(
        bytes = out.written,
        vertices = graph.vertex_count,
        edges = edge_count,
        "graph.write"
    );
    Ok(out.written)
}

pub(super) fn read_graph<R: Read>(reader: &mut R) -> Result<Graph> {
    let header = read_string(reader, HEADER.len())?;
    if header != HEADER {
        return Err(GraphError::Format(format!(
            "unexpected header string {header:?}"
        )));
    }
    let version = read_u8(reader)?;
    if version != FORMAT_VERSION {
        return Err(GraphError::Format(format!(
            "unsupported format version {version}"
        )));
    }
    let zoom = read_u8(reader)?;
    if zoom > MAX_ZOOM {
        return Err(GraphError::Format(format!("zoom level {zoom} out of range")));
    }
    let edge_data_len = usize::from(read_u8(reader)?);
    let tile_record_len = read_u8(reader)?;
    if usize::from(tile_record_len) != TILE_RECORD_LEN {
        return Err(GraphError::Format(format!(
            "unexpected tile record size {tile_record_len}"
        )));
    }

    let page_len = read_u32(reader)?;
    if page_len as usize != INDEX_PAGE_LEN {
        return Err(GraphError::Format(format!(
            "unexpected tile index page size {page_len}"
        )));
    }
    let page_count = read_len(reader, "tile index page count")?;
    let mut pages = BTreeMap::new();
    for _ in 0..page_count {
        let index = read_len(reader, "tile index page number")? as u64;
        let mut page = Box::new([0u8; INDEX_PAGE_LEN]);
        reader.read_exact(&mut page[..])?;
        pages.insert(index, page);
    }

    let coordinate_len = read_u8(reader)?;
    if usize::from(coordinate_len) != COORD_RECORD_LEN {
        return Err(GraphError::Format(format!(
            "unexpected coordinate size {coordinate_len}"
        )));
    }

    let slots = read_len(reader, "vertex slot high-water")?;
    if slots >= NO_EDGES as usize {
        return Err(GraphError::Format(
            "vertex slot high-water out of range".into(),
        ));
    }
    let coord_len = read_len(reader, "coordinate byte length")?;
    if coord_len != slots * COORD_RECORD_LEN {
        return Err(GraphError::Format(
            "coordinate array does not match slot high-water".into(),
        ));
    }
    let mut coords = vec![0u8; coord_len];
    reader.read_exact(&mut coords)?;
    let pointer_count = read_len(reader, "edge pointer count")?;
    if pointer_count != slots {
        return Err(GraphError::Format(
            "edge pointer array does not match slot high-water".into(),
        ));
    }
    let mut pointers = Vec::with_capacity(pointer_count);
    for _ in 0..pointer_count {
        pointers.push(read_u32(reader)?);
    }

    let edge_count = read_len(reader, "edge high-water")?;
    if edge_count >= NO_EDGES as usize {
        return Err(GraphError::Format("edge high-water out of range".into()));
    }
    let edge_len = read_len(reader, "edge byte length")?;
    if edge_len != edge_count * (EDGE_FIXED_LEN + edge_data_len) {
        return Err(GraphError::Format(
            "edge array does not match edge high-water".into(),
        ));
    }
    let mut edges = vec![0u8; edge_len];
    reader.read_exact(&mut edges)?;

    let shape_slots = read_len(reader, "shape slot count")?;
    if shape_slots != edge_count {
        return Err(GraphError::Format(
            "shape array does not match edge high-water".into(),
        ));
    }
    let mut shapes = Vec::with_capacity(shape_slots);
    for _ in 0..shape_slots {
        let points = read_i32(reader)?;
        if points < -1 {
            return Err(GraphError::Format(format!(
                "invalid shape point count {points}"
            )));
        }
        if points == -1 {
            shapes.push(None);
            continue;
        }
        let mut shape = Vec::with_capacity(points as usize);
        for _ in 0..points {
            let longitude = read_f64(reader)?;
            let latitude = read_f64(reader)?;
            shape.push(Coordinate {
                longitude,
                latitude,
            });
        }
        shapes.push(Some(shape));
    }

    let tiles = TileIndex::from_parts(pages, slots as u32);
    let vertices = VertexStore::from_parts(coords, pointers);
    let vertex_count = count_vertices(&tiles, &vertices);
    let graph = Graph {
        zoom,
        tiles,
        vertices,
        edges: EdgeArena::from_parts(edges, edge_data_len, edge_count as u32),
        shapes: ShapeStore::from_parts(shapes),
        vertex_count,
    };
    debug!(
        vertices = graph.vertex_count,
        edges = edge_count,
        "graph.read"
    );
    Ok(graph)
}

/// Occupied slots within current tile ranges; ranges abandoned by growth
/// are not reachable from the index and do not count.
fn count_vertices(tiles: &TileIndex, vertices: &VertexStore) -> u64 {
    tiles
        .iter()
        .map(|(_, slot)| {
            (0..slot.capacity() as usize)
                .filter(|&offset| {
                    vertices.edge_pointer(slot.base as usize + offset) != NO_VERTEX
                })
                .count() as u64
        })
        .sum()
}

struct CountingWriter<'a, W> {
    inner: &'a mut W,
    written: u64,
}

impl<W: Write> Write for CountingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.written += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

fn write_string<W: Write>(writer: &mut W, value: &str) -> Result<()> {
    writer.write_all(&(value.len() as u32).to_le_bytes())?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

fn write_i64<W: Write>(writer: &mut W, value: i64) -> Result<()> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn read_string<R: Read>(reader: &mut R, expected_len: usize) -> Result<String> {
    let len = read_u32(reader)? as usize;
    if len != expected_len {
        return Err(GraphError::Format(format!(
            "unexpected header length {len}"
        )));
    }
    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|_| GraphError::Format("header is not UTF-8".into()))
}

fn read_u8<R: Read>(reader: &mut R) -> Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_i32<R: Read>(reader: &mut R) -> Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_i64<R: Read>(reader: &mut R) -> Result<i64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

fn read_f64<R: Read>(reader: &mut R) -> Result<f64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

fn read_len<R: Read>(reader: &mut R, what: &str) -> Result<usize> {
    let value = read_i64(reader)?;
    usize::try_from(value).map_err(|_| GraphError::Format(format!("negative {what}")))
}
