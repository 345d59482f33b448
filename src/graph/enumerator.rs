//! Cursor over a vertex's incident edges.
//!
//! Every edge record sits on two intrusive chains, one per endpoint. The
//! cursor walks the chain belonging to its anchor vertex, normalising
//! direction at each step: when the anchor matches the record's first
//! endpoint the edge reads forward, otherwise backward. A self-loop sits on
//! both chains of the same vertex through the same head pointer, so it is
//! reported twice, once per direction, before the walk continues.

use crate::types::{Coordinate, EdgeId, VertexId, NO_EDGES};

use super::Graph;

/// Streaming cursor over the edges incident to one vertex.
///
/// Position with [`EdgeEnumerator::move_to`] or
/// [`EdgeEnumerator::move_to_edge`], then advance with
/// [`EdgeEnumerator::move_next`]; accessors are only meaningful while the
/// last `move_next` (or `move_to_edge`) returned `true`.
pub struct EdgeEnumerator<'g> {
    graph: &'g Graph,
    anchor: Option<VertexId>,
    head: Option<EdgeId>,
    current: Option<EdgeId>,
    next: Option<EdgeId>,
    started: bool,
    pending_backward: bool,
    forward: bool,
    to: Option<VertexId>,
}

impl<'g> EdgeEnumerator<'g> {
    pub(super) fn new(graph: &'g Graph) -> Self {
        Self {
            graph,
            anchor: None,
            head: None,
            current: None,
            next: None,
            started: false,
            pending_backward: false,
            forward: false,
            to: None,
        }
    }

    /// Anchors the cursor before the first edge of a vertex.
    ///
    /// Returns false when the vertex cannot be resolved. A vertex without
    /// edges anchors successfully and yields nothing.
    pub fn move_to(&mut self, vertex: VertexId) -> bool {
        self.anchor = None;
        self.head = None;
        self.current = None;
        self.next = None;
        self.started = false;
        self.pending_backward = false;
        self.to = None;

        // resolve_slot rules out absent tiles, offsets beyond the tile's
        // capacity, and empty slots
        let Some(slot) = self.graph.resolve_slot(vertex) else {
            return false;
        };
        let pointer = self.graph.vertices.edge_pointer(slot);
        self.anchor = Some(vertex);
        self.head = (pointer != NO_EDGES).then_some(EdgeId(pointer));
        true
    }

    /// Positions the cursor directly on an edge.
    ///
    /// The anchor becomes the first endpoint when `forward`, the second
    /// otherwise; `move_next` continues along that endpoint's chain.
    pub fn move_to_edge(&mut self, edge: EdgeId, forward: bool) -> bool {
        let Some(record) = self.graph.edges.record(edge) else {
            return false;
        };
        let (anchor, to, next) = if forward {
            (record.v1, record.v2, record.prev1())
        } else {
            (record.v2, record.v1, record.prev2())
        };
        self.anchor = Some(anchor);
        self.head = None;
        self.current = Some(edge);
        self.next = next;
        self.started = true;
        self.pending_backward = false;
        self.forward = forward;
        self.to = Some(to);
        true
    }

    /// Advances to the next incident edge; false when the chain ends.
    pub fn move_next(&mut self) -> bool {
        let Some(anchor) = self.anchor else {
            return false;
        };

        if self.pending_backward {
            // second visit of a self-loop, reversed
            self.pending_backward = false;
            let Some(record) = self.current.and_then(|edge| self.graph.edges.record(edge))
            else {
                return false;
            };
            self.forward = false;
            self.to = Some(record.v1);
            self.next = record.prev2();
            return true;
        }

        let step = if self.started {
            self.next
        } else {
            self.started = true;
            self.head
        };
        let Some(edge) = step else {
            return false;
        };
        let Some(record) = self.graph.edges.record(edge) else {
            return false;
        };
        self.current = Some(edge);
        if record.v1 == anchor {
            self.forward = true;
            self.to = Some(record.v2);
            self.next = record.prev1();
            if record.v2 == anchor {
                self.pending_backward = true;
            }
        } else {
            self.forward = false;
            self.to = Some(record.v1);
            self.next = record.prev2();
        }
        true
    }

    /// Re-anchors at the current vertex, before its first edge.
    pub fn reset(&mut self) -> bool {
        match self.anchor {
            Some(anchor) => self.move_to(anchor),
            None => false,
        }
    }

    /// The anchor vertex.
    pub fn from(&self) -> VertexId {
        self.anchor.expect("cursor is not anchored")
    }

    /// The endpoint opposite the anchor on the current edge.
    pub fn to(&self) -> VertexId {
        self.to.expect("cursor is not positioned on an edge")
    }

    /// True when the anchor is the current edge's first endpoint.
    #[inline]
    pub fn forward(&self) -> bool {
        self.forward
    }

    /// Id of the current edge.
    pub fn edge_id(&self) -> EdgeId {
        self.current.expect("cursor is not positioned on an edge")
    }

    /// The current edge's inline payload.
    pub fn data(&self) -> &'g [u8] {
        self.graph
            .edges
            .payload(self.edge_id())
            .expect("cursor is not positioned on an edge")
    }

    /// Copies the payload into `dst`, returning the number of bytes copied.
    pub fn copy_data(&self, dst: &mut [u8]) -> usize {
        let data = self.data();
        let len = data.len().min(dst.len());
        dst[..len].copy_from_slice(&data[..len]);
        len
    }

    /// The current edge's polyline, oriented from the anchor towards
    /// [`EdgeEnumerator::to`].
    pub fn shape(&self) -> Option<Vec<Coordinate>> {
        let shape = self.graph.shapes.get(self.edge_id())?;
        if self.forward {
            Some(shape.to_vec())
        } else {
            Some(shape.iter().rev().copied().collect())
        }
    }
}
