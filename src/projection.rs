//! Web-mercator tile math.
//!
//! Vertices are bucketed by the slippy-map tile they fall in at the graph's
//! zoom level. Within a tile, coordinates are quantised onto a
//! `resolution x resolution` grid anchored at the tile's top-left corner, so
//! a vertex position packs into 12 bits per axis.

use std::f64::consts::PI;

use crate::types::Coordinate;

/// A web-mercator tile at a given zoom level.
///
/// Stateless after construction; all bounds are derived from `(x, y, zoom)`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Tile {
    pub x: u32,
    pub y: u32,
    pub zoom: u8,
}

impl Tile {
    #[inline]
    pub const fn new(x: u32, y: u32, zoom: u8) -> Self {
        Self { x, y, zoom }
    }

    /// Returns the tile containing the given coordinate.
    pub fn world_to_tile(longitude: f64, latitude: f64, zoom: u8) -> Self {
        let n = (1u64 << zoom) as f64;
        let x = ((longitude + 180.0) / 360.0 * n) as u32;
        let lat_rad = latitude.to_radians();
        let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n) as u32;
        Self { x, y, zoom }
    }

    /// Row-major tile id: `y * 2^zoom + x`.
    #[inline]
    pub fn local_id(&self) -> u32 {
        self.y * (1u32 << self.zoom) + self.x
    }

    /// Inverse of [`Tile::local_id`].
    #[inline]
    pub fn from_local_id(local_id: u32, zoom: u8) -> Self {
        let n = 1u32 << zoom;
        Self {
            x: local_id % n,
            y: local_id / n,
            zoom,
        }
    }

    pub fn left(&self) -> f64 {
        let n = (1u64 << self.zoom) as f64;
        f64::from(self.x) / n * 360.0 - 180.0
    }

    pub fn right(&self) -> f64 {
        let n = (1u64 << self.zoom) as f64;
        f64::from(self.x + 1) / n * 360.0 - 180.0
    }

    pub fn top(&self) -> f64 {
        self.edge_latitude(self.y)
    }

    pub fn bottom(&self) -> f64 {
        self.edge_latitude(self.y + 1)
    }

    fn edge_latitude(&self, row: u32) -> f64 {
        let n = (1u64 << self.zoom) as f64;
        (PI * (1.0 - 2.0 * f64::from(row) / n)).sinh().atan().to_degrees()
    }

    /// Quantises a coordinate onto this tile's local grid.
    ///
    /// Inputs outside the tile produce bounded but meaningless results;
    /// callers are expected to pass coordinates that fall inside the tile.
    pub fn to_local_coordinates(&self, longitude: f64, latitude: f64, resolution: u32) -> (u32, u32) {
        let left = self.left();
        let lon_step = (self.right() - left) / f64::from(resolution);
        let ix = ((longitude - left) / lon_step) as u32;
        let top = self.top();
        let lat_step = (top - self.bottom()) / f64::from(resolution);
        let iy = ((top - latitude) / lat_step) as u32;
        (ix.min(resolution), iy.min(resolution))
    }

    /// Linear inverse of [`Tile::to_local_coordinates`].
    pub fn from_local_coordinates(&self, ix: u32, iy: u32, resolution: u32) -> Coordinate {
        let left = self.left();
        let lon_step = (self.right() - left) / f64::from(resolution);
        let top = self.top();
        let lat_step = (top - self.bottom()) / f64::from(resolution);
        Coordinate {
            longitude: left + lon_step * f64::from(ix),
            latitude: top - lat_step * f64::from(iy),
        }
    }
}
