use std::fmt;

use crate::extent::Crs;
use crate::mercator::total_tiles;

/// Tile matrix set a [`TmsCoord`] belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub enum MatrixSet {
    /// Fixed Web Mercator pyramid, used for geographic requests.
    PseudoMercator,

    /// Quadtree over the extent of a layer declared in the given CRS.
    Tms(Crs),
}

impl fmt::Display for MatrixSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PseudoMercator => f.write_str("WMTS:PM"),
            Self::Tms(crs) => write!(f, "TMS:{crs}"),
        }
    }
}

/// Identifies the tile in a tile matrix set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct TmsCoord {
    /// Zoom level, where 0 means a single tile covering the whole matrix.
    pub zoom: u8,

    /// Row number, counted from the edge given by the layer's origin.
    pub row: u32,

    /// Column number, counted from the west edge.
    pub col: u32,

    pub matrix_set: MatrixSet,
}

impl TmsCoord {
    pub fn new(matrix_set: MatrixSet, zoom: u8, row: u32, col: u32) -> Self {
        Self {
            zoom,
            row,
            col,
            matrix_set,
        }
    }

    /// Whether row and column fit in the matrix at this zoom.
    pub fn valid(&self) -> bool {
        self.row < total_tiles(self.zoom) && self.col < total_tiles(self.zoom)
    }

    /// Tile at `zoom` which spatially contains this one.
    ///
    /// Zooms equal or deeper than this coordinate's give back the coordinate itself.
    pub fn ancestor(&self, zoom: u8) -> Self {
        let zoom = zoom.min(self.zoom);
        let dzoom = u32::from(self.zoom - zoom);

        // Shifting by 32 or more levels leaves nothing of the index.
        Self {
            zoom,
            row: self.row.checked_shr(dzoom).unwrap_or(0),
            col: self.col.checked_shr(dzoom).unwrap_or(0),
            matrix_set: self.matrix_set.clone(),
        }
    }

    /// Part of the `ancestor` tile which is covered by this one.
    pub fn offset_within(&self, ancestor: &Self) -> Placement {
        debug_assert!(self.zoom >= ancestor.zoom);

        let dzoom = i32::from(self.zoom.saturating_sub(ancestor.zoom));
        let z = 0.5f64.powi(dzoom);

        // Scaling by a power of two is exact, so is subtracting the ancestor's index.
        let offset = |index: u32, ancestor_index: u32| {
            (f64::from(index) * z - f64::from(ancestor_index)).clamp(0., 1. - z)
        };

        Placement {
            offset_x: offset(self.col, ancestor.col),
            offset_y: offset(self.row, ancestor.row),
            scale_x: z,
            scale_y: z,
        }
    }
}

impl fmt::Display for TmsCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}/{}/{}",
            self.matrix_set, self.zoom, self.row, self.col
        )
    }
}

/// Normalized sub-rectangle of a texture, where content of the requested tile lives.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct Placement {
    pub offset_x: f64,
    pub offset_y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl Placement {
    /// Whole texture belongs to the requested tile.
    pub const IDENTITY: Self = Self {
        offset_x: 0.,
        offset_y: 0.,
        scale_x: 1.,
        scale_y: 1.,
    };

    pub fn components(&self) -> [f64; 4] {
        [self.offset_x, self.offset_y, self.scale_x, self.scale_y]
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self::IDENTITY
    }
}
