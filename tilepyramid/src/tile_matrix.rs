//! Computing which tiles of a tile matrix set cover an extent.

use crate::coord::{MatrixSet, Placement, TmsCoord};
use crate::extent::Extent;
use crate::layer::Origin;
use crate::mercator::{mercator_normalized, total_tiles};

/// Tile edges closer than this fraction of a tile are considered touching, not overlapping.
const EDGE_TOLERANCE: f64 = 1e-6;

/// Deepest zoom level the computations are allowed to reach.
const MAX_ZOOM: u8 = 30;

/// Tile matrix computations consumed by the coordinate resolver and the ancestor walk.
pub trait TileMatrixSet {
    /// Coordinates of the fixed pseudo-Mercator pyramid covering a geographic `extent`.
    fn geographic_coords(&self, extent: &Extent) -> Vec<TmsCoord>;

    /// Coordinates of a quadtree over `layer_extent` which cover `extent`, given in the same CRS.
    fn generic_coords(
        &self,
        extent: &Extent,
        layer_extent: &Extent,
        origin: Origin,
    ) -> Vec<TmsCoord>;

    /// Pyramid parent of `coord` at `zoom`.
    fn parent(&self, coord: &TmsCoord, zoom: u8) -> TmsCoord {
        coord.ancestor(zoom)
    }

    /// Where `child` lives within the `parent` texture.
    fn offset_within_parent(&self, child: &TmsCoord, parent: &TmsCoord) -> Placement {
        child.offset_within(parent)
    }
}

/// Quadtree tile matrix sets, where every zoom level splits the tiles of the previous one in 4.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardTileMatrixSet;

impl TileMatrixSet for StandardTileMatrixSet {
    fn geographic_coords(&self, extent: &Extent) -> Vec<TmsCoord> {
        let zoom = zoom_for_ratio(360. / extent.width());
        let tiles = total_tiles(zoom);

        let (west, north) = mercator_normalized(extent.west(), extent.north());
        let (east, south) = mercator_normalized(extent.east(), extent.south());

        let cols = index_range(west, east, tiles);
        let rows = index_range(north, south, tiles);

        rows.flat_map(|row| {
            cols.clone()
                .map(move |col| TmsCoord::new(MatrixSet::PseudoMercator, zoom, row, col))
        })
        .collect()
    }

    fn generic_coords(
        &self,
        extent: &Extent,
        layer_extent: &Extent,
        origin: Origin,
    ) -> Vec<TmsCoord> {
        let zoom = zoom_for_ratio(layer_extent.width() / extent.width());
        let tiles = total_tiles(zoom);

        // Normalize to 0-1 range within the layer's extent.
        let west = (extent.west() - layer_extent.west()) / layer_extent.width();
        let east = (extent.east() - layer_extent.west()) / layer_extent.width();
        let (first, last) = match origin {
            Origin::Top => (
                (layer_extent.north() - extent.north()) / layer_extent.height(),
                (layer_extent.north() - extent.south()) / layer_extent.height(),
            ),
            Origin::Bottom => (
                (extent.south() - layer_extent.south()) / layer_extent.height(),
                (extent.north() - layer_extent.south()) / layer_extent.height(),
            ),
        };

        let cols = index_range(west, east, tiles);
        let rows = index_range(first, last, tiles);
        let matrix_set = MatrixSet::Tms(layer_extent.crs().clone());

        rows.flat_map(|row| {
            let matrix_set = matrix_set.clone();
            cols.clone()
                .map(move |col| TmsCoord::new(matrix_set.clone(), zoom, row, col))
        })
        .collect()
    }
}

/// Zoom at which a single tile has the size of the requested extent, given how many times the
/// whole matrix is bigger than the request.
fn zoom_for_ratio(ratio: f64) -> u8 {
    let ratio = ratio.round();
    if !ratio.is_finite() || ratio <= 1. {
        return 0;
    }
    (ratio.log2().floor() as u8).min(MAX_ZOOM)
}

/// Indices of tiles overlapping normalized `[start, end]` span, clamped to the matrix.
fn index_range(start: f64, end: f64, tiles: u32) -> std::ops::RangeInclusive<u32> {
    let count = tiles as f64;
    let last_index = tiles - 1;

    let first = ((start * count + EDGE_TOLERANCE).floor().max(0.) as u32).min(last_index);
    let last = ((end * count - EDGE_TOLERANCE).ceil() - 1.).max(0.) as u32;
    let last = last.clamp(first, last_index);

    first..=last
}
