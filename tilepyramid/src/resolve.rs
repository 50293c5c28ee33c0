use crate::coord::{Placement, TmsCoord};
use crate::error::Error;
use crate::extent::Extent;
use crate::layer::{CoordinateStrategy, Layer};
use crate::tile_matrix::TileMatrixSet;

/// Coordinates of the layer's tiles which cover the requested `extent`.
///
/// # Errors
///
/// [`Error::Configuration`] if the layer was not preprocessed, or if the request would need to
/// be reprojected into the layer's CRS.
pub fn resolve(
    matrix_set: &impl TileMatrixSet,
    extent: &Extent,
    layer: &Layer,
) -> Result<Vec<TmsCoord>, Error> {
    let prepared = layer.prepared()?;

    // Globes in geographic CRS are always textured from the pseudo-Mercator pyramid, regardless
    // of layer's own projection.
    let coords = match prepared.strategy {
        CoordinateStrategy::PseudoMercatorGlobe if extent.crs().is_geographic() => {
            matrix_set.geographic_coords(extent)
        }
        CoordinateStrategy::PseudoMercatorGlobe | CoordinateStrategy::Generic => {
            if extent.crs() != prepared.extent.crs() {
                return Err(Error::Configuration(format!(
                    "Layer '{}' is in {}, but tiles were requested in {}",
                    layer.id,
                    prepared.extent.crs(),
                    extent.crs()
                )));
            }
            matrix_set.generic_coords(extent, prepared.extent, prepared.origin)
        }
    };

    if coords.is_empty() {
        return Err(Error::Configuration(format!(
            "No tiles of layer '{}' cover the requested extent",
            layer.id
        )));
    }

    Ok(coords)
}

/// Substitute `coord` with its ancestor at `target_level`, if it is deeper than that.
///
/// Returns the coordinate to fetch and the part of its texture where `coord` lives.
pub fn fallback(
    matrix_set: &impl TileMatrixSet,
    coord: TmsCoord,
    target_level: u8,
) -> (TmsCoord, Placement) {
    if target_level < coord.zoom {
        let parent = matrix_set.parent(&coord, target_level);
        let placement = matrix_set.offset_within_parent(&coord, &parent);
        log::trace!("Substituting {coord} with {parent}.");
        (parent, placement)
    } else {
        (coord, Placement::IDENTITY)
    }
}
