//! Web Mercator helpers used by the pseudo-Mercator tile pyramid.
//! <https://en.wikipedia.org/wiki/Web_Mercator_projection>
//! <https://wiki.openstreetmap.org/wiki/Slippy_map_tilenames>

use std::f64::consts::PI;

// zoom level   tile coverage  number of tiles  tile size in degrees
// 0            1 tile         1 tile           360° x 170.1022°
// 1            2 × 2 tiles    4 tiles          180° x 85.0511°
// 2            4 × 4 tiles    16 tiles         90° x [variable]

/// Half of the equator length in Web Mercator meters.
pub const HALF_CIRCUMFERENCE: f64 = 20_037_508.342_789_244;

/// Latitude at which the Web Mercator square ends.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Number of tiles along one axis at the given zoom, saturating at `u32::MAX` for zooms the
/// index type cannot express.
pub fn total_tiles(zoom: u8) -> u32 {
    2u32.saturating_pow(zoom.into())
}

/// Project longitude/latitude (in degrees) into the Mercator projection and normalize it to 0-1
/// range, with `y == 0` at the north edge.
pub(crate) fn mercator_normalized(lon: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);

    // Project into Mercator (cylindrical map projection).
    let x = lon.to_radians();
    let y = lat.to_radians().tan().asinh();

    // Scale both x and y to 0-1 range.
    let x = (1. + (x / PI)) / 2.;
    let y = (1. - (y / PI)) / 2.;

    (x, y)
}
