//! Filling URL templates with tile coordinates.

use crate::coord::TmsCoord;

/// Substitute tile coordinates into the `template`.
///
/// Both XYZ style (`{z}`, `{x}`, `{y}`) and WMTS style (`%TILEMATRIX`, `%COL`, `%ROW`)
/// placeholders are recognized. Rows are used as they are, the layer's origin already decided how
/// they are numbered.
pub fn build(template: &str, coord: &TmsCoord) -> String {
    let zoom = coord.zoom.to_string();
    let col = coord.col.to_string();
    let row = coord.row.to_string();

    template
        .replace("{z}", &zoom)
        .replace("{x}", &col)
        .replace("{y}", &row)
        .replace("%TILEMATRIX", &zoom)
        .replace("%COL", &col)
        .replace("%ROW", &row)
}
