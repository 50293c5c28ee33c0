//! Coordinate reference systems and CRS-tagged rectangles.

use std::fmt;

use geo_types::{Rect, coord};

/// Coordinate reference system identifier.
///
/// Only the two systems the tile pyramid logic cares about get their own variants, anything else
/// is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub enum Crs {
    /// Geographic longitude/latitude in degrees (`EPSG:4326`).
    Wgs84,

    /// Web Mercator (`EPSG:3857`).
    /// <https://en.wikipedia.org/wiki/Web_Mercator_projection>
    PseudoMercator,

    /// Any other identifier, e.g. `EPSG:2154`.
    Named(String),
}

impl Crs {
    pub fn is_geographic(&self) -> bool {
        matches!(self, Self::Wgs84)
    }
}

impl From<&str> for Crs {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "EPSG:4326" | "CRS:84" | "WGS84" => Self::Wgs84,
            "EPSG:3857" | "EPSG:900913" | "EPSG:102100" => Self::PseudoMercator,
            _ => Self::Named(value.trim().to_owned()),
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wgs84 => f.write_str("EPSG:4326"),
            Self::PseudoMercator => f.write_str("EPSG:3857"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

/// Rectangle tagged with the [`Crs`] its coordinates are expressed in.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct Extent {
    crs: Crs,
    rect: Rect<f64>,
}

impl Extent {
    /// Bounds are given in the west, east, south, north order.
    pub fn new(crs: Crs, west: f64, east: f64, south: f64, north: f64) -> Self {
        Self {
            crs,
            rect: Rect::new(coord! { x: west, y: south }, coord! { x: east, y: north }),
        }
    }

    pub fn from_rect(crs: Crs, rect: Rect<f64>) -> Self {
        Self { crs, rect }
    }

    /// Whole world covered by the Web Mercator tile pyramid.
    pub fn pseudo_mercator_world() -> Self {
        let half = crate::mercator::HALF_CIRCUMFERENCE;
        Self::new(Crs::PseudoMercator, -half, half, -half, half)
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    pub fn rect(&self) -> Rect<f64> {
        self.rect
    }

    pub fn west(&self) -> f64 {
        self.rect.min().x
    }

    pub fn east(&self) -> f64 {
        self.rect.max().x
    }

    pub fn south(&self) -> f64 {
        self.rect.min().y
    }

    pub fn north(&self) -> f64 {
        self.rect.max().y
    }

    pub fn width(&self) -> f64 {
        self.rect.width()
    }

    pub fn height(&self) -> f64 {
        self.rect.height()
    }
}
