//! Tiled imagery layer description and its one-time preprocessing.

use crate::error::Error;
use crate::extent::{Crs, Extent};
use crate::io::NetworkOptions;

/// Direction in which rows of the tile matrix are numbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub enum Origin {
    /// Row 0 is at the north edge, like in OpenStreetMap.
    Top,
    /// Row 0 is at the south edge, like in TMS.
    Bottom,
}

/// Protocol the layer is served with. It only matters for the default [`Origin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub enum Protocol {
    #[default]
    Tms,
    Xyz,
    Wmts,
}

impl Protocol {
    pub fn default_origin(&self) -> Origin {
        match self {
            Self::Xyz => Origin::Top,
            Self::Tms | Self::Wmts => Origin::Bottom,
        }
    }
}

/// Inclusive range of pyramid levels served by the layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct ZoomRange {
    pub min: u8,
    pub max: u8,
}

impl ZoomRange {
    pub fn contains(&self, zoom: u8) -> bool {
        self.min <= zoom && zoom <= self.max
    }
}

/// Extent declared for a layer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub enum LayerExtent {
    Extent(Extent),

    /// West, east, south and north bounds, expressed in the layer's `projection`.
    Bounds([f64; 4]),
}

/// How the tile coordinates are computed for the layer, decided once during preprocessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateStrategy {
    /// Layer is in pseudo-Mercator or geographic CRS, so geographic requests are served from the
    /// fixed pseudo-Mercator pyramid. Other requests use the generic path.
    PseudoMercatorGlobe,

    /// Quadtree over the layer's extent, whatever the request is.
    Generic,
}

impl CoordinateStrategy {
    fn for_extent(extent: &Extent) -> Self {
        match extent.crs() {
            Crs::PseudoMercator | Crs::Wgs84 => Self::PseudoMercatorGlobe,
            Crs::Named(_) => Self::Generic,
        }
    }
}

/// Values assigned by [`Layer::preprocess`] to whatever the layer does not declare.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerDefaults {
    pub extent: Extent,
    pub zoom: ZoomRange,
}

impl Default for LayerDefaults {
    fn default() -> Self {
        Self {
            extent: Extent::pseudo_mercator_world(),
            zoom: ZoomRange { min: 0, max: 18 },
        }
    }
}

/// Remote tiled imagery source.
#[derive(Debug, Clone)]
pub struct Layer {
    pub id: String,

    /// URL template, see [`crate::url::build`].
    pub url: String,

    pub extent: Option<LayerExtent>,

    /// Needed only when `extent` is given as plain [`LayerExtent::Bounds`].
    pub projection: Option<Crs>,

    pub origin: Option<Origin>,
    pub protocol: Protocol,
    pub zoom: Option<ZoomRange>,

    /// Fetched textures are marked for premultiplied alpha compositing.
    pub transparent: bool,

    pub network_options: NetworkOptions,

    strategy: Option<CoordinateStrategy>,
}

impl Layer {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            extent: None,
            projection: None,
            origin: None,
            protocol: Protocol::default(),
            zoom: None,
            transparent: false,
            network_options: NetworkOptions::default(),
            strategy: None,
        }
    }

    /// Fill in the extent, origin and zoom range, and choose the [`CoordinateStrategy`].
    ///
    /// Must be called once before the layer is used. Calling it again does nothing.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if the extent is given as bounds, but there is no projection
    /// to interpret them with.
    pub fn preprocess(&mut self, defaults: &LayerDefaults) -> Result<(), Error> {
        if self.strategy.is_some() {
            return Ok(());
        }

        let extent = match self.extent.take() {
            None => defaults.extent.clone(),
            Some(LayerExtent::Extent(extent)) => extent,
            Some(LayerExtent::Bounds([west, east, south, north])) => {
                let Some(projection) = self.projection.clone() else {
                    self.extent = Some(LayerExtent::Bounds([west, east, south, north]));
                    return Err(Error::Configuration(format!(
                        "Missing projection property for layer '{}'",
                        self.id
                    )));
                };
                Extent::new(projection, west, east, south, north)
            }
        };

        let strategy = CoordinateStrategy::for_extent(&extent);
        log::debug!(
            "Layer '{}' has extent in {}, using {:?}.",
            self.id,
            extent.crs(),
            strategy
        );

        self.extent = Some(LayerExtent::Extent(extent));
        self.origin = self.origin.or(Some(self.protocol.default_origin()));
        self.zoom = self.zoom.or(Some(defaults.zoom));
        self.strategy = Some(strategy);

        Ok(())
    }

    /// Extent, origin and strategy of a preprocessed layer.
    pub(crate) fn prepared(&self) -> Result<Prepared<'_>, Error> {
        match (&self.extent, self.origin, self.strategy) {
            (Some(LayerExtent::Extent(extent)), Some(origin), Some(strategy)) => Ok(Prepared {
                extent,
                origin,
                strategy,
            }),
            _ => Err(Error::Configuration(format!(
                "Layer '{}' was not preprocessed",
                self.id
            ))),
        }
    }

    /// Zoom range, or the full range of levels if not declared.
    pub fn zoom_range(&self) -> ZoomRange {
        self.zoom.unwrap_or(ZoomRange {
            min: 0,
            max: u8::MAX,
        })
    }

    pub fn strategy(&self) -> Option<CoordinateStrategy> {
        self.strategy
    }
}

pub(crate) struct Prepared<'a> {
    pub extent: &'a Extent,
    pub origin: Origin,
    pub strategy: CoordinateStrategy,
}
