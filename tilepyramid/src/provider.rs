//! Fetching textures for requested tiles, falling back to lower zoom levels.

use futures::{StreamExt, stream};

use crate::coord::TmsCoord;
use crate::error::{Error, FetchError};
use crate::extent::Extent;
use crate::io::Fetch;
use crate::layer::Layer;
use crate::resolve::{fallback, resolve};
use crate::texture::{FetchResult, Texture};
use crate::tile_matrix::{StandardTileMatrixSet, TileMatrixSet};

/// Request for textures covering a single tile.
#[derive(Debug, Clone, Copy)]
pub struct Command<'a> {
    pub layer: &'a Layer,

    /// Extent of the tile which needs the textures.
    pub extent: &'a Extent,

    /// Deepest pyramid level to fetch. Deeper tiles are cropped from their ancestor at this level.
    pub target_level: u8,
}

/// Outcome of every texture of a command, in the order they completed.
pub type Settled = Vec<Result<FetchResult, FetchError>>;

/// Resolves requested tiles into TMS coordinates and fetches their textures.
pub struct TmsProvider<F, M = StandardTileMatrixSet> {
    fetch: F,
    matrix_set: M,
}

impl<F: Fetch> TmsProvider<F> {
    pub fn new(fetch: F) -> Self {
        Self::with_matrix_set(fetch, StandardTileMatrixSet)
    }
}

impl<F: Fetch, M: TileMatrixSet> TmsProvider<F, M> {
    pub fn with_matrix_set(fetch: F, matrix_set: M) -> Self {
        Self { fetch, matrix_set }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetch
    }

    /// TMS coordinates covering the `extent`. See [`resolve`].
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if the layer was not preprocessed.
    pub fn resolve(&self, extent: &Extent, layer: &Layer) -> Result<Vec<TmsCoord>, Error> {
        resolve(&self.matrix_set, extent, layer)
    }

    /// Fetch textures of all tiles covering the command's extent.
    ///
    /// Textures are fetched concurrently and each of them succeeds or fails on its own. Returns
    /// once all of them have settled.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if the layer was not preprocessed.
    pub async fn execute_command(&self, command: &Command<'_>) -> Result<Settled, Error> {
        let coords = self.resolve(command.extent, command.layer)?;
        log::debug!(
            "Layer '{}' needs {} texture(s) at level {} or above.",
            command.layer.id,
            coords.len(),
            command.target_level
        );

        let branches = coords
            .into_iter()
            .map(|coord| self.fetch_one(command.layer, coord, command.target_level));

        Ok(stream::iter(branches)
            .buffer_unordered(self.fetch.max_concurrency().max(1))
            .collect::<Settled>()
            .await)
    }

    /// Like [`Self::execute_command`], but the tile gets either all its textures or none.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if the layer was not preprocessed, or [`Error::Fetch`] with the
    /// first failure, after all fetches have settled.
    pub async fn execute_command_all(
        &self,
        command: &Command<'_>,
    ) -> Result<Vec<FetchResult>, Error> {
        let settled = self.execute_command(command).await?;
        settled
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    async fn fetch_one(
        &self,
        layer: &Layer,
        coord: TmsCoord,
        target_level: u8,
    ) -> Result<FetchResult, FetchError> {
        let (coord, placement) = fallback(&self.matrix_set, coord, target_level);
        let url = crate::url::build(&layer.url, &coord);

        log::debug!("Getting {coord} from {url}.");
        let bytes = match self.fetch.fetch(&url, &layer.network_options).await {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Could not fetch '{url}': {e}");
                return Err(FetchError::Fetch {
                    coord,
                    url,
                    message: e.to_string(),
                });
            }
        };

        let mut texture = match Texture::new(&bytes, coord.clone()) {
            Ok(texture) => texture,
            Err(source) => {
                log::warn!("Failed to decode {coord}: {source}");
                return Err(FetchError::Decode { coord, source });
            }
        };

        if layer.transparent {
            texture.premultiply_alpha = true;
        }

        Ok(FetchResult { texture, placement })
    }

    /// Whether the tile covering `extent` is within layer's zoom range, once walked up to the
    /// `target_level`.
    ///
    /// Only the first TMS coordinate is evaluated, as if the tile needed exactly one texture.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if the layer was not preprocessed.
    pub fn inside_limit(
        &self,
        extent: &Extent,
        layer: &Layer,
        target_level: u8,
    ) -> Result<bool, Error> {
        self.covered(extent, layer, Some(target_level))
    }

    /// Number of textures the tile covering `extent` needs from this layer.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if the layer was not preprocessed.
    pub fn texture_count(&self, extent: &Extent, layer: &Layer) -> Result<usize, Error> {
        Ok(if self.covered(extent, layer, None)? {
            1
        } else {
            0
        })
    }

    fn covered(
        &self,
        extent: &Extent,
        layer: &Layer,
        target_level: Option<u8>,
    ) -> Result<bool, Error> {
        let coords = self.resolve(extent, layer)?;

        // Assume 1 texture per tile, i.e. tile is in the same CRS as the layer.
        let Some(coord) = coords.into_iter().next() else {
            return Ok(false);
        };

        let coord = match target_level {
            Some(target_level) => fallback(&self.matrix_set, coord, target_level).0,
            None => coord,
        };

        Ok(layer.zoom_range().contains(coord.zoom))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use bytes::Bytes;

    use super::*;
    use crate::coord::{MatrixSet, Placement};
    use crate::extent::Crs;
    use crate::io::NetworkOptions;
    use crate::layer::{LayerDefaults, LayerExtent, Origin, Protocol, ZoomRange};
    use crate::mercator::{HALF_CIRCUMFERENCE, total_tiles};
    use crate::texture::tests::png;

    #[derive(Debug, thiserror::Error)]
    #[error("connection refused")]
    struct Refused;

    /// Records requested URLs and serves a PNG, unless the URL is told to fail.
    #[derive(Default)]
    struct RecordingFetch {
        requested: Mutex<Vec<String>>,
        failing: HashSet<String>,
        garbage: HashSet<String>,
    }

    impl RecordingFetch {
        fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    impl Fetch for RecordingFetch {
        type Error = Refused;

        async fn fetch(&self, url: &str, _: &NetworkOptions) -> Result<Bytes, Refused> {
            self.requested.lock().unwrap().push(url.to_owned());

            if self.failing.contains(url) {
                Err(Refused)
            } else if self.garbage.contains(url) {
                Ok(Bytes::from_static(b"definitely not an image"))
            } else {
                Ok(Bytes::from(png(2, 2)))
            }
        }

        fn max_concurrency(&self) -> usize {
            6
        }
    }

    /// Always resolves to the same coordinates.
    struct FixedMatrixSet(Vec<TmsCoord>);

    impl TileMatrixSet for FixedMatrixSet {
        fn geographic_coords(&self, _: &Extent) -> Vec<TmsCoord> {
            self.0.clone()
        }

        fn generic_coords(&self, _: &Extent, _: &Extent, _: Origin) -> Vec<TmsCoord> {
            self.0.clone()
        }
    }

    /// Extent of a Web Mercator tile, counting rows from the top.
    fn pseudo_mercator_tile(zoom: u8, row: u32, col: u32) -> Extent {
        let size = 2. * HALF_CIRCUMFERENCE / total_tiles(zoom) as f64;
        let west = -HALF_CIRCUMFERENCE + col as f64 * size;
        let north = HALF_CIRCUMFERENCE - row as f64 * size;
        Extent::new(Crs::PseudoMercator, west, west + size, north - size, north)
    }

    fn xyz_layer(zoom: ZoomRange) -> Layer {
        let mut layer = Layer::new("osm", "https://tiles/{z}/{x}/{y}.png");
        layer.protocol = Protocol::Xyz;
        layer.zoom = Some(zoom);
        layer.preprocess(&LayerDefaults::default()).unwrap();
        layer
    }

    fn tms(zoom: u8, row: u32, col: u32) -> TmsCoord {
        TmsCoord::new(MatrixSet::Tms(Crs::PseudoMercator), zoom, row, col)
    }

    #[tokio::test]
    async fn deep_tile_is_fetched_from_ancestor() {
        let _ = env_logger::try_init();

        let layer = xyz_layer(ZoomRange { min: 0, max: 18 });
        let extent = pseudo_mercator_tile(20, 1000, 1001);
        let provider = TmsProvider::new(RecordingFetch::default());

        assert_eq!(vec![tms(20, 1000, 1001)], provider.resolve(&extent, &layer).unwrap());

        let command = Command {
            layer: &layer,
            extent: &extent,
            target_level: 18,
        };
        let results = provider.execute_command_all(&command).await.unwrap();

        // Exactly one fetch, for the ancestor two levels up.
        assert_eq!(
            vec!["https://tiles/18/250/250.png".to_owned()],
            provider.fetcher().requested()
        );
        assert_eq!(1, results.len());
        assert_eq!(tms(18, 250, 250), results[0].texture.coords);
        assert_eq!(
            Placement {
                offset_x: 0.25,
                offset_y: 0.,
                scale_x: 0.25,
                scale_y: 0.25,
            },
            results[0].placement
        );

        assert!(provider.inside_limit(&extent, &layer, 18).unwrap());
    }

    #[tokio::test]
    async fn tile_at_target_level_is_fetched_as_is() {
        let _ = env_logger::try_init();

        let layer = xyz_layer(ZoomRange { min: 0, max: 18 });
        let extent = pseudo_mercator_tile(12, 7, 9);
        let provider = TmsProvider::new(RecordingFetch::default());

        let command = Command {
            layer: &layer,
            extent: &extent,
            target_level: 12,
        };
        let results = provider.execute_command_all(&command).await.unwrap();

        assert_eq!(
            vec!["https://tiles/12/9/7.png".to_owned()],
            provider.fetcher().requested()
        );
        assert_eq!(Placement::IDENTITY, results[0].placement);
        assert_eq!(tms(12, 7, 9), results[0].texture.coords);
    }

    #[tokio::test]
    async fn transparent_layer_premultiplies_alpha() {
        let _ = env_logger::try_init();

        let mut layer = xyz_layer(ZoomRange { min: 0, max: 18 });
        let extent = pseudo_mercator_tile(3, 1, 2);
        let provider = TmsProvider::new(RecordingFetch::default());

        let command = Command {
            layer: &layer,
            extent: &extent,
            target_level: 3,
        };
        let opaque = provider.execute_command_all(&command).await.unwrap();
        assert!(!opaque[0].texture.premultiply_alpha);

        layer.transparent = true;
        let command = Command {
            layer: &layer,
            extent: &extent,
            target_level: 3,
        };
        let transparent = provider.execute_command_all(&command).await.unwrap();
        assert!(transparent[0].texture.premultiply_alpha);
    }

    #[tokio::test]
    async fn failing_fetch_does_not_affect_siblings() {
        let _ = env_logger::try_init();

        let layer = xyz_layer(ZoomRange { min: 0, max: 18 });
        let extent = pseudo_mercator_tile(12, 0, 0);

        // Each of them has a different ancestor at level 10.
        let coords = vec![tms(12, 4, 8), tms(12, 9, 13), tms(12, 14, 18)];

        let fetch = RecordingFetch {
            failing: HashSet::from(["https://tiles/10/3/2.png".to_owned()]),
            ..Default::default()
        };
        let provider = TmsProvider::with_matrix_set(fetch, FixedMatrixSet(coords));

        let command = Command {
            layer: &layer,
            extent: &extent,
            target_level: 10,
        };
        let settled = provider.execute_command(&command).await.unwrap();
        assert_eq!(3, settled.len());

        let mut succeeded: Vec<_> = settled
            .iter()
            .filter_map(|result| result.as_ref().ok())
            .map(|result| (result.texture.coords.clone(), result.placement))
            .collect();
        succeeded.sort_by_key(|(coords, _)| coords.row);

        assert_eq!(
            vec![
                (
                    tms(10, 1, 2),
                    Placement {
                        offset_x: 0.,
                        offset_y: 0.,
                        scale_x: 0.25,
                        scale_y: 0.25
                    }
                ),
                (
                    tms(10, 3, 4),
                    Placement {
                        offset_x: 0.5,
                        offset_y: 0.5,
                        scale_x: 0.25,
                        scale_y: 0.25
                    }
                ),
            ],
            succeeded
        );

        let failed: Vec<_> = settled.iter().filter_map(|r| r.as_ref().err()).collect();
        assert_eq!(1, failed.len());
        assert_eq!(&tms(10, 2, 3), failed[0].coord());
        assert!(matches!(failed[0], FetchError::Fetch { .. }));
    }

    #[tokio::test]
    async fn failing_fetch_fails_whole_tile() {
        let _ = env_logger::try_init();

        let layer = xyz_layer(ZoomRange { min: 0, max: 18 });
        let extent = pseudo_mercator_tile(12, 0, 0);
        let coords = vec![tms(12, 4, 8), tms(12, 5, 9), tms(12, 6, 10)];

        let fetch = RecordingFetch {
            garbage: HashSet::from(["https://tiles/12/9/5.png".to_owned()]),
            ..Default::default()
        };
        let provider = TmsProvider::with_matrix_set(fetch, FixedMatrixSet(coords));

        let command = Command {
            layer: &layer,
            extent: &extent,
            target_level: 12,
        };
        let result = provider.execute_command_all(&command).await;

        assert!(matches!(
            result,
            Err(Error::Fetch(FetchError::Decode { .. }))
        ));

        // All branches still ran to completion.
        assert_eq!(3, provider.fetcher().requested().len());
    }

    #[tokio::test]
    async fn command_on_raw_layer_is_a_configuration_error() {
        let layer = Layer::new("raw", "https://tiles/{z}/{x}/{y}.png");
        let extent = pseudo_mercator_tile(3, 1, 2);
        let provider = TmsProvider::new(RecordingFetch::default());

        let command = Command {
            layer: &layer,
            extent: &extent,
            target_level: 3,
        };

        assert!(matches!(
            provider.execute_command(&command).await,
            Err(Error::Configuration(_))
        ));
        assert!(provider.fetcher().requested().is_empty());
    }

    #[tokio::test]
    async fn geographic_tile_is_fetched_from_pseudo_mercator_pyramid() {
        let _ = env_logger::try_init();

        let layer = xyz_layer(ZoomRange { min: 0, max: 18 });
        let extent = Extent::new(Crs::Wgs84, -90., 0., 45., 90.);
        let provider = TmsProvider::new(RecordingFetch::default());

        let command = Command {
            layer: &layer,
            extent: &extent,
            target_level: 18,
        };
        let results = provider.execute_command_all(&command).await.unwrap();

        let mut requested = provider.fetcher().requested();
        requested.sort();
        assert_eq!(
            vec![
                "https://tiles/2/1/0.png".to_owned(),
                "https://tiles/2/1/1.png".to_owned()
            ],
            requested
        );
        assert!(
            results
                .iter()
                .all(|result| result.texture.coords.matrix_set == MatrixSet::PseudoMercator)
        );
    }

    #[test]
    fn inside_limit_boundaries() {
        let _ = env_logger::try_init();

        let layer = xyz_layer(ZoomRange { min: 3, max: 10 });
        let provider = TmsProvider::new(RecordingFetch::default());

        for (zoom, inside) in [(2, false), (3, true), (7, true), (10, true), (11, false)] {
            let extent = pseudo_mercator_tile(zoom, 0, 0);
            assert_eq!(
                inside,
                provider.inside_limit(&extent, &layer, zoom).unwrap(),
                "zoom {zoom}"
            );
            assert_eq!(
                usize::from(inside),
                provider.texture_count(&extent, &layer).unwrap(),
                "zoom {zoom}"
            );
        }
    }

    #[test]
    fn inside_limit_walks_up_to_target_level() {
        let layer = xyz_layer(ZoomRange { min: 3, max: 10 });
        let provider = TmsProvider::new(RecordingFetch::default());
        let extent = pseudo_mercator_tile(14, 100, 200);

        assert!(!provider.inside_limit(&extent, &layer, 14).unwrap());
        assert!(!provider.inside_limit(&extent, &layer, 11).unwrap());
        assert!(provider.inside_limit(&extent, &layer, 10).unwrap());
        assert!(provider.inside_limit(&extent, &layer, 3).unwrap());
        assert!(!provider.inside_limit(&extent, &layer, 2).unwrap());

        // Texture count does not walk up.
        assert_eq!(0, provider.texture_count(&extent, &layer).unwrap());
    }

    #[test]
    fn inside_limit_evaluates_first_coordinate_only() {
        let layer = xyz_layer(ZoomRange { min: 3, max: 10 });
        let provider = TmsProvider::with_matrix_set(
            RecordingFetch::default(),
            FixedMatrixSet(vec![tms(5, 0, 0), tms(15, 0, 0)]),
        );
        let extent = pseudo_mercator_tile(5, 0, 0);

        assert!(provider.inside_limit(&extent, &layer, 20).unwrap());
        assert_eq!(1, provider.texture_count(&extent, &layer).unwrap());
    }

    #[tokio::test]
    async fn coordinate_beyond_32_levels_walks_up_to_target_level() {
        let _ = env_logger::try_init();

        let layer = xyz_layer(ZoomRange { min: 0, max: 18 });
        let extent = pseudo_mercator_tile(5, 0, 0);
        let provider = TmsProvider::with_matrix_set(
            RecordingFetch::default(),
            FixedMatrixSet(vec![tms(40, 5, 5)]),
        );

        assert!(provider.inside_limit(&extent, &layer, 4).unwrap());
        assert!(!provider.inside_limit(&extent, &layer, 40).unwrap());

        let command = Command {
            layer: &layer,
            extent: &extent,
            target_level: 4,
        };
        let results = provider.execute_command_all(&command).await.unwrap();

        assert_eq!(
            vec!["https://tiles/4/0/0.png".to_owned()],
            provider.fetcher().requested()
        );
        assert_eq!(tms(4, 0, 0), results[0].texture.coords);
    }

    #[test]
    fn inside_limit_on_raw_layer_is_a_configuration_error() {
        let layer = Layer::new("raw", "");
        let provider = TmsProvider::new(RecordingFetch::default());
        let extent = pseudo_mercator_tile(5, 0, 0);

        assert!(matches!(
            provider.inside_limit(&extent, &layer, 5),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn bottom_origin_layer_gets_flipped_rows() {
        let mut layer = Layer::new("tms", "https://tiles/{z}/{x}/{y}.png");
        layer.extent = Some(LayerExtent::Extent(Extent::pseudo_mercator_world()));
        layer.preprocess(&LayerDefaults::default()).unwrap();
        assert_eq!(Some(Origin::Bottom), layer.origin);

        let provider = TmsProvider::new(RecordingFetch::default());
        let coords = provider
            .resolve(&pseudo_mercator_tile(3, 1, 2), &layer)
            .unwrap();

        assert_eq!(vec![tms(3, 6, 2)], coords);
    }
}
