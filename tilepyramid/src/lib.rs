#![doc = include_str!("../README.md")]
#![deny(clippy::unwrap_used, rustdoc::broken_intra_doc_links)]

mod coord;
mod error;
mod extent;
pub mod io;
mod layer;
mod mercator;
mod provider;
mod resolve;
mod texture;
pub mod tile_matrix;
pub mod url;

pub use coord::{MatrixSet, Placement, TmsCoord};
pub use error::{Error, FetchError};
pub use extent::{Crs, Extent};
pub use io::{Fetch, HttpFetch, HttpOptions, NetworkOptions};
pub use layer::{CoordinateStrategy, Layer, LayerDefaults, LayerExtent, Origin, Protocol, ZoomRange};
pub use mercator::{HALF_CIRCUMFERENCE, MAX_LATITUDE, total_tiles};
pub use provider::{Command, Settled, TmsProvider};
pub use resolve::{fallback, resolve};
pub use texture::{FetchResult, Texture};
pub use tile_matrix::{StandardTileMatrixSet, TileMatrixSet};
