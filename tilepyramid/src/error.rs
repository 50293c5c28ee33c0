use crate::coord::TmsCoord;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Layer is missing something needed to compute its tiles. Retrying will not help.
    #[error("Layer configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Failure of a single texture of a command.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Could not fetch {coord} from '{url}': {message}")]
    Fetch {
        coord: TmsCoord,
        url: String,
        message: String,
    },

    #[error("Could not decode {coord}: {source}")]
    Decode {
        coord: TmsCoord,
        #[source]
        source: image::ImageError,
    },
}

impl FetchError {
    /// Coordinate of the texture which failed.
    pub fn coord(&self) -> &TmsCoord {
        match self {
            Self::Fetch { coord, .. } | Self::Decode { coord, .. } => coord,
        }
    }
}
