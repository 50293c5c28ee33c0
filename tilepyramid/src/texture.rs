use std::sync::Arc;

use image::{ImageError, RgbaImage};

use crate::coord::{Placement, TmsCoord};

/// Decoded texture of a single tile.
#[derive(Debug, Clone)]
pub struct Texture {
    pub image: Arc<RgbaImage>,

    /// Tile this texture was fetched for.
    pub coords: TmsCoord,

    /// Alpha should be premultiplied before compositing, set for transparent layers.
    pub premultiply_alpha: bool,
}

impl Texture {
    pub fn new(bytes: &[u8], coords: TmsCoord) -> Result<Self, ImageError> {
        let image = image::load_from_memory(bytes)?.to_rgba8();
        Ok(Self::from_image(image, coords))
    }

    pub fn from_image(image: RgbaImage, coords: TmsCoord) -> Self {
        Self {
            image: Arc::new(image),
            coords,
            premultiply_alpha: false,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Texture along with the part of it, where the requested tile is.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub texture: Texture,
    pub placement: Placement,
}
