use anyhow::{bail, Result};
use image::{DynamicImage, GrayImage, RgbImage};
use std::path::Path;

/// One captured color frame. Owned by the caller; the pipeline only reads it.
///
/// Continuous-mode readers receive clones (snapshot-on-read), never aliases
/// into the producer's buffer.
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    /// Wrap a decoded raster.
    ///
    /// A zero-sized frame indicates a broken upstream contract and is the one
    /// condition the pipeline propagates as a hard error.
    pub fn new(image: RgbImage) -> Result<Self> {
        if image.width() == 0 || image.height() == 0 {
            bail!(
                "invalid frame: {}x{} raster",
                image.width(),
                image.height()
            );
        }
        Ok(Self { image })
    }

    pub fn from_dynamic(image: DynamicImage) -> Result<Self> {
        Self::new(image.to_rgb8())
    }

    pub fn open(path: &Path) -> Result<Self> {
        Self::from_dynamic(image::open(path)?)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.image
    }
}

/// Binary foreground mask, same dimensions as the frame it was derived from.
/// 0 is background, 255 is foreground.
pub type Mask = GrayImage;

/// Number of foreground pixels in a mask.
pub fn mask_area(mask: &Mask) -> u64 {
    mask.pixels().filter(|p| p.0[0] != 0).count() as u64
}

pub fn mask_is_empty(mask: &Mask) -> bool {
    mask.pixels().all(|p| p.0[0] == 0)
}
