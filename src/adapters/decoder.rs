//! Raster Image Decoder
//!
//! [`ImageDecoder`] backed by the `image` crate. The format is sniffed from
//! the bytes; the memory cost is the RGBA8 footprint of the pixel grid.

use image::{DynamicImage, GenericImageView};

use crate::domain::ImageDecoder;
use crate::error::DecodeError;

/// Decodes PNG, JPEG, GIF and WebP payloads
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterDecoder;

impl ImageDecoder for RasterDecoder {
    type Image = DynamicImage;

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, DecodeError> {
        image::load_from_memory(bytes).map_err(|e| DecodeError(e.to_string()))
    }

    fn cost(&self, image: &DynamicImage) -> u64 {
        let (width, height) = image.dimensions();
        u64::from(width) * u64::from(height) * 4
    }
}
