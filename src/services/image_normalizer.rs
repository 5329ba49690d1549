// src/services/image_normalizer.rs
use crate::errors::TryOnError;
use crate::models::{ImageData, ImageFormat, ImageInput};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, ImageFormat as ImgFormat};
use log::debug;
use std::sync::Arc;

/// JPEG quality used when converting to the canonical encoding.
pub const CANONICAL_JPEG_QUALITY: u8 = 90;

pub struct ImageNormalizer;

impl ImageNormalizer {
    /// Classifies `data` by its magic bytes. Nothing is decoded here.
    pub fn normalize(data: Vec<u8>) -> Result<ImageData, TryOnError> {
        if data.is_empty() {
            return Err(TryOnError::Normalization(
                "image data cannot be empty".to_string(),
            ));
        }

        let format = match image::guess_format(&data) {
            Ok(ImgFormat::Jpeg) => ImageFormat::Jpeg,
            Ok(ImgFormat::Png) => ImageFormat::Png,
            Ok(ImgFormat::Gif) => ImageFormat::Gif,
            Ok(ImgFormat::WebP) => ImageFormat::Webp,
            Ok(other) => {
                return Err(TryOnError::Normalization(format!(
                    "unsupported format: {:?}",
                    other
                )));
            }
            Err(e) => {
                return Err(TryOnError::Normalization(format!(
                    "unsupported format: {}",
                    e
                )));
            }
        };

        Ok(ImageData::from_parts(data, format))
    }

    /// Like [`normalize`](Self::normalize), logging when the declared MIME
    /// type disagrees with the bytes. The bytes win.
    pub fn normalize_input(input: ImageInput) -> Result<ImageData, TryOnError> {
        let image = Self::normalize(input.data)?;

        if let Some(hint) = input.mime_hint.as_deref() {
            if !hint.eq_ignore_ascii_case(image.format().mime_type()) {
                debug!(
                    "Declared MIME type {} does not match detected {}",
                    hint,
                    image.format().mime_type()
                );
            }
        }

        Ok(image)
    }

    /// Returns `image` itself when it is already JPEG, otherwise a freshly
    /// re-encoded copy.
    pub fn to_canonical_encoding(image: Arc<ImageData>) -> Result<Arc<ImageData>, TryOnError> {
        if image.is_jpeg() {
            return Ok(image);
        }

        let decoded = image::load_from_memory(image.data()).map_err(|e| {
            TryOnError::Normalization(format!("failed to decode image: {}", e))
        })?;

        // JPEG has no alpha channel.
        let rgb = decoded.to_rgb8();

        let mut output = Vec::new();
        JpegEncoder::new_with_quality(&mut output, CANONICAL_JPEG_QUALITY)
            .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
            .map_err(|e| TryOnError::Normalization(format!("failed to encode to JPEG: {}", e)))?;

        debug!(
            "Converted {:?} image ({} bytes) to JPEG ({} bytes)",
            image.format(),
            image.len(),
            output.len()
        );

        Ok(Arc::new(ImageData::from_parts(output, ImageFormat::Jpeg)))
    }
}

#[cfg(test)]
pub(crate) mod test_images {
    use image::{DynamicImage, ImageFormat as ImgFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    pub fn encoded(format: ImgFormat, color: [u8; 4]) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba(color)));
        let img = match format {
            ImgFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()),
            _ => img,
        };
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), format).unwrap();
        out
    }

    pub fn png(color: [u8; 4]) -> Vec<u8> {
        encoded(ImgFormat::Png, color)
    }

    pub fn jpeg(color: [u8; 4]) -> Vec<u8> {
        encoded(ImgFormat::Jpeg, color)
    }

    /// JPEG magic followed by filler. Detectable, not decodable.
    pub fn jpeg_stub(len: usize) -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
        data.resize(len, 0x11);
        data
    }
}
