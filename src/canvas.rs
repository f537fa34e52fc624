// ============================================================================
// IMAGE BUFFER — immutable pixel snapshot shared between history slots
// ============================================================================

use std::sync::Arc;

use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};

use crate::error::EditError;

/// Immutable snapshot of 8-bit pixel data (1, 3 or 4 channels).
///
/// Cloning is cheap: the pixels live behind an `Arc` and nothing ever writes
/// through it, so every clone behaves like an independent copy.  Operations
/// always build a fresh buffer.
#[derive(Clone, Debug)]
pub struct ImageBuffer {
    pixels: Arc<DynamicImage>,
}

impl ImageBuffer {
    /// Wrap a decoded image, normalising it to L8, RGB8 or RGBA8.
    /// Zero-sized images are rejected.
    pub fn new(image: DynamicImage) -> Result<Self, EditError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(EditError::OperationFailed(format!(
                "image has zero size ({}x{})",
                image.width(),
                image.height()
            )));
        }
        let normalised = match image {
            DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => {
                image
            }
            DynamicImage::ImageLuma16(_) => DynamicImage::ImageLuma8(image.to_luma8()),
            DynamicImage::ImageRgb16(_) | DynamicImage::ImageRgb32F(_) => {
                DynamicImage::ImageRgb8(image.to_rgb8())
            }
            // Luma+alpha and every wider format collapse to RGBA8
            other => DynamicImage::ImageRgba8(other.to_rgba8()),
        };
        Ok(Self {
            pixels: Arc::new(normalised),
        })
    }

    /// Build from raw interleaved bytes.
    pub fn from_raw(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Result<Self, EditError> {
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(EditError::OperationFailed(format!(
                "expected {} bytes for {}x{}x{}, got {}",
                expected,
                width,
                height,
                channels,
                data.len()
            )));
        }
        let image = match channels {
            1 => GrayImage::from_raw(width, height, data).map(DynamicImage::ImageLuma8),
            3 => RgbImage::from_raw(width, height, data).map(DynamicImage::ImageRgb8),
            4 => RgbaImage::from_raw(width, height, data).map(DynamicImage::ImageRgba8),
            n => {
                return Err(EditError::OperationFailed(format!(
                    "unsupported channel count {}",
                    n
                )));
            }
        };
        let image = image.ok_or_else(|| {
            EditError::OperationFailed("raw buffer does not match its dimensions".to_string())
        })?;
        Self::new(image)
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    /// 1 (luma), 3 (RGB) or 4 (RGBA).
    pub fn channels(&self) -> u8 {
        self.pixels.color().channel_count()
    }

    pub fn has_alpha(&self) -> bool {
        self.channels() == 4
    }

    /// Interleaved pixel bytes, row-major.
    pub fn as_bytes(&self) -> &[u8] {
        self.pixels.as_bytes()
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.pixels
    }

    /// Bytes held by this snapshot; used for history memory accounting.
    pub fn memory_bytes(&self) -> usize {
        self.as_bytes().len()
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width() as usize * self.channels() as usize
    }
}

impl PartialEq for ImageBuffer {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.pixels, &other.pixels) {
            return true;
        }
        self.dimensions() == other.dimensions()
            && self.channels() == other.channels()
            && self.as_bytes() == other.as_bytes()
    }
}

impl Eq for ImageBuffer {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_size_is_rejected() {
        let err = ImageBuffer::new(DynamicImage::new_rgb8(0, 4)).unwrap_err();
        assert!(matches!(err, EditError::OperationFailed(_)));
    }

    #[test]
    fn raw_length_must_match() {
        assert!(ImageBuffer::from_raw(2, 2, 3, vec![0; 11]).is_err());
        assert!(ImageBuffer::from_raw(2, 2, 2, vec![0; 8]).is_err());
        let buf = ImageBuffer::from_raw(2, 2, 3, vec![0; 12]).unwrap();
        assert_eq!(buf.dimensions(), (2, 2));
        assert_eq!(buf.channels(), 3);
        assert_eq!(buf.stride(), 6);
    }

    #[test]
    fn wide_formats_are_normalised_to_eight_bit() {
        let buf = ImageBuffer::new(DynamicImage::new_rgba16(3, 2)).unwrap();
        assert_eq!(buf.channels(), 4);
        assert_eq!(buf.memory_bytes(), 3 * 2 * 4);

        let buf = ImageBuffer::new(DynamicImage::new_luma_a8(3, 2)).unwrap();
        assert_eq!(buf.channels(), 4);

        let buf = ImageBuffer::new(DynamicImage::new_luma16(3, 2)).unwrap();
        assert_eq!(buf.channels(), 1);
    }

    #[test]
    fn equality_compares_pixels_not_identity() {
        let a = ImageBuffer::from_raw(1, 2, 1, vec![5, 6]).unwrap();
        let b = ImageBuffer::from_raw(1, 2, 1, vec![5, 6]).unwrap();
        let c = ImageBuffer::from_raw(2, 1, 1, vec![5, 6]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, a.clone());
        assert_ne!(a, c);
    }
}
