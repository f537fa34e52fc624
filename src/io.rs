// ============================================================================
// FILE IO — decode into ImageBuffer, encode committed buffers back to disk
// ============================================================================

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::tiff::TiffEncoder;
use image::{ColorType, DynamicImage, ImageEncoder};

use crate::canvas::ImageBuffer;
use crate::error::EditError;

/// Output formats the editor writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SaveFormat {
    #[default]
    Png,
    Jpeg,
    Bmp,
    Tiff,
}

impl SaveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SaveFormat::Png => "png",
            SaveFormat::Jpeg => "jpg",
            SaveFormat::Bmp => "bmp",
            SaveFormat::Tiff => "tiff",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SaveFormat::Png => "PNG",
            SaveFormat::Jpeg => "JPEG",
            SaveFormat::Bmp => "BMP",
            SaveFormat::Tiff => "TIFF",
        }
    }

    pub fn supports_quality(&self) -> bool {
        matches!(self, SaveFormat::Jpeg)
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(SaveFormat::Png),
            "jpg" | "jpeg" => Some(SaveFormat::Jpeg),
            "bmp" => Some(SaveFormat::Bmp),
            "tif" | "tiff" => Some(SaveFormat::Tiff),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

/// Decode an image file into an editor buffer.
pub fn load_image(path: &Path) -> Result<ImageBuffer, EditError> {
    let img = image::open(path).map_err(|e| {
        log_err!("Could not read {}: {}", path.display(), e);
        EditError::from(e)
    })?;
    let buffer = ImageBuffer::new(img)?;
    log_info!(
        "Loaded {} ({}x{}, {} ch)",
        path.display(),
        buffer.width(),
        buffer.height(),
        buffer.channels()
    );
    Ok(buffer)
}

/// Encode and write a buffer to a file.
/// A standalone function so it can run on a background thread.
pub fn encode_and_write(
    buffer: &ImageBuffer,
    path: &Path,
    format: SaveFormat,
    quality: u8,
) -> Result<(), EditError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let (w, h) = buffer.dimensions();
    let color = buffer.as_dynamic().color();

    match format {
        SaveFormat::Png => {
            PngEncoder::new(&mut writer).write_image(buffer.as_bytes(), w, h, color)?;
        }
        SaveFormat::Jpeg => {
            let mut encoder = JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100));
            if buffer.has_alpha() {
                // JPEG has no alpha channel
                let rgb = DynamicImage::to_rgb8(buffer.as_dynamic());
                encoder.encode(rgb.as_raw(), w, h, ColorType::Rgb8)?;
            } else {
                encoder.encode(buffer.as_bytes(), w, h, color)?;
            }
        }
        SaveFormat::Bmp => {
            let mut encoder = BmpEncoder::new(&mut writer);
            encoder.encode(buffer.as_bytes(), w, h, color)?;
        }
        SaveFormat::Tiff => {
            TiffEncoder::new(&mut writer).write_image(buffer.as_bytes(), w, h, color)?;
        }
    }

    writer.flush()?;
    log_info!("Saved {} as {}", path.display(), format.label());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(ext: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("retouch-io-{}.{}", uuid::Uuid::new_v4(), ext))
    }

    fn sample(channels: u8) -> ImageBuffer {
        let n = 5 * 3 * channels as usize;
        let data: Vec<u8> = (0..n).map(|i| (i * 11 % 256) as u8).collect();
        ImageBuffer::from_raw(5, 3, channels, data).unwrap()
    }

    #[test]
    fn lossless_formats_keep_pixels() {
        for (format, channels) in [
            (SaveFormat::Png, 4),
            (SaveFormat::Png, 1),
            (SaveFormat::Bmp, 3),
            (SaveFormat::Tiff, 3),
        ] {
            let path = temp_path(format.extension());
            let src = sample(channels);
            encode_and_write(&src, &path, format, 90).unwrap();
            let back = load_image(&path).unwrap();
            let _ = std::fs::remove_file(&path);
            assert_eq!(back, src, "{:?} with {} channels", format, channels);
        }
    }

    #[test]
    fn jpeg_drops_alpha() {
        let path = temp_path("jpg");
        encode_and_write(&sample(4), &path, SaveFormat::Jpeg, 85).unwrap();
        let back = load_image(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(back.channels(), 3);
        assert_eq!(back.dimensions(), (5, 3));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_image(&temp_path("png")).unwrap_err();
        assert!(matches!(err, EditError::Io(_) | EditError::Codec(_)));
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(SaveFormat::from_path(Path::new("a/b.JPEG")), Some(SaveFormat::Jpeg));
        assert_eq!(SaveFormat::from_path(Path::new("x.tif")), Some(SaveFormat::Tiff));
        assert_eq!(SaveFormat::from_path(Path::new("x.gif")), None);
        assert_eq!(SaveFormat::from_path(Path::new("noext")), None);
        assert!(SaveFormat::Jpeg.supports_quality());
        assert!(!SaveFormat::Png.supports_quality());
    }
}
