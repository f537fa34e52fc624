// ============================================================================
// ADJUSTMENT OPERATIONS — brightness and contrast
// ============================================================================
//
// Both adjustments are per-value tone curves, so they are baked into a
// 256-entry lookup table and applied row-parallel via rayon.  Alpha is never
// touched.
// ============================================================================

use rayon::prelude::*;

use crate::canvas::ImageBuffer;
use crate::error::EditError;

/// Apply `lut` to every colour channel of `src`; alpha passes through.
fn apply_lut(src: &ImageBuffer, lut: &[u8; 256]) -> Result<ImageBuffer, EditError> {
    let channels = src.channels() as usize;
    let color_channels = if channels == 4 { 3 } else { channels };
    let stride = src.stride();
    let src_raw = src.as_bytes();
    let mut dst_raw = vec![0u8; src_raw.len()];

    dst_raw.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        let row_in = &src_raw[y * stride..(y + 1) * stride];
        for (px_out, px_in) in row_out.chunks_exact_mut(channels).zip(row_in.chunks_exact(channels)) {
            for c in 0..color_channels {
                px_out[c] = lut[px_in[c] as usize];
            }
            if channels == 4 {
                px_out[3] = px_in[3];
            }
        }
    });

    ImageBuffer::from_raw(src.width(), src.height(), src.channels(), dst_raw)
}

fn build_lut(f: impl Fn(f32) -> f32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (i, out) in lut.iter_mut().enumerate() {
        *out = f(i as f32).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Brightness: additive offset, saturating at 0 and 255.
/// `offset`: -255..255 (0 = no change)
pub fn brightness(src: &ImageBuffer, offset: i32) -> Result<ImageBuffer, EditError> {
    if offset == 0 {
        return Ok(src.clone());
    }
    let lut = build_lut(|v| v + offset as f32);
    apply_lut(src, &lut)
}

/// Contrast: multiplicative gain.
/// `percent`: 0..200 (100 = no change, 0 = black)
pub fn contrast(src: &ImageBuffer, percent: u32) -> Result<ImageBuffer, EditError> {
    if percent == 100 {
        return Ok(src.clone());
    }
    let gain = percent as f32 / 100.0;
    let lut = build_lut(|v| v * gain);
    apply_lut(src, &lut)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba_px(px: [u8; 4]) -> ImageBuffer {
        ImageBuffer::from_raw(1, 1, 4, px.to_vec()).unwrap()
    }

    #[test]
    fn brightness_saturates() {
        let out = brightness(&rgba_px([10, 128, 250, 77]), 20).unwrap();
        assert_eq!(out.as_bytes(), &[30, 148, 255, 77]);
        let out = brightness(&rgba_px([10, 128, 250, 77]), -20).unwrap();
        assert_eq!(out.as_bytes(), &[0, 108, 230, 77]);
    }

    #[test]
    fn contrast_hundred_is_identity() {
        let src = rgba_px([1, 2, 3, 4]);
        assert_eq!(contrast(&src, 100).unwrap(), src);
    }

    #[test]
    fn contrast_scales_colour_only() {
        let out = contrast(&rgba_px([100, 200, 0, 50]), 150).unwrap();
        assert_eq!(out.as_bytes(), &[150, 255, 0, 50]);
        let out = contrast(&rgba_px([100, 200, 0, 50]), 0).unwrap();
        assert_eq!(out.as_bytes(), &[0, 0, 0, 50]);
    }

    #[test]
    fn luma_buffers_are_adjusted_too() {
        let src = ImageBuffer::from_raw(2, 1, 1, vec![10, 20]).unwrap();
        assert_eq!(brightness(&src, 5).unwrap().as_bytes(), &[15, 25]);
    }
}
