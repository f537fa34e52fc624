// ============================================================================
// IMAGE FILTERS — Gaussian blur, desaturation, Canny edges
// ============================================================================

use image::{DynamicImage, GrayImage, Luma, RgbImage, RgbaImage};
use rayon::prelude::*;

use crate::canvas::ImageBuffer;
use crate::error::EditError;

use super::catalog::MAX_BLUR_KERNEL;

/// Convert to greyscale (luminance-based desaturation).
/// Uses the BT.709 luminance weights: 0.2126 R + 0.7152 G + 0.0722 B.
/// Channel count and alpha are preserved.
pub fn desaturate(src: &ImageBuffer) -> Result<ImageBuffer, EditError> {
    let channels = src.channels() as usize;
    if channels == 1 {
        return Ok(src.clone());
    }
    let stride = src.stride();
    let src_raw = src.as_bytes();
    let mut dst_raw = vec![0u8; src_raw.len()];

    dst_raw.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        let row_in = &src_raw[y * stride..(y + 1) * stride];
        for (px_out, px_in) in row_out.chunks_exact_mut(channels).zip(row_in.chunks_exact(channels)) {
            let r = px_in[0] as f32;
            let g = px_in[1] as f32;
            let b = px_in[2] as f32;
            let lum = (0.2126 * r + 0.7152 * g + 0.0722 * b).round().clamp(0.0, 255.0) as u8;
            px_out[0] = lum;
            px_out[1] = lum;
            px_out[2] = lum;
            if channels == 4 {
                px_out[3] = px_in[3];
            }
        }
    });

    ImageBuffer::from_raw(src.width(), src.height(), src.channels(), dst_raw)
}

// ---------------------------------------------------------------------------
//  Parallel separable Gaussian blur (rayon)
// ---------------------------------------------------------------------------

/// Sigma implied by a kernel size when none is given explicitly
/// (same derivation OpenCV uses for `sigma = 0`).
pub fn sigma_for_kernel(kernel_size: u32) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Build a normalised 1-D Gaussian kernel of exactly `size` taps.
fn build_gaussian_kernel(size: u32) -> Vec<f32> {
    let radius = (size / 2) as usize;
    if radius == 0 {
        return vec![1.0];
    }
    let sigma = sigma_for_kernel(size);
    let len = radius * 2 + 1;
    let s2 = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (0..len)
        .map(|i| {
            let x = i as f32 - radius as f32;
            (-x * x / s2).exp()
        })
        .collect();
    let inv = 1.0 / kernel.iter().sum::<f32>();
    for v in &mut kernel {
        *v *= inv;
    }
    kernel
}

/// Fold taps further than `max_radius` from the centre onto the outermost
/// kept tap.  With clamped edges those taps all read the same edge pixel, so
/// the result is unchanged while the per-pixel cost is bounded by the image.
fn fold_kernel(kernel: Vec<f32>, max_radius: usize) -> Vec<f32> {
    let radius = kernel.len() / 2;
    if radius <= max_radius {
        return kernel;
    }
    let cut = radius - max_radius;
    let mut folded = kernel[cut..kernel.len() - cut].to_vec();
    let outer: f32 = kernel[..cut].iter().sum();
    let last = folded.len() - 1;
    folded[0] += outer;
    folded[last] += outer;
    folded
}

/// Gaussian blur with a square `kernel_size` × `kernel_size` kernel.
/// `kernel_size` must be odd; 1 returns the input unchanged.
/// Edges are clamped.  Every channel, alpha included, is blurred.
pub fn gaussian_blur(src: &ImageBuffer, kernel_size: u32) -> Result<ImageBuffer, EditError> {
    if kernel_size % 2 == 0 || kernel_size > MAX_BLUR_KERNEL {
        return Err(EditError::InvalidParameter(format!(
            "blur kernel size must be odd and at most {}, got {}",
            MAX_BLUR_KERNEL, kernel_size
        )));
    }
    if kernel_size <= 1 {
        return Ok(src.clone());
    }

    let w = src.width() as usize;
    let h = src.height() as usize;
    let ch = src.channels() as usize;
    let stride = w * ch;
    let kernel = fold_kernel(build_gaussian_kernel(kernel_size), w.max(h) - 1);
    let radius = kernel.len() / 2;

    let buf_in: Vec<f32> = src.as_bytes().iter().map(|&b| b as f32).collect();

    // --- Horizontal pass (parallel by row) ---
    let mut buf_h = vec![0.0f32; buf_in.len()];
    buf_h.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        let row_in = &buf_in[y * stride..(y + 1) * stride];
        for x in 0..w {
            for c in 0..ch {
                let mut acc = 0.0f32;
                for (ki, &kv) in kernel.iter().enumerate() {
                    let sx = (x as isize + ki as isize - radius as isize).clamp(0, w as isize - 1) as usize;
                    acc += row_in[sx * ch + c] * kv;
                }
                row_out[x * ch + c] = acc;
            }
        }
    });

    // --- Vertical pass (parallel by row) ---
    let mut dst_raw = vec![0u8; buf_in.len()];
    dst_raw.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        for x in 0..w {
            for c in 0..ch {
                let mut acc = 0.0f32;
                for (ki, &kv) in kernel.iter().enumerate() {
                    let sy = (y as isize + ki as isize - radius as isize).clamp(0, h as isize - 1) as usize;
                    acc += buf_h[sy * stride + x * ch + c] * kv;
                }
                row_out[x * ch + c] = acc.round().clamp(0.0, 255.0) as u8;
            }
        }
    });

    ImageBuffer::from_raw(src.width(), src.height(), src.channels(), dst_raw)
}

// ---------------------------------------------------------------------------
//  Canny edge detection
// ---------------------------------------------------------------------------

/// Canny edge detection on the luminance of `src`.
/// The white-on-black edge map is expanded back to the source channel count
/// (alpha, when present, is opaque).
pub fn canny_edges(src: &ImageBuffer, low: f32, high: f32) -> Result<ImageBuffer, EditError> {
    if !(low >= 0.0 && low <= high) {
        return Err(EditError::InvalidParameter(format!(
            "edge thresholds must satisfy 0 <= low <= high, got {} / {}",
            low, high
        )));
    }
    let gray: GrayImage = src.as_dynamic().to_luma8();
    let edges = imageproc::edges::canny(&gray, low, high);

    let out = match src.channels() {
        1 => DynamicImage::ImageLuma8(edges),
        3 => DynamicImage::ImageRgb8(RgbImage::from_fn(edges.width(), edges.height(), |x, y| {
            let Luma([v]) = *edges.get_pixel(x, y);
            image::Rgb([v, v, v])
        })),
        _ => DynamicImage::ImageRgba8(RgbaImage::from_fn(edges.width(), edges.height(), |x, y| {
            let Luma([v]) = *edges.get_pixel(x, y);
            image::Rgba([v, v, v, 255])
        })),
    };
    ImageBuffer::new(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba(w: u32, h: u32, f: impl Fn(u32, u32) -> [u8; 4]) -> ImageBuffer {
        let img = RgbaImage::from_fn(w, h, |x, y| image::Rgba(f(x, y)));
        ImageBuffer::new(DynamicImage::ImageRgba8(img)).unwrap()
    }

    #[test]
    fn kernel_sums_to_one() {
        for size in [3, 5, 9, 31] {
            let k = build_gaussian_kernel(size);
            assert_eq!(k.len(), size as usize);
            assert!((k.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn blur_rejects_oversized_kernels() {
        let src = rgba(4, 4, |_, _| [0, 0, 0, 255]);
        assert!(matches!(
            gaussian_blur(&src, MAX_BLUR_KERNEL + 2),
            Err(EditError::InvalidParameter(_))
        ));
        assert!(gaussian_blur(&src, 20_000_001).is_err());
    }

    #[test]
    fn folding_keeps_weight_and_result() {
        let k = build_gaussian_kernel(51);
        let folded = fold_kernel(k.clone(), 3);
        assert_eq!(folded.len(), 7);
        assert!((folded.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert_eq!(fold_kernel(k.clone(), 40), k);

        // Wide kernel on a tiny image behaves like the same kernel unfolded
        let src = rgba(4, 3, |x, y| [(x * 60) as u8, (y * 90) as u8, 30, 255]);
        let out = gaussian_blur(&src, 51).unwrap();
        assert_eq!(out.dimensions(), (4, 3));
        let reference = naive_blur(&src, &k);
        for (a, b) in out.as_bytes().iter().zip(&reference) {
            assert!(a.abs_diff(*b) <= 1, "{} vs {}", a, b);
        }
    }

    fn naive_blur(src: &ImageBuffer, kernel: &[f32]) -> Vec<u8> {
        let (w, h, ch) = (src.width() as isize, src.height() as isize, src.channels() as usize);
        let r = (kernel.len() / 2) as isize;
        let px = src.as_bytes();
        let at = |x: isize, y: isize, c: usize| px[((y.clamp(0, h - 1) * w + x.clamp(0, w - 1)) as usize) * ch + c] as f32;
        let mut horiz = vec![0.0f32; px.len()];
        for y in 0..h {
            for x in 0..w {
                for c in 0..ch {
                    horiz[(y * w + x) as usize * ch + c] =
                        kernel.iter().enumerate().map(|(i, kv)| at(x + i as isize - r, y, c) * kv).sum();
                }
            }
        }
        let mut out = vec![0u8; px.len()];
        for y in 0..h {
            for x in 0..w {
                for c in 0..ch {
                    let acc: f32 = kernel
                        .iter()
                        .enumerate()
                        .map(|(i, kv)| horiz[((y + i as isize - r).clamp(0, h - 1) * w + x) as usize * ch + c] * kv)
                        .sum();
                    out[(y * w + x) as usize * ch + c] = acc.round().clamp(0.0, 255.0) as u8;
                }
            }
        }
        out
    }

    #[test]
    fn blur_of_flat_image_is_identity() {
        let src = rgba(6, 5, |_, _| [40, 80, 120, 255]);
        let out = gaussian_blur(&src, 5).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn blur_rejects_even_kernels() {
        let src = rgba(2, 2, |_, _| [0, 0, 0, 255]);
        assert!(matches!(gaussian_blur(&src, 4), Err(EditError::InvalidParameter(_))));
    }

    #[test]
    fn blur_spreads_a_single_bright_pixel() {
        let src = rgba(7, 7, |x, y| if x == 3 && y == 3 { [255, 255, 255, 255] } else { [0, 0, 0, 255] });
        let out = gaussian_blur(&src, 3).unwrap();
        let center = out.as_bytes()[(3 * 7 + 3) * 4];
        let neighbour = out.as_bytes()[(3 * 7 + 4) * 4];
        assert!(center < 255);
        assert!(neighbour > 0);
        // Input untouched
        assert_eq!(src.as_bytes()[(3 * 7 + 3) * 4], 255);
    }

    #[test]
    fn desaturate_equalises_channels_and_keeps_alpha() {
        let src = rgba(2, 1, |x, _| if x == 0 { [255, 0, 0, 10] } else { [0, 0, 255, 200] });
        let out = desaturate(&src).unwrap();
        let px = out.as_bytes();
        assert_eq!(&px[0..4], &[54, 54, 54, 10]);
        assert_eq!(&px[4..8], &[18, 18, 18, 200]);
    }

    #[test]
    fn edges_of_flat_image_are_empty() {
        let src = ImageBuffer::from_raw(8, 8, 3, vec![90; 8 * 8 * 3]).unwrap();
        let out = canny_edges(&src, 80.0, 160.0).unwrap();
        assert_eq!(out.channels(), 3);
        assert!(out.as_bytes().iter().all(|&v| v == 0));
    }

    #[test]
    fn edges_find_a_hard_boundary() {
        let src = rgba(16, 16, |x, _| if x < 8 { [0, 0, 0, 255] } else { [255, 255, 255, 255] });
        let out = canny_edges(&src, 50.0, 100.0).unwrap();
        assert_eq!(out.channels(), 4);
        assert!(out.as_bytes().chunks_exact(4).any(|p| p[0] == 255));
    }

    #[test]
    fn edges_reject_inverted_thresholds() {
        let src = rgba(2, 2, |_, _| [0, 0, 0, 255]);
        assert!(canny_edges(&src, 100.0, 50.0).is_err());
        assert!(canny_edges(&src, -1.0, 50.0).is_err());
    }
}
