// ============================================================================
// TRANSFORM OPERATIONS — flip, rotate, percentage resize
// ============================================================================

use std::fmt;
use std::str::FromStr;

use image::imageops;

use crate::canvas::ImageBuffer;
use crate::error::EditError;

/// Interpolation method for resize operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Interpolation {
    Nearest,
    #[default]
    Bilinear,
    Bicubic,
    Lanczos3,
}

impl Interpolation {
    pub fn label(&self) -> &'static str {
        match self {
            Interpolation::Nearest => "nearest",
            Interpolation::Bilinear => "bilinear",
            Interpolation::Bicubic => "bicubic",
            Interpolation::Lanczos3 => "lanczos3",
        }
    }

    pub fn all() -> &'static [Interpolation] {
        &[
            Interpolation::Nearest,
            Interpolation::Bilinear,
            Interpolation::Bicubic,
            Interpolation::Lanczos3,
        ]
    }

    pub fn to_filter(&self) -> imageops::FilterType {
        match self {
            Interpolation::Nearest => imageops::FilterType::Nearest,
            Interpolation::Bilinear => imageops::FilterType::Triangle,
            Interpolation::Bicubic => imageops::FilterType::CatmullRom,
            Interpolation::Lanczos3 => imageops::FilterType::Lanczos3,
        }
    }
}

impl FromStr for Interpolation {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Interpolation::all()
            .iter()
            .copied()
            .find(|i| i.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EditError::InvalidParameter(format!("unknown interpolation '{}'", s)))
    }
}

/// Clockwise quarter-turn rotations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rotation {
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    pub fn degrees(&self) -> u32 {
        match self {
            Rotation::Cw90 => 90,
            Rotation::Cw180 => 180,
            Rotation::Cw270 => 270,
        }
    }

    pub fn from_degrees(degrees: u32) -> Result<Self, EditError> {
        match degrees {
            90 => Ok(Rotation::Cw90),
            180 => Ok(Rotation::Cw180),
            270 => Ok(Rotation::Cw270),
            other => Err(EditError::InvalidParameter(format!(
                "rotation must be 90, 180 or 270 degrees, got {}",
                other
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlipAxis {
    /// Mirror left↔right.
    Horizontal,
    /// Mirror top↔bottom.
    Vertical,
}

impl fmt::Display for FlipAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlipAxis::Horizontal => write!(f, "horizontal"),
            FlipAxis::Vertical => write!(f, "vertical"),
        }
    }
}

impl FromStr for FlipAxis {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "horizontal" | "h" => Ok(FlipAxis::Horizontal),
            "vertical" | "v" => Ok(FlipAxis::Vertical),
            other => Err(EditError::InvalidParameter(format!(
                "flip must be horizontal or vertical, got '{}'",
                other
            ))),
        }
    }
}

/// Rotate clockwise (90° and 270° swap W↔H).
pub fn rotate(src: &ImageBuffer, rotation: Rotation) -> Result<ImageBuffer, EditError> {
    let img = src.as_dynamic();
    let out = match rotation {
        Rotation::Cw90 => img.rotate90(),
        Rotation::Cw180 => img.rotate180(),
        Rotation::Cw270 => img.rotate270(),
    };
    ImageBuffer::new(out)
}

pub fn flip(src: &ImageBuffer, axis: FlipAxis) -> Result<ImageBuffer, EditError> {
    let img = src.as_dynamic();
    let out = match axis {
        FlipAxis::Horizontal => img.fliph(),
        FlipAxis::Vertical => img.flipv(),
    };
    ImageBuffer::new(out)
}

/// Target size for a uniform percentage scale.  Each side is floored and
/// never drops below one pixel.
pub fn scaled_dimensions(width: u32, height: u32, percent: u32) -> (u32, u32) {
    let scale = |v: u32| ((v as u64 * percent as u64) / 100).clamp(1, u32::MAX as u64) as u32;
    (scale(width), scale(height))
}

/// Resize both axes by `percent`.
pub fn resize_percent(src: &ImageBuffer, percent: u32, interp: Interpolation) -> Result<ImageBuffer, EditError> {
    if percent == 0 {
        return Err(EditError::InvalidParameter("resize percentage must be positive".into()));
    }
    let (new_w, new_h) = scaled_dimensions(src.width(), src.height(), percent);
    if (new_w, new_h) == src.dimensions() {
        return Ok(src.clone());
    }
    let out = src.as_dynamic().resize_exact(new_w, new_h, interp.to_filter());
    ImageBuffer::new(out)
}
