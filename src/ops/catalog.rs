// ============================================================================
// OPERATION CATALOG — the eight edits, their parameter domains and labels
// ============================================================================

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::str::FromStr;

use crate::canvas::ImageBuffer;
use crate::error::EditError;

use super::transform::{FlipAxis, Interpolation, Rotation};
use super::{adjustments, filters, transform};

/// Default Canny hysteresis thresholds.
pub const DEFAULT_CANNY: (f32, f32) = (80.0, 160.0);
/// Largest accepted resize percentage.
pub const MAX_RESIZE_PERCENT: u32 = 400;
/// Largest accepted contrast percentage (100 = identity).
pub const MAX_CONTRAST_PERCENT: u32 = 200;
/// Brightness offsets live in `-MAX..=MAX`.
pub const MAX_BRIGHTNESS_OFFSET: i32 = 255;
/// Largest accepted blur kernel size.
pub const MAX_BLUR_KERNEL: u32 = 101;

/// One catalogue edit with its parameters.
#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    Grayscale,
    /// `kernel`: odd, positive; 1 is the identity.
    Blur { kernel: u32 },
    Edges { low: f32, high: f32 },
    Brightness { offset: i32 },
    /// `percent`: 0..=200, 100 is the identity.
    Contrast { percent: u32 },
    Rotate(Rotation),
    Flip(FlipAxis),
    Resize { percent: u32, filter: Interpolation },
}

impl Operation {
    /// Blur from a raw slider position: non-positive means no blur and even
    /// sizes are bumped to the next odd one.
    pub fn blur_from_slider(value: i32) -> Self {
        let k = value.clamp(1, MAX_BLUR_KERNEL as i32 - 1) as u32;
        Operation::Blur {
            kernel: if k % 2 == 0 { k + 1 } else { k },
        }
    }

    pub fn edges_default() -> Self {
        Operation::Edges {
            low: DEFAULT_CANNY.0,
            high: DEFAULT_CANNY.1,
        }
    }

    /// Short lowercase name, e.g. for "Adjusting blur".
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Grayscale => "grayscale",
            Operation::Blur { .. } => "blur",
            Operation::Edges { .. } => "edges",
            Operation::Brightness { .. } => "brightness",
            Operation::Contrast { .. } => "contrast",
            Operation::Rotate(_) => "rotate",
            Operation::Flip(_) => "flip",
            Operation::Resize { .. } => "resize",
        }
    }

    /// History / status label, e.g. `Blur (5)` or `Resize (50%)`.
    pub fn label(&self) -> String {
        match self {
            Operation::Grayscale => "Grayscale".to_string(),
            Operation::Blur { kernel } => format!("Blur ({})", kernel),
            Operation::Edges { .. } => "Edges".to_string(),
            Operation::Brightness { offset } => format!("Brightness ({})", offset),
            Operation::Contrast { percent } => format!("Contrast ({})", percent),
            Operation::Rotate(r) => format!("Rotate ({})", r.degrees()),
            Operation::Flip(axis) => format!("Flip ({})", axis),
            Operation::Resize { percent, .. } => format!("Resize ({}%)", percent),
        }
    }

    /// Slider-driven edits get a live preview phase; everything else is a
    /// single click that commits immediately.
    pub fn is_one_shot(&self) -> bool {
        !matches!(
            self,
            Operation::Blur { .. } | Operation::Brightness { .. } | Operation::Contrast { .. }
        )
    }

    /// Reject parameters outside their domain before any pixel work.
    pub fn validate(&self) -> Result<(), EditError> {
        match *self {
            Operation::Blur { kernel } if kernel == 0 || kernel % 2 == 0 || kernel > MAX_BLUR_KERNEL => {
                Err(EditError::InvalidParameter(format!(
                    "blur kernel size must be an odd integer in 1..={}, got {}",
                    MAX_BLUR_KERNEL, kernel
                )))
            }
            Operation::Edges { low, high } if !(low >= 0.0 && low <= high) => {
                Err(EditError::InvalidParameter(format!(
                    "edge thresholds must satisfy 0 <= low <= high, got {} / {}",
                    low, high
                )))
            }
            Operation::Brightness { offset } if !(-MAX_BRIGHTNESS_OFFSET..=MAX_BRIGHTNESS_OFFSET).contains(&offset) => {
                Err(EditError::InvalidParameter(format!(
                    "brightness must be within ±{}, got {}",
                    MAX_BRIGHTNESS_OFFSET, offset
                )))
            }
            Operation::Contrast { percent } if percent > MAX_CONTRAST_PERCENT => {
                Err(EditError::InvalidParameter(format!(
                    "contrast must be within 0..={}, got {}",
                    MAX_CONTRAST_PERCENT, percent
                )))
            }
            Operation::Resize { percent, .. } if percent == 0 || percent > MAX_RESIZE_PERCENT => {
                Err(EditError::InvalidParameter(format!(
                    "resize percentage must be within 1..={}, got {}",
                    MAX_RESIZE_PERCENT, percent
                )))
            }
            _ => Ok(()),
        }
    }

    /// Apply to `src`, returning a new buffer.  `src` is never modified.
    ///
    /// Parameters are validated first; a panic inside the pixel backend is
    /// caught and reported as [`EditError::OperationFailed`].
    pub fn apply(&self, src: &ImageBuffer) -> Result<ImageBuffer, EditError> {
        self.validate()?;
        match catch_unwind(AssertUnwindSafe(|| self.apply_unchecked(src))) {
            Ok(result) => result,
            Err(payload) => {
                let msg = if let Some(s) = payload.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = payload.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic payload".to_string()
                };
                log_err!("{} panicked: {}", self.label(), msg);
                Err(EditError::OperationFailed(format!("{} panicked: {}", self.label(), msg)))
            }
        }
    }

    fn apply_unchecked(&self, src: &ImageBuffer) -> Result<ImageBuffer, EditError> {
        match *self {
            Operation::Grayscale => filters::desaturate(src),
            Operation::Blur { kernel } => filters::gaussian_blur(src, kernel),
            Operation::Edges { low, high } => filters::canny_edges(src, low, high),
            Operation::Brightness { offset } => adjustments::brightness(src, offset),
            Operation::Contrast { percent } => adjustments::contrast(src, percent),
            Operation::Rotate(r) => transform::rotate(src, r),
            Operation::Flip(axis) => transform::flip(src, axis),
            Operation::Resize { percent, filter } => transform::resize_percent(src, percent, filter),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

fn parse_number<T: FromStr>(what: &str, raw: &str) -> Result<T, EditError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| EditError::InvalidParameter(format!("{} expects a number, got '{}'", what, raw)))
}

/// `name[=value]` syntax used on the command line, e.g. `blur=5`,
/// `rotate=90`, `flip=vertical`, `edges=50,150`, `resize=25`.
/// Parsed values are validated.
impl FromStr for Operation {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, value) = match s.split_once('=') {
            Some((n, v)) => (n.trim().to_lowercase(), Some(v.trim())),
            None => (s.trim().to_lowercase(), None),
        };
        let require = |what: &str| {
            value.ok_or_else(|| EditError::InvalidParameter(format!("{} needs a value ({}=N)", what, what)))
        };

        let op = match name.as_str() {
            "grayscale" | "greyscale" | "gray" => Operation::Grayscale,
            "blur" => Operation::Blur {
                kernel: parse_number("blur", require("blur")?)?,
            },
            "edges" | "canny" => match value {
                None => Operation::edges_default(),
                Some(v) => {
                    let (low, high) = v.split_once(',').ok_or_else(|| {
                        EditError::InvalidParameter(format!("edges expects LOW,HIGH, got '{}'", v))
                    })?;
                    Operation::Edges {
                        low: parse_number("edges", low)?,
                        high: parse_number("edges", high)?,
                    }
                }
            },
            "brightness" => Operation::Brightness {
                offset: parse_number("brightness", require("brightness")?)?,
            },
            "contrast" => Operation::Contrast {
                percent: parse_number("contrast", require("contrast")?)?,
            },
            "rotate" => Operation::Rotate(Rotation::from_degrees(parse_number("rotate", require("rotate")?)?)?),
            "flip" => Operation::Flip(require("flip")?.parse()?),
            "resize" => Operation::Resize {
                percent: parse_number("resize", require("resize")?.trim_end_matches('%'))?,
                filter: Interpolation::default(),
            },
            other => {
                return Err(EditError::InvalidParameter(format!("unknown operation '{}'", other)));
            }
        };
        op.validate()?;
        Ok(op)
    }
}
