pub mod adjustments;
pub mod catalog;
pub mod filters;
pub mod transform;

pub use catalog::Operation;
pub use transform::{FlipAxis, Interpolation, Rotation};
