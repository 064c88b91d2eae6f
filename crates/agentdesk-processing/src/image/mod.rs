//! Pixel-level building blocks used by the optimizer.

pub mod exif;
pub mod filters;
pub mod orientation;
pub mod resize;

pub use filters::{convolve, Kernel3x3, NOISE_REDUCTION_KERNEL, SHARPEN_KERNEL};
pub use orientation::ImageOrientation;
pub use resize::{fit_within, step_down_plan, step_down_resize};
