pub mod boundary;
pub mod lab;
pub mod resample;

pub use boundary::{find_boundaries, overlay_boundaries};
pub use lab::{rgb_to_lab, LabImage};
pub use resample::{resize, scale_dimensions, ResampleKind};

use image::{ImageBuffer, Luma};

/// Per-pixel superpixel identifiers, same width and height as the source image.
pub type LabelMap = ImageBuffer<Luma<u16>, Vec<u16>>;
