use image::RgbImage;
use tracing::debug;

use crate::config::Config;
use crate::errors::{Result, SuperpixelError};
use crate::imageops::{
    overlay_boundaries, resize, rgb_to_lab, scale_dimensions, LabelMap, ResampleKind,
};
use crate::traits::ClusteringBackend;

/// Smallest region count handed to the clustering backend.
pub const MIN_REGIONS: u32 = 2;
/// Largest region count; leaves identifiers free below `u16::MAX` for the
/// background label of ROI segmentations.
pub const MAX_REGIONS: u32 = 65532;

/// Labels for one image plus the optional boundary visualisation.
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub labels: LabelMap,
    pub overlay: Option<RgbImage>,
}

/// Region count for an image of `total_pixels` at the given density.
pub fn target_region_count(total_pixels: u64, pixels_per_region: u32) -> u32 {
    let raw = total_pixels / u64::from(pixels_per_region.max(1));
    raw.clamp(u64::from(MIN_REGIONS), u64::from(MAX_REGIONS)) as u32
}

pub struct SuperpixelEngine<C: ClusteringBackend> {
    backend: C,
}

impl<C: ClusteringBackend> SuperpixelEngine<C> {
    pub const fn new(backend: C) -> Self {
        Self { backend }
    }

    pub const fn backend(&self) -> &C {
        &self.backend
    }

    /// Segments `image` and, if `config` has an overlay location, composites
    /// the boundaries onto the original image.
    pub fn segment(&self, image: &RgbImage, config: &Config) -> Result<Segmentation> {
        let labels = self.segment_labels(image, config)?;
        let overlay = if config.overlays_enabled() {
            Some(overlay_boundaries(
                image,
                &labels,
                config.overlay_color,
                config.overlay_alpha,
            )?)
        } else {
            None
        };
        Ok(Segmentation { labels, overlay })
    }

    /// Label map at the resolution of `image`, without an overlay.
    pub fn segment_labels(&self, image: &RgbImage, config: &Config) -> Result<LabelMap> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(SuperpixelError::InvalidInput {
                reason: "Input image is empty".to_string(),
            });
        }

        let (scaled_w, scaled_h) = scale_dimensions(width, height, config.downscale_factor);
        let scaled = resize(image, scaled_w, scaled_h, ResampleKind::PixelData);

        let total_pixels = u64::from(scaled_w) * u64::from(scaled_h);
        let target = target_region_count(total_pixels, config.pixels_per_region);
        debug!(
            backend = self.backend.name(),
            width = scaled_w,
            height = scaled_h,
            target,
            "clustering"
        );

        let labels = self.backend.cluster(&rgb_to_lab(&scaled), target)?;
        Ok(resize(&labels, width, height, ResampleKind::LabelData))
    }
}
