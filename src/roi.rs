use image::{GenericImageView, Luma, RgbImage};
use std::path::Path;
use tracing::info;

use crate::config::Config;
use crate::engine::SuperpixelEngine;
use crate::errors::{Result, SuperpixelError};
use crate::imageops::{overlay_boundaries, LabelMap};
use crate::output::{mask_path, overlay_path, write_mask, write_overlay};
use crate::traits::ClusteringBackend;

/// Caller-supplied box in source pixel coordinates. `(x1, y1)` is inclusive,
/// `(x2, y2)` exclusive; any value may fall outside the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
}

/// A box clipped to the image and known to contain at least one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub const fn new(x1: i64, y1: i64, x2: i64, y2: i64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Clips to `[0, width) x [0, height)`; fails if nothing is left.
    pub fn clip(&self, width: u32, height: u32) -> Result<Region> {
        let x1 = self.x1.max(0);
        let y1 = self.y1.max(0);
        let x2 = self.x2.min(i64::from(width));
        let y2 = self.y2.min(i64::from(height));

        if x1 >= x2 || y1 >= y2 {
            return Err(SuperpixelError::InvalidRegion {
                x1: self.x1,
                y1: self.y1,
                x2: self.x2,
                y2: self.y2,
            });
        }

        Ok(Region {
            x: x1 as u32,
            y: y1 as u32,
            width: (x2 - x1) as u32,
            height: (y2 - y1) as u32,
        })
    }
}

impl Region {
    pub const fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// Full-frame result of a region-of-interest segmentation.
#[derive(Debug, Clone)]
pub struct RoiSegmentation {
    /// Inside `region`: the ROI labels. Outside: `background_label`.
    pub labels: LabelMap,
    pub overlay: Option<RgbImage>,
    pub background_label: u16,
    pub region: Region,
}

/// Pastes `roi_labels` into a full frame filled with one reserved label that
/// is larger than every identifier inside the ROI.
pub fn merge_roi_labels(
    roi_labels: &LabelMap,
    region: Region,
    width: u32,
    height: u32,
) -> Result<(LabelMap, u16)> {
    let max_label = roi_labels.pixels().map(|Luma([l])| *l).max().unwrap_or(0);
    let background_label = max_label
        .checked_add(1)
        .ok_or_else(|| SuperpixelError::InvalidInput {
            reason: format!("no identifier left above label {max_label} for the background"),
        })?;

    let mut labels = LabelMap::from_pixel(width, height, Luma([background_label]));
    for (x, y, pixel) in roi_labels.enumerate_pixels() {
        labels.put_pixel(region.x + x, region.y + y, *pixel);
    }
    Ok((labels, background_label))
}

impl<C: ClusteringBackend> SuperpixelEngine<C> {
    /// Segments only `bbox` of `image` and reconciles the result into a
    /// full-frame label map. Nothing is written to disk.
    pub fn segment_region(
        &self,
        image: &RgbImage,
        bbox: BoundingBox,
        config: &Config,
    ) -> Result<RoiSegmentation> {
        let (width, height) = image.dimensions();
        let region = bbox.clip(width, height)?;

        // Owned copy so the crop never aliases the source image
        let crop = image
            .view(region.x, region.y, region.width, region.height)
            .to_image();
        let roi_labels = self.segment_labels(&crop, config)?;
        let (labels, background_label) = merge_roi_labels(&roi_labels, region, width, height)?;

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

        Ok(RoiSegmentation {
            labels,
            overlay,
            background_label,
            region,
        })
    }

    /// Loads `filename` from the input directory, segments `bbox`, and writes
    /// the mask (and overlay, if enabled) like the whole-image path does.
    pub fn segment_roi(
        &self,
        config: &Config,
        filename: impl AsRef<Path>,
        bbox: BoundingBox,
    ) -> Result<RoiSegmentation> {
        let filename = filename.as_ref();
        let image_path = config.input_dir.join(filename);
        let image = image::open(&image_path)
            .map_err(|_| SuperpixelError::NotFound {
                path: image_path.clone(),
            })?
            .into_rgb8();

        let result = self.segment_region(&image, bbox, config)?;
        info!(
            path = %image_path.display(),
            region = ?result.region,
            background_label = result.background_label,
            "segmented region of interest"
        );

        write_mask(&mask_path(config, filename), &result.labels)?;
        if let (Some(overlay), Some(path)) = (&result.overlay, overlay_path(config, filename)) {
            write_overlay(&path, overlay)?;
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_inside_image() -> Result<()> {
        let region = BoundingBox::new(10, 20, 50, 60).clip(300, 200)?;
        assert_eq!(
            region,
            Region {
                x: 10,
                y: 20,
                width: 40,
                height: 40
            }
        );
        Ok(())
    }

    #[test]
    fn test_clip_to_image_edges() -> Result<()> {
        let region = BoundingBox::new(-5, -5, 10000, 10000).clip(300, 200)?;
        assert_eq!(
            region,
            Region {
                x: 0,
                y: 0,
                width: 300,
                height: 200
            }
        );
        Ok(())
    }

    #[test]
    fn test_degenerate_boxes() {
        for bbox in [
            BoundingBox::new(10, 0, 10, 50),
            BoundingBox::new(20, 0, 10, 50),
            BoundingBox::new(0, 30, 50, 30),
            BoundingBox::new(300, 0, 400, 50),
            BoundingBox::new(-20, -20, 0, 0),
        ] {
            assert!(
                matches!(
                    bbox.clip(300, 200),
                    Err(SuperpixelError::InvalidRegion { .. })
                ),
                "{bbox:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_merge_reserves_background_label() -> Result<()> {
        let roi = LabelMap::from_fn(3, 2, |x, y| Luma([(y * 3 + x) as u16]));
        let region = Region {
            x: 1,
            y: 1,
            width: 3,
            height: 2,
        };
        let (labels, background) = merge_roi_labels(&roi, region, 5, 4)?;

        assert_eq!(background, 6);
        for (x, y, Luma([l])) in labels.enumerate_pixels() {
            if region.contains(x, y) {
                assert_eq!(*l, roi.get_pixel(x - 1, y - 1)[0]);
            } else {
                assert_eq!(*l, background);
            }
        }
        Ok(())
    }

    #[test]
    fn test_merge_rejects_saturated_labels() {
        let roi = LabelMap::from_pixel(2, 2, Luma([u16::MAX]));
        let region = Region {
            x: 0,
            y: 0,
            width: 2,
            height: 2,
        };
        assert!(merge_roi_labels(&roi, region, 4, 4).is_err());
    }
}
