use image::{GrayImage, Luma, Rgb, RgbImage};

use crate::errors::{Result, SuperpixelError};
use crate::imageops::LabelMap;

const NEIGHBOURS: [(i64, i64); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Marks every pixel that has a differently labelled pixel among its eight
/// neighbours with 255. Both sides of a region edge are marked.
pub fn find_boundaries(labels: &LabelMap) -> GrayImage {
    let (width, height) = labels.dimensions();

    GrayImage::from_fn(width, height, |x, y| {
        let Luma([label]) = *labels.get_pixel(x, y);
        let on_boundary = NEIGHBOURS.iter().any(|&(dx, dy)| {
            let (nx, ny) = (x as i64 + dx, y as i64 + dy);
            nx >= 0
                && ny >= 0
                && nx < width as i64
                && ny < height as i64
                && labels.get_pixel(nx as u32, ny as u32)[0] != label
        });
        Luma([if on_boundary { 255 } else { 0 }])
    })
}

/// Alpha-blends `color` into `image` on the region boundaries of `labels`.
///
/// Blending is `(1 - alpha) * pixel + alpha * color` per channel in `f32`,
/// clamped to `0..=255` and truncated. Interior pixels are copied unchanged.
pub fn overlay_boundaries(
    image: &RgbImage,
    labels: &LabelMap,
    color: Rgb<u8>,
    alpha: f32,
) -> Result<RgbImage> {
    if image.dimensions() != labels.dimensions() {
        return Err(SuperpixelError::InvalidInput {
            reason: format!(
                "image is {}x{} but label map is {}x{}",
                image.width(),
                image.height(),
                labels.width(),
                labels.height()
            ),
        });
    }

    let boundaries = find_boundaries(labels);
    let mut output = image.clone();
    for (pixel, Luma([mark])) in output.pixels_mut().zip(boundaries.pixels()) {
        if *mark == 0 {
            continue;
        }
        for (channel, &target) in pixel.0.iter_mut().zip(color.0.iter()) {
            let blended = (1.0 - alpha) * *channel as f32 + alpha * target as f32;
            *channel = blended.clamp(0.0, 255.0) as u8;
        }
    }
    Ok(output)
}
