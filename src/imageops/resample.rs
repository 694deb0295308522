use image::{ImageBuffer, Pixel, Primitive};
use num_traits::AsPrimitive;

/// How samples are combined when the grid changes size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResampleKind {
    /// Area-weighted averaging, for continuous-valued imagery.
    PixelData,
    /// Nearest neighbour, for categorical data such as label maps.
    LabelData,
}

/// Target dimensions for a uniform scale factor, truncated and never below 1.
pub fn scale_dimensions(width: u32, height: u32, factor: f64) -> (u32, u32) {
    let scale = |v: u32| ((f64::from(v) * factor) as u32).max(1);
    (scale(width), scale(height))
}

/// Resizes `image` to `width` x `height`.
///
/// Returns an unchanged copy when the dimensions already match, so a scale
/// factor of 1.0 never round-trips values through floating point.
pub fn resize<P, S>(
    image: &ImageBuffer<P, Vec<S>>,
    width: u32,
    height: u32,
    kind: ResampleKind,
) -> ImageBuffer<P, Vec<S>>
where
    P: Pixel<Subpixel = S>,
    S: Primitive + AsPrimitive<f32>,
    f32: AsPrimitive<S>,
{
    if image.dimensions() == (width, height) {
        return image.clone();
    }

    match kind {
        ResampleKind::PixelData => resize_area(image, width, height),
        ResampleKind::LabelData => resize_nearest(image, width, height),
    }
}

fn resize_nearest<P, S>(
    image: &ImageBuffer<P, Vec<S>>,
    width: u32,
    height: u32,
) -> ImageBuffer<P, Vec<S>>
where
    P: Pixel<Subpixel = S>,
    S: Primitive,
{
    let (src_w, src_h) = image.dimensions();
    let src_x: Vec<u32> = (0..width).map(|x| nearest_index(x, width, src_w)).collect();
    let src_y: Vec<u32> = (0..height).map(|y| nearest_index(y, height, src_h)).collect();

    ImageBuffer::from_fn(width, height, |x, y| {
        *image.get_pixel(src_x[x as usize], src_y[y as usize])
    })
}

fn nearest_index(dst: u32, dst_len: u32, src_len: u32) -> u32 {
    let src = (dst as u64 * src_len as u64 / dst_len as u64) as u32;
    src.min(src_len - 1)
}

/// Contributions of source samples to each destination sample along one axis.
/// Weights of every destination sample sum to 1.
fn area_weights(src_len: u32, dst_len: u32) -> Vec<Vec<(usize, f32)>> {
    let scale = src_len as f64 / dst_len as f64;

    (0..dst_len)
        .map(|d| {
            let start = d as f64 * scale;
            let end = (start + scale).min(src_len as f64);
            let first = start.floor() as usize;
            let last = (end.ceil() as usize).min(src_len as usize);

            let mut weights: Vec<(usize, f32)> = (first..last)
                .filter_map(|s| {
                    let covered = end.min(s as f64 + 1.0) - start.max(s as f64);
                    (covered > 0.0).then_some((s, covered as f32))
                })
                .collect();

            let total: f32 = weights.iter().map(|(_, w)| w).sum();
            for (_, w) in &mut weights {
                *w /= total;
            }
            weights
        })
        .collect()
}

fn resize_area<P, S>(image: &ImageBuffer<P, Vec<S>>, width: u32, height: u32) -> ImageBuffer<P, Vec<S>>
where
    P: Pixel<Subpixel = S>,
    S: Primitive + AsPrimitive<f32>,
    f32: AsPrimitive<S>,
{
    let (src_w, src_h) = image.dimensions();
    let channels = P::CHANNEL_COUNT as usize;
    let max: f32 = S::DEFAULT_MAX_VALUE.as_();
    let min: f32 = S::DEFAULT_MIN_VALUE.as_();
    let x_weights = area_weights(src_w, width);
    let y_weights = area_weights(src_h, height);
    let src = image.as_raw();

    let mut acc = vec![0.0f32; channels];
    let mut out = vec![S::DEFAULT_MIN_VALUE; channels];
    ImageBuffer::from_fn(width, height, |x, y| {
        acc.fill(0.0);
        for &(sy, wy) in &y_weights[y as usize] {
            let row = sy * src_w as usize;
            for &(sx, wx) in &x_weights[x as usize] {
                let offset = (row + sx) * channels;
                let w = wy * wx;
                for (a, v) in acc.iter_mut().zip(&src[offset..offset + channels]) {
                    *a += w * v.as_();
                }
            }
        }
        for (o, a) in out.iter_mut().zip(&acc) {
            *o = a.round().clamp(min, max).as_();
        }
        *P::from_slice(&out)
    })
}
