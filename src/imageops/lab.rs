//! sRGB to CIE L*a*b* conversion (D65 white point).
//!
//! Clustering happens in L*a*b* because Euclidean distance there tracks
//! perceived colour difference far better than in RGB.

use image::{Rgb, RgbImage};
use ndarray::Array3;

/// L*a*b* samples laid out as `(height, width, channel)`.
pub type LabImage = Array3<f32>;

const WHITE_X: f32 = 0.950_456;
const WHITE_Z: f32 = 1.088_754;
const EPSILON: f32 = 216.0 / 24389.0;
const KAPPA: f32 = 24389.0 / 27.0;

fn srgb_to_linear(v: f32) -> f32 {
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

fn lab_f(t: f32) -> f32 {
    if t > EPSILON {
        t.cbrt()
    } else {
        (KAPPA * t + 16.0) / 116.0
    }
}

fn linear_to_lab([r, g, b]: [f32; 3]) -> [f32; 3] {
    let x = 0.412_456_4 * r + 0.357_576_1 * g + 0.180_437_5 * b;
    let y = 0.212_672_9 * r + 0.715_152_2 * g + 0.072_175_0 * b;
    let z = 0.019_333_9 * r + 0.119_192 * g + 0.950_304_1 * b;

    let fx = lab_f(x / WHITE_X);
    let fy = lab_f(y);
    let fz = lab_f(z / WHITE_Z);

    [116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

/// Converts one 8-bit sRGB triple to `[L, a, b]`.
pub fn srgb_to_lab(rgb: [u8; 3]) -> [f32; 3] {
    linear_to_lab(rgb.map(|c| srgb_to_linear(c as f32 / 255.0)))
}

/// Converts a whole RGB image. The 8-bit linearisation is tabulated once.
pub fn rgb_to_lab(image: &RgbImage) -> LabImage {
    let (width, height) = image.dimensions();
    let linear: Vec<f32> = (0..=255u8)
        .map(|c| srgb_to_linear(c as f32 / 255.0))
        .collect();

    let mut lab = Array3::<f32>::zeros((height as usize, width as usize, 3));
    for (x, y, pixel) in image.enumerate_pixels() {
        let Rgb([red, green, blue]) = *pixel;
        let [l, a, b] = linear_to_lab([
            linear[red as usize],
            linear[green as usize],
            linear[blue as usize],
        ]);

        let (y, x) = (y as usize, x as usize);
        lab[[y, x, 0]] = l;
        lab[[y, x, 1]] = a;
        lab[[y, x, 2]] = b;
    }
    lab
}
