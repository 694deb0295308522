//! Zero-parameter SLIC (SLICO) superpixels.
//!
//! Seeds start on a regular grid and are refined with a localised k-means in
//! the joint `(L, a, b, x, y)` space. The colour term of every cluster is
//! normalised by the largest colour distance that cluster saw in the previous
//! iteration, so no compactness has to be tuned by hand. A final pass makes
//! every region 4-connected.

use ndarray::Axis;
use std::collections::VecDeque;
use tracing::trace;

use crate::engine::MAX_REGIONS;
use crate::errors::{Result, SuperpixelError};
use crate::imageops::{LabImage, LabelMap};
use crate::traits::ClusteringBackend;

#[derive(Debug, Clone)]
pub struct Slic {
    pub max_iterations: usize,
    /// Colour normaliser used before any cluster has statistics of its own.
    pub initial_compactness: f32,
    /// Components smaller than this fraction of the mean region size are merged.
    pub min_size_factor: f32,
}

impl Default for Slic {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            initial_compactness: 10.0,
            min_size_factor: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Center {
    color: [f32; 3],
    x: f32,
    y: f32,
}

/// Grid shape whose cell count never exceeds `target`.
pub(crate) fn seed_grid(width: u32, height: u32, target: u32) -> (u32, u32) {
    let target = target.max(1);
    let cols = ((target as f64 * width as f64 / height as f64).sqrt().round() as u32)
        .clamp(1, target.min(width));
    let rows = (target / cols).clamp(1, height);
    (cols, rows)
}

fn color_distance(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    a.iter().zip(b).map(|(p, q)| (p - q) * (p - q)).sum()
}

impl Slic {
    fn place_seeds(
        &self,
        pixels: &[[f32; 3]],
        width: usize,
        height: usize,
        cols: u32,
        rows: u32,
    ) -> Vec<Center> {
        let cell_w = width as f32 / cols as f32;
        let cell_h = height as f32 / rows as f32;

        (0..rows)
            .flat_map(|r| (0..cols).map(move |c| (c, r)))
            .map(|(c, r)| {
                let x = (c as f32 + 0.5) * cell_w - 0.5;
                let y = (r as f32 + 0.5) * cell_h - 0.5;
                let px = (x.round() as usize).min(width - 1);
                let py = (y.round() as usize).min(height - 1);
                Center {
                    color: pixels[py * width + px],
                    x,
                    y,
                }
            })
            .collect()
    }

    fn iterate(
        &self,
        pixels: &[[f32; 3]],
        width: usize,
        height: usize,
        cols: u32,
        rows: u32,
    ) -> Vec<u32> {
        let mut centers = self.place_seeds(pixels, width, height, cols, rows);
        let cell_w = width as f32 / cols as f32;
        let cell_h = height as f32 / rows as f32;

        // Start from the grid partition so pixels outside every search window
        // still carry a sensible label.
        let mut labels = grid_partition(width, height, cols, rows);

        let step = ((width * height) as f32 / centers.len() as f32).sqrt();
        let inv_step_sq = 1.0 / (step * step);
        let radius_x = cell_w.ceil();
        let radius_y = cell_h.ceil();
        let mut max_color = vec![self.initial_compactness.powi(2); centers.len()];
        let mut distances = vec![f32::INFINITY; pixels.len()];

        for iteration in 0..self.max_iterations {
            distances.fill(f32::INFINITY);

            for (k, center) in centers.iter().enumerate() {
                let x0 = (center.x - radius_x).floor().max(0.0) as usize;
                let x1 = ((center.x + radius_x).ceil() as usize).min(width - 1);
                let y0 = (center.y - radius_y).floor().max(0.0) as usize;
                let y1 = ((center.y + radius_y).ceil() as usize).min(height - 1);

                for y in y0..=y1 {
                    let dy = y as f32 - center.y;
                    for x in x0..=x1 {
                        let idx = y * width + x;
                        let dx = x as f32 - center.x;
                        let d = color_distance(&pixels[idx], &center.color) / max_color[k]
                            + (dx * dx + dy * dy) * inv_step_sq;
                        if d < distances[idx] {
                            distances[idx] = d;
                            labels[idx] = k as u32;
                        }
                    }
                }
            }

            let mut sums = vec![[0.0f64; 5]; centers.len()];
            let mut counts = vec![0usize; centers.len()];
            let mut observed = vec![0.0f32; centers.len()];
            for (idx, &k) in labels.iter().enumerate() {
                let k = k as usize;
                let color = &pixels[idx];
                let sum = &mut sums[k];
                sum[0] += color[0] as f64;
                sum[1] += color[1] as f64;
                sum[2] += color[2] as f64;
                sum[3] += (idx % width) as f64;
                sum[4] += (idx / width) as f64;
                counts[k] += 1;
                observed[k] = observed[k].max(color_distance(color, &centers[k].color));
            }

            let mut shift = 0.0f32;
            for (k, center) in centers.iter_mut().enumerate() {
                if counts[k] == 0 {
                    continue;
                }
                let n = counts[k] as f64;
                let sum = &sums[k];
                let next = Center {
                    color: [(sum[0] / n) as f32, (sum[1] / n) as f32, (sum[2] / n) as f32],
                    x: (sum[3] / n) as f32,
                    y: (sum[4] / n) as f32,
                };
                shift += (next.x - center.x).abs() + (next.y - center.y).abs();
                *center = next;
                max_color[k] = observed[k].max(1.0);
            }

            trace!(iteration, shift, "slic iteration");
            if shift == 0.0 {
                break;
            }
        }

        labels
    }
}

/// Cell index of every pixel on a `cols` x `rows` seed grid. Every cell is a
/// non-empty rectangle as long as `cols <= width` and `rows <= height`.
pub(crate) fn grid_partition(width: usize, height: usize, cols: u32, rows: u32) -> Vec<u32> {
    let cell_w = width as f32 / cols as f32;
    let cell_h = height as f32 / rows as f32;
    (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .map(|(x, y)| {
            let c = ((x as f32 / cell_w) as u32).min(cols - 1);
            let r = ((y as f32 / cell_h) as u32).min(rows - 1);
            r * cols + c
        })
        .collect()
}

/// Relabels `labels` so that every region is a single 4-connected component.
///
/// Each cluster keeps at most its largest component, and only if that
/// component holds at least `min_size` pixels. While fewer than two
/// components are kept, the largest remaining ones are kept regardless of
/// size. Everything else is absorbed whole by an adjacent region, preferring
/// the one to its left (or above, in the first column). Kept components are
/// numbered from 0 in raster order, so the output never has more identifiers
/// than there are clusters.
pub(crate) fn enforce_connectivity(
    labels: &[u32],
    width: usize,
    height: usize,
    cluster_count: usize,
    min_size: usize,
) -> Vec<u16> {
    const UNVISITED: u32 = u32::MAX;

    struct Component {
        label: u32,
        size: usize,
        start: usize,
    }

    let mut component = vec![UNVISITED; labels.len()];
    let mut components: Vec<Component> = Vec::new();
    let mut queue = VecDeque::new();

    for start in 0..labels.len() {
        if component[start] != UNVISITED {
            continue;
        }
        let id = components.len() as u32;
        let label = labels[start];
        let mut size = 0;
        component[start] = id;
        queue.push_back(start);

        while let Some(idx) = queue.pop_front() {
            size += 1;
            let (x, y) = (idx % width, idx / width);
            let neighbours = [
                (x > 0).then(|| idx - 1),
                (x + 1 < width).then(|| idx + 1),
                (y > 0).then(|| idx - width),
                (y + 1 < height).then(|| idx + width),
            ];
            for n in neighbours.into_iter().flatten() {
                if component[n] == UNVISITED && labels[n] == label {
                    component[n] = id;
                    queue.push_back(n);
                }
            }
        }

        components.push(Component { label, size, start });
    }

    let mut largest: Vec<Option<usize>> = vec![None; cluster_count];
    for (id, c) in components.iter().enumerate() {
        let slot = &mut largest[c.label as usize];
        if slot.map_or(true, |best| components[best].size < c.size) {
            *slot = Some(id);
        }
    }

    let mut keep = vec![false; components.len()];
    let mut candidates: Vec<usize> = largest.into_iter().flatten().collect();
    for &id in &candidates {
        keep[id] = components[id].size >= min_size;
    }
    let kept = keep.iter().filter(|&&k| k).count();
    if kept < 2 {
        candidates.retain(|&id| !keep[id]);
        candidates.sort_by(|&a, &b| components[b].size.cmp(&components[a].size).then(a.cmp(&b)));
        for id in candidates.into_iter().take(2 - kept) {
            keep[id] = true;
        }
    }

    let mut final_label: Vec<Option<u16>> = vec![None; components.len()];
    let mut next = 0u16;
    for id in (0..components.len()).filter(|&id| keep[id]) {
        final_label[id] = Some(next);
        next = next.saturating_add(1);
    }

    let mut adjacent: Vec<Vec<u32>> = vec![Vec::new(); components.len()];
    for idx in 0..labels.len() {
        let (x, y) = (idx % width, idx / width);
        let forward = [
            (x + 1 < width).then(|| idx + 1),
            (y + 1 < height).then(|| idx + width),
        ];
        for n in forward.into_iter().flatten() {
            let (a, b) = (component[idx], component[n]);
            if a != b {
                adjacent[a as usize].push(b);
                adjacent[b as usize].push(a);
            }
        }
    }

    // Fragments whose neighbours are themselves unresolved wait for a later pass
    loop {
        let mut pending = false;
        let mut progressed = false;
        for (id, c) in components.iter().enumerate() {
            if final_label[id].is_some() {
                continue;
            }
            let (x, y) = (c.start % width, c.start / width);
            let preferred = if x > 0 {
                Some(c.start - 1)
            } else if y > 0 {
                Some(c.start - width)
            } else {
                None
            };
            let absorbed_by = preferred
                .and_then(|n| final_label[component[n] as usize])
                .or_else(|| adjacent[id].iter().find_map(|&n| final_label[n as usize]));
            match absorbed_by {
                Some(label) => {
                    final_label[id] = Some(label);
                    progressed = true;
                }
                None => pending = true,
            }
        }
        if !pending || !progressed {
            break;
        }
    }

    component
        .into_iter()
        .map(|id| final_label[id as usize].unwrap_or(0))
        .collect()
}

impl ClusteringBackend for Slic {
    fn cluster(&self, lab: &LabImage, target_count: u32) -> Result<LabelMap> {
        let (height, width, channels) = lab.dim();
        if width == 0 || height == 0 || channels != 3 {
            return Err(SuperpixelError::InvalidInput {
                reason: format!("expected a non-empty (h, w, 3) array, got {:?}", lab.shape()),
            });
        }

        let pixels: Vec<[f32; 3]> = lab
            .lanes(Axis(2))
            .into_iter()
            .map(|v| [v[0], v[1], v[2]])
            .collect();

        let target = target_count.clamp(1, MAX_REGIONS);
        let (cols, rows) = seed_grid(width as u32, height as u32, target);
        let labels = self.iterate(&pixels, width, height, cols, rows);

        let cluster_count = (cols * rows) as usize;
        let mean_size = pixels.len() as f32 / cluster_count as f32;
        let min_size = (mean_size * self.min_size_factor) as usize;
        let mut connected = enforce_connectivity(&labels, width, height, cluster_count, min_size);

        // k-means can starve all but one seed; the grid still has every cell
        if cluster_count >= 2 && connected.iter().all(|&l| l == 0) {
            trace!(cluster_count, "slic collapsed to one region, using seed grid");
            connected = grid_partition(width, height, cols, rows)
                .into_iter()
                .map(|l| l as u16)
                .collect();
        }

        LabelMap::from_raw(width as u32, height as u32, connected).ok_or_else(|| {
            SuperpixelError::InvalidInput {
                reason: "label buffer does not match image dimensions".to_string(),
            }
        })
    }

    fn name(&self) -> &'static str {
        "slic-zero"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imageops::rgb_to_lab;
    use image::{Luma, Rgb, RgbImage};
    use ndarray::Array3;
    use std::collections::HashSet;

    fn distinct(labels: &LabelMap) -> HashSet<u16> {
        labels.pixels().map(|Luma([l])| *l).collect()
    }

    #[test]
    fn test_seed_grid_never_exceeds_target() {
        for (w, h, k) in [(300, 200, 400), (10, 10, 2), (1000, 1, 6), (1, 50, 3), (7, 7, 65532)] {
            let (cols, rows) = seed_grid(w, h, k);
            assert!(cols >= 1 && rows >= 1);
            assert!(cols * rows <= k, "{w}x{h} k={k} -> {cols}x{rows}");
        }
        assert_eq!(seed_grid(10, 10, 2), (1, 2));
        assert_eq!(seed_grid(300, 200, 400), (24, 16));
    }

    #[test]
    fn test_uniform_image_splits_into_target_regions() -> Result<()> {
        let lab = rgb_to_lab(&RgbImage::from_pixel(10, 10, Rgb([90, 90, 90])));
        let labels = Slic::default().cluster(&lab, 2)?;

        assert_eq!(labels.dimensions(), (10, 10));
        assert_eq!(distinct(&labels), HashSet::from([0, 1]));
        Ok(())
    }

    #[test]
    fn test_follows_color_edges() -> Result<()> {
        // Left half red, right half blue; two seeds side by side
        let image = RgbImage::from_fn(40, 20, |x, _| {
            if x < 20 {
                Rgb([220, 20, 20])
            } else {
                Rgb([20, 20, 220])
            }
        });
        let labels = Slic::default().cluster(&rgb_to_lab(&image), 2)?;

        let left = labels.get_pixel(0, 0)[0];
        let right = labels.get_pixel(39, 19)[0];
        assert_ne!(left, right);
        for (x, _, Luma([l])) in labels.enumerate_pixels() {
            assert_eq!(*l, if x < 20 { left } else { right });
        }
        Ok(())
    }

    #[test]
    fn test_region_count_bounded_by_target() -> Result<()> {
        let image = RgbImage::from_fn(120, 80, |x, y| {
            Rgb([
                ((x * 7 + y * 3) % 256) as u8,
                ((x * y) % 256) as u8,
                ((x ^ y) * 5 % 256) as u8,
            ])
        });
        let labels = Slic::default().cluster(&rgb_to_lab(&image), 64)?;
        let count = distinct(&labels).len();

        assert!((2..=64).contains(&count), "got {count} regions");
        // Identifiers are sequential
        assert_eq!(distinct(&labels), (0..count as u16).collect());
        Ok(())
    }

    #[test]
    fn test_enforce_connectivity_merges_fragments() {
        // Label 0 appears in two disconnected places; the smaller one is absorbed
        #[rustfmt::skip]
        let labels = [
            0, 0, 1, 1,
            0, 0, 1, 1,
            1, 1, 1, 0,
        ];
        let connected = enforce_connectivity(&labels, 4, 3, 2, 0);
        assert_eq!(
            connected,
            vec![
                0, 0, 1, 1,
                0, 0, 1, 1,
                1, 1, 1, 1,
            ]
        );
    }

    #[test]
    fn test_enforce_connectivity_merges_small_components() {
        #[rustfmt::skip]
        let labels = [
            0, 0, 0, 0,
            0, 2, 0, 0,
            1, 1, 1, 1,
        ];
        let connected = enforce_connectivity(&labels, 4, 3, 3, 2);
        assert_eq!(
            connected,
            vec![
                0, 0, 0, 0,
                0, 0, 0, 0,
                1, 1, 1, 1,
            ]
        );
    }

    #[test]
    fn test_enforce_connectivity_leading_fragment_joins_neighbour() {
        // The fragment at the origin has no left or upper neighbour
        #[rustfmt::skip]
        let labels = [
            0, 1, 1, 1,
            1, 1, 0, 0,
            1, 1, 0, 0,
        ];
        let connected = enforce_connectivity(&labels, 4, 3, 2, 0);
        assert_eq!(
            connected,
            vec![
                0, 0, 0, 0,
                0, 0, 1, 1,
                0, 0, 1, 1,
            ]
        );
    }

    #[test]
    fn test_enforce_connectivity_keeps_two_regions() {
        // Both clusters are below min_size; the two largest survive anyway
        #[rustfmt::skip]
        let labels = [
            0, 0, 0, 0,
            0, 0, 1, 1,
        ];
        let connected = enforce_connectivity(&labels, 4, 2, 2, 50);
        assert_eq!(connected, vec![0, 0, 0, 0, 0, 0, 1, 1]);

        let single = enforce_connectivity(&[0, 0, 0, 0], 2, 2, 2, 50);
        assert_eq!(single, vec![0, 0, 0, 0]);
    }

    /// Deterministic xorshift noise so failures reproduce.
    fn pattern_image(width: u32, height: u32, pattern: usize, seed: u32) -> RgbImage {
        let mut state = seed.wrapping_mul(2_654_435_761).max(1);
        RgbImage::from_fn(width, height, |x, y| match pattern {
            0 => {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                let [r, g, b, _] = state.to_le_bytes();
                Rgb([r, g, b])
            }
            1 => Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 128]),
            2 => {
                if (x + y) % 2 == 0 {
                    Rgb([250, 250, 250])
                } else {
                    Rgb([5, 5, 5])
                }
            }
            _ => Rgb([((x * 37) ^ (y * 91)) as u8, (x * y) as u8, ((x + 3 * y) * 17) as u8]),
        })
    }

    fn assert_regions_connected(labels: &LabelMap) {
        let (width, height) = labels.dimensions();
        let flat: Vec<u32> = labels.pixels().map(|Luma([l])| u32::from(*l)).collect();
        let count = distinct(labels).len();
        let relabelled = enforce_connectivity(&flat, width as usize, height as usize, count, 0);
        // A split region would have a fragment absorbed under a second identifier
        let pairs: HashSet<(u32, u16)> = flat.into_iter().zip(relabelled).collect();
        assert_eq!(pairs.len(), count, "a region is split into several components");
    }

    #[test]
    fn test_two_target_always_yields_two_regions() -> Result<()> {
        let slic = Slic::default();
        for size in 2..24 {
            for pattern in 0..4 {
                let image = pattern_image(size, size, pattern, size * 7 + pattern as u32);
                let labels = slic.cluster(&rgb_to_lab(&image), 2)?;
                assert_eq!(
                    distinct(&labels),
                    HashSet::from([0, 1]),
                    "{size}x{size} pattern {pattern}"
                );
            }
        }
        for (w, h) in [(2, 1), (1, 2), (17, 3), (1, 30)] {
            let labels = slic.cluster(&rgb_to_lab(&pattern_image(w, h, 0, w + h)), 2)?;
            assert_eq!(distinct(&labels).len(), 2, "{w}x{h}");
        }
        Ok(())
    }

    #[test]
    fn test_region_count_within_target_on_noise() -> Result<()> {
        let slic = Slic::default();
        for (w, h) in [(9, 9), (16, 12), (31, 7), (40, 40)] {
            for pattern in 0..4 {
                for target in [3, 5, 17, 64] {
                    let image = pattern_image(w, h, pattern, w * h + target);
                    let labels = slic.cluster(&rgb_to_lab(&image), target)?;
                    let count = distinct(&labels).len();

                    assert!(
                        count >= 2 && count as u32 <= target,
                        "{w}x{h} pattern {pattern} target {target} -> {count}"
                    );
                    assert_eq!(distinct(&labels), (0..count as u16).collect());
                    assert_regions_connected(&labels);
                }
            }
        }
        Ok(())
    }

    #[test]
    fn test_target_is_capped() -> Result<()> {
        // One pixel per seed would otherwise allow 65535 regions
        let lab = rgb_to_lab(&pattern_image(65535, 1, 3, 1));
        let labels = Slic::default().cluster(&lab, u32::MAX)?;
        assert!(distinct(&labels).len() as u32 <= MAX_REGIONS);
        Ok(())
    }

    #[test]
    fn test_rejects_empty_input() {
        let lab = Array3::<f32>::zeros((0, 5, 3));
        assert!(matches!(
            Slic::default().cluster(&lab, 4),
            Err(SuperpixelError::InvalidInput { .. })
        ));
    }
}
