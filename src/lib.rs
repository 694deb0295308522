pub mod config;
pub mod engine;
pub mod errors;
pub mod imageops;
pub mod output;
pub mod roi;
pub mod slic;
pub mod traits;

pub mod mocks;

use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub use config::Config;
pub use engine::{target_region_count, Segmentation, SuperpixelEngine};
pub use errors::{Result, SuperpixelError};
pub use imageops::LabelMap;
pub use roi::{BoundingBox, Region, RoiSegmentation};
pub use slic::Slic;
pub use traits::*;

pub const SUPPORTED_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "tif", "tiff"];

pub fn is_supported_image_format(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
}

/// Outcome of a directory run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    /// Files that could not be decoded.
    pub skipped: usize,
}

/// Segments every supported image of a directory.
pub struct SuperpixelProcessor<C: ClusteringBackend> {
    engine: SuperpixelEngine<C>,
    config: Config,
}

impl<C: ClusteringBackend> SuperpixelProcessor<C> {
    pub const fn new(backend: C, config: Config) -> Self {
        Self {
            engine: SuperpixelEngine::new(backend),
            config,
        }
    }

    pub const fn engine(&self) -> &SuperpixelEngine<C> {
        &self.engine
    }

    pub const fn config(&self) -> &Config {
        &self.config
    }

    pub fn process_directory(&self) -> Result<BatchSummary> {
        self.config.validate()?;
        let input_path = &self.config.input_dir;

        if !input_path.is_dir() {
            return Err(SuperpixelError::FileSystem {
                path: input_path.clone(),
                operation: "read input directory".to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "input directory does not exist",
                ),
            });
        }

        let image_files = self.collect_image_files(input_path);
        if image_files.is_empty() {
            warn!(path = %input_path.display(), "no supported images found");
            return Ok(BatchSummary::default());
        }

        let workers = self.config.worker_count();
        info!(
            images = image_files.len(),
            workers,
            backend = self.engine.backend().name(),
            "segmenting images"
        );

        let pb = ProgressBar::new(image_files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
                )
                .map_err(|e| SuperpixelError::Configuration {
                    message: e.to_string(),
                })?
                .progress_chars("#>-"),
        );

        let skipped = AtomicUsize::new(0);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()?;

        pool.install(|| {
            image_files
                .par_iter()
                .progress_with(pb.clone())
                .try_for_each(|input_file| match self.process_single_image(input_file) {
                    Ok(_) => Ok(()),
                    Err(e) if e.is_recoverable() => {
                        warn!(error = %e, "skipping image");
                        skipped.fetch_add(1, Ordering::Relaxed);
                        Ok(())
                    }
                    Err(e) => Err(e),
                })
        })?;

        pb.finish_and_clear();
        let skipped = skipped.into_inner();
        let summary = BatchSummary {
            processed: image_files.len() - skipped,
            skipped,
        };
        info!(
            processed = summary.processed,
            skipped = summary.skipped,
            "all images processed"
        );
        Ok(summary)
    }

    /// Supported files directly inside `input_path`, sorted by name.
    pub fn collect_image_files(&self, input_path: &Path) -> Vec<PathBuf> {
        WalkDir::new(input_path)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_supported_image_format(e.path()))
            .map(|e| e.into_path())
            .collect()
    }

    /// Segments one file and writes its mask and optional overlay.
    pub fn process_single_image(&self, input_file: &Path) -> Result<Segmentation> {
        let image = image::open(input_file)
            .map_err(|e| SuperpixelError::UnreadableFile {
                path: input_file.to_path_buf(),
                source: e,
            })?
            .into_rgb8();

        let segmentation = self.engine.segment(&image, &self.config)?;

        output::write_mask(
            &output::mask_path(&self.config, input_file),
            &segmentation.labels,
        )?;
        if let (Some(overlay), Some(path)) = (
            &segmentation.overlay,
            output::overlay_path(&self.config, input_file),
        ) {
            output::write_overlay(&path, overlay)?;
        }

        debug!(path = %input_file.display(), "segmented image");
        Ok(segmentation)
    }

    /// Region-of-interest segmentation of one file from the input directory.
    pub fn process_roi(
        &self,
        filename: impl AsRef<Path>,
        bbox: BoundingBox,
    ) -> Result<RoiSegmentation> {
        self.config.validate()?;
        self.engine.segment_roi(&self.config, filename, bbox)
    }
}

impl SuperpixelProcessor<Slic> {
    pub fn with_slic(config: Config) -> Self {
        Self::new(Slic::default(), config)
    }
}

/// Segments one decoded image with the default SLIC backend.
pub fn segment_image(image: &image::RgbImage, config: &Config) -> Result<Segmentation> {
    SuperpixelEngine::new(Slic::default()).segment(image, config)
}

/// Segments every supported image in `config.input_dir` with the default backend.
pub fn process_dataset(config: Config) -> Result<BatchSummary> {
    SuperpixelProcessor::with_slic(config).process_directory()
}

/// Segments the box `(x1, y1)..(x2, y2)` of one input image and writes the
/// merged full-frame outputs.
pub fn segment_roi(
    config: &Config,
    filename: impl AsRef<Path>,
    x1: i64,
    y1: i64,
    x2: i64,
    y2: i64,
) -> Result<RoiSegmentation> {
    config.validate()?;
    SuperpixelEngine::new(Slic::default()).segment_roi(
        config,
        filename,
        BoundingBox::new(x1, y1, x2, y2),
    )
}
