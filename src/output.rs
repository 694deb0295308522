use image::{ImageFormat, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::Config;
use crate::errors::{Result, SuperpixelError};
use crate::imageops::LabelMap;

/// `<output_masks>/<stem>.png`; only the last extension is replaced.
pub fn mask_path(config: &Config, input_file: &Path) -> PathBuf {
    let mut name = input_file
        .file_stem()
        .unwrap_or(input_file.as_os_str())
        .to_os_string();
    name.push(".png");
    config.output_masks.join(name)
}

/// `<output_overlays>/<file name>`, or `None` when overlays are disabled.
pub fn overlay_path(config: &Config, input_file: &Path) -> Option<PathBuf> {
    let file_name = input_file.file_name()?;
    config
        .output_overlays
        .as_ref()
        .map(|dir| dir.join(file_name))
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| SuperpixelError::FileSystem {
            path: parent.to_path_buf(),
            operation: "create output directory".to_string(),
            source: e,
        })?;
    }
    Ok(())
}

/// Writes `labels` as a lossless 16-bit grayscale PNG.
pub fn write_mask(path: &Path, labels: &LabelMap) -> Result<()> {
    create_parent(path)?;
    labels
        .save_with_format(path, ImageFormat::Png)
        .map_err(|e| SuperpixelError::ImageProcessing {
            path: path.display().to_string(),
            operation: "save mask".to_string(),
            source: Box::new(e),
        })?;
    debug!(path = %path.display(), "saved mask");
    Ok(())
}

/// Writes an overlay, encoded according to the extension of `path`.
pub fn write_overlay(path: &Path, overlay: &RgbImage) -> Result<()> {
    create_parent(path)?;
    let format = ImageFormat::from_path(path).unwrap_or(ImageFormat::Png);
    overlay
        .save_with_format(path, format)
        .map_err(|e| SuperpixelError::ImageProcessing {
            path: path.display().to_string(),
            operation: "save overlay".to_string(),
            source: Box::new(e),
        })?;
    debug!(path = %path.display(), "saved overlay");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};
    use tempfile::TempDir;

    #[test]
    fn test_output_paths() {
        let config = Config::new("in", "masks");
        assert_eq!(
            mask_path(&config, Path::new("in/frame.001.JPG")),
            PathBuf::from("masks/frame.001.png")
        );
        assert_eq!(overlay_path(&config, Path::new("in/frame.jpg")), None);

        let config = config.with_overlays("overlays");
        assert_eq!(
            overlay_path(&config, Path::new("in/frame.jpg")),
            Some(PathBuf::from("overlays/frame.jpg"))
        );
    }

    #[test]
    fn test_mask_round_trip_keeps_16_bit_labels() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("nested/dir/mask.png");
        let labels = LabelMap::from_fn(9, 4, |x, y| Luma([(x * 7000 + y) as u16]));

        write_mask(&path, &labels)?;
        let decoded = image::open(&path)?.into_luma16();
        assert_eq!(decoded, labels);
        Ok(())
    }

    #[test]
    fn test_overlay_format_follows_extension() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let overlay = RgbImage::from_pixel(5, 5, Rgb([10, 20, 30]));

        for name in ["a.png", "b.bmp", "c.tiff", "d.jpg"] {
            let path = temp_dir.path().join(name);
            write_overlay(&path, &overlay)?;
            let format = image::ImageFormat::from_path(&path)?;
            let reader = image::ImageReader::open(&path)?.with_guessed_format()?;
            assert_eq!(reader.format(), Some(format));
        }
        Ok(())
    }
}
