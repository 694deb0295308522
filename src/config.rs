use clap::{Args, Parser, Subcommand};
use image::Rgb;
use std::path::PathBuf;

use crate::errors::{Result, SuperpixelError};

pub const DEFAULT_PIXELS_PER_REGION: u32 = 150;
pub const DEFAULT_DOWNSCALE_FACTOR: f64 = 1.0;
pub const DEFAULT_OVERLAY_ALPHA: f32 = 0.7;
pub const DEFAULT_OVERLAY_COLOR: Rgb<u8> = Rgb([128, 128, 128]);

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Segment only a rectangle of one image and merge it into a full-frame mask
    Roi {
        /// Image file name, relative to the input directory
        filename: PathBuf,

        /// Left edge (inclusive)
        #[arg(allow_negative_numbers = true)]
        x1: i64,

        /// Top edge (inclusive)
        #[arg(allow_negative_numbers = true)]
        y1: i64,

        /// Right edge (exclusive)
        #[arg(allow_negative_numbers = true)]
        x2: i64,

        /// Bottom edge (exclusive)
        #[arg(allow_negative_numbers = true)]
        y2: i64,
    },
}

/// Immutable segmentation settings shared by every worker.
#[derive(Args, Clone, Debug)]
pub struct Config {
    #[arg(short, long)]
    pub input_dir: PathBuf,

    #[arg(short = 'm', long, default_value = "masks")]
    pub output_masks: PathBuf,

    /// Enables boundary overlays when set
    #[arg(short = 'o', long)]
    pub output_overlays: Option<PathBuf>,

    #[arg(
        short,
        long,
        default_value_t = DEFAULT_PIXELS_PER_REGION,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub pixels_per_region: u32,

    #[arg(short, long, default_value_t = DEFAULT_DOWNSCALE_FACTOR, value_parser = check_downscale)]
    pub downscale_factor: f64,

    #[arg(short = 'a', long, default_value_t = DEFAULT_OVERLAY_ALPHA, value_parser = check_alpha)]
    pub overlay_alpha: f32,

    /// Boundary color as `R,G,B`
    #[arg(short = 'c', long, default_value = "128,128,128", value_parser = parse_color)]
    pub overlay_color: Rgb<u8>,

    #[arg(short, long, default_value_t = 1)]
    pub num_workers: usize,
}

impl Config {
    pub fn new(input_dir: impl Into<PathBuf>, output_masks: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_masks: output_masks.into(),
            output_overlays: None,
            pixels_per_region: DEFAULT_PIXELS_PER_REGION,
            downscale_factor: DEFAULT_DOWNSCALE_FACTOR,
            overlay_alpha: DEFAULT_OVERLAY_ALPHA,
            overlay_color: DEFAULT_OVERLAY_COLOR,
            num_workers: 1,
        }
    }

    pub fn with_overlays(mut self, output_overlays: impl Into<PathBuf>) -> Self {
        self.output_overlays = Some(output_overlays.into());
        self
    }

    pub const fn overlays_enabled(&self) -> bool {
        self.output_overlays.is_some()
    }

    /// Worker count actually used by the batch driver.
    pub fn worker_count(&self) -> usize {
        self.num_workers.max(1)
    }

    /// Re-checks the invariants clap enforces, for configs built in code.
    pub fn validate(&self) -> Result<()> {
        if self.pixels_per_region == 0 {
            return Err(SuperpixelError::Validation {
                field: "pixels_per_region".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        downscale_in_range(self.downscale_factor).map_err(|reason| {
            SuperpixelError::Validation {
                field: "downscale_factor".to_string(),
                reason,
            }
        })?;
        alpha_in_range(self.overlay_alpha).map_err(|reason| {
            SuperpixelError::Validation {
                field: "overlay_alpha".to_string(),
                reason,
            }
        })?;
        Ok(())
    }
}

fn downscale_in_range(factor: f64) -> std::result::Result<f64, String> {
    if !(factor > 0.0 && factor <= 1.0) {
        return Err(format!("must be in (0, 1], got {factor}"));
    }
    Ok(factor)
}

fn alpha_in_range(alpha: f32) -> std::result::Result<f32, String> {
    if !(0.0..=1.0).contains(&alpha) {
        return Err(format!("must be in [0, 1], got {alpha}"));
    }
    Ok(alpha)
}

fn check_downscale(s: &str) -> std::result::Result<f64, String> {
    s.parse()
        .map_err(|_| format!("`{s}` is not a number"))
        .and_then(downscale_in_range)
}

fn check_alpha(s: &str) -> std::result::Result<f32, String> {
    s.parse()
        .map_err(|_| format!("`{s}` is not a number"))
        .and_then(alpha_in_range)
}

fn parse_color(s: &str) -> std::result::Result<Rgb<u8>, String> {
    let channels = s
        .split(',')
        .map(|c| {
            c.trim()
                .parse::<u8>()
                .map_err(|_| format!("`{}` is not a channel value in 0..=255", c.trim()))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    match channels.as_slice() {
        &[r, g, b] => Ok(Rgb([r, g, b])),
        _ => Err(format!("expected `R,G,B`, got `{s}`")),
    }
}
