use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use superpixel_seg::config::{Cli, Command};
use superpixel_seg::{BoundingBox, SuperpixelProcessor};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "superpixel_seg=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let Cli { config, command } = Cli::parse();
    let processor = SuperpixelProcessor::with_slic(config);

    match command {
        None => {
            processor
                .process_directory()
                .with_context(|| {
                    format!(
                        "Failed to segment images in {}",
                        processor.config().input_dir.display()
                    )
                })?;
        }
        Some(Command::Roi {
            filename,
            x1,
            y1,
            x2,
            y2,
        }) => {
            let result = processor
                .process_roi(&filename, BoundingBox::new(x1, y1, x2, y2))
                .with_context(|| format!("Failed to segment region of {}", filename.display()))?;
            tracing::info!(
                background_label = result.background_label,
                "region segmentation written"
            );
        }
    }

    Ok(())
}
