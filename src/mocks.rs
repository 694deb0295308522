use crate::errors::{Result, SuperpixelError};
use crate::imageops::{LabImage, LabelMap};
use crate::slic::seed_grid;
use crate::traits::ClusteringBackend;
use image::Luma;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Test backend that ignores colour and cuts the image into a regular grid
/// of at most `target_count` cells.
#[derive(Debug, Default)]
pub struct MockClusteringBackend {
    calls: AtomicUsize,
}

impl MockClusteringBackend {
    pub const fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `cluster` invocations so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl ClusteringBackend for MockClusteringBackend {
    fn cluster(&self, lab: &LabImage, target_count: u32) -> Result<LabelMap> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let (height, width, _) = lab.dim();
        if width == 0 || height == 0 {
            return Err(SuperpixelError::InvalidInput {
                reason: "empty lab image".to_string(),
            });
        }

        let (width, height) = (width as u32, height as u32);
        let (cols, rows) = seed_grid(width, height, target_count);
        Ok(LabelMap::from_fn(width, height, |x, y| {
            let c = x * cols / width;
            let r = y * rows / height;
            Luma([(r * cols + c) as u16])
        }))
    }

    fn name(&self) -> &'static str {
        "mock-grid"
    }
}

/// Factory used by the test suites.
pub const fn create_mock_backend() -> MockClusteringBackend {
    MockClusteringBackend::new()
}
