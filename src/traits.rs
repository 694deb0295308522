use crate::errors::Result;
use crate::imageops::{LabImage, LabelMap};

/// Groups pixels into spatially compact, colour-homogeneous regions.
///
/// The engine only depends on this abstraction, so SLIC can be swapped for
/// another algorithm (or a deterministic mock in tests).
pub trait ClusteringBackend: Send + Sync {
    /// Clusters `lab` (shape `(height, width, 3)`) into at most `target_count`
    /// regions and returns a label map with the same width and height.
    fn cluster(&self, lab: &LabImage, target_count: u32) -> Result<LabelMap>;

    /// Short name used in log output.
    fn name(&self) -> &'static str;
}
