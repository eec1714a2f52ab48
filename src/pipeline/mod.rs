//! Presentation pipeline: stage sequencing, artifacts, and cost estimates.

mod artifacts;
mod cost;
mod orchestrator;

pub use artifacts::{
    ArtifactManifest, AudioArtifacts, MANIFEST_FILE_NAME, WorkDirs, find_reference_images,
};
pub use cost::{CostEstimate, CostRates, DEFAULT_NARRATION_CHARS, estimate_cost};
pub use orchestrator::{Pipeline, PipelineParts};
