pub mod classifier;
pub mod config;
pub mod detection;
pub mod error;
pub mod history;
pub mod models;
pub mod pipeline;
pub mod storage;

pub use classifier::{Classifier, CrackScorer};
pub use config::{get_configuration, Settings};
pub use detection::{Annotated, Detector, RegionExtractor};
pub use error::{DetectError, Result};
pub use history::{parse_confidence, HistoryEntry};
pub use models::{
    get_severity, Analysis, BoundingBox, CrackRegion, DetectionResult, Outcome, Severity,
};
pub use pipeline::{DebugConfig, MaskPipeline, MaskStep};
pub use storage::ImageStore;
