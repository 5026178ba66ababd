mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from crackscan for tests
pub use crackscan::{
    Analysis, CrackScorer, DetectError, Detector, ImageStore, Outcome, RegionExtractor, Severity,
};
