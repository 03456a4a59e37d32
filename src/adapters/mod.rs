//! Adapters layer: Concrete implementations of ports.
//!
//! - `fs`: artifact loading from disk with manifest/signature checks
//! - `knn`: PCA projection + nearest-neighbor vote
//! - `sanitize`: redaction for log output

pub mod fs;
pub mod knn;
pub mod sanitize;

pub use fs::FsArtifactSource;
pub use knn::KnnClassifier;
