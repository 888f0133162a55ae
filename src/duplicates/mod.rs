pub mod cluster;
pub mod decision;
pub mod fingerprint;
pub mod pipeline;
pub mod scorer;
pub mod source;

pub use cluster::{cluster, DisjointSet, SimilarityGroup, DEFAULT_THRESHOLD};
pub use decision::{DecisionEntry, DecisionLayout, DecisionSet, GroupDecision, SpaceSavings};
pub use fingerprint::{Fingerprint, ImageRecord};
pub use pipeline::{CancelFlag, Engine, EngineSettings, FingerprintBatch, ScanReport};
pub use scorer::{rank_group, QualityWeights, RankedGroup, ScoredRecord};
pub use source::{DateRange, ImageSource, LocalSource, PixelSource, SourceImage};
