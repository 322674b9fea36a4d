// Module declarations
pub mod analysis;
pub mod descriptions;
pub mod index;
pub mod labels;
pub mod matching;
#[cfg(test)]
mod tests;
pub mod zscore;

pub use analysis::{ClusterAnalysis, ClusterAnalyzer, Labeling};
pub use descriptions::{GroupDescription, NodeDescription};
pub use index::IndexTables;
pub use labels::{GroupLabels, NodeLabel, NodeLabels};
pub use matching::{MatchOptions, MatchReport, TargetRecord, ZeroMeanPolicy};
pub use zscore::{ZScoreTable, DEFAULT_STD_THRESHOLD, DEFAULT_ZSCORE_THRESHOLD};
