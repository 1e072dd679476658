//! Correlation and join alignment of [`mzfeatures`] feature lists.
//!
//! [`correlation`] relates rows within one feature list by how their
//! heights and elution profiles co-vary. [`alignment`] merges rows from
//! feature lists over different raw data files into a single list.
pub mod alignment;
pub mod correlation;
pub mod isotopes;
pub mod spectral;
pub mod task;

pub use crate::alignment::{AlignmentError, JoinAligner, JoinAlignerParams};
pub use crate::correlation::{
    correlate_feature_list, correlate_feature_list_with_progress, CorrelationData,
    CorrelationError, CorrelationParams, RowCorrelation, SimilarityMeasure,
};
pub use crate::isotopes::{IsotopePatternMatchParams, IsotopePatternScoreCalculator};
pub use crate::spectral::{
    SpectralSimilarity, SpectralSimilarityFunction, SpectralSimilarityParams,
    WeightedCosineSimilarity,
};
pub use crate::task::{CancellationToken, NoProgress, ProgressCounter, ProgressSink, TaskStatus};
