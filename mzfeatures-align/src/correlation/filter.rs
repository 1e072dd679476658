use mzfeatures::{AbsoluteNRelative, RawFileId};
use serde::{Deserialize, Serialize};

use super::data::{CorrelationData, SimilarityMeasure};

/// Rules for rejecting a correlation whose regression contradicts a
/// positive linear relationship.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionFilter {
    /// At least one axis must span this max/min ratio for the rule to apply
    pub min_fold_change: f64,
    /// Slope p-values above this are not significant
    pub max_slope_significance: f64,
    pub min_dp: usize,
    pub min_similarity: f64,
    pub measure: SimilarityMeasure,
}

impl RegressionFilter {
    pub fn new(
        min_fold_change: f64,
        max_slope_significance: f64,
        min_dp: usize,
        min_similarity: f64,
        measure: SimilarityMeasure,
    ) -> Self {
        Self {
            min_fold_change,
            max_slope_significance,
            min_dp,
            min_similarity,
            measure,
        }
    }

    /// Thresholds for correlating row heights across samples
    pub fn height_profile(min_dp: usize, min_similarity: f64, measure: SimilarityMeasure) -> Self {
        Self::new(10.0, 0.3, min_dp, min_similarity, measure)
    }

    /// Thresholds for rejecting a clearly unrelated pair of elution profiles
    pub fn shape_profile() -> Self {
        Self::new(5.0, 0.2, 7, 0.5, SimilarityMeasure::Pearson)
    }

    /// Whether there are at least three and at least `min_dp` points, and
    /// one of the axes reaches `min_fold_change`
    pub fn is_sufficient_data(&self, corr: &CorrelationData) -> bool {
        if corr.dp_count() < 3 || corr.dp_count() < self.min_dp {
            return false;
        }
        let max_fc = corr.max_fold_change(0).max(corr.max_fold_change(1));
        max_fc >= self.min_fold_change
    }

    /// Whether `corr` should be rejected. Insufficient data and an
    /// incalculable slope significance never reject.
    pub fn is_negative_regression(&self, corr: &CorrelationData) -> bool {
        if !self.is_sufficient_data(corr) {
            return false;
        }
        let significance = corr.regression_significance();
        if significance.is_nan() {
            return false;
        }
        corr.slope() <= 0.0
            || significance > self.max_slope_significance
            || corr.similarity(self.measure) < self.min_similarity
    }
}

/// Requires a feature in a minimum number of raw files, given either as an
/// absolute count or as a fraction of all files
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct MinimumFeatureFilter {
    pub min_samples: AbsoluteNRelative,
}

impl MinimumFeatureFilter {
    pub fn new(min_samples: AbsoluteNRelative) -> Self {
        Self { min_samples }
    }

    /// Whether `present`, a subset of `all`, is large enough
    pub fn filter_min_features(&self, all: &[RawFileId], present: &[RawFileId]) -> bool {
        let n = present.iter().filter(|id| all.contains(id)).count();
        self.min_samples
            .check_greater_equal_max(all.len() as f64, n as f64)
    }
}
