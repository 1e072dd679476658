use std::collections::BTreeMap;

use mzfeatures::{FeatureListRow, RawFileId, RowId};
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::data::{CorrelationData, SimilarityMeasure};
use super::filter::{MinimumFeatureFilter, RegressionFilter};
use super::height::corr_row_to_row_height;
use super::shape::{corr_feature_shape, ShapeCorrelationParams};
use super::CorrelationError;

/// The correlation of two rows: their heights across raw files and the
/// elution profile shapes of their features within each raw file.
///
/// This is an owned value. Filtering consumes it and returns the filtered
/// correlation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowCorrelation {
    pub row_a: RowId,
    pub row_b: RowId,
    pub height: Option<CorrelationData>,
    pub shapes: Option<BTreeMap<RawFileId, CorrelationData>>,
}

impl RowCorrelation {
    pub fn new(
        row_a: RowId,
        row_b: RowId,
        height: Option<CorrelationData>,
        shapes: Option<BTreeMap<RawFileId, CorrelationData>>,
    ) -> Self {
        let shapes = shapes.filter(|s| !s.is_empty());
        Self {
            row_a,
            row_b,
            height,
            shapes,
        }
    }

    pub fn has_height_correlation(&self) -> bool {
        self.height.as_ref().is_some_and(|h| h.is_valid())
    }

    pub fn has_shape_correlation(&self) -> bool {
        self.shapes.as_ref().is_some_and(|s| !s.is_empty())
    }

    pub fn is_valid(&self) -> bool {
        self.has_height_correlation() || self.has_shape_correlation()
    }

    /// All shape correlation pairs pooled into one regression over every raw
    /// file. This is not the mean of the per-file correlations, see
    /// [`RowCorrelation::average_shape_similarity`] for that.
    pub fn total_shape_correlation(&self) -> Option<CorrelationData> {
        let shapes = self.shapes.as_ref()?;
        let pooled: Vec<[f64; 2]> = shapes
            .values()
            .flat_map(|c| c.data().iter().copied())
            .collect();
        if pooled.is_empty() {
            None
        } else {
            Some(CorrelationData::from_pairs(pooled))
        }
    }

    /// The mean per-file shape similarity
    pub fn average_shape_similarity(&self, measure: SimilarityMeasure) -> Option<f64> {
        let shapes = self.shapes.as_ref()?;
        if shapes.is_empty() {
            return None;
        }
        let total: f64 = shapes.values().map(|c| c.similarity(measure)).sum();
        Some(total / shapes.len() as f64)
    }

    /// Remove per-file shape correlations below `min_shape_similarity`, then,
    /// when `min_total_similarity` is given, drop all shapes if the pooled
    /// correlation falls below it
    pub fn validate_shape_correlation(
        mut self,
        min_shape_similarity: f64,
        min_total_similarity: Option<f64>,
        measure: SimilarityMeasure,
    ) -> Self {
        if let Some(shapes) = self.shapes.as_mut() {
            shapes.retain(|_, c| c.is_valid() && c.similarity(measure) >= min_shape_similarity);
        }
        self.shapes = self.shapes.filter(|s| !s.is_empty());
        if let Some(min_total) = min_total_similarity {
            let passes = self
                .total_shape_correlation()
                .is_some_and(|t| t.similarity(measure) >= min_total);
            if !passes {
                self.shapes = None;
            }
        }
        self
    }

    /// Drop all shapes unless enough of `raw_files` still carry a valid shape
    /// correlation
    pub fn check_min_shape_correlation(
        mut self,
        raw_files: &[RawFileId],
        filter: &MinimumFeatureFilter,
    ) -> Self {
        let present: Vec<RawFileId> = self
            .shapes
            .iter()
            .flat_map(|s| s.iter())
            .filter(|(_, c)| c.is_valid())
            .map(|(k, _)| *k)
            .collect();
        if !filter.filter_min_features(raw_files, &present) {
            self.shapes = None;
        }
        self
    }
}

/// Correlate the feature shapes of two rows in every raw file both are
/// detected in.
///
/// Returns `Ok(None)` when any file's correlation is rejected by
/// `reject`, as that contradicts the two rows being related at all.
/// Correlations with fewer than `params.min_data_points` are left out.
pub fn corr_row_to_row_shapes(
    raw_files: &[RawFileId],
    row_a: &FeatureListRow,
    row_b: &FeatureListRow,
    params: &ShapeCorrelationParams,
    reject: &RegressionFilter,
) -> Result<Option<BTreeMap<RawFileId, CorrelationData>>, CorrelationError> {
    let mut shapes = BTreeMap::new();
    for raw in raw_files.iter().copied() {
        let (Some(f1), Some(f2)) = (row_a.feature(raw), row_b.feature(raw)) else {
            continue;
        };
        let Some(corr) = corr_feature_shape(f1, f2, params)? else {
            continue;
        };
        if reject.is_negative_regression(&corr) {
            trace!(
                "Shapes of {} and {} in {raw} are anti-correlated",
                row_a.id(),
                row_b.id()
            );
            return Ok(None);
        }
        if corr.dp_count() >= params.min_data_points {
            shapes.insert(raw, corr);
        }
    }
    Ok(Some(shapes))
}

/// Settings for correlating one pair of rows
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RowCorrelationParams {
    pub shape: ShapeCorrelationParams,
    pub correlate_shapes: bool,
    pub shape_filter: RegressionFilter,
    /// When set, rows with an anti-correlated height profile are not correlated
    pub height_filter: Option<RegressionFilter>,
    pub min_height: f64,
    pub min_height_dp: usize,
}

impl Default for RowCorrelationParams {
    fn default() -> Self {
        Self {
            shape: ShapeCorrelationParams::default(),
            correlate_shapes: true,
            shape_filter: RegressionFilter::shape_profile(),
            height_filter: Some(RegressionFilter::height_profile(
                2,
                0.7,
                SimilarityMeasure::Pearson,
            )),
            min_height: 0.0,
            min_height_dp: 2,
        }
    }
}

/// Correlate two rows over `raw_files`.
///
/// Returns `Ok(None)` when the height filter rejects the pair. A missing
/// height correlation never rejects.
pub fn corr_row_to_row(
    raw_files: &[RawFileId],
    row_a: &FeatureListRow,
    row_b: &FeatureListRow,
    params: &RowCorrelationParams,
) -> Result<Option<RowCorrelation>, CorrelationError> {
    let mut height = None;
    if let Some(filter) = params.height_filter.as_ref() {
        height = corr_row_to_row_height(
            raw_files,
            row_a,
            row_b,
            params.min_height,
            params.shape.noise_level,
            params.min_height_dp,
        );
        if height
            .as_ref()
            .is_some_and(|h| filter.is_negative_regression(h))
        {
            return Ok(None);
        }
    }

    let shapes = if params.correlate_shapes {
        corr_row_to_row_shapes(raw_files, row_a, row_b, &params.shape, &params.shape_filter)?
    } else {
        None
    };
    Ok(Some(RowCorrelation::new(
        row_a.id(),
        row_b.id(),
        height,
        shapes,
    )))
}
