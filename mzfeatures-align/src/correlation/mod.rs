//! Correlation of rows by their heights across samples and the elution
//! profile shapes of their features.
use mzfeatures::{FeatureList, RTTolerance, RawFileId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::task::{CancellationToken, NoProgress, ProgressSink, TaskStatus};

mod data;
mod filter;
mod height;
mod row;
mod shape;

pub use data::{CorrelationData, SimilarityMeasure};
pub use filter::{MinimumFeatureFilter, RegressionFilter};
pub use height::corr_row_to_row_height;
pub use row::{corr_row_to_row, corr_row_to_row_shapes, RowCorrelation, RowCorrelationParams};
pub use shape::{
    corr_feature_shape, corr_feature_shape_across_files, corr_feature_shape_interpolated,
    interpolated_shape, ShapeCorrelationParams,
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CorrelationError {
    #[error(
        "Cannot correlate features of {first} and {second} by scan, use the interpolated shape correlation"
    )]
    UnsupportedCrossFile { first: RawFileId, second: RawFileId },
    #[error("Interpolated shapes do not share the apex position {0}")]
    MissingInterpolationAnchor(f64),
    #[error("The operation was canceled")]
    Canceled,
}

/// Settings for correlating all rows of a feature list
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationParams {
    /// Only rows with average retention times within this tolerance are compared
    pub rt_tolerance: RTTolerance,
    pub row: RowCorrelationParams,
    pub min_shape_similarity: f64,
    pub min_total_shape_similarity: Option<f64>,
    pub measure: SimilarityMeasure,
    pub min_samples: MinimumFeatureFilter,
}

impl Default for CorrelationParams {
    fn default() -> Self {
        Self {
            rt_tolerance: RTTolerance::absolute(0.1),
            row: RowCorrelationParams::default(),
            min_shape_similarity: 0.85,
            min_total_shape_similarity: None,
            measure: SimilarityMeasure::Pearson,
            min_samples: MinimumFeatureFilter::default(),
        }
    }
}

/// Correlate every pair of rows of `list` eluting within the retention time
/// tolerance of each other, keeping the pairs that still carry a valid
/// correlation after filtering.
///
/// `cancel` is polled before each row.
pub fn correlate_feature_list(
    list: &FeatureList,
    params: &CorrelationParams,
    cancel: &CancellationToken,
) -> Result<Vec<RowCorrelation>, CorrelationError> {
    correlate_feature_list_with_progress(list, params, &NoProgress, cancel)
}

/// [`correlate_feature_list`] reporting one unit of progress per row and
/// the run's final status to `progress`
pub fn correlate_feature_list_with_progress(
    list: &FeatureList,
    params: &CorrelationParams,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<Vec<RowCorrelation>, CorrelationError> {
    progress.set_status(TaskStatus::Processing);
    let result = correlate_rows(list, params, progress, cancel);
    match &result {
        Ok(_) => progress.set_status(TaskStatus::Finished),
        Err(CorrelationError::Canceled) => progress.set_status(TaskStatus::Canceled),
        Err(e) => {
            progress.set_error(e.to_string());
            progress.set_status(TaskStatus::Error);
        }
    }
    result
}

fn correlate_rows(
    list: &FeatureList,
    params: &CorrelationParams,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<Vec<RowCorrelation>, CorrelationError> {
    let raw_files: Vec<RawFileId> = list.raw_files().iter().map(|r| r.id()).collect();
    let mut rows: Vec<(f32, usize)> = list
        .rows()
        .iter()
        .enumerate()
        .filter_map(|(i, row)| row.average_rt().map(|rt| (rt, i)))
        .collect();
    rows.sort_by(|a, b| a.0.total_cmp(&b.0));
    progress.set_total(rows.len());

    let mut result = Vec::new();
    let mut n_compared = 0usize;
    for (i, (rt_a, idx_a)) in rows.iter().copied().enumerate() {
        if cancel.is_canceled() {
            return Err(CorrelationError::Canceled);
        }
        let row_a = &list.rows()[idx_a];
        for (rt_b, idx_b) in rows[i + 1..].iter().copied() {
            if !params.rt_tolerance.check_within(rt_a, rt_b) {
                break;
            }
            n_compared += 1;
            let row_b = &list.rows()[idx_b];
            let Some(corr) = corr_row_to_row(&raw_files, row_a, row_b, &params.row)? else {
                continue;
            };
            let corr = corr
                .validate_shape_correlation(
                    params.min_shape_similarity,
                    params.min_total_shape_similarity,
                    params.measure,
                )
                .check_min_shape_correlation(&raw_files, &params.min_samples);
            if corr.is_valid() {
                result.push(corr);
            }
        }
        progress.increment(1);
    }
    debug!("Compared {n_compared} row pairs");
    info!(
        "Retained {} correlations among {} rows of {}",
        result.len(),
        list.num_rows(),
        list.name()
    );
    Ok(result)
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use mzfeatures::{
        recalculate_derived_attributes, CenterMeasure, Feature, FeatureListRow, IonTimeSeries,
        RawDataFile, RowId, Scan,
    };

    use super::*;
    use crate::task::ProgressCounter;

    const SHAPE: [f64; 9] = [1.0, 3.0, 7.0, 12.0, 20.0, 12.0, 7.0, 3.0, 1.0];

    fn feature(raw: &Arc<RawDataFile>, first_scan: u32, mz: f64, scale: f64) -> Feature {
        let scans: Vec<u32> = (first_scan..first_scan + 9).collect();
        let series = IonTimeSeries::from_scans(
            raw.as_ref(),
            scans,
            vec![mz; 9],
            SHAPE.iter().map(|v| v * scale).collect(),
        )
        .unwrap();
        let mut f = Feature::new(raw.clone(), series);
        recalculate_derived_attributes(&mut f, CenterMeasure::Avg);
        f
    }

    fn make_list() -> FeatureList {
        let raws: Vec<_> = (0..2u32)
            .map(|id| {
                let scans = (0..100).map(|i| Scan::new(i, i as f32 * 0.01, 1)).collect();
                Arc::new(RawDataFile::new(RawFileId(id), format!("r{id}"), scans))
            })
            .collect();
        let mut list = FeatureList::new("corr".into(), raws.clone()).unwrap();
        // two co-eluting ions and one late ion
        for (id, first_scan, mz, scale) in [(1, 10, 180.06, 100.0), (2, 10, 181.07, 12.0), (3, 60, 300.1, 50.0)] {
            let mut row = FeatureListRow::new(RowId(id));
            for (k, raw) in raws.iter().enumerate() {
                row.add_feature(feature(raw, first_scan, mz, scale * (k + 1) as f64));
            }
            list.add_row(row).unwrap();
        }
        list
    }

    #[test_log::test]
    fn test_correlate_list() {
        let list = make_list();
        let params = CorrelationParams {
            rt_tolerance: RTTolerance::absolute(0.05),
            ..Default::default()
        };
        let corrs = correlate_feature_list(&list, &params, &CancellationToken::new()).unwrap();
        assert_eq!(corrs.len(), 1);
        let corr = &corrs[0];
        let mut ids = [corr.row_a, corr.row_b];
        ids.sort();
        assert_eq!(ids, [RowId(1), RowId(2)]);
        assert!(corr.has_shape_correlation());
    }

    #[test]
    fn test_canceled() {
        let list = make_list();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = correlate_feature_list(&list, &CorrelationParams::default(), &cancel).unwrap_err();
        assert_eq!(err, CorrelationError::Canceled);
    }

    #[test]
    fn test_progress_reported() {
        let list = make_list();
        let params = CorrelationParams {
            rt_tolerance: RTTolerance::absolute(0.05),
            ..Default::default()
        };
        let progress = ProgressCounter::new();
        correlate_feature_list_with_progress(&list, &params, &progress, &CancellationToken::new())
            .unwrap();
        assert_eq!(progress.status(), TaskStatus::Finished);
        assert_eq!(progress.total(), 3);
        assert_eq!(progress.processed(), 3);
    }
}
