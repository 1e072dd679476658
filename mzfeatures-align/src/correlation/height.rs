use mzfeatures::{FeatureListRow, RawFileId};

use super::data::CorrelationData;

fn height_of(row: &FeatureListRow, raw_file: RawFileId) -> Option<f64> {
    row.feature(raw_file)
        .map(|f| f.height().unwrap_or(0.0) as f64)
}

/// Correlate the heights of two rows across `raw_files`.
///
/// Files where both rows have a feature at or above `min_height` contribute
/// a pair directly. When exactly one side is missing or below `min_height`,
/// and the mean observed height ratio projects it back above `min_height`,
/// the missing side is imputed as `noise_level` (or its own height, if that
/// is larger). Returns `None` with fewer than `min(min_dp, 2)` pairs, or
/// with no pairs at all. A larger `min_dp` is left to
/// [`RegressionFilter::is_sufficient_data`](super::RegressionFilter::is_sufficient_data),
/// which passes short correlations through instead of rejecting them.
pub fn corr_row_to_row_height(
    raw_files: &[RawFileId],
    row_a: &FeatureListRow,
    row_b: &FeatureListRow,
    min_height: f64,
    noise_level: f64,
    min_dp: usize,
) -> Option<CorrelationData> {
    let min_dp = min_dp.clamp(1, 2);
    let mut pairs = Vec::new();
    let mut ratio = 0.0;
    for raw in raw_files.iter().copied() {
        if let (Some(a), Some(b)) = (height_of(row_a, raw), height_of(row_b, raw)) {
            if a >= min_height && b >= min_height {
                pairs.push([a, b]);
                ratio += a / b;
            }
        }
    }
    ratio /= pairs.len() as f64;

    if ratio.is_finite() && ratio != 0.0 {
        for raw in raw_files.iter().copied() {
            let ha = height_of(row_a, raw);
            let hb = height_of(row_b, raw);
            let a_missing = ha.map_or(true, |h| h < min_height);
            let b_missing = hb.map_or(true, |h| h < min_height);
            if a_missing == b_missing {
                continue;
            }
            let (mut a, mut b) = if a_missing {
                (hb.unwrap_or(0.0) * ratio, hb.unwrap_or(0.0))
            } else {
                (ha.unwrap_or(0.0), ha.unwrap_or(0.0) / ratio)
            };
            if a >= min_height && b >= min_height {
                if a_missing {
                    a = noise_level.max(ha.unwrap_or(0.0));
                } else {
                    b = noise_level.max(hb.unwrap_or(0.0));
                }
                pairs.push([a, b]);
            }
        }
    }

    if pairs.len() < min_dp {
        None
    } else {
        Some(CorrelationData::from_pairs(pairs))
    }
}
