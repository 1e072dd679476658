//! Correlation of the elution profiles of two features.
use mzfeatures::{Feature, IntensitySeries, TimeSeries};
use serde::{Deserialize, Serialize};

use super::data::CorrelationData;
use super::CorrelationError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeCorrelationParams {
    /// The minimum total number of paired points
    pub min_data_points: usize,
    /// The minimum number of paired points on each side of the apex
    pub min_data_points_on_edge: usize,
    /// Points of either feature below this intensity end the walk
    pub noise_level: f64,
}

impl Default for ShapeCorrelationParams {
    fn default() -> Self {
        Self {
            min_data_points: 5,
            min_data_points_on_edge: 2,
            noise_level: 0.0,
        }
    }
}

impl ShapeCorrelationParams {
    pub fn new(min_data_points: usize, min_data_points_on_edge: usize, noise_level: f64) -> Self {
        Self {
            min_data_points,
            min_data_points_on_edge,
            noise_level,
        }
    }
}

/// The index of the first maximum, scanning from a zero floor
fn index_of_max(values: &[f64]) -> usize {
    let mut index = 0;
    let mut max = 0.0;
    for (i, v) in values.iter().copied().enumerate() {
        if v > max {
            max = v;
            index = i;
        }
    }
    index
}

/// Walk outward from the apex of `a` (at `apex_a`) and the matching point
/// of `b` (at `apex_b`), pairing intensities while the keys agree and both
/// intensities stay at or above the noise level.
#[allow(clippy::too_many_arguments)]
fn walk_from_apex<K, F>(
    keys_a: &[K],
    ys_a: &[f64],
    keys_b: &[K],
    ys_b: &[f64],
    apex_a: usize,
    apex_b: usize,
    params: &ShapeCorrelationParams,
    same: F,
) -> Option<CorrelationData>
where
    F: Fn(&K, &K) -> bool,
{
    let noise = params.noise_level;
    let mut pairs = Vec::new();

    // left side, including the apex
    let (mut i, mut j) = (apex_a as isize, apex_b as isize);
    while i >= 0 && j >= 0 {
        let (iu, ju) = (i as usize, j as usize);
        if !same(&keys_a[iu], &keys_b[ju]) || ys_a[iu] < noise || ys_b[ju] < noise {
            break;
        }
        pairs.push([ys_a[iu], ys_b[ju]]);
        i -= 1;
        j -= 1;
    }
    let left = pairs.len() as isize - 1;
    if left < params.min_data_points_on_edge as isize {
        return None;
    }

    // right side
    let (mut i, mut j) = (apex_a + 1, apex_b + 1);
    while i < keys_a.len() && j < keys_b.len() {
        if !same(&keys_a[i], &keys_b[j]) || ys_a[i] < noise || ys_b[j] < noise {
            break;
        }
        pairs.push([ys_a[i], ys_b[j]]);
        i += 1;
        j += 1;
    }
    let right = pairs.len() as isize - 1 - left;

    if pairs.len() >= params.min_data_points && right >= params.min_data_points_on_edge as isize {
        Some(CorrelationData::from_pairs(pairs))
    } else {
        None
    }
}

/// Correlate the elution profiles of two features from the same raw data file.
///
/// Points are paired by scan identity, starting at the apex of the more
/// intense feature. `Ok(None)` means there was not enough paired signal.
pub fn corr_feature_shape(
    f1: &Feature,
    f2: &Feature,
    params: &ShapeCorrelationParams,
) -> Result<Option<CorrelationData>, CorrelationError> {
    if f1.raw_file_id() != f2.raw_file_id() {
        return Err(CorrelationError::UnsupportedCrossFile {
            first: f1.raw_file_id(),
            second: f2.raw_file_id(),
        });
    }
    let (a, b) = if f2.height().unwrap_or(0.0) > f1.height().unwrap_or(0.0) {
        (f2.series(), f1.series())
    } else {
        (f1.series(), f2.series())
    };
    if a.len() < params.min_data_points || b.len() < params.min_data_points {
        return Ok(None);
    }
    let scans_a = a.scan_indices();
    let scans_b = b.scan_indices();
    let apex_a = index_of_max(a.intensities());
    let apex_b = match scans_b.iter().position(|s| *s == scans_a[apex_a]) {
        Some(j) => j,
        None => return Ok(None),
    };
    Ok(walk_from_apex(
        scans_a,
        a.intensities(),
        scans_b,
        b.intensities(),
        apex_a,
        apex_b,
        params,
        |x, y| x == y,
    ))
}

fn interpolate_at(x: f64, xs: &[f64], ys: &[f64]) -> f64 {
    let i = xs.partition_point(|v| *v < x);
    if i >= xs.len() {
        return ys[xs.len() - 1];
    }
    if xs[i] == x || i == 0 {
        return ys[i];
    }
    let (x0, x1) = (xs[i - 1], xs[i]);
    let (y0, y1) = (ys[i - 1], ys[i]);
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

/// Resample `other` onto the union of both x grids within their overlap.
///
/// The x values of both series inside the overlapping range are merged and
/// sorted, and `other`'s y is linearly interpolated at each of them. Returns
/// `None` when the ranges do not overlap or either series is empty.
pub fn interpolated_shape(
    main_x: &[f64],
    other_x: &[f64],
    other_y: &[f64],
) -> Option<(Vec<f64>, Vec<f64>)> {
    let (main_first, main_last) = (*main_x.first()?, *main_x.last()?);
    let (other_first, other_last) = (*other_x.first()?, *other_x.last()?);
    let start = main_first.max(other_first);
    let end = main_last.min(other_last);
    if start > end {
        return None;
    }
    let mut grid: Vec<f64> = main_x
        .iter()
        .chain(other_x.iter())
        .copied()
        .filter(|x| *x >= start && *x <= end)
        .collect();
    grid.sort_by(|a, b| a.total_cmp(b));
    grid.dedup();
    let ys = grid
        .iter()
        .map(|x| interpolate_at(*x, other_x, other_y))
        .collect();
    Some((grid, ys))
}

/// Correlate two profiles sampled on different x grids, such as the same
/// compound in two raw data files or fragment traces with their own
/// retention times.
///
/// Both profiles are resampled onto the shared grid of their overlap and
/// walked outward from the apex of the longer one, pairing points with
/// exactly equal x.
pub fn corr_feature_shape_interpolated(
    x1: &[f64],
    y1: &[f64],
    x2: &[f64],
    y2: &[f64],
    params: &ShapeCorrelationParams,
) -> Result<Option<CorrelationData>, CorrelationError> {
    if y1.len() < params.min_data_points || y2.len() < params.min_data_points {
        return Ok(None);
    }
    let ((long_x, long_y), (short_x, short_y)) = if y1.len() >= y2.len() {
        ((x1, y1), (x2, y2))
    } else {
        ((x2, y2), (x1, y1))
    };
    let Some((grid_b, ys_b)) = interpolated_shape(long_x, short_x, short_y) else {
        return Ok(None);
    };
    let Some((grid_a, ys_a)) = interpolated_shape(short_x, long_x, long_y) else {
        return Ok(None);
    };
    if ys_a.is_empty() {
        return Ok(None);
    }
    let apex_a = index_of_max(&ys_a);
    let anchor = grid_a[apex_a];
    let apex_b = grid_b
        .iter()
        .position(|x| *x == anchor)
        .ok_or(CorrelationError::MissingInterpolationAnchor(anchor))?;
    Ok(walk_from_apex(
        &grid_a,
        &ys_a,
        &grid_b,
        &ys_b,
        apex_a,
        apex_b,
        params,
        |x, y| x == y,
    ))
}

/// Correlate two features from different raw data files using their
/// retention times as the shared axis
pub fn corr_feature_shape_across_files(
    f1: &Feature,
    f2: &Feature,
    params: &ShapeCorrelationParams,
) -> Result<Option<CorrelationData>, CorrelationError> {
    let rts = |f: &Feature| -> Vec<f64> { f.series().rts().iter().map(|v| *v as f64).collect() };
    corr_feature_shape_interpolated(
        &rts(f1),
        f1.series().intensities(),
        &rts(f2),
        f2.series().intensities(),
        params,
    )
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use mzfeatures::{IonTimeSeries, RawDataFile, RawFileId, Scan};

    use super::*;

    fn raw(id: u32) -> Arc<RawDataFile> {
        let scans = (0..40).map(|i| Scan::new(i, i as f32 * 0.1, 1)).collect();
        Arc::new(RawDataFile::new(RawFileId(id), format!("r{id}"), scans))
    }

    fn feature(raw: &Arc<RawDataFile>, scans: Vec<u32>, intensities: Vec<f64>) -> Feature {
        let mzs = vec![500.0; scans.len()];
        let series = IonTimeSeries::from_scans(raw.as_ref(), scans, mzs, intensities).unwrap();
        let mut f = Feature::new(raw.clone(), series);
        mzfeatures::recalculate_derived_attributes(&mut f, mzfeatures::CenterMeasure::Avg);
        f
    }

    const SHAPE: [f64; 9] = [1.0, 3.0, 7.0, 12.0, 20.0, 12.0, 7.0, 3.0, 1.0];

    #[test]
    fn test_same_file_perfect() {
        let r = raw(0);
        let a = feature(&r, (10..19).collect(), SHAPE.to_vec());
        let b = feature(&r, (10..19).collect(), SHAPE.iter().map(|v| v * 0.5).collect());
        let params = ShapeCorrelationParams::new(5, 2, 0.0);
        let corr = corr_feature_shape(&a, &b, &params).unwrap().unwrap();
        assert_eq!(corr.dp_count(), 9);
        assert!((corr.pearson_r() - 1.0).abs() < 1e-9);
        // a is the more intense, so it sits on the x axis
        assert!((corr.slope() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_same_file_identical() {
        let r = raw(0);
        let a = feature(&r, (10..19).collect(), SHAPE.to_vec());
        let b = feature(&r, (10..19).collect(), SHAPE.to_vec());
        assert_eq!(a.height(), b.height());
        let params = ShapeCorrelationParams::new(5, 2, 0.0);
        let corr = corr_feature_shape(&a, &b, &params).unwrap().unwrap();
        assert_eq!(corr.dp_count(), 9);
        assert!((corr.pearson_r() - 1.0).abs() < 1e-12);
        assert!((corr.slope() - 1.0).abs() < 1e-12);
        assert!(corr.intercept().abs() < 1e-9);
    }

    #[test]
    fn test_same_file_offset_and_noise() {
        let r = raw(0);
        let a = feature(&r, (10..19).collect(), SHAPE.to_vec());
        // b starts at a's apex scan, leaving nothing to pair on the left
        let b = feature(&r, (14..23).collect(), SHAPE.to_vec());
        let params = ShapeCorrelationParams::new(5, 2, 0.0);
        let corr = corr_feature_shape(&a, &b, &params).unwrap();
        assert!(corr.is_none());

        let params = ShapeCorrelationParams::new(3, 2, 5.0);
        let c = feature(&r, (10..19).collect(), SHAPE.to_vec());
        let corr = corr_feature_shape(&a, &c, &params).unwrap().unwrap();
        // only the points above 5.0 pair
        assert_eq!(corr.dp_count(), 5);
    }

    #[test]
    fn test_cross_file_rejected() {
        let a = feature(&raw(0), (10..19).collect(), SHAPE.to_vec());
        let b = feature(&raw(1), (10..19).collect(), SHAPE.to_vec());
        let err = corr_feature_shape(&a, &b, &ShapeCorrelationParams::default()).unwrap_err();
        assert!(matches!(err, CorrelationError::UnsupportedCrossFile { .. }));

        let corr = corr_feature_shape_across_files(&a, &b, &ShapeCorrelationParams::default())
            .unwrap()
            .unwrap();
        assert!((corr.pearson_r() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_interpolated_shifted_grid() {
        // a triangle sampled on two interleaved grids
        let tri = |x: f64| (10.0 - (x - 5.0).abs() * 2.0).max(0.0);
        let x1: Vec<f64> = (0..=20).map(|i| i as f64 * 0.5).collect();
        let x2: Vec<f64> = (0..20).map(|i| 0.25 + i as f64 * 0.5).collect();
        let y1: Vec<f64> = x1.iter().map(|x| tri(*x)).collect();
        let y2: Vec<f64> = x2.iter().map(|x| tri(*x)).collect();
        let params = ShapeCorrelationParams::new(5, 2, 0.5);
        let corr = corr_feature_shape_interpolated(&x1, &y1, &x2, &y2, &params)
            .unwrap()
            .unwrap();
        assert!(corr.dp_count() >= 5);
        assert!(corr.pearson_r() > 0.99, "{}", corr.pearson_r());
    }

    #[test]
    fn test_interpolated_shape_grid() {
        let (grid, ys) =
            interpolated_shape(&[0.0, 1.0, 2.0], &[0.5, 1.5, 2.5], &[2.0, 4.0, 6.0]).unwrap();
        assert_eq!(grid, vec![0.5, 1.0, 1.5, 2.0]);
        assert_eq!(ys, vec![2.0, 3.0, 4.0, 5.0]);
        assert!(interpolated_shape(&[0.0, 1.0], &[2.0, 3.0], &[1.0; 2]).is_none());
    }
}
