//! Peak shape quality metrics: full width at half maximum, tailing factor
//! and asymmetry factor.
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::attributes::{AttributeKind, AttributeValue};
use crate::feature::Feature;
use crate::interval::Interval;
use crate::list::FeatureList;
use crate::series::{IntensitySeries, TimeSeries};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QualityError {
    #[error("The feature has no {} value", .0.name())]
    MissingAttribute(AttributeKind),
    #[error("The feature has no data points")]
    NoDataPoints,
}

/// Find the retention times where the signal crosses `target` on either side
/// of the apex.
///
/// A single pass over the interior samples tracks, separately for samples
/// before and after `apex_rt`, the sample whose intensity is closest to
/// without equaling `target`. Before the apex the crossing is bracketed by
/// that sample and its successor, after the apex by its predecessor and the
/// sample itself. The crossing is then linearly interpolated. When no usable
/// bracket exists the nearer bracket sample is used, and failing that the
/// bound of `rt_range`.
pub fn intercept_rts_at_intensity(
    target: f64,
    apex_rt: f64,
    rts: &[f32],
    intensities: &[f64],
    rt_range: Interval<f64>,
) -> (f64, f64) {
    let n = rts.len().min(intensities.len());

    let (mut x1, mut y1, mut x2, mut y2) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);
    let (mut x3, mut y3, mut x4, mut y4) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);
    let mut last_diff_before = target;
    let mut last_diff_after = target;

    if n >= 3 {
        for i in 1..n - 1 {
            let rt = rts[i] as f64;
            let diff = (target - intensities[i]).abs();
            if diff < last_diff_before && diff > 0.0 && rt < apex_rt {
                x1 = rt;
                y1 = intensities[i];
                x2 = rts[i + 1] as f64;
                y2 = intensities[i + 1];
                last_diff_before = diff;
            } else if diff < last_diff_after && diff > 0.0 && rt > apex_rt {
                x3 = rts[i - 1] as f64;
                y3 = intensities[i - 1];
                x4 = rt;
                y4 = intensities[i];
                last_diff_after = diff;
            }
        }
    }

    let before = if y1 > 0.0 {
        let slope = (y2 - y1) / (x2 - x1);
        let intercept = y1 - slope * x1;
        (target - intercept) / slope
    } else if x2 > 0.0 {
        x2
    } else {
        rt_range.start
    };

    let after = if y4 > 0.0 {
        let slope = (y4 - y3) / (x4 - x3);
        let intercept = y3 - slope * x3;
        (target - intercept) / slope
    } else if x3 > 0.0 {
        x3
    } else {
        rt_range.end
    };

    (before, after)
}

struct PeakGeometry<'a> {
    height: f64,
    apex_rt: f64,
    rts: &'a [f32],
    intensities: &'a [f64],
    rt_range: Interval<f64>,
}

impl<'a> PeakGeometry<'a> {
    fn from_feature(feature: &'a Feature) -> Result<Self, QualityError> {
        let height = feature
            .height()
            .ok_or(QualityError::MissingAttribute(AttributeKind::Height))?;
        let apex_rt = feature
            .rt()
            .ok_or(QualityError::MissingAttribute(AttributeKind::Rt))?;
        let series = feature.series();
        if series.is_empty() {
            return Err(QualityError::NoDataPoints);
        }
        let rt_range = feature
            .rt_range()
            .unwrap_or_else(|| Interval::singleton(apex_rt));
        Ok(Self {
            height: height as f64,
            apex_rt: apex_rt as f64,
            rts: series.rts(),
            intensities: series.intensities(),
            rt_range: rt_range.into(),
        })
    }

    fn intercepts(&self, fraction: f64) -> (f64, f64) {
        intercept_rts_at_intensity(
            self.height * fraction,
            self.apex_rt,
            self.rts,
            self.intensities,
            self.rt_range,
        )
    }

    fn fwhm(&self) -> f32 {
        let (before, after) = self.intercepts(0.5);
        sanitize(after - before)
    }

    fn tailing_factor(&self) -> f32 {
        let (before, after) = self.intercepts(0.05);
        sanitize((after - before) / (2.0 * (self.apex_rt - before)))
    }

    fn asymmetry_factor(&self) -> f32 {
        let (before, after) = self.intercepts(0.1);
        sanitize((after - self.apex_rt) / (self.apex_rt - before))
    }
}

fn sanitize(value: f64) -> f32 {
    let value = value as f32;
    if value <= 0.0 || !value.is_finite() {
        f32::NAN
    } else {
        value
    }
}

/// The width of the peak at half its height, NaN when degenerate
pub fn fwhm(feature: &Feature) -> Result<f32, QualityError> {
    PeakGeometry::from_feature(feature).map(|g| g.fwhm())
}

/// The USP tailing factor measured at 5% of the height, NaN when degenerate
pub fn tailing_factor(feature: &Feature) -> Result<f32, QualityError> {
    PeakGeometry::from_feature(feature).map(|g| g.tailing_factor())
}

/// The asymmetry factor measured at 10% of the height, NaN when degenerate
pub fn asymmetry_factor(feature: &Feature) -> Result<f32, QualityError> {
    PeakGeometry::from_feature(feature).map(|g| g.asymmetry_factor())
}

/// All three quality metrics of one feature. Degenerate metrics are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub fwhm: Option<f32>,
    pub tailing_factor: Option<f32>,
    pub asymmetry_factor: Option<f32>,
}

impl QualityMetrics {
    /// Compute the metrics for `feature`, `None` when it lacks the height, RT
    /// or data points they require
    pub fn compute(feature: &Feature) -> Option<Self> {
        let geometry = PeakGeometry::from_feature(feature).ok()?;
        let valid = |v: f32| if v.is_nan() { None } else { Some(v) };
        Some(Self {
            fwhm: valid(geometry.fwhm()),
            tailing_factor: valid(geometry.tailing_factor()),
            asymmetry_factor: valid(geometry.asymmetry_factor()),
        })
    }

    /// Store the metrics on `feature`, removing stale values for metrics that
    /// are degenerate
    pub fn apply(&self, feature: &mut Feature) {
        let attrs = feature.attributes_mut();
        for (kind, value) in [
            (AttributeKind::Fwhm, self.fwhm),
            (AttributeKind::TailingFactor, self.tailing_factor),
            (AttributeKind::AsymmetryFactor, self.asymmetry_factor),
        ] {
            match value {
                Some(v) => {
                    attrs.set(kind, AttributeValue::Float(v));
                }
                None => {
                    attrs.remove(kind);
                }
            }
        }
    }
}

/// Compute and store quality metrics on every feature of `list`. Features
/// lacking prerequisites are skipped. Returns the number of features updated.
pub fn calculate_quality_parameters(list: &mut FeatureList) -> usize {
    let mut updated = 0;
    for row in list.rows_mut() {
        let row_id = row.id();
        for feature in row.features_mut() {
            match QualityMetrics::compute(feature) {
                Some(metrics) => {
                    metrics.apply(feature);
                    updated += 1;
                }
                None => {
                    debug!(
                        "Skipping quality parameters of row {row_id} in raw file {}",
                        feature.raw_file_id()
                    );
                }
            }
        }
    }
    updated
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::descriptors::recalculate_derived_attributes;
    use crate::raw::{test::make_raw_file, RawDataFile};
    use crate::row::{FeatureListRow, RowId};
    use crate::series::IonTimeSeries;
    use crate::CenterMeasure;

    /// A sampled bi-Gaussian peak with independent left and right widths
    fn peak_feature(raw: &Arc<RawDataFile>, apex: f32, left: f32, right: f32) -> Feature {
        let scans: Vec<u32> = raw.scans().iter().map(|s| s.index).collect();
        let intensities = raw
            .scans()
            .iter()
            .map(|s| {
                let sigma = if s.rt < apex { left } else { right };
                let z = (s.rt - apex) / sigma;
                (1000.0 * (-0.5 * z * z).exp()) as f64
            })
            .collect();
        let series =
            IonTimeSeries::from_scans(raw.as_ref(), scans.clone(), vec![400.0; scans.len()], intensities)
                .unwrap();
        let mut feature = Feature::new(raw.clone(), series);
        recalculate_derived_attributes(&mut feature, CenterMeasure::Avg);
        feature
    }

    #[test]
    fn test_symmetric_peak() {
        let raw = Arc::new(make_raw_file(0, 101, 0.0, 0.1));
        let feature = peak_feature(&raw, 5.0, 0.3, 0.3);
        let af = asymmetry_factor(&feature).unwrap();
        let tf = tailing_factor(&feature).unwrap();
        assert!((af - 1.0).abs() < 0.05, "{af}");
        assert!((tf - 1.0).abs() < 0.05, "{tf}");
        let width = fwhm(&feature).unwrap();
        // 2 * sqrt(2 ln 2) * sigma
        assert!((width - 0.7064).abs() < 0.05, "{width}");
    }

    #[test]
    fn test_tailing_peak() {
        let raw = Arc::new(make_raw_file(0, 101, 0.0, 0.1));
        let feature = peak_feature(&raw, 5.0, 0.2, 0.6);
        let tf = tailing_factor(&feature).unwrap();
        let af = asymmetry_factor(&feature).unwrap();
        assert!(tf > 1.0, "{tf}");
        assert!(af > 1.0, "{af}");
    }

    #[test]
    fn test_missing_prerequisites() {
        let raw = Arc::new(make_raw_file(0, 10, 0.0, 0.1));
        let series = IonTimeSeries::from_scans(raw.as_ref(), vec![1, 2, 3], vec![1.0; 3], vec![1.0, 2.0, 1.0])
            .unwrap();
        let mut feature = Feature::new(raw.clone(), series);
        assert_eq!(
            fwhm(&feature).unwrap_err(),
            QualityError::MissingAttribute(AttributeKind::Height)
        );
        feature.set_height(2.0);
        assert_eq!(
            tailing_factor(&feature).unwrap_err(),
            QualityError::MissingAttribute(AttributeKind::Rt)
        );
        let mut empty = Feature::new(raw, IonTimeSeries::empty());
        empty.set_height(1.0);
        empty.set_rt(1.0);
        assert_eq!(asymmetry_factor(&empty).unwrap_err(), QualityError::NoDataPoints);
    }

    #[test]
    fn test_intercepts_fallback_to_range() {
        let (a, b) = intercept_rts_at_intensity(
            5.0,
            1.0,
            &[1.0, 2.0],
            &[10.0, 1.0],
            Interval::new(0.5, 2.5),
        );
        assert_eq!((a, b), (0.5, 2.5));
    }

    #[test_log::test]
    fn test_bulk() {
        let raw = Arc::new(make_raw_file(0, 101, 0.0, 0.1));
        let mut list = FeatureList::new("q".into(), vec![raw.clone()]).unwrap();
        list.add_row(FeatureListRow::new(RowId(1)).with_feature(peak_feature(&raw, 5.0, 0.3, 0.3)))
            .unwrap();

        let series = IonTimeSeries::from_scans(raw.as_ref(), vec![1, 2, 3], vec![1.0; 3], vec![1.0, 2.0, 1.0])
            .unwrap();
        let bare = Feature::new(raw.clone(), series);
        list.add_row(FeatureListRow::new(RowId(2)).with_feature(bare)).unwrap();

        assert_eq!(calculate_quality_parameters(&mut list), 1);
        let first = list.rows()[0].feature(raw.id()).unwrap();
        assert!(first.fwhm().is_some());
        assert!(first.tailing_factor().is_some());
        let second = list.rows()[1].feature(raw.id()).unwrap();
        assert!(second.fwhm().is_none());

        // a second pass stores the same values
        let before = list.rows()[0].feature(raw.id()).unwrap().attributes().clone();
        calculate_quality_parameters(&mut list);
        assert_eq!(&before, list.rows()[0].feature(raw.id()).unwrap().attributes());
    }
}
