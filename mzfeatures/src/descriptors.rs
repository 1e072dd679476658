//! Derived descriptors of a feature's time series.
//!
//! These are free functions over the series capability traits so that they
//! can be applied to any series kind that offers the columns they read.
use tracing::{debug, info};

use crate::center::{CenterFunction, CenterMeasure, Weighting};
use crate::feature::Feature;
use crate::interval::Interval;
use crate::series::{FeatureSeries, IntensitySeries, MobilitySeries, MzSeries, TimeSeries};

/// The retention time span of the series, `None` when it is empty
pub fn rt_range<S: TimeSeries + ?Sized>(series: &S) -> Option<Interval<f32>> {
    let rts = series.rts();
    match (rts.first(), rts.last()) {
        (Some(first), Some(last)) => Some(Interval::new(*first, *last)),
        _ => None,
    }
}

/// The m/z span of the series. Non-positive m/z values are never the lower
/// bound. Mobility resolved traces consider every mobilogram.
///
/// An empty series yields the inverted sentinel interval `[f64::MAX, f64::MIN]`.
pub fn mz_range<S: MzSeries + ?Sized>(series: &S) -> Interval<f64> {
    let mut min = f64::MAX;
    let mut max = f64::MIN;
    for slice in series.mz_slices() {
        for mz in slice.iter().copied() {
            if mz > 0.0 && mz < min {
                min = mz;
            }
            if mz > max {
                max = mz;
            }
        }
    }
    Interval::new(min, max)
}

/// The intensity span of the series. The lower bound only considers positive
/// intensities, the upper bound considers everything.
pub fn intensity_range<S: IntensitySeries + ?Sized>(series: &S) -> Interval<f32> {
    let mut min = f64::MAX;
    let mut max = f64::MIN;
    for intensity in series.intensities().iter().copied() {
        if intensity > 0.0 && intensity < min {
            min = intensity;
        }
        if intensity > max {
            max = intensity;
        }
    }
    Interval::new(min as f32, max as f32)
}

/// The span of the first and last mobility values, which may be stored in
/// either order. Empty series give a NaN singleton.
pub fn mobility_range<S: MobilitySeries + ?Sized>(series: &S) -> Interval<f32> {
    let mobilities = series.mobilities();
    match (mobilities.first(), mobilities.last()) {
        (Some(first), Some(last)) => {
            Interval::singleton(*first as f32).span(&Interval::singleton(*last as f32))
        }
        _ => Interval::singleton(f32::NAN),
    }
}

/// The index of the first maximum intensity, `None` for an empty series.
///
/// The accumulator starts at negative infinity, so series whose samples are all
/// zero still select their first sample.
pub fn most_intense_index<S: IntensitySeries + ?Sized>(series: &S) -> Option<usize> {
    let mut best = None;
    let mut max = f64::NEG_INFINITY;
    for (i, intensity) in series.intensities().iter().copied().enumerate() {
        if intensity > max {
            max = intensity;
            best = Some(i);
        }
    }
    best
}

/// The trapezoid integral of intensity over retention time in minutes
pub fn area<S: TimeSeries + ?Sized>(series: &S) -> f32 {
    let rts = series.rts();
    let intensities = series.intensities();
    let mut acc = 0.0f64;
    for i in 1..rts.len() {
        let dt = (rts[i] - rts[i - 1]) as f64;
        acc += dt * (intensities[i] + intensities[i - 1]) / 2.0;
    }
    acc as f32
}

/// The intensity-weighted m/z center of the series using `measure`
pub fn center_mz<S: MzSeries + IntensitySeries + ?Sized>(series: &S, measure: CenterMeasure) -> f64 {
    CenterFunction::new(measure, Weighting::Linear).calc_center(series.mzs(), series.intensities())
}

/// The mobility of the most intense sample, NaN when none could be found
pub fn mobility<S: MobilitySeries + ?Sized>(series: &S) -> f32 {
    match most_intense_index(series) {
        Some(i) => series.mobility(i) as f32,
        None => {
            info!("Unable to determine the mobility of an empty mobility series");
            f32::NAN
        }
    }
}

/// The smallest absolute difference between consecutive m/z values within a
/// single buffer. Infinite when no buffer has two values.
pub fn smallest_mz_delta<S: MzSeries + ?Sized>(series: &S) -> f64 {
    series
        .mz_slices()
        .flat_map(|slice| slice.windows(2).map(|w| (w[1] - w[0]).abs()))
        .fold(f64::INFINITY, f64::min)
}

/// Recompute every derived attribute of `feature` from its series.
///
/// Sets the area, m/z range, RT range, intensity range, representative scan,
/// height, RT of the most intense point and center m/z, plus mobility and
/// mobility range for mobility resolved traces. Calling it twice without
/// changing the series changes nothing.
pub fn recalculate_derived_attributes(feature: &mut Feature, measure: CenterMeasure) {
    let series = feature.series();
    let (apex, rt_span) = match (most_intense_index(series), rt_range(series)) {
        (Some(apex), Some(rt_span)) => (apex, rt_span),
        _ => {
            debug!(
                "Skipping descriptor calculation for an empty feature in raw file {}",
                feature.raw_file_id()
            );
            return;
        }
    };

    let area_value = area(series);
    let mzs = mz_range(series);
    let intensities = intensity_range(series);
    let apex_scan = series.scan_indices()[apex];
    let apex_rt = series.rt(apex);
    let mz = center_mz(series, measure);
    let mobility_descriptors = match series {
        FeatureSeries::Chromatogram(_) => None,
        FeatureSeries::Mobilogram(trace) => {
            let summed = trace.summed_mobilogram();
            Some((mobility_range(summed), mobility(summed)))
        }
    };

    feature.set_area(area_value);
    feature.set_mz_range(mzs);
    feature.set_rt_range(rt_span);
    feature.set_intensity_range(intensities);
    feature.set_representative_scan(Some(apex_scan));
    feature.set_height(intensities.end);
    feature.set_rt(apex_rt);
    feature.set_mz(mz);
    if let Some((mobility_span, mobility_value)) = mobility_descriptors {
        feature.set_mobility_range(mobility_span);
        feature.set_mobility(mobility_value);
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::raw::test::make_raw_file;
    use crate::series::test::make_series;
    use crate::series::{
        IonMobilitySeries, IonMobilogramTimeSeries, IonTimeSeries, SummedIntensityMobilitySeries,
    };

    #[test]
    fn test_most_intense_index() {
        assert_eq!(most_intense_index(&IonTimeSeries::empty()), None);
        let one = make_series(&[1.0], &[100.0], &[5.0]);
        assert_eq!(most_intense_index(&one), Some(0));
        let zeros = make_series(&[1.0, 2.0], &[100.0, 100.0], &[0.0, 0.0]);
        assert_eq!(most_intense_index(&zeros), Some(0));
        let tie = make_series(&[1.0, 2.0, 3.0], &[100.0; 3], &[1.0, 5.0, 5.0]);
        assert_eq!(most_intense_index(&tie), Some(1));
    }

    #[test]
    fn test_area() {
        let s = make_series(&[0.0], &[100.0], &[10.0]);
        assert_eq!(area(&s), 0.0);
        let s = make_series(&[0.0, 1.0, 2.0], &[100.0; 3], &[0.0, 10.0, 0.0]);
        assert!((area(&s) - 10.0).abs() < 1e-6);

        let scaled = s.scaled(3.0);
        assert!((area(&scaled) - 3.0 * area(&s)).abs() < 1e-4);
    }

    #[test]
    fn test_ranges() {
        let s = make_series(
            &[1.0, 2.0, 3.0, 4.0],
            &[0.0, 100.01, 99.99, 0.0],
            &[0.0, 4.0, 2.0, 0.0],
        );
        let mzs = mz_range(&s);
        assert_eq!(mzs, Interval::new(99.99, 100.01));
        let ints = intensity_range(&s);
        assert_eq!(ints, Interval::new(2.0, 4.0));
        assert_eq!(rt_range(&s), Some(Interval::new(1.0, 4.0)));
        assert_eq!(rt_range(&IonTimeSeries::empty()), None);
        assert!((smallest_mz_delta(&s) - 0.02).abs() < 1e-9);
        assert_eq!(smallest_mz_delta(&make_series(&[1.0], &[5.0], &[1.0])), f64::INFINITY);
    }

    #[test]
    fn test_mobility_descending() {
        let summed = SummedIntensityMobilitySeries::new(vec![1.2, 1.1, 1.0], vec![1.0, 5.0, 2.0])
            .unwrap();
        let span = mobility_range(&summed);
        assert!((span.start - 1.0).abs() < 1e-6);
        assert!((span.end - 1.2).abs() < 1e-6);
        assert!((mobility(&summed) - 1.1).abs() < 1e-6);

        let empty = SummedIntensityMobilitySeries::default();
        assert!(mobility(&empty).is_nan());
        assert!(mobility_range(&empty).start.is_nan());
    }

    #[test_log::test]
    fn test_recalculate_idempotent() {
        let raw = Arc::new(make_raw_file(0, 10, 1.0, 0.1));
        let series = IonTimeSeries::from_scans(
            raw.as_ref(),
            vec![2, 3, 4, 5, 6],
            vec![300.0, 300.001, 300.002, 300.001, 300.0],
            vec![1.0, 5.0, 10.0, 5.0, 1.0],
        )
        .unwrap();
        let mut feature = Feature::new(raw.clone(), series);
        recalculate_derived_attributes(&mut feature, CenterMeasure::Avg);
        assert_eq!(feature.height(), Some(10.0));
        assert_eq!(feature.representative_scan_index(), Some(4));
        assert!((feature.rt().unwrap() - 1.4).abs() < 1e-6);
        assert!((feature.mz().unwrap() - 300.0013636).abs() < 1e-6);

        let snapshot = feature.attributes().clone();
        recalculate_derived_attributes(&mut feature, CenterMeasure::Avg);
        assert_eq!(&snapshot, feature.attributes());
        assert!(feature.mobility().is_none());
    }

    #[test]
    fn test_recalculate_empty_is_noop() {
        let raw = Arc::new(make_raw_file(0, 10, 1.0, 0.1));
        let mut feature = Feature::new(raw, IonTimeSeries::empty());
        recalculate_derived_attributes(&mut feature, CenterMeasure::Avg);
        assert!(feature.attributes().is_empty());
    }

    #[test]
    fn test_recalculate_mobilogram() {
        let raw = Arc::new(make_raw_file(0, 5, 1.0, 0.1));
        let m1 = IonMobilitySeries::new(1, vec![0.9, 0.8], vec![500.0, 500.0], vec![30.0, 10.0])
            .unwrap();
        let m2 = IonMobilitySeries::new(2, vec![0.9, 0.8], vec![500.0, 500.0], vec![20.0, 5.0])
            .unwrap();
        let trace = IonMobilogramTimeSeries::new(raw.as_ref(), vec![m1, m2]).unwrap();
        let mut feature = Feature::new(raw.clone(), trace);
        recalculate_derived_attributes(&mut feature, CenterMeasure::Avg);
        assert_eq!(feature.height(), Some(40.0));
        assert!((feature.mobility().unwrap() - 0.9).abs() < 1e-6);
        let span = feature.mobility_range().unwrap();
        assert!((span.start - 0.8).abs() < 1e-6);
        assert!((span.end - 0.9).abs() < 1e-6);
    }
}
