//! Column-oriented time series backing a feature.
//!
//! A series is a set of parallel buffers. Capabilities are expressed as small
//! traits so descriptor functions can ask only for what they read.
use itertools::Either;
use thiserror::Error;

use crate::raw::ScanAccess;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("The {column} column has {found} entries, expected {expected}")]
    LengthMismatch {
        column: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Scan {0} is not present in the raw data file")]
    UnknownScan(u32),
    #[error("Retention times must be non-decreasing, violated at position {0}")]
    NotSorted(usize),
}

fn check_len(column: &'static str, expected: usize, found: usize) -> Result<(), SeriesError> {
    if expected != found {
        Err(SeriesError::LengthMismatch {
            column,
            expected,
            found,
        })
    } else {
        Ok(())
    }
}

pub trait IntensitySeries {
    fn intensities(&self) -> &[f64];

    fn intensity(&self, index: usize) -> f64 {
        self.intensities()[index]
    }

    fn len(&self) -> usize {
        self.intensities().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait MzSeries {
    fn mzs(&self) -> &[f64];

    fn mz(&self, index: usize) -> f64 {
        self.mzs()[index]
    }

    /// Every m/z buffer that contributes to this series. Plain series have
    /// exactly one, ion mobility traces have one per frame.
    fn mz_slices(&self) -> impl Iterator<Item = &[f64]> {
        std::iter::once(self.mzs())
    }
}

pub trait TimeSeries: IntensitySeries {
    fn scan_indices(&self) -> &[u32];

    /// Retention times in minutes, parallel to [`TimeSeries::scan_indices`]
    fn rts(&self) -> &[f32];

    fn rt(&self, index: usize) -> f32 {
        self.rts()[index]
    }
}

pub trait MobilitySeries: IntensitySeries {
    fn mobilities(&self) -> &[f64];

    fn mobility(&self, index: usize) -> f64 {
        self.mobilities()[index]
    }
}

/// An extracted ion chromatogram. A zero intensity with an m/z of zero marks
/// a sentinel point such as a flanking zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IonTimeSeries {
    scan_indices: Vec<u32>,
    rts: Vec<f32>,
    mzs: Vec<f64>,
    intensities: Vec<f64>,
}

impl IonTimeSeries {
    pub fn new(
        scan_indices: Vec<u32>,
        rts: Vec<f32>,
        mzs: Vec<f64>,
        intensities: Vec<f64>,
    ) -> Result<Self, SeriesError> {
        let n = scan_indices.len();
        check_len("rt", n, rts.len())?;
        check_len("m/z", n, mzs.len())?;
        check_len("intensity", n, intensities.len())?;
        if let Some(i) = rts.windows(2).position(|w| w[1] < w[0]) {
            return Err(SeriesError::NotSorted(i + 1));
        }
        Ok(Self {
            scan_indices,
            rts,
            mzs,
            intensities,
        })
    }

    /// Build a series whose retention times are looked up from the scans it refers to
    pub fn from_scans<R: ScanAccess + ?Sized>(
        raw: &R,
        scan_indices: Vec<u32>,
        mzs: Vec<f64>,
        intensities: Vec<f64>,
    ) -> Result<Self, SeriesError> {
        let rts = scan_indices
            .iter()
            .map(|i| raw.scan_rt(*i).ok_or(SeriesError::UnknownScan(*i)))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(scan_indices, rts, mzs, intensities)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Pad the series with a zero-intensity sentinel at the neighboring scans
    /// of the same MS level on either side, when they exist.
    pub fn with_flanking_zeros(mut self, raw: &crate::raw::RawDataFile) -> Self {
        if self.scan_indices.is_empty() {
            return self;
        }
        if let Some(prev) = raw.previous_scan(self.scan_indices[0]) {
            self.scan_indices.insert(0, prev.index);
            self.rts.insert(0, prev.rt);
            self.mzs.insert(0, 0.0);
            self.intensities.insert(0, 0.0);
        }
        if let Some(next) = self
            .scan_indices
            .last()
            .and_then(|last| raw.next_scan(*last))
        {
            self.scan_indices.push(next.index);
            self.rts.push(next.rt);
            self.mzs.push(0.0);
            self.intensities.push(0.0);
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, f32, f64, f64)> + '_ {
        self.scan_indices
            .iter()
            .zip(self.rts.iter())
            .zip(self.mzs.iter().zip(self.intensities.iter()))
            .map(|((s, rt), (mz, inten))| (*s, *rt, *mz, *inten))
    }

    /// Scale every intensity by `factor`, returning the new series
    pub fn scaled(&self, factor: f64) -> Self {
        let mut dup = self.clone();
        dup.intensities.iter_mut().for_each(|i| *i *= factor);
        dup
    }
}

impl IntensitySeries for IonTimeSeries {
    fn intensities(&self) -> &[f64] {
        &self.intensities
    }
}

impl MzSeries for IonTimeSeries {
    fn mzs(&self) -> &[f64] {
        &self.mzs
    }
}

impl TimeSeries for IonTimeSeries {
    fn scan_indices(&self) -> &[u32] {
        &self.scan_indices
    }

    fn rts(&self) -> &[f32] {
        &self.rts
    }
}

/// The mobility-resolved signal of a feature within one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IonMobilitySeries {
    frame: u32,
    mobilities: Vec<f64>,
    mzs: Vec<f64>,
    intensities: Vec<f64>,
}

impl IonMobilitySeries {
    pub fn new(
        frame: u32,
        mobilities: Vec<f64>,
        mzs: Vec<f64>,
        intensities: Vec<f64>,
    ) -> Result<Self, SeriesError> {
        let n = mobilities.len();
        check_len("m/z", n, mzs.len())?;
        check_len("intensity", n, intensities.len())?;
        Ok(Self {
            frame,
            mobilities,
            mzs,
            intensities,
        })
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn total_intensity(&self) -> f64 {
        self.intensities.iter().sum()
    }

    /// The intensity-weighted m/z of the mobilogram, or zero when it carries no signal
    pub fn weighted_mz(&self) -> f64 {
        let total = self.total_intensity();
        if total <= 0.0 {
            return 0.0;
        }
        self.mzs
            .iter()
            .zip(self.intensities.iter())
            .map(|(mz, i)| mz * i)
            .sum::<f64>()
            / total
    }
}

impl IntensitySeries for IonMobilitySeries {
    fn intensities(&self) -> &[f64] {
        &self.intensities
    }
}

impl MzSeries for IonMobilitySeries {
    fn mzs(&self) -> &[f64] {
        &self.mzs
    }
}

impl MobilitySeries for IonMobilitySeries {
    fn mobilities(&self) -> &[f64] {
        &self.mobilities
    }
}

/// Intensity summed over all frames at each distinct mobility value,
/// ordered by ascending mobility.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummedIntensityMobilitySeries {
    mobilities: Vec<f64>,
    intensities: Vec<f64>,
}

impl SummedIntensityMobilitySeries {
    pub fn new(mobilities: Vec<f64>, intensities: Vec<f64>) -> Result<Self, SeriesError> {
        check_len("intensity", mobilities.len(), intensities.len())?;
        Ok(Self {
            mobilities,
            intensities,
        })
    }

    pub fn from_mobilograms(mobilograms: &[IonMobilitySeries]) -> Self {
        let mut points: Vec<(f64, f64)> = mobilograms
            .iter()
            .flat_map(|m| {
                m.mobilities
                    .iter()
                    .copied()
                    .zip(m.intensities.iter().copied())
            })
            .collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut mobilities = Vec::with_capacity(points.len());
        let mut intensities: Vec<f64> = Vec::with_capacity(points.len());
        for (mobility, intensity) in points {
            if mobilities.last() == Some(&mobility) {
                if let Some(last) = intensities.last_mut() {
                    *last += intensity;
                }
            } else {
                mobilities.push(mobility);
                intensities.push(intensity);
            }
        }
        Self {
            mobilities,
            intensities,
        }
    }
}

impl IntensitySeries for SummedIntensityMobilitySeries {
    fn intensities(&self) -> &[f64] {
        &self.intensities
    }
}

impl MobilitySeries for SummedIntensityMobilitySeries {
    fn mobilities(&self) -> &[f64] {
        &self.mobilities
    }
}

/// An ion mobility resolved trace. The per-frame summed chromatogram is
/// derived from the mobilograms on construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IonMobilogramTimeSeries {
    summed: IonTimeSeries,
    mobilograms: Vec<IonMobilitySeries>,
    summed_mobilogram: SummedIntensityMobilitySeries,
}

impl IonMobilogramTimeSeries {
    pub fn new<R: ScanAccess + ?Sized>(
        raw: &R,
        mobilograms: Vec<IonMobilitySeries>,
    ) -> Result<Self, SeriesError> {
        let scan_indices: Vec<u32> = mobilograms.iter().map(|m| m.frame).collect();
        let mzs = mobilograms.iter().map(|m| m.weighted_mz()).collect();
        let intensities = mobilograms.iter().map(|m| m.total_intensity()).collect();
        let summed = IonTimeSeries::from_scans(raw, scan_indices, mzs, intensities)?;
        let summed_mobilogram = SummedIntensityMobilitySeries::from_mobilograms(&mobilograms);
        Ok(Self {
            summed,
            mobilograms,
            summed_mobilogram,
        })
    }

    pub fn mobilograms(&self) -> &[IonMobilitySeries] {
        &self.mobilograms
    }

    pub fn summed_mobilogram(&self) -> &SummedIntensityMobilitySeries {
        &self.summed_mobilogram
    }

    pub fn summed(&self) -> &IonTimeSeries {
        &self.summed
    }
}

impl IntensitySeries for IonMobilogramTimeSeries {
    fn intensities(&self) -> &[f64] {
        self.summed.intensities()
    }
}

impl MzSeries for IonMobilogramTimeSeries {
    fn mzs(&self) -> &[f64] {
        self.summed.mzs()
    }

    fn mz_slices(&self) -> impl Iterator<Item = &[f64]> {
        self.mobilograms.iter().map(|m| m.mzs())
    }
}

impl TimeSeries for IonMobilogramTimeSeries {
    fn scan_indices(&self) -> &[u32] {
        self.summed.scan_indices()
    }

    fn rts(&self) -> &[f32] {
        self.summed.rts()
    }
}

/// The series variants a feature may carry
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureSeries {
    Chromatogram(IonTimeSeries),
    Mobilogram(IonMobilogramTimeSeries),
}

impl Default for FeatureSeries {
    fn default() -> Self {
        Self::Chromatogram(IonTimeSeries::default())
    }
}

impl FeatureSeries {
    pub fn is_ion_mobility(&self) -> bool {
        matches!(self, Self::Mobilogram(_))
    }

    pub fn mobilograms(&self) -> Option<&[IonMobilitySeries]> {
        match self {
            Self::Chromatogram(_) => None,
            Self::Mobilogram(m) => Some(m.mobilograms()),
        }
    }

    pub fn summed_mobilogram(&self) -> Option<&SummedIntensityMobilitySeries> {
        match self {
            Self::Chromatogram(_) => None,
            Self::Mobilogram(m) => Some(m.summed_mobilogram()),
        }
    }

    /// The retention time series view of either variant
    pub fn chromatogram(&self) -> &IonTimeSeries {
        match self {
            Self::Chromatogram(c) => c,
            Self::Mobilogram(m) => m.summed(),
        }
    }
}

impl From<IonTimeSeries> for FeatureSeries {
    fn from(value: IonTimeSeries) -> Self {
        Self::Chromatogram(value)
    }
}

impl From<IonMobilogramTimeSeries> for FeatureSeries {
    fn from(value: IonMobilogramTimeSeries) -> Self {
        Self::Mobilogram(value)
    }
}

impl IntensitySeries for FeatureSeries {
    fn intensities(&self) -> &[f64] {
        self.chromatogram().intensities()
    }
}

impl MzSeries for FeatureSeries {
    fn mzs(&self) -> &[f64] {
        self.chromatogram().mzs()
    }

    fn mz_slices(&self) -> impl Iterator<Item = &[f64]> {
        match self {
            Self::Chromatogram(c) => Either::Left(c.mz_slices()),
            Self::Mobilogram(m) => Either::Right(m.mz_slices()),
        }
    }
}

impl TimeSeries for FeatureSeries {
    fn scan_indices(&self) -> &[u32] {
        self.chromatogram().scan_indices()
    }

    fn rts(&self) -> &[f32] {
        self.chromatogram().rts()
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::raw::test::make_raw_file;

    pub(crate) fn make_series(rts: &[f32], mzs: &[f64], intensities: &[f64]) -> IonTimeSeries {
        let scans = (0..rts.len() as u32).collect();
        IonTimeSeries::new(scans, rts.to_vec(), mzs.to_vec(), intensities.to_vec()).unwrap()
    }

    #[test]
    fn test_length_mismatch() {
        let err = IonTimeSeries::new(vec![0, 1], vec![1.0, 2.0], vec![100.0], vec![1.0, 2.0])
            .unwrap_err();
        assert_eq!(
            err,
            SeriesError::LengthMismatch {
                column: "m/z",
                expected: 2,
                found: 1
            }
        );
        let err = IonTimeSeries::new(vec![0, 1], vec![2.0, 1.0], vec![1.0, 1.0], vec![1.0, 2.0])
            .unwrap_err();
        assert_eq!(err, SeriesError::NotSorted(1));
    }

    #[test]
    fn test_from_scans_and_flanks() {
        let raw = make_raw_file(0, 10, 0.0, 0.1);
        let series =
            IonTimeSeries::from_scans(&raw, vec![3, 4, 5], vec![500.0; 3], vec![1.0, 3.0, 1.0])
                .unwrap();
        assert!((series.rt(0) - 0.3).abs() < 1e-6);
        let padded = series.with_flanking_zeros(&raw);
        assert_eq!(padded.scan_indices(), &[2, 3, 4, 5, 6]);
        assert_eq!(padded.intensity(0), 0.0);
        assert_eq!(padded.mz(4), 0.0);

        let err = IonTimeSeries::from_scans(&raw, vec![30], vec![500.0], vec![1.0]).unwrap_err();
        assert_eq!(err, SeriesError::UnknownScan(30));
    }

    #[test]
    fn test_mobilogram_trace() {
        let raw = make_raw_file(0, 5, 0.0, 0.1);
        let m1 = IonMobilitySeries::new(
            1,
            vec![0.8, 0.9],
            vec![500.0, 500.002],
            vec![10.0, 30.0],
        )
        .unwrap();
        let m2 = IonMobilitySeries::new(2, vec![0.9, 1.0], vec![500.001, 500.003], vec![20.0, 5.0])
            .unwrap();
        let trace = IonMobilogramTimeSeries::new(&raw, vec![m1, m2]).unwrap();
        assert_eq!(trace.intensities(), &[40.0, 25.0]);
        assert_eq!(trace.scan_indices(), &[1, 2]);
        assert_eq!(trace.mz_slices().count(), 2);

        let summed = trace.summed_mobilogram();
        assert_eq!(summed.mobilities(), &[0.8, 0.9, 1.0]);
        assert_eq!(summed.intensities(), &[10.0, 50.0, 5.0]);

        let fs = FeatureSeries::from(trace);
        assert!(fs.is_ion_mobility());
        assert_eq!(fs.mz_slices().count(), 2);
        assert_eq!(fs.mobilograms().map(|m| m.len()), Some(2));
    }
}
