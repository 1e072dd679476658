use mzpeaks::{coordinate::MZ, CoordinateLike, IntensityMeasurement};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct IsotopePeak {
    pub mz: f64,
    pub intensity: f32,
}

impl IsotopePeak {
    pub fn new(mz: f64, intensity: f32) -> Self {
        Self { mz, intensity }
    }
}

impl CoordinateLike<MZ> for IsotopePeak {
    fn coordinate(&self) -> f64 {
        self.mz
    }
}

impl IntensityMeasurement for IsotopePeak {
    fn intensity(&self) -> f32 {
        self.intensity
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IsotopePatternStatus {
    #[default]
    Detected,
    Predicted,
}

/// An observed or predicted isotope envelope, sorted by m/z
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsotopePattern {
    pub charge: i32,
    #[serde(default)]
    pub status: IsotopePatternStatus,
    peaks: Vec<IsotopePeak>,
}

impl IsotopePattern {
    pub fn new(charge: i32, mut peaks: Vec<IsotopePeak>) -> Self {
        peaks.sort_by(|a, b| a.mz.total_cmp(&b.mz));
        Self {
            charge,
            status: IsotopePatternStatus::Detected,
            peaks,
        }
    }

    pub fn peaks(&self) -> &[IsotopePeak] {
        &self.peaks
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    /// The most abundant peak in the envelope
    pub fn base_peak(&self) -> Option<&IsotopePeak> {
        self.peaks
            .iter()
            .max_by(|a, b| a.intensity.total_cmp(&b.intensity))
    }

    /// A copy scaled so the base peak has intensity 1
    pub fn normalized(&self) -> Self {
        let base = self.base_peak().map(|p| p.intensity).unwrap_or(0.0);
        let mut dup = self.clone();
        if base > 0.0 {
            dup.peaks.iter_mut().for_each(|p| p.intensity /= base);
        }
        dup
    }
}

#[cfg(test)]
mod test {
    use mzpeaks::prelude::*;

    use super::*;

    #[test]
    fn test_normalize() {
        let pattern = IsotopePattern::new(
            1,
            vec![
                IsotopePeak::new(501.0, 50.0),
                IsotopePeak::new(500.0, 100.0),
                IsotopePeak::new(502.0, 10.0),
            ],
        );
        assert_eq!(pattern.peaks()[0].mz, 500.0);
        let norm = pattern.normalized();
        assert_eq!(norm.base_peak().map(|p| p.intensity), Some(1.0));
        assert_eq!(norm.peaks()[1].intensity(), 0.5);
        assert_eq!(norm.peaks()[2].mz(), 502.0);
    }
}
