use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CenterMeasure {
    #[default]
    Avg,
    Median,
    /// The value carrying the largest accumulated weight
    Mode,
}

impl Display for CenterMeasure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Weighting {
    /// Every sample counts once
    None,
    /// Samples count proportionally to their intensity
    #[default]
    Linear,
}

/// Computes a representative value from a set of samples and their
/// intensities. Samples with a non-positive intensity are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CenterFunction {
    pub measure: CenterMeasure,
    pub weighting: Weighting,
}

impl CenterFunction {
    pub fn new(measure: CenterMeasure, weighting: Weighting) -> Self {
        Self { measure, weighting }
    }

    fn weigh(&self, intensity: f64) -> f64 {
        match self.weighting {
            Weighting::None => 1.0,
            Weighting::Linear => intensity,
        }
    }

    /// Returns NaN when no sample has positive intensity
    pub fn calc_center(&self, values: &[f64], intensities: &[f64]) -> f64 {
        let mut samples: Vec<(f64, f64)> = values
            .iter()
            .zip(intensities.iter())
            .filter(|(_, i)| **i > 0.0)
            .map(|(v, i)| (*v, self.weigh(*i)))
            .collect();
        if samples.is_empty() {
            return f64::NAN;
        }
        match self.measure {
            CenterMeasure::Avg => {
                let (acc, total) = samples
                    .iter()
                    .fold((0.0, 0.0), |(acc, total), (v, w)| (acc + v * w, total + w));
                acc / total
            }
            CenterMeasure::Median => {
                samples.sort_by(|a, b| a.0.total_cmp(&b.0));
                let total: f64 = samples.iter().map(|(_, w)| w).sum();
                let half = total / 2.0;
                let mut acc = 0.0;
                for (i, (v, w)) in samples.iter().enumerate() {
                    acc += w;
                    if acc > half {
                        return *v;
                    }
                    if acc == half {
                        return match samples.get(i + 1) {
                            Some((next, _)) => (v + next) / 2.0,
                            None => *v,
                        };
                    }
                }
                samples[samples.len() - 1].0
            }
            CenterMeasure::Mode => {
                samples.sort_by(|a, b| a.0.total_cmp(&b.0));
                let mut best = samples[0];
                let mut current = samples[0];
                for (v, w) in samples.iter().skip(1) {
                    if *v == current.0 {
                        current.1 += w;
                    } else {
                        if current.1 > best.1 {
                            best = current;
                        }
                        current = (*v, *w);
                    }
                }
                if current.1 > best.1 {
                    best = current;
                }
                best.0
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_weighted_average() {
        let f = CenterFunction::default();
        let c = f.calc_center(&[100.0, 101.0, 0.0], &[1.0, 3.0, 0.0]);
        assert!((c - 100.75).abs() < 1e-12);

        let f = CenterFunction::new(CenterMeasure::Avg, Weighting::None);
        let c = f.calc_center(&[100.0, 101.0], &[1.0, 3.0]);
        assert!((c - 100.5).abs() < 1e-12);

        assert!(f.calc_center(&[1.0], &[0.0]).is_nan());
    }

    #[test]
    fn test_median() {
        let f = CenterFunction::new(CenterMeasure::Median, Weighting::None);
        assert_eq!(f.calc_center(&[3.0, 1.0, 2.0], &[1.0, 1.0, 1.0]), 2.0);
        assert_eq!(f.calc_center(&[4.0, 1.0, 2.0, 3.0], &[1.0; 4]), 2.5);
        let f = CenterFunction::new(CenterMeasure::Median, Weighting::Linear);
        assert_eq!(f.calc_center(&[1.0, 2.0, 3.0], &[1.0, 1.0, 10.0]), 3.0);
    }

    #[test]
    fn test_mode() {
        let f = CenterFunction::new(CenterMeasure::Mode, Weighting::Linear);
        assert_eq!(f.calc_center(&[1.0, 2.0, 2.0, 3.0], &[5.0, 3.0, 3.0, 1.0]), 2.0);
    }
}
