//! Similarity of two isotope envelopes.
use mzfeatures::{IsotopePattern, IsotopePeak, MZTolerance};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IsotopePatternMatchParams {
    pub mz_tolerance: MZTolerance,
    /// Peaks below this intensity, relative to the base peak, are ignored
    pub noise_level: f64,
    pub min_score: f64,
}

impl Default for IsotopePatternMatchParams {
    fn default() -> Self {
        Self {
            mz_tolerance: MZTolerance::new(0.001, 5.0),
            noise_level: 0.01,
            min_score: 0.65,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IsotopePatternScoreCalculator;

impl IsotopePatternScoreCalculator {
    fn prepare(pattern: &IsotopePattern, noise_level: f64) -> Vec<IsotopePeak> {
        pattern
            .normalized()
            .peaks()
            .iter()
            .filter(|p| p.intensity as f64 >= noise_level)
            .copied()
            .collect()
    }

    /// Score the agreement of two patterns in `[0, 1]`.
    ///
    /// Both patterns are scaled to a base peak of 1. Each peak of the larger
    /// pattern is paired with the nearest unused peak of the other within
    /// the m/z tolerance, contributing `1 - |Δintensity|`, and every unpaired
    /// peak from either side contributes `1 - intensity`. The score is the
    /// product of all contributions.
    pub fn score(a: &IsotopePattern, b: &IsotopePattern, params: &IsotopePatternMatchParams) -> f64 {
        let pa = Self::prepare(a, params.noise_level);
        let pb = Self::prepare(b, params.noise_level);
        if pa.is_empty() || pb.is_empty() {
            return 0.0;
        }
        let (large, small) = if pa.len() >= pb.len() { (pa, pb) } else { (pb, pa) };
        let mut used = vec![false; small.len()];
        let mut score = 1.0f64;
        for peak in large.iter() {
            let nearest = small
                .iter()
                .enumerate()
                .filter(|(j, p)| !used[*j] && params.mz_tolerance.check_within(peak.mz, p.mz))
                .min_by(|(_, x), (_, y)| {
                    (x.mz - peak.mz).abs().total_cmp(&(y.mz - peak.mz).abs())
                });
            match nearest {
                Some((j, other)) => {
                    used[j] = true;
                    score *= 1.0 - (peak.intensity as f64 - other.intensity as f64).abs();
                }
                None => score *= 1.0 - peak.intensity as f64,
            }
        }
        for (peak, _) in small.iter().zip(used.iter()).filter(|(_, u)| !**u) {
            score *= 1.0 - peak.intensity as f64;
        }
        score.clamp(0.0, 1.0)
    }

    pub fn check_match(
        a: &IsotopePattern,
        b: &IsotopePattern,
        params: &IsotopePatternMatchParams,
    ) -> bool {
        Self::score(a, b, params) >= params.min_score
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn pattern(peaks: &[(f64, f32)]) -> IsotopePattern {
        IsotopePattern::new(1, peaks.iter().map(|(mz, i)| IsotopePeak::new(*mz, *i)).collect())
    }

    #[test]
    fn test_identical_scaled() {
        let a = pattern(&[(500.0, 100.0), (501.003, 30.0), (502.006, 5.0)]);
        let b = pattern(&[(500.0005, 1000.0), (501.0035, 300.0), (502.0065, 50.0)]);
        let params = IsotopePatternMatchParams::default();
        let score = IsotopePatternScoreCalculator::score(&a, &b, &params);
        assert!((score - 1.0).abs() < 1e-6, "{score}");
        assert!(IsotopePatternScoreCalculator::check_match(&a, &b, &params));
    }

    #[test]
    fn test_mismatch() {
        let a = pattern(&[(500.0, 100.0), (501.003, 30.0)]);
        // the second isotope is far more abundant and shifted
        let b = pattern(&[(500.0, 100.0), (501.5, 90.0)]);
        let params = IsotopePatternMatchParams::default();
        let score = IsotopePatternScoreCalculator::score(&a, &b, &params);
        assert!((score - 0.7 * 0.1).abs() < 1e-6, "{score}");
        assert!(!IsotopePatternScoreCalculator::check_match(&a, &b, &params));

        let empty = pattern(&[]);
        assert_eq!(IsotopePatternScoreCalculator::score(&a, &empty, &params), 0.0);
    }
}
