use std::fmt::Display;

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SimilarityMeasure {
    #[default]
    Pearson,
    Spearman,
    Cosine,
    /// `1 / (1 + var(ln(x / y)))` over pairs where both values are positive
    LogRatioVariance,
    /// The slope of the least squares line
    Slope,
}

impl Display for SimilarityMeasure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Moments of a set of paired observations
#[derive(Debug, Default, Clone, Copy)]
struct Moments {
    n: usize,
    mean_x: f64,
    mean_y: f64,
    sxx: f64,
    syy: f64,
    sxy: f64,
}

impl Moments {
    fn from_pairs(data: &[[f64; 2]]) -> Self {
        let n = data.len();
        if n == 0 {
            return Self::default();
        }
        let mean_x = data.iter().map(|p| p[0]).sum::<f64>() / n as f64;
        let mean_y = data.iter().map(|p| p[1]).sum::<f64>() / n as f64;
        let (sxx, syy, sxy) = data.iter().fold((0.0, 0.0, 0.0), |(sxx, syy, sxy), p| {
            let dx = p[0] - mean_x;
            let dy = p[1] - mean_y;
            (sxx + dx * dx, syy + dy * dy, sxy + dx * dy)
        });
        Self {
            n,
            mean_x,
            mean_y,
            sxx,
            syy,
            sxy,
        }
    }

    fn pearson(&self) -> f64 {
        self.sxy / (self.sxx * self.syy).sqrt()
    }
}

fn ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|a, b| values[*a].total_cmp(&values[*b]));
    let mut result = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // tied values share the average of their ranks
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for k in i..=j {
            result[order[k]] = rank;
        }
        i = j + 1;
    }
    result
}

/// A set of paired intensity observations and the regression statistics over them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationData {
    data: Vec<[f64; 2]>,
    slope: f64,
    intercept: f64,
    pearson_r: f64,
    cosine: f64,
    significance: f64,
}

impl CorrelationData {
    pub fn from_pairs(data: Vec<[f64; 2]>) -> Self {
        let m = Moments::from_pairs(&data);
        let slope = m.sxy / m.sxx;
        let intercept = m.mean_y - slope * m.mean_x;
        let pearson_r = m.pearson();
        let cosine = {
            let (dot, nx, ny) = data.iter().fold((0.0, 0.0, 0.0), |(dot, nx, ny), p| {
                (dot + p[0] * p[1], nx + p[0] * p[0], ny + p[1] * p[1])
            });
            dot / (nx.sqrt() * ny.sqrt())
        };
        let significance = Self::slope_significance(&m, slope);
        Self {
            data,
            slope,
            intercept,
            pearson_r,
            cosine,
            significance,
        }
    }

    /// The two-sided p-value of the slope's t statistic with `n - 2` degrees of freedom
    fn slope_significance(m: &Moments, slope: f64) -> f64 {
        if m.n < 3 || m.sxx <= 0.0 || !slope.is_finite() {
            return f64::NAN;
        }
        let residual = (m.syy - m.sxy * m.sxy / m.sxx).max(0.0);
        let mse = residual / (m.n - 2) as f64;
        let std_err = (mse / m.sxx).sqrt();
        if std_err == 0.0 {
            return if slope == 0.0 { f64::NAN } else { 0.0 };
        }
        let t = slope.abs() / std_err;
        match StudentsT::new(0.0, 1.0, (m.n - 2) as f64) {
            Ok(dist) => 2.0 * (1.0 - dist.cdf(t)),
            Err(_) => f64::NAN,
        }
    }

    pub fn data(&self) -> &[[f64; 2]] {
        &self.data
    }

    pub fn dp_count(&self) -> usize {
        self.data.len()
    }

    pub fn slope(&self) -> f64 {
        self.slope
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn pearson_r(&self) -> f64 {
        self.pearson_r
    }

    pub fn cosine_similarity(&self) -> f64 {
        self.cosine
    }

    /// NaN when there are fewer than three points or no variance on x
    pub fn regression_significance(&self) -> f64 {
        self.significance
    }

    pub fn is_valid(&self) -> bool {
        self.dp_count() > 0 && self.pearson_r.is_finite()
    }

    pub fn similarity(&self, measure: SimilarityMeasure) -> f64 {
        match measure {
            SimilarityMeasure::Pearson => self.pearson_r,
            SimilarityMeasure::Spearman => {
                let xs: Vec<f64> = self.data.iter().map(|p| p[0]).collect();
                let ys: Vec<f64> = self.data.iter().map(|p| p[1]).collect();
                let ranked: Vec<[f64; 2]> = ranks(&xs)
                    .into_iter()
                    .zip(ranks(&ys))
                    .map(|(x, y)| [x, y])
                    .collect();
                Moments::from_pairs(&ranked).pearson()
            }
            SimilarityMeasure::Cosine => self.cosine,
            SimilarityMeasure::LogRatioVariance => {
                let ratios: Vec<f64> = self
                    .data
                    .iter()
                    .filter(|p| p[0] > 0.0 && p[1] > 0.0)
                    .map(|p| (p[0] / p[1]).ln())
                    .collect();
                if ratios.len() < 2 {
                    return f64::NAN;
                }
                let n = ratios.len() as f64;
                let mean = ratios.iter().sum::<f64>() / n;
                let var = ratios.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
                1.0 / (1.0 + var)
            }
            SimilarityMeasure::Slope => self.slope,
        }
    }

    /// The ratio of the largest to the smallest positive value on `axis`
    /// (0 for x, 1 for y), zero when there is no positive value
    pub fn max_fold_change(&self, axis: usize) -> f64 {
        let (min, max) = self
            .data
            .iter()
            .map(|p| p[axis])
            .filter(|v| *v > 0.0)
            .fold((f64::INFINITY, 0.0f64), |(min, max), v| (min.min(v), max.max(v)));
        if max == 0.0 {
            0.0
        } else {
            max / min
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_identical() {
        let data: Vec<_> = [1.0, 4.0, 9.0, 4.0, 1.0].iter().map(|v| [*v, *v]).collect();
        let corr = CorrelationData::from_pairs(data);
        assert!((corr.pearson_r() - 1.0).abs() < 1e-9);
        assert!((corr.slope() - 1.0).abs() < 1e-9);
        assert!(corr.intercept().abs() < 1e-9);
        assert!((corr.cosine_similarity() - 1.0).abs() < 1e-9);
        assert!((corr.similarity(SimilarityMeasure::Spearman) - 1.0).abs() < 1e-9);
        assert!(corr.regression_significance() < 1e-6);
        assert_eq!(corr.max_fold_change(0), 9.0);
        assert!(corr.is_valid());
    }

    #[test]
    fn test_significance() {
        let corr = CorrelationData::from_pairs(vec![[1.0, 2.0], [2.0, 1.0]]);
        assert!(corr.regression_significance().is_nan());

        // noisy positive trend is significant
        let corr = CorrelationData::from_pairs(vec![
            [1.0, 1.2],
            [2.0, 1.9],
            [3.0, 3.2],
            [4.0, 3.8],
            [5.0, 5.1],
            [6.0, 6.2],
        ]);
        assert!(corr.regression_significance() < 0.001);

        // unrelated values are not
        let corr = CorrelationData::from_pairs(vec![
            [1.0, 5.0],
            [2.0, 1.0],
            [3.0, 4.0],
            [4.0, 2.0],
            [5.0, 4.5],
        ]);
        assert!(corr.regression_significance() > 0.3);
    }

    #[test]
    fn test_ranks_ties() {
        assert_eq!(ranks(&[10.0, 20.0, 20.0, 5.0]), vec![2.0, 3.5, 3.5, 1.0]);
    }

    #[test]
    fn test_log_ratio() {
        let corr = CorrelationData::from_pairs(vec![[2.0, 1.0], [4.0, 2.0], [8.0, 4.0]]);
        assert!((corr.similarity(SimilarityMeasure::LogRatioVariance) - 1.0).abs() < 1e-9);
    }
}
