//! Pluggable similarity of two centroided mass lists.
use std::fmt::Debug;

use mzfeatures::MZTolerance;
use mzpeaks::{prelude::*, CentroidPeak, MZPeakSetType};
use serde::{Deserialize, Serialize};

/// A positive spectral match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralSimilarity {
    pub function: String,
    pub score: f64,
    pub matched_signals: usize,
}

/// Compares two mass lists, returning `None` when they do not meet the
/// function's own acceptance criteria
pub trait SpectralSimilarityFunction: Send + Sync + Debug {
    fn name(&self) -> &str;

    fn similarity(
        &self,
        mz_tolerance: &MZTolerance,
        library: &MZPeakSetType<CentroidPeak>,
        query: &MZPeakSetType<CentroidPeak>,
    ) -> Option<SpectralSimilarity>;
}

/// Cosine similarity over `mz^mz_weight * intensity^intensity_weight`
/// weighted signals. Unmatched signals of either spectrum count towards the
/// norms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedCosineSimilarity {
    pub mz_weight: f64,
    pub intensity_weight: f64,
    pub min_cosine: f64,
    pub min_matched: usize,
}

impl Default for WeightedCosineSimilarity {
    fn default() -> Self {
        Self {
            mz_weight: 2.0,
            intensity_weight: 0.5,
            min_cosine: 0.7,
            min_matched: 3,
        }
    }
}

impl WeightedCosineSimilarity {
    fn weight(&self, peak: &CentroidPeak) -> f64 {
        peak.mz.powf(self.mz_weight) * (peak.intensity as f64).powf(self.intensity_weight)
    }
}

impl SpectralSimilarityFunction for WeightedCosineSimilarity {
    fn name(&self) -> &str {
        "Weighted cosine similarity"
    }

    fn similarity(
        &self,
        mz_tolerance: &MZTolerance,
        library: &MZPeakSetType<CentroidPeak>,
        query: &MZPeakSetType<CentroidPeak>,
    ) -> Option<SpectralSimilarity> {
        let mut used = vec![false; query.len()];
        let mut dot = 0.0;
        let mut norm_lib = 0.0;
        let mut matched = 0;
        for lib_peak in library.iter() {
            let wl = self.weight(lib_peak);
            norm_lib += wl * wl;
            let best = query
                .all_peaks_for(lib_peak.mz, mz_tolerance.as_mzpeaks(lib_peak.mz))
                .iter()
                .filter(|p| !used.get(p.index as usize).copied().unwrap_or(true))
                .max_by(|a, b| a.intensity.total_cmp(&b.intensity));
            if let Some(q) = best {
                if let Some(u) = used.get_mut(q.index as usize) {
                    *u = true;
                }
                dot += wl * self.weight(q);
                matched += 1;
            }
        }
        let norm_query: f64 = query.iter().map(|p| self.weight(p).powi(2)).sum();
        if matched < self.min_matched || norm_lib == 0.0 || norm_query == 0.0 {
            return None;
        }
        let score = dot / (norm_lib.sqrt() * norm_query.sqrt());
        if score < self.min_cosine {
            return None;
        }
        Some(SpectralSimilarity {
            function: self.name().to_string(),
            score,
            matched_signals: matched,
        })
    }
}

/// Which spectra of two rows to compare, and how
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectralSimilarityParams {
    /// 1 compares the representative scans of the best features, 2 the best
    /// fragmentation scans
    pub ms_level: u8,
    pub mz_tolerance: MZTolerance,
    pub function: WeightedCosineSimilarity,
}

impl Default for SpectralSimilarityParams {
    fn default() -> Self {
        Self {
            ms_level: 2,
            mz_tolerance: MZTolerance::new(0.002, 10.0),
            function: WeightedCosineSimilarity::default(),
        }
    }
}
