//! Join alignment: merge the rows of several feature lists, each over its
//! own raw data files, into one feature list by m/z, retention time and
//! optionally mobility proximity.
use std::sync::Arc;

use mzfeatures::{
    FeatureList, FeatureListAppliedMethod, FeatureListError, FeatureListRow, Interval,
    MZTolerance, MobilityTolerance, RTTolerance, RawDataFile, RowId, Span1D,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::isotopes::{IsotopePatternMatchParams, IsotopePatternScoreCalculator};
use crate::spectral::{SpectralSimilarityFunction, SpectralSimilarityParams};
use crate::task::{CancellationToken, ProgressSink, TaskStatus};

pub const JOIN_ALIGNER_DESCRIPTION: &str = "Join aligner";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinAlignerParams {
    pub list_name: String,
    pub mz_tolerance: MZTolerance,
    pub rt_tolerance: RTTolerance,
    /// Compare mobility when set
    pub mobility_tolerance: Option<MobilityTolerance>,
    pub mz_weight: f64,
    pub rt_weight: f64,
    pub mobility_weight: f64,
    pub same_charge_required: bool,
    pub same_id_required: bool,
    /// Require matching isotope patterns when set
    pub isotope_pattern: Option<IsotopePatternMatchParams>,
    /// Require similar spectra when set
    pub spectral_similarity: Option<SpectralSimilarityParams>,
}

impl Default for JoinAlignerParams {
    fn default() -> Self {
        Self {
            list_name: "Aligned feature list".to_string(),
            mz_tolerance: MZTolerance::default(),
            rt_tolerance: RTTolerance::default(),
            mobility_tolerance: None,
            mz_weight: 3.0,
            rt_weight: 1.0,
            mobility_weight: 1.0,
            same_charge_required: false,
            same_id_required: false,
            isotope_pattern: None,
            spectral_similarity: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AlignmentError {
    #[error("No feature lists to align")]
    NoFeatureLists,
    #[error("Cannot run alignment, all the weight parameters are zero")]
    ZeroWeights,
    #[error("Cannot run alignment, because file {file} is present in multiple feature lists")]
    DuplicateRawFile { file: String },
    #[error("The alignment was canceled")]
    Canceled,
    #[error(transparent)]
    FeatureList(#[from] FeatureListError),
    #[error("Failed to record the alignment parameters: {0}")]
    Parameters(String),
}

/// `1 - diff / width`, or 1 for an empty window
fn closeness(diff: f64, width: f64) -> f64 {
    if width > 0.0 {
        1.0 - diff / width
    } else {
        1.0
    }
}

/// A scored pairing of a row of an input list with a row of the aligned list
#[derive(Debug, Clone, Copy)]
struct Candidate {
    score: f64,
    row: usize,
    aligned: usize,
}

/// Merges a set of feature lists into a copy of the one with the most rows
#[derive(Debug, Clone)]
pub struct JoinAligner<'a> {
    base: &'a FeatureList,
    others: Vec<&'a FeatureList>,
    params: JoinAlignerParams,
    similarity: Option<Arc<dyn SpectralSimilarityFunction>>,
}

impl<'a> JoinAligner<'a> {
    /// Choose the list with the most rows as the base, the first one on ties
    pub fn new(lists: &'a [FeatureList], params: JoinAlignerParams) -> Result<Self, AlignmentError> {
        let mut base_idx = None;
        for (i, list) in lists.iter().enumerate() {
            match base_idx {
                None => base_idx = Some(i),
                Some(j) if list.num_rows() > lists[j].num_rows() => base_idx = Some(i),
                _ => {}
            }
        }
        let base_idx = base_idx.ok_or(AlignmentError::NoFeatureLists)?;
        let others = lists
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != base_idx)
            .map(|(_, l)| l)
            .collect();
        Ok(Self {
            base: &lists[base_idx],
            others,
            params,
            similarity: None,
        })
    }

    /// Use `function` instead of the configured weighted cosine similarity
    /// when comparing spectra
    pub fn with_similarity_function(mut self, function: Arc<dyn SpectralSimilarityFunction>) -> Self {
        self.similarity = Some(function);
        self
    }

    pub fn base(&self) -> &FeatureList {
        self.base
    }

    pub fn params(&self) -> &JoinAlignerParams {
        &self.params
    }

    pub fn description(&self) -> String {
        format!(
            "{JOIN_ALIGNER_DESCRIPTION}, {} ({} feature lists)",
            self.params.list_name,
            self.others.len() + 1
        )
    }

    /// Run the alignment, reporting through `progress`.
    ///
    /// The aligned list is only returned when the run finishes. Errors and
    /// cancellation leave nothing behind.
    pub fn run(
        &self,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<FeatureList, AlignmentError> {
        progress.set_status(TaskStatus::Initializing);
        match self.align(progress, cancel) {
            Ok(list) => {
                progress.set_status(TaskStatus::Finished);
                Ok(list)
            }
            Err(AlignmentError::Canceled) => {
                warn!("{} was canceled", self.description());
                progress.set_status(TaskStatus::Canceled);
                Err(AlignmentError::Canceled)
            }
            Err(e) => {
                progress.set_error(e.to_string());
                progress.set_status(TaskStatus::Error);
                Err(e)
            }
        }
    }

    fn collect_raw_files(&self) -> Result<Vec<Arc<RawDataFile>>, AlignmentError> {
        let mut raw_files = self.base.raw_files().to_vec();
        for list in self.others.iter() {
            for raw in list.raw_files() {
                if raw_files.iter().any(|r| r.id() == raw.id()) {
                    return Err(AlignmentError::DuplicateRawFile {
                        file: raw.name().to_string(),
                    });
                }
                raw_files.push(raw.clone());
            }
        }
        Ok(raw_files)
    }

    fn align(
        &self,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<FeatureList, AlignmentError> {
        if self.params.mz_weight == 0.0 && self.params.rt_weight == 0.0 {
            return Err(AlignmentError::ZeroWeights);
        }
        progress.set_status(TaskStatus::Processing);
        info!("Running join aligner on {} feature lists", self.others.len());

        let total = self.others.iter().map(|l| l.num_rows() * 2).sum();
        progress.set_total(total);

        let raw_files = self.collect_raw_files()?;
        let parameters = serde_json::to_value(&self.params)
            .map_err(|e| AlignmentError::Parameters(e.to_string()))?;
        let mut aligned = self
            .base
            .create_copy(self.params.list_name.clone(), raw_files, true)?;
        let mut next_id = aligned.max_row_id().next();

        for list in self.others.iter() {
            if cancel.is_canceled() {
                return Err(AlignmentError::Canceled);
            }
            let candidates = self.score_candidates(list, &aligned, progress, cancel)?;
            next_id = self.merge_list(list, &mut aligned, candidates, next_id, progress)?;
            debug!(
                "Merged {} into {} rows",
                list.name(),
                aligned.num_rows()
            );
        }

        aligned.add_applied_method(FeatureListAppliedMethod::new(
            JOIN_ALIGNER_DESCRIPTION.to_string(),
            "align_join".to_string(),
            parameters,
        ));
        info!("Finished join aligner");
        Ok(aligned)
    }

    /// Score every acceptable pairing of a row of `list` with a row of
    /// `aligned`, best first
    fn score_candidates(
        &self,
        list: &FeatureList,
        aligned: &FeatureList,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<Vec<Candidate>, AlignmentError> {
        let mut mz_index: Vec<(f64, usize)> = aligned
            .rows()
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.average_mz().map(|mz| (mz, i)))
            .collect();
        mz_index.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut candidates = Vec::new();
        for (i, row) in list.rows().iter().enumerate() {
            if cancel.is_canceled() {
                return Err(AlignmentError::Canceled);
            }
            let mz_range = row.average_mz().map(|mz| self.params.mz_tolerance.to_range(mz));
            if self.params.mz_weight > 0.0 {
                // only rows inside the m/z window can pass the m/z check
                if let Some(range) = mz_range {
                    let start = mz_index.partition_point(|(mz, _)| *mz < range.start);
                    for (_, j) in mz_index[start..]
                        .iter()
                        .take_while(|(mz, _)| *mz <= range.end)
                    {
                        if let Some(score) = self.score_pair(row, &aligned.rows()[*j]) {
                            candidates.push(Candidate {
                                score,
                                row: i,
                                aligned: *j,
                            });
                        }
                    }
                }
            } else {
                for (j, candidate) in aligned.rows().iter().enumerate() {
                    if let Some(score) = self.score_pair(row, candidate) {
                        candidates.push(Candidate {
                            score,
                            row: i,
                            aligned: j,
                        });
                    }
                }
            }
            progress.increment(1);
        }
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(candidates)
    }

    /// Merge the best candidates, at most one row of `list` per aligned row,
    /// then append the rows of `list` that found no partner
    fn merge_list(
        &self,
        list: &FeatureList,
        aligned: &mut FeatureList,
        candidates: Vec<Candidate>,
        mut next_id: RowId,
        progress: &dyn ProgressSink,
    ) -> Result<RowId, AlignmentError> {
        let mut row_done = vec![false; list.num_rows()];
        let mut aligned_taken = vec![false; aligned.num_rows()];
        for candidate in candidates {
            if row_done[candidate.row] || aligned_taken[candidate.aligned] {
                continue;
            }
            row_done[candidate.row] = true;
            aligned_taken[candidate.aligned] = true;
            let row = &list.rows()[candidate.row];
            let features: Vec<_> = row
                .features()
                .filter_map(|f| {
                    aligned
                        .raw_file(f.raw_file_id())
                        .map(|raw| f.copy_for(raw.clone()))
                })
                .collect();
            let target = aligned.rows()[candidate.aligned].id();
            for feature in features {
                aligned.add_feature_to_row(target, feature)?;
            }
            progress.increment(1);
        }

        for (row, done) in list.rows().iter().zip(row_done) {
            if done {
                continue;
            }
            let mut new_row = FeatureListRow::new(next_id);
            new_row.set_annotations(row.annotations().to_vec());
            new_row.set_comment(row.comment().map(String::from));
            for feature in row.features() {
                if let Some(raw) = aligned.raw_file(feature.raw_file_id()) {
                    new_row.add_feature(feature.copy_for(raw.clone()));
                }
            }
            aligned.add_row(new_row)?;
            next_id = next_id.next();
            progress.increment(1);
        }
        Ok(next_id)
    }

    /// The score of merging `row` into `candidate`, `None` when any
    /// configured check fails
    fn score_pair(&self, row: &FeatureListRow, candidate: &FeatureListRow) -> Option<f64> {
        let params = &self.params;
        let mut score = 0.0;

        let row_mz = row.average_mz();
        let cand_mz = candidate.average_mz();
        if params.mz_weight > 0.0 {
            let (mz, cand) = (row_mz?, cand_mz?);
            let range = params.mz_tolerance.to_range(mz);
            if !range.contains(&cand) {
                return None;
            }
            score += closeness((mz - cand).abs(), range.width()) * params.mz_weight;
        }

        if params.rt_weight > 0.0 {
            if let (Some(rt), Some(cand)) = (row.average_rt(), candidate.average_rt()) {
                let range = params.rt_tolerance.to_range(rt);
                if cand >= 0.0 && !range.contains(&cand) {
                    return None;
                }
                score += closeness((rt - cand).abs() as f64, range.width() as f64) * params.rt_weight;
            }
        }

        if let Some(tolerance) = params.mobility_tolerance.as_ref() {
            if params.mobility_weight > 0.0 {
                if let (Some(mob), Some(cand)) = (row.average_mobility(), candidate.average_mobility())
                {
                    let range: Interval<f32> = tolerance.to_range(mob);
                    if !range.contains(&cand) {
                        return None;
                    }
                    score += closeness((mob - cand).abs() as f64, range.width() as f64)
                        * params.mobility_weight;
                }
            }
        }

        if params.same_charge_required && !self.check_charge(row, candidate) {
            return None;
        }
        if params.same_id_required && !row.compare_identities(candidate) {
            return None;
        }
        if !self.check_isotope_pattern(row, candidate) {
            return None;
        }
        if !self.check_spectral_similarity(row, candidate) {
            return None;
        }
        Some(score)
    }

    /// Unknown charges are compatible with any charge
    fn check_charge(&self, row: &FeatureListRow, candidate: &FeatureListRow) -> bool {
        match (row.row_charge(), candidate.row_charge()) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }

    fn check_isotope_pattern(&self, row: &FeatureListRow, candidate: &FeatureListRow) -> bool {
        let Some(params) = self.params.isotope_pattern.as_ref() else {
            return true;
        };
        match (row.best_isotope_pattern(), candidate.best_isotope_pattern()) {
            (Some(a), Some(b)) => IsotopePatternScoreCalculator::check_match(a, b, params),
            _ => true,
        }
    }

    fn check_spectral_similarity(&self, row: &FeatureListRow, candidate: &FeatureListRow) -> bool {
        let Some(params) = self.params.spectral_similarity.as_ref() else {
            return true;
        };
        let function: &dyn SpectralSimilarityFunction = match self.similarity.as_ref() {
            Some(f) => f.as_ref(),
            None => &params.function,
        };
        let (library, query) = match params.ms_level {
            1 => {
                let library = row.best_feature().and_then(|f| f.representative_scan());
                let query = candidate
                    .best_feature()
                    .and_then(|f| f.representative_scan());
                match (library, query) {
                    (Some(l), Some(q)) => (l, q),
                    _ => return true,
                }
            }
            _ => match (row.best_fragmentation_scan(), candidate.best_fragmentation_scan()) {
                (Some(l), Some(q)) => (l, q),
                _ => return false,
            },
        };
        function
            .similarity(&params.mz_tolerance, &library.mass_list, &query.mass_list)
            .is_some()
    }
}
