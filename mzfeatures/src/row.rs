use std::collections::BTreeMap;
use std::fmt::Display;
use std::hash::Hash;

use identity_hash::{BuildIdentityHasher, IdentityHashable};
use serde::{Deserialize, Serialize};

use crate::annotation::{compare_identities, Annotation};
use crate::feature::Feature;
use crate::isotopes::IsotopePattern;
use crate::raw::{RawFileId, Scan};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(pub u32);

impl RowId {
    pub fn next(&self) -> RowId {
        RowId(self.0 + 1)
    }
}

impl Hash for RowId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_usize(self.0 as usize);
    }
}

impl IdentityHashable for RowId {}

impl Display for RowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type RowIdMap<V> = std::collections::HashMap<RowId, V, BuildIdentityHasher<RowId>>;

/// Features from different raw data files believed to be the same compound.
/// A row holds at most one feature per raw data file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureListRow {
    id: RowId,
    features: BTreeMap<RawFileId, Feature>,
    annotations: Vec<Annotation>,
    comment: Option<String>,
}

fn mean<I: Iterator<Item = f64>>(it: I) -> Option<f64> {
    let (acc, n) = it.fold((0.0, 0usize), |(acc, n), v| (acc + v, n + 1));
    if n == 0 {
        None
    } else {
        Some(acc / n as f64)
    }
}

impl FeatureListRow {
    pub fn new(id: RowId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.add_feature(feature);
        self
    }

    pub fn id(&self) -> RowId {
        self.id
    }

    pub fn set_id(&mut self, id: RowId) {
        self.id = id;
    }

    /// Add `feature`, returning whatever feature previously represented the
    /// same raw file
    pub fn add_feature(&mut self, feature: Feature) -> Option<Feature> {
        self.features.insert(feature.raw_file_id(), feature)
    }

    pub fn remove_feature(&mut self, raw_file: RawFileId) -> Option<Feature> {
        self.features.remove(&raw_file)
    }

    pub fn feature(&self, raw_file: RawFileId) -> Option<&Feature> {
        self.features.get(&raw_file)
    }

    pub fn feature_mut(&mut self, raw_file: RawFileId) -> Option<&mut Feature> {
        self.features.get_mut(&raw_file)
    }

    pub fn has_feature_for(&self, raw_file: RawFileId) -> bool {
        self.features.contains_key(&raw_file)
    }

    pub fn features(&self) -> impl Iterator<Item = &Feature> + '_ {
        self.features.values()
    }

    pub fn features_mut(&mut self) -> impl Iterator<Item = &mut Feature> + '_ {
        self.features.values_mut()
    }

    pub fn raw_file_ids(&self) -> impl Iterator<Item = RawFileId> + '_ {
        self.features.keys().copied()
    }

    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    pub fn average_mz(&self) -> Option<f64> {
        mean(self.features().filter_map(|f| f.mz()))
    }

    pub fn average_rt(&self) -> Option<f32> {
        mean(self.features().filter_map(|f| f.rt().map(|v| v as f64))).map(|v| v as f32)
    }

    /// Mean mobility over features carrying a finite mobility
    pub fn average_mobility(&self) -> Option<f32> {
        mean(
            self.features()
                .filter_map(|f| f.mobility())
                .filter(|v| v.is_finite())
                .map(|v| v as f64),
        )
        .map(|v| v as f32)
    }

    pub fn average_height(&self) -> Option<f32> {
        mean(self.features().filter_map(|f| f.height().map(|v| v as f64))).map(|v| v as f32)
    }

    pub fn max_height(&self) -> Option<f32> {
        self.features()
            .filter_map(|f| f.height())
            .max_by(|a, b| a.total_cmp(b))
    }

    /// The most intense feature of the row
    pub fn best_feature(&self) -> Option<&Feature> {
        self.features().max_by(|a, b| {
            a.height()
                .unwrap_or(0.0)
                .total_cmp(&b.height().unwrap_or(0.0))
        })
    }

    /// The isotope pattern of the most intense feature carrying one
    pub fn best_isotope_pattern(&self) -> Option<&IsotopePattern> {
        self.features()
            .filter(|f| f.isotope_pattern().is_some())
            .max_by(|a, b| {
                a.height()
                    .unwrap_or(0.0)
                    .total_cmp(&b.height().unwrap_or(0.0))
            })
            .and_then(|f| f.isotope_pattern())
    }

    /// The fragmentation scan with the highest total ion current over all features
    pub fn best_fragmentation_scan(&self) -> Option<&Scan> {
        self.features()
            .filter_map(|f| f.best_fragmentation_scan())
            .max_by(|a, b| a.tic().total_cmp(&b.tic()))
    }

    /// The charge of the most intense feature with a known, non-zero charge
    pub fn row_charge(&self) -> Option<i32> {
        self.features()
            .filter(|f| matches!(f.charge(), Some(z) if z != 0))
            .max_by(|a, b| {
                a.height()
                    .unwrap_or(0.0)
                    .total_cmp(&b.height().unwrap_or(0.0))
            })
            .and_then(|f| f.charge())
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn preferred_annotation(&self) -> Option<&Annotation> {
        self.annotations.first()
    }

    pub fn add_annotation(&mut self, annotation: Annotation) {
        self.annotations.push(annotation);
    }

    pub fn set_annotations(&mut self, annotations: Vec<Annotation>) {
        self.annotations = annotations;
    }

    pub fn compare_identities(&self, other: &FeatureListRow) -> bool {
        compare_identities(&self.annotations, &other.annotations)
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn set_comment(&mut self, comment: Option<String>) {
        self.comment = comment;
    }
}
