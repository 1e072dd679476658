use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::feature::Feature;
use crate::raw::{RawDataFile, RawFileId};
use crate::row::{FeatureListRow, RowId};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureListError {
    #[error("Raw data file {0} is listed more than once")]
    DuplicateRawFile(RawFileId),
    #[error("Row {row} holds a feature from raw data file {raw_file} which is not part of the list")]
    UnknownRawFile { row: RowId, raw_file: RawFileId },
    #[error("Row identifier {0} is already in use")]
    DuplicateRowId(RowId),
    #[error("Row {0} is not part of the list")]
    UnknownRow(RowId),
}

/// A record of a processing step applied to a feature list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureListAppliedMethod {
    pub description: String,
    pub module: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

impl FeatureListAppliedMethod {
    pub fn new(description: String, module: String, parameters: serde_json::Value) -> Self {
        Self {
            description,
            module,
            parameters,
        }
    }
}

/// A named collection of rows over a fixed set of raw data files
#[derive(Debug, Clone, Default)]
pub struct FeatureList {
    name: String,
    raw_files: Vec<Arc<RawDataFile>>,
    rows: Vec<FeatureListRow>,
    applied_methods: Vec<FeatureListAppliedMethod>,
}

impl FeatureList {
    pub fn new(name: String, raw_files: Vec<Arc<RawDataFile>>) -> Result<Self, FeatureListError> {
        for (i, raw) in raw_files.iter().enumerate() {
            if raw_files[..i].iter().any(|r| r.id() == raw.id()) {
                return Err(FeatureListError::DuplicateRawFile(raw.id()));
            }
        }
        Ok(Self {
            name,
            raw_files,
            rows: Vec::new(),
            applied_methods: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn raw_files(&self) -> &[Arc<RawDataFile>] {
        &self.raw_files
    }

    pub fn raw_file(&self, id: RawFileId) -> Option<&Arc<RawDataFile>> {
        self.raw_files.iter().find(|r| r.id() == id)
    }

    pub fn has_raw_file(&self, id: RawFileId) -> bool {
        self.raw_file(id).is_some()
    }

    pub fn rows(&self) -> &[FeatureListRow] {
        &self.rows
    }

    pub(crate) fn rows_mut(&mut self) -> &mut [FeatureListRow] {
        &mut self.rows
    }

    pub fn row(&self, id: RowId) -> Option<&FeatureListRow> {
        self.rows.iter().find(|r| r.id() == id)
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append `row`, checking that its raw files belong to this list and its
    /// identifier is unused
    pub fn add_row(&mut self, row: FeatureListRow) -> Result<(), FeatureListError> {
        if let Some(raw_file) = row.raw_file_ids().find(|id| !self.has_raw_file(*id)) {
            return Err(FeatureListError::UnknownRawFile {
                row: row.id(),
                raw_file,
            });
        }
        if self.rows.iter().any(|r| r.id() == row.id()) {
            return Err(FeatureListError::DuplicateRowId(row.id()));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Add `feature` to the row `id`, replacing and returning that row's
    /// feature from the same raw data file
    pub fn add_feature_to_row(
        &mut self,
        id: RowId,
        feature: Feature,
    ) -> Result<Option<Feature>, FeatureListError> {
        let raw_file = feature.raw_file_id();
        if !self.has_raw_file(raw_file) {
            return Err(FeatureListError::UnknownRawFile { row: id, raw_file });
        }
        let row = self
            .rows
            .iter_mut()
            .find(|r| r.id() == id)
            .ok_or(FeatureListError::UnknownRow(id))?;
        Ok(row.add_feature(feature))
    }

    /// The largest row identifier in use, zero for an empty list
    pub fn max_row_id(&self) -> RowId {
        self.rows.iter().map(|r| r.id()).max().unwrap_or_default()
    }

    pub fn features(&self) -> impl Iterator<Item = &Feature> + '_ {
        self.rows.iter().flat_map(|r| r.features())
    }

    pub fn features_mut(&mut self) -> impl Iterator<Item = &mut Feature> + '_ {
        self.rows.iter_mut().flat_map(|r| r.features_mut())
    }

    pub fn applied_methods(&self) -> &[FeatureListAppliedMethod] {
        &self.applied_methods
    }

    pub fn add_applied_method(&mut self, method: FeatureListAppliedMethod) {
        self.applied_methods.push(method);
    }

    /// Deep copy this list under a new name over `raw_files`, which must be a
    /// superset of this list's files. Features are rebound to the matching
    /// entry of `raw_files`. When `renumber` is set rows are given identifiers
    /// `1..=n` in their current order.
    pub fn create_copy(
        &self,
        name: String,
        raw_files: Vec<Arc<RawDataFile>>,
        renumber: bool,
    ) -> Result<Self, FeatureListError> {
        let mut dup = Self::new(name, raw_files)?;
        for (i, row) in self.rows.iter().enumerate() {
            let id = if renumber { RowId(i as u32 + 1) } else { row.id() };
            let mut new_row = FeatureListRow::new(id);
            new_row.set_annotations(row.annotations().to_vec());
            new_row.set_comment(row.comment().map(String::from));
            for feature in row.features() {
                let raw = dup.raw_file(feature.raw_file_id()).cloned().ok_or(
                    FeatureListError::UnknownRawFile {
                        row: row.id(),
                        raw_file: feature.raw_file_id(),
                    },
                )?;
                new_row.add_feature(feature.copy_for(raw));
            }
            dup.rows.push(new_row);
        }
        dup.applied_methods = self.applied_methods.clone();
        Ok(dup)
    }
}
