//! Raw data files and the scans that time series refer to by index.
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::path::{Path, PathBuf};

use identity_hash::{BuildIdentityHasher, IdentityHashable};
use mzpeaks::{prelude::*, CentroidPeak, MZPeakSetType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawFileId(pub u32);

impl Hash for RawFileId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_usize(self.0 as usize);
    }
}

impl IdentityHashable for RawFileId {}

impl Display for RawFileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type RawFileMap<V> = HashMap<RawFileId, V, BuildIdentityHasher<RawFileId>>;

/// A single acquisition event. Features refer to scans by `index`, so the
/// scan owns the retention time rather than the time series.
#[derive(Debug, Clone)]
pub struct Scan {
    pub index: u32,
    /// Retention time in minutes
    pub rt: f32,
    pub ms_level: u8,
    pub mobility: Option<f64>,
    pub mass_list: MZPeakSetType<CentroidPeak>,
}

impl Scan {
    pub fn new(index: u32, rt: f32, ms_level: u8) -> Self {
        Self {
            index,
            rt,
            ms_level,
            mobility: None,
            mass_list: MZPeakSetType::empty(),
        }
    }

    pub fn with_mobility(mut self, mobility: Option<f64>) -> Self {
        self.mobility = mobility;
        self
    }

    pub fn with_mass_list(mut self, peaks: Vec<CentroidPeak>) -> Self {
        self.mass_list = MZPeakSetType::new(peaks);
        self
    }

    /// Total ion current of the mass list
    pub fn tic(&self) -> f32 {
        self.mass_list.iter().map(|p| p.intensity()).sum()
    }

    pub fn has_mass_list(&self) -> bool {
        !self.mass_list.is_empty()
    }
}

/// Random access to scans by index
pub trait ScanAccess {
    fn scan(&self, index: u32) -> Option<&Scan>;

    fn num_scans(&self) -> usize;

    fn scan_rt(&self, index: u32) -> Option<f32> {
        self.scan(index).map(|s| s.rt)
    }
}

/// A raw data file. Identity is the [`RawFileId`], names are informational.
#[derive(Debug, Clone)]
pub struct RawDataFile {
    id: RawFileId,
    name: String,
    path: Option<PathBuf>,
    scans: Vec<Scan>,
}

impl PartialEq for RawDataFile {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RawDataFile {}

impl RawDataFile {
    pub fn new(id: RawFileId, name: String, mut scans: Vec<Scan>) -> Self {
        scans.sort_by_key(|s| s.index);
        Self {
            id,
            name,
            path: None,
            scans,
        }
    }

    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self
    }

    pub fn id(&self) -> RawFileId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn scans(&self) -> &[Scan] {
        &self.scans
    }

    pub fn scans_of_level(&self, ms_level: u8) -> impl Iterator<Item = &Scan> + '_ {
        self.scans.iter().filter(move |s| s.ms_level == ms_level)
    }

    fn position_of(&self, index: u32) -> Option<usize> {
        self.scans.binary_search_by_key(&index, |s| s.index).ok()
    }

    /// The closest scan preceding `index` with the same MS level
    pub fn previous_scan(&self, index: u32) -> Option<&Scan> {
        let i = self.position_of(index)?;
        let level = self.scans[i].ms_level;
        self.scans[..i].iter().rev().find(|s| s.ms_level == level)
    }

    /// The closest scan following `index` with the same MS level
    pub fn next_scan(&self, index: u32) -> Option<&Scan> {
        let i = self.position_of(index)?;
        let level = self.scans[i].ms_level;
        self.scans[i + 1..].iter().find(|s| s.ms_level == level)
    }
}

impl ScanAccess for RawDataFile {
    fn scan(&self, index: u32) -> Option<&Scan> {
        self.position_of(index).map(|i| &self.scans[i])
    }

    fn num_scans(&self) -> usize {
        self.scans.len()
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    /// A file of `n` MS1 scans spaced `step` minutes apart starting at `start`
    pub(crate) fn make_raw_file(id: u32, n: u32, start: f32, step: f32) -> RawDataFile {
        let scans = (0..n)
            .map(|i| Scan::new(i, start + i as f32 * step, 1))
            .collect();
        RawDataFile::new(RawFileId(id), format!("file-{id}"), scans)
    }

    #[test]
    fn test_scan_lookup() {
        let raw = make_raw_file(1, 10, 1.0, 0.5);
        assert_eq!(raw.num_scans(), 10);
        assert_eq!(raw.scan_rt(4), Some(3.0));
        assert!(raw.scan(10).is_none());
    }

    #[test]
    fn test_neighbors_skip_other_levels() {
        let scans = vec![
            Scan::new(0, 1.0, 1),
            Scan::new(1, 1.1, 2),
            Scan::new(2, 1.2, 1),
            Scan::new(3, 1.3, 2),
            Scan::new(4, 1.4, 1),
        ];
        let raw = RawDataFile::new(RawFileId(0), "x".into(), scans);
        assert_eq!(raw.previous_scan(2).map(|s| s.index), Some(0));
        assert_eq!(raw.next_scan(2).map(|s| s.index), Some(4));
        assert_eq!(raw.next_scan(1).map(|s| s.index), Some(3));
        assert!(raw.previous_scan(0).is_none());
        assert_eq!(raw.scans_of_level(2).count(), 2);
    }

    #[test]
    fn test_tic() {
        let scan = Scan::new(0, 1.0, 1).with_mass_list(vec![
            CentroidPeak::new(100.0, 10.0, 0),
            CentroidPeak::new(200.0, 5.0, 1),
        ]);
        assert_eq!(scan.tic(), 15.0);
        assert!(scan.has_mass_list());
    }
}
