//! JSON feature list documents and raw data loading.
//!
//! A document describes its raw data files either inline, with a scan table,
//! or by the path of a mass spectrometry data file that is read with
//! [`mzdata`]. Paths are resolved relative to the document's directory.
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use mzdata::prelude::*;
use mzdata::MZReader;
use mzpeaks::CentroidPeak;

use mzfeatures::{
    recalculate_derived_attributes, Annotation, AttributeKind, AttributeValue, CenterMeasure,
    Feature, FeatureList, FeatureListAppliedMethod, FeatureListError, FeatureListRow,
    FeatureSeries, FeatureStatus, IntensitySeries, IonMobilitySeries, IonMobilogramTimeSeries,
    IonTimeSeries, IsotopePattern, MobilitySeries, MzSeries, RawDataFile, RawFileId, RowId, Scan,
    SeriesError, TimeSeries,
};

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("An IO error occurred: {0}")]
    IOError(
        #[source]
        #[from]
        io::Error,
    ),
    #[error("Malformed feature list document: {0}")]
    Malformed(
        #[source]
        #[from]
        serde_json::Error,
    ),
    #[error("Inconsistent feature list: {0}")]
    FeatureList(
        #[source]
        #[from]
        FeatureListError,
    ),
    #[error("Row {row} has a malformed series: {source}")]
    Series {
        row: RowId,
        #[source]
        source: SeriesError,
    },
    #[error("Row {row} refers to raw data file {raw_file} which the document does not describe")]
    UnknownRawFile { row: RowId, raw_file: RawFileId },
    #[error("Failed to read raw data file {path}: {source}")]
    RawData {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn default_ms_level() -> u8 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub index: u32,
    /// Retention time in minutes
    pub rt: f32,
    #[serde(default = "default_ms_level")]
    pub ms_level: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobility: Option<f64>,
    /// Centroided `[m/z, intensity]` pairs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub peaks: Vec<[f64; 2]>,
}

impl ScanRecord {
    fn into_scan(self) -> Scan {
        let peaks = self
            .peaks
            .iter()
            .enumerate()
            .map(|(i, [mz, intensity])| CentroidPeak::new(*mz, *intensity as f32, i as u32))
            .collect();
        Scan::new(self.index, self.rt, self.ms_level)
            .with_mobility(self.mobility)
            .with_mass_list(peaks)
    }
}

impl From<&Scan> for ScanRecord {
    fn from(scan: &Scan) -> Self {
        Self {
            index: scan.index,
            rt: scan.rt,
            ms_level: scan.ms_level,
            mobility: scan.mobility,
            peaks: scan
                .mass_list
                .iter()
                .map(|p| [p.mz, p.intensity as f64])
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFileRecord {
    pub id: RawFileId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scans: Vec<ScanRecord>,
}

/// Read every spectrum of a mass spectrometry data file as a [`Scan`]
/// carrying its centroided mass list
pub fn read_scans(path: &Path) -> io::Result<Vec<Scan>> {
    let mut reader = MZReader::open_path(path)?;
    let scans: Vec<Scan> = reader
        .iter()
        .map(|spectrum| {
            let peaks = spectrum
                .peaks()
                .iter()
                .enumerate()
                .map(|(i, p)| CentroidPeak::new(p.mz, p.intensity, i as u32))
                .collect();
            Scan::new(
                spectrum.index() as u32,
                spectrum.start_time() as f32,
                spectrum.ms_level(),
            )
            .with_mobility(spectrum.ion_mobility())
            .with_mass_list(peaks)
        })
        .collect();
    debug!("Read {} scans from {}", scans.len(), path.display());
    Ok(scans)
}

impl RawFileRecord {
    fn load(self, base_dir: Option<&Path>) -> Result<RawDataFile, DocumentError> {
        let Self {
            id,
            name,
            path,
            scans,
        } = self;
        match path {
            Some(path) if scans.is_empty() => {
                let resolved = match base_dir {
                    Some(dir) if path.is_relative() => dir.join(&path),
                    _ => path.clone(),
                };
                let scans = read_scans(&resolved).map_err(|source| DocumentError::RawData {
                    path: resolved.clone(),
                    source,
                })?;
                Ok(RawDataFile::new(id, name, scans).with_path(path))
            }
            path => {
                let raw =
                    RawDataFile::new(id, name, scans.into_iter().map(ScanRecord::into_scan).collect());
                Ok(match path {
                    Some(path) => raw.with_path(path),
                    None => raw,
                })
            }
        }
    }

    fn from_raw_file(raw: &RawDataFile) -> Self {
        let scans = match raw.path() {
            Some(_) => Vec::new(),
            None => raw.scans().iter().map(ScanRecord::from).collect(),
        };
        Self {
            id: raw.id(),
            name: raw.name().to_string(),
            path: raw.path().map(Path::to_path_buf),
            scans,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobilogramRecord {
    pub frame: u32,
    pub mobilities: Vec<f64>,
    pub mzs: Vec<f64>,
    pub intensities: Vec<f64>,
}

/// A feature. Either `scans`, `mzs` and `intensities` describe a
/// chromatogram, or `mobilograms` describe an ion mobility trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub raw_file: RawFileId,
    #[serde(default)]
    pub scans: Vec<u32>,
    #[serde(default)]
    pub mzs: Vec<f64>,
    #[serde(default)]
    pub intensities: Vec<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mobilograms: Vec<MobilogramRecord>,
    /// Derived attributes. When absent they are recalculated from the series.
    #[serde(default)]
    pub attributes: BTreeMap<AttributeKind, AttributeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub representative_scan: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fragment_scans: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isotope_pattern: Option<IsotopePattern>,
    #[serde(default)]
    pub status: FeatureStatus,
}

impl FeatureRecord {
    fn into_feature(
        self,
        raw: Arc<RawDataFile>,
        measure: CenterMeasure,
    ) -> Result<Feature, SeriesError> {
        let series: FeatureSeries = if self.mobilograms.is_empty() {
            IonTimeSeries::from_scans(raw.as_ref(), self.scans, self.mzs, self.intensities)?.into()
        } else {
            let mobilograms = self
                .mobilograms
                .into_iter()
                .map(|m| IonMobilitySeries::new(m.frame, m.mobilities, m.mzs, m.intensities))
                .collect::<Result<Vec<_>, _>>()?;
            IonMobilogramTimeSeries::new(raw.as_ref(), mobilograms)?.into()
        };
        let mut feature = Feature::new(raw, series);
        if self.attributes.is_empty() {
            recalculate_derived_attributes(&mut feature, measure);
        } else {
            for (kind, value) in self.attributes {
                feature.attributes_mut().set(kind, value);
            }
        }
        if self.representative_scan.is_some() {
            feature.set_representative_scan(self.representative_scan);
        }
        for index in self.fragment_scans {
            feature.add_fragment_scan(index);
        }
        feature.set_isotope_pattern(self.isotope_pattern);
        feature.set_status(self.status);
        Ok(feature)
    }

    fn from_feature(feature: &Feature) -> Self {
        let (scans, mzs, intensities, mobilograms) = match feature.series() {
            FeatureSeries::Chromatogram(c) => (
                c.scan_indices().to_vec(),
                c.mzs().to_vec(),
                c.intensities().to_vec(),
                Vec::new(),
            ),
            FeatureSeries::Mobilogram(m) => (
                Vec::new(),
                Vec::new(),
                Vec::new(),
                m.mobilograms()
                    .iter()
                    .map(|s| MobilogramRecord {
                        frame: s.frame(),
                        mobilities: s.mobilities().to_vec(),
                        mzs: s.mzs().to_vec(),
                        intensities: s.intensities().to_vec(),
                    })
                    .collect(),
            ),
        };
        Self {
            raw_file: feature.raw_file_id(),
            scans,
            mzs,
            intensities,
            mobilograms,
            attributes: feature
                .attributes()
                .iter()
                .map(|(k, v)| (k, *v))
                .collect(),
            representative_scan: feature.representative_scan_index(),
            fragment_scans: feature.fragment_scan_indices().to_vec(),
            isotope_pattern: feature.isotope_pattern().cloned(),
            status: feature.status(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowRecord {
    pub id: RowId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub features: Vec<FeatureRecord>,
}

/// The serialized form of a [`FeatureList`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureListDocument {
    pub name: String,
    pub raw_files: Vec<RawFileRecord>,
    #[serde(default)]
    pub rows: Vec<RowRecord>,
    #[serde(default)]
    pub applied_methods: Vec<FeatureListAppliedMethod>,
}

impl FeatureListDocument {
    /// Build the feature list, loading raw data files referenced by path.
    /// Features without stored attributes are described with `measure`.
    pub fn into_feature_list(
        self,
        base_dir: Option<&Path>,
        measure: CenterMeasure,
    ) -> Result<FeatureList, DocumentError> {
        let raw_files = self
            .raw_files
            .into_iter()
            .map(|r| r.load(base_dir).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;
        let mut list = FeatureList::new(self.name, raw_files)?;
        for method in self.applied_methods {
            list.add_applied_method(method);
        }
        for record in self.rows {
            let row_id = record.id;
            let mut row = FeatureListRow::new(row_id);
            for feature in record.features {
                let raw = list
                    .raw_file(feature.raw_file)
                    .cloned()
                    .ok_or(DocumentError::UnknownRawFile {
                        row: row_id,
                        raw_file: feature.raw_file,
                    })?;
                let feature = feature
                    .into_feature(raw, measure)
                    .map_err(|source| DocumentError::Series {
                        row: row_id,
                        source,
                    })?;
                row.add_feature(feature);
            }
            row.set_annotations(record.annotations);
            row.set_comment(record.comment);
            list.add_row(row)?;
        }
        Ok(list)
    }

    pub fn from_feature_list(list: &FeatureList) -> Self {
        Self {
            name: list.name().to_string(),
            raw_files: list
                .raw_files()
                .iter()
                .map(|r| RawFileRecord::from_raw_file(r))
                .collect(),
            rows: list
                .rows()
                .iter()
                .map(|row| RowRecord {
                    id: row.id(),
                    annotations: row.annotations().to_vec(),
                    comment: row.comment().map(str::to_string),
                    features: row.features().map(FeatureRecord::from_feature).collect(),
                })
                .collect(),
            applied_methods: list.applied_methods().to_vec(),
        }
    }
}

fn is_gzipped(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "gz")
}

fn open_input(path: &Path) -> io::Result<Box<dyn Read>> {
    let handle = BufReader::new(fs::File::open(path)?);
    if is_gzipped(path) {
        Ok(Box::new(GzDecoder::new(handle)))
    } else {
        Ok(Box::new(handle))
    }
}

/// Open `path` for writing, or STDOUT for `-`. Paths ending in `.gz` are
/// gzip compressed.
pub fn open_output(path: &Path) -> io::Result<Box<dyn Write>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(BufWriter::new(io::stdout())));
    }
    let handle = BufWriter::new(fs::File::create(path)?);
    if is_gzipped(path) {
        Ok(Box::new(GzEncoder::new(handle, Compression::best())))
    } else {
        Ok(Box::new(handle))
    }
}

pub fn read_document(path: &Path) -> Result<FeatureListDocument, DocumentError> {
    let reader = open_input(path)?;
    let document: FeatureListDocument = serde_json::from_reader(reader)?;
    info!(
        "Read feature list \"{}\" with {} rows from {}",
        document.name,
        document.rows.len(),
        path.display()
    );
    Ok(document)
}

/// Read and build the feature list stored at `path`
pub fn read_feature_list(path: &Path, measure: CenterMeasure) -> Result<FeatureList, DocumentError> {
    let document = read_document(path)?;
    document.into_feature_list(path.parent(), measure)
}

/// Serialize `value` as JSON to `path`, see [`open_output`]
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), DocumentError> {
    let mut writer = open_output(path)?;
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
