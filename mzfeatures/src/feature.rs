//! A single detected feature in one raw data file.
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::attributes::{AttributeKind, AttributeTable, AttributeValue};
use crate::interval::Interval;
use crate::isotopes::IsotopePattern;
use crate::raw::{RawDataFile, RawFileId, Scan, ScanAccess};
use crate::series::{FeatureSeries, IntensitySeries};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FeatureStatus {
    #[default]
    Detected,
    Estimated,
    Manual,
}

macro_rules! float_attr {
    ($getter:ident, $setter:ident, $kind:expr) => {
        pub fn $getter(&self) -> Option<f32> {
            self.attributes.get($kind).and_then(|v| v.as_float())
        }

        pub fn $setter(&mut self, value: f32) -> bool {
            self.attributes.set($kind, AttributeValue::Float(value))
        }
    };
}

macro_rules! float_range_attr {
    ($getter:ident, $setter:ident, $kind:expr) => {
        pub fn $getter(&self) -> Option<Interval<f32>> {
            self.attributes.get($kind).and_then(|v| v.as_float_range())
        }

        pub fn $setter(&mut self, value: Interval<f32>) -> bool {
            self.attributes.set($kind, AttributeValue::FloatRange(value))
        }
    };
}

/// A feature: the trace of one ion in one raw data file together with the
/// attributes derived from it.
#[derive(Debug, Clone)]
pub struct Feature {
    raw_file: Arc<RawDataFile>,
    series: FeatureSeries,
    attributes: AttributeTable,
    representative_scan: Option<u32>,
    fragment_scans: Vec<u32>,
    isotope_pattern: Option<IsotopePattern>,
    status: FeatureStatus,
}

impl PartialEq for Feature {
    fn eq(&self, other: &Self) -> bool {
        self.raw_file.id() == other.raw_file.id()
            && self.series == other.series
            && self.attributes == other.attributes
            && self.representative_scan == other.representative_scan
            && self.fragment_scans == other.fragment_scans
            && self.isotope_pattern == other.isotope_pattern
            && self.status == other.status
    }
}

impl Feature {
    /// Create a feature with no derived attributes. Call
    /// [`crate::descriptors::recalculate_derived_attributes`] to fill them in.
    pub fn new(raw_file: Arc<RawDataFile>, series: impl Into<FeatureSeries>) -> Self {
        Self {
            raw_file,
            series: series.into(),
            attributes: AttributeTable::new(),
            representative_scan: None,
            fragment_scans: Vec::new(),
            isotope_pattern: None,
            status: FeatureStatus::Detected,
        }
    }

    pub fn raw_file(&self) -> &Arc<RawDataFile> {
        &self.raw_file
    }

    pub fn raw_file_id(&self) -> RawFileId {
        self.raw_file.id()
    }

    pub fn series(&self) -> &FeatureSeries {
        &self.series
    }

    /// Replace the backing series. Derived attributes are left as they were
    /// until they are recalculated.
    pub fn set_series(&mut self, series: impl Into<FeatureSeries>) {
        self.series = series.into();
    }

    pub fn num_data_points(&self) -> usize {
        self.series.len()
    }

    pub fn attributes(&self) -> &AttributeTable {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut AttributeTable {
        &mut self.attributes
    }

    pub fn mz(&self) -> Option<f64> {
        self.attributes
            .get(AttributeKind::Mz)
            .and_then(|v| v.as_double())
    }

    pub fn set_mz(&mut self, mz: f64) -> bool {
        self.attributes
            .set(AttributeKind::Mz, AttributeValue::Double(mz))
    }

    float_attr!(rt, set_rt, AttributeKind::Rt);
    float_attr!(height, set_height, AttributeKind::Height);
    float_attr!(area, set_area, AttributeKind::Area);
    float_attr!(mobility, set_mobility, AttributeKind::Mobility);
    float_attr!(fwhm, set_fwhm, AttributeKind::Fwhm);
    float_attr!(tailing_factor, set_tailing_factor, AttributeKind::TailingFactor);
    float_attr!(asymmetry_factor, set_asymmetry_factor, AttributeKind::AsymmetryFactor);

    float_range_attr!(rt_range, set_rt_range, AttributeKind::RtRange);
    float_range_attr!(intensity_range, set_intensity_range, AttributeKind::IntensityRange);
    float_range_attr!(mobility_range, set_mobility_range, AttributeKind::MobilityRange);

    pub fn mz_range(&self) -> Option<Interval<f64>> {
        self.attributes
            .get(AttributeKind::MzRange)
            .and_then(|v| v.as_double_range())
    }

    pub fn set_mz_range(&mut self, value: Interval<f64>) -> bool {
        self.attributes
            .set(AttributeKind::MzRange, AttributeValue::DoubleRange(value))
    }

    pub fn charge(&self) -> Option<i32> {
        self.attributes
            .get(AttributeKind::Charge)
            .and_then(|v| v.as_int())
    }

    pub fn set_charge(&mut self, charge: i32) -> bool {
        self.attributes
            .set(AttributeKind::Charge, AttributeValue::Int(charge))
    }

    pub fn representative_scan_index(&self) -> Option<u32> {
        self.representative_scan
    }

    pub fn representative_scan(&self) -> Option<&Scan> {
        self.representative_scan
            .and_then(|i| self.raw_file.scan(i))
    }

    pub fn set_representative_scan(&mut self, index: Option<u32>) {
        self.representative_scan = index;
    }

    pub fn fragment_scan_indices(&self) -> &[u32] {
        &self.fragment_scans
    }

    pub fn add_fragment_scan(&mut self, index: u32) {
        if !self.fragment_scans.contains(&index) {
            self.fragment_scans.push(index);
        }
    }

    pub fn fragment_scans(&self) -> impl Iterator<Item = &Scan> + '_ {
        self.fragment_scans
            .iter()
            .filter_map(|i| self.raw_file.scan(*i))
    }

    /// The fragmentation scan with the highest total ion current
    pub fn best_fragmentation_scan(&self) -> Option<&Scan> {
        self.fragment_scans()
            .max_by(|a, b| a.tic().total_cmp(&b.tic()))
    }

    pub fn isotope_pattern(&self) -> Option<&IsotopePattern> {
        self.isotope_pattern.as_ref()
    }

    pub fn set_isotope_pattern(&mut self, pattern: Option<IsotopePattern>) {
        self.isotope_pattern = pattern;
    }

    pub fn status(&self) -> FeatureStatus {
        self.status
    }

    pub fn set_status(&mut self, status: FeatureStatus) {
        self.status = status;
    }

    /// A copy of this feature rebound to `raw_file`, sharing no observers
    /// with the original
    pub fn copy_for(&self, raw_file: Arc<RawDataFile>) -> Self {
        let mut dup = self.clone();
        dup.raw_file = raw_file;
        dup
    }
}
