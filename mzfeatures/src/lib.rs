//! A data model for LC-MS feature lists.
//!
//! A [`FeatureList`] holds [`FeatureListRow`]s, each grouping at most one
//! [`Feature`] per [`RawDataFile`]. A feature owns a [`FeatureSeries`] that
//! refers to scans of its raw file by index, and an [`AttributeTable`] of
//! values derived from that series by [`descriptors`] and [`quality`].
pub mod annotation;
pub mod attributes;
pub mod center;
pub mod descriptors;
pub mod feature;
pub mod interval;
pub mod isotopes;
pub mod list;
pub mod quality;
pub mod raw;
pub mod row;
pub mod series;
pub mod tolerance;

pub use crate::annotation::{compare_identities, Annotation};
pub use crate::attributes::{
    AttributeChange, AttributeKind, AttributeObserver, AttributeTable, AttributeValue,
};
pub use crate::center::{CenterFunction, CenterMeasure, Weighting};
pub use crate::descriptors::recalculate_derived_attributes;
pub use crate::feature::{Feature, FeatureStatus};
pub use crate::interval::{Interval, Span1D};
pub use crate::isotopes::{IsotopePattern, IsotopePatternStatus, IsotopePeak};
pub use crate::list::{FeatureList, FeatureListAppliedMethod, FeatureListError};
pub use crate::quality::{calculate_quality_parameters, QualityError, QualityMetrics};
pub use crate::raw::{RawDataFile, RawFileId, RawFileMap, Scan, ScanAccess};
pub use crate::row::{FeatureListRow, RowId, RowIdMap};
pub use crate::series::{
    FeatureSeries, IntensitySeries, IonMobilitySeries, IonMobilogramTimeSeries, IonTimeSeries,
    MobilitySeries, MzSeries, SeriesError, SummedIntensityMobilitySeries, TimeSeries,
};
pub use crate::tolerance::{
    AbsoluteNRelative, MZTolerance, MobilityTolerance, RTTolerance, RTToleranceUnit,
};
