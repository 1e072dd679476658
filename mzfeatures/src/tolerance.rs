//! Matching windows in the m/z, retention time and ion mobility dimensions.
use std::fmt::Display;

use mzpeaks::Tolerance;
use serde::{Deserialize, Serialize};

use crate::interval::{Interval, Span1D};

/// A combined absolute/relative m/z tolerance. The half-width of the window
/// is the larger of the two.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MZTolerance {
    pub absolute: f64,
    pub ppm: f64,
}

impl Default for MZTolerance {
    fn default() -> Self {
        Self {
            absolute: 0.005,
            ppm: 10.0,
        }
    }
}

impl MZTolerance {
    pub fn new(absolute: f64, ppm: f64) -> Self {
        Self { absolute, ppm }
    }

    pub fn window(&self, mz: f64) -> f64 {
        self.absolute.max(mz * self.ppm / 1e6)
    }

    pub fn to_range(&self, mz: f64) -> Interval<f64> {
        let w = self.window(mz);
        Interval::new(mz - w, mz + w)
    }

    pub fn check_within(&self, mz1: f64, mz2: f64) -> bool {
        self.to_range(mz1).contains(&mz2)
    }

    /// Express the window at `mz` as an [`mzpeaks::Tolerance`] for peak set lookups
    pub fn as_mzpeaks(&self, mz: f64) -> Tolerance {
        Tolerance::Da(self.window(mz))
    }
}

impl Display for MZTolerance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} m/z or {} ppm", self.absolute, self.ppm)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RTToleranceUnit {
    /// Minutes
    #[default]
    Absolute,
    /// Percent of the queried retention time
    Relative,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RTTolerance {
    pub tolerance: f32,
    pub unit: RTToleranceUnit,
}

impl Default for RTTolerance {
    fn default() -> Self {
        Self::absolute(0.1)
    }
}

impl RTTolerance {
    pub fn new(tolerance: f32, unit: RTToleranceUnit) -> Self {
        Self { tolerance, unit }
    }

    pub fn absolute(tolerance: f32) -> Self {
        Self::new(tolerance, RTToleranceUnit::Absolute)
    }

    pub fn relative(percent: f32) -> Self {
        Self::new(percent, RTToleranceUnit::Relative)
    }

    pub fn window(&self, rt: f32) -> f32 {
        match self.unit {
            RTToleranceUnit::Absolute => self.tolerance,
            RTToleranceUnit::Relative => rt * self.tolerance / 100.0,
        }
    }

    pub fn to_range(&self, rt: f32) -> Interval<f32> {
        let w = self.window(rt);
        Interval::new(rt - w, rt + w)
    }

    pub fn check_within(&self, rt1: f32, rt2: f32) -> bool {
        self.to_range(rt1).contains(&rt2)
    }
}

impl Display for RTTolerance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.unit {
            RTToleranceUnit::Absolute => write!(f, "{} min", self.tolerance),
            RTToleranceUnit::Relative => write!(f, "{}%", self.tolerance),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MobilityTolerance {
    pub tolerance: f32,
}

impl Default for MobilityTolerance {
    fn default() -> Self {
        Self { tolerance: 0.01 }
    }
}

impl MobilityTolerance {
    pub fn new(tolerance: f32) -> Self {
        Self { tolerance }
    }

    pub fn window(&self) -> f32 {
        self.tolerance
    }

    pub fn to_range(&self, mobility: f32) -> Interval<f32> {
        Interval::new(mobility - self.tolerance, mobility + self.tolerance)
    }

    pub fn check_within(&self, mobility1: f32, mobility2: f32) -> bool {
        self.to_range(mobility1).contains(&mobility2)
    }
}

/// A threshold that is the larger of an absolute floor and a value-relative
/// fraction. `relative` is a fraction, not a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct AbsoluteNRelative {
    pub absolute: f64,
    pub relative: f64,
}

impl AbsoluteNRelative {
    pub fn new(absolute: f64, relative: f64) -> Self {
        Self { absolute, relative }
    }

    pub fn maximum_value(&self, value: f64) -> f64 {
        self.absolute.max(value * self.relative)
    }

    pub fn minimum_value(&self, value: f64) -> f64 {
        self.absolute.min(value * self.relative)
    }

    pub fn to_range(&self, value: f64) -> Interval<f64> {
        let w = self.maximum_value(value);
        Interval::new(value - w, value + w)
    }

    pub fn check_within(&self, value1: f64, value2: f64) -> bool {
        self.to_range(value1).contains(&value2)
    }

    /// Whether `value` exceeds the larger of the absolute floor and the
    /// fraction of `total`
    pub fn check_greater_equal_max(&self, total: f64, value: f64) -> bool {
        value >= self.maximum_value(total)
    }
}
