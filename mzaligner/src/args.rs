use std::fmt::Display;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use mzfeatures::CenterMeasure;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    /// Merge the rows of feature lists over different raw data files into one list
    Align,
    /// Correlate the rows within each feature list by height and elution shape
    Correlate,
}

impl Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Align => write!(f, "align"),
            Mode::Correlate => write!(f, "correlate"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgCenterMeasure {
    #[default]
    /// The intensity weighted average
    Avg,
    Median,
    /// The most heavily weighted value
    Mode,
}

impl From<ArgCenterMeasure> for CenterMeasure {
    fn from(value: ArgCenterMeasure) -> Self {
        match value {
            ArgCenterMeasure::Avg => CenterMeasure::Avg,
            ArgCenterMeasure::Median => CenterMeasure::Median,
            ArgCenterMeasure::Mode => CenterMeasure::Mode,
        }
    }
}

impl Display for ArgCenterMeasure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", CenterMeasure::from(*self))
    }
}

pub(crate) fn non_negative_float_f32(s: &str) -> Result<f32, String> {
    let value = s.parse::<f32>().map_err(|e| e.to_string())?;
    if value < 0.0 {
        Err(format!("`{s}` is less than zero"))
    } else {
        Ok(value)
    }
}

pub(crate) fn non_negative_float_f64(s: &str) -> Result<f64, String> {
    let value = s.parse::<f64>().map_err(|e| e.to_string())?;
    if value < 0.0 {
        Err(format!("`{s}` is less than zero"))
    } else {
        Ok(value)
    }
}
