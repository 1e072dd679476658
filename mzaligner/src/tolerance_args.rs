use std::{error::Error, fmt::Display, num::ParseFloatError, str::FromStr};

use mzfeatures::MZTolerance;
use serde::{Deserialize, Serialize};

/// An m/z tolerance written on the command line as `(absolute)` or
/// `(absolute):(ppm)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArgMZTolerance {
    pub absolute: f64,
    pub ppm: f64,
}

impl ArgMZTolerance {
    pub fn new(absolute: f64, ppm: f64) -> Self {
        Self { absolute, ppm }
    }
}

impl Default for ArgMZTolerance {
    fn default() -> Self {
        Self {
            absolute: 0.002,
            ppm: 10.0,
        }
    }
}

impl Display for ArgMZTolerance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.absolute, self.ppm)
    }
}

impl From<ArgMZTolerance> for MZTolerance {
    fn from(value: ArgMZTolerance) -> Self {
        MZTolerance::new(value.absolute, value.ppm)
    }
}

#[derive(Debug)]
pub enum MZToleranceParseError {
    MalformedAbsolute(ParseFloatError),
    MalformedPPM(ParseFloatError),
    Negative(f64),
}

impl Display for MZToleranceParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MZToleranceParseError::MalformedAbsolute(e) => {
                write!(f, "Failed to parse absolute m/z tolerance {e}")
            }
            MZToleranceParseError::MalformedPPM(e) => {
                write!(f, "Failed to parse ppm m/z tolerance {e}")
            }
            MZToleranceParseError::Negative(v) => {
                write!(f, "m/z tolerance {v} is less than zero")
            }
        }
    }
}

impl Error for MZToleranceParseError {}

impl FromStr for ArgMZTolerance {
    type Err = MZToleranceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (abs_s, ppm_s) = match s.split_once(':') {
            Some((a, p)) => (a.trim(), p.trim()),
            None => (s.trim(), ""),
        };
        let absolute: f64 = abs_s
            .parse()
            .map_err(MZToleranceParseError::MalformedAbsolute)?;
        let ppm: f64 = if ppm_s.is_empty() {
            0.0
        } else {
            ppm_s.parse().map_err(MZToleranceParseError::MalformedPPM)?
        };
        if absolute < 0.0 {
            return Err(MZToleranceParseError::Negative(absolute));
        }
        if ppm < 0.0 {
            return Err(MZToleranceParseError::Negative(ppm));
        }
        Ok(Self { absolute, ppm })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_tolerance_fromstr() -> Result<(), MZToleranceParseError> {
        let t: ArgMZTolerance = "0.005:10".parse()?;
        assert_eq!(t, ArgMZTolerance::new(0.005, 10.0));

        let t: ArgMZTolerance = "0.01".parse()?;
        assert_eq!(t, ArgMZTolerance::new(0.01, 0.0));

        let t: ArgMZTolerance = t.to_string().parse()?;
        assert_eq!(t, ArgMZTolerance::new(0.01, 0.0));

        let tol: MZTolerance = ArgMZTolerance::new(0.005, 10.0).into();
        assert!(tol.check_within(500.0, 500.004));
        assert!(!tol.check_within(500.0, 500.009));
        Ok(())
    }

    #[test]
    fn test_tolerance_fromstr_malformed() {
        match "a:10".parse::<ArgMZTolerance>() {
            Err(MZToleranceParseError::MalformedAbsolute(_)) => {}
            other => panic!("Expected a malformed absolute tolerance, got {other:?}"),
        }
        match "0.01:b".parse::<ArgMZTolerance>() {
            Err(MZToleranceParseError::MalformedPPM(_)) => {}
            other => panic!("Expected a malformed ppm tolerance, got {other:?}"),
        }
        assert!(matches!(
            "-0.01".parse::<ArgMZTolerance>(),
            Err(MZToleranceParseError::Negative(_))
        ));
    }
}
