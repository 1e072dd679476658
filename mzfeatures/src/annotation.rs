use serde::{Deserialize, Serialize};

/// An identity assigned to a feature list row. Rows keep their annotations
/// ordered by preference, the first one being the preferred annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Annotation {
    CompoundDb {
        name: String,
        #[serde(default)]
        formula: Option<String>,
        #[serde(default)]
        adduct: Option<String>,
        #[serde(default)]
        precursor_mz: Option<f64>,
        #[serde(default)]
        score: Option<f32>,
        #[serde(default)]
        database: Option<String>,
    },
    SpectralLibrary {
        name: String,
        score: f32,
        #[serde(default)]
        matched_signals: usize,
    },
    Manual {
        name: String,
    },
}

impl Annotation {
    pub fn manual(name: impl Into<String>) -> Self {
        Self::Manual { name: name.into() }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::CompoundDb { name, .. } => name,
            Self::SpectralLibrary { name, .. } => name,
            Self::Manual { name } => name,
        }
    }

    pub fn score(&self) -> Option<f32> {
        match self {
            Self::CompoundDb { score, .. } => *score,
            Self::SpectralLibrary { score, .. } => Some(*score),
            Self::Manual { .. } => None,
        }
    }
}

/// Decide whether two annotation lists describe the same compound.
///
/// Two unannotated rows are compatible, and a row with annotations never
/// matches one without. Otherwise any shared name is a match.
pub fn compare_identities(first: &[Annotation], second: &[Annotation]) -> bool {
    match (first.first(), second.first()) {
        (None, None) => true,
        (None, Some(_)) | (Some(_), None) => false,
        (Some(a), Some(b)) => {
            if a.name() == b.name() {
                return true;
            }
            first
                .iter()
                .any(|a| second.iter().any(|b| a.name() == b.name()))
        }
    }
}
