use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::KiraError;

fn dataset_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z][a-z0-9]*_gene_ensembl$").expect("static regex"))
}

fn identifier_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("static regex"))
}

/// Ensembl BioMart gene dataset, e.g. `celegans_gene_ensembl`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatasetName(String);

impl DatasetName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Species part of the dataset name (`celegans` for `celegans_gene_ensembl`).
    pub fn species(&self) -> &str {
        self.0.split('_').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DatasetName {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        if !dataset_regex().is_match(&normalized) {
            return Err(KiraError::InvalidDatasetName(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

impl TryFrom<String> for DatasetName {
    type Error = KiraError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DatasetName> for String {
    fn from(value: DatasetName) -> Self {
        value.0
    }
}

/// BioMart attribute identifier, e.g. `entrezgene_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AttributeName(String);

impl AttributeName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AttributeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AttributeName {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        if !identifier_regex().is_match(normalized) {
            return Err(KiraError::InvalidAttributeName(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

impl TryFrom<String> for AttributeName {
    type Error = KiraError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AttributeName> for String {
    fn from(value: AttributeName) -> Self {
        value.0
    }
}

/// Short species tag used to qualify cross-reference columns
/// (`celeg` -> `celeg_ensembl_id`, `celeg_entrez_id`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SpeciesPrefix(String);

impl SpeciesPrefix {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn ensembl_column(&self) -> String {
        format!("{}_ensembl_id", self.0)
    }

    pub fn entrez_column(&self) -> String {
        format!("{}_entrez_id", self.0)
    }
}

impl fmt::Display for SpeciesPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SpeciesPrefix {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        if !identifier_regex().is_match(&normalized) {
            return Err(KiraError::InvalidSpeciesPrefix(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

impl TryFrom<String> for SpeciesPrefix {
    type Error = KiraError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SpeciesPrefix> for String {
    fn from(value: SpeciesPrefix) -> Self {
        value.0
    }
}

/// One side of the species pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Species {
    pub dataset: DatasetName,
    pub prefix: SpeciesPrefix,
}

impl Species {
    /// Artifact tag, e.g. `CELEGANS`.
    pub fn artifact_tag(&self) -> String {
        self.dataset.species().to_uppercase()
    }
}

/// Row order of the annotated output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RowOrder {
    /// Input order; one-to-many matches stay adjacent.
    #[default]
    Input,
    /// Rows with an Entrez ID first, then rows without one.
    Grouped,
}

impl fmt::Display for RowOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowOrder::Input => write!(f, "input"),
            RowOrder::Grouped => write!(f, "grouped"),
        }
    }
}
