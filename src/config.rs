use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::{AttributeName, DatasetName, RowOrder, Species, SpeciesPrefix};
use crate::error::KiraError;

pub const DEFAULT_CONFIG_FILE: &str = "kira-ortho.json";
pub const DEFAULT_HOST: &str = "http://www.ensembl.org";
pub const DEFAULT_INPUT: &str = "genage_Celegans_allgenes_proantilongevity.tsv";
pub const DEFAULT_RESULTS_DIR: &str = "Celegans_to_Dmelanogaster_Homology";
pub const DEFAULT_ENTREZ_COLUMN: &str = "Entrez Gene ID";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub reference: Option<SpeciesEntry>,
    #[serde(default)]
    pub target: Option<SpeciesEntry>,
    #[serde(default)]
    pub ensembl_attribute: Option<String>,
    #[serde(default)]
    pub entrez_attribute: Option<String>,
    #[serde(default)]
    pub homolog_attributes: Option<Vec<String>>,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub entrez_column: Option<String>,
    #[serde(default)]
    pub results_dir: Option<String>,
    #[serde(default)]
    pub row_order: Option<RowOrder>,
    #[serde(default)]
    pub parallel_fetch: Option<bool>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SpeciesEntry {
    Shorthand(String),
    Detailed(SpeciesEntryObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SpeciesEntryObject {
    pub dataset: String,
    #[serde(default)]
    pub prefix: Option<String>,
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub input: Option<String>,
    pub results_dir: Option<String>,
    pub host: Option<String>,
    pub row_order: Option<RowOrder>,
    pub parallel_fetch: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineConfig {
    pub host: String,
    pub reference: Species,
    pub target: Species,
    pub ensembl_attribute: AttributeName,
    pub entrez_attribute: AttributeName,
    /// Target-species ortholog attributes: gene ID, gene name, orthology type,
    /// confidence. The first one must be the ortholog Ensembl gene ID.
    pub homolog_attributes: Vec<AttributeName>,
    pub input: Utf8PathBuf,
    pub entrez_column: String,
    pub results_dir: Utf8PathBuf,
    pub row_order: RowOrder,
    pub parallel_fetch: bool,
    pub timeout_secs: u64,
}

impl PipelineConfig {
    /// Attributes requested for the homology lookup, reference Ensembl ID first.
    pub fn homology_query(&self) -> Vec<AttributeName> {
        let mut attributes = vec![self.ensembl_attribute.clone()];
        attributes.extend(self.homolog_attributes.iter().cloned());
        attributes
    }

    pub fn cross_reference_query(&self) -> Vec<AttributeName> {
        vec![self.ensembl_attribute.clone(), self.entrez_attribute.clone()]
    }

    /// Homology table column holding the reference-species Ensembl ID.
    pub fn reference_ensembl_column(&self) -> &str {
        self.ensembl_attribute.as_str()
    }

    /// Homology table column holding the target-species ortholog Ensembl ID.
    pub fn ortholog_ensembl_column(&self) -> &str {
        self.homolog_attributes
            .first()
            .map(AttributeName::as_str)
            .unwrap_or_default()
    }

    pub fn output_path(&self) -> Utf8PathBuf {
        let file_name = self.input.file_name().unwrap_or(self.input.as_str());
        let stem = file_name.split('.').next().unwrap_or(file_name);
        self.results_dir.join(format!("{stem}_with_Homologs.tsv"))
    }

    pub fn homology_lookup_path(&self) -> Utf8PathBuf {
        self.results_dir.join(format!(
            "{}_{}_HOMOLOGY_LOOKUP.tsv",
            self.reference.artifact_tag(),
            self.target.artifact_tag()
        ))
    }

    pub fn cross_reference_path(&self, species: &Species) -> Utf8PathBuf {
        self.results_dir
            .join(format!("{}_ENS_ENTREZ_LOOKUP.tsv", species.artifact_tag()))
    }
}

pub fn default_homolog_attributes(target: &DatasetName) -> Vec<String> {
    let species = target.species();
    [
        "homolog_ensembl_gene",
        "homolog_associated_gene_name",
        "homolog_orthology_type",
        "homolog_orthology_confidence",
    ]
    .iter()
    .map(|suffix| format!("{species}_{suffix}"))
    .collect()
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(
        path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<PipelineConfig, KiraError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(ConfigFile::default(), overrides);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| KiraError::ConfigRead(config_path.clone()))?;
        let config: ConfigFile = serde_json::from_str(&content)
            .map_err(|err| KiraError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config, overrides)
    }

    pub fn resolve_config(
        config: ConfigFile,
        overrides: ConfigOverrides,
    ) -> Result<PipelineConfig, KiraError> {
        let reference = resolve_species(config.reference, "celegans_gene_ensembl", "celeg")?;
        let target = resolve_species(
            config.target,
            "dmelanogaster_gene_ensembl",
            "dmelanogaster",
        )?;
        if reference.prefix == target.prefix {
            return Err(KiraError::InvalidSpeciesPrefix(format!(
                "reference and target share prefix {}",
                reference.prefix
            )));
        }

        let homolog_attributes = config
            .homolog_attributes
            .unwrap_or_else(|| default_homolog_attributes(&target.dataset))
            .iter()
            .map(|value| value.parse::<AttributeName>())
            .collect::<Result<Vec<_>, _>>()?;
        if homolog_attributes.is_empty() {
            return Err(KiraError::InvalidAttributeName(
                "homolog_attributes must not be empty".to_string(),
            ));
        }

        let input = overrides
            .input
            .or(config.input)
            .unwrap_or_else(|| DEFAULT_INPUT.to_string());
        let results_dir = overrides
            .results_dir
            .or(config.results_dir)
            .unwrap_or_else(|| DEFAULT_RESULTS_DIR.to_string());
        let host = overrides
            .host
            .or(config.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        Ok(PipelineConfig {
            host: host.trim_end_matches('/').to_string(),
            reference,
            target,
            ensembl_attribute: config
                .ensembl_attribute
                .as_deref()
                .unwrap_or("ensembl_gene_id")
                .parse()?,
            entrez_attribute: config
                .entrez_attribute
                .as_deref()
                .unwrap_or("entrezgene_id")
                .parse()?,
            homolog_attributes,
            input: Utf8PathBuf::from(input),
            entrez_column: config
                .entrez_column
                .unwrap_or_else(|| DEFAULT_ENTREZ_COLUMN.to_string()),
            results_dir: Utf8PathBuf::from(results_dir),
            row_order: overrides
                .row_order
                .or(config.row_order)
                .unwrap_or_default(),
            parallel_fetch: overrides
                .parallel_fetch
                .or(config.parallel_fetch)
                .unwrap_or(false),
            timeout_secs: config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        })
    }
}

fn resolve_species(
    entry: Option<SpeciesEntry>,
    default_dataset: &str,
    default_prefix: &str,
) -> Result<Species, KiraError> {
    let (dataset, prefix) = match entry {
        None => (default_dataset.to_string(), Some(default_prefix.to_string())),
        Some(SpeciesEntry::Shorthand(dataset)) => (dataset, None),
        Some(SpeciesEntry::Detailed(object)) => (object.dataset, object.prefix),
    };
    let dataset: DatasetName = dataset.parse()?;
    let prefix: SpeciesPrefix = match prefix {
        Some(prefix) => prefix.parse()?,
        None => dataset.species().parse()?,
    };
    Ok(Species { dataset, prefix })
}
