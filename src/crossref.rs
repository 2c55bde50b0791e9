use tracing::{info, warn};

use crate::biomart::BiomartClient;
use crate::config::PipelineConfig;
use crate::domain::Species;
use crate::error::KiraError;
use crate::table::Table;

/// Fetches the Ensembl -> Entrez mapping of one species, with columns renamed
/// to `<prefix>_ensembl_id` / `<prefix>_entrez_id`.
///
/// An Ensembl ID may map to several Entrez IDs or to none; both cases are
/// kept as separate rows and null cells.
pub fn fetch_cross_reference(
    client: &dyn BiomartClient,
    species: &Species,
    config: &PipelineConfig,
) -> Result<Table, KiraError> {
    let table = client.query(&species.dataset, &config.cross_reference_query())?;
    let ensembl = species.prefix.ensembl_column();
    let entrez = species.prefix.entrez_column();
    let table = table.with_columns(&[ensembl.as_str(), entrez.as_str()])?;
    info!(
        dataset = %species.dataset,
        rows = table.len(),
        "ensembl/entrez cross-reference fetched"
    );
    Ok(table)
}

/// Adds both species' Entrez IDs to the homology table.
///
/// Two left joins: the reference mapping on the reference Ensembl ID, then
/// the target mapping on the ortholog Ensembl ID. Every homology row
/// survives; rows repeat when a mapping has several Entrez IDs for a key.
pub fn augment_with_entrez(
    homology: &Table,
    reference_xref: &Table,
    target_xref: &Table,
    config: &PipelineConfig,
) -> Result<Table, KiraError> {
    let with_reference = homology.left_join(
        reference_xref,
        config.reference_ensembl_column(),
        &config.reference.prefix.ensembl_column(),
    )?;
    log_join("reference entrez", homology.len(), with_reference.len());

    let augmented = with_reference.left_join(
        target_xref,
        config.ortholog_ensembl_column(),
        &config.target.prefix.ensembl_column(),
    )?;
    log_join("target entrez", with_reference.len(), augmented.len());

    Ok(augmented)
}

/// Describes a degenerate join: one that produced no rows, or one that
/// produced more rows than went in. Returns `None` for a plain pass-through.
pub fn join_warning(stage: &str, before: usize, after: usize) -> Option<String> {
    if after == 0 {
        Some(format!("{stage} join produced no rows ({before} in)"))
    } else if after > before {
        Some(format!("{stage} join multiplied rows: {before} in, {after} out"))
    } else {
        None
    }
}

pub(crate) fn log_join(stage: &str, before: usize, after: usize) {
    match join_warning(stage, before, after) {
        Some(message) => warn!(stage, before, after, "{message}"),
        None => info!(stage, rows = after, "join complete"),
    }
}
