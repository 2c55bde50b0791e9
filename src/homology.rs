use tracing::info;

use crate::biomart::BiomartClient;
use crate::config::PipelineConfig;
use crate::error::KiraError;
use crate::table::Table;

/// Fetches the reference-species homology table: the reference Ensembl gene
/// ID followed by the configured target-species ortholog attributes.
///
/// Rows are kept as delivered. Genes with several orthologs appear once per
/// ortholog and genes without one carry null ortholog cells.
pub fn fetch_homology(
    client: &dyn BiomartClient,
    config: &PipelineConfig,
) -> Result<Table, KiraError> {
    let attributes = config.homology_query();
    let table = client.query(&config.reference.dataset, &attributes)?;
    let without_ortholog = table
        .column(config.ortholog_ensembl_column())?
        .filter(|cell| cell.is_null())
        .count();
    info!(
        dataset = %config.reference.dataset,
        rows = table.len(),
        without_ortholog,
        "homology lookup fetched"
    );
    Ok(table)
}
