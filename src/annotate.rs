use tracing::info;

use crate::crossref::log_join;
use crate::domain::RowOrder;
use crate::error::KiraError;
use crate::table::Table;

const ROW_INDEX_COLUMN: &str = "__kira_input_row";

#[derive(Debug, Clone)]
pub struct Annotation {
    pub table: Table,
    pub resolvable: usize,
    pub unresolved: usize,
    /// Rows produced by joining the resolvable partition.
    pub joined: usize,
}

/// Joins the input gene table onto the Entrez-augmented homology table.
///
/// Rows whose `input_key` is null skip the join and come back exactly once
/// with every homology column null. Rows with a key are left-joined on
/// `lookup_key` and may repeat once per ortholog.
pub fn annotate(
    input: &Table,
    lookup: &Table,
    input_key: &str,
    lookup_key: &str,
    order: RowOrder,
) -> Result<Annotation, KiraError> {
    lookup.column_index(lookup_key)?;
    let indexed = match order {
        RowOrder::Input => input.with_row_index(ROW_INDEX_COLUMN)?,
        RowOrder::Grouped => input.clone(),
    };

    let (resolvable, unresolved) = indexed.partition_by(input_key, |cell| !cell.is_null())?;
    info!(
        resolvable = resolvable.len(),
        unresolved = unresolved.len(),
        "input partitioned by entrez id"
    );

    let joined = resolvable.left_join(lookup, input_key, lookup_key)?;
    log_join("orthology", resolvable.len(), joined.len());
    let joined_rows = joined.len();

    let combined = joined.concat(&unresolved);
    let table = match order {
        RowOrder::Input => combined
            .sort_by_integer(ROW_INDEX_COLUMN)?
            .drop_column(ROW_INDEX_COLUMN)?,
        RowOrder::Grouped => combined,
    };

    Ok(Annotation {
        table,
        resolvable: resolvable.len(),
        unresolved: unresolved.len(),
        joined: joined_rows,
    })
}
