use kira_orthology::config::{
    ConfigFile, ConfigLoader, ConfigOverrides, PipelineConfig, SpeciesEntry, SpeciesEntryObject,
};
use kira_orthology::crossref::{augment_with_entrez, join_warning};
use kira_orthology::table::{Cell, Table};

fn table(columns: &[&str], rows: Vec<Vec<Cell>>) -> Table {
    Table::from_rows(columns.iter().map(|c| c.to_string()).collect(), rows).unwrap()
}

fn config() -> PipelineConfig {
    ConfigLoader::resolve_config(ConfigFile::default(), ConfigOverrides::default()).unwrap()
}

fn homology(rows: Vec<Vec<Cell>>) -> Table {
    table(
        &[
            "ensembl_gene_id",
            "dmelanogaster_homolog_ensembl_gene",
            "dmelanogaster_homolog_associated_gene_name",
            "dmelanogaster_homolog_orthology_type",
            "dmelanogaster_homolog_orthology_confidence",
        ],
        rows,
    )
}

fn homology_row(worm: &str, fly: Option<&str>, name: Option<&str>, kind: Option<&str>) -> Vec<Cell> {
    vec![
        Cell::text(worm),
        fly.into(),
        name.into(),
        kind.into(),
        kind.map(|_| Cell::Integer(1)).unwrap_or(Cell::Null),
    ]
}

#[test]
fn adds_both_species_entrez_columns() {
    let config = config();
    let homology = homology(vec![homology_row(
        "WBGene00000898",
        Some("FBgn0283499"),
        Some("InR"),
        Some("ortholog_one2one"),
    )]);
    let worm = table(
        &["celeg_ensembl_id", "celeg_entrez_id"],
        vec![vec![Cell::text("WBGene00000898"), Cell::Integer(175410)]],
    );
    let fly = table(
        &["dmelanogaster_ensembl_id", "dmelanogaster_entrez_id"],
        vec![vec![Cell::text("FBgn0283499"), Cell::Integer(42549)]],
    );

    let augmented = augment_with_entrez(&homology, &worm, &fly, &config).unwrap();
    assert_eq!(augmented.len(), 1);
    assert_eq!(
        &augmented.columns()[5..],
        [
            "celeg_ensembl_id",
            "celeg_entrez_id",
            "dmelanogaster_ensembl_id",
            "dmelanogaster_entrez_id"
        ]
    );
    assert_eq!(augmented.cell(0, "celeg_entrez_id").unwrap(), &Cell::Integer(175410));
    assert_eq!(
        augmented.cell(0, "dmelanogaster_entrez_id").unwrap(),
        &Cell::Integer(42549)
    );
}

#[test]
fn unmatched_homology_rows_survive_with_null_entrez() {
    let config = config();
    let homology = homology(vec![
        homology_row("WBGene1", None, None, None),
        homology_row("WBGene2", Some("FBgn2"), Some("foo"), Some("ortholog_one2one")),
    ]);
    let worm = table(&["celeg_ensembl_id", "celeg_entrez_id"], vec![]);
    let fly = table(&["dmelanogaster_ensembl_id", "dmelanogaster_entrez_id"], vec![]);

    let augmented = augment_with_entrez(&homology, &worm, &fly, &config).unwrap();
    assert_eq!(augmented.len(), 2);
    assert!(augmented.column("celeg_entrez_id").unwrap().all(Cell::is_null));
    assert!(
        augmented
            .column("dmelanogaster_entrez_id")
            .unwrap()
            .all(Cell::is_null)
    );
}

#[test]
fn multiple_entrez_ids_multiply_rows() {
    let config = config();
    let homology = homology(vec![homology_row(
        "WBGene1",
        Some("FBgn1"),
        Some("foo"),
        Some("ortholog_one2many"),
    )]);
    let worm = table(
        &["celeg_ensembl_id", "celeg_entrez_id"],
        vec![
            vec![Cell::text("WBGene1"), Cell::Integer(1)],
            vec![Cell::text("WBGene1"), Cell::Integer(2)],
        ],
    );
    let fly = table(
        &["dmelanogaster_ensembl_id", "dmelanogaster_entrez_id"],
        vec![
            vec![Cell::text("FBgn1"), Cell::Integer(10)],
            vec![Cell::text("FBgn1"), Cell::Integer(20)],
        ],
    );

    let augmented = augment_with_entrez(&homology, &worm, &fly, &config).unwrap();
    assert_eq!(augmented.len(), 4);
    assert_eq!(
        augmented.integers("celeg_entrez_id").unwrap(),
        vec![Some(1), Some(1), Some(2), Some(2)]
    );
    assert_eq!(
        augmented.integers("dmelanogaster_entrez_id").unwrap(),
        vec![Some(10), Some(20), Some(10), Some(20)]
    );
}

#[test]
fn empty_homology_table_stays_empty() {
    let config = config();
    let worm = table(
        &["celeg_ensembl_id", "celeg_entrez_id"],
        vec![vec![Cell::text("WBGene1"), Cell::Integer(1)]],
    );
    let fly = table(&["dmelanogaster_ensembl_id", "dmelanogaster_entrez_id"], vec![]);

    let augmented = augment_with_entrez(&homology(vec![]), &worm, &fly, &config).unwrap();
    assert!(augmented.is_empty());
    assert!(augmented.has_column("celeg_entrez_id"));
}

#[test]
fn swapped_species_keep_their_own_columns() {
    let config = ConfigLoader::resolve_config(
        ConfigFile {
            reference: Some(SpeciesEntry::Detailed(SpeciesEntryObject {
                dataset: "dmelanogaster_gene_ensembl".to_string(),
                prefix: Some("dmelanogaster".to_string()),
            })),
            target: Some(SpeciesEntry::Detailed(SpeciesEntryObject {
                dataset: "celegans_gene_ensembl".to_string(),
                prefix: Some("celeg".to_string()),
            })),
            ..ConfigFile::default()
        },
        ConfigOverrides::default(),
    )
    .unwrap();
    let homology = table(
        &[
            "ensembl_gene_id",
            "celegans_homolog_ensembl_gene",
            "celegans_homolog_associated_gene_name",
            "celegans_homolog_orthology_type",
            "celegans_homolog_orthology_confidence",
        ],
        vec![vec![
            Cell::text("FBgn0283499"),
            Cell::text("WBGene00000898"),
            Cell::text("daf-2"),
            Cell::text("ortholog_one2one"),
            Cell::Integer(1),
        ]],
    );
    let fly = table(
        &["dmelanogaster_ensembl_id", "dmelanogaster_entrez_id"],
        vec![vec![Cell::text("FBgn0283499"), Cell::Integer(42549)]],
    );
    let worm = table(
        &["celeg_ensembl_id", "celeg_entrez_id"],
        vec![vec![Cell::text("WBGene00000898"), Cell::Integer(175410)]],
    );

    let augmented = augment_with_entrez(&homology, &fly, &worm, &config).unwrap();
    assert_eq!(augmented.cell(0, "celeg_entrez_id").unwrap(), &Cell::Integer(175410));
    assert_eq!(
        augmented.cell(0, "dmelanogaster_entrez_id").unwrap(),
        &Cell::Integer(42549)
    );
    assert!(!augmented.columns().iter().any(|c| c.ends_with("_y")));
}

#[test]
fn degenerate_joins_are_described() {
    assert_eq!(
        join_warning("entrez", 0, 0).as_deref(),
        Some("entrez join produced no rows (0 in)")
    );
    assert_eq!(
        join_warning("orthology", 2, 3).as_deref(),
        Some("orthology join multiplied rows: 2 in, 3 out")
    );
    assert_eq!(join_warning("entrez", 4, 4), None);
}

#[test]
fn empty_augmented_table_is_flagged() {
    let config = config();
    let empty = table(&["celeg_ensembl_id", "celeg_entrez_id"], vec![]);
    let fly = table(&["dmelanogaster_ensembl_id", "dmelanogaster_entrez_id"], vec![]);
    let homology = homology(vec![]);

    let augmented = augment_with_entrez(&homology, &empty, &fly, &config).unwrap();
    assert!(augmented.is_empty());
    assert!(join_warning("entrez", homology.len(), augmented.len()).is_some());
}
