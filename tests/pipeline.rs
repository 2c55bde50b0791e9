use std::fs;
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use kira_orthology::biomart::BiomartClient;
use kira_orthology::config::{ConfigFile, ConfigLoader, ConfigOverrides, PipelineConfig};
use kira_orthology::domain::{AttributeName, DatasetName};
use kira_orthology::error::KiraError;
use kira_orthology::output::JsonOutput;
use kira_orthology::pipeline::{Pipeline, ProgressEvent, ProgressSink};
use kira_orthology::table::{Cell, Table};

const INPUT: &str = "\
GenAge ID\tSymbol\tEntrez Gene ID\tLongevity Influence
1\tdaf-2\t175410\tPro-Longevity
2\tage-1\t172470\tAnti-Longevity
3\tunknown-1\t\tPro-Longevity
";

struct MockMart {
    fail_target: bool,
    empty_homology: bool,
    queries: Mutex<Vec<String>>,
}

impl MockMart {
    fn new() -> Self {
        Self {
            fail_target: false,
            empty_homology: false,
            queries: Mutex::new(Vec::new()),
        }
    }
}

fn table(columns: &[AttributeName], rows: Vec<Vec<Cell>>) -> Table {
    Table::from_rows(
        columns.iter().map(|c| c.as_str().to_string()).collect(),
        rows,
    )
    .unwrap()
}

impl BiomartClient for MockMart {
    fn query(
        &self,
        dataset: &DatasetName,
        attributes: &[AttributeName],
    ) -> Result<Table, KiraError> {
        self.queries.lock().unwrap().push(dataset.to_string());
        match (dataset.as_str(), attributes.len()) {
            ("celegans_gene_ensembl", 5) if self.empty_homology => Ok(table(attributes, vec![])),
            ("celegans_gene_ensembl", 5) => Ok(table(
                attributes,
                vec![
                    vec![
                        Cell::text("WBGene00000898"),
                        Cell::text("FBgn0283499"),
                        Cell::text("InR"),
                        Cell::text("ortholog_one2one"),
                        Cell::Integer(1),
                    ],
                    vec![
                        Cell::text("WBGene00000090"),
                        Cell::text("FBgn0015278"),
                        Cell::text("Pi3K92E"),
                        Cell::text("ortholog_one2many"),
                        Cell::Integer(1),
                    ],
                    vec![
                        Cell::text("WBGene00000090"),
                        Cell::text("FBgn0015277"),
                        Cell::text("Pi3K68D"),
                        Cell::text("ortholog_one2many"),
                        Cell::Integer(0),
                    ],
                    vec![
                        Cell::text("WBGene00009999"),
                        Cell::Null,
                        Cell::Null,
                        Cell::Null,
                        Cell::Null,
                    ],
                ],
            )),
            ("celegans_gene_ensembl", 2) => Ok(table(
                attributes,
                vec![
                    vec![Cell::text("WBGene00000898"), Cell::Integer(175410)],
                    vec![Cell::text("WBGene00000090"), Cell::Integer(172470)],
                    vec![Cell::text("WBGene00009999"), Cell::Null],
                ],
            )),
            ("dmelanogaster_gene_ensembl", 2) if self.fail_target => {
                Err(KiraError::BiomartHttp("connection refused".to_string()))
            }
            ("dmelanogaster_gene_ensembl", 2) => Ok(table(
                attributes,
                vec![
                    vec![Cell::text("FBgn0283499"), Cell::Integer(42549)],
                    vec![Cell::text("FBgn0015278"), Cell::Integer(41957)],
                    vec![Cell::text("FBgn0015277"), Cell::Integer(39498)],
                ],
            )),
            _ => Err(KiraError::BiomartQuery {
                dataset: dataset.to_string(),
                message: "unexpected query".to_string(),
            }),
        }
    }
}

#[derive(Default)]
struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.messages.lock().unwrap().push(event.message);
    }
}

fn setup(parallel: bool) -> (tempfile::TempDir, PipelineConfig) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let input = root.join("genage_Celegans_allgenes_proantilongevity.tsv");
    fs::write(input.as_std_path(), INPUT).unwrap();
    let config = ConfigLoader::resolve_config(
        ConfigFile::default(),
        ConfigOverrides {
            input: Some(input.to_string()),
            results_dir: Some(root.join("results").to_string()),
            parallel_fetch: Some(parallel),
            ..ConfigOverrides::default()
        },
    )
    .unwrap();
    (temp, config)
}

#[test]
fn full_run_writes_annotated_table_and_lookups() {
    let (_temp, config) = setup(false);
    let pipeline = Pipeline::new(config.clone(), MockMart::new());
    let sink = RecordingSink::default();

    let summary = pipeline.run(&sink).unwrap();
    assert_eq!(summary.input_rows, 3);
    assert_eq!(summary.unresolved_rows, 1);
    assert_eq!(summary.homology_rows, 4);
    assert_eq!(summary.augmented_rows, 4);
    assert_eq!(summary.output_rows, 4);

    let output = fs::read_to_string(config.output_path().as_std_path()).unwrap();
    let mut lines = output.lines();
    assert_eq!(
        lines.next().unwrap(),
        "GenAge ID\tSymbol\tEntrez Gene ID\tLongevity Influence\t\
         ensembl_gene_id\tdmelanogaster_homolog_ensembl_gene\t\
         dmelanogaster_homolog_associated_gene_name\tdmelanogaster_homolog_orthology_type\t\
         dmelanogaster_homolog_orthology_confidence\tceleg_ensembl_id\tceleg_entrez_id\t\
         dmelanogaster_ensembl_id\tdmelanogaster_entrez_id"
    );
    let rows = lines.collect::<Vec<_>>();
    assert_eq!(rows.len(), 4);
    assert!(rows[0].starts_with("1\tdaf-2\t175410\tPro-Longevity\tWBGene00000898\tFBgn0283499\tInR"));
    assert!(rows[0].ends_with("\t42549"));
    assert!(rows[1].contains("Pi3K92E"));
    assert!(rows[2].contains("Pi3K68D"));
    assert_eq!(rows[3], "3\tunknown-1\t\tPro-Longevity\t\t\t\t\t\t\t\t\t");

    let lookup = fs::read_to_string(config.homology_lookup_path().as_std_path()).unwrap();
    assert!(lookup.starts_with("\tensembl_gene_id\t"));
    assert!(lookup.lines().next().unwrap().ends_with("dmelanogaster_entrez_id"));
    assert!(config.cross_reference_path(&config.reference).as_std_path().exists());
    assert!(config.cross_reference_path(&config.target).as_std_path().exists());

    assert_eq!(
        summary.warnings,
        vec!["orthology join multiplied rows: 2 in, 3 out".to_string()]
    );

    let messages = sink.messages.lock().unwrap();
    assert!(messages.iter().any(|m| m.starts_with("phase=Join;")));
    assert!(messages.contains(
        &"phase=Annotate; warning: orthology join multiplied rows: 2 in, 3 out".to_string()
    ));
    assert_eq!(
        messages
            .iter()
            .filter(|m| m.starts_with("biomart.request"))
            .count(),
        3
    );
}

#[test]
fn repeated_runs_are_byte_identical() {
    let (_temp, config) = setup(false);
    let pipeline = Pipeline::new(config.clone(), MockMart::new());

    pipeline.run(&JsonOutput).unwrap();
    let first = fs::read(config.output_path().as_std_path()).unwrap();
    let first_lookup = fs::read(config.homology_lookup_path().as_std_path()).unwrap();
    pipeline.run(&JsonOutput).unwrap();
    let second = fs::read(config.output_path().as_std_path()).unwrap();
    let second_lookup = fs::read(config.homology_lookup_path().as_std_path()).unwrap();

    assert_eq!(first, second);
    assert_eq!(first_lookup, second_lookup);
}

#[test]
fn parallel_fetch_matches_sequential_output() {
    let (_temp, sequential) = setup(false);
    Pipeline::new(sequential.clone(), MockMart::new())
        .run(&JsonOutput)
        .unwrap();
    let expected = fs::read(sequential.output_path().as_std_path()).unwrap();

    let (_temp_parallel, parallel) = setup(true);
    let client = MockMart::new();
    let pipeline = Pipeline::new(parallel.clone(), client);
    pipeline.run(&JsonOutput).unwrap();
    let actual = fs::read(parallel.output_path().as_std_path()).unwrap();

    assert_eq!(expected, actual);
}

#[test]
fn service_failure_aborts_but_keeps_base_homology_snapshot() {
    let (_temp, config) = setup(false);
    let client = MockMart {
        fail_target: true,
        ..MockMart::new()
    };
    let pipeline = Pipeline::new(config.clone(), client);

    let err = pipeline.run(&JsonOutput).unwrap_err();
    assert_matches!(err, KiraError::BiomartHttp(_));
    assert!(!config.output_path().as_std_path().exists());

    let snapshot = fs::read_to_string(config.homology_lookup_path().as_std_path()).unwrap();
    let header = snapshot.lines().next().unwrap();
    assert!(header.ends_with("dmelanogaster_homolog_orthology_confidence"));
    assert_eq!(snapshot.lines().count(), 5);
}

#[test]
fn missing_entrez_column_is_reported_before_any_query() {
    let (_temp, mut config) = setup(false);
    config.entrez_column = "Entrez".to_string();
    let client = MockMart::new();
    let pipeline = Pipeline::new(config, client);

    let err = pipeline.run(&JsonOutput).unwrap_err();
    assert_matches!(err, KiraError::MissingColumn(name) if name == "Entrez");
}

#[test]
fn previous_results_are_removed() {
    let (_temp, config) = setup(false);
    fs::create_dir_all(config.results_dir.as_std_path()).unwrap();
    let stale = config.results_dir.join("stale.tsv");
    fs::write(stale.as_std_path(), "old").unwrap();

    Pipeline::new(config, MockMart::new())
        .run(&JsonOutput)
        .unwrap();
    assert!(!stale.as_std_path().exists());
}

#[test]
fn empty_homology_join_is_reported_as_warning() {
    let (_temp, config) = setup(false);
    let client = MockMart {
        empty_homology: true,
        ..MockMart::new()
    };
    let sink = RecordingSink::default();

    let summary = Pipeline::new(config, client).run(&sink).unwrap();
    assert_eq!(summary.augmented_rows, 0);
    assert_eq!(summary.output_rows, 3);
    assert_eq!(
        summary.warnings,
        vec!["entrez join produced no rows (0 in)".to_string()]
    );

    let messages = sink.messages.lock().unwrap();
    assert!(messages.contains(
        &"phase=Join; warning: entrez join produced no rows (0 in)".to_string()
    ));
}
