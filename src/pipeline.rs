use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

use crate::annotate::annotate;
use crate::biomart::BiomartClient;
use crate::config::PipelineConfig;
use crate::crossref::{augment_with_entrez, fetch_cross_reference, join_warning};
use crate::error::KiraError;
use crate::homology::fetch_homology;
use crate::store::{RunDirectory, read_table};
use crate::table::Table;

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub input_rows: usize,
    pub resolvable_rows: usize,
    pub unresolved_rows: usize,
    pub homology_rows: usize,
    pub augmented_rows: usize,
    pub output_rows: usize,
    pub output_path: String,
    pub homology_lookup_path: String,
    pub cross_reference_paths: Vec<String>,
    /// Joins that produced no rows or multiplied rows.
    pub warnings: Vec<String>,
    pub finished_at: String,
    pub elapsed_ms: u128,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

struct Lookups {
    homology: Table,
    reference_xref: Table,
    target_xref: Table,
}

pub struct Pipeline<C: BiomartClient> {
    config: PipelineConfig,
    client: C,
}

impl<C: BiomartClient> Pipeline<C> {
    pub fn new(config: PipelineConfig, client: C) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self, sink: &dyn ProgressSink) -> Result<RunSummary, KiraError> {
        let started = Instant::now();
        let config = &self.config;

        emit(sink, format!("phase=Prepare; recreating {}", config.results_dir));
        let run_dir = RunDirectory::recreate(&config.results_dir)?;

        emit(sink, format!("phase=Prepare; reading {}", config.input));
        let input = read_table(&config.input)?;
        input.column_index(&config.entrez_column)?;
        info!(path = %config.input, rows = input.len(), "input table loaded");

        let lookups = if config.parallel_fetch {
            self.fetch_parallel(sink, &run_dir)?
        } else {
            self.fetch_sequential(sink, &run_dir)?
        };

        emit(sink, "phase=Join; adding entrez ids to homology lookup".to_string());
        let augmented = augment_with_entrez(
            &lookups.homology,
            &lookups.reference_xref,
            &lookups.target_xref,
            config,
        )?;
        let mut warnings = Vec::new();
        warn_join(
            sink,
            &mut warnings,
            "Join",
            join_warning("entrez", lookups.homology.len(), augmented.len()),
        );
        let homology_path = config.homology_lookup_path();
        run_dir.write_lookup(&homology_path, &augmented)?;

        emit(sink, "phase=Annotate; joining input onto lookup".to_string());
        let annotation = annotate(
            &input,
            &augmented,
            &config.entrez_column,
            &config.reference.prefix.entrez_column(),
            config.row_order,
        )?;
        warn_join(
            sink,
            &mut warnings,
            "Annotate",
            join_warning("orthology", annotation.resolvable, annotation.joined),
        );

        emit(sink, "phase=Store; writing annotated table".to_string());
        let output_path = config.output_path();
        run_dir.write_output(&output_path, &annotation.table)?;
        info!(
            path = %output_path,
            rows = annotation.table.len(),
            "annotated table written"
        );

        let elapsed = started.elapsed();
        sink.event(ProgressEvent {
            message: format!("phase=Store; done ({} rows)", annotation.table.len()),
            elapsed: Some(elapsed),
        });

        Ok(RunSummary {
            input_rows: input.len(),
            resolvable_rows: annotation.resolvable,
            unresolved_rows: annotation.unresolved,
            homology_rows: lookups.homology.len(),
            augmented_rows: augmented.len(),
            output_rows: annotation.table.len(),
            output_path: output_path.to_string(),
            homology_lookup_path: homology_path.to_string(),
            cross_reference_paths: vec![
                config.cross_reference_path(&config.reference).to_string(),
                config.cross_reference_path(&config.target).to_string(),
            ],
            warnings,
            finished_at: chrono::Utc::now().to_rfc3339(),
            elapsed_ms: elapsed.as_millis(),
        })
    }

    fn fetch_sequential(
        &self,
        sink: &dyn ProgressSink,
        run_dir: &RunDirectory,
    ) -> Result<Lookups, KiraError> {
        let config = &self.config;

        emit(sink, "phase=Fetch; homology lookup".to_string());
        let homology = timed(sink, &config.reference.dataset.to_string(), || {
            fetch_homology(&self.client, config)
        })?;
        run_dir.write_lookup(&config.homology_lookup_path(), &homology)?;

        emit(sink, "phase=Fetch; cross-references".to_string());
        let reference_xref = timed(sink, &config.reference.dataset.to_string(), || {
            fetch_cross_reference(&self.client, &config.reference, config)
        })?;
        run_dir.write_lookup(&config.cross_reference_path(&config.reference), &reference_xref)?;
        let target_xref = timed(sink, &config.target.dataset.to_string(), || {
            fetch_cross_reference(&self.client, &config.target, config)
        })?;
        run_dir.write_lookup(&config.cross_reference_path(&config.target), &target_xref)?;

        Ok(Lookups {
            homology,
            reference_xref,
            target_xref,
        })
    }

    /// Issues the three service queries at once and waits for all of them
    /// before anything is persisted or joined.
    fn fetch_parallel(
        &self,
        sink: &dyn ProgressSink,
        run_dir: &RunDirectory,
    ) -> Result<Lookups, KiraError> {
        let config = &self.config;
        let client = &self.client;

        emit(sink, "phase=Fetch; homology lookup and cross-references".to_string());
        emit(sink, "biomart.request x3".to_string());
        let start = Instant::now();
        let (homology, reference_xref, target_xref) = thread::scope(|scope| {
            let homology = scope.spawn(|| fetch_homology(client, config));
            let reference = scope.spawn(|| fetch_cross_reference(client, &config.reference, config));
            let target = scope.spawn(|| fetch_cross_reference(client, &config.target, config));
            (join_fetch(homology), join_fetch(reference), join_fetch(target))
        });
        emit(
            sink,
            format!("biomart.response latency_ms={}", start.elapsed().as_millis()),
        );

        let homology = homology?;
        run_dir.write_lookup(&config.homology_lookup_path(), &homology)?;
        let reference_xref = reference_xref?;
        run_dir.write_lookup(&config.cross_reference_path(&config.reference), &reference_xref)?;
        let target_xref = target_xref?;
        run_dir.write_lookup(&config.cross_reference_path(&config.target), &target_xref)?;

        Ok(Lookups {
            homology,
            reference_xref,
            target_xref,
        })
    }
}

fn join_fetch(
    handle: thread::ScopedJoinHandle<'_, Result<Table, KiraError>>,
) -> Result<Table, KiraError> {
    handle
        .join()
        .unwrap_or_else(|_| Err(KiraError::BiomartHttp("fetch worker panicked".to_string())))
}

fn timed<F>(sink: &dyn ProgressSink, dataset: &str, fetch: F) -> Result<Table, KiraError>
where
    F: FnOnce() -> Result<Table, KiraError>,
{
    emit(sink, format!("biomart.request dataset={dataset}"));
    let start = Instant::now();
    let table = fetch()?;
    emit(
        sink,
        format!(
            "biomart.response latency_ms={} rows={}",
            start.elapsed().as_millis(),
            table.len()
        ),
    );
    Ok(table)
}

fn warn_join(
    sink: &dyn ProgressSink,
    warnings: &mut Vec<String>,
    phase: &str,
    warning: Option<String>,
) {
    if let Some(warning) = warning {
        emit(sink, format!("phase={phase}; warning: {warning}"));
        warnings.push(warning);
    }
}

fn emit(sink: &dyn ProgressSink, message: String) {
    sink.event(ProgressEvent {
        message,
        elapsed: None,
    });
}
