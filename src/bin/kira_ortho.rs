use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_orthology::biomart::BiomartHttpClient;
use kira_orthology::config::{ConfigLoader, ConfigOverrides, PipelineConfig};
use kira_orthology::domain::RowOrder;
use kira_orthology::error::KiraError;
use kira_orthology::output::{JsonOutput, OutputMode};
use kira_orthology::pipeline::Pipeline;
use kira_orthology::tui::Tui;

#[derive(Parser)]
#[command(name = "kira-ortho")]
#[command(about = "Annotate a C. elegans gene table with D. melanogaster orthologs from Ensembl BioMart")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Fetch lookups and write the annotated table")]
    Run(RunArgs),
    #[command(about = "Print the resolved configuration")]
    Config(RunArgs),
}

#[derive(Args, Clone, Default)]
struct RunArgs {
    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    input: Option<String>,

    #[arg(long)]
    results_dir: Option<String>,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    order: Option<RowOrder>,

    #[arg(long)]
    parallel: bool,
}

impl RunArgs {
    fn resolve(&self) -> Result<PipelineConfig, KiraError> {
        let overrides = ConfigOverrides {
            input: self.input.clone(),
            results_dir: self.results_dir.clone(),
            host: self.host.clone(),
            row_order: self.order,
            parallel_fetch: self.parallel.then_some(true),
        };
        ConfigLoader::resolve(self.config.as_deref(), overrides)
    }
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kira) = report.downcast_ref::<KiraError>() {
            return ExitCode::from(map_exit_code(kira));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KiraError) -> u8 {
    match error {
        KiraError::BiomartQuery { .. } | KiraError::MissingColumn(_) => 2,
        KiraError::InputRead { .. } | KiraError::ConfigRead(_) | KiraError::ConfigParse(_) => 2,
        KiraError::InvalidDatasetName(_)
        | KiraError::InvalidAttributeName(_)
        | KiraError::InvalidSpeciesPrefix(_) => 2,
        KiraError::BiomartHttp(_) | KiraError::BiomartStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    // The TUI owns the terminal and shows join warnings itself.
    let default_level = match output_mode {
        OutputMode::NonInteractive => "warn",
        OutputMode::Interactive => "error",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => run_pipeline(args, output_mode),
        Commands::Config(args) => {
            let config = args.resolve().map_err(miette::Report::new)?;
            JsonOutput::print_config(&config).into_diagnostic()
        }
    }
}

fn run_pipeline(args: RunArgs, output_mode: OutputMode) -> miette::Result<()> {
    let config = args.resolve().map_err(miette::Report::new)?;
    let client = BiomartHttpClient::new(&config.host, Duration::from_secs(config.timeout_secs))
        .map_err(miette::Report::new)?;

    match output_mode {
        OutputMode::NonInteractive => {
            let pipeline = Pipeline::new(config, client);
            let summary = pipeline.run(&JsonOutput).map_err(miette::Report::new)?;
            JsonOutput::print_run(&summary).into_diagnostic()?;
            Ok(())
        }
        OutputMode::Interactive => {
            let mut tui = Tui::new(&config);
            let pipeline = Pipeline::new(config, client);
            let summary = tui.run(move |sink| pipeline.run(sink))?;
            tui.finish_run(&summary)?;
            Ok(())
        }
    }
}
