use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use podcast_enricher::app::App;
use podcast_enricher::config::{ConfigLoader, Credentials, Settings, normalize_base_url};
use podcast_enricher::directory::DirectoryHttpClient;
use podcast_enricher::error::EnricherError;
use podcast_enricher::output::{self, ConsoleProgress, JsonOutput, OutputMode};
use podcast_enricher::store::Store;

#[derive(Parser)]
#[command(name = "podcast-enricher")]
#[command(about = "Match chart podcast titles to Podcast Index feeds and store their details")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Rebuild the Podcasts table from the chart titles (default)")]
    Run(RunArgs),
    #[command(about = "Resolve a single title and print the record without storing it")]
    Resolve(ResolveArgs),
}

#[derive(Args, Default)]
struct RunArgs {
    #[arg(long)]
    database: Option<Utf8PathBuf>,
}

#[derive(Args)]
struct ResolveArgs {
    title: String,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<EnricherError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &EnricherError) -> u8 {
    match error {
        EnricherError::MissingCredentials(_)
        | EnricherError::ConfigRead(_)
        | EnricherError::ConfigParse(_)
        | EnricherError::InvalidSetting(_) => 2,
        EnricherError::Database(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let mut settings = ConfigLoader::resolve(cli.config.as_deref())?;
    if let Some(base_url) = &cli.base_url {
        settings.base_url = normalize_base_url(base_url);
    }
    let credentials = Credentials::from_env()?;

    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => run_pipeline(args, settings, credentials, output_mode),
        Commands::Resolve(args) => run_resolve(args, settings, credentials),
    }
}

fn run_pipeline(
    args: RunArgs,
    mut settings: Settings,
    credentials: Credentials,
    output_mode: OutputMode,
) -> miette::Result<()> {
    if let Some(database) = args.database {
        settings.database_path = database;
    }
    let client = DirectoryHttpClient::new(&settings, credentials)?;
    let store = Store::open(&settings.database_path)?;
    let app = App::new(client, settings);

    match output_mode {
        OutputMode::Interactive => {
            let summary = app.run(store, &ConsoleProgress)?;
            output::print_summary(&summary);
        }
        OutputMode::NonInteractive => {
            let summary = app.run(store, &JsonOutput)?;
            JsonOutput::print_summary(&summary).into_diagnostic()?;
        }
    }
    Ok(())
}

fn run_resolve(
    args: ResolveArgs,
    settings: Settings,
    credentials: Credentials,
) -> miette::Result<()> {
    let client = DirectoryHttpClient::new(&settings, credentials)?;
    let app = App::new(client, settings);
    match app.enrich(&args.title) {
        Ok(enrichment) => JsonOutput::print_enrichment(&enrichment).into_diagnostic(),
        Err(skip) => Err(miette::Report::msg(format!(
            "no record for '{}': {} stage ({})",
            args.title, skip.stage, skip.reason
        ))),
    }
}
