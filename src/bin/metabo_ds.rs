use std::fs::File;
use std::io;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use metabo_datasets::config::ConfigLoader;
use metabo_datasets::domain::ArtifactKind;
use metabo_datasets::error::MetaboError;
use metabo_datasets::output::{JsonOutput, TextOutput};
use metabo_datasets::pipeline::Pipeline;
use metabo_datasets::repository::Deadline;

#[derive(Parser)]
#[command(name = "metabo-ds")]
#[command(about = "Fetch, cache and summarize public metabolomics datasets")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Show a dataset, fetching it on first access")]
    Dataset(DatasetArgs),
    #[command(about = "Fetch a dataset into the cache")]
    Fetch(FetchArgs),
    #[command(about = "List cached datasets")]
    List,
    #[command(about = "Write a cached artifact to stdout or a file")]
    Artifact(ArtifactArgs),
    #[command(about = "List supported repositories")]
    Repositories,
}

#[derive(Args)]
struct DatasetArgs {
    accession: String,

    #[arg(long)]
    timeout_secs: Option<u64>,

    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct FetchArgs {
    accession: String,

    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[derive(Args)]
struct ArtifactArgs {
    accession: String,

    #[arg(long, value_enum, default_value_t = ArtifactKind::Metadata)]
    kind: ArtifactKind,

    #[arg(long)]
    output: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<MetaboError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &MetaboError) -> u8 {
    match error {
        MetaboError::DatasetNotFound(_)
        | MetaboError::ArtifactNotFound(_)
        | MetaboError::InvalidAccession(_) => 2,
        error if error.is_fetch_error() => 3,
        _ => 1,
    }
}

fn deadline(timeout_secs: Option<u64>) -> Deadline {
    timeout_secs.map_or_else(Deadline::none, |secs| {
        Deadline::after(Duration::from_secs(secs))
    })
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Repositories = cli.command {
        return JsonOutput::print_repositories().into_diagnostic();
    }

    let settings = ConfigLoader::resolve(cli.config.as_deref())?;
    let pipeline = Pipeline::from_settings(settings)?;

    match cli.command {
        Commands::Dataset(args) => {
            let record = match args.timeout_secs {
                Some(secs) => pipeline.get_dataset_within(&args.accession, Duration::from_secs(secs)),
                None => pipeline.get_dataset(&args.accession),
            }?;
            if args.json {
                JsonOutput::print_record(&record).into_diagnostic()
            } else {
                TextOutput::print_record(&record).into_diagnostic()
            }
        }
        Commands::Fetch(args) => {
            let report = pipeline.fetch_only(&args.accession, deadline(args.timeout_secs))?;
            eprintln!("fetched {} file(s) for {}", report.files.len(), args.accession.trim());
            for file in report.files {
                println!("{file}");
            }
            Ok(())
        }
        Commands::List => {
            let manifests = pipeline.list_cached()?;
            JsonOutput::print_cached(&manifests).into_diagnostic()
        }
        Commands::Artifact(args) => {
            let (name, mut file) = pipeline.open_artifact(&args.accession, args.kind)?;
            match args.output {
                Some(path) => {
                    let mut target = File::create(&path).into_diagnostic()?;
                    io::copy(&mut file, &mut target).into_diagnostic()?;
                    eprintln!("wrote {name} to {path}");
                }
                None => {
                    io::copy(&mut file, &mut io::stdout().lock()).into_diagnostic()?;
                }
            }
            Ok(())
        }
        Commands::Repositories => Ok(()),
    }
}
