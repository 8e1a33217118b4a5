use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use ro_crate_import::app::{ImportOptions, Importer};
use ro_crate_import::config::{ConfigLoader, ConfigOverrides};
use ro_crate_import::datalab::DatalabHttpClient;
use ro_crate_import::error::ImportError;
use ro_crate_import::loader::CrateLoader;
use ro_crate_import::output::{ConsoleOutput, JsonOutput, OutputMode};

#[derive(Parser)]
#[command(name = "ro-import")]
#[command(about = "Import a MADICES RO-Crate into datalab as a new or linked entry")]
#[command(version, author)]
struct Cli {
    /// RO-Crate directory or .zip archive
    archive: Utf8PathBuf,

    #[arg(long)]
    config: Option<String>,

    /// datalab API base URL
    #[arg(long)]
    api_url: Option<String>,

    /// Profile IRI the crate must conform to
    #[arg(long)]
    profile: Option<String>,

    /// Fail instead of warning when several RepositoryObjects qualify
    #[arg(long)]
    strict: bool,

    /// Validate and plan without contacting datalab
    #[arg(long)]
    dry_run: bool,

    #[arg(long)]
    no_preview: bool,

    #[arg(long)]
    non_interactive: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<ImportError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &ImportError) -> u8 {
    match error {
        ImportError::UnsupportedProfile { .. }
        | ImportError::RepositoryObjectNotFound
        | ImportError::AmbiguousRepositoryObject { .. }
        | ImportError::MissingParentLink(_)
        | ImportError::MissingMetadata(_)
        | ImportError::InvalidArchive(_)
        | ImportError::MissingFile(_)
        | ImportError::InvalidFilePath(_) => 2,
        ImportError::RemoteItemNotFound(_)
        | ImportError::RemoteHttp(_)
        | ImportError::RemoteStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let config = ConfigLoader::resolve(
        cli.config.as_deref(),
        ConfigOverrides {
            api_url: cli.api_url,
            profile: cli.profile,
            strict: cli.strict,
        },
    )?;

    let archive = CrateLoader::open(&cli.archive)?;
    let api_key = config.api_key();
    let client = DatalabHttpClient::new(&config.api_url, api_key.as_deref(), config.timeout)?;
    let importer = Importer::from_config(client, &config);
    let options = ImportOptions {
        dry_run: cli.dry_run,
        preview: !cli.no_preview,
    };

    match output_mode {
        OutputMode::NonInteractive => {
            let result = importer.import(&archive, options, &JsonOutput)?;
            JsonOutput::print_import(&result).into_diagnostic()?;
        }
        OutputMode::Interactive => {
            let console = ConsoleOutput::new();
            let result = importer.import(&archive, options, &console)?;
            console.print_import(&result);
        }
    }
    Ok(())
}
