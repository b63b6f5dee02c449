//! pdffill CLI - fill `{placeholder}` tokens in PDF templates

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};

use filler::{EngineOptions, GenerationReport, LogObserver, PlaceholderEngine, SubstitutionRequest};

#[derive(Parser)]
#[command(name = "pdffill")]
#[command(version)]
#[command(about = "Fill {placeholder} tokens in PDF templates", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the placeholders a template defines
    Fields {
        /// Template PDF
        #[arg(value_name = "TEMPLATE", env = "PDFFILL_TEMPLATE")]
        template: PathBuf,

        /// Print a JSON array instead of one identifier per line
        #[arg(long)]
        json: bool,
    },

    /// Fill a template and write the result
    Generate {
        /// Template PDF
        #[arg(value_name = "TEMPLATE", env = "PDFFILL_TEMPLATE")]
        template: PathBuf,

        /// JSON object mapping identifiers to values
        #[arg(short, long, value_name = "FILE")]
        data: PathBuf,

        /// Output PDF
        #[arg(short, long, value_name = "FILE", env = "PDFFILL_OUTPUT")]
        output: PathBuf,

        /// Engine options (JSON)
        #[arg(short, long, value_name = "FILE", env = "PDFFILL_CONFIG")]
        config: Option<PathBuf>,

        /// Exit non-zero on unmatched identifiers or values that did not fit
        #[arg(long)]
        strict: bool,
    },

    /// List placeholders still present in a PDF
    Verify {
        /// PDF to check
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Only report identifiers this request covers
        #[arg(short, long, value_name = "FILE")]
        data: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Fields { template, json } => cmd_fields(&template, json),
        Commands::Generate {
            template,
            data,
            output,
            config,
            strict,
        } => cmd_generate(&template, &data, &output, config.as_deref(), strict),
        Commands::Verify { input, data } => cmd_verify(&input, data.as_deref()),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn load_request(path: &Path) -> Result<SubstitutionRequest> {
    SubstitutionRequest::from_file(path)
        .with_context(|| format!("Failed to read data file {}", path.display()))
}

fn load_options(path: Option<&Path>) -> Result<EngineOptions> {
    match path {
        Some(path) => EngineOptions::from_file(path)
            .with_context(|| format!("Failed to read config file {}", path.display())),
        None => Ok(EngineOptions::default()),
    }
}

fn cmd_fields(template: &Path, json: bool) -> Result<bool> {
    let fields = filler::list_fields(template)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&fields)?);
    } else {
        for field in &fields {
            println!("{field}");
        }
    }
    Ok(true)
}

fn cmd_generate(
    template: &Path,
    data: &Path,
    output: &Path,
    config: Option<&Path>,
    strict: bool,
) -> Result<bool> {
    let request = load_request(data)?;
    let options = load_options(config)?;
    log::debug!("Filling {} with {} value(s)", template.display(), request.len());

    let report = PlaceholderEngine::new()
        .with_options(options)
        .with_observer(Arc::new(LogObserver))
        .generate(template, &request, output)?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(!strict || passes_strict(&report))
}

/// Every identifier matched and every value fitted
fn passes_strict(report: &GenerationReport) -> bool {
    report.unmatched_identifiers.is_empty() && report.fit_failures.is_empty()
}

fn cmd_verify(input: &Path, data: Option<&Path>) -> Result<bool> {
    let request = data.map(load_request).transpose()?;
    let remaining = PlaceholderEngine::new().remaining_fields(input, request.as_ref())?;
    if remaining.is_empty() {
        println!("No placeholders remain in {}", input.display());
        return Ok(true);
    }

    println!("{} placeholder(s) remain:", remaining.len());
    for field in &remaining {
        println!("  {{{field}}}");
    }
    Ok(false)
}
