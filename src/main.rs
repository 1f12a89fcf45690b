mod catalog;
mod config;
mod detect;
mod error;
mod export;
mod input;
mod instance_types;
mod logging;
mod models;
mod period;
mod providers;
mod service;

use clap::{Parser, Subcommand};
use config::{
    cache_path, delete_lookup_token, ensure_initialized, load_config, set_lookup_token, AppConfig,
};
use error::AppError;
use input::BillingCsv;
use models::Analysis;
use service::{LookupMode, MeterService};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "cloud-meter")]
#[command(about = "Monthly compute, serverless and platform usage from cloud billing exports")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Init,
    /// Print which billing export a file is.
    Detect { file: PathBuf },
    Analyze {
        file: PathBuf,
        /// Query the instance catalog instead of reading the cache.
        #[arg(long)]
        no_cache: bool,
        #[arg(long)]
        region: Option<String>,
        #[arg(long, default_value = "table")]
        format: String,
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    RefreshInstanceTypes {
        #[arg(long)]
        region: Option<String>,
    },
    SetToken { token: String },
    ClearToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

fn parse_format(input: &str) -> OutputFormat {
    match input.trim().to_ascii_lowercase().as_str() {
        "json" => OutputFormat::Json,
        "csv" => OutputFormat::Csv,
        _ => OutputFormat::Table,
    }
}

fn validate_format(input: &str) -> Result<OutputFormat, AppError> {
    match input.trim().to_ascii_lowercase().as_str() {
        "table" | "json" | "csv" => Ok(parse_format(input)),
        _ => Err(AppError::Config(
            "Unsupported format. Use table, json, or csv.".into(),
        )),
    }
}

fn with_region(mut cfg: AppConfig, region: Option<String>) -> AppConfig {
    if let Some(region) = region {
        let region = region.trim().to_ascii_lowercase();
        if !region.is_empty() {
            cfg.lookup.region = Some(region);
        }
    }
    cfg
}

fn read_input(file: &Path) -> Result<BillingCsv, AppError> {
    if file == Path::new("-") {
        BillingCsv::from_reader(std::io::stdin().lock())
    } else {
        BillingCsv::from_path(file)
    }
}

fn exit_code(err: &AppError) -> u8 {
    match err {
        AppError::UnrecognizedSchema => 2,
        AppError::Data { .. } => 3,
        _ => 1,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(exit_code(&e))
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let cfg = load_config()?;
    logging::init_logging(&cfg.log_level);

    match cli.command {
        Commands::Init => {
            ensure_initialized()?;
            println!("Initialized cloud-meter config and data directories.");
        }
        Commands::Detect { file } => {
            let input = read_input(&file)?;
            match detect::detect_schema(&input.header()?) {
                Some(provider) => println!("{}", provider.as_label()),
                None => return Err(AppError::UnrecognizedSchema),
            }
        }
        Commands::Analyze {
            file,
            no_cache,
            region,
            format,
            output_dir,
        } => {
            let format = validate_format(&format)?;
            let cfg = with_region(cfg, region);
            let input = read_input(&file)?;
            let mode = if no_cache {
                LookupMode::Refresh
            } else {
                LookupMode::Cached
            };

            let svc = MeterService::new()?;
            let report = match svc.analyze(&cfg, &input, mode).await? {
                Analysis::Report(report) => report,
                Analysis::Unrecognized { .. } => return Err(AppError::UnrecognizedSchema),
            };

            match format {
                OutputFormat::Table => {
                    println!("{}", report.title);
                    print!("{}", export::render_summary(&report.summary));
                }
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Csv => {
                    export::write_summary_csv(&report.summary, std::io::stdout().lock())?
                }
            }

            if let Some(dir) = output_dir.or_else(|| cfg.output.directory.clone()) {
                let (detail, summary) = export::write_report(&report, &dir)?;
                if format == OutputFormat::Table {
                    println!(
                        "Saved results into {} and {}",
                        detail.display(),
                        summary.display()
                    );
                } else {
                    info!(detail = %detail.display(), summary = %summary.display(), "saved results");
                }
            }
        }
        Commands::RefreshInstanceTypes { region } => {
            ensure_initialized()?;
            let cfg = with_region(cfg, region);
            let svc = MeterService::new()?;
            let (_, report) = svc.refresh_instance_types(&cfg).await?;
            if report.entries == 0 {
                println!("Instance catalog returned no entries; cache left unchanged.");
            } else {
                println!(
                    "Cached {} instance types in {} ms at {}",
                    report.entries,
                    report.duration_ms,
                    cache_path(&cfg)?.display()
                );
            }
        }
        Commands::SetToken { token } => {
            set_lookup_token(token.trim())?;
            println!("Instance catalog token stored.");
        }
        Commands::ClearToken => {
            delete_lookup_token()?;
            println!("Instance catalog token removed.");
        }
    }

    Ok(())
}
