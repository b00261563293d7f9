use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::info;

use indicator_rates::{
    ParquetSink, ParquetSource, PipelineConfig, import_directory, publish_dimensions, run_pipeline,
};

#[global_allocator]
static ALLOC: snmalloc_rs::SnMalloc = snmalloc_rs::SnMalloc;

#[derive(Parser)]
#[command(name = "indicator-rates")]
#[command(about = "Compute age-standardised indicator rates")]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute rates for every standardised parameter row
    Run {
        /// Directory with the input parquet tables
        input: PathBuf,
        /// Directory the rate table is written to
        output: PathBuf,
        /// Only keep periods that ended before this date (YYYY-MM-DD)
        #[arg(long)]
        as_of: Option<NaiveDate>,
        /// Parameter rows processed at the same time
        #[arg(long)]
        max_concurrent_rows: Option<usize>,
        /// Local authority codes in scope (repeatable)
        #[arg(long = "la")]
        target_la_codes: Vec<String>,
        /// Hide the progress bar
        #[arg(long)]
        quiet: bool,
    },
    /// Write the demographic dimension catalogue
    Dimensions {
        /// Directory with the input parquet tables
        input: PathBuf,
        /// Directory the catalogue is written to
        output: PathBuf,
    },
    /// Stage externally computed indicator CSV files
    ImportExternal {
        /// Folder holding the CSV files
        folder: PathBuf,
        /// Directory holding the staging table
        output: PathBuf,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<PipelineConfig> {
    let config = match path {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    Ok(config.with_env_overrides())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_ref())?;
    let start = Instant::now();

    match cli.command {
        Commands::Run {
            input,
            output,
            as_of,
            max_concurrent_rows,
            target_la_codes,
            quiet,
        } => {
            if as_of.is_some() {
                config.as_of = as_of;
            }
            if let Some(n) = max_concurrent_rows {
                config.max_concurrent_rows = n;
            }
            if !target_la_codes.is_empty() {
                config.target_la_codes = target_la_codes;
            }
            info!("{config}");

            let source = ParquetSource::new(&input).context("opening input directory")?;
            let sink = ParquetSink::new(&output).context("opening output directory")?;
            let summary = run_pipeline(&source, &sink, &config, !quiet)
                .await
                .context("indicator run failed")?;
            println!("{summary}");
        }
        Commands::Dimensions { input, output } => {
            let source = ParquetSource::new(&input).context("opening input directory")?;
            let sink = ParquetSink::new(&output).context("opening output directory")?;
            let written = publish_dimensions(&source, &sink).context("writing dimensions")?;
            println!("Wrote {written} dimension entries");
        }
        Commands::ImportExternal { folder, output } => {
            let sink = ParquetSink::new(&output).context("opening output directory")?;
            let summary = import_directory(&folder, &sink).context("external import failed")?;
            println!(
                "Loaded {} files ({} rows), {} failed",
                summary.files_loaded, summary.rows_loaded, summary.files_failed
            );
        }
    }

    info!("Finished in {:?}", start.elapsed());
    Ok(())
}
