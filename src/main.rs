use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use movie_pipeline::config::Config;
use movie_pipeline::infra::ReqwestPosterFetcher;
use movie_pipeline::logging;
use movie_pipeline::observability::metrics;
use movie_pipeline::pipeline::{Pipeline, SourceTables};
use movie_pipeline::tables;

#[derive(Parser)]
#[command(name = "movie-pipeline")]
#[command(about = "Builds an analysis-ready movie feature table from metadata, keywords and credits")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct InputArgs {
    /// Path to movies_metadata.csv
    #[arg(long)]
    metadata: PathBuf,
    /// Path to keywords.csv
    #[arg(long)]
    keywords: PathBuf,
    /// Path to credits.csv
    #[arg(long)]
    credits: PathBuf,
    /// Config file (defaults to ./config.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline, including poster color extraction, and write the output table
    Run {
        #[command(flatten)]
        input: InputArgs,
        /// Where to write the final CSV
        #[arg(long)]
        output: PathBuf,
    },
    /// Offline dry run: join, normalize, filter and correct only
    Check {
        #[command(flatten)]
        input: InputArgs,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::load().context("loading config.toml")?,
    };
    Ok(config)
}

fn read_inputs(input: &InputArgs) -> anyhow::Result<SourceTables> {
    tables::read_source_tables(&input.metadata, &input.keywords, &input.credits)
        .context("reading input tables")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let input = match &cli.command {
        Commands::Run { input, .. } | Commands::Check { input } => input,
    };
    let config = load_config(input.config.as_ref())?;

    logging::init_logging(&config.logging.directory);
    metrics::init();

    match cli.command {
        Commands::Run { input, output } => {
            println!("🎬 Running movie pipeline...");

            let fetcher = ReqwestPosterFetcher::new(config.color.request_timeout())
                .context("building HTTP client")?;
            let pipeline = Pipeline::full(&config, Arc::new(fetcher));

            let tables = read_inputs(&input)?;
            let result = match pipeline.run(tables).await {
                Ok(result) => result,
                Err(e) => {
                    error!("Pipeline failed: {}", e);
                    return Err(e).context("pipeline run failed");
                }
            };

            tables::write_output(&output, &result.records)
                .with_context(|| format!("writing {}", output.display()))?;
            info!(summary = %result.summary.to_json()?, "Pipeline finished");

            println!("\n{}", result.summary);
            println!("   Output file: {}", output.display());
        }
        Commands::Check { input } => {
            println!("🔍 Checking inputs (offline)...");

            let pipeline = Pipeline::offline(&config);
            let tables = read_inputs(&input)?;
            let result = pipeline.run(tables).await.context("offline check failed")?;
            info!(summary = %result.summary.to_json()?, "Check finished");

            println!("\n{}", result.summary);
            println!("✅ Inputs are valid; {} records would enter color extraction", result.summary.output_rows);
        }
    }

    Ok(())
}
