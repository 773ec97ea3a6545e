//! douar-coords CLI entry point

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use douar_coords::dataset::ensure_input_exists;
use douar_coords::report::{
    histogram_lines, pick_debug_row, raw_dump, summarize, DEFAULT_DEBUG_INDEX,
    DEFAULT_DEBUG_MATCHES,
};
use douar_coords::{
    bar_observer, geocoding_bar, init_tracing, resolve_api_key, run_batch, AppConfig,
    GeocodingService,
};

#[derive(Parser, Debug)]
#[command(name = "douar-coords")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Workbook (first sheet) or CSV with nom_fr, nom_ar, commune_fr,
    /// cercle_fr, province_fr and region_fr columns
    #[arg(value_name = "INPUT", default_value = "listes-localités.xlsx")]
    input: PathBuf,

    /// Output table, `.xlsx` or CSV (defaults to the input name with a `-gps` suffix)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Concurrent geocoding requests; below 2 runs sequentially
    #[arg(short, long, env = "GEOCODE_WORKERS")]
    workers: Option<usize>,

    /// Country appended to every address
    #[arg(long, env = "GEOCODE_COUNTRY")]
    country: Option<String>,

    /// File holding the API key when GOOGLE_MAPS_API_KEY is unset
    #[arg(long, env = "GOOGLE_MAPS_API_KEY_FILE")]
    key_file: Option<PathBuf>,

    /// Print a detailed summary of one row to tune the selector
    #[arg(long)]
    debug: bool,

    /// Candidate count of the row to summarize
    #[arg(long, value_name = "COUNT", default_value_t = DEFAULT_DEBUG_MATCHES, requires = "debug")]
    debug_matches: usize,

    /// Which matching row to summarize (1-based)
    #[arg(long, default_value_t = DEFAULT_DEBUG_INDEX, requires = "debug")]
    debug_index: usize,

    /// Also dump every selection as JSON after the debug summary
    #[arg(long, requires = "debug")]
    print_raw: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = AppConfig::from_env();
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if let Some(country) = cli.country.clone() {
        config.country = country;
    }
    if let Some(key_file) = cli.key_file.clone() {
        config.api_key_file = Some(key_file);
    }

    ensure_input_exists(&cli.input)?;
    let api_key = resolve_api_key(&config)?;
    info!(
        key_source = api_key.source().as_str(),
        config = ?config.public_profile(),
        "starting geocoding run"
    );

    let service = GeocodingService::new(&config, api_key.into_secret())
        .context("failed to build geocoding client")?;
    let bar = geocoding_bar();
    let outcome = run_batch(
        &config,
        &service,
        &cli.input,
        cli.output.as_deref(),
        Some(bar_observer(bar.clone())),
    )
    .await;
    bar.finish();
    let outcome = outcome.with_context(|| format!("geocoding {} failed", cli.input.display()))?;

    for line in histogram_lines(&outcome.histogram) {
        println!("{line}");
    }
    println!("Wrote {}", outcome.output_path.display());

    if cli.debug {
        let matches = cli.debug_matches;
        match pick_debug_row(&outcome.results, matches, cli.debug_index) {
            Some((query, candidates)) => {
                println!("{query}");
                print!("{}", summarize(candidates));
            }
            None => warn!(
                matches,
                index = cli.debug_index,
                "no row has that many selected candidates"
            ),
        }
        if cli.print_raw {
            println!("\n----\n");
            println!("{}", raw_dump(&outcome.results)?);
        }
    }

    Ok(())
}
