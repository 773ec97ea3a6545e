use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{info, warn};

use crate::config::AppConfig;
use crate::dataset::{output_path, Dataset};
use crate::dispatch::{parallel_map, ProgressObserver};
use crate::errors::AppResult;
use crate::geocoding::{GeocodeCandidate, GeocodingService};
use crate::query::Query;
use crate::report::match_histogram;
use crate::selection::geocode_filter;

pub type Selection = (Query, Vec<GeocodeCandidate>);

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Selections in original row order.
    pub results: Vec<Selection>,
    pub histogram: BTreeMap<usize, usize>,
    pub output_path: PathBuf,
}

/// Geocodes a locality table and writes the `-gps` copy next to it (or to
/// `output` when given). Any failed request aborts the run before writing.
pub async fn run_batch(
    config: &AppConfig,
    service: &GeocodingService,
    input: &Path,
    output: Option<&Path>,
    observer: Option<ProgressObserver>,
) -> AppResult<BatchOutcome> {
    let started = Instant::now();
    let dataset = Dataset::load(input)?;
    if dataset.is_empty() {
        warn!(target: "pipeline", input = %input.display(), "input table has no rows");
    }
    let queries = dataset.build_queries(&config.country)?;
    info!(
        target: "pipeline",
        rows = queries.len(),
        workers = config.workers,
        "geocoding localities"
    );

    let results = geocode_queries(service, queries, config.workers, observer).await?;

    let destination = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| output_path(input));
    dataset.write_geocoded(&destination, &results)?;

    let histogram = match_histogram(results.iter().map(|(_, candidates)| candidates));
    info!(
        target: "pipeline",
        rows = results.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        output = %destination.display(),
        "geocoding batch complete"
    );
    Ok(BatchOutcome {
        results,
        histogram,
        output_path: destination,
    })
}

/// Runs the selector over every query and returns the selections sorted by
/// query id.
///
/// Queries travel through the worker pool in their rendered
/// `"{id}--{address}"` form; the id comes back out of the result keys.
pub async fn geocode_queries(
    service: &GeocodingService,
    queries: Vec<Query>,
    workers: usize,
    observer: Option<ProgressObserver>,
) -> AppResult<Vec<Selection>> {
    let rendered: Vec<String> = queries.iter().map(Query::to_string).collect();
    let results = parallel_map(
        rendered,
        workers,
        |query| async move { geocode_filter(service, &query).await },
        observer,
    )
    .await?;
    restore_order(results)
}

/// Parses the rendered keys back into queries and sorts them by id.
pub fn restore_order<V>(results: HashMap<String, V>) -> AppResult<Vec<(Query, V)>> {
    let mut ordered = results
        .into_iter()
        .map(|(rendered, value)| Ok((rendered.parse::<Query>()?, value)))
        .collect::<AppResult<Vec<(Query, V)>>>()?;
    ordered.sort_by_key(|(query, _)| query.id);
    Ok(ordered)
}
