use std::collections::BTreeMap;

use crate::errors::AppResult;
use crate::geocoding::GeocodeCandidate;
use crate::query::Query;
use crate::selection::great_circle_km;

const SEPARATOR: &str = "\n----\n";

/// Candidate count of the row the debug summary looks for.
pub const DEFAULT_DEBUG_MATCHES: usize = 3;
/// Which such row (1-based) the debug summary shows.
pub const DEFAULT_DEBUG_INDEX: usize = 5;

/// Number of rows per selected-candidate count.
pub fn match_histogram<'a, I>(selections: I) -> BTreeMap<usize, usize>
where
    I: IntoIterator<Item = &'a Vec<GeocodeCandidate>>,
{
    let mut histogram = BTreeMap::new();
    for candidates in selections {
        *histogram.entry(candidates.len()).or_insert(0) += 1;
    }
    histogram
}

pub fn histogram_lines(histogram: &BTreeMap<usize, usize>) -> Vec<String> {
    histogram
        .iter()
        .map(|(matches, rows)| format!("Number of addresses with {matches} matches: {rows}"))
        .collect()
}

/// `(lat, lng)` pairs with seven decimals, joined by ` | `.
pub fn format_gps(candidates: &[GeocodeCandidate]) -> String {
    candidates
        .iter()
        .map(|candidate| {
            let location = candidate.location();
            format!("({:.7}, {:.7})", location.lat, location.lng)
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Human-readable dump of a candidate list, used to tune the selector.
pub fn summarize(candidates: &[GeocodeCandidate]) -> String {
    let mut out = format!("\nNumber of candidates: {}\n{SEPARATOR}\n", candidates.len());

    for candidate in candidates {
        let components = candidate
            .address_components
            .iter()
            .map(|c| format!("{} ({})", c.long_name, c.types.join(", ")))
            .collect::<Vec<_>>()
            .join(", ");
        let location = candidate.location();
        out.push_str(&format!("• Components:\n  {components}\n"));
        out.push_str(&format!(
            "• Formatted address:\n  {}\n",
            candidate.formatted_address
        ));
        out.push_str(&format!("• GPS:\n  {}, {}\n", location.lat, location.lng));
        out.push_str(SEPARATOR);
        out.push('\n');
    }

    for (c, later) in candidates.iter().enumerate() {
        for (j, earlier) in candidates[..c].iter().enumerate() {
            let km = great_circle_km(later.location(), earlier.location());
            out.push_str(&format!("Direct distance {j}<>{c} : {km:.2}km\n"));
        }
    }
    out
}

/// The `nth` (1-based) row whose selection holds exactly `matches` candidates.
pub fn pick_debug_row(
    results: &[(Query, Vec<GeocodeCandidate>)],
    matches: usize,
    nth: usize,
) -> Option<&(Query, Vec<GeocodeCandidate>)> {
    results
        .iter()
        .filter(|(_, candidates)| candidates.len() == matches)
        .nth(nth.max(1) - 1)
}

/// Every selection as pretty JSON keyed by the rendered query.
pub fn raw_dump(results: &[(Query, Vec<GeocodeCandidate>)]) -> AppResult<String> {
    let keyed: BTreeMap<String, &Vec<GeocodeCandidate>> = results
        .iter()
        .map(|(query, candidates)| (query.to_string(), candidates))
        .collect();
    Ok(serde_json::to_string_pretty(&keyed)?)
}
