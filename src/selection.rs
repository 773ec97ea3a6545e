use tracing::trace;

use crate::errors::AppResult;
use crate::geocoding::{GeocodeCandidate, GeocodingService, LatLng, LOCALITY_TYPE, PLUS_CODE_TYPE};
use crate::query::{address_tokens, Query, TokenIndex};

/// Tied candidates closer than this to each other are treated as one place.
pub const SAME_PLACE_KM: f64 = 1.0;
const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Geocodes a rendered `"{id}--{address}"` query and keeps the best
/// matching candidates. The id prefix never reaches the service.
pub async fn geocode_filter(
    service: &GeocodingService,
    rendered: &str,
) -> AppResult<Vec<GeocodeCandidate>> {
    let query: Query = rendered.parse()?;
    let candidates = service.geocode(&query.address).await?;
    let selected = select_candidates(&query.address, candidates);
    trace!(
        target: "selection",
        id = query.id,
        selected = selected.len(),
        "selected candidates"
    );
    Ok(selected)
}

/// Picks the candidates that most literally match `address`.
///
/// Lowest rank wins. Ties are collapsed when they all lie within
/// [`SAME_PLACE_KM`] of each other, otherwise narrowed to locality-tagged
/// candidates (if any) and then to those with the most address components.
/// Never returns an empty selection for a non-empty input.
pub fn select_candidates(address: &str, candidates: Vec<GeocodeCandidate>) -> Vec<GeocodeCandidate> {
    if candidates.len() < 2 {
        return candidates;
    }

    let tokens = address_tokens(address);
    let index = TokenIndex::new(&tokens);
    let ranks: Vec<usize> = candidates
        .iter()
        .map(|candidate| candidate_rank(candidate, &index))
        .collect();
    let Some(min_rank) = ranks.iter().copied().min() else {
        return candidates;
    };

    let tied: Vec<&GeocodeCandidate> = candidates
        .iter()
        .zip(&ranks)
        .filter(|(_, rank)| **rank == min_rank)
        .map(|(candidate, _)| candidate)
        .collect();
    if tied.len() == 1 {
        return vec![tied[0].clone()];
    }

    let locations: Vec<LatLng> = tied.iter().map(|candidate| candidate.location()).collect();
    if all_within_km(&locations, SAME_PLACE_KM) {
        return vec![tied[0].clone()];
    }

    let with_locality: Vec<&GeocodeCandidate> = tied
        .iter()
        .copied()
        .filter(|candidate| candidate.has_component_type(LOCALITY_TYPE))
        .collect();
    let narrowed = if with_locality.is_empty() {
        tied
    } else {
        with_locality
    };

    let selected = most_detailed(&narrowed);
    or_original(selected, candidates)
}

/// Earliest query-token position reachable through any non plus-code
/// component, or the not-found sentinel.
pub fn candidate_rank(candidate: &GeocodeCandidate, index: &TokenIndex<'_>) -> usize {
    candidate
        .address_components
        .iter()
        .filter(|component| !component.has_type(PLUS_CODE_TYPE))
        .map(|component| {
            let short = index
                .position(&component.short_name)
                .unwrap_or_else(|| index.not_found());
            let long = index
                .position(&component.long_name)
                .unwrap_or_else(|| index.not_found());
            short.min(long)
        })
        .min()
        .unwrap_or_else(|| index.not_found())
}

/// Haversine distance in kilometres.
pub fn great_circle_km(a: LatLng, b: LatLng) -> f64 {
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();
    let h = (dlat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

fn all_within_km(locations: &[LatLng], limit_km: f64) -> bool {
    locations.iter().enumerate().all(|(i, a)| {
        locations[i + 1..]
            .iter()
            .all(|b| great_circle_km(*a, *b) < limit_km)
    })
}

fn most_detailed(candidates: &[&GeocodeCandidate]) -> Vec<GeocodeCandidate> {
    let Some(max_components) = candidates
        .iter()
        .map(|candidate| candidate.address_components.len())
        .max()
    else {
        return Vec::new();
    };
    candidates
        .iter()
        .filter(|candidate| candidate.address_components.len() == max_components)
        .map(|candidate| (*candidate).clone())
        .collect()
}

fn or_original(
    selected: Vec<GeocodeCandidate>,
    original: Vec<GeocodeCandidate>,
) -> Vec<GeocodeCandidate> {
    if selected.is_empty() {
        original
    } else {
        selected
    }
}
