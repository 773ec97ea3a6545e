use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};

pub const PLUS_CODE_TYPE: &str = "plus_code";
pub const LOCALITY_TYPE: &str = "locality";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressComponent {
    pub long_name: String,
    pub short_name: String,
    #[serde(default)]
    pub types: Vec<String>,
}

impl AddressComponent {
    pub fn has_type(&self, tag: &str) -> bool {
        self.types.iter().any(|t| t == tag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub location: LatLng,
}

/// One match returned by the geocoding service for an address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeCandidate {
    #[serde(default)]
    pub formatted_address: String,
    #[serde(default)]
    pub address_components: Vec<AddressComponent>,
    pub geometry: Geometry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
}

impl GeocodeCandidate {
    pub fn location(&self) -> LatLng {
        self.geometry.location
    }

    pub fn has_component_type(&self, tag: &str) -> bool {
        self.address_components.iter().any(|c| c.has_type(tag))
    }
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> AppResult<Vec<GeocodeCandidate>>;
}

/// Cloneable handle over whichever geocoder backs a run.
#[derive(Clone)]
pub struct GeocodingService {
    inner: Arc<dyn Geocoder>,
}

impl GeocodingService {
    pub fn new(config: &AppConfig, api_key: SecretString) -> AppResult<Self> {
        let client = HttpGeocoder::new(config, api_key)?;
        Ok(Self {
            inner: Arc::new(client),
        })
    }

    pub fn from_geocoder(geocoder: Arc<dyn Geocoder>) -> Self {
        Self { inner: geocoder }
    }

    pub async fn geocode(&self, address: &str) -> AppResult<Vec<GeocodeCandidate>> {
        self.inner.geocode(address).await
    }
}

pub struct HttpGeocoder {
    http: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    language: Option<String>,
    region: Option<String>,
}

impl HttpGeocoder {
    pub fn new(config: &AppConfig, api_key: SecretString) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: config.geocode_endpoint.clone(),
            api_key,
            language: config.language.clone(),
            region: config.region.clone(),
        })
    }
}

#[derive(Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeCandidate>,
    error_message: Option<String>,
}

impl GeocodeResponse {
    fn into_candidates(self) -> AppResult<Vec<GeocodeCandidate>> {
        match self.status.as_str() {
            "OK" => return Ok(self.results),
            "ZERO_RESULTS" => return Ok(Vec::new()),
            _ => {}
        }
        Err(AppError::Geocoding {
            status: self.status,
            message: self
                .error_message
                .unwrap_or_else(|| "no error message provided".to_string()),
        })
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn geocode(&self, address: &str) -> AppResult<Vec<GeocodeCandidate>> {
        let mut params: Vec<(&str, &str)> = vec![
            ("address", address),
            ("key", self.api_key.expose_secret()),
        ];
        if let Some(language) = &self.language {
            params.push(("language", language.as_str()));
        }
        if let Some(region) = &self.region {
            params.push(("region", region.as_str()));
        }

        // The request URL carries the key, so it is stripped from transport errors.
        let response = self
            .http
            .get(&self.endpoint)
            .query(&params)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| AppError::Http(err.without_url()))?;

        let parsed: GeocodeResponse = response
            .json()
            .await
            .map_err(|err| AppError::Http(err.without_url()))?;
        trace!(target: "geocoding", address, status = %parsed.status, "geocode response");

        let candidates = parsed.into_candidates()?;
        debug!(
            target: "geocoding",
            address,
            candidates = candidates.len(),
            "geocoded address"
        );
        Ok(candidates)
    }
}
