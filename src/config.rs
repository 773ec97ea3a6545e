use std::path::PathBuf;
use std::{env, io};

use secrecy::SecretString;
use serde::Serialize;
use tracing::debug;

pub const DEFAULT_GEOCODE_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";
pub const DEFAULT_COUNTRY: &str = "Morocco";
const DEFAULT_WORKERS: usize = 5;
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub geocode_endpoint: String,
    pub workers: usize,
    pub request_timeout_secs: u64,
    pub language: Option<String>,
    pub region: Option<String>,
    pub country: String,
    pub google_maps_api_key: Option<SecretString>,
    pub api_key_file: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PublicAppConfig {
    pub geocode_endpoint: String,
    pub workers: usize,
    pub request_timeout_secs: u64,
    pub language: Option<String>,
    pub region: Option<String>,
    pub country: String,
    pub has_api_key: bool,
    pub api_key_file: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            geocode_endpoint: DEFAULT_GEOCODE_ENDPOINT.to_string(),
            workers: DEFAULT_WORKERS,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            language: None,
            region: None,
            country: DEFAULT_COUNTRY.to_string(),
            google_maps_api_key: None,
            api_key_file: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        load_dotenv_if_applicable();
        Self {
            geocode_endpoint: parse_string("GEOCODE_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_GEOCODE_ENDPOINT.to_string()),
            workers: parse_usize("GEOCODE_WORKERS", DEFAULT_WORKERS),
            request_timeout_secs: parse_u64("GEOCODE_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS).max(1),
            language: parse_string("GEOCODE_LANGUAGE"),
            region: parse_string("GEOCODE_REGION"),
            country: parse_string("GEOCODE_COUNTRY").unwrap_or_else(|| DEFAULT_COUNTRY.to_string()),
            google_maps_api_key: parse_string(crate::secrets::API_KEY_ENV).map(SecretString::from),
            api_key_file: parse_string("GOOGLE_MAPS_API_KEY_FILE").map(PathBuf::from),
        }
    }

    pub fn public_profile(&self) -> PublicAppConfig {
        PublicAppConfig {
            geocode_endpoint: self.geocode_endpoint.clone(),
            workers: self.workers,
            request_timeout_secs: self.request_timeout_secs,
            language: self.language.clone(),
            region: self.region.clone(),
            country: self.country.clone(),
            has_api_key: self.google_maps_api_key.is_some(),
            api_key_file: self
                .api_key_file
                .as_ref()
                .map(|path| path.to_string_lossy().to_string()),
        }
    }
}

fn load_dotenv_if_applicable() {
    if !should_load_dotenv() {
        debug!("skipping .env load outside dev mode");
        return;
    }

    if let Err(err) = dotenvy::dotenv() {
        match &err {
            dotenvy::Error::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => {}
            _ => debug!(?err, "unable to load .env file"),
        }
    }
}

fn should_load_dotenv() -> bool {
    cfg!(debug_assertions) || parse_bool("ALLOW_DOTENV", false)
}

fn parse_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(default)
}

fn parse_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default)
}
