use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};

pub const API_KEY_ENV: &str = "GOOGLE_MAPS_API_KEY";
pub const API_KEY_FILE_NAME: &str = "google_maps_api.key";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeySource {
    Environment,
    KeyFile,
}

impl KeySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeySource::Environment => "environment",
            KeySource::KeyFile => "key_file",
        }
    }
}

#[derive(Clone)]
pub struct ApiKey {
    secret: SecretString,
    source: KeySource,
}

impl ApiKey {
    fn new(secret: SecretString, source: KeySource) -> Self {
        Self { secret, source }
    }

    pub fn into_secret(self) -> SecretString {
        self.secret
    }

    pub fn source(&self) -> KeySource {
        self.source
    }
}

/// Resolves the Google Maps API key: the environment first, then the key file.
///
/// Fails before any network activity when neither yields a non-empty key.
pub fn resolve_api_key(config: &AppConfig) -> AppResult<ApiKey> {
    if let Some(secret) = config.google_maps_api_key.clone() {
        debug!(target: "secrets", source = KeySource::Environment.as_str(), "using API key");
        return Ok(ApiKey::new(secret, KeySource::Environment));
    }

    let key_file = config
        .api_key_file
        .clone()
        .unwrap_or_else(default_key_file);
    if let Some(secret) = read_key_file(&key_file)? {
        info!(
            target: "secrets",
            path = %key_file.display(),
            "loaded API key from key file"
        );
        return Ok(ApiKey::new(secret, KeySource::KeyFile));
    }

    Err(AppError::MissingApiKey {
        env_var: API_KEY_ENV.to_string(),
        key_file,
    })
}

/// Key file location when none is configured: beside the running executable.
pub fn default_key_file() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_default()
        .join(API_KEY_FILE_NAME)
}

fn read_key_file(path: &Path) -> AppResult<Option<SecretString>> {
    match fs::read_to_string(path) {
        Ok(contents) => {
            let trimmed = contents.trim();
            if trimmed.is_empty() {
                debug!(target: "secrets", path = %path.display(), "key file is empty");
                Ok(None)
            } else {
                Ok(Some(SecretString::from(trimmed.to_string())))
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(AppError::Io(err)),
    }
}
