//! Startup configuration, read from the process environment (plus `.env`).

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::AppError;
use crate::persona::PersonaRegistry;

pub const DEFAULT_BASE_URL: &str = "https://api.cohere.ai";
pub const DEFAULT_EVALUATION_MODEL: &str = "bfc37152-1c6c-4486-84bb-843dd7d9df11-ft";
pub const DEFAULT_CLASSIFY_MODEL: &str = "5ae71449-3ae0-488f-a703-eb0275839e8f-ft";
pub const DEFAULT_REFINE_MODEL: &str = "c4ai-aya-expanse-32b";

/// Sampling temperature for both the persona chat and the profile refinement.
pub const CHAT_TEMPERATURE: f32 = 0.3;

/// Fixed model ids for the auxiliary endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub evaluation: String,
    pub classify: String,
    pub refine: String,
    pub temperature: f32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            evaluation: DEFAULT_EVALUATION_MODEL.to_string(),
            classify: DEFAULT_CLASSIFY_MODEL.to_string(),
            refine: DEFAULT_REFINE_MODEL.to_string(),
            temperature: CHAT_TEMPERATURE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

/// Load `.env` from the working directory (or a parent) into the process
/// environment. A missing file is not an error.
pub fn load_dotenv() -> Result<Option<PathBuf>, dotenvy::Error> {
    match dotenvy::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub provider: ProviderSettings,
    pub models: ModelSettings,
    pub personas_file: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("COHERE_API_KEY")
            .or_else(|| get("API_KEY"))
            .ok_or_else(|| {
                AppError::Config("COHERE_API_KEY (or API_KEY) must be set".into())
            })?;

        let base_url = get("COHERE_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        url::Url::parse(&base_url)
            .map_err(|e| AppError::Config(format!("invalid COHERE_BASE_URL '{base_url}': {e}")))?;

        let host: IpAddr = match get("HOST") {
            Some(h) => h
                .parse()
                .map_err(|e| AppError::Config(format!("invalid HOST '{h}': {e}")))?,
            None => IpAddr::from([127, 0, 0, 1]),
        };
        let port: u16 = match get("PORT") {
            Some(p) => p
                .parse()
                .map_err(|e| AppError::Config(format!("invalid PORT '{p}': {e}")))?,
            None => 5000,
        };
        let timeout_secs: u64 = match get("PROVIDER_TIMEOUT_SECS") {
            Some(t) => t
                .parse()
                .map_err(|e| AppError::Config(format!("invalid PROVIDER_TIMEOUT_SECS '{t}': {e}")))?,
            None => 120,
        };

        let defaults = ModelSettings::default();
        Ok(Self {
            bind_addr: SocketAddr::new(host, port),
            provider: ProviderSettings {
                api_key,
                base_url,
                timeout: Duration::from_secs(timeout_secs),
            },
            models: ModelSettings {
                evaluation: get("EVALUATION_MODEL").unwrap_or(defaults.evaluation),
                classify: get("CLASSIFY_MODEL").unwrap_or(defaults.classify),
                refine: get("REFINE_MODEL").unwrap_or(defaults.refine),
                temperature: defaults.temperature,
            },
            personas_file: get("PERSONAS_FILE").map(PathBuf::from),
        })
    }

    /// Persona registry from `PERSONAS_FILE`, or the built-in table.
    pub fn load_personas(&self) -> Result<PersonaRegistry, AppError> {
        match &self.personas_file {
            Some(path) => {
                let registry = PersonaRegistry::from_file(path)?;
                tracing::info!(
                    path = %path.display(),
                    count = registry.len(),
                    "Loaded persona registry from file"
                );
                Ok(registry)
            }
            None => Ok(PersonaRegistry::builtin()),
        }
    }
}
