use crate::application::use_cases::ingestion::DEFAULT_MAX_UPLOAD_BYTES;
use crate::domain::dataset::ValidationPolicy;
use crate::domain::error::{AppError, Result};
use crate::infrastructure::spreadsheet::NumberLocale;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

pub const CONFIG_FILE: &str = "statsheet.toml";
pub const ENV_PREFIX: &str = "STATSHEET_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
    #[validate(length(min = 1))]
    pub database_url: String,
    pub log_level: String,
    #[validate(range(min = 1))]
    pub max_upload_bytes: usize,
    /// Locale tag for the last-resort number parse, e.g. `en-US` or `id-ID`.
    pub fallback_locale: String,
    #[validate(nested)]
    pub policy: ValidationPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            database_url: "sqlite://statsheet.db".to_string(),
            log_level: "info".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            fallback_locale: "en-US".to_string(),
            policy: ValidationPolicy::default(),
        }
    }
}

impl AppConfig {
    /// Defaults, then `statsheet.toml` if present, then `STATSHEET_*` variables.
    pub fn load() -> Result<Self> {
        Self::from_figment(
            Figment::from(Serialized::defaults(AppConfig::default()))
                .merge(Toml::file(CONFIG_FILE))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: AppConfig = figment
            .extract()
            .map_err(|e| AppError::Internal(format!("Invalid configuration: {}", e)))?;
        config
            .validate()
            .map_err(|e| AppError::Internal(format!("Invalid configuration: {}", e)))?;
        Ok(config)
    }

    pub fn number_locale(&self) -> NumberLocale {
        NumberLocale::from_tag(&self.fallback_locale)
    }
}
