//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::i18n::Lang;

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Base URL of the catalog/lead backend, without trailing slash.
    pub api_base_url: String,
    /// Static API key sent as `Authorization: Api-Key <key>` on every call.
    pub api_key: SecretString,
    /// Per-attempt request timeout for normal calls.
    pub request_timeout: Duration,
    /// Maximum attempts per API call (first try included).
    pub max_retries: u32,
    /// Timeout for fire-and-forget analytics posts.
    pub analytics_timeout: Duration,
    /// Language used until the user picks one explicitly.
    pub default_language: Lang,
    /// Cap on school-detail fetches when resolving an online tariff by
    /// plan code without a school id.
    pub tariff_scan_cap: usize,
    /// WhatsApp recipient for school and online-product leads.
    pub whatsapp_schools: String,
    /// WhatsApp recipient for instructor leads.
    pub whatsapp_instructors: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api/v1".to_string(),
            api_key: SecretString::from(String::new()),
            request_timeout: Duration::from_secs(10),
            max_retries: 3,
            analytics_timeout: Duration::from_secs(5),
            default_language: Lang::Ru,
            tariff_scan_cap: 25,
            whatsapp_schools: "77026345274".to_string(),
            whatsapp_instructors: "77788981396".to_string(),
        }
    }
}

impl BotConfig {
    /// Build a config from environment variables.
    ///
    /// `SRM_API_BASE_URL` and `SRM_API_KEY` are required; everything else
    /// falls back to the defaults above.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_base_url = require_env("SRM_API_BASE_URL")?
            .trim_end_matches('/')
            .to_string();
        let api_key = SecretString::from(require_env("SRM_API_KEY")?);

        let mut config = Self {
            api_base_url,
            api_key,
            ..Self::default()
        };

        if let Ok(lang) = std::env::var("SRM_DEFAULT_LANGUAGE") {
            config.default_language =
                lang.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "SRM_DEFAULT_LANGUAGE".into(),
                    message: format!("expected RU or KZ, got {lang}"),
                })?;
        }
        if let Ok(cap) = std::env::var("SRM_TARIFF_SCAN_CAP") {
            config.tariff_scan_cap = cap.parse().map_err(|_| ConfigError::InvalidValue {
                key: "SRM_TARIFF_SCAN_CAP".into(),
                message: format!("expected a number, got {cap}"),
            })?;
        }

        Ok(config)
    }
}

fn require_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_backend_contract() {
        let config = BotConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.default_language, Lang::Ru);
        assert_eq!(config.tariff_scan_cap, 25);
    }
}
