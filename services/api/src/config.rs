//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use lms_core::OnboardingSettings;
use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which email backend delivers invitations and OTP codes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EmailProvider {
    /// Logs the message instead of sending it (development).
    Console,
    SendGrid { api_key: String },
    /// Every send fails; useful to keep a misconfigured node from issuing codes.
    Disabled,
}

#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub provider: EmailProvider,
    pub sender_email: String,
    pub sender_name: String,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub database_max_connections: u32,
    pub log_level: Level,
    pub frontend_url: String,
    pub cors_origin: String,
    pub cookie_secure: bool,
    pub email: EmailConfig,
    pub admin_bootstrap: Option<(String, String)>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server and Database Settings ---
        let bind_address_str = var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:8000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url =
            var("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let max_connections_str =
            var("DATABASE_MAX_CONNECTIONS").unwrap_or_else(|| "5".to_string());
        let database_max_connections = max_connections_str.parse::<u32>().map_err(|e| {
            ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS".to_string(), e.to_string())
        })?;

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Web Client Settings ---
        let frontend_url =
            var("FRONTEND_URL").unwrap_or_else(|| "http://localhost:3000".to_string());
        let cors_origin = var("CORS_ORIGIN").unwrap_or_else(|| frontend_url.clone());
        let cookie_secure = match var("COOKIE_SECURE").as_deref() {
            None | Some("true") | Some("1") => true,
            Some("false") | Some("0") => false,
            Some(other) => {
                return Err(ConfigError::InvalidValue(
                    "COOKIE_SECURE".to_string(),
                    format!("'{}' is not a boolean", other),
                ))
            }
        };

        // --- Email Settings ---
        let provider = match var("EMAIL_PROVIDER")
            .unwrap_or_else(|| "console".to_string())
            .to_lowercase()
            .as_str()
        {
            "console" => EmailProvider::Console,
            "disabled" => EmailProvider::Disabled,
            "sendgrid" => EmailProvider::SendGrid {
                api_key: var("SENDGRID_API_KEY")
                    .ok_or_else(|| ConfigError::MissingVar("SENDGRID_API_KEY".to_string()))?,
            },
            other => {
                return Err(ConfigError::InvalidValue(
                    "EMAIL_PROVIDER".to_string(),
                    format!("unknown provider '{}'", other),
                ))
            }
        };
        let email = EmailConfig {
            provider,
            sender_email: var("EMAIL_SENDER").unwrap_or_else(|| "noreply@localhost".to_string()),
            sender_name: var("EMAIL_SENDER_NAME").unwrap_or_else(|| "LMS".to_string()),
        };

        // --- Optional Staff Bootstrap ---
        let admin_bootstrap = match (var("ADMIN_BOOTSTRAP_EMAIL"), var("ADMIN_BOOTSTRAP_PASSWORD")) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Some((email, password))
            }
            _ => None,
        };

        Ok(Self {
            bind_address,
            database_url,
            database_max_connections,
            log_level,
            frontend_url,
            cors_origin,
            cookie_secure,
            email,
            admin_bootstrap,
        })
    }

    /// Token lifetimes and the invite link base used by the workflows.
    pub fn onboarding_settings(&self) -> OnboardingSettings {
        OnboardingSettings {
            frontend_url: self.frontend_url.clone(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/lms")]).unwrap();
        assert_eq!(config.bind_address.port(), 8000);
        assert_eq!(config.email.provider, EmailProvider::Console);
        assert_eq!(config.cors_origin, "http://localhost:3000");
        assert!(config.cookie_secure);
        assert!(config.admin_bootstrap.is_none());
    }

    #[test]
    fn database_url_is_required() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingVar(v)) if v == "DATABASE_URL"));
    }

    #[test]
    fn sendgrid_needs_a_key() {
        let result = load(&[
            ("DATABASE_URL", "postgres://localhost/lms"),
            ("EMAIL_PROVIDER", "sendgrid"),
        ]);
        assert!(matches!(result, Err(ConfigError::MissingVar(v)) if v == "SENDGRID_API_KEY"));
    }

    #[test]
    fn bad_values_are_reported() {
        let result = load(&[
            ("DATABASE_URL", "postgres://localhost/lms"),
            ("BIND_ADDRESS", "not-an-address"),
        ]);
        assert!(matches!(result, Err(ConfigError::InvalidValue(v, _)) if v == "BIND_ADDRESS"));

        let result = load(&[
            ("DATABASE_URL", "postgres://localhost/lms"),
            ("COOKIE_SECURE", "maybe"),
        ]);
        assert!(matches!(result, Err(ConfigError::InvalidValue(v, _)) if v == "COOKIE_SECURE"));
    }
}
