//! Configuration loading for the forms relay.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `PORTAL_`, producing a typed [`AppConfig`] that is built once at startup
//! and shared read-only afterwards.

use std::{collections::BTreeMap, env, net::SocketAddr, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::models::FormType;

const REDACTED: &str = "[REDACTED]";

/// Application configuration derived from `PORTAL_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_bind_addr")]
    pub api_bind_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_ms")]
    pub db_acquire_timeout_ms: u64,
    #[serde(default = "default_project_id")]
    pub project_id: String,
    #[serde(default = "default_service_id")]
    pub service_id: String,
    #[serde(default)]
    pub docuseal: DocusealConfig,
    #[serde(default)]
    pub n8n: N8nConfig,
}

/// Signing platform (DocuSeal) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct DocusealConfig {
    #[serde(default = "default_docuseal_base_url")]
    pub base_url: String,
    /// Sent as `Authorization: Bearer <key>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// HMAC secret for inbound webhook signatures; verification is skipped when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_secret: Option<String>,
    #[serde(default)]
    pub templates: TemplateIds,
}

/// Signing-platform template identifier per portal form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct TemplateIds {
    #[serde(default = "default_template_insurance_verification")]
    pub insurance_verification: String,
    #[serde(default = "default_template_onboarding")]
    pub onboarding: String,
    #[serde(default = "default_template_order")]
    pub order: String,
    #[serde(default = "default_template_agreement")]
    pub agreement: String,
}

/// Workflow automation platform (n8n) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct N8nConfig {
    #[serde(default = "default_n8n_base_url")]
    pub base_url: String,
    /// Sent as `X-N8N-API-KEY` on workflow triggers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_secret: Option<String>,
    #[serde(default)]
    pub webhook_paths: WebhookPaths,
}

/// Paths on the automation platform base URL used for fire-and-forget notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct WebhookPaths {
    #[serde(default = "default_form_submitted_path")]
    pub form_submitted: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_bind_addr: default_api_bind_addr(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: default_database_url(),
            db_max_connections: default_db_max_connections(),
            db_acquire_timeout_ms: default_db_acquire_timeout_ms(),
            project_id: default_project_id(),
            service_id: default_service_id(),
            docuseal: DocusealConfig::default(),
            n8n: N8nConfig::default(),
        }
    }
}

impl Default for DocusealConfig {
    fn default() -> Self {
        Self {
            base_url: default_docuseal_base_url(),
            api_key: None,
            webhook_secret: None,
            templates: TemplateIds::default(),
        }
    }
}

impl Default for TemplateIds {
    fn default() -> Self {
        Self {
            insurance_verification: default_template_insurance_verification(),
            onboarding: default_template_onboarding(),
            order: default_template_order(),
            agreement: default_template_agreement(),
        }
    }
}

impl Default for N8nConfig {
    fn default() -> Self {
        Self {
            base_url: default_n8n_base_url(),
            api_key: None,
            webhook_secret: None,
            webhook_paths: WebhookPaths::default(),
        }
    }
}

impl Default for WebhookPaths {
    fn default() -> Self {
        Self {
            form_submitted: default_form_submitted_path(),
        }
    }
}

impl TemplateIds {
    /// Template identifiers in mapping order. The first match wins when resolving a template.
    pub fn entries(&self) -> [(&str, FormType); 4] {
        [
            (
                self.insurance_verification.as_str(),
                FormType::InsuranceVerification,
            ),
            (self.onboarding.as_str(), FormType::Onboarding),
            (self.order.as_str(), FormType::Order),
            (self.agreement.as_str(), FormType::Agreement),
        ]
    }

    /// Template a new submission for the given form is created from.
    pub fn for_form_type(&self, form_type: FormType) -> &str {
        match form_type {
            FormType::InsuranceVerification => &self.insurance_verification,
            FormType::Onboarding => &self.onboarding,
            FormType::Order => &self.order,
            FormType::Agreement => &self.agreement,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let entries = self.entries();
        for (index, (template_id, form_type)) in entries.iter().enumerate() {
            if template_id.trim().is_empty() {
                return Err(ConfigError::EmptyTemplateId {
                    form_type: form_type.as_str(),
                });
            }
            if entries[..index].iter().any(|(other, _)| other == template_id) {
                return Err(ConfigError::DuplicateTemplateId {
                    template_id: template_id.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl AppConfig {
    /// Returns the configured bind address as a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.api_bind_addr.parse()
    }

    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        for secret in [
            &mut config.docuseal.api_key,
            &mut config.docuseal.webhook_secret,
            &mut config.n8n.api_key,
            &mut config.n8n.webhook_secret,
        ] {
            if secret.is_some() {
                *secret = Some(REDACTED.to_string());
            }
        }
        if let Ok(mut url) = Url::parse(&config.database_url)
            && url.password().is_some()
            && url.set_password(Some(REDACTED)).is_ok()
        {
            config.database_url = url.to_string();
        }
        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration, returning the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_base_url("DOCUSEAL_BASE_URL", &self.docuseal.base_url)?;
        validate_base_url("N8N_BASE_URL", &self.n8n.base_url)?;

        let path = &self.n8n.webhook_paths.form_submitted;
        if !path.starts_with('/') {
            return Err(ConfigError::InvalidWebhookPath {
                value: path.clone(),
            });
        }

        self.docuseal.templates.validate()?;

        if self.db_max_connections == 0 {
            return Err(ConfigError::InvalidDbMaxConnections);
        }

        Ok(())
    }
}

fn validate_base_url(key: &'static str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value).map_err(|source| ConfigError::InvalidBaseUrl {
        key,
        value: value.to_string(),
        reason: source.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidBaseUrl {
            key,
            value: value.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(())
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_database_url() -> String {
    "sqlite://forms.db?mode=rwc".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_acquire_timeout_ms() -> u64 {
    5000
}

fn default_project_id() -> String {
    "healthcare-forms".to_string()
}

fn default_service_id() -> String {
    "forms-relay".to_string()
}

fn default_docuseal_base_url() -> String {
    "https://api.docuseal.com".to_string()
}

fn default_template_insurance_verification() -> String {
    "1".to_string()
}

fn default_template_onboarding() -> String {
    "2".to_string()
}

fn default_template_order() -> String {
    "3".to_string()
}

fn default_template_agreement() -> String {
    "4".to_string()
}

fn default_n8n_base_url() -> String {
    "http://localhost:5678".to_string()
}

fn default_form_submitted_path() -> String {
    "/webhook/form-submitted".to_string()
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid api bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("invalid {key} '{value}': {reason}")]
    InvalidBaseUrl {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("n8n webhook path must start with '/', got '{value}'")]
    InvalidWebhookPath { value: String },
    #[error("template identifier for {form_type} is empty")]
    EmptyTemplateId { form_type: &'static str },
    #[error("template identifier '{template_id}' is mapped to more than one form type")]
    DuplicateTemplateId { template_id: String },
    #[error("database max connections must be at least 1")]
    InvalidDbMaxConnections,
}

/// Loads configuration using layered `.env` files and `PORTAL_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads `.env`, `.env.local`, `.env.{profile}`, `.env.{profile}.local`, then the
    /// process environment, later layers winning.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix("PORTAL_") {
                layered.insert(stripped.to_string(), value);
            }
        }

        let mut take = |key: &str| {
            layered
                .remove(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let docuseal = DocusealConfig {
            base_url: take("DOCUSEAL_BASE_URL").unwrap_or_else(default_docuseal_base_url),
            api_key: take("DOCUSEAL_API_KEY"),
            webhook_secret: take("DOCUSEAL_WEBHOOK_SECRET"),
            templates: TemplateIds {
                insurance_verification: take("DOCUSEAL_TEMPLATE_INSURANCE_VERIFICATION")
                    .unwrap_or_else(default_template_insurance_verification),
                onboarding: take("DOCUSEAL_TEMPLATE_ONBOARDING")
                    .unwrap_or_else(default_template_onboarding),
                order: take("DOCUSEAL_TEMPLATE_ORDER").unwrap_or_else(default_template_order),
                agreement: take("DOCUSEAL_TEMPLATE_AGREEMENT")
                    .unwrap_or_else(default_template_agreement),
            },
        };

        let n8n = N8nConfig {
            base_url: take("N8N_BASE_URL").unwrap_or_else(default_n8n_base_url),
            api_key: take("N8N_API_KEY"),
            webhook_secret: take("N8N_WEBHOOK_SECRET"),
            webhook_paths: WebhookPaths {
                form_submitted: take("N8N_FORM_SUBMITTED_PATH")
                    .unwrap_or_else(default_form_submitted_path),
            },
        };

        let config = AppConfig {
            profile: take("PROFILE").unwrap_or(profile_hint),
            api_bind_addr: take("API_BIND_ADDR").unwrap_or_else(default_api_bind_addr),
            log_level: take("LOG_LEVEL").unwrap_or_else(default_log_level),
            log_format: take("LOG_FORMAT").unwrap_or_else(default_log_format),
            database_url: take("DATABASE_URL").unwrap_or_else(default_database_url),
            db_max_connections: take("DB_MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_db_max_connections),
            db_acquire_timeout_ms: take("DB_ACQUIRE_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_db_acquire_timeout_ms),
            project_id: take("PROJECT_ID").unwrap_or_else(default_project_id),
            service_id: take("SERVICE_ID").unwrap_or_else(default_service_id),
            docuseal,
            n8n,
        };

        config.validate()?;

        match config.bind_addr() {
            Ok(_) => Ok(config),
            Err(source) => Err(ConfigError::InvalidBindAddr {
                value: config.api_bind_addr.clone(),
                source,
            }),
        }
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var("PORTAL_PROFILE")
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix("PORTAL_") {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
