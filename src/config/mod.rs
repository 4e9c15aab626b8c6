//! Process configuration, resolved once at startup and injected into the core.
//!
//! Loaded from a TOML file whose sections all have defaults; secrets are then
//! overridden from the environment:
//! - `HUBSPOT_CLIENT_ID`
//! - `HUBSPOT_CLIENT_SECRET`
//! - `HUBSPOT_REDIRECT_URI`
//! - `HUBSPOT_ENCRYPTION_KEY` (base64, 32 bytes; SQLite store only)

use crate::connectors::hubspot::config::{AUTH_URL, BASE_URL, SCOPES, TOKEN_URL};
use crate::credentials::CredentialPolicy;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Complete service configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinkConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub oauth: OAuthClientConfig,
    #[serde(default)]
    pub flow: FlowConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Origins allowed by CORS (the frontend that opens the consent window)
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            cors_origins: default_cors_origins(),
        }
    }
}

/// OAuth client registration with HubSpot
#[derive(Clone, Deserialize)]
pub struct OAuthClientConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
}

fn default_redirect_uri() -> String {
    "http://localhost:8000/integrations/hubspot/oauth2callback".to_string()
}

fn default_scopes() -> Vec<String> {
    SCOPES.iter().map(|s| s.to_string()).collect()
}

fn default_auth_url() -> String {
    AUTH_URL.to_string()
}

fn default_token_url() -> String {
    TOKEN_URL.to_string()
}

impl Default for OAuthClientConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: default_redirect_uri(),
            scopes: default_scopes(),
            auth_url: default_auth_url(),
            token_url: default_token_url(),
        }
    }
}

// Keeps the client secret out of logs.
impl std::fmt::Debug for OAuthClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .finish()
    }
}

/// Lifetimes of stored OAuth records and the credential read policy
#[derive(Debug, Clone, Deserialize)]
pub struct FlowConfig {
    #[serde(default = "default_state_ttl")]
    pub state_ttl_seconds: u64,
    #[serde(default = "default_credentials_ttl")]
    pub credentials_ttl_seconds: u64,
    #[serde(default)]
    pub credential_policy: CredentialPolicy,
}

fn default_state_ttl() -> u64 {
    600
}

fn default_credentials_ttl() -> u64 {
    3600
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            state_ttl_seconds: default_state_ttl(),
            credentials_ttl_seconds: default_credentials_ttl(),
            credential_policy: CredentialPolicy::default(),
        }
    }
}

/// HubSpot listing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Records requested per page (`limit`)
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Ceiling on pages walked per endpoint
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    /// Timeout applied to every outbound HTTP request
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_api_base_url() -> String {
    BASE_URL.to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_max_pages() -> usize {
    500
}

fn default_timeout() -> u64 {
    30
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            request_timeout_seconds: default_timeout(),
        }
    }
}

/// Key-value store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sqlite,
}

/// Key-value store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
    /// How often expired entries are purged
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
    /// Base64 master key, normally supplied via `HUBSPOT_ENCRYPTION_KEY`
    #[serde(skip)]
    pub encryption_key: Option<String>,
}

fn default_sqlite_path() -> String {
    "hubspot-link.db".to_string()
}

fn default_cleanup_interval() -> u64 {
    60
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            sqlite_path: default_sqlite_path(),
            cleanup_interval_seconds: default_cleanup_interval(),
            encryption_key: None,
        }
    }
}

impl LinkConfig {
    /// Parse configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse configuration")
    }

    /// Load configuration from a TOML file; a missing file yields defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&contents)
    }

    /// Apply secret overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary lookup (the environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("HUBSPOT_CLIENT_ID") {
            self.oauth.client_id = v;
        }
        if let Some(v) = lookup("HUBSPOT_CLIENT_SECRET") {
            self.oauth.client_secret = v;
        }
        if let Some(v) = lookup("HUBSPOT_REDIRECT_URI") {
            self.oauth.redirect_uri = v;
        }
        if let Some(v) = lookup("HUBSPOT_ENCRYPTION_KEY") {
            self.store.encryption_key = Some(v);
        }
    }

    /// Reject configurations the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.oauth.client_id.trim().is_empty() {
            bail!("OAuth client id is not configured (set HUBSPOT_CLIENT_ID)");
        }
        if self.oauth.client_secret.trim().is_empty() {
            bail!("OAuth client secret is not configured (set HUBSPOT_CLIENT_SECRET)");
        }
        if self.fetch.max_pages == 0 {
            bail!("fetch.max_pages must be at least 1");
        }
        if self.store.backend == StoreBackend::Sqlite && self.store.encryption_key.is_none() {
            bail!("SQLite store requires HUBSPOT_ENCRYPTION_KEY (base64-encoded 32-byte key)");
        }
        Ok(())
    }
}
