//! Auth0 credential bundle.
//!
//! The bundle carries the machine-to-machine client used for the
//! client-credentials exchange, plus the few tenant settings the
//! Management API operations need. It is loaded once per process, either
//! from `AUTH0_*` environment variables or from a JSON parameter in the
//! durable store, and never changes afterwards.

use crate::parameter_store::{ParameterStore, StoreError};
use crate::secret::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Parameter holding the credential bundle JSON.
pub const DEFAULT_CREDENTIALS_PARAMETER: &str = "/cruise-admin/prod/auth0-credentials";

/// Auth0 database connection used for invited users.
pub const DEFAULT_CONNECTION: &str = "Username-Password-Authentication";

/// Errors loading a credential bundle.
#[derive(Error, Debug)]
pub enum CredentialError {
    /// A required field is absent or empty.
    #[error("Missing credential field: {0}")]
    MissingField(&'static str),

    /// The parameter does not exist.
    #[error("Credential parameter not found: {0}")]
    NotFound(String),

    /// The parameter could not be read.
    #[error("Credential parameter unreadable: {0}")]
    Store(#[from] StoreError),

    /// The parameter is not a JSON object of the expected shape.
    #[error("Invalid credential bundle: {0}")]
    Invalid(String),
}

/// Auth0 tenant and machine-to-machine client settings.
#[derive(Clone)]
pub struct CredentialBundle {
    /// Tenant domain (`tenant.us.auth0.com`) or full base URL.
    pub domain: String,
    /// Machine-to-machine client id.
    pub client_id: String,
    /// Machine-to-machine client secret.
    pub client_secret: SecretString,
    /// Audience requested in the exchange.
    pub audience: String,
    /// Public web client, used for password-change emails.
    pub web_client_id: Option<String>,
    /// Database connection for new users.
    pub connection: String,
    /// Where the password-change flow sends users afterwards.
    pub redirect_uri: Option<String>,
}

impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("domain", &self.domain)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("audience", &self.audience)
            .field("web_client_id", &self.web_client_id)
            .field("connection", &self.connection)
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

/// Wire shape of the stored bundle. Keys may use either the environment
/// variable names or the plain field names.
#[derive(Deserialize)]
struct RawBundle {
    #[serde(alias = "AUTH0_DOMAIN")]
    domain: Option<String>,
    #[serde(alias = "AUTH0_CLIENT_ID")]
    client_id: Option<String>,
    #[serde(alias = "AUTH0_CLIENT_SECRET")]
    client_secret: Option<SecretString>,
    #[serde(alias = "AUTH0_AUDIENCE")]
    audience: Option<String>,
    #[serde(alias = "AUTH0_WEB_CLIENT_ID")]
    web_client_id: Option<String>,
    #[serde(alias = "AUTH0_CONNECTION")]
    connection: Option<String>,
    #[serde(alias = "REDIRECT_URI")]
    redirect_uri: Option<String>,
}

impl RawBundle {
    fn into_bundle(self) -> Result<CredentialBundle, CredentialError> {
        let domain = required(self.domain, "AUTH0_DOMAIN")?;
        let client_id = required(self.client_id, "AUTH0_CLIENT_ID")?;
        let client_secret = self
            .client_secret
            .filter(|s| !s.expose_secret().trim().is_empty())
            .ok_or(CredentialError::MissingField("AUTH0_CLIENT_SECRET"))?;

        let mut bundle = CredentialBundle::new(domain, client_id, client_secret);
        if let Some(audience) = non_empty(self.audience) {
            bundle.audience = audience;
        }
        if let Some(connection) = non_empty(self.connection) {
            bundle.connection = connection;
        }
        bundle.web_client_id = non_empty(self.web_client_id);
        bundle.redirect_uri = non_empty(self.redirect_uri);
        Ok(bundle)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(value: Option<String>, field: &'static str) -> Result<String, CredentialError> {
    non_empty(value).ok_or(CredentialError::MissingField(field))
}

impl CredentialBundle {
    /// Create a bundle with the default audience and connection.
    #[must_use]
    pub fn new(domain: String, client_id: String, client_secret: SecretString) -> Self {
        let audience = default_audience(&domain);
        Self {
            domain,
            client_id,
            client_secret,
            audience,
            web_client_id: None,
            connection: DEFAULT_CONNECTION.to_string(),
            redirect_uri: None,
        }
    }

    /// Override the requested audience.
    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = audience.into();
        self
    }

    /// Set the web client used for password-change emails.
    #[must_use]
    pub fn with_web_client_id(mut self, web_client_id: impl Into<String>) -> Self {
        self.web_client_id = Some(web_client_id.into());
        self
    }

    /// Set the post-reset redirect.
    #[must_use]
    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    /// Base URL of the tenant, without trailing slash.
    ///
    /// A bare domain implies `https://`; a value that already carries a
    /// scheme is used as given.
    #[must_use]
    pub fn base_url(&self) -> String {
        base_url(&self.domain)
    }

    /// The client-credentials token endpoint.
    #[must_use]
    pub fn token_url(&self) -> String {
        format!("{}/oauth/token", self.base_url())
    }

    /// Parse a bundle from its stored JSON form.
    ///
    /// # Errors
    ///
    /// `Invalid` for malformed JSON, `MissingField` for absent values.
    pub fn from_json(raw: &str) -> Result<Self, CredentialError> {
        let raw: RawBundle =
            serde_json::from_str(raw).map_err(|e| CredentialError::Invalid(e.to_string()))?;
        raw.into_bundle()
    }

    /// Build a bundle from `AUTH0_*` variables.
    ///
    /// Returns `Ok(None)` when none of the three required variables is set,
    /// so the caller can fall back to the parameter store.
    ///
    /// # Errors
    ///
    /// `MissingField` when only some of the required variables are set.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Option<Self>, CredentialError> {
        let get = |key: &str| vars.get(key).cloned();

        let required_keys = ["AUTH0_DOMAIN", "AUTH0_CLIENT_ID", "AUTH0_CLIENT_SECRET"];
        if required_keys.iter().all(|k| non_empty(get(k)).is_none()) {
            return Ok(None);
        }

        RawBundle {
            domain: get("AUTH0_DOMAIN"),
            client_id: get("AUTH0_CLIENT_ID"),
            client_secret: get("AUTH0_CLIENT_SECRET").map(SecretString::from),
            audience: get("AUTH0_AUDIENCE"),
            web_client_id: get("AUTH0_WEB_CLIENT_ID"),
            connection: get("AUTH0_CONNECTION"),
            redirect_uri: get("REDIRECT_URI"),
        }
        .into_bundle()
        .map(Some)
    }

    /// Load the bundle from a parameter, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// `NotFound` if the parameter is absent, `Store` if it cannot be read
    /// in time, `Invalid`/`MissingField` if its contents are unusable.
    #[tracing::instrument(skip(store))]
    pub async fn load(
        store: &dyn ParameterStore,
        name: &str,
        timeout: Duration,
    ) -> Result<Self, CredentialError> {
        let raw = tokio::time::timeout(timeout, store.get(name))
            .await
            .map_err(|_| StoreError::Timeout(timeout))??
            .ok_or_else(|| CredentialError::NotFound(name.to_string()))?;

        let bundle = Self::from_json(&raw)?;

        info!(
            target: "common.credentials",
            parameter = %name,
            domain = %bundle.domain,
            client_id = %bundle.client_id,
            "Loaded Auth0 credential bundle"
        );
        debug!(target: "common.credentials", audience = %bundle.audience, "Credential audience");

        Ok(bundle)
    }
}

/// `https://{domain}` unless the domain already names a scheme.
#[must_use]
pub fn base_url(domain: &str) -> String {
    let domain = domain.trim().trim_end_matches('/');
    if domain.contains("://") {
        domain.to_string()
    } else {
        format!("https://{domain}")
    }
}

/// The Management API audience for a tenant.
#[must_use]
pub fn default_audience(domain: &str) -> String {
    format!("{}/api/v2/", base_url(domain))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::parameter_store::testing::MockParameterStore;

    const LOAD_TIMEOUT: Duration = Duration::from_secs(1);

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_new_applies_defaults() {
        let bundle = CredentialBundle::new(
            "tenant.us.auth0.com".to_string(),
            "m2m".to_string(),
            SecretString::from("secret"),
        );

        assert_eq!(bundle.audience, "https://tenant.us.auth0.com/api/v2/");
        assert_eq!(bundle.connection, DEFAULT_CONNECTION);
        assert_eq!(bundle.token_url(), "https://tenant.us.auth0.com/oauth/token");
        assert!(bundle.web_client_id.is_none());
    }

    #[test]
    fn test_base_url_keeps_explicit_scheme() {
        assert_eq!(base_url("http://127.0.0.1:9999/"), "http://127.0.0.1:9999");
        assert_eq!(base_url("tenant.auth0.com"), "https://tenant.auth0.com");
    }

    #[test]
    fn test_from_json_with_env_style_keys() {
        let json = r#"{
            "AUTH0_DOMAIN": "tenant.us.auth0.com",
            "AUTH0_CLIENT_ID": "m2m",
            "AUTH0_CLIENT_SECRET": "s3cr3t",
            "AUTH0_WEB_CLIENT_ID": "web",
            "REDIRECT_URI": "https://admin.example.com"
        }"#;

        let bundle = CredentialBundle::from_json(json).unwrap();
        assert_eq!(bundle.domain, "tenant.us.auth0.com");
        assert_eq!(bundle.client_secret.expose_secret(), "s3cr3t");
        assert_eq!(bundle.web_client_id.as_deref(), Some("web"));
        assert_eq!(
            bundle.redirect_uri.as_deref(),
            Some("https://admin.example.com")
        );
    }

    #[test]
    fn test_from_json_with_field_names_and_audience() {
        let json = r#"{"domain":"d.auth0.com","client_id":"c","client_secret":"s","audience":"https://custom"}"#;
        let bundle = CredentialBundle::from_json(json).unwrap();
        assert_eq!(bundle.audience, "https://custom");
    }

    #[test]
    fn test_from_json_missing_secret() {
        let json = r#"{"AUTH0_DOMAIN":"d","AUTH0_CLIENT_ID":"c","AUTH0_CLIENT_SECRET":"  "}"#;
        assert!(matches!(
            CredentialBundle::from_json(json),
            Err(CredentialError::MissingField("AUTH0_CLIENT_SECRET"))
        ));
    }

    #[test]
    fn test_from_json_not_json() {
        assert!(matches!(
            CredentialBundle::from_json("plain text"),
            Err(CredentialError::Invalid(_))
        ));
    }

    #[test]
    fn test_from_vars_absent_returns_none() {
        let result = CredentialBundle::from_vars(&vars(&[("BIND_ADDRESS", "0.0.0.0:8080")]));
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn test_from_vars_partial_is_error() {
        let result = CredentialBundle::from_vars(&vars(&[("AUTH0_DOMAIN", "d.auth0.com")]));
        assert!(matches!(
            result,
            Err(CredentialError::MissingField("AUTH0_CLIENT_ID"))
        ));
    }

    #[test]
    fn test_from_vars_complete() {
        let bundle = CredentialBundle::from_vars(&vars(&[
            ("AUTH0_DOMAIN", "d.auth0.com"),
            ("AUTH0_CLIENT_ID", "c"),
            ("AUTH0_CLIENT_SECRET", "s"),
            ("AUTH0_CONNECTION", "Custom-DB"),
        ]))
        .unwrap()
        .unwrap();

        assert_eq!(bundle.connection, "Custom-DB");
        assert_eq!(bundle.audience, "https://d.auth0.com/api/v2/");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let bundle = CredentialBundle::new(
            "d".to_string(),
            "c".to_string(),
            SecretString::from("do-not-print"),
        );
        let debug = format!("{bundle:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("do-not-print"));
    }

    #[tokio::test]
    async fn test_load_from_store() {
        let store = MockParameterStore::new().with_value(
            DEFAULT_CREDENTIALS_PARAMETER,
            r#"{"AUTH0_DOMAIN":"d","AUTH0_CLIENT_ID":"c","AUTH0_CLIENT_SECRET":"s"}"#,
        );

        let bundle = CredentialBundle::load(&store, DEFAULT_CREDENTIALS_PARAMETER, LOAD_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(bundle.client_id, "c");
        assert_eq!(store.get_calls(), 1);
    }

    #[tokio::test]
    async fn test_load_missing_parameter() {
        let store = MockParameterStore::new();
        let result = CredentialBundle::load(&store, "/nope", LOAD_TIMEOUT).await;
        assert!(matches!(result, Err(CredentialError::NotFound(name)) if name == "/nope"));
    }

    #[tokio::test]
    async fn test_load_store_failure() {
        let store = MockParameterStore::new();
        store.fail_gets(true);
        let result = CredentialBundle::load(&store, "/p", LOAD_TIMEOUT).await;
        assert!(matches!(result, Err(CredentialError::Store(_))));
    }

    #[tokio::test]
    async fn test_load_gives_up_on_stalled_store() {
        let store = MockParameterStore::new()
            .with_value(
                "/slow",
                r#"{"AUTH0_DOMAIN":"d","AUTH0_CLIENT_ID":"c","AUTH0_CLIENT_SECRET":"s"}"#,
            )
            .with_get_delay(Duration::from_secs(5));

        let started = std::time::Instant::now();
        let result = CredentialBundle::load(&store, "/slow", Duration::from_millis(50)).await;

        assert!(matches!(
            result,
            Err(CredentialError::Store(StoreError::Timeout(_)))
        ));
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
