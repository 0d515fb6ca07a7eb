//! Admin service configuration.
//!
//! Configuration is loaded from environment variables. All sensitive
//! fields are redacted in Debug output.

use common::credentials::{CredentialBundle, CredentialError, DEFAULT_CREDENTIALS_PARAMETER};
use common::jwt::{DEFAULT_LEEWAY, MAX_LEEWAY};
use common::parameter_store::DEFAULT_REGION;
use common::token_cache::{DEFAULT_SAFETY_BUFFER, DEFAULT_STORE_TIMEOUT, DEFAULT_TOKEN_PARAMETER};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Audience whose tokens must carry the admin role.
pub const DEFAULT_ADMIN_AUDIENCE: &str = "https://cruise-admin-api";

/// Audience open to any authenticated user.
pub const DEFAULT_VIEWER_AUDIENCE: &str = "https://cruise-viewer-api";

/// Namespaced claim carrying roles.
pub const DEFAULT_ROLES_CLAIM: &str = "https://cruise-viewer.app/roles";

/// Role required on the admin audience.
pub const DEFAULT_ADMIN_ROLE: &str = "admin";

/// Default outbound HTTP timeout in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 10;

/// Upper bound for the token safety buffer (one day).
const MAX_SAFETY_BUFFER_SECONDS: u64 = 86_400;

/// Where the parameter store lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// AWS Systems Manager Parameter Store.
    Ssm,
    /// Process-local map.
    Memory,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

/// Admin service configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// AWS region for the parameter store.
    pub aws_region: String,

    /// Parameter store backend.
    pub store_backend: StoreBackend,

    /// Optional SSM endpoint override.
    pub aws_endpoint_url: Option<String>,

    /// Parameter holding the Auth0 credential bundle.
    pub credentials_parameter: String,

    /// Parameter holding the shared management token.
    pub token_cache_parameter: String,

    /// Margin before token expiry at which a cached token is refreshed.
    pub token_safety_buffer: Duration,

    /// Bound on each parameter store call.
    pub parameter_store_timeout: Duration,

    /// Bound on each outbound HTTP request.
    pub http_timeout: Duration,

    /// Expected `iss`; derived from the tenant domain when unset.
    pub auth0_issuer: Option<String>,

    /// JWKS endpoint; derived from the tenant domain when unset.
    pub auth0_jwks_url: Option<String>,

    /// Audience requiring the admin role.
    pub admin_audience: String,

    /// Audience allowing any authenticated principal.
    pub viewer_audience: String,

    /// Claim carrying roles.
    pub roles_claim: String,

    /// Role required on the admin audience.
    pub admin_role: String,

    /// Leeway for `exp`/`nbf` checks.
    pub jwt_leeway: Duration,

    /// Shut down after this much inactivity; `None` disables.
    pub idle_shutdown: Option<Duration>,

    /// Log output format.
    pub log_format: LogFormat,

    /// Credentials supplied directly through the environment.
    pub credentials: Option<CredentialBundle>,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("aws_region", &self.aws_region)
            .field("store_backend", &self.store_backend)
            .field("aws_endpoint_url", &self.aws_endpoint_url)
            .field("credentials_parameter", &self.credentials_parameter)
            .field("token_cache_parameter", &self.token_cache_parameter)
            .field("token_safety_buffer", &self.token_safety_buffer)
            .field("parameter_store_timeout", &self.parameter_store_timeout)
            .field("http_timeout", &self.http_timeout)
            .field("auth0_issuer", &self.auth0_issuer)
            .field("auth0_jwks_url", &self.auth0_jwks_url)
            .field("admin_audience", &self.admin_audience)
            .field("viewer_audience", &self.viewer_audience)
            .field("roles_claim", &self.roles_claim)
            .field("admin_role", &self.admin_role)
            .field("jwt_leeway", &self.jwt_leeway)
            .field("idle_shutdown", &self.idle_shutdown)
            .field("log_format", &self.log_format)
            .field(
                "credentials",
                &self.credentials.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid numeric configuration: {0}")]
    InvalidNumber(String),

    #[error("Invalid configuration choice: {0}")]
    InvalidChoice(String),

    #[error("Invalid JWT leeway configuration: {0}")]
    InvalidJwtLeeway(String),

    #[error("Invalid credential configuration: {0}")]
    Credentials(#[from] CredentialError),
}

/// Parse an optional unsigned integer variable, enforcing `min..=max`.
fn parse_u64(
    vars: &HashMap<String, String>,
    key: &str,
    default: u64,
    min: u64,
    max: u64,
) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(key) else {
        return Ok(default);
    };

    let value: u64 = value_str.trim().parse().map_err(|e| {
        ConfigError::InvalidNumber(format!(
            "{key} must be a valid non-negative integer, got '{value_str}': {e}"
        ))
    })?;

    if value < min || value > max {
        return Err(ConfigError::InvalidNumber(format!(
            "{key} must be between {min} and {max}, got {value}"
        )));
    }

    Ok(value)
}

fn string_or(vars: &HashMap<String, String>, key: &str, default: &str) -> String {
    vars.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}

fn optional_string(vars: &HashMap<String, String>, key: &str) -> Option<String> {
    vars.get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// See [`Config::from_vars`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a map (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for unparseable or out-of-range values and for
    /// a partially specified credential set.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let store_backend = match string_or(vars, "PARAMETER_STORE_BACKEND", "ssm")
            .to_ascii_lowercase()
            .as_str()
        {
            "ssm" => StoreBackend::Ssm,
            "memory" => StoreBackend::Memory,
            other => {
                return Err(ConfigError::InvalidChoice(format!(
                    "PARAMETER_STORE_BACKEND must be 'ssm' or 'memory', got '{other}'"
                )))
            }
        };

        let log_format = match string_or(vars, "LOG_FORMAT", "text")
            .to_ascii_lowercase()
            .as_str()
        {
            "text" => LogFormat::Text,
            "json" => LogFormat::Json,
            other => {
                return Err(ConfigError::InvalidChoice(format!(
                    "LOG_FORMAT must be 'text' or 'json', got '{other}'"
                )))
            }
        };

        let token_safety_buffer = Duration::from_secs(parse_u64(
            vars,
            "TOKEN_SAFETY_BUFFER_SECONDS",
            DEFAULT_SAFETY_BUFFER.as_secs(),
            1,
            MAX_SAFETY_BUFFER_SECONDS - 1,
        )?);

        let store_timeout_ms = u64::try_from(DEFAULT_STORE_TIMEOUT.as_millis()).unwrap_or(3000);
        let parameter_store_timeout = Duration::from_millis(parse_u64(
            vars,
            "PARAMETER_STORE_TIMEOUT_MS",
            store_timeout_ms,
            1,
            60_000,
        )?);

        let http_timeout = Duration::from_secs(parse_u64(
            vars,
            "HTTP_TIMEOUT_SECONDS",
            DEFAULT_HTTP_TIMEOUT_SECONDS,
            1,
            120,
        )?);

        // Leeway gets its own error variant so operators see which bound they hit
        let jwt_leeway = if let Some(value_str) = vars.get("JWT_LEEWAY_SECONDS") {
            let value: u64 = value_str.trim().parse().map_err(|e| {
                ConfigError::InvalidJwtLeeway(format!(
                    "JWT_LEEWAY_SECONDS must be a valid non-negative integer, got '{value_str}': {e}"
                ))
            })?;

            if value > MAX_LEEWAY.as_secs() {
                return Err(ConfigError::InvalidJwtLeeway(format!(
                    "JWT_LEEWAY_SECONDS must not exceed {} seconds, got {value}",
                    MAX_LEEWAY.as_secs()
                )));
            }

            Duration::from_secs(value)
        } else {
            DEFAULT_LEEWAY
        };

        let idle_minutes = parse_u64(vars, "IDLE_SHUTDOWN_MINUTES", 0, 0, 7 * 24 * 60)?;
        let idle_shutdown = (idle_minutes > 0).then(|| Duration::from_secs(idle_minutes * 60));

        let credentials = CredentialBundle::from_vars(vars)?;

        Ok(Config {
            bind_address: string_or(vars, "BIND_ADDRESS", DEFAULT_BIND_ADDRESS),
            aws_region: string_or(vars, "AWS_REGION", DEFAULT_REGION),
            store_backend,
            aws_endpoint_url: optional_string(vars, "AWS_ENDPOINT_URL"),
            credentials_parameter: string_or(
                vars,
                "AUTH0_CREDENTIALS_PARAMETER",
                DEFAULT_CREDENTIALS_PARAMETER,
            ),
            token_cache_parameter: string_or(vars, "TOKEN_CACHE_PARAMETER", DEFAULT_TOKEN_PARAMETER),
            token_safety_buffer,
            parameter_store_timeout,
            http_timeout,
            auth0_issuer: optional_string(vars, "AUTH0_ISSUER"),
            auth0_jwks_url: optional_string(vars, "AUTH0_JWKS_URL"),
            admin_audience: string_or(vars, "AUTH0_ADMIN_AUDIENCE", DEFAULT_ADMIN_AUDIENCE),
            viewer_audience: string_or(vars, "AUTH0_VIEWER_AUDIENCE", DEFAULT_VIEWER_AUDIENCE),
            roles_claim: string_or(vars, "AUTH0_ROLES_CLAIM", DEFAULT_ROLES_CLAIM),
            admin_role: string_or(vars, "ADMIN_ROLE", DEFAULT_ADMIN_ROLE),
            jwt_leeway,
            idle_shutdown,
            log_format,
            credentials,
        })
    }

    /// Expected token issuer for a tenant domain.
    #[must_use]
    pub fn issuer_for(&self, domain: &str) -> String {
        self.auth0_issuer
            .clone()
            .unwrap_or_else(|| format!("{}/", common::credentials::base_url(domain)))
    }

    /// JWKS endpoint for a tenant domain.
    #[must_use]
    pub fn jwks_url_for(&self, domain: &str) -> String {
        self.auth0_jwks_url.clone().unwrap_or_else(|| {
            format!(
                "{}/.well-known/jwks.json",
                common::credentials::base_url(domain)
            )
        })
    }
}
