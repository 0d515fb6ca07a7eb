//! Auth0 Management API client.
//!
//! Every authorized call asks the token cache for a management token, so a
//! warm process pays no client-credentials round trip.
//!
//! # Security
//!
//! - Tokens and temporary passwords are never logged
//! - Upstream error bodies are logged at debug level only
//! - A 401 from the API replaces the refused token in both cache tiers and
//!   the request is retried once with the replacement

use crate::models::Auth0User;
use crate::observability::metrics::record_management_request;
use common::credentials::CredentialBundle;
use common::secret::{ExposeSecret, SecretString};
use common::token_cache::{CachedToken, TokenCacheError, TokenCacheManager};
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Users per page when listing.
pub const USERS_PER_PAGE: usize = 50;

/// Auth0 returns at most 1000 users through paging.
const MAX_USER_PAGES: usize = 20;

/// Length of generated temporary passwords.
pub const TEMP_PASSWORD_LENGTH: usize = 16;

const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!@#$%^&*()-_=+";

/// Management API failures.
#[derive(Debug, Error)]
pub enum ManagementError {
    #[error("Management token unavailable: {0}")]
    Token(#[from] TokenCacheError),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Management API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Management token rejected")]
    Unauthorized,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

#[derive(Serialize)]
struct CreateUserBody<'a> {
    email: &'a str,
    given_name: &'a str,
    family_name: &'a str,
    connection: &'a str,
    email_verified: bool,
    password: &'a str,
}

#[derive(Serialize)]
struct ChangePasswordBody<'a> {
    client_id: &'a str,
    email: &'a str,
    connection: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect_uri: Option<&'a str>,
}

/// Client for the tenant's `/api/v2` endpoints.
pub struct ManagementClient {
    token_cache: Arc<TokenCacheManager>,
    credentials: Arc<CredentialBundle>,
    http_client: Client,
    base_url: String,
}

impl ManagementClient {
    /// # Errors
    ///
    /// `Configuration` if the HTTP client cannot be built.
    pub fn new(
        token_cache: Arc<TokenCacheManager>,
        credentials: Arc<CredentialBundle>,
        http_timeout: Duration,
    ) -> Result<Self, ManagementError> {
        let http_client = Client::builder()
            .timeout(http_timeout)
            .connect_timeout(Duration::from_secs(5).min(http_timeout))
            .build()
            .map_err(|e| ManagementError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        let base_url = credentials.base_url();
        Ok(Self {
            token_cache,
            credentials,
            http_client,
            base_url,
        })
    }

    /// Every user in the tenant, page by page until an empty page.
    ///
    /// # Errors
    ///
    /// See [`ManagementError`].
    #[instrument(skip_all)]
    pub async fn list_users(&self) -> Result<Vec<Auth0User>, ManagementError> {
        let url = format!("{}/api/v2/users", self.base_url);
        let mut users = Vec::new();

        for page in 0..MAX_USER_PAGES {
            let request = self.http_client.get(&url).query(&[
                ("page", page.to_string()),
                ("per_page", USERS_PER_PAGE.to_string()),
            ]);
            let response = self.authorized("list_users", request).await?;
            let batch: Vec<Auth0User> = parse_json(response).await?;

            if batch.is_empty() {
                break;
            }
            users.extend(batch);
        }

        debug!(target: "admin.services.management", count = users.len(), "Listed users");
        Ok(users)
    }

    /// First user whose email matches, ignoring ASCII case.
    ///
    /// Search hits with a different email are discarded.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` if `email` contains search query syntax; otherwise
    /// see [`ManagementError`].
    #[instrument(skip_all)]
    pub async fn find_user(&self, email: &str) -> Result<Option<Auth0User>, ManagementError> {
        if email.contains(['"', '\\', '*']) {
            return Err(ManagementError::InvalidRequest(
                "Email contains search query syntax".to_string(),
            ));
        }

        let url = format!("{}/api/v2/users", self.base_url);
        let request = self.http_client.get(&url).query(&[
            ("q", format!("email:\"{email}\"")),
            ("search_engine", "v3".to_string()),
        ]);

        let response = self.authorized("find_user", request).await?;
        let users: Vec<Auth0User> = parse_json(response).await?;
        Ok(users.into_iter().find(|user| {
            user.email
                .as_deref()
                .is_some_and(|found| found.eq_ignore_ascii_case(email))
        }))
    }

    /// Create a verified database user with a random temporary password.
    ///
    /// # Errors
    ///
    /// `Conflict` if the user exists; otherwise see [`ManagementError`].
    #[instrument(skip_all)]
    pub async fn create_user(
        &self,
        email: &str,
        given_name: &str,
        family_name: &str,
    ) -> Result<Auth0User, ManagementError> {
        let url = format!("{}/api/v2/users", self.base_url);
        let password = generate_temp_password();
        let body = CreateUserBody {
            email,
            given_name,
            family_name,
            connection: &self.credentials.connection,
            email_verified: true,
            password: password.expose_secret(),
        };

        let response = self
            .authorized("create_user", self.http_client.post(&url).json(&body))
            .await?;
        let user: Auth0User = parse_json(response).await?;
        debug!(target: "admin.services.management", user_id = %user.user_id, "User created");
        Ok(user)
    }

    /// Trigger the tenant's change-password email.
    ///
    /// Uses the public database-connection endpoint, which takes the web
    /// client id instead of a management token.
    ///
    /// # Errors
    ///
    /// `Configuration` if no web client id is configured; otherwise see
    /// [`ManagementError`].
    #[instrument(skip_all)]
    pub async fn send_password_reset_email(&self, email: &str) -> Result<(), ManagementError> {
        let client_id = self.credentials.web_client_id.as_deref().ok_or_else(|| {
            ManagementError::Configuration("AUTH0_WEB_CLIENT_ID is not set".to_string())
        })?;

        let url = format!("{}/dbconnections/change_password", self.base_url);
        let body = ChangePasswordBody {
            client_id,
            email,
            connection: &self.credentials.connection,
            redirect_uri: self.credentials.redirect_uri.as_deref(),
        };

        let start = Instant::now();
        let result = async {
            let response = self
                .http_client
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(transport_error)?;
            check_status(response).await.map(|_| ())
        }
        .await;
        record_management_request("send_password_reset", result.is_ok(), start.elapsed());
        result
    }

    /// # Errors
    ///
    /// `NotFound` if the id is unknown; otherwise see [`ManagementError`].
    #[instrument(skip_all)]
    pub async fn delete_user(&self, user_id: &str) -> Result<(), ManagementError> {
        let url = self.user_url(user_id)?;
        self.authorized("delete_user", self.http_client.delete(url))
            .await?;
        debug!(target: "admin.services.management", user_id = %user_id, "User deleted");
        Ok(())
    }

    /// Replace `app_metadata.favorites` for the user with `email`.
    ///
    /// # Errors
    ///
    /// `NotFound` if no user has that email; otherwise see
    /// [`ManagementError`].
    #[instrument(skip_all)]
    pub async fn update_user_favorites(
        &self,
        email: &str,
        favorites: &[String],
    ) -> Result<Auth0User, ManagementError> {
        let user = self
            .find_user(email)
            .await?
            .ok_or_else(|| ManagementError::NotFound("User not found".to_string()))?;

        let url = self.user_url(&user.user_id)?;
        let body = json!({ "app_metadata": { "favorites": favorites } });

        let response = self
            .authorized("update_favorites", self.http_client.patch(url).json(&body))
            .await?;
        parse_json(response).await
    }

    fn user_url(&self, user_id: &str) -> Result<Url, ManagementError> {
        let mut url = Url::parse(&format!("{}/api/v2/users", self.base_url))
            .map_err(|e| ManagementError::Configuration(format!("Invalid tenant URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| ManagementError::Configuration("Tenant URL cannot be a base".to_string()))?
            .push(user_id);
        Ok(url)
    }

    /// Attach a management token, send, and classify the status.
    async fn authorized(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, ManagementError> {
        let start = Instant::now();
        let result = self.send_authorized(operation, request).await;
        record_management_request(operation, result.is_ok(), start.elapsed());
        result
    }

    async fn send_authorized(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, ManagementError> {
        let token = self.token_cache.get_management_token().await?;
        let retry = request.try_clone();

        match send_with_token(request, &token).await {
            Err(ManagementError::Unauthorized) => {
                warn!(
                    target: "admin.services.management",
                    operation = operation,
                    "Management token rejected, replacing it"
                );
                let replacement = self.token_cache.reject(&token).await?;
                match retry {
                    Some(request) => send_with_token(request, &replacement).await,
                    None => Err(ManagementError::Unauthorized),
                }
            }
            other => other,
        }
    }
}

async fn send_with_token(
    request: RequestBuilder,
    token: &CachedToken,
) -> Result<Response, ManagementError> {
    let response = request
        .bearer_auth(token.access_token().expose_secret())
        .send()
        .await
        .map_err(transport_error)?;
    check_status(response).await
}

fn transport_error(e: reqwest::Error) -> ManagementError {
    warn!(target: "admin.services.management", error = %e, "Management API request failed");
    ManagementError::Http(e.to_string())
}

async fn check_status(response: Response) -> Result<Response, ManagementError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    debug!(
        target: "admin.services.management",
        status = %status,
        body = %body,
        "Management API error response"
    );

    Err(match status {
        StatusCode::UNAUTHORIZED => ManagementError::Unauthorized,
        StatusCode::NOT_FOUND => ManagementError::NotFound("Resource not found".to_string()),
        StatusCode::CONFLICT => ManagementError::Conflict("User already exists".to_string()),
        _ => ManagementError::Api {
            status: status.as_u16(),
            message: upstream_message(&body),
        },
    })
}

/// Auth0 error bodies carry `message`; fall back to the status line.
fn upstream_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(ToString::to_string))
        .unwrap_or_else(|| "unexpected response".to_string())
}

async fn parse_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, ManagementError> {
    response.json().await.map_err(|e| {
        warn!(target: "admin.services.management", error = %e, "Failed to parse Management API response");
        ManagementError::InvalidResponse(e.to_string())
    })
}

fn pick(set: &[u8], rng: &mut impl Rng) -> char {
    set.choose(rng).map_or('x', |&b| char::from(b))
}

/// Random password with at least one character from each class.
#[must_use]
pub fn generate_temp_password() -> SecretString {
    let mut rng = rand::thread_rng();
    let all: Vec<u8> = [LOWERCASE, UPPERCASE, DIGITS, SYMBOLS].concat();

    let mut chars: Vec<char> = [LOWERCASE, UPPERCASE, DIGITS, SYMBOLS]
        .iter()
        .map(|set| pick(set, &mut rng))
        .collect();
    while chars.len() < TEMP_PASSWORD_LENGTH {
        chars.push(pick(&all, &mut rng));
    }
    chars.shuffle(&mut rng);

    SecretString::from(chars.into_iter().collect::<String>())
}
