//! HTTP routes for the admin service.
//!
//! Defines the Axum router and application state.

use crate::auth::{
    AudiencePolicy, GatewayAuthorizer, JwksClient, JwtValidator, ValidatorConfig,
};
use crate::config::Config;
use crate::errors::StartupError;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_admin, track_activity, AuthState};
use crate::services::ManagementClient;
use crate::tasks::ActivityTracker;
use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use common::credentials::CredentialBundle;
use common::parameter_store::ParameterStore;
use common::token_cache::{TokenCacheConfig, TokenCacheManager};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Per-request timeout applied to every route.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,

    /// Process-wide management token cache.
    pub token_cache: Arc<TokenCacheManager>,

    /// Auth0 Management API client.
    pub management: Arc<ManagementClient>,

    /// Gateway authorizer (`/authorize`), accepting admin and viewer audiences.
    pub authorizer: Arc<GatewayAuthorizer>,

    /// Admin-only guard for `/admin-api`.
    pub admin_auth: Arc<AuthState>,

    /// Last request time, read by the idle shutdown task.
    pub activity: Arc<ActivityTracker>,
}

impl AppState {
    /// Wire the token cache, Management API client and token validator.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(
        config: Config,
        credentials: CredentialBundle,
        store: Arc<dyn ParameterStore>,
    ) -> Result<Self, StartupError> {
        let credentials = Arc::new(credentials);

        let cache_config = TokenCacheConfig::default()
            .with_parameter_name(config.token_cache_parameter.clone())
            .with_safety_buffer(config.token_safety_buffer)
            .with_store_timeout(config.parameter_store_timeout)
            .with_http_timeout(config.http_timeout);
        let token_cache = Arc::new(TokenCacheManager::new(
            cache_config,
            credentials.clone(),
            store,
        )?);

        let management = Arc::new(ManagementClient::new(
            token_cache.clone(),
            credentials.clone(),
            config.http_timeout,
        )?);

        let jwks_client = Arc::new(JwksClient::new(
            config.jwks_url_for(&credentials.domain),
            config.http_timeout,
        ));
        let validator_config = ValidatorConfig::new(
            config.issuer_for(&credentials.domain),
            vec![config.admin_audience.clone(), config.viewer_audience.clone()],
        )
        .with_leeway(config.jwt_leeway)
        .with_roles_claim(config.roles_claim.clone());
        let validator = Arc::new(JwtValidator::new(jwks_client, validator_config));

        let authorizer = Arc::new(GatewayAuthorizer::new(
            validator.clone(),
            AudiencePolicy::gateway(
                &config.admin_audience,
                &config.admin_role,
                &config.viewer_audience,
            ),
        ));
        let admin_auth = Arc::new(AuthState {
            validator,
            policy: AudiencePolicy::admin_only(&config.admin_audience, &config.admin_role),
        });

        Ok(Self {
            config,
            token_cache,
            management,
            authorizer,
            admin_auth,
            activity: Arc::new(ActivityTracker::new()),
        })
    }
}

/// Build the application routes.
///
/// - `/v1/health` - Health with token cache status (public)
/// - `/metrics` - Prometheus metrics (public)
/// - `/authorize` - Gateway authorizer (public, answers with a policy)
/// - `/admin-api/users` - List, invite, delete (admin)
/// - `/admin-api/user/favorites` - Update favorites (admin)
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let public_routes = Router::new()
        .route("/v1/health", get(handlers::health_check))
        .route("/authorize", post(handlers::authorize))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let protected_routes = Router::new()
        .route(
            "/admin-api/users",
            get(handlers::list_users)
                .post(handlers::invite_user)
                .delete(handlers::delete_user),
        )
        .route(
            "/admin-api/user/favorites",
            patch(handlers::update_favorites),
        )
        .route_layer(middleware::from_fn_with_state(
            state.admin_auth.clone(),
            require_admin,
        ))
        .with_state(state.clone());

    // Layer order (innermost first): activity, trace, timeout, metrics
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(middleware::from_fn_with_state(
            state.activity.clone(),
            track_activity,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(middleware::from_fn(http_metrics_middleware))
}
