//! Test server harness for E2E testing
//!
//! Provides `TestAdminServer`, a real admin service bound to a random port
//! and pointed at a `MockIdentityProvider`.

use crate::mock_auth0::MockIdentityProvider;
use crate::token_builders::{ADMIN_AUDIENCE, ROLES_CLAIM, VIEWER_AUDIENCE};
use admin_service::config::Config;
use admin_service::routes::{self, AppState};
use common::parameter_store::testing::MockParameterStore;
use common::parameter_store::ParameterStore;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub const TEST_CLIENT_ID: &str = "test-m2m-client";
pub const TEST_CLIENT_SECRET: &str = "test-m2m-secret";
pub const TEST_WEB_CLIENT_ID: &str = "test-web-client";

/// Admin service running against a mocked tenant.
///
/// # Example
/// ```rust,ignore
/// let idp = MockIdentityProvider::start().await;
/// let server = TestAdminServer::spawn(&idp).await?;
///
/// let response = reqwest::get(format!("{}/v1/health", server.url())).await?;
/// assert_eq!(response.status(), 200);
/// ```
pub struct TestAdminServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    store: Arc<MockParameterStore>,
    _handle: JoinHandle<()>,
}

impl TestAdminServer {
    /// Spawn with the default test configuration.
    pub async fn spawn(idp: &MockIdentityProvider) -> Result<Self, anyhow::Error> {
        Self::spawn_with(idp, &[]).await
    }

    /// Spawn with extra configuration variables layered over the defaults.
    pub async fn spawn_with(
        idp: &MockIdentityProvider,
        overrides: &[(&str, &str)],
    ) -> Result<Self, anyhow::Error> {
        let mut vars: HashMap<String, String> = [
            ("BIND_ADDRESS", "127.0.0.1:0"),
            ("PARAMETER_STORE_BACKEND", "memory"),
            ("AUTH0_CLIENT_ID", TEST_CLIENT_ID),
            ("AUTH0_CLIENT_SECRET", TEST_CLIENT_SECRET),
            ("AUTH0_WEB_CLIENT_ID", TEST_WEB_CLIENT_ID),
            ("AUTH0_ADMIN_AUDIENCE", ADMIN_AUDIENCE),
            ("AUTH0_VIEWER_AUDIENCE", VIEWER_AUDIENCE),
            ("AUTH0_ROLES_CLAIM", ROLES_CLAIM),
            ("HTTP_TIMEOUT_SECONDS", "2"),
        ]
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
        vars.insert("AUTH0_DOMAIN".to_string(), idp.uri());
        for (k, v) in overrides {
            vars.insert((*k).to_string(), (*v).to_string());
        }

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;
        let credentials = config
            .credentials
            .clone()
            .ok_or_else(|| anyhow::anyhow!("Test config has no credentials"))?;

        let store = Arc::new(MockParameterStore::new());
        let state = Arc::new(
            AppState::new(config, credentials, store.clone() as Arc<dyn ParameterStore>)
                .map_err(|e| anyhow::anyhow!("Failed to create state: {}", e))?,
        );

        // Not installed globally, so parallel tests don't collide
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();
        let app = routes::build_routes(state.clone(), metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;
        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            state,
            store,
            _handle: handle,
        })
    }

    /// Base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shared state, for inspecting the token cache.
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// The parameter store behind the token cache.
    pub fn store(&self) -> &Arc<MockParameterStore> {
        &self.store
    }
}

impl Drop for TestAdminServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
