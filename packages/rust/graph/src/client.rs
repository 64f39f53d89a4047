//! HTTP client for a Fuseki-style SPARQL triple store.
//!
//! Updates and queries are synchronous from the projector's perspective: one
//! `INSERT DATA` statement per POST, no batching across articles, no
//! transactions. The store offers none, which is exactly why a partially
//! failed projection run leaves the graph behind the relational store.
//!
//! The client also runs an optional background liveness probe on a fixed
//! interval. The probe is observational only: its failures are logged and
//! never influence update/query calls, and the task is cancelled when the
//! client is dropped.

use std::time::Duration;

use moralgraph_shared::{GraphStoreConfig, MoralGraphError, Result};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default liveness probe interval.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);

/// Client for one triple-store dataset.
pub struct FusekiClient {
    http: reqwest::Client,
    query_url: String,
    update_url: String,
    user: Option<String>,
    password: Option<String>,
    heartbeat: Option<JoinHandle<()>>,
}

impl FusekiClient {
    /// Build a client from config. Endpoint gets an `http://` scheme when
    /// none is given; query/update URLs follow the Fuseki dataset layout.
    pub fn new(config: &GraphStoreConfig) -> Result<Self> {
        let mut endpoint = config.endpoint.trim_end_matches('/').to_string();
        if !endpoint.starts_with("http") {
            endpoint = format!("http://{endpoint}");
        }
        let dataset = config.dataset.trim_matches('/');
        if dataset.is_empty() {
            return Err(MoralGraphError::config("graph store dataset is empty"));
        }

        let base = format!("{endpoint}:{}/{dataset}", config.port);

        let http = reqwest::Client::builder()
            .user_agent(concat!("moralgraph/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| MoralGraphError::Projection(format!("client build: {e}")))?;

        Ok(Self {
            http,
            query_url: format!("{base}/query"),
            update_url: format!("{base}/update"),
            user: config.user.clone(),
            password: config.password(),
            heartbeat: None,
        })
    }

    /// Build a client pointing at an explicit base URL (tests, mock servers).
    pub fn for_base_url(base: &str) -> Result<Self> {
        let base = base.trim_end_matches('/');
        let http = reqwest::Client::builder()
            .user_agent(concat!("moralgraph/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MoralGraphError::Projection(format!("client build: {e}")))?;

        Ok(Self {
            http,
            query_url: format!("{base}/query"),
            update_url: format!("{base}/update"),
            user: None,
            password: None,
            heartbeat: None,
        })
    }

    /// POST one SPARQL update statement. Non-2xx responses are failures.
    pub async fn send_update(&self, update: &str) -> Result<()> {
        debug!(statement = update, "sending graph update");

        let mut request = self
            .http
            .post(&self.update_url)
            .header("Content-Type", "application/sparql-update")
            .body(update.to_string());

        if let Some(user) = &self.user {
            request = request.basic_auth(user, self.password.as_deref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| MoralGraphError::Projection(format!("update request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MoralGraphError::Projection(format!(
                "update refused: HTTP {status}: {body}"
            )));
        }
        Ok(())
    }

    /// POST one SPARQL query and return the JSON result set.
    pub async fn send_query(&self, query: &str) -> Result<serde_json::Value> {
        let mut request = self
            .http
            .post(&self.query_url)
            .header("Content-Type", "application/sparql-query")
            .header("Accept", "application/sparql-results+json")
            .body(query.to_string());

        if let Some(user) = &self.user {
            request = request.basic_auth(user, self.password.as_deref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| MoralGraphError::Projection(format!("query request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MoralGraphError::Projection(format!(
                "query refused: HTTP {status}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| MoralGraphError::Projection(format!("query result parse: {e}")))
    }

    /// Liveness probe: `ASK {}` against the query endpoint.
    pub async fn ping(&self) -> Result<bool> {
        let result = self.send_query("ASK {}").await?;
        Ok(result
            .get("boolean")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false))
    }

    /// Start the background liveness probe on a fixed interval.
    ///
    /// The task shares nothing with in-flight pipeline runs beyond logging,
    /// never blocks callers, and is aborted when the client is dropped.
    /// Calling this twice replaces the previous probe.
    pub fn spawn_heartbeat(&mut self, interval: Duration) {
        if let Some(previous) = self.heartbeat.take() {
            previous.abort();
        }

        let http = self.http.clone();
        let query_url = self.query_url.clone();
        let user = self.user.clone();
        let password = self.password.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The immediate first tick is fine: one probe at startup.
            loop {
                ticker.tick().await;

                let mut request = http
                    .post(&query_url)
                    .header("Content-Type", "application/sparql-query")
                    .header("Accept", "application/sparql-results+json")
                    .body("ASK {}");
                if let Some(user) = &user {
                    request = request.basic_auth(user, password.as_deref());
                }

                match request.send().await {
                    Ok(response) if response.status().is_success() => {
                        debug!("graph store heartbeat ok");
                    }
                    Ok(response) => {
                        warn!(status = %response.status(), "graph store heartbeat failed");
                    }
                    Err(e) => {
                        warn!(error = %e, "graph store heartbeat failed");
                    }
                }
            }
        });

        info!(interval_secs = interval.as_secs(), "graph store heartbeat started");
        self.heartbeat = Some(handle);
    }
}

impl Drop for FusekiClient {
    fn drop(&mut self) {
        if let Some(handle) = self.heartbeat.take() {
            handle.abort();
        }
    }
}
