//! Remote anchor API collaborators.
//!
//! [`AnchorApi`] returns raw JSON; normalization happens in the reconciler
//! so every source goes through the same lenient path.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use url::Url;

use crate::error::SyncError;
use crate::storage::SyncConfig;

pub trait AnchorApi: Send + Sync {
    /// The user's full anchor collection.
    fn fetch_anchors(&self) -> impl Future<Output = Result<Vec<Value>, SyncError>> + Send;

    fn fetch_user(&self) -> impl Future<Output = Result<Value, SyncError>> + Send;

    fn fetch_stats(&self) -> impl Future<Output = Result<Value, SyncError>> + Send;

    /// At most `limit` active anchors, for the profile preview.
    fn fetch_active_anchors(
        &self,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<Value>, SyncError>> + Send;
}

/// `reqwest`-backed client for the anchor REST API.
#[derive(Debug, Clone)]
pub struct HttpAnchorApi {
    client: reqwest::Client,
    base: Url,
    token: Option<String>,
    timeout: Duration,
}

impl HttpAnchorApi {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, SyncError> {
        let mut base = Url::parse(base_url)?;
        // Keep the last path segment when joining relative endpoints.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base,
            token,
            timeout,
        })
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self, SyncError> {
        let base_url = config
            .base_url
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| SyncError::NotConfigured("set sync.base_url".into()))?;
        Self::new(
            base_url,
            config.api_token.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn endpoint(&self, path: &str) -> Result<Url, SyncError> {
        Ok(self.base.join(path)?)
    }

    async fn get_json(&self, url: Url) -> Result<Value, SyncError> {
        let endpoint = url.path().to_string();
        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Status {
                status: status.as_u16(),
                endpoint,
            });
        }
        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                self.classify(e)
            } else {
                SyncError::Decode {
                    endpoint,
                    message: e.to_string(),
                }
            }
        })
    }

    fn classify(&self, err: reqwest::Error) -> SyncError {
        if err.is_timeout() {
            SyncError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            SyncError::Network(err)
        }
    }
}

impl AnchorApi for HttpAnchorApi {
    async fn fetch_anchors(&self) -> Result<Vec<Value>, SyncError> {
        let url = self.endpoint("anchors")?;
        let endpoint = url.path().to_string();
        extract_list(self.get_json(url).await?, &endpoint)
    }

    async fn fetch_user(&self) -> Result<Value, SyncError> {
        let url = self.endpoint("users/me")?;
        Ok(unwrap_data(self.get_json(url).await?))
    }

    async fn fetch_stats(&self) -> Result<Value, SyncError> {
        let url = self.endpoint("users/me/stats")?;
        Ok(unwrap_data(self.get_json(url).await?))
    }

    async fn fetch_active_anchors(&self, limit: u32) -> Result<Vec<Value>, SyncError> {
        let mut url = self.endpoint("anchors")?;
        url.query_pairs_mut()
            .append_pair("status", "active")
            .append_pair("limit", &limit.to_string());
        let endpoint = url.path().to_string();
        extract_list(self.get_json(url).await?, &endpoint)
    }
}

/// Accept a bare array or an envelope (`{"data": [...]}`, `{"anchors": [...]}`).
fn extract_list(body: Value, endpoint: &str) -> Result<Vec<Value>, SyncError> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut obj) => {
            for key in ["data", "anchors", "items"] {
                if let Some(Value::Array(items)) = obj.remove(key) {
                    return Ok(items);
                }
            }
            Err(SyncError::Decode {
                endpoint: endpoint.to_string(),
                message: "expected a list of anchors".into(),
            })
        }
        other => Err(SyncError::Decode {
            endpoint: endpoint.to_string(),
            message: format!("expected a list of anchors, got {other}"),
        }),
    }
}

fn unwrap_data(body: Value) -> Value {
    match body {
        Value::Object(mut obj) if obj.len() == 1 && obj.get("data").is_some_and(Value::is_object) => {
            obj.remove("data").unwrap_or_default()
        }
        other => other,
    }
}

#[derive(Debug, Default)]
struct Fixtures {
    anchors: Vec<Value>,
    user: Value,
    stats: Value,
    failure: Option<u16>,
    delay: Option<Duration>,
    calls: usize,
}

/// In-process [`AnchorApi`] serving injected JSON. Used in test mode.
///
/// Clones share the same fixtures, so a test can keep a handle and change
/// the "server" between syncs.
#[derive(Debug, Clone, Default)]
pub struct FixtureAnchorApi {
    inner: Arc<Mutex<Fixtures>>,
}

impl FixtureAnchorApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_anchors(self, anchors: Vec<Value>) -> Self {
        self.set_anchors(anchors);
        self
    }

    pub fn with_user(self, user: Value) -> Self {
        self.lock().user = user;
        self
    }

    pub fn with_stats(self, stats: Value) -> Self {
        self.lock().stats = stats;
        self
    }

    pub fn set_anchors(&self, anchors: Vec<Value>) {
        self.lock().anchors = anchors;
    }

    /// Make every call fail with this HTTP status until cleared.
    pub fn fail_with_status(&self, status: u16) {
        self.lock().failure = Some(status);
    }

    pub fn clear_failure(&self) {
        self.lock().failure = None;
    }

    /// Delay every response, e.g. to hold a sync in flight.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.lock().delay = delay;
    }

    /// Number of fetch calls served so far.
    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Fixtures> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn respond<T>(
        &self,
        endpoint: &str,
        pick: impl FnOnce(&Fixtures) -> T,
    ) -> Result<T, SyncError> {
        let (delay, failure, value) = {
            let mut fixtures = self.lock();
            fixtures.calls += 1;
            (fixtures.delay, fixtures.failure, pick(&fixtures))
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match failure {
            Some(status) => Err(SyncError::Status {
                status,
                endpoint: endpoint.to_string(),
            }),
            None => Ok(value),
        }
    }
}

impl AnchorApi for FixtureAnchorApi {
    async fn fetch_anchors(&self) -> Result<Vec<Value>, SyncError> {
        self.respond("/anchors", |f| f.anchors.clone()).await
    }

    async fn fetch_user(&self) -> Result<Value, SyncError> {
        self.respond("/users/me", |f| f.user.clone()).await
    }

    async fn fetch_stats(&self) -> Result<Value, SyncError> {
        self.respond("/users/me/stats", |f| f.stats.clone()).await
    }

    async fn fetch_active_anchors(&self, limit: u32) -> Result<Vec<Value>, SyncError> {
        self.respond("/anchors", |f| {
            f.anchors
                .iter()
                .filter(|a| is_active_json(a))
                .take(limit as usize)
                .cloned()
                .collect()
        })
        .await
    }
}

fn is_active_json(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    let released = super::normalize::bool_field(obj, &["is_released", "isReleased"]);
    let archived = super::normalize::field(obj, &["archived_at", "archivedAt"]).is_some();
    !released && !archived
}
