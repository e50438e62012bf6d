//! HTTP client for the Google Drive API v2.
//!
//! Wraps `reqwest::Client` with OAuth2 bearer-token auth, automatic rate
//! limiting, exponential-backoff retries, and helpers for the HTTP verbs used
//! by the Drive REST surface. Base URLs come from [`DriveConfig`] so the
//! client can be pointed at any compatible endpoint.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use drivelink_core::resource::Fields;

use crate::types::{DriveConfig, DriveError, DriveErrorKind, DriveResult, OAuthToken};

/// Empty query string.
pub const NO_QUERY: &[(&str, &str)] = &[];

/// Shared-drive support flag sent with every file request.
pub const ALL_DRIVES: (&str, &str) = ("supportsAllDrives", "true");

/// Request body variants.
#[derive(Debug, Clone)]
enum Payload {
    Empty,
    Json(Vec<u8>),
    Raw { content_type: String, bytes: Vec<u8> },
}

/// Drive HTTP client with built-in auth, rate-limiting, and retries.
#[derive(Clone)]
pub struct DriveClient {
    inner: Client,
    token: Option<OAuthToken>,
    config: DriveConfig,
    /// Nanosecond timestamp of the last request (for rate-limiting).
    last_request_ns: Arc<AtomicU64>,
}

impl std::fmt::Debug for DriveClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveClient")
            .field("authenticated", &self.is_authenticated())
            .field("config", &self.config)
            .finish()
    }
}

impl DriveClient {
    // ── Construction ─────────────────────────────────────────────

    pub fn new(config: DriveConfig) -> DriveResult<Self> {
        let inner = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| DriveError::network(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            inner,
            token: None,
            config,
            last_request_ns: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn default_client() -> DriveResult<Self> {
        Self::new(DriveConfig::default())
    }

    // ── Token management ─────────────────────────────────────────

    pub fn set_token(&mut self, token: OAuthToken) {
        self.token = Some(token);
    }

    pub fn clear_token(&mut self) {
        self.token = None;
    }

    pub fn token(&self) -> Option<&OAuthToken> {
        self.token.as_ref()
    }

    /// Whether the client currently has a valid (non-expired) token.
    pub fn is_authenticated(&self) -> bool {
        self.token
            .as_ref()
            .map(|t| !t.access_token.is_empty() && !t.is_expired())
            .unwrap_or(false)
    }

    pub fn config(&self) -> &DriveConfig {
        &self.config
    }

    // ── URLs ─────────────────────────────────────────────────────

    /// `{api_base}/{path}`.
    pub fn api_url(&self, path: &str) -> String {
        join_url(&self.config.api_base, path)
    }

    /// `{upload_base}/{path}`.
    pub fn upload_url(&self, path: &str) -> String {
        join_url(&self.config.upload_base, path)
    }

    // ── Rate limiting ────────────────────────────────────────────

    async fn rate_limit(&self) {
        if self.config.rate_limit_ms == 0 {
            return;
        }
        let now = now_ns();
        let last = self.last_request_ns.load(Ordering::Relaxed);
        let min_gap = self.config.rate_limit_ms * 1_000_000;
        if last > 0 && now.saturating_sub(last) < min_gap {
            let wait = min_gap - now.saturating_sub(last);
            tokio::time::sleep(Duration::from_nanos(wait)).await;
        }
        self.last_request_ns.store(now_ns(), Ordering::Relaxed);
    }

    // ── Request building helpers ─────────────────────────────────

    fn auth_headers(&self) -> DriveResult<HeaderMap> {
        let token = self.token.as_ref().ok_or_else(|| {
            DriveError::new(DriveErrorKind::NotAuthenticated, "No OAuth2 token set")
        })?;
        if token.is_expired() {
            return Err(DriveError::new(
                DriveErrorKind::TokenExpired,
                "OAuth2 token has expired, refresh required",
            ));
        }
        let mut headers = HeaderMap::new();
        let val = format!("Bearer {}", token.access_token);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&val)
                .map_err(|e| DriveError::auth(format!("Invalid auth header: {e}")))?,
        );
        Ok(headers)
    }

    fn build_request<Q>(
        &self,
        method: &Method,
        url: &str,
        query: &Q,
        payload: &Payload,
    ) -> DriveResult<RequestBuilder>
    where
        Q: Serialize + ?Sized,
    {
        let headers = self.auth_headers()?;
        let req = self
            .inner
            .request(method.clone(), url)
            .headers(headers)
            .query(query);
        Ok(match payload {
            Payload::Empty if *method == Method::POST => req.body(Vec::new()),
            Payload::Empty => req,
            Payload::Json(bytes) => req
                .header(CONTENT_TYPE, "application/json")
                .body(bytes.clone()),
            Payload::Raw {
                content_type,
                bytes,
            } => req.header(CONTENT_TYPE, content_type).body(bytes.clone()),
        })
    }

    // ── Core execution with retries ──────────────────────────────

    /// Execute a request builder with automatic retry on transient failures.
    async fn execute_with_retry(
        &self,
        build_fn: impl Fn() -> DriveResult<RequestBuilder>,
    ) -> DriveResult<Response> {
        let max_retries = self.config.max_retries;
        let mut attempt = 0u32;
        loop {
            self.rate_limit().await;
            let request = build_fn()?
                .build()
                .map_err(|e| DriveError::network(format!("Failed to build request: {e}")))?;
            debug!("Drive API {} {}", request.method(), request.url());

            match self.inner.execute(request).await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(resp);
                    }
                    let body = resp.text().await.unwrap_or_default();
                    let err = DriveError::from_status(status.as_u16(), &body);

                    if (status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error())
                        && attempt < max_retries
                    {
                        attempt += 1;
                        let backoff = Duration::from_millis(500 * 2u64.pow(attempt));
                        warn!(
                            "Drive API transient error ({}), retry {}/{} in {:?}",
                            status, attempt, max_retries, backoff
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    if attempt < max_retries {
                        attempt += 1;
                        let backoff = Duration::from_millis(500 * 2u64.pow(attempt));
                        warn!(
                            "Drive API network error: {}, retry {}/{} in {:?}",
                            e, attempt, max_retries, backoff
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    return Err(DriveError::network(e.to_string()));
                }
            }
        }
    }

    async fn send<Q>(
        &self,
        method: Method,
        url: &str,
        query: &Q,
        payload: Payload,
    ) -> DriveResult<Response>
    where
        Q: Serialize + ?Sized,
    {
        self.execute_with_retry(|| self.build_request(&method, url, query, &payload))
            .await
    }

    // ── Public HTTP verb helpers ─────────────────────────────────

    /// GET with query parameters, return JSON.
    pub async fn get_json<T, Q>(&self, url: &str, query: &Q) -> DriveResult<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let resp = self.send(Method::GET, url, query, Payload::Empty).await?;
        parse_json(resp).await
    }

    /// Send a JSON body with any method, return JSON.
    pub async fn send_json<B, T, Q>(
        &self,
        method: Method,
        url: &str,
        query: &Q,
        body: &B,
    ) -> DriveResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let body_bytes = serde_json::to_vec(body)
            .map_err(|e| DriveError::invalid(format!("Body serialization: {e}")))?;
        let resp = self
            .send(method, url, query, Payload::Json(body_bytes))
            .await?;
        parse_json(resp).await
    }

    /// POST with a JSON body, return JSON.
    pub async fn post_json<B, T, Q>(&self, url: &str, query: &Q, body: &B) -> DriveResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.send_json(Method::POST, url, query, body).await
    }

    /// PATCH with a JSON body, return JSON.
    pub async fn patch_json<B, T, Q>(&self, url: &str, query: &Q, body: &B) -> DriveResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.send_json(Method::PATCH, url, query, body).await
    }

    /// POST without a body (e.g. trash), return JSON.
    pub async fn post_empty<T, Q>(&self, url: &str, query: &Q) -> DriveResult<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let resp = self.send(Method::POST, url, query, Payload::Empty).await?;
        parse_json(resp).await
    }

    /// Send raw bytes (multipart uploads), return JSON.
    pub async fn send_bytes<T, Q>(
        &self,
        method: Method,
        url: &str,
        query: &Q,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> DriveResult<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let payload = Payload::Raw {
            content_type: content_type.to_string(),
            bytes,
        };
        let resp = self.send(method, url, query, payload).await?;
        parse_json(resp).await
    }

    /// DELETE (no response body expected).
    pub async fn delete<Q>(&self, url: &str, query: &Q) -> DriveResult<()>
    where
        Q: Serialize + ?Sized,
    {
        self.send(Method::DELETE, url, query, Payload::Empty).await?;
        Ok(())
    }

    /// GET a response whose body the caller consumes chunk by chunk.
    pub async fn get_response<Q>(&self, url: &str, query: &Q) -> DriveResult<Response>
    where
        Q: Serialize + ?Sized,
    {
        self.send(Method::GET, url, query, Payload::Empty).await
    }

    /// GET raw bytes from an absolute URL (e.g. `downloadUrl`).
    pub async fn get_bytes(&self, url: &str) -> DriveResult<Vec<u8>> {
        let resp = self.get_response(url, NO_QUERY).await?;
        resp.bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| DriveError::new(DriveErrorKind::DownloadFailed, e.to_string()))
    }

    /// POST a form to an OAuth endpoint (un-authenticated), return JSON.
    pub async fn post_form_unauthenticated<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> DriveResult<T> {
        let resp = self.post_form(url, params).await?;
        resp.json::<T>()
            .await
            .map_err(|e| DriveError::network(format!("Token response parse error: {e}")))
    }

    /// POST a form to an OAuth endpoint, ignoring the response body.
    pub async fn post_form_discard(&self, url: &str, params: &[(&str, &str)]) -> DriveResult<()> {
        self.post_form(url, params).await.map(|_| ())
    }

    async fn post_form(&self, url: &str, params: &[(&str, &str)]) -> DriveResult<Response> {
        self.rate_limit().await;
        debug!("OAuth POST {}", url);
        let resp = self
            .inner
            .post(url)
            .form(params)
            .send()
            .await
            .map_err(|e| DriveError::network(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(DriveError::from_status(status, &body));
        }
        Ok(resp)
    }
}

async fn parse_json<T: DeserializeOwned>(resp: Response) -> DriveResult<T> {
    resp.json::<T>()
        .await
        .map_err(|e| DriveError::network(format!("JSON parse error: {e}")))
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn now_ns() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// Flatten a parameter map into query pairs. Nulls, arrays and objects are
/// skipped.
pub fn query_pairs(params: &Fields) -> Vec<(String, String)> {
    params
        .iter()
        .filter_map(|(k, v)| {
            let s = match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => None,
            };
            s.map(|val| (k.clone(), val))
        })
        .collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
