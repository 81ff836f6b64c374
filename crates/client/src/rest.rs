//! REST implementation of [`AuthApi`].
//!
//! `RestAuthClient` wraps a `reqwest::Client` and translates every trait
//! method into the corresponding HTTP call against the backend. It holds
//! no credential of its own: the `Authorization` header is built from the
//! credential passed into each call.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use lh_domain::config::ApiConfig;
use lh_domain::error::{Error, Result};
use lh_domain::trace::TraceEvent;
use lh_domain::user::{Activity, LearningProfile, User};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::provider::AuthApi;
use crate::types::{
    extract_error_message, ActivityList, AuthResponse, Credential, LoginRequest, PasswordChange,
    PasswordResetConfirm, PasswordResetRequest, ProfileFields, ProfileUpdate, Registration,
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A REST client for the account endpoints.
///
/// Created once and reused for the lifetime of the process.
/// The underlying `reqwest::Client` maintains a connection pool.
#[derive(Debug, Clone)]
pub struct RestAuthClient {
    http: Client,
    base_url: String,
    client_type: String,
    timeout: Duration,
    max_retries: u32,
}

/// Whether a failed attempt may be sent again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Idempotency {
    Retryable,
    Once,
}

impl RestAuthClient {
    /// The configured request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a new client from the shared `ApiConfig`.
    pub fn new(cfg: &ApiConfig) -> Result<Self> {
        let timeout = Duration::from_millis(cfg.timeout_ms);
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        let base_url = cfg.base_url.trim().trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            return Err(Error::Config("api.base_url must not be empty".into()));
        }

        Ok(Self {
            http,
            base_url,
            client_type: cfg.client_type.clone(),
            timeout,
            max_retries: cfg.max_retries,
        })
    }

    // ── request helpers ──────────────────────────────────────────────

    /// Decorate a `RequestBuilder` with the standard headers and, when
    /// given, the credential.
    fn decorate(&self, rb: RequestBuilder, credential: Option<&Credential>) -> RequestBuilder {
        let trace_id = Uuid::new_v4().to_string();
        let mut rb = rb
            .header("X-Client-Type", &self.client_type)
            .header("X-Trace-Id", &trace_id);

        if let Some(credential) = credential {
            rb = rb.header(AUTHORIZATION, credential.header_value());
        }
        rb
    }

    /// Build the full URL for a path like `/api/auth/me/`.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ── retry engine ─────────────────────────────────────────────────

    /// Execute a request, classifying the response into the error taxonomy.
    ///
    /// * 401/403 → `Error::Auth`, other 4xx → `Error::Validation`,
    ///   5xx → `Error::Server`, transport failures → `Error::Http`/`Timeout`.
    /// * Retryable requests are re-sent with exponential back-off on 5xx and
    ///   transport failures, up to `max_retries` times. 4xx never retries.
    /// * Emits a `TraceEvent::ApiCall` after every attempt.
    async fn execute(
        &self,
        endpoint: &str,
        idempotency: Idempotency,
        credential: Option<&Credential>,
        build_request: impl Fn() -> RequestBuilder,
    ) -> Result<Response> {
        let max_attempts = match idempotency {
            Idempotency::Retryable => self.max_retries,
            Idempotency::Once => 0,
        };
        let mut last_err: Option<Error> = None;

        for attempt in 0..=max_attempts {
            if attempt > 0 {
                let backoff = Duration::from_millis(100 * 2u64.pow(attempt - 1));
                tracing::debug!(endpoint, attempt, ?backoff, "retrying request");
                tokio::time::sleep(backoff).await;
            }

            let start = Instant::now();
            let rb = self.decorate(build_request(), credential);
            let result = rb.send().await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(resp) => {
                    let status = resp.status();

                    TraceEvent::ApiCall {
                        endpoint: endpoint.to_owned(),
                        status: status.as_u16(),
                        duration_ms,
                        attempt,
                    }
                    .emit();

                    if status.is_server_error() {
                        // 5xx: transient, retry when allowed
                        let body = resp.text().await.unwrap_or_default();
                        last_err = Some(Error::Server {
                            status: status.as_u16(),
                            message: extract_error_message(&body),
                        });
                        continue;
                    }

                    if status.is_client_error() {
                        // 4xx: permanent
                        let body = resp.text().await.unwrap_or_default();
                        return Err(classify_client_error(endpoint, status, &body));
                    }

                    return Ok(resp);
                }
                Err(e) => {
                    let status = e.status().map(|s| s.as_u16()).unwrap_or(0);

                    TraceEvent::ApiCall {
                        endpoint: endpoint.to_owned(),
                        status,
                        duration_ms,
                        attempt,
                    }
                    .emit();

                    last_err = Some(from_reqwest(e));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Error::Other(format!("{endpoint}: all retries exhausted"))))
    }

    /// Read a JSON body. The body is never echoed into the error: auth
    /// responses carry tokens.
    async fn decode<T: DeserializeOwned>(endpoint: &str, resp: Response) -> Result<T> {
        let body = resp.text().await.map_err(from_reqwest)?;
        serde_json::from_str(&body)
            .map_err(|e| Error::Other(format!("failed to parse {endpoint} response: {e}")))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait]
impl AuthApi for RestAuthClient {
    async fn current_user(&self, credential: &Credential) -> Result<User> {
        const EP: &str = "GET /api/auth/me/";
        let url = self.url("/api/auth/me/");
        let resp = self
            .execute(EP, Idempotency::Retryable, Some(credential), || {
                self.http.get(&url)
            })
            .await?;
        Self::decode(EP, resp).await
    }

    async fn login(&self, req: &LoginRequest) -> Result<AuthResponse> {
        const EP: &str = "POST /api/auth/login/";
        let url = self.url("/api/auth/login/");
        let resp = self
            .execute(EP, Idempotency::Once, None, || self.http.post(&url).json(req))
            .await?;
        Self::decode(EP, resp).await
    }

    async fn register(&self, req: &Registration) -> Result<AuthResponse> {
        const EP: &str = "POST /api/auth/register/";
        let url = self.url("/api/auth/register/");
        let resp = self
            .execute(EP, Idempotency::Once, None, || self.http.post(&url).json(req))
            .await?;
        Self::decode(EP, resp).await
    }

    async fn logout(&self, credential: &Credential) -> Result<()> {
        let url = self.url("/api/auth/logout/");
        self.execute("POST /api/auth/logout/", Idempotency::Once, Some(credential), || {
            self.http.post(&url)
        })
        .await?;
        Ok(())
    }

    async fn update_profile(
        &self,
        credential: &Credential,
        update: &ProfileUpdate,
    ) -> Result<ProfileFields> {
        const EP: &str = "PUT /api/auth/profile/update/";
        let url = self.url("/api/auth/profile/update/");
        let resp = self
            .execute(EP, Idempotency::Once, Some(credential), || {
                self.http.put(&url).json(update)
            })
            .await?;
        Self::decode(EP, resp).await
    }

    async fn change_password(
        &self,
        credential: &Credential,
        change: &PasswordChange,
    ) -> Result<()> {
        let url = self.url("/api/auth/password/change/");
        self.execute(
            "POST /api/auth/password/change/",
            Idempotency::Once,
            Some(credential),
            || self.http.post(&url).json(change),
        )
        .await?;
        Ok(())
    }

    async fn learning_profile(&self, credential: &Credential) -> Result<LearningProfile> {
        const EP: &str = "GET /api/auth/profile/detail/";
        let url = self.url("/api/auth/profile/detail/");
        let resp = self
            .execute(EP, Idempotency::Retryable, Some(credential), || {
                self.http.get(&url)
            })
            .await?;
        Self::decode(EP, resp).await
    }

    async fn activities(&self, credential: &Credential) -> Result<Vec<Activity>> {
        const EP: &str = "GET /api/auth/activities/";
        let url = self.url("/api/auth/activities/");
        let resp = self
            .execute(EP, Idempotency::Retryable, Some(credential), || {
                self.http.get(&url)
            })
            .await?;
        let list: ActivityList = Self::decode(EP, resp).await?;
        Ok(list.into_vec())
    }

    async fn request_password_reset(&self, req: &PasswordResetRequest) -> Result<()> {
        let url = self.url("/api/auth/password/reset/");
        self.execute("POST /api/auth/password/reset/", Idempotency::Once, None, || {
            self.http.post(&url).json(req)
        })
        .await?;
        Ok(())
    }

    async fn confirm_password_reset(&self, req: &PasswordResetConfirm) -> Result<()> {
        let url = self.url("/api/auth/password/reset/confirm/");
        self.execute(
            "POST /api/auth/password/reset/confirm/",
            Idempotency::Once,
            None,
            || self.http.post(&url).json(req),
        )
        .await?;
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error conversion helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Map a 4xx response onto the domain error taxonomy.
fn classify_client_error(endpoint: &str, status: StatusCode, body: &str) -> Error {
    let message = extract_error_message(body);
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Error::Auth(
            message.unwrap_or_else(|| format!("{endpoint} rejected the credential ({status})")),
        );
    }
    Error::Validation {
        status: status.as_u16(),
        message,
    }
}

/// Convert a `reqwest::Error` into a domain `Error`.
///
/// Timeout errors become `Error::Timeout`; everything else becomes
/// `Error::Http`.
pub fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}
