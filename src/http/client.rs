//! Authenticated API client.
//!
//! # Responsibilities
//! - Attach `Authorization: Bearer` from the session cache
//! - Route 401s through the refresh coordinator and replay once
//! - Retry server errors with backoff, bounded by the retry policy
//! - Classify every other failure
//! - Login / logout against `/auth/login`
//!
//! # Design Decisions
//! - Cloning the client shares the session, coordinator and connection pool
//! - Login and refresh calls never carry a bearer token and never refresh
//! - A request that gets a second 401 after its replay fails immediately

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use url::Url;

use crate::auth::{AuthEvent, AuthEvents, RefreshCoordinator};
use crate::config::ClientConfig;
use crate::error::{classify, ApiError, ApiResult};
use crate::http::request::{ApiRequest, X_REQUEST_ID};
use crate::observability::metrics;
use crate::resilience::RetryPolicy;
use crate::session::{CredentialPair, FileStore, KeyValueStore, Session, SessionError};

pub const LOGIN_PATH: &str = "auth/login";
pub const REFRESH_PATH: &str = "auth/refresh";

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshBody<'a> {
    refresh_token: &'a str,
}

struct Inner {
    http: reqwest::Client,
    base_url: Url,
    session: Arc<Session>,
    coordinator: RefreshCoordinator,
    events: AuthEvents,
    retry: RetryPolicy,
}

/// Client shared by every repository.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

impl ApiClient {
    /// Build a client whose session lives in `store`. Any persisted pair is
    /// loaded immediately.
    pub fn new(config: &ClientConfig, store: Arc<dyn KeyValueStore>) -> ApiResult<Self> {
        let base_url = normalize_base_url(&config.api.base_url)?;

        let http = reqwest::Client::builder()
            .timeout(config.api.request_timeout())
            .connect_timeout(config.api.connect_timeout())
            .build()?;

        let session = Arc::new(Session::restore(store, config.session.key.clone()));
        let events = AuthEvents::new();
        let coordinator =
            RefreshCoordinator::new(session.clone(), events.clone(), config.refresh.timeout());

        tracing::debug!(
            base_url = %base_url,
            authenticated = session.is_authenticated(),
            "API client initialized"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url,
                session,
                coordinator,
                events,
                retry: RetryPolicy::new(config.retries.clone()),
            }),
        })
    }

    /// Build a client backed by the session file named in the config.
    pub fn from_config(config: &ClientConfig) -> ApiResult<Self> {
        Self::new(config, Arc::new(FileStore::new(&config.session.path)))
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.inner.session
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.inner.coordinator
    }

    pub fn events(&self) -> &AuthEvents {
        &self.inner.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.inner.events.subscribe()
    }

    /// Exchange email/password for a credential pair and persist it.
    ///
    /// Invalid credentials come back as `ApiError::Validation` (400).
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<()> {
        let request = ApiRequest::post(LOGIN_PATH)
            .unauthenticated()
            .json(&LoginBody { email, password })?;

        let pair: CredentialPair = self.json(request).await?;
        match self.inner.session.replace(pair) {
            Ok(()) => {}
            Err(SessionError::Incomplete) => {
                return Err(ApiError::Decode("login response is missing a token".into()));
            }
            // The pair is cached; only persistence failed.
            Err(SessionError::Store(_)) => {}
        }

        tracing::info!(email = %email, "Logged in");
        self.inner.events.emit(AuthEvent::LoggedIn);
        Ok(())
    }

    /// Drop the session locally. Subsequent requests carry no token.
    pub fn logout(&self) {
        let _ = self.inner.session.clear();
        tracing::info!("Logged out");
        self.inner.events.emit(AuthEvent::LoggedOut);
    }

    /// Send `request` through the full pipeline and return the successful
    /// response.
    pub async fn execute(&self, mut request: ApiRequest) -> ApiResult<Response> {
        let mut token = if request.is_authenticated() {
            self.inner.session.access_token()
        } else {
            None
        };
        let mut retries = 0u32;

        loop {
            let response = self.send_once(&request, token.as_deref()).await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }

            if status == StatusCode::UNAUTHORIZED && request.is_authenticated() {
                if request.is_retried() {
                    tracing::warn!(
                        request_id = %request.request_id(),
                        path = %request.path(),
                        "Replayed request rejected again, not refreshing"
                    );
                    return Err(error_from(response).await);
                }

                request.mark_retried();
                drop(response);

                let fresh = self
                    .inner
                    .coordinator
                    .refresh(token.as_deref(), |refresh_token| {
                        self.exchange_refresh(refresh_token)
                    })
                    .await?;
                tracing::debug!(request_id = %request.request_id(), "Replaying with refreshed token");
                token = Some(fresh);
                continue;
            }

            if self.inner.retry.should_retry(request.method(), status, retries) {
                retries += 1;
                let delay = self.inner.retry.delay(retries);
                tracing::warn!(
                    request_id = %request.request_id(),
                    method = %request.method(),
                    path = %request.path(),
                    status = %status,
                    attempt = retries,
                    delay = ?delay,
                    "Retrying request after server error"
                );
                metrics::record_retry(request.method().as_str(), status.as_u16());
                drop(response);
                tokio::time::sleep(delay).await;
                continue;
            }

            return Err(error_from(response).await);
        }
    }

    /// Execute and decode a JSON response body.
    pub async fn json<T: DeserializeOwned>(&self, request: ApiRequest) -> ApiResult<T> {
        let response = self.execute(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Execute and discard the response body (e.g. `204 No Content`).
    pub async fn send_empty(&self, request: ApiRequest) -> ApiResult<()> {
        self.execute(request).await.map(drop)
    }

    async fn send_once(&self, request: &ApiRequest, token: Option<&str>) -> ApiResult<Response> {
        let url = request.url(&self.inner.base_url)?;
        let mut builder = self
            .inner
            .http
            .request(request.method().clone(), url)
            .headers(request.headers().clone())
            .header(X_REQUEST_ID, request.request_id().to_string());

        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let start = Instant::now();
        match builder.send().await {
            Ok(response) => {
                metrics::record_request(request.method().as_str(), response.status().as_u16(), start);
                tracing::debug!(
                    request_id = %request.request_id(),
                    method = %request.method(),
                    path = %request.path(),
                    status = %response.status(),
                    elapsed = ?start.elapsed(),
                    "Response received"
                );
                Ok(response)
            }
            Err(e) => {
                metrics::record_request(request.method().as_str(), 0, start);
                tracing::error!(
                    request_id = %request.request_id(),
                    method = %request.method(),
                    path = %request.path(),
                    error = %e,
                    "Request failed"
                );
                Err(ApiError::Transport(e))
            }
        }
    }

    /// `POST /auth/refresh`. Single attempt; any failure ends the session.
    async fn exchange_refresh(&self, refresh_token: String) -> ApiResult<CredentialPair> {
        let request = ApiRequest::post(REFRESH_PATH)
            .unauthenticated()
            .json(&RefreshBody {
                refresh_token: &refresh_token,
            })?;

        let response = self.send_once(&request, None).await?;
        if !response.status().is_success() {
            return Err(error_from(response).await);
        }

        response
            .json::<CredentialPair>()
            .await
            .map_err(|e| ApiError::Decode(format!("refresh response: {}", e)))
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("session", &self.inner.session)
            .finish()
    }
}

async fn error_from(response: Response) -> ApiError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    classify(status, &body)
}

/// Parse the base URL and make sure relative joins keep its path.
fn normalize_base_url(raw: &str) -> ApiResult<Url> {
    let mut url = Url::parse(raw)
        .map_err(|e| ApiError::InvalidRequest(format!("invalid base URL '{}': {}", raw, e)))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
