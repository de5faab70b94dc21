//! API client for the SEIAutomation REST API.
//!
//! `ApiClient` is an explicit handle rather than a process-wide default. Clones
//! share the connection pool and a single credential slot, so a token set
//! through one clone is attached by every clone's next request.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::models::{AccessToken, TaskDefinition, TaskRun, TaskRunRequest, User};

use super::{ApiError, AutomationApi};

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// API client for the automation server.
/// Clone is cheap - reqwest::Client and the token slot are both behind Arc.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Arc<str>,
    token: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
    /// Create a new API client rooted at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Set or remove the bearer token for all subsequent requests.
    pub fn set_token(&self, token: Option<String>) {
        let mut slot = self.token.write().unwrap_or_else(|e| e.into_inner());
        debug!(present = token.is_some(), "Bearer token updated");
        *slot = token;
    }

    /// Current bearer token, if any.
    pub fn token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = self.token() {
            let mut value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .context("Token contains characters not allowed in a header")?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Start a request against `path`, carrying the token as it is right now.
    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        Ok(self
            .client
            .request(method, self.url(path))
            .headers(self.auth_headers()?))
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder, what: &str) -> Result<T> {
        let response = builder
            .send()
            .await
            .map_err(ApiError::from)
            .with_context(|| format!("Failed to send request to {}", what))?;

        let response = Self::check_response(response).await?;

        response
            .json()
            .await
            .map_err(ApiError::from)
            .with_context(|| format!("Failed to parse JSON response from {}", what))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let builder = self.request(Method::GET, path)?;
        self.send(builder, path).await
    }

    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let builder = self.request(Method::POST, path)?.json(body);
        self.send(builder, path).await
    }

    pub async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        fields: &[(&str, &str)],
    ) -> Result<T> {
        let builder = self.request(Method::POST, path)?.form(fields);
        self.send(builder, path).await
    }

    // =========================================================================
    // Endpoints
    // =========================================================================

    /// Exchange credentials for an access token. The server expects an
    /// OAuth2 password form, so the email travels as `username`.
    pub async fn login(&self, email: &str, password: &str) -> Result<AccessToken> {
        self.post_form("/auth/login", &[("username", email), ("password", password)])
            .await
    }

    pub async fn current_user(&self) -> Result<User> {
        self.get("/auth/me").await
    }

    pub async fn list_tasks(&self) -> Result<Vec<TaskDefinition>> {
        self.get("/tasks/").await
    }

    pub async fn list_runs(&self) -> Result<Vec<TaskRun>> {
        self.get("/tasks/runs").await
    }

    pub async fn run_task(&self, request: &TaskRunRequest) -> Result<TaskRun> {
        self.post_json("/tasks/run", request).await
    }

    pub async fn get_run(&self, run_id: &str) -> Result<TaskRun> {
        self.get(&run_path(run_id)).await
    }
}

fn run_path(run_id: &str) -> String {
    format!("/tasks/runs/{}", run_id)
}

#[async_trait]
impl AutomationApi for ApiClient {
    fn set_token(&self, token: Option<String>) {
        ApiClient::set_token(self, token)
    }

    async fn login(&self, email: &str, password: &str) -> Result<AccessToken> {
        ApiClient::login(self, email, password).await
    }

    async fn current_user(&self) -> Result<User> {
        ApiClient::current_user(self).await
    }

    async fn list_tasks(&self) -> Result<Vec<TaskDefinition>> {
        ApiClient::list_tasks(self).await
    }

    async fn list_runs(&self) -> Result<Vec<TaskRun>> {
        ApiClient::list_runs(self).await
    }

    async fn run_task(&self, request: &TaskRunRequest) -> Result<TaskRun> {
        ApiClient::run_task(self, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ApiClient {
        ApiClient::new("http://localhost:8000/", Duration::from_secs(5))
            .expect("Failed to build client")
    }

    #[test]
    fn test_no_token_means_no_authorization_header() {
        let api = client();
        let request = api.request(Method::GET, "/tasks/runs").unwrap().build().unwrap();
        assert!(request.headers().get(header::AUTHORIZATION).is_none());
        assert_eq!(request.url().as_str(), "http://localhost:8000/tasks/runs");
    }

    #[test]
    fn test_token_is_attached_as_bearer() {
        let api = client();
        api.set_token(Some("abc.def".to_string()));
        let request = api.request(Method::GET, "/auth/me").unwrap().build().unwrap();
        assert_eq!(
            request.headers().get(header::AUTHORIZATION).unwrap(),
            "Bearer abc.def"
        );
    }

    #[test]
    fn test_clearing_token_removes_header_entirely() {
        let api = client();
        api.set_token(Some("abc".to_string()));
        api.set_token(None);
        let request = api.request(Method::GET, "/tasks/").unwrap().build().unwrap();
        assert!(request.headers().get(header::AUTHORIZATION).is_none());
        assert!(api.token().is_none());
    }

    #[test]
    fn test_single_run_path_carries_id_and_token() {
        let api = client();
        api.set_token(Some("tok".to_string()));
        let request = api
            .request(Method::GET, &run_path("42"))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(request.url().as_str(), "http://localhost:8000/tasks/runs/42");
        assert_eq!(request.headers().get(header::AUTHORIZATION).unwrap(), "Bearer tok");
    }

    #[test]
    fn test_clones_share_the_credential() {
        let api = client();
        let poller_handle = api.clone();
        api.set_token(Some("shared".to_string()));
        assert_eq!(poller_handle.token().as_deref(), Some("shared"));

        let request = poller_handle
            .request(Method::GET, "/tasks/runs")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(request.headers().get(header::AUTHORIZATION).unwrap(), "Bearer shared");
    }

    #[test]
    fn test_built_request_keeps_token_it_was_built_with() {
        let api = client();
        api.set_token(Some("old".to_string()));
        let in_flight = api.request(Method::GET, "/tasks/runs").unwrap();
        api.set_token(None);
        let request = in_flight.build().unwrap();
        assert_eq!(request.headers().get(header::AUTHORIZATION).unwrap(), "Bearer old");
    }

    #[test]
    fn test_login_request_is_form_encoded() {
        let api = client();
        let request = api
            .request(Method::POST, "/auth/login")
            .unwrap()
            .form(&[("username", "user@x.com"), ("password", "pw")])
            .build()
            .unwrap();
        assert_eq!(
            request.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/x-www-form-urlencoded"
        );
        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(std::str::from_utf8(body).unwrap(), "username=user%40x.com&password=pw");
    }

    #[test]
    fn test_run_request_body_omits_empty_bloco() {
        let api = client();
        let payload = TaskRunRequest {
            task_slug: "annotate_ok".to_string(),
            headless: false,
            auto_credentials: false,
            bloco_id: None,
            limit: None,
            dev_mode: Some(false),
        };
        let request = api
            .request(Method::POST, "/tasks/run")
            .unwrap()
            .json(&payload)
            .build()
            .unwrap();
        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert!(value.get("bloco_id").is_none());
        assert!(value.get("limit").is_none());
        assert_eq!(value["dev_mode"], false);
    }

    #[test]
    fn test_relative_path_is_joined() {
        let api = client();
        assert_eq!(api.base_url(), "http://localhost:8000");
        assert_eq!(api.url("tasks/"), "http://localhost:8000/tasks/");
    }

    #[test]
    fn test_rejects_token_with_newline() {
        let api = client();
        api.set_token(Some("bad\ntoken".to_string()));
        assert!(api.request(Method::GET, "/auth/me").is_err());
    }
}
