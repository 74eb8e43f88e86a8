//! Reference HTTP implementations of the injected external calls.
//!
//! Operations map to bearer-authenticated JSON POSTs under a base URL and
//! logins to a credential POST against an auth endpoint. Classification
//! happens here, at the HTTP boundary, and nowhere else: transport failures
//! become [`ApiError::TransientNetwork`], statuses go through
//! [`ApiError::from_status`] / [`ApiError::from_login_status`], and a 429's
//! `Retry-After` header is forwarded as a hint to the retry executor.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::auth::{Authenticator, Credential, Session};
use crate::client::Transport;
use crate::error::{ApiError, ApiResult};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

fn parse_base_url(base_url: &str) -> ApiResult<Url> {
    // A trailing slash keeps Url::join from replacing the last path segment
    let normalized =
        if base_url.ends_with('/') { base_url.to_string() } else { format!("{base_url}/") };
    Url::parse(&normalized)
        .map_err(|e| ApiError::InvalidConfiguration(format!("invalid base url: {e}")))
}

fn build_http_client() -> ApiResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .map_err(|e| ApiError::InvalidConfiguration(format!("http client: {e}")))
}

fn transport_failure(err: &reqwest::Error) -> ApiError {
    // Anything that failed before a status was observed is transient:
    // connect, DNS, reset, timeout
    ApiError::TransientNetwork(err.to_string())
}

fn retry_after_header(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Business-call transport: `POST {base_url}/{operation}` with a JSON body
/// of the parameters and a bearer token.
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    /// Create a transport rooted at `base_url`.
    pub fn new(base_url: &str) -> ApiResult<Self> {
        Ok(Self { http: build_http_client()?, base_url: parse_base_url(base_url)? })
    }

    fn operation_url(&self, operation: &str) -> ApiResult<Url> {
        self.base_url
            .join(operation)
            .map_err(|e| ApiError::InvalidConfiguration(format!("invalid operation name: {e}")))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(
        &self,
        token: &str,
        operation: &str,
        params: &BTreeMap<String, Value>,
    ) -> ApiResult<Value> {
        let url = self.operation_url(operation)?;
        debug!(%url, "dispatching business call");

        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(params)
            .send()
            .await
            .map_err(|e| transport_failure(&e))?;

        let status = response.status();
        if status.is_success() {
            return response.json::<Value>().await.map_err(|e| ApiError::Rejected {
                status: status.as_u16(),
                message: format!("undecodable response body: {e}"),
            });
        }

        if status.as_u16() == 429 {
            return Err(ApiError::RateLimitExceededUpstream {
                retry_after: retry_after_header(&response),
            });
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status.as_u16(), body))
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    expires_in: u64,
}

/// Login call: `POST {login_url}` with the credential as a JSON body,
/// expecting `{ "token": …, "expires_in": <seconds> }`.
pub struct HttpAuthenticator {
    http: reqwest::Client,
    login_url: Url,
}

impl HttpAuthenticator {
    /// Create an authenticator posting to `login_url`.
    pub fn new(login_url: &str) -> ApiResult<Self> {
        let url = Url::parse(login_url)
            .map_err(|e| ApiError::InvalidConfiguration(format!("invalid login url: {e}")))?;
        Ok(Self { http: build_http_client()?, login_url: url })
    }

    fn login_body(credential: &Credential) -> Value {
        match credential {
            Credential::None => Value::Object(serde_json::Map::new()),
            Credential::Basic { username, password } => serde_json::json!({
                "username": username,
                "password": password,
            }),
        }
    }
}

#[async_trait]
impl Authenticator for HttpAuthenticator {
    async fn login(&self, credential: &Credential) -> Result<Session, ApiError> {
        debug!(url = %self.login_url, "dispatching login call");

        let response = self
            .http
            .post(self.login_url.clone())
            .json(&Self::login_body(credential))
            .send()
            .await
            .map_err(|e| transport_failure(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_login_status(status.as_u16(), body));
        }

        let login: LoginResponse = response.json().await.map_err(|e| {
            ApiError::AuthenticationFailed(format!("undecodable login response: {e}"))
        })?;

        Ok(Session::new(login.token, Duration::from_secs(login.expires_in)))
    }
}
