use std::time::Duration;

use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE},
    Method, RequestBuilder, Response,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use url::Url;
use uuid::Uuid;

use crate::{
    app_constants::{CORS_TEST_PATH, IDEMPOTENCY_KEY_HEADER},
    error::ApiError,
    http_retry::{self, RetryPolicy},
    runtime_env::{self, ApiBase, RuntimeEnv},
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorsReport {
    pub ok: bool,
    pub status: Option<u16>,
    pub detail: String,
}

/// JSON client for the QuestDM backend API.
///
/// Transport failures are retried according to the client's [`RetryPolicy`];
/// responses with an error status never are. Non-idempotent requests carry an
/// `Idempotency-Key` that stays the same across retries of one call.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: ApiBase,
    origin: Option<Url>,
    retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(runtime: RuntimeEnv) -> Result<Self, ApiError> {
        Self::with_base(runtime_env::resolve_api_base(&runtime))
    }

    pub fn with_base(base: ApiBase) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(ApiError::Client)?;
        Ok(Self {
            http,
            base,
            origin: None,
            retry: RetryPolicy::default(),
        })
    }

    /// Origin used to resolve a relative API base, e.g. the hosting page.
    pub fn with_origin(mut self, origin: Url) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base(&self) -> &ApiBase {
        &self.base
    }

    pub fn url_for(&self, endpoint: &str) -> Result<Url, ApiError> {
        let joined = if endpoint.is_empty() || endpoint.starts_with('/') {
            format!("{}{}", self.base.as_str().trim_end_matches('/'), endpoint)
        } else {
            format!("{}/{}", self.base.as_str().trim_end_matches('/'), endpoint)
        };

        match &self.base {
            ApiBase::Absolute(_) => Url::parse(&joined).map_err(|source| ApiError::InvalidUrl {
                url: joined.clone(),
                source,
            }),
            ApiBase::Relative(base) => {
                let origin = self
                    .origin
                    .as_ref()
                    .ok_or_else(|| ApiError::MissingOrigin(base.clone()))?;
                origin
                    .join(&joined)
                    .map_err(|source| ApiError::InvalidUrl {
                        url: joined.clone(),
                        source,
                    })
            }
        }
    }

    pub(crate) fn build_request(
        &self,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
        idempotency_key: Option<&str>,
    ) -> RequestBuilder {
        let mut request = self.http.request(method, url).headers(json_headers());
        if let Some(body) = body {
            request = request.body(body);
        }
        if let Some(key) = idempotency_key {
            request = request.header(IDEMPOTENCY_KEY_HEADER, key);
        }
        request
    }

    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Response, ApiError> {
        let url = self.url_for(endpoint)?;
        let idempotency_key = (!method.is_idempotent()).then(|| Uuid::new_v4().to_string());

        let response = http_retry::with_retry(&self.retry, ApiError::is_transport, || {
            let request = self.build_request(
                method.clone(),
                url.clone(),
                body.clone(),
                idempotency_key.as_deref(),
            );
            async move { request.send().await.map_err(ApiError::from_send) }
        })
        .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(%method, %url, %status, "backend returned error status");
            return Err(ApiError::Status { status });
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Vec<u8>>,
    ) -> Result<T, ApiError> {
        self.send(method, endpoint, body)
            .await?
            .json::<T>()
            .await
            .map_err(ApiError::Decode)
    }

    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        self.send_json(Method::GET, endpoint, None).await
    }

    pub async fn post<B, T>(&self, endpoint: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_vec(body)?;
        self.send_json(Method::POST, endpoint, Some(body)).await
    }

    pub async fn put<B, T>(&self, endpoint: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_vec(body)?;
        self.send_json(Method::PUT, endpoint, Some(body)).await
    }

    /// Sends no body at all when `body` is `None`.
    pub async fn delete<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<T, ApiError> {
        let body = body.map(serde_json::to_vec).transpose()?;
        self.send_json(Method::DELETE, endpoint, body).await
    }

    /// Returns the response unread so the caller can consume it incrementally.
    pub async fn stream_post<B>(&self, endpoint: &str, body: &B) -> Result<Response, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(body)?;
        self.send(Method::POST, endpoint, Some(body)).await
    }

    /// One unretried request against the diagnostic `/cors-test` path.
    pub async fn test_cors(&self) -> CorsReport {
        let url = match self.url_for(CORS_TEST_PATH) {
            Ok(url) => url,
            Err(error) => {
                return CorsReport {
                    ok: false,
                    status: None,
                    detail: error.to_string(),
                };
            }
        };

        match self.build_request(Method::GET, url, None, None).send().await {
            Ok(response) => {
                let status = response.status();
                let detail = response.text().await.unwrap_or_default();
                CorsReport {
                    ok: status.is_success(),
                    status: Some(status.as_u16()),
                    detail: if detail.trim().is_empty() {
                        status.to_string()
                    } else {
                        detail
                    },
                }
            }
            Err(error) => CorsReport {
                ok: false,
                status: None,
                detail: error.to_string(),
            },
        }
    }
}
