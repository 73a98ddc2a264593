// Copyright 2025 DTC Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Backend proxy
//!
//! A [`ProxyRoute`] relays one inbound request to a fixed backend URL:
//!
//! 1. read the inbound body (the timer starts here)
//! 2. rewrite it with a [`RequestConverter`]
//! 3. send it with the inbound method; unreachable → 503, timeout → 504
//! 4. read the backend body and stop the timer
//! 5. rewrite the backend body with a [`ResponseConverter`]
//!
//! A backend answer with a non-success status is relayed as is, without
//! running the response converter.

pub mod generation;

pub use generation::GenerationConverter;

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{header::CONTENT_TYPE, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use dtc_core::Project;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::api::{project_from_headers, read_body, run_blocking, ApiError};

/// Rewrites the inbound body before it is sent to the backend.
pub trait RequestConverter: Send + Sync + 'static {
    fn convert(&self, project: &Project, body: Bytes) -> Bytes;
}

/// Rewrites the backend body before it is returned to the client.
///
/// Runs on the blocking pool, so implementations may do file I/O.
pub trait ResponseConverter: Send + Sync + 'static {
    fn convert(
        &self,
        project: &Project,
        request_body: &[u8],
        response_body: Bytes,
        elapsed_ms: u64,
    ) -> Result<Converted, ApiError>;
}

/// Output of a [`ResponseConverter`].
#[derive(Debug)]
pub struct Converted {
    pub body: Bytes,
    /// Replaces the backend's content type when set.
    pub content_type: Option<&'static str>,
}

/// Identity conversion in both directions.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl RequestConverter for PassThrough {
    fn convert(&self, _project: &Project, body: Bytes) -> Bytes {
        body
    }
}

impl ResponseConverter for PassThrough {
    fn convert(
        &self,
        _project: &Project,
        _request_body: &[u8],
        response_body: Bytes,
        _elapsed_ms: u64,
    ) -> Result<Converted, ApiError> {
        Ok(Converted {
            body: response_body,
            content_type: None,
        })
    }
}

/// Response read back from the backend.
#[derive(Debug)]
pub struct BackendReply {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl IntoResponse for BackendReply {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.body).into_response();
        if let Some(value) = self
            .content_type
            .and_then(|ct| HeaderValue::from_str(&ct).ok())
        {
            response.headers_mut().insert(CONTENT_TYPE, value);
        }
        response
    }
}

/// Shared HTTP client for the image generation backend.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
}

impl BackendClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    /// Send one request and read the whole answer. Dropping the returned
    /// future cancels the backend call.
    pub async fn send(
        &self,
        method: &Method,
        url: &str,
        content_type: Option<&str>,
        body: Bytes,
    ) -> Result<BackendReply, ApiError> {
        let method = reqwest::Method::from_bytes(method.as_str().as_bytes())
            .map_err(|e| ApiError::Transport(format!("Error creating target request: {}", e)))?;

        let mut request = self.http.request(method, url).body(body);
        if let Some(content_type) = content_type {
            request = request.header(reqwest::header::CONTENT_TYPE, content_type);
        }
        let request = request
            .build()
            .map_err(|e| ApiError::Transport(format!("Error creating target request: {}", e)))?;

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| classify_send_error(url, e))?;

        let status = StatusCode::from_u16(response.status().as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::BackendTimeout(format!("Target server did not finish responding: {}", e))
            } else {
                ApiError::Transport(format!("Error reading response body: {}", e))
            }
        })?;

        Ok(BackendReply {
            status,
            content_type,
            body,
        })
    }
}

fn classify_send_error(url: &str, err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        warn!("Backend call to {} timed out", url);
        ApiError::BackendTimeout(format!("Target server timed out: {}", url))
    } else if err.is_builder() {
        ApiError::Transport(format!("Error creating target request: {}", err))
    } else {
        warn!("Backend at {} can not be reached: {}", url, err);
        ApiError::BackendUnavailable(format!("Target server can not be reached: {}", url))
    }
}

/// One proxied endpoint: a backend URL plus its converters.
#[derive(Clone)]
pub struct ProxyRoute {
    backend: BackendClient,
    target: String,
    request_converter: Arc<dyn RequestConverter>,
    response_converter: Arc<dyn ResponseConverter>,
    max_body_bytes: usize,
}

impl ProxyRoute {
    /// A pass-through route to `target`.
    pub fn new(backend: BackendClient, target: impl Into<String>, max_body_bytes: usize) -> Self {
        Self {
            backend,
            target: target.into(),
            request_converter: Arc::new(PassThrough),
            response_converter: Arc::new(PassThrough),
            max_body_bytes,
        }
    }

    pub fn with_request_converter(mut self, converter: impl RequestConverter) -> Self {
        self.request_converter = Arc::new(converter);
        self
    }

    pub fn with_response_converter(mut self, converter: impl ResponseConverter) -> Self {
        self.response_converter = Arc::new(converter);
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub async fn forward(&self, request: Request) -> Result<Response, ApiError> {
        let started = Instant::now();
        let (parts, body): (_, Body) = request.into_parts();
        let request_body = read_body(body, self.max_body_bytes).await?;
        let project = project_from_headers(&parts.headers)?;

        let outbound = self
            .request_converter
            .convert(&project, request_body.clone());
        let content_type = parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());

        let reply = self
            .backend
            .send(&parts.method, &self.target, content_type, outbound)
            .await?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        if !reply.status.is_success() {
            warn!(
                target_url = %self.target,
                status = %reply.status,
                "Backend answered with an error status, relaying unchanged"
            );
            return Ok(reply.into_response());
        }

        debug!(target_url = %self.target, elapsed_ms, bytes = reply.body.len(), "Backend answered");

        let converter = self.response_converter.clone();
        let BackendReply {
            status,
            content_type,
            body,
        } = reply;
        let converted = run_blocking(move || {
            converter.convert(&project, &request_body, body, elapsed_ms)
        })
        .await?;

        let content_type = converted
            .content_type
            .map(str::to_string)
            .or(content_type);
        Ok(BackendReply {
            status,
            content_type,
            body: converted.body,
        }
        .into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    impl RequestConverter for Upper {
        fn convert(&self, _project: &Project, body: Bytes) -> Bytes {
            Bytes::from(body.to_ascii_uppercase())
        }
    }

    #[test]
    fn test_pass_through_is_identity() {
        let project = Project::global();
        let body = Bytes::from_static(b"{\"a\":1}");
        assert_eq!(
            RequestConverter::convert(&PassThrough, &project, body.clone()),
            body
        );

        let converted =
            ResponseConverter::convert(&PassThrough, &project, b"req", body.clone(), 10).unwrap();
        assert_eq!(converted.body, body);
        assert!(converted.content_type.is_none());
    }

    #[test]
    fn test_route_builder() {
        let backend = BackendClient::new(Duration::from_secs(1)).unwrap();
        let route = ProxyRoute::new(backend, "http://127.0.0.1:1/x", 1024)
            .with_request_converter(Upper);
        assert_eq!(route.target(), "http://127.0.0.1:1/x");
        let rewritten = route
            .request_converter
            .convert(&Project::global(), Bytes::from_static(b"abc"));
        assert_eq!(rewritten, Bytes::from_static(b"ABC"));
    }

    #[test]
    fn test_reply_keeps_status_and_type() {
        let response = BackendReply {
            status: StatusCode::CREATED,
            content_type: Some("application/json".to_string()),
            body: Bytes::from_static(b"[]"),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }
}
