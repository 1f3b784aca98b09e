//! HTTP client service
//!
//! Encapsulates HTTP communication with the gateway and direct provider endpoints

use crate::config::{RequestConfig, Settings};
use crate::services::sse::{decode_sse, SseStream};
use crate::utils::error::{ProbeError, ProbeResult};
use crate::utils::logging::create_request_log_summary;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// User agent sent unless a probe overrides it
pub const DEFAULT_USER_AGENT: &str = concat!("gatewayprobe/", env!("CARGO_PKG_VERSION"));

/// Gateway API client
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    stream_client: Client,
    base_url: String,
    api_key: String,
    bearer: bool,
    headers: Vec<(String, String)>,
    timeout: u64,
    stream_timeout: u64,
}

/// Raw response for diagnostics that must not fail on non-2xx
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub elapsed: Duration,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> ProbeResult<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

impl GatewayClient {
    /// Create a new client instance
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        request: &RequestConfig,
    ) -> ProbeResult<Self> {
        let mut client = Self {
            client: Client::new(),
            stream_client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            bearer: true,
            headers: Vec::new(),
            timeout: request.timeout,
            stream_timeout: request.stream_timeout,
        };
        client.rebuild(DEFAULT_USER_AGENT)?;
        Ok(client)
    }

    /// Client for the gateway configured in `settings`
    pub fn gateway(settings: &Settings) -> ProbeResult<Self> {
        Self::new(&settings.gateway.base_url, &settings.gateway.api_key, &settings.request)
    }

    /// Client for direct BytePlus Ark calls
    pub fn byteplus(settings: &Settings) -> ProbeResult<Self> {
        Self::new(&settings.byteplus.base_url, &settings.byteplus.api_key, &settings.request)
    }

    /// Client for the Kling routes
    pub fn kling(settings: &Settings) -> ProbeResult<Self> {
        Self::new(&settings.kling.base_url, &settings.gateway.api_key, &settings.request)
    }

    fn rebuild(&mut self, user_agent: &str) -> ProbeResult<()> {
        self.client = Client::builder()
            .timeout(Duration::from_secs(self.timeout))
            .user_agent(user_agent)
            .build()?;

        self.stream_client = Client::builder()
            .timeout(Duration::from_secs(self.stream_timeout))
            .user_agent(user_agent)
            .build()?;

        Ok(())
    }

    /// Replace the request timeout (seconds) for slow probes
    pub fn with_timeout(mut self, timeout: u64) -> ProbeResult<Self> {
        self.timeout = timeout;
        self.rebuild(DEFAULT_USER_AGENT)?;
        Ok(self)
    }

    /// Replace the default user agent
    pub fn with_user_agent(mut self, user_agent: &str) -> ProbeResult<Self> {
        self.rebuild(user_agent)?;
        Ok(self)
    }

    /// Add a header sent with every request
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Stop sending `Authorization: Bearer`, for APIs keyed by custom headers
    pub fn without_bearer(mut self) -> Self {
        self.bearer = false;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Join base URL and path with exactly one `/`; absolute URLs pass through
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn prepare(&self, builder: RequestBuilder) -> RequestBuilder {
        let mut builder = builder;
        if self.bearer && !self.api_key.is_empty() {
            builder = builder.header("Authorization", format!("Bearer {}", self.api_key));
        }
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
    }

    fn log_request<Req: Serialize + ?Sized>(&self, method: &str, url: &str, body: &Req) {
        if tracing::enabled!(tracing::Level::DEBUG) {
            let summary = serde_json::to_value(body)
                .map(|v| create_request_log_summary(&v))
                .unwrap_or(serde_json::Value::Null);
            debug!(method, url, body = %summary, "Sending request");
        }
    }

    async fn send(&self, builder: RequestBuilder, timeout: u64) -> ProbeResult<Response> {
        builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ProbeError::Timeout(timeout)
            } else {
                ProbeError::HttpClient(e)
            }
        })
    }

    /// POST a JSON body and decode a JSON response
    pub async fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> ProbeResult<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = self.url(path);
        self.log_request("POST", &url, body);

        let builder = self.prepare(self.client.post(&url)).json(body);
        let response = self.send(builder, self.timeout).await?;

        self.handle_response(response).await
    }

    /// GET and decode a JSON response
    pub async fn get_json<Resp: DeserializeOwned>(&self, path: &str) -> ProbeResult<Resp> {
        let url = self.url(path);
        debug!(method = "GET", url = %url, "Sending request");

        let builder = self.prepare(self.client.get(&url));
        let response = self.send(builder, self.timeout).await?;

        self.handle_response(response).await
    }

    /// POST and return status, headers and body whatever the status code
    pub async fn post_raw<Req: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &Req,
        headers: &[(&str, &str)],
    ) -> ProbeResult<RawResponse> {
        let url = self.url(path);
        self.log_request("POST", &url, body);

        let mut builder = self.prepare(self.client.post(&url)).json(body);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let started = Instant::now();
        let response = self.send(builder, self.timeout).await?;
        Self::into_raw(response, started).await
    }

    /// GET and return status, headers and body whatever the status code
    pub async fn get_raw(&self, path: &str) -> ProbeResult<RawResponse> {
        let url = self.url(path);
        debug!(method = "GET", url = %url, "Sending request");

        let started = Instant::now();
        let response = self.send(self.prepare(self.client.get(&url)), self.timeout).await?;
        Self::into_raw(response, started).await
    }

    async fn into_raw(response: Response, started: Instant) -> ProbeResult<RawResponse> {
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("<binary>").to_string()))
            .collect();
        let body = response.text().await?;

        Ok(RawResponse {
            status,
            headers,
            body,
            elapsed: started.elapsed(),
        })
    }

    /// POST a streaming request and return its SSE `data:` payloads
    pub async fn post_stream<Req: Serialize + ?Sized>(&self, path: &str, body: &Req) -> ProbeResult<SseStream> {
        let url = self.url(path);
        self.log_request("POST", &url, body);

        let builder = self
            .prepare(self.stream_client.post(&url))
            .header("Accept", "text/event-stream")
            .json(body);
        let response = self.send(builder, self.stream_timeout).await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "Streaming request failed");
            return Err(ProbeError::from_status(status.as_u16(), &error_text));
        }

        Ok(decode_sse(response.bytes_stream()))
    }

    /// Handle HTTP response
    async fn handle_response<Resp: DeserializeOwned>(&self, response: Response) -> ProbeResult<Resp> {
        let status = response.status();

        if status.is_success() {
            let text = response.text().await?;
            let parsed = serde_json::from_str(&text)?;
            debug!(status = status.as_u16(), "Request completed successfully");
            Ok(parsed)
        } else {
            let error_text = response.text().await.unwrap_or_default();
            let err = ProbeError::from_status(status.as_u16(), &error_text);
            error!(status = status.as_u16(), "{}", err);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_config() -> RequestConfig {
        RequestConfig {
            timeout: 30,
            stream_timeout: 60,
        }
    }

    #[test]
    fn test_url_joining() {
        let client = GatewayClient::new("http://localhost:3000/", "sk-test", &request_config()).unwrap();
        assert_eq!(client.base_url(), "http://localhost:3000");
        assert_eq!(client.url("/v1/chat/completions"), "http://localhost:3000/v1/chat/completions");
        assert_eq!(client.url("v1/models"), "http://localhost:3000/v1/models");
        assert_eq!(client.url("https://ark.example.com/api/v3/responses"), "https://ark.example.com/api/v3/responses");
    }

    #[test]
    fn test_raw_response_helpers() {
        let raw = RawResponse {
            status: 401,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: r#"{"error":{"message":"bad key"}}"#.to_string(),
            elapsed: Duration::from_millis(5),
        };
        assert!(!raw.is_success());
        assert_eq!(raw.header("content-type"), Some("application/json"));
        let value: serde_json::Value = raw.json().unwrap();
        assert_eq!(value["error"]["message"], "bad key");
    }
}
