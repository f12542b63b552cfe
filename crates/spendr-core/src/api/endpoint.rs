use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client};

use super::request::{ApiRequest, ApiResponse};
use crate::config::Config;

/// HTTP connection to one API base URL.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct Endpoint {
    client: Client,
    base_url: Arc<str>,
}

impl Endpoint {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        Self::new(&config.api_base_url(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Perform one HTTP exchange and buffer the body. No retries, no status handling.
    pub async fn send(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, reqwest::Error> {
        let mut builder = self
            .client
            .request(request.method().clone(), self.url(request.path()))
            .header(header::ACCEPT, "application/json")
            .header(header::CONTENT_TYPE, request.effective_content_type());

        if !request.query_pairs().is_empty() {
            builder = builder.query(request.query_pairs());
        }
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = request.body() {
            builder = builder.body(body.to_string());
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok(ApiResponse::new(status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let endpoint = Endpoint::new("http://localhost:8000/api/", Duration::from_secs(5))
            .expect("client should build");
        assert_eq!(endpoint.base_url(), "http://localhost:8000/api");
        assert_eq!(endpoint.url("auth/login/"), "http://localhost:8000/api/auth/login/");
        assert_eq!(endpoint.url("/auth/user/"), "http://localhost:8000/api/auth/user/");
    }
}
