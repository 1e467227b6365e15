use async_trait::async_trait;
use reqwest::Method;

use super::{FetchError, FetchOptions, FetchResponse, Fetcher};

/// `reqwest`-backed fetcher. The client is cheaply cloneable and pools
/// connections internally.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, target: &str, options: &FetchOptions) -> Result<FetchResponse, FetchError> {
        let method = Method::from_bytes(options.method.as_bytes())
            .map_err(|_| FetchError::InvalidRequest(format!("bad method '{}'", options.method)))?;

        let mut request = self.client.request(method, target);
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &options.body {
            request = request.body(body.clone());
        }
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(FetchResponse { status, body })
    }
}
