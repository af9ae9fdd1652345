//! Network backend: the `Fetch` seam and its reqwest implementation.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::config::NetworkConfig;
use crate::error::{CacheError, Result};

use super::types::{Request, Response};

/// Anything that can turn a request into a response.
///
/// A non-200 status is still `Ok`; only failing to get a response at all
/// (connectivity loss, DNS, TLS, timeout) is an error.
pub trait Fetch: Send + Sync {
  fn fetch(&self, request: &Request) -> impl Future<Output = Result<Response>> + Send;
}

/// HTTP client wrapper
#[derive(Clone)]
pub struct HttpClient {
  client: reqwest::Client,
}

impl HttpClient {
  pub fn new(config: &NetworkConfig) -> Result<Self> {
    let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(config.timeout_secs));

    if let Some(agent) = &config.user_agent {
      builder = builder.user_agent(agent.clone());
    }

    let client = builder.build().map_err(|e| CacheError::Network {
      url: String::new(),
      message: format!("Failed to build HTTP client: {}", e),
    })?;

    Ok(Self { client })
  }
}

impl Fetch for HttpClient {
  async fn fetch(&self, request: &Request) -> Result<Response> {
    let network_error = |e: reqwest::Error| CacheError::Network {
      url: request.url.to_string(),
      message: e.to_string(),
    };

    let response = self
      .client
      .request(request.method.clone(), request.url.clone())
      .send()
      .await
      .map_err(network_error)?;

    let status = response.status();
    let url = response.url().to_string();
    let headers = response
      .headers()
      .iter()
      .filter_map(|(name, value)| {
        value
          .to_str()
          .ok()
          .map(|v| (name.as_str().to_string(), v.to_string()))
      })
      .collect();

    let body = response.bytes().await.map_err(network_error)?;

    debug!(%url, status = status.as_u16(), bytes = body.len(), "fetched");

    Ok(Response {
      url,
      status: status.as_u16(),
      status_text: status.canonical_reason().unwrap_or_default().to_string(),
      headers,
      body: body.to_vec(),
    })
  }
}
