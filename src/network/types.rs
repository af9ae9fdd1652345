//! Request and response values exchanged with the network and the store.

use reqwest::Method;
use url::Url;

/// An intercepted outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
  pub method: Method,
  pub url: Url,
}

impl Request {
  pub fn new(method: Method, url: Url) -> Self {
    Self { method, url }
  }

  /// Shorthand for a GET request.
  pub fn get(url: Url) -> Self {
    Self::new(Method::GET, url)
  }

  pub fn is_get(&self) -> bool {
    self.method == Method::GET
  }
}

/// A fully buffered response.
///
/// The body is read to completion when the response arrives, so handing one
/// copy to the caller and another to the store is a plain clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
  /// Final URL after redirects
  pub url: String,
  pub status: u16,
  pub status_text: String,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

impl Response {
  pub fn new(url: impl Into<String>, status: u16, body: impl Into<Vec<u8>>) -> Self {
    Self {
      url: url.into(),
      status,
      status_text: String::new(),
      headers: Vec::new(),
      body: body.into(),
    }
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  /// Case-insensitive header lookup.
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(n, _)| n.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }

  /// Only a plain 200 may be written to a cache.
  pub fn is_storable(&self) -> bool {
    self.status == 200
  }
}
