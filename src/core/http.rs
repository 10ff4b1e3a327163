//! Blocking HTTP transport for the search index.
//!
//! The index has no stable API, so responses are returned as decoded text
//! plus status; callers decide what counts as a failure. Undecodable bytes
//! are replaced instead of failing the whole response.

use reqwest::blocking::Client;

use crate::error::{Error, Result};

/// A fetched page. `ok` mirrors "any 2xx status".
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub url: String,
    pub status: u16,
    pub reason: String,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Converts a non-successful response into a `ServiceError`.
    pub fn into_success(self) -> Result<Self> {
        if self.ok() {
            Ok(self)
        } else {
            Err(Error::service_error(
                self.url,
                Some(self.status),
                self.reason,
            ))
        }
    }
}

/// Issues GET requests. Query pairs are URL-encoded by the implementation.
pub trait Transport {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse>;
}

/// reqwest-backed transport. No timeout beyond the client's defaults.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Decodes a response body as UTF-8, replacing invalid sequences with U+FFFD.
pub fn decode_body(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn request_error(url: &str, e: reqwest::Error) -> Error {
    Error::service_error(url, e.status().map(|s| s.as_u16()), e.to_string())
}

impl Transport for ReqwestTransport {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .map_err(|e| request_error(url, e))?;

        let final_url = response.url().to_string();
        let status = response.status();
        let bytes = response.bytes().map_err(|e| request_error(url, e))?;

        Ok(HttpResponse {
            url: final_url,
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
            body: decode_body(&bytes),
        })
    }
}
