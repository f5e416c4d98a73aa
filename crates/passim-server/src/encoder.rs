//! HTTP client for the external embedding service.
//!
//! The service accepts `POST {"text": "..."}` and answers
//! `{"embedding": [f32, ...]}`. Calls block, so handlers run them on the
//! blocking pool.

use passim_core::{Encoder, Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Encoder backed by an HTTP embedding endpoint.
#[derive(Debug, Clone)]
pub struct HttpEncoder {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpEncoder {
    /// Creates a client for `url` with a per-request `timeout`.
    ///
    /// Must not be called from inside an async runtime.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Encoder(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Encoder endpoint.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Encoder for HttpEncoder {
    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(&self.url)
            .json(&EmbedRequest { text })
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|e| Error::Encoder(format!("request to {} failed: {e}", self.url)))?;

        let body: EmbedResponse = response
            .json()
            .map_err(|e| Error::Encoder(format!("invalid encoder response: {e}")))?;
        if body.embedding.is_empty() {
            return Err(Error::Encoder("encoder returned an empty embedding".to_string()));
        }
        Ok(body.embedding)
    }
}
