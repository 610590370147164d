//! JSON client for a remote call service.
//!
//! | Request | Body | Response |
//! |---------|------|----------|
//! | `GET {base}/samples` | | `{"samples": ["hu001", ...]}` |
//! | `POST {base}/calls` | `{"samples": [...], "low": "2c5.00.0010", "high": "2c5.00.0014"}` | `{"calls": {"hu001": [[tokens...], [tokens...]]}}` |
//!
//! Positions and calls use the compact token form of the library's address
//! widths.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::debug;

use crate::core::address::{AddressConfig, TilePosition};
use crate::core::token::{format_position, Call};
use crate::core::types::SampleId;

use super::{CallProvider, PopulationCalls, ProviderError};

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpProviderConfig {
    /// Base URL of the call service, without a trailing slash
    pub base_url: String,
    pub timeout: Duration,
}

impl HttpProviderConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Serialize)]
struct CallsRequest<'a> {
    samples: Vec<&'a str>,
    low: String,
    high: String,
}

#[derive(Deserialize)]
struct SamplesResponse {
    samples: Vec<String>,
}

#[derive(Deserialize)]
struct CallsResponse {
    calls: BTreeMap<String, [Vec<String>; 2]>,
}

/// Call provider spoken to over HTTP with a blocking client
///
/// Requests are not retried; a timeout or transport failure is returned as is.
#[derive(Debug, Clone)]
pub struct HttpCallProvider {
    client: reqwest::blocking::Client,
    config: HttpProviderConfig,
    address: AddressConfig,
}

impl HttpCallProvider {
    /// # Errors
    ///
    /// Returns `ProviderError::Transport` if the HTTP client cannot be built.
    pub fn new(config: HttpProviderConfig, address: AddressConfig) -> Result<Self, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            config,
            address,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.config.base_url.trim_end_matches('/'))
    }

    fn map_error(&self, e: &reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout(self.config.timeout)
        } else if e.is_decode() || e.is_status() {
            ProviderError::Protocol(e.to_string())
        } else {
            ProviderError::Transport(e.to_string())
        }
    }

    fn parse_calls(&self, sample: &str, tokens: &[String]) -> Result<Vec<Call>, ProviderError> {
        tokens
            .iter()
            .map(|token| {
                Call::parse(token, &self.address).map_err(|e| {
                    ProviderError::Protocol(format!("bad call for sample {sample}: {e}"))
                })
            })
            .collect()
    }
}

impl CallProvider for HttpCallProvider {
    fn list_samples(&self) -> Result<BTreeSet<SampleId>, ProviderError> {
        let response: SamplesResponse = self
            .client
            .get(self.url("samples"))
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(|r| r.json())
            .map_err(|e| self.map_error(&e))?;
        Ok(response.samples.into_iter().map(SampleId).collect())
    }

    fn calls_for_range(
        &self,
        samples: &BTreeSet<SampleId>,
        low: TilePosition,
        high: TilePosition,
    ) -> Result<PopulationCalls, ProviderError> {
        let request = CallsRequest {
            samples: samples.iter().map(|s| s.0.as_str()).collect(),
            low: format_position(low, &self.address),
            high: format_position(high, &self.address),
        };
        debug!(
            samples = samples.len(),
            low = %request.low,
            high = %request.high,
            "Requesting calls"
        );

        let response: CallsResponse = self
            .client
            .post(self.url("calls"))
            .json(&request)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(|r| r.json())
            .map_err(|e| self.map_error(&e))?;

        response
            .calls
            .into_iter()
            .map(|(sample, [a, b])| {
                let phased = [self.parse_calls(&sample, &a)?, self.parse_calls(&sample, &b)?];
                Ok((SampleId(sample), phased))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let provider = HttpCallProvider::new(
            HttpProviderConfig::new("http://calls.example.org/api/"),
            AddressConfig::default(),
        )
        .unwrap();
        assert_eq!(provider.url("calls"), "http://calls.example.org/api/calls");
    }

    #[test]
    fn test_unreachable_service_is_transport_error() {
        // Port 9 (discard) is closed on test machines
        let provider = HttpCallProvider::new(
            HttpProviderConfig::new("http://127.0.0.1:9").with_timeout(Duration::from_secs(2)),
            AddressConfig::default(),
        )
        .unwrap();
        let err = provider.list_samples().unwrap_err();
        assert!(matches!(
            err,
            ProviderError::Transport(_) | ProviderError::Timeout(_)
        ));
    }

    #[test]
    fn test_bad_tokens_are_protocol_errors() {
        let provider = HttpCallProvider::new(
            HttpProviderConfig::new("http://127.0.0.1:9"),
            AddressConfig::default(),
        )
        .unwrap();
        let err = provider
            .parse_calls("hu001", &["zzz.00.0000.000".to_string()])
            .unwrap_err();
        assert!(matches!(err, ProviderError::Protocol(_)));
    }
}
