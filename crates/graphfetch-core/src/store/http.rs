//! SPARQL endpoint client
//!
//! Posts form-encoded CONSTRUCT queries and parses the JSON-LD reply.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use tracing::debug;

use super::parse::parse_graph;
use super::{GraphRequest, TripleStore};
use crate::config::{Config, StoreConfig};
use crate::error::{Error, Result};
use crate::graph::{Namespace, Node};

/// Default response format requested from the endpoint
const DEFAULT_FORMAT: &str = "application/ld+json";

/// Longest response excerpt kept in an error message
const MAX_ERROR_BODY: usize = 512;

/// HTTP triple store client
#[derive(Clone)]
pub struct HttpStore {
    http_client: HttpClient,
    endpoint: String,
    format: String,
    namespace: Namespace,
}

impl std::fmt::Debug for HttpStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpStore")
            .field("endpoint", &self.endpoint)
            .field("format", &self.format)
            .field("namespace", &self.namespace.iri())
            .finish()
    }
}

/// Builder for creating an HttpStore
pub struct HttpStoreBuilder {
    endpoint: Option<String>,
    format: Option<String>,
    namespace: Option<Namespace>,
    timeout: Option<Duration>,
}

impl Default for HttpStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpStoreBuilder {
    pub fn new() -> Self {
        Self {
            endpoint: None,
            format: None,
            namespace: None,
            timeout: None,
        }
    }

    /// Set the SPARQL endpoint URL
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the requested response format
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Set the namespace used to recognise references in responses
    pub fn namespace(mut self, namespace: Namespace) -> Self {
        self.namespace = Some(namespace);
        self
    }

    /// Set the per-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<HttpStore> {
        let endpoint = self
            .endpoint
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| Error::ConfigError("store endpoint is required".to_string()))?;
        let namespace = self
            .namespace
            .ok_or_else(|| Error::ConfigError("graph namespace is required".to_string()))?;

        let http_client = HttpClient::builder()
            .timeout(self.timeout.unwrap_or(Duration::from_secs(30)))
            .build()
            .map_err(Error::NetworkError)?;

        Ok(HttpStore {
            http_client,
            endpoint,
            format: self.format.unwrap_or_else(|| DEFAULT_FORMAT.to_string()),
            namespace,
        })
    }
}

impl HttpStore {
    pub fn builder() -> HttpStoreBuilder {
        HttpStoreBuilder::new()
    }

    /// Create a store from the `store` and `graph` configuration sections
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::from_store_config(&config.store, config.graph.namespace())
    }

    pub fn from_store_config(store: &StoreConfig, namespace: Namespace) -> Result<Self> {
        HttpStoreBuilder::new()
            .endpoint(store.resolved_endpoint())
            .format(store.format.clone())
            .namespace(namespace)
            .timeout(store.timeout())
            .build()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Post a query and return the raw response body
    async fn execute(&self, query: &str) -> Result<String> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, &self.format)
            .form(&[("query", query), ("format", self.format.as_str())])
            .send()
            .await
            .map_err(Error::NetworkError)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::StoreError(format!(
                "HTTP {}: {}",
                status,
                truncate(&body, MAX_ERROR_BODY)
            )));
        }

        response.text().await.map_err(Error::NetworkError)
    }
}

#[async_trait]
impl TripleStore for HttpStore {
    async fn construct(&self, request: &GraphRequest) -> Result<Vec<Node>> {
        debug!(
            endpoint = %self.endpoint,
            subjects = request.subjects.len(),
            "Sending CONSTRUCT query"
        );

        let body = self.execute(&request.query).await?;
        parse_graph(&body, &self.namespace)
    }
}

fn truncate(body: &str, max: usize) -> &str {
    if body.len() <= max {
        return body;
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
