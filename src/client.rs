//! KairosDB REST client.
//!
//! This module provides the main `Client` type. Every call returns the status
//! code and the server's error messages in a response envelope; only local
//! validation, transport and decode failures are returned as `Err`.

use std::sync::Arc;

use reqwest::Url;
use tracing::debug;

use crate::error::{Error, Result};
use crate::metric::MetricBuilder;
use crate::parser::ResponseParser;
use crate::query::QueryBuilder;
use crate::registry::DataPointTypeRegistry;
use crate::response::{
    GetResponse, QueryResponse, QueryTagResponse, Response, RollupResponse, RollupTaskResponse,
};
use crate::rollup::RollupBuilder;
use crate::tag_query::QueryTagBuilder;
use crate::transport::{HttpTransport, Transport};

/// KairosDB REST client.
///
/// # Example
///
/// ```ignore
/// use kairos_client::{Aggregator, Client, QueryBuilder, RelativeTime, TimeUnit};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = Client::new("http://localhost:8080")?;
///
///     let mut query = QueryBuilder::new();
///     query.set_start_relative(RelativeTime::new(1, TimeUnit::Hours)?);
///     query
///         .add_metric("cpu.load")?
///         .add_tag("host", "server1")?
///         .add_aggregator(Aggregator::avg(1, TimeUnit::Minutes)?);
///
///     let response = client.query(&query).await?;
///     for result in response.queries.iter().flat_map(|q| &q.results) {
///         println!("{}: {} points", result.name, result.data_points.len());
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Clone, Debug)]
pub struct Client<T: Transport = HttpTransport> {
    transport: T,
    base_url: Url,
    parser: ResponseParser,
}

impl Client<HttpTransport> {
    /// Create a client for the server at `url` (e.g. "http://localhost:8080").
    pub fn new(url: impl AsRef<str>) -> Result<Self> {
        Self::with_transport(HttpTransport::new(), url)
    }

    /// Create a client with a custom reqwest client.
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_http_client(http: reqwest::Client, url: impl AsRef<str>) -> Result<Self> {
        Self::with_transport(HttpTransport::with_http_client(http), url)
    }
}

impl<T: Transport> Client<T> {
    /// Create a client sending its requests through `transport`.
    pub fn with_transport(transport: T, url: impl AsRef<str>) -> Result<Self> {
        let url = url.as_ref();
        let base_url =
            Url::parse(url).map_err(|e| Error::InvalidUrl(format!("'{}': {}", url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidUrl(format!("'{}' cannot be a base URL", url)));
        }
        Ok(Self {
            transport,
            base_url,
            parser: ResponseParser::default(),
        })
    }

    /// Decode values with `registry` instead of the built-in types only.
    pub fn with_registry(mut self, registry: Arc<DataPointTypeRegistry>) -> Self {
        let mut parser = ResponseParser::new(registry);
        for name in self.parser.custom_group_bys() {
            parser.register_custom_group_by(name.clone());
        }
        self.parser = parser;
        self
    }

    /// Accept group-by entries named `name` in query responses.
    pub fn register_custom_group_by(&mut self, name: impl Into<String>) -> &mut Self {
        self.parser.register_custom_group_by(name);
        self
    }

    /// Get the base URL.
    pub fn url(&self) -> &Url {
        &self.base_url
    }

    pub fn parser(&self) -> &ResponseParser {
        &self.parser
    }

    /// Build the URL of an API endpoint. Segments are percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidUrl(format!("'{}' cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(["api", "v1"])
            .extend(segments);
        Ok(url)
    }

    /// Names of all metrics stored on the server.
    pub async fn metric_names(&self) -> Result<GetResponse> {
        let response = self.transport.get(&self.endpoint(&["metricnames"])?).await?;
        self.parser.parse_get_response(response.status, &response.body)
    }

    /// Names of all tags stored on the server.
    pub async fn tag_names(&self) -> Result<GetResponse> {
        let response = self.transport.get(&self.endpoint(&["tagnames"])?).await?;
        self.parser.parse_get_response(response.status, &response.body)
    }

    /// All tag values stored on the server.
    pub async fn tag_values(&self) -> Result<GetResponse> {
        let response = self.transport.get(&self.endpoint(&["tagvalues"])?).await?;
        self.parser.parse_get_response(response.status, &response.body)
    }

    /// Results of the server's health checks, one string per check.
    pub async fn health_status(&self) -> Result<GetResponse> {
        let url = self.endpoint(&["health", "status"])?;
        let response = self.transport.get(&url).await?;
        self.parser.parse_health_status(response.status, &response.body)
    }

    /// 204 when every health check passes, 500 otherwise.
    pub async fn health_check(&self) -> Result<Response> {
        let url = self.endpoint(&["health", "check"])?;
        let response = self.transport.get(&url).await?;
        Ok(self.parser.parse_response(response.status, &response.body))
    }

    /// Server version string, as the single result.
    pub async fn version(&self) -> Result<GetResponse> {
        let response = self.transport.get(&self.endpoint(&["version"])?).await?;
        self.parser.parse_version(response.status, &response.body)
    }

    /// Write the data points of `builder`.
    pub async fn push_metrics(&self, builder: &MetricBuilder) -> Result<Response> {
        let body = builder.build()?;
        debug!(metrics = builder.metrics().len(), "pushing metrics");
        let response = self.transport.post(&self.endpoint(&["datapoints"])?, body).await?;
        Ok(self.parser.parse_response(response.status, &response.body))
    }

    /// Write a gzip-compressed write batch document.
    pub async fn push_compressed(&self, gzipped: Vec<u8>) -> Result<Response> {
        let url = self.endpoint(&["datapoints"])?;
        let response = self.transport.post_compressed(&url, gzipped).await?;
        Ok(self.parser.parse_response(response.status, &response.body))
    }

    /// Run a data point query.
    pub async fn query(&self, builder: &QueryBuilder) -> Result<QueryResponse> {
        let body = builder.build()?;
        let url = self.endpoint(&["datapoints", "query"])?;
        let response = self.transport.post(&url, body).await?;
        let decoded = self
            .parser
            .parse_query_response(response.status, &response.body)?;
        debug!(
            status = decoded.status_code,
            errors = decoded.errors.len(),
            queries = decoded.queries.len(),
            "query completed"
        );
        Ok(decoded)
    }

    /// Run a tag query.
    pub async fn query_tags(&self, builder: &QueryTagBuilder) -> Result<QueryTagResponse> {
        let body = builder.build()?;
        let url = self.endpoint(&["datapoints", "query", "tags"])?;
        let response = self.transport.post(&url, body).await?;
        self.parser.parse_tag_response(response.status, &response.body)
    }

    /// Delete the data points selected by `builder`.
    pub async fn delete_data_points(&self, builder: &QueryBuilder) -> Result<Response> {
        let body = builder.build()?;
        let url = self.endpoint(&["datapoints", "delete"])?;
        let response = self.transport.post(&url, body).await?;
        Ok(self.parser.parse_response(response.status, &response.body))
    }

    /// Delete a metric and all of its data points.
    pub async fn delete_metric(&self, name: &str) -> Result<Response> {
        if name.is_empty() {
            return Err(Error::validation("metric name cannot be empty"));
        }
        let url = self.endpoint(&["metric", name])?;
        let response = self.transport.delete(&url).await?;
        Ok(self.parser.parse_response(response.status, &response.body))
    }

    pub async fn create_rollup_task(&self, builder: &RollupBuilder) -> Result<RollupResponse> {
        let body = builder.build()?;
        let response = self.transport.post(&self.endpoint(&["rollups"])?, body).await?;
        self.parser.parse_rollup_response(response.status, &response.body)
    }

    pub async fn get_rollup_tasks(&self) -> Result<RollupTaskResponse> {
        let response = self.transport.get(&self.endpoint(&["rollups"])?).await?;
        self.parser.parse_rollup_tasks(response.status, &response.body)
    }

    pub async fn get_rollup_task(&self, id: &str) -> Result<RollupTaskResponse> {
        if id.is_empty() {
            return Err(Error::validation("rollup task id cannot be empty"));
        }
        let response = self.transport.get(&self.endpoint(&["rollups", id])?).await?;
        self.parser.parse_rollup_tasks(response.status, &response.body)
    }

    pub async fn delete_rollup_task(&self, id: &str) -> Result<Response> {
        if id.is_empty() {
            return Err(Error::validation("rollup task id cannot be empty"));
        }
        let response = self.transport.delete(&self.endpoint(&["rollups", id])?).await?;
        Ok(self.parser.parse_response(response.status, &response.body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_paths() {
        let client = Client::new("http://localhost:8080").unwrap();
        assert_eq!(
            client.endpoint(&["datapoints", "query"]).unwrap().as_str(),
            "http://localhost:8080/api/v1/datapoints/query"
        );

        let prefixed = Client::new("http://example.com/kairos/").unwrap();
        assert_eq!(
            prefixed.endpoint(&["version"]).unwrap().as_str(),
            "http://example.com/kairos/api/v1/version"
        );
    }

    #[test]
    fn test_endpoint_encodes_names() {
        let client = Client::new("http://localhost:8080").unwrap();
        assert_eq!(
            client.endpoint(&["metric", "cpu load/1"]).unwrap().as_str(),
            "http://localhost:8080/api/v1/metric/cpu%20load%2F1"
        );
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(Client::new("not a url"), Err(Error::InvalidUrl(_))));
        assert!(matches!(Client::new("mailto:someone@example.com"), Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_registry_keeps_custom_group_bys() {
        let mut client = Client::new("http://localhost:8080").unwrap();
        client.register_custom_group_by("geo");
        let client = client.with_registry(Arc::new(DataPointTypeRegistry::new()));
        assert!(client.parser().custom_group_bys().contains("geo"));
    }
}
