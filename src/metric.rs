//! Write-side metrics and the batch builder that serializes them.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::registry::{DataPointType, DataPointTypeRegistry, NUMBER_TYPE, TEXT_TYPE};
use crate::time::now_millis;
use crate::value::{DataPoint, DataPointValue};

/// A named series of data points to push, with its tags.
#[derive(Clone, Debug, PartialEq)]
pub struct Metric {
    name: String,
    type_name: Option<String>,
    ttl: Option<u32>,
    tags: BTreeMap<String, String>,
    data_points: Vec<DataPoint>,
}

impl Metric {
    fn new(name: String) -> Self {
        Self {
            name,
            type_name: None,
            ttl: None,
            tags: BTreeMap::new(),
            data_points: Vec::new(),
        }
    }

    /// Add a tag. Both name and value must be non-empty.
    pub fn add_tag(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<&mut Self> {
        let name = name.into();
        let value = value.into();
        if name.is_empty() {
            return Err(Error::validation(format!(
                "tag name cannot be empty on metric '{}'",
                self.name
            )));
        }
        if value.is_empty() {
            return Err(Error::validation(format!(
                "value of tag '{}' cannot be empty on metric '{}'",
                name, self.name
            )));
        }
        self.tags.insert(name, value);
        Ok(self)
    }

    /// Add a data point at `timestamp` (epoch ms, must be greater than 0).
    pub fn add_data_point(
        &mut self,
        timestamp: i64,
        value: impl Into<DataPointValue>,
    ) -> Result<&mut Self> {
        if timestamp <= 0 {
            return Err(Error::validation(format!(
                "timestamp must be greater than 0, got {}",
                timestamp
            )));
        }
        self.data_points.push(DataPoint::new(timestamp, value));
        Ok(self)
    }

    /// Add a data point stamped with the current wall-clock time.
    pub fn add_data_point_now(&mut self, value: impl Into<DataPointValue>) -> &mut Self {
        self.data_points.push(DataPoint::new(now_millis(), value));
        self
    }

    /// Declare the registered custom value type of this metric's points.
    pub fn set_type(&mut self, type_name: impl Into<String>) -> Result<&mut Self> {
        let type_name = type_name.into();
        if type_name.is_empty() {
            return Err(Error::validation("metric type cannot be empty"));
        }
        self.type_name = Some(type_name);
        Ok(self)
    }

    /// Time to live of the pushed points, in seconds.
    pub fn set_ttl(&mut self, seconds: u32) -> Result<&mut Self> {
        if seconds == 0 {
            return Err(Error::validation("ttl must be greater than 0"));
        }
        self.ttl = Some(seconds);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    pub fn ttl(&self) -> Option<u32> {
        self.ttl
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn data_points(&self) -> &[DataPoint] {
        &self.data_points
    }

    fn encode_point(
        &self,
        point: &DataPoint,
        registry: &DataPointTypeRegistry,
    ) -> Result<serde_json::Value> {
        let shape: &dyn DataPointType = match (&self.type_name, point.value()) {
            (_, DataPointValue::Null) => {
                return Err(Error::validation(format!(
                    "data point at {} of metric '{}' has no value",
                    point.timestamp(),
                    self.name
                )));
            }
            (Some(type_name), _) => registry.lookup(type_name),
            (None, DataPointValue::Text(_)) => registry.lookup(TEXT_TYPE),
            (None, DataPointValue::Custom(_)) => {
                return Err(Error::validation(format!(
                    "metric '{}' holds custom values but declares no type",
                    self.name
                )));
            }
            (None, _) => registry.lookup(NUMBER_TYPE),
        };
        shape.encode(point.value())
    }
}

/// Wire shape of one metric in a write batch.
#[derive(Debug, Serialize)]
struct MetricPayload<'a> {
    name: &'a str,
    tags: &'a BTreeMap<String, String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    type_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ttl: Option<u32>,
    datapoints: Vec<(i64, serde_json::Value)>,
}

/// Builds the JSON document for a batch push of metrics.
///
/// # Example
///
/// ```
/// use kairos_client::MetricBuilder;
///
/// let mut builder = MetricBuilder::new();
/// builder
///     .add_metric("cpu.load")?
///     .add_tag("host", "server1")?
///     .add_data_point(1_700_000_000_000, 0.75)?;
///
/// let json = builder.build()?;
/// assert_eq!(
///     json,
///     r#"[{"name":"cpu.load","tags":{"host":"server1"},"datapoints":[[1700000000000,0.75]]}]"#
/// );
/// # Ok::<(), kairos_client::Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct MetricBuilder {
    metrics: Vec<Metric>,
    registry: Arc<DataPointTypeRegistry>,
}

impl MetricBuilder {
    pub fn new() -> Self {
        Self::with_registry(Arc::new(DataPointTypeRegistry::new()))
    }

    /// Use `registry` to encode points of metrics with a declared type.
    pub fn with_registry(registry: Arc<DataPointTypeRegistry>) -> Self {
        Self {
            metrics: Vec::new(),
            registry,
        }
    }

    /// Add a metric and return it for tagging and adding points.
    pub fn add_metric(&mut self, name: impl Into<String>) -> Result<&mut Metric> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::validation("metric name cannot be empty"));
        }
        self.metrics.push(Metric::new(name));
        let last = self.metrics.len() - 1;
        Ok(&mut self.metrics[last])
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    /// Serialize every metric. Fails if any metric has no tags.
    ///
    /// The builder is left untouched and can be extended and built again.
    pub fn build(&self) -> Result<String> {
        let mut payloads = Vec::with_capacity(self.metrics.len());
        for metric in &self.metrics {
            if metric.tags.is_empty() {
                return Err(Error::validation(format!(
                    "metric '{}' must contain at least one tag",
                    metric.name
                )));
            }
            let datapoints = metric
                .data_points
                .iter()
                .map(|p| Ok((p.timestamp(), metric.encode_point(p, &self.registry)?)))
                .collect::<Result<Vec<_>>>()?;
            payloads.push(MetricPayload {
                name: &metric.name,
                tags: &metric.tags,
                type_name: metric.type_name.as_deref(),
                ttl: metric.ttl,
                datapoints,
            });
        }
        Ok(serde_json::to_string(&payloads)?)
    }
}

impl Default for MetricBuilder {
    fn default() -> Self {
        Self::new()
    }
}
