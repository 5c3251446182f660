//! Read-query builder.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::aggregator::Aggregator;
use crate::error::{Error, Result};
use crate::grouper::Grouper;
use crate::json::{JsonObject, raw_array};
use crate::time::{RelativeTime, TimeRange, now_millis};

/// Sort order of returned data points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    Asc,
    Desc,
}

/// Add `value` to the candidate values of tag `name`, keeping insertion order
/// and dropping duplicates.
pub(crate) fn add_tag_value(
    tags: &mut BTreeMap<String, Vec<String>>,
    metric: &str,
    name: String,
    value: String,
) -> Result<()> {
    if name.is_empty() {
        return Err(Error::validation(format!("tag name cannot be empty on metric '{}'", metric)));
    }
    if value.is_empty() {
        return Err(Error::validation(format!(
            "value of tag '{}' cannot be empty on metric '{}'",
            name, metric
        )));
    }
    let values = tags.entry(name).or_default();
    if !values.contains(&value) {
        values.push(value);
    }
    Ok(())
}

/// A metric to read, with its filters and transforms.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryMetric {
    name: String,
    tags: BTreeMap<String, Vec<String>>,
    aggregators: Vec<Aggregator>,
    grouper: Option<Grouper>,
    limit: Option<u64>,
    order: Option<Order>,
    exclude_tags: bool,
}

impl QueryMetric {
    fn new(name: String) -> Self {
        Self {
            name,
            tags: BTreeMap::new(),
            aggregators: Vec::new(),
            grouper: None,
            limit: None,
            order: None,
            exclude_tags: false,
        }
    }

    /// Only return series whose tag `name` equals `value`. Adding several
    /// values for one tag matches any of them.
    pub fn add_tag(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<&mut Self> {
        add_tag_value(&mut self.tags, &self.name, name.into(), value.into())?;
        Ok(self)
    }

    pub fn add_tags<I, S>(&mut self, name: impl Into<String>, values: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        for value in values {
            add_tag_value(&mut self.tags, &self.name, name.clone(), value.into())?;
        }
        Ok(self)
    }

    /// Append an aggregator to the end of the pipeline.
    pub fn add_aggregator(&mut self, aggregator: Aggregator) -> &mut Self {
        self.aggregators.push(aggregator);
        self
    }

    /// Set the grouper, replacing any previous one.
    pub fn add_grouper(&mut self, grouper: Grouper) -> &mut Self {
        self.grouper = Some(grouper);
        self
    }

    /// Limit the number of returned data points.
    pub fn set_limit(&mut self, limit: u64) -> Result<&mut Self> {
        if limit == 0 {
            return Err(Error::validation("limit must be greater than 0"));
        }
        self.limit = Some(limit);
        Ok(self)
    }

    pub fn set_order(&mut self, order: Order) -> &mut Self {
        self.order = Some(order);
        self
    }

    /// Ask the server to omit tag values from the results.
    pub fn set_exclude_tags(&mut self, exclude: bool) -> &mut Self {
        self.exclude_tags = exclude;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &BTreeMap<String, Vec<String>> {
        &self.tags
    }

    pub fn aggregators(&self) -> &[Aggregator] {
        &self.aggregators
    }

    pub fn grouper(&self) -> Option<&Grouper> {
        self.grouper.as_ref()
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn order(&self) -> Option<Order> {
        self.order
    }

    fn to_json(&self) -> Result<String> {
        let aggregators = self
            .aggregators
            .iter()
            .map(Aggregator::to_json)
            .collect::<Result<Vec<_>>>()?;
        let group_by = self
            .grouper
            .iter()
            .map(Grouper::to_json)
            .collect::<Result<Vec<_>>>()?;

        let mut obj = JsonObject::new();
        obj.field("name", &self.name)?
            .field("tags", &self.tags)?
            .raw_field("aggregators", &raw_array(aggregators))?
            .raw_field("group_by", &raw_array(group_by))?;
        if let Some(limit) = self.limit {
            obj.field("limit", &limit)?;
        }
        if let Some(order) = &self.order {
            obj.field("order", order)?;
        }
        if self.exclude_tags {
            obj.field("exclude_tags", &true)?;
        }
        Ok(obj.finish())
    }
}

/// Builds a data point query document.
///
/// # Example
///
/// ```
/// use kairos_client::{Aggregator, QueryBuilder, RelativeTime, TimeUnit};
///
/// let mut builder = QueryBuilder::new();
/// builder
///     .set_start_relative(RelativeTime::new(3, TimeUnit::Weeks)?)
///     .add_metric("metric1")?
///     .add_tag("foo", "bar")?
///     .add_aggregator(Aggregator::max(1, TimeUnit::Days)?);
///
/// let json = builder.build()?;
/// assert!(json.starts_with(r#"{"start_relative":{"value":3,"unit":"WEEKS"},"metrics":["#));
/// # Ok::<(), kairos_client::Error>(())
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryBuilder {
    range: TimeRange,
    cache_time: Option<i64>,
    time_zone: Option<String>,
    metrics: Vec<QueryMetric>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_start_absolute(&mut self, millis: i64) -> &mut Self {
        self.range.set_start_absolute(millis);
        self
    }

    pub fn set_start_relative(&mut self, time: RelativeTime) -> &mut Self {
        self.range.set_start_relative(time);
        self
    }

    pub fn set_end_absolute(&mut self, millis: i64) -> &mut Self {
        self.range.set_end_absolute(millis);
        self
    }

    pub fn set_end_relative(&mut self, time: RelativeTime) -> &mut Self {
        self.range.set_end_relative(time);
        self
    }

    /// How long (ms) the server may cache the query results.
    pub fn set_cache_time(&mut self, millis: i64) -> Result<&mut Self> {
        if millis <= 0 {
            return Err(Error::validation(format!(
                "cache time must be greater than 0, got {}",
                millis
            )));
        }
        self.cache_time = Some(millis);
        Ok(self)
    }

    /// Time zone used by the server for calendar-aware aggregation.
    /// The server assumes UTC when unset.
    pub fn set_time_zone(&mut self, time_zone: impl Into<String>) -> Result<&mut Self> {
        let time_zone = time_zone.into();
        if time_zone.is_empty() {
            return Err(Error::validation("time zone cannot be empty"));
        }
        self.time_zone = Some(time_zone);
        Ok(self)
    }

    /// Add a metric to read and return it for configuration.
    pub fn add_metric(&mut self, name: impl Into<String>) -> Result<&mut QueryMetric> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::validation("metric name cannot be empty"));
        }
        self.metrics.push(QueryMetric::new(name));
        let last = self.metrics.len() - 1;
        Ok(&mut self.metrics[last])
    }

    pub fn time_range(&self) -> &TimeRange {
        &self.range
    }

    pub fn cache_time(&self) -> Option<i64> {
        self.cache_time
    }

    pub fn time_zone(&self) -> Option<&str> {
        self.time_zone.as_deref()
    }

    pub fn metrics(&self) -> &[QueryMetric] {
        &self.metrics
    }

    /// Validate against the current time and serialize.
    pub fn build(&self) -> Result<String> {
        self.build_at(now_millis())
    }

    /// Validate with relative times resolved against `now_millis` and serialize.
    pub fn build_at(&self, now_millis: i64) -> Result<String> {
        self.validate_at(now_millis)?;
        self.to_json()
    }

    pub(crate) fn validate_at(&self, now_millis: i64) -> Result<()> {
        self.range.resolve(now_millis)?;
        if self.metrics.is_empty() {
            return Err(Error::validation("query must contain at least one metric"));
        }
        Ok(())
    }

    pub(crate) fn to_json(&self) -> Result<String> {
        let metrics = self
            .metrics
            .iter()
            .map(QueryMetric::to_json)
            .collect::<Result<Vec<_>>>()?;

        let mut obj = JsonObject::new();
        self.range.write_fields(&mut obj)?;
        if let Some(cache_time) = self.cache_time {
            obj.field("cache_time", &cache_time)?;
        }
        if let Some(time_zone) = &self.time_zone {
            obj.field("time_zone", time_zone)?;
        }
        obj.raw_field("metrics", &raw_array(metrics))?;
        Ok(obj.finish())
    }
}
