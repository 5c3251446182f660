//! Tag-only query builder.
//!
//! Tag queries return the tag names and values of matching series without
//! their data points, so metrics carry only filters.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::json::{JsonObject, raw_array};
use crate::query::add_tag_value;
use crate::time::{RelativeTime, TimeRange, now_millis};

/// A metric in a tag query.
///
/// Values within one tag are alternatives; different tags must all match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryTagMetric {
    name: String,
    tags: BTreeMap<String, Vec<String>>,
}

impl QueryTagMetric {
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

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &BTreeMap<String, Vec<String>> {
        &self.tags
    }

    fn to_json(&self) -> Result<String> {
        let mut obj = JsonObject::new();
        obj.field("name", &self.name)?.field("tags", &self.tags)?;
        Ok(obj.finish())
    }
}

/// Builds a tag query document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryTagBuilder {
    range: TimeRange,
    metrics: Vec<QueryTagMetric>,
}

impl QueryTagBuilder {
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

    pub fn add_metric(&mut self, name: impl Into<String>) -> Result<&mut QueryTagMetric> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::validation("metric name cannot be empty"));
        }
        self.metrics.push(QueryTagMetric {
            name,
            tags: BTreeMap::new(),
        });
        let last = self.metrics.len() - 1;
        Ok(&mut self.metrics[last])
    }

    pub fn time_range(&self) -> &TimeRange {
        &self.range
    }

    pub fn metrics(&self) -> &[QueryTagMetric] {
        &self.metrics
    }

    pub fn build(&self) -> Result<String> {
        self.build_at(now_millis())
    }

    pub fn build_at(&self, now_millis: i64) -> Result<String> {
        self.range.resolve(now_millis)?;
        if self.metrics.is_empty() {
            return Err(Error::validation("tag query must contain at least one metric"));
        }

        let metrics = self
            .metrics
            .iter()
            .map(QueryTagMetric::to_json)
            .collect::<Result<Vec<_>>>()?;

        let mut obj = JsonObject::new();
        self.range.write_fields(&mut obj)?;
        obj.raw_field("metrics", &raw_array(metrics))?;
        Ok(obj.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::TimeUnit;

    const NOW: i64 = 1_700_000_000_000;

    #[test]
    fn test_tag_query_document() {
        let mut builder = QueryTagBuilder::new();
        builder
            .set_start_absolute(1000)
            .set_end_relative(RelativeTime::new(1, TimeUnit::Hours).unwrap());
        builder
            .add_metric("cpu")
            .unwrap()
            .add_tags("host", ["a", "b"])
            .unwrap()
            .add_tag("dc", "east")
            .unwrap();

        assert_eq!(
            builder.build_at(NOW).unwrap(),
            r#"{"start_absolute":1000,"end_relative":{"value":1,"unit":"HOURS"},"metrics":[{"name":"cpu","tags":{"dc":["east"],"host":["a","b"]}}]}"#
        );
    }

    #[test]
    fn test_tag_query_validates_range() {
        let mut builder = QueryTagBuilder::new();
        builder.add_metric("cpu").unwrap();
        assert!(matches!(builder.build_at(NOW), Err(Error::InvalidRange(_))));

        builder.set_start_absolute(NOW).set_end_absolute(NOW - 5);
        assert!(matches!(builder.build_at(NOW), Err(Error::InvalidRange(_))));
    }

    #[test]
    fn test_tag_query_requires_metric() {
        let mut builder = QueryTagBuilder::new();
        builder.set_start_absolute(1);
        assert!(matches!(builder.build_at(NOW), Err(Error::Validation(_))));
        assert!(builder.add_metric("").is_err());
    }
}
