//! Rollup tasks: scheduled queries whose output is saved as a new metric.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::json::{JsonObject, raw_array};
use crate::query::QueryBuilder;
use crate::time::{RelativeTime, now_millis};

/// One rollup of a task: a query plus the metric its result is saved as.
#[derive(Clone, Debug, PartialEq)]
pub struct Rollup {
    save_as: String,
    query: Option<QueryBuilder>,
}

impl Rollup {
    pub fn save_as(&self) -> &str {
        &self.save_as
    }

    /// Attach a fresh query to this rollup and return it for configuration.
    /// Replaces any previously attached query.
    pub fn add_query(&mut self) -> &mut QueryBuilder {
        self.query.insert(QueryBuilder::new())
    }

    pub fn set_query(&mut self, query: QueryBuilder) -> &mut Self {
        self.query = Some(query);
        self
    }

    pub fn query(&self) -> Option<&QueryBuilder> {
        self.query.as_ref()
    }
}

/// Builds a rollup task document.
///
/// # Example
///
/// ```
/// use kairos_client::{Aggregator, RelativeTime, RollupBuilder, TimeUnit};
///
/// let mut builder = RollupBuilder::new("hourly", RelativeTime::new(1, TimeUnit::Hours)?)?;
/// let query = builder.add_rollup("cpu.hourly")?.add_query();
/// query
///     .set_start_relative(RelativeTime::new(1, TimeUnit::Hours)?)
///     .add_metric("cpu")?
///     .add_aggregator(Aggregator::avg(1, TimeUnit::Hours)?);
///
/// let json = builder.build()?;
/// assert!(json.starts_with(r#"{"name":"hourly","execution_interval":{"value":1,"unit":"HOURS"}"#));
/// # Ok::<(), kairos_client::Error>(())
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct RollupBuilder {
    name: String,
    execution_interval: RelativeTime,
    rollups: Vec<Rollup>,
}

impl RollupBuilder {
    pub fn new(name: impl Into<String>, execution_interval: RelativeTime) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::validation("rollup task name cannot be empty"));
        }
        Ok(Self {
            name,
            execution_interval,
            rollups: Vec::new(),
        })
    }

    pub fn add_rollup(&mut self, save_as: impl Into<String>) -> Result<&mut Rollup> {
        let save_as = save_as.into();
        if save_as.is_empty() {
            return Err(Error::validation("rollup save_as metric name cannot be empty"));
        }
        self.rollups.push(Rollup { save_as, query: None });
        let last = self.rollups.len() - 1;
        Ok(&mut self.rollups[last])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn execution_interval(&self) -> RelativeTime {
        self.execution_interval
    }

    pub fn rollups(&self) -> &[Rollup] {
        &self.rollups
    }

    pub fn build(&self) -> Result<String> {
        self.build_at(now_millis())
    }

    /// Validate every rollup's query against `now_millis` and serialize.
    pub fn build_at(&self, now_millis: i64) -> Result<String> {
        if self.rollups.is_empty() {
            return Err(Error::validation(format!(
                "rollup task '{}' must contain at least one rollup",
                self.name
            )));
        }

        let mut rollups = Vec::with_capacity(self.rollups.len());
        for rollup in &self.rollups {
            let query = rollup.query.as_ref().ok_or_else(|| {
                Error::MissingQuery(format!("rollup '{}' has no query", rollup.save_as))
            })?;
            query.validate_at(now_millis)?;

            let mut obj = JsonObject::new();
            obj.field("save_as", &rollup.save_as)?
                .raw_field("query", &query.to_json()?)?;
            rollups.push(obj.finish());
        }

        let mut obj = JsonObject::new();
        obj.field("name", &self.name)?
            .field("execution_interval", &self.execution_interval)?
            .raw_field("rollups", &raw_array(rollups))?;
        Ok(obj.finish())
    }
}

/// A rollup as returned by the server. The query is kept as its JSON document.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RollupDefinition {
    pub save_as: String,
    pub query: serde_json::Value,
}

/// A rollup task as stored on the server.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RollupTask {
    pub id: String,
    pub name: String,
    pub execution_interval: RelativeTime,
    #[serde(default, alias = "lastModified")]
    pub last_modified: i64,
    #[serde(default)]
    pub rollups: Vec<RollupDefinition>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::Aggregator;
    use crate::time::TimeUnit;
    use pretty_assertions::assert_eq;

    const NOW: i64 = 1_700_000_000_000;

    fn hour() -> RelativeTime {
        RelativeTime::new(1, TimeUnit::Hours).unwrap()
    }

    #[test]
    fn test_rollup_document() {
        let mut builder = RollupBuilder::new("task", hour()).unwrap();
        builder
            .add_rollup("cpu.rollup")
            .unwrap()
            .add_query()
            .set_start_absolute(1)
            .add_metric("cpu")
            .unwrap()
            .add_aggregator(Aggregator::sum(1, TimeUnit::Hours).unwrap());

        assert_eq!(
            builder.build_at(NOW).unwrap(),
            concat!(
                r#"{"name":"task","execution_interval":{"value":1,"unit":"HOURS"},"rollups":[{"save_as":"cpu.rollup","query":"#,
                r#"{"start_absolute":1,"metrics":[{"name":"cpu","tags":{},"aggregators":[{"name":"sum","sampling":{"value":1,"unit":"HOURS"},"align_sampling":false,"align_start_time":false,"align_end_time":false}],"group_by":[]}]}}]}"#
            )
        );
    }

    #[test]
    fn test_requires_rollups() {
        let builder = RollupBuilder::new("task", hour()).unwrap();
        assert!(matches!(builder.build_at(NOW), Err(Error::Validation(_))));
    }

    #[test]
    fn test_requires_query() {
        let mut builder = RollupBuilder::new("task", hour()).unwrap();
        builder.add_rollup("out").unwrap();
        assert!(matches!(builder.build_at(NOW), Err(Error::MissingQuery(_))));
    }

    #[test]
    fn test_query_range_is_validated() {
        let mut builder = RollupBuilder::new("task", hour()).unwrap();
        builder.add_rollup("out").unwrap().add_query().add_metric("m").unwrap();
        assert!(matches!(builder.build_at(NOW), Err(Error::InvalidRange(_))));
    }

    #[test]
    fn test_invalid_names() {
        assert!(RollupBuilder::new("", hour()).is_err());
        let mut builder = RollupBuilder::new("task", hour()).unwrap();
        assert!(builder.add_rollup("").is_err());
    }

    #[test]
    fn test_set_query() {
        let mut query = QueryBuilder::new();
        query.set_start_absolute(5).add_metric("m").unwrap();

        let mut builder = RollupBuilder::new("task", hour()).unwrap();
        builder.add_rollup("out").unwrap().set_query(query.clone());
        assert_eq!(builder.rollups()[0].query(), Some(&query));
        assert!(builder.build_at(NOW).is_ok());
    }

    #[test]
    fn test_decode_task() {
        let json = r#"{
            "id": "abc",
            "name": "task",
            "execution_interval": {"value": 1, "unit": "hours"},
            "lastModified": 1234,
            "rollups": [{"save_as": "out", "query": {"start_relative": {"value": 1, "unit": "hours"}}}]
        }"#;
        let task: RollupTask = serde_json::from_str(json).unwrap();
        assert_eq!(task.id, "abc");
        assert_eq!(task.execution_interval, hour());
        assert_eq!(task.last_modified, 1234);
        assert_eq!(task.rollups[0].save_as, "out");
    }

    #[test]
    fn test_decode_task_rejects_zero_interval() {
        let json = serde_json::json!({
            "id": "abc",
            "name": "task",
            "execution_interval": {"value": 0, "unit": "hours"}
        });
        assert!(serde_json::from_value::<RollupTask>(json).is_err());
    }
}
