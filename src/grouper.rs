//! Groupers that partition a query metric's results.

use crate::error::{Error, Result};
use crate::json::JsonObject;
use crate::time::{RelativeTime, TimeUnit};

/// A partition strategy for query results.
#[derive(Clone, Debug, PartialEq)]
pub enum Grouper {
    /// Group by the values of one or more tags.
    Tag(Vec<String>),
    /// Group into `group_count` time buckets of `range_size` each.
    Time {
        range_size: RelativeTime,
        group_count: i64,
    },
    /// Group into value buckets of a fixed width.
    Value(i64),
    /// Group into buckets bounded by explicit bin edges.
    Bin(Vec<f64>),
    /// Caller-supplied name plus raw JSON fields, spliced in unvalidated.
    Custom { name: String, json: String },
}

impl Grouper {
    pub fn tag<I, S>(tags: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags: Vec<String> = tags.into_iter().map(Into::into).collect();
        if tags.is_empty() {
            return Err(Error::validation("tag grouper needs at least one tag name"));
        }
        if tags.iter().any(|t| t.is_empty()) {
            return Err(Error::validation("tag grouper names cannot be empty"));
        }
        Ok(Grouper::Tag(tags))
    }

    pub fn time(value: i64, unit: TimeUnit, group_count: i64) -> Result<Self> {
        if group_count <= 0 {
            return Err(Error::validation(format!(
                "time grouper count must be greater than 0, got {}",
                group_count
            )));
        }
        Ok(Grouper::Time {
            range_size: RelativeTime::new(value, unit)?,
            group_count,
        })
    }

    pub fn value(range_size: i64) -> Result<Self> {
        if range_size <= 0 {
            return Err(Error::validation(format!(
                "value grouper range size must be greater than 0, got {}",
                range_size
            )));
        }
        Ok(Grouper::Value(range_size))
    }

    pub fn bin(bins: Vec<f64>) -> Result<Self> {
        if bins.is_empty() {
            return Err(Error::validation("bin grouper needs at least one bin edge"));
        }
        if bins.iter().any(|b| !b.is_finite()) {
            return Err(Error::validation("bin edges must be finite"));
        }
        Ok(Grouper::Bin(bins))
    }

    /// A grouper unknown to this crate; see [`Aggregator::custom`](crate::Aggregator::custom)
    /// for the shape of `json`.
    pub fn custom(name: impl Into<String>, json: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let json = json.into();
        if name.is_empty() {
            return Err(Error::validation("custom grouper name cannot be empty"));
        }
        if json.is_empty() {
            return Err(Error::validation("custom grouper JSON cannot be empty"));
        }
        Ok(Grouper::Custom { name, json })
    }

    pub fn name(&self) -> &str {
        match self {
            Grouper::Tag(_) => "tag",
            Grouper::Time { .. } => "time",
            Grouper::Value(_) => "value",
            Grouper::Bin(_) => "bin",
            Grouper::Custom { name, .. } => name,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        let mut obj = JsonObject::new();
        match self {
            Grouper::Tag(tags) => {
                obj.field("name", "tag")?.field("tags", tags)?;
            }
            Grouper::Time {
                range_size,
                group_count,
            } => {
                obj.field("name", "time")?
                    .field("range_size", range_size)?
                    .field("group_count", group_count)?;
            }
            Grouper::Value(range_size) => {
                obj.field("name", "value")?.field("range_size", range_size)?;
            }
            Grouper::Bin(bins) => {
                obj.field("name", "bin")?.field("bins", bins)?;
            }
            Grouper::Custom { name, json } => {
                return Ok(format!("{{\"name\":{},{}}}", serde_json::to_string(name)?, json));
            }
        }
        Ok(obj.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_grouper() {
        let g = Grouper::tag(["host", "dc"]).unwrap();
        assert_eq!(g.to_json().unwrap(), r#"{"name":"tag","tags":["host","dc"]}"#);
        assert!(Grouper::tag(Vec::<String>::new()).is_err());
        assert!(Grouper::tag([""]).is_err());
    }

    #[test]
    fn test_time_grouper() {
        let g = Grouper::time(1, TimeUnit::Hours, 24).unwrap();
        assert_eq!(
            g.to_json().unwrap(),
            r#"{"name":"time","range_size":{"value":1,"unit":"HOURS"},"group_count":24}"#
        );
        assert!(Grouper::time(1, TimeUnit::Hours, 0).is_err());
        assert!(Grouper::time(0, TimeUnit::Hours, 3).is_err());
    }

    #[test]
    fn test_value_grouper() {
        assert_eq!(
            Grouper::value(100).unwrap().to_json().unwrap(),
            r#"{"name":"value","range_size":100}"#
        );
        assert!(Grouper::value(0).is_err());
    }

    #[test]
    fn test_bin_grouper() {
        assert_eq!(
            Grouper::bin(vec![0.0, 10.5]).unwrap().to_json().unwrap(),
            r#"{"name":"bin","bins":[0.0,10.5]}"#
        );
        assert!(Grouper::bin(vec![]).is_err());
        assert!(Grouper::bin(vec![f64::NAN]).is_err());
    }

    #[test]
    fn test_custom_grouper() {
        let g = Grouper::custom("geo", r#""precision":5"#).unwrap();
        assert_eq!(g.name(), "geo");
        assert_eq!(g.to_json().unwrap(), r#"{"name":"geo","precision":5}"#);
        assert!(Grouper::custom("geo", "").is_err());
        assert!(Grouper::custom("", "x").is_err());
    }
}
