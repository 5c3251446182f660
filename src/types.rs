//! Decoded query results.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::time::RelativeTime;
use crate::value::DataPoint;

/// Value type of the data points in a result series.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TypeGroup {
    #[serde(rename = "type")]
    pub type_name: String,
}

/// Tag group: the tag names grouped on and the values this series matched.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TagGroup {
    pub tags: Vec<String>,
    #[serde(default)]
    pub group: BTreeMap<String, String>,
}

/// Index of a time or value bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct GroupNumber {
    pub group_number: i64,
}

/// Index of a bin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct BinNumber {
    pub bin_number: i64,
}

/// Time bucket group.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TimeGroup {
    pub range_size: RelativeTime,
    pub group_count: i64,
    pub group: GroupNumber,
}

/// Value bucket group.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ValueGroup {
    pub range_size: i64,
    pub group: GroupNumber,
}

/// Bin group.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct BinGroup {
    pub bins: Vec<f64>,
    pub group: BinNumber,
}

/// Group produced by a grouper this crate does not model. `fields` holds the
/// whole JSON object, `name` included.
#[derive(Clone, Debug, PartialEq)]
pub struct CustomGroup {
    pub name: String,
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// Which partition a result series belongs to, discriminated on the wire by
/// its `name` field.
#[derive(Clone, Debug, PartialEq)]
pub enum GroupResult {
    Type(TypeGroup),
    Tag(TagGroup),
    Time(TimeGroup),
    Value(ValueGroup),
    Bin(BinGroup),
    Custom(CustomGroup),
}

impl GroupResult {
    /// Wire discriminator of the group.
    pub fn name(&self) -> &str {
        match self {
            GroupResult::Type(_) => "type",
            GroupResult::Tag(_) => "tag",
            GroupResult::Time(_) => "time",
            GroupResult::Value(_) => "value",
            GroupResult::Bin(_) => "bin",
            GroupResult::Custom(c) => &c.name,
        }
    }

    pub fn type_group(type_name: impl Into<String>) -> Self {
        GroupResult::Type(TypeGroup {
            type_name: type_name.into(),
        })
    }
}

/// One decoded series.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryResult {
    pub name: String,
    pub tags: BTreeMap<String, Vec<String>>,
    pub group_by: Vec<GroupResult>,
    pub data_points: Vec<DataPoint>,
}

impl QueryResult {
    /// Value type reported for this series, if any.
    pub fn value_type(&self) -> Option<&str> {
        self.group_by.iter().find_map(|g| match g {
            GroupResult::Type(t) => Some(t.type_name.as_str()),
            _ => None,
        })
    }

    pub fn has_group(&self, group: &GroupResult) -> bool {
        self.group_by.contains(group)
    }

    pub fn tag_values(&self, tag: &str) -> &[String] {
        self.tags.get(tag).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Results of one query metric.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    /// Number of data points read before aggregation.
    pub sample_size: i64,
    pub results: Vec<QueryResult>,
}

impl Query {
    /// First result whose group-by list contains `group`.
    pub fn first_result_by_group(&self, group: &GroupResult) -> Option<&QueryResult> {
        self.results.iter().find(|r| r.has_group(group))
    }
}

/// Tags of one series from a tag query.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct TagResult {
    pub name: String,
    #[serde(default)]
    pub tags: BTreeMap<String, Vec<String>>,
}

/// Results of one tag query metric.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct TagQuery {
    #[serde(default)]
    pub results: Vec<TagResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, group_by: Vec<GroupResult>) -> QueryResult {
        QueryResult {
            name: name.to_string(),
            tags: BTreeMap::new(),
            group_by,
            data_points: Vec::new(),
        }
    }

    fn tag_group(host: &str) -> GroupResult {
        GroupResult::Tag(TagGroup {
            tags: vec!["host".to_string()],
            group: BTreeMap::from([("host".to_string(), host.to_string())]),
        })
    }

    #[test]
    fn test_first_result_by_group() {
        let query = Query {
            sample_size: 10,
            results: vec![
                result("a", vec![GroupResult::type_group("number"), tag_group("s1")]),
                result("b", vec![GroupResult::type_group("number"), tag_group("s2")]),
                result("c", vec![tag_group("s2")]),
            ],
        };

        assert_eq!(query.first_result_by_group(&tag_group("s2")).unwrap().name, "b");
        assert_eq!(
            query
                .first_result_by_group(&GroupResult::type_group("number"))
                .unwrap()
                .name,
            "a"
        );
        assert!(query.first_result_by_group(&tag_group("s3")).is_none());
        assert!(query.first_result_by_group(&GroupResult::type_group("text")).is_none());
    }

    #[test]
    fn test_value_type() {
        let r = result("a", vec![tag_group("x"), GroupResult::type_group("text")]);
        assert_eq!(r.value_type(), Some("text"));
        assert_eq!(result("b", vec![]).value_type(), None);
    }

    #[test]
    fn test_group_names() {
        assert_eq!(GroupResult::type_group("number").name(), "type");
        assert_eq!(tag_group("x").name(), "tag");
        let custom = GroupResult::Custom(CustomGroup {
            name: "geo".to_string(),
            fields: serde_json::Map::new(),
        });
        assert_eq!(custom.name(), "geo");
    }

    #[test]
    fn test_tag_values() {
        let mut r = result("a", vec![]);
        r.tags.insert("host".to_string(), vec!["s1".to_string()]);
        assert_eq!(r.tag_values("host"), ["s1".to_string()]);
        assert!(r.tag_values("dc").is_empty());
    }
}
