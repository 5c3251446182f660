//! Response parser.
//!
//! Turns a status code and a fully-read body into the typed response
//! envelopes. Bodies of error statuses are decoded as `{"errors": [...]}` and
//! never as payload.
//!
//! Query results are decoded in three steps per series:
//!
//! 1. every `group_by` entry is dispatched on its `name` into a
//!    [`GroupResult`] variant; unknown names fail the whole decode,
//! 2. the `type` group selects a [`DataPointType`] from the registry
//!    (`number` when the series carries no `type` group),
//! 3. each `[timestamp, literal]` pair is decoded through that type, except
//!    `null` literals, which become [`DataPointValue::Null`] for every type.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{trace, warn};

use crate::error::{Error, Result};
use crate::registry::{DataPointType, DataPointTypeRegistry};
use crate::response::{
    GetResponse, QueryResponse, QueryTagResponse, Response, RollupResponse, RollupTaskResponse,
};
use crate::rollup::RollupTask;
use crate::types::{
    BinGroup, CustomGroup, GroupResult, Query, QueryResult, TagGroup, TagQuery, TimeGroup,
    TypeGroup, ValueGroup,
};
use crate::value::{DataPoint, DataPointValue};

/// Name accepted as a custom group-by without prior registration.
pub const CUSTOM_GROUP_BY: &str = "custom";

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    errors: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ResultsEnvelope {
    #[serde(default)]
    results: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct VersionEnvelope {
    version: String,
}

#[derive(Debug, Deserialize)]
struct RawQueries {
    #[serde(default)]
    queries: Vec<RawQuery>,
}

#[derive(Debug, Deserialize)]
struct RawQuery {
    #[serde(default)]
    sample_size: i64,
    #[serde(default)]
    results: Vec<RawResult>,
}

#[derive(Debug, Deserialize)]
struct RawResult {
    name: String,
    #[serde(default)]
    tags: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    group_by: Vec<Value>,
    #[serde(default)]
    values: Vec<(i64, Value)>,
}

#[derive(Debug, Deserialize)]
struct RawTagQueries {
    #[serde(default)]
    queries: Vec<TagQuery>,
}

#[derive(Debug, Default, Deserialize)]
struct RollupAttributes {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRollupCreated {
    id: Option<String>,
    name: Option<String>,
    #[serde(default)]
    attributes: RollupAttributes,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RollupTasks {
    Many(Vec<RollupTask>),
    One(RollupTask),
}

/// Whether `status` carries an error envelope instead of a payload.
pub fn is_error_status(status: u16) -> bool {
    status >= 400
}

fn is_empty_body(body: &[u8]) -> bool {
    body.iter().all(u8::is_ascii_whitespace)
}

fn decode<T: DeserializeOwned>(body: &[u8], what: &str) -> Result<T> {
    serde_json::from_slice(body)
        .map_err(|e| Error::parse(format!("invalid {} document: {}", what, e)))
}

/// Decodes response bodies into typed envelopes.
///
/// Holds the data point type registry used to decode values and the custom
/// group-by names accepted besides the built-in ones. Both are read-only once
/// the parser is shared.
#[derive(Clone, Debug)]
pub struct ResponseParser {
    registry: Arc<DataPointTypeRegistry>,
    custom_group_bys: HashSet<String>,
}

impl ResponseParser {
    pub fn new(registry: Arc<DataPointTypeRegistry>) -> Self {
        Self {
            registry,
            custom_group_bys: HashSet::new(),
        }
    }

    pub fn registry(&self) -> &Arc<DataPointTypeRegistry> {
        &self.registry
    }

    pub fn custom_group_bys(&self) -> &HashSet<String> {
        &self.custom_group_bys
    }

    /// Accept group-by entries named `name` as [`GroupResult::Custom`].
    pub fn register_custom_group_by(&mut self, name: impl Into<String>) {
        self.custom_group_bys.insert(name.into());
    }

    /// Error messages of an error-status body.
    ///
    /// A body that is not an error envelope is reported as a single message:
    /// the body text, or the status reason when the body is empty.
    pub fn parse_errors(&self, status: u16, body: &[u8]) -> Vec<String> {
        if is_empty_body(body) {
            let reason = reqwest::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("Unknown status");
            return vec![format!("{} {}", status, reason)];
        }
        match serde_json::from_slice::<ErrorEnvelope>(body) {
            Ok(envelope) => envelope.errors,
            Err(e) => {
                warn!(status, error = %e, "error response is not an error envelope");
                vec![String::from_utf8_lossy(body).trim().to_string()]
            }
        }
    }

    /// Status and errors of a call whose success carries no payload.
    pub fn parse_response(&self, status: u16, body: &[u8]) -> Response {
        let errors = if is_error_status(status) {
            self.parse_errors(status, body)
        } else {
            Vec::new()
        };
        Response::new(status, errors)
    }

    /// `{"results": [...]}` bodies: metric names, tag names and tag values.
    pub fn parse_get_response(&self, status: u16, body: &[u8]) -> Result<GetResponse> {
        let response = self.parse_response(status, body);
        let results = if is_error_status(status) || is_empty_body(body) {
            Vec::new()
        } else {
            decode::<ResultsEnvelope>(body, "results")?.results
        };
        Ok(GetResponse {
            status_code: response.status_code,
            errors: response.errors,
            results,
        })
    }

    /// Health status bodies: a bare JSON array of strings.
    pub fn parse_health_status(&self, status: u16, body: &[u8]) -> Result<GetResponse> {
        let response = self.parse_response(status, body);
        let results = if is_error_status(status) || is_empty_body(body) {
            Vec::new()
        } else {
            decode::<Vec<String>>(body, "health status")?
        };
        Ok(GetResponse {
            status_code: response.status_code,
            errors: response.errors,
            results,
        })
    }

    /// `{"version": "..."}` bodies, returned as a single result.
    pub fn parse_version(&self, status: u16, body: &[u8]) -> Result<GetResponse> {
        let response = self.parse_response(status, body);
        let results = if is_error_status(status) || is_empty_body(body) {
            Vec::new()
        } else {
            vec![decode::<VersionEnvelope>(body, "version")?.version]
        };
        Ok(GetResponse {
            status_code: response.status_code,
            errors: response.errors,
            results,
        })
    }

    pub fn parse_query_response(&self, status: u16, body: &[u8]) -> Result<QueryResponse> {
        let response = self.parse_response(status, body);
        let queries = if is_error_status(status) || is_empty_body(body) {
            Vec::new()
        } else {
            self.decode_queries(body)?
        };
        trace!(status, queries = queries.len(), "decoded query response");
        Ok(QueryResponse {
            status_code: response.status_code,
            errors: response.errors,
            queries,
        })
    }

    pub fn parse_tag_response(&self, status: u16, body: &[u8]) -> Result<QueryTagResponse> {
        let response = self.parse_response(status, body);
        let queries = if is_error_status(status) || is_empty_body(body) {
            Vec::new()
        } else {
            decode::<RawTagQueries>(body, "tag query")?.queries
        };
        Ok(QueryTagResponse {
            status_code: response.status_code,
            errors: response.errors,
            queries,
        })
    }

    pub fn parse_rollup_response(&self, status: u16, body: &[u8]) -> Result<RollupResponse> {
        let response = self.parse_response(status, body);
        let mut out = RollupResponse {
            status_code: response.status_code,
            errors: response.errors,
            ..Default::default()
        };
        if !is_error_status(status) && !is_empty_body(body) {
            let created = decode::<RawRollupCreated>(body, "rollup")?;
            out.id = created.id;
            out.name = created.name;
            out.url = created.attributes.url;
        }
        Ok(out)
    }

    /// A single task object or an array of tasks.
    pub fn parse_rollup_tasks(&self, status: u16, body: &[u8]) -> Result<RollupTaskResponse> {
        let response = self.parse_response(status, body);
        let tasks = if is_error_status(status) || is_empty_body(body) {
            Vec::new()
        } else {
            match decode::<RollupTasks>(body, "rollup task")? {
                RollupTasks::Many(tasks) => tasks,
                RollupTasks::One(task) => vec![task],
            }
        };
        Ok(RollupTaskResponse {
            status_code: response.status_code,
            errors: response.errors,
            tasks,
        })
    }

    /// Decode the payload of a successful query response.
    pub fn decode_queries(&self, body: &[u8]) -> Result<Vec<Query>> {
        let raw: RawQueries = decode(body, "query")?;
        raw.queries
            .into_iter()
            .map(|q| {
                let results = q
                    .results
                    .into_iter()
                    .map(|r| self.decode_result(r))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Query {
                    sample_size: q.sample_size,
                    results,
                })
            })
            .collect()
    }

    fn decode_result(&self, raw: RawResult) -> Result<QueryResult> {
        let group_by = raw
            .group_by
            .iter()
            .map(|g| self.decode_group_by(g))
            .collect::<Result<Vec<_>>>()?;

        let mut type_names = group_by.iter().filter_map(|g| match g {
            GroupResult::Type(t) => Some(t.type_name.as_str()),
            _ => None,
        });
        let type_name = type_names.next();
        if type_names.next().is_some() {
            return Err(Error::parse(format!(
                "result '{}' carries more than one type group",
                raw.name
            )));
        }

        let data_type: &dyn DataPointType = match type_name {
            Some(name) => self.registry.lookup(name),
            None => self.registry.number(),
        };
        trace!(
            metric = %raw.name,
            value_type = type_name.unwrap_or("number"),
            groups = group_by.len(),
            points = raw.values.len(),
            "decoding result"
        );

        let data_points = raw
            .values
            .iter()
            .map(|(timestamp, literal)| {
                let value = match literal {
                    Value::Null => DataPointValue::Null,
                    literal => data_type.decode(literal)?,
                };
                Ok(DataPoint::new(*timestamp, value))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(QueryResult {
            name: raw.name,
            tags: raw.tags,
            group_by,
            data_points,
        })
    }

    /// Dispatch one group-by object on its `name`.
    pub fn decode_group_by(&self, entry: &Value) -> Result<GroupResult> {
        let object = entry.as_object().ok_or_else(|| {
            Error::UnsupportedGroupBy(format!("group-by entry is not an object: {}", entry))
        })?;
        let name = object.get("name").and_then(Value::as_str).ok_or_else(|| {
            Error::UnsupportedGroupBy(format!("group-by entry has no name: {}", entry))
        })?;

        let group = match name {
            "type" => GroupResult::Type(group_fields::<TypeGroup>(name, entry)?),
            "tag" => GroupResult::Tag(group_fields::<TagGroup>(name, entry)?),
            "time" => GroupResult::Time(group_fields::<TimeGroup>(name, entry)?),
            "value" => GroupResult::Value(group_fields::<ValueGroup>(name, entry)?),
            "bin" => GroupResult::Bin(group_fields::<BinGroup>(name, entry)?),
            custom if custom == CUSTOM_GROUP_BY || self.custom_group_bys.contains(custom) => {
                GroupResult::Custom(CustomGroup {
                    name: custom.to_string(),
                    fields: object.clone(),
                })
            }
            unknown => return Err(Error::UnsupportedGroupBy(unknown.to_string())),
        };
        Ok(group)
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new(Arc::new(DataPointTypeRegistry::new()))
    }
}

fn group_fields<T: DeserializeOwned>(name: &str, entry: &Value) -> Result<T> {
    T::deserialize(entry).map_err(|e| Error::parse(format!("invalid '{}' group-by: {}", name, e)))
}
