//! Response envelopes.
//!
//! Every call returns the HTTP status code and the error messages reported by
//! the server alongside its typed payload. Server-side failures never surface
//! as an `Err`: check [`is_success`](Response::is_success) instead.

use crate::rollup::RollupTask;
use crate::types::{GroupResult, Query, QueryResult, TagQuery};

fn is_success(status_code: u16, errors: &[String]) -> bool {
    (200..300).contains(&status_code) && errors.is_empty()
}

/// Status code and errors of a call without a payload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Response {
    pub status_code: u16,
    pub errors: Vec<String>,
}

impl Response {
    pub fn new(status_code: u16, errors: Vec<String>) -> Self {
        Self { status_code, errors }
    }

    pub fn is_success(&self) -> bool {
        is_success(self.status_code, &self.errors)
    }
}

/// A list of strings: metric names, tag names, tag values or health checks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GetResponse {
    pub status_code: u16,
    pub errors: Vec<String>,
    pub results: Vec<String>,
}

impl GetResponse {
    pub fn is_success(&self) -> bool {
        is_success(self.status_code, &self.errors)
    }
}

/// Decoded data point query.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryResponse {
    pub status_code: u16,
    pub errors: Vec<String>,
    /// One entry per query metric, in request order.
    pub queries: Vec<Query>,
}

impl QueryResponse {
    pub fn is_success(&self) -> bool {
        is_success(self.status_code, &self.errors)
    }

    /// First result, across all queries, whose group-by list contains `group`.
    pub fn first_result_by_group(&self, group: &GroupResult) -> Option<&QueryResult> {
        self.queries
            .iter()
            .find_map(|q| q.first_result_by_group(group))
    }
}

/// Decoded tag query.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryTagResponse {
    pub status_code: u16,
    pub errors: Vec<String>,
    pub queries: Vec<TagQuery>,
}

impl QueryTagResponse {
    pub fn is_success(&self) -> bool {
        is_success(self.status_code, &self.errors)
    }
}

/// Result of creating or updating a rollup task.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RollupResponse {
    pub status_code: u16,
    pub errors: Vec<String>,
    pub id: Option<String>,
    pub name: Option<String>,
    /// Resource path of the task on the server.
    pub url: Option<String>,
}

impl RollupResponse {
    pub fn is_success(&self) -> bool {
        is_success(self.status_code, &self.errors)
    }
}

/// Rollup tasks read from the server.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RollupTaskResponse {
    pub status_code: u16,
    pub errors: Vec<String>,
    pub tasks: Vec<RollupTask>,
}

impl RollupTaskResponse {
    pub fn is_success(&self) -> bool {
        is_success(self.status_code, &self.errors)
    }
}
