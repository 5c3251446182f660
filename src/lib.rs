//! # kairos-client
//!
//! Async client for the KairosDB time-series database.
//!
//! ## What's in it
//!
//! - **Builders** for write batches, data point queries, tag queries and
//!   rollup tasks. Invariants are checked when the document is built, before
//!   anything is sent.
//! - **Typed decoding** of query responses: group-by descriptors become a
//!   [`GroupResult`] enum and data point values are decoded through an
//!   extensible [`DataPointTypeRegistry`].
//! - **Response envelopes** carrying the status code and the server's error
//!   messages. Server-side validation failures are never an `Err`.
//! - **Line protocol** writer over TCP for high-volume pushes.
//!
//! ## Quick Start
//!
//! ```ignore
//! use kairos_client::{Aggregator, Client, MetricBuilder, QueryBuilder, RelativeTime, TimeUnit};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new("http://localhost:8080")?;
//!
//!     let mut batch = MetricBuilder::new();
//!     batch
//!         .add_metric("cpu.load")?
//!         .add_tag("host", "server1")?
//!         .add_data_point(1_700_000_000_000, 0.75)?;
//!     let pushed = client.push_metrics(&batch).await?;
//!     assert!(pushed.is_success(), "{:?}", pushed.errors);
//!
//!     let mut query = QueryBuilder::new();
//!     query.set_start_relative(RelativeTime::new(1, TimeUnit::Days)?);
//!     query
//!         .add_metric("cpu.load")?
//!         .add_aggregator(Aggregator::max(1, TimeUnit::Hours)?);
//!
//!     let response = client.query(&query).await?;
//!     for result in response.queries.iter().flat_map(|q| &q.results) {
//!         for point in &result.data_points {
//!             println!("{} {}", point.timestamp(), point.value());
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Numeric values
//!
//! Response values are classified lexically: `30` decodes as an integer and
//! `30.0` as a double, even though they are numerically equal.

pub mod aggregator;
pub mod client;
pub mod error;
pub mod grouper;
mod json;
pub mod metric;
pub mod parser;
pub mod query;
pub mod registry;
pub mod response;
pub mod rollup;
pub mod tag_query;
pub mod telnet;
pub mod time;
pub mod transport;
pub mod types;
pub mod value;

// Re-export main types at crate root
pub use aggregator::{Aggregator, Alignment, DevReturnType, Sampling, TrimMode};
pub use client::Client;
pub use error::{Error, Result};
pub use grouper::Grouper;
pub use metric::{Metric, MetricBuilder};
pub use query::{Order, QueryBuilder, QueryMetric};
pub use registry::{DataPointType, DataPointTypeRegistry, JsonType, NumberType, TextType};
pub use response::{
    GetResponse, QueryResponse, QueryTagResponse, Response, RollupResponse, RollupTaskResponse,
};
pub use rollup::{Rollup, RollupBuilder, RollupDefinition, RollupTask};
pub use tag_query::{QueryTagBuilder, QueryTagMetric};
pub use telnet::TelnetClient;
pub use time::{RelativeTime, TimeRange, TimeUnit};
pub use transport::{HttpTransport, RawResponse, Transport};
pub use types::{
    BinGroup, CustomGroup, GroupResult, Query, QueryResult, TagGroup, TagQuery, TagResult,
    TimeGroup, TypeGroup, ValueGroup,
};
pub use value::{DataPoint, DataPointValue};

// Re-export parser for advanced use cases
pub use parser::ResponseParser;
