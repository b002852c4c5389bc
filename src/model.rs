//! Request and response shapes exchanged with a SimpleTSDB server.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Tag key/value pairs. Keys iterate in lexicographic order, which fixes the
/// byte layout of the line protocol.
pub type Tags = BTreeMap<String, String>;

/// Free-form options for windowing and aggregators, passed through to the server.
pub type Options = BTreeMap<String, serde_json::Value>;

/// The value of a single sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for PointValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointValue::Integer(v) => write!(f, "{}", v),
            PointValue::Float(v) => write!(f, "{}", v),
            PointValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for PointValue {
    fn from(v: i64) -> Self {
        PointValue::Integer(v)
    }
}

impl From<i32> for PointValue {
    fn from(v: i32) -> Self {
        PointValue::Integer(v.into())
    }
}

impl From<u32> for PointValue {
    fn from(v: u32) -> Self {
        PointValue::Integer(v.into())
    }
}

impl From<f64> for PointValue {
    fn from(v: f64) -> Self {
        PointValue::Float(v)
    }
}

impl From<String> for PointValue {
    fn from(v: String) -> Self {
        PointValue::Text(v)
    }
}

impl From<&str> for PointValue {
    fn from(v: &str) -> Self {
        PointValue::Text(v.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub value: PointValue,
    /// Nanoseconds since the Unix epoch.
    pub timestamp: i64,
    /// Set when the query applied a window, unless a windowed aggregator
    /// collapsed it away.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<i64>,
}

impl Point {
    pub fn new(value: impl Into<PointValue>, timestamp: i64) -> Self {
        Self {
            value: value.into(),
            timestamp,
            window: None,
        }
    }
}

/// A single point to insert. Never serialized as JSON; see [`crate::line_protocol`].
#[derive(Debug, Clone, PartialEq)]
pub struct InsertPointRequest {
    pub metric: String,
    pub tags: Tags,
    pub point: Point,
}

impl InsertPointRequest {
    pub fn new(metric: impl Into<String>, point: Point) -> Self {
        Self {
            metric: metric.into(),
            tags: Tags::new(),
            point,
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatorQuery {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Options>,
}

impl AggregatorQuery {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: None,
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options
            .get_or_insert_with(Options::new)
            .insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPointsRequest {
    pub metric: String,
    /// Start of the range, nanoseconds.
    pub start: i64,
    /// End of the range, nanoseconds. The server defaults to "now".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
    /// Max number of points to return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<Options>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregators: Option<Vec<AggregatorQuery>>,
}

impl QueryPointsRequest {
    pub fn new(metric: impl Into<String>, start: i64) -> Self {
        Self {
            metric: metric.into(),
            start,
            end: None,
            n: None,
            tags: None,
            window: None,
            aggregators: None,
        }
    }

    pub fn with_end(mut self, end: i64) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_limit(mut self, n: i64) -> Self {
        self.n = Some(n);
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags
            .get_or_insert_with(Tags::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_window(mut self, window: Options) -> Self {
        self.window = Some(window);
        self
    }

    pub fn with_aggregator(mut self, aggregator: AggregatorQuery) -> Self {
        self.aggregators.get_or_insert_with(Vec::new).push(aggregator);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletePointsRequest {
    pub metric: String,
    pub start: i64,
    pub end: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
}

impl DeletePointsRequest {
    pub fn new(metric: impl Into<String>, start: i64, end: i64) -> Self {
        Self {
            metric: metric.into(),
            start,
            end,
            tags: None,
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags
            .get_or_insert_with(Tags::new)
            .insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownsampleQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
    pub window: Options,
    #[serde(default)]
    pub aggregators: Vec<AggregatorQuery>,
}

impl DownsampleQuery {
    pub fn new(window: Options) -> Self {
        Self {
            tags: None,
            window,
            aggregators: Vec::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags
            .get_or_insert_with(Tags::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_aggregator(mut self, aggregator: AggregatorQuery) -> Self {
        self.aggregators.push(aggregator);
        self
    }
}

/// A server-side rule aggregating `metric` into `out_metric` every `run_every`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Downsampler {
    /// Assigned by the server; `None` until the downsampler has been created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub metric: String,
    pub out_metric: String,
    /// Duration string such as `"1m"` or `"1h"`.
    pub run_every: String,
    pub query: DownsampleQuery,
}

impl Downsampler {
    pub fn new(
        metric: impl Into<String>,
        out_metric: impl Into<String>,
        run_every: impl Into<String>,
        query: DownsampleQuery,
    ) -> Self {
        Self {
            id: None,
            metric: metric.into(),
            out_metric: out_metric.into(),
            run_every: run_every.into(),
            query,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteDownsamplerRequest {
    pub id: i64,
}

/// Body of a 400 response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    pub error: String,
}
