//! Aggregators applied server-side to a query metric.
//!
//! Aggregators form a pipeline: the output of one feeds the next, in the order
//! they were added to the [`QueryMetric`](crate::QueryMetric).

use serde::Serialize;

use crate::error::{Error, Result};
use crate::json::JsonObject;
use crate::time::{RelativeTime, TimeUnit};

/// How sampling windows are aligned. At most one alignment is active.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Alignment {
    /// Windows start at the first data point.
    #[default]
    None,
    /// Windows align to the sampling unit (e.g. hour boundaries).
    Sampling,
    /// Windows align to the query start time.
    StartTime,
    /// Windows align to the query end time.
    EndTime,
}

/// What the `dev` aggregator returns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DevReturnType {
    /// The standard deviation itself.
    #[default]
    Value,
    /// Mean plus one standard deviation.
    PosSd,
    /// Mean minus one standard deviation.
    NegSd,
}

/// Which end of the series the `trim` aggregator removes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrimMode {
    First,
    Last,
    Both,
}

/// Sampling window shared by the range aggregators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sampling {
    size: RelativeTime,
    alignment: Alignment,
    start_time: Option<i64>,
}

impl Sampling {
    fn new(value: i64, unit: TimeUnit) -> Result<Self> {
        Ok(Self {
            size: RelativeTime::new(value, unit)?,
            alignment: Alignment::None,
            start_time: None,
        })
    }

    pub fn size(&self) -> RelativeTime {
        self.size
    }

    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    pub fn start_time(&self) -> Option<i64> {
        self.start_time
    }

    fn write_fields(&self, obj: &mut JsonObject) -> Result<()> {
        obj.field("sampling", &self.size)?
            .field("align_sampling", &(self.alignment == Alignment::Sampling))?
            .field("align_start_time", &(self.alignment == Alignment::StartTime))?
            .field("align_end_time", &(self.alignment == Alignment::EndTime))?;
        if let Some(start) = self.start_time {
            obj.field("start_time", &start)?;
        }
        Ok(())
    }
}

/// A named transform attached to a query metric.
///
/// Built through the validating constructors (`Aggregator::max(1, TimeUnit::Days)`
/// and friends). [`Aggregator::custom`] covers aggregators this crate does not
/// know about.
#[derive(Clone, Debug, PartialEq)]
pub enum Aggregator {
    Avg(Sampling),
    Count(Sampling),
    Dev(Sampling, DevReturnType),
    First(Sampling),
    Gaps(Sampling),
    Last(Sampling),
    LeastSquares(Sampling),
    Max(Sampling),
    Min(Sampling),
    Percentile(Sampling, f64),
    Sum(Sampling),
    Rate(TimeUnit),
    Sampler(TimeUnit),
    Diff,
    Div(f64),
    Scale(f64),
    SaveAs(String),
    Trim(TrimMode),
    /// Caller-supplied name plus raw JSON fields, spliced in unvalidated.
    Custom { name: String, json: String },
}

impl Aggregator {
    pub fn avg(value: i64, unit: TimeUnit) -> Result<Self> {
        Ok(Aggregator::Avg(Sampling::new(value, unit)?))
    }

    pub fn count(value: i64, unit: TimeUnit) -> Result<Self> {
        Ok(Aggregator::Count(Sampling::new(value, unit)?))
    }

    pub fn dev(value: i64, unit: TimeUnit, return_type: DevReturnType) -> Result<Self> {
        Ok(Aggregator::Dev(Sampling::new(value, unit)?, return_type))
    }

    pub fn first(value: i64, unit: TimeUnit) -> Result<Self> {
        Ok(Aggregator::First(Sampling::new(value, unit)?))
    }

    /// Marks gaps in the series with null values.
    pub fn gaps(value: i64, unit: TimeUnit) -> Result<Self> {
        Ok(Aggregator::Gaps(Sampling::new(value, unit)?))
    }

    pub fn last(value: i64, unit: TimeUnit) -> Result<Self> {
        Ok(Aggregator::Last(Sampling::new(value, unit)?))
    }

    pub fn least_squares(value: i64, unit: TimeUnit) -> Result<Self> {
        Ok(Aggregator::LeastSquares(Sampling::new(value, unit)?))
    }

    pub fn max(value: i64, unit: TimeUnit) -> Result<Self> {
        Ok(Aggregator::Max(Sampling::new(value, unit)?))
    }

    pub fn min(value: i64, unit: TimeUnit) -> Result<Self> {
        Ok(Aggregator::Min(Sampling::new(value, unit)?))
    }

    /// Percentile aggregator. `percentile` must lie in `[0.0, 1.0]`.
    pub fn percentile(percentile: f64, value: i64, unit: TimeUnit) -> Result<Self> {
        if !(0.0..=1.0).contains(&percentile) {
            return Err(Error::validation(format!(
                "percentile must be between 0 and 1 inclusive, got {}",
                percentile
            )));
        }
        Ok(Aggregator::Percentile(Sampling::new(value, unit)?, percentile))
    }

    pub fn sum(value: i64, unit: TimeUnit) -> Result<Self> {
        Ok(Aggregator::Sum(Sampling::new(value, unit)?))
    }

    /// Rate of change per `unit`.
    pub fn rate(unit: TimeUnit) -> Self {
        Aggregator::Rate(unit)
    }

    /// Sampling rate per `unit`.
    pub fn sampler(unit: TimeUnit) -> Self {
        Aggregator::Sampler(unit)
    }

    pub fn diff() -> Self {
        Aggregator::Diff
    }

    /// Divide each value by `divisor`, which must be finite and non-zero.
    pub fn div(divisor: f64) -> Result<Self> {
        if divisor == 0.0 || !divisor.is_finite() {
            return Err(Error::validation(format!(
                "divisor must be a finite non-zero number, got {}",
                divisor
            )));
        }
        Ok(Aggregator::Div(divisor))
    }

    pub fn scale(factor: f64) -> Result<Self> {
        if !factor.is_finite() {
            return Err(Error::validation(format!("scale factor must be finite, got {}", factor)));
        }
        Ok(Aggregator::Scale(factor))
    }

    /// Save the aggregated series under a new metric name.
    pub fn save_as(metric_name: impl Into<String>) -> Result<Self> {
        let metric_name = metric_name.into();
        if metric_name.is_empty() {
            return Err(Error::validation("save_as metric name cannot be empty"));
        }
        Ok(Aggregator::SaveAs(metric_name))
    }

    pub fn trim(mode: TrimMode) -> Self {
        Aggregator::Trim(mode)
    }

    /// An aggregator unknown to this crate.
    ///
    /// `json` holds the remaining object fields, e.g. `"factor":2,"mode":"x"`,
    /// and is written into the request verbatim after `"name"`. It is not
    /// checked here; a malformed fragment only surfaces when the server parses
    /// the request.
    pub fn custom(name: impl Into<String>, json: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let json = json.into();
        if name.is_empty() {
            return Err(Error::validation("custom aggregator name cannot be empty"));
        }
        if json.is_empty() {
            return Err(Error::validation("custom aggregator JSON cannot be empty"));
        }
        Ok(Aggregator::Custom { name, json })
    }

    /// Set the window alignment of a sampling aggregator.
    pub fn aligned(mut self, alignment: Alignment) -> Result<Self> {
        match self.sampling_mut() {
            Some(sampling) => sampling.alignment = alignment,
            None => {
                return Err(Error::validation(format!(
                    "aggregator '{}' has no sampling window to align",
                    self.name()
                )));
            }
        }
        Ok(self)
    }

    /// Set an explicit alignment start time (epoch ms) on a sampling aggregator.
    pub fn with_start_time(mut self, start_time: i64) -> Result<Self> {
        match self.sampling_mut() {
            Some(sampling) => sampling.start_time = Some(start_time),
            None => {
                return Err(Error::validation(format!(
                    "aggregator '{}' has no sampling window",
                    self.name()
                )));
            }
        }
        Ok(self)
    }

    pub fn sampling(&self) -> Option<&Sampling> {
        match self {
            Aggregator::Avg(s)
            | Aggregator::Count(s)
            | Aggregator::Dev(s, _)
            | Aggregator::First(s)
            | Aggregator::Gaps(s)
            | Aggregator::Last(s)
            | Aggregator::LeastSquares(s)
            | Aggregator::Max(s)
            | Aggregator::Min(s)
            | Aggregator::Percentile(s, _)
            | Aggregator::Sum(s) => Some(s),
            _ => None,
        }
    }

    fn sampling_mut(&mut self) -> Option<&mut Sampling> {
        match self {
            Aggregator::Avg(s)
            | Aggregator::Count(s)
            | Aggregator::Dev(s, _)
            | Aggregator::First(s)
            | Aggregator::Gaps(s)
            | Aggregator::Last(s)
            | Aggregator::LeastSquares(s)
            | Aggregator::Max(s)
            | Aggregator::Min(s)
            | Aggregator::Percentile(s, _)
            | Aggregator::Sum(s) => Some(s),
            _ => None,
        }
    }

    /// Wire name of the aggregator.
    pub fn name(&self) -> &str {
        match self {
            Aggregator::Avg(_) => "avg",
            Aggregator::Count(_) => "count",
            Aggregator::Dev(..) => "dev",
            Aggregator::First(_) => "first",
            Aggregator::Gaps(_) => "gaps",
            Aggregator::Last(_) => "last",
            Aggregator::LeastSquares(_) => "least_squares",
            Aggregator::Max(_) => "max",
            Aggregator::Min(_) => "min",
            Aggregator::Percentile(..) => "percentile",
            Aggregator::Sum(_) => "sum",
            Aggregator::Rate(_) => "rate",
            Aggregator::Sampler(_) => "sampler",
            Aggregator::Diff => "diff",
            Aggregator::Div(_) => "div",
            Aggregator::Scale(_) => "scale",
            Aggregator::SaveAs(_) => "save_as",
            Aggregator::Trim(_) => "trim",
            Aggregator::Custom { name, .. } => name,
        }
    }

    /// Serialize to the JSON object fragment sent to the server.
    pub fn to_json(&self) -> Result<String> {
        if let Aggregator::Custom { name, json } = self {
            return Ok(format!("{{\"name\":{},{}}}", serde_json::to_string(name)?, json));
        }

        let mut obj = JsonObject::new();
        obj.field("name", self.name())?;
        match self {
            Aggregator::Dev(sampling, return_type) => {
                obj.field("return_type", return_type)?;
                sampling.write_fields(&mut obj)?;
            }
            Aggregator::Percentile(sampling, percentile) => {
                obj.field("percentile", percentile)?;
                sampling.write_fields(&mut obj)?;
            }
            Aggregator::Rate(unit) | Aggregator::Sampler(unit) => {
                obj.field("unit", unit)?;
            }
            Aggregator::Div(divisor) => {
                obj.field("divisor", divisor)?;
            }
            Aggregator::Scale(factor) => {
                obj.field("factor", factor)?;
            }
            Aggregator::SaveAs(metric_name) => {
                obj.field("metric_name", metric_name)?;
            }
            Aggregator::Trim(mode) => {
                obj.field("trim", mode)?;
            }
            other => {
                if let Some(sampling) = other.sampling() {
                    sampling.write_fields(&mut obj)?;
                }
            }
        }
        Ok(obj.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampling_aggregator_json() {
        let agg = Aggregator::max(1, TimeUnit::Days).unwrap();
        assert_eq!(
            agg.to_json().unwrap(),
            r#"{"name":"max","sampling":{"value":1,"unit":"DAYS"},"align_sampling":false,"align_start_time":false,"align_end_time":false}"#
        );
    }

    #[test]
    fn test_alignment_is_exclusive() {
        let agg = Aggregator::avg(5, TimeUnit::Minutes)
            .unwrap()
            .aligned(Alignment::Sampling)
            .unwrap()
            .aligned(Alignment::EndTime)
            .unwrap();
        assert_eq!(agg.sampling().unwrap().alignment(), Alignment::EndTime);
        let json = agg.to_json().unwrap();
        assert!(json.contains(r#""align_sampling":false"#));
        assert!(json.contains(r#""align_start_time":false"#));
        assert!(json.contains(r#""align_end_time":true"#));
    }

    #[test]
    fn test_alignment_requires_sampling() {
        assert!(matches!(
            Aggregator::diff().aligned(Alignment::Sampling),
            Err(Error::Validation(_))
        ));
        assert!(Aggregator::rate(TimeUnit::Seconds).with_start_time(10).is_err());
    }

    #[test]
    fn test_start_time() {
        let agg = Aggregator::sum(1, TimeUnit::Hours)
            .unwrap()
            .with_start_time(1000)
            .unwrap();
        assert!(agg.to_json().unwrap().ends_with(r#","start_time":1000}"#));
    }

    #[test]
    fn test_sampling_size_must_be_positive() {
        assert!(Aggregator::min(0, TimeUnit::Days).is_err());
        assert!(Aggregator::count(-1, TimeUnit::Days).is_err());
    }

    #[test]
    fn test_percentile_bounds() {
        assert!(Aggregator::percentile(-0.1, 1, TimeUnit::Days).is_err());
        assert!(Aggregator::percentile(1.1, 1, TimeUnit::Days).is_err());
        assert!(Aggregator::percentile(f64::NAN, 1, TimeUnit::Days).is_err());
        assert!(Aggregator::percentile(0.0, 1, TimeUnit::Days).is_ok());
        assert!(Aggregator::percentile(1.0, 1, TimeUnit::Days).is_ok());

        let json = Aggregator::percentile(0.75, 1, TimeUnit::Hours)
            .unwrap()
            .to_json()
            .unwrap();
        assert!(json.starts_with(r#"{"name":"percentile","percentile":0.75,"sampling""#));
    }

    #[test]
    fn test_dev_return_type() {
        let json = Aggregator::dev(1, TimeUnit::Days, DevReturnType::PosSd)
            .unwrap()
            .to_json()
            .unwrap();
        assert!(json.starts_with(r#"{"name":"dev","return_type":"pos_sd","#));
    }

    #[test]
    fn test_div_rejects_zero() {
        assert!(Aggregator::div(0.0).is_err());
        assert!(Aggregator::div(f64::INFINITY).is_err());
        assert_eq!(
            Aggregator::div(2.5).unwrap().to_json().unwrap(),
            r#"{"name":"div","divisor":2.5}"#
        );
    }

    #[test]
    fn test_simple_aggregators() {
        assert_eq!(
            Aggregator::rate(TimeUnit::Seconds).to_json().unwrap(),
            r#"{"name":"rate","unit":"SECONDS"}"#
        );
        assert_eq!(
            Aggregator::sampler(TimeUnit::Minutes).to_json().unwrap(),
            r#"{"name":"sampler","unit":"MINUTES"}"#
        );
        assert_eq!(Aggregator::diff().to_json().unwrap(), r#"{"name":"diff"}"#);
        assert_eq!(
            Aggregator::scale(-2.0).unwrap().to_json().unwrap(),
            r#"{"name":"scale","factor":-2.0}"#
        );
        assert_eq!(
            Aggregator::trim(TrimMode::Both).to_json().unwrap(),
            r#"{"name":"trim","trim":"BOTH"}"#
        );
        assert_eq!(
            Aggregator::save_as("cpu.hourly").unwrap().to_json().unwrap(),
            r#"{"name":"save_as","metric_name":"cpu.hourly"}"#
        );
        assert!(Aggregator::save_as("").is_err());
    }

    #[test]
    fn test_custom_aggregator_is_spliced_verbatim() {
        let agg = Aggregator::custom("filter", r#""filter_op":"lt","threshold":10"#).unwrap();
        assert_eq!(agg.name(), "filter");
        assert_eq!(
            agg.to_json().unwrap(),
            r#"{"name":"filter","filter_op":"lt","threshold":10}"#
        );

        // Not valid JSON, and still accepted.
        let agg = Aggregator::custom("broken", "not json").unwrap();
        assert_eq!(agg.to_json().unwrap(), r#"{"name":"broken",not json}"#);
    }

    #[test]
    fn test_custom_aggregator_requires_name_and_json() {
        assert!(Aggregator::custom("", "\"a\":1").is_err());
        assert!(Aggregator::custom("x", "").is_err());
    }
}
