//! Data point values.

use ordered_float::OrderedFloat;
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};

use crate::error::{Error, Result};

/// The value carried by a [`DataPoint`].
///
/// Exactly one representation is active. Values decoded from a response pick
/// their variant from the value type reported by the server, falling back to
/// the lexical numeric rule (a literal containing `.` is a double, anything
/// else a long). A `null` literal, as written by the `gaps` aggregator,
/// decodes to [`Null`](DataPointValue::Null) whatever the series type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataPointValue {
    /// Signed 64-bit integer.
    Long(i64),

    /// 64-bit floating point value.
    Double(OrderedFloat<f64>),

    /// Text value.
    Text(String),

    /// Payload of a caller-registered custom type.
    Custom(serde_json::Value),

    /// No value at this timestamp.
    Null,
}

impl DataPointValue {
    /// Returns the value as an i64 if it is a `Long` variant.
    pub fn as_long(&self) -> Option<i64> {
        match self {
            DataPointValue::Long(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as a f64 if it is a `Double` variant.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            DataPointValue::Double(f) => Some(f.into_inner()),
            _ => None,
        }
    }

    /// Returns the value as a string reference if it is a `Text` variant.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            DataPointValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the raw JSON payload if it is a `Custom` variant.
    pub fn as_custom(&self) -> Option<&serde_json::Value> {
        match self {
            DataPointValue::Custom(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the value as a f64 for either numeric variant.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DataPointValue::Long(i) => Some(*i as f64),
            DataPointValue::Double(f) => Some(f.into_inner()),
            _ => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, DataPointValue::Long(_))
    }

    pub fn is_double(&self) -> bool {
        matches!(self, DataPointValue::Double(_))
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_double()
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DataPointValue::Null)
    }
}

impl Serialize for DataPointValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            DataPointValue::Long(i) => serializer.serialize_i64(*i),
            DataPointValue::Double(f) => serializer.serialize_f64(f.into_inner()),
            DataPointValue::Text(s) => serializer.serialize_str(s),
            DataPointValue::Custom(v) => v.serialize(serializer),
            DataPointValue::Null => serializer.serialize_unit(),
        }
    }
}

impl std::fmt::Display for DataPointValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataPointValue::Long(i) => write!(f, "{}", i),
            DataPointValue::Double(d) => write!(f, "{}", d),
            DataPointValue::Text(s) => write!(f, "{}", s),
            DataPointValue::Custom(v) => write!(f, "{}", v),
            DataPointValue::Null => f.write_str("null"),
        }
    }
}

impl From<i64> for DataPointValue {
    fn from(v: i64) -> Self {
        DataPointValue::Long(v)
    }
}

impl From<i32> for DataPointValue {
    fn from(v: i32) -> Self {
        DataPointValue::Long(v as i64)
    }
}

impl From<f64> for DataPointValue {
    fn from(v: f64) -> Self {
        DataPointValue::Double(OrderedFloat(v))
    }
}

impl From<&str> for DataPointValue {
    fn from(v: &str) -> Self {
        DataPointValue::Text(v.to_string())
    }
}

impl From<String> for DataPointValue {
    fn from(v: String) -> Self {
        DataPointValue::Text(v)
    }
}

impl From<serde_json::Value> for DataPointValue {
    fn from(v: serde_json::Value) -> Self {
        DataPointValue::Custom(v)
    }
}

/// A single timestamped measurement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataPoint {
    timestamp: i64,
    value: DataPointValue,
}

impl DataPoint {
    /// Create a data point. `timestamp` is epoch milliseconds.
    pub fn new(timestamp: i64, value: impl Into<DataPointValue>) -> Self {
        Self {
            timestamp,
            value: value.into(),
        }
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn value(&self) -> &DataPointValue {
        &self.value
    }

    pub fn into_value(self) -> DataPointValue {
        self.value
    }

    pub fn as_long(&self) -> Option<i64> {
        self.value.as_long()
    }

    pub fn as_double(&self) -> Option<f64> {
        self.value.as_double()
    }

    pub fn as_text(&self) -> Option<&str> {
        self.value.as_text()
    }

    pub fn is_integer(&self) -> bool {
        self.value.is_integer()
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    /// Deserialize a custom payload into a caller type.
    pub fn custom_as<T: DeserializeOwned>(&self) -> Result<T> {
        match &self.value {
            DataPointValue::Custom(v) => Ok(serde_json::from_value(v.clone())?),
            other => Err(Error::parse(format!(
                "data point at {} is not a custom value: {}",
                self.timestamp, other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_accessors() {
        assert_eq!(DataPointValue::Long(42).as_long(), Some(42));
        assert_eq!(DataPointValue::Long(42).as_double(), None);
        assert_eq!(DataPointValue::from(2.5).as_double(), Some(2.5));
        assert_eq!(DataPointValue::from("up").as_text(), Some("up"));
        assert_eq!(DataPointValue::from("up").as_long(), None);
        assert_eq!(DataPointValue::Long(3).as_f64(), Some(3.0));
    }

    #[test]
    fn test_integer_and_double_are_distinct() {
        assert_ne!(DataPointValue::from(30), DataPointValue::from(30.0));
        assert!(DataPointValue::from(30).is_integer());
        assert!(DataPointValue::from(30.0).is_double());
        assert!(!DataPointValue::from("30").is_numeric());
    }

    #[test]
    fn test_serialize_keeps_float_form() {
        assert_eq!(serde_json::to_string(&DataPointValue::from(30)).unwrap(), "30");
        assert_eq!(serde_json::to_string(&DataPointValue::from(30.0)).unwrap(), "30.0");
        assert_eq!(serde_json::to_string(&DataPointValue::from(30.3)).unwrap(), "30.3");
        assert_eq!(serde_json::to_string(&DataPointValue::from("a")).unwrap(), "\"a\"");
    }

    #[test]
    fn test_custom_as() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Complex {
            real: f64,
            imaginary: f64,
        }

        let point = DataPoint::new(1, serde_json::json!({"real": 1.5, "imaginary": -2.0}));
        let c: Complex = point.custom_as().unwrap();
        assert_eq!(c, Complex { real: 1.5, imaginary: -2.0 });

        let point = DataPoint::new(1, 5);
        assert!(point.custom_as::<Complex>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(DataPointValue::Long(-7).to_string(), "-7");
        assert_eq!(DataPointValue::from("hello").to_string(), "hello");
        assert_eq!(DataPointValue::Null.to_string(), "null");
    }

    #[test]
    fn test_null_value() {
        let point = DataPoint::new(2, DataPointValue::Null);
        assert!(point.is_null());
        assert!(!point.value().is_numeric());
        assert_eq!(point.as_long(), None);
        assert_eq!(point.value().as_f64(), None);
        assert_eq!(serde_json::to_string(point.value()).unwrap(), "null");
    }
}
