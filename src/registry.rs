//! Data point value types and the registry that maps server type names to them.
//!
//! Every result series in a query response is tagged with a value type name
//! (the `type` group-by entry). The registry turns that name into a
//! [`DataPointType`], which decodes the raw JSON literals of the series and
//! encodes values on the write path.
//!
//! # Concurrency
//!
//! Registration takes `&mut self`, lookups take `&self`. Register custom types
//! once at startup, then share the registry behind an `Arc`; concurrent lookups
//! from any number of threads are safe after that point.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ordered_float::OrderedFloat;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::value::DataPointValue;

/// Server name of the built-in numeric type.
pub const NUMBER_TYPE: &str = "number";

/// Server name of the built-in text type.
pub const TEXT_TYPE: &str = "text";

/// Decode/encode shape for one server-side value type.
pub trait DataPointType: Send + Sync + fmt::Debug {
    /// Decode a raw value literal from a response.
    fn decode(&self, literal: &Value) -> Result<DataPointValue>;

    /// Encode a value for a write request.
    fn encode(&self, value: &DataPointValue) -> Result<Value>;
}

/// The built-in numeric type.
///
/// Decoding is lexical: a literal whose text contains a decimal point becomes a
/// `Double` (so `5.0` stays a double), anything else must parse as an `i64`.
/// Literals serde_json already holds as `f64` stay doubles. That covers
/// exponent forms and integers outside the `i64` range, whose original text is
/// gone by the time they reach this type. `null` decodes to
/// [`DataPointValue::Null`].
#[derive(Clone, Copy, Debug, Default)]
pub struct NumberType;

impl NumberType {
    fn decode_str(s: &str) -> Result<DataPointValue> {
        if s.contains('.') {
            let v = s.parse::<f64>().map_err(|e| Error::UnsupportedValueType {
                type_name: NUMBER_TYPE.to_string(),
                message: format!("invalid double '{}': {}", s, e),
            })?;
            Ok(DataPointValue::Double(OrderedFloat(v)))
        } else {
            let v = s.parse::<i64>().map_err(|e| Error::UnsupportedValueType {
                type_name: NUMBER_TYPE.to_string(),
                message: format!("invalid long '{}': {}", s, e),
            })?;
            Ok(DataPointValue::Long(v))
        }
    }
}

impl DataPointType for NumberType {
    fn decode(&self, literal: &Value) -> Result<DataPointValue> {
        match literal {
            // serde_json keeps a literal as f64 only when it was written with a
            // fraction or exponent.
            Value::Number(n) if n.is_f64() => match n.as_f64() {
                Some(f) => Ok(DataPointValue::Double(OrderedFloat(f))),
                None => Self::decode_str(&n.to_string()),
            },
            Value::Number(n) => Self::decode_str(&n.to_string()),
            Value::String(s) => Self::decode_str(s),
            Value::Null => Ok(DataPointValue::Null),
            other => Err(Error::UnsupportedValueType {
                type_name: NUMBER_TYPE.to_string(),
                message: format!("expected a numeric literal, got {}", other),
            }),
        }
    }

    fn encode(&self, value: &DataPointValue) -> Result<Value> {
        match value {
            DataPointValue::Long(i) => Ok(Value::from(*i)),
            DataPointValue::Double(f) => {
                serde_json::Number::from_f64(f.into_inner())
                    .map(Value::Number)
                    .ok_or_else(|| Error::UnsupportedValueType {
                        type_name: NUMBER_TYPE.to_string(),
                        message: format!("{} is not a finite number", f),
                    })
            }
            other => Err(Error::UnsupportedValueType {
                type_name: NUMBER_TYPE.to_string(),
                message: format!("cannot encode '{}' as a number", other),
            }),
        }
    }
}

/// The built-in text type.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextType;

impl DataPointType for TextType {
    fn decode(&self, literal: &Value) -> Result<DataPointValue> {
        match literal {
            Value::String(s) => Ok(DataPointValue::Text(s.clone())),
            Value::Null => Err(Error::UnsupportedValueType {
                type_name: TEXT_TYPE.to_string(),
                message: "null text value".to_string(),
            }),
            other => Ok(DataPointValue::Text(other.to_string())),
        }
    }

    fn encode(&self, value: &DataPointValue) -> Result<Value> {
        match value {
            DataPointValue::Text(s) => Ok(Value::String(s.clone())),
            other => Err(Error::UnsupportedValueType {
                type_name: TEXT_TYPE.to_string(),
                message: format!("cannot encode '{}' as text", other),
            }),
        }
    }
}

/// A custom type whose payload is any JSON value, kept as-is.
///
/// Register one of these for server-side types (complex numbers, histograms)
/// whose shape the caller reads later through
/// [`DataPoint::custom_as`](crate::DataPoint::custom_as).
#[derive(Clone, Debug)]
pub struct JsonType {
    name: String,
}

impl JsonType {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl DataPointType for JsonType {
    fn decode(&self, literal: &Value) -> Result<DataPointValue> {
        Ok(DataPointValue::Custom(literal.clone()))
    }

    fn encode(&self, value: &DataPointValue) -> Result<Value> {
        match value {
            DataPointValue::Custom(v) => Ok(v.clone()),
            other => Err(Error::UnsupportedValueType {
                type_name: self.name.clone(),
                message: format!("expected a custom payload, got '{}'", other),
            }),
        }
    }
}

/// Maps server type names to [`DataPointType`]s.
///
/// Pre-populated with `number` and `text`. Unknown names resolve to the
/// numeric type.
#[derive(Clone, Debug)]
pub struct DataPointTypeRegistry {
    types: HashMap<String, Arc<dyn DataPointType>>,
    number: Arc<dyn DataPointType>,
}

impl DataPointTypeRegistry {
    pub fn new() -> Self {
        let number: Arc<dyn DataPointType> = Arc::new(NumberType);
        let mut types: HashMap<String, Arc<dyn DataPointType>> = HashMap::new();
        types.insert(NUMBER_TYPE.to_string(), number.clone());
        types.insert(TEXT_TYPE.to_string(), Arc::new(TextType));
        Self { types, number }
    }

    /// Register a custom type under `name`.
    ///
    /// Fails with [`Error::DuplicateType`] if the name is already taken,
    /// including the built-in names.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        data_type: impl DataPointType + 'static,
    ) -> Result<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::validation("data point type name cannot be empty"));
        }
        if self.types.contains_key(&name) {
            return Err(Error::DuplicateType(name));
        }
        tracing::debug!(type_name = %name, "registered data point type");
        self.types.insert(name, Arc::new(data_type));
        Ok(())
    }

    /// Register a [`JsonType`] under `name`.
    pub fn register_json(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        let data_type = JsonType::new(name.clone());
        self.register(name, data_type)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Look up a type by name, falling back to `number` when unregistered.
    pub fn lookup(&self, name: &str) -> &dyn DataPointType {
        self.types.get(name).unwrap_or(&self.number).as_ref()
    }

    /// The built-in numeric type.
    pub fn number(&self) -> &dyn DataPointType {
        self.number.as_ref()
    }
}

impl Default for DataPointTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(literal: &str) -> Value {
        serde_json::from_str(literal).unwrap()
    }

    #[test]
    fn test_number_lexical_inference() {
        let decode = |literal| NumberType.decode(&parse(literal)).unwrap();
        assert_eq!(decode("30"), DataPointValue::Long(30));
        assert_eq!(decode("30.0"), DataPointValue::from(30.0));
        assert_eq!(decode("30.3"), DataPointValue::from(30.3));
        assert_eq!(decode("-4"), DataPointValue::Long(-4));
        assert_eq!(decode("1e3"), DataPointValue::from(1000.0));
    }

    #[test]
    fn test_number_quoted_literals() {
        assert_eq!(NumberType.decode(&json!("5")).unwrap(), DataPointValue::Long(5));
        assert_eq!(NumberType.decode(&json!("5.0")).unwrap(), DataPointValue::from(5.0));
        assert!(matches!(
            NumberType.decode(&json!("abc")),
            Err(Error::UnsupportedValueType { .. })
        ));
    }

    #[test]
    fn test_number_rejects_non_numeric_shapes() {
        assert!(NumberType.decode(&json!({"a": 1})).is_err());
        assert!(NumberType.decode(&json!(true)).is_err());
    }

    #[test]
    fn test_number_null_is_empty_value() {
        assert_eq!(NumberType.decode(&Value::Null).unwrap(), DataPointValue::Null);
    }

    #[test]
    fn test_number_out_of_range_integer_is_double() {
        // serde_json holds these as f64, so the missing '.' is not visible here
        let value = NumberType.decode(&parse("-99999999999999999999")).unwrap();
        assert_eq!(value, DataPointValue::from(-1e20));

        // quoted literals keep their text and follow the strict rule
        assert!(matches!(
            NumberType.decode(&json!("-99999999999999999999")),
            Err(Error::UnsupportedValueType { .. })
        ));
    }

    #[test]
    fn test_number_encode() {
        assert_eq!(NumberType.encode(&DataPointValue::Long(3)).unwrap(), json!(3));
        assert_eq!(NumberType.encode(&DataPointValue::from(1.5)).unwrap(), json!(1.5));
        assert!(NumberType.encode(&DataPointValue::from(f64::NAN)).is_err());
        assert!(NumberType.encode(&DataPointValue::from("x")).is_err());
    }

    #[test]
    fn test_text_type() {
        assert_eq!(TextType.decode(&json!("up")).unwrap(), DataPointValue::from("up"));
        assert_eq!(TextType.decode(&json!(12)).unwrap(), DataPointValue::from("12"));
        assert_eq!(TextType.encode(&DataPointValue::from("up")).unwrap(), json!("up"));
        assert!(TextType.encode(&DataPointValue::Long(1)).is_err());
    }

    #[test]
    fn test_registry_defaults_unknown_to_number() {
        let registry = DataPointTypeRegistry::new();
        assert!(registry.is_registered(NUMBER_TYPE));
        assert!(registry.is_registered(TEXT_TYPE));
        assert!(!registry.is_registered("complex-number"));

        let value = registry.lookup("complex-number").decode(&parse("7")).unwrap();
        assert_eq!(value, DataPointValue::Long(7));
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let mut registry = DataPointTypeRegistry::new();
        registry.register_json("complex-number").unwrap();
        assert!(matches!(
            registry.register_json("complex-number"),
            Err(Error::DuplicateType(ref n)) if n == "complex-number"
        ));
        assert!(matches!(
            registry.register(TEXT_TYPE, TextType),
            Err(Error::DuplicateType(_))
        ));
    }

    #[test]
    fn test_registered_custom_type_decodes() {
        let mut registry = DataPointTypeRegistry::new();
        registry.register_json("complex-number").unwrap();

        let literal = json!({"real": 1, "imaginary": 2});
        let value = registry.lookup("complex-number").decode(&literal).unwrap();
        assert_eq!(value, DataPointValue::Custom(literal));
    }

    #[test]
    fn test_registry_is_shareable_across_threads() {
        let registry = Arc::new(DataPointTypeRegistry::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    registry
                        .lookup(NUMBER_TYPE)
                        .decode(&Value::from(i as i64))
                        .unwrap()
                })
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), DataPointValue::Long(i as i64));
        }
    }
}
