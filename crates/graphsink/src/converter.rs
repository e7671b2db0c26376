//! Value converters: element → parameter binding, and record → element.

use serde_json::Value;

use graphsink_core::{ConversionError, ParamValue, ParameterBinding, Record};

/// Extracts named parameter values from a stream element.
///
/// Implementations must be deterministic and side-effect free. Closures of
/// the right shape implement this trait directly.
pub trait ValueConverter<T: ?Sized>: Send + Sync {
    fn convert(&self, element: &T) -> Result<ParameterBinding, ConversionError>;
}

impl<T: ?Sized, F> ValueConverter<T> for F
where
    F: Fn(&T) -> Result<ParameterBinding, ConversionError> + Send + Sync,
{
    fn convert(&self, element: &T) -> Result<ParameterBinding, ConversionError> {
        self(element)
    }
}

/// Builds a stream element from a row returned by the database.
pub trait RecordMapper<T>: Send + Sync {
    fn map_record(&self, record: &Record) -> Result<T, ConversionError>;
}

impl<T, F> RecordMapper<T> for F
where
    F: Fn(&Record) -> Result<T, ConversionError> + Send + Sync,
{
    fn map_record(&self, record: &Record) -> Result<T, ConversionError> {
        self(record)
    }
}

/// Converts JSON objects by field name.
///
/// Required fields must be present and non-null. Optional fields are bound
/// only when present. In pass-through mode every top-level field is bound.
#[derive(Debug, Clone, Default)]
pub struct JsonFieldConverter {
    required: Vec<String>,
    optional: Vec<String>,
    all_fields: bool,
}

impl JsonFieldConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind every top-level field of the object.
    pub fn all_fields() -> Self {
        Self {
            all_fields: true,
            ..Self::default()
        }
    }

    pub fn required(mut self, field: impl Into<String>) -> Self {
        self.required.push(field.into());
        self
    }

    pub fn optional(mut self, field: impl Into<String>) -> Self {
        self.optional.push(field.into());
        self
    }
}

impl ValueConverter<Value> for JsonFieldConverter {
    fn convert(&self, element: &Value) -> Result<ParameterBinding, ConversionError> {
        let fields = match element {
            Value::Object(fields) => fields,
            Value::Null => return Err(ConversionError::Invalid("element is null".to_string())),
            other => {
                return Err(ConversionError::InvalidType {
                    field: "<element>".to_string(),
                    expected: "object".to_string(),
                    found: ParamValue::from(other.clone()).type_name().to_string(),
                })
            }
        };

        let mut binding = ParameterBinding::new();

        if self.all_fields {
            for (name, value) in fields {
                binding.insert(name.clone(), ParamValue::from(value.clone()));
            }
        }

        for name in &self.required {
            match fields.get(name) {
                Some(value) if !value.is_null() => {
                    binding.insert(name.clone(), ParamValue::from(value.clone()));
                }
                _ => return Err(ConversionError::MissingField { field: name.clone() }),
            }
        }

        for name in &self.optional {
            if let Some(value) = fields.get(name) {
                binding.insert(name.clone(), ParamValue::from(value.clone()));
            }
        }

        Ok(binding)
    }
}
