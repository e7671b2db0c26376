//! Mapping strategies: a query template paired with a converter.
//!
//! [`DeserializationMappingStrategy`] turns stream elements into statements
//! for the sink. [`SerializationMappingStrategy`] goes the other way for a
//! source: one read statement, and a mapper from returned rows to elements.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use graphsink_core::{
    ConversionError, MappingError, ParameterBinding, QueryTemplate, Record, SinkError, Statement,
};

use crate::converter::{RecordMapper, ValueConverter};

/// The capability shared by both directions: a template and its mapper.
///
/// Building the statement is not part of the trait because its shape
/// differs per direction. [`DeserializationMappingStrategy::statement`]
/// takes an element and can fail; [`SerializationMappingStrategy::statement`]
/// takes nothing and binds no parameters.
pub trait MappingStrategy {
    type Mapper: ?Sized;

    fn template(&self) -> &QueryTemplate;

    fn mapper(&self) -> &Self::Mapper;
}

/// How much checking `statement()` does before handing off to the database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Bind whatever the converter yields; the database reports unbound
    /// placeholders at execution time.
    #[default]
    Lazy,
    /// Reject statements whose template references an unbound placeholder.
    Strict,
}

/// Stream → database. Shared, immutable, and stateless across elements.
pub struct DeserializationMappingStrategy<T> {
    template: QueryTemplate,
    converter: Arc<dyn ValueConverter<T>>,
    validation: ValidationMode,
}

impl<T> DeserializationMappingStrategy<T> {
    pub fn new(
        template: impl Into<QueryTemplate>,
        converter: impl ValueConverter<T> + 'static,
    ) -> Self {
        Self {
            template: template.into(),
            converter: Arc::new(converter),
            validation: ValidationMode::default(),
        }
    }

    pub fn with_validation(mut self, validation: ValidationMode) -> Self {
        self.validation = validation;
        self
    }

    pub fn validation(&self) -> ValidationMode {
        self.validation
    }

    /// Build the statement for one element.
    ///
    /// The binding is exactly what the converter produced and the template
    /// text is passed through unchanged.
    pub fn statement(&self, element: &T) -> Result<Statement, SinkError> {
        if self.template.text().trim().is_empty() {
            return Err(MappingError::EmptyTemplate.into());
        }

        let params = self.converter.convert(element)?;
        let statement = Statement::new(self.template.clone(), params);

        if self.validation == ValidationMode::Strict {
            let missing = statement.unbound_placeholders();
            if !missing.is_empty() {
                return Err(MappingError::MissingParameter {
                    template_id: self.template.id(),
                    missing,
                }
                .into());
            }
        }

        Ok(statement)
    }
}

impl<T> MappingStrategy for DeserializationMappingStrategy<T> {
    type Mapper = dyn ValueConverter<T>;

    fn template(&self) -> &QueryTemplate {
        &self.template
    }

    fn mapper(&self) -> &Self::Mapper {
        self.converter.as_ref()
    }
}

impl<T> Clone for DeserializationMappingStrategy<T> {
    fn clone(&self) -> Self {
        Self {
            template: self.template.clone(),
            converter: self.converter.clone(),
            validation: self.validation,
        }
    }
}

impl<T> fmt::Debug for DeserializationMappingStrategy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeserializationMappingStrategy")
            .field("template", &self.template)
            .field("validation", &self.validation)
            .finish_non_exhaustive()
    }
}

/// Database → stream.
pub struct SerializationMappingStrategy<T> {
    template: QueryTemplate,
    mapper: Arc<dyn RecordMapper<T>>,
}

impl<T> SerializationMappingStrategy<T> {
    pub fn new(template: impl Into<QueryTemplate>, mapper: impl RecordMapper<T> + 'static) -> Self {
        Self {
            template: template.into(),
            mapper: Arc::new(mapper),
        }
    }

    /// The read statement, with no parameters bound.
    pub fn statement(&self) -> Statement {
        Statement::new(self.template.clone(), ParameterBinding::new())
    }

    pub fn map_record(&self, record: &Record) -> Result<T, ConversionError> {
        self.mapper.map_record(record)
    }
}

impl<T> MappingStrategy for SerializationMappingStrategy<T> {
    type Mapper = dyn RecordMapper<T>;

    fn template(&self) -> &QueryTemplate {
        &self.template
    }

    fn mapper(&self) -> &Self::Mapper {
        self.mapper.as_ref()
    }
}

impl<T> Clone for SerializationMappingStrategy<T> {
    fn clone(&self) -> Self {
        Self {
            template: self.template.clone(),
            mapper: self.mapper.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use graphsink_core::ParamValue;

    use super::*;

    const CREATE_PERSON: &str = "CREATE (n:Person {name: {name}})";

    fn person_converter(name: &Option<String>) -> Result<ParameterBinding, ConversionError> {
        match name {
            Some(name) => Ok(ParameterBinding::new().with("name", name.as_str())),
            None => Err(ConversionError::MissingField {
                field: "name".to_string(),
            }),
        }
    }

    #[test]
    fn test_statement_matches_converter_output() {
        let strategy = DeserializationMappingStrategy::new(CREATE_PERSON, person_converter);

        for name in ["Bob", "Alice", "", "O'Brien"] {
            let element = Some(name.to_string());
            let statement = strategy.statement(&element).unwrap();
            assert_eq!(statement.text(), CREATE_PERSON);
            assert_eq!(statement.params(), &person_converter(&element).unwrap());
        }
    }

    #[test]
    fn test_conversion_error_propagates_unchanged() {
        let strategy = DeserializationMappingStrategy::new(CREATE_PERSON, person_converter);
        let err = strategy.statement(&None).unwrap_err();
        assert_eq!(
            err,
            SinkError::Conversion(ConversionError::MissingField {
                field: "name".to_string()
            })
        );
    }

    #[test]
    fn test_lazy_mode_allows_unbound_placeholders() {
        let strategy = DeserializationMappingStrategy::new(
            "CREATE (n:Person {name: $name, age: $age})",
            person_converter,
        );
        let statement = strategy.statement(&Some("Bob".to_string())).unwrap();
        assert_eq!(statement.params().len(), 1);
    }

    #[test]
    fn test_strict_mode_rejects_unbound_placeholders() {
        let strategy = DeserializationMappingStrategy::new(
            QueryTemplate::new("CREATE (n:Person {name: $name, age: $age})").with_id("person"),
            person_converter,
        )
        .with_validation(ValidationMode::Strict);

        let err = strategy.statement(&Some("Bob".to_string())).unwrap_err();
        assert_eq!(
            err,
            SinkError::Mapping(MappingError::MissingParameter {
                template_id: "person".to_string(),
                missing: vec!["age".to_string()],
            })
        );
    }

    #[test]
    fn test_empty_template() {
        let strategy = DeserializationMappingStrategy::new("   ", person_converter);
        assert_eq!(
            strategy.statement(&Some("Bob".to_string())).unwrap_err(),
            SinkError::Mapping(MappingError::EmptyTemplate)
        );
    }

    #[test]
    fn test_serialization_strategy() {
        let strategy = SerializationMappingStrategy::new(
            "MATCH (n:Person) RETURN n.name AS name",
            |record: &Record| -> Result<String, ConversionError> {
                record
                    .get("name")
                    .and_then(ParamValue::as_str)
                    .map(str::to_string)
                    .ok_or(ConversionError::MissingField {
                        field: "name".to_string(),
                    })
            },
        );

        let statement = strategy.statement();
        assert!(statement.params().is_empty());
        assert_eq!(strategy.template().text(), statement.text());

        let mut record = Record::new();
        record.insert("name".to_string(), ParamValue::from("Carol"));
        assert_eq!(strategy.map_record(&record).unwrap(), "Carol");
        assert!(strategy.mapper().map_record(&Record::new()).is_err());
    }
}
