//! Sink settings for the `graphsink` binary.

use serde::Deserialize;

use crate::mapping::ValidationMode;

/// The `[sink]` section of `graphsink.toml`, or `GRAPHSINK__SINK__*`
/// environment variables.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SinkSettings {
    /// Query template executed once per element.
    #[serde(default)]
    pub template: Option<String>,

    /// Identifier used for the template in logs and errors.
    #[serde(default)]
    pub template_id: Option<String>,

    /// Fields that must be present and non-null in every element.
    #[serde(default)]
    pub required_fields: Vec<String>,

    /// Fields bound only when present.
    #[serde(default)]
    pub optional_fields: Vec<String>,

    /// Elements per transaction (1 disables batching).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default)]
    pub validation: ValidationMode,
}

fn default_batch_size() -> usize {
    1
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            template: None,
            template_id: None,
            required_fields: Vec::new(),
            optional_fields: Vec::new(),
            batch_size: default_batch_size(),
            validation: ValidationMode::default(),
        }
    }
}

/// Load the `[sink]` section; a missing section yields the defaults.
pub fn load_sink_settings(file_prefix: &str) -> Result<SinkSettings, config::ConfigError> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("GRAPHSINK")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    match cfg.get::<SinkSettings>("sink") {
        Ok(settings) => Ok(settings),
        Err(config::ConfigError::NotFound(_)) => Ok(SinkSettings::default()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = SinkSettings::default();
        assert_eq!(settings.batch_size, 1);
        assert_eq!(settings.validation, ValidationMode::Lazy);
        assert!(settings.template.is_none());
    }

    #[test]
    fn test_deserialize_sink_section() {
        let settings: SinkSettings = serde_json::from_value(serde_json::json!({
            "template": "CREATE (n:Person {name: $name})",
            "required_fields": ["name"],
            "validation": "strict",
        }))
        .unwrap();
        assert_eq!(settings.required_fields, vec!["name"]);
        assert_eq!(settings.validation, ValidationMode::Strict);
        assert_eq!(settings.batch_size, 1);
        assert!(settings.optional_fields.is_empty());
    }
}
