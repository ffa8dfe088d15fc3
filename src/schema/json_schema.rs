use super::core::{SchemaDescriptor, SchemaFault, SchemaIssue, Validation};
use crate::value::Value;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Descriptor backed by a JSON Schema document.
///
/// The document is compiled once at construction; the compiled validator is
/// shared by every request that uses the descriptor.
///
/// With [`JsonSchemaDescriptor::coerce`], string input is first converted
/// according to the top-level `type` (`integer`, `number`, `boolean`, or a
/// comma-separated `array` of those). On success, strings whose schema
/// declares `format: date-time` or `format: date` are promoted to dates.
#[derive(Clone)]
pub struct JsonSchemaDescriptor {
    schema: JsonValue,
    validator: Arc<jsonschema::Validator>,
    coerce: bool,
    optional: bool,
}

impl JsonSchemaDescriptor {
    /// Compile `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaFault`] when the document is not a valid JSON Schema.
    pub fn compile(schema: JsonValue) -> Result<Self, SchemaFault> {
        let validator = jsonschema::validator_for(&schema)
            .map_err(|e| SchemaFault(format!("invalid JSON Schema: {e}")))?;
        Ok(Self {
            schema,
            validator: Arc::new(validator),
            coerce: false,
            optional: false,
        })
    }

    #[must_use]
    pub fn coerce(mut self) -> Self {
        self.coerce = true;
        self
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    #[must_use]
    pub fn document(&self) -> &JsonValue {
        &self.schema
    }
}

impl std::fmt::Debug for JsonSchemaDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSchemaDescriptor")
            .field("schema", &self.schema)
            .field("coerce", &self.coerce)
            .field("optional", &self.optional)
            .finish()
    }
}

impl SchemaDescriptor for JsonSchemaDescriptor {
    fn validate(&self, value: &Value) -> Result<Validation, SchemaFault> {
        let mut instance = value.to_json();
        if self.coerce {
            instance = coerce_text(instance, &self.schema);
        }

        let issues: Vec<SchemaIssue> = self
            .validator
            .iter_errors(&instance)
            .map(|e| SchemaIssue::at(pointer_segments(&e.instance_path.to_string()), e.to_string()))
            .collect();

        if issues.is_empty() {
            Ok(Validation::Valid(promote_dates(instance, &self.schema)))
        } else {
            Ok(Validation::Invalid(issues))
        }
    }

    fn is_optional(&self) -> bool {
        self.optional
    }

    fn json_schema(&self) -> JsonValue {
        self.schema.clone()
    }
}

/// `/a/0/b` → `["a", "0", "b"]`, undoing `~1` and `~0` escapes.
fn pointer_segments(pointer: &str) -> Vec<String> {
    pointer
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| s.replace("~1", "/").replace("~0", "~"))
        .collect()
}

fn schema_type(schema: &JsonValue) -> Option<&str> {
    schema.get("type").and_then(JsonValue::as_str)
}

fn convert_primitive(text: &str, schema: Option<&JsonValue>) -> JsonValue {
    let original = || JsonValue::String(text.to_string());
    match schema.and_then(schema_type) {
        Some("integer") => text.parse::<i64>().map(JsonValue::from).unwrap_or_else(|_| original()),
        Some("number") => {
            if let Ok(i) = text.parse::<i64>() {
                JsonValue::from(i)
            } else {
                text.parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map_or_else(original, JsonValue::Number)
            }
        }
        Some("boolean") => text.parse::<bool>().map(JsonValue::from).unwrap_or_else(|_| original()),
        _ => original(),
    }
}

fn coerce_text(instance: JsonValue, schema: &JsonValue) -> JsonValue {
    match (instance, schema_type(schema)) {
        (JsonValue::String(text), Some("array")) => {
            let items = schema.get("items");
            JsonValue::Array(
                text.split(',')
                    .filter(|s| !s.is_empty())
                    .map(|p| convert_primitive(p.trim(), items))
                    .collect(),
            )
        }
        (JsonValue::String(text), _) => convert_primitive(&text, Some(schema)),
        (other, _) => other,
    }
}

fn parse_formatted(text: &str, format: &str) -> Option<DateTime<Utc>> {
    match format {
        "date-time" => DateTime::parse_from_rfc3339(text).ok().map(|d| d.with_timezone(&Utc)),
        "date" => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|d| d.and_utc()),
        _ => None,
    }
}

fn promote_dates(instance: JsonValue, schema: &JsonValue) -> Value {
    match instance {
        JsonValue::String(text) => schema
            .get("format")
            .and_then(JsonValue::as_str)
            .and_then(|f| parse_formatted(&text, f))
            .map_or(Value::String(text), Value::Date),
        JsonValue::Array(items) => {
            let item_schema = schema.get("items").cloned().unwrap_or(JsonValue::Null);
            Value::Array(
                items
                    .into_iter()
                    .map(|i| promote_dates(i, &item_schema))
                    .collect(),
            )
        }
        JsonValue::Object(map) => {
            let properties = schema.get("properties");
            Value::Object(
                map.into_iter()
                    .map(|(k, v)| {
                        let child = properties
                            .and_then(|p| p.get(&k))
                            .cloned()
                            .unwrap_or(JsonValue::Null);
                        let promoted = promote_dates(v, &child);
                        (k, promoted)
                    })
                    .collect(),
            )
        }
        other => Value::from(other),
    }
}
