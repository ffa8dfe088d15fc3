use crate::value::Value;
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

/// One problem found by a schema, located by its path inside the validated value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIssue {
    /// Object keys and array indices leading to the offending value; empty for the root
    pub path: Vec<String>,
    pub message: String,
}

impl SchemaIssue {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            path: Vec::new(),
            message: message.into(),
        }
    }

    pub fn at(path: Vec<String>, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
        }
    }

    /// Push `segment` in front of the path, used when a parent reports a child's issue.
    #[must_use]
    pub fn prefixed(mut self, segment: &str) -> Self {
        self.path.insert(0, segment.to_string());
        self
    }

    /// `"<prefix>.<path>: <message>"`, the diagnostic line format.
    #[must_use]
    pub fn format_with(&self, prefix: &str) -> String {
        let mut location = String::from(prefix);
        for segment in &self.path {
            location.push('.');
            location.push_str(segment);
        }
        format!("{location}: {}", self.message)
    }
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path.join("."), self.message)
        }
    }
}

/// Result of a schema run that completed.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    /// The input matched; holds the coerced value
    Valid(Value),
    /// The input did not match; issues in the validator's own order
    Invalid(Vec<SchemaIssue>),
}

impl Validation {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid(_))
    }
}

/// The schema itself failed to run (as opposed to the input failing it).
///
/// The pipeline treats this as a server-side error, never as a 400.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("schema could not be evaluated: {0}")]
pub struct SchemaFault(pub String);

/// Validation and coercion capability consumed by the pipeline.
///
/// Implementations must be safe to call from many requests at once.
pub trait SchemaDescriptor: Send + Sync {
    /// Validate `value`, returning the coerced form on success.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaFault`] when the schema cannot be evaluated at all.
    fn validate(&self, value: &Value) -> Result<Validation, SchemaFault>;

    /// Whether an absent value is acceptable. Absent optional fields are
    /// omitted from the parsed result.
    fn is_optional(&self) -> bool {
        false
    }

    /// JSON Schema rendering for documentation and client generators.
    fn json_schema(&self) -> JsonValue {
        JsonValue::Object(serde_json::Map::new())
    }
}

/// Shared handle to a descriptor.
pub type SchemaRef = Arc<dyn SchemaDescriptor>;

/// Ordered field-name → schema mapping used by the `params`, `query` and
/// `headers` facets and by object schemas.
#[derive(Clone, Default)]
pub struct FieldSchemas {
    fields: Vec<(String, SchemaRef)>,
}

impl FieldSchemas {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert. A repeated name replaces the earlier schema in place.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, schema: impl SchemaDescriptor + 'static) -> Self {
        self.insert(name, Arc::new(schema));
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, schema: SchemaRef) {
        let name = name.into();
        if let Some(slot) = self.fields.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = schema;
        } else {
            self.fields.push((name, schema));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SchemaRef)> {
        self.fields.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SchemaRef> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// JSON Schema `object` document describing the fields.
    #[must_use]
    pub fn json_schema(&self) -> JsonValue {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for (name, schema) in &self.fields {
            properties.insert(name.clone(), schema.json_schema());
            if !schema.is_optional() {
                required.push(JsonValue::String(name.clone()));
            }
        }
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

impl fmt::Debug for FieldSchemas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl<K, S> FromIterator<(K, S)> for FieldSchemas
where
    K: Into<String>,
    S: SchemaDescriptor + 'static,
{
    fn from_iter<I: IntoIterator<Item = (K, S)>>(iter: I) -> Self {
        let mut fields = FieldSchemas::new();
        for (name, schema) in iter {
            fields.insert(name, Arc::new(schema));
        }
        fields
    }
}
