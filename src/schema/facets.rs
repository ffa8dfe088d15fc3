use super::core::{FieldSchemas, SchemaDescriptor, SchemaFault, SchemaIssue, Validation};
use crate::value::{Object, Value};
use std::fmt;

/// One validated part of an incoming request.
///
/// Declaration order of the variants is the order diagnostics are reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facet {
    Params,
    Query,
    Body,
    Headers,
}

impl Facet {
    pub const ALL: [Facet; 4] = [Facet::Params, Facet::Query, Facet::Body, Facet::Headers];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Facet::Params => "params",
            Facet::Query => "query",
            Facet::Body => "body",
            Facet::Headers => "headers",
        }
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate an object against a field mapping.
///
/// Fields are checked in declaration order. Keys of `input` that are not
/// declared are dropped from the result. A missing non-optional field
/// produces a `Required` issue at its name; a missing optional field is
/// omitted. A non-object `input` is treated as an empty object.
///
/// # Errors
///
/// Propagates the first [`SchemaFault`] raised by a field schema.
pub fn validate_fields(fields: &FieldSchemas, input: &Value) -> Result<Validation, SchemaFault> {
    let empty = Object::new();
    let source = input.as_object().unwrap_or(&empty);

    let mut parsed = Object::new();
    let mut issues = Vec::new();
    for (name, schema) in fields.iter() {
        match source.get(name) {
            None if schema.is_optional() => {}
            None => issues.push(SchemaIssue::at(vec![name.to_string()], "Required")),
            Some(raw) => match schema.validate(raw)? {
                Validation::Valid(v) => {
                    parsed.insert(name.to_string(), v);
                }
                Validation::Invalid(found) => {
                    issues.extend(found.into_iter().map(|i| i.prefixed(name)));
                }
            },
        }
    }

    if issues.is_empty() {
        Ok(Validation::Valid(Value::Object(parsed)))
    } else {
        Ok(Validation::Invalid(issues))
    }
}

/// Validate a single optional-aware value such as the request body.
///
/// # Errors
///
/// Propagates a [`SchemaFault`] from `schema`.
pub fn validate_value(
    schema: &dyn SchemaDescriptor,
    input: Option<&Value>,
) -> Result<Validation, SchemaFault> {
    match input {
        None | Some(Value::Null) if schema.is_optional() => Ok(Validation::Valid(Value::Null)),
        None => Ok(Validation::Invalid(vec![SchemaIssue::new("Required")])),
        Some(v) => schema.validate(v),
    }
}

/// Diagnostic lines collected across facets.
#[derive(Debug, Default)]
pub struct FacetReport {
    lines: Vec<String>,
}

impl FacetReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the issues of `facet`, keeping their order.
    pub fn record(&mut self, facet: Facet, issues: &[SchemaIssue]) {
        self.lines
            .extend(issues.iter().map(|i| i.format_with(facet.as_str())));
    }

    /// Unwrap a validation into its value, recording issues on failure.
    pub fn take(&mut self, facet: Facet, validation: Validation) -> Option<Value> {
        match validation {
            Validation::Valid(v) => Some(v),
            Validation::Invalid(issues) => {
                self.record(facet, &issues);
                None
            }
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    #[must_use]
    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}
