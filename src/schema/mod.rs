//! # Schema Module
//!
//! Validation adapter between the pipeline and whatever describes a route's
//! input and output shapes.
//!
//! ## Overview
//!
//! The pipeline only sees [`SchemaDescriptor`]: validate a [`crate::Value`],
//! get back either the coerced value or a list of [`SchemaIssue`]s. Two
//! implementations ship with the crate:
//!
//! - [`JsonSchemaDescriptor`] - a JSON Schema document compiled once by
//!   `jsonschema`. This is the descriptor to use for real contracts, and the
//!   one whose documents feed route descriptions unchanged.
//! - [`Schema`] - a shorthand for inline facets (`Schema::integer().coerce()`,
//!   `Schema::object([...])`) with messages such as
//!   `Expected number, received string`
//!
//! ```rust
//! use schemaroute::schema::{JsonSchemaDescriptor, SchemaDescriptor, Validation};
//! use schemaroute::Value;
//! use serde_json::json;
//!
//! let id = JsonSchemaDescriptor::compile(json!({"type": "integer", "minimum": 1}))
//!     .expect("valid schema")
//!     .coerce();
//! assert_eq!(id.validate(&Value::from("7")).unwrap(), Validation::Valid(Value::from(7)));
//! assert!(matches!(id.validate(&Value::from("0")).unwrap(), Validation::Invalid(_)));
//! ```
//!
//! ## Facets
//!
//! Requests are validated per facet (`params`, `query`, `body`, `headers`).
//! [`FacetReport`] turns issues into diagnostic lines of the form
//! `<facet>.<path>: <message>`, keeping facet order and each validator's
//! own issue order.

mod builder;
mod core;
mod facets;
mod json_schema;

pub use builder::Schema;
pub use core::{FieldSchemas, SchemaDescriptor, SchemaFault, SchemaIssue, SchemaRef, Validation};
pub use facets::{validate_fields, validate_value, Facet, FacetReport};
pub use json_schema::JsonSchemaDescriptor;
