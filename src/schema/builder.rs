use super::core::{FieldSchemas, SchemaDescriptor, SchemaFault, SchemaIssue, Validation};
use super::facets::validate_fields;
use crate::value::{format_date, Value};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Number, Value as JsonValue};

#[derive(Debug, Clone)]
enum Kind {
    Any,
    String,
    Number,
    Integer,
    Boolean,
    Date,
    Enumeration(Vec<String>),
    Array(Box<Schema>),
    Object(FieldSchemas),
}

impl Kind {
    fn label(&self) -> &'static str {
        match self {
            Kind::Any => "any",
            Kind::String | Kind::Enumeration(_) => "string",
            Kind::Number => "number",
            Kind::Integer => "integer",
            Kind::Boolean => "boolean",
            Kind::Date => "date",
            Kind::Array(_) => "array",
            Kind::Object(_) => "object",
        }
    }
}

/// Built-in schema builder.
///
/// ```rust
/// use schemaroute::schema::{Schema, SchemaDescriptor, Validation};
/// use schemaroute::Value;
///
/// let id = Schema::integer().coerce();
/// assert_eq!(id.validate(&Value::from("7")).unwrap(), Validation::Valid(Value::from(7)));
/// ```
///
/// Primitive schemas reject mismatched types with
/// `Expected <type>, received <type>`. With [`Schema::coerce`] they first try
/// to convert strings (and for strings, any primitive), which is what path,
/// query and header facets need since those always arrive as text.
#[derive(Debug, Clone)]
pub struct Schema {
    kind: Kind,
    optional: bool,
    nullable: bool,
    coerce: bool,
    description: Option<String>,
}

impl Schema {
    fn of(kind: Kind) -> Self {
        Self {
            kind,
            optional: false,
            nullable: false,
            coerce: false,
            description: None,
        }
    }

    #[must_use]
    pub fn any() -> Self {
        Self::of(Kind::Any)
    }

    #[must_use]
    pub fn string() -> Self {
        Self::of(Kind::String)
    }

    #[must_use]
    pub fn number() -> Self {
        Self::of(Kind::Number)
    }

    #[must_use]
    pub fn integer() -> Self {
        Self::of(Kind::Integer)
    }

    #[must_use]
    pub fn boolean() -> Self {
        Self::of(Kind::Boolean)
    }

    /// Accepts date values; with [`Schema::coerce`] also RFC 3339 strings,
    /// `YYYY-MM-DD` strings (midnight UTC) and millisecond timestamps.
    #[must_use]
    pub fn date() -> Self {
        Self::of(Kind::Date)
    }

    /// String restricted to one of `variants`.
    pub fn enumeration<I, S>(variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::of(Kind::Enumeration(variants.into_iter().map(Into::into).collect()))
    }

    #[must_use]
    pub fn array(items: Schema) -> Self {
        Self::of(Kind::Array(Box::new(items)))
    }

    /// Object with the given fields. Undeclared keys are stripped on success.
    pub fn object<I, K, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, S)>,
        K: Into<String>,
        S: SchemaDescriptor + 'static,
    {
        Self::of(Kind::Object(fields.into_iter().collect()))
    }

    /// Object over a prebuilt field mapping.
    #[must_use]
    pub fn object_of(fields: FieldSchemas) -> Self {
        Self::of(Kind::Object(fields))
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    #[must_use]
    pub fn coerce(mut self) -> Self {
        self.coerce = true;
        self
    }

    #[must_use]
    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    fn check(&self, value: &Value, issues: &mut Vec<SchemaIssue>) -> Result<Option<Value>, SchemaFault> {
        if value.is_null() && (self.nullable || matches!(self.kind, Kind::Any)) {
            return Ok(Some(Value::Null));
        }
        let parsed = match &self.kind {
            Kind::Any => Ok(value.clone()),
            Kind::String => self.check_string(value),
            Kind::Number => self.check_number(value, false),
            Kind::Integer => self.check_number(value, true),
            Kind::Boolean => self.check_boolean(value),
            Kind::Date => self.check_date(value),
            Kind::Enumeration(variants) => check_enumeration(variants, value),
            Kind::Array(items) => return items.check_array(value, issues),
            Kind::Object(fields) => {
                if !matches!(value, Value::Object(_)) {
                    Err(mismatch("object", value))
                } else {
                    return match validate_fields(fields, value)? {
                        Validation::Valid(v) => Ok(Some(v)),
                        Validation::Invalid(found) => {
                            issues.extend(found);
                            Ok(None)
                        }
                    };
                }
            }
        };
        match parsed {
            Ok(v) => Ok(Some(v)),
            Err(message) => {
                issues.push(SchemaIssue::new(message));
                Ok(None)
            }
        }
    }

    fn check_array(&self, value: &Value, issues: &mut Vec<SchemaIssue>) -> Result<Option<Value>, SchemaFault> {
        let Value::Array(items) = value else {
            issues.push(SchemaIssue::new(mismatch("array", value)));
            return Ok(None);
        };
        let mut parsed = Vec::with_capacity(items.len());
        let before = issues.len();
        for (index, item) in items.iter().enumerate() {
            let mut found = Vec::new();
            if let Some(v) = self.check(item, &mut found)? {
                parsed.push(v);
            }
            let segment = index.to_string();
            issues.extend(found.into_iter().map(|i| i.prefixed(&segment)));
        }
        Ok((issues.len() == before).then_some(Value::Array(parsed)))
    }

    fn check_string(&self, value: &Value) -> Result<Value, String> {
        match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(n) if self.coerce => Ok(Value::String(n.to_string())),
            Value::Bool(b) if self.coerce => Ok(Value::String(b.to_string())),
            Value::Date(d) if self.coerce => Ok(Value::String(format_date(d))),
            other => Err(mismatch("string", other)),
        }
    }

    fn check_number(&self, value: &Value, integral: bool) -> Result<Value, String> {
        let expected = if integral { "integer" } else { "number" };
        let number = match value {
            Value::Number(n) => n.clone(),
            Value::String(s) if self.coerce => {
                parse_number(s.trim()).ok_or_else(|| format!("Expected {expected}, received nan"))?
            }
            Value::Bool(b) if self.coerce => Number::from(u8::from(*b)),
            other => return Err(mismatch(expected, other)),
        };
        if integral && !(number.is_i64() || number.is_u64()) {
            return Err("Expected integer, received float".to_string());
        }
        Ok(Value::Number(number))
    }

    fn check_boolean(&self, value: &Value) -> Result<Value, String> {
        match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::String(s) if self.coerce => match s.trim() {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(mismatch("boolean", value)),
            },
            other => Err(mismatch("boolean", other)),
        }
    }

    fn check_date(&self, value: &Value) -> Result<Value, String> {
        match value {
            Value::Date(_) => Ok(value.clone()),
            Value::String(s) if self.coerce => parse_date(s.trim())
                .map(Value::Date)
                .ok_or_else(|| "Invalid date".to_string()),
            Value::Number(n) if self.coerce => n
                .as_i64()
                .and_then(DateTime::<Utc>::from_timestamp_millis)
                .map(Value::Date)
                .ok_or_else(|| "Invalid date".to_string()),
            other => Err(mismatch("date", other)),
        }
    }
}

fn mismatch(expected: &str, received: &Value) -> String {
    format!("Expected {expected}, received {}", received.type_name())
}

fn check_enumeration(variants: &[String], value: &Value) -> Result<Value, String> {
    let expected = variants
        .iter()
        .map(|v| format!("'{v}'"))
        .collect::<Vec<_>>()
        .join(" | ");
    match value {
        Value::String(s) if variants.iter().any(|v| v == s) => Ok(value.clone()),
        Value::String(s) => Err(format!(
            "Invalid enum value. Expected {expected}, received '{s}'"
        )),
        other => Err(format!("Expected {expected}, received {}", other.type_name())),
    }
}

fn parse_number(s: &str) -> Option<Number> {
    if s.is_empty() {
        return None;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Some(Number::from(i));
    }
    s.parse::<f64>().ok().and_then(Number::from_f64)
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return Some(d.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

impl SchemaDescriptor for Schema {
    fn validate(&self, value: &Value) -> Result<Validation, SchemaFault> {
        let mut issues = Vec::new();
        match self.check(value, &mut issues)? {
            Some(v) if issues.is_empty() => Ok(Validation::Valid(v)),
            _ => Ok(Validation::Invalid(issues)),
        }
    }

    fn is_optional(&self) -> bool {
        self.optional
    }

    fn json_schema(&self) -> JsonValue {
        let mut doc = match &self.kind {
            Kind::Any => json!({}),
            Kind::Date => json!({"type": "string", "format": "date-time"}),
            Kind::Enumeration(variants) => json!({"type": "string", "enum": variants}),
            Kind::Array(items) => json!({"type": "array", "items": items.json_schema()}),
            Kind::Object(fields) => fields.json_schema(),
            other => json!({ "type": other.label() }),
        };
        if let JsonValue::Object(map) = &mut doc {
            if self.nullable {
                if let Some(t) = map.get("type").cloned() {
                    map.insert("type".into(), json!([t, "null"]));
                }
            }
            if let Some(text) = &self.description {
                map.insert("description".into(), JsonValue::String(text.clone()));
            }
        }
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn issues(schema: &Schema, value: Value) -> Vec<String> {
        match schema.validate(&value).unwrap() {
            Validation::Valid(v) => panic!("expected failure, got {v:?}"),
            Validation::Invalid(found) => found.iter().map(ToString::to_string).collect(),
        }
    }

    fn parsed(schema: &Schema, value: Value) -> Value {
        match schema.validate(&value).unwrap() {
            Validation::Valid(v) => v,
            Validation::Invalid(found) => panic!("unexpected issues {found:?}"),
        }
    }

    #[test]
    fn number_reports_received_type() {
        assert_eq!(
            issues(&Schema::number(), Value::from("a")),
            ["Expected number, received string"]
        );
        assert_eq!(
            issues(&Schema::number().coerce(), Value::from("a")),
            ["Expected number, received nan"]
        );
    }

    #[test]
    fn coercion_keeps_integers_integral() {
        let v = parsed(&Schema::number().coerce(), Value::from("1"));
        assert_eq!(v.to_json(), serde_json::json!(1));
        let v = parsed(&Schema::number().coerce(), Value::from("1.5"));
        assert_eq!(v.as_f64(), Some(1.5));
        assert_eq!(
            issues(&Schema::integer().coerce(), Value::from("1.5")),
            ["Expected integer, received float"]
        );
    }

    #[test]
    fn coerced_dates_accept_calendar_days() {
        let v = parsed(&Schema::date().coerce(), Value::from("2023-07-09"));
        assert_eq!(
            v,
            Value::Date(Utc.with_ymd_and_hms(2023, 7, 9, 0, 0, 0).unwrap())
        );
        assert_eq!(
            issues(&Schema::date().coerce(), Value::from("soon")),
            ["Invalid date"]
        );
        assert_eq!(
            issues(&Schema::date(), Value::from("2023-07-09")),
            ["Expected date, received string"]
        );
    }

    #[test]
    fn nested_issue_paths() {
        let schema = Schema::object([
            ("tags", Schema::array(Schema::string())),
            ("owner", Schema::object([("id", Schema::integer())])),
        ]);
        let input = Value::from(serde_json::json!({
            "tags": ["a", 2],
            "owner": {}
        }));
        assert_eq!(
            issues(&schema, input),
            ["tags.1: Expected string, received number", "owner.id: Required"]
        );
    }

    #[test]
    fn nullable_and_enumeration() {
        assert_eq!(parsed(&Schema::string().nullable(), Value::Null), Value::Null);
        assert_eq!(
            issues(&Schema::string(), Value::Null),
            ["Expected string, received null"]
        );
        assert_eq!(
            issues(&Schema::enumeration(["a", "b"]), Value::from("c")),
            ["Invalid enum value. Expected 'a' | 'b', received 'c'"]
        );
    }

    #[test]
    fn renders_json_schema() {
        let schema = Schema::object([
            ("id", Schema::integer()),
            ("note", Schema::string().nullable().optional()),
        ]);
        assert_eq!(
            schema.json_schema(),
            serde_json::json!({
                "type": "object",
                "properties": {
                    "id": {"type": "integer"},
                    "note": {"type": ["string", "null"]}
                },
                "required": ["id"]
            })
        );
    }
}
