//! Declarative argument schemas for tools.
//!
//! A [`Schema`] does two jobs: [`Schema::validate`] checks a raw argument
//! object (filling defaults along the way) and [`Schema::to_json_schema`]
//! renders the same declaration as JSON Schema for `tools/list`. Keeping
//! both on one value means the advertised shape can't drift from what is
//! actually accepted.
//!
//! ```
//! use mcp_tailnet::schema::{Field, Schema};
//! use serde_json::json;
//!
//! let schema = Schema::object()
//!     .field(Field::string("target").required().describe("Peer to ping"))
//!     .field(Field::integer("count").default(json!(4)).range(1, 100));
//!
//! let args = schema.validate(&json!({ "target": "nas" })).unwrap();
//! assert_eq!(args["count"], json!(4));
//! ```

use serde_json::{json, Map, Value};
use thiserror::Error;

/// Validation error with field information.
///
/// Every variant names the offending field so the caller can fix the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("arguments must be a JSON object, got {found}")]
    NotAnObject { found: &'static str },

    #[error("required field '{field}' is missing")]
    MissingRequired { field: String },

    #[error("field '{field}' must be {expected}, got {found}")]
    WrongType {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("field '{field}' must be one of [{allowed}], got {value:?}")]
    NotAllowed {
        field: String,
        allowed: String,
        value: String,
    },

    #[error("field '{field}' out of range: {value} not in [{min}, {max}]")]
    OutOfRange {
        field: String,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("field '{field}' must not be empty")]
    Empty { field: String },

    #[error("unknown field '{field}'")]
    UnknownField { field: String },
}

impl ValidationError {
    /// The field that failed validation, if the error is field-specific.
    pub fn field_name(&self) -> Option<&str> {
        match self {
            Self::NotAnObject { .. } => None,
            Self::MissingRequired { field }
            | Self::WrongType { field, .. }
            | Self::NotAllowed { field, .. }
            | Self::OutOfRange { field, .. }
            | Self::Empty { field }
            | Self::UnknownField { field } => Some(field),
        }
    }
}

/// Primitive shape of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Boolean,
    StringArray,
    /// Free-form JSON object.
    Object,
}

impl FieldType {
    fn expected(self) -> &'static str {
        match self {
            Self::String => "a string",
            Self::Integer => "an integer",
            Self::Boolean => "a boolean",
            Self::StringArray => "an array of strings",
            Self::Object => "an object",
        }
    }
}

/// One property of an object schema.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    ty: FieldType,
    description: Option<String>,
    required: bool,
    non_empty: bool,
    default: Option<Value>,
    allowed: Option<Vec<String>>,
    range: Option<(i64, i64)>,
}

impl Field {
    fn new(name: &str, ty: FieldType) -> Self {
        Self {
            name: name.to_string(),
            ty,
            description: None,
            required: false,
            non_empty: false,
            default: None,
            allowed: None,
            range: None,
        }
    }

    pub fn string(name: &str) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn integer(name: &str) -> Self {
        Self::new(name, FieldType::Integer)
    }

    pub fn boolean(name: &str) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    pub fn string_array(name: &str) -> Self {
        Self::new(name, FieldType::StringArray)
    }

    pub fn object(name: &str) -> Self {
        Self::new(name, FieldType::Object)
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Reject empty strings (after trimming).
    #[must_use]
    pub fn non_empty(mut self) -> Self {
        self.non_empty = true;
        self
    }

    #[must_use]
    pub fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Value inserted when the field is absent. Defaults are not re-validated.
    #[must_use]
    pub fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Restrict a string field to a fixed set of values.
    #[must_use]
    pub fn one_of(mut self, values: &[&str]) -> Self {
        self.allowed = Some(values.iter().map(ToString::to_string).collect());
        self
    }

    /// Inclusive bounds for an integer field.
    #[must_use]
    pub fn range(mut self, min: i64, max: i64) -> Self {
        self.range = Some((min, max));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, value: &Value) -> Result<Value, ValidationError> {
        let wrong_type = || ValidationError::WrongType {
            field: self.name.clone(),
            expected: self.ty.expected(),
            found: type_name(value),
        };

        match self.ty {
            FieldType::String => {
                let s = value.as_str().ok_or_else(wrong_type)?;
                if self.non_empty && s.trim().is_empty() {
                    return Err(ValidationError::Empty {
                        field: self.name.clone(),
                    });
                }
                if let Some(allowed) = &self.allowed {
                    if !allowed.iter().any(|a| a == s) {
                        return Err(ValidationError::NotAllowed {
                            field: self.name.clone(),
                            allowed: allowed.join(", "),
                            value: s.to_string(),
                        });
                    }
                }
                Ok(value.clone())
            }
            FieldType::Integer => {
                let n = as_integer(value).ok_or_else(wrong_type)?;
                if let Some((min, max)) = self.range {
                    if n < min || n > max {
                        return Err(ValidationError::OutOfRange {
                            field: self.name.clone(),
                            value: n,
                            min,
                            max,
                        });
                    }
                }
                Ok(json!(n))
            }
            FieldType::Boolean => {
                value.as_bool().ok_or_else(wrong_type)?;
                Ok(value.clone())
            }
            FieldType::StringArray => {
                let items = value.as_array().ok_or_else(wrong_type)?;
                if items.iter().any(|item| !item.is_string()) {
                    return Err(wrong_type());
                }
                if self.non_empty && items.is_empty() {
                    return Err(ValidationError::Empty {
                        field: self.name.clone(),
                    });
                }
                Ok(value.clone())
            }
            FieldType::Object => {
                value.as_object().ok_or_else(wrong_type)?;
                Ok(value.clone())
            }
        }
    }

    fn to_json_schema(&self) -> Value {
        let mut prop = match self.ty {
            FieldType::String => json!({ "type": "string" }),
            FieldType::Integer => json!({ "type": "integer" }),
            FieldType::Boolean => json!({ "type": "boolean" }),
            FieldType::StringArray => json!({ "type": "array", "items": { "type": "string" } }),
            FieldType::Object => json!({ "type": "object" }),
        };
        if let Some(description) = &self.description {
            prop["description"] = json!(description);
        }
        if let Some(default) = &self.default {
            prop["default"] = default.clone();
        }
        if let Some(allowed) = &self.allowed {
            prop["enum"] = json!(allowed);
        }
        if let Some((min, max)) = self.range {
            prop["minimum"] = json!(min);
            prop["maximum"] = json!(max);
        }
        if self.non_empty {
            match self.ty {
                FieldType::String => prop["minLength"] = json!(1),
                FieldType::StringArray => prop["minItems"] = json!(1),
                _ => {}
            }
        }
        prop
    }
}

/// An object schema: a list of fields plus the unknown-field policy.
#[derive(Debug, Clone)]
pub struct Schema {
    fields: Vec<Field>,
    additional_properties: bool,
}

impl Default for Schema {
    fn default() -> Self {
        Self::object()
    }
}

impl Schema {
    /// An object schema with no fields that rejects unknown fields.
    pub fn object() -> Self {
        Self {
            fields: Vec::new(),
            additional_properties: false,
        }
    }

    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.fields.retain(|f| f.name != field.name);
        self.fields.push(field);
        self
    }

    /// Accept (and pass through) fields that are not declared.
    #[must_use]
    pub fn allow_additional(mut self) -> Self {
        self.additional_properties = true;
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Validate `raw` and return the normalized argument object.
    ///
    /// `null` is treated as `{}` since clients commonly omit `arguments` for
    /// tools without parameters. Absent fields with a default are filled in.
    pub fn validate(&self, raw: &Value) -> Result<Value, ValidationError> {
        let empty = Map::new();
        let input = match raw {
            Value::Null => &empty,
            Value::Object(map) => map,
            other => {
                return Err(ValidationError::NotAnObject {
                    found: type_name(other),
                })
            }
        };

        if !self.additional_properties {
            if let Some(unknown) = input
                .keys()
                .find(|key| !self.fields.iter().any(|f| &f.name == *key))
            {
                return Err(ValidationError::UnknownField {
                    field: unknown.clone(),
                });
            }
        }

        let mut output = if self.additional_properties {
            input.clone()
        } else {
            Map::new()
        };

        for field in &self.fields {
            match input.get(&field.name) {
                Some(Value::Null) | None => {
                    if let Some(default) = &field.default {
                        output.insert(field.name.clone(), default.clone());
                    } else if field.required {
                        return Err(ValidationError::MissingRequired {
                            field: field.name.clone(),
                        });
                    } else {
                        output.remove(&field.name);
                    }
                }
                Some(value) => {
                    output.insert(field.name.clone(), field.check(value)?);
                }
            }
        }

        Ok(Value::Object(output))
    }

    /// Render the schema as a JSON Schema object declaration.
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.to_json_schema()))
            .collect();
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();

        let mut schema = json!({
            "type": "object",
            "properties": properties,
            "additionalProperties": self.additional_properties,
        });
        if !required.is_empty() {
            schema["required"] = json!(required);
        }
        schema
    }
}

/// Integers arrive as JSON numbers; `3.0` is accepted since some clients
/// serialize every number as a float.
fn as_integer(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    let f = value.as_f64()?;
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    let whole = (f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64).then(|| f as i64);
    whole
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
