//! A small, declarative JSON-schema-subset validator. No runtime
//! reflection: the field spec is data, and validation is a straightforward
//! recursive walk over it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

/// One field's declarative spec: `type`, `enum`, bounds, `items`,
/// `properties`/`additionalProperties`, `nullable`/`optional`, and
/// `description` (documentation only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSpec {
    #[serde(rename = "type")]
    pub ty: SchemaType,
    #[serde(default, rename = "enum")]
    pub enum_: Option<Vec<Value>>,
    #[serde(default, rename = "minLength")]
    pub min_length: Option<usize>,
    #[serde(default, rename = "maxLength")]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default, rename = "minItems")]
    pub min_items: Option<usize>,
    #[serde(default, rename = "maxItems")]
    pub max_items: Option<usize>,
    #[serde(default)]
    pub items: Option<Box<SchemaSpec>>,
    #[serde(default)]
    pub properties: Option<HashMap<String, SchemaSpec>>,
    #[serde(default, rename = "additionalProperties")]
    pub additional_properties: Option<bool>,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub description: Option<String>,
}

impl SchemaSpec {
    #[must_use]
    pub fn new(ty: SchemaType) -> Self {
        Self {
            ty,
            enum_: None,
            min_length: None,
            max_length: None,
            min: None,
            max: None,
            min_items: None,
            max_items: None,
            items: None,
            properties: None,
            additional_properties: None,
            nullable: false,
            optional: false,
            description: None,
        }
    }
}

/// A single validation failure, accumulated with a JSON-pointer-style path
/// so a rejected call can explain exactly which argument was wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Validate `value` against `spec` at the object root (`$`). The root call
/// always treats the value as required — `nullable`/`optional` only affect
/// nested object properties.
pub fn validate(spec: &SchemaSpec, value: &Value) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    validate_at("$", spec, value, &mut errors);
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn validate_at(path: &str, spec: &SchemaSpec, value: &Value, errors: &mut Vec<ValidationError>) {
    if value.is_null() {
        if !spec.nullable {
            errors.push(ValidationError { path: path.to_string(), message: "must not be null".to_string() });
        }
        return;
    }

    match spec.ty {
        SchemaType::String => validate_string(path, spec, value, errors),
        SchemaType::Number => validate_number(path, spec, value, errors),
        SchemaType::Boolean => {
            if !value.is_boolean() {
                errors.push(ValidationError { path: path.to_string(), message: "expected boolean".to_string() });
            }
        }
        SchemaType::Array => validate_array(path, spec, value, errors),
        SchemaType::Object => validate_object(path, spec, value, errors),
    }
}

fn validate_string(path: &str, spec: &SchemaSpec, value: &Value, errors: &mut Vec<ValidationError>) {
    let Some(s) = value.as_str() else {
        errors.push(ValidationError { path: path.to_string(), message: "expected string".to_string() });
        return;
    };
    if let Some(min) = spec.min_length {
        if s.chars().count() < min {
            errors.push(ValidationError { path: path.to_string(), message: format!("shorter than minLength {min}") });
        }
    }
    if let Some(max) = spec.max_length {
        if s.chars().count() > max {
            errors.push(ValidationError { path: path.to_string(), message: format!("longer than maxLength {max}") });
        }
    }
    if let Some(allowed) = &spec.enum_ {
        if !allowed.iter().any(|v| v.as_str() == Some(s)) {
            errors.push(ValidationError { path: path.to_string(), message: "value not in enum".to_string() });
        }
    }
}

fn validate_number(path: &str, spec: &SchemaSpec, value: &Value, errors: &mut Vec<ValidationError>) {
    let Some(n) = value.as_f64() else {
        errors.push(ValidationError { path: path.to_string(), message: "expected number".to_string() });
        return;
    };
    if let Some(min) = spec.min {
        if n < min {
            errors.push(ValidationError { path: path.to_string(), message: format!("below min {min}") });
        }
    }
    if let Some(max) = spec.max {
        if n > max {
            errors.push(ValidationError { path: path.to_string(), message: format!("above max {max}") });
        }
    }
    if let Some(allowed) = &spec.enum_ {
        if !allowed.iter().any(|v| v.as_f64() == Some(n)) {
            errors.push(ValidationError { path: path.to_string(), message: "value not in enum".to_string() });
        }
    }
}

fn validate_array(path: &str, spec: &SchemaSpec, value: &Value, errors: &mut Vec<ValidationError>) {
    let Some(items) = value.as_array() else {
        errors.push(ValidationError { path: path.to_string(), message: "expected array".to_string() });
        return;
    };
    if let Some(min) = spec.min_items {
        if items.len() < min {
            errors.push(ValidationError { path: path.to_string(), message: format!("fewer than minItems {min}") });
        }
    }
    if let Some(max) = spec.max_items {
        if items.len() > max {
            errors.push(ValidationError { path: path.to_string(), message: format!("more than maxItems {max}") });
        }
    }
    if let Some(item_spec) = &spec.items {
        for (i, item) in items.iter().enumerate() {
            validate_at(&format!("{path}[{i}]"), item_spec, item, errors);
        }
    }
}

fn validate_object(path: &str, spec: &SchemaSpec, value: &Value, errors: &mut Vec<ValidationError>) {
    let Some(obj) = value.as_object() else {
        errors.push(ValidationError { path: path.to_string(), message: "expected object".to_string() });
        return;
    };
    if let Some(properties) = &spec.properties {
        for (name, prop_spec) in properties {
            let field_path = format!("{path}.{name}");
            match obj.get(name) {
                Some(field_value) => validate_at(&field_path, prop_spec, field_value, errors),
                None if prop_spec.optional => {}
                None => errors.push(ValidationError { path: field_path, message: "missing required property".to_string() }),
            }
        }
        if spec.additional_properties == Some(false) {
            for key in obj.keys() {
                if !properties.contains_key(key) {
                    errors.push(ValidationError {
                        path: format!("{path}.{key}"),
                        message: "additional property not allowed".to_string(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_valid_object() {
        let spec: SchemaSpec = serde_json::from_value(json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "minLength": 1 },
                "count": { "type": "number", "optional": true }
            }
        }))
        .unwrap();

        assert!(validate(&spec, &json!({"text": "hi"})).is_ok());
    }

    #[test]
    fn rejects_missing_required_property() {
        let spec: SchemaSpec = serde_json::from_value(json!({
            "type": "object",
            "properties": { "text": { "type": "string" } }
        }))
        .unwrap();

        let errors = validate(&spec, &json!({})).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].path.ends_with(".text"));
    }

    #[test]
    fn rejects_out_of_bounds_array() {
        let spec: SchemaSpec = serde_json::from_value(json!({
            "type": "array",
            "minItems": 2,
            "items": { "type": "string" }
        }))
        .unwrap();

        assert!(validate(&spec, &json!(["one"])).is_err());
        assert!(validate(&spec, &json!(["one", "two"])).is_ok());
    }

    #[test]
    fn rejects_enum_mismatch() {
        let spec: SchemaSpec = serde_json::from_value(json!({
            "type": "string",
            "enum": ["a", "b"]
        }))
        .unwrap();
        assert!(validate(&spec, &json!("c")).is_err());
        assert!(validate(&spec, &json!("a")).is_ok());
    }

    #[test]
    fn nullable_allows_null() {
        let spec: SchemaSpec = serde_json::from_value(json!({ "type": "string", "nullable": true })).unwrap();
        assert!(validate(&spec, &Value::Null).is_ok());
    }
}
