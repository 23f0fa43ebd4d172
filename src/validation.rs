//! Field-map validation against a model declaration: known fields, value types,
//! nullability, required-on-create, and per-column rules.

use crate::config::{ColumnSpec, ColumnType, ModelSpec, ValidationRule};
use crate::error::{AppError, ConfigError};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Validator for one model. Column patterns are compiled once, here.
pub struct RequestValidator {
    model: ModelSpec,
    patterns: HashMap<String, Regex>,
}

/// Compile a column's `pattern` rule, if it has one.
pub fn compile_pattern(model: &ModelSpec, column: &ColumnSpec) -> Result<Option<Regex>, ConfigError> {
    let Some(pattern) = column.validation.as_ref().and_then(|r| r.pattern.as_deref()) else {
        return Ok(None);
    };
    Regex::new(pattern).map(Some).map_err(|e| ConfigError::InvalidPattern {
        model: model.name.clone(),
        column: column.name.clone(),
        reason: e.to_string(),
    })
}

impl RequestValidator {
    pub fn new(model: &ModelSpec) -> Result<Self, ConfigError> {
        let mut patterns = HashMap::new();
        for c in &model.columns {
            if let Some(re) = compile_pattern(model, c)? {
                patterns.insert(c.name.clone(), re);
            }
        }
        Ok(RequestValidator {
            model: model.clone(),
            patterns,
        })
    }

    /// Validate a new record. All required fields must be present.
    pub fn validate(&self, fields: &Map<String, Value>) -> Result<(), AppError> {
        self.check_known(fields)?;
        for c in &self.model.columns {
            let val = fields.get(&c.name);
            if c.is_required() && (val.is_none() || val == Some(&Value::Null)) {
                return Err(AppError::Validation(format!("{} is required", c.name)));
            }
            if let Some(v) = val {
                // A generated key may be sent as null and is left to the store.
                if c.primary_key && c.has_default && v.is_null() {
                    continue;
                }
                self.validate_field(c, v)?;
            }
        }
        Ok(())
    }

    /// Validate only the fields present (for updates). The primary key is never changed, so it is not checked.
    pub fn validate_partial(&self, fields: &Map<String, Value>) -> Result<(), AppError> {
        self.check_known(fields)?;
        for (name, v) in fields {
            if let Some(c) = self.model.column_named(name) {
                if !c.primary_key {
                    self.validate_field(c, v)?;
                }
            }
        }
        Ok(())
    }

    fn check_known(&self, fields: &Map<String, Value>) -> Result<(), AppError> {
        match fields.keys().find(|k| self.model.column_named(k).is_none()) {
            Some(k) => Err(AppError::Validation(format!("unknown field '{}' on {}", k, self.model.name))),
            None => Ok(()),
        }
    }

    fn validate_field(&self, c: &ColumnSpec, v: &Value) -> Result<(), AppError> {
        let col = c.name.as_str();
        if v.is_null() {
            if c.nullable {
                return Ok(());
            }
            return Err(AppError::Validation(format!("{} must not be null", col)));
        }
        validate_type(col, v, c.type_)?;
        if let Some(re) = self.patterns.get(col) {
            if let Some(s) = v.as_str() {
                if !re.is_match(s) {
                    return Err(AppError::Validation(format!("{} does not match required pattern", col)));
                }
            }
        }
        if let Some(ref rule) = c.validation {
            validate_rule(col, v, rule)?;
        }
        Ok(())
    }
}

fn validate_type(col: &str, v: &Value, ty: ColumnType) -> Result<(), AppError> {
    let ok = match ty {
        ColumnType::Integer => v.is_i64(),
        ColumnType::Real => v.is_number(),
        ColumnType::Text => v.is_string(),
        ColumnType::Boolean => v.is_boolean(),
        ColumnType::Uuid => v.as_str().map(|s| uuid::Uuid::parse_str(s).is_ok()).unwrap_or(false),
    };
    if ok {
        Ok(())
    } else {
        Err(AppError::Validation(format!("{} must be of type {:?}, got {}", col, ty, v)))
    }
}

fn validate_rule(col: &str, v: &Value, rule: &ValidationRule) -> Result<(), AppError> {
    if let Some(max) = rule.max_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() > max as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at most {} characters",
                    col, max
                )));
            }
        }
    }
    if let Some(min) = rule.min_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() < min as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at least {} characters",
                    col, min
                )));
            }
        }
    }
    if let Some(ref allowed) = rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            return Err(AppError::Validation(format!(
                "{} must be one of: {:?}",
                col,
                allowed.iter().take(5).collect::<Vec<_>>()
            )));
        }
    }
    if let Some(min) = rule.minimum {
        if let Some(n) = v.as_f64() {
            if n < min {
                return Err(AppError::Validation(format!("{} must be at least {}", col, min)));
            }
        }
    }
    if let Some(max) = rule.maximum {
        if let Some(n) = v.as_f64() {
            if n > max {
                return Err(AppError::Validation(format!("{} must be at most {}", col, max)));
            }
        }
    }
    Ok(())
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names() -> ModelSpec {
        ModelSpec::new("names")
            .column(ColumnSpec::primary_key("id", ColumnType::Integer))
            .column(
                ColumnSpec::new("title", ColumnType::Text)
                    .not_null()
                    .rule(ValidationRule {
                        max_length: Some(8),
                        pattern: Some("^[A-Z]".into()),
                        ..Default::default()
                    }),
            )
            .column(ColumnSpec::new("score", ColumnType::Real).rule(ValidationRule {
                minimum: Some(0.0),
                ..Default::default()
            }))
    }

    fn validator() -> RequestValidator {
        RequestValidator::new(&names()).unwrap()
    }

    fn fields(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn create_requires_non_null_fields_without_default() {
        let v = validator();
        let err = v.validate(&fields(json!({"score": 1}))).unwrap_err();
        assert!(matches!(err, AppError::Validation(m) if m == "title is required"));
        assert!(v.validate(&fields(json!({"title": "Doe"}))).is_ok());
        assert!(v.validate(&fields(json!({"id": null, "title": "Doe"}))).is_ok());
    }

    #[test]
    fn partial_skips_required_but_checks_types_and_nulls() {
        let v = validator();
        assert!(v.validate_partial(&fields(json!({"score": 2.5}))).is_ok());
        assert!(v.validate_partial(&fields(json!({"title": 3}))).is_err());
        assert!(v.validate_partial(&fields(json!({"title": null}))).is_err());
        assert!(v.validate_partial(&fields(json!({"id": "x", "title": "Rene"}))).is_ok());
    }

    #[test]
    fn rules_apply() {
        let v = validator();
        assert!(v.validate(&fields(json!({"title": "lowercase"}))).is_err());
        assert!(v.validate(&fields(json!({"title": "Waytoolongname"}))).is_err());
        assert!(v.validate(&fields(json!({"title": "Doe", "score": -1}))).is_err());
    }

    #[test]
    fn patterns_are_compiled_once_at_construction() {
        assert_eq!(validator().patterns.len(), 1);
        let bad = ModelSpec::new("names")
            .column(ColumnSpec::primary_key("id", ColumnType::Integer))
            .column(ColumnSpec::new("title", ColumnType::Text).rule(ValidationRule {
                pattern: Some("([".into()),
                ..Default::default()
            }));
        assert!(matches!(
            RequestValidator::new(&bad),
            Err(ConfigError::InvalidPattern { ref column, .. }) if column == "title"
        ));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = validator().validate_partial(&fields(json!({"nickname": "x"}))).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
