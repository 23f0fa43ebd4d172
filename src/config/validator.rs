//! Model declaration validation: identifiers, primary keys, uniqueness.

use crate::config::ModelSpec;
use crate::error::ConfigError;
use crate::validation::compile_pattern;
use std::collections::HashSet;

/// PostgreSQL truncates identifiers beyond this length.
const MAX_IDENTIFIER_LEN: usize = 63;

/// Identifiers end up quoted inside SQL; only plain names are accepted.
pub fn validate_identifier(name: &str) -> Result<(), ConfigError> {
    let mut chars = name.chars();
    let head_ok = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    let tail_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if head_ok && tail_ok && name.len() <= MAX_IDENTIFIER_LEN {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier(name.to_string()))
    }
}

pub fn validate_model(model: &ModelSpec) -> Result<(), ConfigError> {
    validate_identifier(&model.name)?;
    let mut names = HashSet::new();
    for c in &model.columns {
        validate_identifier(&c.name)?;
        if !names.insert(c.name.as_str()) {
            return Err(ConfigError::DuplicateColumn {
                model: model.name.clone(),
                column: c.name.clone(),
            });
        }
        compile_pattern(model, c)?;
    }
    let pk_count = model.columns.iter().filter(|c| c.primary_key).count();
    if pk_count != 1 {
        return Err(ConfigError::InvalidPrimaryKey {
            model: model.name.clone(),
            reason: format!("expected exactly one primary key column, found {}", pk_count),
        });
    }
    if let Some(pk) = model.primary_key() {
        if pk.nullable {
            return Err(ConfigError::InvalidPrimaryKey {
                model: model.name.clone(),
                reason: format!("primary key column '{}' must not be nullable", pk.name),
            });
        }
    }
    Ok(())
}

pub fn validate(models: &[ModelSpec]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for m in models {
        validate_model(m)?;
        if !seen.insert(m.name.as_str()) {
            return Err(ConfigError::DuplicateModel(m.name.clone()));
        }
    }
    Ok(())
}
