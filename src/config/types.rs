//! Model declarations: one table per repository model, described as data.

use serde::{Deserialize, Serialize};

/// Column storage type. Maps to a concrete SQL type per dialect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    Boolean,
    /// Stored as text; values must parse as a UUID.
    Uuid,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: ColumnType,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    /// Whether the store fills the column when a record omits it (auto ids, SQL defaults).
    #[serde(default)]
    pub has_default: bool,
    /// SQL default expression, emitted verbatim into DDL.
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub validation: Option<ValidationRule>,
}

fn default_true() -> bool {
    true
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, type_: ColumnType) -> Self {
        ColumnSpec {
            name: name.into(),
            type_,
            nullable: true,
            primary_key: false,
            has_default: false,
            default: None,
            validation: None,
        }
    }

    /// Primary key column. Integer keys are generated by the store.
    pub fn primary_key(name: impl Into<String>, type_: ColumnType) -> Self {
        ColumnSpec {
            nullable: false,
            primary_key: true,
            has_default: type_ == ColumnType::Integer,
            ..ColumnSpec::new(name, type_)
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default_expr(mut self, expression: impl Into<String>) -> Self {
        self.default = Some(expression.into());
        self.has_default = true;
        self
    }

    pub fn rule(mut self, rule: ValidationRule) -> Self {
        self.validation = Some(rule);
        self
    }

    /// Required on insert: not nullable and nothing fills it in.
    pub fn is_required(&self) -> bool {
        !self.nullable && !self.has_default
    }
}

/// A declared model: table name plus columns. Exactly one column is the primary key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
}

impl ModelSpec {
    pub fn new(name: impl Into<String>) -> Self {
        ModelSpec {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    pub fn column_named(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// The primary key column. Declarations are validated before use, so a model
    /// that reaches a repository always has one.
    pub fn primary_key(&self) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.primary_key)
    }
}
