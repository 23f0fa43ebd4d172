//! Store-native predicate expressions for the relational repository.
//!
//! Criteria are ANDed together and with the equality filters of a selection.
//! `Raw` text is passed through to the database unescaped: whoever builds one
//! from user input must sanitize it first. Structured variants always bind
//! their values as parameters.

use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Operator {
    pub fn as_sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Criterion {
    /// Literal SQL boolean expression.
    Raw(String),
    Compare { column: String, op: Operator, value: Value },
    /// `column LIKE pattern`, with `\` as the escape character.
    Like { column: String, pattern: String },
    IsNull { column: String, negated: bool },
    In { column: String, values: Vec<Value> },
    /// OR of the inner criteria; empty matches nothing.
    Any(Vec<Criterion>),
    /// AND of the inner criteria; empty matches everything.
    All(Vec<Criterion>),
    Not(Box<Criterion>),
}

impl Criterion {
    pub fn raw(sql: impl Into<String>) -> Self {
        Criterion::Raw(sql.into())
    }

    pub fn any(criteria: impl IntoIterator<Item = Criterion>) -> Self {
        Criterion::Any(criteria.into_iter().collect())
    }

    pub fn all(criteria: impl IntoIterator<Item = Criterion>) -> Self {
        Criterion::All(criteria.into_iter().collect())
    }

    pub fn negate(self) -> Self {
        Criterion::Not(Box::new(self))
    }

    pub fn or(self, other: Criterion) -> Self {
        match self {
            Criterion::Any(mut v) => {
                v.push(other);
                Criterion::Any(v)
            }
            c => Criterion::Any(vec![c, other]),
        }
    }

    pub fn and(self, other: Criterion) -> Self {
        match self {
            Criterion::All(mut v) => {
                v.push(other);
                Criterion::All(v)
            }
            c => Criterion::All(vec![c, other]),
        }
    }
}

impl From<&str> for Criterion {
    fn from(sql: &str) -> Self {
        Criterion::Raw(sql.to_string())
    }
}

impl From<String> for Criterion {
    fn from(sql: String) -> Self {
        Criterion::Raw(sql)
    }
}

/// Start a structured criterion on a column: `col("id").lt(10)`.
pub fn col(name: impl Into<String>) -> ColumnRef {
    ColumnRef(name.into())
}

#[derive(Clone, Debug)]
pub struct ColumnRef(String);

impl ColumnRef {
    fn compare(self, op: Operator, value: impl Into<Value>) -> Criterion {
        Criterion::Compare {
            column: self.0,
            op,
            value: value.into(),
        }
    }

    pub fn eq(self, value: impl Into<Value>) -> Criterion {
        self.compare(Operator::Eq, value)
    }

    pub fn ne(self, value: impl Into<Value>) -> Criterion {
        self.compare(Operator::Ne, value)
    }

    pub fn lt(self, value: impl Into<Value>) -> Criterion {
        self.compare(Operator::Lt, value)
    }

    pub fn le(self, value: impl Into<Value>) -> Criterion {
        self.compare(Operator::Le, value)
    }

    pub fn gt(self, value: impl Into<Value>) -> Criterion {
        self.compare(Operator::Gt, value)
    }

    pub fn ge(self, value: impl Into<Value>) -> Criterion {
        self.compare(Operator::Ge, value)
    }

    pub fn like(self, pattern: impl Into<String>) -> Criterion {
        Criterion::Like {
            column: self.0,
            pattern: pattern.into(),
        }
    }

    /// Substring match with LIKE wildcards in `needle` escaped.
    pub fn contains(self, needle: &str) -> Criterion {
        self.like(format!("%{}%", escape_like(needle)))
    }

    pub fn is_null(self) -> Criterion {
        Criterion::IsNull {
            column: self.0,
            negated: false,
        }
    }

    pub fn is_not_null(self) -> Criterion {
        Criterion::IsNull {
            column: self.0,
            negated: true,
        }
    }

    pub fn in_list<I, V>(self, values: I) -> Criterion
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Criterion::In {
            column: self.0,
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// Escape `%`, `_` and `\` so they match literally under `ESCAPE '\'`.
pub fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
