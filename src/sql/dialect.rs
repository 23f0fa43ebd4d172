//! Per-backend SQL differences. Everything else is written once against `$n` placeholders,
//! which both PostgreSQL and SQLite accept.

use crate::config::ColumnType;
use crate::error::ConfigError;

const MAX_COUNT: u64 = i64::MAX as u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Detect the backend from a database url scheme.
    pub fn from_url(url: &str) -> Result<Self, ConfigError> {
        let scheme = url.split(':').next().unwrap_or("").to_ascii_lowercase();
        match scheme.as_str() {
            "sqlite" => Ok(Dialect::Sqlite),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            _ => Err(ConfigError::UnsupportedDatabase(scheme)),
        }
    }

    pub fn type_name(self, ty: ColumnType) -> &'static str {
        match (self, ty) {
            (Dialect::Postgres, ColumnType::Integer) => "BIGINT",
            (Dialect::Sqlite, ColumnType::Integer) => "INTEGER",
            (Dialect::Postgres, ColumnType::Real) => "DOUBLE PRECISION",
            (Dialect::Sqlite, ColumnType::Real) => "REAL",
            (_, ColumnType::Text) | (_, ColumnType::Uuid) => "TEXT",
            (Dialect::Postgres, ColumnType::Boolean) => "BOOLEAN",
            // The Any driver cannot decode SQLite's BOOLEAN affinity; store 0/1.
            (Dialect::Sqlite, ColumnType::Boolean) => "INTEGER",
        }
    }

    /// Column type for an auto-generated integer primary key.
    pub fn auto_key_type(self) -> &'static str {
        match self {
            Dialect::Postgres => "BIGSERIAL",
            // Must be spelled exactly INTEGER to alias the rowid.
            Dialect::Sqlite => "INTEGER",
        }
    }

    /// LIMIT / OFFSET tail. SQLite only accepts OFFSET after a LIMIT.
    /// Both stores take signed 64-bit counts, so larger values are clamped.
    pub fn pagination(self, skip: u64, limit: Option<u64>) -> String {
        let skip = skip.min(MAX_COUNT);
        let limit = limit.map(|n| n.min(MAX_COUNT));
        let mut out = String::new();
        match (self, limit) {
            (_, Some(n)) => out.push_str(&format!(" LIMIT {}", n)),
            (Dialect::Sqlite, None) if skip > 0 => out.push_str(" LIMIT -1"),
            _ => {}
        }
        if skip > 0 {
            out.push_str(&format!(" OFFSET {}", skip));
        }
        out
    }

    /// The url handed to the driver. File-backed SQLite databases are created when
    /// missing, unless the url already chooses an open mode.
    pub fn connect_url(self, url: &str) -> String {
        if self != Dialect::Sqlite || self.is_in_memory(url) || url.contains("mode=") {
            return url.to_string();
        }
        let sep = if url.contains('?') { '&' } else { '?' };
        format!("{}{}mode=rwc", url, sep)
    }

    /// In-memory SQLite databases live and die with a single connection.
    pub fn is_in_memory(self, url: &str) -> bool {
        self == Dialect::Sqlite && (url.contains(":memory:") || url.contains("mode=memory"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_dialect_from_scheme() {
        assert_eq!(Dialect::from_url("sqlite::memory:").unwrap(), Dialect::Sqlite);
        assert_eq!(Dialect::from_url("SQLITE://names.db").unwrap(), Dialect::Sqlite);
        assert_eq!(Dialect::from_url("postgres://localhost/names").unwrap(), Dialect::Postgres);
        assert_eq!(Dialect::from_url("postgresql://localhost/names").unwrap(), Dialect::Postgres);
        assert!(matches!(
            Dialect::from_url("mysql://localhost/names"),
            Err(ConfigError::UnsupportedDatabase(s)) if s == "mysql"
        ));
    }

    #[test]
    fn sqlite_offset_needs_a_limit() {
        assert_eq!(Dialect::Sqlite.pagination(3, None), " LIMIT -1 OFFSET 3");
        assert_eq!(Dialect::Postgres.pagination(3, None), " OFFSET 3");
        assert_eq!(Dialect::Sqlite.pagination(1, Some(2)), " LIMIT 2 OFFSET 1");
        assert_eq!(Dialect::Postgres.pagination(0, None), "");
    }

    #[test]
    fn oversized_counts_are_clamped() {
        assert_eq!(
            Dialect::Sqlite.pagination(u64::MAX, Some(u64::MAX)),
            " LIMIT 9223372036854775807 OFFSET 9223372036854775807"
        );
    }

    #[test]
    fn sqlite_booleans_are_stored_as_integers() {
        assert_eq!(Dialect::Sqlite.type_name(ColumnType::Boolean), "INTEGER");
        assert_eq!(Dialect::Postgres.type_name(ColumnType::Boolean), "BOOLEAN");
    }

    #[test]
    fn sqlite_files_are_created_when_missing() {
        assert_eq!(Dialect::Sqlite.connect_url("sqlite://names.db"), "sqlite://names.db?mode=rwc");
        assert_eq!(
            Dialect::Sqlite.connect_url("sqlite://names.db?cache=shared"),
            "sqlite://names.db?cache=shared&mode=rwc"
        );
        assert_eq!(Dialect::Sqlite.connect_url("sqlite://names.db?mode=ro"), "sqlite://names.db?mode=ro");
        assert_eq!(Dialect::Sqlite.connect_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(Dialect::Postgres.connect_url("postgres://h/db"), "postgres://h/db");
    }

    #[test]
    fn in_memory_detection() {
        assert!(Dialect::Sqlite.is_in_memory("sqlite::memory:"));
        assert!(Dialect::Sqlite.is_in_memory("sqlite:file:names?mode=memory&cache=shared"));
        assert!(!Dialect::Sqlite.is_in_memory("sqlite://names.db"));
    }
}
