//! Statement assembly and the guard that sits in front of it.
//!
//! Table-level mutations are spliced from caller-supplied fragments (column
//! definitions, value lists, SET and WHERE clauses). Names are validated as
//! plain identifiers, and the assembled text is parsed in the engine's dialect
//! and must come out as exactly one statement of the expected kind.

use std::fmt;
use std::str::FromStr;
use sqlparser::ast::Statement;
use sqlparser::dialect::{Dialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;

use super::{DatabaseType, Error, Result};

/// Longest accepted database or table name
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Namespaces that belong to the engine itself
const RESERVED_DATABASES: &[&str] = &[
    "main",
    "temp",
    "public",
    "information_schema",
    "pg_catalog",
    "pg_toast",
];

/// A validated database or table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    /// Validates a table name
    pub fn table(raw: &str) -> Result<Self> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_IDENTIFIER_LEN
            && raw.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(Error::InvalidIdentifier(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    /// Validates a database name, which additionally may not shadow an engine namespace.
    ///
    /// Database names are case-insensitive and normalized to lowercase, so
    /// `Shop` and `shop` name the same database on every backend.
    pub fn database(raw: &str) -> Result<Self> {
        let Self(name) = Self::table(raw)?;
        let name = name.to_ascii_lowercase();
        if RESERVED_DATABASES.contains(&name.as_str()) {
            return Err(Error::InvalidIdentifier(raw.to_string()));
        }
        Ok(Self(name))
    }

    /// The name as text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of statement a mutation is expected to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// CREATE TABLE
    CreateTable,
    /// INSERT
    Insert,
    /// UPDATE
    Update,
    /// DELETE
    Delete,
    /// SELECT
    Select,
}

impl StatementKind {
    fn of(stmt: &Statement) -> Option<Self> {
        match stmt {
            Statement::CreateTable { .. } => Some(StatementKind::CreateTable),
            Statement::Insert { .. } => Some(StatementKind::Insert),
            Statement::Update { .. } => Some(StatementKind::Update),
            Statement::Delete { .. } => Some(StatementKind::Delete),
            Statement::Query { .. } => Some(StatementKind::Select),
            _ => None,
        }
    }
}

/// Whether assembled statements are parsed before they reach the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GuardMode {
    /// Parse and require exactly one statement of the expected kind
    #[default]
    On,
    /// Hand the spliced text to the engine verbatim
    Off,
}

impl FromStr for GuardMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "on" | "strict" | "true" => Ok(GuardMode::On),
            "off" | "verbatim" | "false" => Ok(GuardMode::Off),
            other => Err(Error::Config(format!("unknown statement guard mode: {}", other))),
        }
    }
}

impl fmt::Display for GuardMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardMode::On => write!(f, "on"),
            GuardMode::Off => write!(f, "off"),
        }
    }
}

/// Checks spliced statements against the engine dialect
#[derive(Debug, Clone, Copy)]
pub struct StatementGuard {
    mode: GuardMode,
    db_type: DatabaseType,
}

impl StatementGuard {
    /// Create a guard for the given engine
    pub fn new(mode: GuardMode, db_type: DatabaseType) -> Self {
        Self { mode, db_type }
    }

    /// Current mode
    pub fn mode(&self) -> GuardMode {
        self.mode
    }

    /// Rejects `sql` unless it parses as exactly one statement of kind `expected`.
    ///
    /// Fragments the parser does not understand (engine-specific operators such
    /// as `GLOB`) are let through as long as no `;` appears outside a quoted
    /// literal, since the engine then sees a single statement.
    pub fn check(&self, sql: &str, expected: StatementKind) -> Result<()> {
        if self.mode == GuardMode::Off {
            return Ok(());
        }

        let dialect: Box<dyn Dialect> = match self.db_type {
            DatabaseType::PostgreSQL => Box::new(PostgreSqlDialect {}),
            DatabaseType::SQLite => Box::new(SQLiteDialect {}),
        };

        let ast = match Parser::parse_sql(dialect.as_ref(), sql) {
            Ok(ast) => ast,
            Err(e) if has_statement_separator(sql) => {
                return Err(Error::RejectedStatement(format!("failed to parse: {}", e)));
            }
            Err(e) => {
                tracing::debug!(error = %e, %sql, "parser does not understand statement, passing it on");
                return Ok(());
            }
        };

        match ast.as_slice() {
            [stmt] => match StatementKind::of(stmt) {
                Some(kind) if kind == expected => Ok(()),
                _ => Err(Error::RejectedStatement(format!(
                    "expected a single {:?} statement",
                    expected
                ))),
            },
            stmts => Err(Error::RejectedStatement(format!(
                "expected a single statement, found {}",
                stmts.len()
            ))),
        }
    }
}

/// Whether `sql` has a `;` outside single- or double-quoted literals.
/// Doubled quotes inside a literal toggle twice and cancel out.
fn has_statement_separator(sql: &str) -> bool {
    let mut quote: Option<char> = None;
    for c in sql.chars() {
        match (quote, c) {
            (None, ';') => return true,
            (None, '\'' | '"') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            _ => {}
        }
    }
    false
}

/// `CREATE TABLE IF NOT EXISTS db.table (schema)`
pub fn create_table(db: &Identifier, table: &Identifier, schema: &str) -> String {
    format!("CREATE TABLE IF NOT EXISTS {}.{} ({})", db, table, schema)
}

/// `INSERT INTO db.table VALUES (values)`
pub fn insert(db: &Identifier, table: &Identifier, values: &str) -> String {
    format!("INSERT INTO {}.{} VALUES ({})", db, table, values)
}

/// `UPDATE db.table SET set WHERE filter`
pub fn update(db: &Identifier, table: &Identifier, set: &str, filter: &str) -> String {
    format!("UPDATE {}.{} SET {} WHERE {}", db, table, set, filter)
}

/// `DELETE FROM db.table WHERE filter`
pub fn delete(db: &Identifier, table: &Identifier, filter: &str) -> String {
    format!("DELETE FROM {}.{} WHERE {}", db, table, filter)
}

/// `SELECT * FROM db.table`
pub fn select_all(db: &Identifier, table: &Identifier) -> String {
    format!("SELECT * FROM {}.{}", db, table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (Identifier, Identifier) {
        (Identifier::database("shop").unwrap(), Identifier::table("items").unwrap())
    }

    #[test]
    fn test_identifier_validation() {
        assert!(Identifier::table("items").is_ok());
        assert!(Identifier::table("_tmp2").is_ok());
        assert!(Identifier::table("").is_err());
        assert!(Identifier::table("2fast").is_err());
        assert!(Identifier::table("shop.items").is_err());
        assert!(Identifier::table("x; DROP TABLE y").is_err());
        assert!(Identifier::table(&"a".repeat(MAX_IDENTIFIER_LEN + 1)).is_err());

        assert!(Identifier::database("shop").is_ok());
        assert!(Identifier::database("main").is_err());
        assert!(Identifier::database("PUBLIC").is_err());
        // Reserved names are only reserved for databases.
        assert!(Identifier::table("main").is_ok());
    }

    #[test]
    fn test_database_names_fold_to_lowercase() {
        assert_eq!(Identifier::database("Shop").unwrap().as_str(), "shop");
        assert_eq!(Identifier::database("SHOP").unwrap(), Identifier::database("shop").unwrap());
        // Table names keep their case.
        assert_eq!(Identifier::table("Items").unwrap().as_str(), "Items");
    }

    #[test]
    fn test_statement_rendering() {
        let (db, table) = ids();
        assert_eq!(
            create_table(&db, &table, "id INTEGER, name TEXT"),
            "CREATE TABLE IF NOT EXISTS shop.items (id INTEGER, name TEXT)"
        );
        assert_eq!(insert(&db, &table, "1,'a'"), "INSERT INTO shop.items VALUES (1,'a')");
        assert_eq!(
            update(&db, &table, "name = 'b'", "id = 1"),
            "UPDATE shop.items SET name = 'b' WHERE id = 1"
        );
        assert_eq!(delete(&db, &table, "id = 1"), "DELETE FROM shop.items WHERE id = 1");
        assert_eq!(select_all(&db, &table), "SELECT * FROM shop.items");
    }

    #[test]
    fn test_guard_accepts_expected_statements() {
        let (db, table) = ids();
        let guard = StatementGuard::new(GuardMode::On, DatabaseType::SQLite);

        guard
            .check(&create_table(&db, &table, "id INTEGER, name TEXT"), StatementKind::CreateTable)
            .unwrap();
        guard.check(&insert(&db, &table, "1,'a'"), StatementKind::Insert).unwrap();
        guard
            .check(&update(&db, &table, "name = 'b'", "id = 1"), StatementKind::Update)
            .unwrap();
        guard.check(&delete(&db, &table, "id = 1"), StatementKind::Delete).unwrap();
    }

    #[test]
    fn test_guard_rejects_smuggled_statements() {
        let (db, table) = ids();
        let guard = StatementGuard::new(GuardMode::On, DatabaseType::SQLite);

        let sql = insert(&db, &table, "1,'a'); DROP TABLE shop.items; --");
        assert!(matches!(
            guard.check(&sql, StatementKind::Insert),
            Err(Error::RejectedStatement(_))
        ));

        let sql = delete(&db, &table, "1 = 1; DELETE FROM shop.other WHERE 1 = 1");
        assert!(guard.check(&sql, StatementKind::Delete).is_err());

        // Right shape, wrong kind.
        assert!(guard.check("SELECT 1", StatementKind::Delete).is_err());
    }

    #[test]
    fn test_guard_passes_unparsed_single_statements() {
        let (db, table) = ids();
        let guard = StatementGuard::new(GuardMode::On, DatabaseType::SQLite);

        let sql = update(&db, &table, "name = 'c'", "name GLOB 'a*'");
        assert!(guard.check(&sql, StatementKind::Update).is_ok());

        // A separator inside a literal is data.
        let sql = update(&db, &table, "name = 'c'", "name GLOB 'a;b'");
        assert!(guard.check(&sql, StatementKind::Update).is_ok());
        let sql = delete(&db, &table, "name GLOB 'it''s;' OR name GLOB \"x;\"");
        assert!(guard.check(&sql, StatementKind::Delete).is_ok());

        let sql = update(&db, &table, "name = 'c'", "name GLOB 'a*'; DROP TABLE shop.items");
        assert!(matches!(
            guard.check(&sql, StatementKind::Update),
            Err(Error::RejectedStatement(_))
        ));
        let sql = delete(&db, &table, "name GLOB 'it''s'; DROP TABLE shop.items");
        assert!(guard.check(&sql, StatementKind::Delete).is_err());
    }

    #[test]
    fn test_statement_separator_scan() {
        assert!(!has_statement_separator("SELECT 'a;b'"));
        assert!(!has_statement_separator("SELECT 'it''s;'"));
        assert!(has_statement_separator("SELECT 1; SELECT 2"));
        assert!(has_statement_separator("SELECT 'a'';'; DROP"));
        assert!(has_statement_separator("SELECT \"a;\" ;"));
    }

    #[test]
    fn test_guard_off_passes_everything() {
        let guard = StatementGuard::new(GuardMode::Off, DatabaseType::SQLite);
        assert!(guard.check("this is not sql", StatementKind::Insert).is_ok());
        assert_eq!(guard.mode(), GuardMode::Off);
    }

    #[test]
    fn test_guard_mode_parsing() {
        assert_eq!("on".parse::<GuardMode>().unwrap(), GuardMode::On);
        assert_eq!("OFF".parse::<GuardMode>().unwrap(), GuardMode::Off);
        assert!("maybe".parse::<GuardMode>().is_err());
    }
}
