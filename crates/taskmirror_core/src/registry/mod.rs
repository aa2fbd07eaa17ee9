//! Lookup registry for tags, projects and priorities.
//!
//! # Responsibility
//! - Map canonical external tokens (`"urgent"`, `"acme"`, `"H"`) to internal
//!   lookup ids, creating rows on first use.
//! - Be the only write path into the lookup tables.
//!
//! # Invariants
//! - One row per token per kind; enforced by `UNIQUE` constraints, so
//!   concurrent interns cannot duplicate.
//! - Tokens are stored verbatim (case-sensitive) to keep round-trips exact.
//! - Priority rows carry the weight implied by their code.

use crate::db::DbError;
use crate::model::task::{is_valid_project, is_valid_token, Priority};
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Internal id of one lookup row.
pub type LookupId = i64;

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Lookup table family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKind {
    Tag,
    Project,
    Priority,
}

impl LookupKind {
    fn table(self) -> &'static str {
        match self {
            Self::Tag => "tags",
            Self::Project => "projects",
            Self::Priority => "priorities",
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::Tag | Self::Project => "name",
            Self::Priority => "code",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tag => "tag",
            Self::Project => "project",
            Self::Priority => "priority",
        }
    }
}

#[derive(Debug)]
pub enum RegistryError {
    InvalidToken { kind: LookupKind, token: String },
    Db(DbError),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidToken { kind, token } => {
                write!(f, "invalid {} token `{token}`", kind.as_str())
            }
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidToken { .. } => None,
            Self::Db(err) => Some(err),
        }
    }
}

impl From<rusqlite::Error> for RegistryError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// SQLite-backed get-or-create registry.
pub struct Registry<'conn> {
    conn: &'conn Connection,
}

impl<'conn> Registry<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Returns the id for `token`, creating the row on first use.
    pub fn intern(&self, kind: LookupKind, token: &str) -> RegistryResult<LookupId> {
        let token = validate_token(kind, token)?;
        match kind {
            LookupKind::Priority => {
                let weight = Priority::from_code(token)
                    .filter(|priority| *priority != Priority::None)
                    .map(Priority::weight)
                    .ok_or_else(|| RegistryError::InvalidToken {
                        kind,
                        token: token.to_string(),
                    })?;
                self.conn.execute(
                    "INSERT OR IGNORE INTO priorities (code, weight) VALUES (?1, ?2);",
                    params![token, weight],
                )?;
            }
            LookupKind::Tag | LookupKind::Project => {
                self.conn.execute(
                    &format!(
                        "INSERT OR IGNORE INTO {} ({}) VALUES (?1);",
                        kind.table(),
                        kind.column()
                    ),
                    [token],
                )?;
            }
        }

        self.find(kind, token)?
            .ok_or_else(|| RegistryError::InvalidToken {
                kind,
                token: token.to_string(),
            })
    }

    /// Interns a priority; the "no priority" sentinel maps to no row.
    pub fn intern_priority(&self, priority: Priority) -> RegistryResult<Option<LookupId>> {
        match priority.code() {
            Some(code) => self.intern(LookupKind::Priority, code).map(Some),
            None => Ok(None),
        }
    }

    /// Looks up an existing token without creating it.
    pub fn find(&self, kind: LookupKind, token: &str) -> RegistryResult<Option<LookupId>> {
        let id = self
            .conn
            .query_row(
                &format!(
                    "SELECT id FROM {} WHERE {} = ?1;",
                    kind.table(),
                    kind.column()
                ),
                [token],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Resolves a lookup id back to its token.
    pub fn token(&self, kind: LookupKind, id: LookupId) -> RegistryResult<Option<String>> {
        let token = self
            .conn
            .query_row(
                &format!("SELECT {} FROM {} WHERE id = ?1;", kind.column(), kind.table()),
                [id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(token)
    }

    /// Lists all tokens of one kind in creation order.
    pub fn list(&self, kind: LookupKind) -> RegistryResult<Vec<String>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM {} ORDER BY id ASC;",
            kind.column(),
            kind.table()
        ))?;
        let mut rows = stmt.query([])?;
        let mut tokens = Vec::new();
        while let Some(row) = rows.next()? {
            tokens.push(row.get(0)?);
        }
        Ok(tokens)
    }
}

fn validate_token(kind: LookupKind, token: &str) -> RegistryResult<&str> {
    let valid = match kind {
        LookupKind::Tag => is_valid_token(token),
        LookupKind::Project => is_valid_project(token),
        LookupKind::Priority => !token.is_empty(),
    };
    if valid {
        Ok(token)
    } else {
        Err(RegistryError::InvalidToken {
            kind,
            token: token.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{LookupKind, Registry, RegistryError};
    use crate::db::open_db_in_memory;
    use crate::model::task::Priority;

    #[test]
    fn intern_is_get_or_create() {
        let conn = open_db_in_memory().unwrap();
        let registry = Registry::new(&conn);

        let first = registry.intern(LookupKind::Tag, "urgent").unwrap();
        let again = registry.intern(LookupKind::Tag, "urgent").unwrap();
        let other = registry.intern(LookupKind::Tag, "Urgent").unwrap();
        assert_eq!(first, again);
        assert_ne!(first, other);
        assert_eq!(
            registry.list(LookupKind::Tag).unwrap(),
            vec!["urgent".to_string(), "Urgent".to_string()]
        );
    }

    #[test]
    fn priority_rows_carry_weight() {
        let conn = open_db_in_memory().unwrap();
        let registry = Registry::new(&conn);

        let id = registry.intern_priority(Priority::High).unwrap().unwrap();
        let weight: i64 = conn
            .query_row("SELECT weight FROM priorities WHERE id = ?1;", [id], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(weight, 3);
        assert_eq!(registry.intern_priority(Priority::None).unwrap(), None);
        assert_eq!(
            registry.token(LookupKind::Priority, id).unwrap().as_deref(),
            Some("H")
        );
    }

    #[test]
    fn intern_rejects_blank_and_unknown_tokens() {
        let conn = open_db_in_memory().unwrap();
        let registry = Registry::new(&conn);

        assert!(matches!(
            registry.intern(LookupKind::Project, "   "),
            Err(RegistryError::InvalidToken { .. })
        ));
        assert!(matches!(
            registry.intern(LookupKind::Tag, "two words"),
            Err(RegistryError::InvalidToken { .. })
        ));
        assert!(matches!(
            registry.intern(LookupKind::Priority, "X"),
            Err(RegistryError::InvalidToken { .. })
        ));
    }

    #[test]
    fn project_names_keep_surrounding_whitespace() {
        let conn = open_db_in_memory().unwrap();
        let registry = Registry::new(&conn);

        let padded = registry.intern(LookupKind::Project, " acme").unwrap();
        let plain = registry.intern(LookupKind::Project, "acme").unwrap();
        assert_ne!(padded, plain);
        assert_eq!(
            registry.token(LookupKind::Project, padded).unwrap().as_deref(),
            Some(" acme")
        );
        assert!(matches!(
            registry.intern(LookupKind::Tag, " urgent"),
            Err(RegistryError::InvalidToken { .. })
        ));
    }
}
