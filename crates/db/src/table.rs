//! Validated table names.
//!
//! The jobs table is configurable, so its name is interpolated into SQL
//! text. [`TableName`] only admits plain lowercase identifiers.

use std::fmt;

/// Table used when none is configured.
pub const DEFAULT_TABLE: &str = "jobs";

/// Longest identifier PostgreSQL keeps without truncation.
const MAX_IDENT_LEN: usize = 63;

#[derive(Debug, thiserror::Error)]
#[error("invalid table name {0:?}: expected a lowercase identifier of at most 63 characters")]
pub struct InvalidTableName(pub String);

/// A SQL-safe table name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName(String);

impl TableName {
    pub fn new(name: &str) -> Result<Self, InvalidTableName> {
        let mut chars = name.chars();
        let valid_start = chars
            .next()
            .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
        let valid_rest = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

        if valid_start && valid_rest && name.len() <= MAX_IDENT_LEN {
            Ok(Self(name.to_string()))
        } else {
            Err(InvalidTableName(name.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TableName {
    fn default() -> Self {
        Self(DEFAULT_TABLE.to_string())
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
