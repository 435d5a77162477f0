//! Validated table names for SQL that has to be assembled as text.
//!
//! Only a fixed set of base tables may ever be interpolated: the destination,
//! the log table, and staging tables derived from them. Anything else is
//! rejected before it reaches a statement.

use shared_utils::config::StagingMode;
use thiserror::Error;

/// Destination table for price bars.
pub const DESTINATION_TABLE: &str = "stock_data";
/// Audit log table.
pub const LOG_TABLE: &str = "stock_data_log";

const ALLOWED_BASES: [&str; 2] = [DESTINATION_TABLE, LOG_TABLE];
const STAGING_SUFFIX: &str = "_temp";

/// Rejected table references.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableRefError {
    /// Not of the form `[A-Za-z_][A-Za-z0-9_]*`.
    #[error("`{0}` is not a plain SQL identifier")]
    InvalidIdentifier(String),
    /// A well-formed name outside the allow-list.
    #[error("table `{0}` is not one this pipeline manages")]
    NotAllowed(String),
}

/// `true` for `[A-Za-z_][A-Za-z0-9_]*`, at most 63 bytes (the Postgres limit).
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    s.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Double-quote an identifier. Callers validate with [`is_identifier`] first,
/// so there is never an embedded quote to escape.
pub fn quote_ident(s: &str) -> String {
    format!("\"{s}\"")
}

fn is_allowed(name: &str) -> bool {
    if ALLOWED_BASES.contains(&name) {
        return true;
    }
    ALLOWED_BASES.iter().any(|base| {
        let Some(rest) = name
            .strip_prefix(base)
            .and_then(|r| r.strip_prefix(STAGING_SUFFIX))
        else {
            return false;
        };
        rest.is_empty()
            || rest
                .strip_prefix('_')
                .is_some_and(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric()))
    })
}

/// An optionally schema-qualified table that passed the allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    schema: Option<String>,
    name: String,
}

impl TableRef {
    /// Validate `schema` and `name` and build a reference.
    pub fn new(schema: Option<&str>, name: &str) -> Result<Self, TableRefError> {
        if let Some(s) = schema {
            if !is_identifier(s) {
                return Err(TableRefError::InvalidIdentifier(s.to_string()));
            }
        }
        if !is_identifier(name) {
            return Err(TableRefError::InvalidIdentifier(name.to_string()));
        }
        if !is_allowed(name) {
            return Err(TableRefError::NotAllowed(name.to_string()));
        }
        Ok(Self {
            schema: schema.map(str::to_string),
            name: name.to_string(),
        })
    }

    /// The `stock_data` destination.
    pub fn destination(schema: Option<&str>) -> Result<Self, TableRefError> {
        Self::new(schema, DESTINATION_TABLE)
    }

    /// The staging table for this run: `stock_data_temp`, or
    /// `stock_data_temp_<uuid>` in per-run mode.
    pub fn staging(schema: Option<&str>, mode: StagingMode) -> Result<Self, TableRefError> {
        let name = match mode {
            StagingMode::Fixed => format!("{DESTINATION_TABLE}{STAGING_SUFFIX}"),
            StagingMode::PerRun => format!(
                "{DESTINATION_TABLE}{STAGING_SUFFIX}_{}",
                uuid::Uuid::new_v4().simple()
            ),
        };
        Self::new(schema, &name)
    }

    /// Schema, if the reference is qualified.
    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// Bare table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Quoted, optionally schema-qualified name ready for interpolation.
    pub fn qualified(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(&self.name)),
            None => quote_ident(&self.name),
        }
    }

    /// A fully qualified column of this table. `column` must be a literal
    /// identifier from this crate, never user input.
    pub fn column(&self, column: &str) -> String {
        debug_assert!(is_identifier(column));
        format!("{}.{}", self.qualified(), quote_ident(column))
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_tables_are_accepted() {
        let dest = TableRef::destination(Some("market")).unwrap();
        assert_eq!(dest.qualified(), "\"market\".\"stock_data\"");
        assert_eq!(dest.column("ticker"), "\"market\".\"stock_data\".\"ticker\"");
        assert_eq!(dest.to_string(), "market.stock_data");

        let log = TableRef::new(None, LOG_TABLE).unwrap();
        assert_eq!(log.qualified(), "\"stock_data_log\"");
    }

    #[test]
    fn staging_names_follow_mode() {
        let fixed = TableRef::staging(None, StagingMode::Fixed).unwrap();
        assert_eq!(fixed.name(), "stock_data_temp");

        let a = TableRef::staging(None, StagingMode::PerRun).unwrap();
        let b = TableRef::staging(None, StagingMode::PerRun).unwrap();
        assert!(a.name().starts_with("stock_data_temp_"));
        assert_ne!(a, b);
    }

    #[test]
    fn unknown_or_malformed_names_are_rejected() {
        assert_eq!(
            TableRef::new(None, "users"),
            Err(TableRefError::NotAllowed("users".into()))
        );
        assert_eq!(
            TableRef::new(None, "stock_data_temp_"),
            Err(TableRefError::NotAllowed("stock_data_temp_".into()))
        );
        assert!(matches!(
            TableRef::new(None, "stock_data; DROP TABLE x"),
            Err(TableRefError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            TableRef::new(Some("pub\"lic"), "stock_data"),
            Err(TableRefError::InvalidIdentifier(_))
        ));
    }

    proptest! {
        #[test]
        fn anything_with_a_non_identifier_char_is_rejected(
            prefix in "[a-z_]{0,8}",
            bad in "[^A-Za-z0-9_]",
            suffix in "[a-z0-9_]{0,8}",
        ) {
            let name = format!("stock_data{prefix}{bad}{suffix}");
            prop_assert!(TableRef::new(None, &name).is_err());
            prop_assert!(TableRef::new(Some(&name), "stock_data").is_err());
        }

        #[test]
        fn accepted_names_quote_cleanly(suffix in "[a-z0-9]{1,16}") {
            let name = format!("stock_data_temp_{suffix}");
            let t = TableRef::new(Some("public"), &name).unwrap();
            prop_assert_eq!(t.qualified(), format!("\"public\".\"{name}\""));
        }
    }
}
