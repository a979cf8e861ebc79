//! SQL validation gate
//!
//! Textual allow/deny check applied to every candidate statement before it
//! reaches the datastore. This is not a parser: it rejects anything that
//! mentions a mutating verb and anything that does not name a permitted table.
//! Read-only statements that select more than intended still pass.

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

/// Verbs rejected as plain substrings of the lower-cased statement.
pub const FORBIDDEN_SQL: [&str; 6] = ["insert", "update", "delete", "drop", "alter", "truncate"];

lazy_static! {
    static ref PERMITTED_TABLE: Regex =
        Regex::new(r"\bholdings\b|\btrades\b").expect("permitted-table pattern is valid");
}

/// Why a candidate was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlRejection {
    ForbiddenVerb(&'static str),
    NoPermittedTable,
}

impl fmt::Display for SqlRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlRejection::ForbiddenVerb(verb) => write!(f, "contains forbidden verb '{}'", verb),
            SqlRejection::NoPermittedTable => f.write_str("does not reference holdings or trades"),
        }
    }
}

/// Run both checks and report the first failure.
pub fn check_sql(sql: &str) -> Result<(), SqlRejection> {
    let sql_lower = sql.to_lowercase();

    if let Some(verb) = FORBIDDEN_SQL.iter().find(|w| sql_lower.contains(**w)) {
        return Err(SqlRejection::ForbiddenVerb(*verb));
    }

    if !PERMITTED_TABLE.is_match(&sql_lower) {
        return Err(SqlRejection::NoPermittedTable);
    }

    Ok(())
}

pub fn is_valid_sql(sql: &str) -> bool {
    check_sql(sql).is_ok()
}
