//! Typed bind values for dynamically built queries.

use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::Query;

/// A value bound to a `$n` placeholder. Each variant binds with its own PostgreSQL type.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlParam {
    Text(String),
    Bool(bool),
    I64(i64),
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        SqlParam::Text(v.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        SqlParam::Text(v)
    }
}

impl From<bool> for SqlParam {
    fn from(v: bool) -> Self {
        SqlParam::Bool(v)
    }
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        SqlParam::I64(v)
    }
}

/// Bind every param in order.
pub fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [SqlParam],
) -> Query<'q, Postgres, PgArguments> {
    for p in params {
        query = match p {
            SqlParam::Text(s) => query.bind(s.as_str()),
            SqlParam::Bool(b) => query.bind(*b),
            SqlParam::I64(n) => query.bind(*n),
        };
    }
    query
}
