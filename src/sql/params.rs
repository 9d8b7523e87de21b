//! Typed values that sqlx can bind, with conversions from form values and filter input.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::Database;

/// A value bound to a PostgreSQL placeholder. The builder always emits `$n::type`,
/// so each variant is sent as text and cast server-side, except `Null`.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Uuid(uuid::Uuid),
}

impl SqlValue {
    /// Text form sent to the server; `None` for SQL NULL.
    pub fn as_text(&self) -> Option<String> {
        Some(match self {
            SqlValue::Null => return None,
            SqlValue::Bool(b) => b.to_string(),
            SqlValue::Int(n) => n.to_string(),
            SqlValue::Float(n) => n.to_string(),
            SqlValue::Text(s) => s.clone(),
            SqlValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            SqlValue::Timestamp(t) => t.to_rfc3339(),
            SqlValue::Uuid(u) => u.to_string(),
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl From<uuid::Uuid> for SqlValue {
    fn from(u: uuid::Uuid) -> Self {
        SqlValue::Uuid(u)
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(s.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::Text(s)
    }
}

impl From<i64> for SqlValue {
    fn from(n: i64) -> Self {
        SqlValue::Int(n)
    }
}

impl From<bool> for SqlValue {
    fn from(b: bool) -> Self {
        SqlValue::Bool(b)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(d: NaiveDate) -> Self {
        SqlValue::Date(d)
    }
}

impl<'q> Encode<'q, Postgres> for SqlValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        match self.as_text() {
            None => <Option<String> as Encode<Postgres>>::encode_by_ref(&None, buf),
            Some(s) => <String as Encode<Postgres>>::encode_by_ref(&s, buf),
        }
    }
}

impl sqlx::Type<Postgres> for SqlValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }
}
