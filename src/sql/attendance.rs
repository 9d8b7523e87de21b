//! Queries over the attendance table and the employees it belongs to.

use crate::config::{Entity, SqlType, ATTENDANCE_TABLE};
use crate::sql::builder::{qualified_table, QueryBuf};
use crate::sql::SqlValue;
use chrono::NaiveDate;

/// Day rows of employee `$1` between `$2` and `$3` inclusive.
pub fn month_rows(schema: &str) -> QueryBuf {
    QueryBuf {
        sql: format!(
            "SELECT \"id\", \"date\", \"no_of_hours\", \"present\", \"holiday\" FROM {} \
             WHERE \"employee_id\" = $1::uuid AND \"date\" >= $2::date AND \"date\" <= $3::date \
             ORDER BY \"date\"",
            qualified_table(schema, ATTENDANCE_TABLE)
        ),
        params: Vec::new(),
    }
}

/// Insert or overwrite the row for (`$1` employee, `$2` date).
pub fn upsert_day(schema: &str) -> QueryBuf {
    QueryBuf {
        sql: format!(
            "INSERT INTO {} (\"employee_id\", \"date\", \"no_of_hours\", \"present\", \"holiday\") \
             VALUES ($1::uuid, $2::date, $3::bigint, $4::boolean, $5::boolean) \
             ON CONFLICT (\"employee_id\", \"date\") DO UPDATE SET \
             \"no_of_hours\" = EXCLUDED.\"no_of_hours\", \"present\" = EXCLUDED.\"present\", \
             \"holiday\" = EXCLUDED.\"holiday\", \"updated_at\" = NOW() RETURNING \"id\"",
            qualified_table(schema, ATTENDANCE_TABLE)
        ),
        params: Vec::new(),
    }
}

fn summary_filter(q: &mut QueryBuf, location: uuid::Uuid, search: Option<&str>) -> String {
    let mut clause = format!(
        "e.\"project_location_id\" = {}",
        q.placeholder(SqlValue::Uuid(location), SqlType::Uuid)
    );
    if let Some(s) = search {
        let ph = q.placeholder(SqlValue::Text(format!("%{}%", s)), SqlType::Text);
        clause.push_str(&format!(
            " AND (e.\"full_name\" ILIKE {ph} OR e.\"employee_code\" ILIKE {ph})"
        ));
    }
    clause
}

/// Per-employee totals for one location between `from` and `to`, one page.
pub fn location_summary(
    schema: &str,
    location: uuid::Uuid,
    from: NaiveDate,
    to: NaiveDate,
    search: Option<&str>,
    limit: u32,
    offset: u64,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let from = q.placeholder(SqlValue::Date(from), SqlType::Date);
    let to = q.placeholder(SqlValue::Date(to), SqlType::Date);
    let filter = summary_filter(&mut q, location, search);
    q.sql = format!(
        "SELECT e.\"id\" AS \"id\", e.\"full_name\" AS \"full_name\", e.\"employee_code\" AS \"employee_code\", \
         COUNT(a.\"id\") FILTER (WHERE a.\"present\") AS \"present_days\", \
         COUNT(a.\"id\") FILTER (WHERE a.\"holiday\") AS \"holidays\", \
         COALESCE(SUM(a.\"no_of_hours\"), 0)::bigint AS \"hours\" \
         FROM {} e LEFT JOIN {} a ON a.\"employee_id\" = e.\"id\" AND a.\"date\" >= {} AND a.\"date\" <= {} \
         WHERE {} GROUP BY e.\"id\" ORDER BY e.\"created_at\", e.\"id\" LIMIT {} OFFSET {}",
        qualified_table(schema, Entity::Employees.table()),
        qualified_table(schema, ATTENDANCE_TABLE),
        from,
        to,
        filter,
        limit,
        offset
    );
    q
}

/// Employee count for [`location_summary`].
pub fn location_summary_count(schema: &str, location: uuid::Uuid, search: Option<&str>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let filter = summary_filter(&mut q, location, search);
    q.sql = format!(
        "SELECT COUNT(*) AS \"count\" FROM {} e WHERE {}",
        qualified_table(schema, Entity::Employees.table()),
        filter
    );
    q
}

/// `id`, `employee_code`, `full_name` of the employees at location `$1`.
pub fn location_employees(schema: &str) -> QueryBuf {
    QueryBuf {
        sql: format!(
            "SELECT \"id\", \"employee_code\", \"full_name\" FROM {} WHERE \"project_location_id\" = $1::uuid \
             ORDER BY \"created_at\", \"id\"",
            qualified_table(schema, Entity::Employees.table())
        ),
        params: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_binds_range_before_location_and_search() {
        let from = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let id = uuid::Uuid::new_v4();
        let q = location_summary("hr", id, from, to, Some("ravi"), 10, 0);
        assert_eq!(q.params.len(), 4);
        assert_eq!(q.params[2], SqlValue::Uuid(id));
        assert!(q.sql.contains("e.\"project_location_id\" = $3::uuid"));
        assert!(q.sql.contains("e.\"full_name\" ILIKE $4::text OR e.\"employee_code\" ILIKE $4::text"));
        assert!(q.sql.ends_with("LIMIT 10 OFFSET 0"));

        let c = location_summary_count("hr", id, None);
        assert_eq!(c.params, vec![SqlValue::Uuid(id)]);
    }
}
