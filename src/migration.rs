//! Idempotent DDL generated from the resolved model: schema, tables in
//! dependency order with their keys and constraints, then seed rows.

use crate::config::{ColumnInfo, OnDelete, ResolvedModel, TableDef};
use crate::error::AppError;
use crate::sql::{qualified_table, quoted};
use sqlx::PgPool;

fn on_delete_sql(action: OnDelete) -> &'static str {
    match action {
        OnDelete::Restrict => "RESTRICT",
        OnDelete::SetNull => "SET NULL",
        OnDelete::Cascade => "CASCADE",
    }
}

fn column_sql(schema: &str, c: &ColumnInfo) -> String {
    let mut def = format!("{} {}", quoted(&c.name), c.sql_type.pg_name());
    if !c.nullable {
        def.push_str(" NOT NULL");
    }
    if let Some(expr) = c.default {
        def.push_str(" DEFAULT ");
        def.push_str(expr);
    }
    if let Some(r) = &c.references {
        def.push_str(&format!(
            " REFERENCES {} (\"id\") ON DELETE {}",
            qualified_table(schema, &r.table),
            on_delete_sql(r.on_delete)
        ));
    }
    def
}

/// `CREATE TABLE IF NOT EXISTS` for one table. Tables with an `id` column use it
/// as primary key; join tables are keyed by their unique pair.
pub fn create_table_sql(schema: &str, table: &TableDef) -> String {
    let mut defs: Vec<String> = table.columns.iter().map(|c| column_sql(schema, c)).collect();
    if table.column("id").is_some() {
        defs.push("PRIMARY KEY (\"id\")".to_string());
    }
    for cols in &table.unique {
        let cols: Vec<String> = cols.iter().map(|c| quoted(c)).collect();
        defs.push(format!("UNIQUE ({})", cols.join(", ")));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        qualified_table(schema, &table.name),
        defs.join(", ")
    )
}

/// Insert statement for one seed row; existing rows are left alone.
pub fn seed_sql(schema: &str, table: &TableDef, row: &[(&str, &str)]) -> String {
    let cols: Vec<String> = row.iter().map(|(c, _)| quoted(c)).collect();
    let values: Vec<String> = row
        .iter()
        .enumerate()
        .map(|(i, (c, _))| format!("${}::{}", i + 1, table.sql_type(c).pg_name()))
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT DO NOTHING",
        qualified_table(schema, &table.name),
        cols.join(", "),
        values.join(", ")
    )
}

/// Create the schema and every table of the model, then insert seed rows.
/// Safe to run on every start.
pub async fn apply_migrations(pool: &PgPool, model: &ResolvedModel) -> Result<(), AppError> {
    let schema = &model.schema_name;
    sqlx::query("CREATE EXTENSION IF NOT EXISTS pgcrypto").execute(pool).await?;
    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(schema)))
        .execute(pool)
        .await?;

    for table in &model.tables {
        let sql = create_table_sql(schema, table);
        tracing::debug!(sql = %sql, "ddl");
        sqlx::query(&sql).execute(pool).await?;
    }

    let mut seeded = 0u64;
    for table in &model.tables {
        for row in &table.seed {
            let sql = seed_sql(schema, table, row);
            let mut query = sqlx::query(&sql);
            for (_, value) in row {
                query = query.bind(*value);
            }
            seeded += query.execute(pool).await?.rows_affected();
        }
    }
    tracing::info!(schema = %schema, tables = model.tables.len(), seeded, "migrations applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, Entity};

    #[test]
    fn attendance_table_is_unique_per_employee_day() {
        let model = resolve("hr").unwrap();
        let table = model.table("attendances").unwrap();
        let sql = create_table_sql("hr", table);
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"hr\".\"attendances\" ("));
        assert!(sql.contains("\"employee_id\" uuid NOT NULL REFERENCES \"hr\".\"employees\" (\"id\") ON DELETE CASCADE"));
        assert!(sql.contains("UNIQUE (\"employee_id\", \"date\")"));
        assert!(sql.contains("PRIMARY KEY (\"id\")"));
    }

    #[test]
    fn optional_references_are_nulled_on_delete() {
        let model = resolve("public").unwrap();
        let documents = create_table_sql("public", &model.entity(Entity::Documents).table);
        assert!(documents.contains("\"company_id\" uuid REFERENCES \"public\".\"companies\" (\"id\") ON DELETE SET NULL"));
        let projects = create_table_sql("public", &model.entity(Entity::Projects).table);
        assert!(projects.contains("\"company_id\" uuid NOT NULL REFERENCES \"public\".\"companies\" (\"id\") ON DELETE RESTRICT"));
    }

    #[test]
    fn join_tables_have_no_surrogate_key() {
        let model = resolve("public").unwrap();
        let sql = create_table_sql("public", model.table("project_location_payment_fields").unwrap());
        assert!(!sql.contains("PRIMARY KEY"));
        assert!(sql.contains("UNIQUE ("));
    }

    #[test]
    fn seeds_ignore_conflicts() {
        let model = resolve("public").unwrap();
        let roles = model.table("user_roles").unwrap();
        assert!(!roles.seed.is_empty());
        assert_eq!(
            seed_sql("public", roles, &[("name", "client admin")]),
            "INSERT INTO \"public\".\"user_roles\" (\"name\") VALUES ($1::text) ON CONFLICT DO NOTHING"
        );
    }
}
