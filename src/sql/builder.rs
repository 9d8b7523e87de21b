//! Builds parameterized SELECT, INSERT, UPDATE, DELETE from resolved entities.

use crate::config::{
    ColumnPath, GroupKey, Hop, ResolvedEntity, SqlType, Storage, TableDef,
};
use crate::sql::predicate::{CompareOp, Predicate};
use crate::sql::SqlValue;

pub const MAIN_ALIAS: &str = "main";

/// Quote identifier for PostgreSQL (safe: only from config).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl QueryBuf {
    pub fn new() -> Self {
        QueryBuf::default()
    }

    fn push_param(&mut self, v: SqlValue) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }

    /// Bind `v` and return its placeholder cast to `ty` (`$3::date`).
    pub fn placeholder(&mut self, v: SqlValue, ty: SqlType) -> String {
        let n = self.push_param(v);
        format!("${}::{}", n, ty.pg_name())
    }
}

/// LEFT JOINs registered while rendering a query, one alias per relation chain.
struct JoinPlan<'a> {
    schema: &'a str,
    joins: Vec<(Vec<&'static str>, String, String)>,
}

impl<'a> JoinPlan<'a> {
    fn new(schema: &'a str) -> Self {
        JoinPlan {
            schema,
            joins: Vec::new(),
        }
    }

    /// Alias of the table reached through `hops`, joining intermediate tables as needed.
    fn alias_for(&mut self, hops: &[Hop]) -> String {
        let mut parent = MAIN_ALIAS.to_string();
        for depth in 1..=hops.len() {
            let chain: Vec<&'static str> = hops[..depth].iter().map(|h| h.relation).collect();
            if let Some((_, alias, _)) = self.joins.iter().find(|(c, _, _)| *c == chain) {
                parent = alias.clone();
                continue;
            }
            let hop = hops[depth - 1];
            let alias = format!("j{}", self.joins.len() + 1);
            let sql = format!(
                " LEFT JOIN {} {} ON {}.\"id\" = {}.{}",
                qualified_table(self.schema, hop.table),
                alias,
                alias,
                parent,
                quoted(hop.fk)
            );
            self.joins.push((chain, alias.clone(), sql));
            parent = alias;
        }
        parent
    }

    fn column(&mut self, path: &ColumnPath) -> String {
        format!("{}.{}", self.alias_for(&path.hops), quoted(path.column))
    }

    fn sql(&self) -> String {
        self.joins.iter().map(|(_, _, s)| s.as_str()).collect()
    }
}

/// Escape LIKE wildcards so user text matches literally.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn render_predicate(p: &Predicate, plan: &mut JoinPlan<'_>, q: &mut QueryBuf) -> String {
    match p {
        Predicate::And(parts) if parts.is_empty() => "TRUE".to_string(),
        Predicate::Or(parts) if parts.is_empty() => "FALSE".to_string(),
        Predicate::And(parts) | Predicate::Or(parts) => {
            let joiner = if matches!(p, Predicate::And(_)) { " AND " } else { " OR " };
            let rendered: Vec<String> = parts
                .iter()
                .map(|part| format!("({})", render_predicate(part, plan, q)))
                .collect();
            rendered.join(joiner)
        }
        Predicate::Compare {
            path,
            op,
            value,
            value_type,
        } => {
            let expr = plan.column(path);
            match op {
                CompareOp::Contains => {
                    let text = value.as_text().unwrap_or_default();
                    let ph = q.placeholder(
                        SqlValue::Text(format!("%{}%", escape_like(&text))),
                        SqlType::Text,
                    );
                    format!("{}::text ILIKE {}", expr, ph)
                }
                CompareOp::Eq => format!("{} = {}", expr, q.placeholder(value.clone(), *value_type)),
                CompareOp::Gte => format!("{} >= {}", expr, q.placeholder(value.clone(), *value_type)),
            }
        }
        Predicate::Linked {
            join_table,
            row_column,
            parent_column,
            parent_id,
        } => {
            let ph = q.placeholder(SqlValue::Uuid(*parent_id), SqlType::Uuid);
            format!(
                "EXISTS (SELECT 1 FROM {} l WHERE l.{} = {}.\"id\" AND l.{} = {})",
                qualified_table(plan.schema, join_table),
                quoted(row_column),
                MAIN_ALIAS,
                quoted(parent_column),
                ph
            )
        }
    }
}

fn where_clause(rendered: &str) -> String {
    if rendered == "TRUE" {
        String::new()
    } else {
        format!(" WHERE {}", rendered)
    }
}

/// SELECT one page of rows: id plus each column path keyed by [`ColumnPath::key`],
/// filtered by `predicate`. Ordered by the entity's sort, then `created_at, id`.
pub fn select_page(
    entity: &ResolvedEntity,
    columns: &[ColumnPath],
    predicate: &Predicate,
    limit: Option<u32>,
    offset: Option<u64>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut plan = JoinPlan::new(&entity.schema_name);
    let mut select_parts = vec![format!("{}.\"id\" AS \"id\"", MAIN_ALIAS)];
    for path in columns {
        select_parts.push(format!("{} AS {}", plan.column(path), quoted(&path.key())));
    }
    let rendered = render_predicate(predicate, &mut plan, &mut q);

    let limit_clause = limit.map(|n| format!(" LIMIT {}", n.min(1000))).unwrap_or_default();
    let offset_clause = offset.map(|n| format!(" OFFSET {}", n)).unwrap_or_default();
    q.sql = format!(
        "SELECT {} FROM {} {}{}{} ORDER BY {}{}{}",
        select_parts.join(", "),
        qualified_table(&entity.schema_name, entity.table_name()),
        MAIN_ALIAS,
        plan.sql(),
        where_clause(&rendered),
        order_by(entity),
        limit_clause,
        offset_clause
    );
    q
}

/// The entity's declared sort, then `created_at, id`.
fn order_by(entity: &ResolvedEntity) -> String {
    let mut parts: Vec<String> = entity
        .descriptor
        .order
        .iter()
        .map(|o| {
            format!(
                "{}.{} {}",
                MAIN_ALIAS,
                quoted(o.column),
                if o.descending { "DESC" } else { "ASC" }
            )
        })
        .collect();
    parts.push(format!("{}.\"created_at\"", MAIN_ALIAS));
    parts.push(format!("{}.\"id\"", MAIN_ALIAS));
    parts.join(", ")
}

/// SELECT COUNT(*) AS "count" for the same predicate as [`select_page`].
pub fn count(entity: &ResolvedEntity, predicate: &Predicate) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut plan = JoinPlan::new(&entity.schema_name);
    let rendered = render_predicate(predicate, &mut plan, &mut q);
    q.sql = format!(
        "SELECT COUNT(*) AS \"count\" FROM {} {}{}{}",
        qualified_table(&entity.schema_name, entity.table_name()),
        MAIN_ALIAS,
        plan.sql(),
        where_clause(&rendered)
    );
    q
}

/// SELECT one record by id ($1): every own column, single relations with their
/// label, the nested 1:1 row's columns, and multi relations as `[{id, label}]`.
pub fn select_detail(entity: &ResolvedEntity) -> QueryBuf {
    let schema = entity.schema_name.as_str();
    let mut plan = JoinPlan::new(schema);
    let select_parts = record_columns(entity, &mut plan);
    QueryBuf {
        sql: format!(
            "SELECT {} FROM {} {}{} WHERE {}.\"id\" = $1::uuid",
            select_parts.join(", "),
            qualified_table(schema, entity.table_name()),
            MAIN_ALIAS,
            plan.sql(),
            MAIN_ALIAS
        ),
        params: Vec::new(),
    }
}

/// SELECT up to `limit` full records matching `predicate`, shaped like
/// [`select_detail`] and ordered like [`select_page`].
pub fn select_records(entity: &ResolvedEntity, predicate: &Predicate, limit: u32) -> QueryBuf {
    let mut q = QueryBuf::new();
    let schema = entity.schema_name.as_str();
    let mut plan = JoinPlan::new(schema);
    let select_parts = record_columns(entity, &mut plan);
    let rendered = render_predicate(predicate, &mut plan, &mut q);
    q.sql = format!(
        "SELECT {} FROM {} {}{}{} ORDER BY {} LIMIT {}",
        select_parts.join(", "),
        qualified_table(schema, entity.table_name()),
        MAIN_ALIAS,
        plan.sql(),
        where_clause(&rendered),
        order_by(entity),
        limit.min(1000)
    );
    q
}

fn record_columns(entity: &ResolvedEntity, plan: &mut JoinPlan<'_>) -> Vec<String> {
    let schema = entity.schema_name.as_str();
    let mut select_parts: Vec<String> = entity
        .table
        .columns
        .iter()
        .map(|c| format!("{}.{} AS {}", MAIN_ALIAS, quoted(&c.name), quoted(&c.name)))
        .collect();

    for f in &entity.descriptor.fields {
        match &f.storage {
            Storage::ForeignKey { column, target, label } => {
                let relation = f.relation.unwrap_or(f.name);
                let path = ColumnPath::via(&[Hop::new(relation, target, column)], label);
                select_parts.push(format!("{} AS {}", plan.column(&path), quoted(&path.key())));
            }
            Storage::Nested {
                relation,
                table,
                link_column,
                column: Some((name, _)),
            } => {
                let path = ColumnPath::via(&[Hop::new(relation, table, link_column)], name);
                select_parts.push(format!("{} AS {}", plan.column(&path), quoted(&path.key())));
            }
            Storage::JoinTable {
                table,
                owner_column,
                target_column,
                target,
                label,
            } => {
                let sub = format!(
                    "(SELECT COALESCE(json_agg(json_build_object('id', t.\"id\", '{}', t.{}) ORDER BY t.{}), '[]'::json) \
                     FROM {} jt JOIN {} t ON t.\"id\" = jt.{} WHERE jt.{} = {}.\"id\")",
                    label,
                    quoted(label),
                    quoted(label),
                    qualified_table(schema, table),
                    qualified_table(schema, target),
                    quoted(target_column),
                    quoted(owner_column),
                    MAIN_ALIAS
                );
                select_parts.push(format!("{} AS {}", sub, quoted(f.relation.unwrap_or(f.name))));
            }
            _ => {}
        }
    }
    select_parts
}

/// INSERT the given columns and return the new id. An empty column list inserts
/// defaults only. With `skip_conflicts`, duplicates are ignored (no row returned).
pub fn insert(
    schema: &str,
    table: &TableDef,
    columns: &[(&str, SqlValue)],
    skip_conflicts: bool,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let target = qualified_table(schema, &table.name);
    let conflict = if skip_conflicts { " ON CONFLICT DO NOTHING" } else { "" };
    if columns.is_empty() {
        q.sql = format!("INSERT INTO {} DEFAULT VALUES{} RETURNING \"id\"", target, conflict);
        return q;
    }
    let mut cols = Vec::with_capacity(columns.len());
    let mut placeholders = Vec::with_capacity(columns.len());
    for (name, value) in columns {
        cols.push(quoted(name));
        placeholders.push(q.placeholder(value.clone(), table.sql_type(name)));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}){} RETURNING \"id\"",
        target,
        cols.join(", "),
        placeholders.join(", "),
        conflict
    );
    q
}

/// UPDATE by id: SET the given columns and `updated_at`. Returns the id when the row exists.
pub fn update(schema: &str, table: &TableDef, id: uuid::Uuid, columns: &[(&str, SqlValue)]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets: Vec<String> = columns
        .iter()
        .filter(|(name, _)| *name != "id")
        .map(|(name, value)| {
            format!("{} = {}", quoted(name), q.placeholder(value.clone(), table.sql_type(name)))
        })
        .collect();
    sets.push(format!("{} = NOW()", quoted("updated_at")));
    let id_ph = q.placeholder(SqlValue::Uuid(id), SqlType::Uuid);
    q.sql = format!(
        "UPDATE {} SET {} WHERE \"id\" = {} RETURNING \"id\"",
        qualified_table(schema, &table.name),
        sets.join(", "),
        id_ph
    );
    q
}

/// DELETE by id ($1), returning every column of the removed row.
pub fn delete(schema: &str, table: &TableDef) -> QueryBuf {
    let returning = table
        .columns
        .iter()
        .map(|c| quoted(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    QueryBuf {
        sql: format!(
            "DELETE FROM {} WHERE \"id\" = $1::uuid RETURNING {}",
            qualified_table(schema, &table.name),
            returning
        ),
        params: Vec::new(),
    }
}

/// One column of row `$1`, as "value".
pub fn select_column(schema: &str, table: &str, column: &str) -> QueryBuf {
    QueryBuf {
        sql: format!(
            "SELECT {} AS \"value\" FROM {} WHERE \"id\" = $1::uuid",
            quoted(column),
            qualified_table(schema, table)
        ),
        params: Vec::new(),
    }
}

/// Connect `$1` (owner) to `$2` (target) in a join table; existing links are kept.
pub fn link(schema: &str, join_table: &str, owner_column: &str, target_column: &str) -> QueryBuf {
    QueryBuf {
        sql: format!(
            "INSERT INTO {} ({}, {}) VALUES ($1::uuid, $2::uuid) ON CONFLICT DO NOTHING",
            qualified_table(schema, join_table),
            quoted(owner_column),
            quoted(target_column)
        ),
        params: Vec::new(),
    }
}

/// Disconnect `$1` (owner) from `$2` (target).
pub fn unlink(schema: &str, join_table: &str, owner_column: &str, target_column: &str) -> QueryBuf {
    QueryBuf {
        sql: format!(
            "DELETE FROM {} WHERE {} = $1::uuid AND {} = $2::uuid",
            qualified_table(schema, join_table),
            quoted(owner_column),
            quoted(target_column)
        ),
        params: Vec::new(),
    }
}

/// Target ids linked to owner `$1`, as column "id".
pub fn linked_ids(schema: &str, join_table: &str, owner_column: &str, target_column: &str) -> QueryBuf {
    QueryBuf {
        sql: format!(
            "SELECT {} AS \"id\" FROM {} WHERE {} = $1::uuid",
            quoted(target_column),
            qualified_table(schema, join_table),
            quoted(owner_column)
        ),
        params: Vec::new(),
    }
}

/// Picker options of a table: `id`, `label` and, when grouped, `group`,
/// most recently updated first.
pub fn select_options(
    schema: &str,
    table: &str,
    label: &str,
    group: Option<&GroupKey>,
    limit: Option<u32>,
) -> QueryBuf {
    let mut select_parts = vec![
        "t.\"id\" AS \"id\"".to_string(),
        format!("t.{} AS \"label\"", quoted(label)),
    ];
    let mut join = String::new();
    match group {
        Some(GroupKey { via: Some(hop), column }) => {
            join = format!(
                " LEFT JOIN {} g ON g.\"id\" = t.{}",
                qualified_table(schema, hop.table),
                quoted(hop.fk)
            );
            select_parts.push(format!("g.{} AS \"group\"", quoted(column)));
        }
        Some(GroupKey { via: None, column }) => {
            select_parts.push(format!("t.{} AS \"group\"", quoted(column)));
        }
        None => {}
    }
    let limit_clause = limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    QueryBuf {
        sql: format!(
            "SELECT {} FROM {} t{} ORDER BY t.\"updated_at\" DESC, t.\"id\"{}",
            select_parts.join(", "),
            qualified_table(schema, table),
            join,
            limit_clause
        ),
        params: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, Entity};
    use crate::service::filter::PageWindow;

    fn model() -> crate::config::ResolvedModel {
        resolve("hr").unwrap()
    }

    #[test]
    fn page_joins_each_relation_chain_once() {
        let m = model();
        let e = m.entity(Entity::Employees);
        let q = select_page(e, &e.descriptor.list, &Predicate::all(), Some(12), Some(24));
        assert_eq!(q.sql.matches("LEFT JOIN").count(), 1);
        assert!(q.sql.contains("j1.\"city\" AS \"project_location.city\""));
        assert!(q.sql.ends_with("ORDER BY main.\"created_at\", main.\"id\" LIMIT 12 OFFSET 24"));
        assert!(!q.sql.contains("WHERE"));
    }

    #[test]
    fn pages_beyond_the_end_render_a_large_offset() {
        let m = model();
        let e = m.entity(Entity::Vehicles);
        let window = PageWindow::new(u32::MAX, 12);
        let q = select_page(e, &e.descriptor.list, &Predicate::all(), Some(window.limit()), Some(window.offset()));
        assert!(q.sql.ends_with(&format!("LIMIT 12 OFFSET {}", u64::from(u32::MAX - 1) * 12)));
    }

    #[test]
    fn search_shares_joins_across_hops() {
        let m = model();
        let e = m.entity(Entity::Employees);
        let search = Predicate::Or(
            e.descriptor
                .search
                .iter()
                .map(|path| Predicate::Compare {
                    path: path.clone(),
                    op: CompareOp::Contains,
                    value: SqlValue::from("pune"),
                    value_type: SqlType::Text,
                })
                .collect(),
        );
        let q = count(e, &search);
        // project_location, then project, then company
        assert_eq!(q.sql.matches("LEFT JOIN").count(), 3);
        assert_eq!(q.params.len(), 6);
        assert_eq!(q.params[0], SqlValue::Text("%pune%".into()));
        assert!(q.sql.contains(" OR "));
        assert!(q.sql.contains("ILIKE $6::text"));
    }

    #[test]
    fn ordering_puts_declared_sort_first() {
        let m = model();
        let e = m.entity(Entity::PaymentFields);
        let q = select_page(e, &e.descriptor.list, &Predicate::all(), None, None);
        assert!(q.sql.contains("ORDER BY main.\"type\" ASC, main.\"created_at\", main.\"id\""));
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_a\\b"), "50\\%\\_a\\\\b");
    }

    #[test]
    fn equality_casts_to_value_type() {
        let m = model();
        let e = m.entity(Entity::Advances);
        let p = Predicate::Compare {
            path: ColumnPath::own("credited"),
            op: CompareOp::Eq,
            value: SqlValue::Bool(true),
            value_type: SqlType::Boolean,
        };
        let q = count(e, &p);
        assert!(q.sql.ends_with("WHERE main.\"credited\" = $1::boolean"));
    }

    #[test]
    fn detail_aggregates_multi_relations() {
        let m = model();
        let e = m.entity(Entity::ProjectLocations);
        let q = select_detail(e);
        assert!(q.sql.contains("json_agg"));
        assert!(q.sql.contains("AS \"payment_field\""));
        assert!(q.sql.contains("AS \"project.name\""));
        assert!(q.sql.ends_with("WHERE main.\"id\" = $1::uuid"));
    }

    #[test]
    fn export_records_carry_nested_rows_and_share_filter_joins() {
        let m = model();
        let e = m.entity(Entity::Employees);
        let city = Predicate::Compare {
            path: ColumnPath::via(&[Hop::new("project_location", "project_locations", "project_location_id")], "city"),
            op: CompareOp::Contains,
            value: SqlValue::from("pune"),
            value_type: SqlType::Text,
        };
        let q = select_records(e, &city, 150);
        assert!(q.sql.contains("AS \"bank_detail.account_number\""));
        assert!(q.sql.contains("AS \"bank_detail.ifsc_code\""));
        assert!(q.sql.contains("AS \"project_location.city\""));
        assert!(q.sql.contains("main.\"employee_code\" AS \"employee_code\""));
        // project_location and bank_detail only
        assert_eq!(q.sql.matches("LEFT JOIN").count(), 2);
        assert!(q.sql.contains("WHERE j1.\"city\"::text ILIKE $1::text"));
        assert!(q.sql.ends_with("ORDER BY main.\"created_at\", main.\"id\" LIMIT 150"));
        assert_eq!(q.params, vec![SqlValue::Text("%pune%".into())]);
    }

    #[test]
    fn update_touches_updated_at_and_binds_id_last() {
        let m = model();
        let t = &m.entity(Entity::Companies).table;
        let id = uuid::Uuid::new_v4();
        let q = update("hr", t, id, &[("name", SqlValue::from("Acme")), ("service_charge", SqlValue::Float(5.0))]);
        assert_eq!(
            q.sql,
            "UPDATE \"hr\".\"companies\" SET \"name\" = $1::text, \"service_charge\" = $2::double precision, \
             \"updated_at\" = NOW() WHERE \"id\" = $3::uuid RETURNING \"id\""
        );
        assert_eq!(q.params[2], SqlValue::Uuid(id));
    }

    #[test]
    fn grouped_options_join_through_hop() {
        let m = model();
        let field = m.entity(Entity::Advances).descriptor.field("employee").unwrap().clone();
        let Some(crate::config::OptionSource::Table { table, label, group }) = field.options else {
            panic!("expected table options");
        };
        let q = select_options("hr", table, label, group.as_ref(), Some(150));
        assert!(q.sql.contains("LEFT JOIN \"hr\".\"project_locations\" g ON g.\"id\" = t.\"project_location_id\""));
        assert!(q.sql.contains("g.\"project_id\" AS \"group\""));
        assert!(q.sql.ends_with("LIMIT 150"));
    }
}
