//! Generic CRUD execution against PostgreSQL.

use crate::config::{ColumnPath, ResolvedEntity, ResolvedModel, Storage, TableDef};
use crate::error::{not_found, AppError};
use crate::service::filter::{PageWindow, ReadQuery};
use crate::service::selector::{PreviousLinks, WritePayload};
use crate::sql::{
    count, delete, insert, link, linked_ids, select_column, select_detail, select_page, select_records, unlink,
    update, Predicate, QueryBuf, SqlValue,
};
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// One page of list rows plus the total for the same predicate.
#[derive(Debug)]
pub struct Page {
    pub rows: Vec<Value>,
    pub total: i64,
    pub window: PageWindow,
}

pub struct CrudService;

impl CrudService {
    /// List view rows for `query`, using the entity's list columns.
    pub async fn list(pool: &PgPool, entity: &ResolvedEntity, query: &ReadQuery) -> Result<Page, AppError> {
        Self::page(pool, entity, &entity.descriptor.list, &query.predicate, query.window).await
    }

    pub async fn page(
        pool: &PgPool,
        entity: &ResolvedEntity,
        columns: &[ColumnPath],
        predicate: &Predicate,
        window: PageWindow,
    ) -> Result<Page, AppError> {
        let q = select_page(entity, columns, predicate, Some(window.limit()), Some(window.offset()));
        let rows = Self::query_many(pool, &q).await?;
        let total = Self::count(pool, entity, predicate).await?;
        Ok(Page { rows, total, window })
    }

    /// Up to `limit` full records matching `predicate`, shaped like [`Self::read`]; used by exports.
    pub async fn records(
        pool: &PgPool,
        entity: &ResolvedEntity,
        predicate: &Predicate,
        limit: u32,
    ) -> Result<Vec<Value>, AppError> {
        let q = select_records(entity, predicate, limit);
        Self::query_many(pool, &q).await
    }

    pub async fn count(pool: &PgPool, entity: &ResolvedEntity, predicate: &Predicate) -> Result<i64, AppError> {
        let q = count(entity, predicate);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query_scalar::<_, i64>(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        Ok(query.fetch_one(pool).await?)
    }

    /// One record with relation labels, nested row and multi relations. `None` if missing.
    pub async fn read(pool: &PgPool, entity: &ResolvedEntity, id: Uuid) -> Result<Option<Value>, AppError> {
        let mut q = select_detail(entity);
        q.params.push(SqlValue::Uuid(id));
        Self::query_one(pool, &q).await
    }

    pub async fn read_or_404(pool: &PgPool, entity: &ResolvedEntity, id: Uuid) -> Result<Value, AppError> {
        Self::read(pool, entity, id)
            .await?
            .ok_or_else(|| not_found(entity.entity.singular()))
    }

    /// Currently connected targets of every multi relation of `id`.
    pub async fn previous_links(pool: &PgPool, entity: &ResolvedEntity, id: Uuid) -> Result<PreviousLinks, AppError> {
        let mut out = PreviousLinks::new();
        for f in &entity.descriptor.fields {
            if let Storage::JoinTable {
                table,
                owner_column,
                target_column,
                ..
            } = &f.storage
            {
                let q = linked_ids(&entity.schema_name, table, owner_column, target_column);
                tracing::debug!(sql = %q.sql, id = %id, "query");
                let ids: Vec<Uuid> = sqlx::query_scalar(&q.sql).bind(SqlValue::Uuid(id)).fetch_all(pool).await?;
                out.insert(f.name, ids);
            }
        }
        Ok(out)
    }

    /// Create (`id` None) or update one record from a write payload, in one transaction:
    /// nested rows, then the owner row, then join-table changes. Returns the record id.
    pub async fn write(
        pool: &PgPool,
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        id: Option<Uuid>,
        payload: &WritePayload,
    ) -> Result<Uuid, AppError> {
        let mut tx = pool.begin().await?;
        let id = Self::write_tx(&mut tx, model, entity, id, payload, false).await?;
        let id = id.ok_or_else(|| not_found(entity.entity.singular()))?;
        tx.commit().await?;
        tracing::info!(entity = entity.table_name(), id = %id, "record saved");
        Ok(id)
    }

    /// Insert many payloads in one transaction, skipping conflicting rows.
    /// Returns how many rows were inserted.
    pub async fn insert_many(
        pool: &PgPool,
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        payloads: &[WritePayload],
    ) -> Result<u64, AppError> {
        let mut tx = pool.begin().await?;
        let mut inserted = 0;
        for payload in payloads {
            if Self::write_tx(&mut tx, model, entity, None, payload, true).await?.is_some() {
                inserted += 1;
            }
        }
        tx.commit().await?;
        tracing::info!(entity = entity.table_name(), inserted, submitted = payloads.len(), "bulk insert");
        Ok(inserted)
    }

    async fn write_tx(
        conn: &mut PgConnection,
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        id: Option<Uuid>,
        payload: &WritePayload,
        skip_conflicts: bool,
    ) -> Result<Option<Uuid>, AppError> {
        let schema = entity.schema_name.as_str();
        let mut columns: Vec<(&str, SqlValue)> = payload.columns.iter().map(|(c, v)| (*c, v.clone())).collect();
        let mut created = Vec::new();

        for nested in &payload.nested {
            let table = model
                .table(nested.table)
                .ok_or_else(|| AppError::BadRequest(format!("unknown table {}", nested.table)))?;
            let mut existing = nested.existing_id;
            if existing.is_none() {
                if let Some(owner) = id {
                    let mut q = select_column(schema, entity.table_name(), nested.link_column);
                    q.params.push(SqlValue::Uuid(owner));
                    existing = Self::scalar_tx(conn, &q).await?;
                }
            }
            let nested_columns: Vec<(&str, SqlValue)> =
                nested.columns.iter().map(|(c, v)| (*c, v.clone())).collect();
            let nested_id = match existing {
                Some(nested_id) => {
                    let q = update(schema, table, nested_id, &nested_columns);
                    Self::scalar_tx(conn, &q).await?
                }
                None => None,
            };
            let nested_id = match nested_id {
                Some(n) => n,
                None => {
                    let q = insert(schema, table, &nested_columns, false);
                    let created_id = Self::scalar_tx(conn, &q)
                        .await?
                        .ok_or_else(|| AppError::BadRequest(format!("{} row not created", nested.relation)))?;
                    created.push((table, created_id));
                    created_id
                }
            };
            columns.retain(|(c, _)| *c != nested.link_column);
            columns.push((nested.link_column, SqlValue::Uuid(nested_id)));
        }

        let id = match id {
            Some(id) => Self::scalar_tx(conn, &update(schema, &entity.table, id, &columns)).await?,
            None => Self::scalar_tx(conn, &insert(schema, &entity.table, &columns, skip_conflicts)).await?,
        };
        let Some(id) = id else {
            // owner skipped on conflict
            for q in discard_created(schema, &created) {
                Self::execute_tx(conn, &q).await?;
            }
            return Ok(None);
        };

        for change in &payload.relations {
            for target in &change.connect {
                let mut q = link(schema, change.join_table, change.owner_column, change.target_column);
                q.params.extend([SqlValue::Uuid(id), SqlValue::Uuid(*target)]);
                Self::execute_tx(conn, &q).await?;
            }
            for target in &change.disconnect {
                let mut q = unlink(schema, change.join_table, change.owner_column, change.target_column);
                q.params.extend([SqlValue::Uuid(id), SqlValue::Uuid(*target)]);
                Self::execute_tx(conn, &q).await?;
            }
        }
        Ok(Some(id))
    }

    /// Delete by id; returns the removed row. 404 when missing.
    pub async fn delete(pool: &PgPool, entity: &ResolvedEntity, id: Uuid) -> Result<Value, AppError> {
        let mut q = delete(&entity.schema_name, &entity.table);
        q.params.push(SqlValue::Uuid(id));
        let row = Self::query_one(pool, &q)
            .await
            .map_err(|e| referenced(e, entity))?
            .ok_or_else(|| not_found(entity.entity.singular()))?;
        tracing::info!(entity = entity.table_name(), id = %id, "record deleted");
        Ok(row)
    }

    /// Delete every id in one transaction; returns the removed rows (missing ids are skipped).
    pub async fn bulk_delete(pool: &PgPool, entity: &ResolvedEntity, ids: &[Uuid]) -> Result<Vec<Value>, AppError> {
        let mut tx = pool.begin().await?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let mut q = delete(&entity.schema_name, &entity.table);
            q.params.push(SqlValue::Uuid(*id));
            let row = Self::query_one_tx(&mut tx, &q).await.map_err(|e| referenced(e, entity))?;
            out.extend(row);
        }
        tx.commit().await?;
        tracing::info!(entity = entity.table_name(), deleted = out.len(), "bulk delete");
        Ok(out)
    }

    async fn query_one(pool: &PgPool, q: &QueryBuf) -> Result<Option<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        let row = query.fetch_optional(pool).await?;
        Ok(row.map(|r| nest_dotted(row_to_json(&r))))
    }

    async fn query_many(pool: &PgPool, q: &QueryBuf) -> Result<Vec<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        let rows = query.fetch_all(pool).await?;
        Ok(rows.iter().map(|r| nest_dotted(row_to_json(r))).collect())
    }

    async fn query_one_tx(conn: &mut PgConnection, q: &QueryBuf) -> Result<Option<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query (tx)");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        let row = query.fetch_optional(&mut *conn).await?;
        Ok(row.map(|r| row_to_json(&r)))
    }

    /// First column of the first row as a uuid (`RETURNING "id"`, single-column selects).
    async fn scalar_tx(conn: &mut PgConnection, q: &QueryBuf) -> Result<Option<Uuid>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query (tx)");
        let mut query = sqlx::query_scalar::<_, Option<Uuid>>(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        Ok(query.fetch_optional(&mut *conn).await?.flatten())
    }

    async fn execute_tx(conn: &mut PgConnection, q: &QueryBuf) -> Result<u64, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query (tx)");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        Ok(query.execute(&mut *conn).await?.rows_affected())
    }
}

/// Foreign key violations on delete become a 400 naming the record kind.
fn referenced(e: AppError, entity: &ResolvedEntity) -> AppError {
    match &e {
        AppError::Db(sqlx::Error::Database(db)) if db.code().as_deref() == Some("23503") => AppError::BadRequest(
            format!("{} is still referenced by other records", entity.entity.singular()),
        ),
        _ => e,
    }
}

/// Turn `"a.b": v` keys into `{"a": {"b": v}}`. Existing scalar keys win over nested ones.
pub fn nest_dotted(row: Value) -> Value {
    let Value::Object(map) = row else { return row };
    let mut out = serde_json::Map::new();
    let mut dotted = Vec::new();
    for (k, v) in map {
        if k.contains('.') {
            dotted.push((k, v));
        } else {
            out.insert(k, v);
        }
    }
    for (k, v) in dotted {
        let parts: Vec<&str> = k.split('.').collect();
        insert_path(&mut out, &parts, v);
    }
    Value::Object(out)
}

fn insert_path(map: &mut serde_json::Map<String, Value>, parts: &[&str], v: Value) {
    match parts {
        [] => {}
        [leaf] => {
            map.insert(leaf.to_string(), v);
        }
        [head, rest @ ..] => {
            let slot = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
            if let Value::Object(inner) = slot {
                insert_path(inner, rest, v);
            }
        }
    }
}

fn row_to_json(row: &sqlx::postgres::PgRow) -> Value {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = serde_json::Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    Value::Object(map)
}

fn cell_to_value(row: &sqlx::postgres::PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        return serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null);
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}

/// Deletes for nested rows created for an owner row that was never written.
fn discard_created(schema: &str, created: &[(&TableDef, Uuid)]) -> Vec<QueryBuf> {
    created
        .iter()
        .map(|(table, id)| {
            let mut q = delete(schema, table);
            q.params.push(SqlValue::Uuid(*id));
            q
        })
        .collect()
}
