//! Option lists for pickers: static values, recent years, or rows of a related table.

use crate::config::{EntityDescriptor, FilterPicker, OptionSource};
use crate::error::AppError;
use crate::service::coerce::current_year;
use crate::sql::select_options;
use serde::Serialize;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use uuid::Uuid;

/// Rows offered by a relation picker.
pub const OPTION_LIMIT: u32 = 150;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OptionItem {
    pub value: String,
    pub label: String,
    /// Grouping key compared against the parent field's value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl OptionItem {
    pub fn plain(value: &str) -> Self {
        OptionItem {
            value: value.to_string(),
            label: value.to_string(),
            group: None,
        }
    }
}

/// Options per field (or filter) name.
pub type OptionSets = HashMap<&'static str, Vec<OptionItem>>;

pub async fn load(pool: &PgPool, schema: &str, source: &OptionSource) -> Result<Vec<OptionItem>, AppError> {
    match source {
        OptionSource::Static(values) => Ok(values.iter().map(|v| OptionItem::plain(v)).collect()),
        OptionSource::RecentYears(n) => {
            let year = current_year();
            Ok((0..*n as i32).map(|i| OptionItem::plain(&(year - i).to_string())).collect())
        }
        OptionSource::Table { table, label, group } => {
            let q = select_options(schema, table, label, group.as_ref(), Some(OPTION_LIMIT));
            tracing::debug!(sql = %q.sql, "query");
            let rows = sqlx::query(&q.sql).fetch_all(pool).await?;
            let mut out = Vec::with_capacity(rows.len());
            for row in rows {
                let id: Uuid = row.try_get("id")?;
                let label: Option<String> = row.try_get("label")?;
                let group: Option<Uuid> = if group.is_some() { row.try_get("group")? } else { None };
                out.push(OptionItem {
                    value: id.to_string(),
                    label: label.unwrap_or_default(),
                    group: group.map(|g| g.to_string()),
                });
            }
            Ok(out)
        }
    }
}

/// Options of every form field that has a source.
pub async fn for_fields(pool: &PgPool, schema: &str, descriptor: &EntityDescriptor) -> Result<OptionSets, AppError> {
    let mut out = OptionSets::new();
    for f in &descriptor.fields {
        if let Some(source) = &f.options {
            out.insert(f.name, load(pool, schema, source).await?);
        }
    }
    Ok(out)
}

/// Options of every filter with a picker list. Relation filters compare labels,
/// so their values are the labels themselves.
pub async fn for_filters(pool: &PgPool, schema: &str, descriptor: &EntityDescriptor) -> Result<OptionSets, AppError> {
    let mut out = OptionSets::new();
    for filter in &descriptor.filters {
        if let FilterPicker::Options(source) = &filter.picker {
            let items = load(pool, schema, source).await?;
            let items = match source {
                OptionSource::Table { .. } => items.into_iter().map(|o| OptionItem::plain(&o.label)).collect(),
                _ => items,
            };
            out.insert(filter.name, items);
        }
    }
    Ok(out)
}

/// Lowercased label → id over the whole table; used to resolve imported references.
pub async fn title_index(pool: &PgPool, schema: &str, table: &str, label: &str) -> Result<HashMap<String, Uuid>, AppError> {
    let q = select_options(schema, table, label, None, None);
    tracing::debug!(sql = %q.sql, "query");
    let rows = sqlx::query(&q.sql).fetch_all(pool).await?;
    let mut out = HashMap::with_capacity(rows.len());
    for row in rows {
        let id: Uuid = row.try_get("id")?;
        let label: Option<String> = row.try_get("label")?;
        if let Some(label) = label {
            out.entry(label.trim().to_lowercase()).or_insert(id);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_and_year_sources_need_no_database() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://unused@localhost/unused")
            .unwrap();
        let states = load(&pool, "hr", &OptionSource::Static(&["Goa", "Assam"])).await.unwrap();
        assert_eq!(states[1], OptionItem::plain("Assam"));

        let years = load(&pool, "hr", &OptionSource::RecentYears(35)).await.unwrap();
        assert_eq!(years.len(), 35);
        assert_eq!(years[0].value, current_year().to_string());
        assert_eq!(years[34].value, (current_year() - 34).to_string());
    }
}
