//! Entity list, export, bulk delete, detail, tabs and delete handlers.

use crate::config::{ColumnPath, SqlType, Storage, TabTarget};
use crate::error::AppError;
use crate::extractors::Submitted;
use crate::handlers::{entity_for, file_url, flag, parse_id, remove_files, stored_files};
use crate::render::detail::render_detail;
use crate::render::list::{render_list, Pagination};
use crate::render::table::{render_table, TableOptions};
use crate::response::{csv_attachment, see_other, success_one, success_with_meta, PageMeta};
use crate::service::csv_io;
use crate::service::filter::{QueryFilterBuilder, PAGE_SIZE, TAB_PAGE_SIZE};
use crate::service::options;
use crate::service::CrudService;
use crate::sql::{CompareOp, Predicate, SqlValue};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// GET /:entity: list view, or the CSV export with `?export=true`.
pub async fn list(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let entity = entity_for(&state, &segment)?;
    let descriptor = &entity.descriptor;
    let query = QueryFilterBuilder::build(descriptor, &params, PAGE_SIZE);

    if flag(&params, "export") {
        if !entity.entity.import_export() {
            return Err(AppError::BadRequest(format!("{} cannot be exported", entity.table_name())));
        }
        let bytes = csv_io::export_entity(&state.pool, entity, &query.predicate).await?;
        return Ok(csv_attachment(&format!("{}.csv", entity.table_name()), bytes));
    }

    let page = CrudService::list(&state.pool, entity, &query).await?;
    let table = render_table(
        &page.rows,
        &TableOptions::new(descriptor.entity.route(), page.window.page, page.window.size),
    );
    let filter_options = options::for_filters(&state.pool, &entity.schema_name, descriptor).await?;
    let pagination = Pagination::new(page.window, page.total);
    let meta = PageMeta {
        count: page.total,
        page: page.window.page,
        page_size: page.window.size,
        last_page: pagination.last_page,
    };
    let view = render_list(descriptor, table, &filter_options, &params, query.search.clone(), pagination);
    Ok(success_with_meta(view, meta).into_response())
}

/// POST /:entity: delete every submitted `id` in one transaction.
pub async fn bulk_delete(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    Submitted(input): Submitted,
) -> Result<Response, AppError> {
    let entity = entity_for(&state, &segment)?;
    let ids = input
        .texts("id")
        .into_iter()
        .filter(|s| !s.trim().is_empty())
        .map(parse_id)
        .collect::<Result<Vec<_>, _>>()?;
    if ids.is_empty() {
        return Err(AppError::BadRequest("no records selected".into()));
    }
    let deleted = CrudService::bulk_delete(&state.pool, entity, &ids).await?;
    let files = stored_files(entity, &deleted);
    remove_files(&state, files).await;
    Ok(see_other(&format!("/{}", entity.descriptor.entity.route())))
}

/// GET /:entity/:id
pub async fn detail(
    State(state): State<AppState>,
    Path((segment, id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let entity = entity_for(&state, &segment)?;
    let id = parse_id(&id)?;
    let record = CrudService::read_or_404(&state.pool, entity, id).await?;
    Ok(success_one(render_detail(&entity.descriptor, &record)).into_response())
}

/// GET /:entity/:id/:tab: child records, or the targets of a multi relation.
pub async fn tab_list(
    State(state): State<AppState>,
    Path((segment, id, tab)): Path<(String, String, String)>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let parent = entity_for(&state, &segment)?;
    let tab_def = parent
        .descriptor
        .tab(&tab)
        .ok_or_else(|| AppError::NotFound(format!("{} has no tab {}", parent.entity.singular(), tab)))?;
    let id = parse_id(&id)?;

    let (child, link) = match &tab_def.target {
        TabTarget::Child { entity, fk } => (
            *entity,
            Predicate::Compare {
                path: ColumnPath::own(*fk),
                op: CompareOp::Eq,
                value: SqlValue::Uuid(id),
                value_type: SqlType::Uuid,
            },
        ),
        TabTarget::Multi { entity, field } => {
            let Some(Storage::JoinTable {
                table,
                owner_column,
                target_column,
                ..
            }) = parent.descriptor.field(field).map(|f| &f.storage)
            else {
                return Err(AppError::NotFound(format!("{} has no tab {}", parent.entity.singular(), tab)));
            };
            (
                *entity,
                Predicate::Linked {
                    join_table: *table,
                    row_column: *target_column,
                    parent_column: *owner_column,
                    parent_id: id,
                },
            )
        }
        TabTarget::Attendance => {
            return Ok(see_other(&format!("/{}/{}/attendance", parent.entity.route(), id)));
        }
    };

    let child = state.model.entity(child);
    let query = QueryFilterBuilder::build(&child.descriptor, &params, TAB_PAGE_SIZE);
    let predicate = Predicate::and(vec![link, query.predicate]);
    let page = CrudService::page(&state.pool, child, &child.descriptor.list, &predicate, query.window).await?;
    let table = render_table(
        &page.rows,
        &TableOptions::new(child.entity.route(), page.window.page, page.window.size),
    );
    Ok(success_one(TabView {
        parent: parent.entity.route(),
        parent_id: id.to_string(),
        tab: tab_def.name,
        add: matches!(tab_def.target, TabTarget::Child { .. })
            .then(|| format!("/{}/{}/{}/add", parent.entity.route(), id, tab_def.name)),
        table,
        pagination: Pagination::new(page.window, page.total),
    })
    .into_response())
}

#[derive(Serialize)]
pub struct TabView {
    pub parent: &'static str,
    pub parent_id: String,
    pub tab: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add: Option<String>,
    pub table: crate::render::TableView,
    pub pagination: Pagination,
}

#[derive(Serialize)]
pub struct DeleteView {
    pub entity: &'static str,
    pub id: String,
    pub title: String,
    pub action: String,
    pub cancel: String,
}

/// GET /:entity/:id/delete: confirmation.
pub async fn delete_view(
    State(state): State<AppState>,
    Path((segment, id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let entity = entity_for(&state, &segment)?;
    let id = parse_id(&id)?;
    let record = CrudService::read_or_404(&state.pool, entity, id).await?;
    let route = entity.entity.route();
    let title = record
        .get(entity.entity.title_field())
        .and_then(|v| v.as_str())
        .unwrap_or(entity.entity.singular())
        .to_string();
    Ok(success_one(DeleteView {
        entity: route,
        id: id.to_string(),
        title,
        action: format!("/{}/{}/delete", route, id),
        cancel: format!("/{}/{}", route, id),
    })
    .into_response())
}

/// POST /:entity/:id/delete
pub async fn delete(
    State(state): State<AppState>,
    Path((segment, id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let entity = entity_for(&state, &segment)?;
    let id = parse_id(&id)?;
    let removed = CrudService::delete(&state.pool, entity, id).await?;
    remove_files(&state, file_url(entity, &removed).into_iter().collect()).await;
    Ok(see_other(&format!("/{}", entity.entity.route())))
}
