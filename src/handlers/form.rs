//! Create/update forms and the save action.

use crate::config::{ResolvedEntity, Storage, TabTarget};
use crate::error::AppError;
use crate::extractors::Submitted;
use crate::handlers::{entity_for, file_url, parse_id, remove_files};
use crate::render::form::{render_form, FormValues};
use crate::response::{see_other, success_one};
use crate::service::input::FormInput;
use crate::service::options;
use crate::service::selector::{PreviousLinks, SelectorBuilder, WriteMode};
use crate::service::validation::{FieldValue, SchemaValidator, NO_IMAGE};
use crate::service::CrudService;
use crate::state::AppState;
use crate::storage::object_key;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use uuid::Uuid;

/// GET /:entity/upsert: create form; query parameters prefill values.
pub async fn create_form(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let entity = entity_for(&state, &segment)?;
    let options = options::for_fields(&state.pool, &entity.schema_name, &entity.descriptor).await?;
    let values = FormValues::from_params(&params);
    Ok(success_one(render_form(&entity.descriptor, None, &values, &options, &[])).into_response())
}

/// POST /:entity/upsert: create, or update when the form carries an `id`.
pub async fn upsert(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    Submitted(input): Submitted,
) -> Result<Response, AppError> {
    let entity = entity_for(&state, &segment)?;
    let id = match input.text("id").map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(parse_id(raw)?),
        None => None,
    };
    let id = save(&state, entity, id, &input).await?;
    Ok(see_other(&format!("/{}/{}", entity.entity.route(), id)))
}

/// GET /:entity/:id/update: form filled from the stored record; query
/// parameters override stored values.
pub async fn update_form(
    State(state): State<AppState>,
    Path((segment, id)): Path<(String, String)>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let entity = entity_for(&state, &segment)?;
    let id = parse_id(&id)?;
    let record = CrudService::read_or_404(&state.pool, entity, id).await?;
    let mut values = FormValues::from_record(&entity.descriptor, &record);
    for (k, v) in &params {
        values.set(k, v.trim());
    }
    let options = options::for_fields(&state.pool, &entity.schema_name, &entity.descriptor).await?;
    let id = id.to_string();
    Ok(success_one(render_form(&entity.descriptor, Some(&id), &values, &options, &[])).into_response())
}

/// POST /:entity/:id/update
pub async fn update(
    State(state): State<AppState>,
    Path((segment, id)): Path<(String, String)>,
    Submitted(input): Submitted,
) -> Result<Response, AppError> {
    let entity = entity_for(&state, &segment)?;
    let id = save(&state, entity, Some(parse_id(&id)?), &input).await?;
    Ok(see_other(&format!("/{}/{}", entity.entity.route(), id)))
}

/// GET /:entity/:id/:tab/add: create form of a child record with the parent fixed.
pub async fn tab_add_form(
    State(state): State<AppState>,
    Path((segment, id, tab)): Path<(String, String, String)>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let parent = entity_for(&state, &segment)?;
    let id = parse_id(&id)?;
    let Some(TabTarget::Child { entity: child, fk }) = parent.descriptor.tab(&tab).map(|t| &t.target) else {
        return Err(AppError::NotFound(format!("{} has no tab {} to add to", parent.entity.singular(), tab)));
    };
    let child = state.model.entity(*child);
    let parent_field = child
        .descriptor
        .fields
        .iter()
        .find(|f| matches!(&f.storage, Storage::ForeignKey { column, .. } if column == fk))
        .map(|f| f.name)
        .ok_or_else(|| AppError::NotFound(format!("{} has no parent field {}", child.entity.singular(), fk)))?;

    let mut values = FormValues::from_params(&params);
    values.set(parent_field, id.to_string());
    let options = options::for_fields(&state.pool, &child.schema_name, &child.descriptor).await?;
    Ok(success_one(render_form(&child.descriptor, None, &values, &options, &[parent_field])).into_response())
}

/// Validate, store uploads, write the record and clean up replaced files.
/// Nothing is written when validation fails.
pub async fn save(state: &AppState, entity: &ResolvedEntity, id: Option<Uuid>, input: &FormInput) -> Result<Uuid, AppError> {
    let descriptor = &entity.descriptor;
    let mut values = SchemaValidator::validate(descriptor, input)?;

    let (mode, previous, stored) = match id {
        Some(id) => {
            let stored = CrudService::read_or_404(&state.pool, entity, id).await?;
            let previous = CrudService::previous_links(&state.pool, entity, id).await?;
            (WriteMode::Update, previous, Some(stored))
        }
        None => (WriteMode::Create, PreviousLinks::new(), None),
    };

    // the sentinel keeps whatever file is stored
    if let Some(field) = descriptor.file_field() {
        if matches!(values.get(field.name), Some(FieldValue::Text(s)) if s == NO_IMAGE) {
            values.remove(field.name);
        }
    }

    let mut uploaded = Vec::new();
    for (field, file) in values.uploads() {
        let key = object_key(&file.file_name);
        let url = match state.store.put(&key, &file.content_type, file.bytes.clone()).await {
            Ok(url) => url,
            Err(e) => {
                remove_files(state, uploaded).await;
                return Err(e);
            }
        };
        values.insert(&field, FieldValue::Text(url.clone()));
        uploaded.push(url);
    }

    let payload = SelectorBuilder::build(descriptor, &values, mode, &previous);
    let saved = match CrudService::write(&state.pool, &state.model, entity, id, &payload).await {
        Ok(saved) => saved,
        Err(e) => {
            remove_files(state, uploaded).await;
            return Err(e);
        }
    };

    if !uploaded.is_empty() {
        if let Some(old) = stored.as_ref().and_then(|r| file_url(entity, r)) {
            remove_files(state, vec![old]).await;
        }
    }
    Ok(saved)
}
