//! Console actions that are not tied to a single record view: filter forms,
//! the color scheme cookie, CSV import and letter generation.

use crate::error::AppError;
use crate::extractors::Submitted;
use crate::handlers::{entity_for, parse_id};
use crate::response::{see_other, success_one};
use crate::service::csv_io;
use crate::service::filter::{apply_filter_form, encode_query};
use crate::service::input::RawValue;
use crate::service::CrudService;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::header::SET_COOKIE,
    response::{IntoResponse, Response},
};
use serde::Serialize;

pub const THEME_COOKIE: &str = "en_theme";
const THEME_MAX_AGE: u32 = 31_536_000;

/// POST /filters/:entity: apply the filter form to the current query string.
pub async fn filters(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    Query(current): Query<Vec<(String, String)>>,
    Submitted(input): Submitted,
) -> Result<Response, AppError> {
    let entity = entity_for(&state, &segment)?;
    let form: Vec<(String, String)> = input.text_pairs().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    let query = apply_filter_form(&current, &form);
    Ok(see_other(&list_location(entity.entity.route(), &query)))
}

fn list_location(route: &str, query: &[(String, String)]) -> String {
    if query.is_empty() {
        format!("/{}", route)
    } else {
        format!("/{}?{}", route, encode_query(query))
    }
}

/// Local paths only; anything else falls back to the root.
pub fn safe_return_to(raw: Option<&str>) -> &str {
    match raw.map(str::trim) {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => path,
        _ => "/",
    }
}

fn theme_cookie(scheme: &str) -> Result<String, AppError> {
    match scheme {
        "light" | "dark" => Ok(format!(
            "{}={}; Path=/; Max-Age={}; SameSite=Lax",
            THEME_COOKIE, scheme, THEME_MAX_AGE
        )),
        "system" => Ok(format!("{}=; Path=/; Max-Age=0", THEME_COOKIE)),
        other => Err(AppError::BadRequest(format!("unknown color scheme: {}", other))),
    }
}

/// POST /color-scheme
pub async fn color_scheme(Submitted(input): Submitted) -> Result<Response, AppError> {
    let scheme = input.text("colorScheme").map(str::trim).unwrap_or("system");
    let cookie = theme_cookie(scheme)?;
    let location = safe_return_to(input.text("returnTo"));
    let mut response = see_other(location);
    let value = cookie
        .parse()
        .map_err(|_| AppError::BadRequest("invalid cookie value".into()))?;
    response.headers_mut().insert(SET_COOKIE, value);
    Ok(response)
}

/// POST /:entity/import-data: multipart `file` CSV import.
pub async fn import_data(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    Submitted(input): Submitted,
) -> Result<Response, AppError> {
    let entity = entity_for(&state, &segment)?;
    if !entity.entity.import_export() {
        return Err(AppError::BadRequest(format!("{} cannot be imported", entity.table_name())));
    }
    let Some(RawValue::File(file)) = input.first("file") else {
        return Err(AppError::BadRequest("import needs a file".into()));
    };
    let report = csv_io::import_entity(&state.pool, &state.model, entity, &file.bytes).await?;
    tracing::info!(
        entity = entity.table_name(),
        inserted = report.inserted,
        skipped = report.skipped,
        "csv import"
    );
    Ok(see_other(&format!("/{}?imported=true", entity.entity.route())))
}

#[derive(Serialize)]
pub struct GenerateView {
    pub entity: &'static str,
    pub id: String,
    pub letters: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub letter: Option<&'static str>,
    pub record: serde_json::Value,
}

/// GET /:entity/:id/generate[?letter=kind]
pub async fn generate(
    State(state): State<AppState>,
    Path((segment, id)): Path<(String, String)>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let entity = entity_for(&state, &segment)?;
    let letters = entity.descriptor.letters;
    if letters.is_empty() {
        return Err(AppError::NotFound(format!("{} has no letters", entity.entity.singular())));
    }
    let letter = match params.iter().find(|(k, _)| k == "letter") {
        Some((_, kind)) => Some(
            letters
                .iter()
                .copied()
                .find(|l| *l == kind.as_str())
                .ok_or_else(|| AppError::NotFound(format!("unknown letter: {}", kind)))?,
        ),
        None => None,
    };
    let id = parse_id(&id)?;
    let record = CrudService::read_or_404(&state.pool, entity, id).await?;
    Ok(success_one(GenerateView {
        entity: entity.entity.route(),
        id: id.to_string(),
        letters,
        letter,
        record,
    })
    .into_response())
}
