//! HTTP handlers: entity lists and records, forms, attendance and console actions.

pub mod attendance;
pub mod console;
pub mod entity;
pub mod form;

use crate::config::ResolvedEntity;
use crate::error::AppError;
use crate::state::AppState;
use uuid::Uuid;

/// Entity behind a route segment; unknown segments are 404.
pub(crate) fn entity_for<'a>(state: &'a AppState, segment: &str) -> Result<&'a ResolvedEntity, AppError> {
    state
        .model
        .entity_by_route(segment)
        .ok_or_else(|| AppError::NotFound(format!("unknown entity: {}", segment)))
}

pub(crate) fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::BadRequest(format!("invalid id: {}", raw)))
}

pub(crate) fn flag(params: &[(String, String)], name: &str) -> bool {
    params.iter().any(|(k, v)| k == name && v == "true")
}

/// Delete stored files; failures are logged, the records are already gone.
pub(crate) async fn remove_files(state: &AppState, urls: Vec<String>) {
    for url in urls {
        if url.is_empty() || url == crate::service::validation::NO_IMAGE {
            continue;
        }
        if let Err(e) = state.store.delete(&url).await {
            tracing::error!(error = %e, url = %url, "failed to remove stored file");
        }
    }
}

/// URL stored in the file column of a record, if any.
pub(crate) fn file_url(entity: &ResolvedEntity, record: &serde_json::Value) -> Option<String> {
    let field = entity.descriptor.file_field()?;
    record.get(field.name)?.as_str().map(str::to_string)
}

/// File URLs held by a batch of removed records.
pub(crate) fn stored_files(entity: &ResolvedEntity, records: &[serde_json::Value]) -> Vec<String> {
    records.iter().filter_map(|r| file_url(entity, r)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, Entity};
    use serde_json::json;

    #[test]
    fn removed_records_yield_their_file_urls() {
        let model = resolve("public").unwrap();
        let employees = model.entity(Entity::Employees);
        let records = vec![
            json!({"id": "a", "photo": "https://files.example/a.png"}),
            json!({"id": "b", "photo": null}),
            json!({"id": "c"}),
        ];
        assert_eq!(stored_files(employees, &records), vec!["https://files.example/a.png".to_string()]);
        assert!(stored_files(model.entity(Entity::ProjectLocations), &records).is_empty());
    }

    #[test]
    fn ids_are_trimmed_before_parsing() {
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&format!(" {} ", id)).unwrap(), id);
        assert!(matches!(parse_id("7"), Err(AppError::BadRequest(_))));
    }
}
