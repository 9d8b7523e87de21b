//! Console routes. Every path starts with an entity route segment except the
//! filter form and the color scheme; static segments win over `:id` and `:tab`.

use crate::handlers::{attendance, console, entity, form};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn console_routes() -> Router<AppState> {
    Router::new()
        .route("/color-scheme", post(console::color_scheme))
        .route("/filters/:entity", post(console::filters))
        .route("/:entity", get(entity::list).post(entity::bulk_delete))
        .route("/:entity/upsert", get(form::create_form).post(form::upsert))
        .route("/:entity/import-data", post(console::import_data))
        .route("/:entity/:id", get(entity::detail))
        .route("/:entity/:id/update", get(form::update_form).post(form::update))
        .route("/:entity/:id/delete", get(entity::delete_view).post(entity::delete))
        .route("/:entity/:id/generate", get(console::generate))
        .route("/:entity/:id/attendance", get(attendance::view))
        .route(
            "/:entity/:id/attendance/update",
            get(attendance::update_form).post(attendance::update),
        )
        .route("/:entity/:id/attendance/import", post(attendance::import))
        .route("/:entity/:id/:tab", get(entity::tab_list))
        .route("/:entity/:id/:tab/add", get(form::tab_add_form))
}
