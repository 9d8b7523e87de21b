//! Attendance routes of employees and project locations.

use crate::config::Entity;
use crate::error::AppError;
use crate::extractors::Submitted;
use crate::handlers::{flag, parse_id};
use crate::render::list::Pagination;
use crate::render::table::{render_table, TableOptions, TableView};
use crate::response::{csv_attachment, see_other, success_one};
use crate::service::attendance::{day_header, parse_grid, AttendanceDay, AttendanceService, MonthRef};
use crate::service::coerce::today;
use crate::service::csv_io;
use crate::service::filter::{page_param, sanitize_search};
use crate::service::input::RawValue;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

/// Attendance truncates names less eagerly than lists.
const SUMMARY_TRUNCATE: usize = 40;

#[derive(Serialize)]
pub struct GridView {
    pub employee: String,
    pub month: MonthRef,
    pub headers: Vec<String>,
    pub days: Vec<AttendanceDay>,
    /// Future months are shown but never saved.
    pub editable: bool,
    pub action: String,
}

#[derive(Serialize)]
pub struct SummaryView {
    pub location: String,
    pub month: MonthRef,
    pub table: TableView,
    pub pagination: Pagination,
}

fn attendance_entity(segment: &str) -> Result<Entity, AppError> {
    match Entity::from_route(segment) {
        Some(e @ (Entity::Employees | Entity::ProjectLocations)) => Ok(e),
        Some(other) => Err(AppError::NotFound(format!("{} has no attendance", other.singular()))),
        None => Err(AppError::NotFound(format!("unknown entity: {}", segment))),
    }
}

fn month_query(month: MonthRef) -> String {
    format!("month={}&year={}", month.month, month.year)
}

/// The employee a grid route edits: the record itself, or `?employee=` under a location.
fn grid_employee(entity: Entity, id: Uuid, params: &[(String, String)]) -> Result<Uuid, AppError> {
    match entity {
        Entity::Employees => Ok(id),
        _ => {
            let raw = params
                .iter()
                .find(|(k, _)| k == "employee")
                .map(|(_, v)| v.as_str())
                .ok_or_else(|| AppError::BadRequest("employee is required".into()))?;
            parse_id(raw)
        }
    }
}

/// GET /:entity/:id/attendance: an employee's month, or a location's summary;
/// `?export=true` downloads the month as CSV.
pub async fn view(
    State(state): State<AppState>,
    Path((segment, id)): Path<(String, String)>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let entity = attendance_entity(&segment)?;
    let id = parse_id(&id)?;
    let month = MonthRef::from_params(&params)?;
    let model = &state.model;

    if flag(&params, "export") {
        let employees = AttendanceService::employees(&state.pool, model, entity, id).await?;
        let mut rows = Vec::with_capacity(employees.len());
        for (employee, name) in employees {
            rows.push((name, AttendanceService::grid(&state.pool, model, employee, month).await?));
        }
        let bytes = csv_io::export_attendance(month, &rows)?;
        let name = format!("attendance-{}-{}.csv", month.month, month.year);
        return Ok(csv_attachment(&name, bytes));
    }

    match entity {
        Entity::Employees => {
            let employee = AttendanceService::employees(&state.pool, model, entity, id).await?;
            let name = employee.into_iter().next().map(|(_, n)| n).unwrap_or_default();
            let days = AttendanceService::grid(&state.pool, model, id, month).await?;
            Ok(success_one(grid_view(&segment, id, name, month, days, None)).into_response())
        }
        _ => {
            let search = params
                .iter()
                .find(|(k, _)| k == "search")
                .and_then(|(_, v)| sanitize_search(v));
            let page = page_param(&params);
            let (summaries, total, window) =
                AttendanceService::summary(&state.pool, model, id, month, search.as_deref(), page).await?;
            let rows: Vec<serde_json::Value> = summaries
                .iter()
                .map(|s| {
                    json!({
                        "id": s.id.to_string(),
                        "full_name": s.full_name,
                        "employee_code": s.employee_code,
                        "present_days": s.present_days,
                        "holidays": s.holidays,
                        "hours": s.hours,
                    })
                })
                .collect();
            let mut opts = TableOptions::new(Entity::Employees.route(), window.page, window.size);
            opts.extra_route = Some("attendance");
            opts.update_link = Some(format!("update?{}", month_query(month)));
            opts.truncate = SUMMARY_TRUNCATE;
            Ok(success_one(SummaryView {
                location: id.to_string(),
                month,
                table: render_table(&rows, &opts),
                pagination: Pagination::new(window, total),
            })
            .into_response())
        }
    }
}

/// Name of `employee` among the employees a route may edit; anyone else is 404.
fn member_name(employees: Vec<(Uuid, String)>, employee: Uuid) -> Result<String, AppError> {
    employees
        .into_iter()
        .find(|(e, _)| *e == employee)
        .map(|(_, n)| n)
        .ok_or_else(|| crate::error::not_found("employee"))
}

fn grid_view(
    segment: &str,
    id: Uuid,
    employee: String,
    month: MonthRef,
    days: Vec<AttendanceDay>,
    for_employee: Option<Uuid>,
) -> GridView {
    let employee_query = for_employee.map(|e| format!("&employee={}", e)).unwrap_or_default();
    GridView {
        employee,
        month,
        headers: days.iter().map(|d| day_header(d.date)).collect(),
        editable: !month.is_future(today()),
        action: format!("/{}/{}/attendance/update?{}{}", segment, id, month_query(month), employee_query),
        days,
    }
}

/// GET /:entity/:id/attendance/update: the editable grid of one employee's month.
pub async fn update_form(
    State(state): State<AppState>,
    Path((segment, id)): Path<(String, String)>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let entity = attendance_entity(&segment)?;
    let id = parse_id(&id)?;
    let month = MonthRef::from_params(&params)?;
    let employee = grid_employee(entity, id, &params)?;
    let names = AttendanceService::employees(&state.pool, &state.model, entity, id).await?;
    let name = member_name(names, employee)?;
    let days = AttendanceService::grid(&state.pool, &state.model, employee, month).await?;
    let for_employee = (entity != Entity::Employees).then_some(employee);
    Ok(success_one(grid_view(&segment, id, name, month, days, for_employee)).into_response())
}

/// POST /:entity/:id/attendance/update: upsert the submitted grid in one
/// transaction. Future months are not saved; the employee must belong to the
/// route's record.
pub async fn update(
    State(state): State<AppState>,
    Path((segment, id)): Path<(String, String)>,
    Query(params): Query<Vec<(String, String)>>,
    Submitted(input): Submitted,
) -> Result<Response, AppError> {
    let entity = attendance_entity(&segment)?;
    let id = parse_id(&id)?;
    let month = MonthRef::from_params(&params)?;
    let back = format!("/{}/{}/attendance?{}", segment, id, month_query(month));
    if month.is_future(today()) {
        tracing::info!(month = month.month, year = month.year, "future attendance not saved");
        return Ok(see_other(&back));
    }
    let employee = grid_employee(entity, id, &params)?;
    let members = AttendanceService::employees(&state.pool, &state.model, entity, id).await?;
    member_name(members, employee)?;
    let days = parse_grid(&input, month)?;
    AttendanceService::save(&state.pool, &state.model, employee, &days).await?;
    Ok(see_other(&back))
}

/// POST /:entity/:id/attendance/import: multipart `file` in the export layout.
pub async fn import(
    State(state): State<AppState>,
    Path((segment, id)): Path<(String, String)>,
    Query(params): Query<Vec<(String, String)>>,
    Submitted(input): Submitted,
) -> Result<Response, AppError> {
    let entity = attendance_entity(&segment)?;
    let id = parse_id(&id)?;
    let Some(RawValue::File(file)) = input.first("file") else {
        return Err(AppError::BadRequest("attendance import needs a file".into()));
    };
    let employees = AttendanceService::employees(&state.pool, &state.model, entity, id).await?;
    let (rows, unknown) = csv_io::parse_attendance(&file.bytes, &employees)?;
    let saved = AttendanceService::save_many(&state.pool, &state.model, &rows).await?;
    tracing::info!(entity = %segment, id = %id, saved, unknown, "attendance import");

    let mut back = format!("/{}/{}/attendance?imported=true", segment, id);
    if let Ok(month) = MonthRef::from_params(&params) {
        back.push('&');
        back.push_str(&month_query(month));
    }
    Ok(see_other(&back))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_employees_and_locations_have_attendance() {
        assert_eq!(attendance_entity("employees").unwrap(), Entity::Employees);
        assert_eq!(attendance_entity("project_locations").unwrap(), Entity::ProjectLocations);
        assert!(matches!(attendance_entity("vehicles"), Err(AppError::NotFound(_))));
        assert!(matches!(attendance_entity("nothing"), Err(AppError::NotFound(_))));
    }

    #[test]
    fn location_grids_need_an_employee() {
        let id = Uuid::new_v4();
        let e = Uuid::new_v4();
        assert_eq!(grid_employee(Entity::Employees, id, &[]).unwrap(), id);
        assert!(grid_employee(Entity::ProjectLocations, id, &[]).is_err());
        let params = vec![("employee".to_string(), e.to_string())];
        assert_eq!(grid_employee(Entity::ProjectLocations, id, &params).unwrap(), e);
    }

    #[test]
    fn grids_only_edit_members_of_the_location() {
        let ravi = Uuid::new_v4();
        let members = vec![(ravi, "Ravi".to_string()), (Uuid::new_v4(), "Asha".to_string())];
        assert_eq!(member_name(members.clone(), ravi).unwrap(), "Ravi");
        assert!(matches!(member_name(members, Uuid::new_v4()), Err(AppError::NotFound(_))));
        assert!(matches!(member_name(Vec::new(), ravi), Err(AppError::NotFound(_))));
    }

    #[test]
    fn grid_actions_keep_month_and_employee() {
        let id = Uuid::new_v4();
        let e = Uuid::new_v4();
        let month = MonthRef { year: 2024, month: 2 };
        let view = grid_view("project_locations", id, "Ravi".into(), month, Vec::new(), Some(e));
        assert_eq!(
            view.action,
            format!("/project_locations/{}/attendance/update?month=2&year=2024&employee={}", id, e)
        );
        assert!(view.editable);
    }
}
