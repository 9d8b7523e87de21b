//! CSV export and import of records, and of attendance grids.

use crate::config::{EntityDescriptor, FieldDescriptor, FieldKind, OptionSource, ResolvedEntity, ResolvedModel, Storage};
use crate::error::AppError;
use crate::service::attendance::{day_header, AttendanceDay, MonthRef};
use crate::service::coerce::normalize_date;
use crate::service::crud::CrudService;
use crate::service::input::FormInput;
use crate::service::options::title_index;
use crate::service::selector::{PreviousLinks, SelectorBuilder, WriteMode};
use crate::service::validation::SchemaValidator;
use crate::sql::Predicate;
use chrono::Datelike;
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

/// Rows included in an export.
pub const EXPORT_LIMIT: u32 = 150;
pub const SERIAL_HEADER: &str = "Sr. No";

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct ImportReport {
    pub inserted: u64,
    pub skipped: usize,
}

/// Fields written to an export, in form order: every stored field except the
/// carrier of a nested row's id, which import recreates.
pub fn export_fields(descriptor: &EntityDescriptor) -> Vec<&FieldDescriptor> {
    descriptor
        .fields
        .iter()
        .filter(|f| f.is_writable())
        .filter(|f| !matches!(f.storage, Storage::Nested { column: None, .. }))
        .collect()
}

fn cell_text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(|i| i.as_object())
            .filter_map(|o| o.iter().find(|(k, _)| k.as_str() != "id").map(|(_, v)| cell_text(v)))
            .collect::<Vec<_>>()
            .join(";"),
        other => other.to_string(),
    }
}

/// Cell of `field` in a record shaped like a detail read: references export
/// their title, nested columns come from the nested row.
fn field_cell(field: &FieldDescriptor, record: &Value) -> String {
    let relation = field.relation.unwrap_or(field.name);
    let value = match &field.storage {
        Storage::ForeignKey { label, .. } => record.get(relation).and_then(|r| r.get(*label)),
        Storage::Nested { column: Some((name, _)), .. } => record.get(relation).and_then(|r| r.get(*name)),
        Storage::JoinTable { .. } => record.get(relation),
        _ => record.get(field.name),
    };
    value.map(cell_text).unwrap_or_default()
}

/// CSV bytes for records: a serial column, then one column per exported field
/// headed by its name, so an export imports back unchanged.
pub fn export_rows(descriptor: &EntityDescriptor, records: &[Value]) -> Result<Vec<u8>, AppError> {
    let fields = export_fields(descriptor);
    let mut w = csv::Writer::from_writer(Vec::new());
    let mut header = vec![SERIAL_HEADER.to_string()];
    header.extend(fields.iter().map(|f| f.name.to_string()));
    w.write_record(&header)?;
    for (i, record) in records.iter().enumerate() {
        let mut row = vec![(i + 1).to_string()];
        row.extend(fields.iter().map(|f| field_cell(f, record)));
        w.write_record(&row)?;
    }
    w.into_inner().map_err(|e| AppError::BadRequest(format!("csv export: {}", e)))
}

/// First records matching the list filters, as CSV.
pub async fn export_entity(pool: &PgPool, entity: &ResolvedEntity, predicate: &Predicate) -> Result<Vec<u8>, AppError> {
    let records = CrudService::records(pool, entity, predicate, EXPORT_LIMIT).await?;
    tracing::info!(entity = entity.table_name(), rows = records.len(), "export");
    export_rows(&entity.descriptor, &records)
}

/// "Full Name" → "full_name".
pub fn header_to_field(header: &str) -> String {
    header.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join("_")
}

/// Parsed CSV: field-name headers and raw rows.
pub fn read_table(bytes: &[u8]) -> Result<(Vec<String>, Vec<Vec<String>>), AppError> {
    let mut r = csv::ReaderBuilder::new().flexible(true).trim(csv::Trim::All).from_reader(bytes);
    let headers: Vec<String> = r.headers()?.iter().map(header_to_field).collect();
    let mut rows = Vec::new();
    for record in r.records() {
        let record = record?;
        if record.iter().all(|c| c.is_empty()) {
            continue;
        }
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok((headers, rows))
}

type TitleIndexes = HashMap<(&'static str, &'static str), HashMap<String, Uuid>>;

async fn indexes_for(pool: &PgPool, schema: &str, descriptor: &EntityDescriptor) -> Result<TitleIndexes, AppError> {
    let mut out = TitleIndexes::new();
    for f in &descriptor.fields {
        let (table, label) = match &f.storage {
            Storage::ForeignKey { target, label, .. } | Storage::JoinTable { target, label, .. } => (*target, *label),
            _ => continue,
        };
        if !out.contains_key(&(table, label)) {
            out.insert((table, label), title_index(pool, schema, table, label).await?);
        }
    }
    Ok(out)
}

/// Convert one CSV row into form input: references resolved by title, multi
/// values split on ';', radio values matched case-insensitively. Unresolved
/// references are left empty.
pub fn row_to_input(descriptor: &EntityDescriptor, headers: &[String], row: &[String], indexes: &TitleIndexes) -> FormInput {
    let mut input = FormInput::default();
    for (i, header) in headers.iter().enumerate() {
        let Some(field) = descriptor.field(header) else { continue };
        let cell = row.get(i).map(|c| c.trim()).unwrap_or("");
        match &field.storage {
            Storage::Virtual => {}
            Storage::ForeignKey { target, label, .. } => {
                let id = indexes
                    .get(&(*target, *label))
                    .and_then(|idx| idx.get(&cell.to_lowercase()))
                    .map(Uuid::to_string)
                    .unwrap_or_default();
                input.push_text(field.name, id);
            }
            Storage::JoinTable { target, label, .. } => {
                for part in cell.split(';').map(str::trim).filter(|p| !p.is_empty()) {
                    if let Some(id) = indexes.get(&(*target, *label)).and_then(|idx| idx.get(&part.to_lowercase())) {
                        input.push_text(field.name, id.to_string());
                    }
                }
            }
            _ if field.kind == FieldKind::Radio => {
                let value = match &field.options {
                    Some(OptionSource::Static(values)) => values
                        .iter()
                        .find(|v| v.eq_ignore_ascii_case(cell))
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| cell.to_string()),
                    _ => cell.to_string(),
                };
                input.push_text(field.name, value);
            }
            _ => input.push_text(field.name, cell),
        }
    }
    input
}

/// Import records: rows failing validation are skipped with a warning; the rest
/// are inserted in one transaction.
pub async fn import_entity(
    pool: &PgPool,
    model: &ResolvedModel,
    entity: &ResolvedEntity,
    bytes: &[u8],
) -> Result<ImportReport, AppError> {
    let (headers, rows) = read_table(bytes)?;
    let descriptor = &entity.descriptor;
    let indexes = indexes_for(pool, &entity.schema_name, descriptor).await?;
    let mut payloads = Vec::with_capacity(rows.len());
    let mut skipped = 0;
    for (n, row) in rows.iter().enumerate() {
        let input = row_to_input(descriptor, &headers, row, &indexes);
        match SchemaValidator::validate(descriptor, &input) {
            Ok(values) => payloads.push(SelectorBuilder::build(descriptor, &values, WriteMode::Create, &PreviousLinks::new())),
            Err(e) => {
                tracing::warn!(entity = entity.table_name(), row = n + 1, error = %e, "skipping import row");
                skipped += 1;
            }
        }
    }
    let inserted = CrudService::insert_many(pool, model, entity, &payloads).await?;
    Ok(ImportReport { inserted, skipped })
}

/// Stored days use their mark; days without a row are H on Sundays and A otherwise.
fn export_mark(day: &AttendanceDay) -> &'static str {
    match day.id {
        Some(_) => day.mark(),
        None if day.date.weekday() == chrono::Weekday::Sun => "H",
        None => "A",
    }
}

/// Attendance grid CSV: serial, employee name, then one `D/M/YYYY` column per day.
pub fn export_attendance(month: MonthRef, rows: &[(String, Vec<AttendanceDay>)]) -> Result<Vec<u8>, AppError> {
    let mut w = csv::Writer::from_writer(Vec::new());
    let mut header = vec![SERIAL_HEADER.to_string(), "employee".to_string()];
    for d in 1..=month.days()? {
        header.push(day_header(month.day(d)?));
    }
    w.write_record(&header)?;
    for (i, (name, days)) in rows.iter().enumerate() {
        let mut record = vec![(i + 1).to_string(), name.clone()];
        record.extend(days.iter().map(|d| export_mark(d).to_string()));
        w.write_record(&record)?;
    }
    w.into_inner().map_err(|e| AppError::BadRequest(format!("csv export: {}", e)))
}

/// Read an attendance CSV against a set of (id, full name) employees.
/// Returns the day rows to upsert and how many rows named an unknown employee.
pub fn parse_attendance(bytes: &[u8], employees: &[(Uuid, String)]) -> Result<(Vec<(Uuid, AttendanceDay)>, usize), AppError> {
    let mut r = csv::ReaderBuilder::new().flexible(true).trim(csv::Trim::All).from_reader(bytes);
    let headers: Vec<String> = r.headers()?.iter().map(str::to_string).collect();
    let employee_col = headers
        .iter()
        .position(|h| header_to_field(h) == "employee")
        .ok_or_else(|| AppError::BadRequest("attendance import needs an employee column".into()))?;
    let date_cols: Vec<(usize, chrono::NaiveDate)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != employee_col)
        .filter_map(|(i, h)| normalize_date(h).map(|d| (i, d)))
        .collect();
    let by_name: HashMap<String, Uuid> = employees.iter().map(|(id, n)| (n.trim().to_lowercase(), *id)).collect();

    let mut out = Vec::new();
    let mut unknown = 0;
    for record in r.records() {
        let record = record?;
        let name = record.get(employee_col).unwrap_or("").to_lowercase();
        if name.is_empty() {
            continue;
        }
        let Some(employee) = by_name.get(&name) else {
            tracing::warn!(employee = %name, "skipping attendance row for unknown employee");
            unknown += 1;
            continue;
        };
        for (i, date) in &date_cols {
            let code = record.get(*i).unwrap_or("");
            out.push((*employee, AttendanceDay::from_code(*date, code)));
        }
    }
    Ok((out, unknown))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{descriptor, Entity};
    use crate::service::validation::FieldValue;
    use chrono::NaiveDate;
    use serde_json::json;

    fn employee_record(location: &str) -> Value {
        json!({
            "id": "e1",
            "full_name": "Asha Rao",
            "photo": null,
            "guardian_name": "Mohan Rao",
            "designation": "Sampler",
            "project_location_id": location,
            "employee_code": "EMP-007",
            "gender": "female",
            "education": "graduate",
            "status": "active",
            "date_of_birth": "1990-04-02",
            "joining_date": "2015-06-01",
            "exit_date": null,
            "mobile": "9876543210",
            "aadhar_number": null,
            "pan_number": null,
            "uan_no": null,
            "esic_id": null,
            "permanent_address": "12, Station Road, Pune",
            "bank_detail_id": "b1",
            "created_at": "2024-01-01T00:00:00+00:00",
            "updated_at": "2024-01-01T00:00:00+00:00",
            "project_location": { "city": "Pune" },
            "bank_detail": { "account_number": "123456789012", "ifsc_code": "SBIN0001234" },
        })
    }

    #[test]
    fn exports_carry_every_required_field() {
        for entity in Entity::ALL.iter().copied().filter(|e| e.import_export()) {
            let d = descriptor(entity);
            let bytes = export_rows(&d, &[]).unwrap();
            let (headers, rows) = read_table(&bytes).unwrap();
            assert!(rows.is_empty());
            for field in d.fields.iter().filter(|f| f.required() && f.is_writable()) {
                assert!(headers.contains(&field.name.to_string()), "{} export lacks {}", entity.route(), field.name);
            }
        }
    }

    #[test]
    fn export_uses_titles_and_nested_columns() {
        let d = descriptor(Entity::Employees);
        let csv = String::from_utf8(export_rows(&d, &[employee_record("l1")]).unwrap()).unwrap();
        let mut lines = csv.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("Sr. No,full_name,photo,guardian_name,designation,project_location,employee_code"));
        assert!(header.ends_with("permanent_address,account_number,ifsc_code"));
        assert!(!header.contains("bank_detail_id"));
        assert!(!header.contains(",project,"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("1,Asha Rao,,Mohan Rao,Sampler,Pune,EMP-007,female,graduate,active,1990-04-02,2015-06-01,"));
        assert!(row.ends_with("\"12, Station Road, Pune\",123456789012,SBIN0001234"));
    }

    #[test]
    fn exported_employees_import_back() {
        let d = descriptor(Entity::Employees);
        let location = Uuid::new_v4();
        let bytes = export_rows(&d, &[employee_record(&location.to_string())]).unwrap();
        let (headers, rows) = read_table(&bytes).unwrap();
        let mut indexes = TitleIndexes::new();
        indexes.insert(("project_locations", "city"), HashMap::from([("pune".to_string(), location)]));
        let input = row_to_input(&d, &headers, &rows[0], &indexes);
        let values = SchemaValidator::validate(&d, &input).unwrap();
        let text = |name: &str| values.get(name).and_then(|v| v.as_text()).map(str::to_string);
        assert_eq!(text("full_name").as_deref(), Some("Asha Rao"));
        assert_eq!(text("employee_code").as_deref(), Some("EMP-007"));
        assert_eq!(text("project_location"), Some(location.to_string()));
        assert_eq!(text("account_number").as_deref(), Some("123456789012"));
        assert_eq!(text("education").as_deref(), Some("graduate"));
        assert!(matches!(
            values.get("date_of_birth"),
            Some(FieldValue::Date(d)) if *d == NaiveDate::from_ymd_opt(1990, 4, 2).unwrap()
        ));
        assert!(!values.contains("photo"));
    }

    #[test]
    fn exported_users_import_back() {
        let d = descriptor(Entity::Users);
        let role = Uuid::new_v4();
        let company = Uuid::new_v4();
        let record = json!({
            "id": "u1",
            "full_name": "Neha Singh",
            "photo": null,
            "designation": "Manager",
            "email": "neha@example.com",
            "role_id": role.to_string(),
            "role": { "name": "client admin" },
            "company": { "name": "Acme" },
            "project": { "name": null },
            "project_location": { "city": null },
        });
        let bytes = export_rows(&d, &[record]).unwrap();
        let (headers, rows) = read_table(&bytes).unwrap();
        let mut indexes = TitleIndexes::new();
        indexes.insert(("user_roles", "name"), HashMap::from([("client admin".to_string(), role)]));
        indexes.insert(("companies", "name"), HashMap::from([("acme".to_string(), company)]));
        let input = row_to_input(&d, &headers, &rows[0], &indexes);
        let values = SchemaValidator::validate(&d, &input).unwrap();
        assert_eq!(values.get("role").and_then(|v| v.as_text()), Some(role.to_string().as_str()));
        assert_eq!(values.get("company").and_then(|v| v.as_text()), Some(company.to_string().as_str()));
        assert_eq!(values.get("email").and_then(|v| v.as_text()), Some("neha@example.com"));
        assert!(!values.contains("project"));
    }

    #[test]
    fn headers_become_field_names() {
        assert_eq!(header_to_field("  Service Charge Field "), "service_charge_field");
        let (headers, rows) = read_table(b"Name,Service Charge\nAcme,5\n,\n").unwrap();
        assert_eq!(headers, vec!["name", "service_charge"]);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn rows_resolve_references_by_title() {
        let d = descriptor(Entity::ProjectLocations);
        let project = Uuid::new_v4();
        let field = Uuid::new_v4();
        let mut indexes = TitleIndexes::new();
        indexes.insert(("projects", "name"), HashMap::from([("metro".to_string(), project)]));
        indexes.insert(("payment_fields", "name"), HashMap::from([("bonus".to_string(), field)]));
        let headers: Vec<String> = ["city", "state", "project", "payment_field"].iter().map(|s| s.to_string()).collect();
        let row: Vec<String> = ["Pune", "maharashtra", "METRO", "Bonus; Unknown"].iter().map(|s| s.to_string()).collect();
        let input = row_to_input(&d, &headers, &row, &indexes);
        assert_eq!(input.text("state"), Some("Maharashtra"));
        assert_eq!(input.text("project"), Some(project.to_string().as_str()));
        assert_eq!(input.texts("payment_field"), vec![field.to_string().as_str()]);
        let values = SchemaValidator::validate(&d, &input).unwrap();
        assert!(values.contains("project"));
    }

    #[test]
    fn attendance_round_trip() {
        let month = MonthRef { year: 2024, month: 2 };
        let mut days = crate::service::attendance::month_grid(month, &[]).unwrap();
        days[0].id = Some(Uuid::new_v4());
        let bytes = export_attendance(month, &[("Ravi".to_string(), days)]).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.starts_with("Sr. No,employee,1/2/2024,2/2/2024"));
        assert!(text.contains("\n1,Ravi,P,A,A,H,A"));

        let ravi = Uuid::new_v4();
        let (rows, unknown) = parse_attendance(&bytes, &[(ravi, "ravi".to_string())]).unwrap();
        assert_eq!(unknown, 0);
        assert_eq!(rows.len(), 29);
        assert_eq!(rows[0].1.no_of_hours, 8);
        assert!(!rows[1].1.present && rows[1].1.no_of_hours == 0);
        // 2024-02-04 is a Sunday: exported as H, which imports as a half day
        let sunday = &rows[3].1;
        assert_eq!(sunday.date, NaiveDate::from_ymd_opt(2024, 2, 4).unwrap());
        assert!(sunday.present && !sunday.holiday);
        assert_eq!(sunday.no_of_hours, 4);

        let (_, unknown) = parse_attendance(b"Sr. No,employee,1/2/2024\n1,Nobody,P\n", &[(ravi, "Ravi".to_string())]).unwrap();
        assert_eq!(unknown, 1);
    }
}
