//! Monthly attendance: day defaults, grid parsing, import codes and the
//! transactional grid save.

use crate::config::{Entity, ResolvedModel};
use crate::error::{AppError, FieldErrors};
use crate::service::coerce::{days_in_month, normalize_date, parse_bool, today};
use crate::service::filter::{PageWindow, TAB_PAGE_SIZE};
use crate::service::input::FormInput;
use crate::sql::attendance::{location_employees, location_summary, location_summary_count, month_rows, upsert_day};
use crate::sql::SqlValue;
use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use uuid::Uuid;

/// One day of an employee's month. `id` is `None` for days without a stored row.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AttendanceDay {
    pub id: Option<Uuid>,
    pub date: NaiveDate,
    pub no_of_hours: i64,
    pub present: bool,
    pub holiday: bool,
}

impl AttendanceDay {
    /// Sundays default to an absent holiday, other days to a full present day.
    pub fn default_for(date: NaiveDate) -> Self {
        let sunday = date.weekday() == Weekday::Sun;
        AttendanceDay {
            id: None,
            date,
            no_of_hours: if sunday { 0 } else { 8 },
            present: !sunday,
            holiday: sunday,
        }
    }

    /// Import code → day. Unknown codes are an absence.
    pub fn from_code(date: NaiveDate, code: &str) -> Self {
        let (no_of_hours, present, holiday) = match code.trim().to_uppercase().as_str() {
            "P" => (8, true, false),
            "H" => (4, true, false),
            "PL" | "PH" | "WO" => (0, false, true),
            "POW" | "POH" => (8, true, true),
            _ => (0, false, false),
        };
        AttendanceDay {
            id: None,
            date,
            no_of_hours,
            present,
            holiday,
        }
    }

    /// Export mark: P present, H absent holiday, A otherwise.
    pub fn mark(&self) -> &'static str {
        if self.present {
            "P"
        } else if self.holiday {
            "H"
        } else {
            "A"
        }
    }
}

/// Month and year of a grid request; defaults to the current month.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct MonthRef {
    pub year: i32,
    pub month: u32,
}

impl MonthRef {
    pub fn current() -> Self {
        let t = today();
        MonthRef { year: t.year(), month: t.month() }
    }

    pub fn from_params(params: &[(String, String)]) -> Result<Self, AppError> {
        let current = Self::current();
        let get = |name: &str| params.iter().find(|(k, _)| k == name).map(|(_, v)| v.trim());
        let month = match get("month").filter(|v| !v.is_empty()) {
            Some(v) => v.parse::<u32>().map_err(|_| AppError::BadRequest(format!("invalid month {}", v)))?,
            None => current.month,
        };
        let year = match get("year").filter(|v| !v.is_empty()) {
            Some(v) => v.parse::<i32>().map_err(|_| AppError::BadRequest(format!("invalid year {}", v)))?,
            None => current.year,
        };
        let m = MonthRef { year, month };
        m.days()?;
        Ok(m)
    }

    pub fn days(&self) -> Result<u32, AppError> {
        days_in_month(self.year, self.month)
            .ok_or_else(|| AppError::BadRequest(format!("invalid month {}/{}", self.month, self.year)))
    }

    pub fn first(&self) -> Result<NaiveDate, AppError> {
        self.day(1)
    }

    pub fn last(&self) -> Result<NaiveDate, AppError> {
        self.day(self.days()?)
    }

    pub fn day(&self, day: u32) -> Result<NaiveDate, AppError> {
        NaiveDate::from_ymd_opt(self.year, self.month, day)
            .ok_or_else(|| AppError::BadRequest(format!("invalid date {}/{}/{}", day, self.month, self.year)))
    }

    /// Later than the month containing `today`.
    pub fn is_future(&self, today: NaiveDate) -> bool {
        (self.year, self.month) > (today.year(), today.month())
    }
}

/// Every day of the month: stored rows where present, defaults elsewhere.
pub fn month_grid(month: MonthRef, stored: &[AttendanceDay]) -> Result<Vec<AttendanceDay>, AppError> {
    let by_date: HashMap<NaiveDate, &AttendanceDay> = stored.iter().map(|d| (d.date, d)).collect();
    (1..=month.days()?)
        .map(|d| {
            let date = month.day(d)?;
            Ok(by_date.get(&date).map(|s| (*s).clone()).unwrap_or_else(|| AttendanceDay::default_for(date)))
        })
        .collect()
}

/// Read the submitted grid: per day index `i` (0-based), keys `date i`,
/// `no_of_hours i`, `present i`, `holiday i`. Day `i` is always the month's day
/// `i + 1`; a submitted date naming any other day is rejected. Rows are keyed by
/// `(employee_id, date)` on save, so submitted row ids are ignored.
pub fn parse_grid(form: &FormInput, month: MonthRef) -> Result<Vec<AttendanceDay>, AppError> {
    let mut errors = FieldErrors::default();
    let mut days = Vec::new();
    for i in 0..month.days()? {
        let key = |name: &str| format!("{} {}", name, i);
        let date = month.day(i + 1)?;
        if let Some(raw) = form.text(&key("date")).filter(|v| !v.trim().is_empty()) {
            match normalize_date(raw) {
                Some(d) if d == date => {}
                Some(_) => {
                    errors.push(&key("date"), "must be a day of the requested month");
                    continue;
                }
                None => {
                    errors.push(&key("date"), "must be a valid date");
                    continue;
                }
            }
        }
        let no_of_hours = match form.text(&key("no_of_hours")).map(str::trim).filter(|v| !v.is_empty()) {
            Some(raw) => match raw.parse::<i64>() {
                Ok(h) if (0..=24).contains(&h) => h,
                _ => {
                    errors.push(&key("no_of_hours"), "must be a whole number between 0 and 24");
                    continue;
                }
            },
            None => 0,
        };
        days.push(AttendanceDay {
            id: None,
            date,
            no_of_hours,
            present: form.text(&key("present")).and_then(parse_bool).unwrap_or(false),
            holiday: form.text(&key("holiday")).and_then(parse_bool).unwrap_or(false),
        });
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }
    Ok(days)
}

/// Per-employee totals for a location's month.
#[derive(Clone, Debug, Serialize)]
pub struct EmployeeSummary {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub employee_code: Option<String>,
    pub present_days: i64,
    pub holidays: i64,
    pub hours: i64,
}

pub struct AttendanceService;

impl AttendanceService {
    /// Stored rows of one employee's month.
    pub async fn stored(pool: &PgPool, model: &ResolvedModel, employee: Uuid, month: MonthRef) -> Result<Vec<AttendanceDay>, AppError> {
        let q = month_rows(&model.schema_name);
        tracing::debug!(sql = %q.sql, employee = %employee, "query");
        let rows = sqlx::query(&q.sql)
            .bind(SqlValue::Uuid(employee))
            .bind(SqlValue::Date(month.first()?))
            .bind(SqlValue::Date(month.last()?))
            .fetch_all(pool)
            .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(AttendanceDay {
                id: Some(row.try_get("id")?),
                date: row.try_get("date")?,
                no_of_hours: row.try_get("no_of_hours")?,
                present: row.try_get("present")?,
                holiday: row.try_get("holiday")?,
            });
        }
        Ok(out)
    }

    pub async fn grid(pool: &PgPool, model: &ResolvedModel, employee: Uuid, month: MonthRef) -> Result<Vec<AttendanceDay>, AppError> {
        let stored = Self::stored(pool, model, employee, month).await?;
        month_grid(month, &stored)
    }

    /// Upsert every day for `employee` in one transaction.
    pub async fn save(pool: &PgPool, model: &ResolvedModel, employee: Uuid, days: &[AttendanceDay]) -> Result<usize, AppError> {
        let q = upsert_day(&model.schema_name);
        let mut tx = pool.begin().await?;
        for day in days {
            tracing::debug!(sql = %q.sql, employee = %employee, date = %day.date, "query (tx)");
            sqlx::query(&q.sql)
                .bind(SqlValue::Uuid(employee))
                .bind(SqlValue::Date(day.date))
                .bind(SqlValue::Int(day.no_of_hours))
                .bind(SqlValue::Bool(day.present))
                .bind(SqlValue::Bool(day.holiday))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        tracing::info!(employee = %employee, days = days.len(), "attendance saved");
        Ok(days.len())
    }

    /// Upsert many employees' days in one transaction.
    pub async fn save_many(pool: &PgPool, model: &ResolvedModel, rows: &[(Uuid, AttendanceDay)]) -> Result<usize, AppError> {
        let q = upsert_day(&model.schema_name);
        let mut tx = pool.begin().await?;
        for (employee, day) in rows {
            sqlx::query(&q.sql)
                .bind(SqlValue::Uuid(*employee))
                .bind(SqlValue::Date(day.date))
                .bind(SqlValue::Int(day.no_of_hours))
                .bind(SqlValue::Bool(day.present))
                .bind(SqlValue::Bool(day.holiday))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        tracing::info!(rows = rows.len(), "attendance imported");
        Ok(rows.len())
    }

    pub async fn summary(
        pool: &PgPool,
        model: &ResolvedModel,
        location: Uuid,
        month: MonthRef,
        search: Option<&str>,
        page: u32,
    ) -> Result<(Vec<EmployeeSummary>, i64, PageWindow), AppError> {
        let window = PageWindow::new(page, TAB_PAGE_SIZE);
        let schema = &model.schema_name;
        let q = location_summary(schema, location, month.first()?, month.last()?, search, window.limit(), window.offset());
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        let mut out = Vec::new();
        for row in query.fetch_all(pool).await? {
            out.push(EmployeeSummary {
                id: row.try_get("id")?,
                full_name: row.try_get("full_name")?,
                employee_code: row.try_get("employee_code")?,
                present_days: row.try_get("present_days")?,
                holidays: row.try_get("holidays")?,
                hours: row.try_get("hours")?,
            });
        }
        let c = location_summary_count(schema, location, search);
        let mut count = sqlx::query_scalar::<_, i64>(&c.sql);
        for p in &c.params {
            count = count.bind(p.clone());
        }
        let total = count.fetch_one(pool).await?;
        Ok((out, total, window))
    }

    /// (id, full_name) of the employees an attendance route covers: the employee
    /// itself, or everyone at a project location.
    pub async fn employees(pool: &PgPool, model: &ResolvedModel, entity: Entity, id: Uuid) -> Result<Vec<(Uuid, String)>, AppError> {
        match entity {
            Entity::Employees => {
                let e = model.entity(Entity::Employees);
                let q = crate::sql::select_column(&model.schema_name, e.table_name(), "full_name");
                let name: Option<Option<String>> = sqlx::query_scalar(&q.sql)
                    .bind(SqlValue::Uuid(id))
                    .fetch_optional(pool)
                    .await?;
                let name = name.ok_or_else(|| crate::error::not_found("employee"))?;
                Ok(vec![(id, name.unwrap_or_default())])
            }
            Entity::ProjectLocations => {
                let q = location_employees(&model.schema_name);
                let rows = sqlx::query(&q.sql).bind(SqlValue::Uuid(id)).fetch_all(pool).await?;
                let mut out = Vec::with_capacity(rows.len());
                for row in rows {
                    let name: Option<String> = row.try_get("full_name")?;
                    out.push((row.try_get("id")?, name.unwrap_or_default()));
                }
                Ok(out)
            }
            other => Err(AppError::NotFound(format!("{} has no attendance", other.singular()))),
        }
    }
}

/// Header of a day column: `D/M/YYYY`.
pub fn day_header(date: NaiveDate) -> String {
    format!("{}/{}/{}", date.day(), date.month(), date.year())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(year: i32, month: u32) -> MonthRef {
        MonthRef { year, month }
    }

    #[test]
    fn defaults_depend_on_sunday() {
        // 2024-03-03 was a Sunday
        let sunday = AttendanceDay::default_for(NaiveDate::from_ymd_opt(2024, 3, 3).unwrap());
        assert_eq!((sunday.no_of_hours, sunday.present, sunday.holiday), (0, false, true));
        let monday = AttendanceDay::default_for(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!((monday.no_of_hours, monday.present, monday.holiday), (8, true, false));
    }

    #[test]
    fn import_codes() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let read = |c: &str| {
            let day = AttendanceDay::from_code(d, c);
            (day.no_of_hours, day.present, day.holiday)
        };
        assert_eq!(read("P"), (8, true, false));
        assert_eq!(read("h"), (4, true, false));
        assert_eq!(read("WO"), (0, false, true));
        assert_eq!(read("POH"), (8, true, true));
        assert_eq!(read("X"), (0, false, false));
        assert_eq!(AttendanceDay::from_code(d, "PL").mark(), "H");
    }

    #[test]
    fn leap_february_grid_has_29_days() {
        let m = month(2024, 2);
        let stored = vec![AttendanceDay {
            id: Some(Uuid::new_v4()),
            date: NaiveDate::from_ymd_opt(2024, 2, 10).unwrap(),
            no_of_hours: 4,
            present: true,
            holiday: false,
        }];
        let grid = month_grid(m, &stored).unwrap();
        assert_eq!(grid.len(), 29);
        assert_eq!(grid[9], stored[0]);
        assert!(grid[0].id.is_none());
    }

    #[test]
    fn parse_grid_reads_every_day() {
        let m = month(2024, 2);
        let mut form = FormInput::default();
        for i in 0..29 {
            form.push_text(format!("date {}", i), format!("2024-02-{:02}", i + 1));
            form.push_text(format!("no_of_hours {}", i), "8");
            form.push_text(format!("present {}", i), "true");
            form.push_text(format!("holiday {}", i), "false");
        }
        form.push_text("id 3", Uuid::new_v4().to_string());
        let days = parse_grid(&form, m).unwrap();
        assert_eq!(days.len(), 29);
        assert!(days.iter().all(|d| d.id.is_none()));
        assert_eq!(days[28].date, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert!(days.iter().all(|d| d.present && !d.holiday && d.no_of_hours == 8));
    }

    #[test]
    fn parse_grid_rejects_bad_hours() {
        let mut form = FormInput::default();
        form.push_text("no_of_hours 0", "30");
        let err = parse_grid(&form, month(2024, 2)).unwrap_err();
        let AppError::Validation(errors) = err else { panic!("expected validation error") };
        assert_eq!(errors.fields(), vec!["no_of_hours 0"]);
    }

    #[test]
    fn parse_grid_rejects_days_outside_the_month() {
        let mut form = FormInput::default();
        form.push_text("date 0", "1/1/2099");
        form.push_text("date 1", "2024-02-02");
        form.push_text("date 2", "2024-02-04");
        let err = parse_grid(&form, month(2024, 2)).unwrap_err();
        let AppError::Validation(errors) = err else { panic!("expected validation error") };
        assert_eq!(errors.fields(), vec!["date 0", "date 2"]);
    }

    #[test]
    fn parse_grid_fills_missing_dates_in_order() {
        let days = parse_grid(&FormInput::default(), month(2023, 4)).unwrap();
        assert_eq!(days.len(), 30);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2023, 4, 1).unwrap());
        assert_eq!(days[29].date, NaiveDate::from_ymd_opt(2023, 4, 30).unwrap());
    }

    #[test]
    fn future_months() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        assert!(!month(2024, 6).is_future(today));
        assert!(month(2024, 7).is_future(today));
        assert!(month(2025, 1).is_future(today));
        assert!(!month(2023, 12).is_future(today));
    }

    #[test]
    fn month_params_default_and_validate() {
        let p = |m: &str, y: &str| vec![("month".to_string(), m.to_string()), ("year".to_string(), y.to_string())];
        assert_eq!(MonthRef::from_params(&p("2", "2024")).unwrap(), month(2024, 2));
        assert!(MonthRef::from_params(&p("13", "2024")).is_err());
        assert_eq!(MonthRef::from_params(&[]).unwrap(), MonthRef::current());
        assert_eq!(day_header(NaiveDate::from_ymd_opt(2024, 2, 9).unwrap()), "9/2/2024");
    }
}
