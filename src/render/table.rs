//! Table view model: columns inferred from record shape, formatted cells and row actions.

use crate::config::is_title_column;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

static ISO_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}(?:$|[T ])").expect("static pattern"));

/// Character budget of list cells.
pub const DEFAULT_TRUNCATE: usize = 12;
/// Strings longer than this are candidates for date formatting or truncation.
const LONG_TEXT: usize = 20;
const ELLIPSIS: &str = "...";

const HIDDEN_KEYS: [&str; 2] = ["id", "path"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Column {
    /// Dotted path into the record ("project_location.project.name").
    pub key: String,
    pub header: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Cell {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RowActions {
    pub view: String,
    pub update: String,
    pub copy_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TableRow {
    pub id: String,
    pub serial: u64,
    pub cells: Vec<Cell>,
    pub actions: RowActions,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TableView {
    pub columns: Vec<Column>,
    pub rows: Vec<TableRow>,
}

/// Link targets of a table. `extra_route` appends a sub-route to record links
/// (e.g. `attendance`); `update_link` replaces the update action with a fixed route.
#[derive(Clone, Debug)]
pub struct TableOptions<'a> {
    pub entity: &'a str,
    pub extra_route: Option<&'a str>,
    pub update_link: Option<String>,
    pub truncate: usize,
    pub page: u32,
    pub page_size: u32,
}

impl<'a> TableOptions<'a> {
    pub fn new(entity: &'a str, page: u32, page_size: u32) -> Self {
        TableOptions {
            entity,
            extra_route: None,
            update_link: None,
            truncate: DEFAULT_TRUNCATE,
            page,
            page_size,
        }
    }
}

fn display_header(raw: &str) -> String {
    raw.replace(['_', '-'], " ")
}

/// Columns of a record list: every leaf key of every row, in first-seen order.
/// Nested leaves are headed by the relation that holds them. Identifier keys,
/// `_id` columns and `path` are skipped.
pub fn infer_columns(rows: &[Value]) -> Vec<Column> {
    fn walk(value: &Value, prefix: &[&str], out: &mut Vec<Column>) {
        let Value::Object(map) = value else { return };
        for (k, v) in map {
            if HIDDEN_KEYS.contains(&k.as_str()) || k.ends_with("_id") {
                continue;
            }
            if let Value::Object(_) = v {
                let mut next = prefix.to_vec();
                next.push(k);
                walk(v, &next, out);
                continue;
            }
            let key = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{}.{}", prefix.join("."), k)
            };
            if out.iter().any(|c| c.key == key) {
                continue;
            }
            let header = prefix.last().copied().unwrap_or(k.as_str());
            out.push(Column {
                key,
                header: display_header(header),
            });
        }
    }
    let mut out = Vec::new();
    for row in rows {
        walk(row, &[], &mut out);
    }
    out
}

/// Value at a dotted path.
pub fn lookup<'v>(record: &'v Value, key: &str) -> Option<&'v Value> {
    key.split('.').try_fold(record, |v, part| v.get(part))
}

pub fn truncate(s: &str, budget: usize) -> String {
    if s.chars().count() <= budget {
        return s.to_string();
    }
    let keep = budget.saturating_sub(ELLIPSIS.len());
    let mut out: String = s.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

/// `D/M/YYYY` for strings that read as a date or timestamp.
pub fn plausible_date(s: &str) -> Option<String> {
    if !ISO_DATE.is_match(s) {
        return None;
    }
    crate::service::coerce::normalize_date(s).map(crate::service::attendance::day_header)
}

/// Text of one cell: dates as `D/M/YYYY`, booleans as Yes/No, long text truncated.
pub fn format_value(value: &Value, budget: usize) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => (if *b { "Yes" } else { "No" }).to_string(),
        Value::String(s) => {
            if let Some(date) = plausible_date(s) {
                date
            } else if s.chars().count() > LONG_TEXT {
                truncate(s, budget)
            } else {
                s.clone()
            }
        }
        Value::Array(items) => items
            .iter()
            .filter_map(|i| match i {
                Value::Object(o) => o.iter().find(|(k, _)| k.as_str() != "id").map(|(_, v)| format_value(v, budget)),
                other => Some(format_value(other, budget)),
            })
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn record_link(opts: &TableOptions<'_>, id: &str) -> String {
    match opts.extra_route {
        Some(extra) => format!("/{}/{}/{}", opts.entity, id, extra),
        None => format!("/{}/{}", opts.entity, id),
    }
}

pub fn row_actions(opts: &TableOptions<'_>, id: &str) -> RowActions {
    let update = match &opts.update_link {
        Some(link) if opts.extra_route == Some("attendance") => format!("{}&employee={}", link, id),
        Some(link) => link.clone(),
        None => format!("{}/update", record_link(opts, id)),
    };
    RowActions {
        view: record_link(opts, id),
        update,
        copy_id: id.to_string(),
    }
}

/// Serial number of the row at `index` on page `page`.
pub fn serial(page: u32, page_size: u32, index: usize) -> u64 {
    u64::from(page.max(1) - 1) * u64::from(page_size) + index as u64 + 1
}

pub fn render_table(rows: &[Value], opts: &TableOptions<'_>) -> TableView {
    let columns = infer_columns(rows);
    let rows = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let id = row.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
            let cells = columns
                .iter()
                .map(|c| {
                    let value = lookup(row, &c.key).unwrap_or(&Value::Null);
                    let title = !c.key.contains('.') && is_title_column(&c.key);
                    match value {
                        Value::String(s) if title => Cell {
                            text: truncate(s, opts.truncate),
                            href: Some(record_link(opts, &id)),
                        },
                        _ => Cell {
                            text: format_value(value, opts.truncate),
                            href: None,
                        },
                    }
                })
                .collect();
            TableRow {
                serial: serial(opts.page, opts.page_size, i),
                actions: row_actions(opts, &id),
                id,
                cells,
            }
        })
        .collect();
    TableView { columns, rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_leaves_take_the_relation_header() {
        let rows = vec![json!({
            "id": "e1",
            "full_name": "Ravi Kumar",
            "project_location_id": "x",
            "project_location": { "city": "Pune", "project": { "name": "Metro" } },
        })];
        let cols = infer_columns(&rows);
        assert_eq!(
            cols,
            vec![
                Column { key: "full_name".into(), header: "full name".into() },
                Column { key: "project_location.city".into(), header: "project location".into() },
                Column { key: "project_location.project.name".into(), header: "project".into() },
            ]
        );
    }

    #[test]
    fn columns_union_all_rows() {
        let rows = vec![json!({ "id": "1", "name": "A" }), json!({ "id": "2", "name": "B", "path": "/x", "email_suffix": "acme" })];
        let keys: Vec<String> = infer_columns(&rows).into_iter().map(|c| c.key).collect();
        assert_eq!(keys, vec!["name", "email_suffix"]);
    }

    #[test]
    fn cells_format_dates_booleans_and_long_text() {
        assert_eq!(format_value(&json!("2024-03-05"), 12), "5/3/2024");
        assert_eq!(format_value(&json!("2024-03-05T10:00:00+00:00"), 12), "5/3/2024");
        assert_eq!(format_value(&json!(true), 12), "Yes");
        assert_eq!(format_value(&json!("short text"), 12), "short text");
        assert_eq!(format_value(&json!("a very long street address line"), 12), "a very lo...");
        assert_eq!(format_value(&json!(null), 12), "");
        assert_eq!(format_value(&json!(1500), 12), "1500");
    }

    #[test]
    fn title_cells_link_to_the_record() {
        let rows = vec![json!({ "id": "c1", "name": "Acme Infrastructure Ltd", "service_charge": 5 })];
        let view = render_table(&rows, &TableOptions::new("companies", 2, 12));
        let row = &view.rows[0];
        assert_eq!(row.serial, 13);
        assert_eq!(row.cells[0].href.as_deref(), Some("/companies/c1"));
        assert_eq!(row.cells[0].text, "Acme Infr...");
        assert_eq!(row.actions.update, "/companies/c1/update");
        assert_eq!(row.actions.copy_id, "c1");
    }

    #[test]
    fn attendance_rows_use_the_alternate_update_link() {
        let mut opts = TableOptions::new("employees", 1, 10);
        opts.extra_route = Some("attendance");
        opts.update_link = Some("update?month=2&year=2024".into());
        let actions = row_actions(&opts, "e1");
        assert_eq!(actions.view, "/employees/e1/attendance");
        assert_eq!(actions.update, "update?month=2&year=2024&employee=e1");
    }
}
