//! Query string → read predicate and page window, and the filter form that
//! rewrites the query string of a list view.

use crate::config::{Comparison, EntityDescriptor, FilterDef, SqlType};
use crate::service::coerce::{normalize_date, parse_bool, parse_number, NumberValue};
use crate::sql::{CompareOp, Predicate, SqlValue};
use once_cell::sync::Lazy;
use regex::Regex;

pub const PAGE_SIZE: u32 = 12;
pub const TAB_PAGE_SIZE: u32 = 10;

/// Keys the list view owns; never treated as filters.
const RESERVED: [&str; 4] = ["page", "search", "imported", "export"];

static SEARCH_NOISE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9\s]").expect("static pattern"));

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub size: u32,
}

impl PageWindow {
    pub fn new(page: u32, size: u32) -> Self {
        PageWindow { page: page.max(1), size }
    }

    /// Rows skipped before this page; saturates at the largest bigint.
    pub fn offset(&self) -> u64 {
        let skipped = u64::from(self.page.saturating_sub(1)).saturating_mul(u64::from(self.size));
        skipped.min(i64::MAX as u64)
    }

    pub fn limit(&self) -> u32 {
        self.size
    }

    /// Last page for `total` rows; at least 1.
    pub fn last_page(&self, total: i64) -> u32 {
        if total <= 0 || self.size == 0 {
            return 1;
        }
        let pages = (total as u64).div_ceil(u64::from(self.size));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReadQuery {
    pub predicate: Predicate,
    pub window: PageWindow,
    pub search: Option<String>,
}

/// Empty, "0" and "none" mean the parameter is not set.
pub fn is_absent(value: &str) -> bool {
    let v = value.trim();
    v.is_empty() || v == "0" || v.eq_ignore_ascii_case("none")
}

/// Free-text search with punctuation stripped; `None` when nothing remains.
pub fn sanitize_search(raw: &str) -> Option<String> {
    let cleaned = SEARCH_NOISE.replace_all(raw, "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

fn param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
        .filter(|v| !is_absent(v))
}

pub fn page_param(params: &[(String, String)]) -> u32 {
    param(params, "page")
        .and_then(|p| p.trim().parse::<u32>().ok())
        .unwrap_or(1)
        .max(1)
}

fn number_value(n: NumberValue) -> SqlValue {
    match n {
        NumberValue::Integer(i) => SqlValue::Int(i),
        NumberValue::Decimal(d) => SqlValue::Float(d),
    }
}

/// Typed comparison value for a filter, or `None` if it does not parse.
fn typed_value(filter: &FilterDef, raw: &str) -> Option<SqlValue> {
    let raw = raw.trim();
    match filter.value_type {
        SqlType::Text => Some(SqlValue::Text(raw.to_string())),
        SqlType::Boolean => parse_bool(raw).map(SqlValue::Bool),
        SqlType::BigInt | SqlType::Double => parse_number(raw).map(number_value),
        SqlType::Date | SqlType::Timestamptz => normalize_date(raw).map(SqlValue::Date),
        SqlType::Uuid => uuid::Uuid::parse_str(raw).ok().map(SqlValue::Uuid),
    }
}

pub struct QueryFilterBuilder;

impl QueryFilterBuilder {
    /// Search (OR across the entity's searchable columns) AND each set filter,
    /// plus the requested page.
    pub fn build(descriptor: &EntityDescriptor, params: &[(String, String)], page_size: u32) -> ReadQuery {
        let mut parts = Vec::new();
        let search = param(params, "search").and_then(sanitize_search);
        if let Some(term) = &search {
            parts.push(Predicate::Or(
                descriptor
                    .search
                    .iter()
                    .map(|path| Predicate::Compare {
                        path: path.clone(),
                        op: CompareOp::Contains,
                        value: SqlValue::Text(term.clone()),
                        value_type: SqlType::Text,
                    })
                    .collect(),
            ));
        }

        for filter in &descriptor.filters {
            let Some(raw) = param(params, filter.name) else { continue };
            let op = match filter.comparison {
                Comparison::Substring => CompareOp::Contains,
                Comparison::Equality => CompareOp::Eq,
                Comparison::Range => CompareOp::Gte,
            };
            let value = if op == CompareOp::Contains {
                Some(SqlValue::Text(raw.trim().to_string()))
            } else {
                typed_value(filter, raw)
            };
            let Some(value) = value else {
                tracing::warn!(entity = ?descriptor.entity, filter = filter.name, value = raw, "ignoring unparsable filter value");
                continue;
            };
            parts.push(Predicate::Compare {
                path: filter.path.clone(),
                op,
                value,
                // integer columns still accept decimal bounds
                value_type: match filter.value_type {
                    SqlType::BigInt => SqlType::Double,
                    other => other,
                },
            });
        }

        ReadQuery {
            predicate: Predicate::and(parts),
            window: PageWindow::new(page_param(params), page_size),
            search,
        }
    }
}

/// "k = v" entries for the filters currently applied, in query order.
pub fn applied_filters(params: &[(String, String)]) -> Vec<String> {
    params
        .iter()
        .filter(|(k, v)| !RESERVED.contains(&k.as_str()) && !k.contains("Dependency") && !is_absent(v))
        .map(|(k, v)| format!("{} = {}", k, v))
        .collect()
}

fn set_param(query: &mut Vec<(String, String)>, key: &str, value: Option<String>) {
    query.retain(|(k, _)| k != key);
    if let Some(v) = value {
        query.push((key.to_string(), v));
    }
}

/// Apply a submitted filter form to the current list query string and return
/// the new one. Filter changes reset the page to 1.
pub fn apply_filter_form(current: &[(String, String)], form: &[(String, String)]) -> Vec<(String, String)> {
    let mut query: Vec<(String, String)> = current.to_vec();
    let field = |name: &str| form.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str());

    if field("deleteAll").is_some() {
        query.retain(|(k, _)| k == "search");
        return query;
    }
    if let Some(key) = field("delete") {
        let key = key.split(" = ").next().unwrap_or(key).trim();
        set_param(&mut query, key, None);
        set_param(&mut query, "page", Some("1".into()));
        return query;
    }

    let page_controls = ["first", "prev", "next", "last"];
    if let Some(control) = page_controls.iter().find(|c| field(c).is_some()) {
        let page = field("page").and_then(|p| p.trim().parse::<u32>().ok()).unwrap_or(1).max(1);
        let last = field("last_page").and_then(|p| p.trim().parse::<u32>().ok()).unwrap_or(page).max(1);
        let target = match *control {
            "first" => 1,
            "prev" => page.saturating_sub(1).max(1),
            "next" => page.saturating_add(1).min(last),
            _ => last,
        };
        set_param(&mut query, "page", Some(target.to_string()));
        return query;
    }

    let mut changed = false;
    if let Some(all) = field("all-filters") {
        for entry in all.split("--") {
            if let Some((k, v)) = entry.split_once(" = ") {
                let key = k.trim().to_string();
                if key.is_empty() {
                    continue;
                }
                let value = v.trim().to_lowercase();
                set_param(&mut query, &key, (!is_absent(&value)).then_some(value));
                changed = true;
            }
        }
    }
    for (k, v) in form {
        if matches!(k.as_str(), "all-filters" | "page" | "last_page") {
            continue;
        }
        let value = v.trim().to_lowercase();
        set_param(&mut query, k, (!is_absent(&value)).then_some(value));
        changed = true;
    }
    if changed {
        set_param(&mut query, "page", Some("1".into()));
    }
    query
}

/// Encode pairs as a query string (without the leading '?').
pub fn encode_query(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}
