//! List page view model: table, filter pickers, applied filters and paging.

use crate::config::{EntityDescriptor, FilterPicker};
use crate::render::table::TableView;
use crate::service::filter::{applied_filters, PageWindow};
use crate::service::options::{OptionItem, OptionSets};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FilterControl {
    pub name: &'static str,
    pub label: String,
    /// text, number, date or options
    pub picker: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub last_page: u32,
    pub total: i64,
    pub has_prev: bool,
    pub has_next: bool,
}

impl Pagination {
    pub fn new(window: PageWindow, total: i64) -> Self {
        let last_page = window.last_page(total);
        Pagination {
            page: window.page,
            last_page,
            total,
            has_prev: window.page > 1,
            has_next: window.page < last_page,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ListView {
    pub entity: &'static str,
    pub title: &'static str,
    pub table: TableView,
    pub filters: Vec<FilterControl>,
    pub applied: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    pub pagination: Pagination,
    pub import_export: bool,
    pub imported: bool,
}

pub fn filter_controls(descriptor: &EntityDescriptor, options: &OptionSets, params: &[(String, String)]) -> Vec<FilterControl> {
    descriptor
        .filters
        .iter()
        .map(|f| {
            let picker = match f.picker {
                FilterPicker::Text => "text",
                FilterPicker::Number => "number",
                FilterPicker::Date => "date",
                FilterPicker::Options(_) => "options",
            };
            FilterControl {
                name: f.name,
                label: f.label.replace('_', " "),
                picker,
                options: options.get(f.name).cloned().unwrap_or_default(),
                value: params.iter().find(|(k, _)| k == f.name).map(|(_, v)| v.clone()),
            }
        })
        .collect()
}

pub fn render_list(
    descriptor: &EntityDescriptor,
    table: TableView,
    options: &OptionSets,
    params: &[(String, String)],
    search: Option<String>,
    pagination: Pagination,
) -> ListView {
    let flag = |name: &str| params.iter().any(|(k, v)| k == name && v == "true");
    ListView {
        entity: descriptor.entity.route(),
        title: descriptor.entity.route(),
        table,
        filters: filter_controls(descriptor, options, params),
        applied: applied_filters(params),
        search,
        pagination,
        import_export: descriptor.entity.import_export(),
        imported: flag("imported"),
    }
}
