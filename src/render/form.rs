//! Form view model: one control per field, with dependency-conditioned state and options.

use crate::config::{
    DefaultValue, DependencyPredicate, EntityDescriptor, FieldDescriptor, FieldKind, Storage,
};
use crate::error::FieldErrors;
use crate::service::coerce::{normalize_date, today};
use crate::service::options::{OptionItem, OptionSets};
use crate::service::validation::NO_IMAGE;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// Label of the empty pseudo-option of single pickers.
pub const NONE_LABEL: &str = "None";

/// Current values per field name, as strings.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FormValues(HashMap<String, Vec<String>>);

fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn date_input(raw: &str) -> String {
    normalize_date(raw)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| raw.to_string())
}

impl FormValues {
    /// Values of a stored record as returned by the detail query.
    pub fn from_record(descriptor: &EntityDescriptor, record: &Value) -> Self {
        let mut out = FormValues::default();
        for field in &descriptor.fields {
            let values: Vec<String> = match &field.storage {
                Storage::Column(_) => record.get(field.name).and_then(scalar_text).into_iter().collect(),
                Storage::ForeignKey { column, .. } => record.get(*column).and_then(scalar_text).into_iter().collect(),
                Storage::JoinTable { .. } => record
                    .get(field.relation.unwrap_or(field.name))
                    .and_then(Value::as_array)
                    .map(|items| items.iter().filter_map(|i| i.get("id").and_then(scalar_text)).collect())
                    .unwrap_or_default(),
                Storage::Nested { link_column, column: None, .. } => {
                    record.get(*link_column).and_then(scalar_text).into_iter().collect()
                }
                Storage::Nested { relation, column: Some((name, _)), .. } => record
                    .get(*relation)
                    .and_then(|r| r.get(*name))
                    .and_then(scalar_text)
                    .into_iter()
                    .collect(),
                Storage::Virtual => Vec::new(),
            };
            if !values.is_empty() {
                out.0.insert(field.name.to_string(), values);
            }
        }
        out
    }

    /// Values carried in the query string (prefill and dependency re-render).
    pub fn from_params(params: &[(String, String)]) -> Self {
        let mut out = FormValues::default();
        for (k, v) in params {
            if v.trim().is_empty() {
                continue;
            }
            out.0.entry(k.clone()).or_default().push(v.trim().to_string());
        }
        out
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(|v| v.first()).map(String::as_str).filter(|s| !s.is_empty())
    }

    pub fn all(&self, name: &str) -> &[String] {
        self.0.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.0.insert(name.to_string(), vec![value.into()]);
    }

    pub fn clear(&mut self, name: &str) {
        self.0.remove(name);
    }
}

/// State of a field that depends on another field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DependentState {
    Disabled,
    Enabled,
    Selected,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Input {
    Text { input_type: &'static str, value: String },
    Textarea { value: String },
    Hidden { value: String },
    File { value: String },
    Select { options: Vec<OptionItem>, selected: Option<String> },
    MultiSelect { options: Vec<OptionItem>, selected: Vec<String>, chips: Vec<String> },
    Radio { options: Vec<OptionItem>, selected: Option<String> },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Control {
    pub name: &'static str,
    pub label: String,
    pub required: bool,
    pub input: Input,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<DependentState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FormView {
    pub entity: &'static str,
    pub title: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub controls: Vec<Control>,
}

fn label_of(options: &[OptionItem], value: &str) -> Option<String> {
    options.iter().find(|o| o.value == value).map(|o| o.label.clone())
}

/// Chosen label of the parent field; radio and free-text parents use the value.
fn parent_label(field: &FieldDescriptor, values: &FormValues, options: &OptionSets) -> Option<String> {
    let value = values.get(field.name)?;
    Some(match options.get(field.name) {
        Some(opts) => label_of(opts, value).unwrap_or_else(|| value.to_string()),
        None => value.to_string(),
    })
}

/// Fill a filter-only parent from the group of the child's chosen option, so
/// stored records re-open with their parent picker set.
fn infer_virtual_parents(descriptor: &EntityDescriptor, values: &mut FormValues, options: &OptionSets) {
    for field in &descriptor.fields {
        let Some(dep) = &field.dependency else { continue };
        if dep.predicate != DependencyPredicate::Group || values.get(dep.on).is_some() {
            continue;
        }
        let parent_virtual = descriptor.field(dep.on).map(|p| !p.is_writable()).unwrap_or(false);
        if !parent_virtual {
            continue;
        }
        let group = values
            .get(field.name)
            .and_then(|v| options.get(field.name)?.iter().find(|o| o.value == v))
            .and_then(|o| o.group.clone());
        if let Some(group) = group {
            values.set(dep.on, group);
        }
    }
}

/// Apply one field's dependency: returns its state and narrows its options. A
/// selection that is no longer reachable is cleared.
pub fn resolve_dependency(
    field: &FieldDescriptor,
    descriptor: &EntityDescriptor,
    values: &mut FormValues,
    options: &mut Vec<OptionItem>,
    all_options: &OptionSets,
) -> Option<DependentState> {
    let dep = field.dependency.as_ref()?;
    let parent = descriptor.field(dep.on)?;
    let enabled = match &dep.predicate {
        DependencyPredicate::Gate(allowed) => parent_label(parent, values, all_options)
            .map(|label| allowed.iter().any(|a| a.eq_ignore_ascii_case(&label)))
            .unwrap_or(false),
        DependencyPredicate::Group => match values.get(dep.on) {
            Some(parent_value) => {
                let parent_value = parent_value.to_string();
                options.retain(|o| o.group.as_deref() == Some(parent_value.as_str()));
                true
            }
            None => false,
        },
    };
    if !enabled {
        values.clear(field.name);
        return Some(DependentState::Disabled);
    }
    let kept: Vec<String> = values
        .all(field.name)
        .iter()
        .filter(|v| options.iter().any(|o| &o.value == *v))
        .cloned()
        .collect();
    if kept.is_empty() {
        values.clear(field.name);
        Some(DependentState::Enabled)
    } else {
        values.0.insert(field.name.to_string(), kept);
        Some(DependentState::Selected)
    }
}

fn default_value(field: &FieldDescriptor) -> Option<String> {
    match field.constraint.as_ref()?.default.as_ref()? {
        DefaultValue::Text(v) => Some(v.to_string()),
        DefaultValue::Today => Some(today().format("%Y-%m-%d").to_string()),
    }
}

fn with_none(options: Vec<OptionItem>) -> Vec<OptionItem> {
    let mut out = Vec::with_capacity(options.len() + 1);
    out.push(OptionItem {
        value: String::new(),
        label: NONE_LABEL.to_string(),
        group: None,
    });
    out.extend(options);
    out
}

/// One control per field in form order. `fixed` fields (a tab's parent relation)
/// are rendered hidden with their value.
pub fn render_controls(
    descriptor: &EntityDescriptor,
    values: &FormValues,
    options: &OptionSets,
    errors: &FieldErrors,
    fixed: &[&str],
) -> Vec<Control> {
    let mut values = values.clone();
    infer_virtual_parents(descriptor, &mut values, options);

    let mut controls = Vec::with_capacity(descriptor.fields.len());
    for field in &descriptor.fields {
        let mut field_options = options.get(field.name).cloned().unwrap_or_default();
        let state = resolve_dependency(field, descriptor, &mut values, &mut field_options, options);
        let current = values.get(field.name).map(str::to_string);
        let value = match (&current, state) {
            (Some(v), _) => Some(v.clone()),
            (None, None) => default_value(field),
            (None, Some(_)) => None,
        };

        let input = if fixed.contains(&field.name) {
            Input::Hidden { value: value.unwrap_or_default() }
        } else if field.is_multi() {
            let selected = values.all(field.name).to_vec();
            let chips = selected.iter().filter_map(|v| label_of(&field_options, v)).collect();
            Input::MultiSelect {
                options: field_options,
                selected,
                chips,
            }
        } else {
            match field.kind {
                FieldKind::Text => Input::Text { input_type: "text", value: value.unwrap_or_default() },
                FieldKind::Email => Input::Text { input_type: "email", value: value.unwrap_or_default() },
                FieldKind::Number => Input::Text { input_type: "number", value: value.unwrap_or_default() },
                FieldKind::Date => Input::Text {
                    input_type: "date",
                    value: value.as_deref().map(date_input).unwrap_or_default(),
                },
                FieldKind::Textarea => Input::Textarea { value: value.unwrap_or_default() },
                FieldKind::Hidden => Input::Hidden { value: value.unwrap_or_default() },
                FieldKind::File => Input::File {
                    value: value.unwrap_or_else(|| NO_IMAGE.to_string()),
                },
                FieldKind::Select => Input::Select {
                    options: with_none(field_options),
                    selected: value,
                },
                FieldKind::Radio => Input::Radio {
                    options: with_none(field_options),
                    selected: value,
                },
            }
        };

        controls.push(Control {
            name: field.name,
            label: field.label.replace('_', " "),
            required: field.required(),
            input,
            depends_on: field.dependency.as_ref().map(|d| d.on),
            state,
            error: errors.get(field.name).map(str::to_string),
        });
    }
    controls
}

/// Create (`id: None`) or update form of an entity.
pub fn render_form(
    descriptor: &EntityDescriptor,
    id: Option<&str>,
    values: &FormValues,
    options: &OptionSets,
    fixed: &[&str],
) -> FormView {
    let route = descriptor.entity.route();
    let singular = descriptor.entity.singular();
    let (title, action) = match id {
        Some(id) => (format!("Update {}", singular), format!("/{}/{}/update", route, id)),
        None => (format!("Add {}", singular), format!("/{}/upsert", route)),
    };
    FormView {
        entity: route,
        title,
        action,
        id: id.map(str::to_string),
        controls: render_controls(descriptor, values, options, &FieldErrors::default(), fixed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{descriptor, Entity};
    use serde_json::json;

    fn item(value: &str, label: &str, group: Option<&str>) -> OptionItem {
        OptionItem {
            value: value.into(),
            label: label.into(),
            group: group.map(str::to_string),
        }
    }

    fn user_options() -> OptionSets {
        let mut o = OptionSets::new();
        o.insert("role", vec![item("r1", "client admin", None), item("r2", "project admin", None)]);
        o.insert("company", vec![item("c1", "Acme", None)]);
        o.insert("project", vec![item("p1", "Metro", None)]);
        o.insert("project_location", vec![item("l1", "Pune", None)]);
        o
    }

    fn control<'a>(controls: &'a [Control], name: &str) -> &'a Control {
        controls.iter().find(|c| c.name == name).unwrap()
    }

    #[test]
    fn gated_fields_follow_the_parent_label() {
        let d = descriptor(Entity::Users);
        let mut values = FormValues::default();
        values.set("role", "r1");
        values.set("project", "p1");
        let controls = render_controls(&d, &values, &user_options(), &FieldErrors::default(), &[]);
        assert_eq!(control(&controls, "company").state, Some(DependentState::Enabled));
        // a project chosen under another role is reset
        let project = control(&controls, "project");
        assert_eq!(project.state, Some(DependentState::Disabled));
        assert_eq!(project.input, Input::Select { options: with_none(vec![item("p1", "Metro", None)]), selected: None });
        assert_eq!(control(&controls, "role").state, None);
    }

    #[test]
    fn grouped_options_narrow_to_the_parent_value() {
        let d = descriptor(Entity::Employees);
        let mut options = OptionSets::new();
        options.insert("project", vec![item("p1", "Metro", None), item("p2", "Canal", None)]);
        options.insert(
            "project_location",
            vec![item("l1", "Pune", Some("p1")), item("l2", "Nagpur", Some("p2")), item("l3", "Thane", Some("p1"))],
        );

        let controls = render_controls(&d, &FormValues::default(), &options, &FieldErrors::default(), &[]);
        assert_eq!(control(&controls, "project_location").state, Some(DependentState::Disabled));

        let values = FormValues::from_params(&[("project".into(), "p1".into()), ("project_location".into(), "l2".into())]);
        let controls = render_controls(&d, &values, &options, &FieldErrors::default(), &[]);
        let location = control(&controls, "project_location");
        assert_eq!(location.state, Some(DependentState::Enabled));
        let Input::Select { options, selected } = &location.input else { panic!("select expected") };
        let labels: Vec<&str> = options.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, vec!["None", "Pune", "Thane"]);
        assert_eq!(*selected, None);
    }

    #[test]
    fn stored_records_reopen_with_their_virtual_parent() {
        let d = descriptor(Entity::Employees);
        let mut options = OptionSets::new();
        options.insert("project", vec![item("p1", "Metro", None)]);
        options.insert("project_location", vec![item("l1", "Pune", Some("p1"))]);
        let record = json!({
            "id": "e1",
            "full_name": "Asha Rao",
            "project_location_id": "l1",
            "bank_detail_id": "b1",
            "bank_detail": { "account_number": "1234" },
            "date_of_birth": "1990-04-02",
        });
        let values = FormValues::from_record(&d, &record);
        assert_eq!(values.get("project_location"), Some("l1"));
        assert_eq!(values.get("account_number"), Some("1234"));
        let controls = render_controls(&d, &values, &options, &FieldErrors::default(), &[]);
        assert_eq!(control(&controls, "project").input, Input::Select { options: with_none(vec![item("p1", "Metro", None)]), selected: Some("p1".into()) });
        assert_eq!(control(&controls, "project_location").state, Some(DependentState::Selected));
        assert_eq!(control(&controls, "date_of_birth").input, Input::Text { input_type: "date", value: "1990-04-02".into() });
    }

    #[test]
    fn empty_fields_show_defaults_and_the_no_image_sentinel() {
        let d = descriptor(Entity::Companies);
        let form = render_form(&d, None, &FormValues::default(), &OptionSets::new(), &[]);
        assert_eq!(form.action, "/companies/upsert");
        assert_eq!(control(&form.controls, "photo").input, Input::File { value: NO_IMAGE.into() });
        let Input::Radio { selected, .. } = &control(&form.controls, "service_charge_field").input else { panic!("radio expected") };
        assert_eq!(selected.as_deref(), Some("all"));
    }

    #[test]
    fn radios_start_from_none_without_a_default() {
        let d = descriptor(Entity::ProjectLocations);
        let mut options = OptionSets::new();
        options.insert("state", vec![item("goa", "goa", None), item("kerala", "kerala", None)]);
        let controls = render_controls(&d, &FormValues::default(), &options, &FieldErrors::default(), &[]);
        let Input::Radio { options, selected } = &control(&controls, "state").input else { panic!("radio expected") };
        let labels: Vec<&str> = options.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, vec!["None", "goa", "kerala"]);
        assert_eq!(options[0].value, "");
        assert_eq!(*selected, None);
    }

    #[test]
    fn multi_select_shows_selected_labels_as_chips() {
        let d = descriptor(Entity::ProjectLocations);
        let mut options = OptionSets::new();
        options.insert("payment_field", vec![item("a", "Basic", None), item("b", "Bonus", None)]);
        let record = json!({ "id": "x", "city": "Pune", "payment_field": [{ "id": "b", "name": "Bonus" }] });
        let values = FormValues::from_record(&d, &record);
        let form = render_form(&d, Some("x"), &values, &options, &[]);
        assert_eq!(form.action, "/project_locations/x/update");
        let Input::MultiSelect { chips, selected, .. } = &control(&form.controls, "payment_field").input else { panic!("multi expected") };
        assert_eq!(selected, &vec!["b".to_string()]);
        assert_eq!(chips, &vec!["Bonus".to_string()]);
    }
}
