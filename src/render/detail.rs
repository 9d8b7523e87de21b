//! Detail view model: labelled values, the image, tabs and letter links.

use crate::config::{EntityDescriptor, TabTarget};
use crate::render::table::format_value;
use serde::Serialize;
use serde_json::Value;

const SKIPPED: [&str; 3] = ["id", "created_at", "updated_at"];
/// Detail values are shown in full up to this many characters.
const DETAIL_TRUNCATE: usize = 32;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DetailField {
    pub label: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Link {
    pub name: String,
    pub href: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetailView {
    pub entity: &'static str,
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub fields: Vec<DetailField>,
    pub tabs: Vec<Link>,
    pub letters: Vec<Link>,
    pub update: String,
    pub delete: String,
}

fn is_identifier(key: &str) -> bool {
    key.starts_with("id") || key.ends_with("_id")
}

fn human(key: &str) -> String {
    key.replace(['_', '-'], " ")
}

/// Labelled values of a record. Nested relation values are labelled
/// "relation - column"; identifiers, timestamps and empty values are left out.
pub fn detail_fields(record: &Value, image_field: Option<&str>) -> Vec<DetailField> {
    let Value::Object(map) = record else { return Vec::new() };
    let mut out = Vec::new();
    for (key, value) in map {
        if SKIPPED.contains(&key.as_str()) || is_identifier(key) || Some(key.as_str()) == image_field {
            continue;
        }
        match value {
            Value::Null => {}
            Value::Object(inner) => {
                for (k, v) in inner {
                    if is_identifier(k) || SKIPPED.contains(&k.as_str()) || v.is_null() {
                        continue;
                    }
                    let text = format_value(v, DETAIL_TRUNCATE);
                    if !text.is_empty() {
                        out.push(DetailField {
                            label: format!("{} - {}", human(key), human(k)),
                            value: text,
                        });
                    }
                }
            }
            _ => out.push(DetailField {
                label: human(key),
                value: format_value(value, DETAIL_TRUNCATE),
            }),
        }
    }
    out
}

pub fn render_detail(descriptor: &EntityDescriptor, record: &Value) -> DetailView {
    let route = descriptor.entity.route();
    let id = record.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
    let title = record
        .get(descriptor.entity.title_field())
        .and_then(Value::as_str)
        .unwrap_or(descriptor.entity.singular())
        .to_string();
    let image_field = descriptor.file_field().map(|f| f.name);
    let image = image_field
        .and_then(|f| record.get(f))
        .and_then(Value::as_str)
        .map(str::to_string);
    let base = format!("/{}/{}", route, id);
    let tabs = descriptor
        .tabs
        .iter()
        .map(|t| Link {
            name: human(t.name),
            href: match t.target {
                TabTarget::Attendance => format!("{}/attendance", base),
                _ => format!("{}/{}", base, t.name),
            },
        })
        .collect();
    let letters = descriptor
        .letters
        .iter()
        .map(|l| Link {
            name: human(l),
            href: format!("{}/generate?letter={}", base, l),
        })
        .collect();
    DetailView {
        entity: route,
        title,
        image,
        fields: detail_fields(record, image_field),
        tabs,
        letters,
        update: format!("{}/update", base),
        delete: format!("{}/delete", base),
        id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{descriptor, Entity};
    use serde_json::json;

    #[test]
    fn nested_values_are_labelled_with_their_relation() {
        let record = json!({
            "id": "e1",
            "full_name": "Asha Rao",
            "photo": "https://bucket/x.png",
            "project_location_id": "l1",
            "exit_date": null,
            "joining_date": "2023-06-01",
            "project_location": { "city": "Pune" },
            "created_at": "2023-06-01T00:00:00+00:00",
        });
        let view = render_detail(&descriptor(Entity::Employees), &record);
        assert_eq!(view.title, "Asha Rao");
        assert_eq!(view.image.as_deref(), Some("https://bucket/x.png"));
        assert_eq!(
            view.fields,
            vec![
                DetailField { label: "full name".into(), value: "Asha Rao".into() },
                DetailField { label: "joining date".into(), value: "1/6/2023".into() },
                DetailField { label: "project location - city".into(), value: "Pune".into() },
            ]
        );
        assert!(view.tabs.iter().any(|t| t.href == "/employees/e1/attendance"));
        assert_eq!(view.letters[0].href, "/employees/e1/generate?letter=notice");
        assert_eq!(view.delete, "/employees/e1/delete");
    }
}
