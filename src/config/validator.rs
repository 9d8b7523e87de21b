//! Registry validation: rule coverage, field references and the dependency graph.

use crate::config::types::*;
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};

pub fn validate(descriptors: &[EntityDescriptor]) -> Result<(), ConfigError> {
    for d in descriptors {
        validate_entity(d)?;
    }
    Ok(())
}

fn validate_entity(d: &EntityDescriptor) -> Result<(), ConfigError> {
    let entity = d.entity.route();
    let mut names = HashSet::new();
    for f in &d.fields {
        if !names.insert(f.name) {
            return Err(ConfigError::Validation(format!("{}: duplicate field '{}'", entity, f.name)));
        }
        match (f.is_writable(), f.constraint.is_some()) {
            (true, false) => {
                return Err(ConfigError::MissingRule {
                    entity,
                    field: f.name,
                })
            }
            (false, true) => {
                return Err(ConfigError::Validation(format!(
                    "{}: filter-only field '{}' must not carry a rule",
                    entity, f.name
                )))
            }
            _ => {}
        }
        if let Storage::ForeignKey { column, .. } = &f.storage {
            if !column.ends_with("_id") || *column == "unknown_id" {
                return Err(ConfigError::Validation(format!(
                    "{}: relation '{}' has no foreign key column",
                    entity, f.name
                )));
            }
        }
    }
    if d.field(d.entity.title_field()).is_none() {
        return Err(ConfigError::UnknownField {
            entity,
            field: d.entity.title_field().to_string(),
        });
    }

    validate_dependencies(d)?;

    for group in &d.exclusive_groups {
        for member in group.iter() {
            let f = d.field(member).ok_or_else(|| ConfigError::UnknownField {
                entity,
                field: member.to_string(),
            })?;
            if !matches!(f.storage, Storage::ForeignKey { .. }) {
                return Err(ConfigError::Validation(format!(
                    "{}: exclusive group member '{}' is not a single relation",
                    entity, member
                )));
            }
        }
    }

    let mut filter_names = HashSet::new();
    for filter in &d.filters {
        if matches!(filter.name, "search" | "page") || !filter_names.insert(filter.name) {
            return Err(ConfigError::Validation(format!(
                "{}: filter name '{}' is reserved or duplicated",
                entity, filter.name
            )));
        }
    }
    Ok(())
}

/// Edges point from a field to the field it depends on. The graph must be acyclic
/// and at most one level deep: a parent may not itself depend on anything.
fn validate_dependencies(d: &EntityDescriptor) -> Result<(), ConfigError> {
    let entity = d.entity.route();
    let mut edges: HashMap<&str, &str> = HashMap::new();
    for f in &d.fields {
        let Some(dep) = &f.dependency else { continue };
        let parent = d.field(dep.on).ok_or_else(|| ConfigError::UnknownField {
            entity,
            field: dep.on.to_string(),
        })?;
        match &dep.predicate {
            DependencyPredicate::Gate(values) => {
                if values.is_empty() || parent.options.is_none() {
                    return Err(ConfigError::Validation(format!(
                        "{}: '{}' gates on '{}' which offers no choices",
                        entity, f.name, dep.on
                    )));
                }
            }
            DependencyPredicate::Group => {
                let grouped = matches!(f.options, Some(OptionSource::Table { group: Some(_), .. }));
                if !grouped {
                    return Err(ConfigError::Validation(format!(
                        "{}: '{}' is grouped by '{}' without a group key",
                        entity, f.name, dep.on
                    )));
                }
            }
        }
        edges.insert(f.name, dep.on);
    }

    for start in edges.keys() {
        let mut seen = HashSet::new();
        let mut cur = *start;
        while let Some(next) = edges.get(cur) {
            if !seen.insert(cur) || *next == *start {
                return Err(ConfigError::DependencyCycle {
                    entity,
                    field: start.to_string(),
                });
            }
            cur = *next;
        }
    }

    for (child, parent) in &edges {
        if edges.contains_key(parent) {
            return Err(ConfigError::DependencyDepth {
                entity,
                field: child.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::entities::descriptor;

    fn all() -> Vec<EntityDescriptor> {
        Entity::ALL.into_iter().map(descriptor).collect()
    }

    #[test]
    fn shipped_registry_is_valid() {
        validate(&all()).unwrap();
    }

    #[test]
    fn rejects_cycles() {
        let mut d = descriptor(Entity::Documents);
        for f in d.fields.iter_mut() {
            if f.name == "belongs_to" {
                f.dependency = Some(Dependency {
                    on: "company",
                    predicate: DependencyPredicate::Gate(&["x"]),
                });
            }
        }
        let err = validate(&[d]).unwrap_err();
        assert!(matches!(err, ConfigError::DependencyCycle { .. }), "{:?}", err);
    }

    #[test]
    fn rejects_two_level_chains() {
        let mut d = descriptor(Entity::Users);
        for f in d.fields.iter_mut() {
            if f.name == "project_location" {
                f.dependency = Some(Dependency {
                    on: "company",
                    predicate: DependencyPredicate::Gate(&["acme"]),
                });
            }
        }
        let err = validate(&[d]).unwrap_err();
        assert!(matches!(err, ConfigError::DependencyDepth { .. }), "{:?}", err);
    }

    #[test]
    fn rejects_unknown_parent() {
        let mut d = descriptor(Entity::Vehicles);
        d.fields.push(FieldDescriptor::text("nickname", Rule::Text { min: 1, max: 5, pattern: None }).gated_by("colour", &["red"]));
        let err = validate(&[d]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownField { .. }));
    }

    #[test]
    fn writable_fields_need_a_rule() {
        let mut d = descriptor(Entity::Companies);
        d.fields[0].constraint = None;
        let err = validate(&[d]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRule { field: "name", .. }));
    }
}
