//! Translate validated values into a write payload: owner columns, flattened 1:1 rows
//! and join-table connect/disconnect sets.

use crate::config::{EntityDescriptor, FieldKind, SqlType, Storage};
use crate::service::coerce::{parse_bool, NumberValue};
use crate::service::validation::{FieldValue, ValidatedValues};
use crate::sql::SqlValue;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Update,
}

/// A flattened 1:1 row (e.g. bank details) written alongside its owner.
#[derive(Clone, Debug, PartialEq)]
pub struct NestedWrite {
    pub relation: &'static str,
    pub table: &'static str,
    /// Owner column holding the nested row id.
    pub link_column: &'static str,
    pub existing_id: Option<Uuid>,
    pub columns: Vec<(&'static str, SqlValue)>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RelationChange {
    pub field: &'static str,
    pub join_table: &'static str,
    pub owner_column: &'static str,
    pub target_column: &'static str,
    pub connect: Vec<Uuid>,
    pub disconnect: Vec<Uuid>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct WritePayload {
    pub columns: Vec<(&'static str, SqlValue)>,
    pub nested: Vec<NestedWrite>,
    pub relations: Vec<RelationChange>,
}

impl WritePayload {
    pub fn column(&self, name: &str) -> Option<&SqlValue> {
        self.columns.iter().find(|(c, _)| *c == name).map(|(_, v)| v)
    }
}

/// Previously connected targets of multi relations, keyed by field name.
pub type PreviousLinks = HashMap<&'static str, Vec<Uuid>>;

pub struct SelectorBuilder;

impl SelectorBuilder {
    pub fn build(
        descriptor: &EntityDescriptor,
        values: &ValidatedValues,
        mode: WriteMode,
        previous: &PreviousLinks,
    ) -> WritePayload {
        let mut payload = WritePayload::default();
        let mut nested: Vec<NestedWrite> = Vec::new();

        for field in &descriptor.fields {
            if field.name == "id" {
                continue;
            }
            let Some(value) = values.get(field.name) else { continue };
            match &field.storage {
                Storage::Virtual => {}
                Storage::Column(sql_type) => {
                    if let Some(v) = column_value(field.kind, *sql_type, value) {
                        payload.columns.push((field.name, v));
                    } else {
                        tracing::debug!(field = field.name, "value without a column form skipped");
                    }
                }
                Storage::ForeignKey { column, .. } => {
                    if let Some(id) = value.as_text().and_then(|s| Uuid::parse_str(s).ok()) {
                        payload.columns.push((*column, SqlValue::Uuid(id)));
                    }
                }
                Storage::Nested {
                    relation,
                    table,
                    link_column,
                    column,
                } => {
                    let slot = match nested.iter().position(|n| n.relation == *relation) {
                        Some(i) => i,
                        None => {
                            nested.push(NestedWrite {
                                relation: *relation,
                                table: *table,
                                link_column: *link_column,
                                existing_id: None,
                                columns: Vec::new(),
                            });
                            nested.len() - 1
                        }
                    };
                    match column {
                        None => {
                            nested[slot].existing_id = value.as_text().and_then(|s| Uuid::parse_str(s).ok());
                        }
                        Some((name, sql_type)) => {
                            if let Some(v) = column_value(field.kind, *sql_type, value) {
                                nested[slot].columns.push((*name, v));
                            }
                        }
                    }
                }
                Storage::JoinTable {
                    table,
                    owner_column,
                    target_column,
                    ..
                } => {
                    let FieldValue::Many(ids) = value else { continue };
                    let next: Vec<Uuid> = ids.iter().filter_map(|s| Uuid::parse_str(s).ok()).collect();
                    let (connect, disconnect) = match mode {
                        WriteMode::Create => (dedup(next), Vec::new()),
                        WriteMode::Update => {
                            let prev = previous.get(field.name).map(Vec::as_slice).unwrap_or(&[]);
                            diff_selection(prev, &next)
                        }
                    };
                    payload.relations.push(RelationChange {
                        field: field.name,
                        join_table: *table,
                        owner_column: *owner_column,
                        target_column: *target_column,
                        connect,
                        disconnect,
                    });
                }
            }
        }

        payload.nested = nested
            .into_iter()
            .filter(|n| !n.columns.is_empty())
            .collect();
        apply_exclusive_groups(descriptor, values, mode, &mut payload);
        payload
    }
}

/// Keep only the last member of each exclusive group that carries a value. On update
/// every other member is cleared; on create the others are simply left out.
fn apply_exclusive_groups(
    descriptor: &EntityDescriptor,
    values: &ValidatedValues,
    mode: WriteMode,
    payload: &mut WritePayload,
) {
    for group in &descriptor.exclusive_groups {
        let chosen = descriptor
            .fields
            .iter()
            .filter(|f| group.contains(&f.name) && values.contains(f.name))
            .last()
            .map(|f| f.name);
        let Some(chosen) = chosen else { continue };
        for member in group.iter().filter(|m| **m != chosen) {
            let Some(Storage::ForeignKey { column, .. }) = descriptor.field(member).map(|f| &f.storage) else {
                continue;
            };
            payload.columns.retain(|(c, _)| c != column);
            if mode == WriteMode::Update {
                payload.columns.push((*column, SqlValue::Null));
            }
        }
    }
}

fn column_value(kind: FieldKind, sql_type: SqlType, value: &FieldValue) -> Option<SqlValue> {
    Some(match value {
        FieldValue::Text(s) => {
            if kind == FieldKind::Radio || sql_type == SqlType::Boolean {
                match parse_bool(s) {
                    Some(b) => SqlValue::Bool(b),
                    None => SqlValue::Text(s.clone()),
                }
            } else {
                SqlValue::Text(s.clone())
            }
        }
        FieldValue::Number(NumberValue::Integer(n)) => SqlValue::Int(*n),
        FieldValue::Number(NumberValue::Decimal(n)) => SqlValue::Float(*n),
        FieldValue::Date(d) => SqlValue::Date(*d),
        FieldValue::Upload(_) | FieldValue::Many(_) => return None,
    })
}

fn dedup(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut out: Vec<Uuid> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

/// Replace-by-diff: returns (connect, disconnect). Targets in both sets are untouched.
pub fn diff_selection(previous: &[Uuid], next: &[Uuid]) -> (Vec<Uuid>, Vec<Uuid>) {
    let connect = dedup(next.iter().filter(|id| !previous.contains(id)).copied().collect());
    let disconnect = dedup(previous.iter().filter(|id| !next.contains(id)).copied().collect());
    (connect, disconnect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{descriptor, Entity};
    use crate::service::input::FormInput;
    use crate::service::validation::SchemaValidator;

    const A: &str = "00000000-0000-4000-8000-00000000000a";
    const B: &str = "00000000-0000-4000-8000-00000000000b";
    const C: &str = "00000000-0000-4000-8000-00000000000c";
    const PROJECT: &str = "7f1b7a4e-3f51-4d4a-9d6b-2a0a1c9c2b11";

    fn id(s: &str) -> Uuid {
        Uuid::parse_str(s).unwrap()
    }

    fn validated(entity: Entity, pairs: &[(&str, &str)]) -> ValidatedValues {
        SchemaValidator::validate(&descriptor(entity), &FormInput::from_pairs(pairs.iter().copied())).unwrap()
    }

    #[test]
    fn multi_selection_is_replaced_by_diff() {
        let values = validated(
            Entity::ProjectLocations,
            &[
                ("city", "Pune"),
                ("state", "Maharashtra"),
                ("project", PROJECT),
                ("payment_field", B),
                ("payment_field", C),
            ],
        );
        let mut previous = PreviousLinks::new();
        previous.insert("payment_field", vec![id(A), id(B)]);
        let payload = SelectorBuilder::build(&descriptor(Entity::ProjectLocations), &values, WriteMode::Update, &previous);
        assert_eq!(payload.relations.len(), 1);
        let change = &payload.relations[0];
        assert_eq!(change.join_table, "project_location_payment_fields");
        assert_eq!(change.owner_column, "project_location_id");
        assert_eq!(change.connect, vec![id(C)]);
        assert_eq!(change.disconnect, vec![id(A)]);
    }

    #[test]
    fn create_connects_everything() {
        let values = validated(
            Entity::PaymentFields,
            &[("name", "Basic"), ("description", "base pay"), ("project_location", A), ("project_location", A)],
        );
        let payload = SelectorBuilder::build(&descriptor(Entity::PaymentFields), &values, WriteMode::Create, &PreviousLinks::new());
        assert_eq!(payload.relations[0].connect, vec![id(A)]);
        assert!(payload.relations[0].disconnect.is_empty());
        assert_eq!(payload.column("type"), Some(&SqlValue::Text("fixed".into())));
    }

    #[test]
    fn choosing_one_group_member_clears_siblings_on_update() {
        let values = validated(
            Entity::Users,
            &[
                ("full_name", "Meera Shah"),
                ("designation", "Manager"),
                ("role", A),
                ("email", "meera@example.com"),
                ("project", PROJECT),
            ],
        );
        let d = descriptor(Entity::Users);
        let payload = SelectorBuilder::build(&d, &values, WriteMode::Update, &PreviousLinks::new());
        assert_eq!(payload.column("project_id"), Some(&SqlValue::Uuid(id(PROJECT))));
        assert_eq!(payload.column("company_id"), Some(&SqlValue::Null));
        assert_eq!(payload.column("project_location_id"), Some(&SqlValue::Null));

        let payload = SelectorBuilder::build(&d, &values, WriteMode::Create, &PreviousLinks::new());
        assert_eq!(payload.column("company_id"), None);
        assert_eq!(payload.column("project_location_id"), None);
    }

    #[test]
    fn last_group_member_with_a_value_wins() {
        let values = validated(
            Entity::Documents,
            &[("label", "Lease"), ("belongs_to", "vehicle"), ("company", A), ("vehicle", B)],
        );
        let payload = SelectorBuilder::build(&descriptor(Entity::Documents), &values, WriteMode::Update, &PreviousLinks::new());
        assert_eq!(payload.column("vehicle_id"), Some(&SqlValue::Uuid(id(B))));
        assert_eq!(payload.column("company_id"), Some(&SqlValue::Null));
        assert_eq!(payload.columns.iter().filter(|(c, _)| *c == "company_id").count(), 1);
    }

    #[test]
    fn radio_booleans_and_numbers_are_coerced() {
        let values = validated(
            Entity::Advances,
            &[("label", "March advance"), ("amount", "1500"), ("credited", "true")],
        );
        let payload = SelectorBuilder::build(&descriptor(Entity::Advances), &values, WriteMode::Create, &PreviousLinks::new());
        assert_eq!(payload.column("credited"), Some(&SqlValue::Bool(true)));
        assert_eq!(payload.column("amount"), Some(&SqlValue::Int(1500)));
        assert!(matches!(payload.column("payment_date"), Some(SqlValue::Date(_))));
        assert_eq!(payload.column("project"), None);
    }

    #[test]
    fn flattened_bank_details_become_one_nested_write() {
        let values = validated(
            Entity::Employees,
            &[
                ("full_name", "Asha Rao"),
                ("guardian_name", "R Rao"),
                ("project_location", PROJECT),
                ("employee_code", "E1"),
                ("bank_detail_id", A),
                ("account_number", "12345678"),
                ("ifsc_code", "SBIN0001"),
            ],
        );
        let payload = SelectorBuilder::build(&descriptor(Entity::Employees), &values, WriteMode::Update, &PreviousLinks::new());
        assert_eq!(payload.nested.len(), 1);
        let bank = &payload.nested[0];
        assert_eq!(bank.table, "bank_details");
        assert_eq!(bank.link_column, "bank_detail_id");
        assert_eq!(bank.existing_id, Some(id(A)));
        assert_eq!(
            bank.columns,
            vec![
                ("account_number", SqlValue::Text("12345678".into())),
                ("ifsc_code", SqlValue::Text("SBIN0001".into())),
            ]
        );
        assert_eq!(payload.column("bank_detail_id"), None);
    }

    #[test]
    fn diff_leaves_unchanged_targets_alone() {
        let (connect, disconnect) = diff_selection(&[id(A), id(B)], &[id(A), id(B)]);
        assert!(connect.is_empty() && disconnect.is_empty());
        let (connect, disconnect) = diff_selection(&[], &[id(C)]);
        assert_eq!((connect, disconnect), (vec![id(C)], vec![]));
    }
}
