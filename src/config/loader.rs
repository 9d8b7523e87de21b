//! Build the resolved model from the static descriptors.

use crate::config::entities::{descriptor, USER_ROLES};
use crate::config::resolved::{ColumnInfo, OnDelete, ResolvedEntity, ResolvedModel, TableDef};
use crate::config::types::{Entity, EntityDescriptor, SqlType, Storage};
use crate::config::validator::validate;
use crate::error::ConfigError;
use std::collections::{BTreeMap, HashSet};

pub const ATTENDANCE_TABLE: &str = "attendances";
pub const ROLE_TABLE: &str = "user_roles";

/// Resolve every entity into its table and validate the registry. Runs once at startup.
pub fn resolve(schema_name: &str) -> Result<ResolvedModel, ConfigError> {
    let descriptors: Vec<EntityDescriptor> = Entity::ALL.into_iter().map(descriptor).collect();
    validate(&descriptors)?;

    let mut tables: Vec<TableDef> = Vec::new();
    tables.push(role_table());
    let mut nested: BTreeMap<&'static str, Vec<ColumnInfo>> = BTreeMap::new();
    let mut join_tables: Vec<TableDef> = Vec::new();
    let mut entities = Vec::with_capacity(descriptors.len());

    for d in descriptors {
        let table = entity_table(&d);
        for f in &d.fields {
            match &f.storage {
                Storage::Nested {
                    table: nested_table,
                    column: Some((name, sql_type)),
                    ..
                } => nested
                    .entry(*nested_table)
                    .or_default()
                    .push(ColumnInfo::new(name, *sql_type)),
                Storage::JoinTable {
                    table: join,
                    owner_column,
                    target_column,
                    target,
                    ..
                } => {
                    if !join_tables.iter().any(|t| t.name == *join) {
                        join_tables.push(TableDef {
                            name: join.to_string(),
                            columns: vec![
                                ColumnInfo::new(owner_column, SqlType::Uuid)
                                    .not_null()
                                    .references(d.entity.table(), OnDelete::Cascade),
                                ColumnInfo::new(target_column, SqlType::Uuid)
                                    .not_null()
                                    .references(target, OnDelete::Cascade),
                            ],
                            unique: vec![vec![*owner_column, *target_column]],
                            seed: Vec::new(),
                        });
                    }
                }
                _ => {}
            }
        }
        tables.push(table.clone());
        entities.push(ResolvedEntity {
            entity: d.entity,
            schema_name: schema_name.to_string(),
            table,
            descriptor: d,
        });
    }

    for (name, columns) in nested {
        let mut all = vec![id_column()];
        all.extend(columns);
        all.extend(timestamps());
        tables.push(TableDef {
            name: name.to_string(),
            columns: all,
            unique: Vec::new(),
            seed: Vec::new(),
        });
    }
    tables.extend(join_tables);
    tables.push(attendance_table());

    Ok(ResolvedModel {
        schema_name: schema_name.to_string(),
        entities,
        tables: creation_order(tables)?,
    })
}

fn id_column() -> ColumnInfo {
    ColumnInfo::new("id", SqlType::Uuid).not_null().default("gen_random_uuid()")
}

fn timestamps() -> [ColumnInfo; 2] {
    [
        ColumnInfo::new("created_at", SqlType::Timestamptz).not_null().default("NOW()"),
        ColumnInfo::new("updated_at", SqlType::Timestamptz).not_null().default("NOW()"),
    ]
}

fn entity_table(d: &EntityDescriptor) -> TableDef {
    let mut columns = vec![id_column()];
    for f in &d.fields {
        let required = f.required();
        let column = match &f.storage {
            Storage::Column(sql_type) => ColumnInfo::new(f.name, *sql_type),
            Storage::ForeignKey { column, target, .. } => {
                let on_delete = if required { OnDelete::Restrict } else { OnDelete::SetNull };
                ColumnInfo::new(column, SqlType::Uuid).references(target, on_delete)
            }
            Storage::Nested {
                table,
                link_column,
                column: None,
                ..
            } => ColumnInfo::new(link_column, SqlType::Uuid).references(table, OnDelete::SetNull),
            Storage::Nested { .. } | Storage::JoinTable { .. } | Storage::Virtual => continue,
        };
        columns.push(if required { column.not_null() } else { column });
    }
    for (name, sql_type) in &d.extra_columns {
        columns.push(ColumnInfo::new(name, *sql_type));
    }
    columns.extend(timestamps());
    TableDef {
        name: d.entity.table().to_string(),
        columns,
        unique: Vec::new(),
        seed: Vec::new(),
    }
}

fn role_table() -> TableDef {
    let mut columns = vec![id_column(), ColumnInfo::new("name", SqlType::Text).not_null()];
    columns.extend(timestamps());
    TableDef {
        name: ROLE_TABLE.to_string(),
        columns,
        unique: vec![vec!["name"]],
        seed: USER_ROLES.iter().map(|r| vec![("name", *r)]).collect(),
    }
}

fn attendance_table() -> TableDef {
    let mut columns = vec![
        id_column(),
        ColumnInfo::new("employee_id", SqlType::Uuid)
            .not_null()
            .references(Entity::Employees.table(), OnDelete::Cascade),
        ColumnInfo::new("date", SqlType::Date).not_null(),
        ColumnInfo::new("no_of_hours", SqlType::BigInt).not_null().default("0"),
        ColumnInfo::new("present", SqlType::Boolean).not_null().default("false"),
        ColumnInfo::new("holiday", SqlType::Boolean).not_null().default("false"),
    ];
    columns.extend(timestamps());
    TableDef {
        name: ATTENDANCE_TABLE.to_string(),
        columns,
        unique: vec![vec!["employee_id", "date"]],
        seed: Vec::new(),
    }
}

/// Order tables so every referenced table is created before its referrers.
fn creation_order(mut pending: Vec<TableDef>) -> Result<Vec<TableDef>, ConfigError> {
    let names: HashSet<String> = pending.iter().map(|t| t.name.clone()).collect();
    for t in &pending {
        for c in &t.columns {
            if let Some(r) = &c.references {
                if !names.contains(&r.table) {
                    return Err(ConfigError::Validation(format!(
                        "{}.{} references unknown table {}",
                        t.name, c.name, r.table
                    )));
                }
            }
        }
    }
    let mut created: HashSet<String> = HashSet::new();
    let mut ordered = Vec::with_capacity(pending.len());
    while !pending.is_empty() {
        let ready = pending.iter().position(|t| {
            t.columns
                .iter()
                .filter_map(|c| c.references.as_ref())
                .all(|r| r.table == t.name || created.contains(&r.table))
        });
        let Some(i) = ready else {
            let stuck: Vec<&str> = pending.iter().map(|t| t.name.as_str()).collect();
            return Err(ConfigError::Validation(format!(
                "circular table references: {}",
                stuck.join(", ")
            )));
        };
        let t = pending.remove(i);
        created.insert(t.name.clone());
        ordered.push(t);
    }
    Ok(ordered)
}
