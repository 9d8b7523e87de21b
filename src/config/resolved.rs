//! Resolved model: descriptors validated and flattened into physical tables for runtime use.

use crate::config::types::{Entity, EntityDescriptor, SqlType};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnDelete {
    Restrict,
    SetNull,
    Cascade,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Reference {
    pub table: String,
    pub on_delete: OnDelete,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub sql_type: SqlType,
    pub nullable: bool,
    /// SQL default expression (e.g. `gen_random_uuid()`, `NOW()`).
    pub default: Option<&'static str>,
    pub references: Option<Reference>,
}

impl ColumnInfo {
    pub fn new(name: &str, sql_type: SqlType) -> Self {
        ColumnInfo {
            name: name.to_string(),
            sql_type,
            nullable: true,
            default: None,
            references: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default(mut self, expression: &'static str) -> Self {
        self.default = Some(expression);
        self
    }

    pub fn references(mut self, table: &str, on_delete: OnDelete) -> Self {
        self.references = Some(Reference {
            table: table.to_string(),
            on_delete,
        });
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub unique: Vec<Vec<&'static str>>,
    /// Rows inserted once, keyed by the first unique constraint.
    pub seed: Vec<Vec<(&'static str, &'static str)>>,
}

impl TableDef {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Cast type for a column; text for unknown names.
    pub fn sql_type(&self, name: &str) -> SqlType {
        self.column(name).map(|c| c.sql_type).unwrap_or(SqlType::Text)
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedEntity {
    pub entity: Entity,
    pub schema_name: String,
    pub table: TableDef,
    pub descriptor: EntityDescriptor,
}

impl ResolvedEntity {
    pub fn table_name(&self) -> &str {
        &self.table.name
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedModel {
    pub schema_name: String,
    /// Indexed by [`Entity::index`].
    pub entities: Vec<ResolvedEntity>,
    /// Every table (entity and auxiliary) in creation order.
    pub tables: Vec<TableDef>,
}

impl ResolvedModel {
    pub fn entity(&self, entity: Entity) -> &ResolvedEntity {
        &self.entities[entity.index()]
    }

    pub fn entity_by_route(&self, route: &str) -> Option<&ResolvedEntity> {
        Entity::from_route(route).map(|e| self.entity(e))
    }

    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables.iter().find(|t| t.name == name)
    }
}
