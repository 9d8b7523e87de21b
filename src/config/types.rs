//! Declarative entity descriptors: fields, rules, relations, filters and tabs.
//! Everything here is static configuration built once at startup.

/// One managed entity. The set is closed; per-entity behavior matches on this.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Entity {
    Users,
    Documents,
    Companies,
    Employees,
    Advances,
    PaymentFields,
    Projects,
    ProjectLocations,
    Vehicles,
}

impl Entity {
    pub const ALL: [Entity; 9] = [
        Entity::Users,
        Entity::Documents,
        Entity::Companies,
        Entity::Employees,
        Entity::Advances,
        Entity::PaymentFields,
        Entity::Projects,
        Entity::ProjectLocations,
        Entity::Vehicles,
    ];

    /// Position in [`Entity::ALL`]; used to index per-entity lookup tables.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Route segment, also the table name.
    pub fn route(self) -> &'static str {
        match self {
            Entity::Users => "users",
            Entity::Documents => "documents",
            Entity::Companies => "companies",
            Entity::Employees => "employees",
            Entity::Advances => "advances",
            Entity::PaymentFields => "payment_fields",
            Entity::Projects => "projects",
            Entity::ProjectLocations => "project_locations",
            Entity::Vehicles => "vehicles",
        }
    }

    pub fn from_route(segment: &str) -> Option<Entity> {
        Entity::ALL.into_iter().find(|e| e.route() == segment)
    }

    pub fn table(self) -> &'static str {
        self.route()
    }

    /// Human-readable singular name ("project location").
    pub fn singular(self) -> &'static str {
        match self {
            Entity::Users => "user",
            Entity::Documents => "document",
            Entity::Companies => "company",
            Entity::Employees => "employee",
            Entity::Advances => "advance payment",
            Entity::PaymentFields => "payment field",
            Entity::Projects => "project",
            Entity::ProjectLocations => "project location",
            Entity::Vehicles => "vehicle",
        }
    }

    /// Field used as the record's display name.
    pub fn title_field(self) -> &'static str {
        match self {
            Entity::Users | Entity::Employees => "full_name",
            Entity::Documents | Entity::Advances => "label",
            Entity::Companies | Entity::PaymentFields | Entity::Projects => "name",
            Entity::ProjectLocations => "city",
            Entity::Vehicles => "number",
        }
    }

    pub fn import_export(self) -> bool {
        !matches!(self, Entity::Documents)
    }
}

/// Column names that render as a link to the record detail route.
pub const TITLE_COLUMNS: [&str; 5] = ["name", "full_name", "label", "title", "city"];

pub fn is_title_column(key: &str) -> bool {
    TITLE_COLUMNS.contains(&key)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SqlType {
    Text,
    BigInt,
    Double,
    Boolean,
    Date,
    Timestamptz,
    Uuid,
}

impl SqlType {
    /// PostgreSQL type name, used in DDL and `$n::type` casts.
    pub fn pg_name(self) -> &'static str {
        match self {
            SqlType::Text => "text",
            SqlType::BigInt => "bigint",
            SqlType::Double => "double precision",
            SqlType::Boolean => "boolean",
            SqlType::Date => "date",
            SqlType::Timestamptz => "timestamptz",
            SqlType::Uuid => "uuid",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Email,
    Number,
    Date,
    File,
    Select,
    Radio,
    Textarea,
    Hidden,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Multiplicity {
    Single,
    Multi,
}

/// One relation hop: `LEFT JOIN table ON table.id = <previous>.fk`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Hop {
    pub relation: &'static str,
    pub table: &'static str,
    pub fk: &'static str,
}

impl Hop {
    pub const fn new(relation: &'static str, table: &'static str, fk: &'static str) -> Self {
        Hop { relation, table, fk }
    }
}

/// A column reached from the entity row through zero or more relation hops.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnPath {
    pub hops: Vec<Hop>,
    pub column: &'static str,
}

impl ColumnPath {
    pub fn own(column: &'static str) -> Self {
        ColumnPath { hops: Vec::new(), column }
    }

    pub fn via(hops: &[Hop], column: &'static str) -> Self {
        ColumnPath { hops: hops.to_vec(), column }
    }

    /// Output key: relation names and the column joined by '.' ("project_location.city").
    pub fn key(&self) -> String {
        let mut parts: Vec<&str> = self.hops.iter().map(|h| h.relation).collect();
        parts.push(self.column);
        parts.join(".")
    }
}

/// Grouping key of a relation option: the target column (possibly one hop away)
/// whose value must equal the parent field's chosen value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupKey {
    pub via: Option<Hop>,
    pub column: &'static str,
}

#[derive(Clone, Debug, PartialEq)]
pub enum OptionSource {
    Static(&'static [&'static str]),
    /// The last `n` calendar years, newest first.
    RecentYears(u32),
    Table {
        table: &'static str,
        label: &'static str,
        group: Option<GroupKey>,
    },
}

/// How a field maps onto physical storage.
#[derive(Clone, Debug, PartialEq)]
pub enum Storage {
    Column(SqlType),
    ForeignKey {
        column: &'static str,
        target: &'static str,
        label: &'static str,
    },
    JoinTable {
        table: &'static str,
        owner_column: &'static str,
        target_column: &'static str,
        target: &'static str,
        label: &'static str,
    },
    /// A column of a 1:1 row flattened into the owner form. `column: None` marks
    /// the carrier of the nested row's id (stored in `link_column` on the owner).
    Nested {
        relation: &'static str,
        table: &'static str,
        link_column: &'static str,
        column: Option<(&'static str, SqlType)>,
    },
    /// Used only to narrow another field's options; never written.
    Virtual,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pattern {
    Alpha,
    AlphaNumeric,
    Digits,
    EmailSuffix,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Limit {
    At(f64),
    CurrentYear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DateBound {
    Fixed(i32, u32, u32),
    Today,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Rule {
    Text {
        min: usize,
        max: usize,
        pattern: Option<Pattern>,
    },
    Email {
        max: usize,
    },
    Number {
        min: Option<f64>,
        max: Option<Limit>,
        integer: bool,
    },
    Date {
        min: Option<DateBound>,
        max: Option<DateBound>,
    },
    Choice(&'static [&'static str]),
    /// Record id of a related row.
    Reference,
    File {
        max_bytes: usize,
        mime: &'static [&'static str],
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum DefaultValue {
    Text(&'static str),
    Today,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    pub rule: Rule,
    pub required: bool,
    pub default: Option<DefaultValue>,
}

/// Edge of the field dependency graph: this field depends on `on`.
#[derive(Clone, Debug, PartialEq)]
pub struct Dependency {
    pub on: &'static str,
    pub predicate: DependencyPredicate,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DependencyPredicate {
    /// Enabled only while the parent's chosen label is one of these values.
    Gate(&'static [&'static str]),
    /// Enabled once the parent has a value; options narrowed to the parent's value
    /// through the option source's group key.
    Group,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub kind: FieldKind,
    pub label: &'static str,
    pub relation: Option<&'static str>,
    pub multiplicity: Multiplicity,
    pub dependency: Option<Dependency>,
    pub storage: Storage,
    pub options: Option<OptionSource>,
    pub constraint: Option<Constraint>,
}

impl FieldDescriptor {
    fn new(name: &'static str, kind: FieldKind, storage: Storage, rule: Option<Rule>) -> Self {
        FieldDescriptor {
            name,
            kind,
            label: name,
            relation: None,
            multiplicity: Multiplicity::Single,
            dependency: None,
            storage,
            options: None,
            constraint: rule.map(|rule| Constraint {
                rule,
                required: true,
                default: None,
            }),
        }
    }

    pub fn text(name: &'static str, rule: Rule) -> Self {
        Self::new(name, FieldKind::Text, Storage::Column(SqlType::Text), Some(rule))
    }

    pub fn textarea(name: &'static str, max: usize) -> Self {
        Self::new(
            name,
            FieldKind::Textarea,
            Storage::Column(SqlType::Text),
            Some(Rule::Text { min: 1, max, pattern: None }),
        )
    }

    pub fn email(name: &'static str) -> Self {
        Self::new(name, FieldKind::Email, Storage::Column(SqlType::Text), Some(Rule::Email { max: 100 }))
    }

    pub fn number(name: &'static str, min: Option<f64>, max: Option<Limit>, integer: bool) -> Self {
        let sql_type = if integer { SqlType::BigInt } else { SqlType::Double };
        Self::new(
            name,
            FieldKind::Number,
            Storage::Column(sql_type),
            Some(Rule::Number { min, max, integer }),
        )
    }

    pub fn date(name: &'static str, min: Option<DateBound>, max: Option<DateBound>) -> Self {
        Self::new(name, FieldKind::Date, Storage::Column(SqlType::Date), Some(Rule::Date { min, max }))
    }

    pub fn file(name: &'static str, max_bytes: usize, mime: &'static [&'static str]) -> Self {
        Self::new(
            name,
            FieldKind::File,
            Storage::Column(SqlType::Text),
            Some(Rule::File { max_bytes, mime }),
        )
    }

    pub fn radio(name: &'static str, values: &'static [&'static str]) -> Self {
        let mut f = Self::new(name, FieldKind::Radio, Storage::Column(SqlType::Text), Some(Rule::Choice(values)));
        f.options = Some(OptionSource::Static(values));
        f
    }

    /// Radio over "true"/"false", stored as a boolean column.
    pub fn yes_no(name: &'static str) -> Self {
        const BOOLEANS: &[&str] = &["true", "false"];
        let mut f = Self::radio(name, BOOLEANS);
        f.storage = Storage::Column(SqlType::Boolean);
        f
    }

    /// Single relation stored as `{relation}_id`.
    pub fn select(relation: &'static str, target: &'static str, label: &'static str) -> Self {
        let column = fk_column(relation);
        let mut f = Self::new(
            relation,
            FieldKind::Select,
            Storage::ForeignKey { column, target, label },
            Some(Rule::Reference),
        );
        f.relation = Some(relation);
        f.options = Some(OptionSource::Table { table: target, label, group: None });
        f
    }

    pub fn multi_select(
        relation: &'static str,
        target: &'static str,
        label: &'static str,
        join_table: &'static str,
        owner_column: &'static str,
        target_column: &'static str,
    ) -> Self {
        let mut f = Self::new(
            relation,
            FieldKind::Select,
            Storage::JoinTable {
                table: join_table,
                owner_column,
                target_column,
                target,
                label,
            },
            Some(Rule::Reference),
        );
        f.relation = Some(relation);
        f.multiplicity = Multiplicity::Multi;
        f.options = Some(OptionSource::Table { table: target, label, group: None });
        f
    }

    /// Picker that only narrows dependents; no rule, no storage.
    pub fn filter_only(relation: &'static str, target: &'static str, label: &'static str) -> Self {
        let mut f = Self::new(relation, FieldKind::Select, Storage::Virtual, None);
        f.relation = Some(relation);
        f.options = Some(OptionSource::Table { table: target, label, group: None });
        f
    }

    /// Carrier of a flattened 1:1 row id.
    pub fn nested_link(name: &'static str, relation: &'static str, table: &'static str, link_column: &'static str) -> Self {
        let mut f = Self::new(
            name,
            FieldKind::Hidden,
            Storage::Nested { relation, table, link_column, column: None },
            Some(Rule::Reference),
        );
        f.relation = Some(relation);
        f.optional()
    }

    pub fn nested_text(
        name: &'static str,
        relation: &'static str,
        table: &'static str,
        link_column: &'static str,
        rule: Rule,
    ) -> Self {
        let mut f = Self::new(
            name,
            FieldKind::Text,
            Storage::Nested {
                relation,
                table,
                link_column,
                column: Some((name, SqlType::Text)),
            },
            Some(rule),
        );
        f.relation = Some(relation);
        f
    }

    pub fn optional(mut self) -> Self {
        if let Some(c) = self.constraint.as_mut() {
            c.required = false;
        }
        self
    }

    pub fn default_text(mut self, value: &'static str) -> Self {
        if let Some(c) = self.constraint.as_mut() {
            c.default = Some(DefaultValue::Text(value));
        }
        self
    }

    pub fn default_today(mut self) -> Self {
        if let Some(c) = self.constraint.as_mut() {
            c.default = Some(DefaultValue::Today);
        }
        self
    }

    pub fn labelled(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    pub fn options(mut self, source: OptionSource) -> Self {
        self.options = Some(source);
        self
    }

    pub fn gated_by(mut self, on: &'static str, values: &'static [&'static str]) -> Self {
        self.dependency = Some(Dependency {
            on,
            predicate: DependencyPredicate::Gate(values),
        });
        self
    }

    /// Depends on `on`; options are narrowed by `group` on the target table.
    pub fn grouped_by(mut self, on: &'static str, group: GroupKey) -> Self {
        if let Some(OptionSource::Table { group: g, .. }) = self.options.as_mut() {
            *g = Some(group);
        }
        self.dependency = Some(Dependency {
            on,
            predicate: DependencyPredicate::Group,
        });
        self
    }

    pub fn is_writable(&self) -> bool {
        !matches!(self.storage, Storage::Virtual)
    }

    pub fn is_multi(&self) -> bool {
        self.multiplicity == Multiplicity::Multi
    }

    pub fn required(&self) -> bool {
        self.constraint.as_ref().map(|c| c.required).unwrap_or(false)
    }
}

fn fk_column(relation: &'static str) -> &'static str {
    match relation {
        "company" => "company_id",
        "project" => "project_id",
        "project_location" => "project_location_id",
        "employee" => "employee_id",
        "vehicle" => "vehicle_id",
        "user" => "user_id",
        "role" => "role_id",
        "bank_detail" => "bank_detail_id",
        _ => "unknown_id",
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    /// Case-insensitive substring.
    Substring,
    Equality,
    /// Greater than or equal (numbers and dates).
    Range,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FilterPicker {
    Text,
    Number,
    Date,
    Options(OptionSource),
}

#[derive(Clone, Debug, PartialEq)]
pub struct FilterDef {
    pub name: &'static str,
    pub comparison: Comparison,
    pub path: ColumnPath,
    pub value_type: SqlType,
    pub label: &'static str,
    pub picker: FilterPicker,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderBy {
    pub column: &'static str,
    pub descending: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TabTarget {
    /// Child rows whose `fk` column points at the parent.
    Child { entity: Entity, fk: &'static str },
    /// Targets of a multi relation field of the parent.
    Multi { entity: Entity, field: &'static str },
    Attendance,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TabDef {
    pub name: &'static str,
    pub target: TabTarget,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EntityDescriptor {
    pub entity: Entity,
    pub fields: Vec<FieldDescriptor>,
    /// Mutually exclusive relation fields: at most one may be set.
    pub exclusive_groups: Vec<&'static [&'static str]>,
    /// Columns not driven by the form.
    pub extra_columns: Vec<(&'static str, SqlType)>,
    /// Columns selected for list views and exports.
    pub list: Vec<ColumnPath>,
    pub search: Vec<ColumnPath>,
    pub filters: Vec<FilterDef>,
    pub order: Vec<OrderBy>,
    pub tabs: Vec<TabDef>,
    pub letters: &'static [&'static str],
}

impl EntityDescriptor {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn filter(&self, name: &str) -> Option<&FilterDef> {
        self.filters.iter().find(|f| f.name == name)
    }

    pub fn tab(&self, name: &str) -> Option<&TabDef> {
        self.tabs.iter().find(|t| t.name == name)
    }

    pub fn file_field(&self) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.kind == FieldKind::File)
    }
}
