//! Per-entity declarations: form fields, list shape, search columns, filters and tabs.

use crate::config::types::*;

const IMAGE_MIME: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/webp"];
const DOCUMENT_MIME: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "image/pdf",
    "image/doc",
    "image/docx",
];
const MB: usize = 1024 * 1024;

pub const USER_ROLES: &[&str] = &[
    "cms lead",
    "cms admin",
    "cms assistant",
    "waiting",
    "client lead",
    "client admin",
    "project admin",
    "project location admin",
];

pub const STATES: &[&str] = &[
    "Andhra Pradesh",
    "Arunachal Pradesh",
    "Assam",
    "Bihar",
    "Chhattisgarh",
    "Goa",
    "Gujarat",
    "Haryana",
    "Himachal Pradesh",
    "Jharkhand",
    "Karnataka",
    "Kerala",
    "Madhya Pradesh",
    "Maharashtra",
    "Manipur",
    "Meghalaya",
    "Mizoram",
    "Nagaland",
    "Odisha",
    "Punjab",
    "Rajasthan",
    "Sikkim",
    "Tamil Nadu",
    "Telangana",
    "Tripura",
    "Uttar Pradesh",
    "Uttarakhand",
    "West Bengal",
    "Andaman and Nicobar Islands",
    "Chandigarh",
    "Dadra and Nagar Haveli and Daman and Diu",
    "Lakshadweep",
    "Delhi",
    "Puducherry",
    "Ladakh",
    "Jammu and Kashmir",
];

const GENDERS: &[&str] = &["male", "female", "others"];
const EDUCATION: &[&str] = &["10th", "12th", "graduate", "post graduate", "diploma", "other"];
const STATUS: &[&str] = &["active", "inactive"];
const VEHICLE_TYPES: &[&str] = &["car", "scooty", "bike", "truck", "bus", "van", "others"];
const BELONGS_TO: &[&str] = &["company", "project", "project location", "employee", "vehicle"];
const BOOLEANS: &[&str] = &["true", "false"];
const CHARGE_FIELDS: &[&str] = &["all", "basic"];
const PAYMENT_TYPES: &[&str] = &["fixed", "percentage"];

const COMPANY: Hop = Hop::new("company", "companies", "company_id");
const PROJECT: Hop = Hop::new("project", "projects", "project_id");
const PROJECT_LOCATION: Hop = Hop::new("project_location", "project_locations", "project_location_id");
const EMPLOYEE: Hop = Hop::new("employee", "employees", "employee_id");
const VEHICLE: Hop = Hop::new("vehicle", "vehicles", "vehicle_id");
const USER: Hop = Hop::new("user", "users", "user_id");
const ROLE: Hop = Hop::new("role", "user_roles", "role_id");

fn alpha() -> Rule {
    Rule::Text { min: 1, max: 100, pattern: Some(Pattern::Alpha) }
}

fn alphanumeric() -> Rule {
    Rule::Text { min: 1, max: 100, pattern: Some(Pattern::AlphaNumeric) }
}

fn digits(min: usize, max: usize) -> Rule {
    Rule::Text { min, max, pattern: Some(Pattern::Digits) }
}

fn free_text(min: usize, max: usize) -> Rule {
    Rule::Text { min, max, pattern: None }
}

fn image(name: &'static str) -> FieldDescriptor {
    FieldDescriptor::file(name, MB, IMAGE_MIME).optional()
}

fn document(name: &'static str) -> FieldDescriptor {
    FieldDescriptor::file(name, 5 * MB, DOCUMENT_MIME).optional()
}

fn project_filter() -> FieldDescriptor {
    FieldDescriptor::filter_only("project", "projects", "name")
}

fn by_project() -> GroupKey {
    GroupKey { via: None, column: "project_id" }
}

fn substring(name: &'static str, path: ColumnPath) -> FilterDef {
    FilterDef {
        name,
        comparison: Comparison::Substring,
        path,
        value_type: SqlType::Text,
        label: name,
        picker: FilterPicker::Text,
    }
}

/// Substring filter whose picker offers the labels of `table`.
fn named(name: &'static str, path: ColumnPath, table: &'static str) -> FilterDef {
    let label = path.column;
    FilterDef {
        picker: FilterPicker::Options(OptionSource::Table { table, label, group: None }),
        ..substring(name, path)
    }
}

fn choice(name: &'static str, path: ColumnPath, comparison: Comparison, values: &'static [&'static str]) -> FilterDef {
    FilterDef {
        comparison,
        picker: FilterPicker::Options(OptionSource::Static(values)),
        ..substring(name, path)
    }
}

fn at_least(name: &'static str, path: ColumnPath) -> FilterDef {
    FilterDef {
        name,
        comparison: Comparison::Range,
        path,
        value_type: SqlType::BigInt,
        label: name,
        picker: FilterPicker::Number,
    }
}

fn since(name: &'static str, path: ColumnPath, value_type: SqlType) -> FilterDef {
    FilterDef {
        name,
        comparison: Comparison::Range,
        path,
        value_type,
        label: name,
        picker: FilterPicker::Date,
    }
}

fn child(name: &'static str, entity: Entity, fk: &'static str) -> TabDef {
    TabDef { name, target: TabTarget::Child { entity, fk } }
}

fn base(entity: Entity) -> EntityDescriptor {
    EntityDescriptor {
        entity,
        fields: Vec::new(),
        exclusive_groups: Vec::new(),
        extra_columns: Vec::new(),
        list: Vec::new(),
        search: Vec::new(),
        filters: Vec::new(),
        order: Vec::new(),
        tabs: Vec::new(),
        letters: &[],
    }
}

/// Descriptor lookup. Exhaustive over [`Entity`].
pub fn descriptor(entity: Entity) -> EntityDescriptor {
    match entity {
        Entity::Users => users(),
        Entity::Documents => documents(),
        Entity::Companies => companies(),
        Entity::Employees => employees(),
        Entity::Advances => advances(),
        Entity::PaymentFields => payment_fields(),
        Entity::Projects => projects(),
        Entity::ProjectLocations => project_locations(),
        Entity::Vehicles => vehicles(),
    }
}

fn users() -> EntityDescriptor {
    EntityDescriptor {
        fields: vec![
            FieldDescriptor::text("full_name", alpha()),
            image("photo"),
            FieldDescriptor::text("designation", alpha()),
            FieldDescriptor::select("role", "user_roles", "name"),
            FieldDescriptor::email("email"),
            FieldDescriptor::select("company", "companies", "name")
                .optional()
                .gated_by("role", &["client lead", "client admin"]),
            FieldDescriptor::select("project", "projects", "name")
                .optional()
                .gated_by("role", &["project admin", "project location admin"]),
            FieldDescriptor::select("project_location", "project_locations", "city")
                .optional()
                .gated_by("role", &["project location admin"]),
        ],
        exclusive_groups: vec![&["company", "project", "project_location"]],
        extra_columns: vec![("last_signed_in", SqlType::Timestamptz)],
        list: vec![
            ColumnPath::own("full_name"),
            ColumnPath::own("designation"),
            ColumnPath::via(&[ROLE], "name"),
            ColumnPath::own("last_signed_in"),
        ],
        search: vec![
            ColumnPath::own("full_name"),
            ColumnPath::own("designation"),
            ColumnPath::via(&[ROLE], "name"),
            ColumnPath::via(&[COMPANY], "name"),
            ColumnPath::via(&[PROJECT], "name"),
            ColumnPath::via(&[PROJECT_LOCATION], "city"),
        ],
        filters: vec![
            FilterDef {
                picker: FilterPicker::Options(OptionSource::Static(USER_ROLES)),
                ..substring("role", ColumnPath::via(&[ROLE], "name"))
            },
            named("company", ColumnPath::via(&[COMPANY], "name"), "companies"),
            named("project", ColumnPath::via(&[PROJECT], "name"), "projects"),
            since("sign_in", ColumnPath::own("last_signed_in"), SqlType::Timestamptz),
        ],
        tabs: vec![child("advances", Entity::Advances, "user_id")],
        ..base(Entity::Users)
    }
}

fn documents() -> EntityDescriptor {
    EntityDescriptor {
        fields: vec![
            FieldDescriptor::text("label", alpha()),
            FieldDescriptor::radio("belongs_to", BELONGS_TO),
            FieldDescriptor::select("company", "companies", "name")
                .optional()
                .gated_by("belongs_to", &["company"]),
            FieldDescriptor::select("project", "projects", "name")
                .optional()
                .gated_by("belongs_to", &["project"]),
            FieldDescriptor::select("project_location", "project_locations", "city")
                .optional()
                .gated_by("belongs_to", &["project location"]),
            FieldDescriptor::select("employee", "employees", "full_name")
                .optional()
                .gated_by("belongs_to", &["employee"]),
            FieldDescriptor::select("vehicle", "vehicles", "number")
                .optional()
                .gated_by("belongs_to", &["vehicle"]),
            document("path"),
        ],
        exclusive_groups: vec![&["company", "project", "project_location", "employee", "vehicle"]],
        list: vec![
            ColumnPath::own("label"),
            ColumnPath::own("path"),
            ColumnPath::own("belongs_to"),
            ColumnPath::via(&[PROJECT_LOCATION], "city"),
            ColumnPath::via(&[PROJECT], "name"),
            ColumnPath::via(&[COMPANY], "name"),
            ColumnPath::via(&[EMPLOYEE], "full_name"),
            ColumnPath::via(&[VEHICLE], "number"),
        ],
        search: vec![
            ColumnPath::own("label"),
            ColumnPath::own("belongs_to"),
            ColumnPath::via(&[PROJECT], "name"),
            ColumnPath::via(&[PROJECT_LOCATION], "city"),
            ColumnPath::via(&[COMPANY], "name"),
            ColumnPath::via(&[EMPLOYEE], "full_name"),
            ColumnPath::via(&[VEHICLE], "number"),
        ],
        filters: vec![
            choice("belongs_to", ColumnPath::own("belongs_to"), Comparison::Substring, BELONGS_TO),
            named("company", ColumnPath::via(&[COMPANY], "name"), "companies"),
            named("project", ColumnPath::via(&[PROJECT], "name"), "projects"),
            named("vehicle", ColumnPath::via(&[VEHICLE], "number"), "vehicles"),
            since("upload_date", ColumnPath::own("created_at"), SqlType::Timestamptz),
        ],
        ..base(Entity::Documents)
    }
}

fn companies() -> EntityDescriptor {
    EntityDescriptor {
        fields: vec![
            FieldDescriptor::text("name", alpha()),
            image("photo"),
            FieldDescriptor::radio("service_charge_field", CHARGE_FIELDS).default_text("all"),
            FieldDescriptor::number("service_charge", Some(1.0), Some(Limit::At(20.0)), false),
            FieldDescriptor::number("reimbursement_charge", Some(1.0), Some(Limit::At(20.0)), false).optional(),
            FieldDescriptor::text(
                "email_suffix",
                Rule::Text { min: 1, max: 20, pattern: Some(Pattern::EmailSuffix) },
            )
            .optional(),
        ],
        list: vec![
            ColumnPath::own("name"),
            ColumnPath::own("service_charge"),
            ColumnPath::own("reimbursement_charge"),
            ColumnPath::own("service_charge_field"),
        ],
        search: vec![ColumnPath::own("name"), ColumnPath::own("service_charge_field")],
        filters: vec![
            at_least("service_charge", ColumnPath::own("service_charge")),
            at_least("reimbursement_charge", ColumnPath::own("reimbursement_charge")),
        ],
        tabs: vec![
            child("projects", Entity::Projects, "company_id"),
            child("documents", Entity::Documents, "company_id"),
            child("users", Entity::Users, "company_id"),
        ],
        letters: &["pay_slip", "payment_data", "payment_bill", "advance_bill", "gratuity_list"],
        ..base(Entity::Companies)
    }
}

fn employees() -> EntityDescriptor {
    const BANK: &str = "bank_detail";
    const BANK_TABLE: &str = "bank_details";
    const BANK_LINK: &str = "bank_detail_id";
    EntityDescriptor {
        fields: vec![
            FieldDescriptor::text("full_name", alpha()),
            image("photo"),
            FieldDescriptor::text("guardian_name", alpha()),
            FieldDescriptor::text("designation", alpha()).default_text("Sampler"),
            project_filter(),
            FieldDescriptor::select("project_location", "project_locations", "city")
                .grouped_by("project", by_project()),
            FieldDescriptor::text("employee_code", free_text(1, 12)),
            FieldDescriptor::radio("gender", GENDERS).default_text("male"),
            FieldDescriptor::radio("education", EDUCATION).default_text("12th"),
            FieldDescriptor::radio("status", STATUS).default_text("active"),
            FieldDescriptor::date("date_of_birth", Some(DateBound::Fixed(1950, 1, 1)), Some(DateBound::Today))
                .optional(),
            FieldDescriptor::date("joining_date", Some(DateBound::Fixed(1980, 1, 1)), Some(DateBound::Today))
                .default_today(),
            FieldDescriptor::date("exit_date", Some(DateBound::Fixed(1980, 1, 1)), Some(DateBound::Today))
                .optional(),
            FieldDescriptor::text("mobile", digits(10, 10)).optional(),
            FieldDescriptor::text("aadhar_number", digits(12, 12)).optional(),
            FieldDescriptor::text("pan_number", free_text(8, 12)).optional(),
            FieldDescriptor::text("uan_no", free_text(1, 12)).optional(),
            FieldDescriptor::text("esic_id", free_text(1, 12)).optional(),
            FieldDescriptor::textarea("permanent_address", 1000).optional(),
            FieldDescriptor::nested_link("bank_detail_id", BANK, BANK_TABLE, BANK_LINK),
            FieldDescriptor::nested_text("account_number", BANK, BANK_TABLE, BANK_LINK, digits(8, 16)).optional(),
            FieldDescriptor::nested_text("ifsc_code", BANK, BANK_TABLE, BANK_LINK, free_text(8, 16)).optional(),
        ],
        list: vec![
            ColumnPath::own("full_name"),
            ColumnPath::own("guardian_name"),
            ColumnPath::own("designation"),
            ColumnPath::via(&[PROJECT_LOCATION], "city"),
            ColumnPath::own("joining_date"),
        ],
        search: vec![
            ColumnPath::own("full_name"),
            ColumnPath::own("designation"),
            ColumnPath::own("guardian_name"),
            ColumnPath::via(&[PROJECT_LOCATION], "city"),
            ColumnPath::via(&[PROJECT_LOCATION, PROJECT], "name"),
            ColumnPath::via(&[PROJECT_LOCATION, PROJECT, COMPANY], "name"),
        ],
        filters: vec![
            named("company", ColumnPath::via(&[PROJECT_LOCATION, PROJECT, COMPANY], "name"), "companies"),
            named("project", ColumnPath::via(&[PROJECT_LOCATION, PROJECT], "name"), "projects"),
            choice("status", ColumnPath::own("status"), Comparison::Equality, STATUS),
            since("joining_date", ColumnPath::own("joining_date"), SqlType::Date),
        ],
        tabs: vec![
            child("documents", Entity::Documents, "employee_id"),
            child("advances", Entity::Advances, "employee_id"),
            TabDef { name: "attendance", target: TabTarget::Attendance },
        ],
        letters: &["notice", "offer", "experience", "termination", "recommendation", "pay_slip"],
        ..base(Entity::Employees)
    }
}

fn advances() -> EntityDescriptor {
    let employee_company = [EMPLOYEE, PROJECT_LOCATION, PROJECT, COMPANY];
    let employee_project = [EMPLOYEE, PROJECT_LOCATION, PROJECT];
    EntityDescriptor {
        fields: vec![
            FieldDescriptor::text("label", alphanumeric()),
            FieldDescriptor::number("amount", Some(1.0), None, true),
            FieldDescriptor::yes_no("credited").default_text("false"),
            FieldDescriptor::date("payment_date", None, Some(DateBound::Today)).default_today(),
            FieldDescriptor::select("user", "users", "full_name").optional(),
            project_filter(),
            FieldDescriptor::select("employee", "employees", "full_name")
                .optional()
                .grouped_by(
                    "project",
                    GroupKey { via: Some(PROJECT_LOCATION), column: "project_id" },
                ),
            document("confirmation_document"),
        ],
        list: vec![
            ColumnPath::own("label"),
            ColumnPath::own("amount"),
            ColumnPath::own("credited"),
            ColumnPath::own("payment_date"),
            ColumnPath::via(&[USER], "full_name"),
            ColumnPath::via(&[EMPLOYEE], "full_name"),
            ColumnPath::via(&employee_project, "name"),
            ColumnPath::via(&employee_company, "name"),
        ],
        search: vec![
            ColumnPath::own("label"),
            ColumnPath::via(&[USER], "full_name"),
            ColumnPath::via(&[EMPLOYEE], "full_name"),
            ColumnPath::via(&[EMPLOYEE, PROJECT_LOCATION], "city"),
            ColumnPath::via(&employee_project, "name"),
            ColumnPath::via(&employee_company, "name"),
        ],
        filters: vec![
            at_least("amount", ColumnPath::own("amount")),
            FilterDef {
                value_type: SqlType::Boolean,
                ..choice("credited", ColumnPath::own("credited"), Comparison::Equality, BOOLEANS)
            },
            since("payment_date", ColumnPath::own("payment_date"), SqlType::Date),
            named("company", ColumnPath::via(&employee_company, "name"), "companies"),
            named("project", ColumnPath::via(&employee_project, "name"), "projects"),
            named("user", ColumnPath::via(&[USER], "full_name"), "users"),
        ],
        letters: &["bill"],
        ..base(Entity::Advances)
    }
}

fn payment_fields() -> EntityDescriptor {
    EntityDescriptor {
        fields: vec![
            FieldDescriptor::text("name", alpha()),
            FieldDescriptor::textarea("description", 1000),
            FieldDescriptor::radio("type", PAYMENT_TYPES).default_text("fixed"),
            FieldDescriptor::number("value", Some(1.0), Some(Limit::At(1_000_000.0)), false).optional(),
            project_filter(),
            FieldDescriptor::multi_select(
                "project_location",
                "project_locations",
                "city",
                "project_location_payment_fields",
                "payment_field_id",
                "project_location_id",
            )
            .optional()
            .grouped_by("project", by_project()),
        ],
        list: vec![
            ColumnPath::own("name"),
            ColumnPath::own("type"),
            ColumnPath::own("value"),
        ],
        search: vec![ColumnPath::own("name"), ColumnPath::own("description")],
        order: vec![OrderBy { column: "type", descending: false }],
        tabs: vec![TabDef {
            name: "project_locations",
            target: TabTarget::Multi { entity: Entity::ProjectLocations, field: "project_location" },
        }],
        ..base(Entity::PaymentFields)
    }
}

fn projects() -> EntityDescriptor {
    EntityDescriptor {
        fields: vec![
            FieldDescriptor::text("name", alphanumeric()),
            FieldDescriptor::date("starting_date", None, None).default_today(),
            FieldDescriptor::date("ending_date", None, None).optional(),
            FieldDescriptor::select("company", "companies", "name"),
        ],
        list: vec![
            ColumnPath::own("name"),
            ColumnPath::own("starting_date"),
            ColumnPath::via(&[COMPANY], "name"),
        ],
        search: vec![ColumnPath::own("name"), ColumnPath::via(&[COMPANY], "name")],
        filters: vec![
            named("company", ColumnPath::via(&[COMPANY], "name"), "companies"),
            since("starting_date", ColumnPath::own("starting_date"), SqlType::Date),
        ],
        tabs: vec![
            child("project_locations", Entity::ProjectLocations, "project_id"),
            child("documents", Entity::Documents, "project_id"),
        ],
        ..base(Entity::Projects)
    }
}

fn project_locations() -> EntityDescriptor {
    EntityDescriptor {
        fields: vec![
            FieldDescriptor::text("city", alpha()),
            FieldDescriptor::radio("state", STATES),
            FieldDescriptor::number("postal_code", Some(1000.0), Some(Limit::At(9_999_999.0)), true).optional(),
            FieldDescriptor::text("esic_code", free_text(1, 20)).optional(),
            FieldDescriptor::textarea("street_address", 1000).optional(),
            FieldDescriptor::select("project", "projects", "name"),
            FieldDescriptor::multi_select(
                "payment_field",
                "payment_fields",
                "name",
                "project_location_payment_fields",
                "project_location_id",
                "payment_field_id",
            )
            .optional(),
        ],
        list: vec![
            ColumnPath::own("city"),
            ColumnPath::own("state"),
            ColumnPath::own("postal_code"),
            ColumnPath::own("esic_code"),
            ColumnPath::via(&[PROJECT], "name"),
        ],
        search: vec![
            ColumnPath::own("city"),
            ColumnPath::own("state"),
            ColumnPath::own("esic_code"),
            ColumnPath::via(&[PROJECT], "name"),
        ],
        filters: vec![
            named("project", ColumnPath::via(&[PROJECT], "name"), "projects"),
            choice("state", ColumnPath::own("state"), Comparison::Substring, STATES),
        ],
        tabs: vec![
            child("employees", Entity::Employees, "project_location_id"),
            child("vehicles", Entity::Vehicles, "project_location_id"),
            child("documents", Entity::Documents, "project_location_id"),
            TabDef {
                name: "payment_fields",
                target: TabTarget::Multi { entity: Entity::PaymentFields, field: "payment_field" },
            },
            TabDef { name: "attendance", target: TabTarget::Attendance },
        ],
        letters: &[
            "pay_slips",
            "payment_data",
            "bonus_list",
            "retrenchment_list",
            "gratuity_list",
            "lwf_list",
            "payment_bill",
            "advance_bill",
        ],
        ..base(Entity::ProjectLocations)
    }
}

fn vehicles() -> EntityDescriptor {
    EntityDescriptor {
        fields: vec![
            FieldDescriptor::text("name", alpha()),
            FieldDescriptor::text("number", alphanumeric()),
            FieldDescriptor::radio("type", VEHICLE_TYPES).default_text("car"),
            FieldDescriptor::number("year_bought", Some(1980.0), Some(Limit::CurrentYear), true)
                .options(OptionSource::RecentYears(35)),
            FieldDescriptor::number("kms_driven", Some(1.0), Some(Limit::At(10_000_000.0)), true),
            FieldDescriptor::radio("status", STATUS).default_text("active"),
            FieldDescriptor::number("price", Some(1000.0), Some(Limit::At(100_000_000.0)), true),
            project_filter(),
            FieldDescriptor::select("project_location", "project_locations", "city")
                .optional()
                .grouped_by("project", by_project()),
            FieldDescriptor::textarea("other_details", 1000).optional(),
        ],
        list: vec![
            ColumnPath::own("name"),
            ColumnPath::own("number"),
            ColumnPath::own("type"),
            ColumnPath::via(&[PROJECT_LOCATION], "city"),
            ColumnPath::via(&[PROJECT_LOCATION, PROJECT], "name"),
        ],
        search: vec![
            ColumnPath::own("name"),
            ColumnPath::own("number"),
            ColumnPath::via(&[PROJECT_LOCATION], "city"),
            ColumnPath::via(&[PROJECT_LOCATION, PROJECT], "name"),
        ],
        filters: vec![
            at_least("kilometers", ColumnPath::own("kms_driven")),
            choice("type", ColumnPath::own("type"), Comparison::Substring, VEHICLE_TYPES),
            choice("status", ColumnPath::own("status"), Comparison::Equality, STATUS),
            named("project", ColumnPath::via(&[PROJECT_LOCATION, PROJECT], "name"), "projects"),
        ],
        tabs: vec![child("documents", Entity::Documents, "vehicle_id")],
        ..base(Entity::Vehicles)
    }
}
