//! Request validation from the per-field rules of an entity descriptor.

use crate::config::{Constraint, DateBound, DefaultValue, EntityDescriptor, FieldDescriptor, Limit, Pattern, Rule};
use crate::error::{AppError, FieldErrors};
use crate::service::coerce::{current_year, format_dmy, normalize_date, parse_number, today, NumberValue};
use crate::service::input::{FormInput, RawValue, UploadedFile};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static ALPHA: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z_a-z \s]+$").expect("static pattern"));
static ALPHANUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z_a-z0-9 \s]+$").expect("static pattern"));
static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+$").expect("static pattern"));
static EMAIL_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z_a-z.0-9 \s]+$").expect("static pattern"));
static EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static pattern"));

/// Sentinel path meaning "no new file; keep whatever is stored".
pub const NO_IMAGE: &str = "/no_image.jpeg";

/// A normalized field value.
#[derive(Clone, Debug)]
pub enum FieldValue {
    Text(String),
    Number(NumberValue),
    Date(NaiveDate),
    Upload(UploadedFile),
    Many(Vec<String>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Normalized values of one accepted submission, keyed by field name.
#[derive(Clone, Debug, Default)]
pub struct ValidatedValues {
    values: HashMap<String, FieldValue>,
}

impl ValidatedValues {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    pub fn insert(&mut self, field: &str, value: FieldValue) {
        self.values.insert(field.to_string(), value);
    }

    pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
        self.values.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Uploads awaiting storage, as (field, file).
    pub fn uploads(&self) -> Vec<(String, UploadedFile)> {
        self.values
            .iter()
            .filter_map(|(k, v)| match v {
                FieldValue::Upload(f) => Some((k.clone(), f.clone())),
                _ => None,
            })
            .collect()
    }
}

pub struct SchemaValidator;

impl SchemaValidator {
    /// Validate every writable field. Any failure rejects the whole submission
    /// with one message per failing field.
    pub fn validate(descriptor: &EntityDescriptor, input: &FormInput) -> Result<ValidatedValues, AppError> {
        let mut out = ValidatedValues::default();
        let mut errors = FieldErrors::default();
        for field in &descriptor.fields {
            let Some(constraint) = &field.constraint else { continue };
            match check_field(field, constraint, input) {
                Ok(Some(v)) => out.insert(field.name, v),
                Ok(None) => {}
                Err(message) => errors.push(field.name, message),
            }
        }
        if errors.is_empty() {
            Ok(out)
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

fn check_field(field: &FieldDescriptor, constraint: &Constraint, input: &FormInput) -> Result<Option<FieldValue>, String> {
    if field.is_multi() {
        if !input.contains(field.name) {
            return Ok(None);
        }
        let ids: Vec<String> = input
            .texts(field.name)
            .into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if ids.is_empty() && constraint.required {
            return Err("is required".into());
        }
        for id in &ids {
            check_value(&constraint.rule, id)?;
        }
        return Ok(Some(FieldValue::Many(ids)));
    }

    if let Rule::File { max_bytes, mime } = &constraint.rule {
        return match input.first(field.name) {
            Some(RawValue::File(f)) if !(f.file_name.is_empty() && f.size() == 0) => {
                check_file(f, *max_bytes, mime)?;
                Ok(Some(FieldValue::Upload(f.clone())))
            }
            Some(RawValue::Text(s)) if !s.trim().is_empty() => Ok(Some(FieldValue::Text(s.trim().to_string()))),
            _ if constraint.required => Err("is required".into()),
            _ => Ok(None),
        };
    }

    let raw = input.text(field.name).map(str::trim).unwrap_or("");
    if raw.is_empty() {
        if let Some(default) = &constraint.default {
            return match default {
                DefaultValue::Text(v) => check_value(&constraint.rule, v).map(Some),
                DefaultValue::Today => Ok(Some(FieldValue::Date(today()))),
            };
        }
        if !constraint.required {
            return Ok(None);
        }
        return Err(match &constraint.rule {
            Rule::Text { min, max, .. } => length_message(*min, *max),
            _ => "is required".to_string(),
        });
    }
    check_value(&constraint.rule, raw).map(Some)
}

/// Check one non-empty raw string against a rule and coerce it.
pub fn check_value(rule: &Rule, raw: &str) -> Result<FieldValue, String> {
    match rule {
        Rule::Text { min, max, pattern } => {
            let len = raw.chars().count();
            if len < *min || len > *max {
                return Err(length_message(*min, *max));
            }
            if let Some(p) = pattern {
                let (re, message) = pattern_regex(*p);
                if !re.is_match(raw) {
                    return Err(message.to_string());
                }
            }
            Ok(FieldValue::Text(raw.to_string()))
        }
        Rule::Email { max } => {
            if raw.chars().count() > *max {
                return Err(length_message(1, *max));
            }
            if !EMAIL.is_match(raw) {
                return Err("must be a valid email".into());
            }
            Ok(FieldValue::Text(raw.to_string()))
        }
        Rule::Number { min, max, integer } => {
            let n = parse_number(raw).ok_or_else(|| "must be a number".to_string())?;
            if *integer && matches!(n, NumberValue::Decimal(_)) {
                return Err("must be a whole number".into());
            }
            if let Some(min) = min {
                if n.as_f64() < *min {
                    return Err(format!("must be at least {}", min));
                }
            }
            if let Some(max) = max {
                let max = match max {
                    Limit::At(v) => *v,
                    Limit::CurrentYear => current_year() as f64,
                };
                if n.as_f64() > max {
                    return Err(format!("must be at most {}", max));
                }
            }
            Ok(FieldValue::Number(n))
        }
        Rule::Date { min, max } => {
            let d = normalize_date(raw).ok_or_else(|| "must be a valid date".to_string())?;
            if let Some(bound) = min.and_then(resolve_bound) {
                if d < bound {
                    return Err(format!("must be on or after {}", format_dmy(bound)));
                }
            }
            if let Some(bound) = max.and_then(resolve_bound) {
                if d > bound {
                    return Err(format!("must be on or before {}", format_dmy(bound)));
                }
            }
            Ok(FieldValue::Date(d))
        }
        Rule::Choice(allowed) => {
            if allowed.contains(&raw) {
                Ok(FieldValue::Text(raw.to_string()))
            } else {
                Err(format!("must be one of: {}", allowed.join(", ")))
            }
        }
        Rule::Reference => uuid::Uuid::parse_str(raw)
            .map(|u| FieldValue::Text(u.to_string()))
            .map_err(|_| "must reference an existing record".to_string()),
        Rule::File { .. } => Ok(FieldValue::Text(raw.to_string())),
    }
}

fn check_file(f: &UploadedFile, max_bytes: usize, mime: &[&str]) -> Result<(), String> {
    if f.size() > max_bytes {
        return Err(format!("file must be at most {}MB", max_bytes / (1024 * 1024)));
    }
    if !mime.contains(&f.content_type.as_str()) {
        return Err(format!("file type {} is not accepted", f.content_type));
    }
    Ok(())
}

fn length_message(min: usize, max: usize) -> String {
    if min == max {
        format!("must be exactly {} characters", min)
    } else {
        format!("must be {}-{} characters", min, max)
    }
}

fn pattern_regex(p: Pattern) -> (&'static Regex, &'static str) {
    match p {
        Pattern::Alpha => (&ALPHA, "Only alphabets are allowed"),
        Pattern::AlphaNumeric => (&ALPHANUMERIC, "Only alphabets and numbers are allowed"),
        Pattern::Digits => (&DIGITS, "Only numbers are allowed"),
        Pattern::EmailSuffix => (&EMAIL_SUFFIX, "Only alphabets, numbers and dots are allowed"),
    }
}

fn resolve_bound(bound: DateBound) -> Option<NaiveDate> {
    match bound {
        DateBound::Fixed(y, m, d) => NaiveDate::from_ymd_opt(y, m, d),
        DateBound::Today => Some(today()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{descriptor, Entity};
    use axum::body::Bytes;

    fn form(pairs: &[(&str, &str)]) -> FormInput {
        FormInput::from_pairs(pairs.iter().copied())
    }

    fn field_errors(err: AppError) -> FieldErrors {
        match err {
            AppError::Validation(e) => e,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn empty_company_name_fails_on_name_only() {
        let d = descriptor(Entity::Companies);
        let err = SchemaValidator::validate(&d, &form(&[("name", ""), ("service_charge", "5")])).unwrap_err();
        let errors = field_errors(err);
        assert_eq!(errors.fields(), vec!["name"]);
        assert_eq!(errors.get("name"), Some("must be 1-100 characters"));
    }

    #[test]
    fn valid_company_gets_defaults() {
        let d = descriptor(Entity::Companies);
        let v = SchemaValidator::validate(&d, &form(&[("name", "Acme Works"), ("service_charge", "5.5")])).unwrap();
        assert_eq!(v.get("service_charge_field").and_then(FieldValue::as_text), Some("all"));
        assert!(matches!(v.get("service_charge"), Some(FieldValue::Number(NumberValue::Decimal(n))) if *n == 5.5));
        assert!(!v.contains("reimbursement_charge"));
        assert!(!v.contains("photo"));
    }

    #[test]
    fn alphabet_rule_rejects_digits() {
        let d = descriptor(Entity::Companies);
        let err = SchemaValidator::validate(&d, &form(&[("name", "Acme 2"), ("service_charge", "5")])).unwrap_err();
        assert_eq!(field_errors(err).get("name"), Some("Only alphabets are allowed"));
    }

    #[test]
    fn numeric_range_and_coercion_failures_are_reported() {
        let d = descriptor(Entity::Companies);
        let err = SchemaValidator::validate(&d, &form(&[("name", "Acme"), ("service_charge", "25")])).unwrap_err();
        assert_eq!(field_errors(err).get("service_charge"), Some("must be at most 20"));
        let err = SchemaValidator::validate(&d, &form(&[("name", "Acme"), ("service_charge", "five")])).unwrap_err();
        assert_eq!(field_errors(err).get("service_charge"), Some("must be a number"));
    }

    #[test]
    fn every_failing_field_is_listed() {
        let d = descriptor(Entity::Employees);
        let err = SchemaValidator::validate(
            &d,
            &form(&[
                ("full_name", "Asha Rao"),
                ("guardian_name", "R Rao"),
                ("project_location", "not-an-id"),
                ("employee_code", "E1"),
                ("mobile", "12345"),
                ("gender", "robot"),
            ]),
        )
        .unwrap_err();
        let errors = field_errors(err);
        assert_eq!(errors.fields(), vec!["project_location", "gender", "mobile"]);
        assert_eq!(errors.get("mobile"), Some("must be exactly 10 characters"));
    }

    #[test]
    fn dates_are_bounded() {
        let d = descriptor(Entity::Employees);
        let base = [
            ("full_name", "Asha Rao"),
            ("guardian_name", "R Rao"),
            ("project_location", "7f1b7a4e-3f51-4d4a-9d6b-2a0a1c9c2b11"),
            ("employee_code", "E1"),
        ];
        let mut pairs = base.to_vec();
        pairs.push(("date_of_birth", "1/1/1940"));
        let err = SchemaValidator::validate(&d, &form(&pairs)).unwrap_err();
        assert_eq!(field_errors(err).get("date_of_birth"), Some("must be on or after 01/01/1950"));

        let v = SchemaValidator::validate(&d, &form(&base)).unwrap();
        assert!(matches!(v.get("joining_date"), Some(FieldValue::Date(dt)) if *dt == today()));
        assert_eq!(v.get("designation").and_then(FieldValue::as_text), Some("Sampler"));
    }

    #[test]
    fn string_file_values_pass_unchecked() {
        let d = descriptor(Entity::Companies);
        let v = SchemaValidator::validate(
            &d,
            &form(&[("name", "Acme"), ("service_charge", "2"), ("photo", NO_IMAGE)]),
        )
        .unwrap();
        assert_eq!(v.get("photo").and_then(FieldValue::as_text), Some(NO_IMAGE));
    }

    #[test]
    fn uploads_are_checked_for_size_and_type() {
        let d = descriptor(Entity::Companies);
        let mut input = form(&[("name", "Acme"), ("service_charge", "2")]);
        input.push_file(
            "photo",
            UploadedFile {
                file_name: "logo.gif".into(),
                content_type: "image/gif".into(),
                bytes: Bytes::from_static(b"GIF89a"),
            },
        );
        let err = SchemaValidator::validate(&d, &input).unwrap_err();
        assert_eq!(field_errors(err).get("photo"), Some("file type image/gif is not accepted"));

        let mut input = form(&[("name", "Acme"), ("service_charge", "2")]);
        input.push_file(
            "photo",
            UploadedFile {
                file_name: "huge.png".into(),
                content_type: "image/png".into(),
                bytes: Bytes::from(vec![0u8; 1024 * 1024 + 1]),
            },
        );
        let err = SchemaValidator::validate(&d, &input).unwrap_err();
        assert_eq!(field_errors(err).get("photo"), Some("file must be at most 1MB"));
    }

    #[test]
    fn multi_select_absent_versus_cleared() {
        let d = descriptor(Entity::ProjectLocations);
        let base = [
            ("city", "Pune"),
            ("state", "Maharashtra"),
            ("project", "7f1b7a4e-3f51-4d4a-9d6b-2a0a1c9c2b11"),
        ];
        let v = SchemaValidator::validate(&d, &form(&base)).unwrap();
        assert!(!v.contains("payment_field"));

        let mut pairs = base.to_vec();
        pairs.push(("payment_field", ""));
        let v = SchemaValidator::validate(&d, &form(&pairs)).unwrap();
        assert!(matches!(v.get("payment_field"), Some(FieldValue::Many(ids)) if ids.is_empty()));
    }
}
