//! Declarative input schemas for request bodies and queries. A `Schema` is
//! a list of field rules; `validate()` checks every field against every
//! rule for that field and collects failures into a per-field map rather
//! than stopping at the first one. Failure messages never echo the
//! submitted value — only which rule was violated.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use eduhub_http_errors::ApiError;
use serde_json::Value;

#[derive(Clone)]
pub enum Rule {
    Required,
    MinLength(usize),
    MaxLength(usize),
    MinValue(f64),
    MaxValue(f64),
    OneOf(&'static [&'static str]),
    Email,
    Date,
    /// A caller-supplied check. `message` is what shows up in the field
    /// error map on failure, not a description of the input.
    Predicate { message: &'static str, check: fn(&Value) -> bool },
}

#[derive(Clone)]
pub struct FieldSchema {
    name: &'static str,
    rules: Vec<Rule>,
}

impl FieldSchema {
    pub fn new(name: &'static str, rules: Vec<Rule>) -> Self {
        Self { name, rules }
    }
}

#[derive(Clone, Default)]
pub struct Schema {
    fields: Vec<FieldSchema>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &'static str, rules: Vec<Rule>) -> Self {
        self.fields.push(FieldSchema::new(name, rules));
        self
    }

    /// `body` is a JSON object (already parsed). Returns `Ok(())` if every
    /// field schema is satisfied, otherwise an `ApiError::Validation` whose
    /// field map names which rule failed per field.
    pub fn validate(&self, body: &Value) -> Result<(), ApiError> {
        let mut errors = BTreeMap::new();

        for field in &self.fields {
            let value = body.get(field.name);
            if let Some(message) = check_field(value, &field.rules) {
                errors.insert(field.name.to_string(), message.to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation(errors))
        }
    }
}

fn check_field(value: Option<&Value>, rules: &[Rule]) -> Option<&'static str> {
    let present = value.is_some_and(|v| !v.is_null());

    if !present {
        return rules
            .iter()
            .any(|r| matches!(r, Rule::Required))
            .then_some("required");
    }

    let value = value.expect("checked present above");

    for rule in rules {
        let failure = match rule {
            Rule::Required => None,
            Rule::MinLength(min) => as_str(value).filter(|s| s.chars().count() < *min).map(|_| "too_short"),
            Rule::MaxLength(max) => as_str(value).filter(|s| s.chars().count() > *max).map(|_| "too_long"),
            Rule::MinValue(min) => as_f64(value).filter(|n| n < min).map(|_| "too_small"),
            Rule::MaxValue(max) => as_f64(value).filter(|n| n > max).map(|_| "too_large"),
            Rule::OneOf(allowed) => as_str(value).filter(|s| !allowed.contains(s)).map(|_| "not_one_of"),
            Rule::Email => as_str(value).filter(|s| !is_valid_email(s)).map(|_| "invalid_email"),
            Rule::Date => as_str(value).filter(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").is_err()).map(|_| "invalid_date"),
            Rule::Predicate { message, check } => (!check(value)).then_some(*message),
        };
        if failure.is_some() {
            return failure;
        }
    }

    None
}

fn as_str(value: &Value) -> Option<&str> {
    value.as_str()
}

fn as_f64(value: &Value) -> Option<f64> {
    value.as_f64()
}

fn is_valid_email(candidate: &str) -> bool {
    let Some((local, domain)) = candidate.split_once('@') else { return false };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !candidate.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_required_field_is_reported_as_required() {
        let schema = Schema::new().field("name", vec![Rule::Required]);
        let err = schema.validate(&json!({})).unwrap_err();
        assert_eq!(field_error(&err, "name"), "required");
    }

    #[test]
    fn validation_error_never_echoes_the_submitted_value() {
        let schema = Schema::new().field("name", vec![Rule::MinLength(3)]);
        let err = schema.validate(&json!({"name": "attacker-controlled-payload"})).unwrap_err();
        let message = field_error(&err, "name");
        assert!(!message.contains("attacker-controlled-payload"));
    }

    #[test]
    fn string_length_bounds_are_enforced() {
        let schema = Schema::new().field("code", vec![Rule::MinLength(2), Rule::MaxLength(4)]);
        assert!(schema.validate(&json!({"code": "a"})).is_err());
        assert!(schema.validate(&json!({"code": "abcde"})).is_err());
        assert!(schema.validate(&json!({"code": "abc"})).is_ok());
    }

    #[test]
    fn numeric_bounds_are_enforced() {
        let schema = Schema::new().field("credits", vec![Rule::MinValue(1.0), Rule::MaxValue(6.0)]);
        assert!(schema.validate(&json!({"credits": 0})).is_err());
        assert!(schema.validate(&json!({"credits": 7})).is_err());
        assert!(schema.validate(&json!({"credits": 3})).is_ok());
    }

    #[test]
    fn one_of_enum_rejects_values_outside_the_allow_list() {
        let schema = Schema::new().field("term", vec![Rule::OneOf(&["fall", "spring", "summer"])]);
        assert!(schema.validate(&json!({"term": "winter"})).is_err());
        assert!(schema.validate(&json!({"term": "fall"})).is_ok());
    }

    #[test]
    fn email_rule_rejects_malformed_addresses() {
        let schema = Schema::new().field("email", vec![Rule::Email]);
        assert!(schema.validate(&json!({"email": "not-an-email"})).is_err());
        assert!(schema.validate(&json!({"email": "student@college.example"})).is_ok());
    }

    #[test]
    fn date_rule_requires_iso_format() {
        let schema = Schema::new().field("dob", vec![Rule::Date]);
        assert!(schema.validate(&json!({"dob": "not-a-date"})).is_err());
        assert!(schema.validate(&json!({"dob": "2010-09-01"})).is_ok());
    }

    #[test]
    fn custom_predicate_runs_with_its_own_message() {
        let schema = Schema::new().field(
            "even",
            vec![Rule::Predicate { message: "must_be_even", check: |v| v.as_i64().is_some_and(|n| n % 2 == 0) }],
        );
        let err = schema.validate(&json!({"even": 3})).unwrap_err();
        assert_eq!(field_error(&err, "even"), "must_be_even");
    }

    #[test]
    fn unset_optional_field_with_no_required_rule_passes() {
        let schema = Schema::new().field("nickname", vec![Rule::MinLength(1)]);
        assert!(schema.validate(&json!({})).is_ok());
    }

    fn field_error<'a>(err: &'a ApiError, field: &str) -> &'a str {
        match err {
            ApiError::Validation { fields } => fields.get(field).expect("field error present"),
            other => panic!("expected a validation error, got {other:?}"),
        }
    }
}
