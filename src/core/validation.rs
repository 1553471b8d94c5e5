//! Field-level validation
//!
//! A small rule framework: rules are registered against a named field and
//! checked against that field's value. Results land in an [`Errors`] map of
//! field name to messages. The same shape backs the separate warnings channel.

use crate::core::columns::ColumnType;
use crate::types::Value;
use std::fmt;
use std::sync::Arc;

type CheckFn = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;

/// Ordered `field => messages` map
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Errors {
    messages: Vec<(String, Vec<String>)>,
}

impl Errors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        let message = message.into();
        match self.messages.iter_mut().find(|(f, _)| f == field) {
            Some((_, messages)) => messages.push(message),
            None => self.messages.push((field.to_string(), vec![message])),
        }
    }

    /// Messages recorded for `field`
    pub fn get(&self, field: &str) -> &[String] {
        self.messages
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, m)| m.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains(&self, field: &str) -> bool {
        !self.get(field).is_empty()
    }

    pub fn delete(&mut self, field: &str) -> Option<Vec<String>> {
        let position = self.messages.iter().position(|(f, _)| f == field)?;
        Some(self.messages.remove(position).1)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.messages.iter().map(|(f, _)| f.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.messages.iter().all(|(_, m)| m.is_empty())
    }

    /// Copy in `other`'s fields that are not present here; existing fields win
    pub fn reverse_merge(&mut self, other: &Errors) {
        for (field, messages) in &other.messages {
            if !self.contains(field) {
                for message in messages {
                    self.add(field, message.clone());
                }
            }
        }
    }

    /// `"Field message"` strings, in insertion order
    pub fn full_messages(&self) -> Vec<String> {
        self.messages
            .iter()
            .flat_map(|(field, messages)| {
                let field = humanize(field);
                messages.iter().map(move |m| format!("{} {}", field, m))
            })
            .collect()
    }
}

fn humanize(field: &str) -> String {
    let spaced = field.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

enum Check {
    Presence,
    Absence,
    BooleanFormat,
    Custom(CheckFn),
}

/// A validation rule bound to one field
#[derive(Clone)]
pub struct Rule {
    field: String,
    check: Arc<Check>,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.check.as_ref() {
            Check::Presence => "presence",
            Check::Absence => "absence",
            Check::BooleanFormat => "boolean_format",
            Check::Custom(_) => "custom",
        };
        f.debug_struct("Rule")
            .field("field", &self.field)
            .field("check", &kind)
            .finish()
    }
}

impl Rule {
    fn new(field: &str, check: Check) -> Self {
        Rule {
            field: field.to_string(),
            check: Arc::new(check),
        }
    }

    /// Field must not be blank
    pub fn presence(field: &str) -> Self {
        Self::new(field, Check::Presence)
    }

    /// Field must be blank
    pub fn absence(field: &str) -> Self {
        Self::new(field, Check::Absence)
    }

    /// Field, when present, must read as a boolean
    pub fn boolean_format(field: &str) -> Self {
        Self::new(field, Check::BooleanFormat)
    }

    /// Arbitrary check returning an error message on failure
    pub fn custom<F>(field: &str, check: F) -> Self
    where
        F: Fn(&Value) -> Option<String> + Send + Sync + 'static,
    {
        Self::new(field, Check::Custom(Arc::new(check)))
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// The failure message for `value`, if it breaks the rule
    pub fn check(&self, value: &Value) -> Option<String> {
        match self.check.as_ref() {
            Check::Presence => value.is_blank().then(|| "can't be blank".to_string()),
            Check::Absence => (!value.is_blank()).then(|| "must be blank".to_string()),
            Check::BooleanFormat => match value {
                Value::Null | Value::Boolean(_) => None,
                Value::Text(s) if ColumnType::Boolean.accepts(s) => None,
                _ => Some(format!("is not a valid {}", ColumnType::Boolean.name())),
            },
            Check::Custom(check) => check(value),
        }
    }

    /// Run the rule, recording any failure into `errors`
    pub fn apply(&self, value: &Value, errors: &mut Errors) {
        if let Some(message) = self.check(value) {
            errors.add(&self.field, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::presence_blank(Rule::presence("f"), Value::Null, Some("can't be blank"))]
    #[case::presence_ok(Rule::presence("f"), Value::from("x"), None)]
    #[case::absence_blank(Rule::absence("f"), Value::from(""), None)]
    #[case::absence_present(Rule::absence("f"), Value::from("x"), Some("must be blank"))]
    #[case::boolean_ok(Rule::boolean_format("f"), Value::from("t"), None)]
    #[case::boolean_bad(Rule::boolean_format("f"), Value::from("maybe"), Some("is not a valid Boolean"))]
    #[case::custom(
        Rule::custom("f", |v| (v.as_i64() == Some(0)).then(|| "is zero".to_string())),
        Value::from(0),
        Some("is zero")
    )]
    fn test_rule_check(#[case] rule: Rule, #[case] value: Value, #[case] expected: Option<&str>) {
        assert_eq!(rule.check(&value).as_deref(), expected);
    }

    #[test]
    fn test_full_messages_humanize_fields() {
        let mut errors = Errors::new();
        errors.add("source_row", "can't be blank");
        errors.add("csv", "parse error at line 3");
        assert_eq!(
            errors.full_messages(),
            vec!["Source row can't be blank", "Csv parse error at line 3"]
        );
    }

    #[test]
    fn test_reverse_merge_keeps_existing_fields() {
        let mut mine = Errors::new();
        mine.add("name", "mine");
        let mut theirs = Errors::new();
        theirs.add("name", "theirs");
        theirs.add("age", "theirs");

        mine.reverse_merge(&theirs);

        assert_eq!(mine.get("name"), ["mine".to_string()]);
        assert_eq!(mine.get("age"), ["theirs".to_string()]);
    }

    #[test]
    fn test_delete_removes_field() {
        let mut errors = Errors::new();
        errors.add("a", "x");
        assert_eq!(errors.delete("a"), Some(vec!["x".to_string()]));
        assert!(errors.is_empty());
        assert_eq!(errors.delete("a"), None);
    }
}
