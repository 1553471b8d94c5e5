//! Typed cell values
//!
//! Every column and derived attribute produces a [`Value`]. Raw CSV cells are
//! always strings; the column's type (or its parse override) decides which
//! variant a cell becomes.

use chrono::NaiveDate;
use serde::ser::{Serialize, SerializeSeq, Serializer};
use std::fmt;

/// A parsed cell or derived attribute value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Missing, empty or unparseable
    #[default]
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    /// Grouped cells of a dynamic column
    List(Vec<Value>),
}

impl Value {
    /// True for `Null`, whitespace-only text and empty lists
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.trim().is_empty(),
            Value::List(values) => values.is_empty(),
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(values) => Some(values),
            _ => None,
        }
    }

    /// Flatten into CSV cells; lists expand into one cell per element
    pub fn into_cells(self) -> Vec<String> {
        match self {
            Value::List(values) => values.into_iter().map(|v| v.to_string()).collect(),
            other => vec![other.to_string()],
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Text(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::List(values) => {
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(";")?;
                    }
                    write!(f, "{}", v)?;
                }
                Ok(())
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Date(d) => serializer.collect_str(&d.format("%Y-%m-%d")),
            Value::List(values) => {
                let mut seq = serializer.serialize_seq(Some(values.len()))?;
                for v in values {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::List(values.into_iter().map(Into::into).collect())
    }
}

/// Ordered `name => value` pairs, in column declaration order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Attributes(Vec<(String, Value)>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.0.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attributes = Attributes::new();
        for (k, v) in iter {
            attributes.insert(k, v.into());
        }
        attributes
    }
}

impl IntoIterator for Attributes {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::null(Value::Null, true)]
    #[case::empty_text(Value::from(""), true)]
    #[case::whitespace(Value::from("  "), true)]
    #[case::empty_list(Value::List(vec![]), true)]
    #[case::text(Value::from("a"), false)]
    #[case::zero(Value::from(0), false)]
    #[case::false_is_present(Value::from(false), false)]
    fn test_is_blank(#[case] value: Value, #[case] expected: bool) {
        assert_eq!(value.is_blank(), expected);
    }

    #[rstest]
    #[case::null(Value::Null, "")]
    #[case::integer(Value::from(42), "42")]
    #[case::float(Value::from(1.01), "1.01")]
    #[case::date(Value::from(NaiveDate::from_ymd_opt(2015, 12, 30).unwrap()), "2015-12-30")]
    #[case::list(Value::from(vec!["a", "b"]), "a;b")]
    fn test_display(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(value.to_string(), expected);
    }

    #[test]
    fn test_serialize_through_csv_writer() {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .serialize(vec![
                Value::from("a"),
                Value::Null,
                Value::from(3),
                Value::from(true),
                Value::from(NaiveDate::from_ymd_opt(2020, 1, 2).unwrap()),
            ])
            .unwrap();
        let output = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(output, "a,,3,true,2020-01-02\n");
    }

    #[test]
    fn test_attributes_keep_insertion_order_and_replace_in_place() {
        let mut attributes: Attributes = vec![("b", "1"), ("a", "2")].into_iter().collect();
        attributes.insert("b", Value::from("3"));

        assert_eq!(attributes.names().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(attributes.get("b"), Some(&Value::from("3")));
        assert_eq!(attributes.get("missing"), None);
    }

    #[test]
    fn test_into_cells_expands_lists() {
        assert_eq!(Value::from(vec![1, 2]).into_cells(), vec!["1", "2"]);
        assert_eq!(Value::Null.into_cells(), vec![""]);
    }
}
