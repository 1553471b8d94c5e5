//! Context bag passed from the reader down to every row model

use super::value::Value;
use std::collections::BTreeMap;

/// Open `key => value` bag carried by readers and row models
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Context(BTreeMap<String, Value>);

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy of `self` with `extra` layered on top; keys in `extra` win
    pub fn merged(&self, extra: &Context) -> Context {
        let mut merged = self.clone();
        for (k, v) in &extra.0 {
            merged.0.insert(k.clone(), v.clone());
        }
        merged
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Context(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
