//! Mapper class definitions
//!
//! Mapper classes declare derived attributes: values computed from an
//! underlying row model rather than read from raw cells. Declarations are
//! class vars in their own [`ConfigRegistry`], keyed by
//! [`Capability::MAPPER_ATTRIBUTES`], so mapper subclasses inherit and may
//! redeclare attributes exactly like row-model columns.

use crate::core::registry::{Capability, ClassId, ClassVar, ConfigRegistry};
use crate::core::schema::Schema;
use crate::core::validation::Rule;
use crate::mapper::model::Mapper;
use crate::types::{RowModelError, Value};
use std::fmt;
use std::sync::Arc;

/// Option keys a derived attribute may carry
pub const RECOGNIZED_OPTIONS: [&str; 2] = ["memoize", "dependencies"];

/// Computes a derived attribute from its mapper
pub type MapperFn = Arc<dyn Fn(&Mapper) -> Value + Send + Sync>;

const ATTRIBUTES: ClassVar<Vec<MapperAttribute>> = ClassVar::new("mapper_attributes");
const VALIDATIONS: ClassVar<Vec<Rule>> = ClassVar::new("mapper_validations");
const MAPS_TO: ClassVar<Option<Arc<Schema>>> = ClassVar::new("maps_to");

/// Options of one derived attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapperAttributeOptions {
    pub memoize: bool,
    /// Row-model fields whose errors make this attribute's own error redundant
    pub dependencies: Vec<String>,
}

impl Default for MapperAttributeOptions {
    fn default() -> Self {
        MapperAttributeOptions {
            memoize: true,
            dependencies: Vec::new(),
        }
    }
}

impl MapperAttributeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn memoize(mut self, memoize: bool) -> Self {
        self.memoize = memoize;
        self
    }

    pub fn dependencies<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.dependencies = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Build options from textual `key => value` pairs; `dependencies` is comma separated
    pub fn from_pairs<K, V, I>(owner: &str, pairs: I) -> Result<Self, RowModelError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        let pairs: Vec<(K, V)> = pairs.into_iter().collect();
        let invalid: Vec<&str> = pairs
            .iter()
            .map(|(k, _)| k.as_ref())
            .filter(|k| !RECOGNIZED_OPTIONS.contains(k))
            .collect();
        if !invalid.is_empty() {
            return Err(RowModelError::invalid_option(
                &format!("attribute '{}'", owner),
                &invalid,
            ));
        }

        let mut options = MapperAttributeOptions::new();
        for (key, value) in &pairs {
            let value = value.as_ref().trim();
            if key.as_ref() == "memoize" {
                options.memoize = match value.to_lowercase().as_str() {
                    "" | "true" | "yes" | "1" => true,
                    "false" | "no" | "0" => false,
                    _ => {
                        return Err(RowModelError::invalid_option(
                            &format!("attribute '{}'", owner),
                            &[format!("memoize={}", value)],
                        ))
                    }
                };
            } else {
                options = options.dependencies(
                    value.split(',').map(str::trim).filter(|f| !f.is_empty()),
                );
            }
        }
        Ok(options)
    }
}

/// One declared derived attribute
#[derive(Clone)]
pub struct MapperAttribute {
    pub name: String,
    pub options: MapperAttributeOptions,
    compute: MapperFn,
}

impl fmt::Debug for MapperAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapperAttribute")
            .field("name", &self.name)
            .field("options", &self.options)
            .finish()
    }
}

impl MapperAttribute {
    pub(crate) fn compute(&self, mapper: &Mapper) -> Value {
        (self.compute)(mapper)
    }

    pub fn depends_on_any<'a>(&self, mut fields: impl Iterator<Item = &'a str>) -> bool {
        fields.any(|f| self.options.dependencies.iter().any(|d| d == f))
    }
}

/// Frozen definition of a mapper class
#[derive(Debug)]
pub struct MapperSchema {
    name: String,
    attributes: Arc<Vec<MapperAttribute>>,
    rules: Arc<Vec<Rule>>,
    row_schema: Option<Arc<Schema>>,
}

impl MapperSchema {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &[MapperAttribute] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&MapperAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn attribute_names(&self) -> Vec<String> {
        self.attributes.iter().map(|a| a.name.clone()).collect()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// The row-model schema this mapper reads through, if bound
    pub fn row_schema(&self) -> Option<&Arc<Schema>> {
        self.row_schema.as_ref()
    }
}

/// Builder and store for mapper classes
#[derive(Debug, Default)]
pub struct MapperRegistry {
    registry: ConfigRegistry,
}

impl MapperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a root mapper class
    pub fn define(&mut self, name: &str) -> ClassId {
        let class = self.registry.define_class(name, None);
        let _ = self.registry.include(class, Capability::MAPPER_ATTRIBUTES);
        class
    }

    pub fn subclass(&mut self, name: &str, parent: ClassId) -> Result<ClassId, RowModelError> {
        self.registry.name(parent)?;
        Ok(self.registry.define_class(name, Some(parent)))
    }

    /// Bind `class` to the row-model schema it maps; allowed once per class
    pub fn maps_to(&mut self, class: ClassId, row_schema: Arc<Schema>) -> Result<(), RowModelError> {
        if matches!(self.registry.local(class, &MAPS_TO), Some(Some(_))) {
            return Err(RowModelError::AlreadyMapped {
                class: self.registry.name(class)?.to_string(),
            });
        }
        self.registry.declare_local(class, &MAPS_TO, Some(row_schema))
    }

    /// Declare (or wholly redeclare) a derived attribute
    pub fn attribute<F>(
        &mut self,
        class: ClassId,
        name: &str,
        options: MapperAttributeOptions,
        compute: F,
    ) -> Result<(), RowModelError>
    where
        F: Fn(&Mapper) -> Value + Send + Sync + 'static,
    {
        self.registry
            .local_mut(class, &ATTRIBUTES)?
            .push(MapperAttribute {
                name: name.to_string(),
                options,
                compute: Arc::new(compute),
            });
        Ok(())
    }

    /// Register a rule on the mapper's errors channel
    pub fn validate(&mut self, class: ClassId, rule: Rule) -> Result<(), RowModelError> {
        self.registry.local_mut(class, &VALIDATIONS)?.push(rule);
        Ok(())
    }

    pub fn attribute_names(&self, class: ClassId) -> Result<Vec<String>, RowModelError> {
        Ok(self.attributes(class)?.iter().map(|a| a.name.clone()).collect())
    }

    /// The bound row-model schema of `class` or its nearest bound ancestor
    pub fn row_schema(&self, class: ClassId) -> Result<Arc<Schema>, RowModelError> {
        let bound = self.registry.resolve(
            class,
            &MAPS_TO,
            None,
            |acc: Option<Arc<Schema>>, local: &Option<Arc<Schema>>| local.clone().or(acc),
            Capability::MAPPER_ATTRIBUTES,
        )?;
        match bound.as_ref() {
            Some(schema) => Ok(Arc::clone(schema)),
            None => Err(RowModelError::MissingRowModel {
                class: self.registry.name(class)?.to_string(),
            }),
        }
    }

    /// Freeze `class` into a [`MapperSchema`]
    pub fn schema(&self, class: ClassId) -> Result<Arc<MapperSchema>, RowModelError> {
        let row_schema = match self.row_schema(class) {
            Ok(schema) => Some(schema),
            Err(RowModelError::MissingRowModel { .. }) => None,
            Err(e) => return Err(e),
        };
        let rules = self.registry.resolve(
            class,
            &VALIDATIONS,
            Vec::new(),
            |mut acc: Vec<Rule>, local: &Vec<Rule>| {
                acc.extend(local.iter().cloned());
                acc
            },
            Capability::MAPPER_ATTRIBUTES,
        )?;

        Ok(Arc::new(MapperSchema {
            name: self.registry.name(class)?.to_string(),
            attributes: self.attributes(class)?,
            rules,
            row_schema,
        }))
    }

    fn attributes(&self, class: ClassId) -> Result<Arc<Vec<MapperAttribute>>, RowModelError> {
        self.registry.resolve(
            class,
            &ATTRIBUTES,
            Vec::new(),
            |mut acc: Vec<MapperAttribute>, local: &Vec<MapperAttribute>| {
                for attribute in local {
                    match acc.iter_mut().find(|a| a.name == attribute.name) {
                        Some(existing) => *existing = attribute.clone(),
                        None => acc.push(attribute.clone()),
                    }
                }
                acc
            },
            Capability::MAPPER_ATTRIBUTES,
        )
    }
}
