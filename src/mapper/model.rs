//! Mapper instances
//!
//! A [`Mapper`] wraps one row model and exposes the derived attributes of its
//! class. Attributes whose dependencies already failed row validation are
//! never computed, and their own errors are filtered out in favor of the row's.

use crate::core::row_model::RowModel;
use crate::core::validation::Errors;
use crate::mapper::attributes::{MapperAttribute, MapperSchema};
use crate::types::{Attributes, Context, RowModelError, Value};
use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

pub struct Mapper {
    schema: Arc<MapperSchema>,
    row: Rc<RowModel>,
    memo: RefCell<HashMap<String, Value>>,
    errors: OnceCell<Errors>,
}

impl fmt::Debug for Mapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("class", &self.schema.name())
            .field("row", &self.row)
            .finish()
    }
}

impl Mapper {
    pub fn new(schema: Arc<MapperSchema>, row: Rc<RowModel>) -> Self {
        Mapper {
            schema,
            row,
            memo: RefCell::new(HashMap::new()),
            errors: OnceCell::new(),
        }
    }

    pub fn schema(&self) -> &Arc<MapperSchema> {
        &self.schema
    }

    pub fn row_model(&self) -> &Rc<RowModel> {
        &self.row
    }

    pub fn context(&self) -> &Context {
        self.row.context()
    }

    /// Value of a derived attribute.
    ///
    /// `Null` without computing when any dependency has a row error.
    pub fn attribute(&self, name: &str) -> Result<Value, RowModelError> {
        let attribute = self
            .schema
            .attribute(name)
            .ok_or_else(|| RowModelError::unknown_attribute(name))?;
        Ok(self.value_of(attribute))
    }

    pub fn attributes(&self) -> Attributes {
        self.schema
            .attributes()
            .iter()
            .map(|a| (a.name.clone(), self.value_of(a)))
            .collect()
    }

    fn value_of(&self, attribute: &MapperAttribute) -> Value {
        if attribute.depends_on_any(self.row.errors().fields()) {
            return Value::Null;
        }
        if attribute.options.memoize {
            if let Some(value) = self.memo.borrow().get(&attribute.name) {
                return value.clone();
            }
        }

        let value = attribute.compute(self);
        if attribute.options.memoize {
            self.memo
                .borrow_mut()
                .insert(attribute.name.clone(), value.clone());
        }
        value
    }

    /// Mapper errors merged with the row's, computed once.
    ///
    /// An attribute error is dropped when the attribute depends on a field the
    /// row already reports; the row's errors never overwrite mapper errors.
    pub fn errors(&self) -> &Errors {
        self.errors.get_or_init(|| {
            let mut errors = Errors::new();
            for rule in self.schema.rules() {
                let value = self
                    .attribute(rule.field())
                    .or_else(|_| self.row.attribute(rule.field()))
                    .unwrap_or_default();
                rule.apply(&value, &mut errors);
            }

            let row_errors = self.row.errors();
            for attribute in self.schema.attributes() {
                if errors.contains(&attribute.name) && attribute.depends_on_any(row_errors.fields()) {
                    errors.delete(&attribute.name);
                }
            }
            errors.reverse_merge(row_errors);
            errors
        })
    }

    pub fn is_valid(&self) -> bool {
        self.errors().is_empty()
    }

    pub fn skip(&self) -> bool {
        !self.is_valid() || self.row.skip()
    }

    pub fn abort(&self) -> bool {
        self.row.abort()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::columns::ColumnOptions;
    use crate::core::row_model::RowOptions;
    use crate::core::schema::ModelRegistry;
    use crate::core::validation::Rule;
    use crate::mapper::attributes::{MapperAttributeOptions, MapperRegistry};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        mapper_schema: Arc<MapperSchema>,
        calls: Arc<AtomicUsize>,
    }

    impl Fixture {
        fn mapper(&self, cells: &[&str]) -> Mapper {
            let row_schema = Arc::clone(self.mapper_schema.row_schema().unwrap());
            let row = RowModel::new(
                row_schema,
                cells.iter().map(|c| c.to_string()).collect(),
                RowOptions::new(),
            );
            Mapper::new(Arc::clone(&self.mapper_schema), row)
        }
    }

    /// Row: `f` (required), `g` (required). Mapper: `derived` depends on `f`.
    fn fixture(memoize: bool) -> Fixture {
        let mut models = ModelRegistry::new();
        let row_class = models.define("Row");
        models.column(row_class, "f", ColumnOptions::new()).unwrap();
        models.column(row_class, "g", ColumnOptions::new()).unwrap();
        models.validate(row_class, Rule::presence("f")).unwrap();
        models.validate(row_class, Rule::presence("g")).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut mappers = MapperRegistry::new();
        let class = mappers.define("Mapper");
        mappers.maps_to(class, models.schema(row_class).unwrap()).unwrap();
        mappers
            .attribute(
                class,
                "derived",
                MapperAttributeOptions::new()
                    .memoize(memoize)
                    .dependencies(["f"]),
                move |mapper| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    mapper.row_model().attribute("f").unwrap_or_default()
                },
            )
            .unwrap();
        mappers.validate(class, Rule::presence("derived")).unwrap();

        Fixture {
            mapper_schema: mappers.schema(class).unwrap(),
            calls,
        }
    }

    #[test]
    fn test_dependency_error_suppresses_computation() {
        let fixture = fixture(true);
        let mapper = fixture.mapper(&["", "g"]);

        assert_eq!(mapper.attribute("derived").unwrap(), Value::Null);
        assert_eq!(fixture.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_errors_filter_redundant_attribute_errors() {
        let fixture = fixture(true);
        let mapper = fixture.mapper(&["", ""]);

        let errors = mapper.errors();
        assert!(!errors.contains("derived"));
        assert!(errors.contains("f"));
        assert!(errors.contains("g"));
        assert!(mapper.skip());
        assert!(!mapper.abort());
    }

    #[test]
    fn test_row_errors_do_not_overwrite_mapper_errors() {
        let mut models = ModelRegistry::new();
        let row_class = models.define("Row");
        models.column(row_class, "g", ColumnOptions::new()).unwrap();
        models.validate(row_class, Rule::presence("g")).unwrap();
        let row_schema = models.schema(row_class).unwrap();

        let mut mappers = MapperRegistry::new();
        let class = mappers.define("StrictMapper");
        mappers.maps_to(class, Arc::clone(&row_schema)).unwrap();
        mappers
            .validate(
                class,
                Rule::custom("g", |value| {
                    value.is_blank().then(|| "needs a value to map".to_string())
                }),
            )
            .unwrap();

        let row = RowModel::new(row_schema, vec!["".to_string()], RowOptions::new());
        let mapper = Mapper::new(mappers.schema(class).unwrap(), Rc::clone(&row));

        assert_eq!(row.errors().get("g"), ["can't be blank"]);
        assert_eq!(mapper.errors().get("g"), ["needs a value to map"]);
        assert_eq!(mapper.errors().full_messages(), vec!["G needs a value to map"]);
    }

    #[test]
    fn test_valid_row_computes_once_when_memoized() {
        let fixture = fixture(true);
        let mapper = fixture.mapper(&["value", "g"]);

        assert_eq!(mapper.attribute("derived").unwrap(), Value::from("value"));
        assert_eq!(mapper.attribute("derived").unwrap(), Value::from("value"));
        assert_eq!(fixture.calls.load(Ordering::SeqCst), 1);
        assert!(mapper.is_valid());
    }

    #[test]
    fn test_unmemoized_attribute_recomputes() {
        let fixture = fixture(false);
        let mapper = fixture.mapper(&["value", "g"]);

        mapper.attribute("derived").unwrap();
        mapper.attribute("derived").unwrap();
        assert_eq!(fixture.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unknown_attribute() {
        let fixture = fixture(true);
        let mapper = fixture.mapper(&["value", "g"]);
        assert!(matches!(
            mapper.attribute("nope"),
            Err(RowModelError::UnknownAttribute { .. })
        ));
        assert_eq!(mapper.attributes().names().collect::<Vec<_>>(), vec!["derived"]);
    }
}
