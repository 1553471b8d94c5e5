//! Row-model class definitions
//!
//! [`ModelRegistry`] is the builder used while classes are being declared:
//! columns, validations, hooks and child relationships are stored as class
//! vars in a [`ConfigRegistry`] and therefore inherited by subclasses.
//!
//! Once a class is fully declared, [`ModelRegistry::schema`] freezes it into
//! a [`Schema`]: the resolved column table plus a dispatch table of
//! [`ColumnAccessor`]s (parse strategy and default strategy per column) that
//! row models read through. Schemas are immutable and shared via `Arc`.

use crate::core::columns::{
    ColumnDeclaration, ColumnOptions, ColumnTable, ColumnType, DefaultValue, ParseFn,
};
use crate::core::hooks::{DefaultHooks, RowModelHooks};
use crate::core::registry::{Capability, ClassId, ClassVar, ConfigRegistry};
use crate::core::row_model::RowModel;
use crate::core::validation::Rule;
use crate::types::{RowModelError, Value};
use regex::{Regex, RegexBuilder};
use std::fmt;
use std::sync::Arc;

const COLUMNS: ClassVar<Vec<ColumnDeclaration>> = ClassVar::new("columns");
const VALIDATIONS: ClassVar<Vec<Rule>> = ClassVar::new("validations");
const WARNINGS: ClassVar<Vec<Rule>> = ClassVar::new("warnings");
const HOOKS: ClassVar<Option<Arc<dyn RowModelHooks>>> = ClassVar::new("hooks");
const HAS_MANY: ClassVar<Option<HasMany>> = ClassVar::new("has_many");
const KIND: ClassVar<Option<ModelKind>> = ClassVar::new("kind");

/// How a reader maps a file onto row models of a class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelKind {
    /// One row model per CSV row, after a header row
    #[default]
    Rows,
    /// The whole (headerless) file is one row model of label/value rows
    SingleModel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct HasMany {
    relation: String,
    child: ClassId,
}

/// How one column turns a formatted cell into a value
#[derive(Clone)]
pub enum ParseStrategy {
    Typed(ColumnType),
    Custom(ParseFn),
}

impl ParseStrategy {
    pub fn apply(&self, cell: &str, row: &RowModel) -> Result<Value, String> {
        match self {
            ParseStrategy::Typed(column_type) => column_type.parse(cell),
            ParseStrategy::Custom(parse) => Ok(parse(cell, row)),
        }
    }
}

impl fmt::Debug for ParseStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseStrategy::Typed(t) => f.debug_tuple("Typed").field(t).finish(),
            ParseStrategy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Precompiled read path of one column
#[derive(Debug, Clone)]
pub struct ColumnAccessor {
    pub name: String,
    pub index: usize,
    pub column_type: ColumnType,
    pub parse: ParseStrategy,
    pub default: Option<DefaultValue>,
    pub validate_type: bool,
    pub dynamic: bool,
}

/// Frozen definition of a row-model class
pub struct Schema {
    class: ClassId,
    name: String,
    columns: Arc<ColumnTable>,
    accessors: Vec<ColumnAccessor>,
    dynamic: Option<usize>,
    headers: Vec<String>,
    header_matchers: Vec<Regex>,
    rules: Arc<Vec<Rule>>,
    warnings: Arc<Vec<Rule>>,
    hooks: Arc<dyn RowModelHooks>,
    child: Option<(String, Arc<Schema>)>,
    kind: ModelKind,
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("columns", &self.columns.names())
            .field("kind", &self.kind)
            .field("child", &self.child.as_ref().map(|(r, s)| (r, &s.name)))
            .finish()
    }
}

impl Schema {
    pub fn class(&self) -> ClassId {
        self.class
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &ColumnTable {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.names()
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn accessors(&self) -> &[ColumnAccessor] {
        &self.accessors
    }

    pub fn accessor(&self, name: &str) -> Option<&ColumnAccessor> {
        self.accessors.iter().find(|a| a.name == name)
    }

    /// The dynamic column's accessor, if the class declares one
    pub fn dynamic_column(&self) -> Option<&ColumnAccessor> {
        self.dynamic.and_then(|i| self.accessors.get(i))
    }

    /// Number of positionally mapped (non-dynamic) columns
    pub fn fixed_column_count(&self) -> usize {
        self.dynamic.unwrap_or(self.accessors.len())
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn warning_rules(&self) -> &[Rule] {
        &self.warnings
    }

    pub fn hooks(&self) -> &dyn RowModelHooks {
        self.hooks.as_ref()
    }

    pub fn child_schema(&self) -> Option<&Arc<Schema>> {
        self.child.as_ref().map(|(_, schema)| schema)
    }

    pub fn relation(&self) -> Option<&str> {
        self.child.as_ref().map(|(relation, _)| relation.as_str())
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    /// Index of the first column whose header matchers match `label`
    pub fn index_header_match(&self, label: &str) -> Option<usize> {
        self.header_matchers.iter().position(|m| m.is_match(label))
    }
}

/// Builder and store for row-model classes
#[derive(Debug, Default)]
pub struct ModelRegistry {
    registry: ConfigRegistry,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &ConfigRegistry {
        &self.registry
    }

    /// Define a root row-model class (gains column support)
    pub fn define(&mut self, name: &str) -> ClassId {
        let class = self.registry.define_class(name, None);
        // a freshly defined id always exists
        let _ = self.registry.include(class, Capability::COLUMNS);
        class
    }

    /// Define a subclass inheriting every class var of `parent`
    pub fn subclass(&mut self, name: &str, parent: ClassId) -> Result<ClassId, RowModelError> {
        self.registry.name(parent)?;
        Ok(self.registry.define_class(name, Some(parent)))
    }

    /// Declare (or wholly redeclare) a column
    pub fn column(
        &mut self,
        class: ClassId,
        name: &str,
        options: ColumnOptions,
    ) -> Result<(), RowModelError> {
        let table = self.columns(class)?;
        let class_name = self.registry.name(class)?.to_string();
        match table.dynamic_column() {
            Some(existing) if options.is_dynamic() && existing != name => {
                return Err(RowModelError::DuplicateDynamicColumn {
                    class: class_name,
                    existing: existing.to_string(),
                    column: name.to_string(),
                })
            }
            Some(existing) if !options.is_dynamic() && !table.contains(name) => {
                return Err(RowModelError::DynamicColumnNotLast {
                    class: class_name,
                    column: existing.to_string(),
                })
            }
            _ => {}
        }

        self.registry
            .local_mut(class, &COLUMNS)?
            .push(ColumnDeclaration::Column {
                name: name.to_string(),
                options,
            });
        Ok(())
    }

    /// Declare the class's dynamic column
    pub fn dynamic_column(
        &mut self,
        class: ClassId,
        name: &str,
        options: ColumnOptions,
    ) -> Result<(), RowModelError> {
        self.column(class, name, options.dynamic())
    }

    /// Shallow-merge `options` into an already declared (possibly inherited) column
    pub fn merge_options(
        &mut self,
        class: ClassId,
        name: &str,
        options: ColumnOptions,
    ) -> Result<(), RowModelError> {
        let table = self.columns(class)?;
        let class_name = self.registry.name(class)?.to_string();
        if !table.contains(name) {
            return Err(RowModelError::unknown_column(&class_name, name));
        }
        if let Some(existing) = table.dynamic_column() {
            if options.is_dynamic() && existing != name {
                return Err(RowModelError::DuplicateDynamicColumn {
                    class: class_name,
                    existing: existing.to_string(),
                    column: name.to_string(),
                });
            }
        }

        self.registry
            .local_mut(class, &COLUMNS)?
            .push(ColumnDeclaration::MergeOptions {
                name: name.to_string(),
                options,
            });
        Ok(())
    }

    /// Resolved column table of `class`
    pub fn columns(&self, class: ClassId) -> Result<Arc<ColumnTable>, RowModelError> {
        self.registry.resolve(
            class,
            &COLUMNS,
            ColumnTable::default(),
            |table, declarations| table.apply(declarations),
            Capability::COLUMNS,
        )
    }

    pub fn column_names(&self, class: ClassId) -> Result<Vec<String>, RowModelError> {
        Ok(self.columns(class)?.names())
    }

    /// Resolved options of one column
    pub fn options(&self, class: ClassId, name: &str) -> Result<ColumnOptions, RowModelError> {
        let table = self.columns(class)?;
        table.get(name).cloned().ok_or_else(|| {
            RowModelError::unknown_column(self.registry.name(class).unwrap_or("<unknown>"), name)
        })
    }

    /// Per column: the `header` option if present, else the class's `format_header`
    pub fn headers(&self, class: ClassId) -> Result<Vec<String>, RowModelError> {
        let table = self.columns(class)?;
        let hooks = self.hooks_of(class)?;
        Ok(build_headers(&table, hooks.as_ref()))
    }

    /// Register a rule on the errors channel
    pub fn validate(&mut self, class: ClassId, rule: Rule) -> Result<(), RowModelError> {
        self.registry.local_mut(class, &VALIDATIONS)?.push(rule);
        Ok(())
    }

    /// Register a rule on the warnings channel
    pub fn warn(&mut self, class: ClassId, rule: Rule) -> Result<(), RowModelError> {
        self.registry.local_mut(class, &WARNINGS)?.push(rule);
        Ok(())
    }

    /// Install the class's hooks; subclasses inherit them until they install their own
    pub fn hooks<H>(&mut self, class: ClassId, hooks: H) -> Result<(), RowModelError>
    where
        H: RowModelHooks + 'static,
    {
        let hooks: Arc<dyn RowModelHooks> = Arc::new(hooks);
        self.registry.declare_local(class, &HOOKS, Some(hooks))
    }

    /// Declare `child` rows that attach under rows of `class`
    pub fn has_many(
        &mut self,
        class: ClassId,
        relation: &str,
        child: ClassId,
    ) -> Result<(), RowModelError> {
        self.registry.name(child)?;
        self.registry.declare_local(
            class,
            &HAS_MANY,
            Some(HasMany {
                relation: relation.to_string(),
                child,
            }),
        )
    }

    pub fn kind(&mut self, class: ClassId, kind: ModelKind) -> Result<(), RowModelError> {
        self.registry.declare_local(class, &KIND, Some(kind))
    }

    /// Freeze `class` into a [`Schema`]
    pub fn schema(&self, class: ClassId) -> Result<Arc<Schema>, RowModelError> {
        self.build_schema(class, &mut Vec::new())
    }

    fn hooks_of(&self, class: ClassId) -> Result<Arc<dyn RowModelHooks>, RowModelError> {
        let hooks = self.registry.resolve(class, &HOOKS, None, last_set, Capability::COLUMNS)?;
        Ok(match hooks.as_ref() {
            Some(hooks) => Arc::clone(hooks),
            None => Arc::new(DefaultHooks),
        })
    }

    fn build_schema(
        &self,
        class: ClassId,
        visiting: &mut Vec<ClassId>,
    ) -> Result<Arc<Schema>, RowModelError> {
        let name = self.registry.name(class)?.to_string();
        if visiting.contains(&class) {
            return Err(RowModelError::CyclicRelation { class: name });
        }
        visiting.push(class);

        let columns = self.columns(class)?;
        let accessors = build_accessors(&name, &columns)?;
        let dynamic = accessors.iter().position(|a| a.dynamic);

        let hooks = self.hooks_of(class)?;
        let headers = build_headers(&columns, hooks.as_ref());
        let header_matchers = columns
            .iter()
            .map(|(column, options)| header_matcher(column, options))
            .collect::<Result<Vec<_>, _>>()?;

        let rules = self.registry.resolve(class, &VALIDATIONS, Vec::new(), append, Capability::COLUMNS)?;
        let warnings = self.registry.resolve(class, &WARNINGS, Vec::new(), append, Capability::COLUMNS)?;
        let kind = self
            .registry
            .resolve(class, &KIND, None, last_set, Capability::COLUMNS)?
            .unwrap_or_default();

        let relation = self
            .registry
            .resolve(class, &HAS_MANY, None, last_set, Capability::COLUMNS)?;
        let child = match relation.as_ref() {
            Some(has_many) => Some((
                has_many.relation.clone(),
                self.build_schema(has_many.child, visiting)?,
            )),
            None => None,
        };

        visiting.pop();
        Ok(Arc::new(Schema {
            class,
            name,
            columns,
            accessors,
            dynamic,
            headers,
            header_matchers,
            rules,
            warnings,
            hooks,
            child,
            kind,
        }))
    }
}

fn append<T: Clone>(mut acc: Vec<T>, local: &Vec<T>) -> Vec<T> {
    acc.extend(local.iter().cloned());
    acc
}

fn last_set<T: Clone>(acc: Option<T>, local: &Option<T>) -> Option<T> {
    local.clone().or(acc)
}

fn build_headers(table: &ColumnTable, hooks: &dyn RowModelHooks) -> Vec<String> {
    table
        .iter()
        .map(|(name, options)| {
            options
                .header
                .clone()
                .unwrap_or_else(|| hooks.format_header(name))
        })
        .collect()
}

fn build_accessors(class: &str, table: &ColumnTable) -> Result<Vec<ColumnAccessor>, RowModelError> {
    let dynamic: Vec<&str> = table
        .iter()
        .filter(|(_, o)| o.is_dynamic())
        .map(|(n, _)| n)
        .collect();
    // merge_options on a subclass can still break the dynamic column invariants
    if let [first, second, ..] = dynamic.as_slice() {
        return Err(RowModelError::DuplicateDynamicColumn {
            class: class.to_string(),
            existing: first.to_string(),
            column: second.to_string(),
        });
    }
    if let Some(column) = dynamic.first() {
        if table.position(column) != Some(table.len() - 1) {
            return Err(RowModelError::DynamicColumnNotLast {
                class: class.to_string(),
                column: column.to_string(),
            });
        }
    }

    Ok(table
        .iter()
        .enumerate()
        .map(|(index, (name, options))| {
            let column_type = options.type_or_default();
            ColumnAccessor {
                name: name.to_string(),
                index,
                column_type,
                parse: match &options.parse {
                    Some(parse) => ParseStrategy::Custom(Arc::clone(parse)),
                    None => ParseStrategy::Typed(column_type),
                },
                default: options.default.clone(),
                validate_type: options.validate_type.unwrap_or(false),
                dynamic: options.is_dynamic(),
            }
        })
        .collect())
}

fn header_matcher(column: &str, options: &ColumnOptions) -> Result<Regex, RowModelError> {
    let pattern = match &options.header_matchers {
        Some(matchers) if !matchers.is_empty() => matchers.join("|"),
        _ => regex::escape(column),
    };
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| {
            RowModelError::invalid_option(
                &format!("column '{}'", column),
                &[format!("header_matchers={} ({})", pattern, e)],
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    struct Shouting;

    impl RowModelHooks for Shouting {
        fn format_header(&self, column_name: &str) -> String {
            column_name.to_uppercase()
        }
    }

    fn base() -> (ModelRegistry, ClassId) {
        let mut models = ModelRegistry::new();
        let base = models.define("BasicRowModel");
        models.column(base, "string1", ColumnOptions::new()).unwrap();
        models
            .column(base, "string2", ColumnOptions::new().header("String 2"))
            .unwrap();
        (models, base)
    }

    #[test]
    fn test_subclass_without_locals_has_parent_columns() {
        let (mut models, base) = base();
        let child = models.subclass("Child", base).unwrap();
        let grandchild = models.subclass("GrandChild", child).unwrap();

        assert_eq!(models.column_names(grandchild).unwrap(), models.column_names(base).unwrap());
        assert_eq!(models.column_names(child).unwrap(), vec!["string1", "string2"]);
    }

    #[test]
    fn test_subclass_columns_extend_without_touching_parent() {
        let (mut models, base) = base();
        let child = models.subclass("Child", base).unwrap();
        models.column(child, "string3", ColumnOptions::new()).unwrap();

        assert_eq!(models.column_names(child).unwrap(), vec!["string1", "string2", "string3"]);
        assert_eq!(models.column_names(base).unwrap(), vec!["string1", "string2"]);
    }

    #[test]
    fn test_parent_change_reaches_cached_subclass() {
        let (mut models, base) = base();
        let child = models.subclass("Child", base).unwrap();
        models.column_names(child).unwrap();

        models.column(base, "late", ColumnOptions::new()).unwrap();

        assert_eq!(models.column_names(child).unwrap(), vec!["string1", "string2", "late"]);
    }

    #[test]
    fn test_headers_use_option_then_hook() {
        let (mut models, base) = base();
        assert_eq!(models.headers(base).unwrap(), vec!["string1", "String 2"]);

        let loud = models.subclass("Loud", base).unwrap();
        models.hooks(loud, Shouting).unwrap();
        assert_eq!(models.headers(loud).unwrap(), vec!["STRING1", "String 2"]);
        assert_eq!(models.headers(base).unwrap(), vec!["string1", "String 2"]);
    }

    #[test]
    fn test_merge_options_is_local_to_subclass() {
        let (mut models, base) = base();
        let child = models.subclass("Child", base).unwrap();
        models
            .merge_options(child, "string1", ColumnOptions::new().column_type(ColumnType::Integer))
            .unwrap();

        assert_eq!(models.options(child, "string1").unwrap().column_type, Some(ColumnType::Integer));
        assert_eq!(models.options(base, "string1").unwrap().column_type, None);
        assert_eq!(models.column_names(child).unwrap(), vec!["string1", "string2"]);
    }

    #[test]
    fn test_merge_options_on_undeclared_column_fails() {
        let (mut models, base) = base();
        let result = models.merge_options(base, "nope", ColumnOptions::new());
        assert!(matches!(result, Err(RowModelError::UnknownColumn { .. })));
    }

    #[rstest]
    #[case::second_dynamic("other", true)]
    #[case::column_after_dynamic("after", false)]
    fn test_dynamic_column_invariants(#[case] column: &str, #[case] dynamic: bool) {
        let (mut models, base) = base();
        models.dynamic_column(base, "skills", ColumnOptions::new()).unwrap();

        let options = if dynamic { ColumnOptions::new().dynamic() } else { ColumnOptions::new() };
        let error = models.column(base, column, options).unwrap_err();
        assert!(error.is_definition());
    }

    #[test]
    fn test_schema_rejects_dynamic_column_moved_off_the_end() {
        let (mut models, base) = base();
        let child = models.subclass("Child", base).unwrap();
        models
            .merge_options(child, "string1", ColumnOptions::new().dynamic())
            .unwrap();

        assert!(matches!(
            models.schema(child),
            Err(RowModelError::DynamicColumnNotLast { .. })
        ));
    }

    #[test]
    fn test_schema_accessors_and_fixed_count() {
        let (mut models, base) = base();
        models.dynamic_column(base, "skills", ColumnOptions::new()).unwrap();
        let schema = models.schema(base).unwrap();

        assert_eq!(schema.fixed_column_count(), 2);
        assert_eq!(schema.dynamic_column().map(|a| a.name.as_str()), Some("skills"));
        assert_eq!(schema.accessor("string2").map(|a| a.index), Some(1));
    }

    #[test]
    fn test_has_many_cycle_is_rejected() {
        let (mut models, base) = base();
        let child = models.define("Child");
        models.has_many(base, "children", child).unwrap();
        models.has_many(child, "parents", base).unwrap();

        assert!(matches!(models.schema(base), Err(RowModelError::CyclicRelation { .. })));
    }

    #[test]
    fn test_header_matchers_are_case_insensitive() {
        let mut models = ModelRegistry::new();
        let class = models.define("Single");
        models.column(class, "name", ColumnOptions::new()).unwrap();
        models
            .column(class, "age", ColumnOptions::new().header_matchers(["^age", "years"]))
            .unwrap();
        let schema = models.schema(class).unwrap();

        assert_eq!(schema.index_header_match("NAME"), Some(0));
        assert_eq!(schema.index_header_match("Age:"), Some(1));
        assert_eq!(schema.index_header_match("Years old"), Some(1));
        assert_eq!(schema.index_header_match("other"), None);
    }
}
