//! Class-hierarchy configuration registry
//!
//! Row-model and mapper "classes" are plain ids in a [`ConfigRegistry`]. Each
//! class may declare local values for a [`ClassVar`]; resolving a class var on
//! a class folds the local values of every class in its chain, root to leaf,
//! starting at the class that first gained the requested [`Capability`].
//!
//! # Caching
//!
//! Resolutions are cached per `(class, var)` and shared as `Arc`s. Every class
//! that resolves through an ancestor is remembered as a dependent of that
//! ancestor, so changing an ancestor's locals clears the ancestor and all of
//! its already-cached descendants.
//!
//! ```text
//! Grandparent
//!   └── Parent        (includes capability, locals ["Parent"])
//!         └── Leaf    (locals ["Leaf"])      resolve(Leaf) == ["Parent", "Leaf"]
//! ```
//!
//! Locals are only written while classes are being defined (`&mut self`);
//! resolution takes `&self` and its cache is a `DashMap`, so a fully defined
//! registry can be read from several readers at once.

use crate::types::RowModelError;
use dashmap::DashMap;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Identifier of a class inside a [`ConfigRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(usize);

impl ClassId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Marker a class mixes in to gain a family of class vars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capability(&'static str);

impl Capability {
    /// Column support for row models
    pub const COLUMNS: Capability = Capability("columns");
    /// Derived attribute support for mappers
    pub const MAPPER_ATTRIBUTES: Capability = Capability("mapper_attributes");

    pub const fn new(name: &'static str) -> Self {
        Capability(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

/// Typed key for a class-level variable whose locals have type `L`
pub struct ClassVar<L> {
    key: &'static str,
    _marker: PhantomData<fn() -> L>,
}

impl<L> ClassVar<L> {
    pub const fn new(key: &'static str) -> Self {
        ClassVar {
            key,
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }
}

#[derive(Debug)]
struct ClassNode {
    name: String,
    parent: Option<ClassId>,
    capabilities: Vec<Capability>,
}

type Shared = Arc<dyn Any + Send + Sync>;
type VarKey = (ClassId, &'static str);

/// Class hierarchy plus per-class locals and cached resolutions
#[derive(Default)]
pub struct ConfigRegistry {
    classes: Vec<ClassNode>,
    locals: HashMap<VarKey, Box<dyn Any + Send + Sync>>,
    cache: DashMap<VarKey, Shared>,
    dependents: DashMap<VarKey, HashSet<ClassId>>,
}

impl fmt::Debug for ConfigRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigRegistry")
            .field("classes", &self.classes)
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl ConfigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class, optionally inheriting from `parent`
    pub fn define_class(&mut self, name: &str, parent: Option<ClassId>) -> ClassId {
        let id = ClassId(self.classes.len());
        self.classes.push(ClassNode {
            name: name.to_string(),
            parent,
            capabilities: Vec::new(),
        });
        id
    }

    /// Mix `capability` into `class`
    pub fn include(&mut self, class: ClassId, capability: Capability) -> Result<(), RowModelError> {
        let node = self
            .classes
            .get_mut(class.0)
            .ok_or(RowModelError::UnknownClass { id: class.0 })?;
        if !node.capabilities.contains(&capability) {
            node.capabilities.push(capability);
        }
        Ok(())
    }

    pub fn name(&self, class: ClassId) -> Result<&str, RowModelError> {
        self.node(class).map(|n| n.name.as_str())
    }

    pub fn parent(&self, class: ClassId) -> Result<Option<ClassId>, RowModelError> {
        self.node(class).map(|n| n.parent)
    }

    /// True when `class` or one of its ancestors mixed in `capability`
    pub fn includes(&self, class: ClassId, capability: Capability) -> bool {
        self.class_including(class, capability).is_ok()
    }

    /// The top-most class of `class`'s chain that mixed in `capability`
    pub fn class_including(
        &self,
        class: ClassId,
        capability: Capability,
    ) -> Result<ClassId, RowModelError> {
        let mut found = None;
        let mut current = Some(class);
        while let Some(id) = current {
            let node = self.node(id)?;
            if node.capabilities.contains(&capability) {
                found = Some(id);
            }
            current = node.parent;
        }
        found.ok_or_else(|| {
            RowModelError::capability_missing(
                self.name(class).unwrap_or("<unknown>"),
                capability.name(),
            )
        })
    }

    /// Root-to-leaf chain from the class that introduced `capability` down to `class`
    pub fn chain(&self, class: ClassId, capability: Capability) -> Result<Vec<ClassId>, RowModelError> {
        let stop = self.class_including(class, capability)?;
        let mut chain = Vec::new();
        let mut current = Some(class);
        while let Some(id) = current {
            chain.push(id);
            if id == stop {
                break;
            }
            current = self.node(id)?.parent;
        }
        chain.reverse();
        Ok(chain)
    }

    /// Replace `class`'s local value for `var`
    pub fn declare_local<L: Any + Send + Sync>(
        &mut self,
        class: ClassId,
        var: &ClassVar<L>,
        value: L,
    ) -> Result<(), RowModelError> {
        self.node(class)?;
        self.invalidate_deep(class, var);
        self.locals.insert((class, var.key), Box::new(value));
        Ok(())
    }

    /// `class`'s own local value for `var`, ignoring ancestors
    pub fn local<L: Any + Send + Sync>(&self, class: ClassId, var: &ClassVar<L>) -> Option<&L> {
        self.locals
            .get(&(class, var.key))
            .and_then(|boxed| boxed.downcast_ref::<L>())
    }

    /// Mutable access to `class`'s local value, created empty on first use.
    /// Clears the cached resolutions of `class` and its descendants.
    pub fn local_mut<L: Any + Send + Sync + Default>(
        &mut self,
        class: ClassId,
        var: &ClassVar<L>,
    ) -> Result<&mut L, RowModelError> {
        self.node(class)?;
        self.invalidate_deep(class, var);

        let slot = self
            .locals
            .entry((class, var.key))
            .or_insert_with(|| Box::new(L::default()));
        if !slot.is::<L>() {
            *slot = Box::new(L::default());
        }
        slot.downcast_mut::<L>()
            .ok_or(RowModelError::UnknownClass { id: class.0 })
    }

    /// Fold every local value for `var` along `class`'s chain, root first,
    /// starting from `zero`. Cached until invalidated.
    pub fn resolve<L, V, F>(
        &self,
        class: ClassId,
        var: &ClassVar<L>,
        zero: V,
        merge: F,
        capability: Capability,
    ) -> Result<Arc<V>, RowModelError>
    where
        L: Any + Send + Sync,
        V: Any + Send + Sync,
        F: Fn(V, &L) -> V,
    {
        let key = (class, var.key);
        let hit = self.cache.get(&key).map(|entry| Arc::clone(entry.value()));
        if let Some(hit) = hit {
            if let Ok(value) = hit.downcast::<V>() {
                return Ok(value);
            }
        }

        let chain = self.chain(class, capability)?;
        let mut value = zero;
        for ancestor in &chain {
            if let Some(local) = self.local(*ancestor, var) {
                value = merge(value, local);
            }
        }

        for ancestor in chain.iter().filter(|a| **a != class) {
            self.dependents
                .entry((*ancestor, var.key))
                .or_default()
                .insert(class);
        }

        let value = Arc::new(value);
        let shared: Shared = value.clone();
        self.cache.insert(key, shared);
        debug!(
            class = %self.name(class).unwrap_or("<unknown>"),
            var = var.key,
            depth = chain.len(),
            "resolved class var"
        );
        Ok(value)
    }

    /// Drop `class`'s cached resolution of `var`
    pub fn invalidate<L>(&self, class: ClassId, var: &ClassVar<L>) {
        self.cache.remove(&(class, var.key));
    }

    /// Drop `class`'s cached resolution and that of every class that resolved through it
    pub fn invalidate_deep<L>(&self, class: ClassId, var: &ClassVar<L>) {
        self.invalidate(class, var);
        if let Some((_, dependents)) = self.dependents.remove(&(class, var.key)) {
            debug!(
                class = %self.name(class).unwrap_or("<unknown>"),
                var = var.key,
                dependents = dependents.len(),
                "cleared class var cache"
            );
            for dependent in dependents {
                self.cache.remove(&(dependent, var.key));
            }
        }
    }

    fn node(&self, class: ClassId) -> Result<&ClassNode, RowModelError> {
        self.classes
            .get(class.0)
            .ok_or(RowModelError::UnknownClass { id: class.0 })
    }
}
