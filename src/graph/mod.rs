//! Scoped item graph for deployment ordering.
//!
//! Items are deployable units. Each belongs to one or more scopes (usually
//! environments) and names its parents. Parent links are plain names resolved
//! against the owning [`Items`] arena, never direct references, so the graph has no
//! ownership cycles and serializes as-is.
//!
//! A link is only meaningful inside the scopes both items share, and one cannot be
//! created between items without a common scope. Processing order for a scope comes
//! from [`order_for_scope`].

mod ordering;

pub use ordering::{order_for_scope, scope_cycles};

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::constants::DEFAULT_SCOPE;
use crate::core::{StackyardError, suggest_similar};

/// A node of the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    name: String,
    scopes: BTreeSet<String>,
    parents: Vec<String>,
}

impl Item {
    /// A new item in the default scope only.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scopes: BTreeSet::from([DEFAULT_SCOPE.to_string()]),
            parents: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn scopes(&self) -> &BTreeSet<String> {
        &self.scopes
    }

    /// Parent names in declaration order.
    pub fn parent_names(&self) -> &[String] {
        &self.parents
    }

    pub fn in_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    /// Whether the item still only carries the synthetic default scope.
    pub fn has_only_default_scope(&self) -> bool {
        self.scopes.len() == 1 && self.scopes.contains(DEFAULT_SCOPE)
    }

    fn shares_scope_with(&self, other: &Self) -> bool {
        !self.scopes.is_disjoint(&other.scopes)
    }
}

/// Arena owning every [`Item`] by name, in insertion order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Items {
    items: Vec<Item>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Items {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an item. Re-adding an existing name changes nothing.
    pub fn add_item(&mut self, item: Item) {
        if self.index.contains_key(item.name()) {
            return;
        }
        self.index.insert(item.name().to_string(), self.items.len());
        self.items.push(item);
    }

    /// Add `scope` to an item.
    ///
    /// When the item only has the default scope and `replace_default_if_exists` is
    /// set, the default is dropped in favor of the real scope.
    pub fn add_scope(
        &mut self,
        item_name: &str,
        scope: &str,
        replace_default_if_exists: bool,
    ) -> Result<(), StackyardError> {
        let item = self.get_mut(item_name)?;
        let replace = replace_default_if_exists && item.has_only_default_scope() && scope != DEFAULT_SCOPE;

        item.scopes.insert(scope.to_string());
        if replace {
            item.scopes.remove(DEFAULT_SCOPE);
        }
        Ok(())
    }

    /// Record `parent_name` as a parent of `child_name`.
    ///
    /// Both items must exist and share a scope. Repeated links are ignored.
    pub fn add_link_to_parent(
        &mut self,
        parent_name: &str,
        child_name: &str,
    ) -> Result<(), StackyardError> {
        let parent = self.get_item_by_name(parent_name)?;
        let child = self.get_item_by_name(child_name)?;
        if !parent.shares_scope_with(child) {
            return Err(StackyardError::NoSharedScope {
                parent: parent_name.to_string(),
                child: child_name.to_string(),
            });
        }

        let child = self.get_mut(child_name)?;
        if !child.parents.iter().any(|p| p == parent_name) {
            tracing::trace!(target: "graph", "Linking {} -> {}", parent_name, child_name);
            child.parents.push(parent_name.to_string());
        }
        Ok(())
    }

    /// Exact lookup.
    pub fn get_item_by_name(&self, name: &str) -> Result<&Item, StackyardError> {
        self.index.get(name).map(|&i| &self.items[i]).ok_or_else(|| self.not_found(name))
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut Item, StackyardError> {
        match self.index.get(name) {
            Some(&i) => Ok(&mut self.items[i]),
            None => Err(self.not_found(name)),
        }
    }

    fn not_found(&self, name: &str) -> StackyardError {
        StackyardError::ItemNotFound {
            name: name.to_string(),
            suggestions: suggest_similar(name, self.index.keys().map(String::as_str)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Items in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
