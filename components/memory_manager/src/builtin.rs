//! Per-class builtin member tables.
//!
//! Methods shared by every instance of a built-in class (`Array.push`,
//! `MovieClip.gotoAndPlay`) live here instead of in each object. Lookup
//! consults the table of the receiver's class after its own members.

use crate::object::fold_key;
use core_types::Value;
use indexmap::IndexMap;

/// Class name → member name → value.
#[derive(Debug, Default)]
pub struct BuiltinTable {
    classes: IndexMap<String, IndexMap<String, Value>>,
}

impl BuiltinTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a member of `class`.
    pub fn get(&self, class: &str, name: &str) -> Option<&Value> {
        self.classes.get(class)?.get(&fold_key(name))
    }

    /// Installs a member, returning the value it replaced.
    pub(crate) fn insert(&mut self, class: &str, name: &str, value: Value) -> Option<Value> {
        self.classes
            .entry(class.to_string())
            .or_default()
            .insert(fold_key(name), value)
    }

    /// Every installed value.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.classes.values().flat_map(|members| members.values())
    }

    /// Number of members installed for `class`.
    pub fn class_len(&self, class: &str) -> usize {
        self.classes.get(class).map_or(0, IndexMap::len)
    }
}
