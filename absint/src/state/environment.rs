use std::collections::BTreeMap;

use crate::state::{AbstractValue, State};

/// An abstract environment mapping keys to abstract values, with an optional
/// parent environment for lookups that miss locally.
///
/// Every environment owns its parent chain. Cloning an environment clones the
/// whole chain, so two environments never share a parent.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AbstractEnvironment<K, V> {
    parent: Option<Box<AbstractEnvironment<K, V>>>,
    bindings: BTreeMap<K, V>,
}

impl<K, V> Default for AbstractEnvironment<K, V> {
    fn default() -> Self {
        Self {
            parent: None,
            bindings: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Clone, V: AbstractValue> AbstractEnvironment<K, V> {
    /// Creates an environment without a parent.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(parent: Self) -> Self {
        Self {
            parent: Some(Box::new(parent)),
            bindings: BTreeMap::new(),
        }
    }

    /// Returns true if there are no local bindings, regardless of the parents.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// The number of local bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns true if the key is bound locally, regardless of the parents.
    pub fn contains(&self, key: &K) -> bool {
        self.bindings.contains_key(key)
    }

    /// Simulates a variable lookup. Searches the local bindings first, then
    /// the parents. Returns top when the key is not bound anywhere.
    pub fn find(&self, key: &K) -> V {
        match self.bindings.get(key) {
            Some(value) => value.clone(),
            None => match &self.parent {
                Some(parent) => parent.find(key),
                None => V::top(),
            },
        }
    }

    /// Local lookup only.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.bindings.get(key)
    }

    /// Local lookup that returns top for missing keys.
    pub fn get_or_top(&self, key: &K) -> V {
        self.get(key).cloned().unwrap_or_else(V::top)
    }

    /// Returns the local binding for writing. A missing key is bound to top
    /// first.
    pub fn get_mut_or_top(&mut self, key: K) -> &mut V {
        self.bindings.entry(key).or_insert_with(V::top)
    }

    pub fn set(&mut self, key: K, value: V) {
        self.bindings.insert(key, value);
    }

    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    pub fn parent(&self) -> Option<&Self> {
        self.parent.as_deref()
    }

    pub fn parent_mut(&mut self) -> Option<&mut Self> {
        self.parent.as_deref_mut()
    }

    /// Merges `value` into every local binding. Useful to invalidate the
    /// bindings after an operation the analysis cannot reason about.
    pub fn merge_all(&mut self, value: &V) {
        for own in self.bindings.values_mut() {
            own.merge_with(value);
        }
    }

    /// Iterates the local bindings in the order of the keys.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.bindings.iter()
    }
}

impl<K, V> State for AbstractEnvironment<K, V>
where
    K: Ord + Clone + core::fmt::Debug,
    V: AbstractValue,
{
    /// Merges the other environment into this one.
    ///
    /// Missing bindings cannot be treated as bottom. When one of the merged
    /// paths binds a key and the other does not, the binding is merged with
    /// [`AbstractValue::absent`] so the analysis can decide what the lack
    /// of a binding means.
    fn merge_with(&mut self, other: &Self) -> bool {
        let mut changed = false;
        let absent = V::absent();

        for (key, theirs) in &other.bindings {
            match self.bindings.get_mut(key) {
                Some(own) => changed |= own.merge_with(theirs),
                None => {
                    let mut missing = theirs.clone();
                    missing.merge_with(&absent);
                    self.bindings.insert(key.clone(), missing);
                    changed = true;
                }
            }
        }
        for (key, own) in self.bindings.iter_mut() {
            if !other.bindings.contains_key(key) {
                changed |= own.merge_with(&absent);
            }
        }

        if let Some(theirs) = &other.parent {
            if self.parent.is_none() {
                self.parent = Some(theirs.clone());
                changed = true;
            } else if let Some(own) = self.parent.as_deref_mut() {
                changed |= own.merge_with(theirs);
            }
        }
        changed
    }
}
