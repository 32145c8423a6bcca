//! Scope tracking during a depth-first walk of a procedure body
//!
//! Each scope maps a root variable to an [`ObjectValue`]: the last value
//! expression stored to it, the statement that produced it, and a tree of
//! sub-attribute values. Attribute paths (`a.b.c`) live as nested bindings
//! under their root, owned by the scope that stores them.

use crate::parser::Expr;
use crate::utils::{is_path_prefix, read_paths};
use std::collections::HashMap;

/// Known value of a variable or attribute
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectValue {
    /// Last stored value, `None` when unknown
    pub value: Option<Expr>,
    /// Index of the statement that produced the value
    pub producer: Option<usize>,
    /// Sub-attribute bindings
    pub attributes: HashMap<String, ObjectValue>,
}

impl ObjectValue {
    fn known(value: Option<Expr>, producer: Option<usize>) -> Self {
        ObjectValue {
            value,
            producer,
            attributes: HashMap::new(),
        }
    }

    fn lookup(&self, attrs: &[&str]) -> Option<&ObjectValue> {
        match attrs.split_first() {
            None => Some(self),
            Some((first, rest)) => self.attributes.get(*first)?.lookup(rest),
        }
    }

    fn lookup_or_insert(&mut self, attrs: &[&str]) -> &mut ObjectValue {
        match attrs.split_first() {
            None => self,
            Some((first, rest)) => self
                .attributes
                .entry(first.to_string())
                .or_default()
                .lookup_or_insert(rest),
        }
    }

    /// Forgets every value (here or below) that reads an overlapping path
    fn invalidate(&mut self, path: &str) {
        if let Some(value) = &self.value {
            let stale = read_paths(value)
                .iter()
                .any(|read| is_path_prefix(path, read) || is_path_prefix(read, path));
            if stale {
                self.value = None;
            }
        }
        for attribute in self.attributes.values_mut() {
            attribute.invalidate(path);
        }
    }

    /// Join of two branch values: equal values survive, others become unknown
    fn merge(body: &ObjectValue, orelse: &ObjectValue) -> ObjectValue {
        let value = match (&body.value, &orelse.value) {
            (Some(a), Some(b)) if a == b => Some(a.clone()),
            _ => None,
        };
        let attributes = body
            .attributes
            .iter()
            .filter_map(|(name, a)| {
                orelse
                    .attributes
                    .get(name)
                    .map(|b| (name.clone(), ObjectValue::merge(a, b)))
            })
            .collect();
        ObjectValue {
            value,
            producer: None,
            attributes,
        }
    }
}

/// One level of the scope stack
#[derive(Debug, Clone, Default)]
pub struct Scope {
    bindings: HashMap<String, ObjectValue>,
    /// Roots in first-store order
    order: Vec<String>,
    /// Recorded loads: (path, consuming statement)
    loads: Vec<(String, usize)>,
}

impl Scope {
    /// Roots stored in this scope, in first-store order
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Binding of a root stored in this scope
    pub fn binding(&self, name: &str) -> Option<&ObjectValue> {
        self.bindings.get(name)
    }

    /// Loads recorded while this scope was current
    pub fn loads(&self) -> &[(String, usize)] {
        &self.loads
    }

    fn insert(&mut self, name: &str, value: ObjectValue) {
        if !self.bindings.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.bindings.insert(name.to_string(), value);
    }
}

/// Stack of scopes maintained while visiting a procedure
#[derive(Debug, Clone)]
pub struct ScopeTracker {
    scopes: Vec<Scope>,
}

impl ScopeTracker {
    /// Creates a tracker with a single (function-level) scope
    pub fn new() -> Self {
        ScopeTracker {
            scopes: vec![Scope::default()],
        }
    }

    /// Creates a tracker whose function scope already binds the parameters
    pub fn with_parameters(params: &[String]) -> Self {
        let mut tracker = Self::new();
        for param in params {
            tracker.record_store(param, None, None);
        }
        tracker
    }

    /// Enter a new nested scope (if/else branch)
    pub fn enter_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Leave the current scope, returning its bindings.
    /// The function-level scope is never popped.
    pub fn exit_scope(&mut self) -> Scope {
        if self.scopes.len() > 1 {
            self.scopes.pop().unwrap_or_default()
        } else {
            Scope::default()
        }
    }

    /// Promote into the current scope the roots stored in both branches
    pub fn merge_branches(&mut self, body: &Scope, orelse: &Scope) {
        for name in body.names() {
            if let (Some(a), Some(b)) = (body.binding(name), orelse.binding(name)) {
                let merged = ObjectValue::merge(a, b);
                self.invalidate(name);
                self.current_mut().insert(name, merged);
            }
        }
    }

    /// Record a store of `value` (when known) to a name or attribute path
    pub fn record_store(&mut self, path: &str, producer: Option<usize>, value: Option<Expr>) {
        self.invalidate(path);

        // A value reading the path it is stored to refers to the old binding
        let value = value.filter(|v| {
            !read_paths(v)
                .iter()
                .any(|read| is_path_prefix(path, read) || is_path_prefix(read, path))
        });

        let mut parts = path.split('.');
        let root = parts.next().unwrap_or_default();
        let attrs: Vec<&str> = parts.collect();

        if attrs.is_empty() {
            self.current_mut()
                .insert(root, ObjectValue::known(value, producer));
            return;
        }

        // Attribute stores shadow the enclosing binding in the current scope
        if !self.current().bindings.contains_key(root) {
            let inherited = self.lookup_root(root).cloned().unwrap_or_default();
            self.current_mut().insert(root, inherited);
        }
        let scope = self.current_mut();
        if let Some(binding) = scope.bindings.get_mut(root) {
            let target = binding.lookup_or_insert(&attrs);
            *target = ObjectValue::known(value, producer);
        }
    }

    /// Record a load; returns true if the root is bound in any open scope
    pub fn record_load(&mut self, path: &str, consumer: usize) -> bool {
        self.current_mut().loads.push((path.to_string(), consumer));
        let root = path.split('.').next().unwrap_or_default();
        self.lookup_root(root).is_some()
    }

    /// Last known value of a name or attribute path
    pub fn value_of(&self, path: &str) -> Option<&Expr> {
        self.object_of(path)?.value.as_ref()
    }

    /// Statement that produced the current value of a path
    pub fn producer_of(&self, path: &str) -> Option<usize> {
        self.object_of(path)?.producer
    }

    /// True if the root of `path` is bound in an open scope
    pub fn in_scope(&self, path: &str) -> bool {
        let root = path.split('.').next().unwrap_or_default();
        self.lookup_root(root).is_some()
    }

    /// Names bound in any open scope, outermost first, first-store order
    pub fn names_in_scope(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for scope in &self.scopes {
            for name in scope.names() {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        names
    }

    fn object_of(&self, path: &str) -> Option<&ObjectValue> {
        let mut parts = path.split('.');
        let root = parts.next().unwrap_or_default();
        let attrs: Vec<&str> = parts.collect();
        self.lookup_root(root)?.lookup(&attrs)
    }

    fn lookup_root(&self, root: &str) -> Option<&ObjectValue> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.bindings.get(root))
    }

    fn invalidate(&mut self, path: &str) {
        for scope in &mut self.scopes {
            for binding in scope.bindings.values_mut() {
                binding.invalidate(path);
            }
        }
    }

    fn current(&self) -> &Scope {
        &self.scopes[self.scopes.len() - 1]
    }

    fn current_mut(&mut self) -> &mut Scope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }
}

impl Default for ScopeTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_lookup() {
        let mut scopes = ScopeTracker::with_parameters(&["a".to_string()]);
        scopes.record_store("b", Some(0), Some(Expr::int(1)));
        assert_eq!(scopes.value_of("b"), Some(&Expr::int(1)));
        assert_eq!(scopes.producer_of("b"), Some(0));
        assert!(scopes.in_scope("a"));
        assert!(!scopes.in_scope("c"));
        assert_eq!(scopes.names_in_scope(), vec!["a", "b"]);
    }

    #[test]
    fn test_attribute_paths_are_independent() {
        let mut scopes = ScopeTracker::new();
        scopes.record_store("s", Some(0), Some(Expr::name("x")));
        scopes.record_store("s.k", Some(1), Some(Expr::int(5)));
        assert_eq!(scopes.value_of("s.k"), Some(&Expr::int(5)));
        assert_eq!(scopes.value_of("s"), Some(&Expr::name("x")));

        scopes.record_store("s", Some(2), None);
        assert_eq!(scopes.value_of("s.k"), None);
    }

    #[test]
    fn test_branch_bindings_are_discarded() {
        let mut scopes = ScopeTracker::new();
        scopes.enter_scope();
        scopes.record_store("x", Some(0), Some(Expr::int(1)));
        assert!(scopes.in_scope("x"));
        scopes.exit_scope();
        assert!(!scopes.in_scope("x"));
    }

    #[test]
    fn test_merge_keeps_names_bound_in_both_branches() {
        let mut scopes = ScopeTracker::new();
        scopes.enter_scope();
        scopes.record_store("x", Some(0), Some(Expr::int(1)));
        scopes.record_store("y", Some(1), Some(Expr::int(2)));
        scopes.record_store("only", Some(2), Some(Expr::int(2)));
        let body = scopes.exit_scope();

        scopes.enter_scope();
        scopes.record_store("x", Some(3), Some(Expr::int(1)));
        scopes.record_store("y", Some(4), Some(Expr::int(3)));
        let orelse = scopes.exit_scope();

        scopes.merge_branches(&body, &orelse);
        assert_eq!(scopes.value_of("x"), Some(&Expr::int(1)));
        assert!(scopes.in_scope("y"));
        assert_eq!(scopes.value_of("y"), None);
        assert!(!scopes.in_scope("only"));
    }

    #[test]
    fn test_rebinding_invalidates_dependent_values() {
        let mut scopes = ScopeTracker::new();
        scopes.record_store("a", Some(0), Some(Expr::int(1)));
        scopes.record_store(
            "t",
            Some(1),
            Some(Expr::Tuple(vec![Expr::name("a"), Expr::int(2)])),
        );
        assert!(scopes.value_of("t").is_some());
        scopes.record_store("a", Some(2), Some(Expr::int(7)));
        assert_eq!(scopes.value_of("t"), None);
        assert!(scopes.record_load("t", 3));
    }
}
