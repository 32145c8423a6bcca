//! Shared AST helpers: fresh names, variable and attribute-path extraction,
//! substitution and checked renaming.

use crate::error::{Error, Result};
use crate::parser::{Expr, FunctionDef, Stmt};
use crate::visit::{walk_expr, walk_expr_mut, Visitor, VisitorMut};
use std::collections::{HashMap, HashSet};

lazy_static::lazy_static! {
    static ref IDENTIFIER: regex::Regex =
        regex::Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

/// True if `name` is a valid identifier of the game language
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Source of collision-free names, owned by one canonicalization or
/// inlining call.
///
/// Temporaries carry a random salt so they never clash with user names;
/// final names are chosen later by the renaming pass.
#[derive(Debug, Clone)]
pub struct NameGenerator {
    salt: String,
    counters: HashMap<String, usize>,
}

impl NameGenerator {
    /// Creates a generator with a fresh random salt
    pub fn new() -> Self {
        let salt = uuid::Uuid::new_v4().simple().to_string();
        NameGenerator {
            salt: salt[..8].to_string(),
            counters: HashMap::new(),
        }
    }

    /// Next value of the counter for `key`, starting at 0
    pub fn next_index(&mut self, key: &str) -> usize {
        let counter = self.counters.entry(key.to_string()).or_insert(0);
        let index = *counter;
        *counter += 1;
        index
    }

    /// A salted temporary name, unique for this generator
    pub fn temporary(&mut self) -> String {
        let index = self.next_index("_tmp");
        format!("_tmp_{}_{}", self.salt, index)
    }

    /// `prefix` itself when free, otherwise `prefix_<n>` for the first free n
    pub fn fresh(&mut self, prefix: &str, taken: &HashSet<String>) -> String {
        if !taken.contains(prefix) {
            return prefix.to_string();
        }
        loop {
            let candidate = format!("{}_{}", prefix, self.next_index(prefix));
            if !taken.contains(&candidate) {
                return candidate;
            }
        }
    }
}

impl Default for NameGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------
// Name and path extraction
// ----------------------------------------------------------------------

/// Collects names loaded by expressions, skipping lambda-bound names
struct LoadCollector {
    names: Vec<String>,
    bound: Vec<String>,
}

impl Visitor for LoadCollector {
    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Name(name) => {
                if !self.bound.contains(name) {
                    self.names.push(name.clone());
                }
            }
            Expr::Lambda { params, body } => {
                let depth = self.bound.len();
                self.bound.extend(params.iter().cloned());
                self.visit_expr(body);
                self.bound.truncate(depth);
            }
            _ => walk_expr(self, expr),
        }
    }

    fn visit_target(&mut self, target: &Expr) {
        match target {
            Expr::Name(_) => {}
            Expr::Tuple(elts) => {
                for elt in elts {
                    self.visit_target(elt);
                }
            }
            Expr::Starred(value) => self.visit_target(value),
            // The base of an attribute or subscript target is read
            Expr::Attribute { value, .. } => self.visit_expr(value),
            Expr::Subscript { value, index } => {
                self.visit_expr(value);
                self.visit_expr(index);
            }
            other => self.visit_expr(other),
        }
    }
}

/// Names loaded by an expression, in order of occurrence (with repeats)
pub fn loaded_names(expr: &Expr) -> Vec<String> {
    let mut collector = LoadCollector {
        names: Vec::new(),
        bound: Vec::new(),
    };
    collector.visit_expr(expr);
    collector.names
}

/// Names loaded by a statement, including attribute-target bases
pub fn stmt_loaded_names(stmt: &Stmt) -> Vec<String> {
    let mut collector = LoadCollector {
        names: Vec::new(),
        bound: Vec::new(),
    };
    collector.visit_stmt(stmt);
    collector.names
}

/// True if `name` occurs free in the expression
pub fn mentions(expr: &Expr, name: &str) -> bool {
    loaded_names(expr).iter().any(|n| n == name)
}

/// True if `name` occurs free anywhere in the statement (loads or stores)
pub fn stmt_mentions(stmt: &Stmt, name: &str) -> bool {
    stmt_loaded_names(stmt).iter().any(|n| n == name) || stmt_assigned(stmt).iter().any(|n| n == name)
}

/// Names bound by an assignment target
pub fn target_names(target: &Expr, out: &mut Vec<String>) {
    match target {
        Expr::Name(name) => out.push(name.clone()),
        Expr::Tuple(elts) => {
            for elt in elts {
                target_names(elt, out);
            }
        }
        Expr::Starred(value) => target_names(value, out),
        _ => {}
    }
}

/// Names bound by a statement, descending into if branches
pub fn stmt_assigned(stmt: &Stmt) -> Vec<String> {
    let mut out = Vec::new();
    collect_assigned(std::slice::from_ref(stmt), &mut out);
    out
}

fn collect_assigned(stmts: &[Stmt], out: &mut Vec<String>) {
    for stmt in stmts {
        match stmt {
            Stmt::Assign { targets, .. } => {
                for target in targets {
                    target_names(target, out);
                }
            }
            Stmt::If { body, orelse, .. } => {
                collect_assigned(body, out);
                collect_assigned(orelse, out);
            }
            _ => {}
        }
    }
}

/// Names bound anywhere in a statement list, first binding order, no repeats
pub fn assigned_names(stmts: &[Stmt]) -> Vec<String> {
    let mut out = Vec::new();
    collect_assigned(stmts, &mut out);
    dedup(out)
}

/// Every identifier occurring in the function: parameters, loads, stores
/// and lambda parameters
pub fn all_names(function: &FunctionDef) -> HashSet<String> {
    struct AllNames(HashSet<String>);

    impl Visitor for AllNames {
        fn visit_expr(&mut self, expr: &Expr) {
            match expr {
                Expr::Name(name) => {
                    self.0.insert(name.clone());
                }
                Expr::Lambda { params, body } => {
                    self.0.extend(params.iter().cloned());
                    self.visit_expr(body);
                }
                _ => walk_expr(self, expr),
            }
        }
    }

    let mut names = AllNames(function.params().iter().cloned().collect());
    for stmt in &function.body {
        names.visit_stmt(stmt);
    }
    names.0
}

/// Names loaded but never bound in the function (globals, classes, builtins)
pub fn free_names(function: &FunctionDef) -> Vec<String> {
    let locals: HashSet<String> = function
        .params()
        .iter()
        .cloned()
        .chain(assigned_names(&function.body))
        .collect();
    let loads = function.body.iter().flat_map(stmt_loaded_names);
    dedup(loads.filter(|n| !locals.contains(n)).collect())
}

/// Attribute paths read by an expression (maximal `a.b.c` chains and names)
pub fn read_paths(expr: &Expr) -> Vec<String> {
    let mut out = Vec::new();
    collect_read_paths(expr, &[], &mut out);
    out
}

fn collect_read_paths(expr: &Expr, bound: &[String], out: &mut Vec<String>) {
    if let Some(path) = expr.as_path() {
        let root = path.split('.').next().unwrap_or_default();
        if !bound.iter().any(|b| b == root) {
            out.push(path);
        }
        return;
    }
    match expr {
        Expr::Lambda { params, body } => {
            let mut inner = bound.to_vec();
            inner.extend(params.iter().cloned());
            collect_read_paths(body, &inner, out);
        }
        _ => {
            struct Children<'a> {
                bound: &'a [String],
                out: &'a mut Vec<String>,
            }
            impl Visitor for Children<'_> {
                fn visit_expr(&mut self, expr: &Expr) {
                    collect_read_paths(expr, self.bound, self.out);
                }
            }
            walk_expr(&mut Children { bound, out }, expr);
        }
    }
}

/// First attribute of every `self.<attr>` path an instance method touches
pub fn self_attributes(method: &FunctionDef) -> HashSet<String> {
    struct Attributes(HashSet<String>);

    impl Visitor for Attributes {
        fn visit_expr(&mut self, expr: &Expr) {
            for path in read_paths(expr) {
                let mut parts = path.split('.');
                if parts.next() == Some("self") {
                    if let Some(attr) = parts.next() {
                        self.0.insert(attr.to_string());
                    }
                }
            }
        }
    }

    if method.is_static() {
        return HashSet::new();
    }
    let mut attributes = Attributes(HashSet::new());
    for stmt in &method.body {
        attributes.visit_stmt(stmt);
    }
    attributes.0
}

/// True if any statement reads or writes `path` or a path extending it
pub fn uses_path(stmts: &[Stmt], path: &str) -> bool {
    struct PathUse<'a> {
        path: &'a str,
        found: bool,
    }

    impl Visitor for PathUse<'_> {
        fn visit_expr(&mut self, expr: &Expr) {
            if read_paths(expr).iter().any(|p| is_path_prefix(self.path, p)) {
                self.found = true;
            }
        }
    }

    let mut visitor = PathUse { path, found: false };
    for stmt in stmts {
        visitor.visit_stmt(stmt);
    }
    visitor.found
}

/// Paths written by an assignment target
pub fn target_paths(target: &Expr, out: &mut Vec<String>) {
    match target {
        Expr::Tuple(elts) => {
            for elt in elts {
                target_paths(elt, out);
            }
        }
        Expr::Starred(value) => target_paths(value, out),
        other => {
            if let Some(path) = other.as_path() {
                out.push(path);
            }
        }
    }
}

/// Strict prefixes of a dotted path, shortest first (`a`, `a.b` for `a.b.c`)
pub fn path_prefixes(path: &str) -> Vec<&str> {
    path.match_indices('.').map(|(i, _)| &path[..i]).collect()
}

/// True if `prefix` equals `path` or is one of its dotted prefixes
pub fn is_path_prefix(prefix: &str, path: &str) -> bool {
    path == prefix || (path.starts_with(prefix) && path[prefix.len()..].starts_with('.'))
}

/// True if either path is a prefix of the other
pub fn paths_overlap(a: &str, b: &str) -> bool {
    is_path_prefix(a, b) || is_path_prefix(b, a)
}

/// True if the expression contains a call outside lambda bodies
pub fn contains_call(expr: &Expr) -> bool {
    struct CallFinder(bool);

    impl Visitor for CallFinder {
        fn visit_expr(&mut self, expr: &Expr) {
            match expr {
                Expr::Call { .. } => self.0 = true,
                Expr::Lambda { .. } => {}
                _ => walk_expr(self, expr),
            }
        }
    }

    let mut finder = CallFinder(false);
    finder.visit_expr(expr);
    finder.0
}

/// Finds the first call in the statements whose callee satisfies `pred`
pub fn find_call<'a>(stmts: &'a [Stmt], pred: &dyn Fn(&Expr) -> bool) -> Option<&'a Expr> {
    stmts.iter().find_map(|stmt| first_call_in(stmt, pred))
}

fn first_call_in<'a>(stmt: &'a Stmt, pred: &dyn Fn(&Expr) -> bool) -> Option<&'a Expr> {
    fn search<'a>(expr: &'a Expr, pred: &dyn Fn(&Expr) -> bool) -> Option<&'a Expr> {
        if let Expr::Call { func, args, .. } = expr {
            if pred(func) {
                return Some(expr);
            }
            return search(func, pred).or_else(|| args.iter().find_map(|a| search(a, pred)));
        }
        match expr {
            Expr::Attribute { value, .. } | Expr::UnaryOp { operand: value, .. } => {
                search(value, pred)
            }
            Expr::Starred(value) => search(value, pred),
            Expr::Subscript { value, index } => {
                search(value, pred).or_else(|| search(index, pred))
            }
            Expr::BinOp { left, right, .. } => search(left, pred).or_else(|| search(right, pred)),
            Expr::BoolOp { values, .. } | Expr::Tuple(values) => {
                values.iter().find_map(|v| search(v, pred))
            }
            Expr::Compare {
                left, comparators, ..
            } => search(left, pred).or_else(|| comparators.iter().find_map(|c| search(c, pred))),
            Expr::IfExp { test, body, orelse } => search(test, pred)
                .or_else(|| search(body, pred))
                .or_else(|| search(orelse, pred)),
            Expr::Lambda { body, .. } => search(body, pred),
            Expr::Name(_) | Expr::Constant(_) | Expr::Call { .. } => None,
        }
    }

    match stmt {
        Stmt::Assign { targets, value } => {
            search(value, pred).or_else(|| targets.iter().find_map(|t| search(t, pred)))
        }
        Stmt::Return(Some(value)) | Stmt::Expr(value) => search(value, pred),
        Stmt::If { test, body, orelse } => search(test, pred).or_else(|| {
            body.iter()
                .chain(orelse)
                .find_map(|s| first_call_in(s, pred))
        }),
        Stmt::Return(None) | Stmt::Pass => None,
    }
}

// ----------------------------------------------------------------------
// Substitution
// ----------------------------------------------------------------------

/// Replaces free occurrences of names with expressions, in loads and in
/// assignment targets. Lambda parameters shadow the map.
pub struct Substitution<'a> {
    map: &'a HashMap<String, Expr>,
    shadowed: Vec<String>,
}

impl<'a> Substitution<'a> {
    pub fn new(map: &'a HashMap<String, Expr>) -> Self {
        Substitution {
            map,
            shadowed: Vec::new(),
        }
    }

    pub fn apply(map: &HashMap<String, Expr>, stmts: &mut [Stmt]) {
        if map.is_empty() {
            return;
        }
        let mut substitution = Substitution::new(map);
        for stmt in stmts {
            substitution.visit_stmt_mut(stmt);
        }
    }

    pub fn apply_expr(map: &HashMap<String, Expr>, expr: &mut Expr) {
        if map.is_empty() {
            return;
        }
        Substitution::new(map).visit_expr_mut(expr);
    }
}

impl VisitorMut for Substitution<'_> {
    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        match expr {
            Expr::Name(name) => {
                if self.shadowed.contains(name) {
                    return;
                }
                if let Some(replacement) = self.map.get(name.as_str()) {
                    *expr = replacement.clone();
                }
            }
            Expr::Lambda { params, body } => {
                let depth = self.shadowed.len();
                self.shadowed.extend(params.iter().cloned());
                // Renaming a lambda parameter itself happens only through
                // Name-to-Name maps applied by the renaming pass
                self.visit_expr_mut(body);
                self.shadowed.truncate(depth);
            }
            _ => walk_expr_mut(self, expr),
        }
    }
}

/// Replaces every occurrence of the attribute path `path` (and of paths
/// extending it) with `replacement` as the new prefix.
pub struct PathReplacement<'a> {
    path: &'a str,
    replacement: &'a Expr,
}

impl<'a> PathReplacement<'a> {
    pub fn new(path: &'a str, replacement: &'a Expr) -> Self {
        PathReplacement { path, replacement }
    }

    pub fn apply(path: &str, replacement: &Expr, stmts: &mut [Stmt]) {
        let mut visitor = PathReplacement::new(path, replacement);
        for stmt in stmts {
            visitor.visit_stmt_mut(stmt);
        }
    }
}

impl VisitorMut for PathReplacement<'_> {
    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        if expr.as_path().as_deref() == Some(self.path) {
            *expr = self.replacement.clone();
            return;
        }
        if let Expr::Lambda { params, .. } = expr {
            let root = self.path.split('.').next().unwrap_or_default();
            if params.iter().any(|p| p == root) {
                return;
            }
        }
        walk_expr_mut(self, expr);
    }
}

/// Renames `from` to `to` everywhere in the function, failing if `to` is
/// already used.
pub fn rename_checked(function: &mut FunctionDef, from: &str, to: &str) -> Result<()> {
    if from == to {
        return Ok(());
    }
    if all_names(function).contains(to) {
        return Err(Error::NameCollision {
            name: to.to_string(),
            scope: format!("function `{}`", function.name),
        });
    }
    for param in function.args.params.iter_mut() {
        if param == from {
            *param = to.to_string();
        }
    }
    let map = HashMap::from([(from.to_string(), Expr::name(to))]);
    Substitution::apply(&map, &mut function.body);
    Ok(())
}

/// True if a statement list contains a `return` anywhere
pub fn contains_return(stmts: &[Stmt]) -> bool {
    stmts.iter().any(|stmt| match stmt {
        Stmt::Return(_) => true,
        Stmt::If { body, orelse, .. } => contains_return(body) || contains_return(orelse),
        _ => false,
    })
}

/// Keeps the first occurrence of each element
pub fn dedup(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|n| seen.insert(n.clone())).collect()
}

/// Walks every statement, descending into if branches
pub fn for_each_stmt(stmts: &[Stmt], f: &mut dyn FnMut(&Stmt)) {
    for stmt in stmts {
        f(stmt);
        if let Stmt::If { body, orelse, .. } = stmt {
            for_each_stmt(body, f);
            for_each_stmt(orelse, f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_function;

    #[test]
    fn test_identifier_validation() {
        assert!(is_identifier("self"));
        assert!(is_identifier("_tmp_1"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier("a.b"));
    }

    #[test]
    fn test_fresh_names_avoid_taken() {
        let mut names = NameGenerator::new();
        let taken: HashSet<String> = ["r".to_string(), "r_0".to_string()].into_iter().collect();
        assert_eq!(names.fresh("x", &taken), "x");
        assert_eq!(names.fresh("r", &taken), "r_1");
        let a = names.temporary();
        let b = names.temporary();
        assert_ne!(a, b);
        assert!(is_identifier(&a));
    }

    #[test]
    fn test_loaded_and_free_names() {
        let f = parse_function(
            "def f(a):\n    b = Scheme.KeyGen(a)\n    g = lambda x: x + b\n    self_x.y = c\n    return g(b)\n",
        )
        .unwrap();
        assert_eq!(free_names(&f), vec!["Scheme", "c", "self_x"]);
        assert_eq!(assigned_names(&f.body), vec!["b", "g"]);
    }

    #[test]
    fn test_read_paths() {
        let f = parse_function("def f(s):\n    return s.scheme.Enc(s.pk, m) + (lambda m: m)(k)\n").unwrap();
        match &f.body[0] {
            Stmt::Return(Some(e)) => {
                assert_eq!(read_paths(e), vec!["s.scheme.Enc", "s.pk", "m", "k"]);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_self_attributes_and_path_use() {
        let method = parse_function(
            "def m(self, x):\n    self.k = x\n    (a, self.c.d) = self.scheme.Enc(self.pk)\n    return a\n",
        )
        .unwrap();
        let mut attrs: Vec<_> = self_attributes(&method).into_iter().collect();
        attrs.sort();
        assert_eq!(attrs, vec!["c", "k", "pk", "scheme"]);

        assert!(uses_path(&method.body, "self.c"));
        assert!(uses_path(&method.body, "self.scheme"));
        assert!(!uses_path(&method.body, "self.scheme.KeyGen"));
        assert!(!uses_path(&method.body, "self.p"));

        let stateless = parse_function("@staticmethod\ndef m(self):\n    return self.k\n").unwrap();
        assert!(self_attributes(&stateless).is_empty());
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(path_prefixes("a.b.c"), vec!["a", "a.b"]);
        assert!(is_path_prefix("a.b", "a.b.c"));
        assert!(!is_path_prefix("a.b", "a.bc"));
        assert!(paths_overlap("a.b.c", "a"));
        assert!(!paths_overlap("a.x", "a.y"));
    }

    #[test]
    fn test_path_replacement() {
        let mut f = parse_function("def f(self):\n    self.x.y = self.x\n    return self.xs\n").unwrap();
        PathReplacement::apply("self.x", &Expr::name("self_x"), &mut f.body);
        assert_eq!(
            f.to_string(),
            "def f(self):\n    self_x.y = self_x\n    return self.xs\n"
        );
    }

    #[test]
    fn test_rename_checked_collision() {
        let mut f = parse_function("def f(a, b):\n    return a + b\n").unwrap();
        assert!(matches!(
            rename_checked(&mut f, "a", "b"),
            Err(Error::NameCollision { .. })
        ));
        rename_checked(&mut f, "a", "c").unwrap();
        assert_eq!(f.to_string(), "def f(c, b):\n    return c + b\n");
    }

    #[test]
    fn test_substitution_respects_lambda_scope() {
        let mut f = parse_function("def f(x):\n    return (lambda x: x)(x)\n").unwrap();
        let map = HashMap::from([("x".to_string(), Expr::int(1))]);
        Substitution::apply(&map, &mut f.body);
        assert_eq!(f.body[0].to_string(), "return (lambda x: x)(1)");
    }
}
