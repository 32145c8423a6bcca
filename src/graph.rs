//! Statement dependency graph over a flat statement list
//!
//! An edge runs from a consuming statement to the statement that produced a
//! path it reads ("last writer wins", attribute-path matching only). Besides
//! these flow edges the graph keeps ordering-only edges (write-after-read,
//! write-after-write and, optionally, the order of stateful calls) which
//! constrain sorting but never keep a statement alive.

use crate::parser::unparse::expr_to_string;
use crate::parser::{Expr, Stmt};
use crate::utils::{is_path_prefix, paths_overlap, read_paths, target_paths};
use std::collections::{HashMap, HashSet};

/// Branch of an if statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Branch {
    /// Statements executed when the test holds
    Body,
    /// Statements executed otherwise
    OrElse,
}

/// Data dependence: `consumer` reads `variable` as produced by `producer`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    /// Reading statement
    pub consumer: usize,
    /// Writing statement
    pub producer: usize,
    /// Path read
    pub variable: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadKind {
    /// A value read: depends on writers of the path, its prefixes and its
    /// extensions
    Value,
    /// The object an attribute store goes into: depends on writers of the
    /// path and its prefixes only
    Base,
}

/// Dependency graph of one statement list
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    statements: Vec<Stmt>,
    parameters: Vec<String>,
    preserve_call_order: bool,
    reads: Vec<Vec<(String, ReadKind)>>,
    writes: Vec<Vec<String>>,
    edges: Vec<Edge>,
    /// (later, earlier) pairs that must keep their relative order
    ordering: Vec<(usize, usize)>,
    inner_graphs: HashMap<(usize, Branch), DependencyGraph>,
}

impl DependencyGraph {
    /// Builds the graph of a statement list with no parameters
    pub fn build(statements: &[Stmt]) -> Self {
        Self::build_with(statements, &[], false)
    }

    /// Builds the graph of a function body
    pub fn build_with(statements: &[Stmt], parameters: &[String], preserve_call_order: bool) -> Self {
        let reads: Vec<_> = statements.iter().map(stmt_reads).collect();
        let writes: Vec<_> = statements.iter().map(stmt_writes).collect();

        let mut graph = DependencyGraph {
            statements: statements.to_vec(),
            parameters: parameters.to_vec(),
            preserve_call_order,
            reads,
            writes,
            edges: Vec::new(),
            ordering: Vec::new(),
            inner_graphs: HashMap::new(),
        };
        graph.link_flow();
        graph.link_ordering();

        for (i, stmt) in statements.iter().enumerate() {
            if let Stmt::If { body, orelse, .. } = stmt {
                graph.inner_graphs.insert(
                    (i, Branch::Body),
                    Self::build_with(body, parameters, preserve_call_order),
                );
                graph.inner_graphs.insert(
                    (i, Branch::OrElse),
                    Self::build_with(orelse, parameters, preserve_call_order),
                );
            }
        }

        graph
    }

    fn link_flow(&mut self) {
        for i in 0..self.statements.len() {
            let mut linked: HashSet<usize> = HashSet::new();
            for (path, kind) in self.reads[i].clone() {
                let last = (0..i)
                    .rev()
                    .find(|&j| self.writes[j].iter().any(|w| is_path_prefix(w, &path)));
                if let Some(j) = last {
                    self.add_edge(i, j, &path, &mut linked);
                }
                if kind == ReadKind::Value {
                    let from = last.map_or(0, |j| j + 1);
                    for j in from..i {
                        let extends = self.writes[j]
                            .iter()
                            .any(|w| w != &path && is_path_prefix(&path, w));
                        if extends {
                            self.add_edge(i, j, &path, &mut linked);
                        }
                    }
                }
            }
        }
    }

    fn add_edge(&mut self, consumer: usize, producer: usize, variable: &str, linked: &mut HashSet<usize>) {
        if linked.insert(producer) {
            self.edges.push(Edge {
                consumer,
                producer,
                variable: variable.to_string(),
            });
        }
    }

    fn link_ordering(&mut self) {
        let n = self.statements.len();
        for i in 0..n {
            for j in 0..i {
                let conflict = self.writes[i].iter().any(|w| {
                    self.writes[j].iter().any(|other| paths_overlap(w, other))
                        || self.reads[j].iter().any(|(r, _)| paths_overlap(w, r))
                });
                if conflict {
                    self.ordering.push((i, j));
                }
            }
        }

        if self.preserve_call_order {
            let chain: Vec<usize> = (0..n).filter(|&i| self.is_stateful_call(i)).collect();
            for pair in chain.windows(2) {
                self.ordering.push((pair[1], pair[0]));
            }
        }
    }

    /// Bare calls and calls through a parameter (adversary and oracle state)
    fn is_stateful_call(&self, i: usize) -> bool {
        if matches!(self.statements[i], Stmt::Expr(_)) {
            return true;
        }
        let params = &self.parameters;
        let mut stateful = false;
        let mut check = |expr: &Expr| {
            if let Expr::Call { func, .. } = expr {
                if let (Expr::Attribute { .. }, Some(root)) = (func.as_ref(), func.root_name()) {
                    stateful |= params.iter().any(|p| p == root);
                }
            }
        };
        for_each_expr(&self.statements[i], &mut check);
        stateful
    }

    /// The statements of the graph
    pub fn statements(&self) -> &[Stmt] {
        &self.statements
    }

    /// Flow edges, grouped by consumer in read order
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Graphs of the branches of the if statement at `index`
    pub fn inner_graph(&self, index: usize, branch: Branch) -> Option<&DependencyGraph> {
        self.inner_graphs.get(&(index, branch))
    }

    /// Statements that produced values read by `consumer`
    pub fn producers(&self, consumer: usize) -> impl Iterator<Item = usize> + '_ {
        self.edges
            .iter()
            .filter(move |e| e.consumer == consumer)
            .map(|e| e.producer)
    }

    fn ordering_predecessors(&self, later: usize) -> impl Iterator<Item = usize> + '_ {
        self.ordering
            .iter()
            .filter(move |(l, _)| *l == later)
            .map(|(_, e)| *e)
    }

    /// Statements whose effect is observable: the return, bare calls, if
    /// statements, and the final writer of each parameter-rooted attribute.
    pub fn sinks(&self) -> Vec<usize> {
        let mut sinks = Vec::new();
        let mut final_writers: HashMap<&str, usize> = HashMap::new();

        for (i, stmt) in self.statements.iter().enumerate() {
            match stmt {
                Stmt::Return(_) | Stmt::Expr(_) | Stmt::If { .. } => sinks.push(i),
                _ => {}
            }
            for path in &self.writes[i] {
                if self.is_state_path(path) {
                    final_writers.insert(path, i);
                }
            }
        }

        sinks.extend(final_writers.values().copied());
        sinks.sort_unstable();
        sinks.dedup();
        sinks
    }

    fn is_state_path(&self, path: &str) -> bool {
        match path.split_once('.') {
            Some((root, _)) => self.parameters.iter().any(|p| p == root),
            None => false,
        }
    }

    /// Sinks in traversal order: the return first, then the others by text
    fn ordered_sinks(&self, sinks: &[usize]) -> Vec<usize> {
        let mut ordered: Vec<usize> = sinks.to_vec();
        ordered.sort_by_cached_key(|&i| {
            let is_return = matches!(self.statements[i], Stmt::Return(_));
            (!is_return, stmt_key_text(&self.statements[i]), i)
        });
        ordered
    }

    /// Keeps the statements the sinks depend on.
    ///
    /// With `ignore_overwrites`, a sink that only writes paths which are
    /// overwritten later before being read is dropped as well.
    pub fn reachable_subgraph(&self, sinks: &[usize], ignore_overwrites: bool) -> DependencyGraph {
        let sinks: Vec<usize> = if ignore_overwrites {
            sinks
                .iter()
                .copied()
                .filter(|&s| !self.is_overwritten(s))
                .collect()
        } else {
            sinks.to_vec()
        };

        let mut live = vec![false; self.statements.len()];
        let mut stack: Vec<usize> = sinks;
        while let Some(i) = stack.pop() {
            if live[i] {
                continue;
            }
            live[i] = true;
            stack.extend(self.producers(i));
        }

        let kept: Vec<Stmt> = self
            .statements
            .iter()
            .zip(&live)
            .filter(|(_, live)| **live)
            .map(|(stmt, _)| stmt.clone())
            .collect();
        DependencyGraph::build_with(&kept, &self.parameters, self.preserve_call_order)
    }

    fn is_overwritten(&self, s: usize) -> bool {
        if !matches!(self.statements[s], Stmt::Assign { .. }) || self.writes[s].is_empty() {
            return false;
        }
        self.writes[s].iter().all(|path| {
            let overwrite = (s + 1..self.statements.len())
                .find(|&k| self.writes[k].iter().any(|w| is_path_prefix(w, path)));
            match overwrite {
                Some(k) => !(s + 1..=k).any(|j| {
                    self.reads[j]
                        .iter()
                        .any(|(r, kind)| reads_written_value(r, *kind, path))
                }),
                None => false,
            }
        })
    }

    /// DFS discovery order from the sinks; undiscovered statements follow
    /// in original order.
    fn discovery_order(&self) -> Vec<usize> {
        let n = self.statements.len();
        let mut order = vec![usize::MAX; n];
        let mut next = 0;

        fn visit(graph: &DependencyGraph, i: usize, order: &mut [usize], next: &mut usize) {
            if order[i] != usize::MAX {
                return;
            }
            order[i] = *next;
            *next += 1;
            let producers: Vec<usize> = graph.producers(i).collect();
            for p in producers {
                visit(graph, p, order, next);
            }
            let earlier: Vec<usize> = graph.ordering_predecessors(i).collect();
            for e in earlier {
                visit(graph, e, order, next);
            }
        }

        for sink in self.ordered_sinks(&self.sinks()) {
            visit(self, sink, &mut order, &mut next);
        }
        for (i, slot) in order.iter_mut().enumerate() {
            if *slot == usize::MAX {
                *slot = n + i;
            }
        }
        order
    }

    fn levels(&self) -> Vec<usize> {
        let mut levels = vec![0usize; self.statements.len()];
        for i in 0..self.statements.len() {
            let deepest = self
                .producers(i)
                .chain(self.ordering_predecessors(i))
                .map(|p| levels[p])
                .max()
                .unwrap_or(0);
            levels[i] = deepest + 1;
        }
        levels
    }

    /// Statements reordered level by level; independent statements are
    /// ordered by their right-hand side text, then by discovery order. The
    /// return statement comes last. If branches are sorted recursively.
    pub fn canonical_sort(&self) -> Vec<Stmt> {
        let levels = self.levels();
        let discovery = self.discovery_order();

        let mut indices: Vec<usize> = (0..self.statements.len()).collect();
        indices.sort_by_cached_key(|&i| {
            let is_return = matches!(self.statements[i], Stmt::Return(_));
            (
                is_return,
                levels[i],
                stmt_key_text(&self.statements[i]),
                discovery[i],
            )
        });

        indices
            .into_iter()
            .map(|i| match &self.statements[i] {
                Stmt::If { test, .. } => Stmt::If {
                    test: test.clone(),
                    body: self.sorted_branch(i, Branch::Body),
                    orelse: self.sorted_branch(i, Branch::OrElse),
                },
                stmt => stmt.clone(),
            })
            .collect()
    }

    fn sorted_branch(&self, index: usize, branch: Branch) -> Vec<Stmt> {
        self.inner_graph(index, branch)
            .map(DependencyGraph::canonical_sort)
            .unwrap_or_default()
    }

    /// Parameters read on the way from the sinks, in first-required order
    pub fn required_parameters(&self) -> Vec<String> {
        let mut required: Vec<String> = Vec::new();
        let mut visited = vec![false; self.statements.len()];

        for sink in self.ordered_sinks(&self.sinks()) {
            self.collect_parameters(sink, &mut visited, &mut required);
        }
        required
    }

    fn collect_parameters(&self, i: usize, visited: &mut [bool], required: &mut Vec<String>) {
        if visited[i] {
            return;
        }
        visited[i] = true;

        for (path, _) in &self.reads[i] {
            let root = path.split('.').next().unwrap_or_default();
            let rebound = (0..i).any(|j| self.writes[j].iter().any(|w| w == root));
            if !rebound && self.parameters.iter().any(|p| p == root) && !required.iter().any(|r| r == root) {
                required.push(root.to_string());
            }
            let producers: Vec<usize> = self
                .edges
                .iter()
                .filter(|e| e.consumer == i && &e.variable == path)
                .map(|e| e.producer)
                .collect();
            for p in producers {
                self.collect_parameters(p, visited, required);
            }
        }
    }
}

fn stmt_key_text(stmt: &Stmt) -> String {
    match stmt {
        Stmt::Assign { value, .. } => expr_to_string(value),
        Stmt::Return(Some(value)) | Stmt::Expr(value) => expr_to_string(value),
        Stmt::If { test, .. } => expr_to_string(test),
        Stmt::Return(None) | Stmt::Pass => String::new(),
    }
}

/// Storing into `a` (for `a.y = ...`) does not observe what `a.x` holds
fn reads_written_value(read: &str, kind: ReadKind, written: &str) -> bool {
    match kind {
        ReadKind::Value => paths_overlap(read, written),
        ReadKind::Base => is_path_prefix(written, read),
    }
}

fn stmt_reads(stmt: &Stmt) -> Vec<(String, ReadKind)> {
    let mut reads = Vec::new();
    collect_stmt_reads(stmt, &mut reads);
    reads
}

fn collect_stmt_reads(stmt: &Stmt, reads: &mut Vec<(String, ReadKind)>) {
    let push_values = |expr: &Expr, reads: &mut Vec<(String, ReadKind)>| {
        reads.extend(read_paths(expr).into_iter().map(|p| (p, ReadKind::Value)));
    };
    match stmt {
        Stmt::Assign { targets, value } => {
            push_values(value, reads);
            for target in targets {
                target_reads(target, reads);
            }
        }
        Stmt::Return(Some(value)) | Stmt::Expr(value) => push_values(value, reads),
        Stmt::If { test, body, orelse } => {
            push_values(test, reads);
            for inner in body.iter().chain(orelse) {
                collect_stmt_reads(inner, reads);
            }
        }
        Stmt::Return(None) | Stmt::Pass => {}
    }
}

fn target_reads(target: &Expr, reads: &mut Vec<(String, ReadKind)>) {
    match target {
        Expr::Tuple(elts) => {
            for elt in elts {
                target_reads(elt, reads);
            }
        }
        Expr::Starred(value) => target_reads(value, reads),
        Expr::Attribute { value, .. } => match value.as_path() {
            Some(base) => reads.push((base, ReadKind::Base)),
            None => reads.extend(read_paths(value).into_iter().map(|p| (p, ReadKind::Value))),
        },
        Expr::Subscript { value, index } => {
            reads.extend(read_paths(value).into_iter().map(|p| (p, ReadKind::Value)));
            reads.extend(read_paths(index).into_iter().map(|p| (p, ReadKind::Value)));
        }
        _ => {}
    }
}

fn stmt_writes(stmt: &Stmt) -> Vec<String> {
    let mut writes = Vec::new();
    match stmt {
        Stmt::Assign { targets, .. } => {
            for target in targets {
                target_paths(target, &mut writes);
            }
        }
        Stmt::If { body, orelse, .. } => {
            for inner in body.iter().chain(orelse) {
                writes.extend(stmt_writes(inner));
            }
        }
        _ => {}
    }
    writes
}

/// Calls `f` on every expression node of a statement, outside lambdas
fn for_each_expr(stmt: &Stmt, f: &mut dyn FnMut(&Expr)) {
    use crate::visit::{walk_expr, Visitor};

    struct Each<'a>(&'a mut dyn FnMut(&Expr));

    impl Visitor for Each<'_> {
        fn visit_expr(&mut self, expr: &Expr) {
            if matches!(expr, Expr::Lambda { .. }) {
                return;
            }
            (self.0)(expr);
            walk_expr(self, expr);
        }
    }

    Each(f).visit_stmt(stmt);
}
