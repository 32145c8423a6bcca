//! Class (game) canonicalization
//!
//! Every method is canonicalized with [`CanonicalizeOptions::method`]
//! semantics, the class is renamed `G`, methods are ordered `__init__`
//! first then by name, and state used by a single method only becomes a
//! local of that method.

use super::{canonicalize_procedure, CanonicalizeOptions};
use crate::error::{Error, Result};
use crate::filter::{validate_class, GrammarRules};
use crate::parser::{parse_class, unparse_class, ClassDef, Expr};
use crate::utils::{all_names, self_attributes, NameGenerator, PathReplacement, Substitution};
use std::collections::{BTreeMap, HashMap};

/// Name every canonical class carries
pub const CANONICAL_CLASS_NAME: &str = "G";

/// Canonical text of the single class in `source`, renamed to `G`
pub fn canonicalize_class(source: &str) -> Result<String> {
    let class = parse_class(source)?;
    canonicalize_class_with(&class, &CanonicalizeOptions::default())
}

/// Canonical text of a parsed class
///
/// `rename_function` renames the class to `G`; methods always keep their
/// names and signatures.
pub fn canonicalize_class_with(class: &ClassDef, options: &CanonicalizeOptions) -> Result<String> {
    let canonical = canonicalize_class_def(class, options)?;
    Ok(unparse_class(&canonical))
}

fn method_options(options: &CanonicalizeOptions) -> CanonicalizeOptions {
    let mut method = CanonicalizeOptions {
        max_iterations: options.max_iterations,
        preserve_call_order: options.preserve_call_order,
        preserved_names: options.preserved_names.clone(),
        ..CanonicalizeOptions::method()
    };
    if !method.is_preserved("self") {
        method.preserved_names.push("self".to_string());
    }
    method
}

/// Canonical form of a class as a tree
pub fn canonicalize_class_def(class: &ClassDef, options: &CanonicalizeOptions) -> Result<ClassDef> {
    options.validate()?;
    validate_class(class, &GrammarRules::input())?;
    canonicalize_class_inner(class, options, options.rename_function)
}

fn canonicalize_class_inner(class: &ClassDef, options: &CanonicalizeOptions, rename: bool) -> Result<ClassDef> {
    let per_method = method_options(options);
    let mut names = NameGenerator::new();
    let mut current = class.clone();

    if rename && current.name != CANONICAL_CLASS_NAME {
        rename_class(&mut current, CANONICAL_CLASS_NAME)?;
    }

    let mut previous = unparse_class(&current);
    let mut iteration = 0;
    loop {
        iteration += 1;
        if iteration > options.max_iterations {
            return Err(Error::FixedPointExceeded {
                iterations: options.max_iterations,
            });
        }

        prune_members(&mut current, &mut names);
        for method in current.methods.iter_mut() {
            *method = canonicalize_procedure(method, &per_method)?;
        }
        current.methods.sort_by(|a, b| method_order(&a.name).cmp(&method_order(&b.name)));
        for inner in current.classes.iter_mut() {
            *inner = canonicalize_class_inner(inner, options, false)?;
        }

        let text = unparse_class(&current);
        tracing::debug!(class = %class.name, iteration, "class canonicalization iteration");
        if text == previous {
            return Ok(current);
        }
        previous = text;
    }
}

fn method_order(name: &str) -> (bool, &str) {
    (name != "__init__", name)
}

/// Renames the class and the references its methods make to it
fn rename_class(class: &mut ClassDef, new_name: &str) -> Result<()> {
    let map = HashMap::from([(class.name.clone(), Expr::name(new_name))]);
    for method in class.methods.iter_mut() {
        if all_names(method).contains(new_name) {
            return Err(Error::NameCollision {
                name: new_name.to_string(),
                scope: format!("method `{}`", method.name),
            });
        }
        Substitution::apply(&map, &mut method.body);
    }
    class.name = new_name.to_string();
    Ok(())
}

/// Turns state that only one method touches into a local of that method
pub fn prune_members(class: &mut ClassDef, names: &mut NameGenerator) {
    loop {
        let mut users: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (index, method) in class.methods.iter().enumerate() {
            for attr in self_attributes(method) {
                users.entry(attr).or_default().push(index);
            }
        }

        let candidate = users.into_iter().find(|(attr, methods)| {
            methods.len() == 1 && class.method(attr).is_none() && class.inner_class(attr).is_none()
        });
        let (attr, methods) = match candidate {
            Some(found) => found,
            None => return,
        };

        let method = &mut class.methods[methods[0]];
        let local = names.fresh(&format!("self_{}", attr), &all_names(method));
        tracing::debug!(method = %method.name, attribute = %attr, local = %local, "pruning member");
        PathReplacement::apply(&format!("self.{}", attr), &Expr::name(local), &mut method.body);
    }
}
