//! Reduction inlining
//!
//! A reduction `R` plays the adversary of one game (`game_for_reduction`,
//! run with `scheme_for_reduction`) while itself running an inner adversary
//! against a target game. Splicing `R` into the reduction's game yields a
//! game with the interface of the target game:
//!
//! ```text
//! 1. inline scheme_for_reduction into game_for_reduction        -> G'
//! 2. rename R's state: scheme slot     -> target scheme slot
//!                      adversary slot  -> target adversary slot
//!                      other attribute -> R_<attribute>
//! 3. inline R's methods called through G's adversary slot, self = self
//! 4. copy R's remaining methods (its oracles)
//! 5. take the target game's name and constructor, inline target_scheme
//! ```
//!
//! Renaming goes through temporaries so calls to the inner adversary are
//! not mistaken for calls to `R` when both slots share a name.

use super::class::{inline_class_at, inline_scheme_into_game, scheme_slot, stored_slot};
use crate::error::{Error, Result};
use crate::filter::{validate_class, GrammarRules};
use crate::parser::{ClassDef, Expr, FunctionDef, Stmt};
use crate::utils::{find_call, self_attributes, uses_path, NameGenerator, PathReplacement};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Splices `reduction` into `game_for_reduction` so the result has the
/// interface of `target_game`, then inlines `target_scheme`
///
/// # Errors
///
/// - [`Error::InlineShapeViolation`] when the reduction's constructor does
///   more than store its parameters, or the reduction's game still refers
///   to its scheme after the scheme was inlined
/// - [`Error::NameCollision`] when renamed state or copied methods clash
///   with the game
/// - [`Error::UnknownName`] when a constructor lacks the expected slots
pub fn inline_reduction_into_game(
    reduction: &ClassDef,
    game_for_reduction: &ClassDef,
    scheme_for_reduction: &ClassDef,
    target_game: &ClassDef,
    target_scheme: &ClassDef,
) -> Result<ClassDef> {
    for class in [reduction, game_for_reduction, scheme_for_reduction, target_game, target_scheme] {
        validate_class(class, &GrammarRules::input())?;
    }

    let game = inline_scheme_into_game(scheme_for_reduction, game_for_reduction)?;
    let reduction_slots = Slots::of(reduction)?;
    check_plain_constructor(reduction)?;
    let game_slots = Slots::of(&game)?;
    let target_slots = Slots::of(target_game)?;

    let game_scheme = format!("self.{}", game_slots.scheme);
    for method in game.methods.iter().filter(|m| m.name != "__init__") {
        if uses_path(&method.body, &game_scheme) {
            return Err(Error::inline_shape(
                &game.name,
                format!("`{}` is still used by `{}` after inlining the scheme", game_scheme, method.name),
            ));
        }
    }

    let mut names = NameGenerator::new();
    let renaming = StateRenaming::plan(reduction, &reduction_slots, &game, &target_slots, target_game, &mut names)?;
    let renamed = renaming.apply_temporaries(reduction);

    let adversary_slot = format!("self.{}", game_slots.adversary);
    let called = called_methods(&game, &adversary_slot, &renamed);

    let mut methods = Vec::new();
    if let Some(init) = target_game.method("__init__") {
        methods.push(init.clone());
    }
    for method in game.methods.iter().filter(|m| m.name != "__init__") {
        let mut method = method.clone();
        inline_class_at(&mut method, &adversary_slot, "self", &renamed, &mut names)?;
        methods.push(method);
    }
    for method in renamed.methods.iter() {
        if method.name == "__init__" || called.contains(&method.name) {
            continue;
        }
        if methods.iter().any(|m| m.name == method.name) {
            return Err(Error::NameCollision {
                name: method.name.clone(),
                scope: format!("game `{}`", target_game.name),
            });
        }
        methods.push(method.clone());
    }
    for method in methods.iter_mut() {
        renaming.apply_final(method);
    }

    tracing::debug!(
        reduction = %reduction.name,
        game = %game_for_reduction.name,
        target = %target_game.name,
        inlined = ?called,
        "spliced reduction into game"
    );

    let spliced = ClassDef {
        name: target_game.name.clone(),
        bases: target_game.bases.clone(),
        methods,
        classes: target_game.classes.clone(),
        line: target_game.line,
    };
    inline_scheme_into_game(target_scheme, &spliced)
}

/// Scheme and adversary slots of a class with a `(self, scheme, adversary)`
/// constructor
struct Slots {
    scheme: String,
    adversary: String,
}

impl Slots {
    fn of(class: &ClassDef) -> Result<Self> {
        let scheme = scheme_slot(class)?;
        let init = class.method("__init__").ok_or_else(|| Error::UnknownName {
            name: "__init__".to_string(),
            context: format!("class `{}`", class.name),
        })?;
        let param = init.params().get(2).ok_or_else(|| Error::UnknownName {
            name: "adversary parameter".to_string(),
            context: format!("constructor of `{}`", class.name),
        })?;
        let adversary = stored_slot(init, param).ok_or_else(|| Error::UnknownName {
            name: param.clone(),
            context: format!("state stored by the constructor of `{}`", class.name),
        })?;
        Ok(Slots { scheme, adversary })
    }
}

/// The reduction's constructor may only store its parameters
fn check_plain_constructor(reduction: &ClassDef) -> Result<()> {
    let init = match reduction.method("__init__") {
        Some(init) => init,
        None => return Ok(()),
    };
    let plain = init.body.iter().all(|stmt| match stmt {
        Stmt::Assign { targets, value: Expr::Name(param) } => {
            targets.len() == 1
                && init.params().get(1..).map_or(false, |params| params.contains(param))
                && matches!(&targets[0], Expr::Attribute { value, .. }
                    if matches!(value.as_ref(), Expr::Name(n) if n == "self"))
        }
        Stmt::Pass => true,
        _ => false,
    });
    if !plain {
        return Err(Error::inline_shape(
            &reduction.name,
            "constructor may only store its parameters",
        ));
    }
    Ok(())
}

/// Reduction methods called through the game's adversary slot
fn called_methods(game: &ClassDef, adversary_slot: &str, reduction: &ClassDef) -> HashSet<String> {
    reduction
        .methods
        .iter()
        .filter(|m| m.name != "__init__")
        .filter(|m| {
            let path = format!("{}.{}", adversary_slot, m.name);
            game.methods.iter().any(|g| {
                find_call(&g.body, &|func| func.as_path().as_deref() == Some(path.as_str())).is_some()
            })
        })
        .map(|m| m.name.clone())
        .collect()
}

/// `self.<attr>` renaming of a reduction's state, attribute to
/// (temporary, final)
struct StateRenaming {
    attributes: BTreeMap<String, (String, String)>,
}

impl StateRenaming {
    fn plan(
        reduction: &ClassDef,
        slots: &Slots,
        game: &ClassDef,
        target: &Slots,
        target_game: &ClassDef,
        names: &mut NameGenerator,
    ) -> Result<Self> {
        let used: BTreeSet<String> = reduction.methods.iter().flat_map(self_attributes).collect();

        let mut taken: HashSet<String> = game
            .methods
            .iter()
            .chain(target_game.methods.iter())
            .flat_map(self_attributes)
            .collect();
        taken.extend(game.methods.iter().map(|m| m.name.clone()));

        let mut attributes = BTreeMap::new();
        let mut finals: HashSet<String> = HashSet::new();
        for attr in used {
            if reduction.method(&attr).is_some() {
                continue;
            }
            let final_name = if attr == slots.scheme {
                target.scheme.clone()
            } else if attr == slots.adversary {
                target.adversary.clone()
            } else {
                let prefixed = format!("{}_{}", reduction.name, attr);
                if taken.contains(&prefixed) {
                    return Err(Error::NameCollision {
                        name: format!("self.{}", prefixed),
                        scope: format!("game `{}`", target_game.name),
                    });
                }
                prefixed
            };
            if !finals.insert(final_name.clone()) {
                return Err(Error::NameCollision {
                    name: format!("self.{}", final_name),
                    scope: format!("reduction `{}`", reduction.name),
                });
            }
            attributes.insert(attr, (names.temporary(), final_name));
        }
        Ok(StateRenaming { attributes })
    }

    fn apply_temporaries(&self, reduction: &ClassDef) -> ClassDef {
        let mut renamed = reduction.clone();
        for method in renamed.methods.iter_mut() {
            for (attr, (temp, _)) in &self.attributes {
                replace_self_attribute(method, attr, temp);
            }
        }
        renamed
    }

    fn apply_final(&self, method: &mut FunctionDef) {
        for (temp, final_name) in self.attributes.values() {
            replace_self_attribute(method, temp, final_name);
        }
    }
}

fn replace_self_attribute(method: &mut FunctionDef, from: &str, to: &str) {
    let replacement = Expr::attribute(Expr::name("self"), to);
    PathReplacement::apply(&format!("self.{}", from), &replacement, &mut method.body);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_class;

    const GAME: &str = "class DDHGame:\n    def __init__(self, group, adversary):\n        self.group = group\n        self.adversary = adversary\n\n    def main(self):\n        x = self.group.Sample()\n        y = self.group.Sample()\n        b = self.adversary.guess(x, y, x * y)\n        return b\n";
    const GROUP: &str = "class Group:\n    @staticmethod\n    def Sample():\n        r = Random()\n        return r\n";
    const REDUCTION: &str = "class R:\n    def __init__(self, scheme, inner_adversary):\n        self.scheme = scheme\n        self.inner_adversary = inner_adversary\n\n    def guess(self, A, B, C):\n        self.pk = A\n        c = self.scheme.Enc(self.pk, C)\n        b = self.inner_adversary.guess(A, c, self.oracle)\n        return b\n\n    def oracle(self, m):\n        return self.scheme.Enc(self.pk, m)\n";
    const TARGET: &str = "class IndCpa:\n    def __init__(self, scheme, adversary):\n        self.scheme = scheme\n        self.adversary = adversary\n\n    def main(self):\n        return 0\n";
    const PKE: &str = "class Pke:\n    @staticmethod\n    def Enc(pk, m):\n        c = pk + m\n        return c\n";

    fn splice(reduction: &str, game: &str) -> Result<ClassDef> {
        inline_reduction_into_game(
            &parse_class(reduction)?,
            &parse_class(game)?,
            &parse_class(GROUP)?,
            &parse_class(TARGET)?,
            &parse_class(PKE)?,
        )
    }

    #[test]
    fn test_reduction_is_spliced() {
        let result = splice(REDUCTION, GAME).unwrap();
        assert_eq!(result.name, "IndCpa");
        let names: Vec<&str> = result.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["__init__", "main", "oracle"]);

        let main = result.method("main").unwrap().to_string();
        assert!(main.contains("self.R_pk = x"));
        assert!(main.contains("self.adversary.guess(x, _guess_0_c, self.oracle)"));
        assert_eq!(main.matches("Random()").count(), 2);
        assert!(!main.contains("self.group"));
        assert!(!main.contains("self.scheme"));
        assert!(!main.contains("_tmp_"));

        let oracle = result.method("oracle").unwrap().to_string();
        assert!(oracle.contains("self.R_pk"));
        assert!(!oracle.contains("self.scheme"));
    }

    #[test]
    fn test_constructor_must_only_store_parameters() {
        let busy = REDUCTION.replace(
            "        self.inner_adversary = inner_adversary\n",
            "        self.inner_adversary = inner_adversary\n        self.count = 0\n",
        );
        assert!(matches!(
            splice(&busy, GAME),
            Err(Error::InlineShapeViolation { callee, .. }) if callee == "R"
        ));
    }

    #[test]
    fn test_scheme_slot_left_in_game() {
        let game = GAME.replace("        return b\n", "        z = self.group.order\n        return (b, z)\n");
        assert!(matches!(
            splice(REDUCTION, &game),
            Err(Error::InlineShapeViolation { callee, .. }) if callee == "DDHGame"
        ));
    }

    #[test]
    fn test_copied_method_conflicts_with_game() {
        let clashing = format!("{}\n\n    def main(self):\n        return 1\n", REDUCTION.trim_end());
        assert!(matches!(
            splice(&clashing, GAME),
            Err(Error::NameCollision { name, .. }) if name == "main"
        ));
    }
}
