//! Checks one hop of a toy ElGamal IND-CPA proof
//!
//! The real game, with the scheme inlined, is compared against the game a
//! person would write by hand. Then the DDH reduction is spliced into the IND-CPA
//! interface and compared against the hybrid game it should equal.
//!
//! Run with: cargo run --example game_hop

use anyhow::Context;
use gamehop::{
    canonicalize_class_with, inline_reduction_into_game, inline_scheme_into_game, parse_class,
    unparse_class, CanonicalizeOptions,
};

const IND_CPA: &str = "class IndCpa:
    def __init__(self, scheme, adversary):
        self.scheme = scheme
        self.adversary = adversary

    def main(self):
        (pk, sk) = self.scheme.KeyGen()
        (m0, m1) = self.adversary.choose(pk)
        c = self.scheme.Enc(pk, m0)
        r = self.adversary.guess(c)
        return r
";

const ELGAMAL: &str = "class ElGamal:
    @staticmethod
    def KeyGen():
        sk = Random()
        pk = Exp(sk)
        return (pk, sk)

    @staticmethod
    def Enc(pk, m):
        r = Random()
        c = (Exp(r), Mul(Pow(pk, r), m))
        return c
";

const REWRITTEN: &str = "class Rewritten:
    def __init__(self, scheme, adversary):
        self.scheme = scheme
        self.adversary = adversary

    def main(self):
        sk = Random()
        pk = Exp(sk)
        (m0, m1) = self.adversary.choose(pk)
        r = Random()
        c = (Exp(r), Mul(Pow(pk, r), m0))
        b = self.adversary.guess(c)
        return b
";

const DDH: &str = "class DDH:
    def __init__(self, group, adversary):
        self.group = group
        self.adversary = adversary

    def main(self):
        x = self.group.Sample()
        y = self.group.Sample()
        z = self.group.Sample()
        b = self.adversary.guess(Exp(x), Exp(y), Exp(z))
        return b
";

const GROUP: &str = "class Group:
    @staticmethod
    def Sample():
        s = Random()
        return s
";

const REDUCTION: &str = "class R:
    def __init__(self, group, inner):
        self.group = group
        self.inner = inner

    def guess(self, A, B, C):
        (m0, m1) = self.inner.choose(A)
        c = (B, Mul(C, m0))
        r = self.inner.guess(c)
        return r
";

const HYBRID: &str = "class Hybrid:
    def __init__(self, scheme, adversary):
        self.scheme = scheme
        self.adversary = adversary

    def main(self):
        x = Random()
        y = Random()
        z = Random()
        (m0, m1) = self.adversary.choose(Exp(x))
        c = (Exp(y), Mul(Exp(z), m0))
        r = self.adversary.guess(c)
        return r
";

fn hop(name: &str, left: &str, right: &str) {
    println!("{}", name);
    println!("─────────────────────────────────────");
    if left == right {
        println!("✅ equivalent\n");
    } else {
        println!("❌ not equivalent");
        println!("left:\n{}\nright:\n{}", left, right);
    }
}

fn main() -> anyhow::Result<()> {
    println!("═══════════════════════════════════════");
    println!("  gamehop {} - ElGamal IND-CPA", gamehop::VERSION);
    println!("═══════════════════════════════════════\n");

    let game = parse_class(IND_CPA).context("parsing IND-CPA game")?;
    let scheme = parse_class(ELGAMAL).context("parsing ElGamal")?;

    let real = inline_scheme_into_game(&scheme, &game)?;
    println!("Real game with ElGamal inlined:\n{}", unparse_class(&real));

    let options = CanonicalizeOptions::default();
    let real_text = canonicalize_class_with(&real, &options)?;
    let rewritten = canonicalize_class_with(&parse_class(REWRITTEN)?, &options)?;
    hop("Hop 1: inline the scheme", &real_text, &rewritten);

    let spliced = inline_reduction_into_game(
        &parse_class(REDUCTION)?,
        &parse_class(DDH)?,
        &parse_class(GROUP)?,
        &game,
        &scheme,
    )
    .context("splicing the DDH reduction")?;
    let spliced_text = canonicalize_class_with(&spliced, &options)?;
    let hybrid = canonicalize_class_with(&parse_class(HYBRID)?, &options)?;
    hop("Hop 2: DDH reduction against the hybrid", &spliced_text, &hybrid);

    Ok(())
}
