use serde::{Deserialize, Serialize};
use std::fmt;

/// A parsed source file: top-level functions and classes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Module {
    /// Items in source order
    pub items: Vec<Item>,
}

/// Top-level item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Item {
    /// `def name(...): ...`
    Function(FunctionDef),
    /// `class Name: ...`
    Class(ClassDef),
}

/// A procedure: ordered parameters plus an ordered body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    /// Function name
    pub name: String,
    /// Parameter list
    pub args: Arguments,
    /// Body statements
    pub body: Vec<Stmt>,
    /// Decorator expressions (`@staticmethod`)
    pub decorators: Vec<Expr>,
    /// Line of the `def` keyword (0 for synthesized functions)
    pub line: usize,
}

impl FunctionDef {
    /// Creates a function with positional parameters and no decorators
    pub fn new(name: impl Into<String>, params: Vec<String>, body: Vec<Stmt>) -> Self {
        FunctionDef {
            name: name.into(),
            args: Arguments::positional(params),
            body,
            decorators: Vec::new(),
            line: 0,
        }
    }

    /// Positional parameter names
    pub fn params(&self) -> &[String] {
        &self.args.params
    }

    /// True if decorated with `@staticmethod`
    pub fn is_static(&self) -> bool {
        self.decorators
            .iter()
            .any(|d| matches!(d, Expr::Name(n) if n == "staticmethod"))
    }
}

/// Function parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Arguments {
    /// Positional parameter names
    pub params: Vec<String>,
    /// Default values (trailing parameters), rejected by the grammar filter
    pub defaults: Vec<Expr>,
    /// `*args`, rejected by the grammar filter
    pub vararg: Option<String>,
    /// `**kwargs`, rejected by the grammar filter
    pub kwarg: Option<String>,
}

impl Arguments {
    /// Plain positional parameters
    pub fn positional(params: Vec<String>) -> Self {
        Arguments {
            params,
            ..Default::default()
        }
    }
}

/// A class (game, scheme, adversary or reduction)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    /// Class name
    pub name: String,
    /// Base classes
    pub bases: Vec<Expr>,
    /// Methods in source order
    pub methods: Vec<FunctionDef>,
    /// Nested classes in source order
    pub classes: Vec<ClassDef>,
    /// Line of the `class` keyword (0 for synthesized classes)
    pub line: usize,
}

impl ClassDef {
    /// Looks up a method by name
    pub fn method(&self, name: &str) -> Option<&FunctionDef> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Looks up a method by name, mutably
    pub fn method_mut(&mut self, name: &str) -> Option<&mut FunctionDef> {
        self.methods.iter_mut().find(|m| m.name == name)
    }

    /// Looks up a nested class by name
    pub fn inner_class(&self, name: &str) -> Option<&ClassDef> {
        self.classes.iter().find(|c| c.name == name)
    }
}

/// Statements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// Assignment: `targets[0] = targets[1] = ... = value`
    Assign {
        /// Assignment targets (more than one is a chained assignment)
        targets: Vec<Expr>,
        /// Assigned value
        value: Expr,
    },

    /// Return statement
    Return(Option<Expr>),

    /// If statement (`elif` chains nest in `orelse`)
    If {
        /// Condition expression
        test: Expr,
        /// Statements executed when the condition holds
        body: Vec<Stmt>,
        /// Statements executed otherwise (may be empty)
        orelse: Vec<Stmt>,
    },

    /// Expression statement (oracle or void call)
    Expr(Expr),

    /// `pass`
    Pass,
}

impl Stmt {
    /// Single-target assignment
    pub fn assign(target: Expr, value: Expr) -> Self {
        Stmt::Assign {
            targets: vec![target],
            value,
        }
    }

    /// Assignment to a plain variable
    pub fn assign_name(name: impl Into<String>, value: Expr) -> Self {
        Stmt::assign(Expr::Name(name.into()), value)
    }

    /// The single target of an assignment
    pub fn single_target(&self) -> Option<&Expr> {
        match self {
            Stmt::Assign { targets, .. } if targets.len() == 1 => targets.first(),
            _ => None,
        }
    }

    /// True for `return`
    pub fn is_return(&self) -> bool {
        matches!(self, Stmt::Return(_))
    }
}

/// Expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Variable reference
    Name(String),

    /// Literal constant
    Constant(Constant),

    /// Attribute access (`value.attr`)
    Attribute {
        /// Object being accessed
        value: Box<Expr>,
        /// Attribute name
        attr: String,
    },

    /// Subscript (`value[index]`)
    Subscript {
        /// Indexed expression
        value: Box<Expr>,
        /// Index expression
        index: Box<Expr>,
    },

    /// Function or method call
    Call {
        /// Called expression
        func: Box<Expr>,
        /// Positional arguments
        args: Vec<Expr>,
        /// Keyword arguments, rejected by the grammar filter
        keywords: Vec<Keyword>,
    },

    /// Binary operation
    BinOp {
        /// Left operand
        left: Box<Expr>,
        /// Operator
        op: BinaryOp,
        /// Right operand
        right: Box<Expr>,
    },

    /// Unary operation
    UnaryOp {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: Box<Expr>,
    },

    /// `and` / `or` over two or more values
    BoolOp {
        /// Operator
        op: BoolOp,
        /// Operands
        values: Vec<Expr>,
    },

    /// Chained comparison `left op0 c0 op1 c1 ...`
    Compare {
        /// Leftmost operand
        left: Box<Expr>,
        /// Operators
        ops: Vec<CmpOp>,
        /// Right-hand operands, one per operator
        comparators: Vec<Expr>,
    },

    /// `body if test else orelse`
    IfExp {
        /// Condition
        test: Box<Expr>,
        /// Value when the condition holds
        body: Box<Expr>,
        /// Value otherwise
        orelse: Box<Expr>,
    },

    /// `lambda params: body`
    Lambda {
        /// Parameter names
        params: Vec<String>,
        /// Body expression
        body: Box<Expr>,
    },

    /// Tuple display
    Tuple(Vec<Expr>),

    /// `*value`, rejected by the grammar filter
    Starred(Box<Expr>),
}

impl Expr {
    /// Variable reference
    pub fn name(name: impl Into<String>) -> Self {
        Expr::Name(name.into())
    }

    /// `None`
    pub fn none() -> Self {
        Expr::Constant(Constant::None)
    }

    /// Integer constant
    pub fn int(value: i64) -> Self {
        Expr::Constant(Constant::Int(value))
    }

    /// Boolean constant
    pub fn bool(value: bool) -> Self {
        Expr::Constant(Constant::Bool(value))
    }

    /// Attribute access
    pub fn attribute(value: Expr, attr: impl Into<String>) -> Self {
        Expr::Attribute {
            value: Box::new(value),
            attr: attr.into(),
        }
    }

    /// Call with positional arguments
    pub fn call(func: Expr, args: Vec<Expr>) -> Self {
        Expr::Call {
            func: Box::new(func),
            args,
            keywords: Vec::new(),
        }
    }

    /// Builds `a.b.c` from a dotted path
    pub fn path(dotted: &str) -> Self {
        let mut parts = dotted.split('.');
        let root = parts.next().unwrap_or_default();
        parts.fold(Expr::name(root), |acc, part| Expr::attribute(acc, part))
    }

    /// `body if test else orelse`
    pub fn if_exp(test: Expr, body: Expr, orelse: Expr) -> Self {
        Expr::IfExp {
            test: Box::new(test),
            body: Box::new(body),
            orelse: Box::new(orelse),
        }
    }

    /// Dotted path of a name or attribute chain (`a.b.c`)
    pub fn as_path(&self) -> Option<String> {
        match self {
            Expr::Name(name) => Some(name.clone()),
            Expr::Attribute { value, attr } => value.as_path().map(|p| format!("{}.{}", p, attr)),
            _ => None,
        }
    }

    /// Root variable of a name, attribute or subscript chain
    pub fn root_name(&self) -> Option<&str> {
        match self {
            Expr::Name(name) => Some(name),
            Expr::Attribute { value, .. } | Expr::Subscript { value, .. } => value.root_name(),
            _ => None,
        }
    }

    /// Literal constant, if this is one
    pub fn as_constant(&self) -> Option<&Constant> {
        match self {
            Expr::Constant(c) => Some(c),
            _ => None,
        }
    }

    /// Names, constants and tuples of those: values that never need hoisting
    pub fn is_trivial(&self) -> bool {
        match self {
            Expr::Name(_) | Expr::Constant(_) => true,
            Expr::Tuple(elts) => elts.iter().all(Expr::is_trivial),
            _ => false,
        }
    }

    /// True for call expressions
    pub fn is_call(&self) -> bool {
        matches!(self, Expr::Call { .. })
    }
}

/// Literal constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// String
    Str(String),
    /// Boolean
    Bool(bool),
    /// `None`
    None,
}

/// Keyword call argument (`name=value`, or `**value` when `arg` is None)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    /// Keyword name
    pub arg: Option<String>,
    /// Argument value
    pub value: Expr,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    /// Addition operator (+)
    Add,
    /// Subtraction operator (-)
    Sub,
    /// Multiplication operator (*)
    Mul,
    /// Matrix multiplication operator (@)
    MatMul,
    /// True division operator (/)
    Div,
    /// Floor division operator (//)
    FloorDiv,
    /// Modulo operator (%)
    Mod,
    /// Power operator (**)
    Pow,
    /// Left shift (<<)
    LShift,
    /// Right shift (>>)
    RShift,
    /// Bitwise or (|)
    BitOr,
    /// Bitwise xor (^)
    BitXor,
    /// Bitwise and (&)
    BitAnd,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Negation operator (-x)
    Neg,
    /// Unary plus (+x)
    Pos,
    /// Logical NOT operator
    Not,
    /// Bitwise invert (~x)
    Invert,
}

/// Boolean operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoolOp {
    /// `and`
    And,
    /// `or`
    Or,
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `is`
    Is,
    /// `is not`
    IsNot,
    /// `in`
    In,
    /// `not in`
    NotIn,
}

/// Operator precedence levels, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    /// Tuple displays
    Tuple,
    /// `lambda`
    Lambda,
    /// `x if c else y`
    IfExp,
    /// `or`
    Or,
    /// `and`
    And,
    /// `not`
    Not,
    /// Comparisons
    Comparison,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `&`
    BitAnd,
    /// `<<` and `>>`
    Shift,
    /// `+` and `-`
    Term,
    /// `*`, `@`, `/`, `//`, `%`
    Factor,
    /// Unary `-`, `+`, `~`
    Unary,
    /// `**`
    Power,
    /// Calls, attributes, subscripts
    Call,
    /// Literals and names
    Atom,
}

impl Precedence {
    /// The next tighter level
    pub fn next(self) -> Precedence {
        use Precedence::*;
        match self {
            Tuple => Lambda,
            Lambda => IfExp,
            IfExp => Or,
            Or => And,
            And => Not,
            Not => Comparison,
            Comparison => BitOr,
            BitOr => BitXor,
            BitXor => BitAnd,
            BitAnd => Shift,
            Shift => Term,
            Term => Factor,
            Factor => Unary,
            Unary => Power,
            Power => Call,
            Call | Atom => Atom,
        }
    }
}

impl BinaryOp {
    /// Returns the precedence level of this binary operator
    pub fn precedence(&self) -> Precedence {
        match self {
            BinaryOp::BitOr => Precedence::BitOr,
            BinaryOp::BitXor => Precedence::BitXor,
            BinaryOp::BitAnd => Precedence::BitAnd,
            BinaryOp::LShift | BinaryOp::RShift => Precedence::Shift,
            BinaryOp::Add | BinaryOp::Sub => Precedence::Term,
            BinaryOp::Mul
            | BinaryOp::MatMul
            | BinaryOp::Div
            | BinaryOp::FloorDiv
            | BinaryOp::Mod => Precedence::Factor,
            BinaryOp::Pow => Precedence::Power,
        }
    }
}

impl UnaryOp {
    /// Returns the precedence level of this unary operator
    pub fn precedence(&self) -> Precedence {
        match self {
            UnaryOp::Not => Precedence::Not,
            _ => Precedence::Unary,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::MatMul => "@",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::LShift => "<<",
            BinaryOp::RShift => ">>",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::BitAnd => "&",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UnaryOp::Neg => write!(f, "-"),
            UnaryOp::Pos => write!(f, "+"),
            UnaryOp::Not => write!(f, "not "),
            UnaryOp::Invert => write!(f, "~"),
        }
    }
}

impl fmt::Display for BoolOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BoolOp::And => write!(f, "and"),
            BoolOp::Or => write!(f, "or"),
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtEq => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtEq => ">=",
            CmpOp::Is => "is",
            CmpOp::IsNot => "is not",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_ordering() {
        assert!(BinaryOp::Add.precedence() > Precedence::Comparison);
        assert!(BinaryOp::Mul.precedence() > BinaryOp::Add.precedence());
        assert!(BinaryOp::Pow.precedence() > BinaryOp::Mul.precedence());
        assert!(UnaryOp::Not.precedence() < Precedence::Comparison);
    }

    #[test]
    fn test_paths() {
        let e = Expr::path("self.scheme.KeyGen");
        assert_eq!(e.as_path().as_deref(), Some("self.scheme.KeyGen"));
        assert_eq!(e.root_name(), Some("self"));
        assert_eq!(Expr::int(3).as_path(), None);
    }

    #[test]
    fn test_triviality() {
        assert!(Expr::name("a").is_trivial());
        assert!(Expr::Tuple(vec![Expr::name("a"), Expr::int(1)]).is_trivial());
        assert!(!Expr::call(Expr::name("f"), vec![]).is_trivial());
        assert!(!Expr::path("a.b").is_trivial());
    }
}
