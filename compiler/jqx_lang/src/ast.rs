//! Filter program syntax tree.
//!
//! Surface sugar is removed by the parser: `.foo` is an index with a literal
//! key, `{a}` is `{"a": .a}`, `elif` chains nest, and `$param` parameters
//! become a filter parameter plus a variable binding.

use std::ops::Range;
use std::sync::Arc;

use jqx_value::Value;
use smallvec::SmallVec;

/// Byte range into the program source.
pub type Span = Range<usize>;

/// Call arguments. Most builtins take at most two.
pub(crate) type Args = SmallVec<[Arc<Expr>; 2]>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug)]
pub(crate) enum Expr {
    /// `.`
    Identity,
    /// `..`
    RecurseAll,
    Literal(Value),
    /// `t[k]`, `t.k`, `t."k"`
    Index {
        target: Box<Expr>,
        key: Box<Expr>,
    },
    /// `t[from:to]`
    Slice {
        target: Box<Expr>,
        from: Option<Box<Expr>>,
        to: Option<Box<Expr>>,
    },
    /// `t[]`
    Iterate(Box<Expr>),
    /// `try body catch handler`, and postfix `?` with no handler.
    Try {
        body: Box<Expr>,
        handler: Option<Box<Expr>>,
    },
    /// `[e]`, `[]`
    Array(Option<Box<Expr>>),
    /// `{k: v, ...}`
    Object(Vec<(Expr, Expr)>),
    Neg(Box<Expr>),
    Pipe(Box<Expr>, Box<Expr>),
    Comma(Box<Expr>, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    /// `a // b`
    Alt(Box<Expr>, Box<Expr>),
    If {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Option<Box<Expr>>,
    },
    Var {
        name: String,
        span: Span,
    },
    /// `source as $name | body`
    Bind {
        source: Box<Expr>,
        name: String,
        body: Box<Expr>,
    },
    Reduce {
        source: Box<Expr>,
        name: String,
        init: Box<Expr>,
        update: Box<Expr>,
    },
    Foreach {
        source: Box<Expr>,
        name: String,
        init: Box<Expr>,
        update: Box<Expr>,
        extract: Option<Box<Expr>>,
    },
    Call {
        name: String,
        args: Args,
        span: Span,
    },
    /// `def f(params): body; rest`
    Def {
        def: Arc<FuncDef>,
        rest: Box<Expr>,
    },
}

#[derive(Debug)]
pub(crate) struct FuncDef {
    pub name: String,
    /// Filter parameter names. `$x` parameters are recorded here as `x`.
    pub params: Vec<String>,
    pub body: Expr,
}

impl FuncDef {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl Expr {
    pub fn literal(value: impl Into<Value>) -> Expr {
        Expr::Literal(value.into())
    }

    pub fn field(target: Expr, name: impl Into<String>) -> Expr {
        Expr::Index {
            target: Box::new(target),
            key: Box::new(Expr::Literal(Value::string(name))),
        }
    }
}
