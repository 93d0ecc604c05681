//! The target expression tree handed to the printer and the host.
//!
//! It is shaped after a JavaScript expression AST: identifiers, member and
//! index access, calls, function expressions, conditionals and operators.
//! Data that has no host literal form (keywords, symbols, quoted lists)
//! is carried as a `Literal` holding the value itself; the printer decides
//! how to spell it.

use std::rc::Rc;

use cairn::Value;

/// Name of the global through which emitted code reaches the registry
pub const ROOT: &str = "$cairn";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Gt,
    Le,
    Ge,
    StrictEq,
    StrictNotEq,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNotEq => "!==",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: Option<Rc<str>>,
    pub params: Vec<Rc<str>>,
    pub rest: Option<Rc<str>>,
    pub body: Rc<[Stmt]>,
    pub is_async: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// A local binding
    Identifier(Rc<str>),
    /// A host global such as `$cairn` or `Math`
    Global(Rc<str>),
    /// `object.property`
    Member {
        object: Box<Expr>,
        property: Rc<str>,
    },
    /// `object[index]`
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Function(Function),
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        argument: Box<Expr>,
    },
    Array(Vec<Expr>),
    New {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Await(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    Return(Expr),
}

impl Expr {
    pub fn literal(value: impl Into<Value>) -> Expr {
        Expr::Literal(value.into())
    }

    pub fn global(name: &str) -> Expr {
        Expr::Global(Rc::from(name))
    }

    pub fn root() -> Expr {
        Expr::global(ROOT)
    }

    pub fn member(self, property: &str) -> Expr {
        Expr::Member {
            object: Box::new(self),
            property: Rc::from(property),
        }
    }

    pub fn index(self, index: Expr) -> Expr {
        Expr::Index {
            object: Box::new(self),
            index: Box::new(index),
        }
    }

    pub fn call(self, args: Vec<Expr>) -> Expr {
        Expr::Call {
            callee: Box::new(self),
            args,
        }
    }
}

/// One emitted top-level unit: a nullary async function invoked at once.
/// The host returns its completion handle to the loader.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub unit: Expr,
}

impl Program {
    pub fn wrap(body: Expr) -> Program {
        let function = Expr::Function(Function {
            name: None,
            params: Vec::new(),
            rest: None,
            body: Rc::from(vec![Stmt::Return(body)]),
            is_async: true,
        });
        Program {
            unit: function.call(Vec::new()),
        }
    }
}
