//! Analyzed syntax tree.
//!
//! The analyzer produces a closed set of node kinds; the code generator has
//! one emission rule per kind. Every node keeps the span of the form it came
//! from. Spans are diagnostic only: two nodes are equal when their kinds
//! are, wherever they were read from.

use std::fmt;
use std::rc::Rc;

use cairn::{Span, Symbol, Value};

/// A resolved, fully qualified var
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VarRef {
    pub package: Rc<str>,
    pub module: Rc<str>,
    pub name: Rc<str>,
}

impl VarRef {
    pub fn new(package: &str, module: &str, name: &str) -> Self {
        VarRef {
            package: Rc::from(package),
            module: Rc::from(module),
            name: Rc::from(name),
        }
    }

    pub fn from_var(var: &cairn::Var) -> Self {
        Self::new(var.package(), var.module(), var.name())
    }

    pub fn symbol(&self) -> Symbol {
        Symbol::full(&self.package, &self.module, &self.name)
    }
}

impl fmt::Display for VarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.package, self.module, self.name)
    }
}

/// A function literal
#[derive(Debug, Clone, PartialEq)]
pub struct FnNode {
    /// Self-reference name, bound inside the body
    pub name: Option<Rc<str>>,
    pub params: Vec<Rc<str>>,
    /// Rest parameter after `&`
    pub rest: Option<Rc<str>>,
    pub body: Vec<Node>,
    /// Contains a suspend point outside any nested function
    pub is_async: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    NotEq,
    And,
    Or,
}

impl InfixOp {
    pub fn from_name(name: &str) -> Option<InfixOp> {
        Some(match name {
            "+" => InfixOp::Add,
            "-" => InfixOp::Sub,
            "*" => InfixOp::Mul,
            "/" => InfixOp::Div,
            "mod" => InfixOp::Mod,
            "<" => InfixOp::Lt,
            ">" => InfixOp::Gt,
            "<=" => InfixOp::Le,
            ">=" => InfixOp::Ge,
            "==" => InfixOp::Eq,
            "!=" => InfixOp::NotEq,
            "and" => InfixOp::And,
            "or" => InfixOp::Or,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            InfixOp::Add => "+",
            InfixOp::Sub => "-",
            InfixOp::Mul => "*",
            InfixOp::Div => "/",
            InfixOp::Mod => "mod",
            InfixOp::Lt => "<",
            InfixOp::Gt => ">",
            InfixOp::Le => "<=",
            InfixOp::Ge => ">=",
            InfixOp::Eq => "==",
            InfixOp::NotEq => "!=",
            InfixOp::And => "and",
            InfixOp::Or => "or",
        }
    }

    /// Operators that take exactly two operands
    pub fn is_binary_only(&self) -> bool {
        matches!(
            self,
            InfixOp::Mod
                | InfixOp::Lt
                | InfixOp::Gt
                | InfixOp::Le
                | InfixOp::Ge
                | InfixOp::Eq
                | InfixOp::NotEq
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Self-evaluating literal
    Constant(Value),
    /// `(quote form)`
    Quote(Value),
    Fn(FnNode),
    /// Call of a computed callee
    Invoke { callee: Box<Node>, args: Vec<Node> },
    /// Call of a var resolved at analysis time
    VarInvoke { var: VarRef, args: Vec<Node> },
    /// `(.-field obj)`; a missing object means the host's global scope
    MemberAccess {
        object: Option<Box<Node>>,
        member: Rc<str>,
    },
    /// `(.method obj args...)`
    MethodCall {
        object: Box<Node>,
        method: Rc<str>,
        args: Vec<Node>,
    },
    Local(Rc<str>),
    VarRef(VarRef),
    /// `(def name value?)`, defined in the current module at emission
    Def {
        name: Rc<str>,
        value: Option<Box<Node>>,
        meta: Option<Value>,
    },
    If {
        test: Box<Node>,
        then: Box<Node>,
        otherwise: Option<Box<Node>>,
    },
    Defmacro {
        name: Rc<str>,
        function: FnNode,
        meta: Option<Value>,
    },
    Infix { op: InfixOp, args: Vec<Node> },
    Array(Vec<Node>),
    Dict(Vec<(Node, Node)>),
    Set(Vec<Node>),
    /// `(await expr)`
    Await(Box<Node>),
    /// `(new Type args...)`
    New { class: Box<Node>, args: Vec<Node> },
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Option<Span>,
}

impl Node {
    pub fn new(kind: NodeKind, span: Option<Span>) -> Self {
        Node { kind, span }
    }

    pub fn constant(value: Value) -> Self {
        Node::new(NodeKind::Constant(value), None)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}
