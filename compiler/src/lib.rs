//! Analyzer and code generator for cairn
//!
//! Forms read by `cairn::Reader` are analyzed into an AST ([`ast::Node`]),
//! lowered to a target expression tree ([`target::Program`]) and handed to
//! a [`host::Host`] one top-level form at a time by the [`Compiler`]
//! driver. The reference host lives in `cairn-runtime`.

pub mod analyzer;
pub mod ast;
pub mod codegen;
pub mod compiler;
pub mod config;
pub mod host;
pub mod target;

pub use analyzer::{Analyzer, HOST_NAMESPACE, is_special_form};
pub use ast::{FnNode, InfixOp, Node, NodeKind, VarRef};
pub use codegen::{CodeGen, var_path};
pub use compiler::Compiler;
pub use config::CompilerOptions;
pub use host::{Completion, DirectoryLoader, Host, MemoryLoader, Printer, Source, SourceLoader};
pub use target::{BinaryOp, Expr, Function, LogicalOp, Program, ROOT, Stmt, UnaryOp};
