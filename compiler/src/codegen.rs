//! AST to target expression tree.
//!
//! One rule per node kind. Var references and definitions go through the
//! `$cairn` root object so that a redefinition is seen by every unit that
//! was emitted earlier.

use std::rc::Rc;

use cairn::{ModuleRegistry, Result, Value};

use crate::ast::{FnNode, InfixOp, Node, NodeKind, VarRef};
use crate::target::{BinaryOp, Expr, Function, LogicalOp, Program, Stmt, UnaryOp};

/// `$cairn.packages[pkg].modules[mod].vars[name].value`
pub fn var_path(var: &VarRef) -> Expr {
    Expr::root()
        .member("packages")
        .index(Expr::literal(&*var.package))
        .member("modules")
        .index(Expr::literal(&*var.module))
        .member("vars")
        .index(Expr::literal(&*var.name))
        .member("value")
}

pub struct CodeGen<'a> {
    registry: &'a ModuleRegistry,
}

impl<'a> CodeGen<'a> {
    pub fn new(registry: &'a ModuleRegistry) -> Self {
        CodeGen { registry }
    }

    pub fn emit_program(&self, node: &Node) -> Result<Program> {
        Ok(Program::wrap(self.emit(node)?))
    }

    pub fn emit(&self, node: &Node) -> Result<Expr> {
        Ok(match &node.kind {
            NodeKind::Constant(value) | NodeKind::Quote(value) => Expr::Literal(value.clone()),
            NodeKind::Fn(f) => Expr::Function(self.emit_fn(f)?),
            NodeKind::Invoke { callee, args } => self.emit(callee)?.call(self.emit_all(args)?),
            NodeKind::VarInvoke { var, args } => var_path(var).call(self.emit_all(args)?),
            NodeKind::MemberAccess { object: None, member } => Expr::global(member),
            NodeKind::MemberAccess {
                object: Some(object),
                member,
            } => self.emit(object)?.member(member),
            NodeKind::MethodCall {
                object,
                method,
                args,
            } => self.emit(object)?.member(method).call(self.emit_all(args)?),
            NodeKind::Local(name) => Expr::Identifier(name.clone()),
            NodeKind::VarRef(var) => var_path(var),
            NodeKind::Def { name, value, meta } => {
                let value = match value {
                    Some(v) => Some(self.emit(v)?),
                    None => None,
                };
                self.emit_intern(name, meta.as_ref(), value)?
            }
            NodeKind::Defmacro {
                name,
                function,
                meta,
            } => {
                let function = Expr::Function(self.emit_fn(function)?);
                self.emit_intern(name, meta.as_ref(), Some(function))?
            }
            NodeKind::If {
                test,
                then,
                otherwise,
            } => Expr::Conditional {
                test: Box::new(Expr::root().member("truthy").call(vec![self.emit(test)?])),
                consequent: Box::new(self.emit(then)?),
                alternate: Box::new(match otherwise {
                    Some(e) => self.emit(e)?,
                    None => Expr::Literal(Value::Nil),
                }),
            },
            NodeKind::Infix { op, args } => self.emit_infix(*op, args)?,
            NodeKind::Array(items) => Expr::Array(self.emit_all(items)?),
            NodeKind::Dict(entries) => {
                let mut args = Vec::with_capacity(entries.len() * 2);
                for (k, v) in entries {
                    args.push(self.emit(k)?);
                    args.push(self.emit(v)?);
                }
                Expr::root().member("dict").call(args)
            }
            NodeKind::Set(items) => Expr::root().member("set").call(self.emit_all(items)?),
            NodeKind::Await(expr) => Expr::Await(Box::new(self.emit(expr)?)),
            NodeKind::New { class, args } => Expr::New {
                callee: Box::new(self.emit(class)?),
                args: self.emit_all(args)?,
            },
        })
    }

    fn emit_all(&self, nodes: &[Node]) -> Result<Vec<Expr>> {
        nodes.iter().map(|n| self.emit(n)).collect()
    }

    fn emit_fn(&self, f: &FnNode) -> Result<Function> {
        let mut body = Vec::with_capacity(f.body.len().max(1));
        match f.body.split_last() {
            Some((last, init)) => {
                for node in init {
                    body.push(Stmt::Expr(self.emit(node)?));
                }
                body.push(Stmt::Return(self.emit(last)?));
            }
            None => body.push(Stmt::Return(Expr::Literal(Value::Nil))),
        }
        Ok(Function {
            name: f.name.clone(),
            params: f.params.clone(),
            rest: f.rest.clone(),
            body: Rc::from(body),
            is_async: f.is_async,
        })
    }

    /// `$cairn.intern(pkg, mod, name, meta, value?)` in the module that is
    /// current when the unit is emitted. Leaving out the value keeps an
    /// existing root.
    fn emit_intern(&self, name: &str, meta: Option<&Value>, value: Option<Expr>) -> Result<Expr> {
        let module = self.registry.current_module()?;
        let mut args = vec![
            Expr::literal(module.package()),
            Expr::literal(module.name()),
            Expr::literal(name),
            Expr::Literal(meta.cloned().unwrap_or(Value::Nil)),
        ];
        args.extend(value);
        Ok(Expr::root().member("intern").call(args))
    }

    fn emit_infix(&self, op: InfixOp, args: &[Node]) -> Result<Expr> {
        let mut operands = self.emit_all(args)?;
        let binary = |op: BinaryOp, operands: Vec<Expr>| fold_binary(op, operands);
        Ok(match op {
            InfixOp::Add if operands.is_empty() => Expr::literal(0i64),
            InfixOp::Mul if operands.is_empty() => Expr::literal(1i64),
            InfixOp::Sub if operands.len() == 1 => Expr::Unary {
                op: UnaryOp::Neg,
                argument: Box::new(operands.remove(0)),
            },
            InfixOp::Div if operands.len() == 1 => {
                operands.insert(0, Expr::literal(1i64));
                binary(BinaryOp::Div, operands)
            }
            InfixOp::Add => binary(BinaryOp::Add, operands),
            InfixOp::Sub => binary(BinaryOp::Sub, operands),
            InfixOp::Mul => binary(BinaryOp::Mul, operands),
            InfixOp::Div => binary(BinaryOp::Div, operands),
            InfixOp::Mod => binary(BinaryOp::Rem, operands),
            InfixOp::Lt => binary(BinaryOp::Lt, operands),
            InfixOp::Gt => binary(BinaryOp::Gt, operands),
            InfixOp::Le => binary(BinaryOp::Le, operands),
            InfixOp::Ge => binary(BinaryOp::Ge, operands),
            InfixOp::Eq => binary(BinaryOp::StrictEq, operands),
            InfixOp::NotEq => binary(BinaryOp::StrictNotEq, operands),
            InfixOp::And if operands.is_empty() => Expr::literal(true),
            InfixOp::Or if operands.is_empty() => Expr::Literal(Value::Nil),
            InfixOp::And => fold_logical(LogicalOp::And, operands),
            InfixOp::Or => fold_logical(LogicalOp::Or, operands),
        })
    }
}

// Left fold; callers guarantee at least one operand
fn fold_binary(op: BinaryOp, operands: Vec<Expr>) -> Expr {
    let mut iter = operands.into_iter();
    let first = iter.next().unwrap_or(Expr::Literal(Value::Nil));
    iter.fold(first, |left, right| Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}

fn fold_logical(op: LogicalOp, operands: Vec<Expr>) -> Expr {
    let mut iter = operands.into_iter();
    let first = iter.next().unwrap_or(Expr::Literal(Value::Nil));
    iter.fold(first, |left, right| Expr::Logical {
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;
    use crate::config::CompilerOptions;
    use cairn::read_string;

    fn emit(registry: &ModuleRegistry, code: &str) -> Expr {
        let form = read_string(code).unwrap().unwrap();
        let node = Analyzer::new(registry, &CompilerOptions::default())
            .analyze(&form)
            .unwrap();
        CodeGen::new(registry).emit(&node).unwrap()
    }

    #[test]
    fn test_var_reference_goes_through_root() {
        let registry = ModuleRegistry::new();
        registry.intern("localpkg", "user", "x", Some(Value::from(1)), None).unwrap();
        assert_eq!(emit(&registry, "x"), var_path(&VarRef::new("localpkg", "user", "x")));
    }

    #[test]
    fn test_def_emits_intern_in_current_module() {
        let registry = ModuleRegistry::new();
        let Expr::Call { callee, args } = emit(&registry, "(def x 5)") else {
            panic!("expected a call");
        };
        assert_eq!(*callee, Expr::root().member("intern"));
        assert_eq!(args.len(), 5);
        assert_eq!(args[0], Expr::literal("localpkg"));
        assert_eq!(args[1], Expr::literal("user"));
        assert_eq!(args[2], Expr::literal("x"));
        assert_eq!(args[4], Expr::literal(5i64));

        let Expr::Call { args, .. } = emit(&registry, "(def y)") else { panic!() };
        assert_eq!(args.len(), 4);
    }

    #[test]
    fn test_if_tests_truthiness() {
        let registry = ModuleRegistry::new();
        let Expr::Conditional { test, alternate, .. } = emit(&registry, "(if 0 1)") else {
            panic!()
        };
        assert!(matches!(*test, Expr::Call { ref callee, .. } if **callee == Expr::root().member("truthy")));
        assert_eq!(*alternate, Expr::Literal(Value::Nil));
    }

    #[test]
    fn test_infix_folds() {
        let registry = ModuleRegistry::new();
        assert_eq!(emit(&registry, "(+)"), Expr::literal(0i64));
        assert_eq!(emit(&registry, "(*)"), Expr::literal(1i64));
        assert!(matches!(emit(&registry, "(- 3)"), Expr::Unary { op: UnaryOp::Neg, .. }));
        let Expr::Binary { op, left, .. } = emit(&registry, "(+ 1 2 3)") else { panic!() };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(*left, Expr::Binary { op: BinaryOp::Add, .. }));
        assert!(matches!(emit(&registry, "(== 1 1)"), Expr::Binary { op: BinaryOp::StrictEq, .. }));
        assert!(matches!(emit(&registry, "(and 1 2)"), Expr::Logical { op: LogicalOp::And, .. }));
    }

    #[test]
    fn test_fn_returns_last_form() {
        let registry = ModuleRegistry::new();
        let Expr::Function(f) = emit(&registry, "(fn [a] 1 a)") else { panic!() };
        assert_eq!(f.body.len(), 2);
        assert!(matches!(f.body[0], Stmt::Expr(_)));
        assert_eq!(f.body[1], Stmt::Return(Expr::Identifier(Rc::from("a"))));

        let Expr::Function(f) = emit(&registry, "(fn [])") else { panic!() };
        assert_eq!(&*f.body, &[Stmt::Return(Expr::Literal(Value::Nil))]);
    }

    #[test]
    fn test_host_forms() {
        let registry = ModuleRegistry::new();
        assert_eq!(emit(&registry, "js:Math"), Expr::global("Math"));
        assert_eq!(
            emit(&registry, "(.toUpperCase \"a\")"),
            Expr::literal("a").member("toUpperCase").call(vec![])
        );
        assert!(matches!(emit(&registry, "{:a 1}"), Expr::Call { .. }));
    }
}
