//! Prints target trees as JavaScript source.
//!
//! Local names are munged into valid identifiers; data without a JS literal
//! form is rebuilt through helper calls on the root object
//! (`$cairn.keyword("k")`, `$cairn.list(...)`, ...). Compound
//! subexpressions are always parenthesized.

use std::fmt::Write;

use cairn::{NumericType, Value};
use cairn_compiler::{Expr, Function, LogicalOp, Printer, Program, ROOT, Stmt, UnaryOp};

const RESERVED: &[&str] = &[
    "arguments", "await", "break", "case", "catch", "class", "const", "continue", "debugger",
    "default", "delete", "do", "else", "enum", "eval", "export", "extends", "false", "finally",
    "for", "function", "if", "implements", "import", "in", "instanceof", "interface", "let",
    "new", "null", "package", "private", "protected", "public", "return", "static", "super",
    "switch", "this", "throw", "true", "try", "typeof", "undefined", "var", "void", "while",
    "with", "yield",
];

/// Turn a cairn local name into a JS identifier: `empty?` -> `empty$QMARK`.
///
/// `$` only appears as an escape, so distinct names never munge alike:
/// `-` becomes `_`, a literal `_` becomes `$_` and a literal `$` becomes `$$`.
pub fn munge(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, c) in name.chars().enumerate() {
        match c {
            '-' => out.push('_'),
            '_' => out.push_str("$_"),
            '$' => out.push_str("$$"),
            '?' => out.push_str("$QMARK"),
            '!' => out.push_str("$BANG"),
            '*' => out.push_str("$STAR"),
            '+' => out.push_str("$PLUS"),
            '>' => out.push_str("$GT"),
            '<' => out.push_str("$LT"),
            '=' => out.push_str("$EQ"),
            '/' => out.push_str("$SLASH"),
            '%' => out.push_str("$PCT"),
            '&' => out.push_str("$AMP"),
            '#' => out.push_str("$HASH"),
            '\'' => out.push_str("$QUOTE"),
            '.' => out.push_str("$DOT"),
            ':' => out.push_str("$COLON"),
            c if c.is_ascii_digit() && i == 0 => {
                out.push('$');
                out.push(c);
            }
            c if c.is_alphanumeric() => out.push(c),
            other => {
                let _ = write!(out, "$u{:x}$", other as u32);
            }
        }
    }
    // A trailing bare `$` marks a reserved word
    if RESERVED.contains(&out.as_str()) {
        out.push('$');
    }
    out
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn quote_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsPrinter;

impl JsPrinter {
    pub fn new() -> Self {
        JsPrinter
    }

    pub fn print_expr(&self, expr: &Expr) -> String {
        let mut out = String::new();
        self.expr(expr, &mut out);
        out
    }

    fn expr(&self, expr: &Expr, out: &mut String) {
        match expr {
            Expr::Literal(value) => self.literal(value, out),
            Expr::Identifier(name) => out.push_str(&munge(name)),
            Expr::Global(name) => out.push_str(name),
            Expr::Member { object, property } => {
                self.operand(object, out);
                if is_identifier(property) {
                    out.push('.');
                    out.push_str(property);
                } else {
                    out.push('[');
                    quote_string(property, out);
                    out.push(']');
                }
            }
            Expr::Index { object, index } => {
                self.operand(object, out);
                out.push('[');
                self.expr(index, out);
                out.push(']');
            }
            Expr::Call { callee, args } => {
                self.operand(callee, out);
                self.args(args, out);
            }
            Expr::Function(function) => self.function(function, out),
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                out.push('(');
                self.expr(test, out);
                out.push_str(" ? ");
                self.expr(consequent, out);
                out.push_str(" : ");
                self.expr(alternate, out);
                out.push(')');
            }
            Expr::Binary { op, left, right } => {
                self.infix(left, op.symbol(), right, out);
            }
            Expr::Logical { op, left, right } => {
                let symbol = match op {
                    LogicalOp::And => "&&",
                    LogicalOp::Or => "||",
                };
                self.infix(left, symbol, right, out);
            }
            Expr::Unary { op, argument } => {
                out.push('(');
                out.push(match op {
                    UnaryOp::Neg => '-',
                    UnaryOp::Not => '!',
                });
                self.operand(argument, out);
                out.push(')');
            }
            Expr::Array(items) => {
                out.push('[');
                self.list(items, out);
                out.push(']');
            }
            Expr::New { callee, args } => {
                out.push_str("new ");
                self.operand(callee, out);
                self.args(args, out);
            }
            Expr::Await(inner) => {
                out.push_str("(await ");
                self.expr(inner, out);
                out.push(')');
            }
        }
    }

    /// An expression in callee or object position
    fn operand(&self, expr: &Expr, out: &mut String) {
        let simple = matches!(
            expr,
            Expr::Identifier(_)
                | Expr::Global(_)
                | Expr::Member { .. }
                | Expr::Index { .. }
                | Expr::Call { .. }
                | Expr::Array(_)
        ) || matches!(expr, Expr::Literal(Value::String(_)));
        if simple {
            self.expr(expr, out);
        } else {
            out.push('(');
            self.expr(expr, out);
            out.push(')');
        }
    }

    fn infix(&self, left: &Expr, symbol: &str, right: &Expr, out: &mut String) {
        out.push('(');
        self.expr(left, out);
        out.push(' ');
        out.push_str(symbol);
        out.push(' ');
        self.expr(right, out);
        out.push(')');
    }

    fn list(&self, items: &[Expr], out: &mut String) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.expr(item, out);
        }
    }

    fn args(&self, args: &[Expr], out: &mut String) {
        out.push('(');
        self.list(args, out);
        out.push(')');
    }

    fn function(&self, function: &Function, out: &mut String) {
        if function.is_async {
            out.push_str("async ");
        }
        out.push_str("function");
        if let Some(name) = &function.name {
            out.push(' ');
            out.push_str(&munge(name));
        }
        out.push('(');
        let mut params: Vec<String> = function.params.iter().map(|p| munge(p)).collect();
        if let Some(rest) = &function.rest {
            params.push(format!("...{}", munge(rest)));
        }
        out.push_str(&params.join(", "));
        out.push_str(") {");
        for stmt in function.body.iter() {
            out.push(' ');
            match stmt {
                Stmt::Expr(e) => self.expr(e, out),
                Stmt::Return(e) => {
                    out.push_str("return ");
                    self.expr(e, out);
                }
            }
            out.push(';');
        }
        out.push_str(" }");
    }

    fn helper(&self, name: &str, items: &[Value], out: &mut String) {
        let _ = write!(out, "{ROOT}.{name}(");
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.literal(item, out);
        }
        out.push(')');
    }

    fn literal(&self, value: &Value, out: &mut String) {
        match value {
            Value::Nil => out.push_str("null"),
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Number(NumericType::Int(n)) => {
                let _ = write!(out, "{n}");
            }
            Value::Number(NumericType::BigInt(n)) => {
                let _ = write!(out, "{n}n");
            }
            Value::Number(NumericType::Float(x)) if x.is_nan() => out.push_str("NaN"),
            Value::Number(NumericType::Float(x)) if x.is_infinite() => {
                out.push_str(if *x > 0.0 { "Infinity" } else { "-Infinity" });
            }
            Value::Number(NumericType::Float(x)) => {
                let _ = write!(out, "{x}");
            }
            Value::String(s) => quote_string(s, out),
            Value::Keyword(k) => {
                let _ = write!(out, "{ROOT}.keyword(");
                quote_string(&k.name(), out);
                out.push(')');
            }
            Value::Symbol(s) => {
                let _ = write!(out, "{ROOT}.symbol(");
                quote_string(&s.to_string(), out);
                out.push(')');
            }
            Value::QName(q) => {
                let _ = write!(out, "{ROOT}.qname(");
                quote_string(&q.uri, out);
                out.push(')');
            }
            Value::Regex(r) => {
                let _ = write!(out, "{ROOT}.regex(");
                quote_string(&r.source, out);
                out.push_str(", ");
                quote_string(&r.flags, out);
                out.push(')');
            }
            Value::Array(a) => {
                out.push('[');
                for (i, item) in a.items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.literal(item, out);
                }
                out.push(']');
            }
            Value::List(l) => self.helper("list", l.as_slice(), out),
            Value::Cons(_) => match cairn::to_vec(value) {
                Ok(items) => self.helper("list", &items, out),
                Err(_) => out.push_str("undefined"),
            },
            Value::Dict(d) => {
                let flat: Vec<Value> = d
                    .iter()
                    .flat_map(|(k, v)| [k.clone(), v.clone()])
                    .collect();
                self.helper("dict", &flat, out);
            }
            Value::Set(s) => {
                let items: Vec<Value> = s.iter().cloned().collect();
                self.helper("set", &items, out);
            }
            // no source form; possibly infinite or host-only
            other => {
                let _ = write!(out, "undefined /* {} */", other.type_name());
            }
        }
    }
}

impl Printer for JsPrinter {
    fn print(&self, program: &Program) -> String {
        self.print_expr(&program.unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use cairn::{ModuleRegistry, read_string};
    use cairn_compiler::{Analyzer, CodeGen, CompilerOptions};

    fn print(registry: &ModuleRegistry, code: &str) -> String {
        let form = read_string(code).unwrap().unwrap();
        let node = Analyzer::new(registry, &CompilerOptions::default())
            .analyze(&form)
            .unwrap();
        JsPrinter::new().print_expr(&CodeGen::new(registry).emit(&node).unwrap())
    }

    #[test]
    fn test_munge() {
        assert_eq!(munge("empty?"), "empty$QMARK");
        assert_eq!(munge("set-field!"), "set_field$BANG");
        assert_eq!(munge("->x"), "_$GTx");
        assert_eq!(munge("this"), "this$");
        assert_eq!(munge("plain"), "plain");
        assert_eq!(munge("2nd"), "$2nd");
    }

    #[test]
    fn test_munge_keeps_distinct_names_apart() {
        let names = [
            "a-b", "a_b", "a$_b", "a--b", "a__b", "empty?", "empty-QMARK", "empty_QMARK",
            "this", "this$", "-1a", "1a", "x\u{e9}", "x\u{2603}", "x-u2603-",
        ];
        let munged: std::collections::HashSet<String> = names.iter().map(|n| munge(n)).collect();
        assert_eq!(munged.len(), names.len(), "{munged:?}");
        assert_eq!(munge("a-b"), "a_b");
        assert_eq!(munge("a_b"), "a$_b");
    }

    #[test]
    fn test_var_reference() {
        let registry = ModuleRegistry::new();
        registry.intern("localpkg", "user", "x", None, None).unwrap();
        assert_eq!(
            print(&registry, "x"),
            r#"$cairn.packages["localpkg"].modules["user"].vars["x"].value"#
        );
    }

    #[test]
    fn test_function_and_call() {
        let registry = ModuleRegistry::new();
        assert_eq!(
            print(&registry, "(fn add [a b & more] (+ a b))"),
            "function add(a, b, ...more) { return (a + b); }"
        );
        assert_eq!(
            print(&registry, "((fn [] 1))"),
            "(function() { return 1; })()"
        );
    }

    #[test]
    fn test_literals() {
        let registry = ModuleRegistry::new();
        assert_eq!(print(&registry, ":k"), r#"$cairn.keyword("k")"#);
        assert_eq!(print(&registry, "'(a 1)"), r#"$cairn.list($cairn.symbol("a"), 1)"#);
        assert_eq!(print(&registry, "\"a\\\"b\\n\""), r#""a\"b\n""#);
        assert_eq!(print(&registry, "[1 nil true]"), "[1, null, true]");
        assert_eq!(print(&registry, "{:a 1}"), r#"$cairn.dict($cairn.keyword("a"), 1)"#);
    }

    #[test]
    fn test_program_is_an_async_unit() {
        let program = Program::wrap(Expr::Literal(Value::from(1)));
        assert_eq!(
            JsPrinter::new().print(&program),
            "(async function() { return 1; })()"
        );
    }

    #[test]
    fn test_host_interop() {
        let registry = ModuleRegistry::new();
        assert_eq!(print(&registry, "(.floor js:Math 1.5)"), "Math.floor(1.5)");
        assert_eq!(print(&registry, "(.-length \"abc\")"), r#""abc".length"#);
        assert_eq!(
            print(&registry, "(if 1 2)"),
            "($cairn.truthy(1) ? 2 : null)"
        );
    }
}
