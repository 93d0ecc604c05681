use cairn::{Value, read_string};
use cairn_runtime::compiler;

fn eval_multi(inputs: &[&str]) -> Value {
    let compiler = compiler().unwrap();
    let mut result = Value::Nil;
    for input in inputs {
        result = compiler
            .eval_string(input)
            .unwrap_or_else(|e| panic!("{input}: {e}"));
    }
    result
}

#[test]
fn test_macro_expansion_is_transparent() {
    let compiler = compiler().unwrap();
    compiler
        .eval_string("(defmacro m [x] (list 'quote x))")
        .unwrap();
    let expanded = compiler
        .analyze(&read_string("(m (1 2))").unwrap().unwrap())
        .unwrap();
    let direct = compiler
        .analyze(&read_string("(quote (1 2))").unwrap().unwrap())
        .unwrap();
    assert_eq!(expanded.kind, direct.kind);
}

#[test]
fn test_macro_defined_then_used_in_same_source() {
    let result = eval_multi(&["(defmacro unless [t & body] `(if ~t nil (do ~@body))) (unless false 1 2)"]);
    assert_eq!(result, Value::from(2));
}

#[test]
fn test_syntax_quote_qualifies_symbols() {
    let result = eval_multi(&["(def helper 1)", "`(helper inc local)"]);
    assert_eq!(
        result.to_string(),
        "(localpkg:user:helper cairn:lang:inc localpkg:user:local)"
    );
}

#[test]
fn test_auto_gensyms_do_not_capture() {
    let result = eval_multi(&[
        "(defmacro twice [x] `(let [v# ~x] (+ v# v#)))",
        "(let [v 3] (twice v))",
    ]);
    assert_eq!(result, Value::from(6));
}

#[test]
fn test_unquote_splice_of_nil() {
    assert_eq!(eval_multi(&["`(1 ~@nil 2)"]).to_string(), "(1 2)");
}

#[test]
fn test_runaway_expansion_is_an_error() {
    let compiler = compiler().unwrap();
    compiler.eval_string("(defmacro loop-forever [] '(loop-forever))").unwrap();
    let err = compiler.eval_string("(loop-forever)").unwrap_err();
    assert_eq!(err.kind, cairn::ErrorKind::Syntax);
}

// ============================================================================
// Prelude
// ============================================================================

#[test]
fn test_defn_with_docstring() {
    let compiler = compiler().unwrap();
    compiler
        .eval_string("(defn add \"Adds two numbers\" [a b] (+ a b))")
        .unwrap();
    assert_eq!(compiler.eval_string("(add 2 3)").unwrap(), Value::from(5));
    let var = compiler
        .registry()
        .find_module("localpkg", "user")
        .and_then(|m| m.find_var("add"))
        .unwrap();
    let doc = var
        .meta()
        .and_then(|m| m.get(&Value::keyword("doc")).ok().flatten());
    assert_eq!(doc, Some(Value::from("Adds two numbers")));
}

#[test]
fn test_when_and_cond() {
    assert_eq!(eval_multi(&["(when true 1 2)"]), Value::from(2));
    assert_eq!(eval_multi(&["(when-not true 1)"]), Value::Nil);
    assert_eq!(
        eval_multi(&["(cond false :a (= 1 1) :b :else :c)"]),
        Value::keyword("b")
    );
    assert_eq!(eval_multi(&["(cond false :a)"]), Value::Nil);
}

#[test]
fn test_threading_macro() {
    assert_eq!(eval_multi(&["(-> 1 inc (+ 10))"]), Value::from(12));
}

#[test]
fn test_lazy_seq_macro() {
    let result = eval_multi(&[
        "(defn nums [n] (lazy-seq (cons n (nums (inc n)))))",
        "(nth (nums 0) 5)",
    ]);
    assert_eq!(result, Value::from(5));
}

#[test]
fn test_macro_expanding_to_lazy_seq_is_a_call() {
    let compiler = compiler().unwrap();
    compiler
        .eval_string("(defmacro add-later [a b] (lazy-seq* (fn [] (list '+ a b))))")
        .unwrap();
    assert_eq!(compiler.eval_string("(add-later 1 2)").unwrap(), Value::from(3));
    let expanded = compiler
        .analyze(&read_string("(add-later 1 2)").unwrap().unwrap())
        .unwrap();
    let direct = compiler
        .analyze(&read_string("(+ 1 2)").unwrap().unwrap())
        .unwrap();
    assert_eq!(expanded.kind, direct.kind);
    compiler
        .eval_string("(defmacro nothing [] (lazy-seq* (fn [] nil)))")
        .unwrap();
    assert_eq!(compiler.eval_string("(nothing)").unwrap().to_string(), "()");
}
