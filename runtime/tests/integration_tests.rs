use cairn::{ErrorKind, Value};
use cairn_compiler::MemoryLoader;
use cairn_runtime::{compiler, new_compiler};

fn eval_str(input: &str) -> Result<Value, String> {
    let compiler = compiler().map_err(|e| e.to_string())?;
    compiler.eval_string(input).map_err(|e| e.to_string())
}

fn eval_display(input: &str) -> String {
    match eval_str(input) {
        Ok(value) => value.to_string(),
        Err(e) => panic!("{input}: {e}"),
    }
}

// ============================================================================
// Definitions and Redefinition
// ============================================================================

#[test]
fn test_def_then_use() {
    assert_eq!(eval_str("(def x 5) (+ x 2)").unwrap(), Value::from(7));
}

#[test]
fn test_def_returns_the_var() {
    let value = eval_str("(def x 5)").unwrap();
    assert!(matches!(value, Value::Var(_)), "{value}");
}

#[test]
fn test_redefinition_is_seen_by_earlier_functions() {
    let source = "
        (def x 5)
        (def f (fn [] x))
        (def x 10)
        (f)";
    assert_eq!(eval_str(source).unwrap(), Value::from(10));
}

#[test]
fn test_unknown_symbol_is_a_resolution_error() {
    let compiler = compiler().unwrap();
    let err = compiler.eval_string("(no-such-fn 1)").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Resolution);
}

#[test]
fn test_state_survives_between_calls() {
    let compiler = compiler().unwrap();
    compiler.eval_string("(defn add [a b] (+ a b))").unwrap();
    assert_eq!(compiler.eval_string("(add 2 3)").unwrap(), Value::from(5));
}

// ============================================================================
// Special Forms
// ============================================================================

#[test]
fn test_let_binds_sequentially() {
    assert_eq!(
        eval_str("(let [a 1 b (+ a 1)] (* a b 10))").unwrap(),
        Value::from(20)
    );
}

#[test]
fn test_do_returns_last() {
    assert_eq!(eval_str("(do 1 2 3)").unwrap(), Value::from(3));
    assert_eq!(eval_str("(do)").unwrap(), Value::Nil);
}

#[test]
fn test_if_truthiness() {
    assert_eq!(eval_str("(if 0 :yes :no)").unwrap(), Value::keyword("yes"));
    assert_eq!(eval_str("(if \"\" :yes :no)").unwrap(), Value::keyword("yes"));
    assert_eq!(eval_str("(if nil :yes :no)").unwrap(), Value::keyword("no"));
    assert_eq!(eval_str("(if false :yes)").unwrap(), Value::Nil);
}

#[test]
fn test_and_or_follow_lisp_truthiness() {
    assert_eq!(eval_str("(and 1 0 :last)").unwrap(), Value::keyword("last"));
    assert_eq!(eval_str("(and 1 nil 2)").unwrap(), Value::Nil);
    assert_eq!(eval_str("(or nil false 3)").unwrap(), Value::from(3));
    assert_eq!(eval_str("(and)").unwrap(), Value::Bool(true));
    assert_eq!(eval_str("(or)").unwrap(), Value::Nil);
}

#[test]
fn test_infix_arithmetic() {
    assert_eq!(eval_str("(+)").unwrap(), Value::from(0));
    assert_eq!(eval_str("(*)").unwrap(), Value::from(1));
    assert_eq!(eval_str("(- 5)").unwrap(), Value::from(-5));
    assert_eq!(eval_str("(- 10 3 2)").unwrap(), Value::from(5));
    assert_eq!(eval_str("(mod 7 3)").unwrap(), Value::from(1));
    assert_eq!(eval_str("(< 1 2)").unwrap(), Value::Bool(true));
    assert_eq!(eval_str("(+ \"a\" \"b\")").unwrap(), Value::from("ab"));
}

#[test]
fn test_quote_returns_form_unevaluated() {
    assert_eq!(eval_display("'(a b c)"), "(a b c)");
    assert_eq!(eval_display("(quote x)"), "x");
}

#[test]
fn test_named_fn_recursion() {
    let source = "
        (def fact (fn fact [n] (if (<= n 1) 1 (* n (fact (- n 1))))))
        (fact 10)";
    assert_eq!(eval_str(source).unwrap(), Value::from(3628800));
}

#[test]
fn test_rest_parameters_are_arrays() {
    assert_eq!(
        eval_str("((fn [a & more] (count more)) 1 2 3)").unwrap(),
        Value::from(2)
    );
    assert_eq!(eval_str("((fn [a & more] more) 1)").unwrap(), Value::array(vec![]));
}

#[test]
fn test_missing_arguments_are_nil() {
    assert_eq!(eval_str("((fn [a b] b) 1)").unwrap(), Value::Nil);
}

#[test]
fn test_collection_literals() {
    assert_eq!(eval_str("(count [1 2 3])").unwrap(), Value::from(3));
    assert_eq!(eval_str("(get {:a 1} :a)").unwrap(), Value::from(1));
    assert_eq!(eval_str("(:b {:a 1 :b 2})").unwrap(), Value::from(2));
    assert_eq!(eval_str("(contains? #{1 2} 2)").unwrap(), Value::Bool(true));
}

// ============================================================================
// Async
// ============================================================================

#[test]
fn test_top_level_await() {
    assert_eq!(eval_str("(await (promise 3))").unwrap(), Value::from(3));
    assert_eq!(eval_str("(+ 1 (await (promise 2)))").unwrap(), Value::from(3));
}

#[test]
fn test_fn_containing_await_returns_promise() {
    let compiler = compiler().unwrap();
    compiler
        .eval_string("(def slow (fn [x] (await (promise (* x 2)))))")
        .unwrap();
    let slow = compiler.eval_string("slow").unwrap();
    let pending = slow.call(&[Value::from(4)]).unwrap();
    assert!(matches!(pending, Value::Promise(_)), "{pending}");
    // a unit's pending result is waited on
    assert_eq!(compiler.eval_string("(slow 4)").unwrap(), Value::from(8));
    assert_eq!(compiler.eval_string("(await (slow 4))").unwrap(), Value::from(8));
}

#[test]
fn test_deferred_runs_when_awaited() {
    let compiler = compiler().unwrap();
    compiler.eval_string("(def p (deferred (fn [] :done)))").unwrap();
    // reading `p` through a unit would wait on it, so go through the var
    let var = compiler
        .registry()
        .find_module("localpkg", "user")
        .and_then(|m| m.find_var("p"))
        .unwrap();
    let promise = var.deref().unwrap();
    let Value::Promise(p) = &promise else {
        panic!("expected a promise, got {promise}");
    };
    assert!(!p.is_settled());
    assert_eq!(compiler.eval_string("(await p)").unwrap(), Value::keyword("done"));
    assert!(p.is_settled());
}

// ============================================================================
// Modules
// ============================================================================

#[test]
fn test_alias_resolves_to_same_var() {
    let loader = MemoryLoader::new().with("lib", "strings", "(def shout \"HEY\")");
    let compiler = new_compiler(Box::new(loader)).unwrap();
    compiler
        .eval_string("(module app:main (:import [s lib:strings]))")
        .unwrap();
    let via_alias = compiler.eval_string("s:shout").unwrap();
    let via_full = compiler.eval_string("lib:strings:shout").unwrap();
    assert_eq!(via_alias, Value::from("HEY"));
    assert_eq!(via_alias, via_full);
}

#[test]
fn test_modules_see_standard_library() {
    let loader = MemoryLoader::new().with("lib", "math", "(defn twice [x] (* 2 x))");
    let compiler = new_compiler(Box::new(loader)).unwrap();
    compiler
        .eval_string("(module app:main (:import lib:math))")
        .unwrap();
    assert_eq!(compiler.eval_string("(math:twice 21)").unwrap(), Value::from(42));
}

#[test]
fn test_current_module_native() {
    assert_eq!(eval_display("(current-module)"), "localpkg:user");
}

// ============================================================================
// Host Interop
// ============================================================================

#[test]
fn test_host_namespace() {
    assert_eq!(eval_str("(.floor js:Math 2.5)").unwrap(), Value::from(2));
    assert_eq!(eval_str("(.toUpperCase \"abc\")").unwrap(), Value::from("ABC"));
    assert_eq!(eval_str("(.-length \"abcd\")").unwrap(), Value::from(4));
}

#[test]
fn test_compile_to_string_prints_target_code() {
    let compiler = compiler().unwrap();
    let form = cairn::read_string("(def x 1)").unwrap().unwrap();
    let code = compiler.compile_to_string(&form).unwrap();
    assert!(code.contains("$cairn.intern(\"localpkg\", \"user\", \"x\""), "{code}");
}
