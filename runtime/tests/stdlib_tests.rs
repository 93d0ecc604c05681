use cairn::Value;
use cairn_runtime::compiler;

fn eval_str(input: &str) -> Value {
    let compiler = compiler().unwrap();
    compiler
        .eval_string(input)
        .unwrap_or_else(|e| panic!("{input}: {e}"))
}

// ============================================================================
// Protocols and Types
// ============================================================================

const SHAPES: &str = "
    (defprotocol Shape
      (area [this])
      (scale [this factor]))
    (deftype Rect [w h])
    (extend-type Rect Shape
      (area [this] (* (.-w this) (.-h this)))
      (scale [this factor] (Rect (* factor (.-w this)) (* factor (.-h this)))))
";

#[test]
fn test_protocol_dispatch_on_user_type() {
    let source = format!("{SHAPES} (area (Rect 2 3))");
    assert_eq!(eval_str(&source), Value::from(6));
}

#[test]
fn test_protocol_method_with_arguments() {
    let source = format!("{SHAPES} (area (scale (new Rect 1 2) 3))");
    assert_eq!(eval_str(&source), Value::from(18));
}

#[test]
fn test_protocol_on_builtin_and_nil() {
    let source = format!(
        "{SHAPES}
         (extend-type (type \"\") Shape (area [s] (count s)) (scale [s n] s))
         (extend-type nil Shape (area [_] 0) (scale [_ n] nil))
         (array (area \"abcd\") (area nil))"
    );
    assert_eq!(
        eval_str(&source),
        Value::array(vec![Value::from(4), Value::from(0)])
    );
}

#[test]
fn test_satisfies() {
    let source = format!("{SHAPES} (array (satisfies? Shape (Rect 1 1)) (satisfies? Shape 42))");
    assert_eq!(
        eval_str(&source),
        Value::array(vec![Value::Bool(true), Value::Bool(false)])
    );
}

#[test]
fn test_unimplemented_protocol_method_is_an_error() {
    let compiler = compiler().unwrap();
    compiler.eval_string(SHAPES).unwrap();
    let err = compiler.eval_string("(area 42)").unwrap_err();
    assert!(err.message.contains("area"), "{}", err.message);
}

// ============================================================================
// Sequences and Collections
// ============================================================================

#[test]
fn test_sequence_functions() {
    assert_eq!(eval_str("(reduce + (map inc [1 2 3]))"), Value::from(9));
    assert_eq!(
        eval_str("(filter (fn [x] (> x 1)) '(1 2 3))").to_string(),
        "(2 3)"
    );
    assert_eq!(eval_str("(count (range 5))"), Value::from(5));
    assert_eq!(eval_str("(nth (range 0 100 10) 3)"), Value::from(30));
    assert_eq!(eval_str("(count (repeat 3 :x))"), Value::from(3));
    assert_eq!(eval_str("(first (range))"), Value::from(0));
    assert_eq!(eval_str("(empty? [])"), Value::Bool(true));
    assert_eq!(eval_str("(second '(1 2 3))"), Value::from(2));
}

#[test]
fn test_apply_and_concat() {
    assert_eq!(eval_str("(apply + 1 2 [3 4])"), Value::from(10));
    assert_eq!(eval_str("(concat [1] '(2) nil)").to_string(), "(1 2)");
}

#[test]
fn test_persistent_collections() {
    assert_eq!(eval_str("(get (assoc {} :a 1) :a)"), Value::from(1));
    assert_eq!(eval_str("(count (dissoc {:a 1 :b 2} :a))"), Value::from(1));
    assert_eq!(eval_str("(count (conj #{1 2} 2 3))"), Value::from(3));
    assert_eq!(eval_str("(contains? (disj #{1 2} 1) 1)"), Value::Bool(false));
    let source = "(def d {:a 1}) (def e (assoc d :b 2)) (array (count d) (count e))";
    assert_eq!(
        eval_str(source),
        Value::array(vec![Value::from(1), Value::from(2)])
    );
}

#[test]
fn test_equality() {
    assert_eq!(eval_str("(= [1 2] '(1 2))"), Value::Bool(true));
    assert_eq!(eval_str("(= {:a [1]} {:a '(1)})"), Value::Bool(true));
    assert_eq!(eval_str("(not= 1 2)"), Value::Bool(true));
    assert_eq!(eval_str("(identical? :a :a)"), Value::Bool(true));
}

// ============================================================================
// Names, Strings and Metadata
// ============================================================================

#[test]
fn test_strings_and_names() {
    assert_eq!(eval_str("(str \"a\" 1 nil :k)"), Value::from("a1:k"));
    assert_eq!(eval_str("(pr-str \"a\")"), Value::from("\"a\""));
    assert_eq!(eval_str("(name :foo)"), Value::from("foo"));
    assert_eq!(eval_str("(keyword \"foo\")"), Value::keyword("foo"));
    assert_eq!(eval_str("(symbol? (symbol \"m\" \"x\"))"), Value::Bool(true));
    assert_eq!(eval_str("(read-string \"(+ 1 2)\")").to_string(), "(+ 1 2)");
}

#[test]
fn test_metadata() {
    assert_eq!(
        eval_str("(get (meta (with-meta [1] {:tag :x})) :tag)"),
        Value::keyword("x")
    );
    assert_eq!(
        eval_str("(meta (vary-meta [1] assoc :k 1))").to_string(),
        "{:k 1}"
    );
    assert_eq!(eval_str("(= (with-meta [1] {:a 1}) [1])"), Value::Bool(true));
}

#[test]
fn test_gensym_is_fresh() {
    assert_eq!(eval_str("(= (gensym) (gensym))"), Value::Bool(false));
}
