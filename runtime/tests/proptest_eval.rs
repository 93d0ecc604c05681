use cairn::Value;
use cairn_runtime::compiler;
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn small_i64() -> impl Strategy<Value = i64> {
    -1_000_000i64..1_000_000i64
}

/// Symbol-safe identifier
fn ident() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,8}".prop_filter("not a special name", |s| {
        !cairn_compiler::is_special_form(s)
            && !["undefined", "nil", "true", "false", "reader"].contains(&s.as_str())
    })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_infix_add_matches_native(a in small_i64(), b in small_i64()) {
        let compiler = compiler().unwrap();
        let infix = compiler.eval_string(&format!("(+ {a} {b})")).unwrap();
        let native = compiler.eval_string(&format!("(apply + [{a} {b}])")).unwrap();
        prop_assert_eq!(&infix, &Value::from(a + b));
        prop_assert_eq!(infix, native);
    }

    #[test]
    fn prop_latest_definition_wins(name in ident(), first in small_i64(), second in small_i64()) {
        let compiler = compiler().unwrap();
        let source = format!(
            "(def {name} {first}) (def reader (fn [] {name})) (def {name} {second}) (reader)"
        );
        prop_assert_eq!(compiler.eval_string(&source).unwrap(), Value::from(second));
    }

    #[test]
    fn prop_let_shadows_definitions(name in ident(), outer in small_i64(), inner in small_i64()) {
        let compiler = compiler().unwrap();
        let source = format!("(def {name} {outer}) (let [{name} {inner}] {name})");
        prop_assert_eq!(compiler.eval_string(&source).unwrap(), Value::from(inner));
    }

    #[test]
    fn prop_count_of_range(n in 0usize..200) {
        let compiler = compiler().unwrap();
        let value = compiler.eval_string(&format!("(count (range {n}))")).unwrap();
        prop_assert_eq!(value, Value::from(n as i64));
    }
}
