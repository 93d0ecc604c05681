//! Integration tests for the reader.

use cairn::{ErrorKind, Reader, Value, read_all, read_string, span_of};

fn read(code: &str) -> Value {
    match read_string(code) {
        Ok(Some(v)) => v,
        other => panic!("Expected a form from: {code}, got {other:?}"),
    }
}

fn reread(code: &str) -> Value {
    read(&read(code).to_string())
}

// ============================================================================
// Literals
// ============================================================================

#[test]
fn test_numbers() {
    assert_eq!(read("42"), Value::from(42));
    assert_eq!(read("-7"), Value::from(-7));
    assert_eq!(read("0x1F"), Value::from(31));
    assert_eq!(read("2r1010"), Value::from(10));
    assert_eq!(read("36rZ"), Value::from(35));
    assert_eq!(read("1.5"), Value::from(1.5));
}

#[test]
fn test_big_integers() {
    let v = read("123456789012345678901234567890");
    assert_eq!(v.to_string(), "123456789012345678901234567890N");
    assert_eq!(reread("123456789012345678901234567890"), v);
}

#[test]
fn test_string_escapes() {
    assert_eq!(read(r#""a\nb""#), Value::from("a\nb"));
    assert_eq!(read(r#""\u{1F600}""#), Value::from("\u{1F600}"));
    assert_eq!(read(r#""é""#), Value::from("é"));
    assert_eq!(read(r#""say \"hi\"""#), Value::from("say \"hi\""));
}

#[test]
fn test_percent_q_with_custom_delimiters() {
    assert_eq!(read("%q(a (b) c)"), Value::from("a (b) c"));
    assert_eq!(read("%q|pipes|"), Value::from("pipes"));
}

#[test]
fn test_symbol_shapes() {
    let v = read("pkg:mod:name");
    let sym = v.as_symbol().unwrap();
    assert_eq!(sym.package(), Some("pkg"));
    assert_eq!(sym.module(), Some("mod"));
    assert_eq!(sym.name(), "name");

    assert_eq!(read_string("a:b:c:d").unwrap_err().kind, ErrorKind::Parse);
}

#[test]
fn test_line_comments() {
    let forms = read_all("; header\n(a) ; trailing\n; more\nb").unwrap();
    assert_eq!(forms.len(), 2);
}

// ============================================================================
// Round Trip
// ============================================================================

#[test]
fn test_round_trip_literals() {
    for code in [
        "42",
        "-3.25",
        "\"text with \\\"quotes\\\"\"",
        ":kw",
        ":rdf:type",
        "sym",
        "mod:sym",
        "(1 (2 3) [4 5])",
        "[]",
        "{:a 1, :b [2]}",
        "#{1 2 3}",
        "()",
    ] {
        assert_eq!(reread(code), read(code), "round trip of {code}");
    }
}

// ============================================================================
// Incremental Reading
// ============================================================================

#[test]
fn test_incomplete_then_complete() {
    let mut reader = Reader::new("(1 2");
    let err = reader.read().unwrap_err();
    assert_eq!(err.kind, ErrorKind::Incomplete);

    reader.feed(")");
    let form = reader.read().unwrap().unwrap();
    assert_eq!(form, Value::list(vec![Value::from(1), Value::from(2)]));
    assert!(reader.read().unwrap().is_none());
}

#[test]
fn test_unterminated_string_is_incomplete() {
    let err = read_string("\"abc").unwrap_err();
    assert!(err.is_incomplete());
}

#[test]
fn test_incomplete_after_prefix() {
    assert!(read_string("'").unwrap_err().is_incomplete());
    assert!(read_string("^:k").unwrap_err().is_incomplete());
}

#[test]
fn test_forms_before_incomplete_survive() {
    let mut reader = Reader::new("(a) (b");
    assert!(reader.read().unwrap().is_some());
    assert!(reader.read().unwrap_err().is_incomplete());
    reader.feed(" c)");
    assert_eq!(reader.read().unwrap().unwrap().to_string(), "(b c)");
}

// ============================================================================
// Metadata
// ============================================================================

#[test]
fn test_position_metadata_on_nested_forms() {
    let form = read("(a\n  [b c])");
    let outer = span_of(&form).unwrap();
    assert_eq!((outer.line, outer.col), (1, 1));

    let items = cairn::to_vec(&form).unwrap();
    let inner = span_of(&items[1]).unwrap();
    assert_eq!((inner.line, inner.col), (2, 3));
    assert_eq!((inner.start, inner.end), (5, 10));
}

#[test]
fn test_metadata_does_not_affect_equality() {
    assert_eq!(read("^:tagged [1 2]"), read("[1 2]"));
}

#[test]
fn test_metadata_map_merges() {
    let v = read("^{:a 1} ^:b (x)");
    let meta = v.meta().unwrap();
    assert!(meta.get_builtin(&Value::keyword("a")).is_some());
    assert!(meta.get_builtin(&Value::keyword("b")).is_some());
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_error_positions() {
    let err = read_string("(a\n  b ]").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Parse);
    let span = err.span.unwrap();
    assert_eq!(span.line, 1);
}

#[test]
fn test_duplicate_map_key() {
    assert_eq!(read_string("{:a 1 :a 2}").unwrap_err().kind, ErrorKind::Parse);
}
