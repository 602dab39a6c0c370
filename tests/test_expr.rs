use log_sea::expr::{ExprError, compile};
use log_sea::parser::{Record, parse_message};
use log_sea::value::Value;

fn record() -> Record {
    parse_message(
        "client",
        None,
        &[
            "[INFO 2021-11-12 06:53:11.230] [req#7] hello: world {id: 42, tags: ['a', 'b'], nested: {deep: null}}",
        ],
    )
    .unwrap()
}

fn eval(source: &str) -> Value {
    compile(source)
        .eval(&record())
        .unwrap_or_else(|err| panic!("{source:?} failed: {err}"))
}

fn eval_err(source: &str) -> ExprError {
    compile(source)
        .eval(&record())
        .expect_err("expression should fail")
}

#[test]
fn test_field_access_and_comparison() {
    assert_eq!(eval("title == 'hello'"), Value::Bool(true));
    assert_eq!(eval("log"), Value::from("client"));
    assert_eq!(eval("payload.id === 42"), Value::Bool(true));
    assert_eq!(eval("payload['tags'][1]"), Value::from("b"));
    assert_eq!(eval("tags.req"), Value::from("req#7"));
    assert_eq!(eval("id"), Value::from("req#7"));
}

#[test]
fn test_loose_and_strict_equality() {
    assert_eq!(eval("payload.id == '42'"), Value::Bool(true));
    assert_eq!(eval("payload.id === '42'"), Value::Bool(false));
    assert_eq!(eval("filename == null"), Value::Bool(true));
    assert_eq!(eval("filename == undefined"), Value::Bool(true));
    assert_eq!(eval("filename === undefined"), Value::Bool(false));
}

#[test]
fn test_optional_chaining_and_nullish_coalescing() {
    assert_eq!(eval("payload.nested.deep?.value"), Value::Undefined);
    assert_eq!(eval("payload.missing?.a.b.c"), Value::Undefined);
    assert_eq!(eval("payload.nested.deep ?? 'fallback'"), Value::from("fallback"));
    assert_eq!(eval("payload.id ?? 'fallback'"), Value::from(42.0));
    assert_eq!(eval("filename || title"), Value::from("hello"));
}

#[test]
fn test_reading_through_null_is_a_runtime_error() {
    let err = eval_err("payload.nested.deep.value");
    assert!(!err.is_compile_error());
    assert!(err.to_string().contains("reading 'value'"), "{err}");
}

#[test]
fn test_arithmetic_and_string_concatenation() {
    assert_eq!(eval("payload.id / 2 + 1"), Value::from(22.0));
    assert_eq!(eval("title + ' ' + body.length"), Value::from("hello 54"));
    assert_eq!(eval("-payload.id % 5"), Value::from(-2.0));
    assert_eq!(eval("1 < 2 ? 'yes' : 'no'"), Value::from("yes"));
    assert_eq!(eval("typeof payload.tags"), Value::from("object"));
}

#[test]
fn test_time_is_a_date() {
    assert_eq!(eval("time.getUTCHours()"), Value::from(6.0));
    assert_eq!(eval("time.toISOString()"), Value::from("2021-11-12T06:53:11.230Z"));
    assert_eq!(eval("time > 0"), Value::Bool(true));
}

#[test]
fn test_string_methods() {
    assert_eq!(eval("title.toUpperCase().startsWith('HEL')"), Value::Bool(true));
    assert_eq!(eval("'a,b,c'.split(',').length"), Value::from(3.0));
    assert_eq!(eval("'  x '.trim()"), Value::from("x"));
    assert_eq!(eval("'abc'.slice(-2)"), Value::from("bc"));
    assert_eq!(eval("'7'.padStart(3, '0')"), Value::from("007"));
    assert_eq!(eval("'a-b-c'.replaceAll('-', '+')"), Value::from("a+b+c"));
    assert_eq!(eval("'req#17'.match('#(\\\\d+)')[1]"), Value::from("17"));
    assert_eq!(eval("'hello'.indexOf('l')"), Value::from(2.0));
    assert_eq!(eval("title.charAt(1)"), Value::from("e"));
    assert_eq!(eval("title.charAt(Infinity) == ''"), Value::Bool(true));
    assert_eq!(eval("title.charAt(-1)"), Value::from(""));
    assert_eq!(eval("title.charAt(Math.pow(10, 300))"), Value::from(""));
}

#[test]
fn test_array_methods_with_arrow_functions() {
    assert_eq!(
        eval("payload.tags.map(t => t.toUpperCase()).join('|')"),
        Value::from("A|B")
    );
    assert_eq!(eval("payload.tags.filter(t => t != 'a')"), Value::Array(vec![Value::from("b")]));
    assert_eq!(eval("payload.tags.findIndex(t => t == 'b')"), Value::from(1.0));
    assert_eq!(eval("payload.tags.includes('a')"), Value::Bool(true));
    assert_eq!(eval("[1, 2, 3].every(x => x > 0)"), Value::Bool(true));
    assert_eq!(
        eval("[[1, 2], [3]].map(xs => xs.map(x => x * 2))"),
        Value::Array(vec![
            Value::Array(vec![Value::from(2.0), Value::from(4.0)]),
            Value::Array(vec![Value::from(6.0)]),
        ])
    );
}

#[test]
fn test_namespaces_and_conversions() {
    assert_eq!(eval("Math.max(1, payload.id, 3)"), Value::from(42.0));
    assert_eq!(eval("Math.round(2.5)"), Value::from(3.0));
    assert_eq!(eval("JSON.stringify(payload.tags)"), Value::from("[\"a\",\"b\"]"));
    assert_eq!(eval("JSON.parse('{\"k\": 1}').k"), Value::from(1.0));
    assert_eq!(eval("Object.keys(payload).join()"), Value::from("id,nested,tags"));
    assert_eq!(eval("Array.isArray(payload.tags)"), Value::Bool(true));
    assert_eq!(eval("Number('0x10') + 1"), Value::from(17.0));
    assert_eq!(eval("String(payload.id).length"), Value::from(2.0));
    assert_eq!(eval("Boolean('')"), Value::Bool(false));
    assert_eq!(eval("(1.005).toFixed(1)"), Value::from("1.0"));
    assert_eq!(eval("String.fromCharCode(72, 105)"), Value::from("Hi"));
    assert_eq!(eval("String.fromCodePoint(128512)"), Value::from("\u{1F600}"));
    assert!(matches!(
        eval_err("String.fromCodePoint(-1)"),
        ExprError::Runtime(_)
    ));
    assert!(eval_err("String.raw('x')").to_string().contains("not a function"));
}

#[test]
fn test_sandbox_rejects_ambient_identifiers() {
    for source in [
        "window",
        "globalThis.process",
        "require('fs')",
        "this",
        "fetch('http://x')",
        "eval('1')",
        "Function('return 1')()",
    ] {
        let compiled = compile(source);
        let err = compiled
            .compile_error()
            .unwrap_or_else(|| panic!("{source:?} should not compile"));
        assert!(matches!(err, ExprError::UnknownIdentifier(_)), "{source:?}: {err}");
        assert_eq!(compiled.eval(&record()), Err(err.clone()));
    }
}

#[test]
fn test_sandbox_rejects_statements_and_assignment() {
    for source in ["title = 'x'", "a => a", "{}", "1; 2", "`${title}`", "title &= 1"] {
        let err = compile(source)
            .compile_error()
            .cloned()
            .unwrap_or_else(|| panic!("{source:?} should not compile"));
        assert!(err.is_compile_error(), "{source:?}: {err}");
    }
}

#[test]
fn test_no_escape_through_members() {
    assert!(eval_err("title.constructor('x')").to_string().contains("not a function"));
    assert_eq!(eval("title.constructor"), Value::Undefined);
    assert_eq!(eval("payload.__proto__"), Value::Undefined);
}

#[test]
fn test_evaluation_does_not_change_the_record() {
    let original = record();
    let copy = original.clone();
    for source in [
        "payload.tags.reverse()",
        "payload.tags.concat(['c'])",
        "Object.entries(payload)",
    ] {
        compile(source).eval(&copy).unwrap();
    }
    assert_eq!(copy, original);
}

#[test]
fn test_nesting_is_bounded() {
    let deep = format!("{}1{}", "(".repeat(500), ")".repeat(500));
    assert!(matches!(
        compile(&deep).compile_error(),
        Some(ExprError::TooDeep(_))
    ));
}

#[test]
fn test_long_operator_chains_are_bounded() {
    for source in [
        vec!["1"; 200_000].join("+"),
        vec!["true"; 200_000].join(" && "),
        vec!["title"; 200_000].join(" || "),
        format!("payload{}", ".a".repeat(200_000)),
        format!("title{}", ".trim()".repeat(200_000)),
    ] {
        let compiled = compile(&source);
        assert!(
            matches!(compiled.compile_error(), Some(ExprError::TooDeep(_))),
            "{}...",
            &source[..20]
        );
        assert!(matches!(compiled.eval(&record()), Err(ExprError::TooDeep(_))));
    }

    let short = vec!["1"; 30].join(" + ");
    assert_eq!(eval(&short), Value::from(30.0));
}
