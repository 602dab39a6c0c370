//! Sandboxed expression language for filters, labels, ids and colors
//!
//! Expressions are a small JavaScript-like subset evaluated against a single
//! [`Record`]. The record's fields are in scope as bare identifiers; nothing
//! else is reachable, and evaluation never writes to the record.
//!
//! # Syntax
//!
//! ```text
//! literals        42  0x1F  1.5e3  'text'  "text"  true  false  null  undefined  [1, 2]
//! fields          log message tags time line title body id filename payload
//! members         payload.id  payload['id']  tags.positional[0]  payload?.params?.uri
//! operators       ! - + typeof  * / %  + -  < <= > >=  == != === !==  && || ??  a ? b : c
//! arrows          payload.items.some(x => x.done)   (only as method arguments)
//! namespaces      Math.*  JSON.stringify/parse  Array.isArray/from/of  Object.keys/values/entries
//! conversions     String(x)  Number(x)  Boolean(x)
//! ```
//!
//! Assignment, blocks, statements and template strings are rejected.
//!
//! # Examples
//!
//! ```text
//! title == 'hello'
//! log == 'server' && time.getUTCHours() >= 9
//! payload?.params?.textDocument?.uri.endsWith('.ts')
//! tags.kind == 'ERROR' || message.includes('panic')
//! ```

mod builtins;
mod error;
mod eval;
mod lexer;
mod parser;

pub use error::ExprError;

use crate::parser::Record;
use crate::value::Value;
use eval::Interpreter;
use parser::Expr;

/// An expression compiled once and evaluated against many records.
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    source: String,
    /// `Ok(None)` for a blank source.
    program: Result<Option<Expr>, ExprError>,
}

/// Compiles `source`. Never fails: a compile error is kept and returned by
/// every later evaluation.
pub fn compile(source: &str) -> CompiledExpression {
    let program = if source.trim().is_empty() {
        Ok(None)
    } else {
        lexer::tokenize(source).and_then(parser::parse).map(Some)
    };
    if let Err(err) = &program {
        log::debug!("expression {source:?} failed to compile: {err}");
    }
    CompiledExpression {
        source: source.to_string(),
        program,
    }
}

impl CompiledExpression {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_blank(&self) -> bool {
        matches!(self.program, Ok(None))
    }

    pub fn compile_error(&self) -> Option<&ExprError> {
        self.program.as_ref().err()
    }

    /// Evaluates against `record`. A blank expression yields `undefined`.
    pub fn eval(&self, record: &Record) -> Result<Value, ExprError> {
        match &self.program {
            Err(err) => Err(err.clone()),
            Ok(None) => Ok(Value::Undefined),
            Ok(Some(expr)) => Interpreter::new(record).eval(expr),
        }
    }

    /// Evaluates and coerces the result to a boolean.
    pub fn test(&self, record: &Record) -> Result<bool, ExprError> {
        self.eval(record).map(|value| value.is_truthy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_message;

    fn record(lines: &[&str]) -> Record {
        parse_message("client", None, lines).unwrap()
    }

    fn eval(source: &str, record: &Record) -> Value {
        compile(source).eval(record).unwrap()
    }

    #[test]
    fn blank_source_is_undefined() {
        let r = record(&["[t] hello"]);
        assert_eq!(eval("   ", &r), Value::Undefined);
        assert!(compile("").is_blank());
    }

    #[test]
    fn fields_are_in_scope() {
        let r = record(&["[INFO] hello: world"]);
        assert_eq!(eval("title", &r), Value::from("hello"));
        assert_eq!(eval("tags.kind", &r), Value::from("INFO"));
        assert_eq!(eval("body.toUpperCase()", &r), Value::from("WORLD"));
    }

    #[test]
    fn compile_errors_are_raised_on_every_eval() {
        let compiled = compile("title ==");
        assert!(compiled.compile_error().is_some());
        let r = record(&["[t] x"]);
        assert!(compiled.eval(&r).is_err());
        assert!(compiled.eval(&r).is_err());
    }

    #[test]
    fn unknown_identifiers_do_not_compile() {
        let err = compile("window.location").compile_error().cloned();
        assert_eq!(err, Some(ExprError::UnknownIdentifier("window".to_string())));
    }

    #[test]
    fn optional_chain_short_circuits() {
        let r = record(&["[t] no payload here"]);
        assert_eq!(eval("payload?.params.uri", &r), Value::Undefined);
        assert!(compile("payload.params").eval(&r).is_err());
    }

    #[test]
    fn arrow_functions_see_their_parameters() {
        let r = record(&["[t] items: [1, 2, 3]"]);
        assert_eq!(
            eval("payload.map((x, i) => x * 10 + i)", &r),
            Value::Array(vec![
                Value::from(10.0),
                Value::from(21.0),
                Value::from(32.0)
            ])
        );
        assert_eq!(eval("payload.some(x => x > 2)", &r), Value::Bool(true));
    }
}
