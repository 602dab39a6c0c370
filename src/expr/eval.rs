use super::builtins::{self, Arg};
use super::error::ExprError;
use super::parser::{BinaryOp, Conversion, Expr, LogicalOp, Namespace, UnaryOp};
use crate::parser::Record;
use crate::value::Value;
use std::cmp::Ordering;

/// Walks an expression tree against one record.
///
/// The record is only ever read. Lambda arguments live on `locals` for the
/// duration of a single invocation.
pub struct Interpreter<'r> {
    record: &'r Record,
    locals: Vec<Value>,
}

impl<'r> Interpreter<'r> {
    pub fn new(record: &'r Record) -> Self {
        Self {
            record,
            locals: Vec::new(),
        }
    }

    pub fn eval(&mut self, expr: &Expr) -> Result<Value, ExprError> {
        Ok(self.eval_chain(expr)?.unwrap_or(Value::Undefined))
    }

    /// Runs a lambda body with `args` bound to its parameters. Missing
    /// arguments read as `undefined`, extra ones are dropped.
    pub fn invoke(&mut self, arity: usize, body: &Expr, args: &[Value]) -> Result<Value, ExprError> {
        let base = self.locals.len();
        self.locals
            .extend((0..arity).map(|i| args.get(i).cloned().unwrap_or_default()));
        let result = self.eval(body);
        self.locals.truncate(base);
        result
    }

    /// `None` means an optional link (`?.`) met null or undefined, which
    /// ends the whole chain.
    fn eval_chain(&mut self, expr: &Expr) -> Result<Option<Value>, ExprError> {
        match expr {
            Expr::Member {
                object,
                property,
                optional,
            } => {
                if let Some(namespace) = namespace_of(object) {
                    let name = self.eval(property)?.to_display_string();
                    return builtins::namespace_member(namespace, &name).map(Some);
                }
                let Some(target) = self.eval_chain(object)? else {
                    return Ok(None);
                };
                if *optional && target.is_nullish() {
                    return Ok(None);
                }
                let key = self.eval(property)?;
                get_member(&target, &key).map(Some)
            }
            Expr::Call {
                callee,
                args,
                optional,
            } => self.eval_call(callee, args, *optional),
            other => self.eval_value(other).map(Some),
        }
    }

    fn eval_call(
        &mut self,
        callee: &Expr,
        args: &[Expr],
        optional: bool,
    ) -> Result<Option<Value>, ExprError> {
        match callee {
            Expr::Member {
                object,
                property,
                optional: optional_member,
            } => {
                if let Some(namespace) = namespace_of(object) {
                    let name = self.eval(property)?.to_display_string();
                    let args = self.eval_args(args)?;
                    return builtins::call_namespace(self, namespace, &name, args).map(Some);
                }
                let Some(receiver) = self.eval_chain(object)? else {
                    return Ok(None);
                };
                if *optional_member && receiver.is_nullish() {
                    return Ok(None);
                }
                let name = self.eval(property)?.to_display_string();
                if receiver.is_nullish() {
                    return Err(read_of_nullish(&receiver, &name));
                }
                let args = self.eval_args(args)?;
                match builtins::call_method(self, receiver, &name, args) {
                    Err(ExprError::NotAFunction(_)) if optional => Ok(None),
                    result => result.map(Some),
                }
            }
            Expr::Conversion(conversion) => {
                let args = self.eval_args(args)?;
                Ok(Some(builtins::convert(*conversion, &args)))
            }
            other => {
                let Some(target) = self.eval_chain(other)? else {
                    return Ok(None);
                };
                if optional && target.is_nullish() {
                    return Ok(None);
                }
                Err(ExprError::NotAFunction(describe_callee(other)))
            }
        }
    }

    fn eval_args<'e>(&mut self, args: &'e [Expr]) -> Result<Vec<Arg<'e>>, ExprError> {
        args.iter()
            .map(|arg| match arg {
                Expr::Lambda { arity, body } => Ok(Arg::Lambda {
                    arity: *arity,
                    body: &**body,
                }),
                other => self.eval(other).map(Arg::Value),
            })
            .collect()
    }

    fn eval_value(&mut self, expr: &Expr) -> Result<Value, ExprError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Array(items) => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Expr::Field(field) => Ok(self.record.field(*field)),
            Expr::Local(slot) => Ok(self.locals.get(*slot).cloned().unwrap_or_default()),
            Expr::Namespace(namespace) => Err(ExprError::Type(format!(
                "{} can only be used to call its functions",
                namespace.name()
            ))),
            Expr::Conversion(conversion) => Err(ExprError::Type(format!(
                "{} can only be called",
                conversion.name()
            ))),
            Expr::Lambda { .. } => Err(ExprError::Runtime(
                "arrow functions can only be passed to methods".to_string(),
            )),
            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.is_truthy()),
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::TypeOf => Value::from(value.type_of()),
                })
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                Ok(binary(*op, &left, &right))
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left)?;
                let short_circuit = match op {
                    LogicalOp::And => !left.is_truthy(),
                    LogicalOp::Or => left.is_truthy(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(right)
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test)?.is_truthy() {
                    self.eval(consequent)
                } else {
                    self.eval(alternate)
                }
            }
            Expr::Member { .. } | Expr::Call { .. } => self.eval(expr),
        }
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add if is_textual(left) || is_textual(right) => Value::String(format!(
            "{}{}",
            left.to_display_string(),
            right.to_display_string()
        )),
        BinaryOp::Add => Value::Number(left.to_number() + right.to_number()),
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Lt => Value::Bool(left.compare(right) == Some(Ordering::Less)),
        BinaryOp::Le => Value::Bool(matches!(
            left.compare(right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Gt => Value::Bool(left.compare(right) == Some(Ordering::Greater)),
        BinaryOp::Ge => Value::Bool(matches!(
            left.compare(right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::Eq => Value::Bool(left.loose_eq(right)),
        BinaryOp::Ne => Value::Bool(!left.loose_eq(right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_eq(right)),
        BinaryOp::StrictNe => Value::Bool(!left.strict_eq(right)),
    }
}

fn is_textual(value: &Value) -> bool {
    matches!(
        value,
        Value::String(_) | Value::Date(_) | Value::Array(_) | Value::Object(_)
    )
}

/// Non-negative integral keys index into strings and arrays.
fn index_key(key: &Value) -> Option<usize> {
    match key {
        Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 => Some(*n as usize),
        Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
            s.parse().ok()
        }
        _ => None,
    }
}

fn get_member(target: &Value, key: &Value) -> Result<Value, ExprError> {
    let name = key.to_display_string();
    Ok(match target {
        Value::Undefined | Value::Null => return Err(read_of_nullish(target, &name)),
        Value::String(s) if name == "length" => Value::Number(s.chars().count() as f64),
        Value::String(s) => index_key(key)
            .and_then(|i| s.chars().nth(i))
            .map_or(Value::Undefined, |c| Value::String(c.to_string())),
        Value::Array(items) if name == "length" => Value::Number(items.len() as f64),
        Value::Array(items) => index_key(key)
            .and_then(|i| items.get(i).cloned())
            .unwrap_or_default(),
        Value::Object(members) => members.get(&name).cloned().unwrap_or_default(),
        Value::Bool(_) | Value::Number(_) | Value::Date(_) => Value::Undefined,
    })
}

fn read_of_nullish(target: &Value, name: &str) -> ExprError {
    ExprError::Type(format!(
        "cannot read properties of {} (reading '{name}')",
        target.to_display_string()
    ))
}

/// `String` doubles as a conversion and as the namespace of
/// `String.fromCharCode`.
fn namespace_of(expr: &Expr) -> Option<Namespace> {
    match expr {
        Expr::Namespace(namespace) => Some(*namespace),
        Expr::Conversion(Conversion::String) => Some(Namespace::String),
        _ => None,
    }
}

fn describe_callee(callee: &Expr) -> String {
    match callee {
        Expr::Field(field) => field.name().to_string(),
        Expr::Namespace(namespace) => namespace.name().to_string(),
        Expr::Literal(value) => value.to_display_string(),
        _ => "expression".to_string(),
    }
}
