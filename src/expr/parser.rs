use super::error::ExprError;
use super::lexer::{Spanned, Token};
use crate::parser::Field;
use crate::value::Value;

/// Deepest nesting of sub-expressions accepted.
pub const MAX_DEPTH: usize = 64;

/// Whitelisted utility namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Math,
    Json,
    Array,
    Object,
    /// Reached through the `String` conversion, as in `String.fromCharCode`.
    String,
}

impl Namespace {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "Math" => Some(Namespace::Math),
            "JSON" => Some(Namespace::Json),
            "Array" => Some(Namespace::Array),
            "Object" => Some(Namespace::Object),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Namespace::Math => "Math",
            Namespace::Json => "JSON",
            Namespace::Array => "Array",
            Namespace::Object => "Object",
            Namespace::String => "String",
        }
    }
}

/// `String(x)`, `Number(x)` and `Boolean(x)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    String,
    Number,
    Boolean,
}

impl Conversion {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "String" => Some(Conversion::String),
            "Number" => Some(Conversion::Number),
            "Boolean" => Some(Conversion::Boolean),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Conversion::String => "String",
            Conversion::Number => "Number",
            Conversion::Boolean => "Boolean",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    TypeOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Array(Vec<Expr>),
    Field(Field),
    /// Lambda parameter, by absolute slot on the interpreter's local stack.
    Local(usize),
    Namespace(Namespace),
    Conversion(Conversion),
    Member {
        object: Box<Expr>,
        property: Box<Expr>,
        optional: bool,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        optional: bool,
    },
    /// Single-expression arrow function. Only valid as a call argument.
    Lambda {
        arity: usize,
        body: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
}

pub fn parse(tokens: Vec<Spanned>) -> Result<Expr, ExprError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        locals: Vec::new(),
    };
    let expr = parser.conditional()?;
    match parser.peek() {
        None => Ok(expr),
        Some(_) => Err(parser.unexpected()),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
    /// Names of the lambda parameters in scope, outermost first.
    locals: Vec<String>,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|spanned| &spanned.token)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|spanned| &spanned.token)
    }

    fn column(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |spanned| spanned.column)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|spanned| spanned.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, punct: &str) -> bool {
        if matches!(self.peek(), Some(Token::Punct(p)) if *p == punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: &str) -> Result<(), ExprError> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(ExprError::syntax(self.column(), format!("expected '{punct}'")))
        }
    }

    fn unexpected(&self) -> ExprError {
        match self.tokens.get(self.pos) {
            Some(spanned) => {
                ExprError::syntax(spanned.column, format!("unexpected {}", describe(&spanned.token)))
            }
            None => ExprError::syntax(self.column(), "unexpected end of expression"),
        }
    }

    fn enter(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::TooDeep(MAX_DEPTH));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn conditional(&mut self) -> Result<Expr, ExprError> {
        self.enter()?;
        let test = self.logical_or()?;
        let expr = if self.eat("?") {
            let consequent = self.conditional()?;
            self.expect(":")?;
            let alternate = self.conditional()?;
            Expr::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            }
        } else {
            test
        };
        self.leave();
        Ok(expr)
    }

    fn logical_or(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.logical_and()?;
        let mut links = 0;
        loop {
            let op = if self.eat("||") {
                LogicalOp::Or
            } else if self.eat("??") {
                LogicalOp::Nullish
            } else {
                self.depth -= links;
                return Ok(left);
            };
            self.enter()?;
            links += 1;
            let right = self.logical_and()?;
            left = Expr::Logical {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn logical_and(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.equality()?;
        let mut links = 0;
        while self.eat("&&") {
            self.enter()?;
            links += 1;
            let right = self.equality()?;
            left = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.depth -= links;
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(
            &[
                ("===", BinaryOp::StrictEq),
                ("!==", BinaryOp::StrictNe),
                ("==", BinaryOp::Eq),
                ("!=", BinaryOp::Ne),
            ],
            Self::relational,
        )
    }

    fn relational(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(
            &[
                ("<=", BinaryOp::Le),
                (">=", BinaryOp::Ge),
                ("<", BinaryOp::Lt),
                (">", BinaryOp::Gt),
            ],
            Self::additive,
        )
    }

    fn additive(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(
            &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
            Self::multiplicative,
        )
    }

    fn multiplicative(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(
            &[
                ("*", BinaryOp::Mul),
                ("/", BinaryOp::Div),
                ("%", BinaryOp::Rem),
            ],
            Self::unary,
        )
    }

    fn binary_level(
        &mut self,
        ops: &[(&str, BinaryOp)],
        operand: fn(&mut Self) -> Result<Expr, ExprError>,
    ) -> Result<Expr, ExprError> {
        let mut left = operand(self)?;
        let mut links = 0;
        'outer: loop {
            for (punct, op) in ops {
                if self.eat(punct) {
                    self.enter()?;
                    links += 1;
                    let right = operand(self)?;
                    left = Expr::Binary {
                        op: *op,
                        left: Box::new(left),
                        right: Box::new(right),
                    };
                    continue 'outer;
                }
            }
            self.depth -= links;
            return Ok(left);
        }
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        let op = if self.eat("!") {
            Some(UnaryOp::Not)
        } else if self.eat("-") {
            Some(UnaryOp::Neg)
        } else if self.eat("+") {
            Some(UnaryOp::Plus)
        } else if matches!(self.peek(), Some(Token::Ident(name)) if name == "typeof") {
            self.pos += 1;
            Some(UnaryOp::TypeOf)
        } else {
            None
        };
        let Some(op) = op else {
            return self.postfix();
        };
        self.enter()?;
        let operand = self.unary()?;
        self.leave();
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn postfix(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.primary()?;
        let mut links = 0;
        loop {
            if matches!(self.peek(), Some(Token::Punct("." | "?." | "[" | "("))) {
                self.enter()?;
                links += 1;
            }
            if self.eat(".") {
                let name = self.property_name()?;
                expr = member(expr, Expr::Literal(Value::String(name)), false);
            } else if self.eat("?.") {
                if self.eat("[") {
                    let property = self.conditional()?;
                    self.expect("]")?;
                    expr = member(expr, property, true);
                } else if self.eat("(") {
                    let args = self.arguments()?;
                    expr = call(expr, args, true);
                } else {
                    let name = self.property_name()?;
                    expr = member(expr, Expr::Literal(Value::String(name)), true);
                }
            } else if self.eat("[") {
                let property = self.conditional()?;
                self.expect("]")?;
                expr = member(expr, property, false);
            } else if self.eat("(") {
                let args = self.arguments()?;
                expr = call(expr, args, false);
            } else {
                self.depth -= links;
                return Ok(expr);
            }
        }
    }

    fn property_name(&mut self) -> Result<String, ExprError> {
        match self.peek() {
            Some(Token::Ident(_)) => match self.next() {
                Some(Token::Ident(name)) => Ok(name),
                _ => Err(self.unexpected()),
            },
            _ => Err(ExprError::syntax(self.column(), "expected a property name")),
        }
    }

    /// Call arguments after the opening `(`. Arrow functions are only
    /// accepted here.
    fn arguments(&mut self) -> Result<Vec<Expr>, ExprError> {
        let mut args = Vec::new();
        if self.eat(")") {
            return Ok(args);
        }
        loop {
            let arg = match self.lambda_params() {
                Some(params) => self.lambda(params)?,
                None => self.conditional()?,
            };
            args.push(arg);
            if self.eat(")") {
                return Ok(args);
            }
            self.expect(",")?;
        }
    }

    /// Looks ahead for `x =>` or `(a, b) =>` without consuming anything.
    fn lambda_params(&self) -> Option<Vec<String>> {
        if let (Some(Token::Ident(name)), Some(Token::Punct("=>"))) = (self.peek(), self.peek_at(1)) {
            return Some(vec![name.clone()]);
        }
        if self.peek() != Some(&Token::Punct("(")) {
            return None;
        }
        let mut params = Vec::new();
        let mut offset = 1;
        if self.peek_at(offset) == Some(&Token::Punct(")")) {
            offset += 1;
        } else {
            loop {
                match self.peek_at(offset) {
                    Some(Token::Ident(name)) => params.push(name.clone()),
                    _ => return None,
                }
                offset += 1;
                match self.peek_at(offset) {
                    Some(Token::Punct(",")) => offset += 1,
                    Some(Token::Punct(")")) => {
                        offset += 1;
                        break;
                    }
                    _ => return None,
                }
            }
        }
        (self.peek_at(offset) == Some(&Token::Punct("=>"))).then_some(params)
    }

    fn lambda(&mut self, params: Vec<String>) -> Result<Expr, ExprError> {
        // Skip the parameter list and the arrow.
        while !matches!(self.next(), Some(Token::Punct("=>")) | None) {}
        let arity = params.len();
        self.locals.extend(params);
        let body = self.conditional();
        self.locals.truncate(self.locals.len() - arity);
        Ok(Expr::Lambda {
            arity,
            body: Box::new(body?),
        })
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        let column = self.column();
        let Some(token) = self.next() else {
            return Err(self.unexpected());
        };
        match token {
            Token::Number(n) => Ok(Expr::Literal(Value::Number(n))),
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::Punct("(") => {
                let expr = self.conditional()?;
                self.expect(")")?;
                Ok(expr)
            }
            Token::Punct("[") => {
                self.enter()?;
                let mut items = Vec::new();
                if !self.eat("]") {
                    loop {
                        items.push(self.conditional()?);
                        if self.eat("]") {
                            break;
                        }
                        self.expect(",")?;
                        if self.eat("]") {
                            break;
                        }
                    }
                }
                self.leave();
                Ok(Expr::Array(items))
            }
            Token::Ident(name) => self.identifier(name),
            Token::Punct("=>") => Err(ExprError::syntax(
                column,
                "arrow functions are only allowed as call arguments",
            )),
            other => Err(ExprError::syntax(column, format!("unexpected {}", describe(&other)))),
        }
    }

    fn identifier(&mut self, name: String) -> Result<Expr, ExprError> {
        if let Some(slot) = self.locals.iter().rposition(|local| *local == name) {
            return Ok(Expr::Local(slot));
        }
        let literal = match name.as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            "null" => Some(Value::Null),
            "undefined" => Some(Value::Undefined),
            "NaN" => Some(Value::Number(f64::NAN)),
            "Infinity" => Some(Value::Number(f64::INFINITY)),
            _ => None,
        };
        if let Some(value) = literal {
            return Ok(Expr::Literal(value));
        }
        if let Some(field) = Field::from_name(&name) {
            return Ok(Expr::Field(field));
        }
        if let Some(namespace) = Namespace::from_name(&name) {
            return Ok(Expr::Namespace(namespace));
        }
        if let Some(conversion) = Conversion::from_name(&name) {
            return Ok(Expr::Conversion(conversion));
        }
        Err(ExprError::UnknownIdentifier(name))
    }
}

fn member(object: Expr, property: Expr, optional: bool) -> Expr {
    Expr::Member {
        object: Box::new(object),
        property: Box::new(property),
        optional,
    }
}

fn call(callee: Expr, args: Vec<Expr>, optional: bool) -> Expr {
    Expr::Call {
        callee: Box::new(callee),
        args,
        optional,
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Number(n) => format!("number {n}"),
        Token::Str(s) => format!("string '{s}'"),
        Token::Ident(name) => format!("identifier '{name}'"),
        Token::Punct(p) => format!("'{p}'"),
    }
}
