use thiserror::Error;

/// Errors raised by a compiled expression.
///
/// Compile errors are captured by [`super::compile`] and re-raised each time
/// the expression is evaluated, so both classes surface at the same point.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("syntax error at column {column}: {message}")]
    Syntax { column: usize, message: String },

    #[error("{0} is not defined")]
    UnknownIdentifier(String),

    #[error("expression is nested more than {0} levels deep")]
    TooDeep(usize),

    #[error("type error: {0}")]
    Type(String),

    #[error("{0} is not a function")]
    NotAFunction(String),

    #[error("{0}")]
    Runtime(String),
}

impl ExprError {
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            ExprError::Syntax { .. } | ExprError::UnknownIdentifier(_) | ExprError::TooDeep(_)
        )
    }

    pub(crate) fn syntax(column: usize, message: impl Into<String>) -> Self {
        ExprError::Syntax {
            column,
            message: message.into(),
        }
    }
}
