//! rjoy — an interpreter for a Joy-family concatenative language.
//!
//! Programs are sequences of terms transforming an implicit operand stack;
//! quotations (bracketed programs) are first-class values consumed by
//! combinators:
//!
//! ```text
//! [3 2 4] [dup +] map .        # prints [6 4 8]
//! 5 [0 >] [dup *] [neg] ifte . # prints 25
//! DEFINE sq == dup * .
//! ```
//!
//! The crate is organised as a pipeline: [`lexer`] turns a source string
//! into a column-tagged token stream, [`parser`] installs DEFINE/HIDE/
//! MODULE definitions into a [`machine::Machine`] and returns the residual
//! program, and the machine evaluates it term by term against the operand
//! stack. All named operators live in the [`ops`] registry.
//!
//! ## Modules
//!
//! - `value`: the tagged [`value::Value`] type and its print forms
//! - `lexer`: tokenization with comments, escapes and reserved words
//! - `parser`: definition blocks and lexical scoping by name-mangling
//! - `machine`: the operand stack, dictionary, evaluator and source loader
//! - `ops`: the builtin operator registry

use std::fmt;

/// Runtime or parse failure: a printable message plus the 1-based source
/// column when one is known. Any layer raises it; evaluation unwinds to
/// the nearest recovery boundary and the machine stays usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub message: String,
    pub column: Option<usize>,
}

impl Error {
    pub fn new(message: impl Into<String>) -> Self {
        Error {
            message: message.into(),
            column: None,
        }
    }

    /// Error tagged with a source column (parse errors, set literals).
    pub fn at(column: usize, message: impl Into<String>) -> Self {
        Error {
            message: message.into(),
            column: Some(column),
        }
    }

    pub(crate) fn underflow(op: &str, expected: usize, got: usize) -> Self {
        Error::new(format!("{op}: expected {expected} parameters, got {got}"))
    }

    /// Type mismatch in the uniform `NAME: <type> expected` form.
    pub(crate) fn expected(op: &str, what: &str) -> Self {
        Error::new(format!("{op}: {what} expected"))
    }

    pub(crate) fn undefined(name: &str) -> Self {
        Error::new(format!("undefined: {name}"))
    }

    pub(crate) fn div_by_zero(op: &str) -> Self {
        Error::new(format!("{op}: division by zero"))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::new(format!("io error: {err}"))
    }
}

pub mod lexer;
pub mod machine;
pub mod ops;
pub mod parser;
pub mod value;
