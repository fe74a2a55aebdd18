// Copyright contributors to the openqasm-unroller project
// SPDX-License-Identifier: Apache-2.0

// All failures produced by validation, unrolling and rebasing funnel through
// `Error`, a single type with a kind tag. The kinds mirror the categories of
// problems a QASM program can have; they are not a deep hierarchy.

use std::fmt;

use oq3_syntax::TextRange;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Line endings, version string, parse failures.
    Syntax,
    /// Unresolved variable, gate or subroutine name.
    Undefined,
    /// Width mismatch, invalid cast, unassignable value.
    Type,
    /// Array or register index out of range, bad loop bound.
    Range,
    /// Wrong number of gate parameters, qubits or subroutine arguments.
    Arity,
    /// Repeated qubit in one call, redeclaration of a name.
    Duplicate,
    /// Construct that cannot be unrolled (dynamic while, bad modifier, ...).
    Unsupported,
    /// Unresolved or cyclic include.
    Include,
    /// Basis rebase failure.
    Rebase,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Syntax => "syntax error",
            ErrorKind::Undefined => "undefined identifier",
            ErrorKind::Type => "type error",
            ErrorKind::Range => "range error",
            ErrorKind::Arity => "arity error",
            ErrorKind::Duplicate => "duplicate error",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::Include => "include error",
            ErrorKind::Rebase => "rebase error",
        };
        f.write_str(name)
    }
}

/// The single error type of the crate. `span` is a byte range into the
/// original source text when the failing construct is known.
#[derive(Clone, Debug, Error)]
#[error("{}", render(.kind, .message, .cause))]
pub struct Error {
    kind: ErrorKind,
    message: String,
    span: Option<TextRange>,
    #[source]
    cause: Option<Box<Error>>,
}

impl Error {
    pub fn new<T: ToString>(kind: ErrorKind, message: T) -> Error {
        Error {
            kind,
            message: message.to_string(),
            span: None,
            cause: None,
        }
    }

    pub fn with_span<T: ToString>(kind: ErrorKind, message: T, span: Option<TextRange>) -> Error {
        Error {
            kind,
            message: message.to_string(),
            span,
            cause: None,
        }
    }

    pub fn caused_by(mut self, cause: Error) -> Error {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn span(&self) -> Option<TextRange> {
        self.span
    }

    pub fn cause(&self) -> Option<&Error> {
        self.cause.as_deref()
    }

    /// Compute 1-based (line, column) of the error location in `source`.
    pub fn line_col(&self, source: &str) -> Option<(usize, usize)> {
        let range = self.span?;
        let offset: usize = range.start().into();
        Some(offset_to_line_col(source, offset))
    }
}

/// 1-based (line, column) of a byte offset.
pub fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let clamped = offset.min(source.len());
    let upto = &source[..clamped];
    let line = upto.bytes().filter(|b| *b == b'\n').count() + 1;
    let column = upto.rfind('\n').map_or(clamped + 1, |pos| clamped - pos);
    (line, column)
}

/// Cause chains are hidden unless `OQ3_EXPAND_TRACEBACK` is set.
fn expand_traceback() -> bool {
    std::env::var_os("OQ3_EXPAND_TRACEBACK").is_some_and(|v| !v.is_empty() && v != "0")
}

fn render(kind: &ErrorKind, message: &str, cause: &Option<Box<Error>>) -> String {
    let mut out = format!("{kind}: {message}");
    if expand_traceback() {
        let mut next = cause.as_deref();
        while let Some(err) = next {
            out.push_str(&format!("\n  caused by: {}: {}", err.kind, err.message));
            next = err.cause.as_deref();
        }
    }
    out
}

macro_rules! error_constructor {
    ($func:ident, $kind:ident) => {
        pub fn $func<T: ToString>(message: T, span: Option<TextRange>) -> Error {
            Error::with_span(ErrorKind::$kind, message, span)
        }
    };
}

impl Error {
    error_constructor!(syntax, Syntax);
    error_constructor!(undefined, Undefined);
    error_constructor!(type_error, Type);
    error_constructor!(range, Range);
    error_constructor!(arity, Arity);
    error_constructor!(duplicate, Duplicate);
    error_constructor!(unsupported, Unsupported);
    error_constructor!(include, Include);
    error_constructor!(rebase, Rebase);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col() {
        let source = "OPENQASM 3.0;\nqubit q;\n";
        assert_eq!(offset_to_line_col(source, 0), (1, 1));
        assert_eq!(offset_to_line_col(source, 14), (2, 1));
        assert_eq!(offset_to_line_col(source, 20), (2, 7));
    }

    #[test]
    fn test_display_without_traceback() {
        let err = Error::new(ErrorKind::Undefined, "no variable 'x'");
        assert_eq!(err.to_string(), "undefined identifier: no variable 'x'");
    }
}
