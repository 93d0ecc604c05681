//! Error types for reading, resolution and dispatch.

use std::fmt;
use std::rc::Rc;

/// A source region, recorded by the reader and carried into the AST.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Span {
    /// Character offset where the form starts
    pub start: usize,
    /// Character offset just past the end of the form
    pub end: usize,
    /// 1-based line of the start offset
    pub line: usize,
    /// 1-based column of the start offset
    pub col: usize,
    pub file: Option<Rc<str>>,
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}:{}:{}", file, self.line, self.col),
            None => write!(f, "{}:{}", self.line, self.col),
        }
    }
}

/// Categories of errors raised by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed lexical input
    Parse,
    /// Input ended in the middle of a form; retry with more text
    Incomplete,
    /// Symbol does not name any var in scope
    Resolution,
    /// Var exists but holds no value yet
    Unbound,
    /// No protocol implementation for the receiver's type
    NoProtocolImpl,
    /// Protocol method called with an undeclared arity
    ProtocolArity,
    /// Violated invariant (bad names, bad metadata)
    Assertion,
    /// Malformed special form
    Syntax,
    /// Failure while executing emitted code
    Runtime,
    /// Module source could not be obtained
    Load,
}

/// An error with its category and enough context to locate the failure.
#[derive(Debug, Clone)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
    /// Source position of the offending form, when known
    pub span: Option<Span>,
    /// Printed form that caused the error, when known
    pub form: Option<String>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            span: None,
            form: None,
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    pub fn incomplete(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Incomplete, message)
    }

    pub fn resolution(name: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::Resolution,
            format!("Unable to resolve symbol: {name}"),
        )
    }

    pub fn unbound(name: impl fmt::Display) -> Self {
        Self::new(ErrorKind::Unbound, format!("Var {name} is unbound"))
    }

    pub fn assertion(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Assertion, message)
    }

    pub fn syntax(form: &str, message: impl fmt::Display) -> Self {
        Self::new(ErrorKind::Syntax, format!("{form}: {message}"))
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Runtime, message)
    }

    pub fn load(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Load, message)
    }

    /// Attach a span unless one is already present.
    pub fn with_span(mut self, span: Option<Span>) -> Self {
        if self.span.is_none() {
            self.span = span;
        }
        self
    }

    /// Attach the printed offending form.
    pub fn with_form(mut self, form: impl fmt::Display) -> Self {
        self.form = Some(form.to_string());
        self
    }

    pub fn is_incomplete(&self) -> bool {
        self.kind == ErrorKind::Incomplete
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref span) = self.span {
            write!(f, " at {span}")?;
        }
        if let Some(ref form) = self.form {
            // Long forms are cut to keep diagnostics on one line
            if form.chars().count() > 60 {
                let truncated: String = form.chars().take(57).collect();
                write!(f, " in: {truncated}...")?;
            } else {
                write!(f, " in: {form}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

impl From<Error> for String {
    fn from(err: Error) -> String {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_span_and_form() {
        let err = Error::parse("Unexpected )")
            .with_span(Some(Span {
                start: 3,
                end: 4,
                line: 2,
                col: 5,
                file: Some(Rc::from("user.cairn")),
            }))
            .with_form("(foo))");
        assert_eq!(err.to_string(), "Unexpected ) at user.cairn:2:5 in: (foo))");
    }

    #[test]
    fn test_long_forms_are_truncated() {
        let err = Error::runtime("boom").with_form("x".repeat(100));
        assert!(err.to_string().ends_with("..."));
    }

    #[test]
    fn test_incomplete_is_distinguishable() {
        assert!(Error::incomplete("eof").is_incomplete());
        assert!(!Error::parse("bad").is_incomplete());
    }

    #[test]
    fn test_span_is_not_overwritten() {
        let first = Span {
            line: 1,
            col: 1,
            ..Span::default()
        };
        let second = Span {
            line: 9,
            col: 9,
            ..Span::default()
        };
        let err = Error::resolution("x")
            .with_span(Some(first.clone()))
            .with_span(Some(second));
        assert_eq!(err.span, Some(first));
    }

    #[test]
    fn test_into_string() {
        let s: String = Error::unbound("user:x").into();
        assert!(s.contains("user:x"));
    }
}
