//! Error taxonomy of the dependency resolver.
//!
//! Two families of errors exist:
//!
//! - [`DirectiveError`]: problems local to one line of a dependency file. The parser records
//!   them in the owning [`DepFile`](crate::DepFile) and carries on with the next line.
//! - [`Error`]: problems that abort a whole resolution run.

use std::path::PathBuf;

use thiserror::Error;

use crate::command::CommandKind;
use crate::config::ExpressionError;

pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors, unwinding out of [`DepFileParser::parse`](crate::DepFileParser::parse).
#[derive(Debug, Error)]
pub enum Error {
    /// An include target matched while globbing but is gone when the parser recurses into it.
    #[error("dependency file {} does not exist", .0.display())]
    MissingFile(PathBuf),
    /// A directive without file names for a kind that has no default naming convention.
    #[error("no default file extension defined for '{0}' directives")]
    NoDefaultExtension(CommandKind),
    /// A variable override not of the `key=value` form.
    #[error("malformed variable override '{0}', expected key=value")]
    InvalidOverride(String),
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Recoverable errors raised while pre-processing or parsing a single directive line.
#[derive(Debug, Error)]
pub enum DirectiveError {
    /// Malformed assignment, conditional or directive.
    #[error("syntax error: {0}")]
    Syntax(String),
    /// A `$name` reference that could not be replaced.
    #[error("substitution failed: {0}")]
    Substitution(String),
    /// A conditional or assignment expression that failed to evaluate.
    #[error("expression evaluation failed: {0}")]
    Evaluation(#[from] ExpressionError),
}
