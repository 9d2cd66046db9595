//! `$name` / `${name}` substitution of directive text.

use lazy_static::*;
use regex::{Captures, Regex};
use thiserror::Error;

use super::{ConfigError, Scope, Value};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TemplateError {
    #[error("invalid placeholder at column {0}")]
    InvalidPlaceholder(usize),
    #[error("cannot substitute '{name}': {source}")]
    Unresolved {
        name: String,
        #[source]
        source: ConfigError,
    },
    #[error("'{0}' is a subtree, not a value")]
    NotAValue(String),
}

/// Replaces every placeholder in `text` with the value it names in `scope`.
///
/// `$$` stands for a literal `$`.
pub fn substitute<S: Scope + ?Sized>(text: &str, scope: &mut S) -> Result<String, TemplateError> {
    lazy_static! {
        static ref PLACEHOLDER_RE: Regex = Regex::new(
            r"(?i)\$(?:(?P<escaped>\$)|(?P<named>[_a-z][._a-z0-9]*)|\{(?P<braced>[_a-z][._a-z0-9]*)\}|(?P<invalid>))"
        )
        .unwrap();
    }

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for c in PLACEHOLDER_RE.captures_iter(text) {
        let Some(whole) = c.get(0) else { continue };
        out.push_str(&text[last..whole.start()]);
        last = whole.end();
        out.push_str(&replacement(&c, whole.start(), scope)?);
    }
    out.push_str(&text[last..]);
    Ok(out)
}

fn replacement<S: Scope + ?Sized>(
    c: &Captures,
    column: usize,
    scope: &mut S,
) -> Result<String, TemplateError> {
    if c.name("escaped").is_some() {
        return Ok("$".to_string());
    }
    let Some(name) = c.name("named").or_else(|| c.name("braced")) else {
        return Err(TemplateError::InvalidPlaceholder(column + 1));
    };
    let name = name.as_str();
    match scope.resolve(name) {
        Ok(Value::Branch(_)) => Err(TemplateError::NotAValue(name.to_string())),
        Ok(value) => Ok(value.to_string()),
        Err(source) => Err(TemplateError::Unresolved {
            name: name.to_string(),
            source,
        }),
    }
}
