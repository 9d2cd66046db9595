//! Recursive dependency-file parser.
//!
//! [`DepFileParser::parse`] reads a root dependency file and follows its `include` directives
//! through the work area. Every line goes through the same pipeline:
//!
//! 1. blank lines and `#` comments are dropped;
//! 2. `@name = expression` assigns a script variable (the first assignment wins);
//! 3. `?expression?rest` keeps `rest` only if `expression` is `True`;
//! 4. `$name` and `${name}` are replaced by variable values;
//! 5. the remaining text is parsed as a directive and its file expressions are globbed.
//!
//! Problems with a single line are recorded in the owning [`DepFile`] and parsing carries on.
//! After the top-level file is done the variable store is locked and the include graph is
//! flattened into deduplicated per-kind command lists.
//!
//! # Example
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use deptree::{CommandKind, DepFileParser, Pathmaker};
//!
//! let pathmaker = Pathmaker::new("/work/src", 0);
//! let mut parser = DepFileParser::new("vivado", pathmaker, &["board=kc705"], 0)?;
//! parser.parse("my_pkg", "top", "top.dep")?;
//!
//! for cmd in parser.commands(CommandKind::Src) {
//!     println!("{}", cmd);
//! }
//! # Ok(())
//! # }
//! ```

mod results;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use lazy_static::*;
use log::{debug, trace, warn};
use regex::Regex;

use crate::Symbol;
use crate::command::{Command, CommandAttrs, CommandKind};
use crate::config::template::substitute;
use crate::config::{Config, Expr, ExpressionError, Value};
use crate::depfile::{DepFile, DepFileId, DepTree, LineError, Unresolved};
use crate::directive::{ParsedDirective, parse_line};
use crate::error::{DirectiveError, Error, Result};
use crate::pathmaker::{FileList, Pathmaker};

pub use results::PackageMap;

/// Outcome of a line that could not be turned into commands.
enum LineFailure {
    /// Recorded against the line; parsing continues.
    Directive(DirectiveError),
    /// Aborts the whole run.
    Fatal(Error),
}

impl From<DirectiveError> for LineFailure {
    fn from(e: DirectiveError) -> Self {
        LineFailure::Directive(e)
    }
}

impl From<ExpressionError> for LineFailure {
    fn from(e: ExpressionError) -> Self {
        LineFailure::Directive(e.into())
    }
}

impl From<Error> for LineFailure {
    fn from(e: Error) -> Self {
        LineFailure::Fatal(e)
    }
}

/// Dependency-tree resolver for one work area.
///
/// A parser instance is good for a single [`parse`](DepFileParser::parse) call; build a fresh
/// one for every resolution run.
#[derive(Debug)]
pub struct DepFileParser {
    toolset: String,
    pathmaker: Pathmaker,
    verbosity: u8,
    config: Config,
    tree: DepTree,
    root: Option<DepFileId>,
    depth: usize,

    commands: BTreeMap<CommandKind, Vec<Command>>,
    packages: PackageMap,
    libs: Vec<Symbol>,
}

impl DepFileParser {
    /// Creates a parser with its variable store seeded from `overrides`.
    ///
    /// Each override is a `key=value` pair; values are stored as strings and the key may be a
    /// dotted path. The variable `toolset` is always set to `toolset`.
    pub fn new<S: AsRef<str>>(
        toolset: &str,
        pathmaker: Pathmaker,
        overrides: &[S],
        verbosity: u8,
    ) -> Result<Self> {
        let mut config = Config::new();
        for assignment in overrides {
            let assignment = assignment.as_ref();
            let (key, value) = assignment
                .split_once('=')
                .ok_or_else(|| Error::InvalidOverride(assignment.to_string()))?;
            config
                .set(key.trim(), value)
                .map_err(|_| Error::InvalidOverride(assignment.to_string()))?;
        }
        config
            .set("toolset", toolset)
            .map_err(|_| Error::InvalidOverride(format!("toolset={}", toolset)))?;

        Ok(DepFileParser {
            toolset: toolset.to_string(),
            pathmaker,
            verbosity,
            config,
            tree: DepTree::new(),
            root: None,
            depth: 0,
            commands: BTreeMap::new(),
            packages: PackageMap::default(),
            libs: Vec::new(),
        })
    }

    pub fn toolset(&self) -> &str {
        &self.toolset
    }

    pub fn pathmaker(&self) -> &Pathmaker {
        &self.pathmaker
    }

    /// Resolves the dependency tree rooted at `name`, a file in the `include` directory of
    /// `package:component`.
    ///
    /// Fails only on errors that make the whole tree meaningless: an include target vanishing
    /// from disk, an unreadable file or a directive kind without default file names.
    pub fn parse(&mut self, package: &str, component: &str, name: impl AsRef<Path>) -> Result<()> {
        if self.root.is_some() {
            warn!("Parser reused for a second resolution run; results will be merged");
        }

        let name = name.as_ref();
        let package = Symbol::from(package);
        let component = Symbol::from(component);
        let path = self.pathmaker.path(
            &package,
            Some(&*component),
            Some(CommandKind::Include),
            Some(name.to_string_lossy().as_ref()),
            None,
        );

        let root = self.parse_depfile(package, component, name.to_path_buf(), path)?;
        self.root = Some(root);
        self.config.lock();
        debug_assert_eq!(self.depth, 0);

        self.collect(root);
        Ok(())
    }

    /// Flattens the tree below `root` into the per-kind command lists.
    fn collect(&mut self, root: DepFileId) {
        let commands = self.tree.iter_commands(root);

        // Every occurrence counts towards packages and libraries, duplicates included
        for cmd in &commands {
            self.packages.insert(&cmd.package, &cmd.component);
            if let Some(lib) = cmd.lib() {
                if !self.libs.contains(lib) {
                    self.libs.push(lib.clone());
                }
            }
        }

        let unique = commands
            .into_iter()
            .unique_by(|cmd| (cmd.kind(), cmd.filepath.clone(), cmd.lib().cloned()));
        for cmd in unique {
            if self.verbosity > 0 {
                debug!("{} {}", cmd.kind(), cmd);
            }
            self.commands
                .entry(cmd.kind())
                .or_default()
                .push(cmd.clone());
        }
    }

    /// Parses one dependency file, unless it is already in the registry.
    fn parse_depfile(
        &mut self,
        package: Symbol,
        component: Symbol,
        name: PathBuf,
        path: PathBuf,
    ) -> Result<DepFileId> {
        if let Some(id) = self.tree.get(&path) {
            let cached = &self.tree[id];
            if cached.package != package || cached.component != component {
                debug!(
                    "{} already parsed as {}:{}, reused for {}:{}",
                    path.display(),
                    cached.package,
                    cached.component,
                    package,
                    component
                );
            }
            return Ok(id);
        }

        if !path.exists() {
            return Err(Error::MissingFile(path));
        }
        let text = fs::read_to_string(&path).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;

        if self.verbosity > 1 {
            trace!(
                "{} Parsing {} {} {}",
                ">".repeat(self.depth),
                package,
                component,
                name.display()
            );
        }

        let id = self.tree.insert(DepFile::new(package, component, name, path));
        self.depth += 1;
        let parsed = self.parse_lines(id, &text);
        self.depth -= 1;
        parsed?;

        let file = self.tree.file_mut(id);
        if !file.is_forward() {
            file.entries.reverse();
        }

        if self.verbosity > 1 {
            trace!("{}{}", self.tab(), self.tree[id]);
            trace!("{}", "<".repeat(self.depth + 1));
        }
        Ok(id)
    }

    fn parse_lines(&mut self, id: DepFileId, text: &str) -> Result<()> {
        for (index, line) in text.lines().enumerate() {
            match self.process_line(id, line) {
                Ok(()) => {}
                Err(LineFailure::Directive(error)) => {
                    let file = &self.tree[id];
                    let error = LineError {
                        package: file.package.clone(),
                        component: file.component.clone(),
                        file_name: file.name.clone(),
                        file_path: file.path.clone(),
                        line_number: index + 1,
                        line: line.trim().to_string(),
                        error,
                    };
                    if self.verbosity > 1 {
                        trace!("{}  -- {}", self.tab(), error);
                    }
                    self.tree.file_mut(id).errors.push(error);
                }
                Err(LineFailure::Fatal(e)) => return Err(e),
            }
        }
        Ok(())
    }

    fn process_line(&mut self, id: DepFileId, line: &str) -> std::result::Result<(), LineFailure> {
        let Some(line) = self.preprocess(line)? else {
            return Ok(());
        };

        let directive = parse_line(&line)?;
        if self.verbosity > 1 {
            trace!("{}- Parsed line {:?}", self.tab(), directive);
        }
        self.resolve(id, directive)
    }

    /// Runs the comment, assignment, conditional and substitution stages.
    ///
    /// Returns `None` when nothing is left to parse.
    fn preprocess(&mut self, line: &str) -> std::result::Result<Option<String>, DirectiveError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        if let Some(assignment) = line.strip_prefix('@') {
            self.assign(assignment.trim())?;
            return Ok(None);
        }

        let line = if line.starts_with('?') {
            match self.conditional(line)? {
                Some(rest) if !rest.is_empty() => rest,
                _ => return Ok(None),
            }
        } else {
            line
        };

        substitute(line, &mut self.config)
            .map(Some)
            .map_err(|e| DirectiveError::Substitution(e.to_string()))
    }

    fn assign(&mut self, assignment: &str) -> std::result::Result<(), DirectiveError> {
        lazy_static! {
            static ref ASSIGNMENT_RE: Regex = Regex::new(
                r"^(?:([a-zA-Z][a-zA-Z0-9_]*(?:\.[a-zA-Z][a-zA-Z0-9_]*)*)|([^=\s]*))\s*=\s*(.*)$"
            )
            .unwrap();
        }

        if assignment.contains(';') {
            return Err(DirectiveError::Syntax(format!(
                "semicolons are not allowed in assignments '{}'",
                assignment
            )));
        }
        let Some(c) = ASSIGNMENT_RE.captures(assignment) else {
            return Err(DirectiveError::Syntax(format!(
                "assignment does not have the key = value form '{}'",
                assignment
            )));
        };
        if let Some(invalid) = c.get(2) {
            return Err(DirectiveError::Syntax(format!(
                "invalid variable name '{}'",
                invalid.as_str()
            )));
        }
        let (Some(name), Some(expression)) = (c.get(1), c.get(3).filter(|e| !e.is_empty())) else {
            return Err(DirectiveError::Syntax(format!(
                "missing assignment value '{}'",
                assignment
            )));
        };
        let (name, expression) = (name.as_str(), expression.as_str());

        if self.config.contains(name) {
            warn!(
                "'{}' is already defined with value '{}'. New value will not be applied ({})",
                name,
                self.config
                    .lookup(name)
                    .map(|n| n.to_value().to_string())
                    .unwrap_or_default(),
                expression
            );
            return Ok(());
        }

        // Strict lookups while evaluating, so unset names fail instead of materialising
        let was_locked = self.config.is_locked();
        self.config.lock();
        let value = Expr::parse(expression).and_then(|e| e.eval(&mut self.config));
        if !was_locked {
            self.config.unlock();
        }
        let value = value?;

        if !value.is_scalar() {
            return Err(ExpressionError::NotAScalar(value.type_name()).into());
        }
        self.config
            .set(name, value)
            .map_err(|e| DirectiveError::Evaluation(e.into()))?;

        if self.verbosity > 1 {
            trace!("{}: @{}", self.tab(), assignment);
        }
        Ok(())
    }

    /// Evaluates the guard of a `?expression?rest` line, returning `rest` if it holds.
    fn conditional<'l>(
        &mut self,
        line: &'l str,
    ) -> std::result::Result<Option<&'l str>, DirectiveError> {
        let marks = line.matches('?').count();
        if marks != 2 {
            return Err(DirectiveError::Syntax(format!(
                "there must be precisely two '?' tokens per line, found {}",
                marks
            )));
        }
        let mut parts = line.splitn(3, '?').skip(1);
        let (Some(expression), Some(rest)) = (parts.next(), parts.next()) else {
            return Err(DirectiveError::Syntax("malformed conditional".to_string()));
        };

        match self.config.evaluate(expression)? {
            Value::Bool(true) => Ok(Some(rest.trim())),
            Value::Bool(false) => Ok(None),
            other => Err(ExpressionError::NotBoolean(other.to_string()).into()),
        }
    }

    /// Turns a parsed directive into commands of file `id`, recursing into includes.
    fn resolve(
        &mut self,
        id: DepFileId,
        directive: ParsedDirective,
    ) -> std::result::Result<(), LineFailure> {
        let ParsedDirective {
            attrs,
            package,
            component,
            cd,
            files,
        } = directive;
        let kind = attrs.kind();

        let current = &self.tree[id];
        let (cur_package, cur_component, cur_path) = (
            current.package.clone(),
            current.component.clone(),
            current.path.clone(),
        );

        let package = package.map(Symbol::from).unwrap_or_else(|| cur_package.clone());
        let component = match component {
            Some(c) => Symbol::from(c),
            None if package == cur_package => cur_component.clone(),
            None => Symbol::from(""),
        };

        let (matched, unmatched) =
            self.match_files(kind, &package, &component, &files, cd.as_deref())?;

        for (name, path) in matched.into_iter().flatten() {
            if self.verbosity > 0 {
                debug!("{} {} {} {}", self.tab(), kind, name.display(), path.display());
            }
            let attrs = match attrs {
                CommandAttrs::Include { .. } => {
                    let child =
                        self.parse_depfile(package.clone(), component.clone(), name, path.clone())?;
                    self.tree.add_include(id, child);
                    CommandAttrs::Include {
                        depfile: Some(child),
                    }
                }
                _ => attrs.clone(),
            };
            self.tree.file_mut(id).entries.push(Command {
                filepath: path,
                package: package.clone(),
                component: component.clone(),
                cd: cd.clone(),
                attrs,
            });
        }

        let unresolved = unmatched.into_iter().map(|expression| Unresolved {
            expression,
            kind,
            package: package.clone(),
            component: component.clone(),
            dep_package: cur_package.clone(),
            dep_component: cur_component.clone(),
            dep_file: cur_path.clone(),
        });
        self.tree.file_mut(id).unresolved.extend(unresolved);
        Ok(())
    }

    /// Globs the file expressions of a directive, or its default file names if it has none.
    ///
    /// Default names resolve only when exactly one candidate exists; otherwise the brace form
    /// of all candidates is reported as unmatched.
    fn match_files(
        &self,
        kind: CommandKind,
        package: &str,
        component: &str,
        files: &[String],
        cd: Option<&str>,
    ) -> Result<(Vec<FileList>, Vec<PathBuf>)> {
        if !files.is_empty() {
            return Ok(self.pathmaker.glob_all(package, component, kind, files, cd));
        }

        let base = component.rsplit('/').next().unwrap_or_default();
        let candidates = self.pathmaker.default_names(kind, base)?;
        let (matched, _) = self
            .pathmaker
            .glob_all(package, component, kind, &candidates, cd);
        if matched.len() == 1 {
            return Ok((matched, vec![]));
        }

        let pattern = self.pathmaker.default_names_pattern(kind, base)?;
        let expression = self
            .pathmaker
            .path(package, Some(component), Some(kind), Some(&pattern), cd);
        Ok((vec![], vec![expression]))
    }

    fn tab(&self) -> String {
        " ".repeat(4 * self.depth)
    }
}
