//! Dependency-tree resolution for hardware-design source trees
//!
//! This library reads *dependency files*, small line-oriented scripts that list the sources,
//! setup scripts, address tables and IP repositories of a firmware component, and resolves
//! them against a work area into ordered, deduplicated command lists for project generators.
//!
//! # Work area layout
//!
//! A work area is a directory holding one subdirectory per package. Components are
//! subdirectories of a package, and each kind of file lives in a fixed directory below its
//! component (see [`pathmaker`]). Dependency files themselves live in `firmware/cfg`.
//!
//! # Dependency files
//!
//! ```text
//! # comment
//! @sim_only = toolset == 'modelsim'
//! ?sim_only?src -c tb_pkg:bench tb_top.vhd
//! src -l work --vhdl2008 ${design.top}.vhd utils/*.vhd
//! include -c common:ipbus
//! setup -f finalise.tcl
//! addrtab -t top.xml
//! ```
//!
//! A file expression may contain wildcards; an expression matching nothing is recorded as
//! unresolved rather than failing the run. A directive without file expressions falls back to
//! the default file name of its component, e.g. `include -c common:ipbus` looks for
//! `ipbus.dep` or `ipbus.d3`.
//!
//! # Usage Example
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use deptree::{CommandKind, DepFileParser, Pathmaker};
//!
//! let mut parser = DepFileParser::new("vivado", Pathmaker::new("/work/src", 0), &["design.top=top"], 0)?;
//! parser.parse("my_pkg", "projects/example", "top.dep")?;
//!
//! for error in parser.errors() {
//!     eprintln!("{}", error);
//! }
//! for cmd in parser.commands(CommandKind::Src) {
//!     println!("{}", cmd.filepath.display());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - **[`config`]**: Script variable store and the expression language of assignments and conditionals
//! - **[`pathmaker`]**: Work-area directory convention and file globbing
//! - **[`directive`]**: Grammar of a single directive line
//! - **[`command`]**: Resolved commands and their kinds
//! - **[`depfile`]**: Parsed dependency files and the include graph
//! - **[`parser`]**: The recursive resolver and its aggregated results
//! - **[`error`]**: Fatal and line-local errors

pub mod command;
pub mod config;
pub mod depfile;
pub mod directive;
pub mod error;
pub mod parser;
pub mod pathmaker;
#[cfg(test)]
mod test_helpers;

pub use command::{Command, CommandAttrs, CommandKind, HlsSrc};
pub use config::{Config, Value};
pub use depfile::{DepFile, DepFileId, DepTree, LineError, Unresolved};
pub use error::{DirectiveError, Error, Result};
pub use parser::{DepFileParser, PackageMap};
pub use pathmaker::Pathmaker;

/// Interned names of packages, components and libraries.
pub type Symbol = string_cache::DefaultAtom;
