//! Resolved dependency commands.
//!
//! Every directive that matches files on disk yields one [`Command`] per matched file. The
//! kind-independent part (target path, owning package and component, working directory) lives
//! in [`Command`]; what only some kinds carry is in [`CommandAttrs`].

use std::fmt;
use std::path::PathBuf;

use crate::Symbol;
use crate::depfile::DepFileId;
use crate::directive::ComponentRef;

/// Directive kinds, one per verb of the dependency file grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CommandKind {
    Include,
    Setup,
    Util,
    Src,
    Addrtab,
    IpRepo,
    /// Any verb the grammar does not know.
    Other,
}

impl CommandKind {
    pub const ALL: [CommandKind; 7] = [
        CommandKind::Include,
        CommandKind::Setup,
        CommandKind::Util,
        CommandKind::Src,
        CommandKind::Addrtab,
        CommandKind::IpRepo,
        CommandKind::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::Include => "include",
            CommandKind::Setup => "setup",
            CommandKind::Util => "util",
            CommandKind::Src => "src",
            CommandKind::Addrtab => "addrtab",
            CommandKind::IpRepo => "iprepo",
            CommandKind::Other => "other",
        }
    }

    /// Directory holding targets of this kind, relative to a component.
    pub fn directory(self) -> Option<&'static str> {
        match self {
            CommandKind::Src => Some("firmware/hdl"),
            CommandKind::Include | CommandKind::Setup | CommandKind::Util => Some("firmware/cfg"),
            CommandKind::Addrtab => Some("addr_table"),
            CommandKind::IpRepo => Some("firmware/cgn"),
            CommandKind::Other => None,
        }
    }

    /// Extensions tried, in order, when a directive names no file.
    pub fn default_extensions(self) -> &'static [&'static str] {
        match self {
            CommandKind::Src => &["vhd", "v"],
            CommandKind::Include => &["dep", "d3"],
            CommandKind::Addrtab => &["xml"],
            _ => &[],
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific attributes of a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandAttrs {
    Include {
        /// The parsed target, set once the parser has recursed into it.
        depfile: Option<DepFileId>,
    },
    Setup {
        /// Run after every other setup script.
        finalise: bool,
    },
    Util,
    Src {
        lib: Option<Symbol>,
        vhdl2008: bool,
        use_in_synth: bool,
        use_in_sim: bool,
    },
    Addrtab {
        toplevel: bool,
    },
    IpRepo,
    Other {
        verb: String,
        /// Set for `hlssrc` directives.
        hls: Option<HlsSrc>,
    },
}

/// Compiler options of an `hlssrc` source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HlsSrc {
    pub testbench: bool,
    pub cflags: Option<String>,
    pub csimflags: Option<String>,
    /// Components whose headers the source needs.
    pub include_components: Vec<ComponentRef>,
}

impl CommandAttrs {
    pub fn kind(&self) -> CommandKind {
        match self {
            CommandAttrs::Include { .. } => CommandKind::Include,
            CommandAttrs::Setup { .. } => CommandKind::Setup,
            CommandAttrs::Util => CommandKind::Util,
            CommandAttrs::Src { .. } => CommandKind::Src,
            CommandAttrs::Addrtab { .. } => CommandKind::Addrtab,
            CommandAttrs::IpRepo => CommandKind::IpRepo,
            CommandAttrs::Other { .. } => CommandKind::Other,
        }
    }
}

/// A dependency directive resolved to one file.
#[derive(Debug, Clone)]
pub struct Command {
    /// Absolute, normalised path of the target.
    pub filepath: PathBuf,
    pub package: Symbol,
    /// Component within `package`; empty for the package root.
    pub component: Symbol,
    pub cd: Option<String>,
    pub attrs: CommandAttrs,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        self.attrs.kind()
    }

    pub fn lib(&self) -> Option<&Symbol> {
        match &self.attrs {
            CommandAttrs::Src { lib, .. } => lib.as_ref(),
            _ => None,
        }
    }

    /// The included file, for resolved `include` commands.
    pub fn depfile(&self) -> Option<DepFileId> {
        match self.attrs {
            CommandAttrs::Include { depfile } => depfile,
            _ => None,
        }
    }

    pub fn flags(&self) -> Vec<&'static str> {
        match self.attrs {
            CommandAttrs::Src {
                vhdl2008,
                use_in_synth,
                use_in_sim,
                ..
            } => [
                (vhdl2008, "vhdl2008"),
                (use_in_synth, "synth"),
                (use_in_sim, "sim"),
            ]
            .into_iter()
            .filter_map(|(set, name)| set.then_some(name))
            .collect(),
            CommandAttrs::Setup { finalise: true } => vec!["finalise"],
            CommandAttrs::Addrtab { toplevel: true } => vec!["toplevel"],
            CommandAttrs::Other {
                hls: Some(HlsSrc { testbench: true, .. }),
                ..
            } => vec!["tb"],
            _ => vec![],
        }
    }
}

/// Two commands are the same dependency when they target the same file; `src` commands must
/// also agree on the library.
impl PartialEq for Command {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind()
            && self.filepath == other.filepath
            && self.lib() == other.lib()
    }
}

impl Eq for Command {}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = self.flags();
        write!(
            f,
            "{{ '{}', flags: {}, component: '{}:{}'",
            self.filepath.display(),
            if flags.is_empty() {
                "none".to_string()
            } else {
                flags.join(",")
            },
            self.package,
            self.component
        )?;
        if let Some(lib) = self.lib() {
            write!(f, ", lib: {}", lib)?;
        }
        write!(f, " }}")
    }
}
