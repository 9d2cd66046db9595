//! Grammar of a single dependency directive.
//!
//! ```text
//! <verb> [-c pkg[:cmp]] [--cd dir] [kind-specific flags] [file...]
//! ```
//!
//! Each verb is a subcommand: `include`, `setup` (`-f/--finalise`), `util`,
//! `src` (`-l/--lib`, `--vhdl2008`, `-u/--usein`), `addrtab` (`-t/--toplevel`) and `iprepo`.
//! `hlssrc` (`--tb`, `--cflags`, `--csimflags`, `-i/--include-comp`) and any other verb are
//! accepted as [`CommandKind::Other`](crate::CommandKind::Other).

use clap::error::ErrorKind;
use clap::{Args, Parser, Subcommand};

use crate::command::{CommandAttrs, HlsSrc};
use crate::error::DirectiveError;

/// Target of a `-c` option: `cmp`, `pkg:` or `pkg:cmp`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ComponentRef {
    /// `None` means the package of the current file.
    pub package: Option<String>,
    pub component: Option<String>,
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

pub fn parse_component_ref(s: &str) -> Result<ComponentRef, String> {
    match s.split(':').collect::<Vec<_>>()[..] {
        [component] => Ok(ComponentRef {
            package: None,
            component: non_empty(component),
        }),
        [package, component] => Ok(ComponentRef {
            package: non_empty(package),
            component: non_empty(component),
        }),
        _ => Err(format!(
            "Malformed component name : {}. Expected <module>:<component>",
            s
        )),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UseIn {
    synth: bool,
    sim: bool,
}

fn parse_usein(s: &str) -> Result<UseIn, String> {
    let mut usein = UseIn {
        synth: false,
        sim: false,
    };
    for token in s.split(',') {
        match token {
            "synth" => usein.synth = true,
            "sim" => usein.sim = true,
            t => return Err(format!("Invalid source type {}", t)),
        }
    }
    Ok(usein)
}

#[derive(Debug, Parser)]
#[clap(no_binary_name = true, disable_help_subcommand = true)]
struct DirectiveLine {
    #[clap(subcommand)]
    verb: Verb,
}

#[derive(Debug, Subcommand)]
enum Verb {
    Include(CommonArgs),
    Setup(SetupArgs),
    Util(CommonArgs),
    Src(SrcArgs),
    Addrtab(AddrtabArgs),
    Iprepo(CommonArgs),
    Hlssrc(HlsSrcArgs),
    #[clap(external_subcommand)]
    Other(Vec<String>),
}

#[derive(Debug, Args)]
struct CommonArgs {
    #[clap(short, long, value_parser = parse_component_ref)]
    component: Option<ComponentRef>,

    #[clap(long)]
    cd: Option<String>,

    files: Vec<String>,
}

#[derive(Debug, Args)]
struct SetupArgs {
    #[clap(flatten)]
    common: CommonArgs,

    #[clap(short, long, alias = "finalize")]
    finalise: bool,
}

#[derive(Debug, Args)]
struct SrcArgs {
    #[clap(flatten)]
    common: CommonArgs,

    #[clap(short, long)]
    lib: Option<String>,

    #[clap(long)]
    vhdl2008: bool,

    #[clap(short, long, value_parser = parse_usein, default_value = "synth,sim")]
    usein: UseIn,
}

#[derive(Debug, Args)]
struct AddrtabArgs {
    #[clap(flatten)]
    common: CommonArgs,

    #[clap(short, long)]
    toplevel: bool,
}

#[derive(Debug, Args)]
struct HlsSrcArgs {
    #[clap(flatten)]
    common: CommonArgs,

    #[clap(long)]
    tb: bool,

    #[clap(long, allow_hyphen_values = true)]
    cflags: Option<String>,

    #[clap(long, allow_hyphen_values = true)]
    csimflags: Option<String>,

    #[clap(short, long = "include-comp", value_parser = parse_component_ref)]
    include_comp: Vec<ComponentRef>,
}

#[derive(Debug, Parser)]
#[clap(no_binary_name = true)]
struct OtherArgs {
    #[clap(flatten)]
    common: CommonArgs,
}

/// A directive line, before its file expressions are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDirective {
    /// Kind-specific attributes; `Include` ones are always unresolved here.
    pub attrs: CommandAttrs,
    pub package: Option<String>,
    pub component: Option<String>,
    pub cd: Option<String>,
    pub files: Vec<String>,
}

impl ParsedDirective {
    fn new(attrs: CommandAttrs, common: CommonArgs) -> Self {
        let ComponentRef { package, component } = common.component.unwrap_or_default();
        ParsedDirective {
            attrs,
            package,
            component,
            cd: common.cd,
            files: common.files,
        }
    }
}

fn syntax_error(err: clap::Error) -> DirectiveError {
    if matches!(
        err.kind(),
        ErrorKind::MissingSubcommand | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
    ) {
        return DirectiveError::Syntax("missing directive".to_string());
    }
    let message = err.to_string();
    let first = message.lines().next().unwrap_or_default();
    DirectiveError::Syntax(first.trim_start_matches("error: ").to_string())
}

/// Parses one pre-processed directive line.
pub fn parse_line(line: &str) -> Result<ParsedDirective, DirectiveError> {
    let tokens = line.split_whitespace();
    let DirectiveLine { verb } = DirectiveLine::try_parse_from(tokens).map_err(syntax_error)?;

    Ok(match verb {
        Verb::Include(args) => ParsedDirective::new(CommandAttrs::Include { depfile: None }, args),
        Verb::Setup(SetupArgs { common, finalise }) => {
            ParsedDirective::new(CommandAttrs::Setup { finalise }, common)
        }
        Verb::Util(args) => ParsedDirective::new(CommandAttrs::Util, args),
        Verb::Src(SrcArgs {
            common,
            lib,
            vhdl2008,
            usein,
        }) => ParsedDirective::new(
            CommandAttrs::Src {
                lib: lib.map(Into::into),
                vhdl2008,
                use_in_synth: usein.synth,
                use_in_sim: usein.sim,
            },
            common,
        ),
        Verb::Addrtab(AddrtabArgs { common, toplevel }) => {
            ParsedDirective::new(CommandAttrs::Addrtab { toplevel }, common)
        }
        Verb::Iprepo(args) => ParsedDirective::new(CommandAttrs::IpRepo, args),
        Verb::Hlssrc(HlsSrcArgs {
            common,
            tb,
            cflags,
            csimflags,
            include_comp,
        }) => ParsedDirective::new(
            CommandAttrs::Other {
                verb: "hlssrc".to_string(),
                hls: Some(HlsSrc {
                    testbench: tb,
                    cflags,
                    csimflags,
                    include_components: include_comp,
                }),
            },
            common,
        ),
        Verb::Other(mut tokens) => {
            let verb = tokens.remove(0);
            let OtherArgs { common } = OtherArgs::try_parse_from(tokens).map_err(syntax_error)?;
            ParsedDirective::new(CommandAttrs::Other { verb, hls: None }, common)
        }
    })
}
