//! Maps package/component references onto the work-area directory layout.
//!
//! A work area holds one directory per package under its root. Every package (and every
//! component directory within it) follows the same convention, keyed by directive kind:
//!
//! | kind                        | directory      | default extensions |
//! |-----------------------------|----------------|--------------------|
//! | `src`                       | `firmware/hdl` | `vhd`, `v`         |
//! | `include`                   | `firmware/cfg` | `dep`, `d3`        |
//! | `setup`, `util`             | `firmware/cfg` |                    |
//! | `addrtab`                   | `addr_table`   | `xml`              |
//! | `iprepo`                    | `firmware/cgn` |                    |

mod glob;

use std::path::{Component, Path, PathBuf};

use log::trace;
use walkdir::WalkDir;

use crate::command::CommandKind;
use crate::depfile::is_depfile;
use crate::error::{Error, Result};

/// Matches of one file expression: `(path relative to the kind directory, absolute path)`.
pub type FileList = Vec<(PathBuf, PathBuf)>;

/// Lexically normalises a path, folding `.` and `..` components.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            c => out.push(c.as_os_str()),
        }
    }
    out
}

/// Path resolver for one work area.
#[derive(Debug, Clone)]
pub struct Pathmaker {
    root: PathBuf,
    verbosity: u8,
}

impl Pathmaker {
    pub fn new(root: impl Into<PathBuf>, verbosity: u8) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        if verbosity > 3 {
            trace!("Pathmaker root {}", root.display());
        }
        Pathmaker {
            root: normalize(&root),
            verbosity,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn package_path(&self, package: &str) -> PathBuf {
        normalize(&self.root.join(package))
    }

    pub fn package_exists(&self, package: &str) -> bool {
        self.package_path(package).exists()
    }

    /// Builds `root/package[/component][/kind directory][/cd][/name]`.
    pub fn path(
        &self,
        package: &str,
        component: Option<&str>,
        kind: Option<CommandKind>,
        name: Option<&str>,
        cd: Option<&str>,
    ) -> PathBuf {
        let mut path = self.root.join(package);
        let parts = [component, kind.and_then(CommandKind::directory), cd, name];
        for part in parts.into_iter().flatten().filter(|p| !p.is_empty()) {
            path.push(part);
        }
        if self.verbosity > 2 {
            trace!(
                "Pathmaker {} {:?} {:?} {:?} {:?}",
                package, component, kind, name, cd
            );
        }
        normalize(&path)
    }

    /// Candidate file names for a directive that names no file.
    pub fn default_names(&self, kind: CommandKind, name: &str) -> Result<Vec<String>> {
        let extensions = kind.default_extensions();
        if extensions.is_empty() {
            return Err(Error::NoDefaultExtension(kind));
        }
        Ok(extensions
            .iter()
            .map(|ext| format!("{}.{}", name, ext))
            .collect())
    }

    /// The default candidates in brace form, e.g. `top.{vhd,v}`.
    pub fn default_names_pattern(&self, kind: CommandKind, name: &str) -> Result<String> {
        let extensions = kind.default_extensions();
        match extensions {
            [] => Err(Error::NoDefaultExtension(kind)),
            [ext] => Ok(format!("{}.{}", name, ext)),
            _ => Ok(format!("{}.{{{}}}", name, extensions.join(","))),
        }
    }

    /// Expands a file expression under the kind directory of a component.
    ///
    /// Returns the complete path expression and its matches. No match is not an error.
    pub fn glob(
        &self,
        package: &str,
        component: &str,
        kind: CommandKind,
        expr: &str,
        cd: Option<&str>,
    ) -> (PathBuf, FileList) {
        let path_expr = self.path(package, Some(component), Some(kind), Some(expr), cd);
        let kind_path = self.path(package, Some(component), Some(kind), None, cd);

        let matches = glob::glob(&path_expr)
            .into_iter()
            .map(|path| {
                let rel = pathdiff::diff_paths(&path, &kind_path).unwrap_or_else(|| path.clone());
                (rel, path)
            })
            .collect();
        (path_expr, matches)
    }

    /// Globs every expression, splitting the result into match lists and unmatched expressions.
    pub fn glob_all<S: AsRef<str>>(
        &self,
        package: &str,
        component: &str,
        kind: CommandKind,
        exprs: &[S],
        cd: Option<&str>,
    ) -> (Vec<FileList>, Vec<PathBuf>) {
        let mut matched = Vec::new();
        let mut unmatched = Vec::new();
        for expr in exprs {
            let (path_expr, files) = self.glob(package, component, kind, expr.as_ref(), cd);
            if files.is_empty() {
                unmatched.push(path_expr);
            } else {
                matched.push(files);
            }
        }
        (matched, unmatched)
    }

    /// Dependency files of a component, relative to its `include` directory.
    pub fn list_depfiles(&self, package: &str, component: &str) -> Vec<PathBuf> {
        let base = self.path(package, Some(component), Some(CommandKind::Include), None, None);
        WalkDir::new(&base)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_depfile(e.path()))
            .filter_map(|e| e.path().strip_prefix(&base).ok().map(Path::to_path_buf))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::WorkArea;

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize(Path::new("/a/b/../c/./d")),
            PathBuf::from("/a/c/d")
        );
        assert_eq!(normalize(Path::new("/../a")), PathBuf::from("/a"));
        assert_eq!(normalize(Path::new("a/../../b")), PathBuf::from("../b"));
    }

    #[test]
    fn test_path_convention() {
        let pm = Pathmaker::new("/work/src", 0);
        assert_eq!(
            pm.path("pkg", Some("cmp/sub"), Some(CommandKind::Src), Some("a.vhd"), None),
            PathBuf::from("/work/src/pkg/cmp/sub/firmware/hdl/a.vhd")
        );
        assert_eq!(
            pm.path("pkg", Some(""), Some(CommandKind::Addrtab), None, Some("../x")),
            PathBuf::from("/work/src/pkg/x")
        );
        assert_eq!(
            pm.path("pkg", None, Some(CommandKind::IpRepo), Some("cores"), Some("gen")),
            PathBuf::from("/work/src/pkg/firmware/cgn/gen/cores")
        );
        assert_eq!(
            pm.path("pkg", Some("cmp"), Some(CommandKind::Other), Some("f.txt"), None),
            PathBuf::from("/work/src/pkg/cmp/f.txt")
        );
        assert_eq!(pm.package_path("pkg"), PathBuf::from("/work/src/pkg"));
    }

    #[test]
    fn test_default_names() {
        let pm = Pathmaker::new("/work", 0);
        assert_eq!(
            pm.default_names(CommandKind::Src, "top").unwrap(),
            vec!["top.vhd", "top.v"]
        );
        assert_eq!(
            pm.default_names_pattern(CommandKind::Include, "top").unwrap(),
            "top.{dep,d3}"
        );
        assert_eq!(
            pm.default_names_pattern(CommandKind::Addrtab, "top").unwrap(),
            "top.xml"
        );
        assert!(matches!(
            pm.default_names(CommandKind::Setup, "top"),
            Err(Error::NoDefaultExtension(CommandKind::Setup))
        ));
    }

    #[test]
    fn test_glob_relative_names() {
        let area = WorkArea::new(&[
            ("pkg/cmp/firmware/hdl/a.vhd", ""),
            ("pkg/cmp/firmware/hdl/b.vhd", ""),
            ("pkg/cmp/firmware/hdl/gen/c.vhd", ""),
        ]);
        let pm = area.pathmaker();

        let (expr, files) = pm.glob("pkg", "cmp", CommandKind::Src, "*.vhd", None);
        assert_eq!(expr, area.path("pkg/cmp/firmware/hdl/*.vhd"));
        assert_eq!(
            files,
            vec![
                (PathBuf::from("a.vhd"), area.path("pkg/cmp/firmware/hdl/a.vhd")),
                (PathBuf::from("b.vhd"), area.path("pkg/cmp/firmware/hdl/b.vhd")),
            ]
        );

        let (_, files) = pm.glob("pkg", "cmp", CommandKind::Src, "c.vhd", Some("gen"));
        assert_eq!(
            files,
            vec![(PathBuf::from("c.vhd"), area.path("pkg/cmp/firmware/hdl/gen/c.vhd"))]
        );
    }

    #[test]
    fn test_glob_all_partitions() {
        let area = WorkArea::new(&[("pkg/firmware/hdl/a.vhd", "")]);
        let pm = area.pathmaker();

        let (matched, unmatched) =
            pm.glob_all("pkg", "", CommandKind::Src, &["a.vhd", "missing.vhd"], None);
        assert_eq!(matched.len(), 1);
        assert_eq!(unmatched, vec![area.path("pkg/firmware/hdl/missing.vhd")]);
    }

    #[test]
    fn test_list_depfiles() {
        let area = WorkArea::new(&[
            ("pkg/cmp/firmware/cfg/top.dep", ""),
            ("pkg/cmp/firmware/cfg/sim/tb.d3", ""),
            ("pkg/cmp/firmware/cfg/setup.tcl", ""),
        ]);
        assert_eq!(
            area.pathmaker().list_depfiles("pkg", "cmp"),
            vec![PathBuf::from("sim/tb.d3"), PathBuf::from("top.dep")]
        );
    }
}
