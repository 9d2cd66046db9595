use std::fs;
use std::path::Path;

use deptree::{
    CommandKind, DepFileParser, DirectiveError, Error, Pathmaker, Symbol, config::ExpressionError,
};
use tempfile::TempDir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// Helper function to lay out a work area from (relative path, contents) pairs
fn create_work_area(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    for (rel, contents) in files {
        let path = temp_dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).expect("Failed to create directory");
        fs::write(&path, contents).expect("Failed to write test file");
    }
    temp_dir
}

// Helper function to resolve a root dep file of a work area
fn resolve(
    root: &Path,
    overrides: &[&str],
    package: &str,
    component: &str,
    name: &str,
) -> Result<DepFileParser, Error> {
    init_logging();
    let mut parser = DepFileParser::new("vivado", Pathmaker::new(root, 1), overrides, 1)?;
    parser.parse(package, component, name)?;
    Ok(parser)
}

fn src_files(parser: &DepFileParser) -> Vec<String> {
    let root = parser.pathmaker().root();
    parser
        .commands(CommandKind::Src)
        .iter()
        .map(|c| c.filepath.strip_prefix(root).unwrap().display().to_string())
        .collect()
}

#[cfg(test)]
mod resolution_scenarios {
    use super::*;

    /// Two plain sources, one of them in a library
    #[test]
    fn test_sources_with_library() {
        let area = create_work_area(&[
            ("pkgA/firmware/cfg/top.dep", "src a.vhd\nsrc -l work b.vhd\n"),
            ("pkgA/firmware/hdl/a.vhd", ""),
            ("pkgA/firmware/hdl/b.vhd", ""),
        ]);
        let parser = resolve(area.path(), &[], "pkgA", "", "top.dep").unwrap();

        let src = parser.commands(CommandKind::Src);
        assert_eq!(src.len(), 2);
        assert!(src[0].filepath.ends_with("pkgA/firmware/hdl/a.vhd"));
        assert_eq!(src[0].lib(), None);
        assert!(src[1].filepath.ends_with("pkgA/firmware/hdl/b.vhd"));
        assert_eq!(src[1].lib(), Some(&Symbol::from("work")));
        assert!(parser.unresolved().is_empty());
        assert!(parser.errors().is_empty());
        assert_eq!(parser.libs(), &[Symbol::from("work")]);
    }

    /// A guard reading an unset flag sees an empty subtree, which is not a boolean
    #[test]
    fn test_guard_on_undefined_flag() {
        let area = create_work_area(&[
            (
                "pkgA/firmware/cfg/top.dep",
                "?defined.flag?src only_if_flag.vhd\n",
            ),
            ("pkgA/firmware/hdl/only_if_flag.vhd", ""),
        ]);
        let parser = resolve(area.path(), &[], "pkgA", "", "top.dep").unwrap();

        let errors = parser.errors();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0].error,
            DirectiveError::Evaluation(ExpressionError::NotBoolean(_))
        ));
        assert_eq!(errors[0].line_number, 1);
        assert!(parser.commands(CommandKind::Src).is_empty());
    }

    /// A missing include is unresolved, not fatal, and the rest of the file is still parsed
    #[test]
    fn test_missing_include_is_unresolved() {
        let area = create_work_area(&[
            (
                "pkgA/firmware/cfg/top.dep",
                "include missing.dep\nsrc a.vhd\n",
            ),
            ("pkgA/firmware/hdl/a.vhd", ""),
        ]);
        let parser = resolve(area.path(), &[], "pkgA", "", "top.dep").unwrap();

        let unresolved = parser.unresolved();
        assert_eq!(unresolved.len(), 1);
        let entry = unresolved[0];
        assert!(entry.expression.ends_with("pkgA/firmware/cfg/missing.dep"));
        assert_eq!(entry.kind, CommandKind::Include);
        assert_eq!(&*entry.package, "pkgA");
        assert_eq!(&*entry.component, "");
        assert_eq!(&*entry.dep_package, "pkgA");
        assert_eq!(&*entry.dep_component, "");
        assert!(entry.dep_file.ends_with("pkgA/firmware/cfg/top.dep"));

        assert_eq!(parser.tree().len(), 1);
        assert_eq!(src_files(&parser), vec!["pkgA/firmware/hdl/a.vhd"]);
    }

    /// Both sides of a diamond include the same file, which is parsed and listed once
    #[test]
    fn test_diamond_includes() {
        let area = create_work_area(&[
            (
                "top/firmware/cfg/top.dep",
                "src top_a.vhd\ninclude -c left: left.dep\ninclude -c right: right.dep\nsrc top_z.vhd\n",
            ),
            ("top/firmware/hdl/top_a.vhd", ""),
            ("top/firmware/hdl/top_z.vhd", ""),
            (
                "left/firmware/cfg/left.dep",
                "include -c shared: shared.dep\nsrc left.vhd\n",
            ),
            ("left/firmware/hdl/left.vhd", ""),
            (
                "right/firmware/cfg/right.dep",
                "include -c shared: shared.dep\nsrc right.vhd\n",
            ),
            ("right/firmware/hdl/right.vhd", ""),
            ("shared/firmware/cfg/shared.dep", "src shared.vhd\n"),
            ("shared/firmware/hdl/shared.vhd", ""),
        ]);
        let parser = resolve(area.path(), &[], "top", "", "top.dep").unwrap();

        assert!(parser.errors().is_empty());
        assert!(parser.unresolved().is_empty());
        assert_eq!(parser.tree().len(), 4);
        assert_eq!(
            src_files(&parser),
            vec![
                "top/firmware/hdl/top_a.vhd",
                "shared/firmware/hdl/shared.vhd",
                "left/firmware/hdl/left.vhd",
                "right/firmware/hdl/right.vhd",
                "top/firmware/hdl/top_z.vhd",
            ]
        );

        let tree = parser.tree();
        let shared = tree
            .get(&parser.pathmaker().root().join("shared/firmware/cfg/shared.dep"))
            .unwrap();
        assert_eq!(tree.includers(shared).len(), 2);

        let packages: Vec<String> = parser.packages().packages().map(|p| p.to_string()).collect();
        assert_eq!(packages, vec!["top", "shared", "left", "right"]);
    }

    /// Resolving the same tree twice gives the same results
    #[test]
    fn test_reparse_is_idempotent() {
        let area = create_work_area(&[
            (
                "pkg/firmware/cfg/top.dep",
                "@variant = 'b'\nsrc *.vhd\ninclude sim.d3\n?variant == 'b'?addrtab -t top.xml\n",
            ),
            ("pkg/firmware/cfg/sim.d3", "src -u sim tb_a.vhd\nsrc -u sim tb_b.vhd\n"),
            ("pkg/firmware/hdl/x.vhd", ""),
            ("pkg/firmware/hdl/y.vhd", ""),
            ("pkg/firmware/hdl/tb_a.vhd", ""),
            ("pkg/firmware/hdl/tb_b.vhd", ""),
            ("pkg/addr_table/top.xml", ""),
        ]);

        let first = resolve(area.path(), &["x=1"], "pkg", "", "top.dep").unwrap();
        let second = resolve(area.path(), &["x=1"], "pkg", "", "top.dep").unwrap();

        for kind in CommandKind::ALL {
            assert_eq!(first.commands(kind), second.commands(kind));
        }
        assert_eq!(first.packages(), second.packages());
        assert_eq!(
            src_files(&first),
            vec![
                "pkg/firmware/hdl/tb_a.vhd",
                "pkg/firmware/hdl/tb_b.vhd",
                "pkg/firmware/hdl/x.vhd",
                "pkg/firmware/hdl/y.vhd",
            ]
        );
        assert_eq!(first.commands(CommandKind::Addrtab).len(), 1);
    }

    /// Include order of a reversed file
    #[test]
    fn test_reverse_file_order() {
        let area = create_work_area(&[
            ("pkg/firmware/cfg/top.d3", "src a.vhd\nsrc b.vhd\ninclude inner.dep\n"),
            ("pkg/firmware/cfg/inner.dep", "src c.vhd\nsrc d.vhd\n"),
            ("pkg/firmware/hdl/a.vhd", ""),
            ("pkg/firmware/hdl/b.vhd", ""),
            ("pkg/firmware/hdl/c.vhd", ""),
            ("pkg/firmware/hdl/d.vhd", ""),
        ]);
        let parser = resolve(area.path(), &[], "pkg", "", "top.d3").unwrap();

        assert_eq!(
            src_files(&parser),
            vec![
                "pkg/firmware/hdl/c.vhd",
                "pkg/firmware/hdl/d.vhd",
                "pkg/firmware/hdl/b.vhd",
                "pkg/firmware/hdl/a.vhd",
            ]
        );
    }

    /// After resolution the variable store only answers for defined names
    #[test]
    fn test_lock_semantics() {
        let area = create_work_area(&[("pkg/firmware/cfg/top.dep", "@jobs = 4\n")]);
        let mut parser = resolve(area.path(), &[], "pkg", "", "top.dep").unwrap();

        let config = parser.config_mut();
        assert!(config.is_locked());
        assert!(config.get("jobs").is_ok());
        assert!(config.get("vivado.threads").is_err());
        assert!(config.evaluate("jobs > 2").is_ok());

        let mut fresh = deptree::Config::new();
        assert!(fresh.get("vivado.threads").is_ok());
        assert!(fresh.contains("vivado.threads"));
    }

    /// Glob patterns and missing packages show up in the unresolved queries
    #[test]
    fn test_unresolved_queries() {
        let area = create_work_area(&[
            (
                "pkg/firmware/cfg/top.dep",
                "src *.vhd\nsrc -c ghost:core core.vhd\ninclude -c pkg:cmp\n",
            ),
            ("pkg/cmp/firmware/cfg/other.dep", ""),
        ]);
        let parser = resolve(area.path(), &[], "pkg", "", "top.dep").unwrap();

        assert_eq!(parser.unresolved().len(), 3);
        assert_eq!(
            parser.unresolved_packages().into_iter().collect::<Vec<_>>(),
            vec!["ghost".to_string()]
        );
        let components = parser.unresolved_components();
        assert_eq!(components.keys().collect::<Vec<_>>(), vec!["ghost"]);

        let files = parser.unresolved_files();
        let root = parser.pathmaker().root().to_path_buf();
        let include = root.join("pkg/cmp/firmware/cfg/cmp.{dep,d3}");
        assert!(files["pkg"]["cmp"][&include].contains(&root.join("pkg/firmware/cfg/top.dep")));
        assert!(files["pkg"][""].contains_key(&root.join("pkg/firmware/hdl/*.vhd")));
    }

    /// An include whose target is missing at the root aborts the run
    #[test]
    fn test_missing_root_file_is_fatal() {
        let area = create_work_area(&[]);
        assert!(matches!(
            resolve(area.path(), &[], "pkg", "", "top.dep"),
            Err(Error::MissingFile(_))
        ));
    }
}
