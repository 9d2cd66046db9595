//! Throwaway work areas for unit tests.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::parser::DepFileParser;
use crate::pathmaker::Pathmaker;

/// A temporary work-area root populated with files.
pub struct WorkArea {
    dir: TempDir,
}

impl WorkArea {
    /// Creates the area with `(path relative to the root, contents)` files.
    pub fn new(files: &[(&str, &str)]) -> WorkArea {
        let area = WorkArea {
            dir: TempDir::new().unwrap(),
        };
        for (rel, contents) in files {
            area.write(rel, contents);
        }
        area
    }

    pub fn write(&self, rel: &str, contents: &str) {
        let path = self.dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn pathmaker(&self) -> Pathmaker {
        Pathmaker::new(self.root(), 0)
    }

    /// Absolute path of `rel`, as the pathmaker spells it.
    pub fn path(&self, rel: &str) -> PathBuf {
        self.pathmaker().root().join(rel)
    }

    pub fn parser(&self, overrides: &[&str]) -> DepFileParser {
        DepFileParser::new("vivado", self.pathmaker(), overrides, 2).unwrap()
    }
}
