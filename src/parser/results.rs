use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::Symbol;
use crate::command::{Command, CommandKind};
use crate::config::Config;
use crate::depfile::{DepFileId, DepTree, LineError, Unresolved};

use super::DepFileParser;

/// Packages and their components, both in first-seen order and without repetitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageMap {
    entries: Vec<(Symbol, Vec<Symbol>)>,
}

impl PackageMap {
    pub fn insert(&mut self, package: &Symbol, component: &Symbol) {
        let index = match self.entries.iter().position(|(p, _)| p == package) {
            Some(i) => i,
            None => {
                self.entries.push((package.clone(), Vec::new()));
                self.entries.len() - 1
            }
        };
        let components = &mut self.entries[index].1;
        if !components.contains(component) {
            components.push(component.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn packages(&self) -> impl Iterator<Item = &Symbol> {
        self.entries.iter().map(|(p, _)| p)
    }

    pub fn components(&self, package: &str) -> Option<&[Symbol]> {
        self.entries
            .iter()
            .find(|(p, _)| &**p == package)
            .map(|(_, c)| c.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &[Symbol])> {
        self.entries.iter().map(|(p, c)| (p, c.as_slice()))
    }
}

/// Read-back of a completed run.
impl DepFileParser {
    /// Deduplicated commands of one kind, in include-inlined order.
    ///
    /// `include` commands are inlined during flattening, so that list is always empty.
    pub fn commands(&self, kind: CommandKind) -> &[Command] {
        self.commands.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn packages(&self) -> &PackageMap {
        &self.packages
    }

    /// Libraries named by `src` commands, in first-seen order.
    pub fn libs(&self) -> &[Symbol] {
        &self.libs
    }

    /// Line errors of every parsed file, in parse order.
    pub fn errors(&self) -> Vec<&LineError> {
        self.tree.files().flat_map(|(_, f)| &f.errors).collect()
    }

    /// Unmatched file expressions of every parsed file, in parse order.
    pub fn unresolved(&self) -> Vec<&Unresolved> {
        self.tree.files().flat_map(|(_, f)| &f.unresolved).collect()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Mutable access to the variable store, which is locked once [`parse`](Self::parse) returns.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn tree(&self) -> &DepTree {
        &self.tree
    }

    /// The top-level file, once parsed.
    pub fn root(&self) -> Option<DepFileId> {
        self.root
    }

    pub fn unresolved_paths(&self) -> BTreeSet<PathBuf> {
        self.unresolved()
            .into_iter()
            .map(|u| u.expression.clone())
            .collect()
    }

    /// Packages referenced by unresolved expressions that are missing from the work area.
    pub fn unresolved_packages(&self) -> BTreeSet<String> {
        self.unresolved()
            .into_iter()
            .filter(|u| !self.pathmaker.package_exists(&u.package))
            .map(|u| u.package.to_string())
            .collect()
    }

    /// Components referenced by unresolved expressions whose directory is missing, by package.
    pub fn unresolved_components(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut missing: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for u in self.unresolved() {
            if self
                .pathmaker
                .path(&u.package, Some(&*u.component), None, None, None)
                .exists()
            {
                continue;
            }
            missing
                .entry(u.package.to_string())
                .or_default()
                .insert(u.component.to_string());
        }
        missing
    }

    /// Unresolved expressions by package and component, each with the files referencing it.
    pub fn unresolved_files(
        &self,
    ) -> BTreeMap<String, BTreeMap<String, BTreeMap<PathBuf, BTreeSet<PathBuf>>>> {
        let mut files: BTreeMap<String, BTreeMap<String, BTreeMap<PathBuf, BTreeSet<PathBuf>>>> =
            BTreeMap::new();
        for u in self.unresolved() {
            files
                .entry(u.package.to_string())
                .or_default()
                .entry(u.component.to_string())
                .or_default()
                .entry(u.expression.clone())
                .or_default()
                .insert(u.dep_file.clone());
        }
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_map_first_seen_order() {
        let mut map = PackageMap::default();
        for (p, c) in [("b", "x"), ("a", ""), ("b", "y"), ("b", "x"), ("a", "")] {
            map.insert(&Symbol::from(p), &Symbol::from(c));
        }

        assert_eq!(map.len(), 2);
        assert_eq!(
            map.packages().map(|p| p.to_string()).collect::<Vec<_>>(),
            vec!["b", "a"]
        );
        assert_eq!(
            map.components("b"),
            Some(&[Symbol::from("x"), Symbol::from("y")][..])
        );
        assert_eq!(map.components("a"), Some(&[Symbol::from("")][..]));
        assert_eq!(map.components("c"), None);
    }
}
