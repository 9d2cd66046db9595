//! Shell-style wildcard expansion over the work area.
//!
//! Supports `*`, `?` and `[...]` classes (`[!...]` negated) within a path component, like
//! POSIX `glob(3)`: wildcards never cross `/`, and names starting with `.` only match
//! patterns that start with `.` too.

use std::path::{Component, Path, PathBuf};

use regex::Regex;
use walkdir::WalkDir;

fn has_magic(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

/// Translates one path component pattern into an anchored regex.
fn translate(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut re = String::from("^");
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            '[' => {
                let mut j = i + 1;
                if j < chars.len() && chars[j] == '!' {
                    j += 1;
                }
                if j < chars.len() && chars[j] == ']' {
                    j += 1;
                }
                while j < chars.len() && chars[j] != ']' {
                    j += 1;
                }
                if j >= chars.len() {
                    re.push_str(r"\[");
                } else {
                    let mut class: String = chars[i + 1..j].iter().collect();
                    if let Some(rest) = class.strip_prefix('!') {
                        class = format!("^{}", rest);
                    }
                    re.push('[');
                    re.push_str(&class.replace('\\', r"\\").replace('[', r"\["));
                    re.push(']');
                    i = j;
                }
            }
            c => re.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    re.push('$');
    re
}

struct ComponentPattern {
    regex: Regex,
    allows_hidden: bool,
}

impl ComponentPattern {
    fn new(pattern: &str) -> Option<ComponentPattern> {
        Some(ComponentPattern {
            regex: Regex::new(&translate(pattern)).ok()?,
            allows_hidden: pattern.starts_with('.'),
        })
    }

    fn matches(&self, name: &str) -> bool {
        (self.allows_hidden || !name.starts_with('.')) && self.regex.is_match(name)
    }
}

/// Expands `pattern` into the sorted list of existing paths it matches.
pub fn glob(pattern: &Path) -> Vec<PathBuf> {
    let components: Vec<Component> = pattern.components().collect();
    let first_magic = components
        .iter()
        .position(|c| matches!(c, Component::Normal(s) if has_magic(&s.to_string_lossy())));

    let Some(first_magic) = first_magic else {
        return if pattern.exists() {
            vec![pattern.to_path_buf()]
        } else {
            vec![]
        };
    };

    let base: PathBuf = components[..first_magic].iter().collect();
    let patterns: Option<Vec<ComponentPattern>> = components[first_magic..]
        .iter()
        .map(|c| ComponentPattern::new(&c.as_os_str().to_string_lossy()))
        .collect();
    let Some(patterns) = patterns else {
        return vec![];
    };

    WalkDir::new(&base)
        .min_depth(patterns.len())
        .max_depth(patterns.len())
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || patterns[e.depth() - 1].matches(&e.file_name().to_string_lossy())
        })
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .collect()
}
