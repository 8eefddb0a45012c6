//! # Configuration
//!
//! Options for one translation run. The CLI fills this in from its flags;
//! library users construct it directly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output directory for shader files, relative to the package directory.
    pub output: PathBuf,

    /// Comma-separated list of function names never to translate.
    pub exclude: String,

    /// Keep the intermediate Go files in `<output>/imports`.
    pub keep: bool,

    /// Verbose progress logging, including a dump of the call graph.
    pub debug: bool,

    /// External WGSL validator invoked on each generated kernel file.
    pub validator: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output: PathBuf::from("shaders"),
            exclude: "Update,Defaults".to_string(),
            keep: false,
            debug: false,
            validator: "naga".to_string(),
        }
    }
}

impl Config {
    /// The exclude list parsed into a set of names.
    pub fn exclude_set(&self) -> BTreeSet<String> {
        self.exclude
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Directory holding intermediate extracted Go files.
    pub fn imports_dir(&self, package_dir: &std::path::Path) -> PathBuf {
        package_dir.join(&self.output).join("imports")
    }

    /// Directory receiving generated `.wgsl` files.
    pub fn output_dir(&self, package_dir: &std::path::Path) -> PathBuf {
        package_dir.join(&self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_exclude_set() {
        let cfg = Config::default();
        let set = cfg.exclude_set();
        assert!(set.contains("Update"));
        assert!(set.contains("Defaults"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn exclude_set_ignores_blanks() {
        let cfg = Config {
            exclude: " Init, ,Reset,".to_string(),
            ..Config::default()
        };
        let set: Vec<_> = cfg.exclude_set().into_iter().collect();
        assert_eq!(set, vec!["Init".to_string(), "Reset".to_string()]);
    }
}
