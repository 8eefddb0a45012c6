//! # Package scanner
//!
//! Finds the Go files that carry `//gosl:` directives in the package
//! directory and, transitively, in every package named by a
//! `//gosl:import` directive.

use crate::directives::{Directive, PREFIX};
use crate::error::{GoslError, Result};
use crate::state::{SourceFile, State};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Name of the generated host binding file, never scanned.
pub const GENERATED_FILE: &str = "gosl.go";

/// The enclosing Go module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub root: PathBuf,
    /// Module path from the `module` line of `go.mod`.
    pub path: String,
}

/// Walks up from `dir` to the directory holding `go.mod`.
pub fn find_module(dir: &Path) -> Result<Module> {
    let start = dir.canonicalize().map_err(|e| GoslError::io(dir, e))?;
    let mut cur = Some(start.as_path());
    while let Some(d) = cur {
        let gomod = d.join("go.mod");
        if gomod.is_file() {
            let text = std::fs::read_to_string(&gomod).map_err(|e| GoslError::io(&gomod, e))?;
            let path = text
                .lines()
                .find_map(|l| l.trim().strip_prefix("module "))
                .map(|m| m.trim().trim_matches('"').to_string())
                .unwrap_or_default();
            return Ok(Module {
                root: d.to_path_buf(),
                path,
            });
        }
        cur = d.parent();
    }
    Err(GoslError::NoModule(dir.to_path_buf()))
}

/// Fills `state.files`, `state.imports` and `state.package`.
pub fn scan_package(state: &mut State) -> Result<()> {
    let module = find_module(&state.package_dir)?;
    tracing::debug!("[SCAN] module {} at {}", module.path, module.root.display());

    let files = tagged_files(&state.package_dir)?;
    if let Some(name) = files.values().find_map(package_name) {
        state.package = name;
    }

    let mut queue: VecDeque<String> = import_directives(files.values()).into();
    state.files = files;

    let mut visited = BTreeSet::new();
    while let Some(path) = queue.pop_front() {
        if !visited.insert(path.clone()) {
            continue;
        }
        let Some(dir) = resolve_import(&path, &module, &state.package_dir) else {
            tracing::warn!("[SCAN] cannot resolve gosl import {:?}, skipping", path);
            continue;
        };
        let files = match tagged_files(&dir) {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!("[SCAN] cannot read gosl import {:?}: {}", path, e);
                continue;
            }
        };
        tracing::debug!("[SCAN] import {} -> {} files", path, files.len());
        queue.extend(import_directives(files.values()));
        if !files.is_empty() {
            state.imports.insert(path, files);
        }
    }
    Ok(())
}

/// Non-test `.go` files in `dir` that contain a directive.
pub fn tagged_files(dir: &Path) -> Result<BTreeMap<String, SourceFile>> {
    let mut files = BTreeMap::new();
    let entries = std::fs::read_dir(dir).map_err(|e| GoslError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| GoslError::io(dir, e))?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        if !name.ends_with(".go") || name.ends_with("_test.go") || name == GENERATED_FILE {
            continue;
        }
        if !path.is_file() {
            continue;
        }
        let text = std::fs::read_to_string(&path).map_err(|e| GoslError::io(&path, e))?;
        if !text.contains(PREFIX) {
            continue;
        }
        files.insert(name.clone(), SourceFile::new(name, &text));
    }
    Ok(files)
}

/// The package clause of a file, if any.
pub fn package_name(file: &SourceFile) -> Option<String> {
    file.lines.iter().find_map(|l| {
        l.trim()
            .strip_prefix("package ")
            .map(|n| n.split_whitespace().next().unwrap_or("").to_string())
    })
}

fn import_directives<'a>(files: impl Iterator<Item = &'a SourceFile>) -> Vec<String> {
    let mut out = Vec::new();
    for file in files {
        for line in &file.lines {
            if let Some(Directive::Import(path)) = Directive::find(line) {
                if !path.is_empty() && !out.contains(&path) {
                    out.push(path);
                }
            }
        }
    }
    out
}

/// Directory of an imported package: module-local paths and relative paths
/// are resolved directly, anything else is asked of `go list`.
fn resolve_import(path: &str, module: &Module, package_dir: &Path) -> Option<PathBuf> {
    if path.starts_with('.') {
        let dir = package_dir.join(path);
        return dir.is_dir().then_some(dir);
    }
    if !module.path.is_empty() {
        if let Some(rest) = path.strip_prefix(&module.path) {
            let dir = module.root.join(rest.trim_start_matches('/'));
            if dir.is_dir() {
                return Some(dir);
            }
        }
    }
    let output = Command::new("go")
        .args(["list", "-find", "-f", "{{.Dir}}", path])
        .current_dir(package_dir)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let dir = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim());
    dir.is_dir().then_some(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn write(dir: &Path, name: &str, text: &str) {
        std::fs::write(dir.join(name), text).unwrap();
    }

    #[test]
    fn requires_go_mod() {
        let tmp = tempfile::tempdir().unwrap();
        let err = find_module(tmp.path()).unwrap_err();
        assert!(matches!(err, GoslError::NoModule(_)));
    }

    #[test]
    fn finds_tagged_files_and_local_imports() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(root, "go.mod", "module example.com/sim\n\ngo 1.22\n");
        std::fs::create_dir(root.join("physics")).unwrap();
        write(
            root,
            "sim.go",
            "package sim\n\n//gosl:import \"example.com/sim/physics\"\n\n//gosl:start\nfunc A() {}\n//gosl:end\n",
        );
        write(root, "plain.go", "package sim\n\nfunc B() {}\n");
        write(root, "sim_test.go", "package sim\n\n//gosl:start\n");
        write(root, GENERATED_FILE, "package sim\n\n//gosl:start\n");
        write(
            &root.join("physics"),
            "phys.go",
            "package physics\n\n//gosl:start\nfunc Step() {}\n//gosl:end\n",
        );

        let mut state = State::new(Config::default(), root);
        scan_package(&mut state).unwrap();
        assert_eq!(state.package, "sim");
        assert_eq!(state.files.keys().collect::<Vec<_>>(), vec!["sim.go"]);
        let phys = &state.imports["example.com/sim/physics"];
        assert!(phys.contains_key("phys.go"));
    }
}
