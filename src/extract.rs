//! # Region extractor
//!
//! Keeps the `//gosl:start` ... `//gosl:end` regions of each tagged file,
//! flattens imported packages into one namespace by stripping their
//! `pkg.` prefixes, captures kernel functions, and writes the result to
//! `<out>/imports` as a self-contained Go file for the front end.

use crate::directives::{Directive, DEFAULT_SYSTEM};
use crate::error::{GoslError, Result};
use crate::state::{Kernel, SourceFile, State};
use std::collections::BTreeSet;
use std::path::Path;

/// Package clause of every extracted file.
pub const PACKAGE: &str = "imports";

/// Imports every extracted file gets, in this order.
const SYNTHETIC_IMPORTS: &[&str] = &[
    "math",
    "cogentcore.org/lab/gosl/slbool",
    "cogentcore.org/lab/gosl/slrand",
    "cogentcore.org/lab/gosl/sltype",
    "cogentcore.org/lab/tensor",
];

/// Import paths of the runtime-support family, never re-imported.
const SUPPORT_FAMILY: &str = "cogentcore.org/lab/gosl/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Outside,
    InRegion,
    /// A `//gosl:wgsl` block, returning to `InRegion` when the flag is set.
    Wgsl(bool),
    NoWgsl(bool),
}

impl Region {
    fn after_end(self) -> Region {
        match self {
            Region::Wgsl(true) | Region::NoWgsl(true) => Region::InRegion,
            _ => Region::Outside,
        }
    }
}

/// Result of extracting one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracted {
    /// The full intermediate file: header followed by the kept lines.
    pub lines: Vec<String>,
    /// The file holds a `//gosl:vars` block.
    pub has_vars: bool,
    /// Kernels found, with the system each one belongs to.
    pub kernels: Vec<(String, Kernel)>,
}

/// Extracts every scanned file into `<out>/imports` and records the results
/// in `state`.
pub fn extract_files(state: &mut State) -> Result<()> {
    let dir = state.config.imports_dir(&state.package_dir);
    std::fs::create_dir_all(&dir).map_err(|e| GoslError::io(&dir, e))?;
    remove_stale(&dir)?;

    let flattened: BTreeSet<String> = state.imports.keys().map(|p| last_segment(p).to_string()).collect();

    let mut jobs: Vec<(String, SourceFile)> = Vec::new();
    for (path, files) in &state.imports {
        let pkg = last_segment(path);
        for (name, file) in files {
            jobs.push((format!("{}-{}", pkg, name), file.clone()));
        }
    }
    for (name, file) in &state.files {
        jobs.push((name.clone(), file.clone()));
    }

    for (name, file) in jobs {
        let ex = extract(&file, &flattened);
        let out = SourceFile {
            name: name.clone(),
            lines: ex.lines,
        };
        let path = dir.join(&name);
        std::fs::write(&path, out.text()).map_err(|e| GoslError::io(&path, e))?;
        tracing::debug!(
            "[EXTRACT] {} -> {} ({} lines, {} kernels)",
            file.name,
            name,
            out.lines.len(),
            ex.kernels.len()
        );
        for (system, kernel) in ex.kernels {
            tracing::info!("[EXTRACT] kernel {} in system {}", kernel.name, system);
            state.system(&system).kernels.insert(kernel.name.clone(), kernel);
        }
        if ex.has_vars {
            state.go_vars_files.insert(name, out);
        } else {
            state.go_files.insert(name, out);
        }
    }
    Ok(())
}

fn remove_stale(dir: &Path) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| GoslError::io(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| GoslError::io(dir, e))?.path();
        if path.extension().is_some_and(|e| e == "go") {
            std::fs::remove_file(&path).map_err(|e| GoslError::io(&path, e))?;
        }
    }
    Ok(())
}

/// Extracts one file. `flattened` holds the package names whose prefixes
/// are stripped.
pub fn extract(file: &SourceFile, flattened: &BTreeSet<String>) -> Extracted {
    let mut kept: Vec<String> = Vec::new();
    let mut has_vars = false;
    let mut kernels = Vec::new();
    let mut capture: Option<(String, Kernel)> = None;
    let mut region = Region::Outside;

    for line in &file.lines {
        let dir = if Directive::is_marker_line(line) {
            Directive::parse(line)
        } else {
            None
        };
        match (region, &dir) {
            (Region::Outside, Some(Directive::Start)) => {
                region = Region::InRegion;
                kept.push(line.clone());
                continue;
            }
            (Region::Outside | Region::InRegion, Some(Directive::Wgsl)) => {
                region = Region::Wgsl(region == Region::InRegion);
                kept.push(line.clone());
                continue;
            }
            (Region::Outside | Region::InRegion, Some(Directive::NoWgsl)) => {
                region = Region::NoWgsl(region == Region::InRegion);
                kept.push(line.clone());
                continue;
            }
            (Region::Wgsl(_) | Region::NoWgsl(_), Some(Directive::End)) => {
                region = region.after_end();
                kept.push(line.clone());
                continue;
            }
            (Region::InRegion, Some(Directive::End)) => {
                region = Region::Outside;
                kept.push(line.clone());
                continue;
            }
            _ => {}
        }
        if matches!(dir, Some(Directive::Vars(_))) {
            has_vars = true;
        }
        if region == Region::Outside {
            continue;
        }

        let line = if is_import_line(line) {
            line.clone()
        } else {
            bool_wrappers(&strip_prefixes(line, flattened))
        };

        if region == Region::InRegion {
            let mut closed = false;
            if let Some((_, kernel)) = capture.as_mut() {
                kernel.func_code.push('\n');
                kernel.func_code.push_str(&line);
                closed = line.trim_end() == "}";
            } else {
                capture = kernel_signature(&line);
            }
            if closed {
                kernels.extend(capture.take());
            }
        }
        kept.push(line);
    }
    if let Some(open) = capture.take() {
        kernels.push(open);
    }

    let body = kept.join("\n");
    let mut lines = header(file, &body, flattened);
    lines.extend(kept);
    Extracted {
        lines,
        has_vars,
        kernels,
    }
}

/// `func Name(args) { //gosl:kernel [system]`
fn kernel_signature(line: &str) -> Option<(String, Kernel)> {
    let Some(Directive::Kernel(system)) = Directive::find(line) else {
        return None;
    };
    let rest = line.trim_start().strip_prefix("func ")?;
    let open = rest.find('(')?;
    let close = rest.find(')')?;
    let name = rest[..open].trim().to_string();
    if name.is_empty() || close < open {
        return None;
    }
    let system = if system.is_empty() {
        DEFAULT_SYSTEM.to_string()
    } else {
        system
    };
    let kernel = Kernel {
        name,
        args: rest[open + 1..close].trim().to_string(),
        func_code: line.to_string(),
        ..Default::default()
    };
    Some((system, kernel))
}

/// Synthetic package clause and import block.
fn header(file: &SourceFile, body: &str, flattened: &BTreeSet<String>) -> Vec<String> {
    let mut paths: Vec<String> = SYNTHETIC_IMPORTS.iter().map(|p| p.to_string()).collect();
    for (alias, path) in file_imports(&file.lines) {
        if path.starts_with(SUPPORT_FAMILY) || paths.contains(&path) {
            continue;
        }
        let name = alias.unwrap_or_else(|| last_segment(&path).to_string());
        if flattened.contains(&name) || !references(body, &name) {
            continue;
        }
        paths.push(path);
    }
    let mut lines = vec![format!("package {}", PACKAGE), String::new(), "import (".to_string()];
    lines.extend(paths.iter().map(|p| format!("\t{:?}", p)));
    lines.push(")".to_string());
    lines.push(String::new());
    lines
}

/// Import specs of a file: `(alias, path)`.
fn file_imports(lines: &[String]) -> Vec<(Option<String>, String)> {
    let mut out = Vec::new();
    let mut in_block = false;
    for line in lines {
        let t = line.trim();
        let spec = if in_block {
            if t.starts_with(')') {
                in_block = false;
                continue;
            }
            t
        } else if t == "import (" {
            in_block = true;
            continue;
        } else if let Some(rest) = t.strip_prefix("import ") {
            rest.trim()
        } else {
            continue;
        };
        let Some(q) = spec.find('"') else { continue };
        let Some(end) = spec[q + 1..].find('"') else { continue };
        let path = spec[q + 1..q + 1 + end].to_string();
        let alias = spec[..q].trim();
        let alias = (!alias.is_empty()).then(|| alias.to_string());
        out.push((alias, path));
    }
    out
}

fn is_import_line(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("import ") || (t.starts_with('"') && t.trim_end().ends_with('"'))
}

pub fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Whether `pkg.` occurs in `text` as a qualified reference.
fn references(text: &str, pkg: &str) -> bool {
    let pat = format!("{}.", pkg);
    text.match_indices(&pat).any(|(i, _)| {
        text[..i].chars().next_back().map_or(true, |c| !is_ident_char(c) && c != '.')
    })
}

/// Removes `pkg.` qualifiers of flattened packages from a line.
pub fn strip_prefixes(line: &str, flattened: &BTreeSet<String>) -> String {
    let mut out = line.to_string();
    for pkg in flattened {
        let pat = format!("{}.", pkg);
        let mut result = String::with_capacity(out.len());
        let mut rest = out.as_str();
        while let Some(i) = rest.find(&pat) {
            result.push_str(&rest[..i]);
            if result.chars().next_back().is_some_and(|c| is_ident_char(c) || c == '.') {
                result.push_str(&pat);
            }
            rest = &rest[i + pat.len()..];
        }
        result.push_str(rest);
        out = result;
    }
    out
}

/// Rewrites the boolean-wrapper helpers: `x.IsTrue()` to `x == 1`.
pub fn bool_wrappers(line: &str) -> String {
    if Directive::is_marker_line(line) {
        return line.to_string();
    }
    line.replace(".IsTrue()", " == 1").replace(".IsFalse()", " == 0")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(text: &str) -> SourceFile {
        SourceFile::new("a.go", text)
    }

    const SRC: &str = r#"package sim

import (
	"fmt"
	"sync/atomic"

	"example.com/sim/physics"
	"cogentcore.org/lab/gosl/slbool"
)

func hostOnly() { fmt.Println("x") }

//gosl:start

//gosl:vars
var (
	Data []float32
)

func Compute(i uint32) { //gosl:kernel
	physics.Step(&Data[i])
	if slbool.True.IsTrue() {
		atomic.AddInt32(nil, 1)
	}
}

//gosl:end

//gosl:wgsl
// fn extra() {}
//gosl:end
"#;

    fn flattened() -> BTreeSet<String> {
        ["physics".to_string()].into()
    }

    #[test]
    fn keeps_regions_and_builds_header() {
        let ex = extract(&source(SRC), &flattened());
        assert!(ex.has_vars);
        assert_eq!(ex.lines[0], "package imports");
        assert!(ex.lines.contains(&"\t\"sync/atomic\"".to_string()));
        assert!(!ex.lines.iter().any(|l| l.contains("\"fmt\"")));
        assert!(!ex.lines.iter().any(|l| l.contains("example.com/sim/physics")));
        assert!(!ex.lines.iter().any(|l| l.contains("hostOnly")));
        assert!(ex.lines.contains(&"\tStep(&Data[i])".to_string()));
        assert!(ex.lines.contains(&"\tif slbool.True == 1 {".to_string()));
        assert!(ex.lines.contains(&"//gosl:start".to_string()));
        assert!(ex.lines.contains(&"// fn extra() {}".to_string()));
    }

    #[test]
    fn captures_kernels() {
        let ex = extract(&source(SRC), &flattened());
        assert_eq!(ex.kernels.len(), 1);
        let (system, kernel) = &ex.kernels[0];
        assert_eq!(system, "Default");
        assert_eq!(kernel.name, "Compute");
        assert_eq!(kernel.args, "i uint32");
        assert!(kernel.func_code.starts_with("func Compute(i uint32) {"));
        assert!(kernel.func_code.ends_with('}'));
    }

    #[test]
    fn extraction_is_idempotent() {
        let once = extract(&source(SRC), &flattened());
        let again = extract(
            &SourceFile {
                name: "a.go".into(),
                lines: once.lines.clone(),
            },
            &flattened(),
        );
        assert_eq!(once.lines, again.lines);
        assert_eq!(once.kernels, again.kernels);
    }

    #[test]
    fn prefix_stripping_respects_identifiers() {
        let set: BTreeSet<String> = ["vec".to_string()].into();
        assert_eq!(strip_prefixes("x := vec.New(a.vec.B)", &set), "x := New(a.vec.B)");
        assert_eq!(strip_prefixes("myvec.X + vec.Y", &set), "myvec.X + Y");
    }
}
