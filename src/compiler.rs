//! # Translation driver
//!
//! Main entry point for translating a tagged Go package into WGSL kernels.

use crate::codegen::{print_file, Mode};
use crate::config::Config;
use crate::diag::{self, Diagnostic};
use crate::error::{GoslError, Result};
use crate::go::{parse_file, File, TypeEnv};
use crate::kernel::{self, Validator};
use crate::sledits::{sl_edits, SupportUse};
use crate::state::State;
use crate::wgsl::extract_wgsl;
use crate::{align, extract, gengpu, scan};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// What a translation run produced.
#[derive(Debug, Clone, Default)]
pub struct Summary {
    /// Generated kernel files, in generation order.
    pub kernels: Vec<PathBuf>,
    /// Translation diagnostics, each reported once.
    pub diagnostics: Vec<Diagnostic>,
    /// Struct layout warnings.
    pub warnings: Vec<String>,
}

/// Translate the Go package in `dir` into WGSL compute shaders
///
/// This is the main entry point of the translator. It scans `dir` (and every
/// package named by a `//gosl:import` directive) for `//gosl:` regions,
/// translates the code reachable from each `//gosl:kernel` function into
/// `<out>/<Kernel>.wgsl`, and writes the host bindings.
///
/// # Arguments
///
/// * `config` - Output directory, exclusions and validator
/// * `dir` - The package directory; must be inside a Go module
///
/// # Returns
///
/// * `Ok(Summary)` - Generated files plus any per-line diagnostics
/// * `Err(GoslError)` - A fatal error; nothing useful was generated
///
/// # Examples
///
/// ```rust,no_run
/// use gosl::{run, Config};
///
/// match run(Config::default(), "./sim") {
///     Ok(summary) => println!("{} kernels", summary.kernels.len()),
///     Err(e) => eprintln!("Error: {}", e),
/// }
/// ```
pub fn run(config: Config, dir: impl AsRef<Path>) -> Result<Summary> {
    let dir = dir.as_ref();
    tracing::info!("[GOSL] Translating {}", dir.display());
    let mut state = State::new(config, dir);
    let mut summary = Summary::default();

    // Phase 1: Find tagged files
    tracing::info!("[GOSL] Phase 1: Scanning for gosl files...");
    scan::scan_package(&mut state)?;
    tracing::info!(
        "[GOSL] Package {}: {} files, {} imported packages",
        state.package,
        state.files.len(),
        state.imports.len()
    );

    // Phase 2: Extract regions
    tracing::info!("[GOSL] Phase 2: Extracting gosl regions...");
    extract::extract_files(&mut state)?;
    tracing::info!("[GOSL] Found {} kernels", state.num_kernels());

    // Phase 3: Parse extracted files
    tracing::info!("[GOSL] Phase 3: Loading extracted package...");
    let imports_dir = state.config.imports_dir(&state.package_dir);
    let files = load_package(&imports_dir)?;
    let env = TypeEnv::from_files(files.values());
    summary.warnings = align::check(files.values(), &env);

    // Phase 4: Call graph and system variables
    tracing::info!("[GOSL] Phase 4: Building call graph...");
    for name in state.ordered_files() {
        let Some(file) = files.get(&name) else {
            tracing::warn!("[GOSL] {} is not in the loaded package, skipping", name);
            continue;
        };
        let printed = print_file(&mut state, &env, file, Mode::Graph)?;
        for d in &printed.diags {
            tracing::debug!("[GOSL] graph pass: {}", d);
        }
    }
    tracing::info!("[GOSL] Call graph has {} functions", state.func_graph.len());
    if state.config.debug {
        for line in graph_report(&state) {
            tracing::info!("[GOSL] {}", line);
        }
    }
    if !state.config.keep {
        std::fs::remove_dir_all(&imports_dir).map_err(|e| GoslError::io(&imports_dir, e))?;
    }

    // Phase 5: Emit kernels
    tracing::info!("[GOSL] Phase 5: Generating kernels...");
    let out = state.config.output_dir(&state.package_dir);
    kernel::write_support_files(&out)?;
    let mut validator = Validator::new(state.config.validator.clone());
    let targets: Vec<(String, String)> = state
        .systems
        .iter()
        .flat_map(|(sys, s)| s.kernels.keys().map(move |k| (sys.clone(), k.clone())))
        .collect();
    for (system, name) in targets {
        let Some(lines) = emit_kernel(&mut state, &env, &files, &system, &name, &mut summary.diagnostics)? else {
            continue;
        };
        let filename = format!("{}.wgsl", name);
        let path = out.join(&filename);
        let mut text = lines.join("\n");
        text.push('\n');
        std::fs::write(&path, text).map_err(|e| GoslError::io(&path, e))?;
        tracing::info!("[GOSL] Wrote {} ({} lines)", path.display(), lines.len());
        if let Some(k) = state.system(&system).kernels.get_mut(&name) {
            k.filename = filename.clone();
            k.lines = lines;
        }
        validator.validate(&out, &filename);
        summary.kernels.push(path);
    }
    diag::report(&summary.diagnostics);

    // Phase 6: Host bindings
    tracing::info!("[GOSL] Phase 6: Writing host bindings...");
    gengpu::generate(&state)?;

    tracing::info!(
        "[GOSL] Translation complete: {} kernels, {} diagnostics",
        summary.kernels.len(),
        summary.diagnostics.len()
    );
    Ok(summary)
}

/// Parses every extracted file; they must form exactly one package.
fn load_package(dir: &Path) -> Result<BTreeMap<String, File>> {
    let mut files = BTreeMap::new();
    let entries = std::fs::read_dir(dir).map_err(|e| GoslError::io(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| GoslError::io(dir, e))?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        if !name.ends_with(".go") {
            continue;
        }
        let text = std::fs::read_to_string(&path).map_err(|e| GoslError::io(&path, e))?;
        let file = parse_file(&name, &text).map_err(|e| GoslError::Parse {
            file: name.clone(),
            line: e.line,
            message: e.message,
        })?;
        files.insert(name, file);
    }

    let packages: BTreeSet<&str> = files.values().map(|f| f.package.as_str()).collect();
    match packages.len() {
        0 => Err(GoslError::NoPackage(dir.to_path_buf())),
        1 => Ok(files),
        _ => Err(GoslError::MultiplePackages {
            dir: dir.to_path_buf(),
            names: packages.into_iter().map(str::to_string).collect(),
        }),
    }
}

/// One line per recorded function: its direct callees and atomic vars.
fn graph_report(state: &State) -> Vec<String> {
    state
        .func_graph
        .values()
        .map(|f| {
            let calls: Vec<&str> = f.funcs.iter().map(String::as_str).collect();
            let mut line = format!("{} -> [{}]", f.name, calls.join(", "));
            if !f.atomics.is_empty() {
                let atomics: Vec<&str> = f.atomics.iter().map(String::as_str).collect();
                line.push_str(&format!(" atomic [{}]", atomics.join(", ")));
            }
            line
        })
        .collect()
}

/// Assembles the WGSL text of one kernel, or `None` when it cannot be
/// reached in the call graph. New diagnostics are appended to `diags`.
fn emit_kernel(
    state: &mut State,
    env: &TypeEnv,
    files: &BTreeMap<String, File>,
    system: &str,
    name: &str,
    diags: &mut Vec<Diagnostic>,
) -> Result<Option<Vec<String>>> {
    let Some(funcs) = state.all_funcs(name) else {
        tracing::error!("[GOSL] {}", GoslError::KernelNotFound(name.to_string()));
        return Ok(None);
    };
    tracing::debug!("[GOSL] {} closure: {:?}", name, funcs);
    let atomics = state.atomic_vars(&funcs);

    // header and trailer only read the system, printing needs the state
    let sys = state.system(system).clone();
    let Some(kern) = sys.kernels.get(name) else {
        return Ok(None);
    };
    let mut lines = kernel::header(&sys, kern, &atomics);
    let mut usage = SupportUse::default();
    for file_name in state.ordered_files() {
        let Some(file) = files.get(&file_name) else {
            continue;
        };
        let printed = print_file(state, env, file, Mode::Emit(&funcs))?;
        for d in printed.diags {
            if !diags.contains(&d) {
                diags.push(d);
            }
        }
        let mut text = printed.lines;
        let used = sl_edits(&mut text);
        usage.slrand |= used.slrand;
        usage.sltype |= used.sltype;
        lines.extend(extract_wgsl(&text));
    }
    lines.extend(kernel::trailer(&sys, usage));
    Ok(Some(lines))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Kernel;

    fn two_kernels() -> State {
        let mut state = State::new(Config::default(), ".");
        for name in ["Ghost", "Real"] {
            state.system("Default").kernels.insert(
                name.to_string(),
                Kernel {
                    name: name.to_string(),
                    args: "i uint32".to_string(),
                    ..Default::default()
                },
            );
        }
        state.recycle_func("Real").funcs.insert("Helper".to_string());
        state.recycle_func("Helper").atomics.insert("Counts".to_string());
        state
    }

    #[test]
    fn kernel_missing_from_graph_is_skipped() {
        let mut state = two_kernels();
        let env = TypeEnv::default();
        let files = BTreeMap::new();
        let mut diags = Vec::new();

        let ghost = emit_kernel(&mut state, &env, &files, "Default", "Ghost", &mut diags).unwrap();
        assert!(ghost.is_none());

        let real = emit_kernel(&mut state, &env, &files, "Default", "Real", &mut diags)
            .unwrap()
            .unwrap();
        assert!(real.iter().any(|l| l == "\tReal(idx);"), "{:?}", real);
        assert!(diags.is_empty());
    }

    #[test]
    fn graph_report_lists_callees() {
        let state = two_kernels();
        assert_eq!(
            graph_report(&state),
            ["Helper -> [] atomic [Counts]", "Real -> [Helper]"]
        );
    }

    #[test]
    fn load_requires_one_package() {
        let tmp = tempfile::tempdir().unwrap();
        let err = load_package(tmp.path()).unwrap_err();
        assert!(matches!(err, GoslError::NoPackage(_)));

        std::fs::write(tmp.path().join("a.go"), "package imports\n").unwrap();
        std::fs::write(tmp.path().join("b.go"), "package other\n").unwrap();
        let err = load_package(tmp.path()).unwrap_err();
        match err {
            GoslError::MultiplePackages { names, .. } => assert_eq!(names, ["imports", "other"]),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn parse_errors_name_the_file() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("bad.go"), "package imports\n\nfunc (\n").unwrap();
        let err = load_package(tmp.path()).unwrap_err();
        assert!(matches!(err, GoslError::Parse { ref file, .. } if file == "bad.go"));
    }
}
