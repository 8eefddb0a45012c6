//! # Translation State
//!
//! Everything one run knows: configuration, the source files found by the
//! scanner, the extracted intermediate files, the named compute systems with
//! their kernels and variable groups, and the function call graph.
//!
//! The call graph is an arena keyed by function name. Edges are names too,
//! which is sound because all translated code lives in one flat namespace
//! once package prefixes have been stripped.

use crate::config::Config;
use crate::directives::DEFAULT_SYSTEM;
use crate::error::{GoslError, Result};
use crate::sledits::shader_type_name;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// A source file held as lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub lines: Vec<String>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, content: &str) -> Self {
        Self {
            name: name.into(),
            lines: content.lines().map(str::to_string).collect(),
        }
    }

    /// The file contents with a trailing newline.
    pub fn text(&self) -> String {
        let mut s = self.lines.join("\n");
        s.push('\n');
        s
    }
}

/// Element kind of a tensor variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum TensorKind {
    F32,
    I32,
    U32,
}

impl TensorKind {
    /// Maps a declared tensor type such as `tensor.Float32`.
    pub fn from_type(typ: &str) -> Option<Self> {
        match typ.trim_start_matches('*') {
            "tensor.Float32" => Some(TensorKind::F32),
            "tensor.Int32" => Some(TensorKind::I32),
            "tensor.Uint32" => Some(TensorKind::U32),
            _ => None,
        }
    }

    pub fn wgsl_type(self) -> &'static str {
        match self {
            TensorKind::F32 => "f32",
            TensorKind::I32 => "i32",
            TensorKind::U32 => "u32",
        }
    }

    fn index_tag(self) -> &'static str {
        match self {
            TensorKind::F32 => "F32",
            TensorKind::I32 => "I32",
            TensorKind::U32 => "U32",
        }
    }
}

/// One global GPU buffer variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Var {
    pub name: String,
    pub doc: String,
    /// Declared Go type: `[]Elem` or `tensor.Float32` etc.
    #[serde(rename = "type")]
    pub typ: String,
    pub read_only: bool,
    pub tensor: bool,
    pub tensor_dims: usize,
    pub tensor_kind: Option<TensorKind>,
}

impl Var {
    pub fn new(name: impl Into<String>, typ: impl Into<String>, read_only: bool) -> Self {
        let typ = typ.into();
        let tensor_kind = TensorKind::from_type(&typ);
        Self {
            name: name.into(),
            doc: String::new(),
            typ,
            read_only,
            tensor: tensor_kind.is_some(),
            tensor_dims: 0,
            tensor_kind,
        }
    }

    /// Go element type of a slice variable (`[]Params` -> `Params`).
    pub fn go_elem_type(&self) -> &str {
        self.typ.strip_prefix("[]").unwrap_or(&self.typ)
    }

    /// Element type as written in the shader.
    pub fn sl_type(&self) -> String {
        match self.tensor_kind {
            Some(kind) => kind.wgsl_type().to_string(),
            None => shader_type_name(self.go_elem_type()),
        }
    }

    /// Name of the generated tensor index helper, e.g. `IndexF322D`.
    pub fn index_func(&self) -> String {
        let tag = self.tensor_kind.map(TensorKind::index_tag).unwrap_or("F32");
        format!("Index{}{}D", tag, self.tensor_dims)
    }

    /// Name of the generated host accessor function.
    pub fn get_func_name(&self) -> String {
        format!("Get{}", self.name)
    }
}

/// Variables sharing one binding group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub name: String,
    pub doc: String,
    pub uniform: bool,
    pub vars: Vec<Var>,
}

/// One compute entry point.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Kernel {
    pub name: String,
    /// Argument list text of the Go function signature.
    pub args: String,
    #[serde(skip)]
    pub func_code: String,
    /// Output file name, set during assembly.
    pub filename: String,
    #[serde(skip)]
    pub lines: Vec<String>,
}

/// A named collection of kernels and the variable groups they share.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct System {
    pub name: String,
    pub kernels: BTreeMap<String, Kernel>,
    pub groups: IndexMap<String, Group>,
}

impl System {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Adds a new group; a name already taken by another vars block is an error.
    pub fn add_group(&mut self, group: Group) -> Result<()> {
        if self.groups.contains_key(&group.name) {
            return Err(GoslError::GroupConflict {
                system: self.name.clone(),
                group: group.name,
            });
        }
        self.groups.insert(group.name.clone(), group);
        Ok(())
    }

    pub fn vars(&self) -> impl Iterator<Item = &Var> {
        self.groups.values().flat_map(|g| g.vars.iter())
    }
}

/// Call graph node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    /// Names of directly called functions.
    pub funcs: BTreeSet<String>,
    /// Global vars accessed with atomic operations in this body.
    pub atomics: BTreeSet<String>,
}

#[derive(Debug)]
pub struct State {
    pub config: Config,
    pub package_dir: PathBuf,
    /// Package name of the current directory.
    pub package: String,

    /// Raw tagged files of the current package.
    pub files: BTreeMap<String, SourceFile>,
    /// Raw tagged files of imported packages: import path -> filename -> file.
    pub imports: IndexMap<String, BTreeMap<String, SourceFile>>,

    /// Extracted files containing a `vars` block; always processed first.
    pub go_vars_files: BTreeMap<String, SourceFile>,
    /// All other extracted files.
    pub go_files: BTreeMap<String, SourceFile>,

    pub systems: BTreeMap<String, System>,
    pub func_graph: BTreeMap<String, Function>,

    pub exclude: BTreeSet<String>,
}

impl State {
    pub fn new(config: Config, package_dir: impl Into<PathBuf>) -> Self {
        let exclude = config.exclude_set();
        let mut systems = BTreeMap::new();
        systems.insert(DEFAULT_SYSTEM.to_string(), System::new(DEFAULT_SYSTEM));
        Self {
            config,
            package_dir: package_dir.into(),
            package: String::new(),
            files: BTreeMap::new(),
            imports: IndexMap::new(),
            go_vars_files: BTreeMap::new(),
            go_files: BTreeMap::new(),
            systems,
            func_graph: BTreeMap::new(),
            exclude,
        }
    }

    /// Returns the named system, creating it on first reference.
    pub fn system(&mut self, name: &str) -> &mut System {
        self.systems
            .entry(name.to_string())
            .or_insert_with(|| System::new(name))
    }

    /// Extracted file names in processing order: vars files first.
    pub fn ordered_files(&self) -> Vec<String> {
        self.go_vars_files
            .keys()
            .chain(self.go_files.keys())
            .cloned()
            .collect()
    }

    /// Returns the graph node for `name`, creating it if needed.
    pub fn recycle_func(&mut self, name: &str) -> &mut Function {
        self.func_graph
            .entry(name.to_string())
            .or_insert_with(|| Function {
                name: name.to_string(),
                ..Default::default()
            })
    }

    /// Every function reachable from `root`, including `root` itself.
    /// Returns `None` when `root` is not in the graph.
    pub fn all_funcs(&self, root: &str) -> Option<BTreeSet<String>> {
        if !self.func_graph.contains_key(root) {
            return None;
        }
        let mut visited = BTreeSet::new();
        let mut stack = vec![root.to_string()];
        while let Some(name) = stack.pop() {
            if !visited.insert(name.clone()) {
                continue;
            }
            if let Some(f) = self.func_graph.get(&name) {
                stack.extend(f.funcs.iter().filter(|c| !visited.contains(*c)).cloned());
            }
        }
        Some(visited)
    }

    /// Names of vars used atomically by any function in `funcs`.
    pub fn atomic_vars(&self, funcs: &BTreeSet<String>) -> BTreeSet<String> {
        funcs
            .iter()
            .filter_map(|f| self.func_graph.get(f))
            .flat_map(|f| f.atomics.iter().cloned())
            .collect()
    }

    /// Looks up a global buffer variable by name across all systems.
    pub fn global_var(&self, name: &str) -> Option<&Var> {
        self.systems.values().flat_map(System::vars).find(|v| v.name == name)
    }

    /// The var behind a generated `Get<Var>` accessor, if `func` is one.
    pub fn get_func_var(&self, func: &str) -> Option<&Var> {
        let name = func.strip_prefix("Get")?;
        self.global_var(name).filter(|v| !v.tensor)
    }

    pub fn num_kernels(&self) -> usize {
        self.systems.values().map(|s| s.kernels.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(state: &mut State, edges: &[(&str, &str)]) {
        for (from, to) in edges {
            state.recycle_func(to);
            state.recycle_func(from).funcs.insert(to.to_string());
        }
    }

    #[test]
    fn default_system_exists() {
        let state = State::new(Config::default(), ".");
        assert!(state.systems.contains_key("Default"));
    }

    #[test]
    fn closure_follows_edges_and_tolerates_cycles() {
        let mut state = State::new(Config::default(), ".");
        graph(
            &mut state,
            &[("K", "A"), ("A", "B"), ("B", "A"), ("Other", "C")],
        );
        let funcs = state.all_funcs("K").unwrap();
        let names: Vec<_> = funcs.iter().map(String::as_str).collect();
        assert_eq!(names, vec!["A", "B", "K"]);
        assert!(state.all_funcs("Missing").is_none());
    }

    #[test]
    fn atomic_vars_union_over_closure() {
        let mut state = State::new(Config::default(), ".");
        graph(&mut state, &[("K", "A")]);
        state.recycle_func("A").atomics.insert("Counts".into());
        state.recycle_func("Z").atomics.insert("Other".into());
        let funcs = state.all_funcs("K").unwrap();
        let atomics = state.atomic_vars(&funcs);
        assert_eq!(atomics.into_iter().collect::<Vec<_>>(), vec!["Counts"]);
    }

    #[test]
    fn duplicate_group_is_an_error() {
        let mut sys = System::new("Default");
        let group = Group {
            name: "Params".into(),
            doc: String::new(),
            uniform: false,
            vars: vec![],
        };
        sys.add_group(group.clone()).unwrap();
        let err = sys.add_group(group).unwrap_err();
        assert!(matches!(err, GoslError::GroupConflict { .. }));
    }

    #[test]
    fn var_types() {
        let mut v = Var::new("Data", "*tensor.Float32", false);
        v.tensor_dims = 2;
        assert!(v.tensor);
        assert_eq!(v.sl_type(), "f32");
        assert_eq!(v.index_func(), "IndexF322D");

        let p = Var::new("Params", "[]ParamStruct", true);
        assert!(!p.tensor);
        assert_eq!(p.go_elem_type(), "ParamStruct");
        assert_eq!(p.sl_type(), "ParamStruct");
        assert_eq!(Var::new("Vals", "[]float32", false).sl_type(), "f32");
    }
}
