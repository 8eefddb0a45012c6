//! # Host bindings
//!
//! Generates `gosl.go` in the package directory, which gives the Go side
//! the embedded shaders, a descriptor of every system's buffers and kernels,
//! and a `Get<Var>` accessor per slice variable. The same descriptors are
//! written as JSON for runtimes that are not Go.

use crate::error::{GoslError, Result};
use crate::scan::GENERATED_FILE;
use crate::state::{State, System};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

/// File name of the JSON manifest inside the output directory.
pub const MANIFEST_FILE: &str = "gosl.json";

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    package: &'a str,
    systems: &'a BTreeMap<String, System>,
}

/// Writes `gosl.go` and the JSON manifest.
pub fn generate(state: &State) -> Result<()> {
    let go = go_source(state);
    let path = state.package_dir.join(GENERATED_FILE);
    std::fs::write(&path, go).map_err(|e| GoslError::io(&path, e))?;

    let out = state.config.output_dir(&state.package_dir);
    write_manifest(state, &out)?;
    tracing::info!("[GENGPU] wrote {} and {}", path.display(), MANIFEST_FILE);
    Ok(())
}

fn write_manifest(state: &State, out: &Path) -> Result<()> {
    let manifest = Manifest {
        package: &state.package,
        systems: &state.systems,
    };
    let json = serde_json::to_string_pretty(&manifest)?;
    let path = out.join(MANIFEST_FILE);
    std::fs::write(&path, json + "\n").map_err(|e| GoslError::io(&path, e))
}

/// Go source of the host binding file.
pub fn go_source(state: &State) -> String {
    let mut b = String::new();
    let out = state.config.output.to_string_lossy().replace('\\', "/");
    b.push_str("// Code generated by \"gosl\"; DO NOT EDIT\n\n");
    let _ = writeln!(b, "package {}\n", state.package);
    b.push_str("import (\n\t\"embed\"\n)\n\n");
    let _ = writeln!(b, "//go:embed {}/*.wgsl", out);
    b.push_str("var shaders embed.FS\n\n");

    b.push_str("// GPUVars is an enum for GPU variables, for specifying what to sync.\n");
    b.push_str("type GPUVars int32 //enums:enum\n\nconst (\n");
    let vars: Vec<_> = state.systems.values().flat_map(System::vars).collect();
    for (i, var) in vars.iter().enumerate() {
        let _ = writeln!(b, "\t{}Var GPUVars = {}", var.name, i);
    }
    b.push_str(")\n\n");

    b.push_str(DESCRIPTOR_TYPES);

    b.push_str("// GPUSystems describes the buffers and kernels of each system.\n");
    b.push_str("var GPUSystems = []GPUSystemInfo{\n");
    for sys in state.systems.values() {
        let _ = writeln!(b, "\t{{Name: {:?}, Groups: []GPUGroupInfo{{", sys.name);
        for group in sys.groups.values() {
            let _ = writeln!(
                b,
                "\t\t{{Name: {:?}, Uniform: {}, Vars: []GPUVarInfo{{",
                group.name, group.uniform
            );
            for var in &group.vars {
                let _ = writeln!(
                    b,
                    "\t\t\t{{Name: {:?}, Type: {:?}, ReadOnly: {}, TensorDims: {}}},",
                    var.name, var.typ, var.read_only, var.tensor_dims
                );
            }
            b.push_str("\t\t}},\n");
        }
        let kernels: Vec<String> = sys.kernels.keys().map(|k| format!("{:?}", k)).collect();
        let _ = writeln!(b, "\t}}, Kernels: []string{{{}}}}},", kernels.join(", "));
    }
    b.push_str("}\n");

    for var in vars.iter().filter(|v| !v.tensor) {
        let elem = var.go_elem_type();
        let _ = write!(
            b,
            "\n// {name} returns a pointer to the given global variable:\n\
             // [{var}] []{elem} at given index.\n\
             func {name}(idx uint32) *{elem} {{\n\
             \treturn &{var}[idx]\n\
             }}\n",
            name = var.get_func_name(),
            var = var.name,
            elem = elem
        );
    }
    b
}

const DESCRIPTOR_TYPES: &str = "// GPUVarInfo describes one GPU buffer variable.
type GPUVarInfo struct {
	Name       string
	Type       string
	ReadOnly   bool
	TensorDims int
}

// GPUGroupInfo describes variables sharing one binding group.
type GPUGroupInfo struct {
	Name    string
	Uniform bool
	Vars    []GPUVarInfo
}

// GPUSystemInfo describes one compute system.
type GPUSystemInfo struct {
	Name    string
	Groups  []GPUGroupInfo
	Kernels []string
}

";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::state::{Group, Kernel, Var};

    fn state() -> State {
        let mut state = State::new(Config::default(), ".");
        state.package = "sim".into();
        let sys = state.system("Default");
        let mut weights = Var::new("Weights", "*tensor.Float32", false);
        weights.tensor_dims = 2;
        sys.add_group(Group {
            name: "Group_0".into(),
            doc: String::new(),
            uniform: false,
            vars: vec![Var::new("Params", "[]ParamStruct", true), weights],
        })
        .unwrap();
        sys.kernels.insert(
            "Compute".into(),
            Kernel {
                name: "Compute".into(),
                ..Default::default()
            },
        );
        state
    }

    #[test]
    fn go_bindings() {
        let src = go_source(&state());
        assert!(src.starts_with("// Code generated by \"gosl\"; DO NOT EDIT\n\npackage sim\n"));
        assert!(src.contains("//go:embed shaders/*.wgsl"));
        assert!(src.contains("\tParamsVar GPUVars = 0\n\tWeightsVar GPUVars = 1\n"));
        assert!(src.contains("{Name: \"Params\", Type: \"[]ParamStruct\", ReadOnly: true, TensorDims: 0},"));
        assert!(src.contains("Kernels: []string{\"Compute\"}},"));
        assert!(src.contains("func GetParams(idx uint32) *ParamStruct {\n\treturn &Params[idx]\n}"));
        assert!(!src.contains("GetWeights"));
    }

    #[test]
    fn manifest_lists_systems() {
        let tmp = tempfile::tempdir().unwrap();
        write_manifest(&state(), tmp.path()).unwrap();
        let text = std::fs::read_to_string(tmp.path().join(MANIFEST_FILE)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["package"], "sim");
        let group = &json["systems"]["Default"]["groups"]["Group_0"];
        assert_eq!(group["vars"][0]["name"], "Params");
        assert_eq!(group["vars"][0]["read_only"], true);
        assert_eq!(group["vars"][1]["tensor_kind"], "F32");
        assert_eq!(json["systems"]["Default"]["kernels"]["Compute"]["name"], "Compute");
    }
}
