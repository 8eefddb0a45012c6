//! # Kernel assembler
//!
//! Wraps the translated closure of one kernel into a self-contained WGSL
//! file: buffer bindings and the `@compute` entry point before it, tensor
//! index helpers and runtime-support libraries after it.

use crate::error::{GoslError, Result};
use crate::sledits::SupportUse;
use crate::state::{Kernel, System, TensorKind, Var};
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;

/// Typed vector helpers, required by `slrand`.
pub const SLTYPE_WGSL: &str = include_str!("../shaders/sltype.wgsl");
/// Counter-based random numbers.
pub const SLRAND_WGSL: &str = include_str!("../shaders/slrand.wgsl");

pub const WORKGROUP_SIZE: u32 = 64;

/// Binding declarations and the `main` entry point for `kernel`.
///
/// Vars in `atomics` are declared with an atomic element type.
pub fn header(system: &System, kernel: &Kernel, atomics: &BTreeSet<String>) -> Vec<String> {
    let mut lines = vec![
        "// Code generated by \"gosl\"; DO NOT EDIT".to_string(),
        format!("// kernel: {}", kernel.name),
        String::new(),
    ];
    for (gi, group) in system.groups.values().enumerate() {
        push_doc(&mut lines, &group.doc);
        for (bi, var) in group.vars.iter().enumerate() {
            push_doc(&mut lines, &var.doc);
            let mut elem = var.sl_type();
            if atomics.contains(&var.name) {
                elem = format!("atomic<{}>", elem);
            }
            lines.push(format!("@group({}) @binding({})", gi, bi));
            if group.uniform {
                lines.push(format!("var<uniform> {}: array<{}, 1>;", var.name, elem));
            } else {
                let access = if var.read_only { "read" } else { "read_write" };
                lines.push(format!("var<storage, {}> {}: array<{}>;", access, var.name, elem));
            }
        }
    }
    lines.push(String::new());
    lines.push(format!("@compute @workgroup_size({}, 1, 1)", WORKGROUP_SIZE));
    lines.push(
        "fn main(@builtin(workgroup_id) wgid: vec3<u32>, @builtin(num_workgroups) nwg: vec3<u32>, @builtin(local_invocation_index) loci: u32) {"
            .to_string(),
    );
    lines.push(format!(
        "\tlet idx = loci + (wgid.x + wgid.y * nwg.x + wgid.z * nwg.x * nwg.y) * {};",
        WORKGROUP_SIZE
    ));
    if signed_index(&kernel.args) {
        lines.push(format!("\t{}(i32(idx));", kernel.name));
    } else {
        lines.push(format!("\t{}(idx);", kernel.name));
    }
    lines.push("}".to_string());
    lines.push(String::new());
    lines
}

fn push_doc(lines: &mut Vec<String>, doc: &str) {
    lines.extend(doc.lines().filter(|l| !l.is_empty()).map(|l| format!("// {}", l)));
}

/// Whether the kernel's index parameter is signed (`i int32`).
fn signed_index(args: &str) -> bool {
    let typ = args.split_whitespace().last().unwrap_or("");
    matches!(typ, "int" | "int32" | "i32")
}

/// Tensor index helpers and support libraries appended after the code.
pub fn trailer(system: &System, usage: SupportUse) -> Vec<String> {
    let mut lines = tensor_funcs(system);
    if usage.sltype || usage.slrand {
        lines.extend(import_block("sltype.wgsl", SLTYPE_WGSL));
    }
    if usage.slrand {
        lines.extend(import_block("slrand.wgsl", SLRAND_WGSL));
    }
    lines
}

fn import_block(name: &str, text: &str) -> Vec<String> {
    let mut lines = vec![String::new(), format!("//////// import: {:?}", name)];
    lines.extend(text.lines().map(str::to_string));
    lines
}

/// One `Index<Kind><N>D` helper per tensor kind and dimensionality declared
/// in `system`. Tensor buffers start with one stride per dimension.
pub fn tensor_funcs(system: &System) -> Vec<String> {
    let mut done = BTreeSet::new();
    let mut lines = Vec::new();
    for var in system.vars().filter(|v| v.tensor && v.tensor_dims > 0) {
        let name = var.index_func();
        if !done.insert(name.clone()) {
            continue;
        }
        lines.push(String::new());
        lines.extend(index_func(var, &name));
    }
    lines
}

fn index_func(var: &Var, name: &str) -> Vec<String> {
    let kind = var.tensor_kind.unwrap_or(TensorKind::F32);
    let dims = var.tensor_dims;
    let mut params: Vec<String> = (0..dims).map(|d| format!("s{}: {}", d, kind.wgsl_type())).collect();
    params.extend((0..dims).map(|d| format!("i{}: u32", d)));
    let terms: Vec<String> = (0..dims)
        .map(|d| {
            let stride = match kind {
                TensorKind::F32 => format!("bitcast<u32>(s{})", d),
                TensorKind::I32 => format!("u32(s{})", d),
                TensorKind::U32 => format!("s{}", d),
            };
            format!("{} * i{}", stride, d)
        })
        .collect();
    vec![
        format!("fn {}({}) -> u32 {{", name, params.join(", ")),
        format!("\treturn u32({}) + {};", dims, terms.join(" + ")),
        "}".to_string(),
    ]
}

/// Writes the support libraries next to the generated kernels.
pub fn write_support_files(out: &Path) -> Result<()> {
    for (name, text) in [("sltype.wgsl", SLTYPE_WGSL), ("slrand.wgsl", SLRAND_WGSL)] {
        let path = out.join(name);
        std::fs::write(&path, text).map_err(|e| GoslError::io(&path, e))?;
    }
    Ok(())
}

/// Runs the external WGSL validator on generated files.
#[derive(Debug)]
pub struct Validator {
    program: String,
    missing: bool,
}

impl Validator {
    /// An empty program name disables validation.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            missing: false,
        }
    }

    /// Validates `file` with `dir` as working directory. Failures are logged only.
    pub fn validate(&mut self, dir: &Path, file: &str) {
        if self.program.is_empty() || self.missing {
            return;
        }
        match Command::new(&self.program).arg(file).current_dir(dir).output() {
            Ok(output) => {
                let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&output.stderr));
                if !text.trim().is_empty() {
                    tracing::info!("[KERNEL] {} {}:\n{}", self.program, file, text.trim_end());
                }
                if !output.status.success() {
                    tracing::error!("[KERNEL] {} failed on {}: {}", self.program, file, output.status);
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(
                    "[KERNEL] validator {:?} not found, generated shaders are not validated",
                    self.program
                );
                self.missing = true;
            }
            Err(e) => tracing::error!("[KERNEL] cannot run {}: {}", self.program, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Group;

    fn system() -> System {
        let mut sys = System::new("Default");
        let mut weights = Var::new("Weights", "*tensor.Float32", false);
        weights.tensor_dims = 2;
        let mut params = Var::new("Params", "[]ParamStruct", true);
        params.doc = "Params are the parameters.".into();
        sys.add_group(Group {
            name: "Group_0".into(),
            doc: String::new(),
            uniform: false,
            vars: vec![params, Var::new("Counts", "[]int32", false), weights],
        })
        .unwrap();
        sys
    }

    #[test]
    fn header_declares_bindings_and_entry() {
        let kernel = Kernel {
            name: "Compute".into(),
            args: "i uint32".into(),
            ..Default::default()
        };
        let atomics: BTreeSet<String> = ["Counts".to_string()].into();
        let lines = header(&system(), &kernel, &atomics);
        let text = lines.join("\n");
        assert!(text.contains("// Params are the parameters.\n@group(0) @binding(0)\nvar<storage, read> Params: array<ParamStruct>;"));
        assert!(text.contains("@group(0) @binding(1)\nvar<storage, read_write> Counts: array<atomic<i32>>;"));
        assert!(text.contains("var<storage, read_write> Weights: array<f32>;"));
        assert!(text.contains("\tCompute(idx);"));
    }

    #[test]
    fn uniform_groups_bind_one_element() {
        let mut sys = system();
        sys.add_group(Group {
            name: "Params".into(),
            doc: String::new(),
            uniform: true,
            vars: vec![Var::new("Globals", "[]ParamStruct", true)],
        })
        .unwrap();
        let kernel = Kernel {
            name: "Compute".into(),
            args: "i uint32".into(),
            ..Default::default()
        };
        let text = header(&sys, &kernel, &BTreeSet::new()).join("\n");
        assert!(text.contains("@group(1) @binding(0)\nvar<uniform> Globals: array<ParamStruct, 1>;"));
    }

    #[test]
    fn signed_kernels_get_a_cast() {
        let kernel = Kernel {
            name: "Step".into(),
            args: "i int32".into(),
            ..Default::default()
        };
        let lines = header(&System::new("Default"), &kernel, &BTreeSet::new());
        assert!(lines.contains(&"\tStep(i32(idx));".to_string()));
    }

    #[test]
    fn tensor_helper() {
        let lines = tensor_funcs(&system());
        assert_eq!(
            lines[1..],
            [
                "fn IndexF322D(s0: f32, s1: f32, i0: u32, i1: u32) -> u32 {".to_string(),
                "\treturn u32(2) + bitcast<u32>(s0) * i0 + bitcast<u32>(s1) * i1;".to_string(),
                "}".to_string(),
            ]
        );
    }

    #[test]
    fn slrand_pulls_in_sltype() {
        let usage = SupportUse {
            slrand: true,
            sltype: false,
        };
        let text = trailer(&System::new("Default"), usage).join("\n");
        let t = text.find("//////// import: \"sltype.wgsl\"").unwrap();
        let r = text.find("//////// import: \"slrand.wgsl\"").unwrap();
        assert!(t < r);
    }

    #[test]
    fn missing_validator_is_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let mut v = Validator::new("gosl-no-such-validator");
        v.validate(tmp.path(), "Compute.wgsl");
        v.validate(tmp.path(), "Other.wgsl");
        assert!(v.missing);
    }
}
