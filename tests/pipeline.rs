//! End-to-end translation of small Go modules.

use gosl::extract::extract;
use gosl::sledits::{edit_line, sl_edits};
use gosl::state::SourceFile;
use gosl::wgsl::extract_wgsl;
use gosl::{run, Config, Summary};
use std::collections::BTreeSet;
use std::path::Path;

const SUM: &str = r#"package sim

//gosl:start

//gosl:vars
var (
	// In holds pairs of values.
	//gosl:read-only
	In []float32

	// Out receives one sum per pair.
	Out []float32
)

func Compute(i uint32) { //gosl:kernel
	Out[i] = In[2*i] + In[2*i+1]
}

//gosl:end
"#;

const TWO_KERNELS: &str = r#"package sim

//gosl:start

//gosl:vars
var (
	Data []float32
)

func Scale(x float32) float32 {
	return x * 2
}

func Shift(x float32) float32 {
	return x + 1
}

func ScaleAll(i uint32) { //gosl:kernel
	Data[i] = Scale(Data[i])
}

func ShiftAll(i uint32) { //gosl:kernel
	Data[i] = Shift(Data[i])
}

//gosl:end
"#;

const NOWGSL: &str = r#"package sim

//gosl:start

//gosl:vars
var (
	Data []float32
)

func Trace(i uint32) {
	Data[i] = 0
}

func Compute(i uint32) { //gosl:kernel
	//gosl:nowgsl
	Trace(i)
	//gosl:end
	Data[i] = 1
}

//gosl:end
"#;

fn module(files: &[(&str, &str)]) -> tempfile::TempDir {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("go.mod"), "module example.com/sim\n\ngo 1.22\n").unwrap();
    for (name, text) in files {
        std::fs::write(tmp.path().join(name), text).unwrap();
    }
    tmp
}

fn config() -> Config {
    Config {
        validator: String::new(),
        ..Config::default()
    }
}

fn translate(dir: &Path) -> Summary {
    run(config(), dir).unwrap()
}

fn kernel(dir: &Path, name: &str) -> String {
    std::fs::read_to_string(dir.join("shaders").join(format!("{}.wgsl", name))).unwrap()
}

fn lines_starting(text: &str, prefix: &str) -> usize {
    text.lines().filter(|l| l.trim_start().starts_with(prefix)).count()
}

#[test]
fn sum_kernel() {
    let tmp = module(&[("sim.go", SUM)]);
    let summary = translate(tmp.path());
    assert!(summary.diagnostics.is_empty(), "{:?}", summary.diagnostics);
    assert_eq!(summary.kernels.len(), 1);

    let wgsl = kernel(tmp.path(), "Compute");
    assert!(wgsl.contains("var<storage, read> In: array<f32>;"), "{}", wgsl);
    assert!(wgsl.contains("var<storage, read_write> Out: array<f32>;"), "{}", wgsl);
    assert!(wgsl.contains("fn Compute(i: u32) {"), "{}", wgsl);
    assert!(wgsl.contains("\tCompute(idx);"));

    // one temporary per element read from the read-only buffer
    assert_eq!(wgsl.matches("= In[").count(), 2, "{}", wgsl);
    // exactly one writeback into Out, none into In
    assert_eq!(lines_starting(&wgsl, "Out["), 1, "{}", wgsl);
    assert_eq!(lines_starting(&wgsl, "In["), 0, "{}", wgsl);
}

#[test]
fn host_bindings_are_written() {
    let tmp = module(&[("sim.go", SUM)]);
    translate(tmp.path());
    let go = std::fs::read_to_string(tmp.path().join("gosl.go")).unwrap();
    assert!(go.starts_with("// Code generated by \"gosl\"; DO NOT EDIT"));
    assert!(go.contains("package sim"));
    assert!(go.contains("\tInVar GPUVars = 0\n\tOutVar GPUVars = 1\n"));
    assert!(go.contains("func GetOut(idx uint32) *float32 {"));

    let manifest = std::fs::read_to_string(tmp.path().join("shaders/gosl.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&manifest).unwrap();
    assert_eq!(json["package"], "sim");
    assert_eq!(
        json["systems"]["Default"]["kernels"]["Compute"]["filename"],
        "Compute.wgsl"
    );
    assert!(tmp.path().join("shaders/sltype.wgsl").is_file());
}

#[test]
fn kernels_hold_only_their_closure() {
    let tmp = module(&[("sim.go", TWO_KERNELS)]);
    let summary = translate(tmp.path());
    assert_eq!(summary.kernels.len(), 2);

    let scale = kernel(tmp.path(), "ScaleAll");
    assert!(scale.contains("fn Scale(x: f32) -> f32 {"), "{}", scale);
    assert!(!scale.contains("fn Shift("));
    assert!(!scale.contains("fn ShiftAll("));

    let shift = kernel(tmp.path(), "ShiftAll");
    assert!(shift.contains("fn Shift(x: f32) -> f32 {"), "{}", shift);
    assert!(!shift.contains("fn Scale("));
    assert!(!shift.contains("fn ScaleAll("));
}

#[test]
fn nowgsl_calls_never_reach_the_shader() {
    let tmp = module(&[("sim.go", NOWGSL)]);
    translate(tmp.path());
    let wgsl = kernel(tmp.path(), "Compute");
    assert!(!wgsl.contains("Trace"), "{}", wgsl);
    assert!(wgsl.contains("fn Compute(i: u32) {"));
}

#[test]
fn output_is_deterministic() {
    let tmp = module(&[("sim.go", TWO_KERNELS), ("more.go", SUM.replace("Compute", "Sum").as_str())]);
    translate(tmp.path());
    let first: Vec<String> = ["ScaleAll", "ShiftAll"]
        .iter()
        .map(|k| kernel(tmp.path(), k))
        .collect();
    let go = std::fs::read_to_string(tmp.path().join("gosl.go")).unwrap();

    translate(tmp.path());
    let second: Vec<String> = ["ScaleAll", "ShiftAll"]
        .iter()
        .map(|k| kernel(tmp.path(), k))
        .collect();
    assert_eq!(first, second);
    assert_eq!(go, std::fs::read_to_string(tmp.path().join("gosl.go")).unwrap());
}

#[test]
fn intermediate_files_are_removed_unless_kept() {
    let tmp = module(&[("sim.go", SUM)]);
    translate(tmp.path());
    assert!(!tmp.path().join("shaders/imports").exists());

    let config = Config {
        keep: true,
        ..config()
    };
    run(config, tmp.path()).unwrap();
    assert!(tmp.path().join("shaders/imports/sim.go").is_file());
}

#[test]
fn missing_module_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("sim.go"), SUM).unwrap();
    let err = run(config(), tmp.path()).unwrap_err();
    assert!(matches!(err, gosl::GoslError::NoModule(_)));
}

#[test]
fn extraction_is_idempotent() {
    let source = SourceFile::new("sim.go", SUM);
    let flattened = BTreeSet::new();
    let once = extract(&source, &flattened);
    let again = extract(&SourceFile::new("sim.go", &once.lines.join("\n")), &flattened);
    assert_eq!(once.lines, again.lines);
    assert_eq!(once.kernels, again.kernels);
}

#[test]
fn region_round_trip() {
    let inner = [
        "func Half(x float32) float32 {",
        "\treturn x * 0.5",
        "}",
    ];
    let src = format!(
        "package sim\n\nimport \"fmt\"\n\nvar skipped = fmt.Sprint()\n\n//gosl:start\n{}\n//gosl:end\n",
        inner.join("\n")
    );
    let ex = extract(&SourceFile::new("sim.go", &src), &BTreeSet::new());
    let mut lines = ex.lines;
    sl_edits(&mut lines);
    let wgsl = extract_wgsl(&lines);
    let body: Vec<&str> = wgsl
        .iter()
        .map(String::as_str)
        .skip_while(|l| l.is_empty())
        .collect();
    let expected: Vec<String> = inner.iter().map(|l| edit_line(l)).collect();
    assert_eq!(body, expected);
    assert!(!wgsl.iter().any(|l| l.starts_with("package") || l.starts_with("import")));
}

const UNIFORM: &str = r#"package sim

//gosl:start

//gosl:vars
var (
	//gosl:group -uniform Params
	//gosl:read-only
	Scale []float32

	//gosl:group Data
	Values []float32
)

func Compute(i uint32) { //gosl:kernel
	Values[i] = Values[i] * Scale[0]
}

//gosl:end
"#;

#[test]
fn uniform_group_binds_a_single_element() {
    let tmp = module(&[("sim.go", UNIFORM)]);
    let summary = translate(tmp.path());
    assert!(summary.diagnostics.is_empty(), "{:?}", summary.diagnostics);
    let wgsl = kernel(tmp.path(), "Compute");
    assert!(
        wgsl.contains("@group(0) @binding(0)\nvar<uniform> Scale: array<f32, 1>;"),
        "{}",
        wgsl
    );
    assert!(wgsl.contains("@group(1) @binding(0)\nvar<storage, read_write> Values: array<f32>;"));
}

fn shared_group(var: &str) -> String {
    format!(
        "package sim\n\n//gosl:start\n\n//gosl:vars\nvar (\n\t//gosl:group Shared\n\t{} []float32\n)\n\n//gosl:end\n",
        var
    )
}

#[test]
fn same_group_in_two_vars_blocks_is_fatal() {
    let a = shared_group("A");
    let b = shared_group("B");
    let tmp = module(&[("a.go", a.as_str()), ("b.go", b.as_str())]);
    let err = run(config(), tmp.path()).unwrap_err();
    match err {
        gosl::GoslError::GroupConflict { system, group } => {
            assert_eq!(system, "Default");
            assert_eq!(group, "Shared");
        }
        other => panic!("unexpected error: {}", other),
    }
}
