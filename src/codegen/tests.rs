use super::*;
use crate::config::Config;
use crate::go::parse_file;

const VARS: &str = r#"package imports

import (
	"cogentcore.org/lab/tensor"
	"sync/atomic"
)

//gosl:vars
var (
	//gosl:read-only
	Params []ParamStruct

	Data []float32

	//gosl:group Neurons
	Neurons []Neuron

	Counts []int32

	//gosl:dims 2
	Weights *tensor.Float32
)

type ParamStruct struct {
	Scale float32
}

type Neuron struct {
	V float32
}

func (nr *Neuron) Step(dt float32) {
	nr.V += dt
}
"#;

/// Runs both passes over `VARS` plus `body`, emitting the closure of `root`.
fn translate(body: &str, root: &str) -> (State, Printed) {
    let src = format!("{}\n{}", VARS, body);
    let file = parse_file("test.go", &src).unwrap();
    let env = TypeEnv::from_files([&file]);
    let mut state = State::new(Config::default(), ".");
    print_file(&mut state, &env, &file, Mode::Graph).unwrap();
    let funcs = state.all_funcs(root).unwrap();
    let printed = print_file(&mut state, &env, &file, Mode::Emit(&funcs)).unwrap();
    (state, printed)
}

fn has_line(p: &Printed, line: &str) -> bool {
    p.lines.iter().any(|l| l == line)
}

fn assert_lines(p: &Printed, lines: &[&str]) {
    for line in lines {
        assert!(has_line(p, line), "missing {:?} in\n{}", line, p.lines.join("\n"));
    }
}

#[test]
fn vars_block_registers_groups() {
    let (state, printed) = translate("", "Neuron_Step");
    let sys = &state.systems["Default"];
    let names: Vec<_> = sys.groups.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["Group_0", "Neurons"]);
    let params = &sys.groups["Group_0"].vars[0];
    assert_eq!(params.name, "Params");
    assert!(params.read_only);
    let weights = sys.vars().find(|v| v.name == "Weights").unwrap();
    assert!(weights.tensor);
    assert_eq!(weights.tensor_dims, 2);
    // the block itself is never printed
    assert!(!printed.lines.iter().any(|l| l.contains("Params []ParamStruct")));
}

#[test]
fn buffer_access_is_hoisted_with_writeback() {
    let (_, printed) = translate(
        "func Compute(i uint32) { //gosl:kernel\n\tData[i] += Params[0].Scale\n}\n",
        "Compute",
    );
    assert!(printed.diags.is_empty(), "{:?}", printed.diags);
    assert_lines(
        &printed,
        &[
            "fn Compute(i: uint32) { //gosl:kernel",
            "\tvar data_1 = Data[i];",
            "\tvar params_2 = Params[0];",
            "\tdata_1 += params_2.Scale;",
            "\tData[i] = data_1;",
        ],
    );
    assert!(!printed.lines.iter().any(|l| l.contains("Params[0] = ")));
}

#[test]
fn read_only_assignment_is_reported() {
    let (_, printed) = translate(
        "func Compute(i uint32) { //gosl:kernel\n\tParams[0].Scale = 2\n}\n",
        "Compute",
    );
    assert_eq!(printed.diags.len(), 1);
    assert!(printed.diags[0].message.contains("read-only"));
    assert!(printed.diags[0].line > 0);
}

#[test]
fn method_calls_take_receiver_address() {
    let (state, printed) = translate(
        "func Compute(i uint32) { //gosl:kernel\n\tNeurons[i].Step(1)\n}\n",
        "Compute",
    );
    assert!(state.func_graph["Compute"].funcs.contains("Neuron_Step"));
    assert_lines(
        &printed,
        &[
            "fn Neuron_Step(nr: ptr<function,Neuron>, dt: float32) {",
            "\t(*nr).V += dt;",
            "\tvar neurons_1 = Neurons[i];",
            "\tNeuron_Step(&neurons_1, float32(1));",
            "\tNeurons[i] = neurons_1;",
        ],
    );
}

#[test]
fn get_var_binds_local_copy() {
    let (state, printed) = translate(
        "func Compute(i uint32) { //gosl:kernel\n\tnr := GetNeurons(i)\n\tnr.V = 2\n\tnr.Step(0.5)\n}\n",
        "Compute",
    );
    assert!(!state.func_graph["Compute"].funcs.contains("GetNeurons"));
    assert_lines(
        &printed,
        &[
            "\tvar nr = Neurons[i];",
            "\tnr.V = float32(2);",
            "\tNeuron_Step(&nr, float32(0.5));",
            "\tNeurons[i] = nr;",
        ],
    );
}

#[test]
fn unreachable_functions_are_not_emitted() {
    let (_, printed) = translate(
        "func Compute(i uint32) { //gosl:kernel\n\tHelper()\n}\n\nfunc Helper() {\n}\n\nfunc Unused() {\n}\n",
        "Compute",
    );
    assert!(has_line(&printed, "fn Helper() {"));
    assert!(!printed.lines.iter().any(|l| l.contains("Unused")));
    assert!(!printed.lines.iter().any(|l| l.contains("Neuron_Step")));
}

#[test]
fn nowgsl_statements_skip_the_graph() {
    let body = "func Compute(i uint32) { //gosl:kernel\n\t//gosl:nowgsl\n\tDebug(i)\n\t//gosl:end\n\tData[i] = 1\n}\n\nfunc Debug(i uint32) {\n}\n";
    let (state, printed) = translate(body, "Compute");
    assert!(!state.func_graph["Compute"].funcs.contains("Debug"));
    assert!(!printed.lines.iter().any(|l| l.contains("Debug")));
    assert_lines(
        &printed,
        &["\t//gosl:nowgsl", "\t//gosl:end", "\tdata_1 = float32(1);"],
    );
}

#[test]
fn control_flow() {
    let body = r#"func Flow(n int) int {
	s := 0
	for i := range n {
		s += i
	}
	for s > 10 {
		s -= 3
	}
	switch s {
	case 1, 2:
		s = 5
	}
	if s == 0 {
		s = 1
	} else if s == 1 {
		s = 2
	} else {
		s = 3
	}
	return s &^ 1
}
"#;
    let (_, printed) = translate(body, "Flow");
    assert!(printed.diags.is_empty(), "{:?}", printed.diags);
    assert_lines(
        &printed,
        &[
            "fn Flow(n: i32) -> i32 {",
            "\tvar s = 0;",
            "\tfor (var i: i32 = 0; i < n; i++) {",
            "\t\ts += i;",
            "\twhile (s > 10) {",
            "\tswitch (s) {",
            "\tcase 1, 2: {",
            "\t\ts = i32(5);",
            "\tdefault: {}",
            "\tif (s == 0) {",
            "\t} else if (s == 1) {",
            "\t} else {",
            "\treturn s & ~1;",
        ],
    );
}

#[test]
fn tagless_switch_becomes_if_chain() {
    let body = "func Sign(x float32) float32 {\n\tswitch {\n\tcase x < 0:\n\t\treturn -1\n\tdefault:\n\t\treturn 1\n\t}\n}\n";
    let (_, printed) = translate(body, "Sign");
    assert_lines(
        &printed,
        &[
            "\tif (x < 0) {",
            "\t\treturn float32(-1);",
            "\t} else {",
            "\t\treturn float32(1);",
        ],
    );
}

#[test]
fn tensor_methods_use_index_helper() {
    let body = "func Compute(i uint32) { //gosl:kernel\n\tx := Weights.Value(int(i), 1)\n\tWeights.Set(x*2, int(i), 1)\n}\n";
    let (_, printed) = translate(body, "Compute");
    assert_lines(
        &printed,
        &[
            "\tvar x = Weights[IndexF322D(Weights[0], Weights[1], u32(i), u32(1))];",
            "\tWeights[IndexF322D(Weights[0], Weights[1], u32(i), u32(1))] = x * 2;",
        ],
    );
}

#[test]
fn atomics_are_recorded() {
    let body = "func Compute(i uint32) { //gosl:kernel\n\tatomic.AddInt32(&Counts[0], 1)\n}\n";
    let (state, printed) = translate(body, "Compute");
    assert!(state.func_graph["Compute"].atomics.contains("Counts"));
    assert!(has_line(&printed, "\tatomicAdd(&Counts[0], 1);"));
}

#[test]
fn declarations() {
    let body = r#"const (
	A int32 = iota
	B
)

type Vec struct {
	X, Y float32
}

type Scalar = float32

var scratch float32

func Make() Vec {
	return Vec{Y: 1}
}

func Mask(a, b uint32) uint32 {
	return a&1 + ^b
}
"#;
    let file = parse_file("decls.go", &format!("{}\n{}", VARS, body)).unwrap();
    let env = TypeEnv::from_files([&file]);
    let mut state = State::new(Config::default(), ".");
    let printed = print_file(&mut state, &env, &file, Mode::Graph).unwrap();
    assert_lines(
        &printed,
        &[
            "const A: int32 = 0;",
            "const B: int32 = 1;",
            "struct Vec {",
            "\tX: float32,",
            "\tY: float32,",
            "alias Scalar = float32;",
            "var<private> scratch: float32;",
            "\treturn Vec(float32(), float32(1));",
            "\treturn (a & 1) + ~b;",
        ],
    );
}

#[test]
fn comments_follow_their_code() {
    let body = "// Compute adds one.\nfunc Compute(i uint32) { //gosl:kernel\n\t// bump it\n\tData[i] += 1 // in place\n}\n";
    let (_, printed) = translate(body, "Compute");
    let text = printed.lines.join("\n");
    let doc = text.find("// Compute adds one.").unwrap();
    let sig = text.find("fn Compute").unwrap();
    assert!(doc < sig);
    assert!(has_line(&printed, "\t// bump it"));
    assert!(has_line(&printed, "\tdata_1 += 1; // in place"));
}

#[test]
fn counted_for_clause() {
    let body = "func Sum(n int) int {\n\ts := 0\n\tfor i := 0; i < n; i++ {\n\t\ts += i\n\t}\n\treturn s\n}\n";
    let (_, printed) = translate(body, "Sum");
    assert!(printed.diags.is_empty(), "{:?}", printed.diags);
    assert_lines(&printed, &["\tfor (var i = 0; i < n; i++) {", "\t\ts += i;"]);
}

#[test]
fn repeated_element_shares_a_temporary() {
    let body = "func Twice(x float32) float32 {\n\treturn x * 2\n}\n\nfunc Compute(i uint32) { //gosl:kernel\n\tData[i] = Twice(Data[i])\n}\n";
    let (_, printed) = translate(body, "Compute");
    assert_lines(
        &printed,
        &["\tvar data_1 = Data[i];", "\tdata_1 = Twice(data_1);", "\tData[i] = data_1;"],
    );
    let reads = printed.lines.iter().filter(|l| l.contains("= Data[i];")).count();
    let writes = printed.lines.iter().filter(|l| l.trim_start().starts_with("Data[i] = ")).count();
    assert_eq!((reads, writes), (1, 1), "{}", printed.lines.join("\n"));
}

#[test]
fn tensor_without_dims_is_reported() {
    let body = "//gosl:vars\nvar (\n\tLoose *tensor.Float32\n)\n";
    let file = parse_file("dims.go", &format!("{}\n{}", VARS, body)).unwrap();
    let env = TypeEnv::from_files([&file]);
    let mut state = State::new(Config::default(), ".");
    let printed = print_file(&mut state, &env, &file, Mode::Graph).unwrap();
    let missing: Vec<_> = printed
        .diags
        .iter()
        .filter(|d| d.message.contains("needs a //gosl:dims directive"))
        .collect();
    assert_eq!(missing.len(), 1, "{:?}", printed.diags);
    assert!(missing[0].message.contains("Loose"));
    assert!(state.global_var("Loose").is_none());
}
