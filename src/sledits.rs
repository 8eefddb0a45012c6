//! # Shader-language text edits
//!
//! Table-driven lexical substitutions applied to the printer output. They map
//! Go builtin names (numeric types, math functions, boolean-wrapper helpers,
//! runtime-support package prefixes) onto their WGSL equivalents.

use crate::directives::PREFIX;

/// Ordered find/replace pairs. Earlier entries win over later, more general ones.
pub const REPLACES: &[(&str, &str)] = &[
    ("float32", "f32"),
    ("float64", "f64"),
    ("uint32", "u32"),
    ("int32", "i32"),
    ("math32.FastExp(", "exp("),
    ("math.Float32frombits(", "bitcast<f32>("),
    ("math.Float32bits(", "bitcast<u32>("),
    ("math32.Pi", "3.14159265358979323846"),
    ("math32.MaxFloat32", "3.402823466e+38"),
    ("math32.Vector2i", "vec2<i32>"),
    ("math32.Vector2", "vec2<f32>"),
    ("math32.Vector3", "vec3<f32>"),
    ("math32.Vector4", "vec4<f32>"),
    ("shaders.", ""),
    ("slbool.Bool", "i32"),
    ("slbool.True", "1"),
    ("slbool.False", "0"),
    ("slbool.IsTrue(", "(1 == "),
    ("slbool.IsFalse(", "(0 == "),
    ("slbool.FromBool(", "i32("),
    ("bools.ToFloat32(", "f32("),
    ("bools.FromFloat32(", "bool("),
    ("num.FromBool[f32](", "f32("),
    ("num.ToBool(", "bool("),
    ("sltype.Int32Vec2", "vec2<i32>"),
    ("sltype.Uint32Vec2", "vec2<u32>"),
    ("sltype.Float32Vec2", "vec2<f32>"),
    ("sltype.Int32Vec4", "vec4<i32>"),
    ("sltype.Uint32Vec4", "vec4<u32>"),
    ("sltype.Float32Vec4", "vec4<f32>"),
    ("slrand.", "Rand"),
    ("sltype.", ""),
];

/// Prefixes whose following identifier is lower-cased (`math32.Sqrt` -> `sqrt`).
const MATH_PREFIXES: &[&str] = &["math32.", "math."];

/// What runtime support the edited lines reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupportUse {
    pub slrand: bool,
    pub sltype: bool,
}

/// Applies all edits in place to every non-directive line.
pub fn sl_edits(lines: &mut [String]) -> SupportUse {
    let mut usage = SupportUse::default();
    for line in lines.iter_mut() {
        if line.trim_start().starts_with(PREFIX) {
            continue;
        }
        usage.slrand |= line.contains("slrand.");
        usage.sltype |= line.contains("sltype.");
        *line = edit_line(line);
    }
    usage
}

/// Applies the replacement table and math lower-casing to one line.
pub fn edit_line(line: &str) -> String {
    let mut s = line.to_string();
    for (from, to) in REPLACES {
        if s.contains(from) {
            s = replace_word(&s, from, to);
        }
    }
    for prefix in MATH_PREFIXES {
        s = math_replace_all(&s, prefix);
    }
    s
}

/// Whether a match right after `before` starts a new identifier.
fn at_boundary(before: &str) -> bool {
    before
        .chars()
        .next_back()
        .map_or(true, |c| !(c.is_alphanumeric() || c == '_'))
}

/// Replaces `from` only where it is not the tail of a longer identifier,
/// so `int32` never matches inside `Uint32`.
fn replace_word(line: &str, from: &str, to: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(i) = rest.find(from) {
        out.push_str(&rest[..i]);
        if at_boundary(&out) {
            out.push_str(to);
        } else {
            out.push_str(from);
        }
        rest = &rest[i + from.len()..];
    }
    out.push_str(rest);
    out
}

/// Removes `prefix` where it starts an identifier and lower-cases the first
/// letter of the name that follows.
fn math_replace_all(line: &str, prefix: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(i) = rest.find(prefix) {
        let boundary = at_boundary(&rest[..i]);
        let after = &rest[i + prefix.len()..];
        match after.chars().next() {
            Some(c) if boundary && c.is_uppercase() => {
                out.push_str(&rest[..i]);
                out.extend(c.to_lowercase());
                rest = &after[c.len_utf8()..];
            }
            _ => {
                out.push_str(&rest[..i + prefix.len()]);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// WGSL spelling of a Go type name.
pub fn shader_type_name(go: &str) -> String {
    match go {
        "int" => "i32".to_string(),
        "uint" => "u32".to_string(),
        _ => edit_line(go),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edit(lines: &[&str]) -> (Vec<String>, SupportUse) {
        let mut v: Vec<String> = lines.iter().map(|s| s.to_string()).collect();
        let usage = sl_edits(&mut v);
        (v, usage)
    }

    #[test]
    fn numeric_types() {
        let (out, _) = edit(&["var x: float32 = float32(a) + uint32(b) + int32(c);"]);
        assert_eq!(out[0], "var x: f32 = f32(a) + u32(b) + i32(c);");
    }

    #[test]
    fn math_lowercase() {
        let (out, _) = edit(&["y = math32.Sqrt(x) + math.Abs(z) + mymath.Foo(q);"]);
        assert_eq!(out[0], "y = sqrt(x) + abs(z) + mymath.Foo(q);");
    }

    #[test]
    fn bool_wrappers() {
        let (out, _) = edit(&["if (slbool.IsTrue(p.On)) { p.On = slbool.False; }"]);
        assert_eq!(out[0], "if ((1 == p.On)) { p.On = 0; }");
    }

    #[test]
    fn detects_support_use() {
        let (out, usage) = edit(&["var r = slrand.Float32(ctr, 0, key);"]);
        assert!(usage.slrand);
        assert!(!usage.sltype);
        assert_eq!(out[0], "var r = RandFloat32(ctr, 0, key);");

        let (out, usage) = edit(&["var c: sltype.Uint32Vec2;"]);
        assert!(usage.sltype);
        assert_eq!(out[0], "var c: vec2<u32>;");
    }

    #[test]
    fn support_names_keep_their_width() {
        assert_eq!(edit_line("var r = slrand.Uint32(c, 0, k);"), "var r = RandUint32(c, 0, k);");
        assert_eq!(edit_line("var n = slrand.Uint32N(c, 10, k);"), "var n = RandUint32N(c, 10, k);");
        assert_eq!(
            edit_line("var f = sltype.Uint32ToFloat32(u);"),
            "var f = Uint32ToFloat32(u);"
        );
        assert_eq!(edit_line("var v = sltype.Uint64Incr(x);"), "var v = Uint64Incr(x);");
        assert_eq!(edit_line("x := int32(myint32)"), "x := i32(myint32)");
    }

    #[test]
    fn directive_lines_untouched() {
        let (out, _) = edit(&["//gosl:import \"math32\"", "float32"]);
        assert_eq!(out[0], "//gosl:import \"math32\"");
        assert_eq!(out[1], "f32");
    }

    #[test]
    fn type_names() {
        assert_eq!(shader_type_name("int"), "i32");
        assert_eq!(shader_type_name("float32"), "f32");
        assert_eq!(shader_type_name("slbool.Bool"), "i32");
        assert_eq!(shader_type_name("Params"), "Params");
    }
}
