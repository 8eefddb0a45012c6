//! # Struct alignment check
//!
//! Structs shared between Go and WGSL buffers must have the same memory
//! layout on both sides. This reports field types WGSL cannot represent,
//! vectors that are not aligned to their size, and struct sizes that are
//! not a multiple of 16 bytes. Problems are warnings only.

use crate::go::ast::{Decl, DeclKind, Expr, Spec};
use crate::go::{File, Type, TypeEnv};

/// Size and alignment of a field type in bytes, or why it is not allowed.
fn layout(env: &TypeEnv, typ: &Type, depth: usize) -> Result<(usize, usize), String> {
    match typ {
        Type::Named(name) => match name.as_str() {
            "float32" | "int32" | "uint32" => Ok((4, 4)),
            "int" | "uint" | "int64" | "uint64" | "float64" => {
                Err(format!("{} is 64 bits; use a 32-bit type", name))
            }
            "bool" => Err("bool has no defined layout; use slbool.Bool".to_string()),
            other => match env.types.get(other) {
                Some(Type::Struct(_)) if depth < 8 => {
                    let size = struct_size(env, typ, depth + 1)?;
                    Ok((size, 16))
                }
                Some(def) if depth < 8 => layout(env, def, depth + 1),
                _ => Err(format!("unsupported field type {}", other)),
            },
        },
        Type::Qualified { pkg, name } => match (pkg.as_str(), name.as_str()) {
            ("slbool", "Bool") => Ok((4, 4)),
            ("math32", "Vector2" | "Vector2i") => Ok((8, 8)),
            ("math32", "Vector4") => Ok((16, 16)),
            ("sltype", n) if n.ends_with("Vec2") => Ok((8, 8)),
            ("sltype", n) if n.ends_with("Vec4") => Ok((16, 16)),
            ("math32", "Vector3" | "Vector3i") => {
                Err(format!("{}.{} has a 16-byte stride in WGSL; use a 4-vector", pkg, name))
            }
            _ => Err(format!("unsupported field type {}.{}", pkg, name)),
        },
        Type::Array(len, elem) => {
            let n: usize = len
                .parse()
                .map_err(|_| format!("array length {} must be a literal", len))?;
            let (size, align) = layout(env, elem, depth + 1)?;
            if size % 16 != 0 {
                return Err("array elements must be a multiple of 16 bytes".to_string());
            }
            Ok((size * n, align))
        }
        Type::Pointer(_) => Err("pointers cannot be stored in GPU buffers".to_string()),
        Type::Slice(_) => Err("slices cannot be stored in GPU buffers".to_string()),
        _ => Err("unsupported field type".to_string()),
    }
}

fn struct_size(env: &TypeEnv, typ: &Type, depth: usize) -> Result<usize, String> {
    let fields = env
        .struct_fields(typ)
        .ok_or_else(|| "not a struct".to_string())?;
    let mut off = 0;
    for (name, ftype) in fields {
        let (size, align) = layout(env, ftype, depth).map_err(|e| format!("field {}: {}", name, e))?;
        if off % align != 0 {
            return Err(format!(
                "field {} at offset {} must be aligned to {} bytes",
                name, off, align
            ));
        }
        off += size;
    }
    Ok(off)
}

/// Checks every struct type declared in `files`; returns the warnings.
pub fn check<'a>(files: impl IntoIterator<Item = &'a File>, env: &TypeEnv) -> Vec<String> {
    let mut warnings = Vec::new();
    for file in files {
        for decl in &file.decls {
            let Decl::Gen(gd) = decl else { continue };
            if gd.kind != DeclKind::Type {
                continue;
            }
            for spec in &gd.specs {
                let Spec::Type(ts) = spec else { continue };
                if !matches!(ts.typ, Expr::StructType(_)) {
                    continue;
                }
                let typ = Type::Named(ts.name.clone());
                match struct_size(env, &typ, 0) {
                    Ok(size) if size % 16 != 0 => warnings.push(format!(
                        "{}:{}: struct {} is {} bytes, which is not a multiple of 16; add padding fields",
                        file.name, ts.line, ts.name, size
                    )),
                    Ok(_) => {}
                    Err(e) => warnings.push(format!("{}:{}: struct {}: {}", file.name, ts.line, ts.name, e)),
                }
            }
        }
    }
    for w in &warnings {
        tracing::warn!("[ALIGN] {}", w);
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::go::parse_file;

    fn warnings(src: &str) -> Vec<String> {
        let file = parse_file("a.go", src).unwrap();
        let env = TypeEnv::from_files([&file]);
        check([&file], &env)
    }

    #[test]
    fn padded_struct_is_clean() {
        let w = warnings(
            "package p\n\ntype P struct {\n\tA float32\n\tB int32\n\tOn slbool.Bool\n\tpad float32\n}\n",
        );
        assert!(w.is_empty(), "{:?}", w);
    }

    #[test]
    fn reports_size_and_wide_fields() {
        let w = warnings("package p\n\ntype P struct {\n\tA float32\n}\n\ntype Q struct {\n\tN int\n}\n");
        assert_eq!(w.len(), 2);
        assert!(w[0].contains("not a multiple of 16"));
        assert!(w[1].contains("64 bits"));
    }

    #[test]
    fn vectors_must_be_aligned() {
        let w = warnings(
            "package p\n\ntype P struct {\n\tA float32\n\tV math32.Vector2\n\tB float32\n\tC float32\n}\n",
        );
        assert_eq!(w.len(), 1);
        assert!(w[0].contains("aligned to 8"));
    }
}
