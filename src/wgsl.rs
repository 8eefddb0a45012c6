//! # WGSL extraction
//!
//! Turns post-processed printer output into pure WGSL fragments: drops the
//! synthetic package/import header, removes `//gosl:nowgsl` regions, and
//! un-comments `//gosl:wgsl` regions, which hold shader-only code that had to
//! live inside Go comments to get past the Go front end.

use crate::directives::Directive;

/// Number of leading lines searched for the package clause.
const HEADER_SCAN_LINES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Plain,
    Wgsl,
    NoWgsl,
}

/// Extracts the WGSL text from the given lines.
pub fn extract_wgsl(lines: &[String]) -> Vec<String> {
    let start = header_end(lines);
    let mut out = Vec::with_capacity(lines.len() - start);
    let mut region = Region::Plain;
    for line in &lines[start..] {
        let dir = if Directive::is_marker_line(line) {
            Directive::parse(line)
        } else {
            None
        };
        match region {
            Region::NoWgsl => {
                if dir == Some(Directive::End) {
                    region = Region::Plain;
                }
            }
            Region::Wgsl => {
                if dir == Some(Directive::End) {
                    region = Region::Plain;
                } else if let Some(l) = uncomment(line) {
                    out.push(l);
                }
            }
            Region::Plain => match dir {
                Some(Directive::NoWgsl) => region = Region::NoWgsl,
                Some(Directive::Wgsl) => region = Region::Wgsl,
                Some(_) => {}
                None => out.push(line.clone()),
            },
        }
    }
    out
}

/// Index of the first line after the package clause and import block.
fn header_end(lines: &[String]) -> usize {
    let scan = lines.len().min(HEADER_SCAN_LINES);
    let Some(pkg) = lines[..scan]
        .iter()
        .position(|l| l.trim_start().starts_with("package "))
    else {
        return 0;
    };
    let mut end = pkg + 1;
    for (i, line) in lines.iter().enumerate().take(scan).skip(pkg + 1) {
        let t = line.trim();
        if t.starts_with("import (") {
            return lines[i..]
                .iter()
                .position(|l| l.trim() == ")")
                .map_or(lines.len(), |j| i + j + 1);
        }
        if t.starts_with("import ") {
            end = i + 1;
        }
    }
    end
}

/// Removes Go comment syntax from a shader-only line.
fn uncomment(line: &str) -> Option<String> {
    let trimmed = line.trim_start();
    let indent = &line[..line.len() - trimmed.len()];
    match trimmed.trim_end() {
        "/*" | "*/" => return None,
        _ => {}
    }
    let mut body = trimmed;
    if let Some(rest) = body.strip_prefix("//") {
        body = rest.strip_prefix(' ').unwrap_or(rest);
    }
    let body = body.strip_prefix("/*").unwrap_or(body);
    let body = body.trim_end();
    let body = body.strip_suffix("*/").unwrap_or(body);
    Some(format!("{}{}", indent, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(src: &str) -> Vec<String> {
        src.lines().map(str::to_string).collect()
    }

    #[test]
    fn strips_header() {
        let src = "package imports\n\nimport (\n\t\"math\"\n\t\"fmt\"\n)\n\nconst A = 1;\n";
        assert_eq!(extract_wgsl(&lines(src)), vec!["", "const A = 1;"]);
    }

    #[test]
    fn strips_package_without_imports() {
        let src = "package imports\nconst A = 1;\n";
        assert_eq!(extract_wgsl(&lines(src)), vec!["const A = 1;"]);
    }

    #[test]
    fn nowgsl_region_dropped() {
        let src = "package p\nfn a() {\n//gosl:nowgsl\nfoo();\n//gosl:end\n}\n";
        assert_eq!(extract_wgsl(&lines(src)), vec!["fn a() {", "}"]);
    }

    #[test]
    fn wgsl_region_uncommented() {
        let src = "package p\n//gosl:wgsl\n// fn b() -> f32 {\n//\treturn 1.0;\n// }\n/*\nalias X = f32;\n*/\n//gosl:end\n";
        assert_eq!(
            extract_wgsl(&lines(src)),
            vec!["fn b() -> f32 {", "\treturn 1.0;", "}", "alias X = f32;"]
        );
    }

    #[test]
    fn markers_removed() {
        let src = "package p\n//gosl:start\nconst A = 1;\n//gosl:end\n";
        assert_eq!(extract_wgsl(&lines(src)), vec!["const A = 1;"]);
    }
}
