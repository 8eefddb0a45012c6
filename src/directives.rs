//! # Directives
//!
//! The `//gosl:<keyword> [args]` comment grammar recognized in Go sources.

/// Prefix that marks a gosl directive comment.
pub const PREFIX: &str = "//gosl:";

/// Name of the system used when a directive does not name one.
pub const DEFAULT_SYSTEM: &str = "Default";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Start,
    End,
    Wgsl,
    NoWgsl,
    /// Global buffer variable block for the named system.
    Vars(String),
    /// Go package whose tagged code is translated along with this one.
    Import(String),
    /// Compute kernel entry point for the named system.
    Kernel(String),
    Group { uniform: bool, name: Option<String> },
    /// Tensor dimensionality; left unparsed so the caller can report bad values.
    Dims(String),
    ReadOnly,
    Unknown(String),
}

impl Directive {
    /// Parses a comment that starts with [`PREFIX`].
    pub fn parse(comment: &str) -> Option<Directive> {
        let body = comment.trim().strip_prefix(PREFIX)?;
        let (keyword, args) = match body.find(char::is_whitespace) {
            Some(i) => (&body[..i], body[i..].trim()),
            None => (body, ""),
        };
        let system = || {
            if args.is_empty() {
                DEFAULT_SYSTEM.to_string()
            } else {
                args.split_whitespace().next().unwrap_or(DEFAULT_SYSTEM).to_string()
            }
        };
        Some(match keyword {
            "start" => Directive::Start,
            "end" => Directive::End,
            "wgsl" => Directive::Wgsl,
            "nowgsl" => Directive::NoWgsl,
            "vars" => Directive::Vars(system()),
            "kernel" => Directive::Kernel(system()),
            "import" => Directive::Import(args.trim_matches('"').trim_matches('`').to_string()),
            "group" => {
                let mut fields = args.split_whitespace();
                let mut uniform = false;
                let mut name = fields.next();
                if name == Some("-uniform") {
                    uniform = true;
                    name = fields.next();
                }
                Directive::Group {
                    uniform,
                    name: name.map(str::to_string),
                }
            }
            "dims" => Directive::Dims(args.to_string()),
            "read-only" => Directive::ReadOnly,
            other => Directive::Unknown(other.to_string()),
        })
    }

    /// Finds a directive anywhere in a source line, e.g. trailing a signature.
    pub fn find(line: &str) -> Option<Directive> {
        let i = line.find(PREFIX)?;
        Directive::parse(&line[i..])
    }

    /// True when the trimmed line consists of nothing but this directive.
    pub fn is_marker_line(line: &str) -> bool {
        line.trim_start().starts_with(PREFIX)
    }
}
