//! `//gosl:vars` blocks: the global buffers shared by a system's kernels.

use super::Printer;
use crate::directives::Directive;
use crate::error::Result;
use crate::go::ast::{DeclKind, GenDecl, Spec};
use crate::state::{Group, Var};

impl<'a> Printer<'a> {
    /// Registers the groups and vars declared by a vars block on `system`.
    ///
    /// Each var is declared on its own line. A `//gosl:group [-uniform] [name]`
    /// doc line starts a new group (named `Group_<n>` when unnamed); vars
    /// before the first one land in a default group. `//gosl:read-only` and
    /// `//gosl:dims <n>` apply to the var they document.
    pub(super) fn system_vars(&mut self, gd: &GenDecl, system: &str) -> Result<()> {
        self.line = gd.line;
        if gd.kind != DeclKind::Var {
            self.error("//gosl:vars must document a var declaration");
            return Ok(());
        }
        let existing = self.state.system(system).groups.len();
        let mut groups: Vec<Group> = Vec::new();

        for spec in &gd.specs {
            let Spec::Value(vs) = spec else { continue };
            self.line = vs.line;
            let mut read_only = false;
            let mut dims = None;
            let mut doc: Vec<String> = Vec::new();
            for line in &vs.doc {
                match Directive::parse(line) {
                    Some(Directive::Group { uniform, name }) => {
                        let name = name.unwrap_or_else(|| format!("Group_{}", existing + groups.len()));
                        groups.push(Group {
                            name,
                            doc: doc.join("\n"),
                            uniform,
                            vars: Vec::new(),
                        });
                        doc.clear();
                    }
                    Some(Directive::ReadOnly) => read_only = true,
                    Some(Directive::Dims(n)) => match n.parse::<usize>() {
                        Ok(n) if n > 0 => dims = Some(n),
                        _ => self.error(format!("invalid //gosl:dims value {:?}", n)),
                    },
                    Some(Directive::Vars(_)) => {}
                    Some(other) => self.error(format!("unexpected directive in vars block: {:?}", other)),
                    None => doc.push(comment_text(line)),
                }
            }

            let [name] = vs.names.as_slice() else {
                self.error("gosl variables must be declared one per line");
                continue;
            };
            let Some(typ) = &vs.typ else {
                self.error(format!("gosl variable {} must have an explicit type", name));
                continue;
            };
            let mut var = Var::new(name.clone(), typ.to_string(), read_only);
            var.doc = doc.join("\n");
            if var.tensor {
                match dims {
                    Some(n) => var.tensor_dims = n,
                    None => {
                        self.error(format!("tensor variable {} needs a //gosl:dims directive", name));
                        continue;
                    }
                }
            } else if !var.typ.starts_with("[]") {
                self.error(format!(
                    "gosl variable {} must be a slice or a tensor, not {}",
                    name, var.typ
                ));
                continue;
            }
            if groups.is_empty() {
                groups.push(Group {
                    name: format!("Group_{}", existing),
                    doc: String::new(),
                    uniform: false,
                    vars: Vec::new(),
                });
            }
            if let Some(group) = groups.last_mut() {
                group.vars.push(var);
            }
        }

        let sys = self.state.system(system);
        for group in groups {
            tracing::debug!(
                "[CODEGEN] system {} group {}: {} vars",
                system,
                group.name,
                group.vars.len()
            );
            sys.add_group(group)?;
        }
        Ok(())
    }
}

fn comment_text(line: &str) -> String {
    let line = line.trim();
    let line = match line.strip_prefix("//") {
        Some(rest) => rest,
        None => line
            .trim_start_matches("/*")
            .trim_end_matches("*/"),
    };
    line.trim().to_string()
}
