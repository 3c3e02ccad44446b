//! Rhai source for an evaluation unit.
//!
//! ```text
//! fn __cq_body(tbl, limit) {
//! tbl.where(|r| r.age > limit)
//! }
//! fn ADULTS(tbl, limit) {
//!     let tbl = __cq_wrap(tbl, false);
//!     let limit = __cq_wrap(limit, false);
//!     __cq_normalize(__cq_body(tbl, limit))
//! }
//! ADULTS(__cq_arg0, __cq_arg1)
//! ```

use cellquery_engine::builtins::{NORMALIZE_FN, WRAP_FN};

use super::naming::{ReservedNames, unit_name};
use crate::analysis::Analysis;

pub const BODY_FN: &str = "__cq_body";

/// Scope variable holding the `index`-th argument.
pub fn arg_name(index: usize) -> String {
    format!("__cq_arg{}", index)
}

#[derive(Clone, Debug, Default)]
pub struct EmitOptions {
    pub preferred_name: Option<String>,
    pub reserved: ReservedNames,
}

impl EmitOptions {
    pub fn named(name: impl Into<String>) -> EmitOptions {
        EmitOptions {
            preferred_name: Some(name.into()),
            ..EmitOptions::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmittedUnit {
    pub name: String,
    /// Inputs, then free variables.
    pub parameters: Vec<String>,
    pub source: String,
}

pub fn emit(analysis: &Analysis, options: &EmitOptions) -> EmittedUnit {
    let name = unit_name(
        &analysis.source,
        options.preferred_name.as_deref(),
        &options.reserved,
    );
    let parameters = analysis.parameters();
    let params = parameters.join(", ");

    let mut source = String::new();
    source.push_str(&format!("fn {}({}) {{\n{}\n}}\n", BODY_FN, params, analysis.body));
    source.push_str(&format!("fn {}({}) {{\n", name, params));
    for p in &parameters {
        source.push_str(&format!(
            "    let {p} = {}({p}, {});\n",
            WRAP_FN, analysis.needs_escalation
        ));
    }
    source.push_str(&format!("    {}({}({}))\n}}\n", NORMALIZE_FN, BODY_FN, params));

    let args: Vec<String> = (0..parameters.len()).map(arg_name).collect();
    source.push_str(&format!("{}({})\n", name, args.join(", ")));

    EmittedUnit {
        name,
        parameters,
        source,
    }
}
