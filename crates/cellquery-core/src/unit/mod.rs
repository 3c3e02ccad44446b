//! Evaluation units: an analyzed expression compiled into a callable.

mod emit;
mod naming;

pub use emit::{BODY_FN, EmitOptions, EmittedUnit, arg_name, emit};
pub use naming::{BUILTIN_FUNCTION_NAMES, DIGEST_PREFIX, ReservedNames, digest_name, unit_name};

use cellquery_engine::engine::{
    AST, Dynamic, HostBridges, NormalizedGrid, RawGrid, create_engine, normalize,
};
use rhai::{Engine, Scope};

use crate::analysis::{Analysis, analyze};
use crate::error::{Error, Result};

/// A compiled expression, ready to run against host arguments.
pub struct EvaluationUnit {
    analysis: Analysis,
    emitted: EmittedUnit,
    engine: Engine,
    ast: AST,
}

impl std::fmt::Debug for EvaluationUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluationUnit")
            .field("name", &self.emitted.name)
            .field("parameters", &self.emitted.parameters)
            .finish()
    }
}

impl EvaluationUnit {
    /// Analyze and compile `expression` in one step.
    pub fn compile(
        expression: &str,
        options: &EmitOptions,
        bridges: HostBridges,
    ) -> Result<EvaluationUnit> {
        EvaluationUnit::from_analysis(analyze(expression)?, options, bridges)
    }

    pub fn from_analysis(
        analysis: Analysis,
        options: &EmitOptions,
        bridges: HostBridges,
    ) -> Result<EvaluationUnit> {
        let emitted = emit(&analysis, options);
        let engine = create_engine(bridges);
        let ast = engine
            .compile(&emitted.source)
            .map_err(|e| Error::Compile(e.to_string()))?;
        tracing::debug!(unit = %emitted.name, params = ?emitted.parameters, "compiled unit");
        Ok(EvaluationUnit {
            analysis,
            emitted,
            engine,
            ast,
        })
    }

    pub fn name(&self) -> &str {
        &self.emitted.name
    }

    pub fn source(&self) -> &str {
        &self.emitted.source
    }

    pub fn parameters(&self) -> &[String] {
        &self.emitted.parameters
    }

    pub fn analysis(&self) -> &Analysis {
        &self.analysis
    }

    /// Run with positional arguments, one per parameter.
    pub fn invoke(&self, args: Vec<Dynamic>) -> Result<RawGrid> {
        let expected = self.emitted.parameters.len();
        if args.len() != expected {
            return Err(Error::Arity {
                expected,
                found: args.len(),
            });
        }

        let mut scope = Scope::new();
        for (i, arg) in args.into_iter().enumerate() {
            scope.push_dynamic(arg_name(i), arg);
        }

        tracing::debug!(unit = %self.emitted.name, args = expected, "invoking unit");
        let result = self
            .engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, &self.ast)?;
        if result.is::<NormalizedGrid>() {
            return Ok(result.cast::<NormalizedGrid>().0);
        }
        Ok(normalize(result)?)
    }

    /// Run with arguments looked up by parameter name.
    pub fn invoke_with<F>(&self, lookup: F) -> Result<RawGrid>
    where
        F: Fn(&str) -> Option<Dynamic>,
    {
        let args = self
            .emitted
            .parameters
            .iter()
            .map(|name| lookup(name).ok_or_else(|| Error::MissingArgument(name.clone())))
            .collect::<Result<Vec<_>>>()?;
        self.invoke(args)
    }
}
