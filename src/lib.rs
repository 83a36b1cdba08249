//! nodent: async/await desugaring and the continuation runtime it targets.
//!
//! The [`Compiler`] facade ties the pieces together for a host:
//!
//! ```text
//! option set + JSON layers --OptionResolver--> CompileOptions
//! arena tree --transform--> rewritten tree (+ host generator lowering)
//!            --DebugPrinter--> text, positions --SourceMapGenerator--> v3 map
//! ```
//!
//! The member crates are re-exported so a host needs only this one.

pub mod tracing_config;

pub use nodent_ast as ast;
pub use nodent_common as common;
pub use nodent_eval as eval;
pub use nodent_runtime as runtime;
pub use nodent_transform as transform;

use nodent_ast::{DebugPrinter, NodeArena, NodeIndex, PrintedTree};
use nodent_common::source_map::SourceMapGenerator;
use nodent_eval::Evaluator;
use nodent_runtime::{EntryPoints, Runtime};
use nodent_transform::{
    CompileOptions, ConfigError, OptionResolver, PositionMapping, TargetMode, TransformError,
    TransformStats,
};

/// One compilation unit after transformation.
#[derive(Clone, Debug)]
pub struct CompiledUnit {
    pub root: NodeIndex,
    pub target: TargetMode,
    /// The rewritten tree rendered as JavaScript-like text.
    pub text: String,
    pub stats: TransformStats,
    /// v3 source map JSON, when source positions were requested.
    pub source_map: Option<String>,
}

impl CompiledUnit {
    /// Summary suitable for logging or a build report.
    pub fn report(&self) -> serde_json::Value {
        serde_json::json!({
            "target": self.target.name(),
            "stats": self.stats,
            "sourceMap": self.source_map.is_some(),
        })
    }
}

/// Compiles arena trees under one resolved configuration.
#[derive(Clone, Debug)]
pub struct Compiler {
    options: CompileOptions,
    host_generators: bool,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Compiler {
        Compiler {
            options,
            host_generators: false,
        }
    }

    /// Resolve a named option set with optional project and inline JSON
    /// layers through the default resolver.
    pub fn from_option_set(
        set: &str,
        project: Option<&str>,
        inline: Option<&str>,
    ) -> Result<Compiler, ConfigError> {
        Compiler::with_resolver(&OptionResolver::new(), set, project, inline)
    }

    pub fn with_resolver(
        resolver: &OptionResolver,
        set: &str,
        project: Option<&str>,
        inline: Option<&str>,
    ) -> Result<Compiler, ConfigError> {
        let options = resolver.resolve_str(set, project, inline)?;
        options.validate()?;
        Ok(Compiler::new(options))
    }

    /// Also lower generator functions onto `$generator`, so generator-mode
    /// output runs on hosts without native generators.
    pub fn with_host_generators(mut self, on: bool) -> Compiler {
        self.host_generators = on;
        self
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Transform the tree at `root` in place and render the result.
    pub fn compile(
        &self,
        arena: &mut NodeArena,
        root: NodeIndex,
        file: &str,
    ) -> Result<CompiledUnit, TransformError> {
        let span = tracing::info_span!("compile", file, target = %self.options.target);
        let _guard = span.enter();

        let output = nodent_transform::transform(arena, root, &self.options, file)?;
        let mut stats = output.stats;
        let mut mappings = output.mappings;
        if self.host_generators {
            let lowered = nodent_transform::lower_host_generators(arena, root, &self.options, file)?;
            stats.functions_transformed += lowered.stats.functions_transformed;
            stats.suspension_points += lowered.stats.suspension_points;
            stats.segments_emitted += lowered.stats.segments_emitted;
            stats.temporaries += lowered.stats.temporaries;
            mappings.extend(lowered.mappings);
        }

        let printed = DebugPrinter::new(arena).with_positions().print_tree(root);
        let source_map = self
            .options
            .source_positions
            .then(|| build_source_map(file, &printed, &mappings));
        tracing::debug!(
            functions = stats.functions_transformed,
            suspensions = stats.suspension_points,
            segments = stats.segments_emitted,
            "unit compiled"
        );
        Ok(CompiledUnit {
            root,
            target: self.options.target,
            text: printed.text,
            stats,
            source_map,
        })
    }

    /// An evaluator over `arena` whose globals include the runtime entry
    /// points under this configuration's symbol names.
    pub fn evaluator(&self, arena: NodeArena, runtime: &Runtime) -> Evaluator {
        let evaluator = Evaluator::new(arena, runtime);
        let entry = EntryPoints::new(runtime);
        let symbols = &self.options.symbols;
        evaluator.define_global(&symbols.async_bind, entry.async_bind);
        evaluator.define_global(&symbols.async_spawn, entry.async_spawn);
        evaluator.define_global(&symbols.make_thenable, entry.make_thenable);
        evaluator.define_global(&symbols.generator, entry.generator);
        evaluator
    }
}

/// Generated positions come from the printer; original ones from the spans
/// the transform copied onto synthesized nodes.
fn build_source_map(file: &str, printed: &PrintedTree, mappings: &[PositionMapping]) -> String {
    let mut generator = SourceMapGenerator::new(format!("{file}.out"));
    let source = generator.add_source(file.to_string());
    let mut pairs: Vec<_> = mappings
        .iter()
        .filter_map(|m| printed.position_of(m.node).map(|pos| (pos, m.original)))
        .collect();
    pairs.sort_by_key(|(pos, _)| (pos.line, pos.column));
    pairs.dedup_by_key(|(pos, _)| (pos.line, pos.column));
    for (pos, original) in pairs {
        generator.add_simple_mapping(
            pos.line,
            pos.column,
            source,
            original.line,
            original.column,
        );
    }
    generator.to_json()
}
