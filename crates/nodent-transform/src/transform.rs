//! Per-target emission and the transform entry points.
//!
//! Bind targets (CallbackBind, Promise) rewrite
//! ```javascript
//! async function f(a) { body }
//! ```
//! into
//! ```javascript
//! function f(a, $return, $error) {          // CallbackBind adds the callbacks
//!     var $this = this;                     // only when `this` is used
//!     return $asyncbind(this, function ($return, $error) {
//!         var hoisted, $t_1;
//!         ...segments...
//!     }, $return, $error);
//! }
//! ```
//! The Generator target keeps the body as a generator with `await` turned
//! into `yield`, driven by `$asyncspawn(this, function* () { ... })`.
//! EngineNative leaves async functions to the host.

use crate::discovery::{AsyncUnit, discover_async_functions, discover_generators, validate};
use crate::error::TransformError;
use crate::lower::{Frame, LowerStats, Lowerer, SuspendStyle};
use crate::names::NameGen;
use crate::options::{CompileOptions, TargetMode};
use crate::prepare::{BodyPreparer, PreparedBody};
use nodent_ast::walk::{depth, visit_body};
use nodent_ast::{AstBuilder, FunctionData, NodeArena, NodeFlags, NodeIndex, NodeKind};
use nodent_common::limits::MAX_TRANSFORM_DEPTH;
use nodent_common::{Diagnostic, Span, diagnostic_codes};
use serde::Serialize;

/// A synthesized node and the source position of the construct it stands in for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PositionMapping {
    pub node: NodeIndex,
    pub original: Span,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformStats {
    pub functions_transformed: usize,
    pub suspension_points: usize,
    pub segments_emitted: usize,
    pub temporaries: usize,
}

impl TransformStats {
    fn absorb(&mut self, lowered: LowerStats, temporaries: usize) {
        self.functions_transformed += 1;
        self.suspension_points += lowered.suspension_points;
        self.segments_emitted += lowered.segments;
        self.temporaries += temporaries;
    }
}

#[derive(Clone, Debug)]
pub struct TransformOutput {
    pub root: NodeIndex,
    /// Empty unless `source_positions` was requested.
    pub mappings: Vec<PositionMapping>,
    pub stats: TransformStats,
}

/// Rewrite every async function under `root` for `options.target`.
///
/// Fails without touching the tree when the configuration is invalid, the
/// tree is too deep, or any structural diagnostic is found.
#[tracing::instrument(level = "debug", skip_all, fields(file = file, target = %options.target))]
pub fn transform(
    arena: &mut NodeArena,
    root: NodeIndex,
    options: &CompileOptions,
    file: &str,
) -> Result<TransformOutput, TransformError> {
    options.validate()?;
    check_depth(arena, root)?;

    let diagnostics = validate(arena, root, options.target, file);
    if !diagnostics.is_empty() {
        tracing::debug!(count = diagnostics.len(), "structural errors");
        return Err(TransformError::Structural(diagnostics));
    }

    let units = discover_async_functions(arena, root);
    let mut names = NameGen::new(&options.symbols.prefix);
    let mut stats = TransformStats::default();
    for unit in &units {
        match options.target {
            TargetMode::CallbackBind | TargetMode::Promise => {
                emit_bind(arena, unit, options, &mut names, &mut stats);
            }
            TargetMode::Generator => {
                emit_spawn(arena, unit, options, &mut stats);
            }
            TargetMode::EngineNative => {}
        }
    }

    arena.rebuild_parents(root);
    tracing::debug!(
        functions = stats.functions_transformed,
        suspension_points = stats.suspension_points,
        segments = stats.segments_emitted,
        "transform complete"
    );
    Ok(TransformOutput {
        root,
        mappings: collect_mappings(arena, root, options.source_positions),
        stats,
    })
}

/// Lower every (non-async) generator function under `root` onto the
/// `$generator` runtime entry, for hosts without native generators.
///
/// ```javascript
/// function* g(a) { var x = yield a; return x; }
/// ```
/// becomes
/// ```javascript
/// function g(a) {
///     return $generator(this, function ($return, $error, $yield) {
///         var x;
///         return $yield(a, function ($yield_1) { x = $yield_1; return $return(x); }, $error);
///     });
/// }
/// ```
#[tracing::instrument(level = "debug", skip_all, fields(file = file))]
pub fn lower_host_generators(
    arena: &mut NodeArena,
    root: NodeIndex,
    options: &CompileOptions,
    file: &str,
) -> Result<TransformOutput, TransformError> {
    options.validate()?;
    check_depth(arena, root)?;

    let generators = discover_generators(arena, root);
    let mut diagnostics = Vec::new();
    for &generator in &generators {
        let Some(body) = arena.get_function(generator).map(|f| f.body) else {
            continue;
        };
        visit_body(arena, body, &mut |idx, kind| {
            if matches!(kind, NodeKind::Yield { delegate: true, .. }) {
                diagnostics.push(Diagnostic::from_code(
                    file,
                    arena.span(idx),
                    diagnostic_codes::DELEGATING_YIELD_UNSUPPORTED,
                    &[],
                ));
            }
        });
    }
    if !diagnostics.is_empty() {
        return Err(TransformError::Structural(diagnostics));
    }

    let mut names = NameGen::new(&options.symbols.prefix);
    let mut stats = TransformStats::default();
    for generator in generators {
        emit_host_generator(arena, generator, options, &mut names, &mut stats);
    }
    arena.rebuild_parents(root);
    Ok(TransformOutput {
        root,
        mappings: collect_mappings(arena, root, options.source_positions),
        stats,
    })
}

fn check_depth(arena: &NodeArena, root: NodeIndex) -> Result<(), TransformError> {
    let depth = depth(arena, root);
    if depth > MAX_TRANSFORM_DEPTH {
        return Err(TransformError::TooDeep {
            depth,
            limit: MAX_TRANSFORM_DEPTH,
        });
    }
    Ok(())
}

fn collect_mappings(arena: &NodeArena, root: NodeIndex, enabled: bool) -> Vec<PositionMapping> {
    if !enabled {
        return Vec::new();
    }
    arena
        .preorder(root)
        .into_iter()
        .filter_map(|node| {
            let data = arena.get(node)?;
            (data.flags.contains(NodeFlags::SYNTHESIZED) && data.span != Span::default()).then(
                || PositionMapping {
                    node,
                    original: data.span,
                },
            )
        })
        .collect()
}

fn emit_bind(
    arena: &mut NodeArena,
    unit: &AsyncUnit,
    options: &CompileOptions,
    names: &mut NameGen,
    stats: &mut TransformStats,
) {
    let Some(func) = arena.get_function(unit.function).cloned() else {
        return;
    };
    let symbols = &options.symbols;
    let span = arena.span(unit.function);
    let this_name = symbols.this_name();

    let prepared = BodyPreparer::new(
        arena,
        &func.params,
        Some(this_name.clone()),
        &symbols.arguments_name,
    )
    .prepare(func.body);
    let statements = arena.statements_of(func.body);

    let style = SuspendStyle::Await {
        make_thenable: options
            .wrap_await
            .then(|| symbols.make_thenable.clone()),
    };
    let frame = Frame::new(&symbols.return_name, &symbols.error_name);
    let (body_statements, lowered, temps) = {
        let mut lowerer = Lowerer::new(arena, names, style, &this_name);
        lowerer.span = span;
        let segment = lowerer.lower_body(statements, &frame, &frame.exit());
        let body = lowerer.segment_body(segment, frame.error_name());
        (body, lowerer.stats, lowerer.temps)
    };
    stats.absorb(lowered, temps.len());

    let mut b = AstBuilder::synthesized(arena, span);
    let mut inner = declarations(&mut b, &prepared, &temps);
    inner.extend(body_statements);
    let body_fn = b.segment_function(
        None,
        vec![symbols.return_name.clone(), symbols.error_name.clone()],
        inner,
    );

    let mut outer = captures(&mut b, &prepared, &this_name, &symbols.arguments_name);
    let this = b.this();
    let mut args = vec![this, body_fn];
    let mut params = func.params.clone();
    if options.target == TargetMode::CallbackBind {
        args.push(b.ident(symbols.return_name.as_str()));
        args.push(b.ident(symbols.error_name.as_str()));
        params.push(symbols.return_name.clone());
        params.push(symbols.error_name.clone());
    }
    let call = b.driver_call(&symbols.async_bind, args);
    outer.push(b.ret(call));
    let body = b.block(outer);

    tracing::trace!(
        function = ?func.name,
        suspension_points = lowered.suspension_points,
        segments = lowered.segments,
        "lowered async function"
    );
    arena.replace_kind(
        unit.function,
        NodeKind::Function(FunctionData {
            params,
            body,
            is_async: false,
            ..func
        }),
    );
}

fn emit_spawn(
    arena: &mut NodeArena,
    unit: &AsyncUnit,
    options: &CompileOptions,
    stats: &mut TransformStats,
) {
    let Some(func) = arena.get_function(unit.function).cloned() else {
        return;
    };
    let symbols = &options.symbols;
    let span = arena.span(unit.function);

    // The generator receives `this` from the spawn driver; `arguments` must
    // still refer to the async function's own.
    let prepared =
        BodyPreparer::new(arena, &func.params, None, &symbols.arguments_name).prepare(func.body);
    for point in &unit.suspension_points {
        if let Some(NodeKind::Await { expression }) = arena.kind(*point).cloned() {
            arena.replace_kind(
                *point,
                NodeKind::Yield {
                    expression,
                    delegate: false,
                },
            );
        }
    }
    let statements = arena.statements_of(func.body);

    let mut b = AstBuilder::synthesized(arena, span);
    let mut inner = declarations(&mut b, &prepared, &[]);
    inner.extend(statements);
    let generator = b.generator_function_expr(None, &[], inner);

    let mut outer = captures(&mut b, &prepared, &symbols.this_name(), &symbols.arguments_name);
    let this = b.this();
    let call = b.driver_call(&symbols.async_spawn, vec![this, generator]);
    outer.push(b.ret(call));
    let body = b.block(outer);

    stats.absorb(
        LowerStats {
            suspension_points: unit.suspension_points.len(),
            segments: 1,
        },
        0,
    );
    arena.replace_kind(
        unit.function,
        NodeKind::Function(FunctionData {
            body,
            is_async: false,
            ..func
        }),
    );
}

fn emit_host_generator(
    arena: &mut NodeArena,
    generator: NodeIndex,
    options: &CompileOptions,
    names: &mut NameGen,
    stats: &mut TransformStats,
) {
    let Some(func) = arena.get_function(generator).cloned() else {
        return;
    };
    let symbols = &options.symbols;
    let span = arena.span(generator);
    let this_name = symbols.this_name();
    let yield_name = names.fixed("yield");

    let prepared = BodyPreparer::new(
        arena,
        &func.params,
        Some(this_name.clone()),
        &symbols.arguments_name,
    )
    .prepare(func.body);
    let statements = arena.statements_of(func.body);

    let frame = Frame::new(&symbols.return_name, &symbols.error_name);
    let style = SuspendStyle::Yield {
        yield_name: yield_name.clone(),
    };
    let (body_statements, lowered, temps) = {
        let mut lowerer = Lowerer::new(arena, names, style, &this_name);
        lowerer.span = span;
        let segment = lowerer.lower_body(statements, &frame, &frame.exit());
        let body = lowerer.segment_body(segment, frame.error_name());
        (body, lowerer.stats, lowerer.temps)
    };
    stats.absorb(lowered, temps.len());

    let mut b = AstBuilder::synthesized(arena, span);
    let mut inner = declarations(&mut b, &prepared, &temps);
    inner.extend(body_statements);
    let body_fn = b.segment_function(
        None,
        vec![
            symbols.return_name.clone(),
            symbols.error_name.clone(),
            yield_name,
        ],
        inner,
    );
    let mut outer = captures(&mut b, &prepared, &this_name, &symbols.arguments_name);
    let this = b.this();
    let call = b.driver_call(&symbols.generator, vec![this, body_fn]);
    outer.push(b.ret(call));
    let body = b.block(outer);

    arena.replace_kind(
        generator,
        NodeKind::Function(FunctionData {
            body,
            is_generator: false,
            ..func
        }),
    );
}

/// `var` list for hoisted names and temporaries, then lifted functions.
fn declarations(b: &mut AstBuilder<'_>, prepared: &PreparedBody, temps: &[String]) -> Vec<NodeIndex> {
    let mut out = Vec::new();
    let names: Vec<String> = prepared.vars.iter().chain(temps).cloned().collect();
    if !names.is_empty() {
        out.push(b.var_names(&names));
    }
    out.extend(prepared.functions.iter().copied());
    out
}

/// `var $this = this; var $args = arguments;` as needed.
fn captures(
    b: &mut AstBuilder<'_>,
    prepared: &PreparedBody,
    this_name: &str,
    arguments_name: &str,
) -> Vec<NodeIndex> {
    let mut out = Vec::new();
    if prepared.uses_this {
        let this = b.this();
        out.push(b.var(this_name, this));
    }
    if prepared.uses_arguments {
        let arguments = b.ident("arguments");
        out.push(b.var(arguments_name, arguments));
    }
    out
}
