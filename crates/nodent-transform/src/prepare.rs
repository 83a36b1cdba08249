//! Body preparation before segmentation.
//!
//! Segment functions are nested inside the rewritten body, so everything a
//! segment can observe must be reachable by closure:
//!
//! - `var` declarations become assignments; the names are declared once at
//!   the top of the body function. Redeclared parameters are dropped from the
//!   list so the parameter binding stays visible.
//! - Function declarations are lifted to the top of the body function.
//! - `this` becomes `$this` and `arguments` becomes `$args`, both captured by
//!   the outer wrapper.

use nodent_ast::{AstBuilder, NodeArena, NodeIndex, NodeKind, NodeList};
use rustc_hash::FxHashSet;

#[derive(Clone, Debug, Default)]
pub(crate) struct PreparedBody {
    pub vars: Vec<String>,
    pub functions: Vec<NodeIndex>,
    pub uses_this: bool,
    pub uses_arguments: bool,
}

pub(crate) struct BodyPreparer<'a> {
    arena: &'a mut NodeArena,
    params: FxHashSet<String>,
    this_name: Option<String>,
    arguments_name: String,
    seen: FxHashSet<String>,
    out: PreparedBody,
}

impl<'a> BodyPreparer<'a> {
    /// `this_name: None` leaves `this` alone (generator bodies keep their
    /// own receiver).
    pub(crate) fn new(
        arena: &'a mut NodeArena,
        params: &[String],
        this_name: Option<String>,
        arguments_name: &str,
    ) -> Self {
        BodyPreparer {
            arena,
            params: params.iter().cloned().collect(),
            this_name,
            arguments_name: arguments_name.to_string(),
            seen: FxHashSet::default(),
            out: PreparedBody::default(),
        }
    }

    pub(crate) fn prepare(mut self, body: NodeIndex) -> PreparedBody {
        self.visit(body);
        self.out
    }

    fn declare(&mut self, name: &str) {
        if self.params.contains(name) || !self.seen.insert(name.to_string()) {
            return;
        }
        self.out.vars.push(name.to_string());
    }

    fn visit(&mut self, idx: NodeIndex) {
        let Some(kind) = self.arena.kind(idx).cloned() else {
            return;
        };
        match kind {
            NodeKind::Function(_) => {}
            NodeKind::This => {
                if let Some(name) = self.this_name.clone() {
                    self.out.uses_this = true;
                    self.arena.replace_kind(idx, NodeKind::Identifier { name });
                }
            }
            NodeKind::Identifier { name } if name == "arguments" => {
                self.out.uses_arguments = true;
                let name = self.arguments_name.clone();
                self.arena.replace_kind(idx, NodeKind::Identifier { name });
            }
            NodeKind::Block { statements } => {
                let kept = self.statement_list(statements.nodes);
                self.arena.replace_kind(
                    idx,
                    NodeKind::Block {
                        statements: NodeList::new(kept),
                    },
                );
            }
            NodeKind::VariableStatement { declarations } => {
                let replacement = match self.declarations_to_expression(&declarations.nodes) {
                    Some(expression) => NodeKind::ExpressionStatement { expression },
                    None => NodeKind::Empty,
                };
                self.arena.replace_kind(idx, replacement);
            }
            NodeKind::For {
                initializer,
                condition,
                incrementor,
                body,
                label,
            } => {
                let initializer = match self.arena.kind(initializer) {
                    Some(NodeKind::VariableStatement { declarations }) => {
                        let declarations = declarations.nodes.clone();
                        self.declarations_to_expression(&declarations)
                            .unwrap_or(NodeIndex::NONE)
                    }
                    _ => {
                        self.visit(initializer);
                        initializer
                    }
                };
                self.visit(condition);
                self.visit(incrementor);
                self.visit(body);
                self.arena.replace_kind(
                    idx,
                    NodeKind::For {
                        initializer,
                        condition,
                        incrementor,
                        body,
                        label,
                    },
                );
            }
            NodeKind::ForIn {
                binding,
                declares_binding,
                object,
                body,
                label,
            } => {
                if declares_binding {
                    self.declare(&binding);
                }
                self.visit(object);
                self.visit(body);
                self.arena.replace_kind(
                    idx,
                    NodeKind::ForIn {
                        binding,
                        declares_binding: false,
                        object,
                        body,
                        label,
                    },
                );
            }
            other => {
                for child in other.children() {
                    self.visit(child);
                }
            }
        }
    }

    fn statement_list(&mut self, statements: Vec<NodeIndex>) -> Vec<NodeIndex> {
        let mut kept = Vec::with_capacity(statements.len());
        for stmt in statements {
            let is_declaration = self
                .arena
                .get_function(stmt)
                .is_some_and(|f| f.is_declaration);
            if is_declaration {
                self.out.functions.push(stmt);
                continue;
            }
            self.visit(stmt);
            kept.push(stmt);
        }
        kept
    }

    /// `a = 1, b = 2` for `var a = 1, b, c = 2`; `None` when nothing is assigned.
    fn declarations_to_expression(&mut self, declarations: &[NodeIndex]) -> Option<NodeIndex> {
        let mut assignments = Vec::new();
        for &decl in declarations {
            let Some(NodeKind::VariableDeclaration { name, initializer }) =
                self.arena.kind(decl).cloned()
            else {
                continue;
            };
            self.declare(&name);
            if initializer.is_none() {
                continue;
            }
            self.visit(initializer);
            let span = self.arena.span(decl);
            let mut b = AstBuilder::synthesized(self.arena, span);
            assignments.push(b.assign_named(&name, initializer));
        }
        match assignments.len() {
            0 => None,
            1 => assignments.pop(),
            _ => {
                let span = self.arena.span(assignments[0]);
                Some(AstBuilder::synthesized(self.arena, span).sequence(assignments))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodent_ast::DebugPrinter;

    #[test]
    fn test_vars_become_assignments() {
        let mut arena = NodeArena::new();
        let mut b = AstBuilder::new(&mut arena);
        let one = b.number(1.0);
        let decl = b.var("x", one);
        let undef = b.var("y", NodeIndex::NONE);
        let this = b.this();
        let ret = b.ret(this);
        let body = b.block(vec![decl, undef, ret]);

        let prepared = BodyPreparer::new(&mut arena, &[], Some("$this".into()), "$args").prepare(body);
        assert_eq!(prepared.vars, vec!["x".to_string(), "y".to_string()]);
        assert!(prepared.uses_this);
        let text = DebugPrinter::new(&arena).print(body);
        assert!(text.contains("x = 1;"), "{text}");
        assert!(text.contains("return $this;"), "{text}");
        assert!(!text.contains("var"), "{text}");
    }

    #[test]
    fn test_param_redeclaration_not_hoisted() {
        let mut arena = NodeArena::new();
        let mut b = AstBuilder::new(&mut arena);
        let two = b.number(2.0);
        let decl = b.var("a", two);
        let body = b.block(vec![decl]);

        let prepared =
            BodyPreparer::new(&mut arena, &["a".to_string()], None, "$args").prepare(body);
        assert!(prepared.vars.is_empty());
        assert!(DebugPrinter::new(&arena).print(body).contains("a = 2;"));
    }

    #[test]
    fn test_function_declarations_lifted() {
        let mut arena = NodeArena::new();
        let mut b = AstBuilder::new(&mut arena);
        let inner = b.function_decl("helper", &[], vec![]);
        let args = b.ident("arguments");
        let stmt = b.expr_stmt(args);
        let body = b.block(vec![stmt, inner]);

        let prepared = BodyPreparer::new(&mut arena, &[], None, "$args").prepare(body);
        assert_eq!(prepared.functions, vec![inner]);
        assert!(prepared.uses_arguments);
        assert_eq!(arena.statements_of(body), vec![stmt]);
    }
}
