//! Debug printer: renders a tree as JavaScript-like text.
//!
//! Not a production emitter. It exists so transform output can be inspected
//! in tests and logs, and so a source map can be produced from the generated
//! line/column of each node.

use crate::arena::NodeArena;
use crate::node::{Literal, NodeIndex, NodeKind};
use nodent_common::SourcePosition;

const INDENT: &str = "    ";

/// Printed text plus the generated position of every node that was printed.
#[derive(Clone, Debug, Default)]
pub struct PrintedTree {
    pub text: String,
    pub positions: Vec<(NodeIndex, SourcePosition)>,
}

impl PrintedTree {
    pub fn position_of(&self, idx: NodeIndex) -> Option<SourcePosition> {
        self.positions
            .iter()
            .find(|(node, _)| *node == idx)
            .map(|(_, pos)| *pos)
    }
}

pub struct DebugPrinter<'a> {
    arena: &'a NodeArena,
    out: String,
    indent: usize,
    line: u32,
    column: u32,
    record_positions: bool,
    positions: Vec<(NodeIndex, SourcePosition)>,
}

// Binding powers, loosest first.
const PREC_SEQUENCE: u8 = 1;
const PREC_ASSIGN: u8 = 2;
const PREC_CONDITIONAL: u8 = 3;
const PREC_UNARY: u8 = 14;
const PREC_POSTFIX: u8 = 15;
const PREC_CALL: u8 = 17;
const PREC_PRIMARY: u8 = 18;

impl<'a> DebugPrinter<'a> {
    pub fn new(arena: &'a NodeArena) -> Self {
        DebugPrinter {
            arena,
            out: String::new(),
            indent: 0,
            line: 0,
            column: 0,
            record_positions: false,
            positions: Vec::new(),
        }
    }

    pub fn with_positions(mut self) -> Self {
        self.record_positions = true;
        self
    }

    pub fn print(mut self, root: NodeIndex) -> String {
        self.emit_node(root);
        self.out
    }

    pub fn print_tree(mut self, root: NodeIndex) -> PrintedTree {
        self.emit_node(root);
        PrintedTree {
            text: self.out,
            positions: self.positions,
        }
    }

    fn emit_node(&mut self, idx: NodeIndex) {
        match self.arena.kind(idx) {
            Some(kind) if kind.is_statement() => self.emit_statement(idx),
            Some(_) => self.emit_expression(idx, PREC_SEQUENCE),
            None => {}
        }
    }

    // =========================================================================
    // Output
    // =========================================================================

    fn write(&mut self, text: &str) {
        for ch in text.chars() {
            if ch == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += ch.len_utf16() as u32;
            }
        }
        self.out.push_str(text);
    }

    fn newline(&mut self) {
        self.write("\n");
        for _ in 0..self.indent {
            self.write(INDENT);
        }
    }

    fn mark(&mut self, idx: NodeIndex) {
        if self.record_positions {
            self.positions
                .push((idx, SourcePosition::new(self.line, self.column)));
        }
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn emit_statement(&mut self, idx: NodeIndex) {
        let Some(kind) = self.arena.kind(idx) else {
            return;
        };
        self.mark(idx);
        match kind {
            NodeKind::Program { body } => {
                for (i, stmt) in body.nodes.iter().enumerate() {
                    if i > 0 {
                        self.newline();
                    }
                    self.emit_statement(*stmt);
                }
            }
            NodeKind::Block { statements } => self.emit_block(&statements.nodes),
            NodeKind::VariableStatement { .. } => {
                self.emit_var_list(idx);
                self.write(";");
            }
            NodeKind::ExpressionStatement { expression } => {
                let needs_parens = matches!(
                    self.arena.kind(*expression),
                    Some(NodeKind::Function(_) | NodeKind::ObjectLiteral { .. })
                );
                if needs_parens {
                    self.write("(");
                }
                self.emit_expression(*expression, PREC_SEQUENCE);
                if needs_parens {
                    self.write(")");
                }
                self.write(";");
            }
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.write("if (");
                self.emit_expression(*condition, PREC_SEQUENCE);
                self.write(") ");
                self.emit_sub_statement(*then_branch);
                if else_branch.is_some() {
                    self.write(" else ");
                    self.emit_sub_statement(*else_branch);
                }
            }
            NodeKind::For {
                initializer,
                condition,
                incrementor,
                body,
                label,
            } => {
                self.emit_label(label.as_deref());
                self.write("for (");
                if matches!(
                    self.arena.kind(*initializer),
                    Some(NodeKind::VariableStatement { .. })
                ) {
                    self.emit_var_list(*initializer);
                } else if initializer.is_some() {
                    self.emit_expression(*initializer, PREC_SEQUENCE);
                }
                self.write("; ");
                if condition.is_some() {
                    self.emit_expression(*condition, PREC_SEQUENCE);
                }
                self.write("; ");
                if incrementor.is_some() {
                    self.emit_expression(*incrementor, PREC_SEQUENCE);
                }
                self.write(") ");
                self.emit_sub_statement(*body);
            }
            NodeKind::ForIn {
                binding,
                declares_binding,
                object,
                body,
                label,
            } => {
                self.emit_label(label.as_deref());
                self.write("for (");
                if *declares_binding {
                    self.write("var ");
                }
                self.write(binding);
                self.write(" in ");
                self.emit_expression(*object, PREC_SEQUENCE);
                self.write(") ");
                self.emit_sub_statement(*body);
            }
            NodeKind::While {
                condition,
                body,
                label,
            } => {
                self.emit_label(label.as_deref());
                self.write("while (");
                self.emit_expression(*condition, PREC_SEQUENCE);
                self.write(") ");
                self.emit_sub_statement(*body);
            }
            NodeKind::DoWhile {
                body,
                condition,
                label,
            } => {
                self.emit_label(label.as_deref());
                self.write("do ");
                self.emit_sub_statement(*body);
                self.write(" while (");
                self.emit_expression(*condition, PREC_SEQUENCE);
                self.write(");");
            }
            NodeKind::Try {
                block,
                catch_clause,
                finally_block,
            } => {
                self.write("try ");
                self.emit_sub_statement(*block);
                if let Some(NodeKind::CatchClause { param, block }) =
                    self.arena.kind(*catch_clause)
                {
                    self.mark(*catch_clause);
                    self.write(" catch (");
                    self.write(param);
                    self.write(") ");
                    self.emit_sub_statement(*block);
                }
                if finally_block.is_some() {
                    self.write(" finally ");
                    self.emit_sub_statement(*finally_block);
                }
            }
            NodeKind::Return { expression } => {
                self.write("return");
                if expression.is_some() {
                    self.write(" ");
                    self.emit_expression(*expression, PREC_SEQUENCE);
                }
                self.write(";");
            }
            NodeKind::Throw { expression } => {
                self.write("throw ");
                self.emit_expression(*expression, PREC_SEQUENCE);
                self.write(";");
            }
            NodeKind::Break { label } => {
                self.write("break");
                if let Some(label) = label {
                    self.write(" ");
                    self.write(label);
                }
                self.write(";");
            }
            NodeKind::Continue { label } => {
                self.write("continue");
                if let Some(label) = label {
                    self.write(" ");
                    self.write(label);
                }
                self.write(";");
            }
            NodeKind::Empty => self.write(";"),
            NodeKind::Function(_) => self.emit_function(idx),
            _ => {
                self.emit_expression(idx, PREC_SEQUENCE);
                self.write(";");
            }
        }
    }

    fn emit_label(&mut self, label: Option<&str>) {
        if let Some(label) = label {
            self.write(label);
            self.write(": ");
        }
    }

    fn emit_sub_statement(&mut self, idx: NodeIndex) {
        if matches!(self.arena.kind(idx), Some(NodeKind::Block { .. })) {
            self.emit_statement(idx);
        } else {
            self.emit_block(&[idx]);
        }
    }

    fn emit_block(&mut self, statements: &[NodeIndex]) {
        if statements.is_empty() {
            self.write("{}");
            return;
        }
        self.write("{");
        self.indent += 1;
        for stmt in statements {
            self.newline();
            self.emit_statement(*stmt);
        }
        self.indent -= 1;
        self.newline();
        self.write("}");
    }

    fn emit_var_list(&mut self, idx: NodeIndex) {
        let Some(NodeKind::VariableStatement { declarations }) = self.arena.kind(idx) else {
            return;
        };
        self.write("var ");
        for (i, decl) in declarations.nodes.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            if let Some(NodeKind::VariableDeclaration { name, initializer }) = self.arena.kind(*decl)
            {
                self.mark(*decl);
                self.write(name);
                if initializer.is_some() {
                    self.write(" = ");
                    self.emit_expression(*initializer, PREC_ASSIGN);
                }
            }
        }
    }

    fn emit_function(&mut self, idx: NodeIndex) {
        let Some(func) = self.arena.get_function(idx) else {
            return;
        };
        if func.is_async {
            self.write("async ");
        }
        self.write("function");
        if func.is_generator {
            self.write("*");
        }
        if let Some(name) = &func.name {
            self.write(" ");
            self.write(name);
        }
        self.write("(");
        self.write(&func.params.join(", "));
        self.write(") ");
        let statements = self.arena.statements_of(func.body);
        self.mark(func.body);
        self.emit_block(&statements);
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn precedence(&self, idx: NodeIndex) -> u8 {
        match self.arena.kind(idx) {
            Some(NodeKind::Sequence { .. }) => PREC_SEQUENCE,
            Some(NodeKind::Assignment { .. } | NodeKind::Yield { .. }) => PREC_ASSIGN,
            Some(NodeKind::Conditional { .. }) => PREC_CONDITIONAL,
            Some(NodeKind::Logical { operator, .. }) => operator.precedence(),
            Some(NodeKind::Binary { operator, .. }) => operator.precedence(),
            Some(NodeKind::Unary { .. } | NodeKind::Await { .. }) => PREC_UNARY,
            Some(NodeKind::Update { prefix, .. }) => {
                if *prefix {
                    PREC_UNARY
                } else {
                    PREC_POSTFIX
                }
            }
            Some(
                NodeKind::Call { .. }
                | NodeKind::New { .. }
                | NodeKind::PropertyAccess { .. }
                | NodeKind::ElementAccess { .. },
            ) => PREC_CALL,
            Some(NodeKind::Function(_)) => PREC_ASSIGN,
            _ => PREC_PRIMARY,
        }
    }

    fn emit_expression(&mut self, idx: NodeIndex, min_prec: u8) {
        let Some(kind) = self.arena.kind(idx) else {
            return;
        };
        let prec = self.precedence(idx);
        let parens = prec < min_prec;
        if parens {
            self.write("(");
        }
        self.mark(idx);
        match kind {
            NodeKind::Identifier { name } => self.write(name),
            NodeKind::This => self.write("this"),
            NodeKind::Literal(lit) => {
                let text = literal_text(lit);
                self.write(&text);
            }
            NodeKind::Call { callee, arguments } => {
                let callee_is_function =
                    matches!(self.arena.kind(*callee), Some(NodeKind::Function(_)));
                if callee_is_function {
                    self.write("(");
                    self.emit_function(*callee);
                    self.write(")");
                } else {
                    self.emit_expression(*callee, PREC_CALL);
                }
                self.emit_arguments(&arguments.nodes);
            }
            NodeKind::New { callee, arguments } => {
                self.write("new ");
                self.emit_expression(*callee, PREC_PRIMARY);
                self.emit_arguments(&arguments.nodes);
            }
            NodeKind::PropertyAccess { object, name } => {
                self.emit_expression(*object, PREC_CALL);
                self.write(".");
                self.write(name);
            }
            NodeKind::ElementAccess { object, index } => {
                self.emit_expression(*object, PREC_CALL);
                self.write("[");
                self.emit_expression(*index, PREC_SEQUENCE);
                self.write("]");
            }
            NodeKind::Binary {
                operator,
                left,
                right,
            } => {
                self.emit_expression(*left, prec);
                self.write(" ");
                self.write(operator.as_str());
                self.write(" ");
                self.emit_expression(*right, prec + 1);
            }
            NodeKind::Logical {
                operator,
                left,
                right,
            } => {
                self.emit_expression(*left, prec);
                self.write(" ");
                self.write(operator.as_str());
                self.write(" ");
                self.emit_expression(*right, prec + 1);
            }
            NodeKind::Conditional {
                condition,
                when_true,
                when_false,
            } => {
                self.emit_expression(*condition, PREC_CONDITIONAL + 1);
                self.write(" ? ");
                self.emit_expression(*when_true, PREC_ASSIGN);
                self.write(" : ");
                self.emit_expression(*when_false, PREC_ASSIGN);
            }
            NodeKind::Assignment {
                operator,
                target,
                value,
            } => {
                self.emit_expression(*target, PREC_CALL);
                self.write(" ");
                self.write(&operator.as_str());
                self.write(" ");
                self.emit_expression(*value, PREC_ASSIGN);
            }
            NodeKind::Unary { operator, operand } => {
                self.write(operator.as_str());
                self.emit_expression(*operand, PREC_UNARY);
            }
            NodeKind::Update {
                operator,
                prefix,
                operand,
            } => {
                if *prefix {
                    self.write(operator.as_str());
                    self.emit_expression(*operand, PREC_UNARY);
                } else {
                    self.emit_expression(*operand, PREC_POSTFIX);
                    self.write(operator.as_str());
                }
            }
            NodeKind::Sequence { expressions } => {
                for (i, expr) in expressions.nodes.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    self.emit_expression(*expr, PREC_ASSIGN);
                }
            }
            NodeKind::ArrayLiteral { elements } => {
                self.write("[");
                for (i, expr) in elements.nodes.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    self.emit_expression(*expr, PREC_ASSIGN);
                }
                self.write("]");
            }
            NodeKind::ObjectLiteral { properties } => {
                if properties.is_empty() {
                    self.write("{}");
                } else {
                    self.write("{ ");
                    for (i, prop) in properties.nodes.iter().enumerate() {
                        if i > 0 {
                            self.write(", ");
                        }
                        if let Some(NodeKind::Property { key, value }) = self.arena.kind(*prop) {
                            self.mark(*prop);
                            self.write(key);
                            self.write(": ");
                            self.emit_expression(*value, PREC_ASSIGN);
                        }
                    }
                    self.write(" }");
                }
            }
            NodeKind::Await { expression } => {
                self.write("await ");
                self.emit_expression(*expression, PREC_UNARY);
            }
            NodeKind::Yield {
                expression,
                delegate,
            } => {
                self.write(if *delegate { "yield* " } else { "yield" });
                if expression.is_some() {
                    if !*delegate {
                        self.write(" ");
                    }
                    self.emit_expression(*expression, PREC_ASSIGN);
                }
            }
            NodeKind::Function(_) => self.emit_function(idx),
            _ => self.emit_statement(idx),
        }
        if parens {
            self.write(")");
        }
    }

    fn emit_arguments(&mut self, arguments: &[NodeIndex]) {
        self.write("(");
        for (i, arg) in arguments.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.emit_expression(*arg, PREC_ASSIGN);
        }
        self.write(")");
    }
}

fn literal_text(lit: &Literal) -> String {
    match lit {
        Literal::Number(n) => format_number(*n),
        Literal::String(s) => quote_string(s),
        Literal::Boolean(b) => b.to_string(),
        Literal::Null => "null".to_string(),
        Literal::Undefined => "undefined".to_string(),
    }
}

/// Number text the way JavaScript's `String(n)` renders common values.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        (if n > 0.0 { "Infinity" } else { "-Infinity" }).to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else {
        format!("{n}")
    }
}

fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
