//! Node construction helpers.
//!
//! `AstBuilder` stamps every node it creates with the same span and flags, so
//! synthesized code can carry the position of the source node it replaces.

use crate::arena::NodeArena;
use crate::node::{
    AssignOperator, BinaryOperator, FunctionData, Literal, LogicalOperator, NodeFlags, NodeIndex,
    NodeKind, NodeList, UnaryOperator, UpdateOperator,
};
use nodent_common::Span;

pub struct AstBuilder<'a> {
    arena: &'a mut NodeArena,
    span: Span,
    flags: NodeFlags,
}

impl<'a> AstBuilder<'a> {
    pub fn new(arena: &'a mut NodeArena) -> Self {
        AstBuilder {
            arena,
            span: Span::default(),
            flags: NodeFlags::empty(),
        }
    }

    /// Builder for transform output: nodes are marked `SYNTHESIZED` and take
    /// the span of the node they stand in for.
    pub fn synthesized(arena: &'a mut NodeArena, span: Span) -> Self {
        AstBuilder {
            arena,
            span,
            flags: NodeFlags::SYNTHESIZED,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn with_flags(mut self, flags: NodeFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn set_span(&mut self, span: Span) {
        self.span = span;
    }

    pub fn arena(&mut self) -> &mut NodeArena {
        self.arena
    }

    pub fn node(&mut self, kind: NodeKind) -> NodeIndex {
        self.arena.add(kind, self.span, self.flags)
    }

    fn node_with(&mut self, kind: NodeKind, extra: NodeFlags) -> NodeIndex {
        self.arena.add(kind, self.span, self.flags | extra)
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    pub fn ident(&mut self, name: impl Into<String>) -> NodeIndex {
        self.node(NodeKind::Identifier { name: name.into() })
    }

    /// Identifier for a compiler temporary.
    pub fn temp(&mut self, name: impl Into<String>) -> NodeIndex {
        self.node_with(NodeKind::Identifier { name: name.into() }, NodeFlags::TEMPORARY)
    }

    pub fn number(&mut self, value: f64) -> NodeIndex {
        self.node(NodeKind::Literal(Literal::Number(value)))
    }

    pub fn string(&mut self, value: impl Into<String>) -> NodeIndex {
        self.node(NodeKind::Literal(Literal::String(value.into())))
    }

    pub fn boolean(&mut self, value: bool) -> NodeIndex {
        self.node(NodeKind::Literal(Literal::Boolean(value)))
    }

    pub fn null(&mut self) -> NodeIndex {
        self.node(NodeKind::Literal(Literal::Null))
    }

    pub fn undefined(&mut self) -> NodeIndex {
        self.node(NodeKind::Literal(Literal::Undefined))
    }

    pub fn this(&mut self) -> NodeIndex {
        self.node(NodeKind::This)
    }

    pub fn call(&mut self, callee: NodeIndex, arguments: Vec<NodeIndex>) -> NodeIndex {
        self.node(NodeKind::Call {
            callee,
            arguments: NodeList::new(arguments),
        })
    }

    /// Call of a plain named function: `name(args)`.
    pub fn call_named(&mut self, name: &str, arguments: Vec<NodeIndex>) -> NodeIndex {
        let callee = self.ident(name);
        self.call(callee, arguments)
    }

    /// Call into a runtime driver entry point.
    pub fn driver_call(&mut self, name: &str, arguments: Vec<NodeIndex>) -> NodeIndex {
        let callee = self.ident(name);
        self.node_with(
            NodeKind::Call {
                callee,
                arguments: NodeList::new(arguments),
            },
            NodeFlags::DRIVER_CALL,
        )
    }

    /// `object.name(args)`
    pub fn method_call(
        &mut self,
        object: NodeIndex,
        name: &str,
        arguments: Vec<NodeIndex>,
    ) -> NodeIndex {
        let callee = self.prop(object, name);
        self.call(callee, arguments)
    }

    pub fn new_expr(&mut self, callee: NodeIndex, arguments: Vec<NodeIndex>) -> NodeIndex {
        self.node(NodeKind::New {
            callee,
            arguments: NodeList::new(arguments),
        })
    }

    pub fn prop(&mut self, object: NodeIndex, name: impl Into<String>) -> NodeIndex {
        self.node(NodeKind::PropertyAccess {
            object,
            name: name.into(),
        })
    }

    pub fn elem(&mut self, object: NodeIndex, index: NodeIndex) -> NodeIndex {
        self.node(NodeKind::ElementAccess { object, index })
    }

    pub fn binary(&mut self, operator: BinaryOperator, left: NodeIndex, right: NodeIndex) -> NodeIndex {
        self.node(NodeKind::Binary {
            operator,
            left,
            right,
        })
    }

    pub fn logical(
        &mut self,
        operator: LogicalOperator,
        left: NodeIndex,
        right: NodeIndex,
    ) -> NodeIndex {
        self.node(NodeKind::Logical {
            operator,
            left,
            right,
        })
    }

    pub fn conditional(
        &mut self,
        condition: NodeIndex,
        when_true: NodeIndex,
        when_false: NodeIndex,
    ) -> NodeIndex {
        self.node(NodeKind::Conditional {
            condition,
            when_true,
            when_false,
        })
    }

    pub fn assign(&mut self, target: NodeIndex, value: NodeIndex) -> NodeIndex {
        self.node(NodeKind::Assignment {
            operator: AssignOperator::Assign,
            target,
            value,
        })
    }

    pub fn assign_op(
        &mut self,
        operator: AssignOperator,
        target: NodeIndex,
        value: NodeIndex,
    ) -> NodeIndex {
        self.node(NodeKind::Assignment {
            operator,
            target,
            value,
        })
    }

    /// `name = value`
    pub fn assign_named(&mut self, name: &str, value: NodeIndex) -> NodeIndex {
        let target = self.ident(name);
        self.assign(target, value)
    }

    pub fn unary(&mut self, operator: UnaryOperator, operand: NodeIndex) -> NodeIndex {
        self.node(NodeKind::Unary { operator, operand })
    }

    pub fn not(&mut self, operand: NodeIndex) -> NodeIndex {
        self.unary(UnaryOperator::Not, operand)
    }

    pub fn update(&mut self, operator: UpdateOperator, prefix: bool, operand: NodeIndex) -> NodeIndex {
        self.node(NodeKind::Update {
            operator,
            prefix,
            operand,
        })
    }

    pub fn sequence(&mut self, expressions: Vec<NodeIndex>) -> NodeIndex {
        self.node(NodeKind::Sequence {
            expressions: NodeList::new(expressions),
        })
    }

    pub fn array(&mut self, elements: Vec<NodeIndex>) -> NodeIndex {
        self.node(NodeKind::ArrayLiteral {
            elements: NodeList::new(elements),
        })
    }

    pub fn object(&mut self, properties: Vec<(String, NodeIndex)>) -> NodeIndex {
        let properties = properties
            .into_iter()
            .map(|(key, value)| self.node(NodeKind::Property { key, value }))
            .collect();
        self.node(NodeKind::ObjectLiteral {
            properties: NodeList::new(properties),
        })
    }

    pub fn await_expr(&mut self, expression: NodeIndex) -> NodeIndex {
        self.node(NodeKind::Await { expression })
    }

    pub fn yield_expr(&mut self, expression: NodeIndex) -> NodeIndex {
        self.node(NodeKind::Yield {
            expression,
            delegate: false,
        })
    }

    pub fn yield_delegate(&mut self, expression: NodeIndex) -> NodeIndex {
        self.node(NodeKind::Yield {
            expression,
            delegate: true,
        })
    }

    // =========================================================================
    // Functions
    // =========================================================================

    pub fn function(&mut self, data: FunctionData) -> NodeIndex {
        self.node(NodeKind::Function(data))
    }

    /// Plain function expression with the given body statements.
    pub fn function_expr(
        &mut self,
        name: Option<&str>,
        params: &[&str],
        statements: Vec<NodeIndex>,
    ) -> NodeIndex {
        let body = self.block(statements);
        self.function(FunctionData {
            name: name.map(str::to_string),
            params: params.iter().map(|p| p.to_string()).collect(),
            body,
            is_async: false,
            is_generator: false,
            is_declaration: false,
        })
    }

    /// Continuation segment: a function expression flagged `SEGMENT`.
    pub fn segment_function(
        &mut self,
        name: Option<&str>,
        params: Vec<String>,
        statements: Vec<NodeIndex>,
    ) -> NodeIndex {
        let body = self.block(statements);
        self.node_with(
            NodeKind::Function(FunctionData {
                name: name.map(str::to_string),
                params,
                body,
                is_async: false,
                is_generator: false,
                is_declaration: false,
            }),
            NodeFlags::SEGMENT,
        )
    }

    /// Named continuation segment declared in statement position.
    pub fn segment_declaration(
        &mut self,
        name: &str,
        params: Vec<String>,
        statements: Vec<NodeIndex>,
    ) -> NodeIndex {
        let body = self.block(statements);
        self.node_with(
            NodeKind::Function(FunctionData {
                name: Some(name.to_string()),
                params,
                body,
                is_async: false,
                is_generator: false,
                is_declaration: true,
            }),
            NodeFlags::SEGMENT,
        )
    }

    pub fn function_decl(&mut self, name: &str, params: &[&str], statements: Vec<NodeIndex>) -> NodeIndex {
        let body = self.block(statements);
        self.function(FunctionData {
            name: Some(name.to_string()),
            params: params.iter().map(|p| p.to_string()).collect(),
            body,
            is_async: false,
            is_generator: false,
            is_declaration: true,
        })
    }

    pub fn async_function_decl(
        &mut self,
        name: &str,
        params: &[&str],
        statements: Vec<NodeIndex>,
    ) -> NodeIndex {
        let body = self.block(statements);
        self.function(FunctionData {
            name: Some(name.to_string()),
            params: params.iter().map(|p| p.to_string()).collect(),
            body,
            is_async: true,
            is_generator: false,
            is_declaration: true,
        })
    }

    pub fn async_function_expr(
        &mut self,
        name: Option<&str>,
        params: &[&str],
        statements: Vec<NodeIndex>,
    ) -> NodeIndex {
        let body = self.block(statements);
        self.function(FunctionData {
            name: name.map(str::to_string),
            params: params.iter().map(|p| p.to_string()).collect(),
            body,
            is_async: true,
            is_generator: false,
            is_declaration: false,
        })
    }

    pub fn generator_function_expr(
        &mut self,
        name: Option<&str>,
        params: &[&str],
        statements: Vec<NodeIndex>,
    ) -> NodeIndex {
        let body = self.block(statements);
        self.function(FunctionData {
            name: name.map(str::to_string),
            params: params.iter().map(|p| p.to_string()).collect(),
            body,
            is_async: false,
            is_generator: true,
            is_declaration: false,
        })
    }

    pub fn generator_function_decl(
        &mut self,
        name: &str,
        params: &[&str],
        statements: Vec<NodeIndex>,
    ) -> NodeIndex {
        let body = self.block(statements);
        self.function(FunctionData {
            name: Some(name.to_string()),
            params: params.iter().map(|p| p.to_string()).collect(),
            body,
            is_async: false,
            is_generator: true,
            is_declaration: true,
        })
    }

    // =========================================================================
    // Statements
    // =========================================================================

    pub fn program(&mut self, body: Vec<NodeIndex>) -> NodeIndex {
        self.node(NodeKind::Program {
            body: NodeList::new(body),
        })
    }

    pub fn block(&mut self, statements: Vec<NodeIndex>) -> NodeIndex {
        self.node(NodeKind::Block {
            statements: NodeList::new(statements),
        })
    }

    /// `var name = init;` (`init` may be `NodeIndex::NONE`).
    pub fn var(&mut self, name: &str, initializer: NodeIndex) -> NodeIndex {
        let decl = self.node(NodeKind::VariableDeclaration {
            name: name.to_string(),
            initializer,
        });
        self.node(NodeKind::VariableStatement {
            declarations: NodeList::new(vec![decl]),
        })
    }

    /// `var a, b, c;` without initializers.
    pub fn var_names(&mut self, names: &[String]) -> NodeIndex {
        let declarations = names
            .iter()
            .map(|name| {
                self.node(NodeKind::VariableDeclaration {
                    name: name.clone(),
                    initializer: NodeIndex::NONE,
                })
            })
            .collect();
        self.node(NodeKind::VariableStatement {
            declarations: NodeList::new(declarations),
        })
    }

    pub fn expr_stmt(&mut self, expression: NodeIndex) -> NodeIndex {
        self.node(NodeKind::ExpressionStatement { expression })
    }

    pub fn if_stmt(
        &mut self,
        condition: NodeIndex,
        then_branch: NodeIndex,
        else_branch: NodeIndex,
    ) -> NodeIndex {
        self.node(NodeKind::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    pub fn while_stmt(&mut self, condition: NodeIndex, body: NodeIndex) -> NodeIndex {
        self.node(NodeKind::While {
            condition,
            body,
            label: None,
        })
    }

    pub fn labeled_while(&mut self, label: &str, condition: NodeIndex, body: NodeIndex) -> NodeIndex {
        self.node(NodeKind::While {
            condition,
            body,
            label: Some(label.to_string()),
        })
    }

    pub fn do_while(&mut self, body: NodeIndex, condition: NodeIndex) -> NodeIndex {
        self.node(NodeKind::DoWhile {
            body,
            condition,
            label: None,
        })
    }

    pub fn for_stmt(
        &mut self,
        initializer: NodeIndex,
        condition: NodeIndex,
        incrementor: NodeIndex,
        body: NodeIndex,
    ) -> NodeIndex {
        self.node(NodeKind::For {
            initializer,
            condition,
            incrementor,
            body,
            label: None,
        })
    }

    pub fn labeled_for(
        &mut self,
        label: &str,
        initializer: NodeIndex,
        condition: NodeIndex,
        incrementor: NodeIndex,
        body: NodeIndex,
    ) -> NodeIndex {
        self.node(NodeKind::For {
            initializer,
            condition,
            incrementor,
            body,
            label: Some(label.to_string()),
        })
    }

    pub fn for_in(&mut self, binding: &str, declares_binding: bool, object: NodeIndex, body: NodeIndex) -> NodeIndex {
        self.node(NodeKind::ForIn {
            binding: binding.to_string(),
            declares_binding,
            object,
            body,
            label: None,
        })
    }

    /// `try { block } catch (param) { handler } finally { finalizer }`; pass
    /// `None`/`NodeIndex::NONE` to omit a clause.
    pub fn try_stmt(
        &mut self,
        block: NodeIndex,
        catch: Option<(&str, NodeIndex)>,
        finally_block: NodeIndex,
    ) -> NodeIndex {
        let catch_clause = match catch {
            Some((param, handler)) => self.node(NodeKind::CatchClause {
                param: param.to_string(),
                block: handler,
            }),
            None => NodeIndex::NONE,
        };
        self.node(NodeKind::Try {
            block,
            catch_clause,
            finally_block,
        })
    }

    pub fn ret(&mut self, expression: NodeIndex) -> NodeIndex {
        self.node(NodeKind::Return { expression })
    }

    pub fn throw(&mut self, expression: NodeIndex) -> NodeIndex {
        self.node(NodeKind::Throw { expression })
    }

    pub fn brk(&mut self, label: Option<&str>) -> NodeIndex {
        self.node(NodeKind::Break {
            label: label.map(str::to_string),
        })
    }

    pub fn cont(&mut self, label: Option<&str>) -> NodeIndex {
        self.node(NodeKind::Continue {
            label: label.map(str::to_string),
        })
    }

    pub fn empty(&mut self) -> NodeIndex {
        self.node(NodeKind::Empty)
    }
}
