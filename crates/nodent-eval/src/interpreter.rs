//! Statement execution and expression evaluation.
//!
//! The evaluator walks the arena tree directly. Statements produce a
//! [`Completion`]; a thrown value travels on the `Err` side of every result,
//! the same convention runtime callables use, so exceptions cross between
//! evaluated code and the runtime without translation.

use crate::operators;
use crate::scope::Environment;
use nodent_ast::walk::visit_body;
use nodent_ast::{
    AssignOperator, DebugPrinter, Literal, LogicalOperator, NodeArena, NodeIndex, NodeKind,
    UnaryOperator, UpdateOperator,
};
use nodent_common::limits::MAX_EVAL_CALL_DEPTH;
use nodent_runtime::value::arg;
use nodent_runtime::{Callable, Value};
use std::cell::Cell;
use std::rc::Rc;

/// Thrown values ride on `Err`.
pub(crate) type Flow<T> = Result<T, Value>;

/// How a statement finished.
#[derive(Debug)]
pub enum Completion {
    Normal(Value),
    Return(Value),
    Break(Option<String>),
    Continue(Option<String>),
}

/// What the loop body asked the enclosing loop to do.
enum LoopStep {
    Next,
    Exit,
    Propagate(Completion),
}

/// An assignable location.
enum Reference {
    Binding(String),
    Property(Value, String),
    Element(Value, Value),
}

/// Shared interpreter state. Function values hold an `Rc` to it so they can
/// run their bodies when the runtime calls them back.
pub(crate) struct Context {
    pub(crate) arena: NodeArena,
    pub(crate) globals: Environment,
    depth: Cell<u32>,
}

/// An evaluated function declaration or expression.
pub(crate) struct JsFunction {
    ctx: Rc<Context>,
    node: NodeIndex,
    env: Environment,
    name: String,
}

impl Callable for JsFunction {
    fn call(&self, this: Value, args: &[Value]) -> Result<Value, Value> {
        self.ctx.invoke(self.node, &self.env, this, args)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Context {
    pub(crate) fn new(arena: NodeArena) -> Context {
        let globals = Environment::global();
        globals.declare("this", Value::Undefined);
        Context {
            arena,
            globals,
            depth: Cell::new(0),
        }
    }

    // =========================================================================
    // Functions
    // =========================================================================

    pub(crate) fn invoke(
        self: &Rc<Self>,
        func: NodeIndex,
        closure: &Environment,
        this: Value,
        args: &[Value],
    ) -> Flow<Value> {
        let Some(data) = self.arena.get_function(func) else {
            return Err(Value::type_error("callee is not a function"));
        };
        let name = data.name.as_deref().unwrap_or("anonymous");
        if data.is_async {
            return Err(Value::type_error(format!(
                "async function {name} has not been transformed"
            )));
        }
        if data.is_generator {
            return Err(Value::type_error(format!(
                "generator function {name} has not been lowered"
            )));
        }

        let depth = self.depth.get();
        if depth >= MAX_EVAL_CALL_DEPTH {
            return Err(Value::range_error("Maximum call stack size exceeded"));
        }
        self.depth.set(depth + 1);

        let env = closure.extend();
        env.declare("this", this);
        env.declare("arguments", Value::array(args.to_vec()));
        for (i, param) in data.params.iter().enumerate() {
            env.declare(param, arg(args, i));
        }
        self.hoist(data.body, &env);
        let statements = self.arena.statements_of(data.body);
        let result = self.exec_list(&statements, &env);

        self.depth.set(depth);
        match result? {
            Completion::Return(value) => Ok(value),
            _ => Ok(Value::Undefined),
        }
    }

    pub(crate) fn make_function(self: &Rc<Self>, idx: NodeIndex, env: &Environment) -> Value {
        let (name, named_expression) = match self.arena.get_function(idx) {
            Some(data) => (
                data.name.clone().unwrap_or_default(),
                !data.is_declaration && data.name.is_some(),
            ),
            None => (String::new(), false),
        };
        // A named function expression sees its own name.
        let scope = if named_expression {
            env.extend()
        } else {
            env.clone()
        };
        let function = Value::Function(Rc::new(JsFunction {
            ctx: Rc::clone(self),
            node: idx,
            env: scope.clone(),
            name: name.clone(),
        }));
        if named_expression {
            scope.declare(&name, function.clone());
        }
        function
    }

    /// Declare the `var`s and function declarations of a body in `env`.
    /// Declarations in nested functions belong to those functions.
    pub(crate) fn hoist(self: &Rc<Self>, body: NodeIndex, env: &Environment) {
        let mut functions = Vec::new();
        visit_body(&self.arena, body, &mut |idx, kind| match kind {
            NodeKind::VariableDeclaration { name, .. } => env.declare_if_absent(name),
            NodeKind::ForIn {
                binding,
                declares_binding: true,
                ..
            } => env.declare_if_absent(binding),
            NodeKind::Function(data) if data.is_declaration && idx != body => {
                functions.push(idx);
            }
            _ => {}
        });
        for idx in functions {
            if let Some(name) = self.arena.get_function(idx).and_then(|f| f.name.clone()) {
                let function = self.make_function(idx, env);
                env.declare(&name, function);
            }
        }
    }

    // =========================================================================
    // Statements
    // =========================================================================

    pub(crate) fn exec_list(
        self: &Rc<Self>,
        statements: &[NodeIndex],
        env: &Environment,
    ) -> Flow<Completion> {
        let mut last = Value::Undefined;
        for &stmt in statements {
            match self.exec(stmt, env)? {
                Completion::Normal(value) => {
                    if produces_value(self.arena.kind(stmt)) {
                        last = value;
                    }
                }
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal(last))
    }

    fn exec(self: &Rc<Self>, idx: NodeIndex, env: &Environment) -> Flow<Completion> {
        let Some(kind) = self.arena.kind(idx) else {
            return Ok(Completion::Normal(Value::Undefined));
        };
        match kind {
            NodeKind::Program { body } => self.exec_list(&body.nodes, env),
            NodeKind::Block { statements } => self.exec_list(&statements.nodes, env),
            NodeKind::VariableStatement { declarations } => {
                for &decl in &declarations.nodes {
                    self.exec(decl, env)?;
                }
                Ok(Completion::Normal(Value::Undefined))
            }
            NodeKind::VariableDeclaration { name, initializer } => {
                if initializer.is_some() {
                    let value = self.eval(*initializer, env)?;
                    env.assign(name, value);
                }
                Ok(Completion::Normal(Value::Undefined))
            }
            NodeKind::ExpressionStatement { expression } => {
                Ok(Completion::Normal(self.eval(*expression, env)?))
            }
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval(*condition, env)?.is_truthy() {
                    self.exec(*then_branch, env)
                } else if else_branch.is_some() {
                    self.exec(*else_branch, env)
                } else {
                    Ok(Completion::Normal(Value::Undefined))
                }
            }
            NodeKind::While {
                condition,
                body,
                label,
            } => {
                while self.eval(*condition, env)?.is_truthy() {
                    match self.loop_body(*body, label.as_deref(), env)? {
                        LoopStep::Next => {}
                        LoopStep::Exit => break,
                        LoopStep::Propagate(completion) => return Ok(completion),
                    }
                }
                Ok(Completion::Normal(Value::Undefined))
            }
            NodeKind::DoWhile {
                body,
                condition,
                label,
            } => {
                loop {
                    match self.loop_body(*body, label.as_deref(), env)? {
                        LoopStep::Next => {}
                        LoopStep::Exit => break,
                        LoopStep::Propagate(completion) => return Ok(completion),
                    }
                    if !self.eval(*condition, env)?.is_truthy() {
                        break;
                    }
                }
                Ok(Completion::Normal(Value::Undefined))
            }
            NodeKind::For {
                initializer,
                condition,
                incrementor,
                body,
                label,
            } => {
                if initializer.is_some() {
                    match self.arena.kind(*initializer) {
                        Some(NodeKind::VariableStatement { .. }) => {
                            self.exec(*initializer, env)?;
                        }
                        _ => {
                            self.eval(*initializer, env)?;
                        }
                    }
                }
                loop {
                    if condition.is_some() && !self.eval(*condition, env)?.is_truthy() {
                        break;
                    }
                    match self.loop_body(*body, label.as_deref(), env)? {
                        LoopStep::Next => {}
                        LoopStep::Exit => break,
                        LoopStep::Propagate(completion) => return Ok(completion),
                    }
                    if incrementor.is_some() {
                        self.eval(*incrementor, env)?;
                    }
                }
                Ok(Completion::Normal(Value::Undefined))
            }
            NodeKind::ForIn {
                binding,
                object,
                body,
                label,
                ..
            } => {
                let target = self.eval(*object, env)?;
                for key in target.own_keys() {
                    env.assign(binding, Value::string(&key));
                    match self.loop_body(*body, label.as_deref(), env)? {
                        LoopStep::Next => {}
                        LoopStep::Exit => break,
                        LoopStep::Propagate(completion) => return Ok(completion),
                    }
                }
                Ok(Completion::Normal(Value::Undefined))
            }
            NodeKind::Try {
                block,
                catch_clause,
                finally_block,
            } => self.exec_try(*block, *catch_clause, *finally_block, env),
            NodeKind::Return { expression } => {
                let value = if expression.is_some() {
                    self.eval(*expression, env)?
                } else {
                    Value::Undefined
                };
                Ok(Completion::Return(value))
            }
            NodeKind::Throw { expression } => Err(self.eval(*expression, env)?),
            NodeKind::Break { label } => Ok(Completion::Break(label.clone())),
            NodeKind::Continue { label } => Ok(Completion::Continue(label.clone())),
            NodeKind::Empty | NodeKind::CatchClause { .. } => {
                Ok(Completion::Normal(Value::Undefined))
            }
            NodeKind::Function(data) if data.is_declaration => {
                Ok(Completion::Normal(Value::Undefined))
            }
            _ => Ok(Completion::Normal(self.eval(idx, env)?)),
        }
    }

    fn loop_body(
        self: &Rc<Self>,
        body: NodeIndex,
        label: Option<&str>,
        env: &Environment,
    ) -> Flow<LoopStep> {
        let targets = |target: &Option<String>| match target {
            None => true,
            Some(name) => Some(name.as_str()) == label,
        };
        Ok(match self.exec(body, env)? {
            Completion::Normal(_) => LoopStep::Next,
            Completion::Break(target) if targets(&target) => LoopStep::Exit,
            Completion::Continue(target) if targets(&target) => LoopStep::Next,
            other => LoopStep::Propagate(other),
        })
    }

    fn exec_try(
        self: &Rc<Self>,
        block: NodeIndex,
        catch_clause: NodeIndex,
        finally_block: NodeIndex,
        env: &Environment,
    ) -> Flow<Completion> {
        let result = match self.exec(block, env) {
            Err(thrown) => match self.arena.kind(catch_clause) {
                Some(NodeKind::CatchClause { param, block }) => {
                    let scope = env.extend();
                    scope.declare(param, thrown);
                    self.exec(*block, &scope)
                }
                _ => Err(thrown),
            },
            completed => completed,
        };
        if finally_block.is_none() {
            return result;
        }
        // An abrupt finally replaces whatever the try or catch produced.
        match self.exec(finally_block, env)? {
            Completion::Normal(_) => result,
            abrupt => Ok(abrupt),
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    pub(crate) fn eval(self: &Rc<Self>, idx: NodeIndex, env: &Environment) -> Flow<Value> {
        let Some(kind) = self.arena.kind(idx) else {
            return Ok(Value::Undefined);
        };
        match kind {
            NodeKind::Literal(lit) => Ok(match lit {
                Literal::Number(n) => Value::Number(*n),
                Literal::String(s) => Value::string(s),
                Literal::Boolean(b) => Value::Bool(*b),
                Literal::Null => Value::Null,
                Literal::Undefined => Value::Undefined,
            }),
            NodeKind::Identifier { name } => self.lookup(name, env),
            NodeKind::This => Ok(env.lookup("this").unwrap_or_default()),
            NodeKind::Function(_) => Ok(self.make_function(idx, env)),
            NodeKind::Call { callee, arguments } => {
                let (this, function) = match self.arena.kind(*callee) {
                    Some(NodeKind::PropertyAccess { object, name }) => {
                        let receiver = self.eval(*object, env)?;
                        let function = receiver.get_property(name)?;
                        (receiver, function)
                    }
                    Some(NodeKind::ElementAccess { object, index }) => {
                        let receiver = self.eval(*object, env)?;
                        let key = self.eval(*index, env)?;
                        let function = receiver.get_element(&key)?;
                        (receiver, function)
                    }
                    _ => (Value::Undefined, self.eval(*callee, env)?),
                };
                let args = self.eval_list(&arguments.nodes, env)?;
                if !function.is_callable() {
                    return Err(Value::type_error(format!(
                        "{} is not a function",
                        self.describe(*callee)
                    )));
                }
                function.call(this, &args)
            }
            NodeKind::New { callee, arguments } => {
                let constructor = self.eval(*callee, env)?;
                let args = self.eval_list(&arguments.nodes, env)?;
                if !constructor.is_callable() {
                    return Err(Value::type_error(format!(
                        "{} is not a constructor",
                        self.describe(*callee)
                    )));
                }
                let instance = Value::empty_object();
                let result = constructor.call(instance.clone(), &args)?;
                Ok(match result {
                    Value::Undefined
                    | Value::Null
                    | Value::Bool(_)
                    | Value::Number(_)
                    | Value::String(_) => instance,
                    object => object,
                })
            }
            NodeKind::PropertyAccess { object, name } => self.eval(*object, env)?.get_property(name),
            NodeKind::ElementAccess { object, index } => {
                let target = self.eval(*object, env)?;
                let key = self.eval(*index, env)?;
                target.get_element(&key)
            }
            NodeKind::Binary {
                operator,
                left,
                right,
            } => {
                let l = self.eval(*left, env)?;
                let r = self.eval(*right, env)?;
                operators::binary(*operator, &l, &r)
            }
            NodeKind::Logical {
                operator,
                left,
                right,
            } => {
                let l = self.eval(*left, env)?;
                let short_circuit = match operator {
                    LogicalOperator::And => !l.is_truthy(),
                    LogicalOperator::Or => l.is_truthy(),
                    LogicalOperator::Coalesce => !l.is_nullish(),
                };
                if short_circuit {
                    Ok(l)
                } else {
                    self.eval(*right, env)
                }
            }
            NodeKind::Conditional {
                condition,
                when_true,
                when_false,
            } => {
                if self.eval(*condition, env)?.is_truthy() {
                    self.eval(*when_true, env)
                } else {
                    self.eval(*when_false, env)
                }
            }
            NodeKind::Assignment {
                operator,
                target,
                value,
            } => {
                let reference = self.reference(*target, env)?;
                let value = match operator {
                    AssignOperator::Assign => self.eval(*value, env)?,
                    AssignOperator::Compound(op) => {
                        let old = self.get_reference(&reference, env)?;
                        let rhs = self.eval(*value, env)?;
                        operators::binary(*op, &old, &rhs)?
                    }
                };
                self.put_reference(&reference, value.clone(), env)?;
                Ok(value)
            }
            NodeKind::Unary { operator, operand } => self.eval_unary(*operator, *operand, env),
            NodeKind::Update {
                operator,
                prefix,
                operand,
            } => {
                let reference = self.reference(*operand, env)?;
                let old = self.get_reference(&reference, env)?.to_number();
                let new = match operator {
                    UpdateOperator::Increment => old + 1.0,
                    UpdateOperator::Decrement => old - 1.0,
                };
                self.put_reference(&reference, Value::Number(new), env)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            NodeKind::Sequence { expressions } => {
                let mut last = Value::Undefined;
                for &expr in &expressions.nodes {
                    last = self.eval(expr, env)?;
                }
                Ok(last)
            }
            NodeKind::ArrayLiteral { elements } => {
                Ok(Value::array(self.eval_list(&elements.nodes, env)?))
            }
            NodeKind::ObjectLiteral { properties } => {
                let object = Value::empty_object();
                for &prop in &properties.nodes {
                    if let Some(NodeKind::Property { key, value }) = self.arena.kind(prop) {
                        let value = self.eval(*value, env)?;
                        object.set_property(key, value)?;
                    }
                }
                Ok(object)
            }
            NodeKind::Await { .. } => Err(Value::type_error(
                "'await' reached the evaluator; transform the unit first",
            )),
            NodeKind::Yield { .. } => Err(Value::type_error(
                "'yield' reached the evaluator; lower generators first",
            )),
            _ => Err(Value::type_error(format!(
                "statement in expression position: {}",
                self.describe(idx)
            ))),
        }
    }

    fn eval_list(self: &Rc<Self>, nodes: &[NodeIndex], env: &Environment) -> Flow<Vec<Value>> {
        nodes.iter().map(|&node| self.eval(node, env)).collect()
    }

    fn eval_unary(
        self: &Rc<Self>,
        operator: UnaryOperator,
        operand: NodeIndex,
        env: &Environment,
    ) -> Flow<Value> {
        match (operator, self.arena.kind(operand)) {
            // `typeof undeclared` does not throw.
            (UnaryOperator::TypeOf, Some(NodeKind::Identifier { name })) => {
                Ok(Value::string(match env.lookup(name) {
                    Some(value) => value.type_of(),
                    None => "undefined",
                }))
            }
            (UnaryOperator::Delete, Some(NodeKind::PropertyAccess { .. }))
            | (UnaryOperator::Delete, Some(NodeKind::ElementAccess { .. })) => {
                let (target, key) = match self.reference(operand, env)? {
                    Reference::Property(target, name) => (target, name),
                    Reference::Element(target, key) => (target, key.to_display_string()),
                    Reference::Binding(_) => return Ok(Value::Bool(false)),
                };
                if let Value::Object(map) = &target {
                    map.borrow_mut().shift_remove(&key);
                }
                Ok(Value::Bool(true))
            }
            _ => {
                let value = self.eval(operand, env)?;
                Ok(operators::unary(operator, &value))
            }
        }
    }

    fn lookup(&self, name: &str, env: &Environment) -> Flow<Value> {
        match env.lookup(name) {
            Some(value) => Ok(value),
            None if name == "undefined" => Ok(Value::Undefined),
            None => Err(Value::reference_error(format!("{name} is not defined"))),
        }
    }

    fn reference(self: &Rc<Self>, target: NodeIndex, env: &Environment) -> Flow<Reference> {
        match self.arena.kind(target) {
            Some(NodeKind::Identifier { name }) => Ok(Reference::Binding(name.clone())),
            Some(NodeKind::PropertyAccess { object, name }) => {
                Ok(Reference::Property(self.eval(*object, env)?, name.clone()))
            }
            Some(NodeKind::ElementAccess { object, index }) => {
                let object = self.eval(*object, env)?;
                let key = self.eval(*index, env)?;
                Ok(Reference::Element(object, key))
            }
            _ => Err(Value::reference_error(format!(
                "Invalid assignment target: {}",
                self.describe(target)
            ))),
        }
    }

    fn get_reference(&self, reference: &Reference, env: &Environment) -> Flow<Value> {
        match reference {
            Reference::Binding(name) => self.lookup(name, env),
            Reference::Property(object, name) => object.get_property(name),
            Reference::Element(object, key) => object.get_element(key),
        }
    }

    fn put_reference(&self, reference: &Reference, value: Value, env: &Environment) -> Flow<()> {
        match reference {
            Reference::Binding(name) => {
                env.assign(name, value);
                Ok(())
            }
            Reference::Property(object, name) => object.set_property(name, value),
            Reference::Element(object, key) => object.set_element(key, value),
        }
    }

    /// Source-like rendering of a node for error messages.
    fn describe(&self, idx: NodeIndex) -> String {
        DebugPrinter::new(&self.arena).print(idx)
    }
}

/// Statements whose completion value replaces the running result of a list.
fn produces_value(kind: Option<&NodeKind>) -> bool {
    !matches!(
        kind,
        Some(NodeKind::VariableStatement { .. })
            | Some(NodeKind::Empty)
            | Some(NodeKind::Function(_))
            | None
    )
}
