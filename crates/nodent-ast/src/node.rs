//! Node types for the arena-backed syntax tree.
//!
//! Every node lives in a `NodeArena` and refers to its children by
//! `NodeIndex`. A node owns its children: each reachable index has exactly
//! one parent slot pointing at it, so rewriting a subtree is a matter of
//! rebinding that slot.

use bitflags::bitflags;
use nodent_common::Span;
use smallvec::SmallVec;

/// Index of a node in the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    /// Sentinel for an absent child (no else-branch, no initializer, ...).
    pub const NONE: NodeIndex = NodeIndex(u32::MAX);

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == u32::MAX
    }

    #[inline]
    pub const fn is_some(self) -> bool {
        self.0 != u32::MAX
    }

    /// `None` for the sentinel, `Some(self)` otherwise.
    #[inline]
    pub const fn get(self) -> Option<NodeIndex> {
        if self.is_none() { None } else { Some(self) }
    }
}

impl Default for NodeIndex {
    fn default() -> Self {
        NodeIndex::NONE
    }
}

/// Ordered list of child indices.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeList {
    pub nodes: Vec<NodeIndex>,
}

impl NodeList {
    pub fn new(nodes: Vec<NodeIndex>) -> Self {
        NodeList { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl From<Vec<NodeIndex>> for NodeList {
    fn from(nodes: Vec<NodeIndex>) -> Self {
        NodeList { nodes }
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u8 {
        /// Created by the transform rather than the parser.
        const SYNTHESIZED = 1 << 0;
        /// A call into the Bind/Spawn driver or the cell constructor.
        const DRIVER_CALL = 1 << 1;
        /// A generated continuation segment function.
        const SEGMENT = 1 << 2;
        /// A temporary introduced by expression hoisting.
        const TEMPORARY = 1 << 3;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    LeftShift,
    RightShift,
    In,
    InstanceOf,
}

impl BinaryOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Remainder => "%",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::StrictEqual => "===",
            BinaryOperator::StrictNotEqual => "!==",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanEqual => ">=",
            BinaryOperator::BitwiseAnd => "&",
            BinaryOperator::BitwiseOr => "|",
            BinaryOperator::BitwiseXor => "^",
            BinaryOperator::LeftShift => "<<",
            BinaryOperator::RightShift => ">>",
            BinaryOperator::In => "in",
            BinaryOperator::InstanceOf => "instanceof",
        }
    }

    /// Binding power used by the printer (higher binds tighter).
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOperator::Multiply | BinaryOperator::Divide | BinaryOperator::Remainder => 13,
            BinaryOperator::Add | BinaryOperator::Subtract => 12,
            BinaryOperator::LeftShift | BinaryOperator::RightShift => 11,
            BinaryOperator::LessThan
            | BinaryOperator::LessThanEqual
            | BinaryOperator::GreaterThan
            | BinaryOperator::GreaterThanEqual
            | BinaryOperator::In
            | BinaryOperator::InstanceOf => 10,
            BinaryOperator::Equal
            | BinaryOperator::NotEqual
            | BinaryOperator::StrictEqual
            | BinaryOperator::StrictNotEqual => 9,
            BinaryOperator::BitwiseAnd => 8,
            BinaryOperator::BitwiseXor => 7,
            BinaryOperator::BitwiseOr => 6,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
    Coalesce,
}

impl LogicalOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            LogicalOperator::And => "&&",
            LogicalOperator::Or => "||",
            LogicalOperator::Coalesce => "??",
        }
    }

    pub fn precedence(self) -> u8 {
        match self {
            LogicalOperator::And => 5,
            LogicalOperator::Or | LogicalOperator::Coalesce => 4,
        }
    }
}

/// Assignment operators; `Assign` is plain `=`, the rest carry the binary
/// operator they apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignOperator {
    Assign,
    Compound(BinaryOperator),
}

impl AssignOperator {
    pub fn as_str(self) -> String {
        match self {
            AssignOperator::Assign => "=".to_string(),
            AssignOperator::Compound(op) => format!("{}=", op.as_str()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Minus,
    Plus,
    BitwiseNot,
    TypeOf,
    Void,
    Delete,
}

impl UnaryOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOperator::Not => "!",
            UnaryOperator::Minus => "-",
            UnaryOperator::Plus => "+",
            UnaryOperator::BitwiseNot => "~",
            UnaryOperator::TypeOf => "typeof ",
            UnaryOperator::Void => "void ",
            UnaryOperator::Delete => "delete ",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOperator {
    Increment,
    Decrement,
}

impl UpdateOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateOperator::Increment => "++",
            UpdateOperator::Decrement => "--",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
    Boolean(bool),
    Null,
    Undefined,
}

/// Function declarations and expressions share one payload.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionData {
    pub name: Option<String>,
    pub params: Vec<String>,
    /// Always a `Block`.
    pub body: NodeIndex,
    pub is_async: bool,
    pub is_generator: bool,
    /// Statement-position declaration (hoisted) rather than an expression.
    pub is_declaration: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    // =========================================================================
    // Statements
    // =========================================================================
    Program {
        body: NodeList,
    },
    Block {
        statements: NodeList,
    },
    /// `var a = 1, b;` - children are `VariableDeclaration`s.
    VariableStatement {
        declarations: NodeList,
    },
    VariableDeclaration {
        name: String,
        initializer: NodeIndex,
    },
    ExpressionStatement {
        expression: NodeIndex,
    },
    If {
        condition: NodeIndex,
        then_branch: NodeIndex,
        else_branch: NodeIndex,
    },
    For {
        /// A `VariableStatement` or an expression.
        initializer: NodeIndex,
        condition: NodeIndex,
        incrementor: NodeIndex,
        body: NodeIndex,
        label: Option<String>,
    },
    ForIn {
        binding: String,
        /// `for (var k in o)` rather than `for (k in o)`.
        declares_binding: bool,
        object: NodeIndex,
        body: NodeIndex,
        label: Option<String>,
    },
    While {
        condition: NodeIndex,
        body: NodeIndex,
        label: Option<String>,
    },
    DoWhile {
        body: NodeIndex,
        condition: NodeIndex,
        label: Option<String>,
    },
    Try {
        block: NodeIndex,
        catch_clause: NodeIndex,
        finally_block: NodeIndex,
    },
    CatchClause {
        param: String,
        block: NodeIndex,
    },
    Return {
        expression: NodeIndex,
    },
    Throw {
        expression: NodeIndex,
    },
    Break {
        label: Option<String>,
    },
    Continue {
        label: Option<String>,
    },
    Empty,

    // =========================================================================
    // Functions
    // =========================================================================
    Function(FunctionData),

    // =========================================================================
    // Expressions
    // =========================================================================
    Call {
        callee: NodeIndex,
        arguments: NodeList,
    },
    New {
        callee: NodeIndex,
        arguments: NodeList,
    },
    PropertyAccess {
        object: NodeIndex,
        name: String,
    },
    ElementAccess {
        object: NodeIndex,
        index: NodeIndex,
    },
    Binary {
        operator: BinaryOperator,
        left: NodeIndex,
        right: NodeIndex,
    },
    Logical {
        operator: LogicalOperator,
        left: NodeIndex,
        right: NodeIndex,
    },
    Conditional {
        condition: NodeIndex,
        when_true: NodeIndex,
        when_false: NodeIndex,
    },
    Assignment {
        operator: AssignOperator,
        target: NodeIndex,
        value: NodeIndex,
    },
    Unary {
        operator: UnaryOperator,
        operand: NodeIndex,
    },
    Update {
        operator: UpdateOperator,
        prefix: bool,
        operand: NodeIndex,
    },
    Sequence {
        expressions: NodeList,
    },
    ArrayLiteral {
        elements: NodeList,
    },
    /// Children are `Property` nodes.
    ObjectLiteral {
        properties: NodeList,
    },
    Property {
        key: String,
        value: NodeIndex,
    },
    Literal(Literal),
    Identifier {
        name: String,
    },
    This,
    Await {
        expression: NodeIndex,
    },
    Yield {
        expression: NodeIndex,
        delegate: bool,
    },
}

impl NodeKind {
    /// Children in source (evaluation) order, skipping absent slots.
    pub fn children(&self) -> SmallVec<[NodeIndex; 4]> {
        let mut out: SmallVec<[NodeIndex; 4]> = SmallVec::new();
        self.for_each_child(|idx| out.push(idx));
        out
    }

    pub fn for_each_child(&self, mut f: impl FnMut(NodeIndex)) {
        let mut push = |idx: NodeIndex| {
            if idx.is_some() {
                f(idx);
            }
        };
        match self {
            NodeKind::Program { body: list }
            | NodeKind::Block { statements: list }
            | NodeKind::VariableStatement { declarations: list }
            | NodeKind::Sequence { expressions: list }
            | NodeKind::ArrayLiteral { elements: list }
            | NodeKind::ObjectLiteral { properties: list } => {
                list.nodes.iter().copied().for_each(push);
            }
            NodeKind::VariableDeclaration { initializer, .. } => push(*initializer),
            NodeKind::ExpressionStatement { expression }
            | NodeKind::Return { expression }
            | NodeKind::Throw { expression }
            | NodeKind::Await { expression }
            | NodeKind::Yield { expression, .. } => push(*expression),
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                push(*condition);
                push(*then_branch);
                push(*else_branch);
            }
            NodeKind::For {
                initializer,
                condition,
                incrementor,
                body,
                ..
            } => {
                push(*initializer);
                push(*condition);
                push(*incrementor);
                push(*body);
            }
            NodeKind::ForIn { object, body, .. } => {
                push(*object);
                push(*body);
            }
            NodeKind::While {
                condition, body, ..
            } => {
                push(*condition);
                push(*body);
            }
            NodeKind::DoWhile {
                body, condition, ..
            } => {
                push(*body);
                push(*condition);
            }
            NodeKind::Try {
                block,
                catch_clause,
                finally_block,
            } => {
                push(*block);
                push(*catch_clause);
                push(*finally_block);
            }
            NodeKind::CatchClause { block, .. } => push(*block),
            NodeKind::Function(func) => push(func.body),
            NodeKind::Call { callee, arguments } | NodeKind::New { callee, arguments } => {
                push(*callee);
                arguments.nodes.iter().copied().for_each(push);
            }
            NodeKind::PropertyAccess { object, .. } => push(*object),
            NodeKind::ElementAccess { object, index } => {
                push(*object);
                push(*index);
            }
            NodeKind::Binary { left, right, .. } | NodeKind::Logical { left, right, .. } => {
                push(*left);
                push(*right);
            }
            NodeKind::Conditional {
                condition,
                when_true,
                when_false,
            } => {
                push(*condition);
                push(*when_true);
                push(*when_false);
            }
            NodeKind::Assignment { target, value, .. } => {
                push(*target);
                push(*value);
            }
            NodeKind::Unary { operand, .. } | NodeKind::Update { operand, .. } => push(*operand),
            NodeKind::Property { value, .. } => push(*value),
            NodeKind::Break { .. }
            | NodeKind::Continue { .. }
            | NodeKind::Empty
            | NodeKind::Literal(_)
            | NodeKind::Identifier { .. }
            | NodeKind::This => {}
        }
    }

    /// Visit every child slot mutably (including absent ones) so a child can
    /// be rebound to a different arena index.
    pub fn for_each_child_slot_mut(&mut self, mut f: impl FnMut(&mut NodeIndex)) {
        match self {
            NodeKind::Program { body: list }
            | NodeKind::Block { statements: list }
            | NodeKind::VariableStatement { declarations: list }
            | NodeKind::Sequence { expressions: list }
            | NodeKind::ArrayLiteral { elements: list }
            | NodeKind::ObjectLiteral { properties: list } => {
                list.nodes.iter_mut().for_each(f);
            }
            NodeKind::VariableDeclaration { initializer, .. } => f(initializer),
            NodeKind::ExpressionStatement { expression }
            | NodeKind::Return { expression }
            | NodeKind::Throw { expression }
            | NodeKind::Await { expression }
            | NodeKind::Yield { expression, .. } => f(expression),
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                f(condition);
                f(then_branch);
                f(else_branch);
            }
            NodeKind::For {
                initializer,
                condition,
                incrementor,
                body,
                ..
            } => {
                f(initializer);
                f(condition);
                f(incrementor);
                f(body);
            }
            NodeKind::ForIn { object, body, .. } => {
                f(object);
                f(body);
            }
            NodeKind::While {
                condition, body, ..
            }
            | NodeKind::DoWhile {
                body, condition, ..
            } => {
                f(condition);
                f(body);
            }
            NodeKind::Try {
                block,
                catch_clause,
                finally_block,
            } => {
                f(block);
                f(catch_clause);
                f(finally_block);
            }
            NodeKind::CatchClause { block, .. } => f(block),
            NodeKind::Function(func) => f(&mut func.body),
            NodeKind::Call { callee, arguments } | NodeKind::New { callee, arguments } => {
                f(callee);
                arguments.nodes.iter_mut().for_each(f);
            }
            NodeKind::PropertyAccess { object, .. } => f(object),
            NodeKind::ElementAccess { object, index } => {
                f(object);
                f(index);
            }
            NodeKind::Binary { left, right, .. } | NodeKind::Logical { left, right, .. } => {
                f(left);
                f(right);
            }
            NodeKind::Conditional {
                condition,
                when_true,
                when_false,
            } => {
                f(condition);
                f(when_true);
                f(when_false);
            }
            NodeKind::Assignment { target, value, .. } => {
                f(target);
                f(value);
            }
            NodeKind::Unary { operand, .. } | NodeKind::Update { operand, .. } => f(operand),
            NodeKind::Property { value, .. } => f(value),
            NodeKind::Break { .. }
            | NodeKind::Continue { .. }
            | NodeKind::Empty
            | NodeKind::Literal(_)
            | NodeKind::Identifier { .. }
            | NodeKind::This => {}
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self, NodeKind::Function(_))
    }

    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            NodeKind::Program { .. }
                | NodeKind::Block { .. }
                | NodeKind::VariableStatement { .. }
                | NodeKind::ExpressionStatement { .. }
                | NodeKind::If { .. }
                | NodeKind::For { .. }
                | NodeKind::ForIn { .. }
                | NodeKind::While { .. }
                | NodeKind::DoWhile { .. }
                | NodeKind::Try { .. }
                | NodeKind::Return { .. }
                | NodeKind::Throw { .. }
                | NodeKind::Break { .. }
                | NodeKind::Continue { .. }
                | NodeKind::Empty
        ) || matches!(self, NodeKind::Function(f) if f.is_declaration)
    }

    /// Loop statements accept `break`/`continue` and may carry a label.
    pub fn loop_label(&self) -> Option<Option<&str>> {
        match self {
            NodeKind::For { label, .. }
            | NodeKind::ForIn { label, .. }
            | NodeKind::While { label, .. }
            | NodeKind::DoWhile { label, .. } => Some(label.as_deref()),
            _ => None,
        }
    }
}

/// A node in the arena.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    pub flags: NodeFlags,
}

impl Node {
    pub fn new(kind: NodeKind, span: Span) -> Self {
        Node {
            kind,
            span,
            flags: NodeFlags::empty(),
        }
    }

    #[inline]
    pub fn is_synthesized(&self) -> bool {
        self.flags.contains(NodeFlags::SYNTHESIZED)
    }
}
