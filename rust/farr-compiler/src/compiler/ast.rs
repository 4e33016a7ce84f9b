//! The syntax tree produced by the parser.
//!
//! Every node carries a [`Span`] so the runtime can point back at source
//! locations when it raises an error. Nodes are grouped the way the grammar
//! groups them: literals, data structures, operations, and statements.

use crate::compiler::tokens::Span;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub body: Vec<Node>,
    pub span: Span,
}

/// An ordered, possibly-empty list of expressions or statements, used for
/// argument lists, parameter lists, list/hash-map literals, and `use` paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Itemized {
    pub items: Vec<Node>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
    Power,
    LeftShift,
    RightShift,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationalOp {
    EqualEqual,
    NotEqual,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentOp {
    Plain,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
    Power,
    LeftShift,
    RightShift,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    pub condition: Node,
    pub body: Block,
    pub orelse: Option<Box<Case>>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catch {
    pub excepts: Itemized,
    pub bound_as: Option<String>,
    pub body: Block,
    pub orelse: Option<Box<Catch>>,
    pub span: Span,
}

/// Every syntax tree node Farr's grammar can produce.
///
/// The shape follows the original parser's node taxonomy node-for-node,
/// with two additions needed to make constructs the interpreter already
/// understood actually reachable from syntax: `Match`/`Case` (a dedicated
/// `match` keyword reusing the existing `for`/`else` case syntax) and
/// `...`-prefixed variadic parameters/spread arguments (reusing the
/// existing `Pass` token rather than inventing new punctuation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Node {
    Module(Module),
    Block(Block),

    Pass(Span),
    Null(Span),
    Integer { value: String, span: Span },
    Binary { value: String, span: Span },
    Octal { value: String, span: Span },
    Hexadecimal { value: String, span: Span },
    Float { value: String, span: Span },
    String { value: String, span: Span },
    Identifier { name: String, span: Span },

    Range {
        from: Box<Node>,
        to: Option<Box<Node>>,
        by: Option<Box<Node>>,
    },
    Itemized(Itemized),
    ChainedExpressions {
        expressions: Itemized,
    },
    List {
        elements: Itemized,
    },
    HashMap {
        pairs: Option<Itemized>,
    },
    Pair {
        key: Box<Node>,
        value: Box<Node>,
    },
    /// `...expr` used as a call argument, unpacked into the callee's
    /// variadic parameter at call time.
    ExpandableArgument {
        expression: Box<Node>,
        span: Span,
    },

    Call {
        invoke: Box<Node>,
        args: Itemized,
    },
    GroupedExpression {
        expression: Box<Node>,
    },

    Negation {
        operand: Box<Node>,
        span: Span,
    },
    PreIncrement {
        operand: Box<Node>,
        span: Span,
    },
    PreDecrement {
        operand: Box<Node>,
        span: Span,
    },
    PostIncrement {
        operand: Box<Node>,
        span: Span,
    },
    PostDecrement {
        operand: Box<Node>,
        span: Span,
    },
    Arithmetic {
        operator: ArithmeticOp,
        left: Box<Node>,
        right: Box<Node>,
        span: Span,
    },
    Relational {
        operator: RelationalOp,
        left: Box<Node>,
        right: Box<Node>,
        span: Span,
    },
    Logical {
        operator: LogicalOp,
        left: Box<Node>,
        right: Box<Node>,
        span: Span,
    },
    Ternary {
        then: Box<Node>,
        condition: Box<Node>,
        orelse: Box<Node>,
        span: Span,
    },

    Use {
        path: Itemized,
    },
    VariableDeclaration {
        identifier: String,
        expression: Option<Box<Node>>,
    },
    /// `...name` in a parameter list: collects any remaining positional
    /// arguments into a list bound to `name`.
    VariadicParameterDeclaration {
        identifier: String,
        span: Span,
    },
    Assignment {
        operator: AssignmentOp,
        variables: Itemized,
        expression: Box<Node>,
    },

    While {
        condition: Box<Node>,
        body: Block,
        orelse: Option<Block>,
    },
    For {
        initial: Itemized,
        condition: Box<Node>,
        body: Block,
        orelse: Option<Block>,
    },
    Break(Span),
    Continue(Span),
    If {
        condition: Box<Node>,
        body: Block,
        orelse: Option<Box<IfOrElse>>,
    },
    Match {
        expression: Box<Node>,
        body: Vec<Case>,
    },
    Try {
        body: Block,
        catch: Option<Catch>,
    },

    FunctionDefinition {
        identifier: String,
        params: Itemized,
        body: Option<Box<Node>>,
    },
    MemberFunctionDefinition {
        identifier: String,
        params: Itemized,
        body: Option<Box<Node>>,
        struct_name: String,
    },
    StructDefinition {
        identifier: String,
        body: Option<Box<Node>>,
        parents: Option<Itemized>,
    },
    Return {
        expression: Option<Box<Node>>,
        span: Span,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IfOrElse {
    Block(Block),
    If(Node),
}

impl Node {
    /// Best-effort source location for diagnostics. Container nodes with no
    /// position of their own (grouped expressions, lists, calls) fall back
    /// to their first meaningful child.
    pub fn span(&self) -> Span {
        match self {
            Node::Module(_) => Span::dummy(),
            Node::Block(b) => b.span,
            Node::Pass(s) | Node::Null(s) | Node::Break(s) | Node::Continue(s) => *s,
            Node::Integer { span, .. }
            | Node::Binary { span, .. }
            | Node::Octal { span, .. }
            | Node::Hexadecimal { span, .. }
            | Node::Float { span, .. }
            | Node::String { span, .. }
            | Node::Identifier { span, .. } => *span,
            Node::Range { from, .. } => from.span(),
            Node::Itemized(i) => i.span,
            Node::ChainedExpressions { expressions } => expressions.span,
            Node::List { elements } => elements.span,
            Node::HashMap { pairs } => pairs.as_ref().map(|p| p.span).unwrap_or(Span::dummy()),
            Node::Pair { key, .. } => key.span(),
            Node::ExpandableArgument { span, .. } => *span,
            Node::Call { invoke, .. } => invoke.span(),
            Node::GroupedExpression { expression } => expression.span(),
            Node::Negation { span, .. }
            | Node::PreIncrement { span, .. }
            | Node::PreDecrement { span, .. }
            | Node::PostIncrement { span, .. }
            | Node::PostDecrement { span, .. }
            | Node::Arithmetic { span, .. }
            | Node::Relational { span, .. }
            | Node::Logical { span, .. }
            | Node::Ternary { span, .. } => *span,
            Node::Use { path } => path.span,
            Node::VariableDeclaration { .. } => Span::dummy(),
            Node::VariadicParameterDeclaration { span, .. } => *span,
            Node::Assignment { variables, .. } => variables.span,
            Node::While { body, .. } | Node::For { body, .. } => body.span,
            Node::If { body, .. } => body.span,
            Node::Match { body, .. } => body.first().map(|c| c.span).unwrap_or(Span::dummy()),
            Node::Try { body, .. } => body.span,
            Node::FunctionDefinition { .. }
            | Node::MemberFunctionDefinition { .. }
            | Node::StructDefinition { .. } => Span::dummy(),
            Node::Return { span, .. } => *span,
        }
    }
}
