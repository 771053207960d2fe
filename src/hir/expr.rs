use serde::Serialize;

use crate::span::Spanned;
use super::types::TypeId;

/// Binary operator codes, shared between the HIR and the CFG instruction
/// set the range engine folds over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    DivTrunc,
    DivFloor,
    DivRound,
    DivCeil,
    DivExact,
    Mod,
    Min,
    Max,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LogicalAnd,
    LogicalOr,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(self, BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum UnOp {
    Neg,
    BitNot,
    LogicalNot,
    Abs,
    /// Absolute value computed in the corresponding unsigned type.
    Absu,
    /// Width/signedness conversion; the target type is the statement's
    /// result type.
    Cast,
    Ident,
}

/// Where a suspend point came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SuspendKind {
    Await,
    Yield,
    Initial,
    Final,
}

/// Placeholder introduced during lowering and replaced once the frame
/// layout is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ProxyId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LabelId(pub u32);

/// Index of a field in the synthesized frame aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FieldId(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    IntLit { value: i128, ty: TypeId },
    BoolLit(bool),
    NullPtr,
    /// Reference to a named local or parameter, pre-rewrite.
    Name(String),
    /// Stand-in for a not-yet-laid-out frame slot or proxy variable.
    Proxy(ProxyId),
    /// Member access on the frame pointer, post-layout.
    FrameRef(FieldId),
    /// Compiler-materialized temporary (the result object of `init`).
    Materialize { init: Box<Spanned<Expr>>, ty: TypeId },
    AddrOf(Box<Spanned<Expr>>),
    Deref(Box<Spanned<Expr>>),
    /// Rvalue conversion of the operand, making it a move-construction
    /// source.
    Move(Box<Spanned<Expr>>),
    Unary { op: UnOp, operand: Box<Spanned<Expr>>, ty: TypeId },
    Binary { op: BinOp, lhs: Box<Spanned<Expr>>, rhs: Box<Spanned<Expr>> },
    Call { callee: String, args: Vec<Spanned<Expr>> },
    MethodCall { recv: Box<Spanned<Expr>>, method: String, args: Vec<Spanned<Expr>> },
    Construct { ty: TypeId, args: Vec<Spanned<Expr>> },
    /// `co_await operand` (or the desugared forms of yield/initial/final).
    Await { operand: Box<Spanned<Expr>>, kind: SuspendKind },
    /// `co_yield operand`; desugars to `co_await promise.yield_value(operand)`.
    Yield { operand: Box<Spanned<Expr>> },
    /// Fully-built suspend point, produced by the suspend-point builder and
    /// consumed by the expander. Indexes into the lowering's registry.
    SuspendPoint(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Let {
        name: String,
        ty: TypeId,
        init: Option<Spanned<Expr>>,
    },
    Assign {
        target: Spanned<Expr>,
        value: Spanned<Expr>,
    },
    Expr(Spanned<Expr>),
    If {
        cond: Spanned<Expr>,
        then_block: Block,
        else_block: Option<Block>,
    },
    While {
        cond: Spanned<Expr>,
        body: Block,
    },
    Scope(Block),
    Return(Option<Spanned<Expr>>),
    /// `co_return expr?`
    CoReturn(Option<Spanned<Expr>>),

    // Lowered-only control flow, never produced by a front end.
    Label(LabelId),
    Goto(LabelId),
    Switch {
        scrutinee: Spanned<Expr>,
        arms: Vec<(u64, Vec<Stmt>)>,
        default: Vec<Stmt>,
    },
    /// Unconditional trap (undefined-behavior guard in dispatch defaults).
    Trap,
    /// Catch-all wrapper routing escaping failures to a handler; only
    /// emitted when exception support is enabled.
    TryCatchAll {
        body: Block,
        handler: Vec<Stmt>,
    },
    /// Return control to whoever called resume/destroy.
    Park,
    /// Run the destructor of the object denoted by the expression.
    DtorCall(Spanned<Expr>),
    /// Free the frame allocation the expression points at.
    FreeFrame(Spanned<Expr>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Self { stmts }
    }
}
