//! Abstract syntax tree of the script language.

use std::ops::Range;
use std::sync::Arc;

use smol_str::SmolStr;

use crate::span::Spanned;

pub type Ident = SmolStr;
pub type SpannedExpr = Spanned<Expr>;
pub type BoxExpr = Box<SpannedExpr>;

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Var,
    Let,
    Const,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDeclarator {
    pub name: Ident,
    pub init: Option<SpannedExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub param: Option<Ident>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Var {
        kind: VarKind,
        declarations: Vec<VarDeclarator>,
    },
    Function(Arc<FunctionDef>),
    Return(Option<SpannedExpr>),
    Throw(SpannedExpr),
    If {
        test: SpannedExpr,
        consequent: Box<Stmt>,
        alternate: Option<Box<Stmt>>,
    },
    While {
        test: SpannedExpr,
        body: Box<Stmt>,
    },
    For {
        init: Option<Box<Stmt>>,
        test: Option<SpannedExpr>,
        update: Option<SpannedExpr>,
        body: Box<Stmt>,
    },
    /// `for (x of iterable)` when `of` is `true`, `for (x in object)` otherwise.
    ForEach {
        kind: Option<VarKind>,
        name: Ident,
        of: bool,
        iterable: SpannedExpr,
        body: Box<Stmt>,
    },
    Break,
    Continue,
    Try {
        block: Vec<Stmt>,
        handler: Option<CatchClause>,
        finalizer: Option<Vec<Stmt>>,
    },
    Block(Vec<Stmt>),
    Expr(SpannedExpr),
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: Option<Ident>,
    pub params: Vec<Ident>,
    pub body: Vec<Stmt>,
    /// Arrow functions take `this` from the enclosing scope.
    pub arrow: bool,
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub key: Ident,
    pub value: SpannedExpr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Minus,
    Plus,
    Typeof,
    Void,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
    Instanceof,
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
}

impl AssignOp {
    /// The binary operator a compound assignment applies.
    pub fn binary(&self) -> Option<BinaryOp> {
        match self {
            Self::Assign => None,
            Self::Add => Some(BinaryOp::Add),
            Self::Sub => Some(BinaryOp::Sub),
            Self::Mul => Some(BinaryOp::Mul),
            Self::Div => Some(BinaryOp::Div),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null,
    Bool(bool),
    Number(f64),
    String(SmolStr),
    Ident(Ident),
    This,
    Array(Vec<SpannedExpr>),
    Object(Vec<Property>),
    Function(Arc<FunctionDef>),
    Unary {
        op: UnaryOp,
        operand: BoxExpr,
    },
    Update {
        op: UpdateOp,
        prefix: bool,
        target: BoxExpr,
    },
    Binary {
        op: BinaryOp,
        left: BoxExpr,
        right: BoxExpr,
    },
    Logical {
        op: LogicalOp,
        left: BoxExpr,
        right: BoxExpr,
    },
    Conditional {
        test: BoxExpr,
        consequent: BoxExpr,
        alternate: BoxExpr,
    },
    Assign {
        op: AssignOp,
        target: BoxExpr,
        value: BoxExpr,
    },
    Member {
        object: BoxExpr,
        property: Ident,
    },
    Index {
        object: BoxExpr,
        index: BoxExpr,
    },
    Call {
        callee: BoxExpr,
        args: Vec<SpannedExpr>,
    },
    New {
        callee: BoxExpr,
        args: Vec<SpannedExpr>,
    },
}
