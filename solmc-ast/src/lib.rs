#![forbid(unsafe_code)]

//! Annotated contract AST consumed by the translator.
//!
//! The tree is produced by an external front end after name and type
//! analysis. Every node that can carry a derived fact (a type binding, a
//! storage flag, an enum ordinal) has a [`NodeId`] that is unique within its
//! [`Program`]; the translator keys all of its side tables by that id and
//! never relies on node addresses or structural equality.

use std::fmt;

use miette::SourceSpan;
use serde::{Deserialize, Serialize};

pub mod build;
pub mod walk;

/// Byte range in the original source file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub offset: usize,
    pub len: usize,
}

impl From<Span> for SourceSpan {
    fn from(span: Span) -> Self {
        SourceSpan::new(span.offset.into(), span.len)
    }
}

pub fn span(start: usize, len: usize) -> Span {
    Span { offset: start, len }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic id source for program builders.
#[derive(Clone, Debug, Default)]
pub struct NodeIds {
    next: u32,
}

impl NodeIds {
    pub fn fresh(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub contracts: Vec<ContractDef>,
}

impl Program {
    pub fn contract(&self, id: NodeId) -> Option<&ContractDef> {
        self.contracts.iter().find(|c| c.id == id)
    }

    pub fn contract_by_name(&self, name: &str) -> Option<&ContractDef> {
        self.contracts.iter().find(|c| c.name == name)
    }

    /// Finds the contract that defines the function `id`.
    pub fn function(&self, id: NodeId) -> Option<(&ContractDef, &FunctionDef)> {
        self.contracts
            .iter()
            .find_map(|c| c.functions.iter().find(|f| f.id == id).map(|f| (c, f)))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractKind {
    Contract,
    Interface,
    Library,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContractDef {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub kind: ContractKind,
    #[serde(default)]
    pub structs: Vec<StructDef>,
    #[serde(default)]
    pub enums: Vec<EnumDef>,
    #[serde(default)]
    pub state_vars: Vec<VarDecl>,
    #[serde(default)]
    pub functions: Vec<FunctionDef>,
    #[serde(default)]
    pub modifiers: Vec<ModifierDef>,
}

impl ContractDef {
    pub fn is_interface(&self) -> bool {
        self.kind == ContractKind::Interface
    }

    pub fn is_library(&self) -> bool {
        self.kind == ContractKind::Library
    }

    pub fn constructor(&self) -> Option<&FunctionDef> {
        self.functions.iter().find(|f| f.is_constructor())
    }

    pub fn modifier(&self, id: NodeId) -> Option<&ModifierDef> {
        self.modifiers.iter().find(|m| m.id == id)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructDef {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub members: Vec<VarDecl>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnumDef {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub values: Vec<EnumValue>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnumValue {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Location {
    #[default]
    Default,
    Storage,
    Memory,
    CallData,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VarDecl {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    /// `None` for `var` declarations.
    pub ty: Option<TypeName>,
    #[serde(default)]
    pub value: Option<Expr>,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub state_var: bool,
}

impl VarDecl {
    /// State variables always live in storage; locals only when declared so.
    pub fn is_storage(&self) -> bool {
        self.state_var || self.location == Location::Storage
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunctionKind {
    Constructor,
    Function,
    Fallback,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    External,
    Internal,
    Private,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub kind: FunctionKind,
    pub visibility: Visibility,
    #[serde(default)]
    pub payable: bool,
    pub params: ParamList,
    pub returns: ParamList,
    #[serde(default)]
    pub modifiers: Vec<ModifierInvocation>,
    pub body: Option<Block>,
}

impl FunctionDef {
    pub fn is_constructor(&self) -> bool {
        self.kind == FunctionKind::Constructor
    }

    pub fn is_implemented(&self) -> bool {
        self.body.is_some()
    }

    /// Public and external functions may be invoked by the environment.
    pub fn is_entry_point(&self) -> bool {
        matches!(self.visibility, Visibility::Public | Visibility::External)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParamList {
    pub id: NodeId,
    pub params: Vec<VarDecl>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModifierDef {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub params: ParamList,
    pub body: Block,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModifierInvocation {
    pub span: Span,
    pub modifier: NodeId,
    #[serde(default)]
    pub args: Vec<Expr>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypeName {
    pub id: NodeId,
    pub span: Span,
    pub kind: TypeNameKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TypeNameKind {
    Elementary(ElementaryType),
    UserDefined { name: String, referenced: NodeId },
    Mapping { key: Box<TypeName>, value: Box<TypeName> },
    Function,
    Array { base: Box<TypeName> },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementaryType {
    Bool,
    Address { payable: bool },
    Int { signed: bool, bits: u16 },
    Fixed { signed: bool, bits: u16, fractional: u8 },
    String,
}

impl ElementaryType {
    pub const UINT256: Self = ElementaryType::Int {
        signed: false,
        bits: 256,
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MagicKind {
    Block,
    Message,
    Transaction,
}

/// Type of an expression as computed by the front end.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceType {
    Elementary(ElementaryType),
    Contract(NodeId),
    Struct(NodeId),
    Enum(NodeId),
    Mapping,
    Magic(MagicKind),
    Function,
    Tuple,
    TypeExpr,
    #[default]
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: NodeId,
    pub span: Span,
    pub stmts: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub id: NodeId,
    pub span: Span,
    pub kind: StmtKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    Block(Block),
    /// The `_` of a modifier body.
    Placeholder,
    If {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
        do_while: bool,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Expr>,
        body: Box<Stmt>,
    },
    Continue,
    Break,
    Return(Option<Expr>),
    Throw,
    Emit {
        event: String,
        call: Expr,
    },
    InlineAssembly,
    VarDecl {
        decls: Vec<VarDecl>,
        value: Option<Expr>,
    },
    Expr(Expr),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub id: NodeId,
    pub span: Span,
    #[serde(default)]
    pub ty: SourceType,
    pub kind: ExprKind,
}

impl Expr {
    /// Strips single-element parentheses, e.g. `(dst.send)`.
    pub fn unparenthesized(&self) -> &Expr {
        match &self.kind {
            ExprKind::Tuple(items) if items.len() == 1 => items[0].unparenthesized(),
            _ => self,
        }
    }

    /// Declaration referenced by an identifier or member access.
    pub fn referenced(&self) -> Option<NodeId> {
        match &self.kind {
            ExprKind::Identifier { referenced, .. } | ExprKind::Member { referenced, .. } => {
                *referenced
            }
            _ => None,
        }
    }

    /// Name of an identifier that the front end left unbound (`msg`, `now`,
    /// `require`, ...).
    pub fn builtin_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Identifier {
                name,
                referenced: None,
            } => Some(name.as_str()),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Identifier {
        name: String,
        referenced: Option<NodeId>,
    },
    Literal(Literal),
    Unary {
        op: UnaryOp,
        prefix: bool,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Assign {
        op: Option<BinOp>,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Member {
        base: Box<Expr>,
        member: String,
        referenced: Option<NodeId>,
    },
    Index {
        base: Box<Expr>,
        index: Option<Box<Expr>>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        kind: CallKind,
    },
    Tuple(Vec<Expr>),
    ElementaryType(ElementaryType),
    New(TypeName),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Literal {
    Bool(bool),
    /// Canonical decimal or hex text.
    Number(String),
    String(String),
}

impl Literal {
    /// Value of a numeric literal that fits in 64 bits.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Literal::Number(text) => {
                let text = text.replace('_', "");
                match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
                    Some(hex) => u64::from_str_radix(hex, 16).ok(),
                    None => text.parse().ok(),
                }
            }
            Literal::Bool(_) | Literal::String(_) => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallKind {
    Function,
    TypeConversion,
    StructConstructor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    BitNot,
    Neg,
    Inc,
    Dec,
    Delete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,

    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,

    And,
    Or,

    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}
