#![forbid(unsafe_code)]

/// A C expression. Operators are kept as their C spelling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CExpr {
    Id(String),
    Int(u64),
    /// Numeric literal text copied verbatim (decimal or hex).
    Lit(String),
    Str(String),
    Call {
        callee: String,
        args: Vec<CExpr>,
    },
    Unary {
        op: &'static str,
        prefix: bool,
        expr: Box<CExpr>,
    },
    Binary {
        op: &'static str,
        left: Box<CExpr>,
        right: Box<CExpr>,
    },
    Assign {
        op: Option<&'static str>,
        lhs: Box<CExpr>,
        rhs: Box<CExpr>,
    },
    Member {
        base: Box<CExpr>,
        field: String,
        arrow: bool,
    },
    AddrOf(Box<CExpr>),
    Cond {
        cond: Box<CExpr>,
        then: Box<CExpr>,
        otherwise: Box<CExpr>,
    },
}

impl CExpr {
    pub fn id(name: impl Into<String>) -> Self {
        CExpr::Id(name.into())
    }

    pub fn str(text: impl Into<String>) -> Self {
        CExpr::Str(text.into())
    }

    pub fn call(callee: impl Into<String>, args: Vec<CExpr>) -> Self {
        CExpr::Call {
            callee: callee.into(),
            args,
        }
    }

    pub fn binary(left: CExpr, op: &'static str, right: CExpr) -> Self {
        CExpr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn assign(lhs: CExpr, rhs: CExpr) -> Self {
        CExpr::Assign {
            op: None,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn prefix(op: &'static str, expr: CExpr) -> Self {
        CExpr::Unary {
            op,
            prefix: true,
            expr: Box::new(expr),
        }
    }

    pub fn postfix(op: &'static str, expr: CExpr) -> Self {
        CExpr::Unary {
            op,
            prefix: false,
            expr: Box::new(expr),
        }
    }

    pub fn cond(cond: CExpr, then: CExpr, otherwise: CExpr) -> Self {
        CExpr::Cond {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    /// `self->field`
    pub fn arrow(self, field: impl Into<String>) -> Self {
        CExpr::Member {
            base: Box::new(self),
            field: field.into(),
            arrow: true,
        }
    }

    /// `self.field`
    pub fn dot(self, field: impl Into<String>) -> Self {
        CExpr::Member {
            base: Box::new(self),
            field: field.into(),
            arrow: false,
        }
    }

    pub fn addr_of(self) -> Self {
        CExpr::AddrOf(Box::new(self))
    }

    pub fn stmt(self) -> CStmt {
        CStmt::Expr(self)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CVarDecl {
    pub ty: String,
    pub name: String,
    pub pointer: bool,
    pub init: Option<CExpr>,
}

impl CVarDecl {
    pub fn new(ty: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            name: name.into(),
            pointer: false,
            init: None,
        }
    }

    pub fn pointer(mut self) -> Self {
        self.pointer = true;
        self
    }

    pub fn with_init(mut self, init: CExpr) -> Self {
        self.init = Some(init);
        self
    }

    pub fn id(&self) -> CExpr {
        CExpr::Id(self.name.clone())
    }

    pub fn stmt(self) -> CStmt {
        CStmt::Decl(self)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CBlock {
    pub stmts: Vec<CStmt>,
}

impl CBlock {
    pub fn new(stmts: Vec<CStmt>) -> Self {
        Self { stmts }
    }

    pub fn push(&mut self, stmt: CStmt) {
        self.stmts.push(stmt);
    }

    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }
}

/// The first clause of a `for` header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CForInit {
    Decl(CVarDecl),
    Expr(CExpr),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CStmt {
    Expr(CExpr),
    Decl(CVarDecl),
    Block(CBlock),
    If {
        cond: CExpr,
        then: CBlock,
        otherwise: Option<CBlock>,
    },
    While {
        cond: CExpr,
        body: CBlock,
    },
    DoWhile {
        body: CBlock,
        cond: CExpr,
    },
    For {
        init: Option<CForInit>,
        cond: Option<CExpr>,
        step: Option<CExpr>,
        body: CBlock,
    },
    Switch {
        scrutinee: CExpr,
        cases: Vec<(u64, CBlock)>,
        default: CBlock,
    },
    Return(Option<CExpr>),
    Break,
    Continue,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CParam {
    pub ty: String,
    pub name: String,
    pub pointer: bool,
}

impl CParam {
    pub fn new(ty: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            name: name.into(),
            pointer: false,
        }
    }

    pub fn pointer(mut self) -> Self {
        self.pointer = true;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CFunction {
    pub ret: String,
    pub name: String,
    pub params: Vec<CParam>,
    pub body: CBlock,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CStruct {
    pub name: String,
    pub fields: Vec<CVarDecl>,
}

impl CStruct {
    pub fn type_name(&self) -> String {
        format!("struct {}", self.name)
    }
}

/// A complete translation unit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CProgram {
    pub includes: Vec<String>,
    pub structs: Vec<CStruct>,
    pub globals: Vec<CVarDecl>,
    pub functions: Vec<CFunction>,
}
