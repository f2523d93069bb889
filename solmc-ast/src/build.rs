#![forbid(unsafe_code)]

//! Programmatic construction of annotated trees.
//!
//! Front ends that do not go through the JSON import, and the test suites of
//! the downstream crates, build programs through [`AstBuilder`]. The builder
//! hands out fresh [`NodeId`]s and fills in the annotations a semantic pass
//! would normally attach (expression types, call kinds).

use std::cell::Cell;

use crate::{
    BinOp, Block, CallKind, ContractDef, ContractKind, ElementaryType, EnumDef, EnumValue, Expr,
    ExprKind, FunctionDef, FunctionKind, Literal, Location, MagicKind, ModifierDef,
    ModifierInvocation, NodeId, ParamList, SourceType, Span, Stmt, StmtKind, StructDef, TypeName,
    TypeNameKind, UnaryOp, VarDecl, Visibility,
};

#[derive(Debug, Default)]
pub struct AstBuilder {
    next: Cell<u32>,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> NodeId {
        let id = self.next.get();
        self.next.set(id + 1);
        NodeId(id)
    }

    // ---- type names ----

    pub fn elementary(&self, ty: ElementaryType) -> TypeName {
        self.type_name(TypeNameKind::Elementary(ty))
    }

    pub fn uint(&self, bits: u16) -> TypeName {
        self.elementary(ElementaryType::Int {
            signed: false,
            bits,
        })
    }

    pub fn int(&self, bits: u16) -> TypeName {
        self.elementary(ElementaryType::Int { signed: true, bits })
    }

    pub fn boolean(&self) -> TypeName {
        self.elementary(ElementaryType::Bool)
    }

    pub fn address(&self) -> TypeName {
        self.elementary(ElementaryType::Address { payable: true })
    }

    pub fn user_type(&self, name: &str, referenced: NodeId) -> TypeName {
        self.type_name(TypeNameKind::UserDefined {
            name: name.to_string(),
            referenced,
        })
    }

    pub fn mapping(&self, key: TypeName, value: TypeName) -> TypeName {
        self.type_name(TypeNameKind::Mapping {
            key: Box::new(key),
            value: Box::new(value),
        })
    }

    pub fn array(&self, base: TypeName) -> TypeName {
        self.type_name(TypeNameKind::Array {
            base: Box::new(base),
        })
    }

    pub fn function_type(&self) -> TypeName {
        self.type_name(TypeNameKind::Function)
    }

    fn type_name(&self, kind: TypeNameKind) -> TypeName {
        TypeName {
            id: self.id(),
            span: Span::default(),
            kind,
        }
    }

    // ---- declarations ----

    pub fn var(&self, name: &str, ty: TypeName) -> VarDecl {
        VarDecl {
            id: self.id(),
            span: Span::default(),
            name: name.to_string(),
            ty: Some(ty),
            value: None,
            location: Location::Default,
            state_var: false,
        }
    }

    pub fn state_var(&self, name: &str, ty: TypeName) -> VarDecl {
        VarDecl {
            state_var: true,
            ..self.var(name, ty)
        }
    }

    pub fn storage_var(&self, name: &str, ty: TypeName) -> VarDecl {
        VarDecl {
            location: Location::Storage,
            ..self.var(name, ty)
        }
    }

    // ---- expressions ----

    pub fn expr(&self, kind: ExprKind, ty: SourceType) -> Expr {
        Expr {
            id: self.id(),
            span: Span::default(),
            ty,
            kind,
        }
    }

    /// Identifier bound to `decl`, typed from the declared type name.
    pub fn ident(&self, decl: &VarDecl) -> Expr {
        let ty = match decl.ty.as_ref().map(|t| &t.kind) {
            Some(TypeNameKind::Elementary(e)) => SourceType::Elementary(*e),
            Some(TypeNameKind::Mapping { .. }) => SourceType::Mapping,
            Some(TypeNameKind::Function) => SourceType::Function,
            _ => SourceType::Unknown,
        };
        self.ident_ref(&decl.name, decl.id, ty)
    }

    pub fn ident_ref(&self, name: &str, referenced: NodeId, ty: SourceType) -> Expr {
        self.expr(
            ExprKind::Identifier {
                name: name.to_string(),
                referenced: Some(referenced),
            },
            ty,
        )
    }

    /// Unbound global such as `msg`, `now` or `require`.
    pub fn builtin(&self, name: &str) -> Expr {
        let ty = match name {
            "msg" => SourceType::Magic(MagicKind::Message),
            "block" => SourceType::Magic(MagicKind::Block),
            "tx" => SourceType::Magic(MagicKind::Transaction),
            "now" => SourceType::Elementary(ElementaryType::UINT256),
            _ => SourceType::Function,
        };
        self.expr(
            ExprKind::Identifier {
                name: name.to_string(),
                referenced: None,
            },
            ty,
        )
    }

    pub fn this(&self, contract: NodeId) -> Expr {
        self.expr(
            ExprKind::Identifier {
                name: "this".to_string(),
                referenced: None,
            },
            SourceType::Contract(contract),
        )
    }

    pub fn number(&self, value: u64) -> Expr {
        self.expr(
            ExprKind::Literal(Literal::Number(value.to_string())),
            SourceType::Elementary(ElementaryType::UINT256),
        )
    }

    pub fn bool_lit(&self, value: bool) -> Expr {
        self.expr(
            ExprKind::Literal(Literal::Bool(value)),
            SourceType::Elementary(ElementaryType::Bool),
        )
    }

    pub fn string_lit(&self, value: &str) -> Expr {
        self.expr(
            ExprKind::Literal(Literal::String(value.to_string())),
            SourceType::Elementary(ElementaryType::String),
        )
    }

    pub fn unary(&self, op: UnaryOp, operand: Expr) -> Expr {
        let ty = operand.ty;
        self.expr(
            ExprKind::Unary {
                op,
                prefix: true,
                operand: Box::new(operand),
            },
            ty,
        )
    }

    pub fn postfix(&self, op: UnaryOp, operand: Expr) -> Expr {
        let ty = operand.ty;
        self.expr(
            ExprKind::Unary {
                op,
                prefix: false,
                operand: Box::new(operand),
            },
            ty,
        )
    }

    pub fn binary(&self, left: Expr, op: BinOp, right: Expr) -> Expr {
        let ty = match op {
            BinOp::Eq
            | BinOp::Ne
            | BinOp::Lt
            | BinOp::Gt
            | BinOp::Le
            | BinOp::Ge
            | BinOp::And
            | BinOp::Or => SourceType::Elementary(ElementaryType::Bool),
            _ => left.ty,
        };
        self.expr(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            ty,
        )
    }

    pub fn assign(&self, lhs: Expr, rhs: Expr) -> Expr {
        self.assign_op(lhs, None, rhs)
    }

    pub fn assign_op(&self, lhs: Expr, op: Option<BinOp>, rhs: Expr) -> Expr {
        let ty = lhs.ty;
        self.expr(
            ExprKind::Assign {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
        )
    }

    pub fn conditional(&self, cond: Expr, then: Expr, otherwise: Expr) -> Expr {
        let ty = then.ty;
        self.expr(
            ExprKind::Conditional {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
            ty,
        )
    }

    /// Member access that the front end did not bind to a declaration
    /// (`msg.sender`, `dst.transfer`, ...).
    pub fn member(&self, base: Expr, member: &str) -> Expr {
        let ty = match (&base.ty, member) {
            (SourceType::Magic(_), "sender") | (SourceType::Magic(_), "origin") => {
                SourceType::Elementary(ElementaryType::Address { payable: true })
            }
            (SourceType::Magic(_), _) => SourceType::Elementary(ElementaryType::UINT256),
            (_, "balance") => SourceType::Elementary(ElementaryType::UINT256),
            _ => SourceType::Function,
        };
        self.expr(
            ExprKind::Member {
                base: Box::new(base),
                member: member.to_string(),
                referenced: None,
            },
            ty,
        )
    }

    pub fn member_ref(&self, base: Expr, member: &str, referenced: NodeId, ty: SourceType) -> Expr {
        self.expr(
            ExprKind::Member {
                base: Box::new(base),
                member: member.to_string(),
                referenced: Some(referenced),
            },
            ty,
        )
    }

    pub fn index(&self, base: Expr, index: Expr, ty: SourceType) -> Expr {
        self.expr(
            ExprKind::Index {
                base: Box::new(base),
                index: Some(Box::new(index)),
            },
            ty,
        )
    }

    pub fn call(&self, callee: Expr, args: Vec<Expr>) -> Expr {
        self.expr(
            ExprKind::Call {
                callee: Box::new(callee),
                args,
                kind: CallKind::Function,
            },
            SourceType::Unknown,
        )
    }

    /// `T(arg)` for an elementary `T`.
    pub fn convert(&self, ty: ElementaryType, arg: Expr) -> Expr {
        let callee = self.expr(ExprKind::ElementaryType(ty), SourceType::TypeExpr);
        self.expr(
            ExprKind::Call {
                callee: Box::new(callee),
                args: vec![arg],
                kind: CallKind::TypeConversion,
            },
            SourceType::Elementary(ty),
        )
    }

    pub fn construct(&self, strukt: &StructDef, args: Vec<Expr>) -> Expr {
        let callee = self.ident_ref(&strukt.name, strukt.id, SourceType::TypeExpr);
        self.expr(
            ExprKind::Call {
                callee: Box::new(callee),
                args,
                kind: CallKind::StructConstructor,
            },
            SourceType::Struct(strukt.id),
        )
    }

    pub fn new_contract(&self, contract: &ContractDef, args: Vec<Expr>) -> Expr {
        let ty = self.user_type(&contract.name, contract.id);
        let callee = self.expr(ExprKind::New(ty), SourceType::Function);
        self.expr(
            ExprKind::Call {
                callee: Box::new(callee),
                args,
                kind: CallKind::Function,
            },
            SourceType::Contract(contract.id),
        )
    }

    pub fn tuple(&self, items: Vec<Expr>) -> Expr {
        let ty = match items.as_slice() {
            [single] => single.ty,
            _ => SourceType::Tuple,
        };
        self.expr(ExprKind::Tuple(items), ty)
    }

    // ---- statements ----

    pub fn stmt(&self, kind: StmtKind) -> Stmt {
        Stmt {
            id: self.id(),
            span: Span::default(),
            kind,
        }
    }

    pub fn expr_stmt(&self, expr: Expr) -> Stmt {
        self.stmt(StmtKind::Expr(expr))
    }

    pub fn block(&self, stmts: Vec<Stmt>) -> Block {
        Block {
            id: self.id(),
            span: Span::default(),
            stmts,
        }
    }

    pub fn block_stmt(&self, stmts: Vec<Stmt>) -> Stmt {
        self.stmt(StmtKind::Block(self.block(stmts)))
    }

    pub fn if_stmt(&self, cond: Expr, then: Stmt, otherwise: Option<Stmt>) -> Stmt {
        self.stmt(StmtKind::If {
            cond,
            then: Box::new(then),
            otherwise: otherwise.map(Box::new),
        })
    }

    pub fn while_stmt(&self, cond: Expr, body: Stmt) -> Stmt {
        self.stmt(StmtKind::While {
            cond,
            body: Box::new(body),
            do_while: false,
        })
    }

    pub fn do_while(&self, body: Stmt, cond: Expr) -> Stmt {
        self.stmt(StmtKind::While {
            cond,
            body: Box::new(body),
            do_while: true,
        })
    }

    pub fn for_stmt(
        &self,
        init: Option<Stmt>,
        cond: Option<Expr>,
        step: Option<Expr>,
        body: Stmt,
    ) -> Stmt {
        self.stmt(StmtKind::For {
            init: init.map(Box::new),
            cond,
            step,
            body: Box::new(body),
        })
    }

    pub fn ret(&self, value: Option<Expr>) -> Stmt {
        self.stmt(StmtKind::Return(value))
    }

    pub fn break_stmt(&self) -> Stmt {
        self.stmt(StmtKind::Break)
    }

    pub fn continue_stmt(&self) -> Stmt {
        self.stmt(StmtKind::Continue)
    }

    pub fn throw_stmt(&self) -> Stmt {
        self.stmt(StmtKind::Throw)
    }

    pub fn placeholder(&self) -> Stmt {
        self.stmt(StmtKind::Placeholder)
    }

    pub fn assembly(&self) -> Stmt {
        self.stmt(StmtKind::InlineAssembly)
    }

    pub fn emit(&self, event: &str, args: Vec<Expr>) -> Stmt {
        let callee = self.builtin(event);
        let call = self.call(callee, args);
        self.stmt(StmtKind::Emit {
            event: event.to_string(),
            call,
        })
    }

    pub fn decl_stmt(&self, decl: VarDecl, value: Option<Expr>) -> Stmt {
        self.stmt(StmtKind::VarDecl {
            decls: vec![decl],
            value,
        })
    }

    // ---- definitions ----

    pub fn params(&self, params: Vec<VarDecl>) -> ParamList {
        ParamList {
            id: self.id(),
            params,
        }
    }

    /// Public function with an implemented body.
    pub fn function(
        &self,
        name: &str,
        params: Vec<VarDecl>,
        returns: Vec<VarDecl>,
        body: Vec<Stmt>,
    ) -> FunctionDef {
        FunctionDef {
            id: self.id(),
            span: Span::default(),
            name: name.to_string(),
            kind: FunctionKind::Function,
            visibility: Visibility::Public,
            payable: false,
            params: self.params(params),
            returns: self.params(returns),
            modifiers: Vec::new(),
            body: Some(self.block(body)),
        }
    }

    pub fn constructor(&self, params: Vec<VarDecl>, body: Vec<Stmt>) -> FunctionDef {
        FunctionDef {
            kind: FunctionKind::Constructor,
            ..self.function("", params, Vec::new(), body)
        }
    }

    pub fn modifier(&self, name: &str, params: Vec<VarDecl>, body: Vec<Stmt>) -> ModifierDef {
        ModifierDef {
            id: self.id(),
            span: Span::default(),
            name: name.to_string(),
            params: self.params(params),
            body: self.block(body),
        }
    }

    pub fn invoke(&self, modifier: &ModifierDef, args: Vec<Expr>) -> ModifierInvocation {
        ModifierInvocation {
            span: Span::default(),
            modifier: modifier.id,
            args,
        }
    }

    pub fn contract(&self, name: &str) -> ContractDef {
        self.contract_of_kind(name, ContractKind::Contract)
    }

    pub fn library(&self, name: &str) -> ContractDef {
        self.contract_of_kind(name, ContractKind::Library)
    }

    pub fn interface(&self, name: &str) -> ContractDef {
        self.contract_of_kind(name, ContractKind::Interface)
    }

    fn contract_of_kind(&self, name: &str, kind: ContractKind) -> ContractDef {
        ContractDef {
            id: self.id(),
            span: Span::default(),
            name: name.to_string(),
            kind,
            structs: Vec::new(),
            enums: Vec::new(),
            state_vars: Vec::new(),
            functions: Vec::new(),
            modifiers: Vec::new(),
        }
    }

    pub fn struct_def(&self, name: &str, members: Vec<VarDecl>) -> StructDef {
        StructDef {
            id: self.id(),
            span: Span::default(),
            name: name.to_string(),
            members,
        }
    }

    pub fn enum_def(&self, name: &str, values: &[&str]) -> EnumDef {
        EnumDef {
            id: self.id(),
            span: Span::default(),
            name: name.to_string(),
            values: values
                .iter()
                .map(|v| EnumValue {
                    id: self.id(),
                    span: Span::default(),
                    name: v.to_string(),
                })
                .collect(),
        }
    }
}
