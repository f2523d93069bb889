#![forbid(unsafe_code)]

//! Lowering of function bodies to C.
//!
//! Every modelled function takes the receiver (`struct C *self`) and the
//! call state (`struct CallState *state`) ahead of its own parameters. One
//! [`FunctionLowering`] is created per body; it owns the lexical scopes of
//! that body and nothing outlives it.

use std::collections::HashSet;

use rayon::prelude::*;
use solmc_ast::{
    BinOp, Block, CallKind, ContractDef, ElementaryType, Expr, ExprKind, FunctionDef,
    Literal, ModifierDef, ModifierInvocation, NodeId, Program, Span, Stmt, StmtKind,
    TypeNameKind, UnaryOp, VarDecl,
};
use solmc_backend_c::{CBlock, CExpr, CForInit, CFunction, CParam, CStmt, CVarDecl};
use tracing::debug;

use crate::call_state::{CALL_STATE_STRUCT, CallStateField, magic_kind};
use crate::error::{Result, TranslateError};
use crate::graph::Reachability;
use crate::names;
use crate::scalar::Scalar;
use crate::scope::{ScopeResolver, ScopedName};
use crate::summary::{MappingSummary, address_literal};
use crate::types::{TypeBinding, TypeTable, index_chain};

/// Holds the return value of a non-void function inside its modifier
/// wrappers.
const MODIFIER_RESULT: &str = "modifier_result";

/// Target names every lowered function already uses.
const RESERVED: [&str; 3] = ["self", "state", MODIFIER_RESULT];

fn check_name(decl: &VarDecl) -> Result<()> {
    if RESERVED.contains(&decl.name.as_str()) {
        return Err(TranslateError::unsupported(
            format!("`{}` collides with a name reserved by the model", decl.name),
            decl.span,
        ));
    }
    Ok(())
}

/// Everything a lowering of one contract's bodies reads.
#[derive(Clone, Copy)]
pub struct LoweringContext<'a> {
    pub program: &'a Program,
    pub contract: &'a ContractDef,
    pub types: &'a TypeTable,
    pub maps: &'a dyn MappingSummary,
}

pub fn receiver_param(contract: &ContractDef) -> CParam {
    CParam::new(format!("struct {}", contract.name), "self").pointer()
}

pub fn state_param() -> CParam {
    CParam::new(format!("struct {CALL_STATE_STRUCT}"), "state").pointer()
}

fn binary_op(op: BinOp) -> Option<&'static str> {
    Some(match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
        BinOp::Exp => return None,
        BinOp::Shl => "<<",
        BinOp::Shr => ">>",
        BinOp::BitAnd => "&",
        BinOp::BitOr => "|",
        BinOp::BitXor => "^",
        BinOp::And => "&&",
        BinOp::Or => "||",
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::Lt => "<",
        BinOp::Gt => ">",
        BinOp::Le => "<=",
        BinOp::Ge => ">=",
    })
}

fn binary_op_at(op: BinOp, span: Span) -> Result<&'static str> {
    binary_op(op).ok_or_else(|| TranslateError::unsupported("exponentiation", span))
}

fn is_this(expr: &Expr) -> bool {
    expr.unparenthesized().builtin_name() == Some("this")
}

/// `new C(args)`: the created contract and the constructor arguments.
fn new_call(expr: &Expr) -> Option<(NodeId, &[Expr])> {
    let ExprKind::Call { callee, args, .. } = &expr.unparenthesized().kind else {
        return None;
    };
    match &callee.kind {
        ExprKind::New(ty) => match &ty.kind {
            TypeNameKind::UserDefined { referenced, .. } => Some((*referenced, args.as_slice())),
            _ => None,
        },
        _ => None,
    }
}

/// Whether an lvalue reaches a mapping entry through member accesses.
fn through_index(expr: &Expr) -> bool {
    let mut cur = expr.unparenthesized();
    while let ExprKind::Member { base, .. } = &cur.kind {
        cur = base.unparenthesized();
    }
    matches!(cur.kind, ExprKind::Index { .. })
}

fn access(base: CExpr, field: String) -> CExpr {
    if base == CExpr::id("self") {
        base.arrow(field)
    } else {
        base.dot(field)
    }
}

fn assume_false() -> CStmt {
    CExpr::call("assume", vec![CExpr::Int(0)]).stmt()
}

/// How `return` is spelled in the body being lowered.
#[derive(Clone, Copy, Debug)]
enum ReturnKind<'a> {
    Void,
    Value,
    Named(&'a VarDecl),
    /// Modifier wrapper of a non-void function.
    Modifier,
}

impl<'a> ReturnKind<'a> {
    fn of(func: &'a FunctionDef) -> Self {
        match func.returns.params.as_slice() {
            [] => ReturnKind::Void,
            [named] if !named.name.is_empty() => ReturnKind::Named(named),
            _ => ReturnKind::Value,
        }
    }
}

pub struct FunctionLowering<'a> {
    cx: LoweringContext<'a>,
    scope: ScopeResolver,
    ret: ReturnKind<'a>,
    in_loop: bool,
    /// Replacement for `_` when lowering a modifier body.
    placeholder: Option<CExpr>,
    /// Set while lowering a modifier body; its names are prefixed.
    modifier: Option<&'a ModifierDef>,
}

impl<'a> FunctionLowering<'a> {
    fn new(cx: LoweringContext<'a>, ret: ReturnKind<'a>) -> Self {
        Self {
            cx,
            scope: ScopeResolver::new(),
            ret,
            in_loop: false,
            placeholder: None,
            modifier: None,
        }
    }

    /// Brings `decl` into the innermost scope and returns its target name.
    fn declare(&mut self, decl: &VarDecl) -> Result<String> {
        match self.modifier {
            Some(modifier) => {
                let target = names::modifier_local(modifier, &decl.name);
                self.scope.record_as(&decl.name, &target);
                Ok(target)
            }
            None => {
                check_name(decl)?;
                self.scope.record(&decl.name);
                Ok(decl.name.clone())
            }
        }
    }

    /// Lowers the body of `func` with its parameters in scope. A named
    /// return variable is declared up front and returned at the end.
    fn function_body(mut self, func: &'a FunctionDef) -> Result<CBlock> {
        let body = func.body.as_ref().ok_or_else(|| {
            TranslateError::unsupported(format!("`{}` has no body", func.name), func.span)
        })?;

        self.scope.enter();
        for param in &func.params.params {
            self.declare(param)?;
        }

        let mut out = CBlock::default();
        if let ReturnKind::Named(decl) = self.ret {
            let init = self.cx.types.initial_value_of(decl.id)?;
            let name = self.declare(decl)?;
            out.push(
                CVarDecl::new(self.cx.types.type_of(decl.id)?, name)
                    .with_init(init)
                    .stmt(),
            );
        }

        let lowered = self.block(body)?;
        out.stmts.extend(lowered.stmts);

        if let ReturnKind::Named(decl) = self.ret {
            if !matches!(out.stmts.last(), Some(CStmt::Return(_))) {
                out.push(CStmt::Return(Some(CExpr::id(decl.name.as_str()))));
            }
        }
        self.scope.exit();
        Ok(out)
    }

    // ---- statements ----

    fn block(&mut self, block: &Block) -> Result<CBlock> {
        self.scope.enter();
        let mut out = CBlock::default();
        for stmt in &block.stmts {
            out.push(self.stmt(stmt)?);
        }
        self.scope.exit();
        Ok(out)
    }

    /// Branches and loop bodies always lower to a block.
    fn nested(&mut self, stmt: &Stmt) -> Result<CBlock> {
        match &stmt.kind {
            StmtKind::Block(b) => self.block(b),
            _ => {
                self.scope.enter();
                let lowered = self.stmt(stmt)?;
                self.scope.exit();
                Ok(CBlock::new(vec![lowered]))
            }
        }
    }

    fn loop_body(&mut self, body: &Stmt) -> Result<CBlock> {
        let outer = std::mem::replace(&mut self.in_loop, true);
        let lowered = self.nested(body);
        self.in_loop = outer;
        lowered
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<CStmt> {
        match &stmt.kind {
            StmtKind::Block(b) => Ok(CStmt::Block(self.block(b)?)),
            StmtKind::Placeholder => self
                .placeholder
                .clone()
                .map(CExpr::stmt)
                .ok_or_else(|| TranslateError::illegal("`_` outside a modifier", stmt.span)),
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                let cond = self.expr(cond)?;
                let then = self.nested(then)?;
                let otherwise = match otherwise {
                    Some(o) => Some(self.nested(o)?),
                    None => None,
                };
                Ok(CStmt::If {
                    cond,
                    then,
                    otherwise,
                })
            }
            StmtKind::While {
                cond,
                body,
                do_while,
            } => {
                let cond = self.expr(cond)?;
                let body = self.loop_body(body)?;
                Ok(if *do_while {
                    CStmt::DoWhile { body, cond }
                } else {
                    CStmt::While { cond, body }
                })
            }
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                self.scope.enter();
                let init = match init {
                    Some(i) => Some(match self.stmt(i)? {
                        CStmt::Decl(d) => CForInit::Decl(d),
                        CStmt::Expr(e) => CForInit::Expr(e),
                        _ => {
                            return Err(TranslateError::unsupported(
                                "`for` initialiser that is neither a declaration nor an expression",
                                i.span,
                            ));
                        }
                    }),
                    None => None,
                };
                let cond = cond.as_ref().map(|c| self.expr(c)).transpose()?;
                let step = step.as_ref().map(|s| self.expr(s)).transpose()?;
                let body = self.loop_body(body)?;
                self.scope.exit();
                Ok(CStmt::For {
                    init,
                    cond,
                    step,
                    body,
                })
            }
            StmtKind::Continue if self.in_loop => Ok(CStmt::Continue),
            StmtKind::Continue => Err(TranslateError::illegal(
                "`continue` outside a loop",
                stmt.span,
            )),
            StmtKind::Break if self.in_loop => Ok(CStmt::Break),
            StmtKind::Break => Err(TranslateError::illegal("`break` outside a loop", stmt.span)),
            StmtKind::Return(value) => self.ret(value.as_ref(), stmt.span),
            StmtKind::Throw => Ok(assume_false()),
            StmtKind::Emit { event, .. } => {
                Ok(CExpr::call("smartace_log", vec![CExpr::str(event.as_str())]).stmt())
            }
            StmtKind::InlineAssembly => {
                Err(TranslateError::unsupported("inline assembly", stmt.span))
            }
            StmtKind::VarDecl { decls, value } => self.var_decl(decls, value.as_ref(), stmt.span),
            StmtKind::Expr(e) => Ok(self.expr(e)?.stmt()),
        }
    }

    fn ret(&self, value: Option<&Expr>, span: Span) -> Result<CStmt> {
        let value = value.map(|v| self.expr(v)).transpose()?;
        match (self.ret, value) {
            (ReturnKind::Named(decl), None) => {
                Ok(CStmt::Return(Some(CExpr::id(decl.name.as_str()))))
            }
            (ReturnKind::Named(decl), Some(v)) => Ok(CStmt::Return(Some(CExpr::assign(
                CExpr::id(decl.name.as_str()),
                v,
            )))),
            (ReturnKind::Modifier, _) => Ok(CStmt::Return(Some(CExpr::id(MODIFIER_RESULT)))),
            (ReturnKind::Value, Some(v)) => Ok(CStmt::Return(Some(v))),
            (ReturnKind::Void, None) => Ok(CStmt::Return(None)),
            (ReturnKind::Value, None) => Err(TranslateError::illegal(
                "`return` without a value in a function that returns one",
                span,
            )),
            (ReturnKind::Void, Some(_)) => Err(TranslateError::illegal(
                "`return` with a value in a function without a return type",
                span,
            )),
        }
    }

    fn var_decl(&mut self, decls: &[VarDecl], value: Option<&Expr>, span: Span) -> Result<CStmt> {
        let [decl] = decls else {
            return Err(TranslateError::unsupported("tuple declarations", span));
        };
        let source = decl.value.as_ref().or(value);
        let binding = self.cx.types.binding(decl.id)?;
        let ty = binding.target_type();

        // The initialiser is lowered before the name is in scope.
        let pointer = decl.is_storage() && !binding.is_simple();
        let init = if pointer {
            let Some(source) = source else {
                return Err(TranslateError::unsupported(
                    format!("storage pointer `{}` without an initialiser", decl.name),
                    decl.span,
                ));
            };
            self.expr(source)?.addr_of()
        } else {
            match source {
                Some(source) => self.expr(source)?,
                None => self.cx.types.initial_value_of(decl.id)?,
            }
        };
        let mut lowered = CVarDecl::new(ty, self.declare(decl)?).with_init(init);
        if pointer {
            lowered = lowered.pointer();
        }
        Ok(lowered.stmt())
    }

    // ---- expressions ----

    fn exprs(&self, exprs: &[Expr]) -> Result<Vec<CExpr>> {
        exprs.iter().map(|e| self.expr(e)).collect()
    }

    fn expr(&self, expr: &Expr) -> Result<CExpr> {
        match &expr.kind {
            ExprKind::Identifier { name, referenced } => self.identifier(expr, name, *referenced),
            ExprKind::Literal(lit) => Ok(match lit {
                Literal::Bool(b) => CExpr::Int(u64::from(*b)),
                Literal::Number(text) => match lit.as_u64() {
                    Some(v) => CExpr::Int(v),
                    None => CExpr::Lit(text.replace('_', "")),
                },
                // Strings are approximated by a constant.
                Literal::String(_) => CExpr::Int(0),
            }),
            ExprKind::Unary {
                op,
                prefix,
                operand,
            } => self.unary(expr, *op, *prefix, operand),
            ExprKind::Binary { op, left, right } => Ok(CExpr::binary(
                self.expr(left)?,
                binary_op_at(*op, expr.span)?,
                self.expr(right)?,
            )),
            ExprKind::Assign { op, lhs, rhs } => self.assign(expr, *op, lhs, rhs),
            ExprKind::Conditional {
                cond,
                then,
                otherwise,
            } => Ok(CExpr::cond(
                self.expr(cond)?,
                self.expr(then)?,
                self.expr(otherwise)?,
            )),
            ExprKind::Member {
                base,
                member,
                referenced,
            } => self.member(expr, base, member, *referenced),
            ExprKind::Index { .. } => self.read_index(expr),
            ExprKind::Call { callee, args, kind } => match kind {
                CallKind::TypeConversion => self.conversion(expr, callee, args),
                CallKind::StructConstructor => {
                    let name = self.cx.types.name_of(expr.id)?;
                    Ok(CExpr::call(names::init(&name), self.exprs(args)?))
                }
                CallKind::Function => self.function_call(expr, callee, args),
            },
            ExprKind::Tuple(items) => match items.as_slice() {
                [single] => self.expr(single),
                _ => Err(TranslateError::unsupported("tuple expressions", expr.span)),
            },
            ExprKind::ElementaryType(_) | ExprKind::New(_) => Err(TranslateError::unsupported(
                "type expression used as a value",
                expr.span,
            )),
        }
    }

    fn is_type_decl(&self, id: NodeId) -> bool {
        self.cx.program.contracts.iter().any(|c| {
            c.id == id
                || c.structs.iter().any(|s| s.id == id)
                || c.enums.iter().any(|e| e.id == id)
        })
    }

    fn identifier(&self, expr: &Expr, name: &str, referenced: Option<NodeId>) -> Result<CExpr> {
        let Some(decl) = referenced else {
            return match name {
                "this" => Ok(ScopedName::Receiver.to_expr()),
                "now" => Ok(CallStateField::Timestamp.access()),
                _ => Err(TranslateError::unsupported(
                    format!("`{name}` used as a value"),
                    expr.span,
                )),
            };
        };
        if self.cx.program.function(decl).is_some() {
            return Err(TranslateError::unsupported("function values", expr.span));
        }
        if self.is_type_decl(decl) {
            return Err(TranslateError::unsupported(
                format!("type name `{name}` used as a value"),
                expr.span,
            ));
        }

        let resolved = self.scope.resolve(name);
        let lowered = resolved.to_expr();
        // Storage-located locals of record type are pointers.
        if matches!(resolved, ScopedName::Local(_))
            && self.cx.types.is_storage(expr.id)
            && !self.cx.types.binding(expr.id)?.is_simple()
        {
            return Ok(CExpr::prefix("*", lowered));
        }
        Ok(lowered)
    }

    fn unary(&self, expr: &Expr, op: UnaryOp, prefix: bool, operand: &Expr) -> Result<CExpr> {
        let spelled = match op {
            UnaryOp::Delete => {
                let zero = self.cx.types.initial_value_of(operand.id)?;
                return self.store(operand, zero);
            }
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::Neg => "-",
            UnaryOp::Inc => "++",
            UnaryOp::Dec => "--",
        };
        if matches!(op, UnaryOp::Inc | UnaryOp::Dec) && through_index(operand) {
            return Err(TranslateError::unsupported(
                "increment of a mapping entry",
                expr.span,
            ));
        }
        let inner = self.expr(operand)?;
        Ok(if prefix {
            CExpr::prefix(spelled, inner)
        } else {
            CExpr::postfix(spelled, inner)
        })
    }

    fn assign(&self, expr: &Expr, op: Option<BinOp>, lhs: &Expr, rhs: &Expr) -> Result<CExpr> {
        if op.is_none() {
            if let Some((contract, args)) = new_call(rhs) {
                let target = self.expr(lhs)?;
                return self.construct(target, contract, args, rhs.span);
            }
        }

        let value = self.expr(rhs)?;
        let lhs = lhs.unparenthesized();
        if let ExprKind::Index { .. } = lhs.kind {
            let value = match op {
                None => value,
                Some(op) => CExpr::binary(self.read_index(lhs)?, binary_op_at(op, expr.span)?, value),
            };
            return self.write_index(lhs, value);
        }
        if through_index(lhs) {
            return Err(TranslateError::unsupported(
                "assignment to a member of a mapping entry",
                expr.span,
            ));
        }

        let target = self.expr(lhs)?;
        Ok(match op {
            None => CExpr::assign(target, value),
            Some(op) => CExpr::Assign {
                op: Some(binary_op_at(op, expr.span)?),
                lhs: Box::new(target),
                rhs: Box::new(value),
            },
        })
    }

    /// `lhs = value`, through `Write_*` for mapping entries.
    fn store(&self, lhs: &Expr, value: CExpr) -> Result<CExpr> {
        let lhs = lhs.unparenthesized();
        if let ExprKind::Index { .. } = lhs.kind {
            return self.write_index(lhs, value);
        }
        Ok(CExpr::assign(self.expr(lhs)?, value))
    }

    /// `Init_C(&target, state, args...)`
    fn construct(&self, target: CExpr, contract: NodeId, args: &[Expr], span: Span) -> Result<CExpr> {
        let created = self.cx.program.contract(contract).ok_or_else(|| {
            TranslateError::unsupported("creation of a contract outside the model", span)
        })?;
        let mut call_args = vec![target.addr_of(), CExpr::id("state")];
        call_args.extend(self.exprs(args)?);
        Ok(CExpr::call(names::init(&created.name), call_args))
    }

    fn member(
        &self,
        expr: &Expr,
        base: &Expr,
        member: &str,
        referenced: Option<NodeId>,
    ) -> Result<CExpr> {
        if let Some(kind) = magic_kind(base) {
            return CallStateField::from_magic(kind, member)
                .map(CallStateField::access)
                .ok_or_else(|| {
                    TranslateError::unsupported(format!("call-state member `{member}`"), expr.span)
                });
        }
        if referenced.is_none() && member == "balance" {
            let owner = base.unparenthesized();
            let holder = if self
                .cx
                .types
                .binding(owner.id)
                .is_ok_and(|b| b.is_contract())
            {
                Some(owner)
            } else {
                self.address_owner(owner)
            };
            return match holder {
                Some(contract) => Ok(access(self.expr(contract)?, names::MODEL_BALANCE.into())),
                None => Err(TranslateError::unsupported(
                    "balance of an arbitrary address",
                    expr.span,
                )),
            };
        }
        let Some(decl) = referenced else {
            return Err(TranslateError::unsupported(
                format!("member `{member}`"),
                expr.span,
            ));
        };
        if let Some(ordinal) = self.cx.types.enum_ordinal(decl) {
            return Ok(CExpr::Int(ordinal));
        }
        if self.cx.program.function(decl).is_some() {
            return Err(TranslateError::unsupported("function values", expr.span));
        }
        Ok(access(self.expr(base)?, names::field(member)))
    }

    /// The contract behind `address(c)`.
    fn address_owner<'e>(&self, expr: &'e Expr) -> Option<&'e Expr> {
        let ExprKind::Call {
            callee,
            args,
            kind: CallKind::TypeConversion,
        } = &expr.kind
        else {
            return None;
        };
        if !matches!(
            callee.kind,
            ExprKind::ElementaryType(ElementaryType::Address { .. })
        ) {
            return None;
        }
        match args.as_slice() {
            [arg] if is_this(arg) => Some(arg),
            [arg] => self
                .cx
                .types
                .binding(arg.id)
                .ok()
                .filter(|b| b.is_contract())
                .map(|_| arg),
            _ => None,
        }
    }

    fn mapping_access(&self, expr: &Expr) -> Result<(String, CExpr, Vec<CExpr>)> {
        let (root, depth) = index_chain(expr);
        let record = root
            .referenced()
            .and_then(|decl| self.cx.maps.resolve(decl))
            .ok_or_else(|| {
                TranslateError::unsupported("index access on a value that is not a mapping", expr.span)
            })?;
        if depth != record.key_types.len() {
            return Err(TranslateError::unsupported(
                format!("partial access to mapping `{}`", record.name),
                expr.span,
            ));
        }

        let mut keys = Vec::with_capacity(depth);
        let mut cur = expr;
        while let ExprKind::Index {
            base,
            index: Some(index),
        } = &cur.kind
        {
            keys.push(self.expr(index)?);
            cur = base.as_ref();
        }
        keys.reverse();
        Ok((record.name.clone(), self.expr(root)?.addr_of(), keys))
    }

    fn read_index(&self, expr: &Expr) -> Result<CExpr> {
        let (record, base, keys) = self.mapping_access(expr)?;
        let mut args = vec![base];
        args.extend(keys);
        Ok(CExpr::call(format!("Read_{record}"), args))
    }

    fn write_index(&self, expr: &Expr, value: CExpr) -> Result<CExpr> {
        let (record, base, keys) = self.mapping_access(expr)?;
        let mut args = vec![base];
        args.extend(keys);
        args.push(value);
        Ok(CExpr::call(format!("Write_{record}"), args))
    }

    fn conversion(&self, expr: &Expr, callee: &Expr, args: &[Expr]) -> Result<CExpr> {
        let [arg] = args else {
            return Err(TranslateError::unsupported(
                "conversion with more than one argument",
                expr.span,
            ));
        };
        if let Some(literal) = address_literal(expr) {
            return Ok(CExpr::id(names::global_address(literal)));
        }
        if let Some(owner) = self.address_owner(expr) {
            return Ok(access(self.expr(owner)?, names::MODEL_ADDRESS.into()));
        }
        let target = match &callee.kind {
            ExprKind::ElementaryType(ty) => Scalar::from_elementary(*ty),
            _ => match self.cx.types.binding(expr.id)? {
                TypeBinding::Scalar(s) => *s,
                _ => {
                    return Err(TranslateError::unsupported(
                        "conversion to a contract type",
                        expr.span,
                    ));
                }
            },
        };
        Ok(target.wrap(self.expr(arg)?))
    }

    fn function_call(&self, expr: &Expr, callee: &Expr, args: &[Expr]) -> Result<CExpr> {
        let target = callee.unparenthesized();

        if let Some(builtin) = target.builtin_name() {
            return match (builtin, args) {
                // Messages carry no effect in the model.
                ("require", [cond, ..]) => Ok(CExpr::call("assume", vec![self.expr(cond)?])),
                ("assert", [cond, ..]) => Ok(CExpr::call("assert", vec![self.expr(cond)?])),
                ("revert", _) => Ok(CExpr::call("assume", vec![CExpr::Int(0)])),
                (other, _) => Err(TranslateError::unsupported(
                    format!("call to `{other}`"),
                    expr.span,
                )),
            };
        }

        match &target.kind {
            ExprKind::Member {
                base,
                member,
                referenced: None,
            } if member == "transfer" || member == "send" => {
                let [amount] = args else {
                    return Err(TranslateError::unsupported(
                        format!("`{member}` without exactly one amount"),
                        expr.span,
                    ));
                };
                Ok(CExpr::call(
                    "_pay",
                    vec![CExpr::id("state"), self.expr(base)?, self.expr(amount)?],
                ))
            }
            ExprKind::Identifier {
                referenced: Some(func),
                ..
            } => {
                let name = self.callee_name(*func, expr.span)?;
                let mut call_args = vec![CExpr::id("self"), CExpr::id("state")];
                call_args.extend(self.exprs(args)?);
                Ok(CExpr::call(name, call_args))
            }
            ExprKind::Member {
                base,
                member,
                referenced: Some(decl),
            } => {
                if self.cx.program.function(*decl).is_none() {
                    // Public getter of another contract's state variable.
                    if args.is_empty() {
                        return self.member(target, base, member, Some(*decl));
                    }
                    return Err(TranslateError::unsupported(
                        format!("call of `{member}`"),
                        expr.span,
                    ));
                }
                let name = self.callee_name(*decl, expr.span)?;
                let mut call_args = vec![self.receiver(base)?, CExpr::id("state")];
                call_args.extend(self.exprs(args)?);
                Ok(CExpr::call(name, call_args))
            }
            ExprKind::New(_) => Err(TranslateError::unsupported(
                "contract creation outside an assignment",
                expr.span,
            )),
            _ => Err(TranslateError::unsupported("call target", expr.span)),
        }
    }

    fn callee_name(&self, func: NodeId, span: Span) -> Result<String> {
        let (_, def) = self.cx.program.function(func).ok_or_else(|| {
            TranslateError::unsupported("call to a function outside the model", span)
        })?;
        if !def.is_implemented() {
            return Err(TranslateError::unsupported(
                format!("call to unimplemented function `{}`", def.name),
                span,
            ));
        }
        Ok(self.cx.types.function_name(func)?.to_string())
    }

    /// Receiver argument of a call through `base`.
    fn receiver(&self, base: &Expr) -> Result<CExpr> {
        let base = base.unparenthesized();
        if is_this(base) {
            return Ok(CExpr::id("self"));
        }
        if let Some(decl) = base.referenced() {
            if self.cx.program.contract(decl).is_some() {
                // Library call: libraries carry no state.
                return Ok(CExpr::Int(0));
            }
        }
        if self.cx.types.binding(base.id)?.is_contract() {
            return Ok(self.expr(base)?.addr_of());
        }
        Err(TranslateError::unsupported(
            "call through a value that is not a modelled contract",
            base.span,
        ))
    }
}

fn param_of(types: &TypeTable, param: &VarDecl) -> Result<CParam> {
    check_name(param)?;
    let binding = types.binding(param.id)?;
    if binding.is_contract() {
        return Err(TranslateError::unsupported(
            format!("contract-typed parameter `{}`", param.name),
            param.span,
        ));
    }
    let p = CParam::new(binding.target_type(), param.name.as_str());
    Ok(if param.is_storage() && !binding.is_simple() {
        p.pointer()
    } else {
        p
    })
}

fn params_of(cx: LoweringContext<'_>, func: &FunctionDef) -> Result<Vec<CParam>> {
    let mut params = vec![receiver_param(cx.contract), state_param()];
    for p in &func.params.params {
        params.push(param_of(cx.types, p)?);
    }
    Ok(params)
}

/// Lowers the body of `func` on its own.
pub fn lower_body(cx: LoweringContext<'_>, func: &FunctionDef) -> Result<CBlock> {
    FunctionLowering::new(cx, ReturnKind::of(func)).function_body(func)
}

/// Wrapper applying one modifier: the modifier body with `_` replaced by a
/// call of `next`. Modifier parameters and locals are renamed so that the
/// forwarded arguments always name the function's own parameters.
fn modifier_wrapper(
    cx: LoweringContext<'_>,
    func: &FunctionDef,
    inv: &ModifierInvocation,
    next: &str,
) -> Result<CBlock> {
    let modifier = cx
        .contract
        .modifier(inv.modifier)
        .ok_or_else(|| TranslateError::missing(inv.modifier, "modifier"))?;
    if modifier.params.params.len() != inv.args.len() {
        return Err(TranslateError::unsupported(
            format!("modifier `{}` applied with the wrong arity", modifier.name),
            inv.span,
        ));
    }

    // Arguments see the function's parameters; the body sees only its own.
    let mut caller = FunctionLowering::new(cx, ReturnKind::Void);
    caller.scope.enter();
    for p in &func.params.params {
        caller.scope.record(&p.name);
    }
    let args = caller.exprs(&inv.args)?;

    let mut forward = vec![CExpr::id("self"), CExpr::id("state")];
    forward.extend(func.params.params.iter().map(|p| CExpr::id(p.name.as_str())));
    let call = CExpr::call(next, forward);

    let ret = cx.types.binding(func.id)?;
    let returns = !matches!(ret, TypeBinding::Void);
    let mut lowering = FunctionLowering::new(
        cx,
        if returns {
            ReturnKind::Modifier
        } else {
            ReturnKind::Void
        },
    );
    lowering.modifier = Some(modifier);
    lowering.placeholder = Some(if returns {
        CExpr::assign(CExpr::id(MODIFIER_RESULT), call)
    } else {
        call
    });

    let mut out = CBlock::default();
    lowering.scope.enter();
    if returns {
        out.push(
            CVarDecl::new(ret.target_type(), MODIFIER_RESULT)
                .with_init(cx.types.initial_value_of(func.id)?)
                .stmt(),
        );
    }
    for (param, arg) in modifier.params.params.iter().zip(args) {
        let name = lowering.declare(param)?;
        out.push(
            CVarDecl::new(cx.types.type_of(param.id)?, name)
                .with_init(arg)
                .stmt(),
        );
    }
    let body = lowering.block(&modifier.body)?;
    out.stmts.extend(body.stmts);
    if returns && !matches!(out.stmts.last(), Some(CStmt::Return(_))) {
        out.push(CStmt::Return(Some(CExpr::id(MODIFIER_RESULT))));
    }
    lowering.scope.exit();
    Ok(out)
}

/// Lowers every specialization of `func`. A function with modifiers becomes
/// a chain: the entry point applies the first modifier, each wrapper calls
/// the next, and `<entry>_base` holds the function body.
pub fn lower_function(
    cx: LoweringContext<'_>,
    func: &FunctionDef,
    specializations: usize,
) -> Result<Vec<CFunction>> {
    let ret = cx.types.type_of(func.id)?;
    let params = params_of(cx, func)?;
    let body = lower_body(cx, func)?;

    let mut seen = HashSet::new();
    for inv in &func.modifiers {
        if !seen.insert(inv.modifier) {
            return Err(TranslateError::unsupported(
                format!("modifier applied twice to `{}`", func.name),
                inv.span,
            ));
        }
    }

    let mut out = Vec::new();
    for index in 0..specializations.max(1) {
        let entry = names::method(cx.contract, func, index);
        if func.modifiers.is_empty() {
            out.push(CFunction {
                ret: ret.clone(),
                name: entry,
                params: params.clone(),
                body: body.clone(),
            });
            continue;
        }

        let mut next = format!("{entry}_base");
        out.push(CFunction {
            ret: ret.clone(),
            name: next.clone(),
            params: params.clone(),
            body: body.clone(),
        });
        for (k, inv) in func.modifiers.iter().enumerate().rev() {
            let name = if k == 0 {
                entry.clone()
            } else {
                format!("{}_{entry}", cx.types.function_name(inv.modifier)?)
            };
            out.push(CFunction {
                ret: ret.clone(),
                name: name.clone(),
                params: params.clone(),
                body: modifier_wrapper(cx, func, inv, &next)?,
            });
            next = name;
        }
    }
    debug!(function = %func.name, lowered = out.len(), "function lowered");
    Ok(out)
}

/// Initialisation of one state variable inside `Init_C`. Contract-typed
/// fields without a creation expression are left alone.
pub fn field_init(cx: LoweringContext<'_>, var: &VarDecl) -> Result<Option<CStmt>> {
    let lowering = FunctionLowering::new(cx, ReturnKind::Void);
    let target = CExpr::id("self").arrow(names::field(&var.name));
    if let Some(value) = &var.value {
        if let Some((contract, args)) = new_call(value) {
            return Ok(Some(lowering.construct(target, contract, args, value.span)?.stmt()));
        }
        return Ok(Some(CExpr::assign(target, lowering.expr(value)?).stmt()));
    }
    if cx.types.binding(var.id)?.is_contract() {
        return Ok(None);
    }
    Ok(Some(
        CExpr::assign(target, cx.types.initial_value_of(var.id)?).stmt(),
    ))
}

/// `Init_C`: state variable initialisers followed by the constructor body.
pub fn lower_constructor(cx: LoweringContext<'_>) -> Result<CFunction> {
    let contract = cx.contract;
    let mut body = CBlock::default();
    for var in &contract.state_vars {
        if let Some(init) = field_init(cx, var)? {
            body.push(init);
        }
    }

    let mut params = vec![receiver_param(contract), state_param()];
    if let Some(ctor) = contract.constructor() {
        if let Some(inv) = ctor.modifiers.first() {
            return Err(TranslateError::unsupported("constructor modifiers", inv.span));
        }
        for p in &ctor.params.params {
            params.push(param_of(cx.types, p)?);
        }
        if ctor.is_implemented() {
            body.stmts.extend(lower_body(cx, ctor)?.stmts);
        }
    }

    Ok(CFunction {
        ret: "void".to_string(),
        name: names::init(&contract.name),
        params,
        body,
    })
}

/// `Init_C` followed by every reachable function of the contract. Function
/// bodies are lowered in parallel; the output order is declaration order.
pub fn lower_contract(cx: LoweringContext<'_>, reach: &dyn Reachability) -> Result<Vec<CFunction>> {
    let mut out = vec![lower_constructor(cx)?];
    let lowered = cx
        .contract
        .functions
        .par_iter()
        .filter(|f| !f.is_constructor() && f.is_implemented() && reach.is_reachable(f.id))
        .map(|f| lower_function(cx, f, reach.specializations(f.id)))
        .collect::<Result<Vec<_>>>()?;
    out.extend(lowered.into_iter().flatten());
    debug!(contract = %cx.contract.name, functions = out.len(), "contract lowered");
    Ok(out)
}
