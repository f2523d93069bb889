#![forbid(unsafe_code)]

//! Read-only pre-order traversal over statements and expressions.

use crate::{Block, Expr, ExprKind, Program, Stmt, StmtKind, TypeName, TypeNameKind, VarDecl};

pub fn block_exprs<'a>(block: &'a Block, f: &mut dyn FnMut(&'a Expr)) {
    for stmt in &block.stmts {
        stmt_exprs(stmt, f);
    }
}

pub fn stmt_exprs<'a>(stmt: &'a Stmt, f: &mut dyn FnMut(&'a Expr)) {
    match &stmt.kind {
        StmtKind::Block(b) => block_exprs(b, f),
        StmtKind::If {
            cond,
            then,
            otherwise,
        } => {
            expr_tree(cond, f);
            stmt_exprs(then, f);
            if let Some(o) = otherwise {
                stmt_exprs(o, f);
            }
        }
        StmtKind::While { cond, body, .. } => {
            expr_tree(cond, f);
            stmt_exprs(body, f);
        }
        StmtKind::For {
            init,
            cond,
            step,
            body,
        } => {
            if let Some(i) = init {
                stmt_exprs(i, f);
            }
            if let Some(c) = cond {
                expr_tree(c, f);
            }
            if let Some(s) = step {
                expr_tree(s, f);
            }
            stmt_exprs(body, f);
        }
        StmtKind::Return(Some(e)) | StmtKind::Expr(e) => expr_tree(e, f),
        StmtKind::Emit { call, .. } => expr_tree(call, f),
        StmtKind::VarDecl { decls, value } => {
            for d in decls {
                if let Some(v) = &d.value {
                    expr_tree(v, f);
                }
            }
            if let Some(v) = value {
                expr_tree(v, f);
            }
        }
        StmtKind::Placeholder
        | StmtKind::Continue
        | StmtKind::Break
        | StmtKind::Return(None)
        | StmtKind::Throw
        | StmtKind::InlineAssembly => {}
    }
}

/// Every executable expression of the program: state variable initialisers,
/// modifier arguments and function and modifier bodies.
pub fn program_exprs<'a>(program: &'a Program, f: &mut dyn FnMut(&'a Expr)) {
    for contract in &program.contracts {
        for var in &contract.state_vars {
            if let Some(v) = &var.value {
                expr_tree(v, f);
            }
        }
        for func in &contract.functions {
            for inv in &func.modifiers {
                for arg in &inv.args {
                    expr_tree(arg, f);
                }
            }
            if let Some(body) = &func.body {
                block_exprs(body, f);
            }
        }
        for modifier in &contract.modifiers {
            block_exprs(&modifier.body, f);
        }
    }
}

/// Local variable declarations of a body, in source order.
pub fn block_decls<'a>(block: &'a Block, f: &mut dyn FnMut(&'a VarDecl)) {
    for stmt in &block.stmts {
        stmt_decls(stmt, f);
    }
}

pub fn stmt_decls<'a>(stmt: &'a Stmt, f: &mut dyn FnMut(&'a VarDecl)) {
    match &stmt.kind {
        StmtKind::Block(b) => block_decls(b, f),
        StmtKind::If {
            then, otherwise, ..
        } => {
            stmt_decls(then, f);
            if let Some(o) = otherwise {
                stmt_decls(o, f);
            }
        }
        StmtKind::While { body, .. } => stmt_decls(body, f),
        StmtKind::For { init, body, .. } => {
            if let Some(i) = init {
                stmt_decls(i, f);
            }
            stmt_decls(body, f);
        }
        StmtKind::VarDecl { decls, .. } => {
            for d in decls {
                f(d);
            }
        }
        StmtKind::Placeholder
        | StmtKind::Continue
        | StmtKind::Break
        | StmtKind::Return(_)
        | StmtKind::Throw
        | StmtKind::Emit { .. }
        | StmtKind::InlineAssembly
        | StmtKind::Expr(_) => {}
    }
}

/// Visits `expr` and then every sub-expression.
pub fn expr_tree<'a>(expr: &'a Expr, f: &mut dyn FnMut(&'a Expr)) {
    f(expr);
    match &expr.kind {
        ExprKind::Identifier { .. }
        | ExprKind::Literal(_)
        | ExprKind::ElementaryType(_)
        | ExprKind::New(_) => {}
        ExprKind::Unary { operand, .. } => expr_tree(operand, f),
        ExprKind::Binary { left, right, .. } => {
            expr_tree(left, f);
            expr_tree(right, f);
        }
        ExprKind::Assign { lhs, rhs, .. } => {
            expr_tree(lhs, f);
            expr_tree(rhs, f);
        }
        ExprKind::Conditional {
            cond,
            then,
            otherwise,
        } => {
            expr_tree(cond, f);
            expr_tree(then, f);
            expr_tree(otherwise, f);
        }
        ExprKind::Member { base, .. } => expr_tree(base, f),
        ExprKind::Index { base, index } => {
            expr_tree(base, f);
            if let Some(i) = index {
                expr_tree(i, f);
            }
        }
        ExprKind::Call { callee, args, .. } => {
            expr_tree(callee, f);
            for a in args {
                expr_tree(a, f);
            }
        }
        ExprKind::Tuple(items) => {
            for i in items {
                expr_tree(i, f);
            }
        }
    }
}

/// Visits `ty` and every nested type name (mapping keys/values, array bases).
pub fn type_tree<'a>(ty: &'a TypeName, f: &mut dyn FnMut(&'a TypeName)) {
    f(ty);
    match &ty.kind {
        TypeNameKind::Mapping { key, value } => {
            type_tree(key, f);
            type_tree(value, f);
        }
        TypeNameKind::Array { base } => type_tree(base, f),
        TypeNameKind::Elementary(_) | TypeNameKind::UserDefined { .. } | TypeNameKind::Function => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BinOp;
    use crate::build::AstBuilder;

    #[test]
    fn visits_nested_expressions_in_source_order() {
        let mut b = AstBuilder::new();
        let ty = b.uint(256);
        let x = b.var("x", ty);
        let lhs = b.ident(&x);
        let one = b.number(1);
        let (lhs_id, one_id) = (lhs.id, one.id);
        let sum = b.binary(lhs, BinOp::Add, one);
        let sum_id = sum.id;
        let stmt = b.expr_stmt(sum);
        let body = b.block(vec![stmt]);

        let mut seen = Vec::new();
        block_exprs(&body, &mut |e| seen.push(e.id));
        assert_eq!(seen, vec![sum_id, lhs_id, one_id]);
    }
}
