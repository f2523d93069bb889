#![forbid(unsafe_code)]

use std::fmt;

use crate::syntax::{
    CBlock, CExpr, CForInit, CFunction, CParam, CProgram, CStmt, CStruct, CVarDecl,
};

const INDENT: &str = "  ";

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

pub(crate) fn escape_c_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            _ => out.push(ch),
        }
    }
    out
}

// ---- expressions ----

fn emit_expr(out: &mut String, e: &CExpr) {
    match e {
        CExpr::Id(name) => out.push_str(name),
        CExpr::Int(n) => out.push_str(&n.to_string()),
        CExpr::Lit(text) => out.push_str(text),
        CExpr::Str(s) => {
            out.push('"');
            out.push_str(&escape_c_string(s));
            out.push('"');
        }
        CExpr::Call { callee, args } => {
            out.push_str(callee);
            out.push('(');
            for (i, a) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                emit_expr(out, a);
            }
            out.push(')');
        }
        CExpr::Unary { op, prefix, expr } => {
            if *prefix {
                out.push_str(op);
                emit_wrapped(out, expr);
            } else {
                emit_wrapped(out, expr);
                out.push_str(op);
            }
        }
        CExpr::Binary { op, left, right } => {
            emit_wrapped(out, left);
            out.push_str(op);
            emit_wrapped(out, right);
        }
        CExpr::Assign { op, lhs, rhs } => {
            emit_wrapped(out, lhs);
            if let Some(op) = op {
                out.push_str(op);
            }
            out.push('=');
            emit_wrapped(out, rhs);
        }
        CExpr::Member { base, field, arrow } => {
            emit_atom(out, base);
            out.push_str(if *arrow { "->" } else { "." });
            out.push_str(field);
        }
        CExpr::AddrOf(base) => {
            out.push('&');
            emit_atom(out, base);
        }
        CExpr::Cond {
            cond,
            then,
            otherwise,
        } => {
            emit_wrapped(out, cond);
            out.push('?');
            emit_wrapped(out, then);
            out.push(':');
            emit_wrapped(out, otherwise);
        }
    }
}

/// Operands of operators are always parenthesised.
fn emit_wrapped(out: &mut String, e: &CExpr) {
    out.push('(');
    emit_expr(out, e);
    out.push(')');
}

/// Postfix-safe operands (member bases, address-of) skip the parentheses.
fn emit_atom(out: &mut String, e: &CExpr) {
    match e {
        CExpr::Id(_) | CExpr::Member { .. } | CExpr::Call { .. } => emit_expr(out, e),
        _ => emit_wrapped(out, e),
    }
}

// ---- statements ----

fn emit_decl(out: &mut String, d: &CVarDecl) {
    out.push_str(&d.ty);
    out.push(' ');
    if d.pointer {
        out.push('*');
    }
    out.push_str(&d.name);
    if let Some(init) = &d.init {
        out.push_str(" = ");
        emit_expr(out, init);
    }
}

fn emit_block(out: &mut String, block: &CBlock, depth: usize) {
    out.push_str("{\n");
    for s in &block.stmts {
        emit_stmt(out, s, depth + 1);
    }
    indent(out, depth);
    out.push('}');
}

fn emit_nested(out: &mut String, block: &CBlock, depth: usize) {
    indent(out, depth);
    emit_block(out, block, depth);
    out.push('\n');
}

fn emit_for_init(out: &mut String, init: &CForInit) {
    match init {
        CForInit::Decl(d) => emit_decl(out, d),
        CForInit::Expr(e) => emit_expr(out, e),
    }
}

fn emit_stmt(out: &mut String, stmt: &CStmt, depth: usize) {
    match stmt {
        CStmt::Expr(e) => {
            indent(out, depth);
            emit_expr(out, e);
            out.push_str(";\n");
        }
        CStmt::Decl(d) => {
            indent(out, depth);
            emit_decl(out, d);
            out.push_str(";\n");
        }
        CStmt::Block(b) => emit_nested(out, b, depth),
        CStmt::If {
            cond,
            then,
            otherwise,
        } => {
            indent(out, depth);
            out.push_str("if (");
            emit_expr(out, cond);
            out.push_str(")\n");
            emit_nested(out, then, depth);
            if let Some(o) = otherwise {
                indent(out, depth);
                out.push_str("else\n");
                emit_nested(out, o, depth);
            }
        }
        CStmt::While { cond, body } => {
            indent(out, depth);
            out.push_str("while (");
            emit_expr(out, cond);
            out.push_str(")\n");
            emit_nested(out, body, depth);
        }
        CStmt::DoWhile { body, cond } => {
            indent(out, depth);
            out.push_str("do\n");
            emit_nested(out, body, depth);
            indent(out, depth);
            out.push_str("while (");
            emit_expr(out, cond);
            out.push_str(");\n");
        }
        CStmt::For {
            init,
            cond,
            step,
            body,
        } => {
            indent(out, depth);
            out.push_str("for (");
            if let Some(i) = init {
                emit_for_init(out, i);
            }
            out.push_str("; ");
            if let Some(c) = cond {
                emit_expr(out, c);
            }
            out.push_str("; ");
            if let Some(s) = step {
                emit_expr(out, s);
            }
            out.push_str(")\n");
            emit_nested(out, body, depth);
        }
        CStmt::Switch {
            scrutinee,
            cases,
            default,
        } => {
            indent(out, depth);
            out.push_str("switch (");
            emit_expr(out, scrutinee);
            out.push_str(")\n");
            indent(out, depth);
            out.push_str("{\n");
            for (label, body) in cases {
                indent(out, depth + 1);
                out.push_str(&format!("case {label}:\n"));
                emit_nested(out, body, depth + 1);
            }
            indent(out, depth + 1);
            out.push_str("default:\n");
            emit_nested(out, default, depth + 1);
            indent(out, depth);
            out.push_str("}\n");
        }
        CStmt::Return(value) => {
            indent(out, depth);
            out.push_str("return");
            if let Some(v) = value {
                out.push(' ');
                emit_expr(out, v);
            }
            out.push_str(";\n");
        }
        CStmt::Break => {
            indent(out, depth);
            out.push_str("break;\n");
        }
        CStmt::Continue => {
            indent(out, depth);
            out.push_str("continue;\n");
        }
    }
}

// ---- top-level items ----

fn emit_param(out: &mut String, p: &CParam) {
    out.push_str(&p.ty);
    out.push(' ');
    if p.pointer {
        out.push('*');
    }
    out.push_str(&p.name);
}

fn emit_signature(out: &mut String, f: &CFunction) {
    out.push_str(&f.ret);
    out.push(' ');
    out.push_str(&f.name);
    out.push('(');
    if f.params.is_empty() {
        out.push_str("void");
    }
    for (i, p) in f.params.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        emit_param(out, p);
    }
    out.push(')');
}

fn emit_struct(out: &mut String, s: &CStruct) {
    out.push_str("struct ");
    out.push_str(&s.name);
    out.push_str("\n{\n");
    for field in &s.fields {
        indent(out, 1);
        emit_decl(out, field);
        out.push_str(";\n");
    }
    out.push_str("};\n");
}

fn emit_program(out: &mut String, p: &CProgram) {
    for inc in &p.includes {
        out.push_str(&format!("#include \"{}\"\n", escape_c_string(inc)));
    }
    if !p.includes.is_empty() {
        out.push('\n');
    }

    for s in &p.structs {
        out.push_str(&format!("struct {};\n", s.name));
    }
    if !p.structs.is_empty() {
        out.push('\n');
    }
    for s in &p.structs {
        emit_struct(out, s);
        out.push('\n');
    }

    for g in &p.globals {
        emit_decl(out, g);
        out.push_str(";\n");
    }
    if !p.globals.is_empty() {
        out.push('\n');
    }

    for f in &p.functions {
        emit_signature(out, f);
        out.push_str(";\n");
    }
    for f in &p.functions {
        out.push('\n');
        emit_signature(out, f);
        out.push('\n');
        emit_block(out, &f.body, 0);
        out.push('\n');
    }
}

impl fmt::Display for CExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        emit_expr(&mut out, self);
        f.write_str(&out)
    }
}

impl fmt::Display for CBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        emit_block(&mut out, self, 0);
        f.write_str(&out)
    }
}

impl fmt::Display for CStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        emit_stmt(&mut out, self, 0);
        f.write_str(&out)
    }
}

impl fmt::Display for CFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        emit_signature(&mut out, self);
        out.push('\n');
        emit_block(&mut out, &self.body, 0);
        f.write_str(&out)
    }
}

impl fmt::Display for CStruct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        emit_struct(&mut out, self);
        f.write_str(&out)
    }
}

impl fmt::Display for CProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        emit_program(&mut out, self);
        f.write_str(&out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_block_keeps_balanced_braces() {
        assert_eq!(CBlock::default().to_string(), "{\n}");
    }

    #[test]
    fn operators_parenthesise_their_operands() {
        let cond = CExpr::binary(CExpr::id("self").arrow("d_a"), "==", CExpr::Int(1));
        assert_eq!(cond.to_string(), "(self->d_a)==(1)");

        let inc = CExpr::prefix("++", CExpr::id("i"));
        assert_eq!(inc.to_string(), "++(i)");

        let set = CExpr::assign(CExpr::id("a"), CExpr::Int(5));
        assert_eq!(set.to_string(), "(a)=(5)");
    }

    #[test]
    fn prints_nested_control_flow_with_indentation() {
        let then = CBlock::new(vec![CStmt::Break]);
        let body = CBlock::new(vec![CStmt::If {
            cond: CExpr::id("c"),
            then,
            otherwise: Some(CBlock::default()),
        }]);
        let block = CBlock::new(vec![CStmt::While {
            cond: CExpr::Int(1),
            body,
        }]);
        let expected = "{\n  while (1)\n  {\n    if (c)\n    {\n      break;\n    }\n    else\n    {\n    }\n  }\n}";
        assert_eq!(block.to_string(), expected);
    }

    #[test]
    fn for_header_parts_are_optional() {
        let init = CVarDecl::new("sol_int256_t", "i").with_init(CExpr::Int(0));
        let stmt = CStmt::For {
            init: Some(CForInit::Decl(init)),
            cond: None,
            step: Some(CExpr::prefix("++", CExpr::id("i"))),
            body: CBlock::default(),
        };
        assert_eq!(
            stmt.to_string(),
            "for (sol_int256_t i = 0; ; ++(i))\n{\n}\n"
        );
    }

    #[test]
    fn address_of_member_path_needs_no_parentheses() {
        let e = CExpr::id("contract_0").dot("d_child").addr_of();
        assert_eq!(e.to_string(), "&contract_0.d_child");
    }

    #[test]
    fn string_literals_are_escaped() {
        let e = CExpr::call("smartace_log", vec![CExpr::str("say \"hi\"")]);
        assert_eq!(e.to_string(), "smartace_log(\"say \\\"hi\\\"\")");
    }
}
