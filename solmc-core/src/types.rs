#![forbid(unsafe_code)]

//! Whole-program type and name resolution.
//!
//! Resolution runs in three passes. Each pass reads the completed table of
//! the previous one and produces a new table that owns it, so a pass can
//! never observe bindings that have not been computed yet:
//!
//! 1. [`NominalTable`]: contracts, structs and enums get their record names.
//! 2. [`SignatureTable`]: struct members, state variables, parameters and
//!    return values get bindings; functions and modifiers get target names.
//! 3. [`TypeTable`]: every local declaration and every expression inside an
//!    executable body gets a binding, and identifiers get a storage flag.

use std::collections::{HashMap, HashSet};

use solmc_ast::{
    BinOp, Block, ContractDef, ContractKind, Expr, ExprKind, Literal, NodeId, Program,
    SourceType, Stmt, StmtKind, TypeName, TypeNameKind, UnaryOp, VarDecl,
};
use solmc_backend_c::CExpr;
use tracing::debug;

use crate::call_state::{CALL_STATE_STRUCT, CallStateField, magic_kind};
use crate::error::{Result, TranslateError};
use crate::names;
use crate::scalar::Scalar;
use crate::summary::MappingSummary;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Contract,
    Struct,
    Mapping,
    CallState,
}

/// Target representation of a declaration, type name or expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeBinding {
    Scalar(Scalar),
    Record { kind: RecordKind, name: String },
    Void,
}

impl TypeBinding {
    pub fn record(kind: RecordKind, name: impl Into<String>) -> Self {
        TypeBinding::Record {
            kind,
            name: name.into(),
        }
    }

    pub fn target_type(&self) -> String {
        match self {
            TypeBinding::Scalar(s) => s.ctype(),
            TypeBinding::Record { name, .. } => format!("struct {name}"),
            TypeBinding::Void => "void".to_string(),
        }
    }

    pub fn target_name(&self) -> Option<&str> {
        match self {
            TypeBinding::Record { name, .. } => Some(name),
            TypeBinding::Scalar(_) | TypeBinding::Void => None,
        }
    }

    pub fn is_simple(&self) -> bool {
        matches!(self, TypeBinding::Scalar(_))
    }

    pub fn scalar(&self) -> Option<Scalar> {
        match self {
            TypeBinding::Scalar(s) => Some(*s),
            _ => None,
        }
    }

    pub fn record_kind(&self) -> Option<RecordKind> {
        match self {
            TypeBinding::Record { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_contract(&self) -> bool {
        self.record_kind() == Some(RecordKind::Contract)
    }

    /// Zero value. Contracts and the call state are initialised in place and
    /// have none.
    pub fn zero(&self) -> Option<CExpr> {
        match self {
            TypeBinding::Scalar(s) => Some(s.zero()),
            TypeBinding::Record {
                kind: RecordKind::Struct | RecordKind::Mapping,
                name,
            } => Some(CExpr::call(names::init_zero(name), Vec::new())),
            TypeBinding::Record { .. } | TypeBinding::Void => None,
        }
    }

    pub fn nondet(&self, address_count: u64, msg: &str) -> Option<CExpr> {
        match self {
            TypeBinding::Scalar(s) => Some(s.nondet(address_count, msg)),
            TypeBinding::Record {
                kind: RecordKind::Struct | RecordKind::Mapping,
                name,
            } => Some(CExpr::call(names::nondet(name), Vec::new())),
            TypeBinding::Record { .. } | TypeBinding::Void => None,
        }
    }
}

/// Runs all three passes.
pub fn resolve(
    program: &Program,
    maps: &dyn MappingSummary,
    address_count: u64,
) -> Result<TypeTable> {
    let nominal = NominalTable::build(program)?;
    let signatures = SignatureTable::build(program, nominal, maps)?;
    TypeTable::build(program, signatures, maps, address_count)
}

// ---- pass 1 ----

#[derive(Debug, Default)]
pub struct NominalTable {
    bindings: HashMap<NodeId, TypeBinding>,
    ordinals: HashMap<NodeId, u64>,
    interfaces: HashSet<NodeId>,
}

impl NominalTable {
    pub fn build(program: &Program) -> Result<Self> {
        let mut table = NominalTable::default();
        for contract in &program.contracts {
            if contract.kind == ContractKind::Interface {
                table.interfaces.insert(contract.id);
                continue;
            }
            table.bindings.insert(
                contract.id,
                TypeBinding::record(RecordKind::Contract, contract.name.as_str()),
            );
            for strukt in &contract.structs {
                table.bindings.insert(
                    strukt.id,
                    TypeBinding::record(RecordKind::Struct, names::struct_record(contract, strukt)),
                );
            }
            for enumeration in &contract.enums {
                table
                    .bindings
                    .insert(enumeration.id, TypeBinding::Scalar(Scalar::UINT8));
                if enumeration.values.len() > 256 {
                    return Err(TranslateError::unsupported(
                        format!("enum `{}` has more than 256 values", enumeration.name),
                        enumeration.span,
                    ));
                }
                for (ordinal, value) in enumeration.values.iter().enumerate() {
                    table
                        .bindings
                        .insert(value.id, TypeBinding::Scalar(Scalar::UINT8));
                    table.ordinals.insert(value.id, ordinal as u64);
                }
            }
        }
        debug!(records = table.bindings.len(), "nominal types resolved");
        Ok(table)
    }

    pub fn get(&self, id: NodeId) -> Option<&TypeBinding> {
        self.bindings.get(&id)
    }
}

/// Resolves a type name and records a binding for it and every type name
/// nested in it.
fn resolve_type_name(
    ty: &TypeName,
    nominal: &NominalTable,
    maps: &dyn MappingSummary,
    out: &mut HashMap<NodeId, TypeBinding>,
) -> Result<TypeBinding> {
    let binding = match &ty.kind {
        TypeNameKind::Elementary(e) => TypeBinding::Scalar(Scalar::from_elementary(*e)),
        TypeNameKind::UserDefined { name, referenced } => {
            if nominal.interfaces.contains(referenced) {
                return Err(TranslateError::unsupported(
                    format!("values of interface type `{name}`"),
                    ty.span,
                ));
            }
            nominal
                .get(*referenced)
                .cloned()
                .ok_or(TranslateError::missing(*referenced, "nominal type"))?
        }
        TypeNameKind::Mapping { .. } => {
            let record = maps
                .query(ty.id)
                .ok_or(TranslateError::missing(ty.id, "mapping record"))?;
            for key in &record.key_types {
                resolve_type_name(key, nominal, maps, out)?;
            }
            resolve_type_name(&record.value_type, nominal, maps, out)?;
            TypeBinding::record(RecordKind::Mapping, record.name.as_str())
        }
        TypeNameKind::Function => {
            return Err(TranslateError::unsupported("function types", ty.span));
        }
        TypeNameKind::Array { .. } => {
            return Err(TranslateError::unsupported("array types", ty.span));
        }
    };
    out.insert(ty.id, binding.clone());
    Ok(binding)
}

fn declared_type(decl: &VarDecl) -> Result<&TypeName> {
    decl.ty.as_ref().ok_or_else(|| {
        TranslateError::unsupported(format!("untyped declaration `{}`", decl.name), decl.span)
    })
}

// ---- pass 2 ----

#[derive(Debug)]
pub struct SignatureTable {
    nominal: NominalTable,
    bindings: HashMap<NodeId, TypeBinding>,
    storage: HashMap<NodeId, bool>,
    function_names: HashMap<NodeId, String>,
}

impl SignatureTable {
    pub fn build(
        program: &Program,
        nominal: NominalTable,
        maps: &dyn MappingSummary,
    ) -> Result<Self> {
        let mut bindings = HashMap::new();
        let mut storage = HashMap::new();
        let mut function_names = HashMap::new();

        for contract in program.contracts.iter().filter(|c| !c.is_interface()) {
            for strukt in &contract.structs {
                for member in &strukt.members {
                    let b = resolve_type_name(declared_type(member)?, &nominal, maps, &mut bindings)?;
                    bindings.insert(member.id, b);
                }
            }

            for var in &contract.state_vars {
                let b = resolve_type_name(declared_type(var)?, &nominal, maps, &mut bindings)?;
                bindings.insert(var.id, b);
                storage.insert(var.id, true);
            }

            let mut seen = HashSet::new();
            for func in &contract.functions {
                if !func.is_constructor() && !seen.insert(func.name.as_str()) {
                    return Err(TranslateError::unsupported(
                        format!("overloaded function `{}.{}`", contract.name, func.name),
                        func.span,
                    ));
                }
                for param in func.params.params.iter().chain(&func.returns.params) {
                    let b = resolve_type_name(declared_type(param)?, &nominal, maps, &mut bindings)?;
                    bindings.insert(param.id, b);
                    storage.insert(param.id, param.is_storage());
                }
                let ret = match func.returns.params.as_slice() {
                    [] => TypeBinding::Void,
                    [single] => bindings
                        .get(&single.id)
                        .cloned()
                        .ok_or(TranslateError::missing(single.id, "return type"))?,
                    _ => {
                        return Err(TranslateError::unsupported(
                            format!(
                                "multiple return values of `{}.{}`",
                                contract.name, func.name
                            ),
                            func.span,
                        ));
                    }
                };
                bindings.insert(func.id, ret);
                function_names.insert(func.id, names::method(contract, func, 0));
            }

            for modifier in &contract.modifiers {
                for param in &modifier.params.params {
                    let b = resolve_type_name(declared_type(param)?, &nominal, maps, &mut bindings)?;
                    bindings.insert(param.id, b);
                    storage.insert(param.id, param.is_storage());
                }
                bindings.insert(modifier.id, TypeBinding::Void);
                function_names.insert(modifier.id, names::modifier(contract, modifier));
            }
        }

        debug!(
            bindings = bindings.len(),
            functions = function_names.len(),
            "signatures resolved"
        );
        Ok(Self {
            nominal,
            bindings,
            storage,
            function_names,
        })
    }

    pub fn get(&self, id: NodeId) -> Option<&TypeBinding> {
        self.bindings.get(&id).or_else(|| self.nominal.get(id))
    }
}

// ---- pass 3 ----

/// The completed, immutable result of type resolution.
#[derive(Debug)]
pub struct TypeTable {
    signatures: SignatureTable,
    bindings: HashMap<NodeId, TypeBinding>,
    storage: HashMap<NodeId, bool>,
    address_count: u64,
}

impl TypeTable {
    pub fn build(
        program: &Program,
        signatures: SignatureTable,
        maps: &dyn MappingSummary,
        address_count: u64,
    ) -> Result<Self> {
        let mut bindings = HashMap::new();
        let mut storage = HashMap::new();

        for contract in program.contracts.iter().filter(|c| !c.is_interface()) {
            let mut typer = BodyTyper {
                contract,
                prior: &signatures,
                maps,
                bindings: &mut bindings,
                storage: &mut storage,
            };
            for var in &contract.state_vars {
                if let Some(value) = &var.value {
                    typer.expr(value)?;
                }
            }
            for func in &contract.functions {
                for inv in &func.modifiers {
                    for arg in &inv.args {
                        typer.expr(arg)?;
                    }
                }
                if let Some(body) = &func.body {
                    typer.block(body)?;
                }
            }
            for modifier in &contract.modifiers {
                typer.block(&modifier.body)?;
            }
        }

        debug!(bindings = bindings.len(), "expression types resolved");
        Ok(Self {
            signatures,
            bindings,
            storage,
            address_count,
        })
    }

    pub fn binding(&self, node: NodeId) -> Result<&TypeBinding> {
        self.bindings
            .get(&node)
            .or_else(|| self.signatures.get(node))
            .ok_or(TranslateError::missing(node, "type binding"))
    }

    pub fn type_of(&self, node: NodeId) -> Result<String> {
        Ok(self.binding(node)?.target_type())
    }

    pub fn name_of(&self, node: NodeId) -> Result<String> {
        self.binding(node)?
            .target_name()
            .map(str::to_string)
            .ok_or(TranslateError::missing(node, "target name"))
    }

    /// Whether an identifier or declaration denotes persistent storage.
    pub fn is_storage(&self, node: NodeId) -> bool {
        self.storage
            .get(&node)
            .or_else(|| self.signatures.storage.get(&node))
            .copied()
            .unwrap_or(false)
    }

    pub fn enum_ordinal(&self, value: NodeId) -> Option<u64> {
        self.signatures.nominal.ordinals.get(&value).copied()
    }

    pub fn function_name(&self, func: NodeId) -> Result<&str> {
        self.signatures
            .function_names
            .get(&func)
            .map(String::as_str)
            .ok_or(TranslateError::missing(func, "function name"))
    }

    pub fn address_count(&self) -> u64 {
        self.address_count
    }

    pub fn initial_value(&self, ty: &TypeName) -> Result<CExpr> {
        let binding = self.binding(ty.id)?;
        binding.zero().ok_or_else(|| {
            TranslateError::unsupported(
                format!("no initial value for `{}`", binding.target_type()),
                ty.span,
            )
        })
    }

    pub fn nondet_value(&self, ty: &TypeName, msg: &str) -> Result<CExpr> {
        let binding = self.binding(ty.id)?;
        binding.nondet(self.address_count, msg).ok_or_else(|| {
            TranslateError::unsupported(
                format!("no nondeterministic value for `{}`", binding.target_type()),
                ty.span,
            )
        })
    }

    /// Zero value of the type bound to any node.
    pub fn initial_value_of(&self, node: NodeId) -> Result<CExpr> {
        let binding = self.binding(node)?;
        binding.zero().ok_or_else(|| {
            TranslateError::unsupported_here(format!(
                "no initial value for `{}`",
                binding.target_type()
            ))
        })
    }

    pub fn nondet_value_of(&self, node: NodeId, msg: &str) -> Result<CExpr> {
        let binding = self.binding(node)?;
        binding.nondet(self.address_count, msg).ok_or_else(|| {
            TranslateError::unsupported_here(format!(
                "no nondeterministic value for `{}`",
                binding.target_type()
            ))
        })
    }
}

/// Root expression and number of index layers of an index chain.
pub(crate) fn index_chain(expr: &Expr) -> (&Expr, usize) {
    let mut cur = expr;
    let mut depth = 0;
    while let ExprKind::Index { base, .. } = &cur.kind {
        cur = base.as_ref();
        depth += 1;
    }
    (cur, depth)
}

struct BodyTyper<'t> {
    contract: &'t ContractDef,
    prior: &'t SignatureTable,
    maps: &'t dyn MappingSummary,
    bindings: &'t mut HashMap<NodeId, TypeBinding>,
    storage: &'t mut HashMap<NodeId, bool>,
}

impl BodyTyper<'_> {
    fn lookup(&self, id: NodeId) -> Option<TypeBinding> {
        self.bindings
            .get(&id)
            .or_else(|| self.prior.get(id))
            .cloned()
    }

    fn decl_is_storage(&self, id: NodeId) -> bool {
        self.storage
            .get(&id)
            .or_else(|| self.prior.storage.get(&id))
            .copied()
            .unwrap_or(false)
    }

    fn type_name(&mut self, ty: &TypeName) -> Result<TypeBinding> {
        resolve_type_name(ty, &self.prior.nominal, self.maps, self.bindings)
    }

    fn block(&mut self, block: &Block) -> Result<()> {
        for stmt in &block.stmts {
            self.stmt(stmt)?;
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match &stmt.kind {
            StmtKind::Block(b) => self.block(b),
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                self.expr(cond)?;
                self.stmt(then)?;
                if let Some(o) = otherwise {
                    self.stmt(o)?;
                }
                Ok(())
            }
            StmtKind::While { cond, body, .. } => {
                self.expr(cond)?;
                self.stmt(body)
            }
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                if let Some(i) = init {
                    self.stmt(i)?;
                }
                if let Some(c) = cond {
                    self.expr(c)?;
                }
                if let Some(s) = step {
                    self.expr(s)?;
                }
                self.stmt(body)
            }
            StmtKind::Return(Some(e)) | StmtKind::Expr(e) => self.expr(e).map(|_| ()),
            StmtKind::VarDecl { decls, value } => {
                let value_binding = match value {
                    Some(v) => Some(self.expr(v)?),
                    None => None,
                };
                for decl in decls {
                    let init = match &decl.value {
                        Some(v) => Some(self.expr(v)?),
                        None => value_binding.clone(),
                    };
                    let binding = match (&decl.ty, init) {
                        (Some(ty), _) => self.type_name(ty)?,
                        (None, Some(b)) if decls.len() == 1 => b,
                        (None, _) => {
                            return Err(TranslateError::unsupported(
                                format!("cannot infer the type of `{}`", decl.name),
                                decl.span,
                            ));
                        }
                    };
                    self.bindings.insert(decl.id, binding);
                    self.storage.insert(decl.id, decl.is_storage());
                }
                Ok(())
            }
            // Events have no effect on the model beyond a log marker.
            StmtKind::Emit { .. } => Ok(()),
            StmtKind::Placeholder
            | StmtKind::Continue
            | StmtKind::Break
            | StmtKind::Return(None)
            | StmtKind::Throw
            | StmtKind::InlineAssembly => Ok(()),
        }
    }

    fn expr(&mut self, expr: &Expr) -> Result<TypeBinding> {
        let binding = self.expr_binding(expr)?;
        self.bindings.insert(expr.id, binding.clone());
        Ok(binding)
    }

    fn expr_binding(&mut self, expr: &Expr) -> Result<TypeBinding> {
        match &expr.kind {
            ExprKind::Identifier {
                name,
                referenced: Some(decl),
            } => {
                let binding = self.lookup(*decl).ok_or_else(|| {
                    TranslateError::unsupported(
                        format!("`{name}` refers to a declaration outside the model"),
                        expr.span,
                    )
                })?;
                let storage = self.decl_is_storage(*decl);
                self.storage.insert(expr.id, storage);
                Ok(binding)
            }
            ExprKind::Identifier {
                name,
                referenced: None,
            } => self.builtin(name, expr),
            ExprKind::Literal(Literal::Bool(_)) => Ok(TypeBinding::Scalar(Scalar::Bool)),
            ExprKind::Literal(Literal::Number(_)) => Ok(TypeBinding::Scalar(match expr.ty {
                SourceType::Elementary(e) => Scalar::from_elementary(e),
                _ => Scalar::UINT256,
            })),
            ExprKind::Literal(Literal::String(_)) => Ok(TypeBinding::Scalar(Scalar::UINT256)),
            ExprKind::Unary { op, operand, .. } => {
                let inner = self.expr(operand)?;
                Ok(match op {
                    UnaryOp::Not => TypeBinding::Scalar(Scalar::Bool),
                    UnaryOp::Delete => TypeBinding::Void,
                    _ => inner,
                })
            }
            ExprKind::Binary { op, left, right } => {
                let lhs = self.expr(left)?;
                self.expr(right)?;
                Ok(match op {
                    BinOp::Eq
                    | BinOp::Ne
                    | BinOp::Lt
                    | BinOp::Gt
                    | BinOp::Le
                    | BinOp::Ge
                    | BinOp::And
                    | BinOp::Or => TypeBinding::Scalar(Scalar::Bool),
                    _ => match expr.ty {
                        SourceType::Elementary(e) => TypeBinding::Scalar(Scalar::from_elementary(e)),
                        _ => lhs,
                    },
                })
            }
            ExprKind::Assign { lhs, rhs, .. } => {
                let target = self.expr(lhs)?;
                self.expr(rhs)?;
                Ok(target)
            }
            ExprKind::Conditional {
                cond,
                then,
                otherwise,
            } => {
                self.expr(cond)?;
                let b = self.expr(then)?;
                self.expr(otherwise)?;
                Ok(b)
            }
            ExprKind::Member {
                base,
                member,
                referenced,
            } => self.member(expr, base, member, *referenced),
            ExprKind::Index { base, index } => {
                self.expr(base)?;
                let Some(index) = index else {
                    return Err(TranslateError::unsupported("array type expressions", expr.span));
                };
                self.expr(index)?;
                self.index(expr)
            }
            ExprKind::Call { callee, args, .. } => {
                let callee_binding = match &callee.kind {
                    ExprKind::New(ty) => {
                        let b = self.type_name(ty)?;
                        self.bindings.insert(callee.id, b.clone());
                        b
                    }
                    _ => self.expr(callee)?,
                };
                for arg in args {
                    self.expr(arg)?;
                }
                Ok(callee_binding)
            }
            ExprKind::Tuple(items) => {
                let mut bound = Vec::with_capacity(items.len());
                for item in items {
                    bound.push(self.expr(item)?);
                }
                Ok(match bound.as_slice() {
                    [single] => single.clone(),
                    _ => TypeBinding::Void,
                })
            }
            ExprKind::ElementaryType(e) => Ok(TypeBinding::Scalar(Scalar::from_elementary(*e))),
            ExprKind::New(ty) => self.type_name(ty),
        }
    }

    fn builtin(&mut self, name: &str, expr: &Expr) -> Result<TypeBinding> {
        match name {
            "this" => {
                self.storage.insert(expr.id, true);
                self.lookup(self.contract.id)
                    .ok_or(TranslateError::missing(self.contract.id, "contract record"))
            }
            "msg" | "block" | "tx" => {
                Ok(TypeBinding::record(RecordKind::CallState, CALL_STATE_STRUCT))
            }
            "now" => Ok(TypeBinding::Scalar(Scalar::UINT256)),
            "require" | "assert" | "revert" => Ok(TypeBinding::Void),
            other => Err(TranslateError::unsupported(
                format!("builtin `{other}`"),
                expr.span,
            )),
        }
    }

    fn member(
        &mut self,
        expr: &Expr,
        base: &Expr,
        member: &str,
        referenced: Option<NodeId>,
    ) -> Result<TypeBinding> {
        self.expr(base)?;
        if let Some(decl) = referenced {
            return self.lookup(decl).ok_or_else(|| {
                TranslateError::unsupported(
                    format!("member `{member}` refers to a declaration outside the model"),
                    expr.span,
                )
            });
        }
        if let Some(kind) = magic_kind(base) {
            return CallStateField::from_magic(kind, member)
                .map(|f| TypeBinding::Scalar(f.scalar()))
                .ok_or_else(|| {
                    TranslateError::unsupported(format!("call-state member `{member}`"), expr.span)
                });
        }
        match member {
            "balance" => Ok(TypeBinding::Scalar(Scalar::UINT256)),
            "transfer" | "send" => Ok(TypeBinding::Void),
            _ => Err(TranslateError::unsupported(
                format!("member `{member}`"),
                expr.span,
            )),
        }
    }

    fn index(&mut self, expr: &Expr) -> Result<TypeBinding> {
        let (root, depth) = index_chain(expr);
        let maps = self.maps;
        let record = root
            .referenced()
            .and_then(|decl| maps.resolve(decl))
            .ok_or_else(|| {
                TranslateError::unsupported("index access on a value that is not a mapping", expr.span)
            })?;
        let keys = record.key_types.len();
        if depth < keys {
            Ok(TypeBinding::record(RecordKind::Mapping, record.name.as_str()))
        } else if depth == keys {
            let value = record.value_type.clone();
            self.type_name(&value)
        } else {
            Err(TranslateError::unsupported(
                format!("index access into the value of `{}`", record.name),
                expr.span,
            ))
        }
    }
}
