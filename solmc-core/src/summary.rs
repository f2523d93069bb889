#![forbid(unsafe_code)]

//! Mapping flattening, consumed by the resolver through [`MappingSummary`].

use std::collections::{BTreeSet, HashMap};

use solmc_ast::walk::{block_decls, program_exprs};
use solmc_ast::{CallKind, ElementaryType, Expr, ExprKind, NodeId, Program, TypeName, TypeNameKind, VarDecl};
use solmc_backend_c::{CBlock, CExpr, CFunction, CParam, CStmt, CStruct, CVarDecl};
use tracing::debug;

use crate::error::Result;
use crate::names;
use crate::types::TypeTable;

/// A mapping flattened into a bounded record.
#[derive(Clone, Debug, PartialEq)]
pub struct MapRecord {
    pub name: String,
    /// Outermost key first.
    pub key_types: Vec<TypeName>,
    pub value_type: TypeName,
}

/// C definitions a summary contributes to the model.
#[derive(Clone, Debug, Default)]
pub struct RecordDefs {
    pub structs: Vec<CStruct>,
    pub functions: Vec<CFunction>,
}

pub trait MappingSummary: Sync {
    /// Record of a mapping type name.
    fn query(&self, mapping: NodeId) -> Option<&MapRecord>;

    /// Record of a mapping-typed declaration.
    fn resolve(&self, decl: NodeId) -> Option<&MapRecord>;

    /// Every address constant (`address(N)`) in the program, ascending.
    fn address_literals(&self) -> &[u64];

    /// Struct layouts and `Read_`/`Write_`/`Init_0_`/`ND_` helpers.
    fn definitions(&self, types: &TypeTable) -> Result<RecordDefs>;
}

/// One record per distinct mapping shape, holding as many entries as the
/// model has addresses. Writes past capacity prune the execution.
#[derive(Debug, Default)]
pub struct FlatMappingSummary {
    records: Vec<MapRecord>,
    by_type: HashMap<NodeId, usize>,
    by_decl: HashMap<NodeId, usize>,
    shapes: HashMap<String, usize>,
    literals: Vec<u64>,
}

/// `N` of an `address(N)` conversion.
pub fn address_literal(expr: &Expr) -> Option<u64> {
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
        [arg] => match &arg.kind {
            ExprKind::Literal(lit) => lit.as_u64(),
            _ => None,
        },
        _ => None,
    }
}

fn shape(ty: &TypeName) -> String {
    match &ty.kind {
        TypeNameKind::Elementary(e) => format!("{e:?}"),
        TypeNameKind::UserDefined { referenced, .. } => format!("U{}", referenced.0),
        TypeNameKind::Mapping { key, value } => format!("M({},{})", shape(key), shape(value)),
        TypeNameKind::Function => "F".to_string(),
        TypeNameKind::Array { base } => format!("A({})", shape(base)),
    }
}

impl FlatMappingSummary {
    pub fn build(program: &Program) -> Self {
        let mut summary = Self::default();
        for contract in program.contracts.iter().filter(|c| !c.is_interface()) {
            for strukt in &contract.structs {
                for member in &strukt.members {
                    summary.add(member);
                }
            }
            for var in &contract.state_vars {
                summary.add(var);
            }
            for func in &contract.functions {
                for param in func.params.params.iter().chain(&func.returns.params) {
                    summary.add(param);
                }
                if let Some(body) = &func.body {
                    block_decls(body, &mut |d| summary.add(d));
                }
            }
            for modifier in &contract.modifiers {
                for param in &modifier.params.params {
                    summary.add(param);
                }
                block_decls(&modifier.body, &mut |d| summary.add(d));
            }
        }

        let mut literals = BTreeSet::new();
        program_exprs(program, &mut |e| {
            if let Some(value) = address_literal(e) {
                literals.insert(value);
            }
        });
        summary.literals = literals.into_iter().collect();

        debug!(
            records = summary.records.len(),
            literals = summary.literals.len(),
            "mappings flattened"
        );
        summary
    }

    fn add(&mut self, decl: &VarDecl) {
        let Some(ty) = &decl.ty else { return };
        let TypeNameKind::Mapping { .. } = ty.kind else {
            return;
        };

        let mut key_types = Vec::new();
        let mut cur = ty;
        while let TypeNameKind::Mapping { key, value } = &cur.kind {
            key_types.push((**key).clone());
            cur = value.as_ref();
        }

        let key = shape(ty);
        let index = match self.shapes.get(&key).copied() {
            Some(index) => index,
            None => {
                let index = self.records.len();
                self.records.push(MapRecord {
                    name: format!("Map_{}", index + 1),
                    key_types,
                    value_type: cur.clone(),
                });
                self.shapes.insert(key, index);
                index
            }
        };
        self.by_type.insert(ty.id, index);
        self.by_decl.insert(decl.id, index);
    }

    pub fn records(&self) -> &[MapRecord] {
        &self.records
    }
}

impl MappingSummary for FlatMappingSummary {
    fn query(&self, mapping: NodeId) -> Option<&MapRecord> {
        self.by_type.get(&mapping).map(|i| &self.records[*i])
    }

    fn resolve(&self, decl: NodeId) -> Option<&MapRecord> {
        self.by_decl.get(&decl).map(|i| &self.records[*i])
    }

    fn address_literals(&self) -> &[u64] {
        &self.literals
    }

    fn definitions(&self, types: &TypeTable) -> Result<RecordDefs> {
        let capacity = types.address_count().max(1);
        let mut defs = RecordDefs::default();
        for record in &self.records {
            emit_record(record, capacity, types, &mut defs)?;
        }
        Ok(defs)
    }
}

fn slot_matches(slot: u64, arity: usize) -> CExpr {
    let mut cond = CExpr::id("m").arrow(format!("set_{slot}"));
    for j in 0..arity {
        let key = CExpr::binary(
            CExpr::id("m").arrow(format!("k{j}_{slot}")),
            "==",
            CExpr::id(format!("k{j}")),
        );
        cond = CExpr::binary(cond, "&&", key);
    }
    cond
}

fn emit_record(
    record: &MapRecord,
    capacity: u64,
    types: &TypeTable,
    defs: &mut RecordDefs,
) -> Result<()> {
    let name = &record.name;
    let ty = format!("struct {name}");
    let mut key_types = Vec::with_capacity(record.key_types.len());
    for key in &record.key_types {
        key_types.push(types.type_of(key.id)?);
    }
    let value_type = types.type_of(record.value_type.id)?;
    let value_zero = types.initial_value(&record.value_type)?;
    let arity = key_types.len();

    let mut fields = Vec::new();
    for slot in 0..capacity {
        fields.push(CVarDecl::new("sol_bool_t", format!("set_{slot}")));
        for (j, kt) in key_types.iter().enumerate() {
            fields.push(CVarDecl::new(kt.as_str(), format!("k{j}_{slot}")));
        }
        fields.push(CVarDecl::new(value_type.as_str(), format!("v_{slot}")));
    }
    defs.structs.push(CStruct {
        name: name.clone(),
        fields,
    });

    let map_param = CParam::new(ty.as_str(), "m").pointer();
    let key_params: Vec<CParam> = key_types
        .iter()
        .enumerate()
        .map(|(j, kt)| CParam::new(kt.as_str(), format!("k{j}")))
        .collect();
    let m = || CExpr::id("m");

    // Read_<M>
    let mut read = CBlock::default();
    for slot in 0..capacity {
        read.push(CStmt::If {
            cond: slot_matches(slot, arity),
            then: CBlock::new(vec![CStmt::Return(Some(m().arrow(format!("v_{slot}"))))]),
            otherwise: None,
        });
    }
    read.push(CStmt::Return(Some(value_zero.clone())));
    let mut params = vec![map_param.clone()];
    params.extend(key_params.iter().cloned());
    defs.functions.push(CFunction {
        ret: value_type.clone(),
        name: format!("Read_{name}"),
        params,
        body: read,
    });

    // Write_<M>
    let mut write = CBlock::default();
    for slot in 0..capacity {
        write.push(CStmt::If {
            cond: slot_matches(slot, arity),
            then: CBlock::new(vec![
                CExpr::assign(m().arrow(format!("v_{slot}")), CExpr::id("v")).stmt(),
                CStmt::Return(None),
            ]),
            otherwise: None,
        });
    }
    for slot in 0..capacity {
        let mut claim = vec![CExpr::assign(m().arrow(format!("set_{slot}")), CExpr::Int(1)).stmt()];
        for j in 0..arity {
            claim.push(
                CExpr::assign(m().arrow(format!("k{j}_{slot}")), CExpr::id(format!("k{j}"))).stmt(),
            );
        }
        claim.push(CExpr::assign(m().arrow(format!("v_{slot}")), CExpr::id("v")).stmt());
        claim.push(CStmt::Return(None));
        write.push(CStmt::If {
            cond: CExpr::prefix("!", m().arrow(format!("set_{slot}"))),
            then: CBlock::new(claim),
            otherwise: None,
        });
    }
    write.push(CExpr::call("assume", vec![CExpr::Int(0)]).stmt());
    let mut params = vec![map_param];
    params.extend(key_params);
    params.push(CParam::new(value_type.as_str(), "v"));
    defs.functions.push(CFunction {
        ret: "void".to_string(),
        name: format!("Write_{name}"),
        params,
        body: write,
    });

    // Init_0_<M>
    let mut init = CBlock::new(vec![CVarDecl::new(ty.as_str(), "m").stmt()]);
    for slot in 0..capacity {
        init.push(CExpr::assign(CExpr::id("m").dot(format!("set_{slot}")), CExpr::Int(0)).stmt());
        for (j, key) in record.key_types.iter().enumerate() {
            init.push(
                CExpr::assign(
                    CExpr::id("m").dot(format!("k{j}_{slot}")),
                    types.initial_value(key)?,
                )
                .stmt(),
            );
        }
        init.push(CExpr::assign(CExpr::id("m").dot(format!("v_{slot}")), value_zero.clone()).stmt());
    }
    init.push(CStmt::Return(Some(CExpr::id("m"))));
    defs.functions.push(CFunction {
        ret: ty.clone(),
        name: names::init_zero(name),
        params: Vec::new(),
        body: init,
    });

    // A fresh mapping holds no entries.
    defs.functions.push(CFunction {
        ret: ty,
        name: names::nondet(name),
        params: Vec::new(),
        body: CBlock::new(vec![CStmt::Return(Some(CExpr::call(
            names::init_zero(name),
            Vec::new(),
        )))]),
    });

    Ok(())
}
