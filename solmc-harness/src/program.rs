#![forbid(unsafe_code)]

//! Whole-program translation: records, lowered bodies and the driver.

use std::collections::HashMap;

use rayon::prelude::*;
use solmc_ast::{ContractDef, Program, StructDef, TypeNameKind};
use solmc_backend_c::{CBlock, CExpr, CFunction, CParam, CProgram, CStmt, CStruct, CVarDecl, RUNTIME_HEADER};
use solmc_core::names;
use solmc_core::{
    AllReachable, CallStateField, FlatMappingSummary, InstantiationGraph, LoweringContext,
    MappingSummary, NewCallGraph, Reachability, Result, Scalar, TranslateError,
    TranslationConfig, TypeTable, lower_contract, types,
};
use tracing::{debug, info};

use crate::actor::ActorBuilder;
use crate::address::AddressAllocator;
use crate::harness::HarnessSynthesizer;

/// The analyses translation consults but does not own.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub maps: &'a dyn MappingSummary,
    pub graph: &'a dyn InstantiationGraph,
    pub reach: &'a dyn Reachability,
}

/// Collaborators computed from the program alone.
#[derive(Debug)]
pub struct DefaultCollaborators {
    pub maps: FlatMappingSummary,
    pub graph: NewCallGraph,
    pub reach: AllReachable,
}

impl DefaultCollaborators {
    pub fn build(program: &Program) -> Self {
        Self {
            maps: FlatMappingSummary::build(program),
            graph: NewCallGraph::build(program),
            reach: AllReachable,
        }
    }

    pub fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            maps: &self.maps,
            graph: &self.graph,
            reach: &self.reach,
        }
    }
}

pub fn translate(
    program: &Program,
    config: &TranslationConfig,
    collab: Collaborators<'_>,
) -> Result<CProgram> {
    info!(contracts = program.contracts.len(), "translating");
    let types = types::resolve(program, collab.maps, config.address_count)?;

    let mut actors = match &config.actors {
        Some(model) => ActorBuilder::with_model(program, model)?,
        None => ActorBuilder::with_default_model(program)?,
    };
    actors.setup(collab.graph, collab.reach)?;

    let modelled: Vec<&ContractDef> = program
        .contracts
        .iter()
        .filter(|c| !c.is_interface())
        .collect();

    let defs = collab.maps.definitions(&types)?;
    let mut structs = Vec::new();
    let mut functions = defs.functions;
    for contract in &modelled {
        structs.push(contract_record(contract, &types)?);
        for strukt in &contract.structs {
            structs.push(struct_record(contract, strukt, &types)?);
            functions.extend(struct_helpers(contract, strukt, &types)?);
        }
    }
    structs.push(CallStateField::struct_def());
    structs.extend(defs.structs);
    let structs = order_records(structs)?;
    info!(records = structs.len(), "records laid out");

    let lowered = modelled
        .par_iter()
        .map(|contract| {
            let cx = LoweringContext {
                program,
                contract,
                types: &types,
                maps: collab.maps,
            };
            lower_contract(cx, collab.reach)
        })
        .collect::<Result<Vec<_>>>()?;
    functions.extend(lowered.into_iter().flatten());
    info!(functions = functions.len(), "bodies lowered");

    let mut alloc = AddressAllocator::new(collab.maps.address_literals(), config.address_count);
    alloc.check_constants()?;
    functions.push(HarnessSynthesizer::new(&actors, &types, config).synthesize(&mut alloc)?);

    Ok(CProgram {
        includes: vec![RUNTIME_HEADER.to_string()],
        structs,
        globals: alloc.globals(),
        functions,
    })
}

/// `struct C`: the model fields, then one field per state variable.
fn contract_record(contract: &ContractDef, types: &TypeTable) -> Result<CStruct> {
    let mut fields = vec![
        CVarDecl::new(Scalar::Address.ctype(), names::MODEL_ADDRESS),
        CVarDecl::new(Scalar::UINT256.ctype(), names::MODEL_BALANCE),
    ];
    for var in &contract.state_vars {
        fields.push(CVarDecl::new(types.type_of(var.id)?, names::field(&var.name)));
    }
    Ok(CStruct {
        name: contract.name.clone(),
        fields,
    })
}

fn struct_record(contract: &ContractDef, strukt: &StructDef, types: &TypeTable) -> Result<CStruct> {
    let mut fields = Vec::with_capacity(strukt.members.len());
    for member in &strukt.members {
        fields.push(CVarDecl::new(types.type_of(member.id)?, names::field(&member.name)));
    }
    Ok(CStruct {
        name: names::struct_record(contract, strukt),
        fields,
    })
}

/// `Init_S`, `Init_0_S` and `ND_S`. Mapping members are not constructor
/// arguments; they always start empty. Parameters carry the field names, so
/// none can clash with the local `v`.
fn struct_helpers(
    contract: &ContractDef,
    strukt: &StructDef,
    types: &TypeTable,
) -> Result<Vec<CFunction>> {
    let name = names::struct_record(contract, strukt);
    let ty = format!("struct {name}");
    let value = || CExpr::id("v");

    let mut params = Vec::new();
    let mut init = CBlock::new(vec![CVarDecl::new(ty.as_str(), "v").stmt()]);
    let mut zero = init.clone();
    let mut nondet = init.clone();
    for member in &strukt.members {
        let target = value().dot(names::field(&member.name));
        let is_mapping = matches!(
            member.ty.as_ref().map(|t| &t.kind),
            Some(TypeNameKind::Mapping { .. })
        );
        let zero_value = types.initial_value_of(member.id)?;
        if is_mapping {
            init.push(CExpr::assign(target.clone(), zero_value.clone()).stmt());
        } else {
            let param = names::field(&member.name);
            params.push(CParam::new(types.type_of(member.id)?, param.as_str()));
            init.push(CExpr::assign(target.clone(), CExpr::id(param)).stmt());
        }
        zero.push(CExpr::assign(target.clone(), zero_value).stmt());
        let msg = format!("{name}:{}", member.name);
        nondet.push(CExpr::assign(target, types.nondet_value_of(member.id, &msg)?).stmt());
    }
    for block in [&mut init, &mut zero, &mut nondet] {
        block.push(CStmt::Return(Some(value())));
    }

    Ok(vec![
        CFunction {
            ret: ty.clone(),
            name: names::init(&name),
            params,
            body: init,
        },
        CFunction {
            ret: ty.clone(),
            name: names::init_zero(&name),
            params: Vec::new(),
            body: zero,
        },
        CFunction {
            ret: ty,
            name: names::nondet(&name),
            params: Vec::new(),
            body: nondet,
        },
    ])
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    Active,
    Done,
}

/// Orders records so that every record embedded by value is defined before
/// the record embedding it.
fn order_records(records: Vec<CStruct>) -> Result<Vec<CStruct>> {
    let index: HashMap<String, usize> = records
        .iter()
        .enumerate()
        .map(|(i, s)| (s.name.clone(), i))
        .collect();

    fn visit(
        i: usize,
        records: &[CStruct],
        index: &HashMap<String, usize>,
        marks: &mut [Option<Visit>],
        order: &mut Vec<usize>,
    ) -> Result<()> {
        match marks[i] {
            Some(Visit::Done) => return Ok(()),
            Some(Visit::Active) => {
                return Err(TranslateError::unsupported_here(format!(
                    "`{}` contains itself by value",
                    records[i].name
                )));
            }
            None => {}
        }
        marks[i] = Some(Visit::Active);
        for field in records[i].fields.iter().filter(|f| !f.pointer) {
            if let Some(dep) = field.ty.strip_prefix("struct ").and_then(|n| index.get(n)) {
                visit(*dep, records, index, marks, order)?;
            }
        }
        marks[i] = Some(Visit::Done);
        order.push(i);
        Ok(())
    }

    let mut marks = vec![None; records.len()];
    let mut order = Vec::with_capacity(records.len());
    for i in 0..records.len() {
        visit(i, &records, &index, &mut marks, &mut order)?;
    }
    debug!(records = order.len(), "records ordered");

    let mut slots: Vec<Option<CStruct>> = records.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
}
