#![forbid(unsafe_code)]

//! The finite set of contract instances the harness drives.

use std::collections::HashSet;

use solmc_ast::{ContractDef, ContractKind, FunctionDef, NodeId, Program, VarDecl};
use solmc_backend_c::{CExpr, CStmt, CVarDecl};
use solmc_core::graph::{InstantiationGraph, Reachability};
use solmc_core::names;
use solmc_core::{Result, Scalar, TranslateError, TypeTable};
use tracing::debug;

use crate::address::AddressAllocator;

/// Monotonic id source threaded through actor construction.
#[derive(Debug, Default)]
pub struct TicketSystem {
    next: u64,
}

impl TicketSystem {
    pub fn next(&mut self) -> u64 {
        let ticket = self.next;
        self.next += 1;
        ticket
    }

    pub fn issued(&self) -> u64 {
        self.next
    }
}

/// Persistent argument storage of one parameter, reused across calls.
#[derive(Clone, Debug)]
pub struct ParamSlot<'a> {
    pub decl: &'a VarDecl,
    pub name: String,
}

/// One dispatchable specialization of a function.
#[derive(Clone, Debug)]
pub struct ActorFunction<'a> {
    pub func: &'a FunctionDef,
    pub fid: u64,
    /// Target name of the specialization.
    pub name: String,
    pub params: Vec<ParamSlot<'a>>,
    pub payable: bool,
}

#[derive(Clone, Debug)]
pub struct Actor<'a> {
    pub contract: &'a ContractDef,
    pub id: u64,
    /// Access path from the harness: `contract_<id>` for roots, a field path
    /// through the parent otherwise.
    pub path: CExpr,
    pub functions: Vec<ActorFunction<'a>>,
    pub is_root: bool,
}

impl Actor<'_> {
    pub fn is_library(&self) -> bool {
        self.contract.is_library()
    }
}

#[derive(Debug)]
pub struct ActorBuilder<'a> {
    program: &'a Program,
    roots: Vec<&'a ContractDef>,
    actors: Vec<Actor<'a>>,
    ready: bool,
}

impl<'a> ActorBuilder<'a> {
    pub fn new(program: &'a Program) -> Self {
        Self {
            program,
            roots: Vec::new(),
            actors: Vec::new(),
            ready: false,
        }
    }

    /// One instance of every deployable contract.
    pub fn with_default_model(program: &'a Program) -> Result<Self> {
        let mut builder = Self::new(program);
        for contract in &program.contracts {
            if contract.kind == ContractKind::Contract {
                builder.record(contract)?;
            }
        }
        Ok(builder)
    }

    /// One instance per listed contract name, in order.
    pub fn with_model(program: &'a Program, model: &[String]) -> Result<Self> {
        let mut builder = Self::new(program);
        for name in model {
            let contract = program.contract_by_name(name).ok_or_else(|| {
                TranslateError::unsupported_here(format!("actor `{name}` names no contract"))
            })?;
            builder.record(contract)?;
        }
        Ok(builder)
    }

    /// Adds a top-level instance of `contract`.
    pub fn record(&mut self, contract: &'a ContractDef) -> Result<()> {
        if self.ready {
            return Err(TranslateError::illegal_here(format!(
                "actor `{}` recorded after setup",
                contract.name
            )));
        }
        if contract.is_interface() {
            return Err(TranslateError::unsupported(
                format!("interface `{}` cannot be instantiated", contract.name),
                contract.span,
            ));
        }
        self.roots.push(contract);
        Ok(())
    }

    /// Builds every actor, descending into the instances each root creates.
    pub fn setup(
        &mut self,
        graph: &dyn InstantiationGraph,
        reach: &dyn Reachability,
    ) -> Result<()> {
        if self.ready {
            return Err(TranslateError::illegal_here("actor set is already set up"));
        }
        let mut ids = TicketSystem::default();
        let mut fids = TicketSystem::default();
        let mut stack = Vec::new();
        for root in self.roots.clone() {
            self.build(root, None, &mut ids, &mut fids, &mut stack, graph, reach)?;
        }
        self.ready = true;
        debug!(
            actors = ids.issued(),
            functions = fids.issued(),
            "actor set built"
        );
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        &mut self,
        contract: &'a ContractDef,
        path: Option<CExpr>,
        ids: &mut TicketSystem,
        fids: &mut TicketSystem,
        stack: &mut Vec<NodeId>,
        graph: &dyn InstantiationGraph,
        reach: &dyn Reachability,
    ) -> Result<()> {
        if stack.contains(&contract.id) {
            return Err(TranslateError::unsupported(
                format!("`{}` transitively creates itself", contract.name),
                contract.span,
            ));
        }

        let id = ids.next();
        let is_root = path.is_none();
        let path = path.unwrap_or_else(|| CExpr::id(names::actor_var(id)));

        let mut functions = Vec::new();
        let entry_points = contract.functions.iter().filter(|f| {
            !f.is_constructor()
                && f.is_implemented()
                && f.is_entry_point()
                && reach.is_reachable(f.id)
        });
        for func in entry_points {
            let params: Vec<ParamSlot<'a>> = func
                .params
                .params
                .iter()
                .enumerate()
                .map(|(i, decl)| {
                    let param = if decl.name.is_empty() {
                        i.to_string()
                    } else {
                        decl.name.clone()
                    };
                    ParamSlot {
                        decl,
                        name: names::param_slot(id, func, &param),
                    }
                })
                .collect();
            for index in 0..reach.specializations(func.id).max(1) {
                functions.push(ActorFunction {
                    func,
                    fid: fids.next(),
                    name: names::method(contract, func, index),
                    params: params.clone(),
                    payable: func.payable && !contract.is_library(),
                });
            }
        }

        debug!(contract = %contract.name, id, functions = functions.len(), "actor");
        self.actors.push(Actor {
            contract,
            id,
            path: path.clone(),
            functions,
            is_root,
        });

        stack.push(contract.id);
        for child in graph.children(contract.id) {
            let field = contract
                .state_vars
                .iter()
                .find(|v| v.id == child.field)
                .ok_or_else(|| TranslateError::missing(child.field, "contract field"))?;
            let created = self
                .program
                .contract(child.contract)
                .ok_or_else(|| TranslateError::missing(child.contract, "contract"))?;
            let child_path = path.clone().dot(names::field(&field.name));
            self.build(created, Some(child_path), ids, fids, stack, graph, reach)?;
        }
        stack.pop();
        Ok(())
    }

    fn built(&self) -> Result<&[Actor<'a>]> {
        if self.ready {
            Ok(&self.actors)
        } else {
            Err(TranslateError::illegal_here("actor set used before setup"))
        }
    }

    /// Read-only view of the built actors, roots and nested instances in
    /// pre-order.
    pub fn inspect(&self) -> Result<&[Actor<'a>]> {
        self.built()
    }

    /// Storage of every root actor.
    pub fn declare(&self) -> Result<Vec<CStmt>> {
        Ok(self
            .built()?
            .iter()
            .filter(|a| a.is_root)
            .map(|a| {
                CVarDecl::new(format!("struct {}", a.contract.name), names::actor_var(a.id)).stmt()
            })
            .collect())
    }

    /// Parameter slots of every dispatchable function.
    pub fn vars(&self, types: &TypeTable) -> Result<Vec<CVarDecl>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for actor in self.built()? {
            for slot in actor.functions.iter().flat_map(|f| &f.params) {
                if seen.insert(slot.name.as_str()) {
                    out.push(CVarDecl::new(types.type_of(slot.decl.id)?, slot.name.as_str()));
                }
            }
        }
        Ok(out)
    }

    pub fn assign_addresses(&self, alloc: &mut AddressAllocator) -> Result<Vec<CStmt>> {
        let mut out = Vec::new();
        for actor in self.built()? {
            let addr = alloc.reserve()?;
            out.push(
                CExpr::assign(
                    actor.path.clone().dot(names::MODEL_ADDRESS),
                    Scalar::Address.wrap(CExpr::Int(addr)),
                )
                .stmt(),
            );
        }
        Ok(out)
    }

    /// Zero balances for every actor, then the constructor of every root with
    /// nondeterministic arguments. Nested actors are constructed by their
    /// parents.
    pub fn initialize(&self, types: &TypeTable, state: &CExpr) -> Result<Vec<CStmt>> {
        let actors = self.built()?;
        let mut out = Vec::new();
        for actor in actors {
            out.push(
                CExpr::assign(
                    actor.path.clone().dot(names::MODEL_BALANCE),
                    Scalar::UINT256.zero(),
                )
                .stmt(),
            );
        }
        for actor in actors.iter().filter(|a| a.is_root) {
            let mut args = vec![actor.path.clone().addr_of(), state.clone().addr_of()];
            if let Some(ctor) = actor.contract.constructor() {
                for param in &ctor.params.params {
                    let msg = format!("{}:{}", actor.contract.name, param.name);
                    args.push(types.nondet_value_of(param.id, &msg)?);
                }
            }
            out.push(CExpr::call(names::init(&actor.contract.name), args).stmt());
        }
        Ok(out)
    }
}
