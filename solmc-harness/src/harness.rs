#![forbid(unsafe_code)]

//! The nondeterministic driver: `main` declares and initialises every actor,
//! then repeatedly picks an actor and one of its functions to run.

use solmc_backend_c::{CBlock, CExpr, CFunction, CStmt, CVarDecl};
use solmc_core::names;
use solmc_core::scalar::range;
use solmc_core::{
    CALL_STATE_STRUCT, CallStateField, Result, TranslateError, TranslationConfig, TypeTable,
};
use tracing::{debug, info};

use crate::actor::{Actor, ActorBuilder, ActorFunction};
use crate::address::AddressAllocator;

const STATE: &str = "state";

fn field(f: CallStateField) -> CExpr {
    CExpr::id(STATE).dot(f.name())
}

fn set(f: CallStateField, value: CExpr) -> CStmt {
    CExpr::assign(field(f), value).stmt()
}

pub struct HarnessSynthesizer<'a> {
    actors: &'a ActorBuilder<'a>,
    types: &'a TypeTable,
    config: &'a TranslationConfig,
}

impl<'a> HarnessSynthesizer<'a> {
    pub fn new(
        actors: &'a ActorBuilder<'a>,
        types: &'a TypeTable,
        config: &'a TranslationConfig,
    ) -> Self {
        Self {
            actors,
            types,
            config,
        }
    }

    fn nondet(&self, f: CallStateField) -> CExpr {
        f.scalar().nondet(self.types.address_count(), f.name())
    }

    /// `int main(void)`.
    pub fn synthesize(&self, alloc: &mut AddressAllocator) -> Result<CFunction> {
        let actors = self.actors.inspect()?;
        if actors.is_empty() {
            return Err(TranslateError::unsupported_here(
                "the model has no actors to drive",
            ));
        }

        let mut body = CBlock::default();
        body.push(CVarDecl::new(format!("struct {CALL_STATE_STRUCT}"), STATE).stmt());
        for decl in self.actors.declare()? {
            body.push(decl);
        }
        for slot in self.actors.vars(self.types)? {
            body.push(slot.stmt());
        }

        body.stmts.extend(self.initial_state());
        body.stmts.extend(self.actors.assign_addresses(alloc)?);
        body.stmts
            .extend(self.actors.initialize(self.types, &CExpr::id(STATE))?);
        body.stmts.extend(alloc.map_constants());
        body.push(self.scheduler(actors)?);
        body.push(CStmt::Return(Some(CExpr::Int(0))));

        info!(
            actors = actors.len(),
            lockstep = self.config.lockstep_time,
            "harness synthesized"
        );
        Ok(CFunction {
            ret: "int".to_string(),
            name: "main".to_string(),
            params: Vec::new(),
            body,
        })
    }

    /// Call state seen by the constructors.
    fn initial_state(&self) -> Vec<CStmt> {
        CallStateField::ALL
            .iter()
            .map(|f| match f {
                CallStateField::Sender | CallStateField::Block | CallStateField::Timestamp => {
                    set(*f, self.nondet(*f))
                }
                CallStateField::Origin => set(*f, field(CallStateField::Sender)),
                CallStateField::Value => set(*f, f.scalar().zero()),
                CallStateField::Paid | CallStateField::ReqFail => {
                    set(*f, f.scalar().wrap(CExpr::Int(1)))
                }
            })
            .collect()
    }

    fn scheduler(&self, actors: &[Actor<'_>]) -> Result<CStmt> {
        let function_count: usize = actors.iter().map(|a| a.functions.len()).sum();
        let mut round = CBlock::default();
        round.push(
            CVarDecl::new("uint64_t", "next_actor")
                .with_init(range(0, actors.len() as u64, "next_actor"))
                .stmt(),
        );
        round.push(
            CVarDecl::new("uint64_t", "next_call")
                .with_init(range(0, function_count.max(1) as u64, "next_call"))
                .stmt(),
        );

        let mut cases = Vec::with_capacity(actors.len());
        for actor in actors {
            let mut calls = Vec::with_capacity(actor.functions.len());
            for function in &actor.functions {
                calls.push((function.fid, self.dispatch(actor, function)?));
            }
            let inner = CStmt::Switch {
                scrutinee: CExpr::id("next_call"),
                cases: calls,
                default: CBlock::default(),
            };
            cases.push((actor.id, CBlock::new(vec![inner, CStmt::Break])));
            debug!(actor = actor.id, functions = actor.functions.len(), "dispatch");
        }
        round.push(CStmt::Switch {
            scrutinee: CExpr::id("next_actor"),
            cases,
            default: CBlock::default(),
        });

        Ok(CStmt::While {
            cond: CExpr::call("sol_continue", Vec::new()),
            body: round,
        })
    }

    /// One scheduler case: fresh arguments, a fresh call state, the call.
    fn dispatch(&self, actor: &Actor<'_>, function: &ActorFunction<'_>) -> Result<CBlock> {
        let mut case = CBlock::default();
        for slot in &function.params {
            let msg = format!("{}:{}", function.name, slot.decl.name);
            case.push(
                CExpr::assign(
                    CExpr::id(slot.name.as_str()),
                    self.types.nondet_value_of(slot.decl.id, &msg)?,
                )
                .stmt(),
            );
        }

        for f in CallStateField::ALL {
            if f.is_contract_only() && actor.is_library() {
                continue;
            }
            match f {
                CallStateField::Sender => case.push(set(f, self.nondet(f))),
                CallStateField::Origin => case.push(set(f, field(CallStateField::Sender))),
                CallStateField::Value if function.payable => case.push(set(f, self.nondet(f))),
                CallStateField::Value => case.push(set(f, f.scalar().zero())),
                CallStateField::Paid | CallStateField::ReqFail => {
                    case.push(set(f, f.scalar().wrap(CExpr::Int(1))))
                }
                // Advanced together below.
                CallStateField::Block | CallStateField::Timestamp => {}
            }
        }
        case.stmts.extend(self.advance_time());

        if function.payable {
            case.push(
                CExpr::Assign {
                    op: Some("+"),
                    lhs: Box::new(actor.path.clone().dot(names::MODEL_BALANCE)),
                    rhs: Box::new(field(CallStateField::Value)),
                }
                .stmt(),
            );
        }

        let mut args = vec![actor.path.clone().addr_of(), CExpr::id(STATE).addr_of()];
        args.extend(function.params.iter().map(|s| CExpr::id(s.name.as_str())));
        case.push(CExpr::call(function.name.as_str(), args).stmt());
        case.push(CStmt::Break);
        Ok(case)
    }

    /// Block number and timestamp never decrease. In lock-step mode a new
    /// block always carries a strictly later timestamp and vice versa.
    fn advance_time(&self) -> Vec<CStmt> {
        let step = |f: CallStateField, strict: u64| {
            set(
                f,
                CExpr::call(
                    "nd_increase",
                    vec![field(f), CExpr::Int(strict), CExpr::str(f.name())],
                ),
            )
        };
        if self.config.lockstep_time {
            vec![CStmt::If {
                cond: CExpr::call(
                    "nd_range",
                    vec![CExpr::Int(0), CExpr::Int(2), CExpr::str("next_block")],
                ),
                then: CBlock::new(vec![
                    step(CallStateField::Block, 1),
                    step(CallStateField::Timestamp, 1),
                ]),
                otherwise: None,
            }]
        } else {
            vec![
                step(CallStateField::Block, 0),
                step(CallStateField::Timestamp, 0),
            ]
        }
    }
}
