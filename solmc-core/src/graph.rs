#![forbid(unsafe_code)]

//! Instantiation and reachability collaborators.

use std::collections::HashMap;

use solmc_ast::walk::block_exprs;
use solmc_ast::{Expr, ExprKind, NodeId, Program, TypeNameKind};
use tracing::debug;

/// A contract instance stored in a state variable of its parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Child {
    /// The state variable holding the instance.
    pub field: NodeId,
    pub contract: NodeId,
}

pub trait InstantiationGraph: Sync {
    /// Instances a contract creates for itself, in declaration order.
    fn children(&self, contract: NodeId) -> &[Child];
}

pub trait Reachability: Sync {
    fn is_reachable(&self, func: NodeId) -> bool;

    /// Number of distinct lowerings `func` needs; at least one.
    fn specializations(&self, func: NodeId) -> usize;
}

/// Children discovered from `field = new C(...)` in constructors and from
/// state variables initialised with `new C(...)`.
#[derive(Debug, Default)]
pub struct NewCallGraph {
    children: HashMap<NodeId, Vec<Child>>,
}

fn created_contract(expr: &Expr) -> Option<NodeId> {
    let ExprKind::Call { callee, .. } = &expr.unparenthesized().kind else {
        return None;
    };
    match &callee.kind {
        ExprKind::New(ty) => match &ty.kind {
            TypeNameKind::UserDefined { referenced, .. } => Some(*referenced),
            _ => None,
        },
        _ => None,
    }
}

impl NewCallGraph {
    pub fn build(program: &Program) -> Self {
        let mut graph = Self::default();
        for contract in &program.contracts {
            let mut found: Vec<Child> = Vec::new();
            let mut push = |field: NodeId, child: NodeId| {
                if !found.iter().any(|c| c.field == field) {
                    found.push(Child {
                        field,
                        contract: child,
                    });
                }
            };

            for var in &contract.state_vars {
                if let Some(child) = var.value.as_ref().and_then(created_contract) {
                    push(var.id, child);
                }
            }

            if let Some(body) = contract.constructor().and_then(|c| c.body.as_ref()) {
                let mut assigns = Vec::new();
                block_exprs(body, &mut |e| {
                    if let ExprKind::Assign { op: None, lhs, rhs } = &e.kind {
                        if let (Some(field), Some(child)) = (lhs.referenced(), created_contract(rhs)) {
                            assigns.push((field, child));
                        }
                    }
                });
                for (field, child) in assigns {
                    if contract.state_vars.iter().any(|v| v.id == field) {
                        push(field, child);
                    }
                }
            }

            if !found.is_empty() {
                debug!(contract = %contract.name, children = found.len(), "instantiations found");
                graph.children.insert(contract.id, found);
            }
        }
        graph
    }
}

impl InstantiationGraph for NewCallGraph {
    fn children(&self, contract: NodeId) -> &[Child] {
        self.children.get(&contract).map_or(&[], Vec::as_slice)
    }
}

/// Every function is modelled with a single lowering.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllReachable;

impl Reachability for AllReachable {
    fn is_reachable(&self, _func: NodeId) -> bool {
        true
    }

    fn specializations(&self, _func: NodeId) -> usize {
        1
    }
}
