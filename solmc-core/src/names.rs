#![forbid(unsafe_code)]

//! Target identifiers derived from source declarations.

use solmc_ast::{ContractDef, FunctionDef, ModifierDef, StructDef};

pub const MODEL_ADDRESS: &str = "model_address";
pub const MODEL_BALANCE: &str = "model_balance";

pub fn field(name: &str) -> String {
    format!("d_{name}")
}

pub fn struct_record(contract: &ContractDef, strukt: &StructDef) -> String {
    format!("{}_Struct_{}", contract.name, strukt.name)
}

fn function_base(func: &FunctionDef) -> &str {
    if func.name.is_empty() {
        "fallback"
    } else {
        &func.name
    }
}

/// Name of specialization `index` of `func`. Constructors have exactly one.
pub fn method(contract: &ContractDef, func: &FunctionDef, index: usize) -> String {
    if func.is_constructor() {
        return init(&contract.name);
    }
    match index {
        0 => format!("{}_Method_{}", contract.name, function_base(func)),
        i => format!("{}_Method_{}_{i}", contract.name, function_base(func)),
    }
}

pub fn modifier(contract: &ContractDef, modifier: &ModifierDef) -> String {
    format!("{}_Modifier_{}", contract.name, modifier.name)
}

/// A parameter or local of a modifier body, kept apart from the wrapped
/// function's names.
pub fn modifier_local(modifier: &ModifierDef, name: &str) -> String {
    format!("{}_{name}", modifier.name)
}

/// `Init_<name>`: contract constructors and struct constructors.
pub fn init(name: &str) -> String {
    format!("Init_{name}")
}

/// `Init_0_<name>`: the zero value of a record.
pub fn init_zero(name: &str) -> String {
    format!("Init_0_{name}")
}

/// `ND_<name>`: an arbitrary value of a record.
pub fn nondet(name: &str) -> String {
    format!("ND_{name}")
}

pub fn actor_var(id: u64) -> String {
    format!("contract_{id}")
}

pub fn param_slot(actor: u64, func: &FunctionDef, param: &str) -> String {
    format!("c{actor}_{}_{param}", function_base(func))
}

pub fn global_address(literal: u64) -> String {
    format!("global_address_{literal}")
}
