use solmc_ast::build::AstBuilder;
use solmc_ast::{BinOp, ElementaryType, Program, SourceType};
use solmc_core::{TranslateError, TranslationConfig};
use solmc_harness::{DefaultCollaborators, translate};

fn render(program: &Program, config: &TranslationConfig) -> Result<String, TranslateError> {
    let collab = DefaultCollaborators::build(program);
    Ok(translate(program, config, collab.collaborators())?.to_string())
}

fn bank() -> Program {
    let b = AstBuilder::new();
    let mut c = b.contract("Bank");
    let balances = b.state_var("balances", b.mapping(b.address(), b.uint(256)));
    let uint = SourceType::Elementary(ElementaryType::UINT256);
    let sender = || b.member(b.builtin("msg"), "sender");
    let entry = || b.index(b.ident(&balances), sender(), uint);
    let body = vec![b.expr_stmt(b.assign(
        entry(),
        b.binary(entry(), BinOp::Add, b.member(b.builtin("msg"), "value")),
    ))];
    let mut deposit = b.function("deposit", vec![], vec![], body);
    deposit.payable = true;
    c.state_vars.push(balances);
    c.functions.push(deposit);
    Program { contracts: vec![c] }
}

#[test]
fn payable_entry_points_credit_the_actor() {
    let out = render(&bank(), &TranslationConfig::default()).unwrap();

    assert!(out.contains("#include \"sol_runtime.h\""));
    assert!(out.contains("struct Map_1 d_balances;"));
    let map = out.find("struct Map_1\n{").unwrap();
    let bank = out.find("struct Bank\n{").unwrap();
    assert!(map < bank, "mapping record must precede its user");

    assert!(out.contains("int main(void)"));
    assert!(out.contains("struct Bank contract_0;"));
    assert!(out.contains("(global_address_0)=(Init_sol_address_t(0));"));
    assert!(out.contains("(contract_0.model_address)=(Init_sol_address_t(1));"));
    assert!(out.contains("(contract_0.model_balance)+=(state.value);"));
    assert!(out.contains("Bank_Method_deposit(&contract_0, &state);"));
    assert!(out.contains("while (sol_continue())"));
}

#[test]
fn lockstep_time_advances_block_and_timestamp_together() {
    let config = TranslationConfig {
        lockstep_time: true,
        ..TranslationConfig::default()
    };
    let out = render(&bank(), &config).unwrap();
    assert!(out.contains("if (nd_range(0, 2, \"next_block\"))"));

    let out = render(&bank(), &TranslationConfig::default()).unwrap();
    assert!(!out.contains("next_block"));
    assert!(out.contains("nd_increase(state.blocknum, 0, \"blocknum\")"));
}

#[test]
fn nested_instances_live_inside_their_parent() {
    let b = AstBuilder::new();
    let mut child = b.contract("Child");
    child
        .functions
        .push(b.function("ping", vec![], vec![], vec![]));
    let mut parent = b.contract("Parent");
    let mut slot = b.state_var("child", b.user_type("Child", child.id));
    slot.value = Some(b.new_contract(&child, vec![]));
    parent.state_vars.push(slot);
    let program = Program {
        contracts: vec![child, parent],
    };

    let config = TranslationConfig {
        actors: Some(vec!["Parent".to_string()]),
        ..TranslationConfig::default()
    };
    let out = render(&program, &config).unwrap();

    assert!(out.contains("struct Parent contract_0;"));
    assert!(!out.contains("struct Child contract_"));
    assert!(out.contains("(contract_0.d_child.model_address)=(Init_sol_address_t(2));"));
    assert!(out.contains("Child_Method_ping(&contract_0.d_child, &state);"));
    let child_at = out.find("struct Child\n{").unwrap();
    let parent_at = out.find("struct Parent\n{").unwrap();
    assert!(child_at < parent_at);
}

#[test]
fn too_few_addresses_is_an_error() {
    let config = TranslationConfig {
        address_count: 1,
        ..TranslationConfig::default()
    };
    let err = render(&bank(), &config).unwrap_err();
    assert!(matches!(err, TranslateError::AddressExhausted { count: 1 }));
}

#[test]
fn address_literals_use_up_the_address_space() {
    let with_literals = |values: &[u64]| {
        let b = AstBuilder::new();
        let mut c = b.contract("Registry");
        let body = values
            .iter()
            .map(|n| {
                b.expr_stmt(b.convert(
                    ElementaryType::Address { payable: true },
                    b.number(*n),
                ))
            })
            .collect();
        c.functions.push(b.function("touch", vec![], vec![], body));
        Program { contracts: vec![c] }
    };

    // Constants 0..=3 leave address 4 for the single actor.
    assert!(render(&with_literals(&[1, 2, 3]), &TranslationConfig::default()).is_ok());

    let err = render(&with_literals(&[1, 2, 3, 4]), &TranslationConfig::default()).unwrap_err();
    assert!(matches!(err, TranslateError::AddressExhausted { count: 5 }), "{err:?}");

    let err =
        render(&with_literals(&[1, 2, 3, 4, 5, 6]), &TranslationConfig::default()).unwrap_err();
    assert!(matches!(err, TranslateError::AddressExhausted { count: 5 }), "{err:?}");
}

#[test]
fn libraries_do_not_receive_value() {
    let b = AstBuilder::new();
    let mut lib = b.library("Math");
    lib.functions.push(b.function("id", vec![], vec![], vec![]));
    let mut c = b.contract("User");
    c.functions.push(b.function("go", vec![], vec![], vec![]));
    let program = Program {
        contracts: vec![lib, c],
    };

    // Only the initial call state assigns a value.
    let only_lib = TranslationConfig {
        actors: Some(vec!["Math".to_string()]),
        ..TranslationConfig::default()
    };
    let out = render(&program, &only_lib).unwrap();
    assert_eq!(out.matches("(state.value)=").count(), 1);
    assert!(out.contains("Math_Method_id(&contract_0, &state);"));

    let only_user = TranslationConfig {
        actors: Some(vec!["User".to_string()]),
        ..TranslationConfig::default()
    };
    let out = render(&program, &only_user).unwrap();
    assert_eq!(out.matches("(state.value)=").count(), 2);
}

#[test]
fn struct_records_get_constructors() {
    let b = AstBuilder::new();
    let mut c = b.contract("A");
    let strukt = b.struct_def(
        "S",
        vec![b.var("amount", b.uint(256)), b.var("open", b.boolean())],
    );
    let held = b.state_var("held", b.user_type("S", strukt.id));
    c.structs.push(strukt);
    c.state_vars.push(held);
    let program = Program { contracts: vec![c] };

    let out = render(&program, &TranslationConfig::default()).unwrap();
    assert!(out.contains("struct A_Struct_S Init_A_Struct_S(sol_uint256_t d_amount, sol_bool_t d_open)"));
    assert!(out.contains("struct A_Struct_S Init_0_A_Struct_S(void)"));
    assert!(out.contains("struct A_Struct_S ND_A_Struct_S(void)"));
    assert!(out.find("struct A_Struct_S\n{").unwrap() < out.find("struct A\n{").unwrap());
}

#[test]
fn unknown_actor_names_are_rejected() {
    let config = TranslationConfig {
        actors: Some(vec!["Vault".to_string()]),
        ..TranslationConfig::default()
    };
    let err = render(&bank(), &config).unwrap_err();
    assert!(matches!(err, TranslateError::Unsupported { .. }));
}
