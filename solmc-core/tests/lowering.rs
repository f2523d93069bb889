use solmc_ast::build::AstBuilder;
use solmc_ast::{BinOp, ElementaryType, Program, SourceType, UnaryOp};
use solmc_core::lower::{lower_body, lower_constructor, lower_function};
use solmc_core::{FlatMappingSummary, LoweringContext, TranslateError, types};

fn with_context<T>(
    program: &Program,
    contract: &str,
    f: impl FnOnce(LoweringContext<'_>) -> Result<T, TranslateError>,
) -> Result<T, TranslateError> {
    let maps = FlatMappingSummary::build(program);
    let types = types::resolve(program, &maps, 5)?;
    let contract = program.contract_by_name(contract).expect("contract");
    f(LoweringContext {
        program,
        contract,
        types: &types,
        maps: &maps,
    })
}

fn body_of(program: &Program, contract: &str, func: &str) -> Result<String, TranslateError> {
    with_context(program, contract, |cx| {
        let func = cx
            .contract
            .functions
            .iter()
            .find(|f| f.name == func)
            .expect("function");
        Ok(lower_body(cx, func)?.to_string())
    })
}

#[test]
fn parameters_shadow_state_variables() {
    let b = AstBuilder::new();
    let mut c = b.contract("A");
    c.state_vars.push(b.state_var("a", b.int(256)));
    let pa = b.var("a", b.int(256));
    let pb = b.var("b", b.int(256));
    let body = vec![b.expr_stmt(b.ident(&pa)), b.expr_stmt(b.ident(&pb))];
    c.functions.push(b.function("f", vec![pa, pb], vec![], body));
    let program = Program { contracts: vec![c] };

    assert_eq!(body_of(&program, "A", "f").unwrap(), "{\n  a;\n  b;\n}");
}

#[test]
fn branch_local_shadows_member_only_inside_its_block() {
    let b = AstBuilder::new();
    let mut c = b.contract("A");
    let a = b.state_var("a", b.int(256));
    let local = b.var("a", b.int(256));
    let body = vec![
        b.if_stmt(
            b.binary(b.ident(&a), BinOp::Eq, b.number(1)),
            b.block_stmt(vec![]),
            Some(b.block_stmt(vec![b.decl_stmt(local, None)])),
        ),
        b.expr_stmt(b.assign(b.ident(&a), b.number(2))),
    ];
    c.state_vars.push(a);
    c.functions.push(b.function("f", vec![], vec![], body));
    let program = Program { contracts: vec![c] };

    assert_eq!(
        body_of(&program, "A", "f").unwrap(),
        "{\n  if ((self->d_a)==(1))\n  {\n  }\n  else\n  {\n    sol_int256_t a = Init_sol_int256_t(0);\n  }\n  (self->d_a)=(2);\n}"
    );
}

#[test]
fn transfer_and_send_both_pay() {
    let b = AstBuilder::new();
    let mut c = b.contract("A");
    let dst = b.var("dst", b.address());
    let body = vec![
        b.expr_stmt(b.call(b.member(b.ident(&dst), "transfer"), vec![b.number(5)])),
        b.expr_stmt(b.call(b.member(b.ident(&dst), "send"), vec![b.number(5)])),
        b.expr_stmt(b.call(
            b.tuple(vec![b.member(b.ident(&dst), "send")]),
            vec![b.number(5)],
        )),
    ];
    c.functions.push(b.function("f", vec![dst], vec![], body));
    let program = Program { contracts: vec![c] };

    assert_eq!(
        body_of(&program, "A", "f").unwrap(),
        "{\n  _pay(state, dst, 5);\n  _pay(state, dst, 5);\n  _pay(state, dst, 5);\n}"
    );
}

#[test]
fn require_assumes_and_assert_checks() {
    let b = AstBuilder::new();
    let mut c = b.contract("A");
    let x = b.var("x", b.uint(256));
    let body = vec![
        b.expr_stmt(b.call(
            b.builtin("require"),
            vec![
                b.binary(b.ident(&x), BinOp::Gt, b.number(0)),
                b.string_lit("positive"),
            ],
        )),
        b.expr_stmt(b.call(
            b.builtin("assert"),
            vec![b.binary(b.ident(&x), BinOp::Ne, b.number(1))],
        )),
        b.expr_stmt(b.call(b.builtin("revert"), vec![])),
        b.throw_stmt(),
    ];
    c.functions.push(b.function("f", vec![x], vec![], body));
    let program = Program { contracts: vec![c] };

    assert_eq!(
        body_of(&program, "A", "f").unwrap(),
        "{\n  assume((x)>(0));\n  assert((x)!=(1));\n  assume(0);\n  assume(0);\n}"
    );
}

#[test]
fn named_return_is_declared_and_returned() {
    let b = AstBuilder::new();
    let mut c = b.contract("A");
    let r = b.var("r", b.uint(256));
    let early = b.ret(Some(b.number(7)));
    c.functions
        .push(b.function("early", vec![], vec![r.clone()], vec![early]));

    let s = b.var("s", b.uint(256));
    let assign = b.expr_stmt(b.assign(b.ident(&s), b.number(3)));
    c.functions.push(b.function("late", vec![], vec![s], vec![assign]));
    let program = Program { contracts: vec![c] };

    assert_eq!(
        body_of(&program, "A", "early").unwrap(),
        "{\n  sol_uint256_t r = Init_sol_uint256_t(0);\n  return (r)=(7);\n}"
    );
    assert_eq!(
        body_of(&program, "A", "late").unwrap(),
        "{\n  sol_uint256_t s = Init_sol_uint256_t(0);\n  (s)=(3);\n  return s;\n}"
    );
}

#[test]
fn loops_accept_break_and_continue() {
    let b = AstBuilder::new();
    let mut c = b.contract("A");
    let i = b.var("i", b.uint(256));
    let cond = b.binary(b.ident(&i), BinOp::Lt, b.number(3));
    let step = b.unary(UnaryOp::Inc, b.ident(&i));
    let body = vec![b.for_stmt(
        Some(b.decl_stmt(i, Some(b.number(0)))),
        Some(cond),
        Some(step),
        b.block_stmt(vec![b.continue_stmt(), b.break_stmt()]),
    )];
    c.functions.push(b.function("f", vec![], vec![], body));
    let program = Program { contracts: vec![c] };

    assert_eq!(
        body_of(&program, "A", "f").unwrap(),
        "{\n  for (sol_uint256_t i = 0; (i)<(3); ++(i))\n  {\n    continue;\n    break;\n  }\n}"
    );
}

#[test]
fn break_outside_a_loop_is_rejected() {
    let b = AstBuilder::new();
    let mut c = b.contract("A");
    let body = vec![b.break_stmt()];
    c.functions.push(b.function("f", vec![], vec![], body));
    let program = Program { contracts: vec![c] };

    let err = body_of(&program, "A", "f").unwrap_err();
    assert!(matches!(err, TranslateError::IllegalContext { .. }), "{err:?}");
}

#[test]
fn mapping_entries_go_through_read_and_write() {
    let b = AstBuilder::new();
    let mut c = b.contract("A");
    let balances = b.state_var("balances", b.mapping(b.address(), b.uint(256)));
    let uint = SourceType::Elementary(ElementaryType::UINT256);
    let k = b.var("k", b.address());
    let read = b.index(b.ident(&balances), b.ident(&k), uint);
    let write = b.index(b.ident(&balances), b.ident(&k), uint);
    let body = vec![b.expr_stmt(b.assign(
        write,
        b.binary(read, BinOp::Add, b.number(1)),
    ))];
    c.state_vars.push(balances);
    c.functions.push(b.function("f", vec![k], vec![], body));
    let program = Program { contracts: vec![c] };

    assert_eq!(
        body_of(&program, "A", "f").unwrap(),
        "{\n  Write_Map_1(&self->d_balances, k, (Read_Map_1(&self->d_balances, k))+(1));\n}"
    );
}

#[test]
fn call_state_and_enum_values() {
    let b = AstBuilder::new();
    let mut c = b.contract("A");
    let owner = b.state_var("owner", b.address());
    let stage = b.enum_def("Stage", &["Open", "Closed"]);
    let phase = b.state_var("phase", b.user_type("Stage", stage.id));
    let closed = b.member_ref(
        b.ident_ref("Stage", stage.id, SourceType::TypeExpr),
        "Closed",
        stage.values[1].id,
        SourceType::Enum(stage.id),
    );
    let body = vec![
        b.expr_stmt(b.assign(b.ident(&owner), b.member(b.builtin("msg"), "sender"))),
        b.expr_stmt(b.assign(b.ident(&phase), closed)),
        b.expr_stmt(b.builtin("now")),
    ];
    c.enums.push(stage);
    c.state_vars.push(owner);
    c.state_vars.push(phase);
    c.functions.push(b.function("f", vec![], vec![], body));
    let program = Program { contracts: vec![c] };

    assert_eq!(
        body_of(&program, "A", "f").unwrap(),
        "{\n  (self->d_owner)=(state->sender);\n  (self->d_phase)=(1);\n  state->timestamp;\n}"
    );
}

#[test]
fn modifiers_wrap_the_function_body() {
    let b = AstBuilder::new();
    let mut c = b.contract("A");
    let owner = b.state_var("owner", b.address());
    let only_owner = b.modifier(
        "onlyOwner",
        vec![],
        vec![
            b.expr_stmt(b.call(
                b.builtin("require"),
                vec![b.binary(
                    b.member(b.builtin("msg"), "sender"),
                    BinOp::Eq,
                    b.ident(&owner),
                )],
            )),
            b.placeholder(),
        ],
    );
    let mut f = b.function("f", vec![], vec![], vec![]);
    f.modifiers.push(b.invoke(&only_owner, vec![]));
    c.state_vars.push(owner);
    c.modifiers.push(only_owner);
    c.functions.push(f);
    let program = Program { contracts: vec![c] };

    let lowered = with_context(&program, "A", |cx| {
        lower_function(cx, &cx.contract.functions[0], 1)
    })
    .unwrap();
    let names: Vec<_> = lowered.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["A_Method_f_base", "A_Method_f"]);
    assert_eq!(
        lowered[1].body.to_string(),
        "{\n  assume((state->sender)==(self->d_owner));\n  A_Method_f_base(self, state);\n}"
    );
}

#[test]
fn modifier_chain_threads_the_result_of_non_void_functions() {
    let b = AstBuilder::new();
    let mut c = b.contract("A");
    let first = b.modifier("first", vec![], vec![b.placeholder()]);
    let limit = b.var("limit", b.uint(256));
    let second = b.modifier(
        "second",
        vec![limit.clone()],
        vec![
            b.expr_stmt(b.call(
                b.builtin("require"),
                vec![b.binary(b.ident(&limit), BinOp::Gt, b.number(0))],
            )),
            b.placeholder(),
        ],
    );
    let x = b.var("x", b.uint(256));
    let mut g = b.function(
        "g",
        vec![x.clone()],
        vec![b.var("", b.uint(256))],
        vec![b.ret(Some(b.ident(&x)))],
    );
    g.modifiers.push(b.invoke(&first, vec![]));
    g.modifiers.push(b.invoke(&second, vec![b.ident(&x)]));
    c.modifiers.push(first);
    c.modifiers.push(second);
    c.functions.push(g);
    let program = Program { contracts: vec![c] };

    let lowered = with_context(&program, "A", |cx| {
        lower_function(cx, &cx.contract.functions[0], 1)
    })
    .unwrap();
    let names: Vec<_> = lowered.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["A_Method_g_base", "A_Modifier_second_A_Method_g", "A_Method_g"]
    );

    let second = lowered[1].body.to_string();
    assert!(second.contains("sol_uint256_t modifier_result = Init_sol_uint256_t(0);"));
    assert!(second.contains("sol_uint256_t second_limit = x;"));
    assert!(second.contains("assume((second_limit)>(0));"));
    assert!(second.contains("(modifier_result)=(A_Method_g_base(self, state, x));"));
    assert!(second.ends_with("  return modifier_result;\n}"));

    let entry = lowered[2].body.to_string();
    assert!(entry.contains("(modifier_result)=(A_Modifier_second_A_Method_g(self, state, x));"));
}

#[test]
fn modifier_parameters_do_not_shadow_function_parameters() {
    let b = AstBuilder::new();
    let mut c = b.contract("A");
    let mx = b.var("x", b.uint(256));
    let my = b.var("y", b.uint(256));
    let m = b.modifier(
        "m",
        vec![mx.clone()],
        vec![
            b.decl_stmt(my.clone(), Some(b.ident(&mx))),
            b.expr_stmt(b.call(
                b.builtin("require"),
                vec![b.binary(b.ident(&my), BinOp::Gt, b.number(0))],
            )),
            b.placeholder(),
        ],
    );
    let x = b.var("x", b.uint(256));
    let mut f = b.function("f", vec![x.clone()], vec![], vec![]);
    f.modifiers
        .push(b.invoke(&m, vec![b.binary(b.ident(&x), BinOp::Add, b.number(1))]));
    c.modifiers.push(m);
    c.functions.push(f);
    let program = Program { contracts: vec![c] };

    let lowered = with_context(&program, "A", |cx| {
        lower_function(cx, &cx.contract.functions[0], 1)
    })
    .unwrap();
    let params: Vec<_> = lowered[1].params.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(params, vec!["self", "state", "x"]);
    assert_eq!(
        lowered[1].body.to_string(),
        "{\n  sol_uint256_t m_x = (x)+(1);\n  sol_uint256_t m_y = m_x;\n  assume((m_y)>(0));\n  A_Method_f_base(self, state, x);\n}"
    );
}

#[test]
fn names_reserved_by_the_model_are_rejected() {
    let b = AstBuilder::new();
    let mut c = b.contract("A");
    c.functions
        .push(b.function("f", vec![b.var("state", b.uint(256))], vec![], vec![]));
    let local = b.var("self", b.uint(256));
    c.functions
        .push(b.function("g", vec![], vec![], vec![b.decl_stmt(local, None)]));
    let program = Program { contracts: vec![c] };

    let err = with_context(&program, "A", |cx| {
        lower_function(cx, &cx.contract.functions[0], 1)
    })
    .unwrap_err();
    assert!(matches!(err, TranslateError::Unsupported { .. }), "{err:?}");
    assert!(err.to_string().contains("`state`"), "{err}");

    let err = body_of(&program, "A", "g").unwrap_err();
    assert!(matches!(err, TranslateError::Unsupported { .. }), "{err:?}");
    assert!(err.to_string().contains("`self`"), "{err}");
}

#[test]
fn for_initialiser_must_be_a_declaration_or_expression() {
    let b = AstBuilder::new();
    let mut c = b.contract("A");
    let body = vec![b.for_stmt(
        Some(b.block_stmt(vec![])),
        None,
        None,
        b.block_stmt(vec![b.break_stmt()]),
    )];
    c.functions.push(b.function("f", vec![], vec![], body));
    let program = Program { contracts: vec![c] };

    let err = body_of(&program, "A", "f").unwrap_err();
    assert!(matches!(err, TranslateError::Unsupported { .. }), "{err:?}");
}

#[test]
fn inline_assembly_is_unsupported() {
    let b = AstBuilder::new();
    let mut c = b.contract("A");
    c.functions
        .push(b.function("f", vec![], vec![], vec![b.assembly()]));
    let program = Program { contracts: vec![c] };

    let err = body_of(&program, "A", "f").unwrap_err();
    assert!(matches!(err, TranslateError::Unsupported { .. }), "{err:?}");
}

#[test]
fn continue_outside_a_loop_is_rejected() {
    let b = AstBuilder::new();
    let mut c = b.contract("A");
    c.functions
        .push(b.function("f", vec![], vec![], vec![b.continue_stmt()]));
    let program = Program { contracts: vec![c] };

    let err = body_of(&program, "A", "f").unwrap_err();
    assert!(matches!(err, TranslateError::IllegalContext { .. }), "{err:?}");
}

#[test]
fn placeholder_outside_a_modifier_is_rejected() {
    let b = AstBuilder::new();
    let mut c = b.contract("A");
    c.functions
        .push(b.function("f", vec![], vec![], vec![b.placeholder()]));
    let program = Program { contracts: vec![c] };

    let err = body_of(&program, "A", "f").unwrap_err();
    assert!(matches!(err, TranslateError::IllegalContext { .. }), "{err:?}");
}

#[test]
fn unknown_builtins_are_unsupported() {
    let b = AstBuilder::new();
    for name in ["keccak256", "selfdestruct"] {
        let mut c = b.contract("A");
        let call = b.call(b.builtin(name), vec![b.number(1)]);
        c.functions
            .push(b.function("f", vec![], vec![], vec![b.expr_stmt(call)]));
        let program = Program { contracts: vec![c] };
        let maps = FlatMappingSummary::build(&program);

        let err = types::resolve(&program, &maps, 5).unwrap_err();
        assert!(matches!(err, TranslateError::Unsupported { .. }), "{err:?}");
        assert!(err.to_string().contains(name), "{err}");
    }
}

#[test]
fn constructor_initialises_fields_and_children() {
    let b = AstBuilder::new();
    let child = b.contract("B");
    let mut parent = b.contract("A");
    let total = b.state_var("total", b.uint(256));
    let slot = b.state_var("child", b.user_type("B", child.id));
    let ctor = b.constructor(
        vec![],
        vec![b.expr_stmt(b.assign(
            b.ident_ref("child", slot.id, SourceType::Contract(child.id)),
            b.new_contract(&child, vec![]),
        ))],
    );
    parent.state_vars.push(total);
    parent.state_vars.push(slot);
    parent.functions.push(ctor);
    let program = Program {
        contracts: vec![child, parent],
    };

    let init = with_context(&program, "A", lower_constructor).unwrap();
    assert_eq!(init.name, "Init_A");
    assert_eq!(
        init.to_string(),
        "void Init_A(struct A *self, struct CallState *state)\n{\n  (self->d_total)=(Init_sol_uint256_t(0));\n  Init_B(&self->d_child, state);\n}"
    );
}

#[test]
fn array_and_function_types_are_unsupported() {
    let b = AstBuilder::new();
    for ty in [b.array(b.uint(256)), b.function_type()] {
        let mut c = b.contract("A");
        c.state_vars.push(b.state_var("xs", ty));
        let program = Program { contracts: vec![c] };
        let maps = FlatMappingSummary::build(&program);
        let err = types::resolve(&program, &maps, 5).unwrap_err();
        assert!(matches!(err, TranslateError::Unsupported { .. }), "{err:?}");
    }
}

#[test]
fn multiple_return_values_are_unsupported() {
    let b = AstBuilder::new();
    let mut c = b.contract("A");
    c.functions.push(b.function(
        "pair",
        vec![],
        vec![b.var("", b.uint(256)), b.var("", b.uint(256))],
        vec![],
    ));
    let program = Program { contracts: vec![c] };
    let maps = FlatMappingSummary::build(&program);

    let err = types::resolve(&program, &maps, 5).unwrap_err();
    assert!(err.to_string().contains("multiple return values"), "{err}");
}
