use solmc_ast::build::AstBuilder;
use solmc_ast::{ElementaryType, Program};
use solmc_core::{FlatMappingSummary, MappingSummary, types};

#[test]
fn mappings_of_one_shape_share_a_record() {
    let b = AstBuilder::new();
    let mut c = b.contract("Token");
    let balances = b.state_var("balances", b.mapping(b.address(), b.uint(256)));
    let credits = b.state_var("credits", b.mapping(b.address(), b.uint(256)));
    let allowed = b.state_var(
        "allowed",
        b.mapping(b.address(), b.mapping(b.address(), b.uint(256))),
    );
    let ids = [balances.id, credits.id, allowed.id];
    c.state_vars.extend([balances, credits, allowed]);
    let program = Program { contracts: vec![c] };

    let maps = FlatMappingSummary::build(&program);
    assert_eq!(maps.records().len(), 2);
    assert_eq!(maps.resolve(ids[0]).unwrap().name, "Map_1");
    assert_eq!(maps.resolve(ids[1]).unwrap().name, "Map_1");

    let nested = maps.resolve(ids[2]).unwrap();
    assert_eq!(nested.name, "Map_2");
    assert_eq!(nested.key_types.len(), 2);
}

#[test]
fn address_literals_are_collected_once_in_order() {
    let b = AstBuilder::new();
    let mut c = b.contract("A");
    let sink = b.state_var("sink", b.address());
    let address = ElementaryType::Address { payable: true };
    let body = vec![
        b.expr_stmt(b.assign(b.ident(&sink), b.convert(address, b.number(7)))),
        b.expr_stmt(b.assign(b.ident(&sink), b.convert(address, b.number(2)))),
        b.expr_stmt(b.assign(b.ident(&sink), b.convert(address, b.number(7)))),
    ];
    c.state_vars.push(sink);
    c.functions.push(b.function("f", vec![], vec![], body));
    let program = Program { contracts: vec![c] };

    let maps = FlatMappingSummary::build(&program);
    assert_eq!(maps.address_literals(), &[2, 7]);
}

#[test]
fn record_helpers_are_bounded_by_the_address_count() {
    let b = AstBuilder::new();
    let mut c = b.contract("A");
    c.state_vars
        .push(b.state_var("seen", b.mapping(b.address(), b.boolean())));
    let program = Program { contracts: vec![c] };

    let maps = FlatMappingSummary::build(&program);
    let types = types::resolve(&program, &maps, 2).unwrap();
    let defs = maps.definitions(&types).unwrap();

    assert_eq!(defs.structs.len(), 1);
    let fields: Vec<_> = defs.structs[0].fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(fields, vec!["set_0", "k0_0", "v_0", "set_1", "k0_1", "v_1"]);

    let names: Vec<_> = defs.functions.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["Read_Map_1", "Write_Map_1", "Init_0_Map_1", "ND_Map_1"]);

    let write = defs.functions[1].to_string();
    assert!(write.starts_with(
        "void Write_Map_1(struct Map_1 *m, sol_address_t k0, sol_bool_t v)"
    ));
    assert!(write.ends_with("  assume(0);\n}"));
}
