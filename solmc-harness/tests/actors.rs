use std::collections::HashSet;

use proptest::prelude::*;
use solmc_ast::build::AstBuilder;
use solmc_ast::Program;
use solmc_core::{AllReachable, NewCallGraph, TranslateError};
use solmc_harness::{ActorBuilder, AddressAllocator};

fn nested_program() -> Program {
    let b = AstBuilder::new();
    let mut leaf = b.contract("Leaf");
    leaf.functions.push(b.function("touch", vec![], vec![], vec![]));
    leaf.functions.push(b.function("poke", vec![], vec![], vec![]));

    let mut middle = b.contract("Middle");
    let mut left = b.state_var("left", b.user_type("Leaf", leaf.id));
    left.value = Some(b.new_contract(&leaf, vec![]));
    let mut right = b.state_var("right", b.user_type("Leaf", leaf.id));
    right.value = Some(b.new_contract(&leaf, vec![]));
    middle.state_vars.extend([left, right]);
    middle.functions.push(b.function("run", vec![], vec![], vec![]));

    Program {
        contracts: vec![leaf, middle],
    }
}

#[test]
fn actor_and_function_ids_are_unique() {
    let program = nested_program();
    let graph = NewCallGraph::build(&program);
    let mut actors = ActorBuilder::with_default_model(&program).unwrap();
    actors.setup(&graph, &AllReachable).unwrap();

    let built = actors.inspect().unwrap();
    // Leaf, Middle, and the two leaves Middle creates.
    assert_eq!(built.len(), 4);
    let ids: Vec<u64> = built.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![0, 1, 2, 3]);

    let fids: Vec<u64> = built
        .iter()
        .flat_map(|a| a.functions.iter().map(|f| f.fid))
        .collect();
    let distinct: HashSet<u64> = fids.iter().copied().collect();
    assert_eq!(fids.len(), 7);
    assert_eq!(distinct.len(), fids.len());

    let paths: Vec<String> = built.iter().map(|a| a.path.to_string()).collect();
    assert_eq!(
        paths,
        vec!["contract_0", "contract_1", "contract_1.d_left", "contract_1.d_right"]
    );
    assert_eq!(built.iter().filter(|a| a.is_root).count(), 2);
}

#[test]
fn recording_after_setup_is_rejected() {
    let program = nested_program();
    let graph = NewCallGraph::build(&program);
    let mut actors = ActorBuilder::new(&program);
    actors.record(&program.contracts[0]).unwrap();
    actors.setup(&graph, &AllReachable).unwrap();

    let err = actors.record(&program.contracts[1]).unwrap_err();
    assert!(matches!(err, TranslateError::IllegalContext { .. }));
    assert!(matches!(
        actors.setup(&graph, &AllReachable),
        Err(TranslateError::IllegalContext { .. })
    ));
}

#[test]
fn actors_are_unavailable_before_setup() {
    let program = nested_program();
    let actors = ActorBuilder::with_default_model(&program).unwrap();
    assert!(matches!(
        actors.inspect(),
        Err(TranslateError::IllegalContext { .. })
    ));
}

#[test]
fn interfaces_cannot_be_actors() {
    let b = AstBuilder::new();
    let program = Program {
        contracts: vec![b.interface("IToken")],
    };
    let err = ActorBuilder::with_model(&program, &["IToken".to_string()]).unwrap_err();
    assert!(matches!(err, TranslateError::Unsupported { .. }));
}

proptest! {
    #[test]
    fn reserved_addresses_increase_until_exhausted(
        literals in proptest::collection::vec(0u64..64, 0..6),
        count in 1u64..16,
    ) {
        let mut alloc = AddressAllocator::new(&literals, count);
        let first = alloc.min_addr();
        let mut last = None;
        while let Ok(addr) = alloc.reserve() {
            prop_assert!(addr >= first);
            if let Some(prev) = last {
                prop_assert_eq!(addr, prev + 1);
            }
            last = Some(addr);
        }
        prop_assert_eq!(last, count.checked_sub(1).filter(|l| *l >= first));
        prop_assert_eq!(alloc.remaining(), 0);
        let exhausted = matches!(
            alloc.reserve(),
            Err(TranslateError::AddressExhausted { count: c }) if c == count
        );
        prop_assert!(exhausted);
    }
}
