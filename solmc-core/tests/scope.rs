use proptest::prelude::*;
use solmc_core::{ScopeResolver, ScopedName};

const RESERVED: [&str; 4] = ["this", "msg", "block", "tx"];

proptest! {
    #[test]
    fn names_are_local_exactly_while_their_frame_is_open(
        names in proptest::collection::vec("[a-z][a-z0-9_]{0,7}", 1..8),
        depth in 1usize..5,
    ) {
        prop_assume!(names.iter().all(|n| !RESERVED.contains(&n.as_str())));

        let mut scope = ScopeResolver::new();
        for _ in 0..depth {
            scope.enter();
        }
        for name in &names {
            scope.record(name);
        }
        for name in &names {
            prop_assert_eq!(scope.resolve(name), ScopedName::Local(name.clone()));
        }

        scope.enter();
        for name in &names {
            prop_assert!(scope.is_local(name));
        }
        scope.exit();

        for _ in 0..depth {
            scope.exit();
        }
        prop_assert_eq!(scope.depth(), 0);
        for name in &names {
            prop_assert_eq!(scope.resolve(name), ScopedName::Member(name.clone()));
        }
    }
}
