use ferry_api::{Migration, ObjectKey, Plan};
use ferry_controller::order_pending;
use ferry_test_utils::*;
use proptest::prelude::*;

fn migrations() -> impl Strategy<Value = Vec<Migration>> {
    prop::collection::vec(
        ("[a-c]{1,2}(-[a-c])?", "[a-c]{1,3}", 0i64..4, any::<bool>(), any::<bool>()),
        0..12,
    )
    .prop_map(|specs| {
        let mut seen = std::collections::HashSet::new();
        specs
            .into_iter()
            .filter(|(ns, name, ..)| seen.insert(format!("{ns}/{name}")))
            .map(|(ns, name, secs, done, foreign)| {
                let mut m = migration_in(&ns, &name, secs);
                if foreign {
                    m.spec.plan = ObjectKey::new("other", PLAN);
                }
                if done {
                    m.status.mark_started();
                    m.status.mark_completed();
                }
                m
            })
            .collect()
    })
}

fn plan() -> Plan {
    valid_plan()
}

fn keys(migrations: &[Migration]) -> Vec<String> {
    migrations.iter().map(|m| m.meta.key().to_string()).collect()
}

proptest! {
    #[test]
    fn order_ignores_listing_order(
        (listed, shuffled) in migrations().prop_flat_map(|ms| {
            let shuffled = Just(ms.clone()).prop_shuffle();
            (Just(ms), shuffled)
        })
    ) {
        let plan = plan();
        prop_assert_eq!(
            keys(&order_pending(&plan, listed)),
            keys(&order_pending(&plan, shuffled))
        );
    }

    #[test]
    fn order_is_by_time_then_key(listed in migrations()) {
        let ordered = order_pending(&plan(), listed);
        for pair in ordered.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            prop_assert!(!a.status.marked_completed());
            prop_assert!(
                (a.meta.creation_timestamp, a.meta.key().to_string())
                    < (b.meta.creation_timestamp, b.meta.key().to_string())
            );
        }
    }

    #[test]
    fn only_own_unfinished_migrations_kept(listed in migrations()) {
        let expected = listed
            .iter()
            .filter(|m| m.spec.plan == key(PLAN) && !m.status.marked_completed())
            .count();
        prop_assert_eq!(order_pending(&plan(), listed).len(), expected);
    }
}
