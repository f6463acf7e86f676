//! Pending migration selection

use crate::store::{ObjectStore, StoreError};
use ferry_api::{Migration, Plan};

/// Migrations of `plan` that have not completed, oldest first
///
/// # Errors
/// Listing failures are returned unchanged.
pub async fn pending_migrations(
    store: &dyn ObjectStore,
    plan: &Plan,
) -> Result<Vec<Migration>, StoreError> {
    Ok(order_pending(plan, store.list_migrations().await?))
}

/// Filter and order migrations for `plan`
///
/// Ties on creation timestamp are broken by the `namespace/name` string, so
/// `ns/a` sorts before `ns/b` and `a-b/x` before `a/x`.
#[must_use]
pub fn order_pending(plan: &Plan, migrations: Vec<Migration>) -> Vec<Migration> {
    let mut pending: Vec<(String, Migration)> = migrations
        .into_iter()
        .filter(|m| m.matches(plan) && !m.status.marked_completed())
        .map(|m| (m.meta.key().to_string(), m))
        .collect();

    pending.sort_by(|(a_key, a), (b_key, b)| {
        a.meta
            .creation_timestamp
            .cmp(&b.meta.creation_timestamp)
            .then_with(|| a_key.cmp(b_key))
    });

    pending.into_iter().map(|(_, m)| m).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use ferry_api::{ObjectKey, ObjectMeta, PlanSpec};
    use pretty_assertions::assert_eq;

    fn plan() -> Plan {
        Plan::new(ObjectMeta::new("ns", "p"), PlanSpec::default())
    }

    fn migration(ns: &str, name: &str, secs: i64) -> Migration {
        let created = Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap();
        Migration::new(
            ObjectMeta::new(ns, name).created_at(created),
            ObjectKey::new("ns", "p"),
        )
    }

    fn names(migrations: &[Migration]) -> Vec<String> {
        migrations.iter().map(|m| m.meta.key().to_string()).collect()
    }

    #[test]
    fn oldest_first() {
        let ordered = order_pending(
            &plan(),
            vec![migration("ns", "late", 10), migration("ns", "early", 0)],
        );
        assert_eq!(names(&ordered), vec!["ns/early", "ns/late"]);
    }

    #[test]
    fn ties_break_on_key_string() {
        let ordered = order_pending(
            &plan(),
            vec![migration("ns", "b", 0), migration("ns", "a", 0)],
        );
        assert_eq!(names(&ordered), vec!["ns/a", "ns/b"]);
    }

    #[test]
    fn string_order_not_tuple_order() {
        // '-' sorts before '/' as a byte, while "a" < "a-b" as a namespace.
        let ordered = order_pending(
            &plan(),
            vec![migration("a", "x", 0), migration("a-b", "x", 0)],
        );
        assert_eq!(names(&ordered), vec!["a-b/x", "a/x"]);
    }

    #[test]
    fn excludes_completed_and_foreign() {
        let mut done = migration("ns", "done", 0);
        done.status.mark_completed();
        let foreign = Migration::new(ObjectMeta::new("ns", "other"), ObjectKey::new("ns", "q"));

        let ordered = order_pending(
            &plan(),
            vec![done, foreign, migration("ns", "next", 5)],
        );
        assert_eq!(names(&ordered), vec!["ns/next"]);
    }
}
