//! Status conditions with two-phase staging
//!
//! A reconciliation pass re-asserts every condition that is still true.
//! Staging works as a diff against the previous pass:
//! 1. [`Conditions::begin_staging`] snapshots the current set
//! 2. the pass calls [`Conditions::set_condition`] / [`Conditions::delete_condition`]
//! 3. [`Conditions::end_staging`] keeps what was asserted plus durable
//!    conditions from the snapshot, and reports what changed
//!
//! Outside of staging, set/delete act on the current set directly.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ready condition type
pub const READY: &str = "Ready";
/// Executing condition type
pub const EXECUTING: &str = "Executing";
/// Succeeded condition type
pub const SUCCEEDED: &str = "Succeeded";
/// Failed condition type
pub const FAILED: &str = "Failed";

/// Condition status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
}

/// Condition category
///
/// `Critical` and `Error` conditions block execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Required,
    Advisory,
    Critical,
    Error,
    Warn,
}

impl Category {
    /// Check if conditions of this category block execution
    #[inline]
    #[must_use]
    pub fn is_blocker(self) -> bool {
        matches!(self, Category::Critical | Category::Error)
    }
}

/// Typed status entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    pub category: Category,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<String>,
    /// Durable conditions survive staging without being re-asserted
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub durable: bool,
    #[serde(default = "Utc::now")]
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Create new condition
    #[must_use]
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        category: Category,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            category,
            reason: String::new(),
            message: message.into(),
            items: Vec::new(),
            durable: false,
            last_transition_time: Utc::now(),
        }
    }

    /// With reason
    #[inline]
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// With items
    #[inline]
    #[must_use]
    pub fn with_items(mut self, items: Vec<String>) -> Self {
        self.items = items;
        self
    }

    /// Mark as durable
    #[inline]
    #[must_use]
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    /// Check if this condition blocks execution
    #[inline]
    #[must_use]
    pub fn is_blocker(&self) -> bool {
        self.status == ConditionStatus::True && self.category.is_blocker()
    }

    /// Same content, ignoring the transition time
    fn same_as(&self, other: &Condition) -> bool {
        self.type_ == other.type_
            && self.status == other.status
            && self.category == other.category
            && self.reason == other.reason
            && self.message == other.message
            && self.items == other.items
            && self.durable == other.durable
    }

    /// Keep the previous transition time when the status did not flip.
    fn carry_transition(mut self, previous: Option<&Condition>) -> Self {
        if let Some(prev) = previous {
            if prev.status == self.status {
                self.last_transition_time = prev.last_transition_time;
            }
        }
        self
    }
}

/// Result of a staging pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionDiff {
    /// Conditions asserted this pass that did not exist before
    pub added: Vec<Condition>,
    /// Conditions whose content changed
    pub changed: Vec<Condition>,
    /// Conditions dropped this pass
    pub removed: Vec<Condition>,
}

impl ConditionDiff {
    /// Check if the pass changed nothing
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
struct Staging {
    previous: IndexMap<String, Condition>,
    asserted: IndexMap<String, Condition>,
}

/// Condition set attached to an object status
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conditions {
    list: Vec<Condition>,
    #[serde(skip)]
    staging: Option<Staging>,
}

impl PartialEq for Conditions {
    fn eq(&self, other: &Self) -> bool {
        self.list == other.list
    }
}

impl Conditions {
    /// Start a staging pass
    ///
    /// Calling this while already staging restarts the pass from the
    /// current list.
    pub fn begin_staging(&mut self) {
        let previous = self
            .list
            .iter()
            .map(|c| (c.type_.clone(), c.clone()))
            .collect();
        self.staging = Some(Staging {
            previous,
            asserted: IndexMap::new(),
        });
    }

    /// Check if a staging pass is open
    #[inline]
    #[must_use]
    pub fn is_staging(&self) -> bool {
        self.staging.is_some()
    }

    /// Finish the staging pass and report the difference.
    ///
    /// The retained set keeps the previous order for surviving types, then
    /// appends newly asserted types in assertion order.
    pub fn end_staging(&mut self) -> ConditionDiff {
        let Some(Staging {
            previous,
            mut asserted,
        }) = self.staging.take()
        else {
            return ConditionDiff::default();
        };

        let mut retained = Vec::with_capacity(previous.len() + asserted.len());
        let mut diff = ConditionDiff::default();

        for (type_, prev) in &previous {
            if let Some(next) = asserted.shift_remove(type_) {
                if !next.same_as(prev) {
                    diff.changed.push(next.clone());
                }
                retained.push(next);
            } else if prev.durable {
                retained.push(prev.clone());
            } else {
                diff.removed.push(prev.clone());
            }
        }
        for (_, next) in asserted {
            diff.added.push(next.clone());
            retained.push(next);
        }

        self.list = retained;
        diff
    }

    /// Assert a condition
    pub fn set_condition(&mut self, condition: Condition) {
        match &mut self.staging {
            Some(staging) => {
                let previous = staging.previous.get(&condition.type_);
                let condition = condition.carry_transition(previous);
                staging.asserted.insert(condition.type_.clone(), condition);
            }
            None => {
                if let Some(existing) = self.list.iter_mut().find(|c| c.type_ == condition.type_) {
                    *existing = condition.carry_transition(Some(&*existing));
                } else {
                    self.list.push(condition);
                }
            }
        }
    }

    /// Remove conditions by type
    ///
    /// While staging, this also drops durable conditions from the snapshot
    /// so they are not carried forward.
    pub fn delete_condition(&mut self, types: &[&str]) {
        match &mut self.staging {
            Some(staging) => {
                for type_ in types {
                    staging.asserted.shift_remove(*type_);
                    staging.previous.shift_remove(*type_);
                }
            }
            None => self.list.retain(|c| !types.contains(&c.type_.as_str())),
        }
    }

    /// Find a current condition by type
    #[must_use]
    pub fn find(&self, type_: &str) -> Option<&Condition> {
        self.current().find(|c| c.type_ == type_)
    }

    /// Check if a condition of this type is currently true
    #[must_use]
    pub fn is_true(&self, type_: &str) -> bool {
        self.find(type_)
            .is_some_and(|c| c.status == ConditionStatus::True)
    }

    /// Check if any current condition blocks execution
    #[must_use]
    pub fn has_blocker_condition(&self) -> bool {
        self.current().any(Condition::is_blocker)
    }

    /// Committed condition list
    #[inline]
    #[must_use]
    pub fn list(&self) -> &[Condition] {
        &self.list
    }

    /// Conditions that are true right now: during staging, the asserted ones
    /// plus durable ones from the snapshot.
    fn current(&self) -> Box<dyn Iterator<Item = &Condition> + '_> {
        match &self.staging {
            Some(staging) => Box::new(
                staging.asserted.values().chain(
                    staging
                        .previous
                        .values()
                        .filter(|c| c.durable && !staging.asserted.contains_key(&c.type_)),
                ),
            ),
            None => Box::new(self.list.iter()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn cond(type_: &str, category: Category) -> Condition {
        Condition::new(type_, ConditionStatus::True, category, format!("{type_} message"))
    }

    #[test]
    fn staging_drops_conditions_not_reasserted() {
        let mut conditions = Conditions::default();
        conditions.set_condition(cond("A", Category::Critical));
        conditions.set_condition(cond("B", Category::Advisory));

        conditions.begin_staging();
        conditions.set_condition(cond("B", Category::Advisory));
        let diff = conditions.end_staging();

        assert_eq!(conditions.list().len(), 1);
        assert_eq!(conditions.list()[0].type_, "B");
        assert_eq!(diff.removed.len(), 1);
        assert_eq!(diff.removed[0].type_, "A");
        assert!(diff.added.is_empty());
        assert!(diff.changed.is_empty());
    }

    #[test]
    fn staging_keeps_durable_conditions() {
        let mut conditions = Conditions::default();
        conditions.set_condition(cond(SUCCEEDED, Category::Advisory).durable());

        conditions.begin_staging();
        conditions.set_condition(cond(READY, Category::Required));
        let diff = conditions.end_staging();

        assert!(conditions.is_true(SUCCEEDED));
        assert!(conditions.is_true(READY));
        assert_eq!(diff.added.len(), 1);
        assert!(diff.removed.is_empty());
    }

    #[test]
    fn delete_during_staging_drops_durable() {
        let mut conditions = Conditions::default();
        conditions.set_condition(cond(FAILED, Category::Advisory).durable());

        conditions.begin_staging();
        conditions.delete_condition(&[FAILED]);
        conditions.end_staging();

        assert!(conditions.find(FAILED).is_none());
    }

    #[test]
    fn transition_time_preserved_when_status_unchanged() {
        let mut conditions = Conditions::default();
        let mut first = cond(READY, Category::Required);
        first.last_transition_time = DateTime::<Utc>::from_timestamp(0, 0).unwrap();
        conditions.set_condition(first.clone());

        conditions.begin_staging();
        conditions.set_condition(cond(READY, Category::Required));
        let diff = conditions.end_staging();

        assert!(diff.is_empty());
        assert_eq!(conditions.list()[0].last_transition_time, first.last_transition_time);
    }

    #[test]
    fn changed_message_reported() {
        let mut conditions = Conditions::default();
        conditions.set_condition(cond("A", Category::Critical));

        conditions.begin_staging();
        conditions.set_condition(
            Condition::new("A", ConditionStatus::True, Category::Critical, "other"),
        );
        let diff = conditions.end_staging();

        assert_eq!(diff.changed.len(), 1);
        assert_eq!(diff.changed[0].message, "other");
    }

    #[test]
    fn blocker_detection_during_staging() {
        let mut conditions = Conditions::default();
        conditions.set_condition(cond("A", Category::Critical));
        assert!(conditions.has_blocker_condition());

        conditions.begin_staging();
        assert!(!conditions.has_blocker_condition());
        conditions.set_condition(cond("W", Category::Warn));
        assert!(!conditions.has_blocker_condition());
        conditions.set_condition(cond("E", Category::Error));
        assert!(conditions.has_blocker_condition());
        conditions.end_staging();
    }

    #[test]
    fn false_status_is_not_blocker() {
        let condition = Condition::new("A", ConditionStatus::False, Category::Critical, "");
        assert!(!condition.is_blocker());
    }

    #[test]
    fn serializes_as_plain_list() {
        let mut conditions = Conditions::default();
        conditions.set_condition(cond(READY, Category::Required));
        let value = serde_json::to_value(&conditions).unwrap();
        assert!(value.is_array());
        let back: Conditions = serde_json::from_value(value).unwrap();
        assert_eq!(back, conditions);
    }

    proptest! {
        #[test]
        fn prop_restaging_same_set_is_noop(types in proptest::collection::btree_set("[A-E]", 0..5)) {
            let mut conditions = Conditions::default();
            conditions.begin_staging();
            for t in &types {
                conditions.set_condition(cond(t, Category::Advisory));
            }
            conditions.end_staging();
            let before = conditions.list().to_vec();

            conditions.begin_staging();
            for t in &types {
                conditions.set_condition(cond(t, Category::Advisory));
            }
            let diff = conditions.end_staging();

            prop_assert!(diff.is_empty());
            prop_assert_eq!(conditions.list(), before.as_slice());
        }
    }
}
