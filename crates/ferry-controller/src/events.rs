//! Condition change events

use ferry_api::{Condition, ConditionDiff, ObjectKey};
use parking_lot::Mutex;

/// Event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Normal,
    Warning,
}

/// Event attached to an object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub object: ObjectKey,
    pub event_type: EventType,
    pub reason: String,
    pub message: String,
}

impl Event {
    /// Event for a condition that was raised or changed
    #[must_use]
    pub fn for_condition(object: &ObjectKey, condition: &Condition) -> Self {
        Self {
            object: object.clone(),
            event_type: if condition.is_blocker() {
                EventType::Warning
            } else {
                EventType::Normal
            },
            reason: condition.type_.clone(),
            message: condition.message.clone(),
        }
    }
}

/// Sink for events
#[cfg_attr(test, mockall::automock)]
pub trait EventRecorder: Send + Sync {
    fn record(&self, event: Event);
}

/// Emit one event per added or changed condition
pub fn record_condition_changes(recorder: &dyn EventRecorder, object: &ObjectKey, diff: &ConditionDiff) {
    for condition in diff.added.iter().chain(&diff.changed) {
        recorder.record(Event::for_condition(object, condition));
    }
}

/// Writes events to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRecorder;

impl EventRecorder for TracingRecorder {
    fn record(&self, event: Event) {
        match event.event_type {
            EventType::Normal => tracing::info!(
                object = %event.object,
                reason = %event.reason,
                "{}",
                event.message
            ),
            EventType::Warning => tracing::warn!(
                object = %event.object,
                reason = %event.reason,
                "{}",
                event.message
            ),
        }
    }
}

/// Keeps events in memory
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    events: Mutex<Vec<Event>>,
}

impl MemoryRecorder {
    /// Create new recorder
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded events, oldest first
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventRecorder for MemoryRecorder {
    fn record(&self, event: Event) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_api::{Category, ConditionStatus, Conditions};
    use mockall::predicate::*;

    fn staged(conditions: &mut Conditions, raise: &[(&str, Category)]) -> ConditionDiff {
        conditions.begin_staging();
        for (type_, category) in raise {
            conditions.set_condition(Condition::new(
                *type_,
                ConditionStatus::True,
                *category,
                format!("{type_} raised"),
            ));
        }
        conditions.end_staging()
    }

    #[test]
    fn blockers_are_warnings() {
        let key = ObjectKey::new("ns", "p");
        let mut conditions = Conditions::default();
        let diff = staged(
            &mut conditions,
            &[("VMNotFound", Category::Critical), ("Ready", Category::Required)],
        );

        let mut recorder = MockEventRecorder::new();
        recorder
            .expect_record()
            .with(function(|e: &Event| {
                e.reason == "VMNotFound" && e.event_type == EventType::Warning
            }))
            .times(1)
            .return_const(());
        recorder
            .expect_record()
            .with(function(|e: &Event| {
                e.reason == "Ready" && e.event_type == EventType::Normal
            }))
            .times(1)
            .return_const(());

        record_condition_changes(&recorder, &key, &diff);
    }

    #[test]
    fn unchanged_conditions_are_silent() {
        let key = ObjectKey::new("ns", "p");
        let mut conditions = Conditions::default();
        staged(&mut conditions, &[("Ready", Category::Required)]);
        let diff = staged(&mut conditions, &[("Ready", Category::Required)]);

        let mut recorder = MockEventRecorder::new();
        recorder.expect_record().never();
        record_condition_changes(&recorder, &key, &diff);
    }

    #[test]
    fn memory_recorder_keeps_order() {
        let recorder = MemoryRecorder::new();
        let key = ObjectKey::new("ns", "p");
        let mut conditions = Conditions::default();
        let diff = staged(
            &mut conditions,
            &[("A", Category::Advisory), ("B", Category::Warn)],
        );

        record_condition_changes(&recorder, &key, &diff);
        let reasons: Vec<String> = recorder.events().into_iter().map(|e| e.reason).collect();
        assert_eq!(reasons, vec!["A", "B"]);
    }
}
