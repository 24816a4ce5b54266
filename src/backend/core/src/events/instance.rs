//! Instance aggregation.
//!
//! Reconstructs per-subject instances from a flat, unordered event stream.
//! Grouping is a single pass in arrival order: the first event seen for a
//! subject opens a new instance at the end of the output, later events for
//! that subject are appended to it. No sorting happens here; time order is
//! enforced by readers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::event::{Event, SubjectId};
use crate::error::{MindcraftError, Result};

/// Kind of the event that opens a session.
pub const START_EVENT: &str = "Start";
/// Kind of the event that closes a session.
pub const END_EVENT: &str = "End";

// =============================================================================
// Instance
// =============================================================================

/// All events recorded for one subject within one experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub subject: SubjectId,
    /// Events in arrival order.
    pub data: Vec<Event>,
}

impl Instance {
    pub fn new(subject: SubjectId) -> Self {
        Self {
            subject,
            data: Vec::new(),
        }
    }

    /// Copy of the events stably sorted by `time`, ties kept in arrival order.
    pub fn sorted_by_time(&self) -> Vec<Event> {
        sort_by_time(&self.data)
    }

    /// A session is complete once it has both a `Start` and an `End` event.
    pub fn is_complete(&self) -> bool {
        let started = self.data.iter().any(|e| e.is(START_EVENT));
        let ended = self.data.iter().any(|e| e.is(END_EVENT));
        started && ended
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Stable copy of `events` ordered by ascending `time`.
pub fn sort_by_time(events: &[Event]) -> Vec<Event> {
    let mut sorted = events.to_vec();
    sorted.sort_by_key(|e| e.time);
    sorted
}

// =============================================================================
// Grouping
// =============================================================================

/// Group one experiment's events into subject instances.
///
/// Instances appear in first-seen order; events keep arrival order.
pub fn group_by_subject<I>(events: I) -> Vec<Instance>
where
    I: IntoIterator<Item = Event>,
{
    let mut instances: Vec<Instance> = Vec::new();
    let mut index: HashMap<SubjectId, usize> = HashMap::new();

    for event in events {
        let slot = match index.get(&event.subject) {
            Some(&i) => i,
            None => {
                instances.push(Instance::new(event.subject.clone()));
                index.insert(event.subject.clone(), instances.len() - 1);
                instances.len() - 1
            }
        };
        instances[slot].data.push(event);
    }

    instances
}

/// Fail-fast grouping for input that may contain foreign events.
///
/// Rejects any event that belongs to another experiment or has an empty kind.
pub fn try_group_by_subject<I>(experiment: &str, events: I) -> Result<Vec<Instance>>
where
    I: IntoIterator<Item = Event>,
{
    let events: Vec<Event> = events.into_iter().collect();

    for (position, event) in events.iter().enumerate() {
        if event.experiment != experiment {
            return Err(MindcraftError::invalid_event(format!(
                "event {} belongs to experiment '{}', expected '{}'",
                position, event.experiment, experiment
            )));
        }
        if event.event.trim().is_empty() {
            return Err(MindcraftError::invalid_event(format!(
                "event {} has an empty kind",
                position
            )));
        }
    }

    Ok(group_by_subject(events))
}

/// Instances ordered by subject for a subject picker. The input is untouched.
pub fn sorted_by_subject(instances: &[Instance]) -> Vec<&Instance> {
    let mut sorted: Vec<&Instance> = instances.iter().collect();
    sorted.sort_by(|a, b| a.subject.cmp(&b.subject));
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn ev(subject: i64, kind: &str, time: i64) -> Event {
        Event::new("ProbMatch", subject, kind, time)
    }

    #[test]
    fn test_group_empty() {
        assert!(group_by_subject(Vec::<Event>::new()).is_empty());
    }

    #[test]
    fn test_group_first_seen_order() {
        let events = vec![ev(2, "Start", 1), ev(1, "Start", 2), ev(2, "End", 3)];
        let instances = group_by_subject(events);

        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].subject, SubjectId::from(2));
        assert_eq!(instances[0].len(), 2);
        assert_eq!(instances[1].subject, SubjectId::from(1));
        assert_eq!(instances[1].len(), 1);
    }

    #[test]
    fn test_group_preserves_arrival_order() {
        let events = vec![ev(1, "B", 5), ev(1, "A", 1), ev(1, "C", 3)];
        let instances = group_by_subject(events);
        let kinds: Vec<&str> = instances[0].data.iter().map(|e| e.event.as_str()).collect();
        assert_eq!(kinds, vec!["B", "A", "C"]);
    }

    #[test]
    fn test_string_and_integer_subjects_share_instance() {
        let text = Event::new("ProbMatch", "1".parse::<SubjectId>().unwrap(), "End", 2);
        let instances = group_by_subject(vec![ev(1, "Start", 1), text]);
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].len(), 2);
    }

    #[test]
    fn test_sorted_by_time_is_stable() {
        let mut instance = Instance::new(SubjectId::from(1));
        instance.data = vec![ev(1, "c", 5), ev(1, "a", 1), ev(1, "b1", 3), ev(1, "b2", 3)];

        let kinds: Vec<String> = instance
            .sorted_by_time()
            .into_iter()
            .map(|e| e.event)
            .collect();
        assert_eq!(kinds, vec!["a", "b1", "b2", "c"]);
        assert_eq!(instance.data[0].event, "c");
    }

    #[test]
    fn test_is_complete() {
        let mut instance = Instance::new(SubjectId::from(1));
        instance.data.push(ev(1, START_EVENT, 1));
        assert!(!instance.is_complete());
        instance.data.push(ev(1, END_EVENT, 2));
        assert!(instance.is_complete());
    }

    #[test]
    fn test_try_group_rejects_foreign_experiment() {
        let foreign = Event::new("Other", 1, "Start", 1);
        let err = try_group_by_subject("ProbMatch", vec![ev(1, "Start", 0), foreign]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidEvent);
    }

    #[test]
    fn test_try_group_accepts_matching() {
        let instances = try_group_by_subject("ProbMatch", vec![ev(1, "Start", 0)]).unwrap();
        assert_eq!(instances.len(), 1);
    }

    #[test]
    fn test_sorted_by_subject_leaves_input() {
        let instances = group_by_subject(vec![ev(10, "Start", 0), ev(9, "Start", 0), ev(100, "Start", 0)]);
        let order: Vec<i64> = sorted_by_subject(&instances)
            .iter()
            .filter_map(|i| i.subject.as_integer())
            .collect();
        assert_eq!(order, vec![9, 10, 100]);
        assert_eq!(instances[0].subject, SubjectId::from(10));
    }
}
