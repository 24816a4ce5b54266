//! Probability-matching experiment processor.
//!
//! Subjects press a left or a right button; each `ButtonPress` event carries
//! `args.left`. The processor reports how many presses happened and which
//! share of them went left.

use serde_json::Value;

use super::{Processor, StatPair, StatValue};
use crate::events::{Event, Instance};

/// Experiment name the processor is conventionally registered under.
pub const EXPERIMENT_NAME: &str = "ProbMatch";

const BUTTON_PRESS: &str = "ButtonPress";

#[derive(Debug, Clone, Copy, Default)]
pub struct ProbMatchProcessor;

impl ProbMatchProcessor {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct PressCount {
    total: usize,
    left: usize,
}

impl PressCount {
    fn tally<'a>(mut self, events: impl IntoIterator<Item = &'a Event>) -> Self {
        for event in events.into_iter().filter(|e| e.is(BUTTON_PRESS)) {
            self.total += 1;
            if event.arg("left").is_some_and(is_truthy) {
                self.left += 1;
            }
        }
        self
    }

    fn rows(self) -> Vec<StatPair> {
        vec![
            StatPair::new("Button Presses", self.total),
            StatPair::new("% Left", percent_left(self.left, self.total)),
        ]
    }
}

impl Processor for ProbMatchProcessor {
    fn global_stats(&self, instances: &[Instance]) -> Vec<StatPair> {
        instances
            .iter()
            .fold(PressCount::default(), |count, instance| count.tally(&instance.data))
            .rows()
    }

    fn instance_stats(&self, events: &[Event]) -> Vec<StatPair> {
        PressCount::default().tally(events).rows()
    }
}

/// `left / total * 100` with the shortest round-trip decimal, then `%`.
fn percent_left(left: usize, total: usize) -> StatValue {
    if total == 0 {
        return StatValue::from("N/A");
    }
    let percent = (left as f64 / total as f64) * 100.0;
    StatValue::Text(format!("{}%", percent))
}

/// JavaScript-style truthiness of a JSON value.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::group_by_subject;
    use serde_json::json;

    fn press(subject: i64, left: bool, time: i64) -> Event {
        Event::new(EXPERIMENT_NAME, subject, BUTTON_PRESS, time).with_args(json!({ "left": left }))
    }

    #[test]
    fn test_instance_stats_half_left() {
        let events = vec![
            Event::new(EXPERIMENT_NAME, 1, "Start", 1),
            press(1, true, 2),
            press(1, false, 3),
            Event::new(EXPERIMENT_NAME, 1, "End", 4),
        ];

        let rows = ProbMatchProcessor.instance_stats(&events);
        assert_eq!(
            rows,
            vec![
                StatPair::new("Button Presses", 2_usize),
                StatPair::new("% Left", "50%"),
            ]
        );
    }

    #[test]
    fn test_no_presses_is_not_applicable() {
        let rows = ProbMatchProcessor.instance_stats(&[Event::new(EXPERIMENT_NAME, 1, "Start", 1)]);
        assert_eq!(rows[0].value, StatValue::Integer(0));
        assert_eq!(rows[1].value, StatValue::from("N/A"));
    }

    #[test]
    fn test_global_sums_instances() {
        let instances = group_by_subject(vec![
            press(1, true, 1),
            press(2, true, 2),
            press(2, true, 3),
            press(1, false, 4),
        ]);

        let rows = ProbMatchProcessor.global_stats(&instances);
        assert_eq!(rows[0].value, StatValue::Integer(4));
        assert_eq!(rows[1].value, StatValue::from("75%"));
    }

    #[test]
    fn test_truthiness() {
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!("yes")));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(null)));

        let missing_args = Event::new(EXPERIMENT_NAME, 1, BUTTON_PRESS, 1);
        let rows = ProbMatchProcessor.instance_stats(&[missing_args]);
        assert_eq!(rows[1].value, StatValue::from("0%"));
    }
}
