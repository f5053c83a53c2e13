//! JSONL replay scripts: one action or domain event per line.
//!
//! ```text
//! {"kind":"action","action":{"type":"ADD_COURSE","payload":{...}}}
//! {"kind":"event","event":{"type":"course_created","payload":{"course":{...}}}}
//! ```

use anyhow::Context;
use campus_core::Engine;
use campus_protocol::{DecodedAction, DomainEvent, SliceName, decode_action};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One line of a replay script.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScriptStep {
    /// Raw `{type, payload}` envelope; unknown types are skipped on replay.
    Action { action: Value },
    Event { event: DomainEvent },
}

/// Counters reported after a replay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub actions: usize,
    pub skipped_actions: usize,
    pub events: usize,
    pub handler_failures: usize,
    /// Events whose delivery stopped early under the halt policy.
    pub halted_events: usize,
    /// Entity count per slice once the script has run.
    pub final_counts: Vec<(SliceName, usize)>,
}

/// Parse a JSONL script. Blank lines are ignored.
pub fn parse_script(contents: &str) -> anyhow::Result<Vec<ScriptStep>> {
    let mut steps = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let step = serde_json::from_str(line)
            .with_context(|| format!("line {}: invalid script step", index + 1))?;
        steps.push(step);
    }
    Ok(steps)
}

/// Apply `steps` in order. A rejected action stops the replay; handler
/// failures are counted and logged.
pub fn replay(engine: &Engine, steps: &[ScriptStep]) -> anyhow::Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();
    for (index, step) in steps.iter().enumerate() {
        let number = index + 1;
        match step {
            ScriptStep::Action { action } => {
                match decode_action(action).with_context(|| format!("step {number}"))? {
                    DecodedAction::Known(action) => {
                        let tag = action.tag();
                        engine
                            .dispatch(action)
                            .with_context(|| format!("step {number}: {tag} rejected"))?;
                        summary.actions += 1;
                    }
                    DecodedAction::Unknown(tag) => {
                        debug!("skipping unknown action (step={}, type={})", number, tag);
                        summary.skipped_actions += 1;
                    }
                }
            }
            ScriptStep::Event { event } => {
                let report = engine
                    .emit(event)
                    .with_context(|| format!("step {number}: {} not delivered", event.tag()))?;
                for failure in &report.failures {
                    warn!(
                        "handler failed (step={}, handler={}, error={})",
                        number, failure.handler, failure.error
                    );
                }
                summary.events += 1;
                summary.handler_failures += report.failures.len();
                if report.halted {
                    summary.halted_events += 1;
                }
            }
        }
    }
    let state = engine.snapshot();
    summary.final_counts = state.counts();
    info!(
        "replay finished (actions={}, skipped={}, events={}, failures={}, version={})",
        summary.actions,
        summary.skipped_actions,
        summary.events,
        summary.handler_failures,
        state.version
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_config::CampusConfig;
    use campus_test_utils::{ManualClock, course};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn engine() -> Engine {
        Engine::with_parts(CampusConfig::default(), Arc::new(ManualClock::fixed()), None)
            .expect("engine")
    }

    fn art_101_script() -> String {
        let course = serde_json::to_value(course("c1", "t1")).expect("course");
        [
            json!({ "kind": "action", "action": { "type": "ADD_COURSE", "payload": course.clone() } }),
            json!({ "kind": "action", "action": { "type": "SYNC_GRADES", "payload": {} } }),
            json!({ "kind": "event", "event": { "type": "course_created", "payload": { "course": course } } }),
        ]
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join("\n\n")
    }

    #[test]
    fn parses_actions_and_events() {
        let steps = parse_script(&art_101_script()).expect("parse");
        assert_eq!(steps.len(), 3);
        assert!(matches!(steps[0], ScriptStep::Action { .. }));
        assert!(matches!(
            steps[2],
            ScriptStep::Event {
                event: DomainEvent::CourseCreated { .. }
            }
        ));
    }

    #[test]
    fn reports_the_bad_line() {
        let err = parse_script("\n{\"kind\":\"noop\"}").expect_err("bad step");
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn replays_the_art_101_scenario() {
        let engine = engine();
        let steps = parse_script(&art_101_script()).expect("parse");
        let summary = replay(&engine, &steps).expect("replay");
        assert_eq!(
            summary,
            ReplaySummary {
                actions: 1,
                skipped_actions: 1,
                events: 1,
                handler_failures: 0,
                halted_events: 0,
                final_counts: vec![
                    (SliceName::Courses, 1),
                    (SliceName::Aulas, 0),
                    (SliceName::Students, 0),
                    (SliceName::Events, 1),
                    (SliceName::Feed, 1),
                    (SliceName::Notifications, 1),
                    (SliceName::Conversations, 1),
                    (SliceName::Communications, 0),
                    (SliceName::ActivityLog, 1),
                    (SliceName::Onboarding, 0),
                ],
            }
        );
        let scoped = engine.scoped("t1");
        assert_eq!(scoped.courses.len(), 1);
        assert_eq!(scoped.events.len(), 1);
        assert_eq!(scoped.feed.len(), 1);
        assert_eq!(scoped.conversations.len(), 1);
        assert_eq!(scoped.notifications.len(), 1);
        assert_eq!(scoped.activity_log.len(), 1);
    }

    #[test]
    fn rejected_action_stops_the_replay() {
        let engine = engine();
        let steps = vec![
            ScriptStep::Action {
                action: json!({ "type": "ADD_COURSE", "payload": { "id": 3 } }),
            },
            ScriptStep::Action {
                action: json!({ "type": "DISMISS_ONBOARDING" }),
            },
        ];
        let err = replay(&engine, &steps).expect_err("malformed");
        assert!(err.to_string().contains("step 1"));
        assert!(!engine.snapshot().onboarding.is_dismissed);
    }
}
