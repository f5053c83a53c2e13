//! End-to-end engine behavior: cascades, tenancy, audit log and persistence.

use campus_config::{CampusConfig, EngineConfig, FailurePolicy, PersistenceConfig};
use campus_core::{CampusCoreError, Clock, Engine, EventHandler, HandlerError, PersistencePort};
use campus_protocol::{
    Action, AppState, AttendanceRecord, AttendanceSheet, AttendanceStatus, CalendarEventType,
    CourseStatus, CourseSuspension, CourseType, DomainEvent, EventTag, OnboardingProgress,
    PartialAppState, Payment, SliceName,
};
use campus_test_utils::{
    CourseBuilder, FailingHandler, FailingPersistence, ManualClock, MemoryPersistence,
    RecordingHandler, StudentBuilder, course, student,
};
use chrono::TimeDelta;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

fn engine_with(config: CampusConfig, clock: Arc<ManualClock>) -> Engine {
    Engine::with_parts(config, clock, None).expect("engine")
}

fn engine() -> (Engine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::fixed());
    (engine_with(CampusConfig::default(), clock.clone()), clock)
}

fn payment(n: usize, tenant: &str) -> DomainEvent {
    DomainEvent::PaymentRecorded(Payment {
        payment_id: format!("p{n}"),
        institution_id: tenant.to_string(),
        student_id: "s1".to_string(),
        student_name: format!("Student {n}"),
        amount: 10.0,
        currency: "EUR".to_string(),
        concept: None,
    })
}

fn attendance(tenant: &str, records: &[(&str, AttendanceStatus)]) -> DomainEvent {
    DomainEvent::AttendanceTaken(AttendanceSheet {
        institution_id: tenant.to_string(),
        course_id: "c1".to_string(),
        taken_at: ManualClock::fixed().now(),
        records: records
            .iter()
            .map(|(student_id, status)| AttendanceRecord {
                student_id: student_id.to_string(),
                status: *status,
            })
            .collect(),
    })
}

/// Adding a course then announcing it produces exactly one of each
/// derived record.
#[test]
fn art_101_scenario() {
    let (engine, _clock) = engine();
    let c1 = course("c1", "t1");
    let state = engine
        .dispatch(Action::AddCourse(c1.clone()))
        .expect("add course");
    assert_eq!(*state.courses, vec![c1.clone()]);

    let report = engine
        .emit(&DomainEvent::CourseCreated { course: c1 })
        .expect("emit");
    assert!(report.is_clean());
    assert_eq!(report.delivered, 2);

    let state = engine.snapshot();
    assert_eq!(state.events.len(), 1);
    assert_eq!(state.feed.len(), 1);
    assert_eq!(state.conversations.len(), 1);
    assert_eq!(state.notifications.len(), 1);
    assert_eq!(state.activity_log.len(), 1);
    assert_eq!(state.activity_log[0].event_tag, EventTag::CourseCreated);
    assert_eq!(state.activity_log[0].message, "Course \"Art 101\" created");
}

#[test]
fn cascade_writes_only_the_emitting_tenant() {
    let (engine, _clock) = engine();
    engine
        .emit(&DomainEvent::CourseCreated {
            course: course("other", "t2"),
        })
        .expect("emit t2");
    let before = engine.snapshot();

    engine
        .emit(&DomainEvent::CourseCreated {
            course: CourseBuilder::new("c1", "t1").teacher("teacher-1").build(),
        })
        .expect("emit t1");
    let after = engine.snapshot();

    let new_events = &after.events[before.events.len()..];
    let new_feed = &after.feed[before.feed.len()..];
    let new_conversations = &after.conversations[before.conversations.len()..];
    let new_notifications = &after.notifications[before.notifications.len()..];
    assert_eq!(new_events.len(), 1);
    assert_eq!(new_feed.len(), 1);
    assert_eq!(new_conversations.len(), 1);
    assert_eq!(new_notifications.len(), 1);
    assert!(new_events.iter().all(|e| e.institution_id == "t1"));
    assert!(new_feed.iter().all(|f| f.institution_id == "t1"));
    assert!(new_conversations.iter().all(|c| c.institution_id == "t1"));
    assert!(new_notifications.iter().all(|n| n.institution_id == "t1"));
    assert_eq!(after.activity_log.len(), before.activity_log.len() + 1);

    let t2 = engine.scoped("t2");
    assert_eq!(t2.events.len(), 1);
    assert_eq!(t2.notifications.len(), 1);
    assert!(t2.events.iter().all(|e| e.source_course_id.as_deref() == Some("other")));
}

#[test]
fn attendance_never_leaves_percentage_range() {
    let (engine, _clock) = engine();
    engine
        .dispatch(Action::AddStudent(
            StudentBuilder::new("s1", "t1").attendance_rate(3.0).build(),
        ))
        .expect("s1");
    engine
        .dispatch(Action::AddStudent(
            StudentBuilder::new("s2", "t1").attendance_rate(98.0).build(),
        ))
        .expect("s2");

    for _ in 0..10 {
        engine
            .emit(&attendance(
                "t1",
                &[
                    ("s1", AttendanceStatus::Absent),
                    ("s2", AttendanceStatus::Present),
                ],
            ))
            .expect("emit");
        for student in engine.snapshot().students.iter() {
            assert!((0.0..=100.0).contains(&student.attendance_rate));
        }
    }
    let state = engine.snapshot();
    assert_eq!(state.students[0].attendance_rate, 0.0);
    assert_eq!(state.students[1].attendance_rate, 100.0);
    assert_eq!(state.notifications.len(), 10);
}

#[test]
fn activity_log_keeps_fifty_newest_descending() {
    let (engine, clock) = engine();
    for n in 0..60 {
        clock.advance(TimeDelta::minutes(1));
        engine.emit(&payment(n, "t1")).expect("emit");
    }
    let log = &engine.snapshot().activity_log;
    assert_eq!(log.len(), 50);
    assert!(log[0].message.contains("Student 59"));
    assert!(log[49].message.contains("Student 10"));
    assert!(log.windows(2).all(|pair| pair[0].timestamp > pair[1].timestamp));
}

#[test]
fn failing_subscriber_is_isolated() {
    let (engine, _clock) = engine();
    let _broken = engine.bus().subscribe(
        EventTag::PaymentRecorded,
        Arc::new(FailingHandler::new("webhook", "endpoint down")),
    );
    let recorder = Arc::new(RecordingHandler::<DomainEvent>::new("spy"));
    let _spy = engine
        .bus()
        .subscribe(EventTag::PaymentRecorded, recorder.clone());

    let report = engine.emit(&payment(1, "t1")).expect("emit");
    assert_eq!(report.delivered, 3);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].handler, "webhook");
    assert_eq!(recorder.count(), 1);

    let state = engine.snapshot();
    assert_eq!(state.notifications.len(), 1);
    assert_eq!(state.activity_log.len(), 1);
}

#[test]
fn halt_policy_skips_audit_after_failed_cascade() {
    let config = CampusConfig::builder()
        .engine(EngineConfig {
            handler_failures: FailurePolicy::Halt,
            ..EngineConfig::default()
        })
        .build();
    let engine = engine_with(config, Arc::new(ManualClock::fixed()));
    let report = engine
        .emit(&DomainEvent::CourseSuspended(CourseSuspension {
            course_id: "missing".to_string(),
            institution_id: "t1".to_string(),
            reason: None,
        }))
        .expect("emit");
    assert!(report.halted);
    assert_eq!(engine.snapshot().activity_log.len(), 0);
}

#[test]
fn observers_see_cascade_and_audit_commits() {
    let (engine, _clock) = engine();
    let versions = Arc::new(Mutex::new(Vec::new()));
    let sink = versions.clone();
    let disposer = engine.subscribe_state(move |state: &Arc<AppState>| {
        sink.lock().push(state.version);
    });
    engine
        .emit(&DomainEvent::CourseCreated {
            course: course("c1", "t1"),
        })
        .expect("emit");
    // Four cascade writes commit together, then the audit entry.
    assert_eq!(*versions.lock(), vec![4, 5]);
    disposer.dispose();
}

#[test]
fn restores_and_caches_configured_slices() {
    let seeded = PartialAppState {
        onboarding: Some(OnboardingProgress {
            completed_steps: vec!["profile".to_string()],
            is_dismissed: false,
        }),
        ..PartialAppState::default()
    };
    let port = Arc::new(MemoryPersistence::seeded(
        vec![SliceName::Onboarding, SliceName::ActivityLog],
        seeded,
    ));
    let engine = Engine::with_parts(
        CampusConfig::default(),
        Arc::new(ManualClock::fixed()),
        Some(port.clone() as Arc<dyn PersistencePort>),
    )
    .expect("engine");
    assert!(engine.snapshot().onboarding.is_completed("profile"));

    engine
        .dispatch(Action::AddStudent(student("s1", "t1")))
        .expect("student");
    engine.emit(&payment(1, "t1")).expect("emit");
    let stored = port.stored().expect("stored");
    assert_eq!(
        stored.slices(),
        vec![SliceName::ActivityLog, SliceName::Onboarding]
    );
    assert_eq!(stored.activity_log.expect("log").len(), 1);
    // Restore, the student, the payment cascade and its audit entry.
    assert_eq!(port.saves(), 4);
}

#[test]
fn broken_persistence_never_blocks_the_engine() {
    let port = Arc::new(FailingPersistence::new());
    let engine = Engine::with_parts(
        CampusConfig::default(),
        Arc::new(ManualClock::fixed()),
        Some(port.clone() as Arc<dyn PersistencePort>),
    )
    .expect("engine");
    engine.emit(&payment(1, "t1")).expect("emit");
    assert_eq!(engine.snapshot().notifications.len(), 1);
    assert!(port.attempts() >= 3);
}

#[test]
fn json_cache_survives_restart() {
    let temp = tempdir().expect("tempdir");
    let config = CampusConfig::builder()
        .persistence(PersistenceConfig {
            enabled: true,
            path: Some(temp.path().join("state.json").to_string_lossy().to_string()),
            ..PersistenceConfig::default()
        })
        .build();

    let engine = Engine::new(config.clone()).expect("engine");
    engine
        .dispatch(Action::CompleteOnboardingStep("rooms".to_string()))
        .expect("step");
    engine.emit(&payment(1, "t1")).expect("emit");
    engine.shutdown();

    let restarted = Engine::new(config).expect("engine");
    let state = restarted.snapshot();
    assert!(state.onboarding.is_completed("rooms"));
    assert_eq!(state.activity_log.len(), 1);
    assert!(state.notifications.is_empty());
}

#[test]
fn unknown_raw_actions_are_ignored() {
    let (engine, _clock) = engine();
    let before = engine.snapshot();
    let after = engine
        .dispatch_value(&serde_json::json!({ "type": "ARCHIVE_TERM", "payload": {} }))
        .expect("ignored");
    assert!(Arc::ptr_eq(&before, &after));

    let err = engine
        .dispatch(Action::AddStudent(
            StudentBuilder::new("s1", "").name("Ana").build(),
        ))
        .expect_err("blank tenant");
    assert!(matches!(err, CampusCoreError::Action(_)));
}

#[test]
fn disposed_subscriber_misses_later_emits() {
    let (engine, _clock) = engine();
    let recorder = Arc::new(RecordingHandler::<DomainEvent>::new("spy"));
    let disposer = engine
        .bus()
        .subscribe(EventTag::PaymentRecorded, recorder.clone());
    engine.emit(&payment(1, "t1")).expect("emit");
    disposer.dispose();
    engine.emit(&payment(2, "t1")).expect("emit");
    assert_eq!(recorder.events(), vec![payment(1, "t1")]);
}

/// Handler that takes a while and records when it starts and ends.
struct SlowHandler {
    trace: Mutex<Vec<String>>,
}

impl EventHandler<DomainEvent> for SlowHandler {
    fn name(&self) -> &str {
        "slow"
    }

    fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError> {
        let DomainEvent::PaymentRecorded(payment) = event else {
            return Ok(());
        };
        self.trace.lock().push(format!("start {}", payment.payment_id));
        thread::sleep(Duration::from_millis(50));
        self.trace.lock().push(format!("end {}", payment.payment_id));
        Ok(())
    }
}

#[test]
fn concurrent_emits_are_delivered_one_at_a_time() {
    let (engine, _clock) = engine();
    let slow = Arc::new(SlowHandler {
        trace: Mutex::new(Vec::new()),
    });
    let _slow = engine
        .bus()
        .subscribe(EventTag::PaymentRecorded, slow.clone());

    thread::scope(|scope| {
        for n in 1..=2 {
            let engine = &engine;
            scope.spawn(move || engine.emit(&payment(n, "t1")).expect("emit"));
        }
    });

    let trace = slow.trace.lock().clone();
    assert_eq!(trace.len(), 4);
    for pair in trace.chunks(2) {
        let id = pair[0].strip_prefix("start ").expect("start first");
        assert_eq!(pair[1], format!("end {id}"));
    }
    let state = engine.snapshot();
    assert_eq!(state.notifications.len(), 2);
    assert_eq!(state.activity_log.len(), 2);
}

#[test]
fn hydration_keeps_completed_steps_unique() {
    let (engine, _clock) = engine();
    let duplicated = PartialAppState {
        onboarding: Some(OnboardingProgress {
            completed_steps: vec!["a".to_string(), "a".to_string()],
            is_dismissed: false,
        }),
        ..PartialAppState::default()
    };
    let err = engine.hydrate(duplicated).expect_err("duplicate steps");
    assert!(matches!(err, CampusCoreError::Action(_)));
    assert!(engine.snapshot().onboarding.completed_steps.is_empty());

    let first = engine
        .dispatch(Action::CompleteOnboardingStep("a".to_string()))
        .expect("step");
    let again = engine
        .dispatch(Action::CompleteOnboardingStep("a".to_string()))
        .expect("step again");
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(again.onboarding.completed_steps, vec!["a".to_string()]);
}

#[test]
fn suspending_a_course_clears_only_its_calendar() {
    let (engine, _clock) = engine();
    let art = course("c1", "t1");
    let pottery = CourseBuilder::new("c2", "t1").title("Pottery").build();
    for course in [&art, &pottery] {
        engine
            .dispatch(Action::AddCourse(course.clone()))
            .expect("add course");
        engine
            .emit(&DomainEvent::CourseCreated {
                course: course.clone(),
            })
            .expect("created");
    }
    let before = engine.snapshot();
    assert_eq!(before.events.len(), 2);

    let report = engine
        .emit(&DomainEvent::CourseSuspended(CourseSuspension {
            course_id: "c1".to_string(),
            institution_id: "t1".to_string(),
            reason: None,
        }))
        .expect("suspended");
    assert!(report.is_clean());

    let after = engine.snapshot();
    let statuses: Vec<_> = after.courses.iter().map(|c| (c.id.as_str(), c.status)).collect();
    assert_eq!(
        statuses,
        vec![("c1", CourseStatus::Suspended), ("c2", CourseStatus::Active)]
    );
    let sources: Vec<_> = after
        .events
        .iter()
        .map(|e| e.source_course_id.as_deref())
        .collect();
    assert_eq!(sources, vec![Some("c2")]);
    assert_eq!(after.notifications.len(), before.notifications.len() + 1);
    assert_eq!(after.activity_log.len(), before.activity_log.len() + 1);
    assert_eq!(after.activity_log[0].event_tag, EventTag::CourseSuspended);
    assert_eq!(after.activity_log[0].message, "Course c1 suspended");
}

#[test]
fn course_type_picks_calendar_style() {
    let (engine, _clock) = engine();
    let cases = [
        ("w1", CourseType::Workshop, CalendarEventType::Workshop, "#f59e0b"),
        ("o1", CourseType::Online, CalendarEventType::Class, "#10b981"),
    ];
    for (id, course_type, _, _) in cases {
        engine
            .emit(&DomainEvent::CourseCreated {
                course: CourseBuilder::new(id, "t1").course_type(course_type).build(),
            })
            .expect("created");
    }
    let state = engine.snapshot();
    for (id, _, event_type, color) in cases {
        let event = state
            .events
            .iter()
            .find(|e| e.source_course_id.as_deref() == Some(id))
            .expect("placeholder event");
        assert_eq!(event.event_type, event_type);
        assert_eq!(event.color, color);
    }
}
