//! Actions consumed by the store's reduction function.

use crate::entity::{
    ActivityEntry, AulaId, CalendarEvent, CalendarEventType, ClassroomUnit, Communication,
    Conversation, Course, CourseId, CourseStatus, CourseType, FeedItem, Notification, Student,
    StudentId, StudentStatus, TenantScoped,
};
use crate::state::PartialAppState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

/// Tagged, immutable instruction for the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Replace the provided slices, leaving absent ones untouched.
    HydrateState(PartialAppState),
    AddCourse(Course),
    UpdateCourse(CoursePatch),
    DeleteCourse(EntityRef),
    AddAula(ClassroomUnit),
    UpdateAula(AulaPatch),
    DeleteAula(EntityRef),
    AddStudent(Student),
    UpdateStudent(StudentPatch),
    DeleteStudent(EntityRef),
    /// Increment a course's enrolled counter by one.
    EnrollStudent(Enrollment),
    AddEvent(CalendarEvent),
    UpdateEvent(EventPatch),
    DeleteEvent(EntityRef),
    AddFeedItem(FeedItem),
    DeleteFeedItem(EntityRef),
    AddNotification(Notification),
    MarkNotificationRead(EntityRef),
    AddConversation(Conversation),
    UpdateConversation(ConversationPatch),
    AddCommunication(Communication),
    CompleteOnboardingStep(String),
    DismissOnboarding,
    LogActivity(ActivityEntry),
}

impl Action {
    /// Every serialized action tag.
    pub const TAGS: [&'static str; 24] = [
        "HYDRATE_STATE",
        "ADD_COURSE",
        "UPDATE_COURSE",
        "DELETE_COURSE",
        "ADD_AULA",
        "UPDATE_AULA",
        "DELETE_AULA",
        "ADD_STUDENT",
        "UPDATE_STUDENT",
        "DELETE_STUDENT",
        "ENROLL_STUDENT",
        "ADD_EVENT",
        "UPDATE_EVENT",
        "DELETE_EVENT",
        "ADD_FEED_ITEM",
        "DELETE_FEED_ITEM",
        "ADD_NOTIFICATION",
        "MARK_NOTIFICATION_READ",
        "ADD_CONVERSATION",
        "UPDATE_CONVERSATION",
        "ADD_COMMUNICATION",
        "COMPLETE_ONBOARDING_STEP",
        "DISMISS_ONBOARDING",
        "LOG_ACTIVITY",
    ];

    /// Serialized tag of this action.
    pub fn tag(&self) -> &'static str {
        match self {
            Action::HydrateState(_) => "HYDRATE_STATE",
            Action::AddCourse(_) => "ADD_COURSE",
            Action::UpdateCourse(_) => "UPDATE_COURSE",
            Action::DeleteCourse(_) => "DELETE_COURSE",
            Action::AddAula(_) => "ADD_AULA",
            Action::UpdateAula(_) => "UPDATE_AULA",
            Action::DeleteAula(_) => "DELETE_AULA",
            Action::AddStudent(_) => "ADD_STUDENT",
            Action::UpdateStudent(_) => "UPDATE_STUDENT",
            Action::DeleteStudent(_) => "DELETE_STUDENT",
            Action::EnrollStudent(_) => "ENROLL_STUDENT",
            Action::AddEvent(_) => "ADD_EVENT",
            Action::UpdateEvent(_) => "UPDATE_EVENT",
            Action::DeleteEvent(_) => "DELETE_EVENT",
            Action::AddFeedItem(_) => "ADD_FEED_ITEM",
            Action::DeleteFeedItem(_) => "DELETE_FEED_ITEM",
            Action::AddNotification(_) => "ADD_NOTIFICATION",
            Action::MarkNotificationRead(_) => "MARK_NOTIFICATION_READ",
            Action::AddConversation(_) => "ADD_CONVERSATION",
            Action::UpdateConversation(_) => "UPDATE_CONVERSATION",
            Action::AddCommunication(_) => "ADD_COMMUNICATION",
            Action::CompleteOnboardingStep(_) => "COMPLETE_ONBOARDING_STEP",
            Action::DismissOnboarding => "DISMISS_ONBOARDING",
            Action::LogActivity(_) => "LOG_ACTIVITY",
        }
    }

    /// Reject payloads that would put corrupt data into the store.
    pub fn validate(&self) -> Result<(), ActionError> {
        let tag = self.tag();
        match self {
            Action::HydrateState(partial) => validate_partial(tag, partial),
            Action::AddCourse(course) => validate_course(tag, course),
            Action::AddAula(aula) => validate_scoped(tag, &aula.id, aula),
            Action::AddStudent(student) => validate_student(tag, student),
            Action::AddEvent(event) => validate_event(tag, event),
            Action::AddFeedItem(item) => validate_scoped(tag, &item.id, item),
            Action::AddNotification(notification) => {
                validate_scoped(tag, &notification.id, notification)
            }
            Action::AddConversation(conversation) => {
                validate_scoped(tag, &conversation.id, conversation)
            }
            Action::AddCommunication(communication) => {
                validate_scoped(tag, &communication.id, communication)
            }
            Action::UpdateCourse(patch) => require(tag, "id", &patch.id),
            Action::UpdateAula(patch) => require(tag, "id", &patch.id),
            Action::UpdateStudent(patch) => {
                require(tag, "id", &patch.id)?;
                match patch.attendance_rate {
                    Some(rate) => validate_rate(tag, rate),
                    None => Ok(()),
                }
            }
            Action::UpdateEvent(patch) => {
                require(tag, "id", &patch.id)?;
                match (patch.starts_at, patch.ends_at) {
                    (Some(starts_at), Some(ends_at)) if ends_at < starts_at => Err(
                        ActionError::invalid(tag, "ends_at", "ends before the event starts"),
                    ),
                    _ => Ok(()),
                }
            }
            Action::UpdateConversation(patch) => require(tag, "id", &patch.id),
            Action::DeleteCourse(target)
            | Action::DeleteAula(target)
            | Action::DeleteStudent(target)
            | Action::DeleteEvent(target)
            | Action::DeleteFeedItem(target)
            | Action::MarkNotificationRead(target) => require(tag, "id", &target.id),
            Action::EnrollStudent(enrollment) => {
                require(tag, "course_id", &enrollment.course_id)?;
                require(tag, "student_id", &enrollment.student_id)
            }
            Action::CompleteOnboardingStep(step_id) => require(tag, "step_id", step_id),
            Action::DismissOnboarding => Ok(()),
            Action::LogActivity(entry) => {
                require(tag, "id", &entry.id)?;
                require(tag, "message", &entry.message)
            }
        }
    }
}

/// Outcome of decoding an action from loosely typed JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedAction {
    /// Known tag with a well-formed payload.
    Known(Action),
    /// Tag this store does not understand.
    Unknown(String),
}

/// Decode `{ "type": ..., "payload": ... }` into an action.
///
/// Unknown tags are reported as [`DecodedAction::Unknown`] rather than as
/// errors; a known tag with a malformed payload is an error.
pub fn decode_action(value: &Value) -> Result<DecodedAction, ActionError> {
    let Some(tag) = value.get("type").and_then(Value::as_str) else {
        return Err(ActionError::Malformed(
            "action is missing a string `type`".to_string(),
        ));
    };
    if !Action::TAGS.contains(&tag) {
        return Ok(DecodedAction::Unknown(tag.to_string()));
    }
    let action: Action =
        serde_json::from_value(value.clone()).map_err(|source| ActionError::Decode {
            tag: tag.to_string(),
            source,
        })?;
    Ok(DecodedAction::Known(action))
}

/// Errors raised for malformed action payloads.
#[derive(Debug, Error)]
pub enum ActionError {
    /// A required field is empty.
    #[error("{action}: missing required field `{field}`")]
    MissingField { action: String, field: String },
    /// A field holds a value outside its domain.
    #[error("{action}: invalid `{field}`: {message}")]
    InvalidValue {
        action: String,
        field: String,
        message: String,
    },
    /// A known action tag carried a payload of the wrong shape.
    #[error("{tag}: malformed payload: {source}")]
    Decode {
        tag: String,
        #[source]
        source: serde_json::Error,
    },
    /// The value is not an action envelope at all.
    #[error("malformed action: {0}")]
    Malformed(String),
}

impl ActionError {
    fn missing(action: &str, field: &str) -> Self {
        ActionError::MissingField {
            action: action.to_string(),
            field: field.to_string(),
        }
    }

    fn invalid(action: &str, field: &str, message: &str) -> Self {
        ActionError::InvalidValue {
            action: action.to_string(),
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

/// Reference to an entity by id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityRef {
    pub id: String,
}

impl EntityRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Payload of `ENROLL_STUDENT`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Enrollment {
    pub course_id: CourseId,
    pub student_id: StudentId,
}

/// Partial course update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CoursePatch {
    pub id: CourseId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_type: Option<CourseType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CourseStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aula_id: Option<AulaId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrolled: Option<u32>,
}

impl CoursePatch {
    /// Merge the present fields onto a course.
    pub fn apply(&self, course: &mut Course) {
        if let Some(title) = &self.title {
            course.title = title.clone();
        }
        if let Some(description) = &self.description {
            course.description = description.clone();
        }
        if let Some(course_type) = self.course_type {
            course.course_type = course_type;
        }
        if let Some(status) = self.status {
            course.status = status;
        }
        if self.teacher_id.is_some() {
            course.teacher_id = self.teacher_id.clone();
        }
        if self.aula_id.is_some() {
            course.aula_id = self.aula_id.clone();
        }
        if let Some(capacity) = self.capacity {
            course.capacity = capacity;
        }
        if let Some(enrolled) = self.enrolled {
            course.enrolled = enrolled;
        }
    }
}

/// Partial classroom update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AulaPatch {
    pub id: AulaId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl AulaPatch {
    /// Merge the present fields onto a classroom unit.
    pub fn apply(&self, aula: &mut ClassroomUnit) {
        if let Some(name) = &self.name {
            aula.name = name.clone();
        }
        if let Some(capacity) = self.capacity {
            aula.capacity = capacity;
        }
        if self.location.is_some() {
            aula.location = self.location.clone();
        }
    }
}

/// Partial student update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StudentPatch {
    pub id: StudentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StudentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendance_rate: Option<f64>,
}

impl StudentPatch {
    /// Merge the present fields onto a student.
    pub fn apply(&self, student: &mut Student) {
        if let Some(name) = &self.name {
            student.name = name.clone();
        }
        if self.email.is_some() {
            student.email = self.email.clone();
        }
        if let Some(status) = self.status {
            student.status = status;
        }
        if let Some(rate) = self.attendance_rate {
            student.attendance_rate = rate;
        }
    }
}

/// Partial calendar event update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EventPatch {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<CalendarEventType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
}

impl EventPatch {
    /// Merge the present fields onto a calendar event.
    pub fn apply(&self, event: &mut CalendarEvent) {
        if let Some(title) = &self.title {
            event.title = title.clone();
        }
        if let Some(event_type) = self.event_type {
            event.event_type = event_type;
        }
        if let Some(color) = &self.color {
            event.color = color.clone();
        }
        if let Some(starts_at) = self.starts_at {
            event.starts_at = starts_at;
        }
        if let Some(ends_at) = self.ends_at {
            event.ends_at = ends_at;
        }
    }
}

/// Partial conversation update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ConversationPatch {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ConversationPatch {
    /// Merge the present fields onto a conversation.
    pub fn apply(&self, conversation: &mut Conversation) {
        if let Some(title) = &self.title {
            conversation.title = title.clone();
        }
        if let Some(unread) = self.unread {
            conversation.unread = unread;
        }
        if self.last_message.is_some() {
            conversation.last_message = self.last_message.clone();
        }
        if let Some(updated_at) = self.updated_at {
            conversation.updated_at = updated_at;
        }
    }
}

fn require(action: &str, field: &str, value: &str) -> Result<(), ActionError> {
    if value.trim().is_empty() {
        Err(ActionError::missing(action, field))
    } else {
        Ok(())
    }
}

fn validate_scoped<T: TenantScoped>(action: &str, id: &str, entity: &T) -> Result<(), ActionError> {
    require(action, "id", id)?;
    require(action, "institution_id", entity.institution_id())
}

fn validate_rate(action: &str, rate: f64) -> Result<(), ActionError> {
    if rate.is_finite() && (0.0..=100.0).contains(&rate) {
        Ok(())
    } else {
        Err(ActionError::invalid(
            action,
            "attendance_rate",
            "expected a percentage between 0 and 100",
        ))
    }
}

fn validate_course(action: &str, course: &Course) -> Result<(), ActionError> {
    validate_scoped(action, &course.id, course)?;
    require(action, "title", &course.title)
}

fn validate_student(action: &str, student: &Student) -> Result<(), ActionError> {
    validate_scoped(action, &student.id, student)?;
    validate_rate(action, student.attendance_rate)
}

fn validate_event(action: &str, event: &CalendarEvent) -> Result<(), ActionError> {
    validate_scoped(action, &event.id, event)?;
    if event.ends_at < event.starts_at {
        return Err(ActionError::invalid(
            action,
            "ends_at",
            "ends before the event starts",
        ));
    }
    Ok(())
}

fn validate_partial(action: &str, partial: &PartialAppState) -> Result<(), ActionError> {
    for course in partial.courses.iter().flatten() {
        validate_course(action, course)?;
    }
    for aula in partial.aulas.iter().flatten() {
        validate_scoped(action, &aula.id, aula)?;
    }
    for student in partial.students.iter().flatten() {
        validate_student(action, student)?;
    }
    for event in partial.events.iter().flatten() {
        validate_event(action, event)?;
    }
    for item in partial.feed.iter().flatten() {
        validate_scoped(action, &item.id, item)?;
    }
    for notification in partial.notifications.iter().flatten() {
        validate_scoped(action, &notification.id, notification)?;
    }
    for conversation in partial.conversations.iter().flatten() {
        validate_scoped(action, &conversation.id, conversation)?;
    }
    for communication in partial.communications.iter().flatten() {
        validate_scoped(action, &communication.id, communication)?;
    }
    for entry in partial.activity_log.iter().flatten() {
        require(action, "activity_log.id", &entry.id)?;
        require(action, "activity_log.message", &entry.message)?;
    }
    if let Some(onboarding) = &partial.onboarding {
        let mut seen = HashSet::new();
        for step in &onboarding.completed_steps {
            require(action, "completed_steps", step)?;
            if !seen.insert(step.as_str()) {
                return Err(ActionError::invalid(
                    action,
                    "completed_steps",
                    "step ids must be unique",
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn hydration_rejects_duplicate_or_blank_steps() {
        let hydrate = |steps: &[&str]| {
            Action::HydrateState(PartialAppState {
                onboarding: Some(crate::OnboardingProgress {
                    completed_steps: steps.iter().map(|step| step.to_string()).collect(),
                    is_dismissed: false,
                }),
                ..PartialAppState::default()
            })
            .validate()
        };
        assert!(hydrate(&["profile", "rooms"]).is_ok());
        let err = hydrate(&["profile", "profile"]).expect_err("duplicate");
        assert!(err.to_string().contains("unique"));
        assert!(matches!(
            hydrate(&["profile", " "]),
            Err(ActionError::MissingField { .. })
        ));
    }

    #[test]
    fn hydration_checks_activity_entries() {
        let entry = ActivityEntry {
            id: "log-1".to_string(),
            event_tag: crate::EventTag::PaymentRecorded,
            message: String::new(),
            timestamp: chrono::DateTime::UNIX_EPOCH,
        };
        let err = Action::HydrateState(PartialAppState {
            activity_log: Some(vec![entry]),
            ..PartialAppState::default()
        })
        .validate()
        .expect_err("blank message");
        assert_eq!(
            err.to_string(),
            "HYDRATE_STATE: missing required field `activity_log.message`"
        );
    }

    #[test]
    fn tags_match_serialized_type() {
        let actions = vec![
            Action::DismissOnboarding,
            Action::CompleteOnboardingStep("profile".to_string()),
            Action::DeleteEvent(EntityRef::new("e1")),
            Action::EnrollStudent(Enrollment {
                course_id: "c1".to_string(),
                student_id: "s1".to_string(),
            }),
        ];
        for action in actions {
            let value = serde_json::to_value(&action).expect("serialize");
            assert_eq!(value["type"], json!(action.tag()));
            assert!(Action::TAGS.contains(&action.tag()));
        }
    }

    #[test]
    fn decode_reports_unknown_tags() {
        let decoded = decode_action(&json!({ "type": "ARCHIVE_EVERYTHING" })).expect("decode");
        assert_eq!(
            decoded,
            DecodedAction::Unknown("ARCHIVE_EVERYTHING".to_string())
        );
    }

    #[test]
    fn decode_rejects_malformed_known_payload() {
        let err = decode_action(&json!({ "type": "DELETE_EVENT", "payload": { "nope": 1 } }))
            .expect_err("malformed");
        assert!(err.to_string().starts_with("DELETE_EVENT: malformed payload"));

        let err = decode_action(&json!({ "payload": {} })).expect_err("no tag");
        assert!(matches!(err, ActionError::Malformed(_)));
    }

    #[test]
    fn decode_accepts_unit_and_newtype_payloads() {
        let decoded = decode_action(&json!({ "type": "DISMISS_ONBOARDING" })).expect("decode");
        assert_eq!(decoded, DecodedAction::Known(Action::DismissOnboarding));

        let decoded = decode_action(&json!({
            "type": "COMPLETE_ONBOARDING_STEP",
            "payload": "profile"
        }))
        .expect("decode");
        assert_eq!(
            decoded,
            DecodedAction::Known(Action::CompleteOnboardingStep("profile".to_string()))
        );
    }

    #[test]
    fn validate_rejects_blank_ids_and_bad_rates() {
        let err = Action::DeleteEvent(EntityRef::new("  "))
            .validate()
            .expect_err("blank id");
        assert_eq!(err.to_string(), "DELETE_EVENT: missing required field `id`");

        let err = Action::UpdateStudent(StudentPatch {
            id: "s1".to_string(),
            attendance_rate: Some(140.0),
            ..StudentPatch::default()
        })
        .validate()
        .expect_err("rate");
        assert!(err.to_string().contains("attendance_rate"));

        assert!(Action::CompleteOnboardingStep(String::new()).validate().is_err());
        assert!(Action::DismissOnboarding.validate().is_ok());
    }

    #[test]
    fn course_patch_merges_present_fields() {
        let mut course = Course {
            id: "c1".to_string(),
            institution_id: "t1".to_string(),
            title: "Art 101".to_string(),
            description: String::new(),
            course_type: CourseType::InPerson,
            status: CourseStatus::Active,
            teacher_id: None,
            aula_id: None,
            capacity: 20,
            enrolled: 3,
            created_at: Utc::now(),
        };
        CoursePatch {
            id: "c1".to_string(),
            status: Some(CourseStatus::Suspended),
            capacity: Some(25),
            ..CoursePatch::default()
        }
        .apply(&mut course);
        assert_eq!(course.status, CourseStatus::Suspended);
        assert_eq!(course.capacity, 25);
        assert_eq!(course.title, "Art 101");
        assert_eq!(course.enrolled, 3);
    }
}
