//! Domain events routed through the event bus.

use crate::entity::{
    Communication, CommunicationScope, Course, CourseId, InstitutionId, StudentId, StudentStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminant of a [`DomainEvent`], used for routing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventTag {
    CourseCreated,
    CourseSuspended,
    PaymentRecorded,
    AttendanceTaken,
    ContentPublished,
    StudentEnrolled,
    StudentStatusChanged,
    CommunicationSent,
}

impl EventTag {
    /// Every event tag, in declaration order.
    pub const ALL: [EventTag; 8] = [
        EventTag::CourseCreated,
        EventTag::CourseSuspended,
        EventTag::PaymentRecorded,
        EventTag::AttendanceTaken,
        EventTag::ContentPublished,
        EventTag::StudentEnrolled,
        EventTag::StudentStatusChanged,
        EventTag::CommunicationSent,
    ];

    /// Serialized (snake_case) name of the tag.
    pub fn as_str(self) -> &'static str {
        match self {
            EventTag::CourseCreated => "course_created",
            EventTag::CourseSuspended => "course_suspended",
            EventTag::PaymentRecorded => "payment_recorded",
            EventTag::AttendanceTaken => "attendance_taken",
            EventTag::ContentPublished => "content_published",
            EventTag::StudentEnrolled => "student_enrolled",
            EventTag::StudentStatusChanged => "student_status_changed",
            EventTag::CommunicationSent => "communication_sent",
        }
    }
}

impl fmt::Display for EventTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A domain occurrence. One event may cascade into many actions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type", content = "payload")]
pub enum DomainEvent {
    CourseCreated { course: Course },
    CourseSuspended(CourseSuspension),
    PaymentRecorded(Payment),
    AttendanceTaken(AttendanceSheet),
    ContentPublished(PublishedContent),
    StudentEnrolled(StudentEnrollment),
    StudentStatusChanged(StatusChange),
    CommunicationSent { communication: Communication },
}

impl DomainEvent {
    /// Routing tag of this event.
    pub fn tag(&self) -> EventTag {
        match self {
            DomainEvent::CourseCreated { .. } => EventTag::CourseCreated,
            DomainEvent::CourseSuspended(_) => EventTag::CourseSuspended,
            DomainEvent::PaymentRecorded(_) => EventTag::PaymentRecorded,
            DomainEvent::AttendanceTaken(_) => EventTag::AttendanceTaken,
            DomainEvent::ContentPublished(_) => EventTag::ContentPublished,
            DomainEvent::StudentEnrolled(_) => EventTag::StudentEnrolled,
            DomainEvent::StudentStatusChanged(_) => EventTag::StudentStatusChanged,
            DomainEvent::CommunicationSent { .. } => EventTag::CommunicationSent,
        }
    }

    /// Institution the event belongs to.
    pub fn institution_id(&self) -> &str {
        match self {
            DomainEvent::CourseCreated { course } => &course.institution_id,
            DomainEvent::CourseSuspended(suspension) => &suspension.institution_id,
            DomainEvent::PaymentRecorded(payment) => &payment.institution_id,
            DomainEvent::AttendanceTaken(sheet) => &sheet.institution_id,
            DomainEvent::ContentPublished(content) => &content.institution_id,
            DomainEvent::StudentEnrolled(enrollment) => &enrollment.institution_id,
            DomainEvent::StudentStatusChanged(change) => &change.institution_id,
            DomainEvent::CommunicationSent { communication } => &communication.institution_id,
        }
    }

    /// Human-readable description recorded in the activity log.
    pub fn describe(&self) -> String {
        match self {
            DomainEvent::CourseCreated { course } => {
                format!("Course \"{}\" created", course.title)
            }
            DomainEvent::CourseSuspended(suspension) => match &suspension.reason {
                Some(reason) => format!(
                    "Course {} suspended: {}",
                    suspension.course_id, reason
                ),
                None => format!("Course {} suspended", suspension.course_id),
            },
            DomainEvent::PaymentRecorded(payment) => format!(
                "Payment of {:.2} {} recorded for {}",
                payment.amount, payment.currency, payment.student_name
            ),
            DomainEvent::AttendanceTaken(sheet) => {
                let absent = sheet.count(AttendanceStatus::Absent);
                format!(
                    "Attendance taken for course {} ({} records, {} absent)",
                    sheet.course_id,
                    sheet.records.len(),
                    absent
                )
            }
            DomainEvent::ContentPublished(content) => {
                format!("{} \"{}\" published", content.kind.label(), content.title)
            }
            DomainEvent::StudentEnrolled(enrollment) => format!(
                "{} enrolled in course {}",
                enrollment.student_name, enrollment.course_id
            ),
            DomainEvent::StudentStatusChanged(change) => format!(
                "{} status changed from {} to {}",
                change.student_name,
                change.old_status.as_str(),
                change.new_status.as_str()
            ),
            DomainEvent::CommunicationSent { communication } => {
                let audience = match &communication.scope {
                    CommunicationScope::General => "everyone".to_string(),
                    CommunicationScope::Room { aula_id } => format!("room {aula_id}"),
                    CommunicationScope::Individual { recipient_id } => recipient_id.clone(),
                };
                format!(
                    "Communication \"{}\" sent to {}",
                    communication.subject, audience
                )
            }
        }
    }
}

/// Payload of [`DomainEvent::CourseSuspended`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CourseSuspension {
    pub course_id: CourseId,
    pub institution_id: InstitutionId,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Payload of [`DomainEvent::PaymentRecorded`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub payment_id: String,
    pub institution_id: InstitutionId,
    pub student_id: StudentId,
    pub student_name: String,
    pub amount: f64,
    pub currency: String,
    #[serde(default)]
    pub concept: Option<String>,
}

/// Attendance mark for one student.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
}

/// One line of an attendance sheet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttendanceRecord {
    pub student_id: StudentId,
    pub status: AttendanceStatus,
}

/// Payload of [`DomainEvent::AttendanceTaken`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttendanceSheet {
    pub institution_id: InstitutionId,
    pub course_id: CourseId,
    pub taken_at: DateTime<Utc>,
    pub records: Vec<AttendanceRecord>,
}

impl AttendanceSheet {
    /// Number of records with the given status.
    pub fn count(&self, status: AttendanceStatus) -> usize {
        self.records
            .iter()
            .filter(|record| record.status == status)
            .count()
    }
}

/// Kind of published course content.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Material,
    Assignment,
    Announcement,
}

impl ContentKind {
    /// Capitalized label used in messages.
    pub fn label(self) -> &'static str {
        match self {
            ContentKind::Material => "Material",
            ContentKind::Assignment => "Assignment",
            ContentKind::Announcement => "Announcement",
        }
    }
}

/// Payload of [`DomainEvent::ContentPublished`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublishedContent {
    pub id: String,
    pub institution_id: InstitutionId,
    pub course_id: CourseId,
    pub title: String,
    pub kind: ContentKind,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
}

/// Payload of [`DomainEvent::StudentEnrolled`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudentEnrollment {
    pub institution_id: InstitutionId,
    pub course_id: CourseId,
    pub student_id: StudentId,
    pub student_name: String,
}

/// Payload of [`DomainEvent::StudentStatusChanged`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusChange {
    pub institution_id: InstitutionId,
    pub student_id: StudentId,
    pub student_name: String,
    pub old_status: StudentStatus,
    pub new_status: StudentStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn status_change(old_status: StudentStatus, new_status: StudentStatus) -> DomainEvent {
        DomainEvent::StudentStatusChanged(StatusChange {
            institution_id: "t1".to_string(),
            student_id: "s1".to_string(),
            student_name: "Ana".to_string(),
            old_status,
            new_status,
        })
    }

    #[test]
    fn tag_serializes_like_event_type() {
        let event = status_change(StudentStatus::Active, StudentStatus::Graduated);
        let value = serde_json::to_value(&event).expect("serialize");
        assert_eq!(value["type"], json!(event.tag().as_str()));
        assert_eq!(event.institution_id(), "t1");
    }

    #[test]
    fn describe_mentions_both_statuses() {
        let event = status_change(StudentStatus::Active, StudentStatus::Suspended);
        assert_eq!(
            event.describe(),
            "Ana status changed from active to suspended"
        );
    }

    #[test]
    fn attendance_sheet_counts_by_status() {
        let sheet = AttendanceSheet {
            institution_id: "t1".to_string(),
            course_id: "c1".to_string(),
            taken_at: Utc::now(),
            records: vec![
                AttendanceRecord {
                    student_id: "s1".to_string(),
                    status: AttendanceStatus::Absent,
                },
                AttendanceRecord {
                    student_id: "s2".to_string(),
                    status: AttendanceStatus::Late,
                },
                AttendanceRecord {
                    student_id: "s3".to_string(),
                    status: AttendanceStatus::Absent,
                },
            ],
        };
        assert_eq!(sheet.count(AttendanceStatus::Absent), 2);
        assert_eq!(sheet.count(AttendanceStatus::Present), 0);
        assert_eq!(
            DomainEvent::AttendanceTaken(sheet).describe(),
            "Attendance taken for course c1 (3 records, 2 absent)"
        );
    }
}
