//! Entity records stored in the application state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of the owning institution (tenant).
pub type InstitutionId = String;
/// Identifier of a course.
pub type CourseId = String;
/// Identifier of a classroom unit.
pub type AulaId = String;
/// Identifier of a student.
pub type StudentId = String;
/// Identifier of a calendar event.
pub type EventId = String;

/// Entity owned by a single institution.
///
/// Every record implementing this trait is expected to carry a non-empty
/// institution id; read-side scoping relies on it.
pub trait TenantScoped {
    /// Owning institution id.
    fn institution_id(&self) -> &str;
}

/// Entity addressable by a string id.
pub trait Identified {
    /// Entity id.
    fn id(&self) -> &str;
}

macro_rules! entity_traits {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl TenantScoped for $ty {
                fn institution_id(&self) -> &str {
                    &self.institution_id
                }
            }

            impl Identified for $ty {
                fn id(&self) -> &str {
                    &self.id
                }
            }
        )+
    };
}

entity_traits!(
    Course,
    ClassroomUnit,
    Student,
    CalendarEvent,
    FeedItem,
    Notification,
    Conversation,
    Communication,
);

/// Delivery format of a course.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum CourseType {
    /// Taught on site.
    #[default]
    InPerson,
    /// Taught remotely.
    Online,
    /// Mixed on-site and remote sessions.
    Hybrid,
    /// Short practical workshop.
    Workshop,
}

impl CourseType {
    /// Calendar event type used for sessions of this course type.
    pub fn event_type(self) -> CalendarEventType {
        match self {
            CourseType::Workshop => CalendarEventType::Workshop,
            CourseType::InPerson | CourseType::Online | CourseType::Hybrid => {
                CalendarEventType::Class
            }
        }
    }

    /// Display color for calendar entries of this course type.
    pub fn color(self) -> &'static str {
        match self {
            CourseType::InPerson => "#3b82f6",
            CourseType::Online => "#10b981",
            CourseType::Hybrid => "#8b5cf6",
            CourseType::Workshop => "#f59e0b",
        }
    }
}

/// Lifecycle status of a course.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum CourseStatus {
    #[default]
    Active,
    Suspended,
    Archived,
}

/// A course offered by an institution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Course {
    pub id: CourseId,
    pub institution_id: InstitutionId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub course_type: CourseType,
    #[serde(default)]
    pub status: CourseStatus,
    #[serde(default)]
    pub teacher_id: Option<String>,
    #[serde(default)]
    pub aula_id: Option<AulaId>,
    #[serde(default)]
    pub capacity: u32,
    #[serde(default)]
    pub enrolled: u32,
    pub created_at: DateTime<Utc>,
}

/// Physical or virtual classroom ("aula").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassroomUnit {
    pub id: AulaId,
    pub institution_id: InstitutionId,
    pub name: String,
    #[serde(default)]
    pub capacity: u32,
    #[serde(default)]
    pub location: Option<String>,
}

/// Enrollment status of a student.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum StudentStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
    Graduated,
}

impl StudentStatus {
    /// Lowercase label used in human-readable messages.
    pub fn as_str(self) -> &'static str {
        match self {
            StudentStatus::Active => "active",
            StudentStatus::Inactive => "inactive",
            StudentStatus::Suspended => "suspended",
            StudentStatus::Graduated => "graduated",
        }
    }
}

/// A student (child) record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Student {
    pub id: StudentId,
    pub institution_id: InstitutionId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub status: StudentStatus,
    /// Attendance percentage, always within `[0, 100]`.
    #[serde(default = "full_attendance")]
    pub attendance_rate: f64,
    #[serde(default)]
    pub course_ids: Vec<CourseId>,
}

fn full_attendance() -> f64 {
    100.0
}

/// Kind of calendar entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CalendarEventType {
    Class,
    Workshop,
    Exam,
    Deadline,
    Meeting,
}

/// A calendar entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalendarEvent {
    pub id: EventId,
    pub institution_id: InstitutionId,
    pub title: String,
    pub event_type: CalendarEventType,
    #[serde(default)]
    pub color: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    /// Course that generated this entry, if any.
    #[serde(default)]
    pub source_course_id: Option<CourseId>,
    /// Published content that generated this entry, if any.
    #[serde(default)]
    pub source_content_id: Option<String>,
}

/// Kind of activity feed item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    Announcement,
    Content,
    System,
}

/// Item in the institution activity feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedItem {
    pub id: String,
    pub institution_id: InstitutionId,
    #[serde(default)]
    pub course_id: Option<CourseId>,
    pub kind: FeedKind,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Category of a notification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    System,
    Announcement,
    Message,
    Payment,
    Attendance,
    Content,
    Enrollment,
    Status,
}

/// A user-facing notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: String,
    pub institution_id: InstitutionId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Kind of conversation thread.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    CourseGroup,
    Direct,
}

/// A messaging conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    pub id: String,
    pub institution_id: InstitutionId,
    pub title: String,
    pub kind: ConversationKind,
    #[serde(default)]
    pub course_id: Option<CourseId>,
    #[serde(default)]
    pub participant_ids: Vec<String>,
    #[serde(default)]
    pub unread: u32,
    #[serde(default)]
    pub last_message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Audience of a communication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum CommunicationScope {
    /// Whole institution.
    General,
    /// Everyone attached to one classroom unit.
    Room { aula_id: AulaId },
    /// A single recipient.
    Individual { recipient_id: String },
}

/// A communication (circular, announcement or direct note).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Communication {
    pub id: String,
    pub institution_id: InstitutionId,
    pub subject: String,
    #[serde(default)]
    pub body: String,
    pub scope: CommunicationScope,
    #[serde(default)]
    pub sender_id: Option<String>,
    pub sent_at: DateTime<Utc>,
}

/// Audit log entry describing one processed domain event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityEntry {
    pub id: String,
    pub event_tag: crate::EventTag,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Guided setup progress for the current session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct OnboardingProgress {
    /// Completed step ids; never contains duplicates.
    #[serde(default)]
    pub completed_steps: Vec<String>,
    #[serde(default)]
    pub is_dismissed: bool,
}

impl OnboardingProgress {
    /// Whether a step id has been completed.
    pub fn is_completed(&self, step_id: &str) -> bool {
        self.completed_steps.iter().any(|step| step == step_id)
    }
}
