//! Data types shared by the campus engine: entities, actions, domain events
//! and the application state snapshot.

mod action;
mod entity;
mod event;
mod state;

pub use action::{
    Action, ActionError, AulaPatch, ConversationPatch, CoursePatch, DecodedAction, EntityRef,
    Enrollment, EventPatch, StudentPatch, decode_action,
};
pub use entity::{
    ActivityEntry, AulaId, CalendarEvent, CalendarEventType, ClassroomUnit, Communication,
    CommunicationScope, Conversation, ConversationKind, Course, CourseId, CourseStatus,
    CourseType, EventId, FeedItem, FeedKind, Identified, InstitutionId, Notification,
    NotificationKind, OnboardingProgress, Student, StudentId, StudentStatus, TenantScoped,
};
pub use event::{
    AttendanceRecord, AttendanceSheet, AttendanceStatus, ContentKind, CourseSuspension,
    DomainEvent, EventTag, Payment, PublishedContent, StatusChange, StudentEnrollment,
};
pub use state::{AppState, Collection, PartialAppState, SliceName};
