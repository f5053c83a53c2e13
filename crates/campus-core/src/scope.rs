//! Read-side tenant scoping.
//!
//! The store keeps every tenant's records side by side; this layer narrows a
//! snapshot to one institution for display. It never writes.

use campus_protocol::{
    ActivityEntry, AppState, CalendarEvent, ClassroomUnit, Collection, Communication, Conversation,
    Course, FeedItem, InstitutionId, Notification, OnboardingProgress, Student, TenantScoped,
};
use serde::Serialize;
use std::sync::Arc;

/// Selector for one institution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantScope {
    institution_id: InstitutionId,
}

impl TenantScope {
    pub fn new(institution_id: impl Into<InstitutionId>) -> Self {
        Self {
            institution_id: institution_id.into(),
        }
    }

    pub fn institution_id(&self) -> &str {
        &self.institution_id
    }

    /// Whether `entity` belongs to this tenant.
    pub fn contains<T: TenantScoped>(&self, entity: &T) -> bool {
        entity.institution_id() == self.institution_id
    }

    /// Narrow every tenant-scoped collection of `state` to this tenant.
    pub fn select(&self, state: &AppState) -> ScopedState {
        ScopedState {
            institution_id: self.institution_id.clone(),
            version: state.version,
            courses: self.filter(&state.courses),
            aulas: self.filter(&state.aulas),
            students: self.filter(&state.students),
            events: self.filter(&state.events),
            feed: self.filter(&state.feed),
            notifications: self.filter(&state.notifications),
            conversations: self.filter(&state.conversations),
            communications: self.filter(&state.communications),
            activity_log: Arc::clone(&state.activity_log),
            onboarding: Arc::clone(&state.onboarding),
        }
    }

    fn filter<T: TenantScoped + Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .filter(|item| self.contains(*item))
            .cloned()
            .collect()
    }
}

/// One tenant's view of a snapshot.
///
/// The activity log and onboarding progress belong to the session rather than
/// to a tenant and are passed through unfiltered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopedState {
    pub institution_id: InstitutionId,
    pub version: u64,
    pub courses: Vec<Course>,
    pub aulas: Vec<ClassroomUnit>,
    pub students: Vec<Student>,
    pub events: Vec<CalendarEvent>,
    pub feed: Vec<FeedItem>,
    pub notifications: Vec<Notification>,
    pub conversations: Vec<Conversation>,
    pub communications: Vec<Communication>,
    pub activity_log: Collection<ActivityEntry>,
    pub onboarding: Arc<OnboardingProgress>,
}

impl ScopedState {
    /// Unread notifications for this tenant.
    pub fn unread_notifications(&self) -> usize {
        self.notifications
            .iter()
            .filter(|notification| !notification.read)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::TenantScope;
    use campus_protocol::{AppState, Notification, NotificationKind, Student, StudentStatus};
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn student(id: &str, tenant: &str) -> Student {
        Student {
            id: id.to_string(),
            institution_id: tenant.to_string(),
            name: id.to_string(),
            email: None,
            status: StudentStatus::Active,
            attendance_rate: 100.0,
            course_ids: Vec::new(),
        }
    }

    fn notification(id: &str, tenant: &str, read: bool) -> Notification {
        Notification {
            id: id.to_string(),
            institution_id: tenant.to_string(),
            kind: NotificationKind::System,
            title: "t".to_string(),
            message: "m".to_string(),
            read,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn select_keeps_only_the_tenant_records() {
        let state = AppState {
            students: Arc::new(vec![
                student("s1", "t1"),
                student("s2", "t2"),
                student("s3", "t1"),
            ]),
            notifications: Arc::new(vec![
                notification("n1", "t1", false),
                notification("n2", "t2", false),
                notification("n3", "t1", true),
            ]),
            ..AppState::default()
        };
        let scoped = TenantScope::new("t1").select(&state);
        let ids: Vec<_> = scoped.students.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s3"]);
        assert_eq!(scoped.notifications.len(), 2);
        assert_eq!(scoped.unread_notifications(), 1);
        assert_eq!(state.students.len(), 3);
    }

    #[test]
    fn unknown_tenant_sees_nothing() {
        let state = AppState {
            students: Arc::new(vec![student("s1", "t1")]),
            ..AppState::default()
        };
        let scoped = TenantScope::new("t9").select(&state);
        assert!(scoped.students.is_empty());
        assert!(Arc::ptr_eq(&scoped.onboarding, &state.onboarding));
    }
}
