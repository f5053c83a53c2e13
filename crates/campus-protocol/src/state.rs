//! Application state snapshot and its partial (hydration) form.

use crate::entity::{
    ActivityEntry, CalendarEvent, ClassroomUnit, Communication, Conversation, Course, FeedItem,
    Notification, OnboardingProgress, Student,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Shared, ordered entity collection. Cloning is cheap and unchanged
/// collections stay pointer-identical across snapshots.
pub type Collection<T> = Arc<Vec<T>>;

/// Single aggregate snapshot holding every collection plus onboarding state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppState {
    /// Incremented on every effective change.
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub courses: Collection<Course>,
    #[serde(default)]
    pub aulas: Collection<ClassroomUnit>,
    #[serde(default)]
    pub students: Collection<Student>,
    #[serde(default)]
    pub events: Collection<CalendarEvent>,
    #[serde(default)]
    pub feed: Collection<FeedItem>,
    #[serde(default)]
    pub notifications: Collection<Notification>,
    #[serde(default)]
    pub conversations: Collection<Conversation>,
    #[serde(default)]
    pub communications: Collection<Communication>,
    #[serde(default)]
    pub activity_log: Collection<ActivityEntry>,
    #[serde(default)]
    pub onboarding: Arc<OnboardingProgress>,
}

/// Named slice of the application state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SliceName {
    Courses,
    Aulas,
    Students,
    Events,
    Feed,
    Notifications,
    Conversations,
    Communications,
    ActivityLog,
    Onboarding,
}

impl SliceName {
    /// Every slice, in declaration order.
    pub const ALL: [SliceName; 10] = [
        SliceName::Courses,
        SliceName::Aulas,
        SliceName::Students,
        SliceName::Events,
        SliceName::Feed,
        SliceName::Notifications,
        SliceName::Conversations,
        SliceName::Communications,
        SliceName::ActivityLog,
        SliceName::Onboarding,
    ];

    /// Serialized (snake_case) name of the slice.
    pub fn as_str(self) -> &'static str {
        match self {
            SliceName::Courses => "courses",
            SliceName::Aulas => "aulas",
            SliceName::Students => "students",
            SliceName::Events => "events",
            SliceName::Feed => "feed",
            SliceName::Notifications => "notifications",
            SliceName::Conversations => "conversations",
            SliceName::Communications => "communications",
            SliceName::ActivityLog => "activity_log",
            SliceName::Onboarding => "onboarding",
        }
    }

    /// Parse a serialized slice name.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slice| slice.as_str() == value)
    }
}

impl fmt::Display for SliceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subset of the application state. Absent slices are left untouched when
/// hydrating.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PartialAppState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub courses: Option<Vec<Course>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aulas: Option<Vec<ClassroomUnit>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub students: Option<Vec<Student>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<CalendarEvent>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed: Option<Vec<FeedItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notifications: Option<Vec<Notification>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversations: Option<Vec<Conversation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub communications: Option<Vec<Communication>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_log: Option<Vec<ActivityEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onboarding: Option<OnboardingProgress>,
}

impl PartialAppState {
    /// Whether no slice is present.
    pub fn is_empty(&self) -> bool {
        self.slices().is_empty()
    }

    /// Names of the slices carried by this partial state.
    pub fn slices(&self) -> Vec<SliceName> {
        let present = [
            (SliceName::Courses, self.courses.is_some()),
            (SliceName::Aulas, self.aulas.is_some()),
            (SliceName::Students, self.students.is_some()),
            (SliceName::Events, self.events.is_some()),
            (SliceName::Feed, self.feed.is_some()),
            (SliceName::Notifications, self.notifications.is_some()),
            (SliceName::Conversations, self.conversations.is_some()),
            (SliceName::Communications, self.communications.is_some()),
            (SliceName::ActivityLog, self.activity_log.is_some()),
            (SliceName::Onboarding, self.onboarding.is_some()),
        ];
        present
            .into_iter()
            .filter_map(|(slice, is_present)| is_present.then_some(slice))
            .collect()
    }
}

impl AppState {
    /// Copy the named slices into a partial state.
    pub fn project(&self, slices: &[SliceName]) -> PartialAppState {
        let mut partial = PartialAppState::default();
        for slice in slices {
            match slice {
                SliceName::Courses => partial.courses = Some(self.courses.to_vec()),
                SliceName::Aulas => partial.aulas = Some(self.aulas.to_vec()),
                SliceName::Students => partial.students = Some(self.students.to_vec()),
                SliceName::Events => partial.events = Some(self.events.to_vec()),
                SliceName::Feed => partial.feed = Some(self.feed.to_vec()),
                SliceName::Notifications => {
                    partial.notifications = Some(self.notifications.to_vec())
                }
                SliceName::Conversations => {
                    partial.conversations = Some(self.conversations.to_vec())
                }
                SliceName::Communications => {
                    partial.communications = Some(self.communications.to_vec())
                }
                SliceName::ActivityLog => partial.activity_log = Some(self.activity_log.to_vec()),
                SliceName::Onboarding => {
                    partial.onboarding = Some(self.onboarding.as_ref().clone())
                }
            }
        }
        partial
    }

    /// Entity count per slice, used for summaries and logging.
    pub fn counts(&self) -> Vec<(SliceName, usize)> {
        vec![
            (SliceName::Courses, self.courses.len()),
            (SliceName::Aulas, self.aulas.len()),
            (SliceName::Students, self.students.len()),
            (SliceName::Events, self.events.len()),
            (SliceName::Feed, self.feed.len()),
            (SliceName::Notifications, self.notifications.len()),
            (SliceName::Conversations, self.conversations.len()),
            (SliceName::Communications, self.communications.len()),
            (SliceName::ActivityLog, self.activity_log.len()),
            (
                SliceName::Onboarding,
                self.onboarding.completed_steps.len(),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn slice_names_parse_their_own_labels() {
        for slice in SliceName::ALL {
            assert_eq!(SliceName::parse(slice.as_str()), Some(slice));
        }
        assert_eq!(SliceName::parse("grades"), None);
    }

    #[test]
    fn project_copies_only_requested_slices() {
        let state = AppState {
            onboarding: Arc::new(OnboardingProgress {
                completed_steps: vec!["profile".to_string()],
                is_dismissed: false,
            }),
            ..AppState::default()
        };
        let partial = state.project(&[SliceName::Onboarding, SliceName::ActivityLog]);
        assert_eq!(
            partial.slices(),
            vec![SliceName::ActivityLog, SliceName::Onboarding]
        );
        assert_eq!(
            partial.onboarding.expect("onboarding").completed_steps,
            vec!["profile".to_string()]
        );
        assert!(partial.courses.is_none());
    }

    #[test]
    fn empty_partial_serializes_to_empty_object() {
        let value = serde_json::to_value(PartialAppState::default()).expect("serialize");
        assert_eq!(value, serde_json::json!({}));
        assert!(PartialAppState::default().is_empty());
    }
}
