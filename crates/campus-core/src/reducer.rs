//! Pure reduction of actions into new state snapshots.
//!
//! Every effective change produces a new `AppState` whose untouched
//! collections share their allocation with the previous snapshot. A no-op
//! (unknown reference, repeated onboarding step, ...) yields the very same
//! `Arc<AppState>` so observers can compare by pointer.

use campus_protocol::{Action, AppState, Collection, Identified, PartialAppState};
use std::sync::Arc;

/// Default number of activity entries kept in the log.
pub const DEFAULT_ACTIVITY_CAPACITY: usize = 50;

/// Reduction function with its tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reducer {
    activity_capacity: usize,
}

impl Default for Reducer {
    fn default() -> Self {
        Self::new(DEFAULT_ACTIVITY_CAPACITY)
    }
}

impl Reducer {
    /// Create a reducer keeping at most `activity_capacity` log entries.
    pub fn new(activity_capacity: usize) -> Self {
        Self {
            activity_capacity: activity_capacity.max(1),
        }
    }

    /// Apply an action, returning the same `Arc` when nothing changed.
    pub fn apply(&self, state: &Arc<AppState>, action: &Action) -> Arc<AppState> {
        match self.reduce(state, action) {
            Some(next) => Arc::new(next),
            None => Arc::clone(state),
        }
    }

    /// Compute the next state, or `None` when the action is a no-op.
    pub fn reduce(&self, state: &AppState, action: &Action) -> Option<AppState> {
        let mut next = state.clone();
        let changed = match action {
            Action::HydrateState(partial) => self.hydrate(&mut next, partial),
            Action::AddCourse(course) => {
                next.courses = appended(&state.courses, course);
                true
            }
            Action::UpdateCourse(patch) => replace(
                &mut next.courses,
                updated(&state.courses, &patch.id, |course| patch.apply(course)),
            ),
            Action::DeleteCourse(target) => {
                replace(&mut next.courses, without(&state.courses, &target.id))
            }
            Action::AddAula(aula) => {
                next.aulas = appended(&state.aulas, aula);
                true
            }
            Action::UpdateAula(patch) => replace(
                &mut next.aulas,
                updated(&state.aulas, &patch.id, |aula| patch.apply(aula)),
            ),
            Action::DeleteAula(target) => replace(&mut next.aulas, without(&state.aulas, &target.id)),
            Action::AddStudent(student) => {
                next.students = appended(&state.students, student);
                true
            }
            Action::UpdateStudent(patch) => replace(
                &mut next.students,
                updated(&state.students, &patch.id, |student| patch.apply(student)),
            ),
            Action::DeleteStudent(target) => {
                replace(&mut next.students, without(&state.students, &target.id))
            }
            Action::EnrollStudent(enrollment) => {
                let courses = updated(&state.courses, &enrollment.course_id, |course| {
                    course.enrolled = course.enrolled.saturating_add(1);
                });
                match courses {
                    Some(courses) => {
                        next.courses = courses;
                        let students =
                            updated(&state.students, &enrollment.student_id, |student| {
                                if !student.course_ids.contains(&enrollment.course_id) {
                                    student.course_ids.push(enrollment.course_id.clone());
                                }
                            });
                        replace(&mut next.students, students);
                        true
                    }
                    None => false,
                }
            }
            Action::AddEvent(event) => {
                next.events = appended(&state.events, event);
                true
            }
            Action::UpdateEvent(patch) => replace(
                &mut next.events,
                updated(&state.events, &patch.id, |event| patch.apply(event)),
            ),
            Action::DeleteEvent(target) => {
                replace(&mut next.events, without(&state.events, &target.id))
            }
            Action::AddFeedItem(item) => {
                next.feed = appended(&state.feed, item);
                true
            }
            Action::DeleteFeedItem(target) => replace(&mut next.feed, without(&state.feed, &target.id)),
            Action::AddNotification(notification) => {
                next.notifications = appended(&state.notifications, notification);
                true
            }
            Action::MarkNotificationRead(target) => replace(
                &mut next.notifications,
                updated(&state.notifications, &target.id, |notification| {
                    notification.read = true;
                }),
            ),
            Action::AddConversation(conversation) => {
                next.conversations = appended(&state.conversations, conversation);
                true
            }
            Action::UpdateConversation(patch) => replace(
                &mut next.conversations,
                updated(&state.conversations, &patch.id, |conversation| {
                    patch.apply(conversation)
                }),
            ),
            Action::AddCommunication(communication) => {
                next.communications = appended(&state.communications, communication);
                true
            }
            Action::CompleteOnboardingStep(step_id) => {
                if state.onboarding.is_completed(step_id) {
                    false
                } else {
                    let mut progress = state.onboarding.as_ref().clone();
                    progress.completed_steps.push(step_id.clone());
                    next.onboarding = Arc::new(progress);
                    true
                }
            }
            Action::DismissOnboarding => {
                if state.onboarding.is_dismissed {
                    false
                } else {
                    let mut progress = state.onboarding.as_ref().clone();
                    progress.is_dismissed = true;
                    next.onboarding = Arc::new(progress);
                    true
                }
            }
            Action::LogActivity(entry) => {
                let mut log = Vec::with_capacity(self.activity_capacity);
                log.push(entry.clone());
                log.extend(
                    state
                        .activity_log
                        .iter()
                        .take(self.activity_capacity - 1)
                        .cloned(),
                );
                next.activity_log = Arc::new(log);
                true
            }
        };

        if !changed {
            return None;
        }
        next.version = state.version + 1;
        Some(next)
    }

    /// Replace only the slices the partial state carries.
    fn hydrate(&self, next: &mut AppState, partial: &PartialAppState) -> bool {
        if partial.is_empty() {
            return false;
        }
        if let Some(courses) = &partial.courses {
            next.courses = Arc::new(courses.clone());
        }
        if let Some(aulas) = &partial.aulas {
            next.aulas = Arc::new(aulas.clone());
        }
        if let Some(students) = &partial.students {
            next.students = Arc::new(students.clone());
        }
        if let Some(events) = &partial.events {
            next.events = Arc::new(events.clone());
        }
        if let Some(feed) = &partial.feed {
            next.feed = Arc::new(feed.clone());
        }
        if let Some(notifications) = &partial.notifications {
            next.notifications = Arc::new(notifications.clone());
        }
        if let Some(conversations) = &partial.conversations {
            next.conversations = Arc::new(conversations.clone());
        }
        if let Some(communications) = &partial.communications {
            next.communications = Arc::new(communications.clone());
        }
        if let Some(activity_log) = &partial.activity_log {
            next.activity_log = Arc::new(
                activity_log
                    .iter()
                    .take(self.activity_capacity)
                    .cloned()
                    .collect(),
            );
        }
        if let Some(onboarding) = &partial.onboarding {
            next.onboarding = Arc::new(onboarding.clone());
        }
        true
    }
}

fn replace<T>(slot: &mut Collection<T>, value: Option<Collection<T>>) -> bool {
    match value {
        Some(value) => {
            *slot = value;
            true
        }
        None => false,
    }
}

fn appended<T: Clone>(items: &Collection<T>, item: &T) -> Collection<T> {
    let mut next = Vec::with_capacity(items.len() + 1);
    next.extend(items.iter().cloned());
    next.push(item.clone());
    Arc::new(next)
}

/// Patch the first entity with `id`; `None` if absent or unchanged.
fn updated<T, F>(items: &Collection<T>, id: &str, patch: F) -> Option<Collection<T>>
where
    T: Clone + PartialEq + Identified,
    F: FnOnce(&mut T),
{
    let index = items.iter().position(|item| item.id() == id)?;
    let mut entity = items[index].clone();
    patch(&mut entity);
    if entity == items[index] {
        return None;
    }
    let mut next = items.to_vec();
    next[index] = entity;
    Some(Arc::new(next))
}

/// Drop every entity with `id`, keeping the others in order.
fn without<T: Clone + Identified>(items: &Collection<T>, id: &str) -> Option<Collection<T>> {
    if !items.iter().any(|item| item.id() == id) {
        return None;
    }
    Some(Arc::new(
        items.iter().filter(|item| item.id() != id).cloned().collect(),
    ))
}
