//! Derived writes for each domain event.

use super::{CascadeFn, HandlerContext};
use crate::error::HandlerError;
use crate::store::Transaction;
use campus_config::AttendanceDeltas;
use campus_protocol::{
    Action, AttendanceStatus, CalendarEvent, CalendarEventType, CommunicationScope, ContentKind,
    Conversation, ConversationKind, CoursePatch, CourseStatus, DomainEvent, EntityRef, Enrollment,
    EventTag, FeedItem, FeedKind, Notification, NotificationKind, StudentPatch,
};
use chrono::{DateTime, TimeDelta, Utc};
use log::debug;

/// Calendar color for assignment deadlines.
const DEADLINE_COLOR: &str = "#ef4444";

pub(super) fn cascade_for(tag: EventTag) -> CascadeFn {
    match tag {
        EventTag::CourseCreated => course_created,
        EventTag::CourseSuspended => course_suspended,
        EventTag::PaymentRecorded => payment_recorded,
        EventTag::AttendanceTaken => attendance_taken,
        EventTag::ContentPublished => content_published,
        EventTag::StudentEnrolled => student_enrolled,
        EventTag::StudentStatusChanged => student_status_changed,
        EventTag::CommunicationSent => communication_sent,
    }
}

/// Placeholder session, feed announcement, group chat and notification.
fn course_created(
    event: &DomainEvent,
    ctx: &HandlerContext,
    tx: &mut Transaction<'_>,
) -> Result<(), HandlerError> {
    let DomainEvent::CourseCreated { course } = event else {
        return Err(unexpected(EventTag::CourseCreated, event));
    };
    let now = ctx.clock.now();
    let schedule = &ctx.cascades.placeholder;
    let starts_at = shift(now, schedule.start_offset_hours)?;
    let ends_at = shift(starts_at, schedule.duration_hours)?;

    tx.dispatch(Action::AddEvent(CalendarEvent {
        id: ctx.new_id("evt"),
        institution_id: course.institution_id.clone(),
        title: course.title.clone(),
        event_type: course.course_type.event_type(),
        color: course.course_type.color().to_string(),
        starts_at,
        ends_at,
        source_course_id: Some(course.id.clone()),
        source_content_id: None,
    }))?;
    tx.dispatch(Action::AddFeedItem(FeedItem {
        id: ctx.new_id("feed"),
        institution_id: course.institution_id.clone(),
        course_id: Some(course.id.clone()),
        kind: FeedKind::Announcement,
        title: format!("New course: {}", course.title),
        body: course.description.clone(),
        created_at: now,
    }))?;
    tx.dispatch(Action::AddConversation(Conversation {
        id: ctx.new_id("conv"),
        institution_id: course.institution_id.clone(),
        title: course.title.clone(),
        kind: ConversationKind::CourseGroup,
        course_id: Some(course.id.clone()),
        participant_ids: course.teacher_id.iter().cloned().collect(),
        unread: 0,
        last_message: None,
        updated_at: now,
    }))?;
    tx.dispatch(notify(
        ctx,
        &course.institution_id,
        NotificationKind::System,
        "New course",
        format!("\"{}\" is now open", course.title),
    ))?;
    Ok(())
}

/// Suspend the course and clear the calendar entries it generated.
fn course_suspended(
    event: &DomainEvent,
    ctx: &HandlerContext,
    tx: &mut Transaction<'_>,
) -> Result<(), HandlerError> {
    let DomainEvent::CourseSuspended(suspension) = event else {
        return Err(unexpected(EventTag::CourseSuspended, event));
    };
    let title = tx
        .state()
        .courses
        .iter()
        .find(|course| {
            course.id == suspension.course_id
                && course.institution_id == suspension.institution_id
        })
        .map(|course| course.title.clone())
        .ok_or_else(|| HandlerError::missing("course", &suspension.course_id))?;

    tx.dispatch(Action::UpdateCourse(CoursePatch {
        id: suspension.course_id.clone(),
        status: Some(CourseStatus::Suspended),
        ..CoursePatch::default()
    }))?;

    let linked: Vec<String> = tx
        .state()
        .events
        .iter()
        .filter(|event| event.source_course_id.as_deref() == Some(suspension.course_id.as_str()))
        .map(|event| event.id.clone())
        .collect();
    debug!(
        "removing course events (course_id={}, count={})",
        suspension.course_id,
        linked.len()
    );
    for id in linked {
        tx.dispatch(Action::DeleteEvent(EntityRef::new(id)))?;
    }

    let message = match &suspension.reason {
        Some(reason) => format!("\"{title}\" has been suspended: {reason}"),
        None => format!("\"{title}\" has been suspended"),
    };
    tx.dispatch(notify(
        ctx,
        &suspension.institution_id,
        NotificationKind::Status,
        "Course suspended",
        message,
    ))?;
    Ok(())
}

fn payment_recorded(
    event: &DomainEvent,
    ctx: &HandlerContext,
    tx: &mut Transaction<'_>,
) -> Result<(), HandlerError> {
    let DomainEvent::PaymentRecorded(payment) = event else {
        return Err(unexpected(EventTag::PaymentRecorded, event));
    };
    let mut message = format!(
        "{} paid {:.2} {}",
        payment.student_name, payment.amount, payment.currency
    );
    if let Some(concept) = &payment.concept {
        message.push_str(&format!(" for {concept}"));
    }
    tx.dispatch(notify(
        ctx,
        &payment.institution_id,
        NotificationKind::Payment,
        "Payment received",
        message,
    ))?;
    Ok(())
}

/// Adjust attendance rates, clamped to `[0, 100]`, and flag absences.
fn attendance_taken(
    event: &DomainEvent,
    ctx: &HandlerContext,
    tx: &mut Transaction<'_>,
) -> Result<(), HandlerError> {
    let DomainEvent::AttendanceTaken(sheet) = event else {
        return Err(unexpected(EventTag::AttendanceTaken, event));
    };
    for record in &sheet.records {
        let current = tx
            .state()
            .students
            .iter()
            .find(|student| {
                student.id == record.student_id && student.institution_id == sheet.institution_id
            })
            .map(|student| student.attendance_rate);
        let Some(current) = current else {
            debug!(
                "attendance for unknown student (student_id={}, course_id={})",
                record.student_id, sheet.course_id
            );
            continue;
        };
        let rate = adjusted_rate(current, record.status, &ctx.cascades.attendance);
        tx.dispatch(Action::UpdateStudent(StudentPatch {
            id: record.student_id.clone(),
            attendance_rate: Some(rate),
            ..StudentPatch::default()
        }))?;
    }

    let absent = sheet.count(AttendanceStatus::Absent);
    if absent > 0 {
        let noun = if absent == 1 { "student" } else { "students" };
        tx.dispatch(notify(
            ctx,
            &sheet.institution_id,
            NotificationKind::Attendance,
            "Absences recorded",
            format!("{absent} {noun} absent in course {}", sheet.course_id),
        ))?;
    }
    Ok(())
}

fn content_published(
    event: &DomainEvent,
    ctx: &HandlerContext,
    tx: &mut Transaction<'_>,
) -> Result<(), HandlerError> {
    let DomainEvent::ContentPublished(content) = event else {
        return Err(unexpected(EventTag::ContentPublished, event));
    };
    tx.dispatch(notify(
        ctx,
        &content.institution_id,
        NotificationKind::Content,
        format!("New {}", content.kind.label().to_lowercase()),
        content.title.clone(),
    ))?;

    if let (ContentKind::Assignment, Some(due_at)) = (content.kind, content.due_at) {
        tx.dispatch(Action::AddEvent(CalendarEvent {
            id: ctx.new_id("evt"),
            institution_id: content.institution_id.clone(),
            title: format!("Due: {}", content.title),
            event_type: CalendarEventType::Deadline,
            color: DEADLINE_COLOR.to_string(),
            starts_at: due_at,
            ends_at: due_at,
            source_course_id: Some(content.course_id.clone()),
            source_content_id: Some(content.id.clone()),
        }))?;
    }
    Ok(())
}

fn student_enrolled(
    event: &DomainEvent,
    ctx: &HandlerContext,
    tx: &mut Transaction<'_>,
) -> Result<(), HandlerError> {
    let DomainEvent::StudentEnrolled(enrollment) = event else {
        return Err(unexpected(EventTag::StudentEnrolled, event));
    };
    tx.dispatch(Action::EnrollStudent(Enrollment {
        course_id: enrollment.course_id.clone(),
        student_id: enrollment.student_id.clone(),
    }))?;
    let course = tx
        .state()
        .courses
        .iter()
        .find(|course| course.id == enrollment.course_id)
        .map_or_else(|| enrollment.course_id.clone(), |course| course.title.clone());
    tx.dispatch(notify(
        ctx,
        &enrollment.institution_id,
        NotificationKind::Enrollment,
        "New enrollment",
        format!("{} enrolled in {course}", enrollment.student_name),
    ))?;
    Ok(())
}

fn student_status_changed(
    event: &DomainEvent,
    ctx: &HandlerContext,
    tx: &mut Transaction<'_>,
) -> Result<(), HandlerError> {
    let DomainEvent::StudentStatusChanged(change) = event else {
        return Err(unexpected(EventTag::StudentStatusChanged, event));
    };
    if change.old_status == change.new_status {
        return Ok(());
    }
    tx.dispatch(notify(
        ctx,
        &change.institution_id,
        NotificationKind::Status,
        "Student status updated",
        format!(
            "{} is now {}",
            change.student_name,
            change.new_status.as_str()
        ),
    ))?;
    Ok(())
}

fn communication_sent(
    event: &DomainEvent,
    ctx: &HandlerContext,
    tx: &mut Transaction<'_>,
) -> Result<(), HandlerError> {
    let DomainEvent::CommunicationSent { communication } = event else {
        return Err(unexpected(EventTag::CommunicationSent, event));
    };
    let kind = match communication.scope {
        CommunicationScope::General | CommunicationScope::Room { .. } => {
            NotificationKind::Announcement
        }
        CommunicationScope::Individual { .. } => NotificationKind::Message,
    };
    let message = if communication.body.is_empty() {
        communication.subject.clone()
    } else {
        communication.body.clone()
    };
    tx.dispatch(notify(
        ctx,
        &communication.institution_id,
        kind,
        communication.subject.clone(),
        message,
    ))?;
    Ok(())
}

fn adjusted_rate(current: f64, status: AttendanceStatus, deltas: &AttendanceDeltas) -> f64 {
    let delta = match status {
        AttendanceStatus::Present => deltas.present,
        AttendanceStatus::Late => deltas.late,
        AttendanceStatus::Absent => deltas.absent,
    };
    (current + delta).clamp(0.0, 100.0)
}

fn notify(
    ctx: &HandlerContext,
    institution_id: &str,
    kind: NotificationKind,
    title: impl Into<String>,
    message: String,
) -> Action {
    Action::AddNotification(Notification {
        id: ctx.new_id("ntf"),
        institution_id: institution_id.to_string(),
        kind,
        title: title.into(),
        message,
        read: false,
        created_at: ctx.clock.now(),
    })
}

fn shift(base: DateTime<Utc>, hours: i64) -> Result<DateTime<Utc>, HandlerError> {
    TimeDelta::try_hours(hours)
        .and_then(|delta| base.checked_add_signed(delta))
        .ok_or_else(|| HandlerError::Failed(format!("schedule offset of {hours}h is out of range")))
}

fn unexpected(expected: EventTag, event: &DomainEvent) -> HandlerError {
    HandlerError::UnexpectedEvent {
        expected,
        actual: event.tag(),
    }
}
