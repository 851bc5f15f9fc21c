// Events service: targeted events, invitations and responses.

use serde::{Deserialize, Serialize};

use crate::db::events::NewEvent;
use crate::db::targeting::{Targets, EVENT_TARGETS};
use crate::db::{DbEvent, DbEventAttendee, PulseDb};
use crate::error::ApiError;
use crate::services::notifications::notify_best_effort;
use crate::types::{EventResponse, EVENT_INVITATION};
use crate::util::{format_ts, parse_ts};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub venue: Option<String>,
    #[serde(default)]
    pub start_date: String,
    pub end_date: Option<String>,
    #[serde(default)]
    pub target: Targets,
}

/// An event annotated with the caller's own response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventView {
    #[serde(flatten)]
    pub event: DbEvent,
    pub my_response: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseCounts {
    pub accepted: usize,
    pub declined: usize,
    pub pending: usize,
    pub no_response: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponses {
    pub counts: ResponseCounts,
    pub attendees: Vec<DbEventAttendee>,
}

/// Created event plus the number of invitations delivered.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedEvent {
    #[serde(flatten)]
    pub event: DbEvent,
    pub invitations_sent: usize,
}

/// Create the event and its targeting rows atomically, then invite the
/// directly targeted employees.
pub fn create_event(
    db: &PulseDb,
    creator_id: &str,
    req: &CreateEventRequest,
) -> Result<CreatedEvent, ApiError> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(ApiError::Validation("Title is required".into()));
    }
    let start = parse_ts(&req.start_date)
        .ok_or_else(|| ApiError::Validation("startDate must be a date or RFC 3339 timestamp".into()))?;
    let end = match req.end_date.as_deref().filter(|d| !d.trim().is_empty()) {
        Some(raw) => Some(parse_ts(raw).ok_or_else(|| {
            ApiError::Validation("endDate must be a date or RFC 3339 timestamp".into())
        })?),
        None => None,
    };
    if matches!(end, Some(end) if end < start) {
        return Err(ApiError::Validation("endDate is before startDate".into()));
    }
    crate::services::posts::validate_targets(db, &req.target)?;

    let new_event = NewEvent {
        creator_id,
        title,
        description: req.description.as_deref(),
        venue: req.venue.as_deref(),
        start_date: format_ts(start),
        end_date: end.map(format_ts),
        is_global: req.target.everyone,
    };
    let event = db.with_transaction(|tx| -> Result<DbEvent, ApiError> {
        let event = tx.insert_event(&new_event)?;
        tx.insert_targets(&EVENT_TARGETS, &event.id, &req.target)?;
        Ok(event)
    })?;

    let message = format!("You're invited to {} on {}", event.title, event.start_date);
    let invitations_sent = req
        .target
        .employee_ids
        .iter()
        .filter(|id| id.as_str() != creator_id)
        .map(|id| notify_best_effort(db, id, EVENT_INVITATION, Some(&event.id), &message))
        .sum::<usize>();

    log::info!(
        "Event {} created by {} ({} invitations)",
        event.id,
        creator_id,
        invitations_sent
    );
    Ok(CreatedEvent {
        event,
        invitations_sent,
    })
}

/// Response shown to the caller: the direct row's answer when present,
/// `Pending` for the creator, otherwise none.
fn annotate_response(
    event: &DbEvent,
    employee_id: &str,
    direct: Option<&Option<String>>,
) -> Option<String> {
    match direct {
        Some(Some(response)) => Some(response.clone()),
        _ if event.creator_id == employee_id => Some(EventResponse::Pending.as_str().to_string()),
        _ => None,
    }
}

/// Events visible to the employee (targeted or created by them), listed
/// while not archived or still upcoming.
pub fn list_events(
    db: &PulseDb,
    employee_id: &str,
    search: Option<&str>,
    now: &str,
) -> Result<Vec<EventView>, ApiError> {
    let audience = db
        .audience_for(employee_id)?
        .ok_or_else(|| ApiError::not_found("Employee"))?;
    let ids: Vec<String> = db
        .visible_entity_ids(&EVENT_TARGETS, &audience)?
        .into_iter()
        .collect();
    let events = db.get_listed_events_by_ids(&ids, now, search)?;
    let event_ids: Vec<String> = events.iter().map(|e| e.id.clone()).collect();
    let responses = db.get_direct_responses(employee_id, &event_ids)?;

    Ok(events
        .into_iter()
        .map(|event| {
            let my_response = annotate_response(&event, employee_id, responses.get(&event.id));
            EventView { event, my_response }
        })
        .collect())
}

/// Record the caller's response. The value is validated before any lookup
/// so a bad value never touches the store.
pub fn respond_to_event(
    db: &PulseDb,
    event_id: &str,
    employee_id: &str,
    raw_response: &str,
) -> Result<EventView, ApiError> {
    let response: EventResponse = raw_response.parse().map_err(ApiError::Validation)?;

    let event = db
        .get_event(event_id)?
        .ok_or_else(|| ApiError::not_found("Event"))?;
    let audience = db
        .audience_for(employee_id)?
        .ok_or_else(|| ApiError::not_found("Employee"))?;
    if !db
        .visible_entity_ids(&EVENT_TARGETS, &audience)?
        .contains(&event.id)
    {
        return Err(ApiError::not_found("Event"));
    }

    db.upsert_event_response(&event.id, employee_id, response.as_str())?;
    Ok(EventView {
        event,
        my_response: Some(response.as_str().to_string()),
    })
}

/// Response tally for the creator.
pub fn event_responses(
    db: &PulseDb,
    event_id: &str,
    creator_id: &str,
) -> Result<EventResponses, ApiError> {
    let event = db
        .get_event(event_id)?
        .filter(|e| e.creator_id == creator_id)
        .ok_or_else(|| ApiError::not_found("Event"))?;
    let attendees = db.get_event_attendees(&event.id)?;
    let mut counts = ResponseCounts::default();
    for attendee in &attendees {
        match attendee.response.as_deref() {
            Some("Accepted") => counts.accepted += 1,
            Some("Declined") => counts.declined += 1,
            Some(_) => counts.pending += 1,
            None => counts.no_response += 1,
        }
    }
    Ok(EventResponses { counts, attendees })
}

pub fn archive_event(db: &PulseDb, event_id: &str, creator_id: &str) -> Result<DbEvent, ApiError> {
    if !db.archive_event(event_id, creator_id)? {
        return Err(ApiError::not_found("Event"));
    }
    db.get_event(event_id)?
        .ok_or_else(|| ApiError::not_found("Event"))
}
