//! Trip lifecycle rules.
//!
//! Every mutation of a trip, its roster or its schedule goes through
//! [`TripPlanner`], which validates the request against what is already
//! stored before writing, and hands confirmation emails to a detached task
//! so callers never wait for mail delivery.
//!
//! Checks and writes are separate store calls without a surrounding
//! transaction; two concurrent requests against the same trip may both pass
//! a check before either writes.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use lettre::Address;
use tracing::error;
use url::Url;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        activity::{Activity, ActivityDay, NewActivity},
        link::{Link, NewLink},
        participant::Participant,
        trip::{NewTrip, Trip, TripChanges},
    },
    services::{mailer::Mailer, storage::Storage},
};

const MIN_DESTINATION_LEN: usize = 4;

#[derive(Clone)]
pub struct TripPlanner {
    storage: Arc<dyn Storage>,
    mailer: Arc<dyn Mailer>,
}

impl TripPlanner {
    pub fn new(storage: Arc<dyn Storage>, mailer: Arc<dyn Mailer>) -> Self {
        Self { storage, mailer }
    }

    /// Stores a new unconfirmed trip and asks its owner to confirm it.
    pub async fn create_trip(&self, mut new_trip: NewTrip) -> Result<Uuid, AppError> {
        new_trip.destination = validate_destination(&new_trip.destination)?;
        new_trip.owner_email = validate_email(&new_trip.owner_email)?;
        new_trip.owner_name = new_trip.owner_name.trim().to_string();
        if new_trip.owner_name.is_empty() {
            return Err(AppError::bad_request("invalid input: owner_name is required"));
        }
        let mut invitees: Vec<String> = Vec::with_capacity(new_trip.emails_to_invite.len());
        for email in &new_trip.emails_to_invite {
            let email = validate_email(email)?;
            if !invitees.contains(&email) {
                invitees.push(email);
            }
        }
        new_trip.emails_to_invite = invitees;
        validate_period(new_trip.starts_at, new_trip.ends_at, Utc::now())?;

        let trip = self.storage.create_trip(&new_trip).await?;
        let trip_id = trip.id;

        let mailer = Arc::clone(&self.mailer);
        tokio::spawn(async move {
            if let Err(err) = mailer.send_trip_confirmation(&trip).await {
                error!(trip_id = %trip.id, error = %err, "failed to send trip confirmation to owner");
            }
        });

        Ok(trip_id)
    }

    pub async fn trip_details(&self, trip_id: Uuid) -> Result<Trip, AppError> {
        self.require_trip(trip_id).await
    }

    /// Rejects the change as a whole when any scheduled activity would fall
    /// outside the new period.
    pub async fn update_trip(&self, trip_id: Uuid, changes: TripChanges) -> Result<(), AppError> {
        let destination = validate_destination(&changes.destination)?;
        self.require_trip(trip_id).await?;
        validate_period(changes.starts_at, changes.ends_at, Utc::now())?;

        let activities = self.storage.list_activities(trip_id).await?;
        let orphaned = activities_outside(&activities, changes.starts_at, changes.ends_at);
        if !orphaned.is_empty() {
            let ids = orphaned
                .iter()
                .map(|activity| activity.id.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(AppError::bad_request(format!(
                "changes invalid, there are activities out of the new trip period: {ids}"
            )));
        }

        self.storage
            .update_trip(
                trip_id,
                &TripChanges {
                    destination,
                    ..changes
                },
            )
            .await
    }

    /// Marks the trip confirmed and invites every participant on its roster,
    /// whatever their own confirmation state.
    pub async fn confirm_trip(&self, trip_id: Uuid) -> Result<(), AppError> {
        let mut trip = self.require_trip(trip_id).await?;
        self.storage.confirm_trip(trip_id).await?;
        trip.is_confirmed = true;

        let participants = self.storage.list_participants(trip_id).await?;
        self.dispatch_invites(trip, participants);
        Ok(())
    }

    pub async fn list_participants(&self, trip_id: Uuid) -> Result<Vec<Participant>, AppError> {
        self.require_trip(trip_id).await?;
        self.storage.list_participants(trip_id).await
    }

    /// Adds `email` to the roster and re-sends invites to everyone who has
    /// not confirmed yet, the new participant included.
    pub async fn invite_participant(&self, trip_id: Uuid, email: &str) -> Result<Uuid, AppError> {
        let email = validate_email(email)?;
        let trip = self.require_trip(trip_id).await?;

        let participants = self.storage.list_participants(trip_id).await?;
        if !select(&participants, |participant| participant.has_email(&email)).is_empty() {
            return Err(AppError::bad_request("participant already exists"));
        }

        let participant = Participant::new(trip_id, email);
        let participant_id = participant.id;
        self.storage
            .invite_participants(std::slice::from_ref(&participant))
            .await?;

        let roster = self.storage.list_participants(trip_id).await?;
        let pending = select(&roster, |participant| !participant.is_confirmed);
        self.dispatch_invites(trip, pending);

        Ok(participant_id)
    }

    /// A participant can be confirmed once; repeating it is an error.
    pub async fn confirm_participant(&self, participant_id: Uuid) -> Result<(), AppError> {
        let participant = self
            .storage
            .get_participant(participant_id)
            .await?
            .ok_or_else(|| AppError::not_found("participant not found"))?;
        if participant.is_confirmed {
            return Err(AppError::bad_request("participant already confirmed"));
        }
        self.storage.confirm_participant(participant_id).await
    }

    pub async fn create_activity(
        &self,
        trip_id: Uuid,
        new_activity: NewActivity,
    ) -> Result<Uuid, AppError> {
        let title = new_activity.title.trim();
        if title.is_empty() {
            return Err(AppError::bad_request("invalid request: title is required"));
        }
        let trip = self.require_trip(trip_id).await?;
        if !trip.covers(new_activity.occurs_at) {
            return Err(AppError::bad_request(format!(
                "invalid activity, date of occurrence outside the trip period ('{}' to '{}')",
                trip.starts_at, trip.ends_at
            )));
        }

        let activity = Activity {
            id: Uuid::new_v4(),
            trip_id,
            title: title.to_string(),
            occurs_at: new_activity.occurs_at,
        };
        self.storage.create_activity(&activity).await?;
        Ok(activity.id)
    }

    pub async fn list_activities(&self, trip_id: Uuid) -> Result<Vec<ActivityDay>, AppError> {
        let trip = self.require_trip(trip_id).await?;
        let activities = self.storage.list_activities(trip_id).await?;
        Ok(group_by_day(&trip, activities))
    }

    pub async fn create_link(&self, trip_id: Uuid, new_link: NewLink) -> Result<Uuid, AppError> {
        let title = new_link.title.trim();
        if title.is_empty() {
            return Err(AppError::bad_request("invalid request: title is required"));
        }
        let url = new_link.url.trim();
        Url::parse(url)
            .map_err(|err| AppError::bad_request(format!("invalid request: url {err}")))?;
        self.require_trip(trip_id).await?;

        let link = Link {
            id: Uuid::new_v4(),
            trip_id,
            title: title.to_string(),
            url: url.to_string(),
        };
        self.storage.create_link(&link).await?;
        Ok(link.id)
    }

    pub async fn list_links(&self, trip_id: Uuid) -> Result<Vec<Link>, AppError> {
        self.require_trip(trip_id).await?;
        self.storage.list_links(trip_id).await
    }

    async fn require_trip(&self, trip_id: Uuid) -> Result<Trip, AppError> {
        self.storage
            .get_trip(trip_id)
            .await?
            .ok_or_else(|| AppError::not_found("trip not found"))
    }

    fn dispatch_invites(&self, trip: Trip, participants: Vec<Participant>) {
        if participants.is_empty() {
            return;
        }
        let mailer = Arc::clone(&self.mailer);
        tokio::spawn(async move {
            if let Err(err) = mailer.send_participant_invites(&trip, &participants).await {
                error!(trip_id = %trip.id, error = %err, "failed to send participant invites");
            }
        });
    }
}

/// A period is valid when it does not start before `now` and does not end
/// before it starts.
pub fn validate_period(
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    if starts_at < now {
        return Err(AppError::bad_request(
            "the travel period is invalid, the start date cannot be before now",
        ));
    }
    if ends_at < starts_at {
        return Err(AppError::bad_request(
            "the travel period is invalid, end date must be equal to or greater than the start date",
        ));
    }
    Ok(())
}

/// Items matching `predicate`, in their original order.
pub fn select<T, F>(items: &[T], predicate: F) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> bool,
{
    items.iter().filter(|item| predicate(*item)).cloned().collect()
}

pub fn activities_outside(
    activities: &[Activity],
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
) -> Vec<Activity> {
    select(activities, |activity| {
        activity.occurs_at < starts_at || activity.occurs_at > ends_at
    })
}

/// One bucket per calendar day (UTC) of the trip, first to last day
/// inclusive. Activities on days outside the trip are dropped.
pub fn group_by_day(trip: &Trip, mut activities: Vec<Activity>) -> Vec<ActivityDay> {
    activities.sort_by_key(|activity| activity.occurs_at);
    let last_day = trip.ends_at.date_naive();
    trip.starts_at
        .date_naive()
        .iter_days()
        .take_while(|day| *day <= last_day)
        .map(|date: NaiveDate| ActivityDay {
            date,
            activities: select(&activities, |activity| {
                activity.occurs_at.date_naive() == date
            }),
        })
        .collect()
}

fn validate_destination(destination: &str) -> Result<String, AppError> {
    let destination = destination.trim();
    if destination.chars().count() < MIN_DESTINATION_LEN {
        return Err(AppError::bad_request(format!(
            "invalid input: destination must have at least {MIN_DESTINATION_LEN} characters"
        )));
    }
    Ok(destination.to_string())
}

fn validate_email(email: &str) -> Result<String, AppError> {
    let email = email.trim();
    email
        .parse::<Address>()
        .map_err(|err| AppError::bad_request(format!("invalid input: email '{email}': {err}")))?;
    Ok(email.to_string())
}
