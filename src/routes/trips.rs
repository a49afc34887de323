use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::parse_id;
use crate::{
    error::AppError,
    models::{
        activity::{Activity, ActivityDay, NewActivity},
        link::{Link, NewLink},
        participant::Participant,
        trip::{NewTrip, Trip, TripChanges},
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trips", post(create_trip))
        .route("/trips/:trip_id", get(trip_details).put(update_trip))
        // GET serves the emailed link; both verbs run the same confirmation.
        .route("/trips/:trip_id/confirm", get(confirm_trip).patch(confirm_trip))
        .route("/trips/:trip_id/participants", get(participants_list))
        .route("/trips/:trip_id/invites", post(invite_participant))
        .route(
            "/trips/:trip_id/activities",
            get(activities_list).post(create_activity),
        )
        .route("/trips/:trip_id/links", get(links_list).post(create_link))
}

#[derive(Deserialize)]
struct CreateTripRequest {
    destination: String,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    owner_name: String,
    owner_email: String,
    #[serde(default)]
    emails_to_invite: Vec<String>,
}

#[derive(Serialize)]
struct CreateTripResponse {
    trip_id: Uuid,
}

async fn create_trip(
    State(state): State<AppState>,
    payload: Result<Json<CreateTripRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateTripResponse>), AppError> {
    let Json(body) = payload?;
    let trip_id = state
        .planner
        .create_trip(NewTrip {
            destination: body.destination,
            owner_email: body.owner_email,
            owner_name: body.owner_name,
            starts_at: body.starts_at,
            ends_at: body.ends_at,
            emails_to_invite: body.emails_to_invite,
        })
        .await
        .map_err(|err| err.conceal("/trips", "-", "unable to create trip"))?;
    Ok((StatusCode::CREATED, Json(CreateTripResponse { trip_id })))
}

#[derive(Serialize)]
struct TripView {
    id: Uuid,
    destination: String,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    is_confirmed: bool,
}

impl From<Trip> for TripView {
    fn from(trip: Trip) -> Self {
        Self {
            id: trip.id,
            destination: trip.destination,
            starts_at: trip.starts_at,
            ends_at: trip.ends_at,
            is_confirmed: trip.is_confirmed,
        }
    }
}

#[derive(Serialize)]
struct TripDetailsResponse {
    trip: TripView,
}

async fn trip_details(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
) -> Result<Json<TripDetailsResponse>, AppError> {
    let id = parse_id("tripId", &trip_id)?;
    let trip = state
        .planner
        .trip_details(id)
        .await
        .map_err(|err| err.conceal("/trips/{tripId}", &trip_id, "unable to get trip"))?;
    Ok(Json(TripDetailsResponse { trip: trip.into() }))
}

#[derive(Deserialize)]
struct UpdateTripRequest {
    destination: String,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
}

async fn update_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    payload: Result<Json<UpdateTripRequest>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let id = parse_id("tripId", &trip_id)?;
    let Json(body) = payload?;
    state
        .planner
        .update_trip(
            id,
            TripChanges {
                destination: body.destination,
                starts_at: body.starts_at,
                ends_at: body.ends_at,
            },
        )
        .await
        .map_err(|err| err.conceal("/trips/{tripId}", &trip_id, "unable to update trip"))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn confirm_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id("tripId", &trip_id)?;
    state.planner.confirm_trip(id).await.map_err(|err| {
        err.conceal(
            "/trips/{tripId}/confirm",
            &trip_id,
            "unable to confirm trip and send notifications",
        )
    })?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
struct ParticipantView {
    id: Uuid,
    email: String,
    is_confirmed: bool,
}

impl From<Participant> for ParticipantView {
    fn from(participant: Participant) -> Self {
        Self {
            id: participant.id,
            email: participant.email,
            is_confirmed: participant.is_confirmed,
        }
    }
}

#[derive(Serialize)]
struct ParticipantsResponse {
    participants: Vec<ParticipantView>,
}

async fn participants_list(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
) -> Result<Json<ParticipantsResponse>, AppError> {
    let id = parse_id("tripId", &trip_id)?;
    let participants = state.planner.list_participants(id).await.map_err(|err| {
        err.conceal(
            "/trips/{tripId}/participants",
            &trip_id,
            "unable to retrieve trip's participants",
        )
    })?;
    Ok(Json(ParticipantsResponse {
        participants: participants.into_iter().map(Into::into).collect(),
    }))
}

#[derive(Deserialize)]
struct InviteRequest {
    email: String,
}

#[derive(Serialize)]
struct InviteResponse {
    participant_id: Uuid,
}

async fn invite_participant(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    payload: Result<Json<InviteRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<InviteResponse>), AppError> {
    let id = parse_id("tripId", &trip_id)?;
    let Json(body) = payload?;
    let participant_id = state
        .planner
        .invite_participant(id, &body.email)
        .await
        .map_err(|err| {
            err.conceal(
                "/trips/{tripId}/invites",
                &trip_id,
                "unable to invite participant",
            )
        })?;
    Ok((StatusCode::CREATED, Json(InviteResponse { participant_id })))
}

#[derive(Serialize)]
struct ActivityView {
    id: Uuid,
    title: String,
    occurs_at: DateTime<Utc>,
}

impl From<Activity> for ActivityView {
    fn from(activity: Activity) -> Self {
        Self {
            id: activity.id,
            title: activity.title,
            occurs_at: activity.occurs_at,
        }
    }
}

#[derive(Serialize)]
struct ActivityDayView {
    date: DateTime<Utc>,
    activities: Vec<ActivityView>,
}

impl From<ActivityDay> for ActivityDayView {
    fn from(day: ActivityDay) -> Self {
        Self {
            date: Utc.from_utc_datetime(&day.date.and_time(NaiveTime::MIN)),
            activities: day.activities.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Serialize)]
struct ActivitiesResponse {
    activities: Vec<ActivityDayView>,
}

async fn activities_list(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
) -> Result<Json<ActivitiesResponse>, AppError> {
    let id = parse_id("tripId", &trip_id)?;
    let days = state.planner.list_activities(id).await.map_err(|err| {
        err.conceal(
            "/trips/{tripId}/activities",
            &trip_id,
            "unable to get activities",
        )
    })?;
    Ok(Json(ActivitiesResponse {
        activities: days.into_iter().map(Into::into).collect(),
    }))
}

#[derive(Deserialize)]
struct CreateActivityRequest {
    title: String,
    occurs_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct CreateActivityResponse {
    activity_id: Uuid,
}

async fn create_activity(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    payload: Result<Json<CreateActivityRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateActivityResponse>), AppError> {
    let id = parse_id("tripId", &trip_id)?;
    let Json(body) = payload?;
    let activity_id = state
        .planner
        .create_activity(
            id,
            NewActivity {
                title: body.title,
                occurs_at: body.occurs_at,
            },
        )
        .await
        .map_err(|err| {
            err.conceal(
                "/trips/{tripId}/activities",
                &trip_id,
                "unable to create activity",
            )
        })?;
    Ok((
        StatusCode::CREATED,
        Json(CreateActivityResponse { activity_id }),
    ))
}

#[derive(Serialize)]
struct LinkView {
    id: Uuid,
    title: String,
    url: String,
}

impl From<Link> for LinkView {
    fn from(link: Link) -> Self {
        Self {
            id: link.id,
            title: link.title,
            url: link.url,
        }
    }
}

#[derive(Serialize)]
struct LinksResponse {
    links: Vec<LinkView>,
}

async fn links_list(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
) -> Result<Json<LinksResponse>, AppError> {
    let id = parse_id("tripId", &trip_id)?;
    let links = state
        .planner
        .list_links(id)
        .await
        .map_err(|err| err.conceal("/trips/{tripId}/links", &trip_id, "unable to get links"))?;
    Ok(Json(LinksResponse {
        links: links.into_iter().map(Into::into).collect(),
    }))
}

#[derive(Deserialize)]
struct CreateLinkRequest {
    title: String,
    url: String,
}

#[derive(Serialize)]
struct CreateLinkResponse {
    link_id: Uuid,
}

async fn create_link(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    payload: Result<Json<CreateLinkRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateLinkResponse>), AppError> {
    let id = parse_id("tripId", &trip_id)?;
    let Json(body) = payload?;
    let link_id = state
        .planner
        .create_link(
            id,
            NewLink {
                title: body.title,
                url: body.url,
            },
        )
        .await
        .map_err(|err| {
            err.conceal(
                "/trips/{tripId}/links",
                &trip_id,
                "unable to create link to trip",
            )
        })?;
    Ok((StatusCode::CREATED, Json(CreateLinkResponse { link_id })))
}
