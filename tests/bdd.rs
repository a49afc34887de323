use std::{
    fmt,
    fs::File,
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::Context;
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration as Days, Utc};
use cucumber::{given, then, when, World as _};
use planner::{
    db::{init_pool, run_migrations},
    error::AppError,
    models::{participant::Participant, trip::Trip},
    routes::create_router,
    services::{mailer::Mailer, storage::SqliteStorage},
    state::AppState,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

#[derive(Default)]
struct RecordingMailer {
    owner_mails: Mutex<Vec<String>>,
    invites: Mutex<Vec<String>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_trip_confirmation(&self, trip: &Trip) -> Result<(), AppError> {
        self.owner_mails
            .lock()
            .unwrap()
            .push(trip.owner_email.clone());
        Ok(())
    }

    async fn send_participant_invites(
        &self,
        _trip: &Trip,
        participants: &[Participant],
    ) -> Result<(), AppError> {
        self.invites
            .lock()
            .unwrap()
            .extend(participants.iter().map(|p| p.email.clone()));
        Ok(())
    }
}

#[derive(Debug, cucumber::World, Default)]
struct PlannerWorld {
    state: Option<TestState>,
    trip_id: Option<String>,
    trip_before: Option<Value>,
    activity_id: Option<String>,
    participant_id: Option<String>,
    status: Option<StatusCode>,
    body: Value,
}

impl PlannerWorld {
    fn test_state(&self) -> &TestState {
        self.state.as_ref().expect("state must be initialised first")
    }

    fn trip_id(&self) -> String {
        self.trip_id.clone().expect("a trip must be created first")
    }

    fn at(&self, days: i64) -> DateTime<Utc> {
        self.test_state().base + Days::days(days)
    }

    async fn send(&mut self, method: Method, uri: &str, body: Option<Value>) {
        let (status, body) = self.test_state().call(method, uri, body).await;
        self.status = Some(status);
        self.body = body;
    }

    fn message(&self) -> String {
        self.body["message"]
            .as_str()
            .expect("error body carries a message")
            .to_string()
    }
}

struct TestState {
    app: Router,
    mailer: Arc<RecordingMailer>,
    base: DateTime<Utc>,
    _root: TempDir,
}

impl fmt::Debug for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestState").finish()
    }
}

impl TestState {
    async fn new() -> anyhow::Result<Self> {
        let root = TempDir::new().context("create temp dir for bdd world")?;
        let db_path = root.path().join("bdd.sqlite");
        File::create(&db_path)?;
        let database_url = format!("sqlite://{}", db_path.to_string_lossy());

        let db = init_pool(&database_url).await?;
        run_migrations(&db).await?;

        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::new(Arc::new(SqliteStorage::new(db)), mailer.clone());
        Ok(Self {
            app: create_router(state),
            mailer,
            base: Utc::now(),
            _root: root,
        })
    }

    async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .expect("request");

        let response = self.app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, body)
    }

    async fn invites_sent(&self, expected: usize) -> usize {
        for _ in 0..200 {
            let sent = self.mailer.invites.lock().unwrap().len();
            if sent >= expected {
                // Give stray tasks a moment to show up as extra sends.
                tokio::time::sleep(Duration::from_millis(50)).await;
                return self.mailer.invites.lock().unwrap().len();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.mailer.invites.lock().unwrap().len()
    }
}

fn method(name: &str) -> Method {
    Method::from_bytes(name.as_bytes()).expect("http method")
}

#[given("a fresh planner")]
async fn given_fresh_planner(world: &mut PlannerWorld) {
    world.state = Some(TestState::new().await.expect("state"));
}

#[given(regex = r#"^a trip to "([^"]+)" from day (\d+) to day (\d+)$"#)]
async fn given_trip(world: &mut PlannerWorld, destination: String, start: i64, end: i64) {
    create_trip(world, destination, start, end).await;
    assert_eq!(world.status, Some(StatusCode::CREATED));
}

#[given(regex = r#"^a trip to "([^"]+)" from day (\d+) to day (\d+) inviting "([^"]+)"$"#)]
async fn given_trip_with_invitees(
    world: &mut PlannerWorld,
    destination: String,
    start: i64,
    end: i64,
    invitees: String,
) {
    let emails: Vec<String> = invitees.split(',').map(|e| e.trim().to_string()).collect();
    let body = json!({
        "destination": destination,
        "starts_at": world.at(start),
        "ends_at": world.at(end),
        "owner_name": "Owner",
        "owner_email": "owner@example.com",
        "emails_to_invite": emails,
    });
    world.send(Method::POST, "/trips", Some(body)).await;
    assert_eq!(world.status, Some(StatusCode::CREATED));
    world.trip_id = world.body["trip_id"].as_str().map(str::to_string);
}

#[given(regex = r#"^"([^"]+)" is invited to the trip$"#)]
async fn given_invited(world: &mut PlannerWorld, email: String) {
    invite(world, email).await;
    assert_eq!(world.status, Some(StatusCode::CREATED));
}

#[when(regex = r#"^I create a trip to "([^"]+)" from day (-?\d+) to day (-?\d+)$"#)]
async fn when_create_trip(world: &mut PlannerWorld, destination: String, start: i64, end: i64) {
    create_trip(world, destination, start, end).await;
}

#[given(regex = r#"^I schedule "([^"]+)" on day (\d+)$"#)]
#[when(regex = r#"^I schedule "([^"]+)" on day (\d+)$"#)]
async fn when_schedule(world: &mut PlannerWorld, title: String, day: i64) {
    let uri = format!("/trips/{}/activities", world.trip_id());
    let body = json!({ "title": title, "occurs_at": world.at(day) });
    world.send(Method::POST, &uri, Some(body)).await;
    if world.status == Some(StatusCode::CREATED) {
        world.activity_id = world.body["activity_id"].as_str().map(str::to_string);
    }
}

#[when(regex = r"^I move the trip to day (\d+) through day (\d+)$")]
async fn when_move_trip(world: &mut PlannerWorld, start: i64, end: i64) {
    let uri = format!("/trips/{}", world.trip_id());
    let (_, before) = world.test_state().call(Method::GET, &uri, None).await;
    world.trip_before = Some(before);
    let body = json!({
        "destination": "Paris",
        "starts_at": world.at(start),
        "ends_at": world.at(end),
    });
    world.send(Method::PUT, &uri, Some(body)).await;
}

#[when(regex = r#"^I invite "([^"]+)"$"#)]
async fn when_invite(world: &mut PlannerWorld, email: String) {
    invite(world, email).await;
}

#[when(regex = r"^I confirm the trip with (GET|PATCH)$")]
async fn when_confirm_trip(world: &mut PlannerWorld, verb: String) {
    let uri = format!("/trips/{}/confirm", world.trip_id());
    world.send(method(&verb), &uri, None).await;
}

#[when(regex = r"^I confirm the last invited participant with (GET|PATCH)$")]
async fn when_confirm_participant(world: &mut PlannerWorld, verb: String) {
    let id = world
        .participant_id
        .clone()
        .expect("a participant must be invited first");
    let uri = format!("/participants/{id}/confirm");
    world.send(method(&verb), &uri, None).await;
}

#[when(regex = r#"^I send (GET|PATCH|PUT|POST) "([^"]+)"$"#)]
async fn when_send(world: &mut PlannerWorld, verb: String, uri: String) {
    world.send(method(&verb), &uri, None).await;
}

#[then(regex = r"^the response status is (\d+)$")]
async fn then_status(world: &mut PlannerWorld, expected: u16) {
    assert_eq!(world.status.map(|s| s.as_u16()), Some(expected), "body: {}", world.body);
}

#[then(regex = r#"^the error message contains "([^"]+)"$"#)]
async fn then_message_contains(world: &mut PlannerWorld, expected: String) {
    let message = world.message();
    assert!(message.contains(&expected), "message was: {message}");
}

#[then("the error message names the scheduled activity")]
async fn then_message_names_activity(world: &mut PlannerWorld) {
    let activity_id = world.activity_id.clone().expect("an activity was scheduled");
    let message = world.message();
    assert!(message.contains(&activity_id), "message was: {message}");
}

#[then("the trip is unchanged")]
async fn then_trip_unchanged(world: &mut PlannerWorld) {
    let uri = format!("/trips/{}", world.trip_id());
    let (_, after) = world.test_state().call(Method::GET, &uri, None).await;
    assert_eq!(Some(after), world.trip_before);
}

#[then("the trip is confirmed")]
async fn then_trip_confirmed(world: &mut PlannerWorld) {
    let uri = format!("/trips/{}", world.trip_id());
    let (_, body) = world.test_state().call(Method::GET, &uri, None).await;
    assert_eq!(body["trip"]["is_confirmed"], json!(true));
}

#[then(regex = r"^the trip has (\d+) participants?$")]
async fn then_participant_count(world: &mut PlannerWorld, expected: usize) {
    let uri = format!("/trips/{}/participants", world.trip_id());
    let (_, body) = world.test_state().call(Method::GET, &uri, None).await;
    let participants = body["participants"].as_array().expect("participants list");
    assert_eq!(participants.len(), expected);
}

#[then(regex = r#"^"([^"]+)" is listed as confirmed$"#)]
async fn then_listed_confirmed(world: &mut PlannerWorld, email: String) {
    let uri = format!("/trips/{}/participants", world.trip_id());
    let (_, body) = world.test_state().call(Method::GET, &uri, None).await;
    let found = body["participants"]
        .as_array()
        .expect("participants list")
        .iter()
        .find(|p| p["email"] == json!(email))
        .cloned()
        .expect("participant listed");
    assert_eq!(found["is_confirmed"], json!(true));
}

#[then("the owner is asked to confirm the trip")]
async fn then_owner_notified(world: &mut PlannerWorld) {
    let mailer = &world.test_state().mailer;
    for _ in 0..200 {
        if !mailer.owner_mails.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(
        *mailer.owner_mails.lock().unwrap(),
        vec!["owner@example.com".to_string()]
    );
}

#[then(regex = r"^(\d+) participant invites? (?:is|are) sent$")]
async fn then_invites_sent(world: &mut PlannerWorld, expected: usize) {
    assert_eq!(world.test_state().invites_sent(expected).await, expected);
}

#[then(regex = r"^the activities are grouped into (\d+) days$")]
async fn then_grouped(world: &mut PlannerWorld, expected: usize) {
    let uri = format!("/trips/{}/activities", world.trip_id());
    let (status, body) = world.test_state().call(Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let days = body["activities"].as_array().expect("day list");
    assert_eq!(days.len(), expected);
    let scheduled: usize = days
        .iter()
        .map(|day| day["activities"].as_array().map_or(0, Vec::len))
        .sum();
    assert_eq!(scheduled, 1);
}

#[when(regex = r#"^I attach the link "([^"]+)" titled "([^"]+)"$"#)]
async fn when_attach_link(world: &mut PlannerWorld, url: String, title: String) {
    let uri = format!("/trips/{}/links", world.trip_id());
    world
        .send(Method::POST, &uri, Some(json!({ "title": title, "url": url })))
        .await;
}

#[then(regex = r#"^the trip links include "([^"]+)"$"#)]
async fn then_links_include(world: &mut PlannerWorld, url: String) {
    let uri = format!("/trips/{}/links", world.trip_id());
    let (_, body) = world.test_state().call(Method::GET, &uri, None).await;
    let links = body["links"].as_array().expect("links list");
    assert!(links.iter().any(|link| link["url"] == json!(url)));
}

async fn create_trip(world: &mut PlannerWorld, destination: String, start: i64, end: i64) {
    let body = json!({
        "destination": destination,
        "starts_at": world.at(start),
        "ends_at": world.at(end),
        "owner_name": "Owner",
        "owner_email": "owner@example.com",
    });
    world.send(Method::POST, "/trips", Some(body)).await;
    if world.status == Some(StatusCode::CREATED) {
        world.trip_id = world.body["trip_id"].as_str().map(str::to_string);
    }
}

async fn invite(world: &mut PlannerWorld, email: String) {
    let uri = format!("/trips/{}/invites", world.trip_id());
    world
        .send(Method::POST, &uri, Some(json!({ "email": email })))
        .await;
    if world.status == Some(StatusCode::CREATED) {
        world.participant_id = world.body["participant_id"].as_str().map(str::to_string);
    }
}

#[tokio::main]
async fn main() {
    PlannerWorld::cucumber()
        .fail_on_skipped()
        .with_default_cli()
        .run("tests/features")
        .await;
}
