use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        activity::Activity,
        link::Link,
        participant::Participant,
        trip::{NewTrip, Trip, TripChanges},
    },
};

/// Persistence of trips and everything attached to them. Implementations
/// hold no business rules; lookups of absent rows yield `None` or an empty
/// list rather than an error.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persists an unconfirmed trip together with an unconfirmed participant
    /// for every address in `emails_to_invite`.
    async fn create_trip(&self, trip: &NewTrip) -> Result<Trip, AppError>;
    async fn get_trip(&self, id: Uuid) -> Result<Option<Trip>, AppError>;
    async fn update_trip(&self, id: Uuid, changes: &TripChanges) -> Result<(), AppError>;
    async fn confirm_trip(&self, id: Uuid) -> Result<(), AppError>;

    async fn get_participant(&self, id: Uuid) -> Result<Option<Participant>, AppError>;
    async fn list_participants(&self, trip_id: Uuid) -> Result<Vec<Participant>, AppError>;
    /// Returns the number of inserted rows.
    async fn invite_participants(&self, participants: &[Participant]) -> Result<u64, AppError>;
    async fn confirm_participant(&self, id: Uuid) -> Result<(), AppError>;

    async fn create_activity(&self, activity: &Activity) -> Result<(), AppError>;
    async fn list_activities(&self, trip_id: Uuid) -> Result<Vec<Activity>, AppError>;

    async fn create_link(&self, link: &Link) -> Result<(), AppError>;
    async fn list_links(&self, trip_id: Uuid) -> Result<Vec<Link>, AppError>;
}

#[derive(Clone)]
pub struct SqliteStorage {
    pool: DbPool,
}

impl SqliteStorage {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn create_trip(&self, new_trip: &NewTrip) -> Result<Trip, AppError> {
        let trip = Trip {
            id: Uuid::new_v4(),
            destination: new_trip.destination.clone(),
            owner_email: new_trip.owner_email.clone(),
            owner_name: new_trip.owner_name.clone(),
            starts_at: new_trip.starts_at,
            ends_at: new_trip.ends_at,
            is_confirmed: false,
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"INSERT INTO trips (id, destination, owner_email, owner_name, starts_at, ends_at, is_confirmed)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(trip.id)
        .bind(&trip.destination)
        .bind(&trip.owner_email)
        .bind(&trip.owner_name)
        .bind(trip.starts_at)
        .bind(trip.ends_at)
        .bind(trip.is_confirmed)
        .execute(&mut *tx)
        .await?;

        for email in &new_trip.emails_to_invite {
            let participant = Participant::new(trip.id, email.as_str());
            sqlx::query(
                "INSERT INTO participants (id, trip_id, email, is_confirmed) VALUES (?, ?, ?, ?)",
            )
            .bind(participant.id)
            .bind(participant.trip_id)
            .bind(&participant.email)
            .bind(participant.is_confirmed)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(trip)
    }

    async fn get_trip(&self, id: Uuid) -> Result<Option<Trip>, AppError> {
        let trip = sqlx::query_as::<_, Trip>(
            r#"SELECT id, destination, owner_email, owner_name, starts_at, ends_at, is_confirmed
               FROM trips WHERE id = ?"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(trip)
    }

    async fn update_trip(&self, id: Uuid, changes: &TripChanges) -> Result<(), AppError> {
        sqlx::query("UPDATE trips SET destination = ?, starts_at = ?, ends_at = ? WHERE id = ?")
            .bind(&changes.destination)
            .bind(changes.starts_at)
            .bind(changes.ends_at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn confirm_trip(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE trips SET is_confirmed = TRUE WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_participant(&self, id: Uuid) -> Result<Option<Participant>, AppError> {
        let participant = sqlx::query_as::<_, Participant>(
            "SELECT id, trip_id, email, is_confirmed FROM participants WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(participant)
    }

    async fn list_participants(&self, trip_id: Uuid) -> Result<Vec<Participant>, AppError> {
        let participants = sqlx::query_as::<_, Participant>(
            "SELECT id, trip_id, email, is_confirmed FROM participants WHERE trip_id = ? ORDER BY rowid",
        )
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(participants)
    }

    async fn invite_participants(&self, participants: &[Participant]) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for participant in participants {
            inserted += sqlx::query(
                "INSERT INTO participants (id, trip_id, email, is_confirmed) VALUES (?, ?, ?, ?)",
            )
            .bind(participant.id)
            .bind(participant.trip_id)
            .bind(&participant.email)
            .bind(participant.is_confirmed)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }
        tx.commit().await?;
        Ok(inserted)
    }

    async fn confirm_participant(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE participants SET is_confirmed = TRUE WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_activity(&self, activity: &Activity) -> Result<(), AppError> {
        sqlx::query("INSERT INTO activities (id, trip_id, title, occurs_at) VALUES (?, ?, ?, ?)")
            .bind(activity.id)
            .bind(activity.trip_id)
            .bind(&activity.title)
            .bind(activity.occurs_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_activities(&self, trip_id: Uuid) -> Result<Vec<Activity>, AppError> {
        let activities = sqlx::query_as::<_, Activity>(
            "SELECT id, trip_id, title, occurs_at FROM activities WHERE trip_id = ? ORDER BY occurs_at",
        )
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(activities)
    }

    async fn create_link(&self, link: &Link) -> Result<(), AppError> {
        sqlx::query("INSERT INTO links (id, trip_id, title, url) VALUES (?, ?, ?, ?)")
            .bind(link.id)
            .bind(link.trip_id)
            .bind(&link.title)
            .bind(&link.url)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_links(&self, trip_id: Uuid) -> Result<Vec<Link>, AppError> {
        let links = sqlx::query_as::<_, Link>(
            "SELECT id, trip_id, title, url FROM links WHERE trip_id = ? ORDER BY rowid",
        )
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(links)
    }
}
