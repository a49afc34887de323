use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Trip {
    pub id: Uuid,
    pub destination: String,
    pub owner_email: String,
    pub owner_name: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_confirmed: bool,
}

impl Trip {
    /// Inclusive on both ends.
    pub fn covers(&self, at: DateTime<Utc>) -> bool {
        at >= self.starts_at && at <= self.ends_at
    }
}

#[derive(Debug, Clone)]
pub struct NewTrip {
    pub destination: String,
    pub owner_email: String,
    pub owner_name: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub emails_to_invite: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TripChanges {
    pub destination: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}
