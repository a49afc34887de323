use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Activity {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub title: String,
    pub occurs_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewActivity {
    pub title: String,
    pub occurs_at: DateTime<Utc>,
}

/// Activities of a single calendar day of a trip.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityDay {
    pub date: NaiveDate,
    pub activities: Vec<Activity>,
}
