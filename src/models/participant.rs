use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Participant {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub email: String,
    pub is_confirmed: bool,
}

impl Participant {
    pub fn new(trip_id: Uuid, email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            trip_id,
            email: email.into(),
            is_confirmed: false,
        }
    }

    /// Compares addresses ignoring surrounding whitespace; case is significant.
    pub fn has_email(&self, email: &str) -> bool {
        self.email.trim() == email.trim()
    }
}
