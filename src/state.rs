use std::sync::Arc;

use crate::{
    planner::TripPlanner,
    services::{mailer::Mailer, storage::Storage},
};

#[derive(Clone)]
pub struct AppState {
    pub planner: TripPlanner,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            planner: TripPlanner::new(storage, mailer),
        }
    }
}
