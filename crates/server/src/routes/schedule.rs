//! Ordering window status.

use axum::{Json, extract::State};

use crate::services::ScheduleStatus;
use crate::state::AppState;

/// Whether ordering is open right now, for display. Never fails.
pub async fn status(State(state): State<AppState>) -> Json<ScheduleStatus> {
    Json(state.orders().schedule_status().await)
}
