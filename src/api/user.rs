//! Read-only view of a user's persisted state.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::error::Result;
use crate::game::UserState;
use crate::server::AppState;

/// GET /api/v1/users/{user_id}/state
///
/// Loads the state the same way a new WebSocket connection would, without
/// registering a connection or writing defaults back.
pub async fn get_user_state(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserState>> {
    let user_state = state.service.snapshot(&user_id).await?;
    Ok(Json(user_state))
}
