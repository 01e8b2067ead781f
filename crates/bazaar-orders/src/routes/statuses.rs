//! Status registry endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, put};
use axum::{Json, Router};

use bazaar_state::{OrderStatus, StatusDescriptor, StatusUpdate};

use super::extract_json;
use crate::auth::Caller;
use crate::error::AppError;
use crate::service;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/statuses", get(list_statuses))
        .route("/statuses/{name}", put(update_status))
}

/// GET /statuses: every status, ordered by sort order.
async fn list_statuses(State(state): State<AppState>) -> Json<Vec<StatusDescriptor>> {
    let registry = state.registry();
    Json(registry.ordered().into_iter().cloned().collect())
}

/// PUT /statuses/{name}: edit description, color, sort order or active flag.
async fn update_status(
    State(state): State<AppState>,
    caller: Caller,
    Path(name): Path<String>,
    body: Result<Json<StatusUpdate>, JsonRejection>,
) -> Result<Json<StatusDescriptor>, AppError> {
    let status: OrderStatus = name
        .parse()
        .map_err(|_| AppError::NotFound(format!("status {name}")))?;
    let update = extract_json(body)?;
    let descriptor = service::update_status(&state, status, update, &caller.actor()).await?;
    Ok(Json(descriptor))
}
