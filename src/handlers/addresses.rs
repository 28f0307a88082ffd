use crate::handlers::common::{map_service_error, message_response, success_response};
use crate::{auth::AuthenticatedUser, errors::ApiError, AppState};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use uuid::Uuid;

pub fn addresses_routes() -> Router<AppState> {
    Router::new()
        .route("/addresses", get(list_addresses))
        .route("/addresses/:id/default", post(set_default_address))
}

/// The caller's saved addresses, default first
#[utoipa::path(
    get,
    path = "/api/v1/addresses",
    responses((status = 200, description = "Saved addresses")),
    security(("bearer_auth" = [])),
    tag = "Addresses"
)]
pub async fn list_addresses(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let addresses = state
        .services
        .addresses
        .list_for(actor.id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(addresses))
}

/// Make an address the caller's default
#[utoipa::path(
    post,
    path = "/api/v1/addresses/{id}/default",
    params(("id" = Uuid, Path, description = "Address ID")),
    responses(
        (status = 200, description = "Address is now the default"),
        (status = 400, description = "Address missing or not owned", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Addresses"
)]
pub async fn set_default_address(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let address = state
        .services
        .addresses
        .set_default(&actor, id)
        .await
        .map_err(map_service_error)?;

    Ok(message_response(address, "Default address updated"))
}
