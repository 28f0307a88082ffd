use crate::handlers::common::{created_response, map_service_error, validate_input};
use crate::{
    auth::AuthenticatedUser,
    errors::ApiError,
    services::{checkout::CheckoutInput, orders::OrderDetail},
    AppState,
};
use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::post,
    Router,
};

pub fn checkout_routes() -> Router<AppState> {
    Router::new().route("/checkout", post(checkout))
}

/// Place an order from the caller's cart
#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    request_body = CheckoutInput,
    responses(
        (status = 201, description = "Order placed", body = OrderDetail),
        (status = 400, description = "Invalid input or address", body = crate::errors::ErrorResponse),
        (status = 422, description = "Below minimum order or out of stock", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn checkout(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Json(payload): Json<CheckoutInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let detail = state
        .services
        .checkout
        .checkout(&actor, payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(detail))
}
