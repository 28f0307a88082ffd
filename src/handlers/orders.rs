use crate::handlers::common::{map_service_error, success_response, validate_input};
use crate::{
    auth::AuthenticatedUser,
    errors::ApiError,
    services::orders::{OrderDetail, OrderSummary, TransitionInput},
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use uuid::Uuid;

/// Creates the router for order endpoints
pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_my_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/transition", post(transition_order))
        .route("/orders/:id/history", get(order_history))
}

/// List the caller's orders, newest first
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    responses(
        (status = 200, description = "Caller's orders", body = Vec<OrderSummary>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_my_orders(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let orders = state
        .services
        .orders
        .list_orders_for(&actor)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(orders))
}

/// Get an order with items and status history
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order found", body = OrderDetail),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state
        .services
        .orders
        .get_order(&actor, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(detail))
}

/// Move an order to another status (staff only)
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/transition",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = TransitionInput,
    responses(
        (status = 200, description = "Order after the transition"),
        (status = 403, description = "Caller is not staff", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Illegal or concurrent transition", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn transition_order(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<TransitionInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let order = state
        .services
        .orders
        .transition(&actor, id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

/// Status history of an order, newest first
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/history",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "History entries"),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn order_history(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let history = state
        .services
        .orders
        .history(&actor, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(history))
}
