use crate::handlers::common::{map_service_error, message_response, success_response, validate_input};
use crate::{
    auth::AuthenticatedUser,
    errors::ApiError,
    services::cart::CartView,
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Creates the router for cart endpoints
pub fn carts_routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(get_cart))
        .route("/cart/add/:product_id", post(add_to_cart))
        .route("/cart/update/:item_id", post(update_cart_item))
        .route("/cart/remove/:item_id", post(remove_cart_item))
        .route("/cart/clear", post(clear_cart))
}

/// Get the caller's cart with live prices
#[utoipa::path(
    get,
    path = "/api/v1/cart",
    responses(
        (status = 200, description = "Current cart", body = CartView),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let view = state
        .services
        .cart
        .view(&actor)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(view))
}

/// Add a product to the cart
#[utoipa::path(
    post,
    path = "/api/v1/cart/add/{product_id}",
    params(("product_id" = Uuid, Path, description = "Product to add")),
    request_body = AddItemRequest,
    responses(
        (status = 200, description = "Line added or merged", body = CartView),
        (status = 400, description = "Invalid quantity", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Not enough stock", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<AddItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let cart = &state.services.cart;

    cart.add(&actor, product_id, payload.quantity)
        .await
        .map_err(map_service_error)?;
    let view = cart.view(&actor).await.map_err(map_service_error)?;

    Ok(message_response(view, "Product added to cart"))
}

/// Set a line's quantity; zero or less removes it
#[utoipa::path(
    post,
    path = "/api/v1/cart/update/{item_id}",
    params(("item_id" = Uuid, Path, description = "Cart line")),
    request_body = UpdateQuantityRequest,
    responses(
        (status = 200, description = "Cart after the change", body = CartView),
        (status = 404, description = "Line not in caller's cart", body = crate::errors::ErrorResponse),
        (status = 422, description = "Not enough stock", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_cart_item(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = &state.services.cart;

    let updated = cart
        .set_quantity(&actor, item_id, payload.quantity)
        .await
        .map_err(map_service_error)?;
    let view = cart.view(&actor).await.map_err(map_service_error)?;

    let message = if updated.is_some() {
        "Cart updated"
    } else {
        "Item removed from cart"
    };
    Ok(message_response(view, message))
}

/// Remove a line from the cart
#[utoipa::path(
    post,
    path = "/api/v1/cart/remove/{item_id}",
    params(("item_id" = Uuid, Path, description = "Cart line")),
    responses(
        (status = 200, description = "Cart after removal", body = CartView),
        (status = 404, description = "Line not in caller's cart", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_cart_item(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(item_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = &state.services.cart;

    cart.remove(&actor, item_id)
        .await
        .map_err(map_service_error)?;
    let view = cart.view(&actor).await.map_err(map_service_error)?;

    Ok(message_response(view, "Item removed from cart"))
}

/// Remove every line from the cart
#[utoipa::path(
    post,
    path = "/api/v1/cart/clear",
    responses(
        (status = 200, description = "Empty cart", body = CartView)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let cart = &state.services.cart;

    cart.clear(&actor).await.map_err(map_service_error)?;
    let view = cart.view(&actor).await.map_err(map_service_error)?;

    Ok(message_response(view, "Cart cleared"))
}

// Request DTOs

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct AddItemRequest {
    #[serde(default = "default_quantity")]
    #[validate(range(min = 1, max = 1000))]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateQuantityRequest {
    /// Zero or negative removes the line
    pub quantity: i32,
}
