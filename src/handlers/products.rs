use crate::handlers::common::{map_service_error, success_response};
use crate::{auth::AuthenticatedUser, errors::ApiError, services::catalog::Retired, AppState};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde_json::json;
use uuid::Uuid;

pub fn products_routes() -> Router<AppState> {
    Router::new()
        .route("/products/:id", get(get_product))
        .route("/products/:id/retire", post(retire_product))
}

/// Product with its live price and purchasable stock
#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product found"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    AuthenticatedUser(_actor): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .catalog
        .get_product(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(json!({
        "final_price": product.final_price(),
        "purchasable_stock": product.purchasable_stock(),
        "product": product,
    })))
}

/// Delete an unreferenced product or disable a referenced one (staff only)
#[utoipa::path(
    post,
    path = "/api/v1/products/{id}/retire",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product retired", body = Retired),
        (status = 403, description = "Caller is not staff", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn retire_product(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .services
        .catalog
        .retire_product(&actor, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(json!({ "product_id": id, "outcome": outcome })))
}
