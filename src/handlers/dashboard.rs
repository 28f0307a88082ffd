use crate::handlers::common::{map_service_error, success_response};
use crate::{
    auth::AuthenticatedUser, errors::ApiError, services::dashboard::DashboardSummary, AppState,
};
use axum::{extract::State, response::IntoResponse, routing::get, Router};

pub fn dashboard_routes() -> Router<AppState> {
    Router::new().route("/dashboard", get(dashboard))
}

/// Back-office counters (staff only)
#[utoipa::path(
    get,
    path = "/api/v1/dashboard",
    responses(
        (status = 200, description = "Store overview", body = DashboardSummary),
        (status = 403, description = "Caller is not staff", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn dashboard(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .services
        .dashboard
        .summary(&actor)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(summary))
}
