use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Grocery API",
        version = "1.0.0",
        description = r#"
Storefront and back-office API for a grocery delivery shop.

All `/api/v1` endpoints expect a bearer token:

```
Authorization: Bearer <your-jwt-token>
```

Errors share one body shape with a stable `code` field, for example
`out_of_stock`, `below_minimum` or `invalid_transition`.
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers((url = "http://localhost:8080", description = "Local development")),
    tags(
        (name = "Cart", description = "Customer cart"),
        (name = "Checkout", description = "Order placement"),
        (name = "Orders", description = "Order reads and staff workflow"),
        (name = "Addresses", description = "Saved delivery addresses"),
        (name = "Products", description = "Catalog administration"),
        (name = "Dashboard", description = "Back-office overview")
    ),
    paths(
        crate::handlers::carts::get_cart,
        crate::handlers::carts::add_to_cart,
        crate::handlers::carts::update_cart_item,
        crate::handlers::carts::remove_cart_item,
        crate::handlers::carts::clear_cart,
        crate::handlers::checkout::checkout,
        crate::handlers::orders::list_my_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::transition_order,
        crate::handlers::orders::order_history,
        crate::handlers::addresses::list_addresses,
        crate::handlers::addresses::set_default_address,
        crate::handlers::products::get_product,
        crate::handlers::products::retire_product,
        crate::handlers::dashboard::dashboard,
    ),
    components(
        schemas(
            crate::handlers::carts::AddItemRequest,
            crate::handlers::carts::UpdateQuantityRequest,
            crate::services::cart::CartView,
            crate::services::cart::CartLineView,
            crate::services::cart::CartTotals,
            crate::services::checkout::CheckoutInput,
            crate::services::orders::TransitionInput,
            crate::services::orders::OrderDetail,
            crate::services::orders::OrderItemView,
            crate::services::orders::OrderSummary,
            crate::services::catalog::Retired,
            crate::services::dashboard::DashboardSummary,
            crate::services::dashboard::RecentOrder,
            crate::services::dashboard::PopularProduct,
            crate::entities::OrderStatus,
            crate::entities::PaymentMethod,
            crate::entities::UserRole,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_routes_and_auth() {
        let json = serde_json::to_string_pretty(&ApiDoc::openapi()).unwrap();
        assert!(json.contains("Grocery API"));
        assert!(json.contains("/api/v1/checkout"));
        assert!(json.contains("/api/v1/orders/{id}/transition"));
        assert!(json.contains("bearer_auth"));
    }
}
