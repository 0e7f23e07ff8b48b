use crate::handlers;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "Bearer",
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

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "0.1.0",
        description = r#"
# Storefront API

Catalog browsing, carts for signed-in users and anonymous sessions, checkout and store administration.

## Identity

Signed-in requests send `Authorization: Bearer <token>` from `/auth/login` or `/auth/register`.
Anonymous shoppers send an opaque `X-Session-ID` header on cart and order requests instead.
Signing in with an `X-Session-ID` header merges that guest cart into the account.

## Errors

Failures return `{ "error", "message", "details"?, "request_id"?, "timestamp" }` with a matching HTTP status.
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers((url = "http://localhost:8080", description = "Local development")),
    tags(
        (name = "auth", description = "Registration, login, profile and wallet"),
        (name = "catalog", description = "Products and categories"),
        (name = "cart", description = "User and guest carts"),
        (name = "orders", description = "Checkout and order history"),
        (name = "admin", description = "Store administration"),
        (name = "health", description = "Liveness")
    ),
    paths(
        handlers::health::health,
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::profile,
        handlers::auth::wallet,
        handlers::auth::migrate_cart,
        handlers::products::list_products,
        handlers::products::get_product,
        handlers::products::get_product_images,
        handlers::products::list_categories,
        handlers::carts::add_to_cart,
        handlers::carts::get_cart,
        handlers::carts::update_cart_item,
        handlers::carts::remove_cart_item,
        handlers::orders::create_order,
        handlers::orders::list_my_orders,
        handlers::orders::get_order,
        handlers::admin::list_products,
        handlers::admin::create_product,
        handlers::admin::update_product,
        handlers::admin::delete_product,
        handlers::admin::list_categories,
        handlers::admin::create_category,
        handlers::admin::delete_category,
        handlers::admin::list_orders,
        handlers::admin::get_order,
        handlers::admin::update_order_status,
        handlers::admin::list_customers,
        handlers::admin::adjust_wallet,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::services::catalog::CategoryPatch,
        crate::services::catalog::NewProductImage,
        crate::services::catalog::ProductImagePatch,
    )),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDocV1::openapi())
}
