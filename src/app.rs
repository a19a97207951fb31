// src/app.rs
// Montagem do router: rotas públicas, rotas protegidas por JWT, webhook e documentação.

use std::time::Duration;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    middleware as axum_middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{config::AppState, docs::ApiDoc, handlers, middleware::auth::auth_guard};

pub fn build_router(app_state: AppState) -> Router {
    // Define as rotas de autenticação (públicas)
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login));

    let company_routes = Router::new()
        .route(
            "/me",
            get(handlers::companies::get_me).put(handlers::companies::update_me),
        )
        .route("/me/stats", get(handlers::companies::stats));

    let catalog_routes = Router::new()
        .route(
            "/categories",
            post(handlers::catalog::create_category).get(handlers::catalog::list_categories),
        )
        .route(
            "/categories/{id}",
            put(handlers::catalog::update_category).delete(handlers::catalog::delete_category),
        )
        .route(
            "/products",
            post(handlers::catalog::create_product).get(handlers::catalog::list_products),
        )
        .route(
            "/products/{id}",
            get(handlers::catalog::get_product)
                .put(handlers::catalog::update_product)
                .delete(handlers::catalog::delete_product),
        )
        .route("/products/{id}/stock", post(handlers::catalog::adjust_stock));

    let order_routes = Router::new()
        .route(
            "/",
            get(handlers::orders::list_orders).post(handlers::orders::create_order),
        )
        .route("/{id}", get(handlers::orders::get_order))
        .route(
            "/{id}/status",
            patch(handlers::orders::update_order_status),
        );

    let page_routes = Router::new()
        .route(
            "/",
            get(handlers::pages::list_pages).post(handlers::pages::connect_page),
        )
        .route("/{id}", delete(handlers::pages::disconnect_page))
        .route("/{id}/subscribe", post(handlers::pages::subscribe_page));

    let conversation_routes = Router::new()
        .route("/", get(handlers::conversations::list_conversations))
        .route(
            "/{id}/messages",
            get(handlers::conversations::list_messages)
                .post(handlers::conversations::send_message),
        )
        .route("/{id}/read", post(handlers::conversations::mark_read))
        .route("/{id}/bot", put(handlers::conversations::set_bot));

    // Tudo o que depende da empresa autenticada passa pelo auth_guard
    let protected_routes = Router::new()
        .nest("/companies", company_routes)
        .merge(catalog_routes)
        .nest("/orders", order_routes)
        .nest("/pages", page_routes)
        .route(
            "/gemini-settings",
            get(handlers::gemini::get_settings).put(handlers::gemini::update_settings),
        )
        .nest("/conversations", conversation_routes)
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    // Combina tudo no router principal
    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/auth", auth_routes)
        .nest("/api", protected_routes)
        .route(
            "/webhook/facebook",
            get(handlers::webhook::verify).post(handlers::webhook::receive),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    fn router() -> Router {
        let config = AppConfig::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgres://localhost/unused".into()),
            "JWT_SECRET" => Some("jwt".into()),
            "FACEBOOK_VERIFY_TOKEN" => Some("verifica".into()),
            _ => None,
        })
        .unwrap();
        let pool = PgPoolOptions::new().connect_lazy(&config.database_url).unwrap();
        build_router(AppState::from_pool(pool, config).unwrap())
    }

    fn request(uri: &str, bearer: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = bearer {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let response = router().oneshot(request("/api/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_routes_require_a_token() {
        for uri in ["/api/products", "/api/orders", "/api/conversations", "/api/companies/me"] {
            let response = router().oneshot(request(uri, None)).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        }
    }

    #[tokio::test]
    async fn garbage_token_is_rejected_before_touching_the_database() {
        let response = router()
            .oneshot(request("/api/gemini-settings", Some("nao-e-um-jwt")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let response = router()
            .oneshot(request("/api-docs/openapi.json", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
