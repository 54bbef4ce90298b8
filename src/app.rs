use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::from_fn,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::config;
use crate::handlers::{protected, public};
use crate::middleware::{jwt_auth_middleware, validate_tenant_middleware, validate_user_middleware};

/// Full router: public routes plus the protected `/api` tree
pub fn app() -> Router {
    let cfg = config();

    Router::new()
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .merge(auth_public_routes())
        .merge(protected_routes())
        .layer(DefaultBodyLimit::max(cfg.api.max_request_size_bytes))
        .layer(cors_layer(&cfg.security.cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

fn auth_public_routes() -> Router {
    use public::auth;

    Router::new()
        .route("/auth/login/:tenant", post(auth::login_post))
        .route("/auth/refresh", post(auth::refresh_post))
}

/// Every `/api` route; `route_layer` keeps unknown paths at 404 instead of 401
fn protected_routes() -> Router {
    Router::new()
        .merge(session_routes())
        .merge(user_routes())
        .merge(client_routes())
        .merge(contract_routes())
        .merge(hardware_routes())
        .merge(financial_routes())
        .merge(dashboard_routes())
        .merge(integration_routes())
        // Layers run outermost-last: jwt, then tenant, then user
        .route_layer(from_fn(validate_user_middleware))
        .route_layer(from_fn(validate_tenant_middleware))
        .route_layer(from_fn(jwt_auth_middleware))
}

fn session_routes() -> Router {
    use protected::auth;

    Router::new()
        .route("/api/auth/whoami", get(auth::session_whoami))
        .route("/api/auth/password", put(auth::session_password))
}

fn user_routes() -> Router {
    use protected::users;

    Router::new()
        .route("/api/users", get(users::user_list).post(users::user_create))
        .route("/api/users/:id", get(users::user_get).patch(users::user_update))
        .route("/api/users/:id/deactivate", post(users::user_deactivate))
        .route("/api/users/:id/clients", get(users::user_clients))
}

fn client_routes() -> Router {
    use protected::clients;

    Router::new()
        .route("/api/clients", get(clients::client_list).post(clients::client_create))
        .route(
            "/api/clients/:id",
            get(clients::client_get)
                .patch(clients::client_update)
                .delete(clients::client_delete),
        )
        .route("/api/clients/:id/restore", post(clients::client_restore))
        .route("/api/clients/:id/overview", get(clients::client_overview))
        .route("/api/clients/:id/team", get(clients::team_list).post(clients::team_create))
        .route(
            "/api/team/:id",
            get(clients::team_get)
                .patch(clients::team_update)
                .delete(clients::team_delete),
        )
        .route("/api/team/:id/deactivate", post(clients::team_deactivate))
}

fn contract_routes() -> Router {
    use protected::contracts;

    Router::new()
        .route("/api/contracts", get(contracts::contract_list).post(contracts::contract_create))
        .route("/api/contracts/expiring", get(contracts::contract_expiring))
        .route(
            "/api/contracts/:id",
            get(contracts::contract_get)
                .patch(contracts::contract_update)
                .delete(contracts::contract_delete),
        )
        .route("/api/contracts/:id/renew", post(contracts::contract_renew))
        .route(
            "/api/contracts/:id/scopes",
            get(contracts::scope_list).post(contracts::scope_create),
        )
        .route(
            "/api/scopes/:id",
            get(contracts::scope_get)
                .patch(contracts::scope_update)
                .delete(contracts::scope_delete),
        )
        .route("/api/scopes/:id/saf", put(contracts::scope_saf))
}

fn hardware_routes() -> Router {
    use protected::hardware;

    Router::new()
        .route("/api/hardware", get(hardware::asset_list).post(hardware::asset_create))
        .route(
            "/api/hardware/assignments",
            get(hardware::assignment_list).post(hardware::assignment_create),
        )
        .route("/api/hardware/assignments/:id", get(hardware::assignment_get))
        .route("/api/hardware/assignments/:id/return", post(hardware::assignment_return))
        .route("/api/hardware/assignments/:id/replace", post(hardware::assignment_replace))
        .route(
            "/api/hardware/:id",
            get(hardware::asset_get)
                .patch(hardware::asset_update)
                .delete(hardware::asset_delete),
        )
        .route("/api/hardware/:id/history", get(hardware::asset_history))
}

fn financial_routes() -> Router {
    use protected::financials;

    Router::new()
        .route(
            "/api/financials",
            get(financials::transaction_list).post(financials::transaction_create),
        )
        .route("/api/financials/summary", get(financials::transaction_summary))
        .route("/api/financials/trend", get(financials::transaction_trend))
        .route(
            "/api/financials/:id",
            get(financials::transaction_get)
                .patch(financials::transaction_update)
                .delete(financials::transaction_delete),
        )
}

fn dashboard_routes() -> Router {
    use protected::dashboard;

    Router::new()
        .route("/api/dashboard/overview", get(dashboard::dashboard_overview))
        .route("/api/dashboard/expiring-contracts", get(dashboard::dashboard_expiring))
        .route("/api/dashboard/financial-trend", get(dashboard::dashboard_trend))
        .route("/api/dashboard/hardware", get(dashboard::dashboard_hardware))
}

fn integration_routes() -> Router {
    use protected::integrations;

    Router::new()
        .route(
            "/api/integrations/sources",
            get(integrations::source_list).post(integrations::source_create),
        )
        .route(
            "/api/integrations/sources/:id",
            get(integrations::source_get)
                .patch(integrations::source_update)
                .delete(integrations::source_delete),
        )
        .route("/api/integrations/sources/:id/test", post(integrations::source_test))
        .route(
            "/api/integrations/queries",
            get(integrations::query_list).post(integrations::query_create),
        )
        .route(
            "/api/integrations/queries/:id",
            get(integrations::query_get)
                .patch(integrations::query_update)
                .delete(integrations::query_delete),
        )
        .route("/api/integrations/queries/:id/test", post(integrations::query_test))
        .route("/api/integrations/data/batch", post(integrations::data_batch))
        .route("/api/integrations/data/:query_name", get(integrations::data_get))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn protected_routes_require_a_token() {
        let response = app()
            .oneshot(Request::builder().uri("/api/clients").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn garbage_bearer_token_is_rejected() {
        let request = Request::builder()
            .uri("/api/dashboard/overview")
            .header("Authorization", "Bearer not-a-jwt")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_api_path_is_not_found() {
        let response = app()
            .oneshot(Request::builder().uri("/api/nothing-here").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn root_lists_endpoints() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["data"]["name"], "MSSP API");
    }
}
