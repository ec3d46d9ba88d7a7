use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Extension, Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config;
use crate::handlers::{protected, public};
use crate::middleware::{jwt_auth_middleware, validate_user_middleware};
use crate::storage::SharedStore;

/// Full application router
pub fn app(store: SharedStore) -> Router {
    let cfg = config::config();

    let mut router = Router::new()
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .route("/auth/login", post(public::auth::login))
        .route("/auth/register", post(public::auth::register))
        .merge(protected_routes())
        .layer(Extension(store))
        .layer(DefaultBodyLimit::max(cfg.api.max_request_size_bytes));

    if cfg.security.enable_cors {
        router = router.layer(cors_layer(&cfg.security.cors_origins));
    }
    if cfg.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    router
}

fn protected_routes() -> Router {
    use protected::{auth, cases, clients, dashboard, documents, find, hearings, invoices, users};

    Router::new()
        // Session
        .route("/api/auth/me", get(auth::me).put(auth::update_me))
        .route("/api/auth/password", put(auth::change_password))
        .route("/api/auth/refresh", post(auth::refresh))
        // Users (admin)
        .route("/api/users", get(users::list).post(users::create))
        .route("/api/users/:id", get(users::get).put(users::update).delete(users::delete))
        // Clients
        .route("/api/clients", get(clients::list).post(clients::create))
        .route("/api/clients/:id", get(clients::get).put(clients::update).delete(clients::delete))
        // Cases
        .route("/api/cases", get(cases::list).post(cases::create))
        .route("/api/cases/:id", get(cases::get).put(cases::update).delete(cases::delete))
        .route("/api/cases/:id/status", put(cases::change_status))
        .route("/api/cases/:id/hearings", get(cases::hearings))
        .route("/api/cases/:id/documents", get(cases::documents))
        // Hearings
        .route("/api/hearings", get(hearings::list).post(hearings::create))
        .route("/api/hearings/:id", get(hearings::get).put(hearings::update).delete(hearings::delete))
        .route("/api/hearings/:id/adjourn", post(hearings::adjourn))
        // Invoices
        .route("/api/invoices", get(invoices::list).post(invoices::create))
        .route("/api/invoices/:id", get(invoices::get).put(invoices::update).delete(invoices::delete))
        .route("/api/invoices/:id/status", put(invoices::change_status))
        .route("/api/invoices/:id/pay", post(invoices::pay))
        // Documents
        .route("/api/documents", get(documents::list).post(documents::create))
        .route("/api/documents/:id", get(documents::get).put(documents::update).delete(documents::delete))
        .route(
            "/api/documents/:id/content",
            get(documents::download_content).put(documents::upload_content),
        )
        // Overview and ad-hoc queries
        .route("/api/dashboard", get(dashboard::summary))
        .route("/api/find/:resource", post(find::find))
        // Layers run bottom-up: token first, then the user lookup
        .layer(middleware::from_fn(validate_user_middleware))
        .layer(middleware::from_fn(jwt_auth_middleware))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        let origins = origins
            .iter()
            .filter_map(|o| o.parse::<HeaderValue>().ok())
            .collect::<Vec<_>>();
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let dir = std::env::temp_dir().join(format!("lexcase-routes-{}", uuid::Uuid::new_v4()));
        app(Arc::new(LocalStore::new(dir)))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn root_describes_the_service() {
        let response = test_app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["name"], "LexCase API");
    }

    #[tokio::test]
    async fn protected_routes_require_a_token() {
        for uri in ["/api/cases", "/api/auth/me", "/api/dashboard"] {
            let response = test_app()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
            let body = body_json(response).await;
            assert_eq!(body["success"], false);
            assert_eq!(body["code"], "UNAUTHORIZED");
        }
    }

    #[tokio::test]
    async fn garbage_tokens_are_rejected() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/api/clients")
                    .header("authorization", "Bearer not-a-jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_validates_before_touching_the_database() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/login")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"email": "", "password": ""}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert!(body["field_errors"].get("email").is_some());
        assert!(body["field_errors"].get("password").is_some());
    }

    #[tokio::test]
    async fn malformed_json_is_reported() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/login")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "INVALID_JSON");
    }

    #[tokio::test]
    async fn health_reports_database_state() {
        let response = test_app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = body_json(response).await;
        match status {
            StatusCode::OK => assert_eq!(body["data"]["database"], "ok"),
            StatusCode::SERVICE_UNAVAILABLE => assert_eq!(body["data"]["status"], "degraded"),
            other => panic!("unexpected health status {other}"),
        }
    }
}
