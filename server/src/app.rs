use axum::Router;
use axum::routing::{get, post};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};

use crate::routes;
use crate::state::AppState;

pub(crate) fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/devices", get(routes::api::list_devices))
        .route(
            "/api/devices/{id}/telemetry/latest",
            get(routes::api::latest_telemetry),
        )
        .route(
            "/api/devices/{id}/telemetry/history",
            get(routes::api::telemetry_history),
        )
        .route(
            "/api/devices/{id}/attributes/{scope}",
            get(routes::api::get_attributes).post(routes::api::save_attributes),
        )
        .route("/api/health", get(routes::api::health))
        .layer(CompressionLayer::new());

    // The push channel sits outside compression: upgrade responses carry no body.
    api.route("/api/ws", get(routes::ws::telemetry_channel))
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::build_app;
    use crate::state::{AppState, StateSettings};

    fn app() -> axum::Router {
        let state = AppState::with_settings(StateSettings::default());
        state.seed_demo_fleet(0);
        build_app(state)
    }

    #[tokio::test]
    async fn unknown_routes_are_not_found() {
        let response = app()
            .oneshot(Request::get("/api/nowhere").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn push_channel_requires_upgrade() {
        let response = app()
            .oneshot(Request::get("/api/ws?token=x").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn cors_preflight_is_answered() {
        let response = app()
            .oneshot(
                Request::options("/api/devices")
                    .header("origin", "http://localhost:5173")
                    .header("access-control-request-method", "GET")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert!(response.status().is_success());
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
    }
}
