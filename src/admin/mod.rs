//! Admin control API.
//!
//! Local HTTP front for [`ProxyService`]. Every route requires
//! `Authorization: Bearer <api_key>`.
//!
//! ```text
//! GET  /admin/status    service status
//! GET  /admin/profiles  profile catalog
//! PUT  /admin/profile   {"name": "..."} swap the active profile
//! POST /admin/start     start listening
//! POST /admin/stop      stop listening
//! ```

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::control::ProxyService;

use self::auth::require_bearer;
use self::handlers::*;

/// Shared state for admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub service: Arc<ProxyService>,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn new(service: Arc<ProxyService>, api_key: &str) -> Self {
        Self {
            service,
            api_key: Arc::from(api_key),
        }
    }
}

pub fn admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/profiles", get(get_profiles))
        .route("/admin/profile", put(put_profile))
        .route("/admin/start", post(post_start))
        .route("/admin/stop", post(post_stop))
        .layer(middleware::from_fn_with_state(state.clone(), require_bearer))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin API until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    state: AdminState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin API listening");

    axum::serve(listener, admin_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("Admin API stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProxyConfig;
    use crate::throttle::ProfileName;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use axum::response::Response;
    use serde_json::Value;
    use tower::ServiceExt;

    const KEY: &str = "test-key";

    fn state() -> AdminState {
        let mut config = ProxyConfig::default();
        config.listener.bind_host = "127.0.0.1".into();
        config.listener.preferred_port = 0;
        config.listener.fallback_ports = vec![];
        AdminState::new(Arc::new(ProxyService::new(&config)), KEY)
    }

    fn request(method: Method, uri: &str, body: Option<&str>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("Authorization", format!("Bearer {}", KEY));
        match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn missing_or_wrong_token_is_unauthorized() {
        let app = admin_router(state());
        let response = app
            .clone()
            .oneshot(Request::get("/admin/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(
                Request::get("/admin/status")
                    .header("Authorization", "Bearer nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn status_reports_stopped_service() {
        let response = admin_router(state())
            .oneshot(request(Method::GET, "/admin/status", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["running"], false);
        assert_eq!(body["phase"], "stopped");
        assert_eq!(body["profile_name"], "normal");
    }

    #[tokio::test]
    async fn profiles_lists_the_catalog() {
        let response = admin_router(state())
            .oneshot(request(Method::GET, "/admin/profiles", None))
            .await
            .unwrap();
        let body = json_body(response).await;
        let entries = body.as_array().unwrap();
        assert_eq!(entries.len(), 13);
        assert_eq!(entries[6]["name"], "slow_3g");
        assert_eq!(entries[6]["download_kbps"], 500);
        assert_eq!(entries[12]["offline"], true);
    }

    #[tokio::test]
    async fn set_profile_swaps_and_rejects_unknown_names() {
        let state = state();
        let app = admin_router(state.clone());

        let response = app
            .clone()
            .oneshot(request(Method::PUT, "/admin/profile", Some(r#"{"name":"Fast-3G"}"#)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["profile_name"], "fast_3g");
        assert_eq!(state.service.current_profile(), ProfileName::Fast3g.profile());

        let response = app
            .oneshot(request(Method::PUT, "/admin/profile", Some(r#"{"name":"6g"}"#)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.service.current_profile(), ProfileName::Fast3g.profile());
    }

    #[tokio::test]
    async fn start_then_stop() {
        let state = state();
        let app = admin_router(state.clone());

        let response = app
            .clone()
            .oneshot(request(Method::POST, "/admin/start", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let port = json_body(response).await["port"].as_u64().unwrap();
        assert_eq!(state.service.current_port() as u64, port);

        let response = app.oneshot(request(Method::POST, "/admin/stop", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["running"], false);
    }

    #[tokio::test]
    async fn start_failure_is_service_unavailable() {
        let held = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut config = ProxyConfig::default();
        config.listener.bind_host = "127.0.0.1".into();
        config.listener.preferred_port = held.local_addr().unwrap().port();
        config.listener.fallback_ports = vec![];
        let state = AdminState::new(Arc::new(ProxyService::new(&config)), KEY);

        let response = admin_router(state)
            .oneshot(request(Method::POST, "/admin/start", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(json_body(response).await["error"].as_str().unwrap().contains("failed to bind"));
    }
}
