use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::engine::CommandError;
use crate::engine::Engine;
use crate::engine::ToIntegrationMessage;

/// Response for the /v1/ping endpoint
#[derive(Serialize)]
struct PingResponse {
    status: String,
}

/// Response for the /v1/info endpoint
#[derive(Serialize)]
struct InfoResponse {
    version: String,
    hostname: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    version: &'static str,
    engine: Arc<Engine>,
}

/// Handler for GET /v1/ping
#[tracing::instrument]
async fn ping() -> impl IntoResponse {
    tracing::debug!("Handling /v1/ping request");
    (
        StatusCode::OK,
        Json(PingResponse {
            status: "ok".to_string(),
        }),
    )
}

/// Handler for GET /v1/info
#[tracing::instrument(skip(state))]
async fn info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::debug!("Handling /v1/info request");

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    (
        StatusCode::OK,
        Json(InfoResponse {
            version: state.version.to_string(),
            hostname,
        }),
    )
}

/// Handler for GET /v1/state
#[tracing::instrument(skip(state))]
async fn engine_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.engine.state_snapshot();
    (StatusCode::OK, Json(snapshot.as_ref().clone()))
}

/// Handler for POST /v1/commands
///
/// Accepted commands are queued for the owning integration; the effect shows
/// up in /v1/state after the next poll.
#[tracing::instrument(skip(state))]
async fn command(
    State(state): State<Arc<AppState>>,
    Json(msg): Json<ToIntegrationMessage>,
) -> impl IntoResponse {
    match state.engine.send_command(msg) {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => {
            let status = match e {
                CommandError::UnknownEntity(_) => StatusCode::NOT_FOUND,
                CommandError::IntegrationUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            };
            tracing::warn!("Rejected command: {}", e);
            (
                status,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Create the API router with all endpoints
fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/ping", get(ping))
        .route("/v1/info", get(info))
        .route("/v1/state", get(engine_state))
        .route("/v1/commands", post(command))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP API server
///
/// Binds to `listen:port` and serves until `shutdown_rx` fires.
pub async fn serve(
    listen: String,
    port: u16,
    engine: Arc<Engine>,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> anyhow::Result<()> {
    let version = env!("CARGO_PKG_VERSION");

    let state = Arc::new(AppState { version, engine });
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", listen, port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", listen, port))?;
    tracing::info!("Starting HTTP API server on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            tracing::info!("HTTP API server shutting down gracefully");
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::engine::FromIntegrationMessage;
    use crate::engine::IntegrationHealth;

    fn test_router(engine: Arc<Engine>) -> Router {
        create_router(Arc::new(AppState {
            version: "test",
            engine,
        }))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_ping() {
        let response = test_router(Arc::new(Engine::new()))
            .oneshot(Request::builder().uri("/v1/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_info_reports_version() {
        let response = test_router(Arc::new(Engine::new()))
            .oneshot(Request::builder().uri("/v1/info").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["version"], "test");
        assert!(json["hostname"].is_string());
    }

    #[tokio::test]
    async fn test_command_for_unknown_entity_is_404() {
        let response = test_router(Arc::new(Engine::new()))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/commands")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"command": "button_press", "entity_id": "button.heat_pump_request_defrost"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert!(json["error"]
            .as_str()
            .unwrap()
            .contains("button.heat_pump_request_defrost"));
    }

    #[tokio::test]
    async fn test_malformed_command_is_rejected() {
        let response = test_router(Arc::new(Engine::new()))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/commands")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"command": "self_destruct"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_state_reports_integration_health() {
        let engine = Arc::new(Engine::new());
        engine
            .event_sender()
            .send(FromIntegrationMessage::IntegrationHealthChanged {
                integration_name: "aquarea".to_string(),
                health: IntegrationHealth::Ready,
            })
            .await
            .unwrap();
        let runner = engine.clone();
        let run_handle = tokio::spawn(async move {
            runner.run().await.ok();
        });

        let app = test_router(engine);
        let mut json = serde_json::Value::Null;
        for _ in 0..100 {
            let response = app
                .clone()
                .oneshot(Request::builder().uri("/v1/state").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            json = body_json(response).await;
            if !json["integrations"]["aquarea"].is_null() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(json["integrations"]["aquarea"]["status"], "ready");

        run_handle.abort();
    }
}
