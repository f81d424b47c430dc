//! HTTP surface of the coprocessor.

use std::net::SocketAddr;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use serde_json::Value;
use serde_json::json;
use tokio::net::TcpListener;

use crate::coprocessor::Mocker;

const SERVICE_NAME: &str = "subgraph-mocker";

/// Routes: coprocessor payloads on `POST /`, liveness on `GET /health`.
pub fn router(mocker: Mocker) -> Router {
    Router::new()
        .route("/", post(coprocessor))
        .route("/health", get(health))
        .with_state(mocker)
}

async fn coprocessor(State(mocker): State<Mocker>, Json(payload): Json<Value>) -> Response {
    match mocker.handle(payload).await {
        Ok(reply) => Json(reply).into_response(),
        Err(error) => {
            tracing::warn!(%error, "invalid coprocessor payload");
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "errors": [{ "message": error.to_string() }] })),
            )
                .into_response()
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "OK", "service": SERVICE_NAME }))
}

/// Serve the coprocessor until the process receives ctrl-c.
pub async fn serve(listener: TcpListener, mocker: Mocker) -> std::io::Result<()> {
    let address: Option<SocketAddr> = listener.local_addr().ok();
    if let Some(address) = address {
        tracing::info!("coprocessor listening on http://{address}");
    }
    axum::serve(listener, router(mocker))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "could not listen for the shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use http::Request;
    use http_body_util::BodyExt;
    use pretty_assertions::assert_eq;
    use subgraph_validator::Generator;
    use subgraph_validator::SubgraphValidators;
    use subgraph_validator::error::BoxError;
    use tower::ServiceExt;

    use super::*;

    struct Offline;

    #[async_trait]
    impl Generator for Offline {
        async fn generate(&self, _prompt: &str) -> Result<String, BoxError> {
            Err("offline".into())
        }
    }

    fn app() -> Router {
        router(Mocker::new(SubgraphValidators::new(), Arc::new(Offline), false))
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_check() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"status": "OK", "service": "subgraph-mocker"})
        );
    }

    #[tokio::test]
    async fn coprocessor_payloads() {
        let payload = json!({
            "version": 1,
            "stage": "SubgraphRequest",
            "id": "2",
            "serviceName": "reviews",
            "body": {"query": "{ topReviews { body } }"}
        });
        let response = app()
            .oneshot(
                Request::post("/")
                    .header(http::header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let reply = body_json(response).await;
        assert_eq!(reply["control"], json!({"break": 500}));
        assert_eq!(reply["serviceName"], json!("reviews"));
    }

    #[tokio::test]
    async fn malformed_payloads_are_rejected() {
        let response = app()
            .oneshot(
                Request::post("/")
                    .header(http::header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"stage": "SubgraphRequest", "version": "one"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
