//! HTTP status endpoint
//!
//! - `GET /status` - `ONLINE` or `OFFLINE`, plain text, always 200
//! - `GET /` - 418, for anyone poking at the root
//!
//! The endpoint is public. Reading presence is harmless; only asserting
//! it requires the key, and that happens on the agent port.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::presence::PresenceAggregator;

const TEAPOT_BODY: &str = "418 I'm a teapot\n";

/// Build the status router
pub fn router(aggregator: PresenceAggregator) -> Router {
    Router::new()
        .route("/", get(teapot))
        .route("/status", get(status))
        .fallback(|| async { StatusCode::NOT_FOUND })
        .with_state(aggregator)
}

/// Serve the status router on `listener` until `cancel` fires
pub async fn serve(
    listener: TcpListener,
    aggregator: PresenceAggregator,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Status endpoint listening on http://{}/status", addr);
    }

    axum::serve(listener, router(aggregator))
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
            tracing::info!("Status endpoint shutting down");
        })
        .await
}

async fn status(State(aggregator): State<PresenceAggregator>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        aggregator.presence().as_str(),
    )
}

async fn teapot() -> impl IntoResponse {
    (
        StatusCode::IM_A_TEAPOT,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        TEAPOT_BODY,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::connection::ConnectionRegistry;

    async fn get_body(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_status_reflects_registry() {
        let registry = Arc::new(ConnectionRegistry::new());
        let aggregator = PresenceAggregator::new(Arc::clone(&registry));

        let (code, body) = get_body(router(aggregator.clone()), "/status").await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body, "OFFLINE");

        let id = registry.add(
            SocketAddr::from(([127, 0, 0, 1], 4000)),
            CancellationToken::new(),
        );
        let (code, body) = get_body(router(aggregator.clone()), "/status").await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body, "ONLINE");

        registry.remove(id);
        let (_, body) = get_body(router(aggregator), "/status").await;
        assert_eq!(body, "OFFLINE");
    }

    #[tokio::test]
    async fn test_root_and_unknown_paths() {
        let aggregator = PresenceAggregator::new(Arc::new(ConnectionRegistry::new()));

        let (code, _) = get_body(router(aggregator.clone()), "/").await;
        assert_eq!(code, StatusCode::IM_A_TEAPOT);

        let (code, _) = get_body(router(aggregator), "/heartbeat").await;
        assert_eq!(code, StatusCode::NOT_FOUND);
    }
}
