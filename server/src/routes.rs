use axum::{extract::ConnectInfo, routing::get, Json, Router};
use common::payload::PollingData;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub const POLLING_ROUTE: &str = "/api/polling";
pub const GREETING: &str = "Hello world";

pub fn router() -> Router {
    Router::new()
        .route(POLLING_ROUTE, get(polling))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Unconditionally answers with the greeting stamped with the current time.
async fn polling(connect_info: Option<ConnectInfo<SocketAddr>>) -> Json<PollingData> {
    let data = PollingData::now(GREETING);
    let peer = connect_info
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    info!("Getting requests from {} at {}", peer, data.timestamp);
    Json(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use tower::ServiceExt;

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_polling_route_returns_greeting() {
        let resp = router().oneshot(get_request(POLLING_ROUTE)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let data: PollingData = serde_json::from_slice(&body).unwrap();
        assert_eq!(data.message, "Hello world");
        assert!(data.parsed_timestamp().is_some());
    }

    #[tokio::test]
    async fn test_timestamp_advances() {
        let first = router().oneshot(get_request(POLLING_ROUTE)).await.unwrap();
        let first: PollingData =
            serde_json::from_slice(&to_bytes(first.into_body(), usize::MAX).await.unwrap()).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = router().oneshot(get_request(POLLING_ROUTE)).await.unwrap();
        let second: PollingData =
            serde_json::from_slice(&to_bytes(second.into_body(), usize::MAX).await.unwrap()).unwrap();

        assert!(second.parsed_timestamp() > first.parsed_timestamp());
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin() {
        let req = Request::builder()
            .uri(POLLING_ROUTE)
            .header(header::ORIGIN, "http://localhost:5173")
            .body(Body::empty())
            .unwrap();
        let resp = router().oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn test_only_get_is_routed() {
        let resp = router().oneshot(get_request("/api/other")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = Request::builder()
            .method(Method::POST)
            .uri(POLLING_ROUTE)
            .body(Body::empty())
            .unwrap();
        let resp = router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
