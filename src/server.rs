//! Minimal HTTP surface: a greeting endpoint and a health check.

use axum::{
    extract::Query,
    response::{Html, IntoResponse, Json},
    routing::get,
    Router,
};
use hyper::Server;
use serde::Deserialize;
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Debug, Default, Deserialize)]
pub struct Greeting {
    pub name: Option<String>,
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "food_inspections",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// `Hello {name}!`, JSON body taking precedence over the query string.
async fn greet(Query(query): Query<Greeting>, body: Option<Json<Greeting>>) -> Html<String> {
    let from_body = body.and_then(|Json(g)| g.name);
    let name = from_body
        .or(query.name)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "World".to_string());
    Html(format!("Hello {}!", escape_html(&name)))
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn create_server() -> Router {
    Router::new()
        .route("/", get(greet).post(greet))
        .route("/health", get(health))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

pub async fn start_server(addr: SocketAddr) -> anyhow::Result<()> {
    let app = create_server();
    info!("🚀 HTTP server running on http://{addr}");
    info!("💚 Health check: http://{addr}/health");
    Server::bind(&addr).serve(app.into_make_service()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_greeting_defaults_to_world() {
        let response = create_server()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "Hello World!");
    }

    #[tokio::test]
    async fn test_greeting_uses_query_and_escapes() {
        let response = create_server()
            .oneshot(
                Request::builder()
                    .uri("/?name=%3Cb%3ESam%3C%2Fb%3E")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(body_text(response).await, "Hello &lt;b&gt;Sam&lt;/b&gt;!");
    }

    #[tokio::test]
    async fn test_json_body_wins_over_query() {
        let response = create_server()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/?name=Query")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"name":"Body"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(body_text(response).await, "Hello Body!");
    }

    #[tokio::test]
    async fn test_health_reports_status() {
        let response = create_server()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["status"], "healthy");
    }
}
