//! End-to-end tests against the full application router.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use clinicgate_server::{
    config::{AuthConfig, ServerConfig},
    middleware::auth::{encode_token, Claims},
    Server,
};
use std::net::{IpAddr, SocketAddr};
use tower::ServiceExt;

const SECRET: &str = "integration_secret_0123456789abcdef";

fn config() -> ServerConfig {
    ServerConfig {
        auth: AuthConfig {
            jwt_secret: SECRET.to_string(),
        },
        ..Default::default()
    }
}

fn server(config: ServerConfig) -> (Server, Router) {
    let server = Server::new(config).unwrap();
    let router = server.router().unwrap();
    (server, router)
}

fn from_peer(mut req: Request<Body>, addr: &str) -> Request<Body> {
    let ip: IpAddr = addr.parse().unwrap();
    req.extensions_mut().insert(ConnectInfo(SocketAddr::new(ip, 40000)));
    req
}

fn get(path: &str, addr: &str) -> Request<Body> {
    from_peer(Request::builder().uri(path).body(Body::empty()).unwrap(), addr)
}

fn verify(token: &str, addr: &str) -> Request<Body> {
    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/auth/verify")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::json!({ "token": token }).to_string()))
        .unwrap();
    from_peer(req, addr)
}

fn token(sub: &str, role: &str) -> String {
    encode_token(&Claims::new(sub, "", role, 600), SECRET).unwrap()
}

async fn send(router: &Router, req: Request<Body>) -> Response {
    router.clone().oneshot(req).await.unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[test]
fn invalid_config_is_refused() {
    let mut config = config();
    config.auth.jwt_secret = "short".into();
    let err = Server::new(config).err().unwrap();
    assert!(err.to_string().contains("JWT secret"));
}

#[test]
fn unknown_preset_in_config_is_refused() {
    let mut config = config();
    config
        .rate_limit
        .presets
        .insert("turbo".into(), Default::default());
    assert!(Server::new(config).is_err());
}

#[tokio::test]
async fn status_route_uses_generous_preset() {
    let (_, router) = server(config());
    let response = send(&router, get("/api/v1/status", "192.0.2.1")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-ratelimit-limit"], "1000");
    assert_eq!(response.headers()["x-ratelimit-remaining"], "999");
    assert!(response.headers().contains_key("x-request-id"));

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn verify_counts_only_failures() {
    let (server, router) = server(config());
    let registry = &server.state().rate_limits;

    for _ in 0..10 {
        let response = send(&router, verify(&token("pat-9", "patient"), "192.0.2.2")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(registry.status("auth:192.0.2.2").count, 0);

    for attempt in 1..=5 {
        let response = send(&router, verify("forged", "192.0.2.2")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(registry.status("auth:192.0.2.2").count, attempt);
    }

    let blocked = send(&router, verify(&token("pat-9", "patient"), "192.0.2.2")).await;
    assert_eq!(blocked.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = body_json(blocked).await;
    assert_eq!(body["error"]["code"], "RATE_LIMIT_EXCEEDED");
    assert!(body["retryAfter"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn whoami_ceiling_follows_session_role() {
    let (_, router) = server(config());

    let mut req = get("/api/v1/whoami", "192.0.2.3");
    req.headers_mut().insert(
        "authorization",
        format!("Bearer {}", token("doc-5", "doctor")).parse().unwrap(),
    );
    let response = send(&router, req).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-ratelimit-limit"], "500");
    let body = body_json(response).await;
    assert_eq!(body["data"]["role"], "doctor");
    assert_eq!(body["data"]["id"], "doc-5");

    let response = send(&router, get("/api/v1/whoami", "192.0.2.3")).await;
    assert_eq!(response.headers()["x-ratelimit-limit"], "50");
    let body = body_json(response).await;
    assert_eq!(body["data"]["authenticated"], false);
    assert_eq!(body["data"]["role"], "anonymous");
}

#[tokio::test]
async fn configured_role_overrides_apply() {
    let mut config = config();
    config.rate_limit.roles.insert("patient".into(), 2);
    let (_, router) = server(config);

    let authed = || {
        let mut req = get("/api/v1/whoami", "192.0.2.4");
        req.headers_mut().insert(
            "authorization",
            format!("Bearer {}", token("pat-2", "patient")).parse().unwrap(),
        );
        req
    };

    assert_eq!(send(&router, authed()).await.status(), StatusCode::OK);
    assert_eq!(send(&router, authed()).await.status(), StatusCode::OK);
    assert_eq!(
        send(&router, authed()).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
}

#[tokio::test]
async fn internal_rate_limit_admin() {
    let (_, router) = server(config());
    send(&router, get("/api/v1/status", "192.0.2.5")).await;
    send(&router, get("/api/v1/status", "192.0.2.5")).await;

    let listing = body_json(send(&router, get("/internal/rate-limits", "127.0.0.1")).await).await;
    let keys = listing["data"].as_array().unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0]["key"], "192.0.2.5");
    assert_eq!(keys[0]["count"], 2);

    let status = body_json(send(&router, get("/internal/rate-limits/192.0.2.5", "127.0.0.1")).await).await;
    assert_eq!(status["data"]["count"], 2);
    assert_eq!(status["data"]["remaining"], 998);
    assert!(status["data"]["resetTime"].is_string());

    let reset = Request::builder()
        .method("DELETE")
        .uri("/internal/rate-limits/192.0.2.5")
        .body(Body::empty())
        .unwrap();
    let outcome = body_json(send(&router, reset).await).await;
    assert_eq!(outcome["data"]["existed"], true);

    let status = body_json(send(&router, get("/internal/rate-limits/192.0.2.5", "127.0.0.1")).await).await;
    assert_eq!(status["data"]["count"], 0);
    assert!(status["data"]["remaining"].is_null());
    assert!(status["data"]["resetTime"].is_null());
    assert!(status["data"]["firstRequest"].is_null());

    let sweep = Request::builder()
        .method("POST")
        .uri("/internal/rate-limits/sweep")
        .body(Body::empty())
        .unwrap();
    let swept = body_json(send(&router, sweep).await).await;
    assert_eq!(swept["data"]["removed"], 0);
}

#[tokio::test]
async fn readiness_reports_shutdown() {
    let (server, router) = server(config());

    let ready = send(&router, get("/internal/health/ready", "127.0.0.1")).await;
    assert_eq!(ready.status(), StatusCode::OK);

    server.state().shutdown.initiate();

    let draining = send(&router, get("/internal/health/ready", "127.0.0.1")).await;
    assert_eq!(draining.status(), StatusCode::SERVICE_UNAVAILABLE);
    let live = send(&router, get("/internal/health/live", "127.0.0.1")).await;
    assert_eq!(live.status(), StatusCode::OK);
}

#[tokio::test]
async fn disabled_rate_limits_mount_no_gates() {
    let mut config = config();
    config.rate_limit.enabled = false;
    let (server, router) = server(config);

    let response = send(&router, get("/api/v1/status", "192.0.2.6")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response.headers().contains_key("x-ratelimit-limit"));
    assert!(server.state().rate_limits.all_keys().is_empty());
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let (_, router) = server(config());
    let response = send(&router, get("/api/v2/status", "192.0.2.7")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn proxy_headers_are_ignored_by_default() {
    let (server, router) = server(config());
    let mut req = get("/api/v1/status", "192.0.2.8");
    req.headers_mut()
        .insert("x-forwarded-for", "203.0.113.50".parse().unwrap());
    send(&router, req).await;

    let registry = &server.state().rate_limits;
    assert_eq!(registry.status("192.0.2.8").count, 1);
    assert_eq!(registry.status("203.0.113.50").count, 0);
}

#[tokio::test]
async fn trusted_proxy_headers_name_the_client() {
    let mut config = config();
    config.server.trust_proxy_headers = true;
    let (server, router) = server(config);

    let forwarded = |value: &str| {
        let mut req = get("/api/v1/status", "10.9.9.9");
        req.headers_mut()
            .insert("x-forwarded-for", value.parse().unwrap());
        req
    };

    send(&router, forwarded("203.0.113.50, 10.9.9.9")).await;
    for i in 0..5 {
        send(&router, forwarded(&format!("junk-{i}"))).await;
    }

    let registry = &server.state().rate_limits;
    assert_eq!(registry.status("203.0.113.50").count, 1);
    assert_eq!(registry.status("10.9.9.9").count, 5);
    assert_eq!(registry.all_keys().len(), 2);
}
