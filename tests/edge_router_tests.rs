use axum::{
    Router,
    body::Body,
    extract::Request,
    http::{Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use dispatch_edge::{AppState, PageOrigin, create_router};
use tokio::net::TcpListener;
use tower::ServiceExt;

// --- Helper Functions ---

/// A page origin that echoes what it received, so forwarding can be asserted.
async fn spawn_origin() -> String {
    async fn echo(request: Request) -> Response {
        let method = request.method().clone();
        let uri = request.uri().clone();
        let cookie = request
            .headers()
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = axum::body::to_bytes(request.into_body(), 1024)
            .await
            .unwrap_or_default();

        (
            StatusCode::OK,
            [("x-origin", "pages")],
            format!(
                "{} {} cookie=[{}] body=[{}]",
                method,
                uri,
                cookie,
                String::from_utf8_lossy(&body)
            ),
        )
            .into_response()
    }

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind origin port");
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, Router::new().fallback(echo)).await.unwrap();
    });
    format!("http://127.0.0.1:{}", port)
}

fn edge(origin_url: &str) -> Router {
    create_router(AppState {
        origin: PageOrigin::new(origin_url).unwrap(),
    })
}

fn get(path: &str, cookies: Option<&str>) -> Request {
    let mut builder = Request::builder().method(Method::GET).uri(path);
    if let Some(cookies) = cookies {
        builder = builder.header(header::COOKIE, cookies);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

// --- Tests ---

#[tokio::test]
async fn test_health_is_served_locally() {
    // No origin listening on this port: /health must not need it.
    let app = edge("http://127.0.0.1:9");
    let response = app.oneshot(get("/health", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");
}

#[tokio::test]
async fn test_protected_path_without_session_redirects_to_login() {
    let app = edge("http://127.0.0.1:9");
    let response = app.oneshot(get("/admin/orders", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_partial_cookies_redirect_to_login() {
    let app = edge("http://127.0.0.1:9");
    let response = app
        .oneshot(get("/courier/tasks", Some("token=abc")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_wrong_role_redirects_to_own_dashboard() {
    let app = edge("http://127.0.0.1:9");
    let response = app
        .oneshot(get("/admin/users", Some("token=abc; role=courier")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/courier/dashboard");
}

#[tokio::test]
async fn test_login_page_redirects_signed_in_user() {
    let app = edge("http://127.0.0.1:9");
    let response = app
        .oneshot(get("/login", Some("token=abc; role=customer")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/customer/dashboard");
}

#[tokio::test]
async fn test_allowed_page_is_forwarded_to_origin() {
    let origin = spawn_origin().await;
    let app = edge(&origin);
    let response = app
        .oneshot(get(
            "/courier/tasks?filter=open",
            Some("token=abc; role=courier"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-origin").and_then(|v| v.to_str().ok()),
        Some("pages")
    );
    let body = body_text(response).await;
    assert!(body.starts_with("GET /courier/tasks?filter=open"), "{body}");
    assert!(body.contains("role=courier"), "{body}");
}

#[tokio::test]
async fn test_anonymous_public_page_and_body_are_forwarded() {
    let origin = spawn_origin().await;
    let app = edge(&origin);
    let request = Request::builder()
        .method(Method::POST)
        .uri("/contact")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("hello"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.starts_with("POST /contact"), "{body}");
    assert!(body.contains("body=[hello]"), "{body}");
}

#[tokio::test]
async fn test_bypassed_api_path_is_not_gated() {
    let origin = spawn_origin().await;
    let app = edge(&origin);
    // Anonymous, yet no redirect: /api never reaches the gate.
    let response = app.oneshot(get("/api/admin/stats", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.starts_with("GET /api/admin/stats"));
}

#[tokio::test]
async fn test_unreachable_origin_is_bad_gateway() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let app = edge(&format!("http://127.0.0.1:{}", port));
    let response = app.oneshot(get("/pricing", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let app = edge("http://127.0.0.1:9");
    let response = app.oneshot(get("/health", None)).await.unwrap();

    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_dot_segments_are_redirected_before_gating() {
    let origin = spawn_origin().await;

    let cases = [
        ("/public/../admin/dashboard", None, "/admin/dashboard"),
        ("/api/../admin/dashboard", None, "/admin/dashboard"),
        ("/customer/../admin/dashboard", Some("token=abc; role=customer"), "/admin/dashboard"),
        ("/courier/%2e%2e/admin/users", None, "/admin/users"),
        ("/courier/tasks/./7/", None, "/courier/tasks/7/"),
    ];
    for (path, cookies, canonical) in cases {
        let response = edge(&origin).oneshot(get(path, cookies)).await.unwrap();
        assert_eq!(response.status(), StatusCode::PERMANENT_REDIRECT, "{path}");
        assert_eq!(location(&response), canonical, "{path}");
    }

    // Following the redirect reaches the gate with the real path.
    let response = edge(&origin)
        .oneshot(get("/admin/dashboard", Some("token=abc; role=customer")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/customer/dashboard");
}

#[tokio::test]
async fn test_canonical_redirect_keeps_query() {
    let app = edge("http://127.0.0.1:9");
    let response = app
        .oneshot(get("/orders//track/?id=7&step=2", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PERMANENT_REDIRECT);
    assert_eq!(location(&response), "/orders/track/?id=7&step=2");
}

#[tokio::test]
async fn test_scheme_relative_path_never_leaves_the_origin() {
    let origin = spawn_origin().await;
    let authority = origin.trim_start_matches("http://");
    let sneaky = format!("//{}/admin/dashboard", authority);

    let response = edge(&origin).oneshot(get(&sneaky, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::PERMANENT_REDIRECT);
    let canonical = format!("/{}/admin/dashboard", authority);
    assert_eq!(location(&response), canonical);

    // The collapsed path is an ordinary public page on the same origin.
    let response = edge(&origin).oneshot(get(&canonical, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.starts_with(&format!("GET {canonical}")), "{body}");
}

#[test]
fn test_origin_target_keeps_path_verbatim() {
    let origin = PageOrigin::new("http://127.0.0.1:3001/base/").unwrap();

    let target = origin
        .target_for(&Uri::from_static("/courier/tasks?filter=open"))
        .unwrap();
    assert_eq!(target.as_str(), "http://127.0.0.1:3001/courier/tasks?filter=open");

    for path in ["/public/../admin", "//evil.example/x", "/a/./b"] {
        let uri: Uri = path.parse().unwrap();
        assert_eq!(origin.target_for(&uri), Err(StatusCode::BAD_REQUEST), "{path}");
    }
}
