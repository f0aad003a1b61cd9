use axum::{
    body::{Body, to_bytes},
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use tracing::error;

/// 读取错误响应体时最多缓冲的字节数
const ERROR_BODY_LIMIT: usize = 1024;

/// 5xx响应的响应体会被消费后重建，落一条错误日志再放行。
/// 读取失败时退化为空体返回，不中断请求。
pub async fn log_errors(req: Request<Body>, next: Next) -> Response {
    let response = next.run(req).await;
    if !response.status().is_server_error() {
        return response;
    }

    let status = response.status();
    let (mut parts, body) = response.into_parts();
    // 响应体被重建，原长度头不再可信
    parts.headers.remove(header::CONTENT_LENGTH);

    match to_bytes(body, ERROR_BODY_LIMIT).await {
        Ok(bytes) => {
            error!(
                "Server error occurred - Status: {}, Body: {}",
                status,
                String::from_utf8_lossy(&bytes)
            );
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(e) => {
            error!(
                "Server error occurred - Status: {}, body unreadable: {}",
                status, e
            );
            Response::from_parts(parts, Body::empty())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, http::StatusCode, middleware::from_fn, routing::get};
    use tower::ServiceExt;

    async fn failing() -> (StatusCode, &'static str) {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"code":"internal_error"}"#,
        )
    }

    async fn healthy() -> &'static str {
        "ok"
    }

    #[tokio::test]
    async fn server_error_body_survives_logging() {
        let app = Router::new()
            .route("/fail", get(failing))
            .layer(from_fn(log_errors));

        let response = app
            .oneshot(Request::builder().uri("/fail").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        // 响应体已被读走重建，长度头必须移除，否则与实际body不符
        assert!(response.headers().get(header::CONTENT_LENGTH).is_none());
        let bytes = to_bytes(response.into_body(), 2048).await.unwrap();
        assert_eq!(&bytes[..], br#"{"code":"internal_error"}"#);
    }

    #[tokio::test]
    async fn success_response_untouched() {
        let app = Router::new()
            .route("/ok", get(healthy))
            .layer(from_fn(log_errors));

        let response = app
            .oneshot(Request::builder().uri("/ok").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), 2048).await.unwrap();
        assert_eq!(&bytes[..], b"ok");
    }
}
