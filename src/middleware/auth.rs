use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use crate::{
    AppState,
    auth::{self, Identity},
    error::ApiError,
};

/// 从请求中提取令牌：优先Authorization头，其次auth_token cookie
fn extract_token(req: &Request<Body>, jar: &CookieJar) -> Option<String> {
    let header_token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.to_string());

    header_token.or_else(|| jar.get("auth_token").map(|c| c.value().to_string()))
}

fn resolve_identity(state: &AppState, req: &Request<Body>, jar: &CookieJar) -> Option<Identity> {
    let token = extract_token(req, jar)?;
    auth::verify_token(&token, &state.config).map(Identity::from)
}

/// 强制认证：无令牌或令牌无效直接401
pub async fn auth_required(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    match resolve_identity(&state, &req, &jar) {
        Some(identity) => {
            req.extensions_mut().insert(identity);
            Ok(next.run(req).await)
        }
        None => Err(ApiError::Unauthenticated),
    }
}

/// 可选认证：匿名请求照常放行，带有效令牌时附加身份
/// 公共读取接口依赖它在管理员登录时展示草稿和隐私字段
pub async fn auth_optional(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(identity) = resolve_identity(&state, &req, &jar) {
        req.extensions_mut().insert(identity);
    }
    next.run(req).await
}
