use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// 统一的API错误类型，按WordPress REST风格渲染
#[derive(Debug)]
pub enum ApiError {
    /// 未登录或令牌无效/过期
    Unauthenticated,
    /// 已登录但角色或归属权限不足
    Forbidden,
    /// 实体不存在，或存在但当前访问者不可见（两者不可区分）
    NotFound,
    /// 参数缺失或格式非法
    InvalidParameter(String),
    /// 唯一性冲突（slug、用户名、邮箱等）
    Conflict(String),
    /// 上游依赖失败且无可用降级（如对象存储写入失败）
    Upstream(String),
    /// 数据库错误
    Database(sqlx::Error),
}

#[derive(Serialize)]
struct ErrorData {
    status: u16,
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    data: ErrorData,
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "rest_not_logged_in",
                "需要登录才能访问".to_string(),
            ),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "rest_forbidden",
                "当前用户无权执行此操作".to_string(),
            ),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                "rest_not_found",
                "资源不存在".to_string(),
            ),
            ApiError::InvalidParameter(msg) => {
                (StatusCode::BAD_REQUEST, "rest_invalid_param", msg.clone())
            }
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "rest_conflict", msg.clone()),
            ApiError::Upstream(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "rest_upstream_error",
                msg.clone(),
            ),
            ApiError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "内部服务器错误".to_string(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Database(e) = &self {
            tracing::error!("Database error: {:?}", e);
        }
        let (status, code, message) = self.parts();
        let body = Json(ErrorBody {
            code,
            message,
            data: ErrorData {
                status: status.as_u16(),
            },
        });
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => ApiError::NotFound,
            other => ApiError::Database(other),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_from_row_not_found() {
        let err = ApiError::from(sqlx::Error::RowNotFound);
        let (status, code, _) = err.parts();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "rest_not_found");
    }

    #[test]
    fn status_mirrored_in_parts() {
        let (status, code, _) = ApiError::Unauthenticated.parts();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(code, "rest_not_logged_in");

        let (status, _, _) = ApiError::Forbidden.parts();
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
