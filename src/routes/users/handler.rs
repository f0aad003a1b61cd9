use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    auth::{
        self, Identity, Role,
        permissions::{can_manage_site, can_view_private_fields},
    },
    database::{is_unique_violation, repositories::users::{UserChanges, UserRepository}},
    error::{ApiError, ApiResult},
    format::{self, pagination},
};

use super::model::{
    AuthResponse, CreateUserRequest, DeleteQuery, ListUsersQuery, LoginRequest, RegisterRequest,
    UpdateUserRequest,
};

fn validate_email(email: &str) -> Result<(), ApiError> {
    let valid = email.contains('@') && email.split('@').nth(1).is_some_and(|d| d.contains('.'));
    if valid {
        Ok(())
    } else {
        Err(ApiError::InvalidParameter("邮箱格式无效".to_string()))
    }
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < 6 {
        return Err(ApiError::InvalidParameter(
            "密码长度不能少于6个字符".to_string(),
        ));
    }
    Ok(())
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.username.trim().is_empty() {
        return Err(ApiError::InvalidParameter("用户名不能为空".to_string()));
    }
    validate_email(&req.email)?;
    validate_password(&req.password)?;

    if UserRepository::username_or_email_taken(&state.pool, &req.username, &req.email).await? {
        return Err(ApiError::Conflict("用户名或邮箱已被占用".to_string()));
    }

    // 首个注册者自动引导为管理员，其余默认订阅者
    let role = UserRepository::registration_role(&state.pool).await?;

    let password_hash = auth::hash_password(&req.password)
        .map_err(|e| ApiError::Upstream(format!("密码哈希失败: {}", e)))?;
    let display_name = req.display_name.unwrap_or_else(|| req.username.clone());

    let user = UserRepository::create(
        &state.pool,
        &req.username,
        &req.email,
        &password_hash,
        &display_name,
        role.as_str(),
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::Conflict("用户名或邮箱已被占用".to_string())
        } else {
            ApiError::from(e)
        }
    })?;

    let token = auth::generate_token(user.id, &user.username, &user.email, role, &state.config)
        .map_err(|e| ApiError::Upstream(format!("生成令牌失败: {}", e)))?;

    let settings = state.settings.get(&state.pool).await;
    let base_url = state.base_url(&settings);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: format::format_user(&user, &base_url, true),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let user = UserRepository::find_by_login(&state.pool, &req.username_or_email)
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    let matches = auth::verify_password(&req.password, &user.password_hash)
        .map_err(|e| ApiError::Upstream(format!("密码校验失败: {}", e)))?;
    if !matches {
        return Err(ApiError::Unauthenticated);
    }
    if user.status != "active" {
        return Err(ApiError::Forbidden);
    }

    let role = Role::from_str(&user.role)
        .ok_or_else(|| ApiError::Upstream(format!("未知角色: {}", user.role)))?;
    let token = auth::generate_token(user.id, &user.username, &user.email, role, &state.config)
        .map_err(|e| ApiError::Upstream(format!("生成令牌失败: {}", e)))?;

    UserRepository::record_login(&state.pool, user.id).await?;
    tracing::info!("User {} logged in", user.username);

    let settings = state.settings.get(&state.pool).await;
    let base_url = state.base_url(&settings);

    Ok(Json(AuthResponse {
        token,
        user: format::format_user(&user, &base_url, true),
    }))
}

pub async fn me(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
) -> ApiResult<Json<format::UserView>> {
    let user = UserRepository::find_by_id(&state.pool, identity.user_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let settings = state.settings.get(&state.pool).await;
    let base_url = state.base_url(&settings);
    Ok(Json(format::format_user(&user, &base_url, true)))
}

pub async fn list_users(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> ApiResult<impl IntoResponse> {
    if !can_view_private_fields(identity.role) {
        return Err(ApiError::Forbidden);
    }

    let (page, per_page) = pagination::clamp_pagination(query.page, query.per_page);
    let (users, total) = UserRepository::list(&state.pool, page, per_page).await?;

    let settings = state.settings.get(&state.pool).await;
    let base_url = state.base_url(&settings);
    let views: Vec<_> = users
        .iter()
        .map(|u| format::format_user(u, &base_url, true))
        .collect();

    let headers = pagination::pagination_headers(
        &format!("{}/wp-json/wp/v2/users", format::normalize_base_url(&base_url)),
        page,
        per_page,
        total,
    );
    Ok((headers, Json(views)))
}

pub async fn get_user(
    identity: Option<Extension<Identity>>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<format::UserView>> {
    let user = UserRepository::find_by_id(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;

    // 管理视角或本人自查时展示隐私字段，每次请求重新判定
    let can_view_private = identity
        .as_ref()
        .map(|Extension(id)| can_view_private_fields(id.role) || id.user_id == user.id)
        .unwrap_or(false);

    let settings = state.settings.get(&state.pool).await;
    let base_url = state.base_url(&settings);
    Ok(Json(format::format_user(&user, &base_url, can_view_private)))
}

pub async fn create_user(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<impl IntoResponse> {
    if !can_manage_site(identity.role) {
        return Err(ApiError::Forbidden);
    }
    validate_email(&req.email)?;
    validate_password(&req.password)?;

    let role = match &req.role {
        Some(name) => Role::from_str(name)
            .ok_or_else(|| ApiError::InvalidParameter(format!("无效的角色: {}", name)))?,
        None => Role::Subscriber,
    };

    let password_hash = auth::hash_password(&req.password)
        .map_err(|e| ApiError::Upstream(format!("密码哈希失败: {}", e)))?;
    let display_name = req.display_name.unwrap_or_else(|| req.username.clone());

    let user = UserRepository::create(
        &state.pool,
        &req.username,
        &req.email,
        &password_hash,
        &display_name,
        role.as_str(),
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::Conflict("用户名或邮箱已被占用".to_string())
        } else {
            ApiError::from(e)
        }
    })?;

    let settings = state.settings.get(&state.pool).await;
    let base_url = state.base_url(&settings);
    Ok((
        StatusCode::CREATED,
        Json(format::format_user(&user, &base_url, true)),
    ))
}

pub async fn update_user(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<format::UserView>> {
    let is_self = identity.user_id == id;
    if !is_self && !can_manage_site(identity.role) {
        return Err(ApiError::Forbidden);
    }
    // 角色和状态只有管理员能改，本人也不行
    if (req.role.is_some() || req.status.is_some()) && !can_manage_site(identity.role) {
        return Err(ApiError::Forbidden);
    }

    if let Some(email) = &req.email {
        validate_email(email)?;
    }
    if let Some(role) = &req.role {
        Role::from_str(role)
            .ok_or_else(|| ApiError::InvalidParameter(format!("无效的角色: {}", role)))?;
    }
    if let Some(status) = &req.status {
        if status != "active" && status != "inactive" {
            return Err(ApiError::InvalidParameter(format!("无效的状态: {}", status)));
        }
    }

    let password_hash = match &req.password {
        Some(password) => {
            validate_password(password)?;
            Some(
                auth::hash_password(password)
                    .map_err(|e| ApiError::Upstream(format!("密码哈希失败: {}", e)))?,
            )
        }
        None => None,
    };

    UserRepository::find_by_id(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let user = UserRepository::update(
        &state.pool,
        id,
        UserChanges {
            email: req.email,
            password_hash,
            display_name: req.display_name,
            role: req.role,
            status: req.status,
            avatar_url: req.avatar_url,
            bio: req.bio,
        },
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::Conflict("邮箱已被占用".to_string())
        } else {
            ApiError::from(e)
        }
    })?;

    let settings = state.settings.get(&state.pool).await;
    let base_url = state.base_url(&settings);
    Ok(Json(format::format_user(&user, &base_url, true)))
}

/// 默认停用账号，force=true才真正删除行
pub async fn delete_user(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    if !can_manage_site(identity.role) {
        return Err(ApiError::Forbidden);
    }
    if identity.user_id == id {
        return Err(ApiError::InvalidParameter("不能删除自己的账号".to_string()));
    }

    UserRepository::find_by_id(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;

    if query.force.unwrap_or(false) {
        // 名下仍有文章/媒体时外键阻止删除
        UserRepository::delete(&state.pool, id).await.map_err(|e| {
            if crate::database::is_foreign_key_violation(&e) {
                ApiError::Conflict("该用户名下仍有内容，无法删除".to_string())
            } else {
                ApiError::from(e)
            }
        })?;
        Ok(Json(serde_json::json!({ "deleted": true })))
    } else {
        UserRepository::deactivate(&state.pool, id).await?;
        Ok(Json(serde_json::json!({ "deactivated": true })))
    }
}
