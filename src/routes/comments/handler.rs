use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use crate::{
    AppState,
    auth::{Identity, permissions::can_moderate_comments},
    database::{
        entities::comment::{COMMENT_STATUSES, STATUS_APPROVED, STATUS_PENDING},
        repositories::{
            comments::{CommentListFilter, CommentRepository, NewComment},
            posts::PostRepository,
            users::UserRepository,
        },
    },
    error::{ApiError, ApiResult},
    format::{self, CommentView, pagination},
    webhook::events,
};

use super::model::{
    CreateCommentRequest, DeleteQuery, ListCommentsQuery, UpdateCommentRequest,
};

/// 评论者IP，经代理头提取，取不到就留空
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .or_else(|| {
            headers
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').next())
        })
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

fn moderator(identity: &Option<Identity>) -> bool {
    identity
        .as_ref()
        .map(|id| can_moderate_comments(id.role))
        .unwrap_or(false)
}

pub async fn list_comments(
    identity: Option<Extension<Identity>>,
    State(state): State<AppState>,
    Query(query): Query<ListCommentsQuery>,
) -> ApiResult<impl IntoResponse> {
    let identity = identity.map(|Extension(id)| id);
    let privileged = moderator(&identity);
    let (page, per_page) = pagination::clamp_pagination(query.page, query.per_page);

    if let Some(status) = &query.status {
        if !COMMENT_STATUSES.contains(&status.as_str()) {
            return Err(ApiError::InvalidParameter(format!("无效的状态: {}", status)));
        }
    }

    let filter = CommentListFilter {
        post_id: query.post,
        status: query.status,
        privileged,
        page,
        per_page,
    };
    let (comments, total) = CommentRepository::list(&state.pool, &filter).await?;

    let settings = state.settings.get(&state.pool).await;
    let base_url = state.base_url(&settings);
    let views: Vec<_> = comments
        .iter()
        .map(|c| format::format_comment(c, &base_url, privileged))
        .collect();

    let headers = pagination::pagination_headers(
        &format!(
            "{}/wp-json/wp/v2/comments",
            format::normalize_base_url(&base_url)
        ),
        page,
        per_page,
        total,
    );
    Ok((headers, Json(views)))
}

pub async fn get_comment(
    identity: Option<Extension<Identity>>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<CommentView>> {
    let identity = identity.map(|Extension(id)| id);
    let privileged = moderator(&identity);

    let comment = CommentRepository::find_by_id(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    // 未批准的评论对公众相当于不存在
    if comment.status != STATUS_APPROVED && !privileged {
        return Err(ApiError::NotFound);
    }

    let settings = state.settings.get(&state.pool).await;
    let base_url = state.base_url(&settings);
    Ok(Json(format::format_comment(&comment, &base_url, privileged)))
}

pub async fn create_comment(
    identity: Option<Extension<Identity>>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateCommentRequest>,
) -> ApiResult<impl IntoResponse> {
    let identity = identity.map(|Extension(id)| id);

    if req.content.trim().is_empty() {
        return Err(ApiError::InvalidParameter("评论内容不能为空".to_string()));
    }

    let post = PostRepository::find_by_id(&state.pool, "post", req.post)
        .await?
        .ok_or(ApiError::NotFound)?;
    if post.comment_status != "open" {
        return Err(ApiError::Forbidden);
    }

    if let Some(parent) = req.parent.filter(|p| *p != 0) {
        let parent_comment = CommentRepository::find_by_id(&state.pool, parent)
            .await?
            .ok_or(ApiError::InvalidParameter("被回复的评论不存在".to_string()))?;
        if parent_comment.post_id != req.post {
            return Err(ApiError::InvalidParameter(
                "被回复的评论不属于该文章".to_string(),
            ));
        }
    }

    // 登录用户取账号资料，游客必须提供姓名
    let (author_name, author_email, user_id) = match &identity {
        Some(id) => {
            let user = UserRepository::find_by_id(&state.pool, id.user_id)
                .await?
                .ok_or(ApiError::Unauthenticated)?;
            (user.display_name, Some(user.email), Some(user.id))
        }
        None => {
            let name = req
                .author_name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .ok_or_else(|| ApiError::InvalidParameter("游客评论必须提供姓名".to_string()))?
                .to_string();
            (name, req.author_email.clone(), None)
        }
    };

    // 有审核权的评论直接通过，其余进入待审
    let status = if moderator(&identity) {
        STATUS_APPROVED
    } else {
        STATUS_PENDING
    };

    let comment = CommentRepository::insert(
        &state.pool,
        NewComment {
            post_id: req.post,
            parent_id: req.parent.unwrap_or(0),
            author_name,
            author_email,
            author_url: req.author_url,
            author_ip: client_ip(&headers),
            content: req.content,
            status: status.to_string(),
            user_id,
        },
    )
    .await?;

    PostRepository::refresh_comment_count(&state.pool, req.post).await?;

    let settings = state.settings.get(&state.pool).await;
    state.notifier.fire(
        &settings,
        events::COMMENT_CREATED,
        serde_json::json!({ "id": comment.id, "post": comment.post_id, "status": comment.status }),
    );

    let base_url = state.base_url(&settings);
    let privileged = moderator(&identity);
    Ok((
        StatusCode::CREATED,
        Json(format::format_comment(&comment, &base_url, privileged)),
    ))
}

pub async fn update_comment(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateCommentRequest>,
) -> ApiResult<Json<CommentView>> {
    let existing = CommentRepository::find_by_id(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let is_moderator = can_moderate_comments(identity.role);
    let is_owner = existing.user_id == Some(identity.user_id);
    if !is_moderator && !is_owner {
        return Err(ApiError::Forbidden);
    }
    // 状态流转只属于审核者
    if req.status.is_some() && !is_moderator {
        return Err(ApiError::Forbidden);
    }
    if let Some(status) = &req.status {
        if !COMMENT_STATUSES.contains(&status.as_str()) {
            return Err(ApiError::InvalidParameter(format!("无效的状态: {}", status)));
        }
    }

    let comment = CommentRepository::update(&state.pool, id, req.content, req.status).await?;
    PostRepository::refresh_comment_count(&state.pool, comment.post_id).await?;

    let settings = state.settings.get(&state.pool).await;
    state.notifier.fire(
        &settings,
        events::COMMENT_UPDATED,
        serde_json::json!({ "id": comment.id, "post": comment.post_id, "status": comment.status }),
    );

    let base_url = state.base_url(&settings);
    Ok(Json(format::format_comment(&comment, &base_url, is_moderator)))
}

pub async fn delete_comment(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let existing = CommentRepository::find_by_id(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let is_moderator = can_moderate_comments(identity.role);
    let is_owner = existing.user_id == Some(identity.user_id);
    if !is_moderator && !is_owner {
        return Err(ApiError::Forbidden);
    }

    if query.force.unwrap_or(false) {
        CommentRepository::delete(&state.pool, id).await?;
    } else {
        CommentRepository::trash(&state.pool, id).await?;
    }
    PostRepository::refresh_comment_count(&state.pool, existing.post_id).await?;

    let settings = state.settings.get(&state.pool).await;
    state.notifier.fire(
        &settings,
        events::COMMENT_DELETED,
        serde_json::json!({ "id": id, "post": existing.post_id }),
    );

    Ok(Json(serde_json::json!({ "deleted": true })))
}
