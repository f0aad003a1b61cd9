use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use crate::{
    AppState, assist,
    auth::{
        Identity,
        permissions::{can_delete_post, can_edit_post, can_publish, can_view_private_fields},
    },
    database::{
        entities::post::{POST_STATUSES, Post, STATUS_DRAFT, STATUS_PUBLISH},
        is_unique_violation,
        repositories::{
            posts::{NewPost, PostChanges, PostListFilter, PostRepository},
            terms::TermRepository,
        },
    },
    error::{ApiError, ApiResult},
    format::{self, PostView, pagination},
    webhook,
};

use super::model::{CreatePostRequest, DeleteQuery, ListPostsQuery, UpdatePostRequest};

fn validate_status(status: &str) -> Result<(), ApiError> {
    if POST_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(ApiError::InvalidParameter(format!("无效的状态: {}", status)))
    }
}

/// 列表按非publish状态过滤需要管理视角：匿名401，普通角色403
fn resolve_status_filter(
    requested: Option<String>,
    authenticated: bool,
    privileged: bool,
) -> Result<Option<String>, ApiError> {
    let Some(status) = requested else {
        return Ok(None);
    };
    validate_status(&status)?;
    if status == STATUS_PUBLISH || privileged {
        Ok(Some(status))
    } else if authenticated {
        Err(ApiError::Forbidden)
    } else {
        Err(ApiError::Unauthenticated)
    }
}

fn dedup_ids(ids: Vec<i64>) -> Vec<i64> {
    let mut ids = ids;
    ids.sort_unstable();
    ids.dedup();
    ids
}

fn conflict_on_unique(e: sqlx::Error) -> ApiError {
    if is_unique_violation(&e) {
        ApiError::Conflict("slug已被占用".to_string())
    } else {
        ApiError::from(e)
    }
}

async fn render_post(state: &AppState, post: &Post) -> ApiResult<PostView> {
    let category_ids = TermRepository::category_ids_of_post(&state.pool, post.id).await?;
    let tag_ids = TermRepository::tag_ids_of_post(&state.pool, post.id).await?;
    let settings = state.settings.get(&state.pool).await;
    let base_url = state.base_url(&settings);
    Ok(format::format_post(post, category_ids, tag_ids, &base_url))
}

fn webhook_payload(post: &Post) -> serde_json::Value {
    json!({
        "id": post.id,
        "type": post.post_type,
        "title": post.title,
        "slug": post.slug,
        "status": post.status,
        "author": post.author_id,
    })
}

/// 列表的可见性：匿名与普通角色只看publish，管理视角不受限
async fn list_impl(
    state: AppState,
    identity: Option<Identity>,
    query: ListPostsQuery,
    post_type: &str,
) -> ApiResult<impl IntoResponse> {
    let authenticated = identity.is_some();
    let privileged = identity
        .map(|id| can_view_private_fields(id.role))
        .unwrap_or(false);
    let (page, per_page) = pagination::clamp_pagination(query.page, query.per_page);

    let status = resolve_status_filter(query.status, authenticated, privileged)?;
    let filter = PostListFilter {
        post_type: post_type.to_string(),
        status,
        author: query.author,
        category: query.categories,
        tag: query.tags,
        search: query.search,
        slug: query.slug,
        privileged,
        page,
        per_page,
    };
    let (posts, total) = PostRepository::list(&state.pool, &filter).await?;

    let settings = state.settings.get(&state.pool).await;
    let base_url = state.base_url(&settings);
    let mut views = Vec::with_capacity(posts.len());
    for post in &posts {
        let category_ids = TermRepository::category_ids_of_post(&state.pool, post.id).await?;
        let tag_ids = TermRepository::tag_ids_of_post(&state.pool, post.id).await?;
        views.push(format::format_post(post, category_ids, tag_ids, &base_url));
    }

    let rest = if post_type == "page" { "pages" } else { "posts" };
    let headers = pagination::pagination_headers(
        &format!("{}/wp-json/wp/v2/{}", format::normalize_base_url(&base_url), rest),
        page,
        per_page,
        total,
    );
    Ok((headers, Json(views)))
}

async fn get_impl(
    state: AppState,
    identity: Option<Identity>,
    id: i64,
    post_type: &str,
) -> ApiResult<Json<PostView>> {
    let post = PostRepository::find_by_id(&state.pool, post_type, id)
        .await?
        .ok_or(ApiError::NotFound)?;

    // 非公开状态对无权访问者与不存在同样表现，避免泄露存在性
    if post.status != STATUS_PUBLISH {
        let visible = identity
            .as_ref()
            .map(|id| can_view_private_fields(id.role) || id.user_id == post.author_id)
            .unwrap_or(false);
        if !visible {
            return Err(ApiError::NotFound);
        }
    } else {
        PostRepository::increment_view(&state.pool, id).await?;
    }

    Ok(Json(render_post(&state, &post).await?))
}

async fn create_impl(
    state: AppState,
    identity: Identity,
    req: CreatePostRequest,
    post_type: &str,
) -> ApiResult<impl IntoResponse> {
    if req.title.trim().is_empty() {
        return Err(ApiError::InvalidParameter("标题不能为空".to_string()));
    }

    let status = req.status.unwrap_or_else(|| STATUS_DRAFT.to_string());
    validate_status(&status)?;
    if status == STATUS_PUBLISH && !can_publish(identity.role) {
        return Err(ApiError::Forbidden);
    }
    // 订阅者连草稿都不能建
    if !can_edit_post(&identity, identity.user_id) {
        return Err(ApiError::Forbidden);
    }

    let base_slug = match &req.slug {
        Some(slug) if !slug.trim().is_empty() => assist::slugify(slug),
        _ => assist::suggest_slug(state.generator_ref(), &req.title).await,
    };
    let slug = PostRepository::unique_slug(&state.pool, &base_slug, None).await?;

    let excerpt = match req.excerpt {
        Some(excerpt) => Some(excerpt),
        None => match &req.content {
            Some(content) if !content.is_empty() => {
                Some(assist::suggest_excerpt(state.generator_ref(), content).await)
            }
            _ => None,
        },
    };

    let post = PostRepository::insert(
        &state.pool,
        NewPost {
            post_type: post_type.to_string(),
            title: req.title,
            content: req.content,
            excerpt,
            slug,
            status: status.clone(),
            author_id: identity.user_id,
            parent_id: req.parent.unwrap_or(0),
            featured_media_id: req.featured_media,
            featured_image_url: req.featured_image_url,
            comment_status: req.comment_status.unwrap_or_else(|| "open".to_string()),
        },
    )
    .await
    .map_err(conflict_on_unique)?;

    // 页面不参与分类/标签
    if post_type == "post" {
        let categories = match req.categories {
            Some(ids) if !ids.is_empty() => dedup_ids(ids),
            _ => vec![crate::database::entities::term::DEFAULT_TERM_ID],
        };
        TermRepository::set_post_categories(&state.pool, post.id, &categories).await?;
        if let Some(tags) = req.tags {
            TermRepository::set_post_tags(&state.pool, post.id, &dedup_ids(tags)).await?;
        }
    }

    // 直接以publish创建只发一条post.published
    let settings = state.settings.get(&state.pool).await;
    state.notifier.fire(
        &settings,
        webhook::post_create_event(&status),
        webhook_payload(&post),
    );

    Ok((StatusCode::CREATED, Json(render_post(&state, &post).await?)))
}

async fn update_impl(
    state: AppState,
    identity: Identity,
    id: i64,
    req: UpdatePostRequest,
    post_type: &str,
) -> ApiResult<Json<PostView>> {
    let existing = PostRepository::find_by_id(&state.pool, post_type, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    if !can_edit_post(&identity, existing.author_id) {
        return Err(ApiError::Forbidden);
    }

    if let Some(status) = &req.status {
        validate_status(status)?;
        if status == STATUS_PUBLISH
            && existing.status != STATUS_PUBLISH
            && !can_publish(identity.role)
        {
            return Err(ApiError::Forbidden);
        }
    }

    let slug = match &req.slug {
        Some(slug) if !slug.trim().is_empty() => {
            let base = assist::slugify(slug);
            Some(PostRepository::unique_slug(&state.pool, &base, Some(id)).await?)
        }
        _ => None,
    };

    let old_status = existing.status.clone();
    let new_status = req.status.clone().unwrap_or_else(|| old_status.clone());

    let post = PostRepository::update(
        &state.pool,
        id,
        PostChanges {
            title: req.title,
            content: req.content,
            excerpt: req.excerpt,
            slug,
            status: req.status,
            parent_id: req.parent,
            featured_media_id: req.featured_media,
            featured_image_url: req.featured_image_url,
            comment_status: req.comment_status,
        },
    )
    .await
    .map_err(conflict_on_unique)?;

    if post_type == "post" {
        if let Some(ids) = req.categories {
            let categories = if ids.is_empty() {
                vec![crate::database::entities::term::DEFAULT_TERM_ID]
            } else {
                dedup_ids(ids)
            };
            TermRepository::set_post_categories(&state.pool, post.id, &categories).await?;
        }
        if let Some(ids) = req.tags {
            TermRepository::set_post_tags(&state.pool, post.id, &dedup_ids(ids)).await?;
        }
    }

    let settings = state.settings.get(&state.pool).await;
    state.notifier.fire(
        &settings,
        webhook::post_update_event(&old_status, &new_status),
        webhook_payload(&post),
    );

    Ok(Json(render_post(&state, &post).await?))
}

async fn delete_impl(
    state: AppState,
    identity: Identity,
    id: i64,
    force: bool,
    post_type: &str,
) -> ApiResult<Json<serde_json::Value>> {
    let existing = PostRepository::find_by_id(&state.pool, post_type, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    if !can_delete_post(&identity, existing.author_id) {
        return Err(ApiError::Forbidden);
    }

    let settings = state.settings.get(&state.pool).await;
    let response = if force {
        let view = render_post(&state, &existing).await?;
        PostRepository::delete(&state.pool, id).await?;
        json!({ "deleted": true, "previous": view })
    } else {
        let trashed = PostRepository::trash(&state.pool, id).await?;
        serde_json::to_value(render_post(&state, &trashed).await?)
            .map_err(|e| ApiError::Upstream(e.to_string()))?
    };

    state
        .notifier
        .fire(&settings, webhook::events::POST_DELETED, webhook_payload(&existing));

    Ok(Json(response))
}

// ---- posts ----

pub async fn list_posts(
    identity: Option<Extension<Identity>>,
    State(state): State<AppState>,
    Query(query): Query<ListPostsQuery>,
) -> ApiResult<impl IntoResponse> {
    list_impl(state, identity.map(|Extension(id)| id), query, "post").await
}

pub async fn get_post(
    identity: Option<Extension<Identity>>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<PostView>> {
    get_impl(state, identity.map(|Extension(id)| id), id, "post").await
}

pub async fn create_post(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Json(req): Json<CreatePostRequest>,
) -> ApiResult<impl IntoResponse> {
    create_impl(state, identity, req, "post").await
}

pub async fn update_post(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdatePostRequest>,
) -> ApiResult<Json<PostView>> {
    update_impl(state, identity, id, req, "post").await
}

pub async fn delete_post(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    delete_impl(state, identity, id, query.force.unwrap_or(false), "post").await
}

// ---- pages（与posts同表同逻辑，仅post_type不同）----

pub async fn list_pages(
    identity: Option<Extension<Identity>>,
    State(state): State<AppState>,
    Query(query): Query<ListPostsQuery>,
) -> ApiResult<impl IntoResponse> {
    list_impl(state, identity.map(|Extension(id)| id), query, "page").await
}

pub async fn get_page(
    identity: Option<Extension<Identity>>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<PostView>> {
    get_impl(state, identity.map(|Extension(id)| id), id, "page").await
}

pub async fn create_page(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Json(req): Json<CreatePostRequest>,
) -> ApiResult<impl IntoResponse> {
    create_impl(state, identity, req, "page").await
}

pub async fn update_page(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdatePostRequest>,
) -> ApiResult<Json<PostView>> {
    update_impl(state, identity, id, req, "page").await
}

pub async fn delete_page(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    delete_impl(state, identity, id, query.force.unwrap_or(false), "page").await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_status_filter_open_to_everyone() {
        let status =
            resolve_status_filter(Some("publish".to_string()), false, false).unwrap();
        assert_eq!(status.as_deref(), Some("publish"));
    }

    #[test]
    fn draft_filter_requires_login_then_privilege() {
        // 匿名请求非publish状态先按未登录拒绝
        assert!(matches!(
            resolve_status_filter(Some("draft".to_string()), false, false),
            Err(ApiError::Unauthenticated)
        ));
        // 已登录但非管理视角按权限不足拒绝
        assert!(matches!(
            resolve_status_filter(Some("draft".to_string()), true, false),
            Err(ApiError::Forbidden)
        ));
        let status = resolve_status_filter(Some("draft".to_string()), true, true).unwrap();
        assert_eq!(status.as_deref(), Some("draft"));
    }

    #[test]
    fn unknown_status_rejected_before_permission_check() {
        assert!(matches!(
            resolve_status_filter(Some("bogus".to_string()), true, true),
            Err(ApiError::InvalidParameter(_))
        ));
        assert!(resolve_status_filter(None, false, false).unwrap().is_none());
    }
}
