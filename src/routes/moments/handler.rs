use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use crate::{
    AppState,
    auth::{
        Identity,
        permissions::{can_delete_post, can_edit_post, can_publish, can_view_private_fields},
    },
    database::{
        entities::moment::Moment,
        repositories::moments::{MomentChanges, MomentRepository},
    },
    error::{ApiError, ApiResult},
    format::{self, MomentView, pagination},
};

use super::model::{CreateMomentRequest, DeleteQuery, ListMomentsQuery, UpdateMomentRequest};

const MOMENT_STATUSES: [&str; 2] = ["publish", "draft"];

fn validate_status(status: &str) -> Result<(), ApiError> {
    if MOMENT_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(ApiError::InvalidParameter(format!("无效的状态: {}", status)))
    }
}

fn encode_media_urls(urls: &[String]) -> Result<String, ApiError> {
    serde_json::to_string(urls).map_err(|e| ApiError::InvalidParameter(e.to_string()))
}

async fn render_moment(state: &AppState, moment: &Moment) -> MomentView {
    let settings = state.settings.get(&state.pool).await;
    let base_url = state.base_url(&settings);
    format::format_moment(moment, &base_url)
}

pub async fn list_moments(
    identity: Option<Extension<Identity>>,
    State(state): State<AppState>,
    Query(query): Query<ListMomentsQuery>,
) -> ApiResult<impl IntoResponse> {
    let privileged = identity
        .map(|Extension(id)| can_view_private_fields(id.role))
        .unwrap_or(false);
    let (page, per_page) = pagination::clamp_pagination(query.page, query.per_page);
    let (moments, total) =
        MomentRepository::list(&state.pool, privileged, page, per_page).await?;

    let settings = state.settings.get(&state.pool).await;
    let base_url = state.base_url(&settings);
    let views: Vec<_> = moments
        .iter()
        .map(|m| format::format_moment(m, &base_url))
        .collect();

    let headers = pagination::pagination_headers(
        &format!(
            "{}/wp-json/wp/v2/moments",
            format::normalize_base_url(&base_url)
        ),
        page,
        per_page,
        total,
    );
    Ok((headers, Json(views)))
}

pub async fn get_moment(
    identity: Option<Extension<Identity>>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MomentView>> {
    let moment = MomentRepository::find_by_id(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;

    // 非publish状态对无权访问者表现为不存在
    if moment.status != "publish" {
        let visible = identity
            .map(|Extension(id)| {
                can_view_private_fields(id.role) || id.user_id == moment.author_id
            })
            .unwrap_or(false);
        if !visible {
            return Err(ApiError::NotFound);
        }
    } else {
        MomentRepository::increment_view(&state.pool, id).await?;
    }

    Ok(Json(render_moment(&state, &moment).await))
}

pub async fn create_moment(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Json(req): Json<CreateMomentRequest>,
) -> ApiResult<impl IntoResponse> {
    // 说说默认直接发布，发布权限与文章一致
    if !can_publish(identity.role) {
        return Err(ApiError::Forbidden);
    }
    if req.content.trim().is_empty() {
        return Err(ApiError::InvalidParameter("内容不能为空".to_string()));
    }
    let status = req.status.unwrap_or_else(|| "publish".to_string());
    validate_status(&status)?;

    let media_urls = encode_media_urls(&req.media_urls.unwrap_or_default())?;
    let moment = MomentRepository::insert(
        &state.pool,
        &req.content,
        identity.user_id,
        &status,
        &media_urls,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(render_moment(&state, &moment).await)))
}

pub async fn update_moment(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateMomentRequest>,
) -> ApiResult<Json<MomentView>> {
    let existing = MomentRepository::find_by_id(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    if !can_edit_post(&identity, existing.author_id) {
        return Err(ApiError::Forbidden);
    }
    if let Some(status) = &req.status {
        validate_status(status)?;
        if status == "publish" && existing.status != "publish" && !can_publish(identity.role) {
            return Err(ApiError::Forbidden);
        }
    }

    let media_urls = match &req.media_urls {
        Some(urls) => Some(encode_media_urls(urls)?),
        None => None,
    };
    let moment = MomentRepository::update(
        &state.pool,
        id,
        MomentChanges {
            content: req.content,
            status: req.status,
            media_urls,
        },
    )
    .await?;

    Ok(Json(render_moment(&state, &moment).await))
}

pub async fn delete_moment(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let existing = MomentRepository::find_by_id(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    if !can_delete_post(&identity, existing.author_id) {
        return Err(ApiError::Forbidden);
    }

    if query.force.unwrap_or(false) {
        let view = render_moment(&state, &existing).await;
        MomentRepository::delete(&state.pool, id).await?;
        Ok(Json(json!({ "deleted": true, "previous": view })))
    } else {
        let trashed = MomentRepository::trash(&state.pool, id).await?;
        let view = render_moment(&state, &trashed).await;
        Ok(Json(
            serde_json::to_value(view).map_err(|e| ApiError::Upstream(e.to_string()))?,
        ))
    }
}

/// 点赞不需要登录，只对已发布的说说有效
pub async fn like_moment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let moment = MomentRepository::find_by_id(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    if moment.status != "publish" {
        return Err(ApiError::NotFound);
    }
    let like_count = MomentRepository::increment_like(&state.pool, id).await?;
    Ok(Json(json!({ "id": id, "like_count": like_count })))
}
